use clap::{Parser, Subcommand};

/// muxplay - terminal music that keeps playing in a tmux session 🎵
#[derive(Parser, Debug)]
#[command(name = "muxplay", version, about)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Re-index the whole library before running the command
    #[arg(long, global = true)]
    pub reindex: bool,

    /// Drop songs whose files are gone from the index
    #[arg(long, global = true)]
    pub cleanup: bool,

    /// Run as the player inside the tmux session (internal)
    #[arg(long, global = true, hide = true)]
    pub standalone: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Play songs (or the current queue when none are named)
    Play {
        names: Vec<String>,
        /// Put each finished song back at the end of the queue
        #[arg(long = "loop")]
        looped: bool,
        /// Pick songs in random order
        #[arg(long)]
        shuffle: bool,
        /// Start the session without attaching to it
        #[arg(long)]
        background: bool,
        /// Treat names as playlists
        #[arg(long)]
        playlist: bool,
    },
    /// Add songs to the end of the queue
    Queue {
        names: Vec<String>,
        /// Treat names as playlists
        #[arg(long)]
        playlist: bool,
    },
    /// Pause or resume the background session
    P,
    /// Set the volume (0-100)
    V {
        #[arg(allow_negative_numbers = true)]
        level: i64,
    },
    /// Quit the background session
    Q,
    /// Connect to the background session
    C,
    /// Copy files into the library and index them
    Index { files: Vec<std::path::PathBuf> },
    /// List songs
    List,
    /// Search for a song
    Search { term: String },
    /// Show song information
    Info { name: String },
    /// Delete a song from the library
    Del { name: String },
    /// Manage playlists
    #[command(subcommand)]
    Playlist(PlaylistCommand),
    /// Empty the log file
    Flush,
    /// Show version information
    Version,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum PlaylistCommand {
    Create { name: String },
    Delete { name: String },
    /// Add songs to a playlist
    Add { playlist: String, songs: Vec<String> },
    /// Remove songs from a playlist
    Remove { playlist: String, songs: Vec<String> },
    /// List all playlists, or one playlist's songs
    List { name: Option<String> },
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_play_flags() {
        let args = Args::try_parse_from([
            "muxplay", "play", "Clair de Lune", "Limbo", "--loop", "--shuffle", "--background",
        ])
        .unwrap();

        assert_eq!(
            args.command,
            Command::Play {
                names: vec!["Clair de Lune".into(), "Limbo".into()],
                looped: true,
                shuffle: true,
                background: true,
                playlist: false,
            }
        );
        assert!(!args.standalone);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = Args::try_parse_from(["muxplay", "play", "x", "--standalone", "--reindex"]).unwrap();
        assert!(args.standalone);
        assert!(args.reindex);
    }

    #[test]
    fn test_negative_volume_is_accepted() {
        let args = Args::try_parse_from(["muxplay", "v", "-10"]).unwrap();
        assert_eq!(args.command, Command::V { level: -10 });
    }

    #[test]
    fn test_playlist_subcommands() {
        let args = Args::try_parse_from(["muxplay", "playlist", "add", "chill", "a", "b"]).unwrap();
        assert_eq!(
            args.command,
            Command::Playlist(PlaylistCommand::Add {
                playlist: "chill".into(),
                songs: vec!["a".into(), "b".into()],
            })
        );

        let args = Args::try_parse_from(["muxplay", "playlist", "list"]).unwrap();
        assert_eq!(args.command, Command::Playlist(PlaylistCommand::List { name: None }));
    }
}
