use std::path::PathBuf;
use thiserror::Error;

/// Errors reading or writing one of the shared JSON documents.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed JSON in {}: {source}", path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to replace {}: {source}", path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: tempfile::PersistError,
    },
}

impl StoreError {
    /// A torn or half-written document; the next read will likely succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Malformed { .. })
    }
}

/// Errors that can occur with the song index.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    IO(#[from] std::io::Error),
    #[error("Tag error on {}: {source}", path.display())]
    Tags {
        path: PathBuf,
        #[source]
        source: lofty::error::LoftyError,
    },
    #[error("No playlist named '{0}'")]
    UnknownPlaylist(String),
    #[error("A playlist named '{0}' already exists")]
    DuplicatePlaylist(String),
}

/// Errors that end a playback session.
#[derive(Error, Debug)]
pub enum PlaybackError {
    #[error("Track file not found: {} (is the library index out of date? try --cleanup)", .0.display())]
    MissingTrack(PathBuf),
    #[error("Audio engine failed to load {}: {reason}", path.display())]
    Load { path: PathBuf, reason: String },
    #[error("Audio engine error: {0}")]
    Engine(String),
    #[error("Key listener failed: {0}")]
    Listener(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors talking to tmux.
#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("tmux is required for background playback, please install it or add it to your PATH")]
    Unavailable,
    #[error("No background session is running")]
    NoSession,
    #[error("{command} failed: {stderr}")]
    Command { command: String, stderr: String },
    #[error("Failed to run tmux: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_only_malformed_documents_are_transient() {
        let malformed = StoreError::Malformed {
            path: PathBuf::from("queue.json"),
            source: serde_json::from_str::<Vec<u8>>("[1, 2").unwrap_err(),
        };
        let io = StoreError::Io {
            path: PathBuf::from("queue.json"),
            source: std::io::Error::other("disk on fire"),
        };

        assert!(malformed.is_transient());
        assert!(!io.is_transient());
    }

    #[test]
    fn test_missing_track_message_names_the_file() {
        let err = PlaybackError::MissingTrack(PathBuf::from("/music/gone.mp3"));
        assert_eq!(
            err.to_string(),
            "Track file not found: /music/gone.mp3 (is the library index out of date? try --cleanup)"
        );
    }
}
