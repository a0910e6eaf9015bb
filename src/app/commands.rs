use anyhow::{Context, Result};
use rand::seq::SliceRandom;
use std::fs;
use std::io::IsTerminal;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::app::cli::{Args, Command, PlaylistCommand};
use crate::app::config::{AppConfig, PlaybackFlags, Settings};
use crate::app::keys::{Console, ConsoleFactory, NullConsole, Tty};
use crate::app::launcher::{self, LaunchOutcome, Role};
use crate::app::playback::{PlaybackLoop, SessionEnd, Shutdown};
use crate::app::status::format_clock;
use crate::app::tmux::{Multiplexer, Tmux, SESSION_NAME};
use crate::catalog::{Catalog, Song};
use crate::errors::{CatalogError, LaunchError};
use crate::player::{AudioEngine, RodioEngine};

/// Flags the worker must not repeat.
const LAUNCHER_ONLY_FLAGS: [&str; 2] = ["--reindex", "--cleanup"];

/// Songs found for a list of names, plus the names that matched nothing.
#[derive(Debug, Default, PartialEq)]
pub struct Resolution {
    pub songs: Vec<Song>,
    pub missing: Vec<String>,
}

/// Turn user-typed names into songs.
///
/// A title equal to the name (ignoring case) wins outright; otherwise every
/// match is taken. With `playlists`, each name is a playlist to expand.
pub fn resolve(catalog: &Catalog, names: &[String], playlists: bool) -> Result<Resolution, CatalogError> {
    let mut resolution = Resolution::default();
    for name in names {
        if playlists {
            resolution.songs.extend(catalog.playlist_songs(name)?);
            continue;
        }

        let matches = catalog.search(name)?;
        if matches.is_empty() {
            warn!("Could not find song '{}' in library", name);
            resolution.missing.push(name.clone());
            continue;
        }
        let exact = matches.iter().find(|song| {
            song.title
                .as_deref()
                .map(|title| title.eq_ignore_ascii_case(name))
                .unwrap_or(false)
        });
        match exact {
            Some(song) => resolution.songs.push(song.clone()),
            None => resolution.songs.extend(matches),
        }
    }
    Ok(resolution)
}

/// One song for `info`/`del`: an id from `list`, or the first match by name.
fn find_one(catalog: &Catalog, name: &str) -> Result<Option<Song>, CatalogError> {
    if let Ok(id) = name.parse::<i64>() {
        if let Some(song) = catalog.get(id)? {
            return Ok(Some(song));
        }
    }
    Ok(resolve(catalog, &[name.to_string()], false)?.songs.into_iter().next())
}

/// `Title by Artist (Album)`
pub fn format_song(song: &Song) -> String {
    let mut line = format!(
        "{} by {}",
        song.display_name(),
        song.artist.as_deref().unwrap_or("Unknown Artist")
    );
    if let Some(album) = &song.album {
        line.push_str(&format!(" ({})", album));
    }
    line
}

pub async fn dispatch(args: Args, config: &AppConfig, settings: &Settings) -> Result<ExitCode> {
    let role = Role::from_standalone(args.standalone);

    // Library maintenance flags apply to any command
    if args.reindex || args.cleanup {
        let catalog = open_catalog(settings)?;
        if args.reindex {
            let count = catalog.index_library()?;
            println!("Indexed {} songs", count);
        }
        if args.cleanup {
            let removed = catalog.cleanup()?;
            println!("Removed {} missing songs from the index", removed);
        }
    }

    run_command(args.command, role, config, settings).await
}

fn open_catalog(settings: &Settings) -> Result<Catalog> {
    Catalog::open(&settings.library)
        .with_context(|| format!("Failed to open the index in {}", settings.library.display()))
}

fn play_launch(
    mux: &dyn Multiplexer,
    config: &AppConfig,
    settings: &Settings,
    names: &[String],
    flags: PlaybackFlags,
    background: bool,
    playlist: bool,
) -> Result<()> {
    let songs = if names.is_empty() {
        // Resume whatever is queued
        if config.queue().peek_all()?.is_empty() {
            println!("No songs found to play.");
            return Ok(());
        }
        None
    } else {
        let catalog = open_catalog(settings)?;
        let Resolution { mut songs, missing } = resolve(&catalog, names, playlist)?;
        for name in &missing {
            println!("Could not find song '{}' in library.", name);
        }
        if songs.is_empty() {
            println!("No songs found to play.");
            return Ok(());
        }
        if flags.shuffle {
            songs.shuffle(&mut rand::thread_rng());
        }
        Some(songs)
    };
    stage_session(mux, config, songs.as_deref(), flags)?;

    let exe = std::env::current_exe().context("Could not locate the muxplay executable")?;
    let raw_args: Vec<String> = std::env::args()
        .skip(1)
        .filter(|a| !LAUNCHER_ONLY_FLAGS.contains(&a.as_str()))
        .collect();

    let outcome = launcher::launch(mux, SESSION_NAME, &exe.to_string_lossy(), &raw_args, background)?;
    if outcome == LaunchOutcome::Detached {
        println!("Playing in the background. `muxplay c` to connect, `muxplay q` to stop.");
    }
    Ok(())
}

/// Stop the running worker, then write the queue and flags for the next one.
fn stage_session(
    mux: &dyn Multiplexer,
    config: &AppConfig,
    songs: Option<&[Song]>,
    flags: PlaybackFlags,
) -> Result<()> {
    launcher::end_running_session(mux, SESSION_NAME)?;
    if let Some(songs) = songs {
        config.queue().replace(songs)?;
    }
    config.playback().set(flags)?;
    Ok(())
}

async fn play_worker(config: &AppConfig) -> Result<ExitCode> {
    let engine: Arc<dyn AudioEngine> = Arc::new(RodioEngine::new()?);
    let consoles: ConsoleFactory = if std::io::stdin().is_terminal() {
        Arc::new(|| Box::new(Tty::default()) as Box<dyn Console>)
    } else {
        Arc::new(|| Box::new(NullConsole) as Box<dyn Console>)
    };

    let shutdown = Shutdown::default();
    let on_signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received");
            on_signal.trigger();
        }
    });

    let mut player = PlaybackLoop::new(
        config,
        engine,
        Arc::new(Tmux),
        consoles,
        shutdown,
        Box::new(std::io::stdout()),
    );

    match player.run().await {
        Ok(SessionEnd::Finished) => Ok(ExitCode::SUCCESS),
        Ok(SessionEnd::Interrupted) => {
            println!("Playback stopped");
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            error!("Playback session crashed: {}", e);
            // Keep the tmux pane open long enough to read what happened
            println!("\nOh no, muxplay has crashed!\n{}", e);
            println!("Log saved to {}", config.log_path().display());
            println!("Press enter to exit...");
            let mut line = String::new();
            let _ = std::io::stdin().read_line(&mut line);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn running_session(mux: &dyn Multiplexer) -> Result<(), LaunchError> {
    if mux.has_session(SESSION_NAME) {
        Ok(())
    } else {
        Err(LaunchError::NoSession)
    }
}

async fn run_command(
    command: Command,
    role: Role,
    config: &AppConfig,
    settings: &Settings,
) -> Result<ExitCode> {
    match command {
        Command::Play {
            names,
            looped,
            shuffle,
            background,
            playlist,
        } => {
            if role == Role::Worker {
                return play_worker(config).await;
            }
            let flags = PlaybackFlags { looped, shuffle };
            play_launch(&Tmux, config, settings, &names, flags, background, playlist)?;
        }
        Command::Queue { names, playlist } => {
            let catalog = open_catalog(settings)?;
            let resolution = resolve(&catalog, &names, playlist)?;
            for name in &resolution.missing {
                println!("Could not find song '{}' in library.", name);
            }
            config.queue().enqueue(&resolution.songs)?;
            println!("Added {} songs to the queue", resolution.songs.len());
        }
        Command::P => {
            running_session(&Tmux)?;
            Tmux.send_keys(SESSION_NAME, " ")?;
        }
        Command::V { level } => {
            let volume = config.settings().set_volume(level)?;
            println!("Volume set to {}%", volume);
        }
        Command::Q => {
            running_session(&Tmux)?;
            Tmux.kill_session(SESSION_NAME)?;
            println!("Stopped the background session");
        }
        Command::C => launcher::attach_preserving_status(&Tmux, SESSION_NAME)?,
        Command::Index { files } => {
            let catalog = open_catalog(settings)?;
            for file in files {
                if !file.exists() {
                    println!("File not found: {}", file.display());
                    continue;
                }
                match catalog.import_file(&file) {
                    Ok(song) => println!("Indexed {}", format_song(&song)),
                    Err(e) => println!("Failed to index {}: {}", file.display(), e),
                }
            }
        }
        Command::List => {
            for song in open_catalog(settings)?.all()? {
                println!("{:>4}  {}", song.id, format_song(&song));
            }
        }
        Command::Search { term } => {
            for song in open_catalog(settings)?.search(&term)? {
                println!("{}", format_song(&song));
            }
        }
        Command::Info { name } => {
            let catalog = open_catalog(settings)?;
            let Some(song) = find_one(&catalog, &name)? else {
                println!("Could not find song '{}' in library.", name);
                return Ok(ExitCode::SUCCESS);
            };
            print_info(&catalog, &song);
        }
        Command::Del { name } => {
            let catalog = open_catalog(settings)?;
            let Some(song) = find_one(&catalog, &name)? else {
                println!("Could not find song '{}' in library.", name);
                return Ok(ExitCode::SUCCESS);
            };
            catalog.remove(song.id)?;
            // Only files we copied in are ours to delete
            if song.path.starts_with(catalog.library()) && song.path.exists() {
                fs::remove_file(&song.path)
                    .with_context(|| format!("Failed to delete {}", song.path.display()))?;
            }
            println!("Deleted {}", format_song(&song));
        }
        Command::Playlist(cmd) => run_playlist(cmd, settings)?,
        Command::Flush => {
            fs::File::create(config.log_path()).context("Failed to truncate the log")?;
            println!("Logs flushed");
        }
        Command::Version => println!("muxplay v{}", env!("CARGO_PKG_VERSION")),
    }
    Ok(ExitCode::SUCCESS)
}

fn print_info(catalog: &Catalog, song: &Song) {
    let or_unknown = |value: &Option<String>| value.clone().unwrap_or_else(|| "Unknown".into());
    println!("Title:    {}", song.display_name());
    println!("Artist:   {}", or_unknown(&song.artist));
    println!("Album:    {}", or_unknown(&song.album));
    println!("Genre:    {}", or_unknown(&song.genre));
    println!(
        "Year:     {}",
        song.year.map(|y| y.to_string()).unwrap_or_else(|| "Unknown".into())
    );
    println!("Duration: {}", format_clock(song.duration_ms()));
    println!("Path:     {}", song.path.display());
    let lyrics = if catalog.get_lyrics(song).is_some() {
        "timed"
    } else {
        "none"
    };
    println!("Lyrics:   {}", lyrics);
}

fn run_playlist(cmd: PlaylistCommand, settings: &Settings) -> Result<()> {
    let catalog = open_catalog(settings)?;
    match cmd {
        PlaylistCommand::Create { name } => {
            catalog.create_playlist(&name)?;
            println!("Created playlist '{}'", name);
        }
        PlaylistCommand::Delete { name } => {
            catalog.delete_playlist(&name)?;
            println!("Deleted playlist '{}'", name);
        }
        PlaylistCommand::Add { playlist, songs } => {
            let resolution = resolve(&catalog, &songs, false)?;
            for name in &resolution.missing {
                println!("Could not find song '{}' in library.", name);
            }
            for song in &resolution.songs {
                catalog.add_to_playlist(&playlist, song)?;
                println!("Added {} to '{}'", format_song(song), playlist);
            }
        }
        PlaylistCommand::Remove { playlist, songs } => {
            for song in resolve(&catalog, &songs, false)?.songs {
                if catalog.remove_from_playlist(&playlist, &song)? {
                    println!("Removed {} from '{}'", format_song(&song), playlist);
                }
            }
        }
        PlaylistCommand::List { name: None } => {
            for name in catalog.playlists()? {
                println!("{}", name);
            }
        }
        PlaylistCommand::List { name: Some(name) } => {
            for song in catalog.playlist_songs(&name)? {
                println!("{}", format_song(&song));
            }
        }
    }
    Ok(())
}
