pub mod song;
pub mod tags;

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::errors::CatalogError;
use crate::lyrics::{self, LyricLine};

pub use song::Song;
pub use tags::FileTags;

pub const INDEX_FILE_NAME: &str = "index.db";

const SONG_COLUMNS: &str = "id, path, title, artist, album, duration, genre, year";

/// The song and playlist index, stored next to the music in `index.db`.
pub struct Catalog {
    conn: Connection,
    library: PathBuf,
}

impl Catalog {
    pub fn open(library: &Path) -> Result<Self, CatalogError> {
        let conn = Connection::open(library.join(INDEX_FILE_NAME))?;
        Self::with_connection(conn, library)
    }

    pub fn open_in_memory(library: &Path) -> Result<Self, CatalogError> {
        Self::with_connection(Connection::open_in_memory()?, library)
    }

    fn with_connection(conn: Connection, library: &Path) -> Result<Self, CatalogError> {
        let catalog = Self {
            conn,
            library: library.to_path_buf(),
        };
        catalog.initialize_tables()?;
        Ok(catalog)
    }

    fn initialize_tables(&self) -> Result<(), CatalogError> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS songs (
                id INTEGER PRIMARY KEY,
                path TEXT NOT NULL UNIQUE,
                title TEXT,
                artist TEXT,
                album TEXT,
                duration REAL NOT NULL DEFAULT 0,
                genre TEXT,
                year INTEGER
            );
            CREATE TABLE IF NOT EXISTS playlists (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE
            );
            CREATE TABLE IF NOT EXISTS playlist_songs (
                playlist_id INTEGER NOT NULL,
                song_id INTEGER NOT NULL,
                position INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_playlist_songs_playlist ON playlist_songs(playlist_id);",
        )?;
        Ok(())
    }

    pub fn library(&self) -> &Path {
        &self.library
    }

    fn row_to_song(row: &Row) -> rusqlite::Result<Song> {
        Ok(Song {
            id: row.get(0)?,
            path: PathBuf::from(row.get::<_, String>(1)?),
            title: row.get(2)?,
            artist: row.get(3)?,
            album: row.get(4)?,
            duration: row.get(5)?,
            genre: row.get(6)?,
            year: row.get(7)?,
        })
    }

    fn query_songs(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<Song>, CatalogError> {
        let mut stmt = self.conn.prepare(sql)?;
        let songs = stmt
            .query_map(params, Self::row_to_song)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(songs)
    }

    /// Insert or refresh the row for `path`, keeping its id stable.
    pub fn upsert(&self, path: &Path, tags: &FileTags) -> Result<Song, CatalogError> {
        let path_str = path.to_string_lossy();
        self.conn.execute(
            "INSERT INTO songs (path, title, artist, album, duration, genre, year)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(path) DO UPDATE SET
                title = excluded.title,
                artist = excluded.artist,
                album = excluded.album,
                duration = excluded.duration,
                genre = excluded.genre,
                year = excluded.year",
            params![
                path_str,
                tags.title,
                tags.artist,
                tags.album,
                tags.duration_secs,
                tags.genre,
                tags.year,
            ],
        )?;
        let song = self.conn.query_row(
            &format!("SELECT {SONG_COLUMNS} FROM songs WHERE path = ?1"),
            params![path_str],
            Self::row_to_song,
        )?;
        Ok(song)
    }

    /// Rescan the library folder: every audio file is (re)indexed and rows
    /// whose file vanished are dropped. Returns the number of files indexed.
    pub fn index_library(&self) -> Result<usize, CatalogError> {
        let mut indexed = 0;
        for entry in WalkDir::new(&self.library)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && tags::is_audio_file(e.path()))
        {
            match FileTags::read(entry.path()) {
                Ok(tags) => {
                    info!(
                        "Indexing {} by {}",
                        tags.title.as_deref().unwrap_or("?"),
                        tags.artist.as_deref().unwrap_or("?")
                    );
                    self.upsert(entry.path(), &tags)?;
                    indexed += 1;
                }
                Err(e) => warn!("Skipping {}: {}", entry.path().display(), e),
            }
        }
        self.cleanup()?;
        Ok(indexed)
    }

    /// Copy a file into the library (unless it already lives there) and index it.
    pub fn import_file(&self, file: &Path) -> Result<Song, CatalogError> {
        if !tags::is_audio_file(file) {
            warn!("{} does not look like an audio file, importing anyway", file.display());
        }
        let target = match file.file_name() {
            Some(name) if !file.starts_with(&self.library) => {
                let target = self.library.join(name);
                info!("Copying {} to library", file.display());
                fs::copy(file, &target)?;
                target
            }
            _ => file.to_path_buf(),
        };
        let tags = FileTags::read(&target)?;
        self.upsert(&target, &tags)
    }

    /// Songs whose title, artist or album contain `term`, best fuzzy match first.
    pub fn search(&self, term: &str) -> Result<Vec<Song>, CatalogError> {
        let pattern = format!("%{}%", term);
        let songs = self.query_songs(
            &format!(
                "SELECT {SONG_COLUMNS} FROM songs
                 WHERE title LIKE ?1 OR artist LIKE ?1 OR album LIKE ?1
                 ORDER BY id"
            ),
            params![pattern],
        )?;
        if term.is_empty() {
            return Ok(songs);
        }

        let matcher = SkimMatcherV2::default().ignore_case();
        let mut scored: Vec<(i64, Song)> = songs
            .into_iter()
            .map(|song| {
                let haystack = format!(
                    "{} {} {}",
                    song.title.as_deref().unwrap_or_default(),
                    song.artist.as_deref().unwrap_or_default(),
                    song.album.as_deref().unwrap_or_default()
                );
                (matcher.fuzzy_match(&haystack, term).unwrap_or(0), song)
            })
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(scored.into_iter().map(|(_, song)| song).collect())
    }

    pub fn all(&self) -> Result<Vec<Song>, CatalogError> {
        self.query_songs(&format!("SELECT {SONG_COLUMNS} FROM songs ORDER BY id"), [])
    }

    pub fn get(&self, id: i64) -> Result<Option<Song>, CatalogError> {
        let song = self
            .conn
            .query_row(
                &format!("SELECT {SONG_COLUMNS} FROM songs WHERE id = ?1"),
                params![id],
                Self::row_to_song,
            )
            .optional()?;
        Ok(song)
    }

    pub fn remove(&self, id: i64) -> Result<bool, CatalogError> {
        self.conn
            .execute("DELETE FROM playlist_songs WHERE song_id = ?1", params![id])?;
        let removed = self.conn.execute("DELETE FROM songs WHERE id = ?1", params![id])?;
        Ok(removed > 0)
    }

    /// Drop index rows whose file no longer exists. Returns how many were dropped.
    pub fn cleanup(&self) -> Result<usize, CatalogError> {
        let mut removed = 0;
        for song in self.all()? {
            if !song.path.exists() {
                warn!("File '{}' not found, removing from index", song.path.display());
                self.remove(song.id)?;
                removed += 1;
            }
        }
        if removed > 0 {
            info!("Library cleaned up, {} ghost entries removed", removed);
        }
        Ok(removed)
    }

    /// Timed lyrics for a song: a sidecar `.lrc` file or an embedded tag.
    pub fn get_lyrics(&self, song: &Song) -> Option<Vec<LyricLine>> {
        lyrics::load_for(&song.path)
    }

    // --- Playlists ---

    fn playlist_id(&self, name: &str) -> Result<Option<i64>, CatalogError> {
        let id = self
            .conn
            .query_row(
                "SELECT id FROM playlists WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    fn require_playlist(&self, name: &str) -> Result<i64, CatalogError> {
        self.playlist_id(name)?
            .ok_or_else(|| CatalogError::UnknownPlaylist(name.to_string()))
    }

    pub fn create_playlist(&self, name: &str) -> Result<(), CatalogError> {
        if self.playlist_id(name)?.is_some() {
            return Err(CatalogError::DuplicatePlaylist(name.to_string()));
        }
        self.conn
            .execute("INSERT INTO playlists (name) VALUES (?1)", params![name])?;
        Ok(())
    }

    pub fn delete_playlist(&self, name: &str) -> Result<(), CatalogError> {
        let id = self.require_playlist(name)?;
        self.conn
            .execute("DELETE FROM playlist_songs WHERE playlist_id = ?1", params![id])?;
        self.conn
            .execute("DELETE FROM playlists WHERE id = ?1", params![id])?;
        Ok(())
    }

    pub fn add_to_playlist(&self, name: &str, song: &Song) -> Result<(), CatalogError> {
        let id = self.require_playlist(name)?;
        self.conn.execute(
            "INSERT INTO playlist_songs (playlist_id, song_id, position)
             VALUES (?1, ?2, (SELECT COALESCE(MAX(position), -1) + 1 FROM playlist_songs WHERE playlist_id = ?1))",
            params![id, song.id],
        )?;
        Ok(())
    }

    pub fn remove_from_playlist(&self, name: &str, song: &Song) -> Result<bool, CatalogError> {
        let id = self.require_playlist(name)?;
        let removed = self.conn.execute(
            "DELETE FROM playlist_songs WHERE rowid = (
                SELECT rowid FROM playlist_songs
                WHERE playlist_id = ?1 AND song_id = ?2
                ORDER BY position LIMIT 1
            )",
            params![id, song.id],
        )?;
        Ok(removed > 0)
    }

    pub fn playlists(&self) -> Result<Vec<String>, CatalogError> {
        let mut stmt = self.conn.prepare("SELECT name FROM playlists ORDER BY name")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(names)
    }

    pub fn playlist_songs(&self, name: &str) -> Result<Vec<Song>, CatalogError> {
        let id = self.require_playlist(name)?;
        self.query_songs(
            "SELECT s.id, s.path, s.title, s.artist, s.album, s.duration, s.genre, s.year
             FROM playlist_songs ps JOIN songs s ON s.id = ps.song_id
             WHERE ps.playlist_id = ?1
             ORDER BY ps.position",
            params![id],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn tags(title: &str, artist: &str, album: Option<&str>) -> FileTags {
        FileTags {
            title: Some(title.to_string()),
            artist: Some(artist.to_string()),
            album: album.map(str::to_string),
            duration_secs: 200.0,
            ..FileTags::default()
        }
    }

    fn catalog_with_songs(dir: &TempDir) -> Catalog {
        let catalog = Catalog::open_in_memory(dir.path()).unwrap();
        catalog
            .upsert(&dir.path().join("a.mp3"), &tags("Clair de Lune", "Debussy", Some("Suite")))
            .unwrap();
        catalog
            .upsert(&dir.path().join("b.mp3"), &tags("Limbo", "Climax", None))
            .unwrap();
        catalog
            .upsert(&dir.path().join("c.mp3"), &tags("Greed", "Climax", Some("Lunar")))
            .unwrap();
        catalog
    }

    #[test]
    fn test_upsert_keeps_ids_stable() {
        let dir = TempDir::new().unwrap();
        let catalog = catalog_with_songs(&dir);
        let before = catalog.search("Limbo").unwrap()[0].clone();

        let after = catalog
            .upsert(&dir.path().join("b.mp3"), &tags("Limbo (Remix)", "Climax", None))
            .unwrap();

        assert_eq!(after.id, before.id);
        assert_eq!(after.title.as_deref(), Some("Limbo (Remix)"));
        assert_eq!(catalog.all().unwrap().len(), 3);
    }

    #[test]
    fn test_search_matches_title_artist_and_album() {
        let dir = TempDir::new().unwrap();
        let catalog = catalog_with_songs(&dir);

        assert_eq!(catalog.search("climax").unwrap().len(), 2);
        assert_eq!(catalog.search("Suite").unwrap().len(), 1);
        assert_eq!(catalog.search("").unwrap().len(), 3);
        assert!(catalog.search("nothing like this").unwrap().is_empty());
    }

    #[test]
    fn test_cleanup_drops_missing_files() {
        let dir = TempDir::new().unwrap();
        let catalog = catalog_with_songs(&dir);
        fs::write(dir.path().join("a.mp3"), b"").unwrap();

        assert_eq!(catalog.cleanup().unwrap(), 2);
        let left = catalog.all().unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].path, dir.path().join("a.mp3"));
    }

    #[test]
    fn test_playlist_round_trip() {
        let dir = TempDir::new().unwrap();
        let catalog = catalog_with_songs(&dir);
        let songs = catalog.all().unwrap();

        catalog.create_playlist("night").unwrap();
        catalog.add_to_playlist("night", &songs[2]).unwrap();
        catalog.add_to_playlist("night", &songs[0]).unwrap();
        catalog.add_to_playlist("night", &songs[2]).unwrap();

        assert_eq!(
            catalog.playlist_songs("night").unwrap(),
            vec![songs[2].clone(), songs[0].clone(), songs[2].clone()]
        );

        assert!(catalog.remove_from_playlist("night", &songs[2]).unwrap());
        assert_eq!(
            catalog.playlist_songs("night").unwrap(),
            vec![songs[0].clone(), songs[2].clone()]
        );
        assert_eq!(catalog.playlists().unwrap(), vec!["night".to_string()]);
    }

    #[test]
    fn test_playlist_errors() {
        let dir = TempDir::new().unwrap();
        let catalog = catalog_with_songs(&dir);
        catalog.create_playlist("night").unwrap();

        assert!(matches!(
            catalog.create_playlist("night"),
            Err(CatalogError::DuplicatePlaylist(_))
        ));
        assert!(matches!(
            catalog.playlist_songs("day"),
            Err(CatalogError::UnknownPlaylist(_))
        ));

        catalog.delete_playlist("night").unwrap();
        assert!(catalog.playlists().unwrap().is_empty());
    }

    #[test]
    fn test_removing_a_song_unlinks_it_from_playlists() {
        let dir = TempDir::new().unwrap();
        let catalog = catalog_with_songs(&dir);
        let song = catalog.all().unwrap()[1].clone();
        catalog.create_playlist("mix").unwrap();
        catalog.add_to_playlist("mix", &song).unwrap();

        assert!(catalog.remove(song.id).unwrap());

        assert!(catalog.get(song.id).unwrap().is_none());
        assert!(catalog.playlist_songs("mix").unwrap().is_empty());
    }
}
