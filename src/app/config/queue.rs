use std::path::{Path, PathBuf};

use super::persistence::{read_json, write_json};
use crate::catalog::Song;
use crate::errors::StoreError;

/// The durable play queue (`queue.json`), a JSON array of songs.
///
/// There is no locking: every operation is read-modify-write against the
/// file and the last writer wins. Only the playback loop removes entries.
#[derive(Debug, Clone)]
pub struct QueueStore {
    path: PathBuf,
}

impl QueueStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current durable snapshot. A missing file is an empty queue.
    pub fn peek_all(&self) -> Result<Vec<Song>, StoreError> {
        match read_json(&self.path) {
            Err(StoreError::Io { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
                Ok(Vec::new())
            }
            other => other,
        }
    }

    pub fn enqueue(&self, songs: &[Song]) -> Result<(), StoreError> {
        let mut queue = self.peek_all()?;
        queue.extend_from_slice(songs);
        write_json(&self.path, &queue)
    }

    /// Remove the first entry equal to `song`. Returns false if none matched.
    pub fn dequeue_one(&self, song: &Song) -> Result<bool, StoreError> {
        let mut queue = self.peek_all()?;
        let Some(pos) = queue.iter().position(|s| s == song) else {
            return Ok(false);
        };
        queue.remove(pos);
        write_json(&self.path, &queue)?;
        Ok(true)
    }

    pub fn replace(&self, songs: &[Song]) -> Result<(), StoreError> {
        write_json(&self.path, songs)
    }

    pub fn clear(&self) -> Result<(), StoreError> {
        self.replace(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn song(id: i64, title: &str) -> Song {
        Song {
            id,
            path: PathBuf::from(format!("/music/{title}.mp3")),
            title: Some(title.to_string()),
            artist: Some("Artist".to_string()),
            album: None,
            duration: 180.0,
            genre: None,
            year: Some(2001),
        }
    }

    #[test]
    fn test_enqueue_preserves_append_order_across_reloads() {
        let dir = TempDir::new().unwrap();
        let store = QueueStore::new(dir.path().join("queue.json"));

        store.enqueue(&[song(1, "a"), song(2, "b")]).unwrap();
        store.enqueue(&[song(3, "c")]).unwrap();

        let reloaded = QueueStore::new(dir.path().join("queue.json"));
        assert_eq!(
            reloaded.peek_all().unwrap(),
            vec![song(1, "a"), song(2, "b"), song(3, "c")]
        );
    }

    #[test]
    fn test_dequeue_removes_only_the_first_equal_entry() {
        let dir = TempDir::new().unwrap();
        let store = QueueStore::new(dir.path().join("queue.json"));
        store
            .replace(&[song(1, "a"), song(2, "b"), song(1, "a")])
            .unwrap();

        assert!(store.dequeue_one(&song(1, "a")).unwrap());
        assert_eq!(store.peek_all().unwrap(), vec![song(2, "b"), song(1, "a")]);
    }

    #[test]
    fn test_dequeue_requires_every_field_to_match() {
        let dir = TempDir::new().unwrap();
        let store = QueueStore::new(dir.path().join("queue.json"));
        store.replace(&[song(1, "a")]).unwrap();

        let mut retagged = song(1, "a");
        retagged.year = None;

        assert!(!store.dequeue_one(&retagged).unwrap());
        assert_eq!(store.peek_all().unwrap().len(), 1);
    }

    #[test]
    fn test_requeue_goes_to_the_tail() {
        let dir = TempDir::new().unwrap();
        let store = QueueStore::new(dir.path().join("queue.json"));
        store.replace(&[song(1, "a"), song(2, "b")]).unwrap();

        store.dequeue_one(&song(1, "a")).unwrap();
        store.enqueue(&[song(1, "a")]).unwrap();

        assert_eq!(store.peek_all().unwrap(), vec![song(2, "b"), song(1, "a")]);
    }

    #[test]
    fn test_missing_file_is_empty_but_corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let store = QueueStore::new(dir.path().join("queue.json"));
        assert!(store.peek_all().unwrap().is_empty());

        fs::write(store.path(), "[{\"id\": 1,").unwrap();
        assert!(store.peek_all().unwrap_err().is_transient());
    }
}
