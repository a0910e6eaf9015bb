use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{debug, warn};

use crate::errors::StoreError;

/// Read a JSON document.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    let content = fs::read_to_string(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| StoreError::Malformed {
        path: path.to_path_buf(),
        source,
    })
}

/// Write a JSON document through a temp file in the same directory and an
/// atomic rename, so other processes never observe a partial file.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StoreError> {
    let io_err = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };
    let dir = path.parent().unwrap_or_else(|| Path::new("."));

    let tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
    {
        let mut writer = BufWriter::new(tmp.as_file());
        serde_json::to_writer_pretty(&mut writer, value).map_err(|source| {
            StoreError::Malformed {
                path: path.to_path_buf(),
                source,
            }
        })?;
        writer.flush().map_err(io_err)?;
    }
    tmp.persist(path).map_err(|source| StoreError::Persist {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

/// Last-known-good copy of a value that is re-read from disk while another
/// process may be rewriting it.
#[derive(Debug)]
pub struct Live<T> {
    label: &'static str,
    current: T,
}

impl<T: Clone + PartialEq + Debug> Live<T> {
    pub fn new(label: &'static str, initial: T) -> Self {
        Self {
            label,
            current: initial,
        }
    }

    /// Fold a fresh read into the cached value. A failed read keeps the
    /// previous value for this cycle.
    pub fn refresh(&mut self, fresh: Result<T, StoreError>) -> &T {
        match fresh {
            Ok(value) => {
                if value != self.current {
                    debug!("{} changed: {:?} -> {:?}", self.label, self.current, value);
                    self.current = value;
                }
            }
            Err(e) => warn!("Keeping previous {} for this cycle: {}", self.label, e),
        }
        &self.current
    }
}
