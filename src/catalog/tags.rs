use lofty::file::{AudioFile, TaggedFileExt};
use lofty::prelude::Accessor;
use lofty::tag::ItemKey;
use std::path::Path;

use crate::errors::CatalogError;

pub const AUDIO_EXTENSIONS: [&str; 6] = ["mp3", "flac", "ogg", "wav", "m4a", "opus"];

/// Metadata read straight from an audio file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileTags {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub genre: Option<String>,
    pub year: Option<i32>,
    pub duration_secs: f64,
    pub lyrics: Option<String>,
}

impl FileTags {
    pub fn read(path: &Path) -> Result<Self, CatalogError> {
        let tagged = lofty::read_from_path(path).map_err(|source| CatalogError::Tags {
            path: path.to_path_buf(),
            source,
        })?;
        let duration_secs = tagged.properties().duration().as_secs_f64();

        // Try primary tag first, then first tag
        let Some(tag) = tagged.primary_tag().or_else(|| tagged.first_tag()) else {
            return Ok(Self {
                duration_secs,
                ..Self::default()
            });
        };

        let year = tag
            .get_string(&ItemKey::Year)
            .or_else(|| tag.get_string(&ItemKey::RecordingDate))
            .and_then(parse_year);

        Ok(Self {
            title: tag.title().map(|s| s.into_owned()),
            artist: tag.artist().map(|s| s.into_owned()),
            album: tag.album().map(|s| s.into_owned()),
            genre: tag.genre().map(|s| s.into_owned()),
            year,
            duration_secs,
            lyrics: tag.get_string(&ItemKey::Lyrics).map(|s| s.to_string()),
        })
    }
}

pub fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| AUDIO_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

// "2004", "2004-05-11"
fn parse_year(raw: &str) -> Option<i32> {
    raw.trim().get(..4)?.parse().ok()
}
