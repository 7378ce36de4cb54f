use serde::{Deserialize, Serialize};
use std::fmt;

/// Catalog-assigned track identifier. Opaque; only compared for equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(String);

impl TrackId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TrackId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for TrackId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A playable item handed to the controller by the catalog.
///
/// The media url is opaque to everything except the audio device binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    pub name: String,
    pub artist: String,
    #[serde(alias = "file_url")]
    pub media_url: String,
}

impl Track {
    pub fn new(
        id: impl Into<TrackId>,
        name: impl Into<String>,
        artist: impl Into<String>,
        media_url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            artist: artist.into(),
            media_url: media_url.into(),
        }
    }

    pub fn display_title(&self) -> &str {
        if self.name.trim().is_empty() {
            "Unknown"
        } else {
            &self.name
        }
    }

    pub fn display_artist(&self) -> &str {
        if self.artist.trim().is_empty() {
            "Unknown Artist"
        } else {
            &self.artist
        }
    }

    /// Badge letter shown next to the now-playing title.
    pub fn initial(&self) -> char {
        self.display_title()
            .chars()
            .next()
            .and_then(|c| c.to_uppercase().next())
            .unwrap_or('?')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_fallbacks() {
        let track = Track::new("t1", "  ", "", "file:///tmp/a.mp3");
        assert_eq!(track.display_title(), "Unknown");
        assert_eq!(track.display_artist(), "Unknown Artist");
        assert_eq!(track.initial(), 'U');

        let track = Track::new("t2", "échos", "Nils", "file:///tmp/b.mp3");
        assert_eq!(track.initial(), 'É');
    }

    #[test]
    fn test_deserialize_accepts_file_url() {
        let json = r#"{"id":"s1","name":"Song","artist":"Band","file_url":"https://cdn/s1.mp3"}"#;
        let track: Track = serde_json::from_str(json).unwrap();
        assert_eq!(track.id, TrackId::new("s1"));
        assert_eq!(track.media_url, "https://cdn/s1.mp3");
    }
}
