//!
//! src/types.rs  Andrew Belles  Oct 2nd, 2025
//!
//! Domain types shared between the history loader, the catalog lookup
//! and the report. Wire types for the Spotify responses live here too.
//!

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

pub const MS_PER_MINUTE: i64 = 60_000;

/// One entry of a streaming history export exactly as it sits on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackRecord {
    pub end_time: String,
    pub artist_name: String,
    pub track_name: String,
    pub ms_played: i64
}

/// A cleaned playback record with its derived columns
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Play {
    pub end_time: String,
    pub artist_name: String,
    pub track_name: String,
    pub ms_played: i64,
    pub play_date: NaiveDateTime,
    pub min_played: i64
}

impl Play {
    pub fn from_record(record: PlaybackRecord, play_date: NaiveDateTime) -> Self {
        let min_played = record.ms_played.div_euclid(MS_PER_MINUTE);
        Self {
            end_time: record.end_time,
            artist_name: record.artist_name,
            track_name: record.track_name,
            ms_played: record.ms_played,
            play_date,
            min_played
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtistImage {
    #[serde(default)]
    pub url: Option<String>
}

///
/// Artist as returned by the catalog search. Every field may be absent,
/// an empty value stands for "no match".
///
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtistMetadata {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub images: Vec<ArtistImage>,
    #[serde(default)]
    pub genres: Vec<String>
}

impl ArtistMetadata {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.images.is_empty() && self.genres.is_empty()
    }

    /// Url of the first image, the one the catalog ranks highest
    pub fn image_url(&self) -> Option<&str> {
        self.images.first().and_then(|image| image.url.as_deref())
    }
}

//
// Spotify wire types
//

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArtistPage {
    #[serde(default)]
    pub items: Vec<ArtistMetadata>
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub artists: Option<ArtistPage>
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(ms_played: i64) -> PlaybackRecord {
        PlaybackRecord {
            end_time: "2024-03-01 10:00".to_string(),
            artist_name: "Rosalía".to_string(),
            track_name: "DESPECHÁ".to_string(),
            ms_played
        }
    }

    #[test]
    fn min_played_is_floor_of_minutes() {
        let date = NaiveDateTime::default();
        for (ms, minutes) in [(0, 0), (59_999, 0), (60_000, 1), (185_000, 3)] {
            assert_eq!(Play::from_record(record(ms), date).min_played, minutes);
        }
        assert_eq!(Play::from_record(record(-1), date).min_played, -1);
    }

    #[test]
    fn artist_with_missing_fields_deserializes_empty() {
        let artist: ArtistMetadata = serde_json::from_str("{}").unwrap();
        assert!(artist.is_empty());
        assert_eq!(artist.image_url(), None);

        let artist: ArtistMetadata = serde_json::from_str(
            r#"{"name": "Björk", "images": [{}, {"url": "https://i/2"}]}"#
        ).unwrap();
        assert!(!artist.is_empty());
        assert_eq!(artist.image_url(), None);
    }

    #[test]
    fn search_response_without_artists_is_empty() {
        let body: SearchResponse = serde_json::from_str(r#"{"tracks": {}}"#).unwrap();
        assert!(body.artists.is_none());
    }
}
