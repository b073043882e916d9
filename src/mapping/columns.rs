use crate::cleaning::{CleaningRules, DedupKey, ValueRange};
use std::collections::BTreeMap;

/// Audio feature columns carried onto track documents when present.
pub const AUDIO_FEATURES: [&str; 11] = [
    "duration_ms",
    "popularity",
    "danceability",
    "energy",
    "loudness",
    "speechiness",
    "acousticness",
    "instrumentalness",
    "liveness",
    "valence",
    "tempo",
];

/// Which source column holds which logical field.
///
/// Defaults match the Kaggle `spotify_dataset.csv` export, where only the
/// four required columns exist. Optional columns are used when present.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnMap {
    pub owner: String,
    pub playlist_name: String,
    pub artist: String,
    pub title: String,
    pub playlist_id: String,
    pub track_id: String,
    pub album: String,
    pub added_at: String,
}

impl Default for ColumnMap {
    fn default() -> Self {
        Self {
            owner: "user_id".to_string(),
            playlist_name: "playlistname".to_string(),
            artist: "artistname".to_string(),
            title: "trackname".to_string(),
            playlist_id: "playlist_id".to_string(),
            track_id: "track_id".to_string(),
            album: "album_name".to_string(),
            added_at: "added_at".to_string(),
        }
    }
}

/// Dedup strategy as named in configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DedupMode {
    #[default]
    NaturalKey,
    FullRow,
}

impl DedupMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "natural_key" => Some(DedupMode::NaturalKey),
            "full_row" => Some(DedupMode::FullRow),
            _ => None,
        }
    }
}

impl ColumnMap {
    /// Columns every row must have.
    pub fn required(&self) -> Vec<String> {
        vec![
            self.owner.clone(),
            self.playlist_name.clone(),
            self.artist.clone(),
            self.title.clone(),
        ]
    }

    /// Columns identifying a playlist entry: owner, playlist, artist, title.
    pub fn natural_key(&self) -> Vec<String> {
        self.required()
    }

    /// Build the cleaning rules for this column layout.
    pub fn cleaning_rules(
        &self,
        dedup: DedupMode,
        imputations: BTreeMap<String, String>,
        ranges: BTreeMap<String, ValueRange>,
    ) -> CleaningRules {
        let dedup = match dedup {
            DedupMode::NaturalKey => DedupKey::Columns(self.natural_key()),
            DedupMode::FullRow => DedupKey::FullRow,
        };
        CleaningRules {
            required: self.required(),
            imputations,
            dedup,
            ranges,
            numeric_columns: AUDIO_FEATURES.iter().map(|c| c.to_string()).collect(),
            timestamp_columns: vec![self.added_at.clone()],
        }
    }
}
