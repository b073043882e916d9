//! Document shapes written to the `playlists` and `tracks` collections.

use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistDocument {
    pub playlist_id: String,
    pub name: String,
    pub owner: String,
    pub track_count: u64,
}

/// Popularity bucket derived from the 0-100 popularity score.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PopularityCategory {
    #[serde(rename = "Very Low")]
    VeryLow,
    Low,
    Medium,
    High,
    #[serde(rename = "Very High")]
    VeryHigh,
}

impl PopularityCategory {
    /// Buckets are `[0, 20]`, `(20, 40]`, `(40, 60]`, `(60, 80]`, `(80, 100]`.
    pub fn from_popularity(popularity: f64) -> Option<Self> {
        match popularity {
            p if !(0.0..=100.0).contains(&p) => None,
            p if p <= 20.0 => Some(PopularityCategory::VeryLow),
            p if p <= 40.0 => Some(PopularityCategory::Low),
            p if p <= 60.0 => Some(PopularityCategory::Medium),
            p if p <= 80.0 => Some(PopularityCategory::High),
            _ => Some(PopularityCategory::VeryHigh),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackDocument {
    pub track_id: String,
    pub playlist_id: String,
    pub title: String,
    pub artist: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub audio_features: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub popularity_category: Option<PopularityCategory>,
    /// Stored as a BSON date.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub added_at: Option<DateTime>,
}
