//! Reshapes cleaned rows into playlist and track documents.

mod columns;
mod models;

pub use columns::{ColumnMap, DedupMode, AUDIO_FEATURES};
pub use models::{PlaylistDocument, PopularityCategory, TrackDocument};

use crate::error::EtlError;
use crate::table::{Cell, Row, Table};
use mongodb::bson::DateTime;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use tracing::info;

/// Length of derived identifiers, in hex characters.
const DERIVED_ID_LEN: usize = 24;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MappedRecords {
    pub playlists: Vec<PlaylistDocument>,
    pub tracks: Vec<TrackDocument>,
}

/// Column positions resolved against a concrete table.
struct ResolvedColumns {
    owner: usize,
    playlist_name: usize,
    artist: usize,
    title: usize,
    playlist_id: Option<usize>,
    track_id: Option<usize>,
    album: Option<usize>,
    added_at: Option<usize>,
    features: Vec<(String, usize)>,
}

impl ResolvedColumns {
    fn resolve(table: &Table, columns: &ColumnMap) -> Result<Self, EtlError> {
        let required = |name: &str| {
            table.column_index(name).ok_or_else(|| {
                EtlError::mapping(format!(
                    "column '{}' not found, available columns: {:?}",
                    name, table.headers
                ))
            })
        };

        Ok(Self {
            owner: required(&columns.owner)?,
            playlist_name: required(&columns.playlist_name)?,
            artist: required(&columns.artist)?,
            title: required(&columns.title)?,
            playlist_id: table.column_index(&columns.playlist_id),
            track_id: table.column_index(&columns.track_id),
            album: table.column_index(&columns.album),
            added_at: table.column_index(&columns.added_at),
            features: AUDIO_FEATURES
                .iter()
                .filter_map(|name| table.column_index(name).map(|i| (name.to_string(), i)))
                .collect(),
        })
    }
}

/// Derive a stable identifier from the given parts.
pub fn derive_id(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            hasher.update([0x1f]);
        }
        hasher.update(part.as_bytes());
    }
    let digest = format!("{:x}", hasher.finalize());
    digest[..DERIVED_ID_LEN].to_string()
}

/// Group rows by playlist and emit one track document per row.
///
/// Playlists come out in the order they are first seen.
pub fn map_records(table: &Table, columns: &ColumnMap) -> Result<MappedRecords, EtlError> {
    let cols = ResolvedColumns::resolve(table, columns)?;

    let mut playlists: Vec<PlaylistDocument> = Vec::new();
    let mut playlist_index: HashMap<String, usize> = HashMap::new();
    let mut tracks = Vec::with_capacity(table.len());

    for (i, row) in table.rows.iter().enumerate() {
        let row_number = i + 1;
        let field = |index: usize, what: &str| {
            cell_text(&row[index])
                .ok_or_else(|| EtlError::mapping(format!("row {}: missing {}", row_number, what)))
        };

        let owner = field(cols.owner, "owner")?;
        let name = field(cols.playlist_name, "playlist name")?;
        let artist = field(cols.artist, "artist")?;
        let title = field(cols.title, "title")?;

        let playlist_id = match cols.playlist_id.and_then(|i| cell_text(&row[i])) {
            Some(id) => id,
            None => derive_id(&[owner.as_str(), name.as_str()]),
        };

        let track_id = match cols.track_id.and_then(|i| cell_text(&row[i])) {
            Some(id) => id,
            None => derive_id(&[artist.as_str(), title.as_str()]),
        };

        match playlist_index.get(&playlist_id) {
            Some(&index) => playlists[index].track_count += 1,
            None => {
                playlist_index.insert(playlist_id.clone(), playlists.len());
                playlists.push(PlaylistDocument {
                    playlist_id: playlist_id.clone(),
                    name,
                    owner,
                    track_count: 1,
                });
            }
        }

        let audio_features = features(row, &cols.features);
        let popularity_category = audio_features
            .get("popularity")
            .and_then(|p| PopularityCategory::from_popularity(*p));

        tracks.push(TrackDocument {
            track_id,
            playlist_id,
            title,
            artist,
            album: cols.album.and_then(|i| cell_text(&row[i])),
            audio_features,
            popularity_category,
            added_at: cols
                .added_at
                .and_then(|i| row[i].as_timestamp())
                .map(|t| DateTime::from_millis(t.timestamp_millis())),
        });
    }

    info!(
        "Mapped {} rows into {} playlists and {} tracks",
        table.len(),
        playlists.len(),
        tracks.len()
    );
    Ok(MappedRecords { playlists, tracks })
}

fn cell_text(cell: &Cell) -> Option<String> {
    match cell {
        Cell::Text(s) => Some(s.clone()),
        Cell::Number(n) => Some(n.to_string()),
        Cell::Timestamp(t) => Some(t.to_rfc3339()),
        Cell::Null => None,
    }
}

fn features(row: &Row, columns: &[(String, usize)]) -> BTreeMap<String, f64> {
    columns
        .iter()
        .filter_map(|(name, index)| row[*index].as_number().map(|n| (name.clone(), n)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cleaning::{clean, default_ranges};
    use std::collections::HashSet;

    fn table(headers: &[&str], rows: &[&[&str]]) -> Table {
        Table::with_rows(
            headers.iter().map(|h| h.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|v| Cell::from_field(v)).collect())
                .collect(),
        )
    }

    fn kaggle_table() -> Table {
        table(
            &["user_id", "artistname", "trackname", "playlistname"],
            &[
                &["u1", "Queen", "Bohemian Rhapsody", "Rock"],
                &["u1", "AC/DC", "Thunderstruck", "Rock"],
                &["u1", "Miles Davis", "So What", "Jazz"],
                &["u2", "Queen", "Bohemian Rhapsody", "Rock"],
            ],
        )
    }

    #[test]
    fn test_groups_rows_by_playlist() {
        let mapped = map_records(&kaggle_table(), &ColumnMap::default()).unwrap();

        assert_eq!(mapped.playlists.len(), 3);
        assert_eq!(mapped.tracks.len(), 4);
        assert_eq!(mapped.playlists[0].name, "Rock");
        assert_eq!(mapped.playlists[0].owner, "u1");
        assert_eq!(mapped.playlists[0].track_count, 2);
        assert_eq!(mapped.playlists[1].track_count, 1);
        // Punctuation in text values is kept as is
        assert_eq!(mapped.tracks[1].artist, "AC/DC");
        // Same playlist name, different owner: different playlist
        assert_ne!(mapped.playlists[0].playlist_id, mapped.playlists[2].playlist_id);
    }

    #[test]
    fn test_track_references_are_complete() {
        let mapped = map_records(&kaggle_table(), &ColumnMap::default()).unwrap();
        let ids: HashSet<&str> = mapped
            .playlists
            .iter()
            .map(|p| p.playlist_id.as_str())
            .collect();
        assert!(mapped
            .tracks
            .iter()
            .all(|t| ids.contains(t.playlist_id.as_str())));

        let total: u64 = mapped.playlists.iter().map(|p| p.track_count).sum();
        assert_eq!(total as usize, mapped.tracks.len());
    }

    #[test]
    fn test_derived_ids_are_stable() {
        let a = derive_id(&["u1", "Rock"]);
        assert_eq!(a.len(), 24);
        assert_eq!(a, derive_id(&["u1", "Rock"]));
        assert_ne!(a, derive_id(&["u1R", "ock"]));

        let mapped = map_records(&kaggle_table(), &ColumnMap::default()).unwrap();
        // Same song in two playlists keeps its track id
        assert_eq!(mapped.tracks[0].track_id, mapped.tracks[3].track_id);
    }

    #[test]
    fn test_explicit_ids_and_features_are_used() {
        let t = table(
            &[
                "playlist_id",
                "track_id",
                "user_id",
                "artistname",
                "trackname",
                "playlistname",
                "album_name",
                "popularity",
                "tempo",
                "added_at",
            ],
            &[&[
                "pl-1",
                "tr-1",
                "u1",
                "Queen",
                "Bohemian Rhapsody",
                "Rock",
                "A Night at the Opera",
                "85",
                "",
                "2020-05-01",
            ]],
        );
        let columns = ColumnMap::default();
        let rules = columns.cleaning_rules(DedupMode::NaturalKey, BTreeMap::new(), default_ranges());
        let (cleaned, _) = clean(t, &rules);

        let mapped = map_records(&cleaned, &columns).unwrap();
        let track = &mapped.tracks[0];
        assert_eq!(mapped.playlists[0].playlist_id, "pl-1");
        assert_eq!(track.track_id, "tr-1");
        assert_eq!(track.album.as_deref(), Some("A Night at the Opera"));
        assert_eq!(track.audio_features.get("popularity"), Some(&85.0));
        assert!(!track.audio_features.contains_key("tempo"));
        assert_eq!(track.popularity_category, Some(PopularityCategory::VeryHigh));
        // 2020-05-01T00:00:00Z
        assert_eq!(
            track.added_at.map(|d| d.timestamp_millis()),
            Some(1_588_291_200_000)
        );
    }

    #[test]
    fn test_empty_playlist_id_falls_back_to_derived_id() {
        let t = table(
            &["playlist_id", "user_id", "artistname", "trackname", "playlistname"],
            &[&["", "u1", "Queen", "Bohemian Rhapsody", "Rock"]],
        );

        let mapped = map_records(&t, &ColumnMap::default()).unwrap();

        assert_eq!(mapped.playlists[0].playlist_id, derive_id(&["u1", "Rock"]));
        assert_eq!(mapped.tracks[0].playlist_id, mapped.playlists[0].playlist_id);
    }

    #[test]
    fn test_missing_column_is_mapping_error() {
        let t = table(&["user_id", "artistname", "trackname"], &[&["u1", "a", "t"]]);
        let err = map_records(&t, &ColumnMap::default()).unwrap_err();
        assert_eq!(err.kind(), "MappingError");
        assert!(err.to_string().contains("playlistname"));
    }

    #[test]
    fn test_null_playlist_name_is_mapping_error() {
        let t = table(
            &["user_id", "artistname", "trackname", "playlistname"],
            &[&["u1", "a", "t", "p"], &["u1", "a", "t", ""]],
        );
        let err = map_records(&t, &ColumnMap::default()).unwrap_err();
        assert!(err.to_string().contains("row 2"));
    }
}
