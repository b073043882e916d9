//! End-to-end runs of the whole pipeline against a local archive and an
//! in-memory document store.

mod common;

use common::{generate_kaggle_csv, settings, TestWorkspace, KAGGLE_HEADER};
use mongodb::bson;
use spotify_playlists_etl::mapping::{PlaylistDocument, PopularityCategory, TrackDocument};
use spotify_playlists_etl::store::WritePolicy;
use spotify_playlists_etl::table::BadRowPolicy;
use spotify_playlists_etl::{DocumentStore, MemoryDocumentStore, PipelineSettings, PipelineState};
use std::collections::HashSet;
use std::sync::Arc;

async fn playlists(store: &MemoryDocumentStore) -> Vec<PlaylistDocument> {
    store
        .documents("playlists")
        .await
        .into_iter()
        .map(|doc| bson::from_document(doc).unwrap())
        .collect()
}

async fn tracks(store: &MemoryDocumentStore) -> Vec<TrackDocument> {
    store
        .documents("tracks")
        .await
        .into_iter()
        .map(|doc| bson::from_document(doc).unwrap())
        .collect()
}

#[tokio::test]
async fn test_full_run_loads_every_playlist_and_track() {
    let mut csv = generate_kaggle_csv(3, 100);
    // Exact duplicates of existing rows and rows missing a required field
    csv.push_str("user0,Artist 0,Track 0-0,Playlist 0\n");
    csv.push_str("user1,Artist 1,Track 1-1,Playlist 1\n");
    csv.push_str("user0,,Nameless,Playlist 0\n");
    csv.push_str("user0,Artist 3,,Playlist 0\n");
    let workspace = TestWorkspace::with_csv(&csv);
    let store = Arc::new(MemoryDocumentStore::new());

    let run = workspace.pipeline(store.clone(), settings(100)).run().await;

    assert_eq!(run.final_state(), PipelineState::Done);
    let summary = run.result.unwrap();
    assert!(summary.downloaded);
    assert_eq!(summary.load.rows, 304);
    assert_eq!(summary.cleaning.output_rows, 300);
    assert_eq!(summary.playlists.inserted, 3);
    assert_eq!(summary.tracks.inserted, 300);
    assert_eq!(store.chunk_sizes("tracks").await, vec![100, 100, 100]);
    assert_eq!(store.chunk_sizes("playlists").await, vec![3]);

    let playlists = playlists(&store).await;
    let tracks = tracks(&store).await;
    assert_eq!(
        playlists.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(),
        vec!["Playlist 0", "Playlist 1", "Playlist 2"]
    );
    assert!(playlists.iter().all(|p| p.track_count == 100));

    // Every track points at a written playlist
    let ids: HashSet<&str> = playlists.iter().map(|p| p.playlist_id.as_str()).collect();
    assert!(tracks.iter().all(|t| ids.contains(t.playlist_id.as_str())));
}

#[tokio::test]
async fn test_rerun_with_replace_policy_is_idempotent() {
    let workspace = TestWorkspace::with_csv(&generate_kaggle_csv(2, 30));
    let store = Arc::new(MemoryDocumentStore::new());

    let first = workspace.pipeline(store.clone(), settings(25)).run().await;
    let first = first.result.unwrap();
    let second = workspace.pipeline(store.clone(), settings(25)).run().await;
    let second = second.result.unwrap();

    assert!(first.downloaded);
    assert!(!second.downloaded);
    assert_eq!(first.playlists.total, 2);
    assert_eq!(second.playlists.total, 2);
    assert_eq!(first.tracks.total, 60);
    assert_eq!(second.tracks.total, 60);
    assert_eq!(store.count_documents("tracks").await.unwrap(), 60);
}

#[tokio::test]
async fn test_rerun_with_append_policy_accumulates() {
    let workspace = TestWorkspace::with_csv(&generate_kaggle_csv(2, 10));
    let store = Arc::new(MemoryDocumentStore::new());
    let append = PipelineSettings {
        write_policy: WritePolicy::Append,
        ..settings(100)
    };

    workspace
        .pipeline(store.clone(), append.clone())
        .run()
        .await
        .result
        .unwrap();
    let second = workspace
        .pipeline(store.clone(), append)
        .run()
        .await
        .result
        .unwrap();

    assert_eq!(second.tracks.inserted, 20);
    assert_eq!(second.tracks.total, 40);
}

#[tokio::test]
async fn test_write_failure_on_second_chunk_keeps_first() {
    let workspace = TestWorkspace::with_csv(&generate_kaggle_csv(1, 250));
    let store = Arc::new(MemoryDocumentStore::failing_on("tracks", 2));

    let run = workspace.pipeline(store.clone(), settings(100)).run().await;

    assert_eq!(run.final_state(), PipelineState::Failed);
    let err = run.result.unwrap_err();
    assert_eq!(err.kind(), "WriteError");
    assert_eq!(err.chunk_index(), Some(2));
    assert!(err.to_string().contains("'tracks'"));

    // Playlists were loaded in full before tracks started
    assert_eq!(store.count_documents("playlists").await.unwrap(), 1);
    assert_eq!(store.count_documents("tracks").await.unwrap(), 100);
    assert_eq!(store.insert_calls("tracks").await, 2);
}

#[tokio::test]
async fn test_chunk_failing_midway_is_not_half_committed() {
    let workspace = TestWorkspace::with_csv(&generate_kaggle_csv(1, 250));
    let store = Arc::new(MemoryDocumentStore::failing_mid_chunk("tracks", 2, 50));

    let run = workspace.pipeline(store.clone(), settings(100)).run().await;

    let err = run.result.unwrap_err();
    assert_eq!(err.kind(), "WriteError");
    assert_eq!(err.chunk_index(), Some(2));
    // Chunk 1 only, none of the 50 documents chunk 2 got through
    assert_eq!(store.count_documents("tracks").await.unwrap(), 100);
    assert_eq!(store.chunk_sizes("tracks").await, vec![100]);
}

#[tokio::test]
async fn test_unreachable_store_fails_before_writing() {
    let workspace = TestWorkspace::with_csv(&generate_kaggle_csv(1, 5));
    let store = Arc::new(MemoryDocumentStore::unreachable());

    let run = workspace.pipeline(store.clone(), settings(100)).run().await;

    let err = run.result.unwrap_err();
    assert_eq!(err.kind(), "DatabaseError");
    assert_eq!(store.insert_calls("playlists").await, 0);
    assert_eq!(store.insert_calls("tracks").await, 0);
}

#[tokio::test]
async fn test_malformed_row_fails_by_default() {
    let csv = format!("{}\nu1,A,T,P\nu1,A,T2,P,extra\n", KAGGLE_HEADER);
    let workspace = TestWorkspace::with_csv(&csv);
    let store = Arc::new(MemoryDocumentStore::new());

    let run = workspace.pipeline(store.clone(), settings(100)).run().await;

    assert!(!run.history.contains(&PipelineState::Cleaning));
    let err = run.result.unwrap_err();
    assert_eq!(err.kind(), "ParseError");
    assert!(err.to_string().contains("line 3"));
    assert_eq!(store.insert_calls("tracks").await, 0);
}

#[tokio::test]
async fn test_malformed_row_skipped_with_skip_policy() {
    let csv = format!("{}\nu1,A,T,P\nu1,A,T2,P,extra\nu1,B,T3,P\n", KAGGLE_HEADER);
    let workspace = TestWorkspace::with_csv(&csv);
    let store = Arc::new(MemoryDocumentStore::new());
    let skip = PipelineSettings {
        on_bad_rows: BadRowPolicy::Skip,
        ..settings(100)
    };

    let summary = workspace.pipeline(store.clone(), skip).run().await.result.unwrap();

    assert_eq!(summary.load.skipped_rows, 1);
    assert_eq!(summary.tracks.inserted, 2);
}

#[tokio::test]
async fn test_optional_columns_and_audio_features() {
    let csv = "user_id,playlistname,artistname,trackname,playlist_id,track_id,album_name,added_at,popularity,danceability\n\
        u1,Mix,A,T1,pl-1,tr-1,Alb,2021-03-04,85,0.5\n\
        u1,Mix,B,T2,pl-1,tr-2,,2021-03-05 10:00:00,15,1.7\n\
        u1,Mix,C,T3,pl-1,tr-3,,not-a-date,50,0.2\n\
        u2,Other,D,T4,pl-2,tr-4,,,,\n";
    let workspace = TestWorkspace::with_csv(csv);
    let store = Arc::new(MemoryDocumentStore::new());

    let summary = workspace
        .pipeline(store.clone(), settings(100))
        .run()
        .await
        .result
        .unwrap();

    // Row 2 has danceability out of range, row 3 an unparseable date
    assert_eq!(summary.cleaning.output_rows, 2);

    let tracks = tracks(&store).await;
    assert_eq!(tracks.len(), 2);
    let first = &tracks[0];
    assert_eq!(first.track_id, "tr-1");
    assert_eq!(first.playlist_id, "pl-1");
    assert_eq!(first.album.as_deref(), Some("Alb"));
    // 2021-03-04T00:00:00Z, written as a date rather than a string
    assert_eq!(
        first.added_at.map(|d| d.timestamp_millis()),
        Some(1_614_816_000_000)
    );
    let raw = &store.documents("tracks").await[0];
    assert!(matches!(raw.get("added_at"), Some(bson::Bson::DateTime(_))));
    assert_eq!(first.audio_features["popularity"], 85.0);
    assert_eq!(first.popularity_category, Some(PopularityCategory::VeryHigh));

    let second = &tracks[1];
    assert_eq!(second.playlist_id, "pl-2");
    assert!(second.audio_features.is_empty());
    assert_eq!(second.popularity_category, None);
    assert_eq!(second.added_at, None);

    let playlists = playlists(&store).await;
    assert_eq!(
        playlists.iter().map(|p| p.playlist_id.as_str()).collect::<Vec<_>>(),
        vec!["pl-1", "pl-2"]
    );
}

#[tokio::test]
async fn test_archive_without_csv_is_parse_error() {
    let workspace = TestWorkspace::with_entries(&[("README.md", "nothing here")]);
    let store = Arc::new(MemoryDocumentStore::new());

    let run = workspace.pipeline(store, settings(100)).run().await;

    assert_eq!(run.result.unwrap_err().kind(), "ParseError");
}
