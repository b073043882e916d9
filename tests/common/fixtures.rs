//! Test fixture creation for dataset archives

use anyhow::Result;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use zip::write::SimpleFileOptions;

/// Header row as shipped in the Kaggle `spotify_dataset.csv`.
pub const KAGGLE_HEADER: &str =
    "\"user_id\",\" \"\"artistname\"\"\",\" \"\"trackname\"\"\",\" \"\"playlistname\"\"\"";

/// Name of the CSV entry inside generated archives.
pub const CSV_ENTRY: &str = "spotify_dataset.csv";

/// Write a zip archive holding the given `(name, content)` entries.
pub fn write_archive(path: &Path, entries: &[(&str, &str)]) -> Result<()> {
    let mut writer = zip::ZipWriter::new(File::create(path)?);
    for (name, content) in entries {
        writer.start_file(*name, SimpleFileOptions::default())?;
        writer.write_all(content.as_bytes())?;
    }
    writer.finish()?;
    Ok(())
}

/// A Kaggle-shaped CSV with `playlists` playlists of `tracks_per_playlist`
/// distinct tracks each, all owned by one user per playlist.
pub fn generate_kaggle_csv(playlists: usize, tracks_per_playlist: usize) -> String {
    let mut csv = String::from(KAGGLE_HEADER);
    csv.push('\n');
    for p in 0..playlists {
        for t in 0..tracks_per_playlist {
            csv.push_str(&format!(
                "user{},Artist {},Track {}-{},Playlist {}\n",
                p % 2,
                t % 7,
                p,
                t,
                p
            ));
        }
    }
    csv
}
