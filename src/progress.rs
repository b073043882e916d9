use indicatif::{ProgressBar, ProgressStyle};

const BAR_TEMPLATE: &str = "[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta} @ {per_sec}) {msg}";
const BYTES_TEMPLATE: &str =
    "[{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta} @ {bytes_per_sec}) {msg}";

/// A progress bar over `len` items, hidden when `enabled` is false.
pub fn items_bar(len: u64, enabled: bool, message: impl Into<String>) -> ProgressBar {
    styled_bar(len, enabled, BAR_TEMPLATE, message.into())
}

/// A progress bar over `len` bytes, hidden when `enabled` is false.
pub fn bytes_bar(len: u64, enabled: bool, message: impl Into<String>) -> ProgressBar {
    styled_bar(len, enabled, BYTES_TEMPLATE, message.into())
}

fn styled_bar(len: u64, enabled: bool, template: &str, message: String) -> ProgressBar {
    if !enabled {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(len);
    let style = ProgressStyle::default_bar()
        .template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
    bar.set_style(style);
    bar.set_message(message);
    bar
}
