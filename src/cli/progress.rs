//! CLI-specific progress handling for butterfly-net
//!
//! Shows one tick per Overpass sub-region request.

use indicatif::{ProgressBar, ProgressStyle};

/// Creates a progress bar counting sub-region requests
pub fn create_progress_bar(total_regions: u64) -> ProgressBar {
    let pb = ProgressBar::new(total_regions);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} regions ({percent}%) ETA: {eta}")
            .expect("Failed to create progress style")
            .progress_chars("#>-"),
    );
    pb
}

/// Progress manager for multi-region extractions
pub struct ProgressManager {
    pub pb: ProgressBar,
}

impl ProgressManager {
    /// Create a new progress manager
    pub fn new(total_regions: u64, message: &str) -> Self {
        let pb = create_progress_bar(total_regions);

        eprintln!("{message}");

        Self { pb }
    }

    /// Callback suitable for `QueryOptions::progress`
    pub fn callback(&self) -> impl Fn(usize, usize) + Send + Sync + 'static {
        let pb = self.pb.clone();
        move |completed, total| {
            if pb.length().unwrap_or(0) != total as u64 {
                pb.set_length(total as u64);
            }
            pb.set_position(completed as u64);
            if completed >= total {
                pb.finish_with_message("done");
            }
        }
    }
}
