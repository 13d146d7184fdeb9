//! Terminal progress bar for packaging runs.

use indicatif::{ProgressBar, ProgressStyle};
use kmztile::packaging::{PackagedTile, ProgressReporter};

/// Progress bar driven by packaging events.
///
/// Hidden when stderr is not a terminal.
pub struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    pub fn new() -> Self {
        let bar = if atty::is(atty::Stream::Stderr) {
            let bar = ProgressBar::new(0);
            if let Ok(style) = ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40}] {pos}/{len} {msg}")
            {
                bar.set_style(style);
            }
            bar
        } else {
            ProgressBar::hidden()
        };
        Self { bar }
    }

    /// Removes the bar from the terminal.
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressReporter for BarProgress {
    fn on_layout(&self, total: usize) {
        self.bar.set_length(total as u64);
    }

    fn on_packaged(&self, tile: &PackagedTile) {
        self.bar.set_message(tile.descriptor.package_name.clone());
        self.bar.inc(1);
    }
}
