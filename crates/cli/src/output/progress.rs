//! Progress bars for uploads
//!
//! The bar is fed through a [`ProgressListener`], so it advances as bytes
//! are read by the ranged readers of every part.

use std::sync::Arc;

use bz_core::ProgressListener;
use indicatif::ProgressStyle;

use super::OutputConfig;

const TEMPLATE: &str =
    "{spinner:.green} [{bar:40.cyan/blue}] {bytes}/{total_bytes} {bytes_per_sec} ({eta})";

/// Progress bar wrapper
///
/// In quiet, JSON or `--no-progress` mode nothing is drawn.
#[derive(Debug)]
pub struct ProgressBar {
    bar: Option<indicatif::ProgressBar>,
}

impl ProgressBar {
    /// A byte progress bar for `total` bytes
    pub fn new(config: &OutputConfig, total: u64) -> Self {
        let bar = if config.quiet || config.json || config.no_progress {
            None
        } else {
            let bar = indicatif::ProgressBar::new(total);
            let style = ProgressStyle::default_bar()
                .template(TEMPLATE)
                .map(|style| style.progress_chars("#>-"))
                .unwrap_or_else(|_| ProgressStyle::default_bar());
            bar.set_style(style);
            Some(bar)
        };

        Self { bar }
    }

    /// Listener that advances this bar; `None` when nothing is drawn
    pub fn listener(&self) -> Option<ProgressListener> {
        let bar = self.bar.clone()?;
        Some(Arc::new(move |bytes: u64| bar.inc(bytes)))
    }

    pub fn set_message(&self, message: &str) {
        if let Some(bar) = &self.bar {
            bar.set_message(message.to_string());
        }
    }

    pub fn finish_and_clear(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }

    pub fn is_visible(&self) -> bool {
        self.bar.is_some()
    }
}
