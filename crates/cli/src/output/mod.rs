//! Terminal output: status lines, JSON documents and transfer progress

mod formatter;
mod progress;

pub use formatter::Formatter;
pub use progress::ProgressBar;

/// Output switches merged from global flags and config defaults
#[derive(Debug, Clone, Default)]
pub struct OutputConfig {
    pub json: bool,
    pub no_color: bool,
    /// Hide the upload progress bar
    pub no_progress: bool,
    /// Only errors are printed
    pub quiet: bool,
}
