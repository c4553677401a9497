//! Human-readable and JSON output
//!
//! In JSON mode stdout carries exactly one JSON document per command and
//! status lines are suppressed; errors go to stderr as `{"error": ...}`.

use console::{Style, style};
use serde::Serialize;

use super::OutputConfig;

#[derive(Debug, Clone)]
pub struct Formatter {
    config: OutputConfig,
}

/// Where a status line is written
#[derive(Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

impl Formatter {
    pub fn new(config: OutputConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OutputConfig {
        &self.config
    }

    pub fn is_json(&self) -> bool {
        self.config.json
    }

    /// Colors are off in JSON mode, with `--no-color`, or when stdout is not a terminal
    pub fn colors_enabled(&self) -> bool {
        !self.config.no_color && !self.config.json && console::colors_enabled()
    }

    pub fn success(&self, message: &str) {
        if self.config.quiet || self.config.json {
            return;
        }
        self.status("✓", Style::new().green(), message, Stream::Stdout);
    }

    /// Errors print even in quiet mode
    pub fn error(&self, message: &str) {
        if self.config.json {
            let body = serde_json::json!({ "error": message });
            eprintln!("{body}");
            return;
        }
        self.status("✗", Style::new().red(), message, Stream::Stderr);
    }

    pub fn warning(&self, message: &str) {
        if self.config.quiet || self.config.json {
            return;
        }
        self.status("⚠", Style::new().yellow(), message, Stream::Stderr);
    }

    pub fn json<T: Serialize>(&self, value: &T) {
        match serde_json::to_string_pretty(value) {
            Ok(json) => println!("{json}"),
            Err(e) => tracing::error!(error = %e, "failed to serialize output"),
        }
    }

    pub fn println(&self, message: &str) {
        if !self.config.quiet {
            println!("{message}");
        }
    }

    pub fn dim(&self, text: &str) -> String {
        if self.colors_enabled() {
            style(text).dim().to_string()
        } else {
            text.to_string()
        }
    }

    fn status(&self, glyph: &str, color: Style, message: &str, stream: Stream) {
        let line = if self.colors_enabled() {
            format!("{} {message}", color.apply_to(glyph))
        } else {
            format!("{glyph} {message}")
        };
        match stream {
            Stream::Stdout => println!("{line}"),
            Stream::Stderr => eprintln!("{line}"),
        }
    }
}
