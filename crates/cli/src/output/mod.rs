//! Output formatting for human-readable and JSON modes

mod formatter;

pub use formatter::{Formatter, Theme};

/// Output settings shared by every command
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputConfig {
    /// Emit strict JSON on stdout, errors as JSON on stderr
    pub json: bool,
    pub no_color: bool,
    /// Suppress everything but errors
    pub quiet: bool,
}
