use thiserror::Error;

/// Raised if process statistics cannot be read from the platform.
///
/// These errors never leave the reporter callback. The affected memory
/// figures are reported as zero instead.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StatsError {
    /// Reading an OS interface failed
    #[error("failed to read process statistics")]
    Io(#[from] std::io::Error),
    /// A field was absent from the OS report
    #[error("missing field `{0}` in process status")]
    MissingField(&'static str),
    /// A field was present but could not be parsed
    #[error("invalid value {value:?} for field `{field}`")]
    InvalidField {
        /// Name of the offending field.
        field: &'static str,
        /// The raw value as reported by the OS.
        value: String,
    },
    /// The jemalloc control interface returned an error
    #[error("jemalloc statistics unavailable: {0}")]
    Jemalloc(String),
    /// Memory statistics are not implemented for this platform
    #[error("memory statistics are not supported on this platform")]
    Unsupported,
}
