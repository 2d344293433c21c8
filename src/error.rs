use thiserror::Error;

/// Reasons a [`Config`](crate::config::Config) can be rejected when building a
/// table or map.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum ConfigError {
    /// The table must start with at least one bucket.
    #[error("initial capacity must be at least 1 bucket")]
    ZeroCapacity,
    /// The maximum load factor must lie in `(0, 1]`.
    #[error("max load factor must be in (0, 1], got {0}")]
    InvalidLoadFactor(f32),
}
