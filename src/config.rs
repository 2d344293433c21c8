use crate::error::ConfigError;

/// Number of buckets a table starts with when no capacity is given.
pub const DEFAULT_INITIAL_CAPACITY: usize = 16;

/// Ratio of entries to buckets above which a table grows.
pub const DEFAULT_MAX_LOAD_FACTOR: f32 = 0.75;

/// Construction parameters for a [`HashTable`](crate::HashTable) or
/// [`HashMap`](crate::HashMap).
///
/// Invalid values are never clamped. [`Config::validate`] rejects them and the
/// fallible constructors pass its error through.
///
/// # Examples
///
/// ```rust
/// use chain_hash::config::Config;
///
/// let config = Config::default()
///     .with_initial_capacity(64)
///     .with_max_load_factor(0.5);
/// assert!(config.validate().is_ok());
///
/// assert!(Config::default().with_initial_capacity(0).validate().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    /// Number of buckets allocated at construction. Must be at least 1.
    pub initial_capacity: usize,
    /// Growth threshold for `len / bucket_count`. Must be in `(0, 1]`.
    pub max_load_factor: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
            max_load_factor: DEFAULT_MAX_LOAD_FACTOR,
        }
    }
}

impl Config {
    /// Sets the number of buckets allocated at construction.
    #[must_use]
    pub fn with_initial_capacity(mut self, initial_capacity: usize) -> Self {
        self.initial_capacity = initial_capacity;
        self
    }

    /// Sets the maximum load factor.
    #[must_use]
    pub fn with_max_load_factor(mut self, max_load_factor: f32) -> Self {
        self.max_load_factor = max_load_factor;
        self
    }

    /// Checks that the configuration describes a usable table.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroCapacity`] if `initial_capacity` is zero and
    /// [`ConfigError::InvalidLoadFactor`] if `max_load_factor` is NaN, not
    /// positive, or greater than one.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        // Written so that NaN fails the check.
        if !(self.max_load_factor > 0.0 && self.max_load_factor <= 1.0) {
            return Err(ConfigError::InvalidLoadFactor(self.max_load_factor));
        }
        Ok(())
    }
}
