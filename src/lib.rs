#![warn(missing_docs)]
#![doc = include_str!("../README.md")]
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

/// Construction parameters shared by the table and the map.
pub mod config;

/// Errors reported when a configuration is rejected.
pub mod error;

/// A HashMap implementation using separate chaining.
///
/// This module provides a `HashMap` that wraps the `HashTable` and provides
/// a standard key-value map interface with configurable hashers.
pub mod hash_map;

/// The raw separate-chaining table underneath [`HashMap`].
///
/// Callers provide hashes and equality predicates directly, which makes it
/// usable for values whose key is derived rather than stored.
pub mod hash_table;

pub use config::Config;
pub use error::ConfigError;
pub use hash_map::Entry;
pub use hash_map::HashMap;
pub use hash_table::HashTable;

/// The map under the name used throughout the crate documentation.
pub type ChainedHashMap<K, V, S = DefaultHashBuilder> = HashMap<K, V, S>;

cfg_if::cfg_if! {
    if #[cfg(feature = "foldhash")] {
        /// Hash builder used when none is supplied.
        pub type DefaultHashBuilder = foldhash::fast::RandomState;
    } else if #[cfg(feature = "std")] {
        /// Hash builder used when none is supplied.
        pub type DefaultHashBuilder = std::hash::RandomState;
    } else {
        /// Placeholder hash builder for builds with neither `foldhash` nor
        /// `std`. It has no values, so maps in such builds are constructed
        /// with an explicit hasher via [`HashMap::with_hasher`] and friends.
        #[derive(Debug, Clone, Copy)]
        pub enum DefaultHashBuilder {}

        /// Hasher type of [`DefaultHashBuilder`]; equally uninhabited.
        #[derive(Debug, Clone, Copy)]
        pub enum NoHasher {}

        impl core::hash::Hasher for NoHasher {
            fn finish(&self) -> u64 {
                match *self {}
            }

            fn write(&mut self, _bytes: &[u8]) {
                match *self {}
            }
        }

        impl core::hash::BuildHasher for DefaultHashBuilder {
            type Hasher = NoHasher;

            fn build_hasher(&self) -> Self::Hasher {
                match *self {}
            }
        }
    }
}
