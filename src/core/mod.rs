//! Core firewall management functionality
//!
//! This module contains the types and logic for reading and changing Windows
//! Firewall rules and per-profile settings. It provides:
//!
//! - [`alias`]: Human-readable aliases for directions, actions, protocols and profile sets
//! - [`native`]: Store-native value types and single-field assignments
//! - [`store`]: The policy store boundary and scoped handles
//! - [`memory_store`]: In-process store with the real store's constraints
//! - `com_store` (Windows only): The local machine's firewall over COM
//! - [`indirect`]: Expansion of `@module,-id` resource references
//! - [`rule`]: String-typed rule projections and request types
//! - [`rules`]: Rule lifecycle operations
//! - [`settings`]: Per-profile firewall settings
//! - [`error`]: Error types and store error translation

pub mod alias;
#[cfg(windows)]
pub mod com_store;
pub mod error;
pub mod indirect;
pub mod memory_store;
pub mod native;
pub mod rule;
pub mod rules;
pub mod settings;
pub mod store;

#[cfg(test)]
pub mod test_helpers;
