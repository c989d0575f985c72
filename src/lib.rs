//! winfw - Windows Firewall rule and profile management
//!
//! A library and command-line tool for listing, creating, updating and
//! removing Windows Firewall rules with human-friendly aliases.
//!
//! # Architecture
//!
//! - [`core`] - Alias resolution, rule lifecycle, profile settings, policy store access
//! - [`audit`] - Audit logging of every mutating operation
//! - [`config`] - Configuration persistence
//! - [`utils`] - Utility functions (platform directories)
//!
//! # Example
//!
//! ```
//! use winfw::core::memory_store::MemoryStore;
//! use winfw::{NewRule, RuleManager};
//!
//! let manager = RuleManager::new(MemoryStore::new());
//! let new = NewRule::new("Web", "in", "allow")
//!     .protocol("tcp")
//!     .local_ports("443");
//! let result = manager.create(&new);
//! assert!(result.success);
//!
//! let rule = manager.find("web").unwrap().unwrap();
//! assert_eq!(rule.protocol, "TCP");
//! ```

// Allow pedantic clippy warnings that are not worth fixing for this codebase
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::needless_lifetimes)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::missing_errors_doc)]

pub mod audit;
pub mod config;
pub mod core;
pub mod utils;

// Re-export commonly used types
pub use crate::core::alias::{Axis, canonicalize};
pub use crate::core::error::{Error, Result};
pub use crate::core::rule::{FirewallRule, NewRule, RuleSummary, RuleUpdate};
pub use crate::core::rules::{OperationResult, RuleManager};
pub use crate::core::settings::{FirewallSetting, SettingsManager, SettingsUpdate};
pub use crate::core::store::PolicyStore;
