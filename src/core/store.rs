//! Policy store boundary
//!
//! The store is the system of record for rules and per-profile settings.
//! Callers [`PolicyStore::open`] a scoped [`StoreHandle`] for each operation;
//! dropping the handle releases it, so every exit path (return, `?`, panic
//! unwind) releases exactly once.

use crate::core::error::{Error, Result};
use crate::core::native::{NativeProfileSetting, NativeRule, Profile, RuleField, SettingField};

/// A source of scoped policy store handles
pub trait PolicyStore {
    /// Acquires a handle. Released when the returned box is dropped.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the store cannot be reached.
    fn open(&self) -> Result<Box<dyn StoreHandle + '_>>;
}

/// An open connection to the policy store
///
/// Rule positions passed to [`StoreHandle::set_rule_field`] refer to the
/// order of the most recent [`StoreHandle::rules`] call on the same handle.
pub trait StoreHandle {
    /// Enumerates every rule currently in the store.
    fn rules(&mut self) -> Result<Vec<NativeRule>>;

    /// Assigns one field on the rule at `index` of the last enumeration.
    fn set_rule_field(&mut self, index: usize, field: &RuleField) -> Result<()>;

    /// Submits a fully populated rule.
    fn add_rule(&mut self, rule: &NativeRule) -> Result<()>;

    /// Removes one rule by name.
    fn remove_rule(&mut self, name: &str) -> Result<()>;

    fn profile_setting(&mut self, profile: Profile) -> Result<NativeProfileSetting>;

    fn set_profile_setting(&mut self, profile: Profile, field: SettingField) -> Result<()>;
}

/// Store for hosts without a Windows Firewall; every open fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableStore;

impl PolicyStore for UnavailableStore {
    fn open(&self) -> Result<Box<dyn StoreHandle + '_>> {
        Err(Error::Store {
            message: "Class not registered: the Windows Firewall policy store is only available on Windows (0x80040154)".to_string(),
            code: Some(0x8004_0154_u32 as i32),
        })
    }
}

/// Case-insensitive exact display-name comparison used for every lookup.
pub fn names_match(a: &str, b: &str) -> bool {
    a == b || a.to_lowercase() == b.to_lowercase()
}

/// Positions of every rule named `name`, in enumeration order.
///
/// # Errors
///
/// Propagates enumeration failures.
pub fn matching_rules(
    handle: &mut dyn StoreHandle,
    name: &str,
) -> Result<Vec<(usize, NativeRule)>> {
    Ok(handle
        .rules()?
        .into_iter()
        .enumerate()
        .filter(|(_, rule)| names_match(&rule.name, name))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_match_case_insensitive() {
        assert!(names_match("TestRule", "testrule"));
        assert!(names_match("Äpfel", "äPFEL"));
        assert!(!names_match("TestRule", "TestRule2"));
        assert!(!names_match("Test Rule", "TestRule"));
    }

    #[test]
    fn test_unavailable_store_fails_open() {
        let Err(err) = UnavailableStore.open() else {
            panic!("open should fail");
        };
        assert!(!err.is_soft());
        assert!(err.to_string().contains("0x80040154"));
    }
}
