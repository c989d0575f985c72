//! In-process policy store
//!
//! Holds rules and profile settings in memory with the same defaults and
//! field constraints as the Windows Firewall store: new rules start from
//! [`NativeRule::default`], and port lists are rejected on any protocol other
//! than TCP or UDP. Clones share state, so a test can keep one clone for
//! inspection while a manager owns another.
//!
//! Handles are counted: [`MemoryStore::open_handles`] is the number of handles
//! currently alive and [`MemoryStore::handles_opened`] the total ever acquired.

use crate::core::error::{Error, Result};
use crate::core::native::{
    NativeProfileSetting, NativeRule, Profile, RuleField, SettingField, protocol_supports_ports,
};
use crate::core::store::{PolicyStore, StoreHandle};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

#[derive(Debug, Default)]
struct MemoryState {
    rules: Vec<NativeRule>,
    settings: [NativeProfileSetting; 3],
    read_only: bool,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    open_handles: Arc<AtomicUsize>,
    handles_opened: Arc<AtomicUsize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with `rules`.
    pub fn with_rules(rules: impl IntoIterator<Item = NativeRule>) -> Self {
        let store = Self::new();
        if let Ok(mut state) = store.state.lock() {
            state.rules.extend(rules);
        }
        store
    }

    /// When set, every mutation fails with an access-denied store error.
    pub fn set_read_only(&self, read_only: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.read_only = read_only;
        }
    }

    /// Snapshot of the stored rules, bypassing handle accounting.
    pub fn snapshot(&self) -> Vec<NativeRule> {
        self.state
            .lock()
            .map(|s| s.rules.clone())
            .unwrap_or_default()
    }

    /// Snapshot of one profile's settings, bypassing handle accounting.
    pub fn setting_snapshot(&self, profile: Profile) -> NativeProfileSetting {
        self.state
            .lock()
            .map(|s| s.settings[slot(profile)])
            .unwrap_or_default()
    }

    pub fn open_handles(&self) -> usize {
        self.open_handles.load(Ordering::SeqCst)
    }

    pub fn handles_opened(&self) -> usize {
        self.handles_opened.load(Ordering::SeqCst)
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| Error::store("in-memory store state poisoned"))
    }
}

impl PolicyStore for MemoryStore {
    fn open(&self) -> Result<Box<dyn StoreHandle + '_>> {
        self.open_handles.fetch_add(1, Ordering::SeqCst);
        self.handles_opened.fetch_add(1, Ordering::SeqCst);
        debug!("Opened in-memory store handle");
        Ok(Box::new(MemoryHandle { store: self }))
    }
}

struct MemoryHandle<'a> {
    store: &'a MemoryStore,
}

impl MemoryHandle<'_> {
    fn writable(&self) -> Result<MutexGuard<'_, MemoryState>> {
        let state = self.store.lock()?;
        if state.read_only {
            return Err(Error::Store {
                message: "Access is denied. (0x80070005)".to_string(),
                code: Some(0x8007_0005_u32 as i32),
            });
        }
        Ok(state)
    }
}

fn invalid_parameter() -> Error {
    Error::Store {
        message: "The parameter is incorrect. (0x80070057)".to_string(),
        code: Some(0x8007_0057_u32 as i32),
    }
}

fn ports_allowed(protocol: i32, ports: &str) -> bool {
    ports.is_empty() || ports == "*" || protocol_supports_ports(protocol)
}

const fn slot(profile: Profile) -> usize {
    match profile {
        Profile::Domain => 0,
        Profile::Private => 1,
        Profile::Public => 2,
    }
}

impl StoreHandle for MemoryHandle<'_> {
    fn rules(&mut self) -> Result<Vec<NativeRule>> {
        Ok(self.store.lock()?.rules.clone())
    }

    fn set_rule_field(&mut self, index: usize, field: &RuleField) -> Result<()> {
        let mut state = self.writable()?;
        let rule = state
            .rules
            .get_mut(index)
            .ok_or_else(|| Error::store(format!("Element not found: rule #{index}")))?;

        let rejected = match field {
            RuleField::LocalPorts(p) | RuleField::RemotePorts(p) => {
                !ports_allowed(rule.protocol, p)
            }
            RuleField::Protocol(p) => {
                !ports_allowed(*p, &rule.local_ports) || !ports_allowed(*p, &rule.remote_ports)
            }
            _ => false,
        };
        if rejected {
            return Err(invalid_parameter());
        }

        field.apply_to(rule);
        Ok(())
    }

    fn add_rule(&mut self, rule: &NativeRule) -> Result<()> {
        let mut state = self.writable()?;
        if !ports_allowed(rule.protocol, &rule.local_ports)
            || !ports_allowed(rule.protocol, &rule.remote_ports)
        {
            return Err(invalid_parameter());
        }
        state.rules.push(rule.clone());
        Ok(())
    }

    fn remove_rule(&mut self, name: &str) -> Result<()> {
        let mut state = self.writable()?;
        if let Some(pos) = state.rules.iter().position(|r| r.name == name) {
            state.rules.remove(pos);
        }
        Ok(())
    }

    fn profile_setting(&mut self, profile: Profile) -> Result<NativeProfileSetting> {
        Ok(self.store.lock()?.settings[slot(profile)])
    }

    fn set_profile_setting(&mut self, profile: Profile, field: SettingField) -> Result<()> {
        let mut state = self.writable()?;
        field.apply_to(&mut state.settings[slot(profile)]);
        Ok(())
    }
}

impl Drop for MemoryHandle<'_> {
    fn drop(&mut self) {
        self.store.open_handles.fetch_sub(1, Ordering::SeqCst);
        debug!("Released in-memory store handle");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::native::{PROTOCOL_ANY, PROTOCOL_TCP, RuleAction};

    fn rule(name: &str) -> NativeRule {
        NativeRule {
            name: name.to_string(),
            ..NativeRule::default()
        }
    }

    #[test]
    fn test_handle_accounting() {
        let store = MemoryStore::new();
        {
            let _a = store.open().unwrap();
            assert_eq!(store.open_handles(), 1);
        }
        assert_eq!(store.open_handles(), 0);
        assert_eq!(store.handles_opened(), 1);
    }

    #[test]
    fn test_ports_rejected_on_any_protocol() {
        let store = MemoryStore::new();
        let mut handle = store.open().unwrap();
        let mut r = rule("bad");
        r.protocol = PROTOCOL_ANY;
        r.local_ports = "80".to_string();
        assert!(handle.add_rule(&r).is_err());

        r.protocol = PROTOCOL_TCP;
        handle.add_rule(&r).unwrap();
        assert!(
            handle
                .set_rule_field(0, &RuleField::Protocol(PROTOCOL_ANY))
                .is_err()
        );
    }

    #[test]
    fn test_remove_is_exact_and_single() {
        let store = MemoryStore::with_rules([rule("dup"), rule("dup"), rule("other")]);
        let mut handle = store.open().unwrap();
        handle.remove_rule("dup").unwrap();
        handle.remove_rule("missing").unwrap();
        drop(handle);
        assert_eq!(store.snapshot().len(), 2);
    }

    #[test]
    fn test_read_only_rejects_mutations() {
        let store = MemoryStore::with_rules([rule("a")]);
        store.set_read_only(true);
        let mut handle = store.open().unwrap();
        assert!(handle.rules().is_ok());
        let err = handle.set_rule_field(0, &RuleField::Enabled(true)).unwrap_err();
        assert!(err.to_string().contains("Access is denied"));
        assert!(
            handle
                .set_profile_setting(
                    Profile::Public,
                    SettingField::DefaultInboundAction(RuleAction::ALLOW)
                )
                .is_err()
        );
    }
}
