//! Shared test utilities for core module tests
//!
//! This module is only compiled in test mode.

use crate::core::error::{Error, Result};
use crate::core::indirect::{IndirectStringResolver, PassthroughResolver};
use crate::core::memory_store::MemoryStore;
use crate::core::native::{
    NativeProfileSetting, NativeRule, PROTOCOL_TCP, Profile, RuleField, SettingField,
};
use crate::core::rules::RuleManager;
use crate::core::store::{PolicyStore, StoreHandle};
use std::sync::atomic::{AtomicUsize, Ordering};

/// A store rule with defaults and the given name
pub fn native_rule(name: &str) -> NativeRule {
    NativeRule {
        name: name.to_string(),
        enabled: true,
        ..NativeRule::default()
    }
}

/// An enabled inbound TCP rule on `port`
pub fn tcp_rule(name: &str, port: u16) -> NativeRule {
    NativeRule {
        protocol: PROTOCOL_TCP,
        local_ports: port.to_string(),
        ..native_rule(name)
    }
}

/// A manager over a fresh memory store, plus a clone of the store for inspection
pub fn manager_with(
    rules: impl IntoIterator<Item = NativeRule>,
) -> (MemoryStore, RuleManager<MemoryStore>) {
    let store = MemoryStore::with_rules(rules);
    let manager = RuleManager::with_resolver(store.clone(), Box::new(PassthroughResolver));
    (store, manager)
}

/// Resolves a single known token, passes everything else through.
pub struct FixedResolver {
    pub token: &'static str,
    pub text: &'static str,
}

impl IndirectStringResolver for FixedResolver {
    fn resolve(&self, token: &str) -> String {
        if token == self.token {
            self.text.to_string()
        } else {
            token.to_string()
        }
    }
}

/// Memory store that rejects rule field assignments once `budget` of them have succeeded.
pub struct FailingAfter {
    pub inner: MemoryStore,
    budget: AtomicUsize,
}

impl FailingAfter {
    pub fn new(inner: MemoryStore, budget: usize) -> Self {
        Self {
            inner,
            budget: AtomicUsize::new(budget),
        }
    }
}

impl PolicyStore for FailingAfter {
    fn open(&self) -> Result<Box<dyn StoreHandle + '_>> {
        Ok(Box::new(FailingHandle {
            inner: self.inner.open()?,
            budget: &self.budget,
        }))
    }
}

struct FailingHandle<'a> {
    inner: Box<dyn StoreHandle + 'a>,
    budget: &'a AtomicUsize,
}

impl StoreHandle for FailingHandle<'_> {
    fn rules(&mut self) -> Result<Vec<NativeRule>> {
        self.inner.rules()
    }

    fn set_rule_field(&mut self, index: usize, field: &RuleField) -> Result<()> {
        let left = self.budget.load(Ordering::SeqCst);
        if left == 0 {
            return Err(Error::store("RPC server is unavailable. (0x800706ba)"));
        }
        self.budget.store(left - 1, Ordering::SeqCst);
        self.inner.set_rule_field(index, field)
    }

    fn add_rule(&mut self, rule: &NativeRule) -> Result<()> {
        self.inner.add_rule(rule)
    }

    fn remove_rule(&mut self, name: &str) -> Result<()> {
        self.inner.remove_rule(name)
    }

    fn profile_setting(&mut self, profile: Profile) -> Result<NativeProfileSetting> {
        self.inner.profile_setting(profile)
    }

    fn set_profile_setting(&mut self, profile: Profile, field: SettingField) -> Result<()> {
        self.inner.set_profile_setting(profile, field)
    }
}
