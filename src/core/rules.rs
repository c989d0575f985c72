//! Rule lifecycle management
//!
//! [`RuleManager`] is the whole contract surface for reading and mutating
//! firewall rules. Every public operation opens its own store handle and
//! drops it before returning; nothing is cached between calls.
//!
//! Lookup is by display name, case-insensitively. When several rules share a
//! name, [`RuleManager::find`] returns the first one in store order while
//! every mutation applies to all of them.
//!
//! Mutations never return `Err`: they report an [`OperationResult`] so a batch
//! of operations can continue past a single failure.

use crate::core::alias::{ACTIONS, DIRECTIONS, PROFILES, PROTOCOLS};
use crate::core::error::{Error, Result};
use crate::core::indirect::{IndirectStringResolver, platform_resolver};
use crate::core::native::{NativeRule, PROTOCOL_ANY, RuleField};
use crate::core::rule::{FirewallRule, NewRule, RuleSummary, RuleUpdate};
use crate::core::store::{PolicyStore, StoreHandle, matching_rules};
use serde::Serialize;
use tracing::{debug, error, info, warn};

/// Outcome of a mutating operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationResult {
    pub success: bool,
    /// Number of store rules (or profiles) the operation touched
    pub affected: usize,
    pub error: Option<String>,
    /// `true` when the failure was rejected input rather than a store failure
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub soft: bool,
}

impl OperationResult {
    pub fn success(affected: usize) -> Self {
        Self {
            success: true,
            affected,
            error: None,
            soft: false,
        }
    }

    pub fn failure(err: &Error) -> Self {
        Self {
            success: false,
            affected: 0,
            error: Some(err.to_string()),
            soft: err.is_soft(),
        }
    }

    /// Collapses an internal result at the public boundary, logging failures.
    pub(crate) fn from_result(operation: &str, target: &str, result: Result<usize>) -> Self {
        match result {
            Ok(affected) => {
                info!("{operation} '{target}' succeeded ({affected} affected)");
                Self::success(affected)
            }
            Err(e) if e.is_soft() => {
                warn!("{operation} '{target}' rejected: {e}");
                Self::failure(&e)
            }
            Err(e) => {
                error!("{operation} '{target}' failed: {e}");
                Self::failure(&e)
            }
        }
    }
}

pub struct RuleManager<S: PolicyStore> {
    store: S,
    resolver: Box<dyn IndirectStringResolver>,
}

impl<S: PolicyStore> RuleManager<S> {
    /// Manager using the platform's indirect string resolver for groupings.
    pub fn new(store: S) -> Self {
        Self::with_resolver(store, platform_resolver())
    }

    pub fn with_resolver(store: S, resolver: Box<dyn IndirectStringResolver>) -> Self {
        Self { store, resolver }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Every rule in the store, in store order.
    ///
    /// # Errors
    ///
    /// Any store failure aborts the whole load.
    pub fn load_all(&self) -> Result<Vec<FirewallRule>> {
        let mut handle = self.store.open()?;
        let rules = handle.rules()?;
        debug!("Loaded {} rules", rules.len());
        Ok(rules
            .iter()
            .map(|r| FirewallRule::from_native(r, self.resolver.as_ref()))
            .collect())
    }

    /// Name, direction, state and action of every rule.
    ///
    /// # Errors
    ///
    /// Any store failure aborts the whole load.
    pub fn load_summaries(&self) -> Result<Vec<RuleSummary>> {
        let mut handle = self.store.open()?;
        Ok(handle.rules()?.iter().map(RuleSummary::from).collect())
    }

    /// First rule whose display name matches `name`, ignoring case.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the store cannot be enumerated.
    pub fn find(&self, name: &str) -> Result<Option<FirewallRule>> {
        let mut handle = self.store.open()?;
        let found = matching_rules(handle.as_mut(), name)?
            .into_iter()
            .next()
            .map(|(_, rule)| FirewallRule::from_native(&rule, self.resolver.as_ref()));
        if found.is_none() {
            debug!("No rule named '{name}'");
        }
        Ok(found)
    }

    /// Builds a rule from `new` and submits it to the store once.
    ///
    /// Port lists are dropped when the protocol is "Any" since the store
    /// refuses them there. Missing addresses default to `"*"`.
    pub fn create(&self, new: &NewRule) -> OperationResult {
        info!("Creating rule '{}'", new.display_name);
        let result = build_native_rule(new).and_then(|rule| {
            let mut handle = self.store.open()?;
            handle.add_rule(&rule)?;
            Ok(1)
        });
        OperationResult::from_result("Create", &new.display_name, result)
    }

    /// Applies every `Some` field of `update` to each rule named `name`.
    ///
    /// Each alias is resolved right before its assignment. The first failure
    /// stops the call; assignments made before it stay applied.
    pub fn set_fields(&self, name: &str, update: &RuleUpdate) -> OperationResult {
        info!("Updating rule '{name}'");
        let result = self.for_each_match(name, |handle, index| apply_update(handle, index, update));
        OperationResult::from_result("Update", name, result)
    }

    pub fn rename(&self, name: &str, new_name: &str) -> OperationResult {
        info!("Renaming rule '{name}' to '{new_name}'");
        let result = if new_name.trim().is_empty() {
            Err(Error::validation("DisplayName", "new name must not be empty"))
        } else {
            self.for_each_match(name, |handle, index| {
                handle.set_rule_field(index, &RuleField::Name(new_name.to_string()))
            })
        };
        OperationResult::from_result("Rename", name, result)
    }

    pub fn enable(&self, name: &str) -> OperationResult {
        self.set_enabled(name, true)
    }

    pub fn disable(&self, name: &str) -> OperationResult {
        self.set_enabled(name, false)
    }

    /// Deletes every rule named `name`.
    pub fn remove(&self, name: &str) -> OperationResult {
        info!("Removing rule '{name}'");
        let result = self.store.open().and_then(|mut handle| {
            let matches = matching_rules(handle.as_mut(), name)?;
            for (_, rule) in &matches {
                handle.remove_rule(&rule.name)?;
            }
            Ok(matches.len())
        });
        OperationResult::from_result("Remove", name, result)
    }

    fn set_enabled(&self, name: &str, enabled: bool) -> OperationResult {
        let verb = if enabled { "Enable" } else { "Disable" };
        info!("{verb} rule '{name}'");
        let result = self.for_each_match(name, |handle, index| {
            handle.set_rule_field(index, &RuleField::Enabled(enabled))
        });
        OperationResult::from_result(verb, name, result)
    }

    /// Runs `op` against each matching rule position on one handle.
    fn for_each_match<F>(&self, name: &str, mut op: F) -> Result<usize>
    where
        F: FnMut(&mut dyn StoreHandle, usize) -> Result<()>,
    {
        let mut handle = self.store.open()?;
        let matches = matching_rules(handle.as_mut(), name)?;
        if matches.is_empty() {
            debug!("No rule named '{name}', nothing to do");
        }
        for (index, _) in &matches {
            op(handle.as_mut(), *index)?;
        }
        Ok(matches.len())
    }
}

fn build_native_rule(new: &NewRule) -> Result<NativeRule> {
    if new.display_name.trim().is_empty() {
        return Err(Error::validation("DisplayName", "rule name must not be empty"));
    }

    let mut rule = NativeRule {
        name: new.display_name.clone(),
        enabled: new.enabled,
        direction: DIRECTIONS.parse(&new.direction)?,
        action: ACTIONS.parse(&new.action_type)?,
        ..NativeRule::default()
    };
    if let Some(description) = &new.description {
        rule.description.clone_from(description);
    }
    if let Some(grouping) = &new.grouping {
        rule.grouping.clone_from(grouping);
    }
    if let Some(app) = &new.application_name {
        rule.application_name.clone_from(app);
    }
    if let Some(profiles) = &new.profiles {
        rule.profiles = PROFILES.parse(profiles)?;
    }
    if let Some(protocol) = &new.protocol {
        rule.protocol = PROTOCOLS.parse(protocol)?;
    }

    if rule.protocol == PROTOCOL_ANY {
        let supplied = [&new.local_ports, &new.remote_ports]
            .into_iter()
            .flatten()
            .any(|p| !p.is_empty());
        if supplied {
            warn!(
                "Ignoring ports for rule '{}': protocol Any takes no ports",
                new.display_name
            );
        }
    } else {
        if let Some(ports) = &new.local_ports {
            rule.local_ports.clone_from(ports);
        }
        if let Some(ports) = &new.remote_ports {
            rule.remote_ports.clone_from(ports);
        }
    }

    rule.local_addresses = address_or_any(new.local_addresses.as_deref());
    rule.remote_addresses = address_or_any(new.remote_addresses.as_deref());
    Ok(rule)
}

fn address_or_any(address: Option<&str>) -> String {
    match address {
        Some(a) if !a.trim().is_empty() => a.to_string(),
        _ => "*".to_string(),
    }
}

fn apply_update(handle: &mut dyn StoreHandle, index: usize, update: &RuleUpdate) -> Result<()> {
    let mut assign = |field: RuleField| {
        debug!("Setting {field:?} on rule #{index}");
        handle.set_rule_field(index, &field)
    };

    if let Some(v) = &update.description {
        assign(RuleField::Description(v.clone()))?;
    }
    if let Some(v) = &update.direction {
        assign(RuleField::Direction(DIRECTIONS.parse(v)?))?;
    }
    if let Some(v) = &update.action_type {
        assign(RuleField::Action(ACTIONS.parse(v)?))?;
    }
    if let Some(v) = &update.grouping {
        assign(RuleField::Grouping(v.clone()))?;
    }
    if let Some(v) = &update.application_name {
        assign(RuleField::ApplicationName(v.clone()))?;
    }
    if let Some(v) = &update.protocol {
        assign(RuleField::Protocol(PROTOCOLS.parse(v)?))?;
    }
    if let Some(v) = &update.local_ports {
        assign(RuleField::LocalPorts(v.clone()))?;
    }
    if let Some(v) = &update.remote_ports {
        assign(RuleField::RemotePorts(v.clone()))?;
    }
    if let Some(v) = &update.local_addresses {
        assign(RuleField::LocalAddresses(v.clone()))?;
    }
    if let Some(v) = &update.remote_addresses {
        assign(RuleField::RemoteAddresses(v.clone()))?;
    }
    if let Some(v) = &update.profiles {
        assign(RuleField::Profiles(PROFILES.parse(v)?))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::indirect::PassthroughResolver;
    use crate::core::memory_store::MemoryStore;
    use crate::core::native::{PROTOCOL_TCP, RuleAction, RuleDirection};

    fn manager(store: &MemoryStore) -> RuleManager<MemoryStore> {
        RuleManager::with_resolver(store.clone(), Box::new(PassthroughResolver))
    }

    #[test]
    fn test_build_defaults_addresses() {
        let mut new = NewRule::new("r", "in", "allow");
        new.local_addresses = Some("  ".to_string());
        let rule = build_native_rule(&new).unwrap();
        assert_eq!(rule.local_addresses, "*");
        assert_eq!(rule.remote_addresses, "*");
        assert_eq!(rule.direction, RuleDirection::IN);
        assert_eq!(rule.action, RuleAction::ALLOW);
    }

    #[test]
    fn test_build_keeps_ports_for_tcp() {
        let new = NewRule::new("r", "out", "block")
            .protocol("6")
            .local_ports("80,443")
            .remote_ports("1024-65535");
        let rule = build_native_rule(&new).unwrap();
        assert_eq!(rule.protocol, PROTOCOL_TCP);
        assert_eq!(rule.local_ports, "80,443");
        assert_eq!(rule.remote_ports, "1024-65535");
    }

    #[test]
    fn test_build_drops_ports_without_protocol() {
        let new = NewRule::new("r", "in", "allow").local_ports("80");
        let rule = build_native_rule(&new).unwrap();
        assert_eq!(rule.protocol, PROTOCOL_ANY);
        assert!(rule.local_ports.is_empty());
    }

    #[test]
    fn test_build_rejects_blank_name() {
        let err = build_native_rule(&NewRule::new("   ", "in", "allow")).unwrap_err();
        assert!(err.is_soft());
    }

    #[test]
    fn test_build_rejects_bad_alias() {
        let err = build_native_rule(&NewRule::new("r", "sideways", "allow")).unwrap_err();
        assert!(matches!(err, Error::UnrecognizedAlias { ref token, .. } if token == "sideways"));
    }

    #[test]
    fn test_create_hard_fail_touches_no_store() {
        let store = MemoryStore::new();
        let result = manager(&store).create(&NewRule::new("", "in", "allow"));
        assert!(!result.success);
        assert!(result.soft);
        assert_eq!(store.handles_opened(), 0);
    }

    #[test]
    fn test_enable_disable() {
        let store = MemoryStore::new();
        let mgr = manager(&store);
        let mut new = NewRule::new("Toggle", "in", "allow");
        new.enabled = false;
        assert!(mgr.create(&new).success);

        let result = mgr.enable("toggle");
        assert_eq!(result, OperationResult::success(1));
        assert!(store.snapshot()[0].enabled);

        assert!(mgr.disable("TOGGLE").success);
        assert!(!store.snapshot()[0].enabled);
    }

    #[test]
    fn test_remove_missing_is_noop_success() {
        let store = MemoryStore::new();
        let result = manager(&store).remove("ghost");
        assert!(result.success);
        assert_eq!(result.affected, 0);
    }

    #[test]
    fn test_failure_serializes_soft_flag() {
        let err = Error::validation("DisplayName", "empty");
        let json = serde_json::to_value(OperationResult::failure(&err)).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["soft"], true);

        let json = serde_json::to_value(OperationResult::success(2)).unwrap();
        assert!(json.get("soft").is_none());
    }
}
