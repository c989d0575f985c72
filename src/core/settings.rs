//! Per-profile firewall settings
//!
//! Each network location profile (Domain, Private, Public) carries its own
//! on/off switch, inbound lockdown flag, listen notification flag and default
//! actions. Settings always load as exactly three entries in that order.
//! Mutations take a profile set string (`"Public"`, `"Domain, Private"`,
//! `"Any"`) and apply to every profile it names.

use crate::core::alias::{ACTIONS, PROFILES};
use crate::core::error::Result;
use crate::core::native::{NativeProfileSetting, Profile, SettingField};
use crate::core::rules::OperationResult;
use crate::core::store::{PolicyStore, StoreHandle};
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FirewallSetting {
    pub profile: String,
    pub enabled: bool,
    pub block_all_inbound: bool,
    pub notify_on_listen: bool,
    pub default_inbound_action: String,
    pub default_outbound_action: String,
}

impl FirewallSetting {
    pub fn from_native(profile: Profile, native: &NativeProfileSetting) -> Self {
        Self {
            profile: profile.to_string(),
            enabled: native.firewall_enabled,
            block_all_inbound: native.block_all_inbound,
            notify_on_listen: !native.notifications_disabled,
            default_inbound_action: ACTIONS.format(native.default_inbound_action),
            default_outbound_action: ACTIONS.format(native.default_outbound_action),
        }
    }
}

/// Sparse settings update
///
/// `None`, and an empty string for the default actions, leave a value as is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SettingsUpdate {
    pub block_all_inbound: Option<bool>,
    pub notify_on_listen: Option<bool>,
    pub default_inbound_action: Option<String>,
    pub default_outbound_action: Option<String>,
}

pub struct SettingsManager<S: PolicyStore> {
    store: S,
}

impl<S: PolicyStore> SettingsManager<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Settings for Domain, Private and Public, in that order.
    ///
    /// # Errors
    ///
    /// Returns `Err` if any profile cannot be read.
    pub fn load(&self) -> Result<Vec<FirewallSetting>> {
        let mut handle = self.store.open()?;
        Profile::iter()
            .map(|p| Ok(FirewallSetting::from_native(p, &handle.profile_setting(p)?)))
            .collect()
    }

    pub fn enable(&self, profiles: &str) -> OperationResult {
        self.set_enabled(profiles, true)
    }

    pub fn disable(&self, profiles: &str) -> OperationResult {
        self.set_enabled(profiles, false)
    }

    pub fn set_parameters(&self, profiles: &str, update: &SettingsUpdate) -> OperationResult {
        info!("Setting firewall parameters for '{profiles}' profile(s)");
        let result = self.for_each_profile(profiles, |handle, profile| {
            apply_update(handle, profile, update)
        });
        OperationResult::from_result("Set parameters for", profiles, result)
    }

    fn set_enabled(&self, profiles: &str, enabled: bool) -> OperationResult {
        let verb = if enabled { "Enable" } else { "Disable" };
        info!("{verb} firewall for '{profiles}' profile(s)");
        let result = self.for_each_profile(profiles, |handle, profile| {
            handle.set_profile_setting(profile, SettingField::FirewallEnabled(enabled))
        });
        OperationResult::from_result(verb, profiles, result)
    }

    fn for_each_profile<F>(&self, profiles: &str, mut op: F) -> Result<usize>
    where
        F: FnMut(&mut dyn StoreHandle, Profile) -> Result<()>,
    {
        let targets = Profile::from_mask(PROFILES.parse(profiles)?);
        let mut handle = self.store.open()?;
        for profile in &targets {
            op(handle.as_mut(), *profile)?;
        }
        Ok(targets.len())
    }
}

fn apply_update(
    handle: &mut dyn StoreHandle,
    profile: Profile,
    update: &SettingsUpdate,
) -> Result<()> {
    let mut assign = |field: SettingField| {
        debug!("Setting {field:?} for {profile} profile");
        handle.set_profile_setting(profile, field)
    };

    if let Some(block) = update.block_all_inbound {
        assign(SettingField::BlockAllInbound(block))?;
    }
    if let Some(notify) = update.notify_on_listen {
        assign(SettingField::NotificationsDisabled(!notify))?;
    }
    if let Some(action) = non_empty(update.default_inbound_action.as_deref()) {
        assign(SettingField::DefaultInboundAction(ACTIONS.parse(action)?))?;
    }
    if let Some(action) = non_empty(update.default_outbound_action.as_deref()) {
        assign(SettingField::DefaultOutboundAction(ACTIONS.parse(action)?))?;
    }
    Ok(())
}

fn non_empty(text: Option<&str>) -> Option<&str> {
    text.filter(|t| !t.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::memory_store::MemoryStore;
    use crate::core::native::RuleAction;

    #[test]
    fn test_load_returns_three_in_order() {
        let settings = SettingsManager::new(MemoryStore::new()).load().unwrap();
        let names: Vec<_> = settings.iter().map(|s| s.profile.as_str()).collect();
        assert_eq!(names, ["Domain", "Private", "Public"]);
        assert!(settings.iter().all(|s| s.enabled && s.notify_on_listen));
        assert_eq!(settings[0].default_inbound_action, "Deny");
        assert_eq!(settings[0].default_outbound_action, "Allow");
    }

    #[test]
    fn test_disable_any_hits_all_profiles() {
        let store = MemoryStore::new();
        let result = SettingsManager::new(store.clone()).disable("Any");
        assert_eq!(result.affected, 3);
        for profile in Profile::iter() {
            assert!(!store.setting_snapshot(profile).firewall_enabled);
        }
    }

    #[test]
    fn test_enable_subset() {
        let store = MemoryStore::new();
        let manager = SettingsManager::new(store.clone());
        assert!(manager.disable("all").success);
        let result = manager.enable("dom, pub");
        assert_eq!(result.affected, 2);
        assert!(store.setting_snapshot(Profile::Domain).firewall_enabled);
        assert!(!store.setting_snapshot(Profile::Private).firewall_enabled);
        assert!(store.setting_snapshot(Profile::Public).firewall_enabled);
    }

    #[test]
    fn test_set_parameters_ignores_empty_actions() {
        let store = MemoryStore::new();
        let update = SettingsUpdate {
            notify_on_listen: Some(false),
            default_inbound_action: Some(String::new()),
            default_outbound_action: Some("block".to_string()),
            ..SettingsUpdate::default()
        };
        let result = SettingsManager::new(store.clone()).set_parameters("Private", &update);
        assert!(result.success);

        let private = store.setting_snapshot(Profile::Private);
        assert!(private.notifications_disabled);
        assert_eq!(private.default_inbound_action, RuleAction::BLOCK);
        assert_eq!(private.default_outbound_action, RuleAction::BLOCK);
        assert_eq!(
            store.setting_snapshot(Profile::Public),
            NativeProfileSetting::default()
        );
    }

    #[test]
    fn test_bad_profile_fails_without_opening() {
        let store = MemoryStore::new();
        let result = SettingsManager::new(store.clone()).enable("Office");
        assert!(!result.success);
        assert!(result.error.unwrap().contains("Office"));
        assert_eq!(store.handles_opened(), 0);
    }

    #[test]
    fn test_bad_action_fails_and_releases() {
        let store = MemoryStore::new();
        let update = SettingsUpdate {
            block_all_inbound: Some(true),
            default_inbound_action: Some("maybe".to_string()),
            ..SettingsUpdate::default()
        };
        let result = SettingsManager::new(store.clone()).set_parameters("Domain", &update);
        assert!(!result.success);
        assert!(store.setting_snapshot(Profile::Domain).block_all_inbound);
        assert_eq!(store.open_handles(), 0);
    }
}
