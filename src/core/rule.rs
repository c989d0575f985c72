//! String-typed rule projections
//!
//! [`FirewallRule`] and [`RuleSummary`] are read snapshots built from
//! [`NativeRule`]s with every enumerated field formatted through the alias
//! tables. They are never cached: each read re-queries the store.
//! [`NewRule`] and [`RuleUpdate`] carry caller input in the same vocabulary.

use crate::core::alias::{ACTIONS, DIRECTIONS, PROFILES, PROTOCOLS};
use crate::core::indirect::IndirectStringResolver;
use crate::core::native::NativeRule;
use serde::{Deserialize, Serialize};

/// Full read projection of a store rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FirewallRule {
    pub display_name: String,
    pub description: String,
    pub enabled: bool,
    /// Raw grouping token, possibly an indirect string reference
    pub grouping: String,
    /// Grouping expanded for display
    pub display_group: String,
    pub direction: String,
    pub action_type: String,
    pub protocol: String,
    pub local_ports: String,
    pub remote_ports: String,
    pub local_addresses: String,
    pub remote_addresses: String,
    pub application_name: String,
    pub profiles: String,
}

impl FirewallRule {
    pub fn from_native(rule: &NativeRule, resolver: &dyn IndirectStringResolver) -> Self {
        Self {
            display_name: rule.name.clone(),
            description: rule.description.clone(),
            enabled: rule.enabled,
            grouping: rule.grouping.clone(),
            display_group: resolver.resolve(&rule.grouping),
            direction: DIRECTIONS.format(rule.direction),
            action_type: ACTIONS.format(rule.action),
            protocol: PROTOCOLS.format(rule.protocol),
            local_ports: rule.local_ports.clone(),
            remote_ports: rule.remote_ports.clone(),
            local_addresses: rule.local_addresses.clone(),
            remote_addresses: rule.remote_addresses.clone(),
            application_name: rule.application_name.clone(),
            profiles: PROFILES.format(rule.profiles),
        }
    }
}

/// Compact listing projection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RuleSummary {
    pub display_name: String,
    pub direction: String,
    pub enabled: bool,
    pub action_type: String,
}

impl From<&NativeRule> for RuleSummary {
    fn from(rule: &NativeRule) -> Self {
        Self {
            display_name: rule.name.clone(),
            direction: DIRECTIONS.format(rule.direction),
            enabled: rule.enabled,
            action_type: ACTIONS.format(rule.action),
        }
    }
}

/// Input for creating a rule
///
/// `None` leaves the store's default for a new rule in place. Empty or absent
/// addresses become `"*"`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct NewRule {
    pub display_name: String,
    pub description: Option<String>,
    pub enabled: bool,
    pub direction: String,
    pub action_type: String,
    pub grouping: Option<String>,
    pub application_name: Option<String>,
    pub profiles: Option<String>,
    pub protocol: Option<String>,
    pub local_ports: Option<String>,
    pub remote_ports: Option<String>,
    pub local_addresses: Option<String>,
    pub remote_addresses: Option<String>,
}

impl NewRule {
    /// An enabled rule with the required fields set and everything else defaulted.
    pub fn new(
        display_name: impl Into<String>,
        direction: impl Into<String>,
        action_type: impl Into<String>,
    ) -> Self {
        Self {
            display_name: display_name.into(),
            enabled: true,
            direction: direction.into(),
            action_type: action_type.into(),
            ..Self::default()
        }
    }

    pub fn protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = Some(protocol.into());
        self
    }

    pub fn local_ports(mut self, ports: impl Into<String>) -> Self {
        self.local_ports = Some(ports.into());
        self
    }

    pub fn remote_ports(mut self, ports: impl Into<String>) -> Self {
        self.remote_ports = Some(ports.into());
        self
    }

    pub fn profiles(mut self, profiles: impl Into<String>) -> Self {
        self.profiles = Some(profiles.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Sparse update: `None` means "leave unchanged"
///
/// Fields are applied in declaration order, so a protocol change lands
/// before any port assignment in the same update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RuleUpdate {
    pub description: Option<String>,
    pub direction: Option<String>,
    pub action_type: Option<String>,
    pub grouping: Option<String>,
    pub application_name: Option<String>,
    pub protocol: Option<String>,
    pub local_ports: Option<String>,
    pub remote_ports: Option<String>,
    pub local_addresses: Option<String>,
    pub remote_addresses: Option<String>,
    pub profiles: Option<String>,
}

impl RuleUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
