//! Store-native value types
//!
//! These mirror the numeric enumerations and bitmasks exposed by the Windows
//! Firewall policy store (`NET_FW_RULE_DIRECTION`, `NET_FW_ACTION`,
//! `NET_FW_PROFILE_TYPE2`, IANA protocol numbers). Direction and action are
//! newtypes over the raw `i32`: values outside the documented set survive a
//! read and format as `"Unknown"`.

use std::fmt;

/// Raw conversion between a store-native value and its `i32` wire form.
///
/// Implemented by every value type an alias table can resolve to.
pub trait NativeValue: Copy + PartialEq + fmt::Debug + Send + Sync + 'static {
    fn to_raw(self) -> i32;
    fn from_raw(raw: i32) -> Self;
}

impl NativeValue for i32 {
    fn to_raw(self) -> i32 {
        self
    }

    fn from_raw(raw: i32) -> Self {
        raw
    }
}

/// Rule direction (`NET_FW_RULE_DIRECTION`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RuleDirection(pub i32);

impl RuleDirection {
    pub const IN: Self = Self(1);
    pub const OUT: Self = Self(2);
}

impl NativeValue for RuleDirection {
    fn to_raw(self) -> i32 {
        self.0
    }

    fn from_raw(raw: i32) -> Self {
        Self(raw)
    }
}

/// Rule or default-profile action (`NET_FW_ACTION`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RuleAction(pub i32);

impl RuleAction {
    pub const BLOCK: Self = Self(0);
    pub const ALLOW: Self = Self(1);
}

impl NativeValue for RuleAction {
    fn to_raw(self) -> i32 {
        self.0
    }

    fn from_raw(raw: i32) -> Self {
        Self(raw)
    }
}

pub const PROTOCOL_TCP: i32 = 6;
pub const PROTOCOL_UDP: i32 = 17;
/// Pseudo-protocol meaning "any protocol". Rules with this value cannot carry ports.
pub const PROTOCOL_ANY: i32 = 256;

pub const PROFILE_DOMAIN: i32 = 0x1;
pub const PROFILE_PRIVATE: i32 = 0x2;
pub const PROFILE_PUBLIC: i32 = 0x4;
/// "All profiles" sentinel. Never equal to the OR of the three named bits.
pub const PROFILES_ALL: i32 = 0x7FFF_FFFF;

/// Returns `true` if the store accepts port lists for this protocol number.
pub const fn protocol_supports_ports(protocol: i32) -> bool {
    matches!(protocol, PROTOCOL_TCP | PROTOCOL_UDP)
}

/// A single network-location profile carrying its own firewall settings.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumIter,
    strum::AsRefStr,
)]
pub enum Profile {
    Domain,
    Private,
    Public,
}

impl Profile {
    /// Bit this profile occupies in a profile mask (`NET_FW_PROFILE_TYPE2`)
    pub const fn mask(self) -> i32 {
        match self {
            Profile::Domain => PROFILE_DOMAIN,
            Profile::Private => PROFILE_PRIVATE,
            Profile::Public => PROFILE_PUBLIC,
        }
    }

    /// Expands a profile mask into the individual profiles it names.
    ///
    /// The all-profiles sentinel expands to all three.
    pub fn from_mask(mask: i32) -> Vec<Profile> {
        use strum::IntoEnumIterator;
        Profile::iter().filter(|p| mask & p.mask() != 0).collect()
    }
}

/// A rule as the policy store holds it: native-typed fields, no aliasing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeRule {
    pub name: String,
    pub description: String,
    pub enabled: bool,
    pub grouping: String,
    pub direction: RuleDirection,
    pub action: RuleAction,
    pub protocol: i32,
    pub local_ports: String,
    pub remote_ports: String,
    pub local_addresses: String,
    pub remote_addresses: String,
    pub application_name: String,
    pub profiles: i32,
}

impl Default for NativeRule {
    /// Values a freshly created store rule carries before any assignment.
    fn default() -> Self {
        Self {
            name: String::new(),
            description: String::new(),
            enabled: false,
            grouping: String::new(),
            direction: RuleDirection::IN,
            action: RuleAction::ALLOW,
            protocol: PROTOCOL_ANY,
            local_ports: String::new(),
            remote_ports: String::new(),
            local_addresses: "*".to_string(),
            remote_addresses: "*".to_string(),
            application_name: String::new(),
            profiles: PROFILES_ALL,
        }
    }
}

/// One field assignment on a live store rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleField {
    Name(String),
    Description(String),
    Enabled(bool),
    Grouping(String),
    Direction(RuleDirection),
    Action(RuleAction),
    Protocol(i32),
    LocalPorts(String),
    RemotePorts(String),
    LocalAddresses(String),
    RemoteAddresses(String),
    ApplicationName(String),
    Profiles(i32),
}

impl RuleField {
    /// Applies the assignment to an owned rule value.
    pub fn apply_to(&self, rule: &mut NativeRule) {
        match self {
            RuleField::Name(v) => rule.name.clone_from(v),
            RuleField::Description(v) => rule.description.clone_from(v),
            RuleField::Enabled(v) => rule.enabled = *v,
            RuleField::Grouping(v) => rule.grouping.clone_from(v),
            RuleField::Direction(v) => rule.direction = *v,
            RuleField::Action(v) => rule.action = *v,
            RuleField::Protocol(v) => rule.protocol = *v,
            RuleField::LocalPorts(v) => rule.local_ports.clone_from(v),
            RuleField::RemotePorts(v) => rule.remote_ports.clone_from(v),
            RuleField::LocalAddresses(v) => rule.local_addresses.clone_from(v),
            RuleField::RemoteAddresses(v) => rule.remote_addresses.clone_from(v),
            RuleField::ApplicationName(v) => rule.application_name.clone_from(v),
            RuleField::Profiles(v) => rule.profiles = *v,
        }
    }
}

/// Per-profile policy values as the store holds them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeProfileSetting {
    pub firewall_enabled: bool,
    pub block_all_inbound: bool,
    pub notifications_disabled: bool,
    pub default_inbound_action: RuleAction,
    pub default_outbound_action: RuleAction,
}

impl Default for NativeProfileSetting {
    fn default() -> Self {
        Self {
            firewall_enabled: true,
            block_all_inbound: false,
            notifications_disabled: false,
            default_inbound_action: RuleAction::BLOCK,
            default_outbound_action: RuleAction::ALLOW,
        }
    }
}

/// One assignment on a profile's policy values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingField {
    FirewallEnabled(bool),
    BlockAllInbound(bool),
    NotificationsDisabled(bool),
    DefaultInboundAction(RuleAction),
    DefaultOutboundAction(RuleAction),
}

impl SettingField {
    pub fn apply_to(&self, setting: &mut NativeProfileSetting) {
        match *self {
            SettingField::FirewallEnabled(v) => setting.firewall_enabled = v,
            SettingField::BlockAllInbound(v) => setting.block_all_inbound = v,
            SettingField::NotificationsDisabled(v) => setting.notifications_disabled = v,
            SettingField::DefaultInboundAction(v) => setting.default_inbound_action = v,
            SettingField::DefaultOutboundAction(v) => setting.default_outbound_action = v,
        }
    }
}
