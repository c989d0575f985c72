//! Windows Firewall policy store over COM
//!
//! Each [`ComPolicyStore::open`] enters a COM apartment on the calling thread,
//! instantiates `HNetCfg.FwPolicy2` and keeps the rule objects from the most
//! recent enumeration so positional updates hit the same live objects.
//! Dropping the handle releases every interface before leaving the apartment.

use crate::core::error::{Error, Result};
use crate::core::native::{
    NativeProfileSetting, NativeRule, Profile, RuleAction, RuleDirection, RuleField, SettingField,
};
use crate::core::store::{PolicyStore, StoreHandle};
use tracing::debug;
use windows::Win32::Foundation::{RPC_E_CHANGED_MODE, VARIANT_BOOL, VARIANT_FALSE, VARIANT_TRUE};
use windows::Win32::NetworkManagement::WindowsFirewall::{
    INetFwPolicy2, INetFwRule, INetFwRules, NET_FW_ACTION, NET_FW_PROFILE_TYPE2,
    NET_FW_RULE_DIRECTION, NetFwPolicy2, NetFwRule,
};
use windows::Win32::System::Com::{
    CLSCTX_INPROC_SERVER, COINIT_APARTMENTTHREADED, CoCreateInstance, CoInitializeEx,
    CoUninitialize,
};
use windows::Win32::System::Ole::IEnumVARIANT;
use windows::core::{BSTR, HRESULT, IUnknown, Interface, VARIANT};

/// The local machine's firewall policy
#[derive(Debug, Clone, Copy, Default)]
pub struct ComPolicyStore;

impl ComPolicyStore {
    pub fn new() -> Self {
        Self
    }
}

impl PolicyStore for ComPolicyStore {
    fn open(&self) -> Result<Box<dyn StoreHandle + '_>> {
        Ok(Box::new(ComHandle::open()?))
    }
}

fn com_error(e: &windows::core::Error) -> Error {
    let code = e.code().0;
    Error::Store {
        message: format!("{} ({code:#010x})", e.message().trim()),
        code: Some(code),
    }
}

fn variant_bool(value: bool) -> VARIANT_BOOL {
    if value { VARIANT_TRUE } else { VARIANT_FALSE }
}

/// Balances `CoInitializeEx` on drop when this thread's apartment was ours to enter.
struct Apartment {
    owned: bool,
}

impl Apartment {
    fn enter() -> Result<Self> {
        // SAFETY: no reserved pointer; apartment is left in Drop on the same thread.
        let hr = unsafe { CoInitializeEx(None, COINIT_APARTMENTTHREADED) };
        if hr == RPC_E_CHANGED_MODE {
            return Ok(Self { owned: false });
        }
        hr.ok().map_err(|e| com_error(&e))?;
        Ok(Self { owned: true })
    }
}

impl Drop for Apartment {
    fn drop(&mut self) {
        if self.owned {
            // SAFETY: paired with the successful CoInitializeEx in `enter`.
            unsafe { CoUninitialize() };
        }
    }
}

// Field order is drop order: interfaces go before the apartment.
struct ComHandle {
    rules: Vec<INetFwRule>,
    policy: INetFwPolicy2,
    _apartment: Apartment,
}

impl ComHandle {
    fn open() -> Result<Self> {
        let apartment = Apartment::enter()?;
        // SAFETY: apartment initialized above.
        let policy: INetFwPolicy2 =
            unsafe { CoCreateInstance(&NetFwPolicy2, None, CLSCTX_INPROC_SERVER) }
                .map_err(|e| com_error(&e))?;
        debug!("Opened firewall policy");
        Ok(Self {
            rules: Vec::new(),
            policy,
            _apartment: apartment,
        })
    }

    fn rule_collection(&self) -> Result<INetFwRules> {
        // SAFETY: policy is a live interface for the lifetime of self.
        unsafe { self.policy.Rules() }.map_err(|e| com_error(&e))
    }

    fn rule_at(&self, index: usize) -> Result<&INetFwRule> {
        self.rules
            .get(index)
            .ok_or_else(|| Error::store(format!("Element not found: rule #{index}")))
    }
}

fn enumerate(collection: &INetFwRules) -> windows::core::Result<Vec<INetFwRule>> {
    // SAFETY: all calls go through live interfaces owned by this function.
    unsafe {
        let enumerator: IEnumVARIANT = collection._NewEnum()?.cast()?;
        let mut rules = Vec::new();
        loop {
            let mut item = [VARIANT::default()];
            let mut fetched = 0u32;
            let hr = enumerator.Next(&mut item, &mut fetched);
            if !fetched_item(hr, fetched)? {
                break;
            }
            let unknown = IUnknown::try_from(&item[0])?;
            rules.push(unknown.cast::<INetFwRule>()?);
        }
        Ok(rules)
    }
}

/// `S_FALSE` with nothing fetched ends the enumeration; failure codes propagate.
fn fetched_item(hr: HRESULT, fetched: u32) -> windows::core::Result<bool> {
    hr.ok()?;
    Ok(fetched > 0)
}

fn read_rule(rule: &INetFwRule) -> windows::core::Result<NativeRule> {
    // SAFETY: getters on a live rule interface.
    unsafe {
        Ok(NativeRule {
            name: rule.Name()?.to_string(),
            description: rule.Description()?.to_string(),
            enabled: rule.Enabled()? != VARIANT_FALSE,
            grouping: rule.Grouping()?.to_string(),
            direction: RuleDirection(rule.Direction()?.0),
            action: RuleAction(rule.Action()?.0),
            protocol: rule.Protocol()?,
            local_ports: rule.LocalPorts()?.to_string(),
            remote_ports: rule.RemotePorts()?.to_string(),
            local_addresses: rule.LocalAddresses()?.to_string(),
            remote_addresses: rule.RemoteAddresses()?.to_string(),
            application_name: rule.ApplicationName()?.to_string(),
            profiles: rule.Profiles()?,
        })
    }
}

fn assign(rule: &INetFwRule, field: &RuleField) -> windows::core::Result<()> {
    // SAFETY: setters on a live rule interface; BSTRs outlive each call.
    unsafe {
        match field {
            RuleField::Name(v) => rule.SetName(&BSTR::from(v.as_str())),
            RuleField::Description(v) => rule.SetDescription(&BSTR::from(v.as_str())),
            RuleField::Enabled(v) => rule.SetEnabled(variant_bool(*v)),
            RuleField::Grouping(v) => rule.SetGrouping(&BSTR::from(v.as_str())),
            RuleField::Direction(v) => rule.SetDirection(NET_FW_RULE_DIRECTION(v.0)),
            RuleField::Action(v) => rule.SetAction(NET_FW_ACTION(v.0)),
            RuleField::Protocol(v) => rule.SetProtocol(*v),
            RuleField::LocalPorts(v) => rule.SetLocalPorts(&BSTR::from(v.as_str())),
            RuleField::RemotePorts(v) => rule.SetRemotePorts(&BSTR::from(v.as_str())),
            RuleField::LocalAddresses(v) => rule.SetLocalAddresses(&BSTR::from(v.as_str())),
            RuleField::RemoteAddresses(v) => rule.SetRemoteAddresses(&BSTR::from(v.as_str())),
            RuleField::ApplicationName(v) => rule.SetApplicationName(&BSTR::from(v.as_str())),
            RuleField::Profiles(v) => rule.SetProfiles(*v),
        }
    }
}

/// Assignment sequence for a new rule object. Protocol precedes ports.
fn creation_fields(rule: &NativeRule) -> Vec<RuleField> {
    let mut fields = vec![
        RuleField::Name(rule.name.clone()),
        RuleField::Description(rule.description.clone()),
        RuleField::ApplicationName(rule.application_name.clone()),
        RuleField::Protocol(rule.protocol),
    ];
    if !rule.local_ports.is_empty() {
        fields.push(RuleField::LocalPorts(rule.local_ports.clone()));
    }
    if !rule.remote_ports.is_empty() {
        fields.push(RuleField::RemotePorts(rule.remote_ports.clone()));
    }
    fields.extend([
        RuleField::LocalAddresses(rule.local_addresses.clone()),
        RuleField::RemoteAddresses(rule.remote_addresses.clone()),
        RuleField::Direction(rule.direction),
        RuleField::Action(rule.action),
        RuleField::Enabled(rule.enabled),
        RuleField::Grouping(rule.grouping.clone()),
        RuleField::Profiles(rule.profiles),
    ]);
    fields
}

impl StoreHandle for ComHandle {
    fn rules(&mut self) -> Result<Vec<NativeRule>> {
        let collection = self.rule_collection()?;
        self.rules = enumerate(&collection).map_err(|e| com_error(&e))?;
        self.rules
            .iter()
            .map(|r| read_rule(r).map_err(|e| com_error(&e)))
            .collect()
    }

    fn set_rule_field(&mut self, index: usize, field: &RuleField) -> Result<()> {
        assign(self.rule_at(index)?, field).map_err(|e| com_error(&e))
    }

    fn add_rule(&mut self, rule: &NativeRule) -> Result<()> {
        // SAFETY: apartment is held by self.
        let fresh: INetFwRule =
            unsafe { CoCreateInstance(&NetFwRule, None, CLSCTX_INPROC_SERVER) }
                .map_err(|e| com_error(&e))?;
        for field in creation_fields(rule) {
            assign(&fresh, &field).map_err(|e| com_error(&e))?;
        }
        let collection = self.rule_collection()?;
        // SAFETY: both interfaces are live.
        unsafe { collection.Add(&fresh) }.map_err(|e| com_error(&e))
    }

    fn remove_rule(&mut self, name: &str) -> Result<()> {
        let collection = self.rule_collection()?;
        // SAFETY: collection is live and the BSTR outlives the call.
        unsafe { collection.Remove(&BSTR::from(name)) }.map_err(|e| com_error(&e))
    }

    fn profile_setting(&mut self, profile: Profile) -> Result<NativeProfileSetting> {
        let kind = NET_FW_PROFILE_TYPE2(profile.mask());
        let policy = &self.policy;
        // SAFETY: getters on a live policy interface.
        let read = || unsafe {
            windows::core::Result::Ok(NativeProfileSetting {
                firewall_enabled: policy.get_FirewallEnabled(kind)? != VARIANT_FALSE,
                block_all_inbound: policy.get_BlockAllInboundTraffic(kind)? != VARIANT_FALSE,
                notifications_disabled: policy.get_NotificationsDisabled(kind)? != VARIANT_FALSE,
                default_inbound_action: RuleAction(policy.get_DefaultInboundAction(kind)?.0),
                default_outbound_action: RuleAction(policy.get_DefaultOutboundAction(kind)?.0),
            })
        };
        read().map_err(|e| com_error(&e))
    }

    fn set_profile_setting(&mut self, profile: Profile, field: SettingField) -> Result<()> {
        let kind = NET_FW_PROFILE_TYPE2(profile.mask());
        let policy = &self.policy;
        // SAFETY: setters on a live policy interface.
        let result = unsafe {
            match field {
                SettingField::FirewallEnabled(v) => {
                    policy.put_FirewallEnabled(kind, variant_bool(v))
                }
                SettingField::BlockAllInbound(v) => {
                    policy.put_BlockAllInboundTraffic(kind, variant_bool(v))
                }
                SettingField::NotificationsDisabled(v) => {
                    policy.put_NotificationsDisabled(kind, variant_bool(v))
                }
                SettingField::DefaultInboundAction(v) => {
                    policy.put_DefaultInboundAction(kind, NET_FW_ACTION(v.0))
                }
                SettingField::DefaultOutboundAction(v) => {
                    policy.put_DefaultOutboundAction(kind, NET_FW_ACTION(v.0))
                }
            }
        };
        result.map_err(|e| com_error(&e))
    }
}

impl Drop for ComHandle {
    fn drop(&mut self) {
        debug!("Releasing firewall policy ({} cached rules)", self.rules.len());
    }
}
