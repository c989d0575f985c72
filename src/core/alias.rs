//! Bidirectional alias resolution between human vocabulary and store-native values
//!
//! Every axis (direction, action, protocol, profile set) is one [`AliasTable`]:
//! an ordered list of canonical values, each with a set of case-insensitive
//! aliases whose first entry is the canonical display string.
//!
//! Tables differ only in configuration:
//! - [`Combine::Single`] resolves one token to one value; [`Combine::Flags`]
//!   splits on commas and ORs the resolved bits, with a sentinel value that is
//!   parsed and formatted as a unit, never decomposed.
//! - [`Fallback`] decides how a value with no table entry is formatted.
//! - An optional numeric range lets bare decimal numbers parse directly.
//!   Numbers outside it fail with [`Error::OutOfRange`].
//!
//! Single-value tables match the whole input exactly (ignoring ASCII case);
//! flag tables trim whitespace around each comma-separated token.
//!
//! # Example
//!
//! ```
//! use winfw::core::alias::{PROFILES, PROTOCOLS};
//!
//! assert_eq!(PROTOCOLS.parse("tcp").unwrap(), 6);
//! assert_eq!(PROTOCOLS.format(9999), "9999");
//! assert_eq!(PROFILES.parse("dom, pub").unwrap(), 0x5);
//! assert_eq!(PROFILES.format(0x7FFF_FFFF), "Any");
//! ```

use crate::core::error::{Error, Result};
use crate::core::native::{
    NativeValue, PROFILE_DOMAIN, PROFILE_PRIVATE, PROFILE_PUBLIC, PROFILES_ALL, PROTOCOL_ANY,
    RuleAction, RuleDirection,
};
use std::ops::RangeInclusive;

/// The field an alias table resolves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Axis {
    Direction,
    Action,
    Protocol,
    Profile,
}

/// One canonical value and the spellings that resolve to it
#[derive(Debug)]
pub struct AliasEntry<V: 'static> {
    pub value: V,
    /// First alias is the canonical display string.
    pub aliases: &'static [&'static str],
}

/// How multiple tokens combine into one value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combine {
    /// Exactly one token, one value
    Single,
    /// Comma-separated tokens OR-ed together; `sentinel` is an opaque "all" value
    Flags { sentinel: i32 },
}

/// Formatting of values that have no table entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fallback {
    /// Closed enumerations: `"Unknown"`
    Unknown,
    /// Open numeric spaces: the decimal value itself
    Numeric,
}

/// An immutable, ordered alias table for one axis
#[derive(Debug)]
pub struct AliasTable<V: 'static> {
    axis: Axis,
    entries: &'static [AliasEntry<V>],
    combine: Combine,
    fallback: Fallback,
    numeric: Option<RangeInclusive<i32>>,
}

impl<V: NativeValue> AliasTable<V> {
    pub const fn new(
        axis: Axis,
        entries: &'static [AliasEntry<V>],
        combine: Combine,
        fallback: Fallback,
        numeric: Option<RangeInclusive<i32>>,
    ) -> Self {
        Self {
            axis,
            entries,
            combine,
            fallback,
            numeric,
        }
    }

    pub fn axis(&self) -> Axis {
        self.axis
    }

    pub fn entries(&self) -> &'static [AliasEntry<V>] {
        self.entries
    }

    /// Resolves text to its canonical value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnrecognizedAlias`] naming the first token that matches
    /// no alias (for flag tables, the specific offending comma-separated token),
    /// or [`Error::OutOfRange`] for a bare number outside the numeric range.
    pub fn parse(&self, text: &str) -> Result<V> {
        match self.combine {
            Combine::Single => self.resolve_token(text),
            Combine::Flags { .. } => {
                let mut bits = 0;
                for token in text.split(',').map(str::trim) {
                    bits |= self.resolve_token(token)?.to_raw();
                }
                Ok(V::from_raw(bits))
            }
        }
    }

    /// Formats a value with its canonical display alias.
    ///
    /// On flag tables a mask with no known bits (including `0`) formats as an
    /// empty string, which does not parse back.
    pub fn format(&self, value: V) -> String {
        match self.combine {
            Combine::Single => self
                .display_of(value)
                .map_or_else(|| self.fallback_text(value), str::to_string),
            Combine::Flags { sentinel } => {
                let raw = value.to_raw();
                if raw == sentinel {
                    return self
                        .display_of(value)
                        .map_or_else(|| self.fallback_text(value), str::to_string);
                }
                self.entries
                    .iter()
                    .filter(|e| {
                        let bit = e.value.to_raw();
                        bit != sentinel && raw & bit != 0
                    })
                    .map(|e| e.aliases[0])
                    .collect::<Vec<_>>()
                    .join(", ")
            }
        }
    }

    /// Rewrites any accepted spelling into the canonical display form.
    ///
    /// # Errors
    ///
    /// Same as [`AliasTable::parse`].
    pub fn canonicalize(&self, text: &str) -> Result<String> {
        self.parse(text).map(|v| self.format(v))
    }

    /// Returns `true` if `text` parses on this axis.
    pub fn is_valid(&self, text: &str) -> bool {
        self.parse(text).is_ok()
    }

    /// First alias appearing in more than one entry, or a numeric-looking alias
    /// on a table that also parses numbers.
    pub fn find_collision(&self) -> Option<&'static str> {
        for (i, entry) in self.entries.iter().enumerate() {
            for alias in entry.aliases {
                if self.numeric.is_some() && alias.parse::<i32>().is_ok() {
                    return Some(alias);
                }
                let duplicated = self.entries[i + 1..]
                    .iter()
                    .flat_map(|e| e.aliases.iter())
                    .any(|other| other.eq_ignore_ascii_case(alias));
                if duplicated {
                    return Some(alias);
                }
            }
        }
        None
    }

    fn resolve_token(&self, token: &str) -> Result<V> {
        if let Some(range) = &self.numeric
            && !token.is_empty()
            && token.bytes().all(|b| b.is_ascii_digit())
        {
            return token
                .parse::<i32>()
                .ok()
                .filter(|n| range.contains(n))
                .map(V::from_raw)
                .ok_or_else(|| Error::OutOfRange {
                    axis: self.axis,
                    token: token.to_string(),
                    min: *range.start(),
                    max: *range.end(),
                });
        }

        self.entries
            .iter()
            .find(|e| e.aliases.iter().any(|a| a.eq_ignore_ascii_case(token)))
            .map(|e| e.value)
            .ok_or_else(|| Error::UnrecognizedAlias {
                axis: self.axis,
                token: token.to_string(),
            })
    }

    fn display_of(&self, value: V) -> Option<&'static str> {
        self.entries
            .iter()
            .find(|e| e.value == value)
            .map(|e| e.aliases[0])
    }

    fn fallback_text(&self, value: V) -> String {
        match self.fallback {
            Fallback::Unknown => "Unknown".to_string(),
            Fallback::Numeric => value.to_raw().to_string(),
        }
    }
}

pub static DIRECTIONS: AliasTable<RuleDirection> = AliasTable::new(
    Axis::Direction,
    &[
        AliasEntry {
            value: RuleDirection::IN,
            aliases: &["Inbound", "in", "i"],
        },
        AliasEntry {
            value: RuleDirection::OUT,
            aliases: &["Outbound", "out", "o"],
        },
    ],
    Combine::Single,
    Fallback::Unknown,
    None,
);

pub static ACTIONS: AliasTable<RuleAction> = AliasTable::new(
    Axis::Action,
    &[
        AliasEntry {
            value: RuleAction::ALLOW,
            aliases: &["Allow", "accept", "a"],
        },
        AliasEntry {
            value: RuleAction::BLOCK,
            aliases: &["Deny", "block", "drop", "d"],
        },
    ],
    Combine::Single,
    Fallback::Unknown,
    None,
);

/// IANA protocol numbers the store commonly uses, plus the "any" pseudo-protocol.
pub static PROTOCOLS: AliasTable<i32> = AliasTable::new(
    Axis::Protocol,
    &[
        AliasEntry {
            value: 0,
            aliases: &["HOPOPT"],
        },
        AliasEntry {
            value: 1,
            aliases: &["ICMPv4", "ICMP4", "icmp", "icmp v4"],
        },
        AliasEntry {
            value: 2,
            aliases: &["IGMP"],
        },
        AliasEntry {
            value: 6,
            aliases: &["TCP"],
        },
        AliasEntry {
            value: 17,
            aliases: &["UDP"],
        },
        AliasEntry {
            value: 41,
            aliases: &["IPv6"],
        },
        AliasEntry {
            value: 43,
            aliases: &["IPv6-Route"],
        },
        AliasEntry {
            value: 44,
            aliases: &["IPv6-Frag"],
        },
        AliasEntry {
            value: 47,
            aliases: &["GRE"],
        },
        AliasEntry {
            value: 58,
            aliases: &["ICMPv6", "ICMP6", "icmp v6"],
        },
        AliasEntry {
            value: 59,
            aliases: &["IPv6-NoNxt"],
        },
        AliasEntry {
            value: 60,
            aliases: &["IPv6-Opts"],
        },
        AliasEntry {
            value: 112,
            aliases: &["VRRP"],
        },
        AliasEntry {
            value: 113,
            aliases: &["PGM"],
        },
        AliasEntry {
            value: 115,
            aliases: &["L2TP"],
        },
        AliasEntry {
            value: PROTOCOL_ANY,
            aliases: &["Any", "all", "*"],
        },
    ],
    Combine::Single,
    Fallback::Numeric,
    Some(0..=PROTOCOL_ANY),
);

/// Profile set bitmask. Display order follows entry order: Domain, Private, Public.
pub static PROFILES: AliasTable<i32> = AliasTable::new(
    Axis::Profile,
    &[
        AliasEntry {
            value: PROFILE_DOMAIN,
            aliases: &["Domain", "dom"],
        },
        AliasEntry {
            value: PROFILE_PRIVATE,
            aliases: &["Private", "priv", "pri"],
        },
        AliasEntry {
            value: PROFILE_PUBLIC,
            aliases: &["Public", "pub"],
        },
        AliasEntry {
            value: PROFILES_ALL,
            aliases: &["Any", "all", "*"],
        },
    ],
    Combine::Flags {
        sentinel: PROFILES_ALL,
    },
    Fallback::Unknown,
    None,
);

/// Canonicalizes `text` on the named axis.
///
/// # Errors
///
/// Returns [`Error::UnrecognizedAlias`] if `text` is not an accepted spelling.
pub fn canonicalize(axis: Axis, text: &str) -> Result<String> {
    match axis {
        Axis::Direction => DIRECTIONS.canonicalize(text),
        Axis::Action => ACTIONS.canonicalize(text),
        Axis::Protocol => PROTOCOLS.canonicalize(text),
        Axis::Profile => PROFILES.canonicalize(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_tables_have_disjoint_aliases() {
        assert_eq!(DIRECTIONS.find_collision(), None);
        assert_eq!(ACTIONS.find_collision(), None);
        assert_eq!(PROTOCOLS.find_collision(), None);
        assert_eq!(PROFILES.find_collision(), None);
    }

    #[test]
    fn test_direction_aliases() {
        assert_eq!(DIRECTIONS.parse("in").unwrap(), RuleDirection::IN);
        assert_eq!(DIRECTIONS.parse("INBOUND").unwrap(), RuleDirection::IN);
        assert_eq!(DIRECTIONS.parse("o").unwrap(), RuleDirection::OUT);
        assert_eq!(DIRECTIONS.format(RuleDirection::IN), "Inbound");
        assert_eq!(DIRECTIONS.format(RuleDirection(7)), "Unknown");
    }

    #[test]
    fn test_action_aliases() {
        assert_eq!(ACTIONS.parse("accept").unwrap(), RuleAction::ALLOW);
        assert_eq!(ACTIONS.parse("Block").unwrap(), RuleAction::BLOCK);
        assert_eq!(ACTIONS.parse("drop").unwrap(), RuleAction::BLOCK);
        assert_eq!(ACTIONS.format(RuleAction::BLOCK), "Deny");
        assert_eq!(ACTIONS.format(RuleAction(42)), "Unknown");
    }

    #[test]
    fn test_unknown_alias_names_token() {
        let err = DIRECTIONS.parse("sideways").unwrap_err();
        match err {
            Error::UnrecognizedAlias { axis, token } => {
                assert_eq!(axis, Axis::Direction);
                assert_eq!(token, "sideways");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(ACTIONS.parse("permit").is_err());
        assert!(PROTOCOLS.parse("sctp-ish").is_err());
    }

    #[test]
    fn test_no_prefix_matching() {
        assert!(DIRECTIONS.parse("inb").is_err());
        assert!(ACTIONS.parse("allo").is_err());
        assert!(PROTOCOLS.parse("tc").is_err());
    }

    #[test]
    fn test_protocol_numeric_and_alias() {
        assert_eq!(PROTOCOLS.parse("6").unwrap(), 6);
        assert_eq!(PROTOCOLS.parse("TCP").unwrap(), 6);
        assert_eq!(PROTOCOLS.parse("132").unwrap(), 132);
        assert_eq!(PROTOCOLS.format(6), "TCP");
        assert_eq!(PROTOCOLS.format(9999), "9999");
        assert_eq!(PROTOCOLS.format(132), "132");
        assert_eq!(PROTOCOLS.parse("*").unwrap(), PROTOCOL_ANY);
        assert_eq!(PROTOCOLS.parse("icmp v6").unwrap(), 58);
    }

    #[test]
    fn test_protocol_numeric_out_of_range_rejected() {
        match PROTOCOLS.parse("9999") {
            Err(Error::OutOfRange {
                axis,
                token,
                min,
                max,
            }) => {
                assert_eq!(axis, Axis::Protocol);
                assert_eq!(token, "9999");
                assert_eq!((min, max), (0, 256));
            }
            other => panic!("expected OutOfRange, got {other:?}"),
        }
        assert!(matches!(PROTOCOLS.parse("257"), Err(Error::OutOfRange { .. })));
        assert!(matches!(
            PROTOCOLS.parse("99999999999"),
            Err(Error::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_protocol_signed_numbers_are_not_numeric() {
        assert!(matches!(PROTOCOLS.parse("+6"), Err(Error::UnrecognizedAlias { .. })));
        assert!(matches!(PROTOCOLS.parse("-1"), Err(Error::UnrecognizedAlias { .. })));
        assert_eq!(PROTOCOLS.parse("006").unwrap(), 6);
    }

    #[test]
    fn test_single_value_input_is_not_trimmed() {
        assert!(DIRECTIONS.parse(" in ").is_err());
        assert!(ACTIONS.parse("allow ").is_err());
        assert_eq!(DIRECTIONS.parse("IN").unwrap(), RuleDirection::IN);
    }

    #[test]
    fn test_empty_profile_mask_formats_empty() {
        assert_eq!(PROFILES.format(0), "");
        assert!(PROFILES.parse(&PROFILES.format(0)).is_err());
    }

    #[test]
    fn test_profile_combination() {
        assert_eq!(PROFILES.parse("Domain, Private").unwrap(), 0x3);
        assert_eq!(PROFILES.format(0x3), "Domain, Private");
        assert_eq!(PROFILES.parse("public,dom").unwrap(), 0x5);
        assert_eq!(PROFILES.format(0x5), "Domain, Public");
        assert_eq!(PROFILES.parse("priv, Private, pri").unwrap(), 0x2);
    }

    #[test]
    fn test_profile_sentinel() {
        assert_eq!(PROFILES.parse("Any").unwrap(), PROFILES_ALL);
        assert_eq!(PROFILES.parse("all").unwrap(), PROFILES_ALL);
        assert_eq!(PROFILES.parse("*").unwrap(), PROFILES_ALL);
        assert_eq!(PROFILES.format(PROFILES_ALL), "Any");
        // All three named bits is not the sentinel
        assert_eq!(PROFILES.format(0x7), "Domain, Private, Public");
    }

    #[test]
    fn test_profile_unknown_token_is_named() {
        let err = PROFILES.parse("Domain, Work, Public").unwrap_err();
        assert!(matches!(
            err,
            Error::UnrecognizedAlias { axis: Axis::Profile, ref token } if token == "Work"
        ));
        assert!(PROFILES.parse("").is_err());
    }

    #[test]
    fn test_canonicalize() {
        assert_eq!(canonicalize(Axis::Direction, "out").unwrap(), "Outbound");
        assert_eq!(canonicalize(Axis::Protocol, "17").unwrap(), "UDP");
        assert_eq!(canonicalize(Axis::Profile, "pub, dom").unwrap(), "Domain, Public");
        assert!(PROFILES.is_valid("all"));
        assert!(!ACTIONS.is_valid("maybe"));
    }

    #[test]
    fn test_axis_from_str() {
        assert_eq!("Protocol".parse::<Axis>().unwrap(), Axis::Protocol);
        assert_eq!(Axis::Profile.to_string(), "profile");
    }

    fn any_alias<V: NativeValue>(
        table: &'static AliasTable<V>,
    ) -> impl Strategy<Value = (V, &'static str)> {
        let pairs: Vec<(V, &'static str)> = table
            .entries()
            .iter()
            .flat_map(|e| e.aliases.iter().map(move |a| (e.value, *a)))
            .collect();
        proptest::sample::select(pairs)
    }

    /// `format(parse(alias))` is the entry's display alias.
    fn formats_to_display_alias<V: NativeValue>(
        table: &AliasTable<V>,
        value: V,
        alias: &str,
    ) -> std::result::Result<(), TestCaseError> {
        let parsed = table
            .parse(alias)
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(parsed, value);
        let display = table
            .entries()
            .iter()
            .find(|e| e.value == value)
            .map(|e| e.aliases[0]);
        let formatted = table.format(parsed);
        prop_assert_eq!(Some(formatted.as_str()), display);
        Ok(())
    }

    proptest! {
        #[test]
        fn prop_direction_alias_formats_canonical((value, alias) in any_alias(&DIRECTIONS)) {
            formats_to_display_alias(&DIRECTIONS, value, alias)?;
        }

        #[test]
        fn prop_action_alias_formats_canonical((value, alias) in any_alias(&ACTIONS)) {
            formats_to_display_alias(&ACTIONS, value, alias)?;
        }

        #[test]
        fn prop_protocol_alias_formats_canonical((value, alias) in any_alias(&PROTOCOLS)) {
            formats_to_display_alias(&PROTOCOLS, value, alias)?;
        }

        #[test]
        fn prop_profile_alias_formats_canonical((value, alias) in any_alias(&PROFILES)) {
            formats_to_display_alias(&PROFILES, value, alias)?;
        }

        #[test]
        fn prop_protocol_alias_roundtrips_to_canonical((value, alias) in any_alias(&PROTOCOLS)) {
            let parsed = PROTOCOLS.parse(alias).unwrap();
            prop_assert_eq!(parsed, value);
            let canonical = PROTOCOLS.format(parsed);
            prop_assert_eq!(PROTOCOLS.parse(&canonical).unwrap(), value);
        }

        #[test]
        fn prop_alias_case_insensitive((value, alias) in any_alias(&DIRECTIONS)) {
            prop_assert_eq!(DIRECTIONS.parse(&alias.to_uppercase()).unwrap(), value);
            prop_assert_eq!(DIRECTIONS.parse(&alias.to_lowercase()).unwrap(), value);
        }

        #[test]
        fn prop_unmapped_protocol_formats_as_number(n in 257i32..100_000) {
            prop_assert_eq!(PROTOCOLS.format(n), n.to_string());
        }

        #[test]
        fn prop_profile_bits_roundtrip(bits in 1i32..=7) {
            let text = PROFILES.format(bits);
            prop_assert_eq!(PROFILES.parse(&text).unwrap(), bits);
            prop_assert_ne!(text, "Any");
        }
    }
}
