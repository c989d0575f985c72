use crate::core::alias::Axis;
use thiserror::Error;

/// Core error types for winfw
#[derive(Debug, Error)]
pub enum Error {
    /// Input token matched no alias on the given axis
    #[error("Unrecognized {axis} alias: '{token}'")]
    UnrecognizedAlias { axis: Axis, token: String },

    /// Numeric input outside the values the axis accepts
    #[error("{axis} number {token} is outside the accepted range {min}..={max}")]
    OutOfRange {
        axis: Axis,
        token: String,
        min: i32,
        max: i32,
    },

    /// Caller supplied an empty or otherwise unusable required field
    #[error("Validation error in {field}: {message}")]
    Validation { field: String, message: String },

    /// The policy store rejected or failed an operation
    #[error("Policy store error: {message}")]
    Store { message: String, code: Option<i32> },
}

impl Error {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn store(message: impl Into<String>) -> Self {
        Error::Store {
            message: message.into(),
            code: None,
        }
    }

    /// Soft failures are bad input rather than a store rejection.
    pub fn is_soft(&self) -> bool {
        matches!(self, Error::Validation { .. })
    }
}

/// Represents a translated error with helpful context
#[derive(Debug, Clone)]
pub struct ErrorTranslation {
    pub user_message: String,
    pub suggestions: Vec<String>,
    pub help_url: Option<String>,
}

impl ErrorTranslation {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            user_message: message.into(),
            suggestions: Vec::new(),
            help_url: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn with_help(mut self, url: impl Into<String>) -> Self {
        self.help_url = Some(url.into());
        self
    }
}

/// Database of policy store error patterns and their translations
pub struct StoreErrorPattern;

impl StoreErrorPattern {
    /// Matches an error message against known patterns and returns a user-friendly translation.
    pub fn match_error(msg: &str) -> ErrorTranslation {
        let lower = msg.to_lowercase();

        // E_ACCESSDENIED
        if lower.contains("access is denied") || lower.contains("0x80070005") {
            return ErrorTranslation::new("Insufficient privileges to modify firewall policy")
                .with_suggestion("Run winfw from an elevated (Administrator) prompt")
                .with_suggestion("Check whether Group Policy locks local firewall rules")
                .with_help("https://learn.microsoft.com/en-us/windows/security/operating-system-security/network-security/windows-firewall/");
        }

        // REGDB_E_CLASSNOTREG / firewall service down
        if lower.contains("class not registered")
            || lower.contains("0x80040154")
            || lower.contains("0x800706d9")
            || lower.contains("service has not been started")
        {
            return ErrorTranslation::new("Windows Firewall service is not available")
                .with_suggestion("Check the service state: sc query mpssvc")
                .with_suggestion("Start it with: net start mpssvc")
                .with_suggestion("The policy store is only reachable on Windows hosts");
        }

        // E_INVALIDARG, usually ports on a protocol that cannot carry them
        if lower.contains("parameter is incorrect")
            || lower.contains("0x80070057")
            || lower.contains("invalid parameter")
        {
            return ErrorTranslation::new("The firewall rejected a rule field value")
                .with_suggestion("Ports are only valid for TCP and UDP rules")
                .with_suggestion("Set the protocol before assigning ports")
                .with_suggestion("Example valid port lists: 80, 80,443, 5000-5010");
        }

        // ERROR_NOT_FOUND / ERROR_FILE_NOT_FOUND
        if lower.contains("element not found")
            || lower.contains("0x80070490")
            || lower.contains("0x80070002")
        {
            return ErrorTranslation::new("Firewall rule not found")
                .with_suggestion("List rules with: winfw list")
                .with_suggestion("Rule names are matched case-insensitively but must be exact");
        }

        // Unknown alias tokens
        if lower.contains("unrecognized") && lower.contains("alias") {
            return ErrorTranslation::new("Unrecognized value")
                .with_suggestion("Check accepted spellings with: winfw resolve <axis> <text>")
                .with_suggestion("Profiles may be combined with commas: \"Private, Public\"");
        }

        if lower.contains("outside the accepted range") {
            return ErrorTranslation::new("Number out of range")
                .with_suggestion("Protocol numbers run from 0 to 256 (256 = Any)")
                .with_suggestion("Named protocols are also accepted, e.g. TCP, UDP, ICMPv4");
        }

        // Generic fallback
        ErrorTranslation::new(format!("Firewall error: {msg}"))
            .with_suggestion("Check the detailed error message for more information")
            .with_suggestion("Inspect the log file in the winfw state directory")
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_denied_translation() {
        let translation = StoreErrorPattern::match_error("Access is denied. (0x80070005)");
        assert!(translation.user_message.contains("privileges"));
        assert!(
            translation
                .suggestions
                .iter()
                .any(|s| s.contains("Administrator"))
        );
        assert!(translation.help_url.is_some());
    }

    #[test]
    fn test_service_unavailable_translation() {
        let translation = StoreErrorPattern::match_error("Class not registered");
        assert!(translation.user_message.contains("service"));
        assert!(translation.suggestions.iter().any(|s| s.contains("mpssvc")));
    }

    #[test]
    fn test_invalid_parameter_translation() {
        let translation = StoreErrorPattern::match_error("The parameter is incorrect.");
        assert!(translation.suggestions.iter().any(|s| s.contains("TCP and UDP")));
    }

    #[test]
    fn test_alias_error_translation() {
        let err = Error::UnrecognizedAlias {
            axis: Axis::Direction,
            token: "sideways".to_string(),
        };
        let translation = StoreErrorPattern::match_error(&err.to_string());
        assert_eq!(translation.user_message, "Unrecognized value");
    }

    #[test]
    fn test_out_of_range_translation() {
        let err = Error::OutOfRange {
            axis: Axis::Protocol,
            token: "9999".to_string(),
            min: 0,
            max: 256,
        };
        assert_eq!(
            err.to_string(),
            "protocol number 9999 is outside the accepted range 0..=256"
        );
        let translation = StoreErrorPattern::match_error(&err.to_string());
        assert_eq!(translation.user_message, "Number out of range");
    }

    #[test]
    fn test_generic_fallback() {
        let translation = StoreErrorPattern::match_error("something odd");
        assert!(translation.user_message.contains("something odd"));
        assert!(translation.help_url.is_none());
    }

    #[test]
    fn test_error_display() {
        let err = Error::UnrecognizedAlias {
            axis: Axis::Profile,
            token: "Work".to_string(),
        };
        assert_eq!(err.to_string(), "Unrecognized profile alias: 'Work'");
        assert!(Error::validation("DisplayName", "empty").is_soft());
        assert!(!Error::store("boom").is_soft());
    }
}
