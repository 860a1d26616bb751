//! Protection policy: identifiers that may never be terminated.
//!
//! The policy is a read-only lookup consulted by the attempt runner before any
//! OS request and by the whitelist store before removing an entry. It is kept
//! apart from the whitelist so hardcoded safety rules and user choices can be
//! audited separately.

use std::collections::BTreeSet;

use tracing::{debug, warn};

/// Core OS applications that must keep running.
pub const DEFAULT_PROTECTED_IDS: &[&str] = &[
    "com.apple.finder",
    "com.apple.dock",
    "com.apple.WindowServer",
    "com.apple.loginwindow",
    "com.apple.systemuiserver",
    "com.apple.controlcenter",
    "com.apple.notificationcenterui",
];

/// Prefixes covering helper agents of the protected applications.
pub const DEFAULT_PROTECTED_PREFIXES: &[&str] = &[
    "com.apple.dock.",
    "com.apple.loginwindow.",
    "com.apple.systemuiserver.",
    "com.apple.CoreServices.",
];

/// Identifiers the self-check expects to be protected besides self.
const SELF_CHECK_IDS: &[&str] = &["com.apple.finder", "com.apple.dock"];

/// Why an identifier is protected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtectionReason {
    /// The identifier belongs to the controlling application.
    SelfApplication,
    /// Exact match against the protected set.
    SystemProcess(String),
    /// Prefix match against the protected prefix list.
    SystemPrefix(String),
}

impl std::fmt::Display for ProtectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtectionReason::SelfApplication => write!(f, "cannot quit itself"),
            ProtectionReason::SystemProcess(id) => {
                write!(f, "{} is a protected system process", id)
            }
            ProtectionReason::SystemPrefix(prefix) => {
                write!(f, "identifiers starting with {} are protected", prefix)
            }
        }
    }
}

/// Static set of identifiers and prefixes that can never be terminated.
///
/// Matching is ASCII case-insensitive.
#[derive(Debug, Clone)]
pub struct ProtectionPolicy {
    self_id: String,
    /// Lowercased exact identifiers, self included.
    exact: BTreeSet<String>,
    /// Original spelling of the exact identifiers, self first.
    listed: Vec<String>,
    /// Lowercased prefixes.
    prefixes: Vec<String>,
}

impl ProtectionPolicy {
    /// Policy with the default system list, protecting `self_id` as well.
    pub fn new(self_id: impl Into<String>) -> Self {
        Self::with_rules(
            self_id,
            DEFAULT_PROTECTED_IDS.iter().copied(),
            DEFAULT_PROTECTED_PREFIXES.iter().copied(),
        )
    }

    /// Policy with explicit rules. `self_id` is always protected.
    pub fn with_rules<'a>(
        self_id: impl Into<String>,
        ids: impl IntoIterator<Item = &'a str>,
        prefixes: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        let self_id = self_id.into().trim().to_string();
        let mut exact = BTreeSet::new();
        let mut listed = Vec::new();

        let mut insert = |id: &str| {
            let id = id.trim();
            if !id.is_empty() && exact.insert(id.to_ascii_lowercase()) {
                listed.push(id.to_string());
            }
        };
        insert(&self_id);
        for id in ids {
            insert(id);
        }

        let prefixes = prefixes
            .into_iter()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_ascii_lowercase)
            .collect();

        Self {
            self_id,
            exact,
            listed,
            prefixes,
        }
    }

    /// Bundle identifier of the controlling application.
    pub fn self_id(&self) -> &str {
        &self.self_id
    }

    /// Check if an identifier may never be terminated.
    pub fn is_protected(&self, id: &str) -> bool {
        self.protection_reason(id).is_some()
    }

    /// Reason an identifier is protected. Exact matches win over prefixes.
    pub fn protection_reason(&self, id: &str) -> Option<ProtectionReason> {
        let id = id.trim();
        let lowered = id.to_ascii_lowercase();

        if !lowered.is_empty() && lowered == self.self_id.to_ascii_lowercase() {
            return Some(ProtectionReason::SelfApplication);
        }
        if self.exact.contains(&lowered) {
            return Some(ProtectionReason::SystemProcess(id.to_string()));
        }
        self.prefixes
            .iter()
            .find(|prefix| lowered.starts_with(prefix.as_str()))
            .map(|prefix| ProtectionReason::SystemPrefix(prefix.clone()))
    }

    /// Self plus the exact protected identifiers, in their original spelling.
    pub fn protected_identifiers(&self) -> impl Iterator<Item = &str> {
        self.listed.iter().map(String::as_str)
    }

    /// Identifiers that should be protected but are not.
    ///
    /// A blank self identifier protects nothing and is reported as missing.
    pub fn validate(&self) -> Vec<String> {
        std::iter::once(self.self_id.as_str())
            .chain(SELF_CHECK_IDS.iter().copied())
            .filter(|id| !self.is_protected(id))
            .map(str::to_string)
            .collect()
    }

    /// Run [`validate`](Self::validate) and log each failure.
    ///
    /// Failures are warnings only; the caller keeps running.
    pub fn self_check(&self) -> bool {
        let missing = self.validate();
        for id in &missing {
            warn!(bundle_id = %id, "Protection self-check failed: identifier is not protected");
        }
        if missing.is_empty() {
            debug!(self_id = %self.self_id, "Protection self-check passed");
        }
        missing.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SELF_ID: &str = "com.example.quitter";

    #[test]
    fn test_defaults_are_protected() {
        let policy = ProtectionPolicy::new(SELF_ID);
        for id in DEFAULT_PROTECTED_IDS {
            assert!(policy.is_protected(id), "{} should be protected", id);
        }
        assert!(policy.is_protected(SELF_ID));
        assert!(!policy.is_protected("com.apple.Safari"));
    }

    #[test]
    fn test_reason_precedence() {
        let policy = ProtectionPolicy::new(SELF_ID);

        assert_eq!(
            policy.protection_reason(SELF_ID),
            Some(ProtectionReason::SelfApplication)
        );
        assert_eq!(
            policy.protection_reason("com.apple.dock"),
            Some(ProtectionReason::SystemProcess("com.apple.dock".to_string()))
        );
        assert_eq!(
            policy.protection_reason("com.apple.dock.extra"),
            Some(ProtectionReason::SystemPrefix("com.apple.dock.".to_string()))
        );
        assert_eq!(policy.protection_reason("com.apple.Safari"), None);
    }

    #[test]
    fn test_case_insensitive() {
        let policy = ProtectionPolicy::new(SELF_ID);
        assert!(policy.is_protected("com.apple.Finder"));
        assert!(policy.is_protected("COM.APPLE.WINDOWSERVER"));
        assert!(policy.is_protected("com.apple.coreservices.uiagent"));
    }

    #[test]
    fn test_protected_identifiers_include_self_first() {
        let policy = ProtectionPolicy::new(SELF_ID);
        let ids: Vec<&str> = policy.protected_identifiers().collect();
        assert_eq!(ids[0], SELF_ID);
        assert_eq!(ids.len(), DEFAULT_PROTECTED_IDS.len() + 1);
    }

    #[test]
    fn test_self_check() {
        assert!(ProtectionPolicy::new(SELF_ID).self_check());

        let weak = ProtectionPolicy::with_rules(SELF_ID, ["com.apple.dock"], []);
        assert_eq!(weak.validate(), vec!["com.apple.finder".to_string()]);
        assert!(!weak.self_check());
    }

    #[test]
    fn test_with_rules_protects_self_and_listed() {
        let policy = ProtectionPolicy::with_rules(
            format!("  {}  ", SELF_ID),
            ["com.example.agent", " ", "COM.EXAMPLE.AGENT"],
            ["com.example.helper."],
        );

        assert_eq!(policy.self_id(), SELF_ID);
        let ids: Vec<&str> = policy.protected_identifiers().collect();
        assert_eq!(ids, vec![SELF_ID, "com.example.agent"]);
        assert!(policy.is_protected("com.example.helper.sync"));
    }

    #[test]
    fn test_blank_self_id_fails_self_check() {
        let policy = ProtectionPolicy::new("   ");

        assert_eq!(policy.protection_reason(""), None);
        assert_eq!(policy.validate(), vec![String::new()]);
        assert!(!policy.self_check());
    }
}
