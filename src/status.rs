//! Consent status derivation.
//!
//! A consent's aggregate status is computed from the statuses of its
//! authorization resources by walking an ordered rule table. The table is
//! configuration, so an organization can remap its status vocabulary
//! without code changes.

use crate::settings::ConsentSettings;
use serde::{Deserialize, Serialize};

/// How a rule's status set is matched against the authorization statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleMatch {
    /// At least one authorization status is in the set
    Any,
    /// Every authorization status is in the set
    All,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivationRule {
    pub when: RuleMatch,
    pub statuses: Vec<String>,
    pub result: String,
}

impl DerivationRule {
    fn matches(&self, statuses: &[&str]) -> bool {
        let in_set = |s: &&str| self.statuses.iter().any(|r| r.eq_ignore_ascii_case(s));
        match self.when {
            RuleMatch::Any => statuses.iter().any(in_set),
            RuleMatch::All => statuses.iter().all(in_set),
        }
    }
}

/// Compiled status derivation table.
#[derive(Debug, Clone)]
pub struct StatusPolicy {
    rules: Vec<DerivationRule>,
    empty: String,
    fallback: String,
}

impl StatusPolicy {
    pub fn new(rules: Vec<DerivationRule>, empty: String, fallback: String) -> Self {
        Self {
            rules,
            empty,
            fallback,
        }
    }

    pub fn from_settings(consent: &ConsentSettings) -> Self {
        Self::new(
            consent.derivation_rules(),
            consent.status.awaiting.clone(),
            consent.fallback_status().to_string(),
        )
    }

    /// Map the authorization statuses of one consent to its aggregate status.
    ///
    /// An empty list means nothing has been authorized yet. Otherwise the
    /// first matching rule wins; when none matches the fallback applies,
    /// which keeps mixed lists from ever reaching an approved state.
    pub fn derive<S: AsRef<str>>(&self, statuses: &[S]) -> String {
        if statuses.is_empty() {
            return self.empty.clone();
        }
        let statuses: Vec<&str> = statuses.iter().map(|s| s.as_ref()).collect();
        self.rules
            .iter()
            .find(|rule| rule.matches(&statuses))
            .map(|rule| rule.result.clone())
            .unwrap_or_else(|| self.fallback.clone())
    }
}

impl Default for StatusPolicy {
    fn default() -> Self {
        Self::from_settings(&ConsentSettings::default())
    }
}
