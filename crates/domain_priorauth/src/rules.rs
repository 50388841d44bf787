//! Rules Table
//!
//! An ordered collection of authorization rules, each mapping a predicate
//! over claim attributes to a [`Disposition`]. The table is populated once
//! from a [`RuleSource`] and is read-only afterwards, so matching needs no
//! locking.
//!
//! # Rules document
//!
//! ```json
//! {
//!   "rules": [
//!     {
//!       "id": "deny-x9",
//!       "priority": 20,
//!       "when": { "anyItemCode": ["X9"] },
//!       "disposition": "Denied"
//!     },
//!     {
//!       "id": "grant-standard",
//!       "priority": 100,
//!       "when": { "anyItemCode": ["A1", "A2", "A3"] },
//!       "disposition": "Granted"
//!     }
//!   ]
//! }
//! ```
//!
//! Rules are evaluated by ascending `priority`; rules sharing a priority
//! keep their document order. The first rule whose predicate holds wins.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use core_kernel::RandomSource;

use crate::claim::{Claim, ClaimItem};
use crate::disposition::Disposition;

/// Embedded default rules document
pub const DEFAULT_RULES_JSON: &str = include_str!("../rules/default_rules.json");

/// Errors that can occur while loading rules
#[derive(Debug, Error)]
pub enum RulesError {
    /// Failed to parse rules JSON
    #[error("Failed to parse rules: {0}")]
    ParseError(String),

    /// Rules file not found or unreadable
    #[error("Rules file not found: {0}")]
    FileNotFound(String),

    /// A rule failed validation
    #[error("Invalid rule {rule_id}: {reason}")]
    InvalidRule { rule_id: String, reason: String },

    /// The table was used before `populate` succeeded
    #[error("Rules table has not been populated")]
    NotPopulated,
}

impl RulesError {
    fn invalid(rule_id: impl Into<String>, reason: impl Into<String>) -> Self {
        RulesError::InvalidRule {
            rule_id: rule_id.into(),
            reason: reason.into(),
        }
    }
}

/// Predicate over claim attributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Predicate {
    /// Always holds
    Always,
    /// Some item carries one of the codes
    AnyItemCode(Vec<String>),
    /// The claim has items and every one carries one of the codes
    EveryItemCode(Vec<String>),
    /// Some claim-level diagnosis carries one of the codes
    AnyDiagnosis(Vec<String>),
    /// Some item (optionally restricted to `code`) requests at least `threshold`
    QuantityAtLeast {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
        threshold: Decimal,
    },
    /// Some item (optionally restricted to `code`) requests more than `threshold`
    QuantityAbove {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
        threshold: Decimal,
    },
    /// The claim has at least this many items
    ItemCountAtLeast(usize),
    All(Vec<Predicate>),
    Any(Vec<Predicate>),
    Not(Box<Predicate>),
    /// Holds for roughly one claim in `one_in`, drawn from the table's random source
    Sample {
        #[serde(rename = "oneIn")]
        one_in: u32,
    },
}

impl Predicate {
    /// Shorthand for `AnyItemCode`
    pub fn any_item_code<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Predicate::AnyItemCode(codes.into_iter().map(Into::into).collect())
    }

    /// Evaluates the predicate against a claim
    pub fn holds(&self, claim: &Claim, random: &dyn RandomSource) -> bool {
        match self {
            Predicate::Always => true,
            Predicate::AnyItemCode(codes) => claim.items().any(|item| contains(codes, &item.code)),
            Predicate::EveryItemCode(codes) => {
                !claim.items.is_empty() && claim.items().all(|item| contains(codes, &item.code))
            }
            Predicate::AnyDiagnosis(codes) => {
                claim.diagnoses.values().any(|code| contains(codes, code))
            }
            Predicate::QuantityAtLeast { code, threshold } => {
                quantity_matches(claim, code.as_deref(), |q| q >= *threshold)
            }
            Predicate::QuantityAbove { code, threshold } => {
                quantity_matches(claim, code.as_deref(), |q| q > *threshold)
            }
            Predicate::ItemCountAtLeast(count) => claim.items.len() >= *count,
            Predicate::All(predicates) => predicates.iter().all(|p| p.holds(claim, random)),
            Predicate::Any(predicates) => predicates.iter().any(|p| p.holds(claim, random)),
            Predicate::Not(predicate) => !predicate.holds(claim, random),
            Predicate::Sample { one_in } => matches!(random.draw(*one_in), Ok(1)),
        }
    }

    fn validate(&self, rule_id: &str) -> Result<(), RulesError> {
        match self {
            Predicate::Sample { one_in: 0 } => {
                Err(RulesError::invalid(rule_id, "sample.oneIn must be at least 1"))
            }
            Predicate::All(predicates) | Predicate::Any(predicates) => {
                predicates.iter().try_for_each(|p| p.validate(rule_id))
            }
            Predicate::Not(predicate) => predicate.validate(rule_id),
            _ => Ok(()),
        }
    }
}

fn contains(codes: &[String], code: &str) -> bool {
    codes.iter().any(|c| c == code)
}

fn quantity_matches(claim: &Claim, code: Option<&str>, test: impl Fn(Decimal) -> bool) -> bool {
    claim
        .items()
        .filter(|item| code.map_or(true, |c| item.code == c))
        .filter_map(|item: &ClaimItem| item.quantity)
        .any(test)
}

/// An authorization rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// Unique rule identifier
    pub id: String,
    /// Evaluation position; lower runs first
    #[serde(default)]
    pub priority: i32,
    /// Predicate that selects claims
    pub when: Predicate,
    /// Outcome when the predicate holds
    pub disposition: Disposition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Rule {
    /// Creates a rule
    pub fn new(
        id: impl Into<String>,
        priority: i32,
        when: Predicate,
        disposition: Disposition,
    ) -> Self {
        Self {
            id: id.into(),
            priority,
            when,
            disposition,
            description: None,
        }
    }

    /// Sets the human-readable description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A serialized set of rules
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RulesDocument {
    #[serde(default)]
    pub rules: Vec<Rule>,
}

impl RulesDocument {
    /// Parses a rules document from JSON
    pub fn from_json(json: &str) -> Result<Self, RulesError> {
        serde_json::from_str(json).map_err(|e| RulesError::ParseError(e.to_string()))
    }

    /// Checks ids are present and unique and predicates are well formed
    pub fn validate(&self) -> Result<(), RulesError> {
        let mut seen = HashSet::new();
        for rule in &self.rules {
            if rule.id.trim().is_empty() {
                return Err(RulesError::invalid("<blank>", "rule id must not be blank"));
            }
            if !seen.insert(rule.id.as_str()) {
                return Err(RulesError::invalid(&rule.id, "duplicate rule id"));
            }
            rule.when.validate(&rule.id)?;
        }
        Ok(())
    }
}

/// Where a rules table gets its rules from
pub trait RuleSource: Send + Sync + fmt::Debug {
    /// Loads the rules document
    fn load(&self) -> Result<RulesDocument, RulesError>;

    /// Short description for logs
    fn describe(&self) -> String;
}

/// Rules read from a JSON document
#[derive(Debug, Clone)]
pub enum JsonRuleSource {
    File(PathBuf),
    Inline(String),
}

impl JsonRuleSource {
    /// Reads rules from a JSON file at populate time
    pub fn from_file(path: impl AsRef<Path>) -> Self {
        JsonRuleSource::File(path.as_ref().to_path_buf())
    }

    /// Reads rules from a JSON string
    pub fn from_json(json: impl Into<String>) -> Self {
        JsonRuleSource::Inline(json.into())
    }

    /// The embedded default table
    pub fn embedded_default() -> Self {
        JsonRuleSource::Inline(DEFAULT_RULES_JSON.to_string())
    }
}

impl RuleSource for JsonRuleSource {
    fn load(&self) -> Result<RulesDocument, RulesError> {
        match self {
            JsonRuleSource::File(path) => {
                let content = std::fs::read_to_string(path)
                    .map_err(|_| RulesError::FileNotFound(path.display().to_string()))?;
                RulesDocument::from_json(&content)
            }
            JsonRuleSource::Inline(json) => RulesDocument::from_json(json),
        }
    }

    fn describe(&self) -> String {
        match self {
            JsonRuleSource::File(path) => format!("file {}", path.display()),
            JsonRuleSource::Inline(_) => "inline JSON".to_string(),
        }
    }
}

/// Rules supplied directly as values
#[derive(Debug, Clone, Default)]
pub struct StaticRuleSource {
    rules: Vec<Rule>,
}

impl StaticRuleSource {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }
}

impl RuleSource for StaticRuleSource {
    fn load(&self) -> Result<RulesDocument, RulesError> {
        Ok(RulesDocument {
            rules: self.rules.clone(),
        })
    }

    fn describe(&self) -> String {
        format!("{} static rules", self.rules.len())
    }
}

/// The populated, ordered rule set
pub struct RulesTable {
    source: Box<dyn RuleSource>,
    random: Arc<dyn RandomSource>,
    rules: OnceCell<Vec<Rule>>,
}

impl fmt::Debug for RulesTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RulesTable")
            .field("source", &self.source)
            .field("rules", &self.rules.get().map(Vec::len))
            .finish()
    }
}

impl RulesTable {
    /// Creates an unpopulated table over a source
    pub fn new(source: impl RuleSource + 'static, random: Arc<dyn RandomSource>) -> Self {
        Self {
            source: Box::new(source),
            random,
            rules: OnceCell::new(),
        }
    }

    /// Creates and populates a table in one step
    pub fn populated(
        source: impl RuleSource + 'static,
        random: Arc<dyn RandomSource>,
    ) -> Result<Self, RulesError> {
        let table = Self::new(source, random);
        table.populate()?;
        Ok(table)
    }

    /// Loads, validates and orders the rules
    ///
    /// Idempotent: once populated, later calls return the loaded rule count
    /// without touching the source again.
    ///
    /// # Errors
    ///
    /// Returns the source's load error or a validation error. The table
    /// stays unpopulated on failure.
    pub fn populate(&self) -> Result<usize, RulesError> {
        let rules = self.rules.get_or_try_init(|| {
            let document = self.source.load()?;
            document.validate()?;

            let mut rules = document.rules;
            // sort_by_key is stable, so equal priorities keep document order
            rules.sort_by_key(|rule| rule.priority);

            info!(
                source = %self.source.describe(),
                rules = rules.len(),
                "Rules table populated"
            );
            Ok::<_, RulesError>(rules)
        })?;
        Ok(rules.len())
    }

    /// Returns true once `populate` has succeeded
    pub fn is_populated(&self) -> bool {
        self.rules.get().is_some()
    }

    /// The rules in evaluation order (empty until populated)
    pub fn rules(&self) -> &[Rule] {
        self.rules.get().map(Vec::as_slice).unwrap_or(&[])
    }

    /// Returns the first rule whose predicate holds
    pub fn first_match(&self, claim: &Claim) -> Option<&Rule> {
        self.rules()
            .iter()
            .find(|rule| rule.when.holds(claim, self.random.as_ref()))
    }

    /// Matches a claim; no matching rule yields `Unknown`
    pub fn matches(&self, claim: &Claim) -> Disposition {
        if !self.is_populated() {
            warn!(claim_id = %claim.id, "Rules table matched before population");
            return Disposition::Unknown;
        }

        match self.first_match(claim) {
            Some(rule) => {
                debug!(claim_id = %claim.id, rule_id = %rule.id, disposition = %rule.disposition, "Rule matched");
                rule.disposition
            }
            None => {
                debug!(claim_id = %claim.id, "No rule matched");
                Disposition::Unknown
            }
        }
    }
}
