//! Prior-Authorization Domain
//!
//! Decides the disposition of prior-authorization claims submitted as
//! request bundles, either whole or as a series of differential parts.
//!
//! # Flow
//!
//! ```text
//! Bundle ──► extractor ──► SubmissionTracker ──► RulesTable ──► Disposition
//!            (Claim)       (merge parts,         (first match
//!                           completeness)         wins)
//! ```
//!
//! # Examples
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use core_kernel::StdRandom;
//! use domain_priorauth::{
//!     DecisionEngine, EngineConfig, InMemorySubmissionTracker, JsonRuleSource, RulesTable,
//! };
//!
//! let rules = RulesTable::populated(JsonRuleSource::embedded_default(), Arc::new(StdRandom::from_entropy()))?;
//! let engine = DecisionEngine::new(
//!     Arc::new(rules),
//!     Arc::new(InMemorySubmissionTracker::new()),
//!     EngineConfig::default(),
//! )?;
//!
//! let disposition = engine.compute_disposition(&bundle, 1).await?;
//! ```

pub mod bundle;
pub mod claim;
pub mod extractor;
pub mod disposition;
pub mod rules;
pub mod series;
pub mod engine;
pub mod error;
pub mod ports;
pub mod adapters;

pub use bundle::{
    Bundle, BundleEntry, ClaimResource, CodeableConcept, Coding, DiagnosisComponent, Extension,
    ItemComponent, Meta, Quantity, Reference, Resource,
    PART_COUNT_EXTENSION_URL, SECURITY_SUBSETTED, SECURITY_SYSTEM_URL,
};
pub use claim::{Claim, ClaimItem};
pub use extractor::{extract, is_differential};
pub use disposition::{Disposition, ReviewAction};
pub use rules::{
    JsonRuleSource, Predicate, Rule, RuleSource, RulesDocument, RulesError, RulesTable,
    StaticRuleSource, DEFAULT_RULES_JSON,
};
pub use series::{MergedClaimView, SeriesState, SubmissionSeries};
pub use engine::{DecisionEngine, DispositionDecision, EngineConfig, DEFAULT_MAX_MERGE_RETRIES};
pub use error::PriorAuthError;
pub use ports::{series_not_found, SubmissionTracker, SERIES_ENTITY};
pub use adapters::InMemorySubmissionTracker;
