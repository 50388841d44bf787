//! Custom Test Assertions
//!
//! Assertion helpers for decisions and tracker results that print the
//! whole decision or error on failure.

use core_kernel::PortError;
use domain_priorauth::{Disposition, DispositionDecision, MergedClaimView, PriorAuthError};

/// Asserts the disposition and the review action that goes with it
pub fn assert_decision(decision: &DispositionDecision, expected: Disposition) {
    assert_eq!(
        decision.disposition, expected,
        "Unexpected disposition for claim {}: {:?}",
        decision.claim_id, decision
    );
    assert_eq!(
        decision.review_action,
        expected.review_action(),
        "Review action does not match disposition {}",
        expected
    );
}

/// Asserts that a series view is complete and lists exactly `received`
pub fn assert_complete_series(view: &MergedClaimView, received: &[u32]) {
    assert!(view.complete, "Expected a complete series, got {:?}", view);
    assert_eq!(view.received, received, "Unexpected received parts");
}

/// Asserts that a series view still waits for parts
pub fn assert_incomplete_series(view: &MergedClaimView) {
    assert!(!view.complete, "Expected an incomplete series, got {:?}", view);
}

/// Asserts that a port result is `NotFound`
pub fn assert_port_not_found<T: std::fmt::Debug>(result: &Result<T, PortError>) {
    match result {
        Err(error) if error.is_not_found() => {}
        other => panic!("Expected NotFound, got {:?}", other),
    }
}

/// Asserts that a port result is `Conflict`
pub fn assert_port_conflict<T: std::fmt::Debug>(result: &Result<T, PortError>) {
    match result {
        Err(error) if error.is_conflict() => {}
        other => panic!("Expected Conflict, got {:?}", other),
    }
}

/// Asserts that an engine result is a client error (malformed or unknown claim)
pub fn assert_client_error<T: std::fmt::Debug>(result: &Result<T, PriorAuthError>) {
    match result {
        Err(error) if error.is_client_error() => {}
        other => panic!("Expected a client error, got {:?}", other),
    }
}
