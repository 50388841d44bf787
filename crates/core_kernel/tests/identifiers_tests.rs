//! Unit tests for the identifiers module
//!
//! Covers minted identifiers (creation, parsing, display) and the
//! document-supplied claim identifier.

use core_kernel::{ClaimId, DecisionId, SubmissionId};
use uuid::Uuid;

mod submission_id_tests {
    use super::*;

    #[test]
    fn test_new_generates_unique_ids() {
        let id1 = SubmissionId::new();
        let id2 = SubmissionId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_new_v7_generates_time_ordered_ids() {
        let id1 = SubmissionId::new_v7();
        std::thread::sleep(std::time::Duration::from_millis(1));
        let id2 = SubmissionId::new_v7();
        let uuid1: Uuid = id1.into();
        let uuid2: Uuid = id2.into();
        assert!(uuid1 < uuid2);
    }

    #[test]
    fn test_from_uuid() {
        let uuid = Uuid::new_v4();
        let id = SubmissionId::from_uuid(uuid);
        assert_eq!(*id.as_uuid(), uuid);
    }

    #[test]
    fn test_prefix() {
        assert_eq!(SubmissionId::prefix(), "SUB");
    }

    #[test]
    fn test_from_str_without_prefix() {
        let uuid = Uuid::new_v4();
        let parsed: SubmissionId = uuid.to_string().parse().unwrap();
        assert_eq!(*parsed.as_uuid(), uuid);
    }

    #[test]
    fn test_from_str_invalid() {
        let result: Result<SubmissionId, _> = "SUB-not-a-uuid".parse();
        assert!(result.is_err());
    }

    #[test]
    fn test_json_serialization() {
        let id = SubmissionId::new();
        let json = serde_json::to_string(&id).unwrap();
        let deserialized: SubmissionId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, deserialized);
    }
}

mod decision_id_tests {
    use super::*;

    #[test]
    fn test_display_format() {
        let id = DecisionId::new_v7();
        assert!(id.to_string().starts_with("DEC-"));
    }

    #[test]
    fn test_round_trip_through_display() {
        let original = DecisionId::new();
        let parsed: DecisionId = original.to_string().parse().unwrap();
        assert_eq!(original, parsed);
    }
}

mod claim_id_tests {
    use super::*;

    #[test]
    fn test_keeps_value_verbatim() {
        let id = ClaimId::new(" PA-0001").unwrap();
        assert_eq!(id.as_str(), " PA-0001");
        assert_eq!(id.to_string(), " PA-0001");
    }

    #[test]
    fn test_blank_is_rejected() {
        assert!(ClaimId::new("\t").is_none());
    }

    #[test]
    fn test_ordering_is_lexicographic() {
        let a = ClaimId::new("a").unwrap();
        let b = ClaimId::new("b").unwrap();
        assert!(a < b);
    }

    #[test]
    fn test_deserializes_from_plain_string() {
        let id: ClaimId = serde_json::from_str("\"claim-9\"").unwrap();
        assert_eq!(id.as_ref(), "claim-9");
    }
}
