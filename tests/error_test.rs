use std::time::Duration;

use tessera::{Result, TesseraError};

#[test]
fn test_error_display() {
    let err = TesseraError::LoadFailed {
        candidate: "Qwen2.5-1.5B".to_string(),
        message: "out of memory".to_string(),
    };
    let msg = err.to_string();
    assert!(msg.contains("Qwen2.5-1.5B"));
    assert!(msg.contains("out of memory"));
}

#[test]
fn all_candidates_failed_names_the_last_error() {
    let err = TesseraError::AllCandidatesFailed {
        attempted: 3,
        last_error: "shader compilation failed".to_string(),
    };
    let msg = err.to_string();
    assert!(msg.contains('3'));
    assert!(msg.contains("shader compilation failed"));
}

#[test]
fn timeout_names_the_operation() {
    let err = TesseraError::Timeout {
        operation: "generation",
        after: Duration::from_secs(30),
    };
    assert_eq!(err.to_string(), "generation timed out after 30s");
}

#[test]
fn test_result_alias() {
    fn returns_error() -> Result<()> {
        Err(TesseraError::NoBackend)
    }
    assert!(returns_error().is_err());
}

// ============================================================================
// Fallback classification
// ============================================================================

#[test]
fn only_cancellation_skips_fallback() {
    assert!(TesseraError::Cancelled.is_cancelled());
    assert!(!TesseraError::Cancelled.should_fall_back());

    let failures = [
        TesseraError::EmptyResponse,
        TesseraError::Generation("boom".into()),
        TesseraError::ModelUnavailable("error state".into()),
        TesseraError::Storage("disk full".into()),
        TesseraError::Timeout {
            operation: "model load",
            after: Duration::from_secs(120),
        },
    ];
    for err in failures {
        assert!(!err.is_cancelled(), "{err}");
        assert!(err.should_fall_back(), "{err}");
    }
}

#[test]
fn errors_are_cloneable_for_broadcast() {
    let err = TesseraError::Generation("shared".into());
    let copy = err.clone();
    assert_eq!(err.to_string(), copy.to_string());
}

// ============================================================================
// Conversions
// ============================================================================

#[test]
fn from_serde_json() {
    let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
    let err: TesseraError = json_err.into();
    assert!(matches!(err, TesseraError::Serialization(_)));
}

#[test]
fn from_io() {
    let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
    let err: TesseraError = io_err.into();
    assert!(matches!(err, TesseraError::Storage(ref msg) if msg.contains("read-only")));
}
