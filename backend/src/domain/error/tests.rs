//! Tests for error construction and serialisation.

use super::*;
use rstest::{fixture, rstest};
use serde_json::json;

#[fixture]
fn rule_violation() -> Error {
    Error::conflict("book cannot move from archived to draft").with_field("status")
}

#[rstest]
fn invalid_request_constructor_sets_code() {
    let err = Error::invalid_request("bad");
    assert_eq!(err.code(), ErrorCode::InvalidRequest);
    assert!(err.field().is_none());
}

#[rstest]
fn try_new_rejects_empty_messages() {
    let result = Error::try_new(ErrorCode::InvalidRequest, "   ");
    assert!(matches!(result, Err(ErrorValidationError::EmptyMessage)));
}

#[rstest]
fn new_falls_back_to_generic_message_when_blank() {
    let err = Error::new(ErrorCode::NotFound, "");
    assert_eq!(err.message(), "resource not found");
}

#[rstest]
#[case(ErrorCode::DuplicateInProgress, true)]
#[case(ErrorCode::ServiceUnavailable, true)]
#[case(ErrorCode::Conflict, false)]
#[case(ErrorCode::InvalidRequest, false)]
#[case(ErrorCode::InternalError, false)]
fn retryable_codes_are_transient_failures(#[case] code: ErrorCode, #[case] expected: bool) {
    assert_eq!(Error::new(code, "x").is_retryable(), expected);
}

#[rstest]
fn display_includes_field_when_present(rule_violation: Error) {
    assert_eq!(
        rule_violation.to_string(),
        "book cannot move from archived to draft (status)"
    );
}

#[rstest]
fn serialises_with_camel_case_and_skips_missing_fields() {
    let err = Error::duplicate_in_progress("retry later");
    let value = serde_json::to_value(&err).expect("serialise error");
    assert_eq!(
        value,
        json!({"code": "duplicate_in_progress", "message": "retry later"})
    );
}

#[rstest]
fn round_trips_field_and_details(rule_violation: Error) {
    let err = rule_violation.with_details(json!({"from": "archived"}));
    let value = serde_json::to_value(&err).expect("serialise error");
    let parsed: Error = serde_json::from_value(value).expect("deserialise error");
    assert_eq!(parsed, err);
}

#[rstest]
fn deserialising_blank_message_fails() {
    let result: Result<Error, _> =
        serde_json::from_value(json!({"code": "conflict", "message": "  "}));
    assert!(result.is_err());
}
