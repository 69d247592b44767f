use super::*;

#[test]
fn http_status_mapping() {
    assert_eq!(AppError::user("bad_input", "oops").http_status(), 400);
    assert_eq!(AppError::io("io", "io").http_status(), 503);
    assert_eq!(AppError::config("config", "bad").http_status(), 500);
}

#[test]
fn aggregation_error_mapping() {
    let e: AppError = AggregationError::unavailable("eduid", "connection refused").into();
    assert_eq!(e.http_status(), 503);
    assert_eq!(e.code_str(), "backend_unavailable");
    assert!(e.message().contains("eduid"));

    let e: AppError = AggregationError::malformed("orcid", "expected array").into();
    assert_eq!(e.code_str(), "malformed_response");

    let e: AppError = AggregationError::Configuration("duplicate id".into()).into();
    assert_eq!(e.http_status(), 500);
    assert_eq!(e.code_str(), "configuration");

    let e: AppError = AggregationError::MissingRequiredInput { authority: "eduid".into(), attribute: "eppn".into() }.into();
    assert_eq!(e.http_status(), 400);
    assert_eq!(e.code_str(), "missing_required_input");
}

#[test]
fn backend_failure_classification() {
    assert!(AggregationError::unavailable("a", "x").is_backend_failure());
    assert!(AggregationError::malformed("a", "x").is_backend_failure());
    let missing = AggregationError::MissingRequiredInput { authority: "a".into(), attribute: "b".into() };
    assert!(!missing.is_backend_failure());
    assert_eq!(missing.authority(), Some("a"));
    assert!(!AggregationError::Configuration("x".into()).is_backend_failure());
    assert_eq!(AggregationError::Configuration("x".into()).authority(), None);
}

#[test]
fn app_error_serializes_tagged() {
    let v = serde_json::to_value(AppError::io("backend_unavailable", "down")).unwrap();
    assert_eq!(v["type"], "io");
    assert_eq!(v["code"], "backend_unavailable");
    assert_eq!(v["message"], "down");
}
