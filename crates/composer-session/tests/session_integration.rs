#![allow(clippy::unwrap_used, clippy::expect_used)]

use composer_session::{
    CookieSessionSerializer, ResponseWithSession, Session, SessionFragment, SessionHandler,
    SessionRoot,
};
use http::header::{COOKIE, SET_COOKIE};
use http::{Request, Response, StatusCode};

/// Helper: a fragment session as a backend would send it.
fn fragment(headers: &[(&str, &str)]) -> Session {
    let mut builder = Response::builder().status(StatusCode::OK);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let response = builder.body(()).unwrap();
    Session::from(SessionFragment::from_headers(response.headers()))
}

#[test]
fn test_reads_session_data_from_response() {
    let session = fragment(&[("x-rd-some-key", "value"), ("ignored-key", "ignored-value")]);
    assert_eq!(session.get("some-key"), Some("value"));
    assert_eq!(session.get("ignored-key"), None);
}

#[test]
fn test_merges_two_fragments() {
    let first = fragment(&[("x-rd-first-key", "first-value")]);
    let second = fragment(&[("x-rd-second-key", "second-value")]);

    let result = first.with_values_merged_from(&second);
    assert_eq!(result.get("first-key"), Some("first-value"));
    assert_eq!(result.get("second-key"), Some("second-value"));
}

#[test]
fn test_later_session_wins_on_conflict() {
    let a = fragment(&[("x-rd-k", "a"), ("x-rd-only-a", "1")]);
    let b = fragment(&[("x-rd-k", "b"), ("x-rd-only-b", "2")]);

    let merged = a.with_values_merged_from(&b);
    assert_eq!(merged.get("k"), Some("b"));
    assert_eq!(merged.get("only-a"), Some("1"));
    assert_eq!(merged.get("only-b"), Some("2"));
}

#[test]
fn test_enriches_request_with_session_headers() {
    let session = SessionRoot::of([("some-key", "value")])
        .with_values_merged_from(&fragment(&[("x-rd-other-key", "other-value")]));
    let request = Session::from(session).enrich(Request::get("/some/path").body(()).unwrap());

    assert_eq!(request.headers().get("x-rd-some-key").unwrap(), "value");
    assert_eq!(request.headers().get("x-rd-other-key").unwrap(), "other-value");
    assert_eq!(request.uri().path(), "/some/path");
}

#[test]
fn test_is_dirty_if_new_attributes_are_merged() {
    let root = SessionRoot::of([("first-key", "first-value")]);
    let result = root.with_values_merged_from(&fragment(&[("x-rd-second-key", "second-value")]));
    assert!(result.is_dirty());
}

#[test]
fn test_is_not_dirty_if_same_attribute_and_value_is_merged() {
    let root = SessionRoot::of([("first-key", "first-value")]);
    let result = root.with_values_merged_from(&fragment(&[("x-rd-first-key", "first-value")]));
    assert!(!result.is_dirty());
}

#[test]
fn test_is_dirty_after_changing_attribute_value() {
    let root = SessionRoot::of([("first-key", "first-value")]);
    let result = root.with_values_merged_from(&fragment(&[("x-rd-first-key", "second-value")]));
    assert!(result.is_dirty());
    assert_eq!(result.get("first-key"), Some("second-value"));
}

#[test]
fn test_value_comparison_is_case_sensitive() {
    let root = SessionRoot::of([("k", "value")]);
    let result = root.with_values_merged_from(&fragment(&[("x-rd-k", "VALUE")]));
    assert!(result.is_dirty());
}

#[test]
fn test_dirty_is_monotonic() {
    let root = SessionRoot::of([("k", "v")])
        .with_values_merged_from(&fragment(&[("x-rd-k", "changed")]))
        .with_values_merged_from(&fragment(&[("x-rd-k", "changed")]));
    assert!(root.is_dirty());
}

#[test]
fn test_does_not_overwrite_session_id() {
    let initial = SessionRoot::empty().with_id("initialSessionId");
    let merged = initial.with_values_merged_from(&fragment(&[("x-rd-session-id", "otherSessionId")]));
    assert_eq!(merged.id(), Some("initialSessionId"));
}

#[test]
fn test_session_id_can_be_adopted_when_absent() {
    let merged = SessionRoot::empty().with_values_merged_from(&fragment(&[("x-rd-session-id", "fromBackend")]));
    assert_eq!(merged.id(), Some("fromBackend"));
    assert!(merged.is_dirty());
}

#[test]
fn test_allows_removal_of_session_attributes() {
    let root = SessionRoot::of([("key", "value"), ("other", "kept")]);
    let merged = root.with_values_merged_from(&fragment(&[("x-rd-key", "")]));
    assert_eq!(merged.get("key"), None);
    assert_eq!(merged.get("other"), Some("kept"));
    assert!(merged.is_dirty());
}

#[test]
fn test_cookie_roundtrip_through_handler() {
    let handler = SessionHandler::new(CookieSessionSerializer::new("rdsession"));

    // First request: no cookie, a backend sets a value.
    let (first, _) = Request::get("/").body(()).unwrap().into_parts();
    let session = handler.initialize(&first);
    let merged = session.with_values_merged_from(&fragment(&[("x-rd-cart", "3")]));
    let response = handler
        .store(ResponseWithSession::new(
            Response::new("page".to_string()),
            merged,
        ))
        .unwrap();
    let set_cookie = response.headers().get(SET_COOKIE).unwrap().to_str().unwrap();
    let cookie = set_cookie.split(';').next().unwrap().to_string();

    // Second request carries the cookie back.
    let (second, _) = Request::get("/").header(COOKIE, cookie).body(()).unwrap().into_parts();
    let session = handler.initialize(&second);
    assert_eq!(session.get("cart"), Some("3"));
    assert!(!session.is_dirty());

    // Nothing changes, so nothing is written.
    let response = handler
        .store(ResponseWithSession::new(Response::new(String::new()), session))
        .unwrap();
    assert!(response.headers().get(SET_COOKIE).is_none());
}
