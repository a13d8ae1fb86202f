//! Tests for connection identity

use super::*;
use pretty_assertions::assert_eq;

fn identity() -> ConnectionIdentity {
    ConnectionIdentity::new("db.internal", "monitor", "postgres").with_password("s3cret")
}

#[test]
fn test_new_uses_default_port() {
    let identity = ConnectionIdentity::new("localhost", "postgres", "postgres");
    assert_eq!(identity.port, 5432);
    assert_eq!(identity.password, None);
    assert_eq!(identity.application_name, None);
}

#[test]
fn test_derive_overrides_selected_fields() {
    let base = identity().with_port(5433);
    let derived = base.derive(IdentityOverrides::default().dbname("app").user("reader"));

    assert_eq!(derived.dbname, "app");
    assert_eq!(derived.user, "reader");
    assert_eq!(derived.host, "db.internal");
    assert_eq!(derived.port, 5433);
    assert_eq!(derived.password.as_deref(), Some("s3cret"));

    // The source identity is untouched
    assert_eq!(base.dbname, "postgres");
    assert_eq!(base.user, "monitor");
}

#[test]
fn test_derive_without_overrides_is_equal() {
    let base = identity();
    assert_eq!(base.derive(IdentityOverrides::default()), base);
}

#[test]
fn test_connect_params_default_database() {
    let params = identity().connect_params(None);
    assert_eq!(params.dbname, "postgres");
    assert_eq!(params.application_name, DEFAULT_APPLICATION_NAME);
    assert!(params.decode.numeric_as_float);
}

#[test]
fn test_connect_params_for_other_database() {
    let params = identity()
        .with_application_name("probe")
        .connect_params(Some("billing"));
    assert_eq!(params.dbname, "billing");
    assert_eq!(params.application_name, "probe");
    assert_eq!(params.user, "monitor");
}

#[test]
fn test_display_and_debug_hide_password() {
    let identity = identity();
    assert_eq!(identity.to_string(), "monitor@db.internal:5432/postgres");

    let debug = format!("{:?}", identity);
    assert!(!debug.contains("s3cret"), "password leaked: {debug}");
    let debug = format!("{:?}", identity.connect_params(None));
    assert!(!debug.contains("s3cret"), "password leaked: {debug}");
}

#[test]
fn test_deserialize_applies_defaults() {
    let identity: ConnectionIdentity = serde_json::from_str(
        r#"{"host": "localhost", "user": "postgres", "dbname": "postgres"}"#,
    )
    .unwrap();
    assert_eq!(identity.port, 5432);
    assert_eq!(identity.password, None);
}
