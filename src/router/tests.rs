use crate::spec::{load_spec_str, SpecError};
use http::Method;

const USERS: &str = r#"
openapi: 3.1.0
info: { title: Users, version: "1.2.0" }
servers:
  - url: https://example.com/api/v1
paths:
  /:
    get:
      operationId: index
      responses: { "200": { description: OK } }
  /users:
    get:
      operationId: listUsers
      responses: { "200": { description: OK } }
  /users/{userId}:
    parameters:
      - { name: userId, in: path, required: true, schema: { type: integer } }
    get:
      operationId: getUser
      responses: { "200": { description: OK } }
"#;

#[test]
fn test_base_path_is_stripped_and_reprefixed() {
    let spec = load_spec_str(USERS).unwrap();
    assert_eq!(spec.base_path(), "/api/v1");

    let m = spec.resolve("GET", "/api/v1/users/482").unwrap();
    assert_eq!(m.method, Method::GET);
    assert_eq!(m.template, "/api/v1/users/{userId}");
    assert_eq!(m.operation_id.as_deref(), Some("getUser"));
}

#[test]
fn test_outside_base_path_is_no_match() {
    let spec = load_spec_str(USERS).unwrap();
    assert!(spec.resolve("GET", "/other/users").is_none());
    assert!(spec.resolve("GET", "/users").is_none());
    assert!(spec.resolve("GET", "/api/v1users").is_none());
}

#[test]
fn test_root_template_resolves_to_base_path() {
    let spec = load_spec_str(USERS).unwrap();
    assert_eq!(spec.resolve("GET", "/api/v1").unwrap().template, "/api/v1");
    assert_eq!(spec.resolve("GET", "/api/v1/").unwrap().template, "/api/v1");
}

#[test]
fn test_query_and_fragment_are_ignored() {
    let spec = load_spec_str(USERS).unwrap();
    let m = spec.resolve("GET", "/api/v1/users?limit=10#top").unwrap();
    assert_eq!(m.template, "/api/v1/users");
    assert!(spec.resolve("GET", "/api/v1/users/abc?id=1").is_none());
}

#[test]
fn test_method_token_is_case_sensitive() {
    let spec = load_spec_str(USERS).unwrap();
    assert!(spec.resolve("get", "/api/v1/users").is_none());
    assert!(spec.resolve("TRACE", "/api/v1/users").is_none());
    assert!(spec.resolve("POST", "/api/v1/users").is_none());
    assert!(spec.resolve("G E T", "/api/v1/users").is_none());
}

#[test]
fn test_meta_counts_endpoints() {
    let spec = load_spec_str(USERS).unwrap();
    let meta = spec.meta();
    assert_eq!(meta.title, "Users");
    assert_eq!(meta.version, "1.2.0");
    assert_eq!(meta.endpoint_count, 3);

    let routes: Vec<_> = spec
        .routes()
        .into_iter()
        .map(|(m, leaf)| format!("{m} {}", leaf.template))
        .collect();
    assert_eq!(routes, vec!["GET /", "GET /users", "GET /users/{userId}"]);
}

#[test]
fn test_missing_parameter_aborts_load() {
    let doc = r#"
openapi: 3.1.0
info: { title: Broken, version: "1" }
paths:
  /orders/{orderId}:
    get:
      parameters:
        - { name: orderId, in: query, schema: { type: integer } }
      responses: { "200": { description: OK } }
"#;
    match load_spec_str(doc) {
        Err(SpecError::MissingParameterDeclaration { method, segment, .. }) => {
            assert_eq!(method, Method::GET);
            assert_eq!(segment, "{orderId}");
        }
        other => panic!("expected missing declaration, got {other:?}"),
    }
}

#[test]
fn test_no_servers_means_empty_base_path() {
    let doc = r#"
openapi: 3.1.0
info: { title: Bare, version: "1" }
paths:
  /ping:
    head:
      responses: { "200": { description: OK } }
"#;
    let spec = load_spec_str(doc).unwrap();
    assert_eq!(spec.base_path(), "");
    assert_eq!(spec.resolve("HEAD", "/ping").unwrap().template, "/ping");
    assert!(spec.resolve("GET", "/ping").is_none());
}

#[test]
fn test_resolution_is_idempotent() {
    let spec = load_spec_str(USERS).unwrap();
    let first = spec.resolve("GET", "/api/v1/users/7");
    let second = spec.resolve("GET", "/api/v1/users/7");
    assert_eq!(first, second);
}
