//! Chain files loaded from disk and run against mock backends.

use std::fs;

use serde_json::{json, Value};

use http_chain::config::{load_config, ConfigError};

mod common;
use common::{http_response, start_programmable_backend};

#[tokio::test]
async fn test_chain_file_end_to_end() {
    let backend = start_programmable_backend(|_, raw| {
        let text = String::from_utf8_lossy(raw);
        if text.starts_with("POST /login") {
            http_response(
                "200 OK",
                Some("application/json"),
                r#"{"session":{"token":"s-1"}}"#,
            )
        } else if text.contains("authorization: Bearer s-1") {
            http_response("200 OK", Some("application/json"), r#"{"name":"alice"}"#)
        } else {
            http_response("401 Unauthorized", None, "")
        }
    })
    .await;

    let dir = tempfile::tempdir().unwrap();
    let requests = dir.path().join("requests");
    fs::create_dir(&requests).unwrap();
    fs::write(
        requests.join("login.req"),
        "POST /login HTTP/1.1\r\nHost: api.local\r\nContent-Type: application/json\r\nContent-Length: 2\r\n\r\n{\"user\":\"\"}",
    )
    .unwrap();
    fs::write(
        requests.join("profile.req"),
        format!("GET /profile HTTP/1.1\r\nHost: 127.0.0.1:{}\r\n\r\n", backend.port()),
    )
    .unwrap();

    let config_path = dir.path().join("chains.toml");
    fs::write(
        &config_path,
        format!(
            r#"
            [settings]
            request_dir = "requests"
            vars_file = "vars.json"

            [vars]
            username = "alice"

            [[chains]]
            name = "auth"
            [[chains.steps]]
            name = "login.req"
            host = "127.0.0.1"
            port = {port}
            use_tls = false
            timeout = 2.0
            import.body = {{ ".user" = "{{{{ username }}}}" }}
            export.request.body.vars = [{{ key = ".user", name = "sent_user" }}]
            export.response.body.vars = [{{ key = ".session.token", name = "token" }}]

            [[chains]]
            name = "main"
            [[chains.steps]]
            name = "profile.req"
            use_tls = false
            timeout = 2.0
            import.headers = {{ Authorization = "Bearer {{{{ token }}}}" }}
            export.response.body.vars = [{{ key = ".name", name = "profile_name" }}]
            [[chains.steps.events]]
            conditions = {{ status = "401" }}
            triggers = {{ chains = ["auth"] }}
            "#,
            port = backend.port()
        ),
    )
    .unwrap();

    let loaded = load_config(&config_path).unwrap();
    let mut vars = loaded.global_vars().unwrap();
    let outcome = loaded
        .registry
        .run("main", &mut vars, loaded.proxy.as_ref(), loaded.settings.max_chain_depth)
        .await
        .unwrap();

    assert!(!outcome.is_skipped());
    assert_eq!(backend.hits(), 3);
    assert!(backend.requests()[1].ends_with(r#"{"user":"alice"}"#));
    assert_eq!(vars.get("token"), Some(&json!("s-1")));
    assert_eq!(vars.get("sent_user"), Some(&json!("alice")));
    assert_eq!(vars.get("profile_name"), Some(&json!("alice")));

    let saved: Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join("vars.json")).unwrap()).unwrap();
    assert_eq!(saved["token"], json!("s-1"));
    assert_eq!(saved["profile_name"], json!("alice"));
}

#[test]
fn test_invalid_event_rejected_at_load() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.req"), "GET / HTTP/1.1\r\nHost: h\r\n\r\n").unwrap();
    let config_path = dir.path().join("chains.toml");
    fs::write(
        &config_path,
        r#"
        [[chains]]
        name = "main"
        [[chains.steps]]
        name = "a.req"
        [[chains.steps.events]]
        conditions = { status = "500" }
        "#,
    )
    .unwrap();

    match load_config(&config_path) {
        Err(ConfigError::Validation(errors)) => {
            assert_eq!(errors.len(), 1);
            assert!(errors[0].to_string().contains("event must have triggers"));
        }
        other => panic!("unexpected result: {other:?}"),
    }
}
