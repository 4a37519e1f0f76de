use llmfanout_core::config::{ConfigSnapshot, SelectionPolicy, DEFAULT_MIN_RESPONSE_LENGTH};

const MINIMAL: &str = r#"{
  "credential_groups": [
    { "name": "group1", "credentials": ["sk-aaaaaaaaaaaaaaaa"] },
    { "name": "group2", "credentials": ["sk-bbbbbbbbbbbbbbbb"] }
  ]
}"#;

#[test]
fn minimal_config_fills_defaults() {
    let snapshot = ConfigSnapshot::from_json_str(MINIMAL).expect("parse");
    assert_eq!(snapshot.server.port, 8080);
    assert_eq!(snapshot.server.min_response_length, DEFAULT_MIN_RESPONSE_LENGTH);
    assert_eq!(
        snapshot.arbitration.selection_policy,
        SelectionPolicy::FirstAcceptable
    );
    assert_eq!(
        snapshot.upstream_chat_url(),
        "https://generativelanguage.googleapis.com/v1beta/openai/chat/completions"
    );
    assert_eq!(snapshot.listen_addr(), "0.0.0.0:8080");
}

#[test]
fn base_url_and_path_are_normalized() {
    let raw = r#"{
      "upstream": { "base_url": " http://127.0.0.1:9000/v1/ ", "chat_path": "chat/completions" },
      "credential_groups": [{ "name": " a ", "credentials": [" sk-cccccccccccc "] }]
    }"#;
    let snapshot = ConfigSnapshot::from_json_str(raw).expect("parse");
    assert_eq!(snapshot.upstream_chat_url(), "http://127.0.0.1:9000/v1/chat/completions");
    let group = snapshot.group(0).expect("group");
    assert_eq!(group.name(), "a");
    assert_eq!(group.credentials(), ["sk-cccccccccccc".to_string()]);
}

#[test]
fn selection_policy_reads_snake_case() {
    let raw = r#"{
      "arbitration": { "selection_policy": "best_of_window", "collection_window_secs": 3 },
      "credential_groups": [{ "name": "g", "credentials": [] }]
    }"#;
    let snapshot = ConfigSnapshot::from_json_str(raw).expect("parse");
    assert_eq!(snapshot.arbitration.selection_policy, SelectionPolicy::BestOfWindow);
    assert_eq!(snapshot.arbitration.collection_window_secs, 3);
    assert_eq!(SelectionPolicy::parse("Best-Of-Window"), Some(SelectionPolicy::BestOfWindow));
    assert_eq!(SelectionPolicy::parse("first"), Some(SelectionPolicy::FirstAcceptable));
    assert_eq!(SelectionPolicy::parse("random"), None);
}

#[test]
fn rejects_invalid_documents() {
    let err = ConfigSnapshot::from_json_str("{ not json").unwrap_err();
    assert!(err.contains("invalid config json"));

    let err = ConfigSnapshot::from_json_str(r#"{ "credential_groups": [] }"#).unwrap_err();
    assert!(err.contains("at least one credential group"));

    let duplicate = r#"{ "credential_groups": [
        { "name": "g", "credentials": [] },
        { "name": "g", "credentials": [] }
    ] }"#;
    let err = ConfigSnapshot::from_json_str(duplicate).unwrap_err();
    assert!(err.contains("duplicate credential group name"));

    let bad_scheme = r#"{
      "upstream": { "base_url": "ftp://example.com" },
      "credential_groups": [{ "name": "g" }]
    }"#;
    let err = ConfigSnapshot::from_json_str(bad_scheme).unwrap_err();
    assert!(err.contains("http or https"));

    let zero_timeout = r#"{
      "server": { "request_timeout_secs": 0 },
      "credential_groups": [{ "name": "g" }]
    }"#;
    let err = ConfigSnapshot::from_json_str(zero_timeout).unwrap_err();
    assert!(err.contains("request_timeout_secs"));
}

#[test]
fn placeholder_config_round_trips_and_has_no_eligible_credentials() {
    let snapshot = ConfigSnapshot::with_placeholder_groups();
    let text = snapshot.to_pretty_json().expect("serialize");
    let reparsed = ConfigSnapshot::from_json_str(&text).expect("reparse");
    assert_eq!(reparsed, snapshot);
    assert_eq!(reparsed.group_count(), 2);
    for idx in 0..reparsed.group_count() {
        let group = reparsed.group(idx).expect("group");
        assert_eq!(group.len(), 4);
        assert!(group.eligible().is_empty());
    }
}
