//! Response envelopes and client builders

use factiva_news::{ApiClient, ApiConfig, Config, UserKey};
use serde_json::{Value, json};
use std::time::Duration;

/// Account key used by every mock-server test
pub const TEST_KEY: &str = "abcd1234abcd1234abcd1234abcd1234";

/// Subscription id in the shape the service hands out
pub const TEST_SUBSCRIPTION: &str = "dj-synhub-stream-abc123-filtered-xyz";

/// Config pointing at a mock server, with fast polling
pub fn test_config(host: &str) -> Config {
    let mut config = Config {
        api: ApiConfig {
            host: host.to_string(),
            ..Default::default()
        },
        ..Config::default()
    };
    config.jobs.poll_interval = Duration::from_millis(20);
    config
}

/// Client for a mock server
pub fn test_client(config: &Config) -> ApiClient {
    ApiClient::new(&config.api, UserKey::new(TEST_KEY).unwrap()).unwrap()
}

/// Job envelope with a state and optional self link
pub fn job_envelope(id: &str, state: &str, link: Option<&str>) -> Value {
    let mut body = json!({
        "data": {"id": id, "attributes": {"current_state": state}}
    });
    if let Some(link) = link {
        body["links"] = json!({"self": link});
    }
    body
}

/// Finished extraction envelope listing `files`
pub fn done_extraction(id: &str, files: &[String]) -> Value {
    let files: Vec<Value> = files.iter().map(|uri| json!({"uri": uri})).collect();
    json!({
        "data": {
            "id": id,
            "attributes": {
                "current_state": "JOB_STATE_DONE",
                "format": "avro",
                "files": files
            }
        }
    })
}

/// Queue payload carrying one news record
pub fn news_payload(n: usize, action: &str) -> Vec<u8> {
    json!({
        "data": [{
            "id": format!("doc-{n}"),
            "attributes": {"action": action, "an": format!("DJDN{n:010}")}
        }]
    })
    .to_string()
    .into_bytes()
}
