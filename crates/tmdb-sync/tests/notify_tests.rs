//! Webhook delivery tests against a mock endpoint

use serde_json::json;
use wiremock::matchers::{body_json, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tmdb_sync::config::WebhookConfig;
use tmdb_sync::notify::Notifier;

fn webhook(server: &MockServer, max_attempts: u32) -> WebhookConfig {
    WebhookConfig {
        enabled: true,
        url: Some(format!("{}/hook", server.uri())),
        username: Some("svc".to_string()),
        password: Some("secret".to_string()),
        max_attempts,
        retry_delay_secs: 0,
    }
}

#[tokio::test]
async fn test_delivered_after_retry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .and(header_exists("authorization"))
        .and(body_json(json!({"content": "**TMDB Service:** Running scheduled full sweep."})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .with_priority(2)
        .mount(&server)
        .await;

    let notifier = Notifier::new(webhook(&server, 3));
    assert!(notifier.notify("**TMDB Service:** Running scheduled full sweep.").await);
}

#[tokio::test]
async fn test_gives_up_after_max_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(204))
        .expect(2)
        .mount(&server)
        .await;

    let notifier = Notifier::new(webhook(&server, 2));
    assert!(!notifier.notify("hello").await);
}

#[tokio::test]
async fn test_disabled_or_incomplete_sends_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    assert!(!Notifier::disabled().notify("hello").await);

    let mut config = webhook(&server, 3);
    config.password = None;
    assert!(!Notifier::new(config).notify("hello").await);
}
