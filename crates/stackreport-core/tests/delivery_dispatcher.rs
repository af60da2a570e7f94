//! Tests for the webhook delivery gate and retries.

mod support;

use stackreport_core::config::EndpointSettings;
use stackreport_core::delivery::{DeliveryDispatcher, DeliveryError, TransportError};
use stackreport_core::payload::{CollectedMetadata, LocalMetadata, Payload, assemble};

use support::{RecordingWebhook, config, event, response};

fn payload() -> Payload {
    let config = config();
    assemble(
        &event("Create"),
        &LocalMetadata::from(&config),
        &CollectedMetadata::default(),
    )
    .unwrap()
}

fn endpoint(kind: Option<&str>, url: Option<&str>) -> EndpointSettings {
    EndpointSettings {
        kind: kind.map(String::from),
        url: url.map(String::from),
    }
}

#[tokio::test]
async fn unset_endpoint_type_makes_no_request() {
    let webhook = RecordingWebhook::new();
    let endpoint = endpoint(None, Some("https://hooks.example.com/x"));

    let err = DeliveryDispatcher::new(&webhook, &endpoint, 3)
        .deliver(&payload())
        .await
        .unwrap_err();

    assert!(matches!(err, DeliveryError::ConfigurationMissing { .. }));
    assert_eq!(webhook.request_count(), 0);
}

#[tokio::test]
async fn non_http_url_makes_no_request() {
    let webhook = RecordingWebhook::new();
    let endpoint = endpoint(Some("API"), Some("ftp://hooks.example.com/x"));

    let err = DeliveryDispatcher::new(&webhook, &endpoint, 3)
        .deliver(&payload())
        .await
        .unwrap_err();

    assert!(matches!(err, DeliveryError::ConfigurationMissing { .. }));
    assert_eq!(webhook.request_count(), 0);
}

#[tokio::test]
async fn posts_payload_json_once() {
    let webhook = RecordingWebhook::new();
    let endpoint = endpoint(Some("REST_API"), Some("https://hooks.example.com/deployments"));
    let payload = payload();

    let outcome = DeliveryDispatcher::new(&webhook, &endpoint, 3)
        .deliver(&payload)
        .await
        .unwrap();

    assert_eq!(outcome.http_status, 200);
    assert_eq!(outcome.body, "ok");
    let requests = webhook.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].0.as_str(), "https://hooks.example.com/deployments");
    assert_eq!(requests[0].1, payload.to_json().unwrap());
}

#[tokio::test(start_paused = true)]
async fn retries_transient_transport_errors() {
    let webhook = RecordingWebhook::scripted(vec![
        Err(TransportError::Timeout("slow".to_string())),
        Err(TransportError::Connect("refused".to_string())),
        Ok(response(201, "created")),
    ]);
    let endpoint = endpoint(Some("API"), Some("https://hooks.example.com/deployments"));

    let outcome = DeliveryDispatcher::new(&webhook, &endpoint, 3)
        .deliver(&payload())
        .await
        .unwrap();

    assert_eq!(outcome.http_status, 201);
    assert_eq!(webhook.request_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn gives_up_after_max_attempts() {
    let webhook = RecordingWebhook::scripted(vec![
        Err(TransportError::Timeout("slow".to_string())),
        Err(TransportError::Timeout("slow".to_string())),
        Ok(response(200, "too late")),
    ]);
    let endpoint = endpoint(Some("API"), Some("https://hooks.example.com/deployments"));

    let err = DeliveryDispatcher::new(&webhook, &endpoint, 2)
        .deliver(&payload())
        .await
        .unwrap_err();

    assert!(matches!(err, DeliveryError::RetriesExhausted { attempts: 2, .. }));
    assert_eq!(webhook.request_count(), 2);
}

#[tokio::test]
async fn request_errors_are_not_retried() {
    let webhook = RecordingWebhook::scripted(vec![Err(TransportError::Request(
        "invalid header".to_string(),
    ))]);
    let endpoint = endpoint(Some("API"), Some("https://hooks.example.com/deployments"));

    let err = DeliveryDispatcher::new(&webhook, &endpoint, 3)
        .deliver(&payload())
        .await
        .unwrap_err();

    assert!(matches!(err, DeliveryError::Transport(TransportError::Request(_))));
    assert_eq!(webhook.request_count(), 1);
}

#[tokio::test]
async fn non_success_status_is_returned_as_delivered() {
    let webhook = RecordingWebhook::scripted(vec![Ok(response(502, "bad gateway"))]);
    let endpoint = endpoint(Some("API"), Some("https://hooks.example.com/deployments"));

    let outcome = DeliveryDispatcher::new(&webhook, &endpoint, 3)
        .deliver(&payload())
        .await
        .unwrap();

    assert_eq!(outcome.http_status, 502);
    assert_eq!(outcome.body, "bad gateway");
    assert_eq!(webhook.request_count(), 1);
}
