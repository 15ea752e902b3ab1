//! Out-of-band notification sink.
//!
//! The hub stores one opaque subscription blob per session and forwards
//! notification payloads through a [`PushSink`]. Delivery is best-effort:
//! transport failures are logged and dropped, while a permanent-gone answer
//! from the gateway (404/410) tells the caller to discard the subscription.
//! Sink calls are always made after the hub lock is released.

use async_trait::async_trait;
use serde_json::Value;

/// Outcome of a failed sink call.
#[derive(Debug)]
pub enum PushError {
    /// The gateway reported the subscription permanently gone (404/410);
    /// the hub drops the stored blob.
    Gone,
    /// Anything else; swallowed after logging.
    Transport(String),
}

/// A gateway capable of delivering a payload to a registered subscription.
#[async_trait]
pub trait PushSink: Send + Sync {
    /// Whether subscriptions are accepted at all. Disabled sinks make
    /// `pushSubscribe` a silent no-op.
    fn enabled(&self) -> bool;

    async fn send(&self, subscription: &Value, payload: &Value) -> Result<(), PushError>;
}

/// Sink used when no VAPID keys are configured.
pub struct DisabledSink;

#[async_trait]
impl PushSink for DisabledSink {
    fn enabled(&self) -> bool {
        false
    }

    async fn send(&self, _subscription: &Value, _payload: &Value) -> Result<(), PushError> {
        Ok(())
    }
}

/// Production sink: posts the payload to the subscription's endpoint.
pub struct WebPushSink {
    http: reqwest::Client,
    public_key: String,
}

impl WebPushSink {
    pub fn new(public_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            public_key,
        }
    }

    pub fn public_key(&self) -> &str {
        &self.public_key
    }
}

#[async_trait]
impl PushSink for WebPushSink {
    fn enabled(&self) -> bool {
        true
    }

    async fn send(&self, subscription: &Value, payload: &Value) -> Result<(), PushError> {
        // A blob without an endpoint can never be delivered to; treat it
        // like a gone subscription so it gets dropped.
        let endpoint = subscription
            .get("endpoint")
            .and_then(Value::as_str)
            .ok_or(PushError::Gone)?;

        let resp = self
            .http
            .post(endpoint)
            .header("TTL", "60")
            .json(payload)
            .send()
            .await
            .map_err(|e| PushError::Transport(e.to_string()))?;

        match resp.status().as_u16() {
            404 | 410 => Err(PushError::Gone),
            s if resp.status().is_success() => {
                tracing::trace!(status = s, "push delivered");
                Ok(())
            }
            s => Err(PushError::Transport(format!("push gateway status {s}"))),
        }
    }
}

/// Test sink that records every payload it was asked to deliver.
pub struct RecordingSink {
    pub sent: parking_lot::Mutex<Vec<(Value, Value)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self {
            sent: parking_lot::Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl PushSink for RecordingSink {
    fn enabled(&self) -> bool {
        true
    }

    async fn send(&self, subscription: &Value, payload: &Value) -> Result<(), PushError> {
        self.sent.lock().push((subscription.clone(), payload.clone()));
        Ok(())
    }
}
