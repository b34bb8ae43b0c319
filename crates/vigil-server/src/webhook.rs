//! [`EventSink`] that forwards events to an HTTP webhook.
//!
//! Delivery is fire-and-forget: each event is POSTed from its own task, and a
//! failure is logged without affecting the request that produced it.

use std::time::Duration;

use vigil_core::event::{EventSink, OccurrenceEvent};

/// Header carrying the event name, e.g. `occurrence.created`.
pub const EVENT_HEADER: &str = "X-Vigil-Event";

#[derive(Debug, Clone)]
pub struct WebhookSink {
  client: reqwest::Client,
  url:    Option<String>,
}

impl WebhookSink {
  /// Without a `url` events are only logged.
  pub fn new(url: Option<String>) -> Self {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(10))
      .build()
      .unwrap_or_default();
    Self { client, url }
  }
}

impl EventSink for WebhookSink {
  fn publish(&self, event: OccurrenceEvent) {
    let Some(url) = self.url.clone() else {
      tracing::debug!(event = event.name(), occurrence = %event.occurrence_id(), "event");
      return;
    };
    let Ok(runtime) = tokio::runtime::Handle::try_current() else {
      tracing::warn!(event = event.name(), "no runtime; webhook not sent");
      return;
    };

    let client = self.client.clone();
    runtime.spawn(async move {
      let result = client
        .post(&url)
        .header(EVENT_HEADER, event.name())
        .json(&event)
        .send()
        .await
        .and_then(reqwest::Response::error_for_status);

      match result {
        Ok(_) => tracing::debug!(event = event.name(), "webhook delivered"),
        Err(e) => tracing::warn!(
          event = event.name(),
          occurrence = %event.occurrence_id(),
          error = %e,
          "webhook delivery failed"
        ),
      }
    });
  }
}
