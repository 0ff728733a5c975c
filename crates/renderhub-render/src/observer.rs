//! Completion and failure events.
//!
//! The pipeline reports each finished attempt to an injected
//! [`RenderObserver`]. Observers must not block: they are called inline on
//! the job task.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use renderhub_core::types::id::{BrandId, DesignId, UserId};
use renderhub_entity::render::RenderType;

use crate::error::RenderErrorKind;

/// A finished render attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum RenderEvent {
    /// The model was published and linked to the design.
    #[serde(rename = "render.completed", rename_all = "camelCase")]
    Completed {
        /// Rendered design.
        design_id: DesignId,
        /// Owning brand.
        brand_id: BrandId,
        /// Requesting user.
        user_id: Option<UserId>,
        /// Format.
        render_type: RenderType,
        /// Public model URL.
        model_url: String,
        /// Public preview URL.
        preview_url: Option<String>,
        /// Attempt duration.
        processing_time_ms: u64,
    },
    /// The attempt failed.
    #[serde(rename = "render.failed", rename_all = "camelCase")]
    Failed {
        /// Design of the job.
        design_id: DesignId,
        /// Owning brand.
        brand_id: BrandId,
        /// Requesting user.
        user_id: Option<UserId>,
        /// Format.
        render_type: RenderType,
        /// Failure kind.
        kind: RenderErrorKind,
        /// Failure message.
        error: String,
    },
}

impl RenderEvent {
    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Completed { .. } => "render.completed",
            Self::Failed { .. } => "render.failed",
        }
    }

    /// Design the event is about.
    pub fn design_id(&self) -> DesignId {
        match self {
            Self::Completed { design_id, .. } | Self::Failed { design_id, .. } => *design_id,
        }
    }
}

/// Receives render events.
pub trait RenderObserver: Send + Sync + std::fmt::Debug {
    /// Handle one event.
    fn on_event(&self, event: &RenderEvent);
}

/// Logs events through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl RenderObserver for TracingObserver {
    fn on_event(&self, event: &RenderEvent) {
        match event {
            RenderEvent::Completed {
                design_id,
                render_type,
                model_url,
                preview_url,
                processing_time_ms,
                ..
            } => info!(
                event = event.name(),
                design_id = %design_id,
                render_type = %render_type,
                model_url = %model_url,
                has_preview = preview_url.is_some(),
                processing_time_ms = processing_time_ms,
                "Render completed"
            ),
            RenderEvent::Failed {
                design_id,
                render_type,
                kind,
                error: message,
                ..
            } => error!(
                event = event.name(),
                design_id = %design_id,
                render_type = %render_type,
                kind = %kind,
                error = %message,
                "Render failed"
            ),
        }
    }
}

/// Forwards events to a channel for an external consumer.
///
/// A full or closed channel drops the event with a warning.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::Sender<RenderEvent>,
}

impl ChannelObserver {
    /// Create an observer and the receiving end.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<RenderEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl RenderObserver for ChannelObserver {
    fn on_event(&self, event: &RenderEvent) {
        if let Err(e) = self.tx.try_send(event.clone()) {
            warn!(event = event.name(), error = %e, "Dropping render event");
        }
    }
}

/// Fans an event out to several observers.
#[derive(Debug, Clone, Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn RenderObserver>>,
}

impl CompositeObserver {
    /// Create an empty fan-out.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an observer.
    pub fn with(mut self, observer: Arc<dyn RenderObserver>) -> Self {
        self.observers.push(observer);
        self
    }
}

impl RenderObserver for CompositeObserver {
    fn on_event(&self, event: &RenderEvent) {
        for observer in &self.observers {
            observer.on_event(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed() -> RenderEvent {
        RenderEvent::Failed {
            design_id: DesignId::nil(),
            brand_id: BrandId::nil(),
            user_id: None,
            render_type: RenderType::Obj,
            kind: RenderErrorKind::RenderTimeout,
            error: "Render tool timed out after 300s".to_string(),
        }
    }

    #[test]
    fn test_event_wire_shape() {
        let json = serde_json::to_value(failed()).unwrap();
        assert_eq!(json["event"], "render.failed");
        assert_eq!(json["renderType"], "obj");
        assert_eq!(json["kind"], "render_timeout");
        assert_eq!(json["designId"], "00000000-0000-0000-0000-000000000000");
    }

    #[tokio::test]
    async fn test_channel_and_composite() {
        let (a, mut rx_a) = ChannelObserver::channel(4);
        let (b, mut rx_b) = ChannelObserver::channel(4);
        let fan_out = CompositeObserver::new()
            .with(Arc::new(TracingObserver))
            .with(Arc::new(a))
            .with(Arc::new(b));

        fan_out.on_event(&failed());

        assert_eq!(rx_a.recv().await.unwrap().name(), "render.failed");
        assert_eq!(rx_b.recv().await.unwrap().design_id(), DesignId::nil());
    }

    #[test]
    fn test_full_channel_drops() {
        let (obs, _rx) = ChannelObserver::channel(1);
        obs.on_event(&failed());
        obs.on_event(&failed());
    }
}
