// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Kubernetes `Event` publishing for `Arman` resources.

use crate::constants::{CONTROLLER_NAME, EVENT_ACTION_RECONCILE};
use crate::context::{EventSink, Severity};
use crate::crd::Arman;
use async_trait::async_trait;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::{Client, Resource, ResourceExt};
use tracing::{debug, warn};

/// Publishes events through the `events.k8s.io` API.
#[derive(Clone)]
pub struct KubeEventRecorder {
    recorder: Recorder,
}

impl KubeEventRecorder {
    /// Create a recorder reporting as `arman-controller`, with `instance`
    /// (usually the pod name) identifying this replica.
    #[must_use]
    pub fn new(client: Client, instance: Option<String>) -> Self {
        let reporter = Reporter {
            controller: CONTROLLER_NAME.to_string(),
            instance,
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

fn event_type(severity: Severity) -> EventType {
    match severity {
        Severity::Normal => EventType::Normal,
        Severity::Warning => EventType::Warning,
    }
}

#[async_trait]
impl EventSink for KubeEventRecorder {
    async fn record(&self, subject: &Arman, severity: Severity, reason: &str, message: &str) {
        let event = Event {
            type_: event_type(severity),
            reason: reason.to_string(),
            note: Some(message.to_string()),
            action: EVENT_ACTION_RECONCILE.to_string(),
            secondary: None,
        };

        if let Err(e) = self.recorder.publish(&event, &subject.object_ref(&())).await {
            warn!(
                arman = %subject.name_any(),
                reason,
                "Failed to publish event: {e}"
            );
        } else {
            debug!(arman = %subject.name_any(), %severity, reason, "Published event");
        }
    }
}
