//! Condition-based readiness waiting
//!
//! `wait_for` consumes a stream of object states (a watch) and a predicate
//! that maps each state to a `Readiness`. It returns on the first terminal
//! verdict, or when the deadline passes, whichever comes first. The stream is
//! dropped on return, which ends the watch.

use crate::crd::service::{Condition, KnativeService, READY_CONDITION};
use futures::{Stream, StreamExt};
use std::fmt::Display;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Verdict of a readiness predicate for one observed state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    Pending,
    Failed { reason: String, message: String },
}

impl Readiness {
    /// Evaluate the condition of the given type
    ///
    /// - "True" -> Ready
    /// - "False" -> Failed, with the condition's reason and message
    /// - "Unknown" or absent -> Pending
    pub fn from_conditions(conditions: &[Condition], condition_type: &str) -> Self {
        match conditions.iter().find(|c| c.type_ == condition_type) {
            Some(c) if c.is_true() => Readiness::Ready,
            Some(c) if c.is_false() => Readiness::Failed {
                reason: c.reason.clone().unwrap_or_default(),
                message: c.message.clone().unwrap_or_default(),
            },
            _ => Readiness::Pending,
        }
    }
}

#[derive(Debug, Error)]
pub enum ReadinessError {
    #[error("Resource failed to become ready: {reason}: {message}")]
    Failed { reason: String, message: String },

    #[error("Timed out after {0:?} waiting for readiness")]
    Timeout(Duration),

    #[error("Watch failed: {0}")]
    Watch(String),

    #[error("Watch ended before the resource became ready")]
    StreamClosed,
}

/// Readiness of a Knative Service
///
/// Conditions are only trusted once Knative has observed the current
/// generation; until then the verdict is Pending.
pub fn service_readiness(service: &KnativeService) -> Readiness {
    let Some(status) = service.status.as_ref() else {
        return Readiness::Pending;
    };

    let generation = service.metadata.generation.unwrap_or(0);
    if status.observed_generation.unwrap_or(0) < generation {
        return Readiness::Pending;
    }

    Readiness::from_conditions(&status.conditions, READY_CONDITION)
}

/// Wait until `check` reports a terminal verdict for a state from `events`
///
/// # Returns
/// * `Ok(K)` - the first state judged ready
/// * `Err(ReadinessError::Failed)` - the first state judged failed
/// * `Err(ReadinessError::Timeout)` - nothing terminal within `timeout`
/// * `Err(ReadinessError::Watch | StreamClosed)` - the watch broke down
pub async fn wait_for<K, E, S, F>(
    events: S,
    timeout: Duration,
    check: F,
) -> Result<K, ReadinessError>
where
    S: Stream<Item = Result<K, E>>,
    E: Display,
    F: Fn(&K) -> Readiness,
{
    let watch = async move {
        futures::pin_mut!(events);

        while let Some(event) = events.next().await {
            let object = event.map_err(|e| ReadinessError::Watch(e.to_string()))?;

            match check(&object) {
                Readiness::Ready => return Ok(object),
                Readiness::Failed { reason, message } => {
                    return Err(ReadinessError::Failed { reason, message })
                }
                Readiness::Pending => debug!("Resource not ready yet"),
            }
        }

        Err(ReadinessError::StreamClosed)
    };

    match tokio::time::timeout(timeout, watch).await {
        Ok(outcome) => outcome,
        Err(_) => Err(ReadinessError::Timeout(timeout)),
    }
}

#[cfg(test)]
#[path = "readiness_test.rs"]
mod tests;
