use super::cluster::{ApiError, RouteStore};
use crate::crd::route::{Route, RouteTargetReference};
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};

/// Step interval of the timed schedule
pub const DEFAULT_STEP_INTERVAL: Duration = Duration::from_secs(3);

/// Total duration of the timed schedule
pub const DEFAULT_ROLLOUT_DURATION: Duration = Duration::from_secs(30);

/// Number of steps of the fixed schedule
pub const FIXED_STEPS: u32 = 10;

/// Step interval of the fixed schedule
pub const FIXED_STEP_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum ShiftError {
    #[error("Failed to read route: {0}")]
    Read(#[source] ApiError),

    #[error("Route {route} has other weighted alternate backends: {backends:?}")]
    ForeignBackends {
        route: String,
        backends: Vec<String>,
    },

    #[error("Failed to set route weight to {weight}% at step {step}: {source}")]
    Write {
        step: u32,
        weight: i32,
        #[source]
        source: ApiError,
    },
}

/// Schedule of a traffic shift
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShiftPlan {
    /// Number of increments; the plan applies `steps + 1` weights
    pub steps: u32,
    /// Weight added per step (integer division of 100 by `steps`)
    pub increment: i32,
    /// Pause between two applied weights
    pub interval: Duration,
}

impl ShiftPlan {
    /// Spread the shift over `total`, one step per `interval`
    ///
    /// A total shorter than one interval collapses into a single step.
    pub fn timed(total: Duration, interval: Duration) -> Self {
        let steps = if interval.is_zero() {
            1
        } else {
            (total.as_millis() / interval.as_millis()).clamp(1, 100) as u32
        };
        ShiftPlan {
            steps,
            increment: 100 / steps as i32,
            interval,
        }
    }

    /// Ten steps of 10%, five seconds apart
    pub fn fixed() -> Self {
        ShiftPlan {
            steps: FIXED_STEPS,
            increment: 100 / FIXED_STEPS as i32,
            interval: FIXED_STEP_INTERVAL,
        }
    }

    /// Weight of the new backend at each step
    ///
    /// Integer division may leave the last regular step short of 100, so the
    /// final step is always forced to exactly 100.
    pub fn weights(&self) -> Vec<i32> {
        (0..=self.steps)
            .map(|i| {
                if i == self.steps {
                    100
                } else {
                    (i as i32 * self.increment).min(100)
                }
            })
            .collect()
    }
}

/// Set the route's split: `100 - new_weight` to the primary backend and
/// `new_weight` to `backend`, adding the alternate backend if missing.
pub fn set_route_weights(route: &mut Route, backend: &str, new_weight: i32) {
    route.spec.to.weight = Some(100 - new_weight);

    match route
        .spec
        .alternate_backends
        .iter_mut()
        .find(|b| b.targets_service(backend))
    {
        Some(alternate) => alternate.weight = Some(new_weight),
        None => route
            .spec
            .alternate_backends
            .push(RouteTargetReference::service(backend, Some(new_weight))),
    }
}

/// Alternate backends other than `backend` that still receive traffic
pub fn foreign_weighted_backends(route: &Route, backend: &str) -> Vec<String> {
    route
        .spec
        .alternate_backends
        .iter()
        .filter(|b| !b.targets_service(backend) && b.weight.unwrap_or(0) > 0)
        .map(|b| b.name.clone())
        .collect()
}

/// Shift the route's traffic to `backend`, one plan step at a time
///
/// Every step re-reads the route, applies the new split and writes it back
/// with an optimistic replace. The first failed write stops the shift and
/// leaves the last successfully applied split in place. `on_step` is called
/// with each applied weight.
///
/// # Returns
/// * `Ok(Route)` - the route as written by the final step (100%)
/// * `Err(ShiftError)` - read or write failure, or foreign weighted backends
pub async fn shift_traffic<F>(
    store: &dyn RouteStore,
    namespace: &str,
    route_name: &str,
    backend: &str,
    plan: &ShiftPlan,
    mut on_step: F,
) -> Result<Route, ShiftError>
where
    F: FnMut(i32),
{
    let current = store
        .get_route(namespace, route_name)
        .await
        .map_err(ShiftError::Read)?;
    let foreign = foreign_weighted_backends(&current, backend);
    if !foreign.is_empty() {
        return Err(ShiftError::ForeignBackends {
            route: route_name.to_string(),
            backends: foreign,
        });
    }

    let weights = plan.weights();
    let last = weights.len() - 1;
    let mut applied = current;

    for (step, weight) in weights.into_iter().enumerate() {
        let mut route = if step == 0 {
            applied.clone()
        } else {
            store
                .get_route(namespace, route_name)
                .await
                .map_err(ShiftError::Read)?
        };

        set_route_weights(&mut route, backend, weight);

        applied = match store.replace_route(namespace, &route).await {
            Ok(written) => written,
            Err(source) => {
                error!(
                    route = %route_name,
                    step,
                    weight,
                    error = %source,
                    "Failed to update route weights"
                );
                return Err(ShiftError::Write {
                    step: step as u32,
                    weight,
                    source,
                });
            }
        };

        info!(route = %route_name, step, weight, "Route weights updated");
        on_step(weight);

        if step < last {
            tokio::time::sleep(plan.interval).await;
        }
    }

    Ok(applied)
}

#[cfg(test)]
#[path = "traffic_test.rs"]
mod tests;
