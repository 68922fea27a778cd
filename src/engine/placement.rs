use std::time::Instant;

use tracing::{error, info};

use crate::error::{AppError, DistanceError};
use crate::geo::LatLng;
use crate::models::order::{NewOrder, OrderStatus, OrderSummary};
use crate::state::AppState;

/// Validates, prices and persists a new order.
///
/// Coordinates are checked before the resolver is called, and the resolver
/// must succeed before anything is written.
pub async fn place_order(
    state: &AppState,
    origin: &[String],
    destination: &[String],
) -> Result<OrderSummary, AppError> {
    let origin = LatLng::parse(origin)?;
    let destination = LatLng::parse(destination)?;
    let (origin, destination) = (origin.canonical(), destination.canonical());

    info!(%origin, %destination, "placing order");

    let start = Instant::now();
    let resolved = state.resolver.resolve(&origin, &destination).await;
    let outcome = if resolved.is_ok() { "success" } else { "error" };
    state
        .metrics
        .distance_lookup_seconds
        .with_label_values(&[outcome])
        .observe(start.elapsed().as_secs_f64());

    let meters = resolved.map_err(|err| {
        error!(error = %err, "failed to compute route distance");
        err
    })?;
    let distance = i64::try_from(meters).map_err(|_| DistanceError::Overflow(meters))?;

    let id = state
        .store
        .create_order(NewOrder {
            origin,
            destination,
            distance,
        })
        .await
        .map_err(|err| {
            error!(error = %err, "failed to insert order");
            err
        })?;

    state.metrics.orders_created_total.inc();
    info!(order_id = id, distance, "order created");

    Ok(OrderSummary {
        id,
        distance,
        status: OrderStatus::Unassigned,
    })
}
