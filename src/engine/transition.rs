use tracing::{error, info, warn};

use crate::error::{AppError, StoreError};
use crate::models::order::OrderStatus;
use crate::state::AppState;

pub async fn transition_order(
    state: &AppState,
    order_id: i64,
    target: OrderStatus,
) -> Result<(), AppError> {
    let result = state.store.transition(order_id, target).await;

    let outcome = match &result {
        Ok(()) => {
            info!(order_id, status = %target, "order status updated");
            "success"
        }
        Err(err) if err.is_persistence_fault() => {
            error!(order_id, error = %err, "order transition failed");
            "error"
        }
        Err(StoreError::NotFound(_)) => {
            warn!(order_id, "transition on missing order");
            "not_found"
        }
        Err(_) => {
            info!(order_id, status = %target, "order already in requested status");
            "conflict"
        }
    };

    state
        .metrics
        .order_transitions_total
        .with_label_values(&[target.as_str(), outcome])
        .inc();

    result.map_err(AppError::from)
}
