use std::sync::atomic::{AtomicI64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::debug;

use crate::error::StoreError;
use crate::models::order::{NewOrder, Order, OrderStatus, OrderSummary};
use crate::store::{OrderStore, Pagination, DEFAULT_TRANSITION_TIMEOUT};

const UNASSIGNED: u8 = 0;
const TAKEN: u8 = 1;

fn encode(status: OrderStatus) -> u8 {
    match status {
        OrderStatus::Unassigned => UNASSIGNED,
        OrderStatus::Taken => TAKEN,
    }
}

fn decode(raw: u8) -> OrderStatus {
    if raw == TAKEN {
        OrderStatus::Taken
    } else {
        OrderStatus::Unassigned
    }
}

struct OrderRow {
    id: i64,
    origin: String,
    destination: String,
    distance: i64,
    status: AtomicU8,
    // held for the read-check-write of a transition only
    lock: Mutex<()>,
}

impl OrderRow {
    fn status(&self) -> OrderStatus {
        decode(self.status.load(Ordering::Acquire))
    }

    fn snapshot(&self) -> Order {
        Order {
            id: self.id,
            origin: self.origin.clone(),
            destination: self.destination.clone(),
            distance: self.distance,
            status: self.status(),
        }
    }
}

/// Process-local order table.
///
/// Each row carries its own async lock, so transitions on different orders
/// never contend. Readers load the status atomically and skip the lock.
pub struct MemoryOrderStore {
    rows: DashMap<i64, Arc<OrderRow>>,
    next_id: AtomicI64,
    transition_timeout: Duration,
}

impl Default for MemoryOrderStore {
    fn default() -> Self {
        Self::new(DEFAULT_TRANSITION_TIMEOUT)
    }
}

impl MemoryOrderStore {
    pub fn new(transition_timeout: Duration) -> Self {
        Self {
            rows: DashMap::new(),
            next_id: AtomicI64::new(0),
            transition_timeout,
        }
    }

    fn row(&self, id: i64) -> Result<Arc<OrderRow>, StoreError> {
        self.rows
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(StoreError::NotFound(id))
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn create_order(&self, order: NewOrder) -> Result<i64, StoreError> {
        let id = self.next_id.fetch_add(1, Ordering::AcqRel) + 1;
        let row = OrderRow {
            id,
            origin: order.origin,
            destination: order.destination,
            distance: order.distance,
            status: AtomicU8::new(UNASSIGNED),
            lock: Mutex::new(()),
        };

        self.rows.insert(id, Arc::new(row));
        Ok(id)
    }

    async fn get_order(&self, id: i64) -> Result<Order, StoreError> {
        Ok(self.row(id)?.snapshot())
    }

    async fn transition(&self, id: i64, target: OrderStatus) -> Result<(), StoreError> {
        let row = self.row(id)?;
        let deadline_ms = self.transition_timeout.as_millis() as u64;

        let unit_of_work = async {
            let _guard = row.lock.lock().await;

            let observed = row.status.load(Ordering::Acquire);
            if decode(observed) == target {
                return Err(StoreError::already(id, target));
            }

            // No await past this point: once the lock is held the write
            // either lands completely or not at all.
            row.status
                .compare_exchange(observed, encode(target), Ordering::AcqRel, Ordering::Acquire)
                .map_err(|_| StoreError::Conflict(id))?;

            Ok(())
        };

        match timeout(self.transition_timeout, unit_of_work).await {
            Ok(result) => result,
            Err(_) => {
                debug!(order_id = id, deadline_ms, "transition deadline elapsed");
                Err(StoreError::Timeout(deadline_ms))
            }
        }
    }

    async fn count_orders(&self) -> Result<u64, StoreError> {
        Ok(self.rows.len() as u64)
    }

    async fn list_orders(&self, page: Pagination) -> Result<Vec<OrderSummary>, StoreError> {
        let total = self.count_orders().await?;
        if total == 0 {
            return Ok(Vec::new());
        }

        debug!(
            total_pages = page.total_pages(total),
            count = total,
            limit = page.limit,
            "listing orders"
        );

        let mut rows: Vec<Arc<OrderRow>> = self
            .rows
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        rows.sort_unstable_by_key(|row| row.id);

        let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
        Ok(rows
            .iter()
            .skip(offset)
            .take(page.limit as usize)
            .map(|row| row.snapshot().summary())
            .collect())
    }
}
