pub mod memory;
pub mod postgres;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{AppError, StoreError};
use crate::models::order::{NewOrder, Order, OrderStatus, OrderSummary};

pub use memory::MemoryOrderStore;
pub use postgres::PgOrderStore;

pub const DEFAULT_LIMIT: u32 = 20;
pub const DEFAULT_PAGE: u64 = 1;
pub const MAX_LIMIT: u32 = 100;
pub const DEFAULT_TRANSITION_TIMEOUT: Duration = Duration::from_millis(2_000);

const BAD_PAGE_PARAM: &str = "badly formatted parameter: page and limit should be positive integers";

/// Persistent table of orders.
///
/// Status transitions hold an exclusive scope on a single order for the
/// read-check-write and nothing else; creation and listing never wait on
/// another order's transition.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Inserts a new `UNASSIGNED` order and returns its id.
    async fn create_order(&self, order: NewOrder) -> Result<i64, StoreError>;

    async fn get_order(&self, id: i64) -> Result<Order, StoreError>;

    /// Moves order `id` to `target` inside a bounded transaction.
    ///
    /// Exactly one of several concurrent callers requesting the same target
    /// succeeds; the rest see `AlreadyTaken` / `AlreadyUnassigned`. If the
    /// deadline elapses the order keeps its previous status and the caller
    /// gets `StoreError::Timeout`.
    async fn transition(&self, id: i64, target: OrderStatus) -> Result<(), StoreError>;

    async fn count_orders(&self) -> Result<u64, StoreError>;

    /// One page of orders in insertion (id) order. Empty past the last page.
    async fn list_orders(&self, page: Pagination) -> Result<Vec<OrderSummary>, StoreError>;

    async fn close(&self) {}

    async fn take(&self, id: i64) -> Result<(), StoreError> {
        self.transition(id, OrderStatus::Taken).await
    }

    async fn release(&self, id: i64) -> Result<(), StoreError> {
        self.transition(id, OrderStatus::Unassigned).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub limit: u32,
    pub page: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            page: DEFAULT_PAGE,
        }
    }
}

impl Pagination {
    /// Builds a page request from raw `limit` / `page` query values.
    ///
    /// Missing values fall back to the defaults; `limit` never exceeds
    /// [`MAX_LIMIT`]. Values must be plain positive integers, no padding.
    pub fn from_params(limit: Option<&str>, page: Option<&str>) -> Result<Self, AppError> {
        let limit = limit
            .map(parse_positive)
            .transpose()?
            .map_or(DEFAULT_LIMIT, |limit| limit.min(u64::from(MAX_LIMIT)) as u32);
        let page = page.map(parse_positive).transpose()?.unwrap_or(DEFAULT_PAGE);

        Ok(Self { limit, page })
    }

    /// Saturates for pages far past the end; those list as empty.
    pub fn offset(&self) -> u64 {
        u64::from(self.limit).saturating_mul(self.page.saturating_sub(1))
    }

    pub fn total_pages(&self, total: u64) -> u64 {
        total.div_ceil(u64::from(self.limit.max(1)))
    }
}

fn parse_positive(raw: &str) -> Result<u64, AppError> {
    match raw.parse::<u64>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(AppError::BadRequest(BAD_PAGE_PARAM.to_string())),
    }
}
