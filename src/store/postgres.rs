//! Postgres-backed order table.
//!
//! Transitions lock the order's row with `SELECT ... FOR UPDATE` inside a
//! transaction and write with a compare-and-set `UPDATE`. Everything up to
//! the commit runs under a deadline; when it elapses the transaction is
//! dropped uncommitted and Postgres rolls it back. The commit itself runs
//! after the deadline check, so a `Timeout` never follows a landed write.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Row, Transaction};
use tokio::time::timeout;
use tracing::{debug, info};

use crate::error::StoreError;
use crate::models::order::{NewOrder, Order, OrderStatus, OrderSummary};
use crate::store::{OrderStore, Pagination};

const CREATE_ORDERS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS orders (
        id          BIGSERIAL PRIMARY KEY,
        origin      TEXT   NOT NULL,
        destination TEXT   NOT NULL,
        distance    BIGINT NOT NULL CHECK (distance >= 0),
        status      TEXT   NOT NULL
    )
"#;

pub struct PgOrderStore {
    pool: PgPool,
    transition_timeout: Duration,
}

impl PgOrderStore {
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        transition_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await?;

        info!(max_connections, "PostgreSQL connection pool established");
        Ok(Self::from_pool(pool, transition_timeout))
    }

    pub fn from_pool(pool: PgPool, transition_timeout: Duration) -> Self {
        Self {
            pool,
            transition_timeout,
        }
    }

    /// Creates the `orders` table if it does not exist yet.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(CREATE_ORDERS_TABLE).execute(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn deadline_ms(&self) -> u64 {
        self.transition_timeout.as_millis() as u64
    }

    /// Locks, checks and writes; returns the transaction ready to commit.
    async fn stage_transition(
        &self,
        id: i64,
        target: OrderStatus,
    ) -> Result<Transaction<'static, Postgres>, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Bound the server-side lock wait as well; a dropped client future
        // does not cancel a query Postgres is already blocked on.
        sqlx::query(&format!("SET LOCAL lock_timeout = {}", self.deadline_ms()))
            .execute(&mut *tx)
            .await?;

        // FOR UPDATE serializes concurrent transitions on this row only
        let observed: Option<String> =
            sqlx::query_scalar("SELECT status FROM orders WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;

        let Some(observed) = observed else {
            tx.rollback().await?;
            return Err(StoreError::NotFound(id));
        };
        let observed_status = parse_status(&observed)?;

        if observed_status == target {
            tx.rollback().await?;
            return Err(StoreError::already(id, target));
        }

        let updated = sqlx::query("UPDATE orders SET status = $1 WHERE id = $2 AND status = $3")
            .bind(target.as_str())
            .bind(id)
            .bind(&observed)
            .execute(&mut *tx)
            .await?;

        if updated.rows_affected() != 1 {
            tx.rollback().await?;
            return Err(StoreError::Conflict(id));
        }

        Ok(tx)
    }
}

// 55P03: lock_not_available, raised when lock_timeout expires
fn is_lock_timeout(err: &StoreError) -> bool {
    match err {
        StoreError::Database(sqlx::Error::Database(db)) => db.code().as_deref() == Some("55P03"),
        _ => false,
    }
}

fn parse_status(raw: &str) -> Result<OrderStatus, StoreError> {
    raw.parse()
        .map_err(|_| StoreError::Corrupt(format!("unknown status {raw:?}")))
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn create_order(&self, order: NewOrder) -> Result<i64, StoreError> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"INSERT INTO orders (origin, destination, distance, status)
               VALUES ($1, $2, $3, $4) RETURNING id"#,
        )
        .bind(&order.origin)
        .bind(&order.destination)
        .bind(order.distance)
        .bind(OrderStatus::Unassigned.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    async fn get_order(&self, id: i64) -> Result<Order, StoreError> {
        let row = sqlx::query(
            "SELECT id, origin, destination, distance, status FROM orders WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound(id))?;

        Ok(Order {
            id: row.try_get("id")?,
            origin: row.try_get("origin")?,
            destination: row.try_get("destination")?,
            distance: row.try_get("distance")?,
            status: parse_status(row.try_get("status")?)?,
        })
    }

    async fn transition(&self, id: i64, target: OrderStatus) -> Result<(), StoreError> {
        let deadline_ms = self.deadline_ms();

        let tx = match timeout(self.transition_timeout, self.stage_transition(id, target)).await {
            Ok(Ok(tx)) => tx,
            Ok(Err(err)) if is_lock_timeout(&err) => {
                debug!(order_id = id, deadline_ms, "row lock wait expired, rolled back");
                return Err(StoreError::Timeout(deadline_ms));
            }
            Ok(Err(err)) => return Err(err),
            Err(_) => {
                debug!(order_id = id, deadline_ms, "transition deadline elapsed, rolled back");
                return Err(StoreError::Timeout(deadline_ms));
            }
        };

        tx.commit().await?;
        Ok(())
    }

    async fn count_orders(&self) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(&self.pool)
            .await?;

        Ok(count.max(0) as u64)
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

        let offset = i64::try_from(page.offset()).unwrap_or(i64::MAX);
        let rows = sqlx::query(
            "SELECT id, distance, status FROM orders ORDER BY id LIMIT $1 OFFSET $2",
        )
        .bind(i64::from(page.limit))
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> Result<OrderSummary, StoreError> {
                Ok(OrderSummary {
                    id: row.try_get("id")?,
                    distance: row.try_get("distance")?,
                    status: parse_status(row.try_get("status")?)?,
                })
            })
            .collect()
    }

    async fn close(&self) {
        self.pool.close().await;
        info!("PostgreSQL connection pool closed");
    }
}
