use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Persisted status of an order. Stored and returned as `UNASSIGNED` / `TAKEN`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[serde(alias = "unassigned")]
    Unassigned,
    #[serde(alias = "taken")]
    Taken,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Unassigned => "UNASSIGNED",
            OrderStatus::Taken => "TAKEN",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "UNASSIGNED" | "unassigned" => Ok(OrderStatus::Unassigned),
            "TAKEN" | "taken" => Ok(OrderStatus::Taken),
            other => Err(format!("Unknown status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: i64,
    pub origin: String,
    pub destination: String,
    pub distance: i64,
    pub status: OrderStatus,
}

impl Order {
    pub fn summary(&self) -> OrderSummary {
        OrderSummary {
            id: self.id,
            distance: self.distance,
            status: self.status,
        }
    }
}

/// Write-once fields of an order, fixed before the row is inserted.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub origin: String,
    pub destination: String,
    pub distance: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderSummary {
    pub id: i64,
    pub distance: i64,
    pub status: OrderStatus,
}
