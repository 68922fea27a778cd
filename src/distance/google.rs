use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::distance::DistanceResolver;
use crate::error::DistanceError;

pub const DEFAULT_BASE_URL: &str = "https://maps.googleapis.com/maps/api/distancematrix/json";

/// Driving distance from the Google Distance Matrix API.
pub struct GoogleDistanceMatrix {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl GoogleDistanceMatrix {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, DistanceError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct MatrixResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    rows: Vec<MatrixRow>,
}

#[derive(Debug, Deserialize)]
struct MatrixRow {
    #[serde(default)]
    elements: Vec<MatrixElement>,
}

#[derive(Debug, Deserialize)]
struct MatrixElement {
    status: String,
    #[serde(default)]
    distance: Option<MatrixDistance>,
}

#[derive(Debug, Deserialize)]
struct MatrixDistance {
    value: u64,
}

/// Picks the shortest route among every row and element marked `OK`.
fn shortest_distance(
    response: MatrixResponse,
    origin: &str,
    destination: &str,
) -> Result<u64, DistanceError> {
    if response.status != "OK" {
        let detail = match response.error_message {
            Some(msg) => format!("{}: {msg}", response.status),
            None => response.status,
        };
        return Err(DistanceError::Status(detail));
    }

    response
        .rows
        .into_iter()
        .flat_map(|row| row.elements)
        .filter(|element| element.status == "OK")
        .filter_map(|element| element.distance.map(|d| d.value))
        .min()
        .ok_or_else(|| DistanceError::NoRoute {
            origin: origin.to_string(),
            destination: destination.to_string(),
        })
}

#[async_trait]
impl DistanceResolver for GoogleDistanceMatrix {
    async fn resolve(&self, origin: &str, destination: &str) -> Result<u64, DistanceError> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("origins", origin),
                ("destinations", destination),
                ("mode", "driving"),
                ("units", "metric"),
                ("departure_time", "now"),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            warn!(status = %response.status(), "distance matrix request rejected");
            return Err(DistanceError::Status(response.status().to_string()));
        }

        let body: MatrixResponse = response.json().await?;
        let meters = shortest_distance(body, origin, destination)?;
        debug!(origin, destination, meters, "distance resolved");

        Ok(meters)
    }
}
