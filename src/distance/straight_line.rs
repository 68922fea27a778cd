use async_trait::async_trait;

use crate::distance::DistanceResolver;
use crate::error::DistanceError;
use crate::geo::{haversine_km, parse_canonical};

/// Great-circle distance, used when no mapping provider key is configured.
#[derive(Debug, Clone, Default)]
pub struct StraightLineResolver;

#[async_trait]
impl DistanceResolver for StraightLineResolver {
    async fn resolve(&self, origin: &str, destination: &str) -> Result<u64, DistanceError> {
        let no_route = || DistanceError::NoRoute {
            origin: origin.to_string(),
            destination: destination.to_string(),
        };
        let from = parse_canonical(origin).ok_or_else(no_route)?;
        let to = parse_canonical(destination).ok_or_else(no_route)?;

        Ok((haversine_km(&from, &to) * 1_000.0).round() as u64)
    }
}
