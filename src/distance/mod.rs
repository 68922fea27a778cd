pub mod google;
pub mod straight_line;

use async_trait::async_trait;

use crate::error::DistanceError;

pub use google::GoogleDistanceMatrix;
pub use straight_line::StraightLineResolver;

/// Maps two canonical `"<lat>,<lng>"` strings to a distance in meters.
///
/// Called strictly before an order is persisted; implementations may be slow
/// and may fail.
#[async_trait]
pub trait DistanceResolver: Send + Sync {
    async fn resolve(&self, origin: &str, destination: &str) -> Result<u64, DistanceError>;
}
