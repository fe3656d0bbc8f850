use std::sync::Arc;

use futures::future::try_join_all;
use run_tracker_lib::GeoPoint;

use crate::{services::ElevationService, ServiceError, SessionError};

/// Largest number of points sent in one elevation lookup.
pub const ELEVATION_CHUNK_SIZE: usize = 500;

/// Sum of the climbs between consecutive samples. Descents count as zero.
pub fn elevation_gain(elevations: &[f64]) -> f64 {
    elevations.windows(2)
        .map(|pair| (pair[1] - pair[0]).max(0.))
        .sum()
}

pub struct ElevationAggregator {
    service: Arc<dyn ElevationService>,
    chunk_size: usize,
}

impl ElevationAggregator {
    pub fn new(service: Arc<dyn ElevationService>) -> Self {
        Self::with_chunk_size(service, ELEVATION_CHUNK_SIZE)
    }

    pub fn with_chunk_size(service: Arc<dyn ElevationService>, chunk_size: usize) -> Self {
        Self {
            service,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Looks up every chunk concurrently and stitches the samples back together in path order.
    /// Any failing chunk fails the whole computation; no default is substituted here.
    pub async fn compute_elevation_gain(&self, path: &[GeoPoint]) -> Result<f64, SessionError> {
        if path.len() < 2 {
            return Ok(0.);
        }

        let lookups = path.chunks(self.chunk_size).map(|chunk| async move {
            let elevations = self.service.elevations(chunk).await?;
            if elevations.len() != chunk.len() {
                return Err(ServiceError::Malformed(format!(
                    "Expected {} elevation samples, got {}",
                    chunk.len(),
                    elevations.len()
                )));
            }
            Ok(elevations)
        });

        let chunks = try_join_all(lookups).await.map_err(|err| {
            tracing::warn!("Elevation lookup failed: {}", err);
            SessionError::from(err)
        })?;

        let elevations: Vec<f64> = chunks.into_iter().flatten().collect();
        tracing::debug!("Resolved {} elevation samples in chunks of {}", elevations.len(), self.chunk_size);

        Ok(elevation_gain(&elevations))
    }
}
