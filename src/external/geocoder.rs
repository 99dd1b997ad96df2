use async_trait::async_trait;

use super::error::CollaboratorError;

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    async fn lookup(&self, latitude: f64, longitude: f64) -> Result<String, CollaboratorError>;
}

/// Offline fallback: renders the coordinates as a hemisphere-qualified string.
#[derive(Debug, Clone, Copy, Default)]
pub struct CoordinateGeocoder;

#[async_trait]
impl ReverseGeocoder for CoordinateGeocoder {
    async fn lookup(&self, latitude: f64, longitude: f64) -> Result<String, CollaboratorError> {
        let ns = if latitude >= 0.0 { 'N' } else { 'S' };
        let ew = if longitude >= 0.0 { 'E' } else { 'W' };
        Ok(format!(
            "{:.4}°{ns}, {:.4}°{ew}",
            latitude.abs(),
            longitude.abs()
        ))
    }
}
