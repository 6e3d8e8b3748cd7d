//! Location acquisition for task start/complete
//!
//! The engine waits for either a position or a definitive error; there is no
//! client-imposed timeout on acquisition.

use async_trait::async_trait;
use fwmp_common::models::GeoPoint;
use thiserror::Error;

/// Definitive outcomes of a failed location query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LocationError {
    /// The device user denied the location permission
    #[error("location permission denied")]
    Denied,

    /// Permission granted but no fix obtainable
    #[error("no position fix available")]
    Unavailable,
}

/// Source of the worker's current position
#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn current_position(&self) -> Result<GeoPoint, LocationError>;
}

/// Location as reported by the worker's device alongside an API request
///
/// The device performs the actual geolocation query; the request carries its
/// outcome. Absent coordinates without an explicit denial read as "no fix".
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DeviceReport {
    Fix(GeoPoint),
    Denied,
    Unavailable,
}

impl DeviceReport {
    pub fn from_parts(lat: Option<f64>, lng: Option<f64>, denied: bool) -> Self {
        if denied {
            return DeviceReport::Denied;
        }
        match (lat, lng) {
            (Some(lat), Some(lng)) => DeviceReport::Fix(GeoPoint { lat, lng }),
            _ => DeviceReport::Unavailable,
        }
    }
}

#[async_trait]
impl LocationProvider for DeviceReport {
    async fn current_position(&self) -> Result<GeoPoint, LocationError> {
        match self {
            DeviceReport::Fix(point) => Ok(*point),
            DeviceReport::Denied => Err(LocationError::Denied),
            DeviceReport::Unavailable => Err(LocationError::Unavailable),
        }
    }
}
