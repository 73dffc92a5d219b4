//! Desktop location: no GPS, so the fix comes from configuration.

use crate::model::{Coordinate, PermissionState};

use super::{LocationError, LocationProvider};

pub struct FixedLocation {
    coordinate: Option<Coordinate>,
}

impl FixedLocation {
    pub fn new(coordinate: Option<Coordinate>) -> Self {
        Self { coordinate }
    }
}

impl LocationProvider for FixedLocation {
    fn request_foreground_permission(&self) -> Result<PermissionState, LocationError> {
        Ok(PermissionState::Granted)
    }

    fn current_position(&self) -> Result<Coordinate, LocationError> {
        self.coordinate.ok_or_else(|| {
            LocationError::Unavailable("POI_LENS_FIXED_LOCATION is not set".to_string())
        })
    }
}
