use log::info;
use thiserror::Error;

use crate::model::{Coordinate, PermissionState};

#[cfg(target_os = "android")]
pub mod android;
pub mod fixed;

pub const PERMISSION_DENIED_MESSAGE: &str = "Permission to access location was denied";

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LocationError {
    #[error("Permission to access location was denied")]
    PermissionDenied,
    #[error("no position fix available: {0}")]
    Unavailable(String),
    #[error("location platform error: {0}")]
    Platform(String),
}

/// Device location capability. Both calls may block for a long time
/// (system dialog, GPS acquisition), so they run off the UI thread.
pub trait LocationProvider {
    fn request_foreground_permission(&self) -> Result<PermissionState, LocationError>;
    fn current_position(&self) -> Result<Coordinate, LocationError>;
}

/// Foreground location is usable with either precise or approximate access.
pub fn foreground_permission(fine: bool, coarse: bool) -> PermissionState {
    PermissionState::from_granted(fine || coarse)
}

/// Ask for permission once, then read one fix. Not retried.
pub fn acquire_location<L>(provider: &L) -> Result<Coordinate, LocationError>
where
    L: LocationProvider + ?Sized,
{
    info!("Getting location");
    let status = provider.request_foreground_permission()?;
    if status != PermissionState::Granted {
        return Err(LocationError::PermissionDenied);
    }
    provider.current_position()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct Scripted {
        permission: PermissionState,
        fix: Result<Coordinate, LocationError>,
        position_calls: Cell<u32>,
    }

    impl LocationProvider for Scripted {
        fn request_foreground_permission(&self) -> Result<PermissionState, LocationError> {
            Ok(self.permission)
        }

        fn current_position(&self) -> Result<Coordinate, LocationError> {
            self.position_calls.set(self.position_calls.get() + 1);
            self.fix.clone()
        }
    }

    fn scripted(permission: PermissionState, fix: Result<Coordinate, LocationError>) -> Scripted {
        Scripted {
            permission,
            fix,
            position_calls: Cell::new(0),
        }
    }

    #[test]
    fn denied_skips_position_read() {
        let provider = scripted(PermissionState::Denied, Ok(Coordinate::new(1.0, 2.0)));
        let err = acquire_location(&provider).unwrap_err();
        assert_eq!(err, LocationError::PermissionDenied);
        assert_eq!(err.to_string(), PERMISSION_DENIED_MESSAGE);
        assert_eq!(provider.position_calls.get(), 0);
    }

    #[test]
    fn unknown_permission_counts_as_denied() {
        let provider = scripted(PermissionState::Unknown, Ok(Coordinate::new(1.0, 2.0)));
        assert_eq!(
            acquire_location(&provider),
            Err(LocationError::PermissionDenied)
        );
    }

    #[test]
    fn granted_reads_one_fix() {
        let provider = scripted(PermissionState::Granted, Ok(Coordinate::new(37.0, -122.0)));
        assert_eq!(
            acquire_location(&provider),
            Ok(Coordinate::new(37.0, -122.0))
        );
        assert_eq!(provider.position_calls.get(), 1);
    }

    #[test]
    fn approximate_access_alone_is_granted() {
        assert_eq!(foreground_permission(false, true), PermissionState::Granted);
        assert_eq!(foreground_permission(true, false), PermissionState::Granted);
        assert_eq!(foreground_permission(true, true), PermissionState::Granted);
        assert_eq!(foreground_permission(false, false), PermissionState::Denied);
    }

    #[test]
    fn fix_failure_is_returned() {
        let provider = scripted(
            PermissionState::Granted,
            Err(LocationError::Unavailable("no gps".into())),
        );
        assert!(matches!(
            acquire_location(&provider),
            Err(LocationError::Unavailable(_))
        ));
    }
}
