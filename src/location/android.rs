use std::time::{Duration, Instant};

use log::{info, warn};

use crate::android::{
    check_self_permission, last_known_location, request_location_permission,
    COARSE_LOCATION_PERMISSION, FINE_LOCATION_PERMISSION,
};
use crate::model::{Coordinate, PermissionState};

use super::{foreground_permission, LocationError, LocationProvider};

const PERMISSION_POLL_INTERVAL: Duration = Duration::from_millis(250);
const PROVIDERS: [&str; 2] = ["gps", "network"];

pub struct AndroidLocation {
    app: slint::android::AndroidApp,
    permission_wait: Duration,
}

impl AndroidLocation {
    pub fn new(app: slint::android::AndroidApp, permission_wait: Duration) -> Self {
        Self {
            app,
            permission_wait,
        }
    }

    fn permission(&self) -> Result<PermissionState, LocationError> {
        let check = |permission: &str| {
            check_self_permission(&self.app, permission)
                .map_err(|err| LocationError::Platform(err.to_string()))
        };
        let fine = check(FINE_LOCATION_PERMISSION)?;
        let coarse = check(COARSE_LOCATION_PERMISSION)?;
        Ok(foreground_permission(fine, coarse))
    }
}

impl LocationProvider for AndroidLocation {
    fn request_foreground_permission(&self) -> Result<PermissionState, LocationError> {
        if self.permission()? == PermissionState::Granted {
            return Ok(PermissionState::Granted);
        }
        request_location_permission(&self.app)
            .map_err(|err| LocationError::Platform(err.to_string()))?;

        // A dismissed dialog and a refusal look the same from here.
        let deadline = Instant::now() + self.permission_wait;
        while Instant::now() < deadline {
            std::thread::sleep(PERMISSION_POLL_INTERVAL);
            if self.permission()? == PermissionState::Granted {
                return Ok(PermissionState::Granted);
            }
        }
        warn!(
            "location permission not granted within {}s",
            self.permission_wait.as_secs()
        );
        Ok(PermissionState::Denied)
    }

    /// Cached last-known fix only; a stale or missing cache is not refreshed.
    fn current_position(&self) -> Result<Coordinate, LocationError> {
        for provider in PROVIDERS {
            match last_known_location(&self.app, provider) {
                Ok(Some((latitude, longitude))) => {
                    info!("location fix from {provider}: {latitude},{longitude}");
                    return Ok(Coordinate::new(latitude, longitude));
                }
                Ok(None) => info!("no fix from {provider}"),
                Err(err) => warn!("{provider} provider failed: {err:?}"),
            }
        }
        Err(LocationError::Unavailable(
            "no provider reported a location".to_string(),
        ))
    }
}
