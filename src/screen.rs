//! Explicit state of the POI camera screen.
//!
//! Built on mount, dropped on unmount. Every field has exactly one writer:
//! pipeline events go through `apply`, the camera permission through
//! `set_camera_permission`, the panel through `details_mut`.

use std::time::Instant;

use log::{debug, warn};

use crate::{
    model::{CameraFacing, Coordinate, PermissionState, PointOfInterest},
    overlay::DetailsPanel,
    pipeline::ScreenEvent,
};

pub const LOCATION_LABEL: &str = "Location:";

#[derive(Debug, Clone, Default, PartialEq)]
pub enum FetchStatus {
    #[default]
    Idle,
    Loading,
    Loaded,
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    Blank,
    PermissionPrompt,
    Camera,
}

#[derive(Debug)]
pub struct ScreenState {
    camera_permission: PermissionState,
    location_permission: PermissionState,
    coordinate: Option<Coordinate>,
    location_error: Option<String>,
    pois: Vec<PointOfInterest>,
    fetch_status: FetchStatus,
    details: DetailsPanel,
    facing: CameraFacing,
}

impl ScreenState {
    pub fn new(now: Instant) -> Self {
        Self {
            camera_permission: PermissionState::Unknown,
            location_permission: PermissionState::Unknown,
            coordinate: None,
            location_error: None,
            pois: vec![],
            fetch_status: FetchStatus::Idle,
            details: DetailsPanel::new(now),
            facing: CameraFacing::Back,
        }
    }

    pub fn apply(&mut self, event: ScreenEvent) {
        match event {
            ScreenEvent::LocationResolved(coord) => {
                self.location_permission = PermissionState::Granted;
                if self.coordinate.is_some() {
                    warn!("coordinate already set, ignoring {coord:?}");
                    return;
                }
                self.coordinate = Some(coord);
            }
            ScreenEvent::LocationDenied(message) => {
                self.location_permission = PermissionState::Denied;
                if self.location_error.is_none() {
                    self.location_error = Some(message);
                }
            }
            ScreenEvent::FetchStarted(_) => self.fetch_status = FetchStatus::Loading,
            ScreenEvent::PoisLoaded(pois) => {
                debug!("replacing {} pois with {}", self.pois.len(), pois.len());
                self.pois = pois;
                self.fetch_status = FetchStatus::Loaded;
            }
            ScreenEvent::PoisFailed(message) => {
                self.fetch_status = FetchStatus::Failed(message);
            }
        }
    }

    pub fn set_camera_permission(&mut self, permission: PermissionState) {
        self.camera_permission = permission;
    }

    pub fn set_facing(&mut self, facing: CameraFacing) {
        self.facing = facing;
    }

    pub fn render_mode(&self) -> RenderMode {
        match self.camera_permission {
            PermissionState::Unknown => RenderMode::Blank,
            PermissionState::Denied => RenderMode::PermissionPrompt,
            PermissionState::Granted => RenderMode::Camera,
        }
    }

    /// Each POI as name, address, lat and lon run together; one per line.
    pub fn panel_text(&self) -> String {
        self.pois
            .iter()
            .map(|poi| format!("{}{}{}{}", poi.name, poi.address, poi.lat, poi.lon))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn location_text(&self) -> String {
        match &self.location_error {
            Some(err) => format!("{LOCATION_LABEL}\n{err}"),
            None => LOCATION_LABEL.to_string(),
        }
    }

    pub fn camera_permission(&self) -> PermissionState {
        self.camera_permission
    }

    pub fn location_permission(&self) -> PermissionState {
        self.location_permission
    }

    pub fn coordinate(&self) -> Option<Coordinate> {
        self.coordinate
    }

    pub fn location_error(&self) -> Option<&str> {
        self.location_error.as_deref()
    }

    pub fn pois(&self) -> &[PointOfInterest] {
        &self.pois
    }

    pub fn fetch_status(&self) -> &FetchStatus {
        &self.fetch_status
    }

    pub fn facing(&self) -> CameraFacing {
        self.facing
    }

    pub fn details(&self) -> &DetailsPanel {
        &self.details
    }

    pub fn details_mut(&mut self) -> &mut DetailsPanel {
        &mut self.details
    }
}
