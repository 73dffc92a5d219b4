use serde::Deserialize;

/// A single latitude/longitude fix in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

/// One record of the `/api/get_pois` response. Extra fields are ignored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PointOfInterest {
    pub name: String,
    pub address: String,
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PermissionState {
    #[default]
    Unknown,
    Granted,
    Denied,
}

impl PermissionState {
    pub fn from_granted(granted: bool) -> Self {
        if granted {
            PermissionState::Granted
        } else {
            PermissionState::Denied
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CameraFacing {
    #[default]
    Back,
    Front,
}

impl CameraFacing {
    pub fn toggled(self) -> Self {
        match self {
            CameraFacing::Back => CameraFacing::Front,
            CameraFacing::Front => CameraFacing::Back,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poi_ignores_unknown_fields() {
        let poi: PointOfInterest = serde_json::from_str(
            r#"{"name":"Cafe","address":"1 Main St","lat":37.001,"lon":-122.001,"rating":4}"#,
        )
        .unwrap();
        assert_eq!(poi.name, "Cafe");
        assert_eq!(poi.lon, -122.001);
    }

    #[test]
    fn poi_requires_coordinates() {
        let res = serde_json::from_str::<PointOfInterest>(r#"{"name":"Cafe","address":"x"}"#);
        assert!(res.is_err());
    }

    #[test]
    fn permission_defaults_to_unknown() {
        assert_eq!(PermissionState::default(), PermissionState::Unknown);
        assert_eq!(PermissionState::from_granted(true), PermissionState::Granted);
        assert_eq!(PermissionState::from_granted(false), PermissionState::Denied);
    }

    #[test]
    fn facing_toggle_round_trips() {
        assert_eq!(CameraFacing::default(), CameraFacing::Back);
        assert_eq!(CameraFacing::Back.toggled(), CameraFacing::Front);
        assert_eq!(CameraFacing::Back.toggled().toggled(), CameraFacing::Back);
    }
}
