//! Client for the POI lookup service.
//!
//! The service is trusted to filter by proximity: the response array is
//! taken verbatim, in server order.

use std::time::Duration;

use log::info;
use thiserror::Error;

use crate::model::{Coordinate, PointOfInterest};

pub const GET_POIS_PATH: &str = "/api/get_pois";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server answered with status {0}")]
    Status(u16),
    #[error("response is not a POI array: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Anything that can resolve a coordinate into nearby POIs.
pub trait PoiSource {
    fn fetch_pois(&self, coord: Coordinate) -> Result<Vec<PointOfInterest>, FetchError>;
}

/// `<base>/api/get_pois?lat=..&lon=..`, numbers in shortest decimal form.
pub fn poi_url(base_url: &str, coord: Coordinate) -> String {
    format!(
        "{}{GET_POIS_PATH}?lat={}&lon={}",
        base_url.trim_end_matches('/'),
        coord.latitude,
        coord.longitude
    )
}

pub fn parse_pois(body: &str) -> Result<Vec<PointOfInterest>, FetchError> {
    Ok(serde_json::from_str(body)?)
}

pub struct PoiClient {
    http: reqwest::blocking::Client,
    base_url: String,
}

impl PoiClient {
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self, FetchError> {
        // reqwest's blocking client defaults to 30s; `None` really means none.
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self::with_http(http, base_url))
    }

    pub fn with_http(http: reqwest::blocking::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl PoiSource for PoiClient {
    fn fetch_pois(&self, coord: Coordinate) -> Result<Vec<PointOfInterest>, FetchError> {
        let url = poi_url(&self.base_url, coord);
        info!("GET {url}");
        let resp = self.http.get(&url).send()?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        let body = resp.text()?;
        let pois = parse_pois(&body)?;
        info!(
            "{} pois near {},{}; first: {:?}",
            pois.len(),
            coord.latitude,
            coord.longitude,
            pois.first()
        );
        Ok(pois)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_uses_shortest_number_form() {
        let url = poi_url("http://10.0.0.95:3000", Coordinate::new(37.0, -122.0));
        assert_eq!(url, "http://10.0.0.95:3000/api/get_pois?lat=37&lon=-122");
    }

    #[test]
    fn url_keeps_full_precision() {
        let url = poi_url("http://host/", Coordinate::new(37.422_065_6, -122.084_086_1));
        assert_eq!(url, "http://host/api/get_pois?lat=37.4220656&lon=-122.0840861");
    }

    #[test]
    fn parse_keeps_server_order() {
        let body = r#"[
            {"name":"B","address":"2 Side St","lat":1.5,"lon":2.5},
            {"name":"A","address":"1 Main St","lat":1.0,"lon":2.0},
            {"name":"B","address":"2 Side St","lat":1.5,"lon":2.5}
        ]"#;
        let pois = parse_pois(body).unwrap();
        let names: Vec<&str> = pois.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["B", "A", "B"]);
    }

    #[test]
    fn parse_empty_array() {
        assert!(parse_pois("[]").unwrap().is_empty());
    }

    #[test]
    fn parse_rejects_non_array() {
        assert!(matches!(
            parse_pois(r#"{"error":"boom"}"#),
            Err(FetchError::Decode(_))
        ));
        assert!(matches!(
            parse_pois("<html>502</html>"),
            Err(FetchError::Decode(_))
        ));
    }

    #[test]
    fn client_trims_base_url() {
        let client = PoiClient::new("http://host:3000/", None).unwrap();
        assert_eq!(client.base_url(), "http://host:3000");
    }
}
