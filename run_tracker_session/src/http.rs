//! HTTP clients for the directions and elevation collaborators.
//!
//! Both speak a small JSON contract:
//! `POST {base}/directions` with `{origin, destination}` answers `{routes: [{encoded_polyline, legs: [{distance_meters}]}]}`,
//! `POST {base}/elevation` with `{points}` answers `{elevations}`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use run_tracker_lib::GeoPoint;
use serde::{Deserialize, Serialize};

use crate::{
    services::{DirectionsRoute, DirectionsService, ElevationService},
    ServiceError,
};

#[derive(Serialize)]
struct DirectionsRequest {
    origin: GeoPoint,
    destination: GeoPoint,
}

#[derive(Deserialize)]
struct DirectionsResponse {
    routes: Vec<DirectionsRoute>,
}

#[derive(Serialize)]
struct ElevationRequest<'a> {
    points: &'a [GeoPoint],
}

#[derive(Deserialize)]
struct ElevationResponse {
    elevations: Vec<f64>,
}

#[derive(Clone)]
struct JsonEndpoint {
    client: Client,
    url: String,
    timeout: Duration,
}

impl JsonEndpoint {
    fn new(base_url: &str, path: &str, timeout: Duration) -> Result<Self, ServiceError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| ServiceError::Network(format!("Failed to build http client: {err}")))?;

        Ok(Self {
            client,
            url: format!("{}/{}", base_url.trim_end_matches('/'), path),
            timeout,
        })
    }

    async fn post<Req: Serialize + ?Sized, Res: serde::de::DeserializeOwned>(&self, body: &Req) -> Result<Res, ServiceError> {
        let response = self.client
            .post(&self.url)
            .json(body)
            .send().await
            .map_err(|err| self.map_error(err))?;

        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => return Err(ServiceError::Quota(format!("{} answered 429", self.url))),
            status if !status.is_success() => return Err(ServiceError::Network(format!("{} answered {}", self.url, status))),
            _ => {}
        }

        response.json::<Res>().await
            .map_err(|err| ServiceError::Malformed(err.to_string()))
    }

    fn map_error(&self, err: reqwest::Error) -> ServiceError {
        if err.is_timeout() {
            ServiceError::Timeout(self.timeout.as_millis() as u64)
        } else {
            ServiceError::Network(err.to_string())
        }
    }
}

#[derive(Clone)]
pub struct HttpDirectionsService {
    endpoint: JsonEndpoint,
}

impl HttpDirectionsService {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ServiceError> {
        Ok(Self { endpoint: JsonEndpoint::new(base_url, "directions", timeout)? })
    }
}

#[async_trait]
impl DirectionsService for HttpDirectionsService {
    async fn directions(&self, origin: GeoPoint, destination: GeoPoint) -> Result<Vec<DirectionsRoute>, ServiceError> {
        tracing::debug!("Requesting directions from {:?} to {:?}", origin, destination);
        let response: DirectionsResponse = self.endpoint.post(&DirectionsRequest { origin, destination }).await?;
        Ok(response.routes)
    }
}

#[derive(Clone)]
pub struct HttpElevationService {
    endpoint: JsonEndpoint,
}

impl HttpElevationService {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ServiceError> {
        Ok(Self { endpoint: JsonEndpoint::new(base_url, "elevation", timeout)? })
    }
}

#[async_trait]
impl ElevationService for HttpElevationService {
    async fn elevations(&self, points: &[GeoPoint]) -> Result<Vec<f64>, ServiceError> {
        tracing::debug!("Requesting elevation for {} points", points.len());
        let response: ElevationResponse = self.endpoint.post(&ElevationRequest { points }).await?;
        Ok(response.elevations)
    }
}
