use std::{fmt::Debug, sync::Arc, time::Duration};

use async_trait::async_trait;

use crate::{
    client::http::HttpTransport,
    error::{Error, Result},
    model::{Coordinate, MeasurementPayload},
};

pub mod http;

pub const MEASUREMENTS_URL: &str = "https://airapi.airly.eu/v2/measurements/point";

/// Upper bound for a single measurement request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// A fully built GET request: URL plus the fixed header set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeasurementRequest {
    pub url: String,
    pub headers: Vec<(&'static str, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// Sends one request and hands back the raw response.
#[async_trait]
pub trait Transport: Send + Sync + Debug {
    async fn get(&self, request: &MeasurementRequest) -> Result<HttpResponse>;
}

/// Build the point-measurement request for `coordinate`.
pub fn measurement_request(api_key: &str, coordinate: Coordinate) -> MeasurementRequest {
    MeasurementRequest {
        url: format!(
            "{MEASUREMENTS_URL}?lat={}&lng={}",
            coordinate.latitude, coordinate.longitude
        ),
        headers: vec![
            ("Accept", "application/json".to_string()),
            ("apikey", api_key.to_string()),
        ],
    }
}

#[derive(Debug, Clone)]
pub struct AirlyClient {
    api_key: String,
    transport: Arc<dyn Transport>,
}

impl AirlyClient {
    /// Client with its own HTTP session, released when the client is dropped.
    pub fn new(api_key: String) -> Result<Self> {
        let transport = HttpTransport::owned(REQUEST_TIMEOUT)?;
        Ok(Self::with_transport(api_key, Arc::new(transport)))
    }

    /// Client borrowing a session shared with other clients.
    pub fn with_session(api_key: String, session: reqwest::Client) -> Self {
        Self::with_transport(api_key, Arc::new(HttpTransport::shared(session)))
    }

    pub fn with_transport(api_key: String, transport: Arc<dyn Transport>) -> Self {
        Self { api_key, transport }
    }

    /// Fetch the current measurements for the given point.
    ///
    /// Exactly one request is made. It fails with [`Error::Timeout`] once
    /// [`REQUEST_TIMEOUT`] elapses and is never retried.
    pub async fn get_state(&self, latitude: f64, longitude: f64) -> Result<MeasurementPayload> {
        let request = measurement_request(&self.api_key, Coordinate { latitude, longitude });
        log::debug!("GET {}", request.url);

        let response = tokio::time::timeout(REQUEST_TIMEOUT, self.transport.get(&request))
            .await
            .map_err(|_| Error::Timeout(REQUEST_TIMEOUT))??;

        parse_payload(&response)
    }
}

fn parse_payload(response: &HttpResponse) -> Result<MeasurementPayload> {
    let payload: MeasurementPayload =
        serde_json::from_str(&response.body).map_err(|err| Error::Protocol {
            status: response.status,
            detail: format!("{err}; body: {}", truncate_body(&response.body)),
        })?;

    if payload.sets.is_empty() {
        return Err(Error::Protocol {
            status: response.status,
            detail: "response contained no measurement sets".to_string(),
        });
    }

    Ok(payload)
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((end, _)) => format!("{}...", &body[..end]),
        None => body.to_string(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::{collections::VecDeque, sync::Mutex};

    /// Serves queued responses in order and records every request.
    #[derive(Debug, Default)]
    pub(crate) struct FakeTransport {
        responses: Mutex<VecDeque<Result<HttpResponse>>>,
        pub(crate) requests: Mutex<Vec<MeasurementRequest>>,
    }

    impl FakeTransport {
        pub(crate) fn push_body(&self, body: &str) {
            self.push(Ok(HttpResponse { status: 200, body: body.to_string() }));
        }

        pub(crate) fn push(&self, response: Result<HttpResponse>) {
            self.responses.lock().unwrap().push_back(response);
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn get(&self, request: &MeasurementRequest) -> Result<HttpResponse> {
            self.requests.lock().unwrap().push(request.clone());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(Error::Network("no response queued".into())))
        }
    }

    /// Never answers.
    #[derive(Debug)]
    pub(crate) struct StalledTransport;

    #[async_trait]
    impl Transport for StalledTransport {
        async fn get(&self, _request: &MeasurementRequest) -> Result<HttpResponse> {
            std::future::pending().await
        }
    }

    #[test]
    fn request_puts_latitude_before_longitude() {
        let coordinate = Coordinate::new(50.062006, 19.940984).unwrap();
        let request = measurement_request("KEY", coordinate);

        assert_eq!(
            request.url,
            "https://airapi.airly.eu/v2/measurements/point?lat=50.062006&lng=19.940984"
        );
        assert_eq!(
            request.headers,
            vec![("Accept", "application/json".to_string()), ("apikey", "KEY".to_string())]
        );
    }

    #[tokio::test]
    async fn get_state_sends_one_request_and_parses_body() {
        let transport = Arc::new(FakeTransport::default());
        transport.push_body(r#"[{"current":{"indexes":[{"value":7}],"values":[]}}]"#);
        let client = AirlyClient::with_transport("KEY".into(), transport.clone());

        let payload = client.get_state(52.2, 21.0).await.unwrap();

        assert_eq!(payload.primary_index().unwrap().value, Some(7.0));
        let requests = transport.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].url.ends_with("?lat=52.2&lng=21"));
    }

    #[tokio::test]
    async fn non_json_body_is_protocol_error() {
        let transport = Arc::new(FakeTransport::default());
        transport.push(Ok(HttpResponse { status: 503, body: "<html>busy</html>".into() }));
        let client = AirlyClient::with_transport("KEY".into(), transport);

        let err = client.get_state(0.0, 0.0).await.unwrap_err();

        match err {
            Error::Protocol { status, detail } => {
                assert_eq!(status, 503);
                assert!(detail.contains("<html>busy</html>"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_sequence_is_protocol_error() {
        let transport = Arc::new(FakeTransport::default());
        transport.push_body("[]");
        let client = AirlyClient::with_transport("KEY".into(), transport);

        assert!(matches!(client.get_state(0.0, 0.0).await, Err(Error::Protocol { .. })));
    }

    #[tokio::test]
    async fn network_error_is_not_retried() {
        let transport = Arc::new(FakeTransport::default());
        transport.push(Err(Error::Network("dns failure".into())));
        transport.push_body(r#"[{"current":{}}]"#);
        let client = AirlyClient::with_transport("KEY".into(), transport.clone());

        let err = client.get_state(0.0, 0.0).await.unwrap_err();

        assert!(matches!(err, Error::Network(_)));
        assert_eq!(transport.requests.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_request_times_out() {
        let client = AirlyClient::with_transport("KEY".into(), Arc::new(StalledTransport));
        let started = tokio::time::Instant::now();

        let err = client.get_state(0.0, 0.0).await.unwrap_err();

        assert!(matches!(err, Error::Timeout(d) if d == REQUEST_TIMEOUT));
        let waited = started.elapsed();
        assert!(waited >= REQUEST_TIMEOUT && waited < REQUEST_TIMEOUT + Duration::from_secs(1));
    }

    #[test]
    fn truncate_body_respects_char_boundaries() {
        let long = "ż".repeat(300);
        let truncated = truncate_body(&long);
        assert_eq!(truncated.chars().count(), 203);
        assert_eq!(truncate_body("short"), "short");
    }
}
