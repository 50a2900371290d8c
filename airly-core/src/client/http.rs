use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::{
    client::{HttpResponse, MeasurementRequest, Transport},
    error::Result,
};

/// Build a session that many clients can share.
pub fn session(timeout: Duration) -> Result<Client> {
    Ok(Client::builder().timeout(timeout).build()?)
}

/// `reqwest`-backed transport.
///
/// Either owns its session (dropped with the transport) or holds a clone of
/// a session handle shared with other clients. A shared handle is never
/// shut down from here; the pool lives until the last clone is gone.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: Client,
}

impl HttpTransport {
    pub fn owned(timeout: Duration) -> Result<Self> {
        Ok(Self { http: session(timeout)? })
    }

    pub fn shared(http: Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, request: &MeasurementRequest) -> Result<HttpResponse> {
        let mut builder = self.http.get(&request.url);
        for (name, value) in &request.headers {
            builder = builder.header(*name, value.as_str());
        }

        let res = builder.send().await?;
        let status = res.status().as_u16();
        let body = res.text().await?;

        Ok(HttpResponse { status, body })
    }
}
