use crate::models::StationId;
use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use std::fmt;
use std::time::Duration;
use tracing::field;
use tracing::warn;
use url::Url;

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

/// Anything that can perform a GET and hand back the buffered body.
///
/// An `Err` means no response was received at all (DNS, connect, reset);
/// non-success statuses come back as `Ok` and are judged by the caller.
pub trait Transport {
    async fn get(&self, url: &Url) -> Result<HttpResponse>;
}

/// Why a request produced nothing usable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    Status(StatusCode),
    Transport(String),
    BadUrl(String),
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::Status(status) => write!(f, "{}", status),
            Failure::Transport(error) => f.write_str(error),
            Failure::BadUrl(error) => write!(f, "invalid URL: {}", error),
        }
    }
}

/// Every HTTP-side diagnostic goes through here so each one carries the same
/// fields: `station` (absent for flat files), `url`, and `status` or `error`.
pub fn log_failure(what: &str, station: Option<&StationId>, url: &str, failure: &Failure) {
    let station = station.map(field::display);
    match failure {
        Failure::Status(status) => warn!(station, url, status = %status, "{}", what),
        Failure::Transport(error) | Failure::BadUrl(error) => {
            warn!(station, url, error = %error, "{}", what)
        }
    }
}

pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new(timeout: Option<Duration>, proxy: Option<&str>) -> Result<Self> {
        let mut client_builder = Client::builder();

        if let Some(timeout) = timeout {
            client_builder = client_builder.timeout(timeout);
        }

        if let Some(proxy_url) = proxy {
            client_builder = client_builder.proxy(reqwest::Proxy::http(proxy_url)?);
        }

        let client = client_builder
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { client })
    }
}

impl Transport for HttpClient {
    async fn get(&self, url: &Url) -> Result<HttpResponse> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .context("GET request failed")?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .context("Failed to read response body")?
            .to_vec();

        Ok(HttpResponse { status, body })
    }
}
