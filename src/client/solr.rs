use super::protocol::*;
use crate::config::ClientConfig;
use crate::error::{DispatchError, Result};

use reqwest::header::CONTENT_TYPE;
use std::path::Path;
use std::time::Duration;

/// HTTP client bound to one index-server instance.
///
/// Every call opens its own connection and reads the whole response into
/// memory. Idle connections are never kept, so a client is cheap to drop
/// after a single command.
///
/// The read timeout bounds each wait for data from the server, not the whole
/// call; a slow but steady response is never cut off.
#[derive(Debug, Clone)]
pub struct IndexServiceClient {
    host: String,
    port: u16,
    http_client: reqwest::Client,
    connect_timeout: Duration,
    read_timeout: Duration,
}

impl IndexServiceClient {
    pub fn new(host: &str, port: u16, config: &ClientConfig) -> Result<Self> {
        let connect_timeout = config.connect_timeout();
        let read_timeout = config.read_timeout();
        Ok(Self {
            host: host.to_string(),
            port,
            http_client: build_http_client(connect_timeout, read_timeout)?,
            connect_timeout,
            read_timeout,
        })
    }

    /// Same node, different read timeout for the calls that follow.
    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Result<Self> {
        self.http_client = build_http_client(self.connect_timeout, read_timeout)?;
        self.read_timeout = read_timeout;
        Ok(self)
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}:{}{}", self.host, self.port, path)
    }

    /// POSTs an XML update command (commit, optimize, delete).
    pub async fn push_update(&self, xml: &str) -> Result<String> {
        let request = self
            .http_client
            .post(self.url(ENDPOINT_UPDATE))
            .header(CONTENT_TYPE, CONTENT_TYPE_XML)
            .body(xml.to_string());
        self.send(request).await
    }

    /// POSTs a tab-separated body: header line followed by data lines.
    pub async fn push_bulk(&self, tsv: String) -> Result<String> {
        let request = self
            .http_client
            .post(self.url(ENDPOINT_UPDATE_TSV))
            .header(CONTENT_TYPE, CONTENT_TYPE_TSV)
            .body(tsv);
        self.send(request).await
    }

    /// Asks the server to ingest a tab-separated file from its own filesystem.
    ///
    /// `path` is made absolute against the current directory, which only makes
    /// sense when the dispatcher and the server share a filesystem layout.
    pub async fn push_bulk_via_server_local_file(&self, path: &Path) -> Result<String> {
        let absolute = std::path::absolute(path)?;
        let encoded = urlencoding::encode(&absolute.to_string_lossy()).into_owned();
        let request = self
            .http_client
            .get(format!("{}{}", self.url(ENDPOINT_UPDATE_STREAM_FILE), encoded));
        self.send(request).await
    }

    pub async fn ping(&self) -> Result<String> {
        let request = self.http_client.get(self.url(ENDPOINT_PING));
        self.send(request).await
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<String> {
        let response = request
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            tracing::debug!("{} answered {}: {}", self.address(), status, body);
            return Err(DispatchError::PartialData {
                node: self.address(),
                status: status.as_u16(),
                body,
            });
        }

        Ok(body)
    }

    fn transport_error(&self, err: reqwest::Error) -> DispatchError {
        let message = if err.is_timeout() {
            format!("timed out after {:?}: {}", self.read_timeout, err)
        } else if err.is_connect() {
            format!("connection failed: {}", err)
        } else {
            err.to_string()
        };
        DispatchError::Transport {
            node: self.address(),
            message,
        }
    }
}

fn build_http_client(
    connect_timeout: Duration,
    read_timeout: Duration,
) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(connect_timeout)
        .read_timeout(read_timeout)
        .pool_max_idle_per_host(0)
        .build()
        .map_err(|e| DispatchError::Config(format!("cannot build HTTP client: {}", e)))
}
