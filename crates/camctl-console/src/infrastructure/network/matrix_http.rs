//! HTTP client for MT-VIKI style video matrices.
//!
//! The device exposes a single command endpoint.  Every request is a `GET`
//! with a `matrixdata` query parameter holding a compact JSON object:
//!
//! ```text
//! GET /goform/SetMatrixDirectCmd?matrixdata={"COMMAND":"SW 8 1 4"}
//! GET /goform/SetMatrixDirectCmd?matrixdata={"COMMAND":"GETSWS"}
//! ```
//!
//! Basic authentication is added only when both a username and a password
//! are configured.

use async_trait::async_trait;
use camctl_core::matrix::{parse_read_response, read_request, switch_request};
use camctl_core::{MatrixError, MatrixMapping, SwitchCommand};
use tracing::debug;

use crate::application::matrix_reconciler::MatrixClient;
use crate::infrastructure::storage::config::MatrixConfig;

/// Path of the device's command endpoint.
pub const COMMAND_PATH: &str = "/goform/SetMatrixDirectCmd";

/// Builds the command endpoint URL for `host:port`.
pub fn command_url(host: &str, port: u16) -> String {
    format!("http://{host}:{port}{COMMAND_PATH}")
}

/// [`MatrixClient`] over plain HTTP.
#[derive(Debug, Clone)]
pub struct HttpMatrixClient {
    client: reqwest::Client,
    url: String,
    credentials: Option<(String, String)>,
}

impl HttpMatrixClient {
    /// Creates a client for the configured device.
    ///
    /// # Errors
    ///
    /// Returns [`MatrixError::Transport`] if the HTTP client cannot be built.
    pub fn new(config: &MatrixConfig) -> Result<Self, MatrixError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| MatrixError::Transport(e.to_string()))?;
        let credentials = (!config.username.is_empty() && !config.password.is_empty())
            .then(|| (config.username.clone(), config.password.clone()));
        Ok(Self {
            client,
            url: command_url(&config.host, config.port),
            credentials,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn command(&self, matrixdata: String) -> Result<String, MatrixError> {
        debug!(url = %self.url, %matrixdata, "matrix request");
        let mut request = self
            .client
            .get(&self.url)
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .query(&[("matrixdata", matrixdata)]);
        if let Some((username, password)) = &self.credentials {
            request = request.basic_auth(username, Some(password));
        }

        let response = request
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| MatrixError::Transport(e.to_string()))?;
        response
            .text()
            .await
            .map_err(|e| MatrixError::Transport(e.to_string()))
    }
}

#[async_trait]
impl MatrixClient for HttpMatrixClient {
    async fn read_mapping(&self) -> Result<MatrixMapping, MatrixError> {
        let body = self.command(read_request()).await?;
        parse_read_response(&body)
    }

    async fn switch(&self, command: &SwitchCommand) -> Result<(), MatrixError> {
        self.command(switch_request(command)).await.map(|_| ())
    }
}
