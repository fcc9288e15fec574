//! HTTP Transport
//!
//! reqwestによるコントロールAPIとpresigned URLアップロードの実装

use async_trait::async_trait;
use futures::stream::{self, Stream};
use log::debug;
use reqwest::multipart::{Form, Part};
use reqwest::{header, Body, Client, ClientBuilder, Response};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use tokio::io::AsyncReadExt;

use crate::domain::errors::TransportError;
use crate::domain::repositories::transport::{
    ControlRequest, ControlResponse, FilePayload, Method, PayloadBody, PlatformTransport,
    StorageResponse,
};

pub const API_KEY_HEADER: &str = "x-api-key";
pub const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Connect and request timeouts for the HTTP client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    pub connect: Duration,
    pub request: Duration,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            request: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

/// Platform transport over HTTP
///
/// The API key is attached to control requests only. Presigned uploads
/// carry their own authorization in the form fields.
pub struct HttpTransport {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HttpTransport {
    /// Create a transport with its own HTTP client
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Network` if the HTTP client cannot be built
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeouts: HttpTimeouts,
    ) -> Result<Self, TransportError> {
        let client = client_builder(timeouts)
            .build()
            .map_err(|e| TransportError::Network {
                message: format!("failed to build HTTP client: {}", e),
            })?;
        Ok(Self::with_client(client, base_url, api_key))
    }

    /// Create a transport around an existing client
    pub fn with_client(
        client: Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    /// Join a control path onto the base URL
    pub fn endpoint(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Client builder with the connect and request timeouts applied
pub fn client_builder(timeouts: HttpTimeouts) -> ClientBuilder {
    Client::builder()
        .connect_timeout(timeouts.connect)
        .timeout(timeouts.request)
}

pub fn join_url(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

fn to_reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Delete => reqwest::Method::DELETE,
    }
}

fn map_send_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout {
            message: e.to_string(),
        }
    } else {
        TransportError::Network {
            message: e.to_string(),
        }
    }
}

/// Stream an open file in fixed-size chunks
fn file_stream(
    file: tokio::fs::File,
) -> impl Stream<Item = std::io::Result<Vec<u8>>> + Send + 'static {
    stream::unfold(Some(file), |state| async move {
        let Some(mut file) = state else {
            return None;
        };
        let mut chunk = vec![0u8; UPLOAD_CHUNK_SIZE];
        match file.read(&mut chunk).await {
            Ok(0) => None,
            Ok(n) => {
                chunk.truncate(n);
                Some((Ok(chunk), Some(file)))
            }
            Err(e) => Some((Err(e), None)),
        }
    })
}

fn file_part(file: FilePayload) -> Part {
    let FilePayload { file_name, body } = file;
    let part = match body {
        PayloadBody::Bytes(data) => Part::bytes(data),
        PayloadBody::File { file, len } => {
            Part::stream_with_length(Body::wrap_stream(file_stream(file)), len)
        }
    };
    part.file_name(file_name)
}

async fn read_body(response: Response) -> Result<String, TransportError> {
    response.text().await.map_err(map_send_error)
}

#[async_trait]
impl PlatformTransport for HttpTransport {
    async fn send_control_request(
        &self,
        request: &ControlRequest,
    ) -> Result<ControlResponse, TransportError> {
        let url = self.endpoint(&request.path);
        debug!("{} {}", request.method, url);

        let mut builder = self
            .client
            .request(to_reqwest_method(request.method), &url)
            .header(API_KEY_HEADER, self.api_key.as_str());
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(map_send_error)?;
        let status = response.status();
        let text = read_body(response).await?;

        if !status.is_success() {
            return Err(TransportError::from_control_status(
                status.as_u16(),
                &request.path,
                &text,
            ));
        }

        let body = if text.trim().is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_str(&text).map_err(|e| TransportError::InvalidResponse {
                message: format!("{} returned malformed JSON: {}", request.path, e),
            })?
        };

        Ok(ControlResponse {
            status: status.as_u16(),
            body,
        })
    }

    async fn send_upload_request(
        &self,
        url: &str,
        form_fields: &BTreeMap<String, String>,
        file: FilePayload,
    ) -> Result<StorageResponse, TransportError> {
        debug!("POST {} ({}, {} bytes)", url, file.file_name, file.len());

        // Storage expects the policy fields before the file part.
        let mut form = Form::new();
        for (name, value) in form_fields {
            form = form.text(name.clone(), value.clone());
        }
        form = form.part("file", file_part(file));

        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(map_send_error)?;

        let status = response.status();
        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        if !status.is_success() {
            let reason = read_body(response).await.unwrap_or_default();
            let reason = match reason.trim() {
                "" => status.canonical_reason().unwrap_or("unknown").to_string(),
                text => text.to_string(),
            };
            return Err(TransportError::UploadRejected {
                status: status.as_u16(),
                reason,
            });
        }

        Ok(StorageResponse {
            status: status.as_u16(),
            location,
        })
    }
}
