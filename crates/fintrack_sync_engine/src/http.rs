//! REST implementation of the remote entity client.
//!
//! The HTTP library is abstracted behind [`HttpClient`] so the adapter can
//! be exercised without sockets. With the `reqwest` feature enabled,
//! [`ReqwestClient`] provides a blocking implementation.
//!
//! Routes per record kind:
//!
//! | Method | Path | Success |
//! |---|---|---|
//! | GET | `/{resource}/` | JSON array |
//! | POST | `/{resource}/` | record JSON or empty body |
//! | PUT | `/{resource}/{id}` | any body |
//! | DELETE | `/{resource}/{id}` | any body; 404 also accepted |

use crate::error::{SyncError, SyncResult};
use crate::remote::{CreateOutcome, RemoteEntityClient};
use fintrack_model::{RemoteRecord, SyncEntity};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Longest response body excerpt kept in a [`SyncError::Server`].
const MAX_ERROR_BODY: usize = 512;

/// HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// DELETE
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        })
    }
}

/// An outgoing request. Bodies are JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Method.
    pub method: Method,
    /// Absolute URL.
    pub url: String,
    /// JSON body, if any.
    pub body: Option<Vec<u8>>,
}

/// A received response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Raw body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Creates a response.
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Returns true if the body is empty or only whitespace.
    pub fn is_empty_body(&self) -> bool {
        self.body.iter().all(u8::is_ascii_whitespace)
    }
}

/// HTTP client abstraction.
///
/// Implement this trait to provide the actual HTTP transport. An `Err`
/// means no response was received (timeout, refused connection, TLS);
/// any received status, including 4xx and 5xx, is an `Ok`.
pub trait HttpClient: Send + Sync {
    /// Sends a request and waits for the response.
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, String>;
}

impl<C: HttpClient + ?Sized> HttpClient for Arc<C> {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, String> {
        (**self).execute(request)
    }
}

/// REST client for one record kind.
pub struct RestEntityClient<E, C> {
    base_url: String,
    client: C,
    _kind: PhantomData<fn() -> E>,
}

impl<E: SyncEntity, C: HttpClient> RestEntityClient<E, C> {
    /// Creates a client rooted at `base_url`.
    pub fn new(base_url: impl Into<String>, client: C) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            _kind: PhantomData,
        }
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL of the collection (`{base}/{resource}/`).
    pub fn collection_url(&self) -> String {
        format!("{}/{}/", self.base_url, E::RESOURCE)
    }

    /// URL of one record (`{base}/{resource}/{id}`).
    pub fn item_url(&self, remote_id: u64) -> String {
        format!("{}/{}/{}", self.base_url, E::RESOURCE, remote_id)
    }

    fn send(&self, method: Method, url: String, body: Option<Vec<u8>>) -> SyncResult<HttpResponse> {
        tracing::trace!(%method, %url, "sending request");
        self.client
            .execute(HttpRequest { method, url, body })
            .map_err(SyncError::Network)
    }

    fn encode(entity: &E) -> SyncResult<Vec<u8>> {
        serde_json::to_vec(entity)
            .map_err(|e| SyncError::Parse(format!("failed to encode request: {}", e)))
    }
}

fn server_error(response: &HttpResponse) -> SyncError {
    let mut body = String::from_utf8_lossy(&response.body).into_owned();
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    SyncError::Server {
        status: response.status,
        body,
    }
}

impl<E: SyncEntity, C: HttpClient> RemoteEntityClient<E> for RestEntityClient<E, C> {
    fn list(&self) -> SyncResult<Vec<E>> {
        let response = self.send(Method::Get, self.collection_url(), None)?;
        if !response.is_success() {
            return Err(server_error(&response));
        }
        if response.is_empty_body() {
            return Ok(Vec::new());
        }
        serde_json::from_slice(&response.body)
            .map_err(|e| SyncError::Parse(format!("failed to decode listing: {}", e)))
    }

    fn create(&self, entity: &E) -> SyncResult<CreateOutcome> {
        let body = Self::encode(entity)?;
        let response = self.send(Method::Post, self.collection_url(), Some(body))?;
        if !response.is_success() {
            return Err(server_error(&response));
        }
        if response.is_empty_body() {
            return Ok(CreateOutcome::EmptyBody);
        }

        let record = RemoteRecord::from_json(&response.body)
            .map_err(|e| SyncError::Parse(format!("failed to decode created record: {}", e)))?;
        if record.id == 0 {
            return Err(SyncError::Parse("created record has unassigned id 0".into()));
        }
        Ok(CreateOutcome::Created(record))
    }

    fn update(&self, remote_id: u64, entity: &E) -> SyncResult<()> {
        let body = Self::encode(entity)?;
        let response = self.send(Method::Put, self.item_url(remote_id), Some(body))?;
        if !response.is_success() {
            return Err(server_error(&response));
        }
        Ok(())
    }

    fn delete(&self, remote_id: u64) -> SyncResult<()> {
        let response = self.send(Method::Delete, self.item_url(remote_id), None)?;
        if response.status == 404 {
            tracing::debug!(resource = E::RESOURCE, remote_id, "record already gone");
            return Ok(());
        }
        if !response.is_success() {
            return Err(server_error(&response));
        }
        Ok(())
    }
}

/// Blocking HTTP client backed by `reqwest`.
#[cfg(feature = "reqwest")]
pub struct ReqwestClient {
    client: reqwest::blocking::Client,
}

#[cfg(feature = "reqwest")]
impl ReqwestClient {
    /// Builds a client honouring the configured timeout and user agent.
    pub fn new(config: &crate::config::SyncConfig) -> SyncResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| SyncError::Network(e.to_string()))?;
        Ok(Self { client })
    }
}

#[cfg(feature = "reqwest")]
impl HttpClient for ReqwestClient {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, String> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self.client.request(method, &request.url);
        if let Some(body) = request.body {
            builder = builder
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body);
        }

        let response = builder.send().map_err(|e| {
            if e.is_timeout() {
                format!("request timed out: {}", e)
            } else {
                e.to_string()
            }
        })?;
        let status = response.status().as_u16();
        let body = response.bytes().map_err(|e| e.to_string())?;
        Ok(HttpResponse::new(status, body.to_vec()))
    }
}
