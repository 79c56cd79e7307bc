//! REST transport implementation.
//!
//! This module provides `PushTransport` over the push service's HTTP API
//! using reqwest, plus the shared request plumbing used by the admin
//! accessors.

use async_trait::async_trait;
use bytes::Bytes;
use herald_protocol::{
    codec, DeviceDetails, DeviceRegistrationResponse, ErrorEnvelope, ErrorInfo, Format,
    PublishRequest,
};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE, LINK};
use reqwest::{Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::admin::Admin;
use crate::traits::{PushTransport, TransportError};

/// Header carrying the update token on update and deregister requests.
pub const UPDATE_TOKEN_HEADER: &str = "X-Herald-Update-Token";

/// Default service endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://rest.herald.dev";

/// REST client configuration.
#[derive(Debug, Clone)]
pub struct RestOptions {
    /// Base URL of the service.
    pub endpoint: String,
    /// API key (`name:secret`), sent with HTTP basic auth.
    pub key: Option<String>,
    /// Bearer token, preferred over the key when both are set.
    pub token: Option<String>,
    /// Use MessagePack instead of JSON for bodies.
    pub use_binary_protocol: bool,
    /// Extra headers added to every request.
    pub headers: HashMap<String, String>,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for RestOptions {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            key: None,
            token: None,
            use_binary_protocol: false,
            headers: HashMap::new(),
            timeout: Duration::from_secs(15),
        }
    }
}

impl RestOptions {
    /// Body format implied by `use_binary_protocol`.
    #[must_use]
    pub fn format(&self) -> Format {
        Format::from_binary_protocol(self.use_binary_protocol)
    }
}

/// One page of a listing.
#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    /// Items on this page.
    pub items: Vec<T>,
    /// Absolute URL of the next page, if the service advertised one.
    pub next: Option<Url>,
}

impl<T> PaginatedResult<T> {
    /// Check whether another page follows.
    #[must_use]
    pub fn has_next(&self) -> bool {
        self.next.is_some()
    }

    /// Check whether this is the last page.
    #[must_use]
    pub fn is_last(&self) -> bool {
        self.next.is_none()
    }

    pub(crate) fn map<U>(self, f: impl FnMut(T) -> U) -> PaginatedResult<U> {
        PaginatedResult {
            items: self.items.into_iter().map(f).collect(),
            next: self.next,
        }
    }
}

/// HTTP plumbing shared by the transport and the admin accessors.
#[derive(Debug)]
pub struct RestClient {
    http: reqwest::Client,
    base: Url,
    options: RestOptions,
}

impl RestClient {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is not a valid base URL or the HTTP
    /// client cannot be built.
    pub fn new(options: RestOptions) -> Result<Self, TransportError> {
        let base = Url::parse(&options.endpoint)
            .map_err(|e| TransportError::InvalidUrl(format!("{}: {}", options.endpoint, e)))?;
        if base.cannot_be_a_base() {
            return Err(TransportError::InvalidUrl(options.endpoint.clone()));
        }

        let http = reqwest::Client::builder().timeout(options.timeout).build()?;

        debug!(endpoint = %base, format = %options.format(), "Created push REST client");

        Ok(Self {
            http,
            base,
            options,
        })
    }

    /// Get the client options.
    #[must_use]
    pub fn options(&self) -> &RestOptions {
        &self.options
    }

    /// Get the body format.
    #[must_use]
    pub fn format(&self) -> Format {
        self.options.format()
    }

    /// Build a URL from path segments. Each segment is percent-encoded.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint cannot take path segments.
    pub fn url(&self, segments: &[&str]) -> Result<Url, TransportError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| TransportError::InvalidUrl(self.options.endpoint.clone()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn headers(&self, with_body: bool) -> Result<HeaderMap, TransportError> {
        let content_type = HeaderValue::from_static(self.format().content_type());
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, content_type.clone());
        if with_body {
            headers.insert(CONTENT_TYPE, content_type);
        }

        for (name, value) in &self.options.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| TransportError::InvalidHeader(name.clone()))?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|_| TransportError::InvalidHeader(name.clone()))?;
            headers.insert(header_name, header_value);
        }

        Ok(headers)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        if let Some(token) = &self.options.token {
            return request.bearer_auth(token);
        }

        match self.options.key.as_deref() {
            Some(key) => match key.split_once(':') {
                Some((name, secret)) => request.basic_auth(name, Some(secret)),
                None => request.basic_auth(key, None::<&str>),
            },
            None => request,
        }
    }

    /// Send a request and fail on any non-2xx response.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Api` with the service's error for non-2xx
    /// responses, or an HTTP error if the request could not be sent.
    pub async fn send(
        &self,
        method: Method,
        url: Url,
        params: &[(&str, &str)],
        body: Option<Bytes>,
        update_token: Option<&str>,
    ) -> Result<Response, TransportError> {
        let mut request = self
            .http
            .request(method.clone(), url.clone())
            .headers(self.headers(body.is_some())?);

        if !params.is_empty() {
            request = request.query(params);
        }
        if let Some(token) = update_token {
            request = request.header(UPDATE_TOKEN_HEADER, token);
        }
        if let Some(body) = body {
            request = request.body(body);
        }

        debug!(%method, url = %url, format = %self.format(), "Sending push request");

        let response = self.authorize(request).send().await?;
        self.check(response).await
    }

    async fn check(&self, response: Response) -> Result<Response, TransportError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let format = response_format(&response).unwrap_or(self.format());
        let body = response.bytes().await?;
        let info = codec::decode::<ErrorEnvelope>(format, &body)
            .map(|envelope| envelope.error)
            .unwrap_or_else(|_| {
                ErrorInfo::from_status(
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("Request failed"),
                )
            });

        warn!(
            status = status.as_u16(),
            code = info.code,
            "Push request failed: {}",
            info.message
        );
        Err(TransportError::Api(info))
    }

    /// Decode a response body using its declared content type, falling back
    /// to the configured format.
    ///
    /// # Errors
    ///
    /// Returns an error if the body cannot be read or decoded.
    pub async fn decode_body<T: DeserializeOwned>(
        &self,
        response: Response,
    ) -> Result<T, TransportError> {
        let format = response_format(&response).unwrap_or(self.format());
        let body = response.bytes().await?;
        Ok(codec::decode(format, &body)?)
    }

    /// Fetch one page of a listing.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the body cannot be decoded.
    pub async fn get_page<T: DeserializeOwned>(
        &self,
        url: Url,
        params: &[(&str, &str)],
    ) -> Result<PaginatedResult<T>, TransportError> {
        let response = self.send(Method::GET, url, params, None, None).await?;
        let request_url = response.url().clone();

        let next = response
            .headers()
            .get_all(LINK)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find_map(parse_next_link)
            .and_then(|link| request_url.join(&link).ok());

        let items = self.decode_body(response).await?;
        Ok(PaginatedResult { items, next })
    }

    /// Follow the `next` link of a page.
    ///
    /// Returns `Ok(None)` on the last page.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the body cannot be decoded.
    pub async fn next_page<T: DeserializeOwned>(
        &self,
        page: &PaginatedResult<T>,
    ) -> Result<Option<PaginatedResult<T>>, TransportError> {
        match &page.next {
            Some(url) => Ok(Some(self.get_page(url.clone(), &[]).await?)),
            None => Ok(None),
        }
    }
}

fn response_format(response: &Response) -> Option<Format> {
    let content_type = response.headers().get(CONTENT_TYPE)?.to_str().ok()?;
    if content_type.starts_with(Format::MsgPack.content_type()) {
        Some(Format::MsgPack)
    } else if content_type.starts_with(Format::Json.content_type()) {
        Some(Format::Json)
    } else {
        None
    }
}

/// Extract the `rel="next"` target from a `Link` header value.
#[must_use]
pub fn parse_next_link(header: &str) -> Option<String> {
    header.split(',').find_map(|link| {
        let (target, params) = link.split_once(';')?;
        let is_next = params.split(';').any(|param| {
            let param = param.trim();
            param == "rel=\"next\"" || param == "rel=next"
        });
        if !is_next {
            return None;
        }

        let target = target.trim().strip_prefix('<')?.strip_suffix('>')?;
        Some(target.to_string())
    })
}

/// `PushTransport` over the REST API.
#[derive(Debug, Clone)]
pub struct RestTransport {
    client: Arc<RestClient>,
}

impl RestTransport {
    /// Create a new REST transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be built.
    pub fn new(options: RestOptions) -> Result<Self, TransportError> {
        Ok(Self::from_client(Arc::new(RestClient::new(options)?)))
    }

    /// Wrap an existing client.
    #[must_use]
    pub fn from_client(client: Arc<RestClient>) -> Self {
        Self { client }
    }

    /// Get the underlying client.
    #[must_use]
    pub fn client(&self) -> &Arc<RestClient> {
        &self.client
    }

    /// Admin accessors sharing this transport's client.
    #[must_use]
    pub fn admin(&self) -> Admin {
        Admin::new(Arc::clone(&self.client))
    }
}

#[async_trait]
impl PushTransport for RestTransport {
    async fn register(&self, device: &DeviceDetails) -> Result<String, TransportError> {
        let url = self.client.url(&["push", "deviceRegistrations"])?;
        let body = codec::encode(self.client.format(), device)?;

        let response = self
            .client
            .send(Method::POST, url, &[], Some(body), None)
            .await?;
        let registration: DeviceRegistrationResponse = self.client.decode_body(response).await?;

        debug!(device = %device.id, "Device registered");
        Ok(registration.update_token)
    }

    async fn update_registration(
        &self,
        device: &DeviceDetails,
        update_token: &str,
    ) -> Result<(), TransportError> {
        let url = self
            .client
            .url(&["push", "deviceRegistrations", device.id.as_str()])?;
        let body = codec::encode(self.client.format(), device)?;

        self.client
            .send(Method::PATCH, url, &[], Some(body), Some(update_token))
            .await?;

        debug!(device = %device.id, "Device registration updated");
        Ok(())
    }

    async fn deregister(
        &self,
        device: &DeviceDetails,
        update_token: &str,
    ) -> Result<(), TransportError> {
        let url = self
            .client
            .url(&["push", "deviceRegistrations", device.id.as_str()])?;

        self.client
            .send(Method::DELETE, url, &[], None, Some(update_token))
            .await?;

        debug!(device = %device.id, "Device deregistered");
        Ok(())
    }

    async fn publish(&self, request: &PublishRequest) -> Result<(), TransportError> {
        let url = self.client.url(&["push", "publish"])?;
        let body = codec::encode(self.client.format(), request)?;

        self.client
            .send(Method::POST, url, &[], Some(body), None)
            .await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "rest"
    }
}
