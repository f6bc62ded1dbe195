// Endpoint descriptors and the per-request context handed to interceptors

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Method, Request, Url};
use serde::Serialize;

use crate::error::{NetworkError, Result};

/// HTTP methods used by the API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_method(self) -> Method {
        match self {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Patch => Method::PATCH,
            HttpMethod::Delete => Method::DELETE,
        }
    }
}

/// Request payload
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(serde_json::Value),
}

/// Immutable description of one logical API call
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointDescriptor {
    pub base_url: String,
    pub path: String,
    pub method: HttpMethod,
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
    pub body: RequestBody,
    pub requires_auth: bool,
    /// Feature tag for logs and metrics
    pub feature: String,
}

impl EndpointDescriptor {
    /// Authenticated endpoint with no body, tagged "default"
    pub fn new(base_url: impl Into<String>, method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            path: path.into(),
            method,
            headers: Vec::new(),
            query: Vec::new(),
            body: RequestBody::Empty,
            requires_auth: true,
            feature: "default".to_string(),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Attach a JSON body; fails with `Encoding` before any I/O happens
    pub fn json_body<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self> {
        let value = serde_json::to_value(body).map_err(|e| NetworkError::Encoding(e.to_string()))?;
        self.body = RequestBody::Json(value);
        Ok(self)
    }

    pub fn requires_auth(mut self, requires_auth: bool) -> Self {
        self.requires_auth = requires_auth;
        self
    }

    pub fn feature(mut self, feature: impl Into<String>) -> Self {
        self.feature = feature.into();
        self
    }

    /// Resolve base URL, path and query into a URL
    pub fn url(&self) -> Result<Url> {
        let base = self.base_url.trim_end_matches('/');
        let path = self.path.trim_start_matches('/');
        let raw = format!("{}/{}", base, path);

        let mut url = Url::parse(&raw).map_err(|e| NetworkError::InvalidUrl(format!("{}: {}", raw, e)))?;
        if url.cannot_be_a_base() {
            return Err(NetworkError::InvalidUrl(raw));
        }

        if !self.query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(self.query.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }
        Ok(url)
    }

    /// Build the concrete wire request
    pub fn build_request(&self) -> Result<Request> {
        let url = self.url()?;
        let mut request = Request::new(self.method.as_method(), url);

        let mut headers = HeaderMap::new();
        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| NetworkError::Encoding(format!("header name {:?}: {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| NetworkError::Encoding(format!("header {}: {}", name, e)))?;
            headers.insert(name, value);
        }

        if let RequestBody::Json(value) = &self.body {
            let bytes = serde_json::to_vec(value).map_err(|e| NetworkError::Encoding(e.to_string()))?;
            headers
                .entry(CONTENT_TYPE)
                .or_insert(HeaderValue::from_static("application/json"));
            *request.body_mut() = Some(bytes.into());
        }

        *request.headers_mut() = headers;
        Ok(request)
    }
}

/// A target together with the request about to be sent for it
#[derive(Debug)]
pub struct RequestContext {
    pub target: EndpointDescriptor,
    pub request: Request,
    /// Short id correlating every send of one logical request
    pub request_id: String,
}

impl RequestContext {
    pub fn new(target: EndpointDescriptor, request: Request) -> Self {
        let request_id = uuid::Uuid::new_v4().to_string()[..8].to_string();
        Self {
            target,
            request,
            request_id,
        }
    }

    /// Build the request for `target` and wrap both
    pub fn from_target(target: EndpointDescriptor) -> Result<Self> {
        let request = target.build_request()?;
        Ok(Self::new(target, request))
    }

    /// Same target and id, different wire request
    pub fn with_request(self, request: Request) -> Self {
        Self { request, ..self }
    }

    /// Copy of the wire request, if its body can be duplicated
    pub fn clone_request(&self) -> Option<Request> {
        self.request.try_clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::AUTHORIZATION;

    #[test]
    fn test_url_joins_slashes_and_query() {
        let target = EndpointDescriptor::new("https://api.example.com/", HttpMethod::Get, "/api/v1/goals")
            .query("date", "2026-10-17")
            .query("scope", "couple");

        let url = target.url().unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.example.com/api/v1/goals?date=2026-10-17&scope=couple"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let target = EndpointDescriptor::new("not a url", HttpMethod::Get, "/x");
        assert!(matches!(target.url(), Err(NetworkError::InvalidUrl(_))));
        assert!(matches!(target.build_request(), Err(NetworkError::InvalidUrl(_))));
    }

    #[test]
    fn test_json_body_sets_content_type() {
        let target = EndpointDescriptor::new("https://api.example.com", HttpMethod::Post, "/goals")
            .json_body(&serde_json::json!({"title": "run"}))
            .unwrap();

        let request = target.build_request().unwrap();
        assert_eq!(request.method(), Method::POST);
        assert_eq!(request.headers()[CONTENT_TYPE], "application/json");
        let body = request.body().and_then(|b| b.as_bytes()).unwrap();
        assert_eq!(body, br#"{"title":"run"}"#);
    }

    #[test]
    fn test_json_body_encoding_failure() {
        use std::collections::HashMap;

        // Non-string map keys cannot be represented in JSON
        let mut body = HashMap::new();
        body.insert((1, 2), "x");

        let result = EndpointDescriptor::new("https://api.example.com", HttpMethod::Post, "/goals")
            .json_body(&body);
        assert!(matches!(result, Err(NetworkError::Encoding(_))));
    }

    #[test]
    fn test_invalid_header_is_encoding_error() {
        let target = EndpointDescriptor::new("https://api.example.com", HttpMethod::Get, "/x")
            .header("x-bad", "line\nbreak");
        assert!(matches!(target.build_request(), Err(NetworkError::Encoding(_))));
    }

    #[test]
    fn test_defaults() {
        let target = EndpointDescriptor::new("https://api.example.com", HttpMethod::Delete, "/x");
        assert!(target.requires_auth);
        assert_eq!(target.feature, "default");
        assert_eq!(target.body, RequestBody::Empty);

        let request = target.build_request().unwrap();
        assert!(request.headers().get(AUTHORIZATION).is_none());
        assert!(request.body().is_none());
    }

    #[test]
    fn test_context_keeps_id_across_rewrite() {
        let target = EndpointDescriptor::new("https://api.example.com", HttpMethod::Get, "/x");
        let context = RequestContext::from_target(target).unwrap();
        let id = context.request_id.clone();
        assert_eq!(id.len(), 8);

        let rewritten = context.clone_request().unwrap();
        let context = context.with_request(rewritten);
        assert_eq!(context.request_id, id);
    }

    proptest::proptest! {
        #[test]
        fn prop_url_has_single_separator(
            segments in proptest::collection::vec("[a-z0-9]{1,8}", 1..5),
            lead in 0usize..3,
            trail in 0usize..3,
        ) {
            let base = format!("https://api.example.com{}", "/".repeat(trail));
            let path = format!("{}{}", "/".repeat(lead), segments.join("/"));
            let url = EndpointDescriptor::new(base, HttpMethod::Get, path).url().unwrap();

            proptest::prop_assert_eq!(url.path(), format!("/{}", segments.join("/")));
        }
    }
}
