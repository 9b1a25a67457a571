// HTTP driver module: the seam between a call session and the application under test

use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use crate::error::CallScopeError;

/// HTTP verbs a call-control document can ask for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "UPPERCASE")]
#[clap(rename_all = "lower")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Default for HttpMethod {
    fn default() -> Self {
        HttpMethod::Post
    }
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }

    /// Case-insensitive parse of a method name
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "GET" => Some(HttpMethod::Get),
            "POST" => Some(HttpMethod::Post),
            "PUT" => Some(HttpMethod::Put),
            "PATCH" => Some(HttpMethod::Patch),
            "DELETE" => Some(HttpMethod::Delete),
            _ => None,
        }
    }

    /// Method named by a document attribute; missing or unknown means POST
    pub fn from_attribute(value: Option<&str>) -> Self {
        value.and_then(Self::parse).unwrap_or_default()
    }

    /// Whether parameters travel in the query string rather than a form body
    pub fn uses_query_string(&self) -> bool {
        matches!(self, HttpMethod::Get | HttpMethod::Delete)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single request parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Param {
    pub name: String,
    pub value: String,
}

/// Ordered request parameters. Names are case-sensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Params {
    entries: Vec<Param>,
}

impl Params {
    pub fn new() -> Self {
        Params::default()
    }

    /// Get a parameter value by exact name
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.value.as_str())
    }

    /// Set a parameter, replacing an existing one in place
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.entries.iter_mut().find(|p| p.name == name) {
            Some(existing) => existing.value = value,
            None => self.entries.push(Param {
                name: name.to_string(),
                value,
            }),
        }
    }

    /// Layer `overrides` on top of these parameters
    pub fn merge(&mut self, overrides: &Params) {
        for p in &overrides.entries {
            self.set(&p.name, p.value.clone());
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|p| (p.name.as_str(), p.value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for Params {
    fn from_iter<I: IntoIterator<Item = (&'a str, &'a str)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (name, value) in iter {
            params.set(name, value);
        }
        params
    }
}

/// Raw response from the application under test
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// Issues one request and returns the raw response.
///
/// Implementations must not retry or rewrite errors; whatever fails here
/// surfaces to the caller as is.
pub trait HttpDriver {
    fn issue(
        &self,
        method: HttpMethod,
        path: &str,
        params: &Params,
    ) -> Result<HttpResponse, CallScopeError>;
}

impl<D: HttpDriver + ?Sized> HttpDriver for Rc<D> {
    fn issue(
        &self,
        method: HttpMethod,
        path: &str,
        params: &Params,
    ) -> Result<HttpResponse, CallScopeError> {
        (**self).issue(method, path, params)
    }
}

impl<D: HttpDriver + ?Sized> HttpDriver for Box<D> {
    fn issue(
        &self,
        method: HttpMethod,
        path: &str,
        params: &Params,
    ) -> Result<HttpResponse, CallScopeError> {
        (**self).issue(method, path, params)
    }
}

/// Blocking driver for a live HTTP endpoint
pub struct UreqDriver {
    agent: ureq::Agent,
    base_url: String,
}

impl UreqDriver {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            agent,
            base_url: base_url.into(),
        }
    }

    /// Resolve `path` against the base URL. Absolute URLs are used as is.
    pub fn url_for(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        let base = self.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        let mut buf = String::with_capacity(base.len() + 1 + path.len());
        buf.push_str(base);
        buf.push('/');
        buf.push_str(path);
        buf
    }
}

impl HttpDriver for UreqDriver {
    fn issue(
        &self,
        method: HttpMethod,
        path: &str,
        params: &Params,
    ) -> Result<HttpResponse, CallScopeError> {
        let url = self.url_for(path);
        let mut request = self.agent.request(method.as_str(), &url);

        let result = if method.uses_query_string() {
            for (name, value) in params.iter() {
                request = request.query(name, value);
            }
            request.call()
        } else {
            let pairs: Vec<(&str, &str)> = params.iter().collect();
            request.send_form(&pairs)
        };

        // Error statuses are still documents worth asserting on
        let response = match result {
            Ok(response) => response,
            Err(ureq::Error::Status(_, response)) => response,
            Err(ureq::Error::Transport(transport)) => {
                return Err(CallScopeError::Transport(transport.to_string()))
            }
        };

        let status = response.status();
        let body = response.into_string()?;
        Ok(HttpResponse { status, body })
    }
}
