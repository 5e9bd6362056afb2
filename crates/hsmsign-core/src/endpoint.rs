//! HSM endpoint addressing: where to connect and which request target to use.
//!
//! Two forms are accepted: `unix:///path/to/workload.sock` (the usual setup,
//! the workload API listens on a local socket) and `http://host[:port][/base]`.

use percent_encoding::percent_decode_str;
use std::path::PathBuf;
use thiserror::Error;
use url::{Position, Url};

#[derive(Debug, Error)]
pub enum EndpointError {
    #[error("endpoint address is empty")]
    Empty,
    #[error("invalid endpoint address: {0}")]
    Invalid(#[from] url::ParseError),
    #[error("unsupported endpoint scheme {0:?} (expected unix or http)")]
    UnsupportedScheme(String),
    #[error("endpoint {0:?} has no host")]
    MissingHost(String),
    #[error("endpoint {0:?} has no socket path")]
    MissingSocketPath(String),
    /// `unix://host/...`: the socket path must start right after `unix://`.
    #[error("unix endpoint {0:?} must not name a host; use unix:///absolute/path")]
    UnexpectedHost(String),
    #[error("unix endpoint {0:?} does not name an absolute socket path")]
    InvalidSocketPath(String),
}

/// Where the channel connects to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointAddress {
    Unix(PathBuf),
    Tcp { host: String, port: u16 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    address: EndpointAddress,
    /// HTTP view of the endpoint; only host, port and path are used.
    base: Url,
}

impl Endpoint {
    pub fn parse(uri: &str) -> Result<Self, EndpointError> {
        let uri = uri.trim();
        if uri.is_empty() {
            return Err(EndpointError::Empty);
        }
        let url = Url::parse(uri)?;
        match url.scheme() {
            "unix" => {
                if url.host_str().is_some_and(|h| !h.is_empty()) {
                    return Err(EndpointError::UnexpectedHost(uri.to_string()));
                }
                let path = url.path();
                if path.is_empty() || path == "/" {
                    return Err(EndpointError::MissingSocketPath(uri.to_string()));
                }
                // A `?` or `#` would silently cut the path short.
                if !path.starts_with('/') || url.query().is_some() || url.fragment().is_some() {
                    return Err(EndpointError::InvalidSocketPath(uri.to_string()));
                }
                let path = percent_decode_str(path)
                    .decode_utf8()
                    .map_err(|_| EndpointError::InvalidSocketPath(uri.to_string()))?;
                Ok(Self {
                    address: EndpointAddress::Unix(PathBuf::from(path.into_owned())),
                    base: Url::parse("http://localhost/")?,
                })
            }
            "http" => {
                let host = url
                    .host_str()
                    .filter(|h| !h.is_empty())
                    .ok_or_else(|| EndpointError::MissingHost(uri.to_string()))?
                    .trim_start_matches('[')
                    .trim_end_matches(']')
                    .to_string();
                let port = url.port_or_known_default().unwrap_or(80);
                Ok(Self {
                    address: EndpointAddress::Tcp { host, port },
                    base: url,
                })
            }
            other => Err(EndpointError::UnsupportedScheme(other.to_string())),
        }
    }

    pub fn address(&self) -> &EndpointAddress {
        &self.address
    }

    /// Value for the `Host` request header.
    pub fn host_header(&self) -> String {
        let host = self.base.host_str().unwrap_or("localhost");
        match self.base.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        }
    }

    /// Origin-form request target for signing with `key_id`:
    /// `<base path>/modules/<key_id>/sign?api-version=<api_version>`.
    pub fn sign_target(&self, key_id: &str, api_version: &str) -> String {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(["modules", key_id, "sign"]);
        }
        url.set_fragment(None);
        url.query_pairs_mut()
            .clear()
            .append_pair("api-version", api_version);
        url[Position::BeforePath..].to_string()
    }
}
