use crate::auth::{ChannelAuth, NoToken, TokenError, TokenSource};
use serde::Deserialize;
use std::fmt;
use std::num::NonZeroU64;
use std::str::FromStr;
use std::sync::Arc;
use tokio_tungstenite::tungstenite::http::Uri;

#[cfg(test)]
mod tests;

pub const DEFAULT_DEV_PORT: u16 = 8083;
pub const DEFAULT_PATH_PREFIX: &str = "/ws/realtime";

/// Identifier of the monitored entity (lab / station) a channel streams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetId(NonZeroU64);

impl TargetId {
    pub fn new(id: u64) -> Result<Self, EndpointError> {
        NonZeroU64::new(id)
            .map(TargetId)
            .ok_or(EndpointError::InvalidTarget(id.to_string()))
    }

    pub fn get(self) -> u64 {
        self.0.get()
    }
}

impl FromStr for TargetId {
    type Err = EndpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id: u64 = s
            .trim()
            .parse()
            .map_err(|_| EndpointError::InvalidTarget(s.to_string()))?;
        TargetId::new(id)
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which port rule applies when building the channel address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Fixed backend port, independent of where the page is served from
    Development,
    /// Same port as the hosting page
    #[default]
    Production,
}

impl FromStr for Environment {
    type Err = EndpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(EndpointError::InvalidEnvironment(other.to_string())),
        }
    }
}

/// Scheme, host and port of the page hosting the dashboard
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageOrigin {
    pub secure: bool,
    pub host: String,
    pub port: Option<u16>,
}

impl PageOrigin {
    /// Parse an `http(s)://host[:port]` origin; any path is ignored
    pub fn parse(url: &str) -> Result<Self, EndpointError> {
        let uri: Uri = url
            .trim()
            .parse()
            .map_err(|_| EndpointError::InvalidOrigin(url.to_string()))?;

        let secure = match uri.scheme_str() {
            Some("https") => true,
            Some("http") => false,
            Some(other) => return Err(EndpointError::UnsupportedScheme(other.to_string())),
            None => return Err(EndpointError::InvalidOrigin(url.to_string())),
        };

        let host = uri
            .host()
            .filter(|h| !h.is_empty())
            .ok_or(EndpointError::InvalidOrigin(url.to_string()))?
            .to_string();

        Ok(Self {
            secure,
            host,
            port: uri.port_u16(),
        })
    }
}

/// A fully built channel address for one connection attempt
#[derive(Debug, Clone, PartialEq)]
pub struct Endpoint {
    pub target: TargetId,
    pub url: String,
    /// `Authorization` header value for the handshake, if the auth policy wants one
    pub auth_header: Option<String>,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Query tokens stay out of logs
        match self.url.split_once('?') {
            Some((base, _)) => write!(f, "{}?token=***", base),
            None => f.write_str(&self.url),
        }
    }
}

/// Builds `<ws|wss>://<host>[:<port>]<prefix>/<target>` addresses
#[derive(Clone)]
pub struct EndpointBuilder {
    origin: PageOrigin,
    environment: Environment,
    dev_port: u16,
    path_prefix: String,
    auth: ChannelAuth,
    tokens: Arc<dyn TokenSource>,
}

impl EndpointBuilder {
    pub fn new(origin: PageOrigin, environment: Environment) -> Self {
        Self {
            origin,
            environment,
            dev_port: DEFAULT_DEV_PORT,
            path_prefix: DEFAULT_PATH_PREFIX.to_string(),
            auth: ChannelAuth::None,
            tokens: Arc::new(NoToken),
        }
    }

    pub fn dev_port(mut self, port: u16) -> Self {
        self.dev_port = port;
        self
    }

    pub fn path_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        self.path_prefix = format!("/{}", prefix.trim_matches('/'));
        self
    }

    pub fn auth(mut self, auth: ChannelAuth, tokens: Arc<dyn TokenSource>) -> Self {
        self.auth = auth;
        self.tokens = tokens;
        self
    }

    /// Resolve the address for `target`. Token lookup happens here, so a
    /// missing token surfaces as a failed attempt rather than at startup.
    pub fn build(&self, target: TargetId) -> Result<Endpoint, EndpointError> {
        let scheme = if self.origin.secure { "wss" } else { "ws" };
        let port = match self.environment {
            Environment::Development => Some(self.dev_port),
            Environment::Production => self.origin.port,
        };

        let authority = match port {
            Some(port) => format!("{}:{}", self.origin.host, port),
            None => self.origin.host.clone(),
        };

        let resolved = self
            .auth
            .resolve(self.tokens.as_ref())
            .map_err(EndpointError::Auth)?;

        let mut url = format!("{}://{}{}/{}", scheme, authority, self.path_prefix, target);
        if let Some(query) = resolved.query {
            url.push_str(&query);
        }

        Ok(Endpoint {
            target,
            url,
            auth_header: resolved.header,
        })
    }
}

/// Recover the target from a channel address laid out under `prefix`,
/// e.g. `ws://host:8083/ws/realtime/42` -> 42. Query strings are ignored.
pub fn target_from_url(url: &str, prefix: &str) -> Option<TargetId> {
    let uri: Uri = url.trim().parse().ok()?;

    let prefix = match prefix.trim_matches('/') {
        "" => "/".to_string(),
        trimmed => format!("/{}/", trimmed),
    };

    let rest = uri.path().strip_prefix(prefix.as_str())?;
    rest.trim_end_matches('/').parse().ok()
}

/// Endpoint construction errors
#[derive(Debug, PartialEq, Clone)]
pub enum EndpointError {
    /// Target id is zero or not a number
    InvalidTarget(String),
    /// Page origin could not be parsed
    InvalidOrigin(String),
    /// Page origin is neither http nor https
    UnsupportedScheme(String),
    /// Unknown environment name
    InvalidEnvironment(String),
    /// Auth policy could not be satisfied
    Auth(TokenError),
}

impl fmt::Display for EndpointError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndpointError::InvalidTarget(id) => {
                write!(f, "Target id must be a positive integer, got '{}'", id)
            }
            EndpointError::InvalidOrigin(url) => write!(f, "Invalid page origin '{}'", url),
            EndpointError::UnsupportedScheme(scheme) => {
                write!(f, "Unsupported page scheme '{}'", scheme)
            }
            EndpointError::InvalidEnvironment(env) => write!(f, "Unknown environment '{}'", env),
            EndpointError::Auth(e) => write!(f, "Channel auth failed: {}", e),
        }
    }
}

impl std::error::Error for EndpointError {}
