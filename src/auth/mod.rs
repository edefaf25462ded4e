// Channel authentication policy
//
// The realtime endpoint historically accepted unauthenticated upgrades, scoped
// only by the lab id in the path. `ChannelAuth::None` keeps that behavior;
// `Query` and `Header` attach the same bearer token the REST layer uses.

use serde::Deserialize;

#[cfg(test)]
mod tests;

/// Where (if anywhere) the token goes on the upgrade request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelAuth {
    /// No credentials on the upgrade request
    #[default]
    None,
    /// `?token=<token>` appended to the endpoint address
    Query,
    /// `Authorization: Bearer <token>` on the handshake
    Header,
}

/// Supplies the current session token.
///
/// Called on every connection attempt so a token refreshed by the login
/// layer is picked up by the next reconnect.
pub trait TokenSource: Send + Sync {
    fn token(&self) -> Option<String>;
}

/// Never has a token
pub struct NoToken;

impl TokenSource for NoToken {
    fn token(&self) -> Option<String> {
        None
    }
}

/// Fixed token, e.g. handed over by the login flow
pub struct StaticToken(pub String);

impl TokenSource for StaticToken {
    fn token(&self) -> Option<String> {
        Some(self.0.clone())
    }
}

/// Token read from an environment variable at each attempt
pub struct EnvToken {
    var: String,
}

impl EnvToken {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl TokenSource for EnvToken {
    fn token(&self) -> Option<String> {
        std::env::var(&self.var).ok()
    }
}

/// Credentials resolved for one connection attempt
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResolvedAuth {
    /// Query-string suffix including the leading `?`
    pub query: Option<String>,
    /// Full `Authorization` header value
    pub header: Option<String>,
}

impl ChannelAuth {
    /// Resolve the policy against a token source.
    ///
    /// Fails when the policy needs a token and none (or an unusable one) is
    /// available; the caller treats that like a failed connection attempt.
    pub fn resolve(self, source: &dyn TokenSource) -> Result<ResolvedAuth, TokenError> {
        match self {
            ChannelAuth::None => Ok(ResolvedAuth::default()),
            ChannelAuth::Query => {
                let token = validate_token(source.token())?;
                Ok(ResolvedAuth {
                    query: Some(format!("?token={}", urlencoding::encode(&token))),
                    header: None,
                })
            }
            ChannelAuth::Header => {
                let token = validate_token(source.token())?;
                if token.chars().any(|c| c.is_whitespace() || c.is_control()) {
                    return Err(TokenError::InvalidFormat);
                }
                Ok(ResolvedAuth {
                    query: None,
                    header: Some(format!("Bearer {}", token)),
                })
            }
        }
    }
}

fn validate_token(token: Option<String>) -> Result<String, TokenError> {
    let token = token.ok_or(TokenError::Missing)?;
    let token = token.trim();
    if token.is_empty() {
        return Err(TokenError::Empty);
    }
    Ok(token.to_string())
}

/// Token resolution errors
#[derive(Debug, PartialEq, Clone)]
pub enum TokenError {
    /// Policy requires a token but the source has none
    Missing,
    /// Token cannot be carried in a header
    InvalidFormat,
    /// Token is empty string
    Empty,
}

impl std::fmt::Display for TokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenError::Missing => write!(f, "Channel token not available"),
            TokenError::InvalidFormat => write!(f, "Channel token has an invalid format"),
            TokenError::Empty => write!(f, "Channel token is empty"),
        }
    }
}

impl std::error::Error for TokenError {}
