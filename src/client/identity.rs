use crate::types::{AUTH_TOKEN_PARAM, RealtimeError, Result};
use url::Url;

/// Immutable (base address, auth token) pair a client connects with.
///
/// Rotating credentials means building a new client.
#[derive(Clone, PartialEq, Eq)]
pub struct EndpointIdentity {
    base_address: Url,
    token: String,
}

impl EndpointIdentity {
    pub fn new(base_address: &str, token: impl Into<String>) -> Result<Self> {
        let base_address = Url::parse(base_address)?;
        let token = token.into();

        // Validate token is provided
        if token.is_empty() {
            return Err(RealtimeError::Auth("Auth token is required".to_string()));
        }

        Ok(Self {
            base_address,
            token,
        })
    }

    pub fn base_address(&self) -> &Url {
        &self.base_address
    }

    /// Connection URI with the token appended as a query parameter
    pub fn connection_url(&self) -> String {
        let mut url = self.base_address.clone();
        url.query_pairs_mut()
            .append_pair(AUTH_TOKEN_PARAM, &self.token);
        url.to_string()
    }
}

impl std::fmt::Debug for EndpointIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointIdentity")
            .field("base_address", &self.base_address.as_str())
            .field("token", &"<redacted>")
            .finish()
    }
}
