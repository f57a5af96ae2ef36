//! RPC endpoint assembly.
//!
//! The provider URL is the configured base URL followed by the API key.
//! The key is a credential, so the assembled URL is only ever shown
//! redacted.

use std::fmt;

use url::Url;

use crate::error::{ConfigError, Result};

const REDACTED: &str = "****";

/// Assembled JSON-RPC endpoint. `Debug` and `Display` never show the key.
#[derive(Clone)]
pub struct RpcEndpoint {
    url: Url,
    base: String,
    api_key: String,
}

/// Build the endpoint from a base URL and an optional API key.
///
/// An empty key yields the base URL unchanged; otherwise the key is
/// appended verbatim.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidValue`] if the result is not a valid URL.
pub fn rpc_endpoint(base: &str, api_key: &str) -> Result<RpcEndpoint> {
    let base = base.trim();
    let api_key = api_key.trim();
    let raw = if api_key.is_empty() {
        base.to_string()
    } else {
        format!("{base}{api_key}")
    };

    let url = Url::parse(&raw).map_err(|e| ConfigError::InvalidValue {
        field: "ankr_cfg.https_url",
        reason: e.to_string(),
    })?;

    Ok(RpcEndpoint {
        url,
        base: base.to_string(),
        api_key: api_key.to_string(),
    })
}

impl RpcEndpoint {
    /// Full URL including the credential. Do not log.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    #[must_use]
    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    #[must_use]
    pub fn has_credential(&self) -> bool {
        !self.api_key.is_empty()
    }

    /// URL safe for logs: the base followed by a mask when a key is set.
    #[must_use]
    pub fn redacted(&self) -> String {
        if self.has_credential() {
            format!("{}{REDACTED}", self.base)
        } else {
            self.url.to_string()
        }
    }

    /// Mask the credential anywhere it appears in `text`.
    ///
    /// Transport errors often quote the request URL.
    #[must_use]
    pub fn redact(&self, text: &str) -> String {
        if self.has_credential() {
            text.replace(&self.api_key, REDACTED)
        } else {
            text.to_string()
        }
    }
}

impl fmt::Debug for RpcEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcEndpoint")
            .field("url", &self.redacted())
            .finish()
    }
}

impl fmt::Display for RpcEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted())
    }
}
