//! Keystone v2.0 token handling and the authenticated JSON transport shared
//! by the Fuel and OpenStack clients.
//!
//! Tokens are issued lazily, cached for the lifetime of the client, and
//! re-issued once when a request is rejected with `401 Unauthorized`.

use std::cell::RefCell;

use reqwest::Method;
use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::debug;

/// Header carrying the Keystone token.
pub const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

/// Password credentials for a Keystone v2.0 tenant.
#[derive(Clone, Eq, PartialEq)]
pub struct KeystoneAuth {
    /// Base identity URL including the version, e.g. `http://10.20.0.2:5000/v2.0`.
    pub auth_url: String,
    /// Keystone user name.
    pub username: String,
    /// Keystone password.
    pub password: String,
    /// Tenant (project) to scope the token to.
    pub tenant_name: String,
}

impl std::fmt::Debug for KeystoneAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeystoneAuth")
            .field("auth_url", &self.auth_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("tenant_name", &self.tenant_name)
            .finish()
    }
}

/// One service in the Keystone catalog.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct CatalogEntry {
    /// Service type such as `compute` or `volumev2`.
    #[serde(rename = "type")]
    pub service_type: String,
    /// Published endpoints.
    #[serde(default)]
    pub endpoints: Vec<CatalogEndpoint>,
}

/// Endpoint advertised for a catalog entry.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct CatalogEndpoint {
    /// Public URL of the service.
    #[serde(rename = "publicURL")]
    pub public_url: String,
}

/// Token plus service catalog returned by Keystone.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TokenGrant {
    /// Opaque token value.
    pub token: String,
    /// Service catalog.
    pub catalog: Vec<CatalogEntry>,
}

impl TokenGrant {
    /// Returns the public URL of the first service matching one of
    /// `service_types`, in preference order.
    #[must_use]
    pub fn endpoint(&self, service_types: &[&str]) -> Option<&str> {
        service_types.iter().find_map(|wanted| {
            self.catalog
                .iter()
                .filter(|entry| entry.service_type == *wanted)
                .find_map(|entry| entry.endpoints.first())
                .map(|endpoint| endpoint.public_url.trim_end_matches('/'))
        })
    }
}

#[derive(Deserialize)]
struct TokenEnvelope {
    access: AccessBody,
}

#[derive(Deserialize)]
struct AccessBody {
    token: TokenBody,
    #[serde(rename = "serviceCatalog", default)]
    service_catalog: Vec<CatalogEntry>,
}

#[derive(Deserialize)]
struct TokenBody {
    id: String,
}

/// Errors raised while talking to Keystone-protected services.
#[derive(Debug, Error)]
pub enum KeystoneError {
    /// The request could not be sent or the connection failed.
    #[error("request to {url} failed: {message}")]
    Http {
        /// Target URL.
        url: String,
        /// Transport error text.
        message: String,
    },
    /// The service answered with a non-success status.
    #[error("{method} {url} returned {status}: {body}")]
    Status {
        /// HTTP method.
        method: String,
        /// Target URL.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Response body, possibly empty.
        body: String,
    },
    /// The response body did not match the expected shape.
    #[error("failed to decode response from {url}: {message}")]
    Decode {
        /// Target URL.
        url: String,
        /// Decoder error text.
        message: String,
    },
    /// The catalog has no endpoint for the requested service.
    #[error("service catalog has no endpoint for {service}")]
    MissingEndpoint {
        /// Requested service types.
        service: String,
    },
}

impl KeystoneError {
    /// Returns the HTTP status for [`KeystoneError::Status`].
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Requests a token for `auth`.
///
/// # Errors
///
/// Returns [`KeystoneError`] when the request fails, Keystone rejects the
/// credentials, or the response cannot be decoded.
pub fn issue_token(http: &Client, auth: &KeystoneAuth) -> Result<TokenGrant, KeystoneError> {
    let url = format!("{}/tokens", auth.auth_url.trim_end_matches('/'));
    let body = json!({
        "auth": {
            "passwordCredentials": {
                "username": auth.username,
                "password": auth.password,
            },
            "tenantName": auth.tenant_name,
        }
    });
    debug!(url = %url, user = %auth.username, "requesting keystone token");
    let response = http
        .post(&url)
        .json(&body)
        .send()
        .map_err(|err| http_error(&url, &err))?;
    let envelope: TokenEnvelope = decode(check_status("POST", &url, response)?, &url)?;
    Ok(TokenGrant {
        token: envelope.access.token.id,
        catalog: envelope.access.service_catalog,
    })
}

/// Blocking HTTP client that attaches a cached Keystone token to every call.
#[derive(Debug)]
pub struct AuthorizedHttp {
    http: Client,
    auth: KeystoneAuth,
    grant: RefCell<Option<TokenGrant>>,
}

impl AuthorizedHttp {
    /// Wraps `http`, authenticating with `auth` on first use.
    #[must_use]
    pub const fn new(http: Client, auth: KeystoneAuth) -> Self {
        Self {
            http,
            auth,
            grant: RefCell::new(None),
        }
    }

    /// Returns the cached grant, issuing a token if none is held.
    ///
    /// # Errors
    ///
    /// See [`issue_token`].
    pub fn grant(&self) -> Result<TokenGrant, KeystoneError> {
        if let Some(grant) = self.grant.borrow().as_ref() {
            return Ok(grant.clone());
        }
        let fresh = issue_token(&self.http, &self.auth)?;
        *self.grant.borrow_mut() = Some(fresh.clone());
        Ok(fresh)
    }

    /// Resolves a catalog endpoint by service type preference.
    ///
    /// # Errors
    ///
    /// Returns [`KeystoneError::MissingEndpoint`] when no type matches.
    pub fn endpoint(&self, service_types: &[&str]) -> Result<String, KeystoneError> {
        let grant = self.grant()?;
        grant
            .endpoint(service_types)
            .map(str::to_owned)
            .ok_or_else(|| KeystoneError::MissingEndpoint {
                service: service_types.join("|"),
            })
    }

    /// Issues `GET url` and decodes the JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`KeystoneError`] on transport, status, or decode failures.
    pub fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, KeystoneError> {
        let response = self.send(&Method::GET, url, None)?;
        decode(check_status("GET", url, response)?, url)
    }

    /// Issues `GET url`, mapping `404 Not Found` to `None`.
    ///
    /// # Errors
    ///
    /// Returns [`KeystoneError`] on transport, status, or decode failures.
    pub fn get_optional_json<T: DeserializeOwned>(
        &self,
        url: &str,
    ) -> Result<Option<T>, KeystoneError> {
        let response = self.send(&Method::GET, url, None)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        decode(check_status("GET", url, response)?, url).map(Some)
    }

    /// Issues `POST url` with a JSON body and decodes the JSON reply.
    ///
    /// # Errors
    ///
    /// Returns [`KeystoneError`] on transport, status, or decode failures.
    pub fn post_json<T: DeserializeOwned>(
        &self,
        url: &str,
        body: &Value,
    ) -> Result<T, KeystoneError> {
        let response = self.send(&Method::POST, url, Some(body))?;
        decode(check_status("POST", url, response)?, url)
    }

    /// Issues `POST url` with a JSON body, ignoring the reply body.
    ///
    /// # Errors
    ///
    /// Returns [`KeystoneError`] on transport or status failures.
    pub fn post(&self, url: &str, body: &Value) -> Result<(), KeystoneError> {
        let response = self.send(&Method::POST, url, Some(body))?;
        check_status("POST", url, response).map(drop)
    }

    /// Issues `DELETE url`.
    ///
    /// # Errors
    ///
    /// Returns [`KeystoneError`] on transport or status failures.
    pub fn delete(&self, url: &str) -> Result<(), KeystoneError> {
        let response = self.send(&Method::DELETE, url, None)?;
        check_status("DELETE", url, response).map(drop)
    }

    fn send(
        &self,
        method: &Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<Response, KeystoneError> {
        let first = self.send_once(method, url, body)?;
        if first.status() != StatusCode::UNAUTHORIZED {
            return Ok(first);
        }
        debug!(url, "token rejected; re-authenticating");
        *self.grant.borrow_mut() = None;
        self.send_once(method, url, body)
    }

    fn send_once(
        &self,
        method: &Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<Response, KeystoneError> {
        let grant = self.grant()?;
        debug!(method = %method, url, "sending request");
        let mut request = self
            .http
            .request(method.clone(), url)
            .header(AUTH_TOKEN_HEADER, grant.token);
        if let Some(payload) = body {
            request = request.json(payload);
        }
        request.send().map_err(|err| http_error(url, &err))
    }
}

fn http_error(url: &str, err: &reqwest::Error) -> KeystoneError {
    KeystoneError::Http {
        url: url.to_owned(),
        message: err.to_string(),
    }
}

fn check_status(method: &str, url: &str, response: Response) -> Result<Response, KeystoneError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(KeystoneError::Status {
        method: method.to_owned(),
        url: url.to_owned(),
        status: status.as_u16(),
        body: body.trim().to_owned(),
    })
}

fn decode<T: DeserializeOwned>(response: Response, url: &str) -> Result<T, KeystoneError> {
    response.json().map_err(|err| KeystoneError::Decode {
        url: url.to_owned(),
        message: err.to_string(),
    })
}
