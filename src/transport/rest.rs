use crate::error::{Error, Result};
use crate::transport::peer::SessionDescription;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderValue};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use url::Url;

pub const REALTIME_BASE_URL: &str = "https://api.openai.com/v1/realtime";
const SDP_CONTENT_TYPE: &str = "application/sdp";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

fn build_client(timeout: Duration) -> Result<Client> {
    Ok(Client::builder()
        .timeout(timeout)
        .pool_idle_timeout(DEFAULT_POOL_IDLE_TIMEOUT)
        .build()?)
}

fn bearer(token: &str) -> Result<HeaderValue> {
    let mut value = HeaderValue::from_str(&format!("Bearer {token}"))?;
    value.set_sensitive(true);
    Ok(value)
}

/// Short-lived bearer secret minted by the relay.
///
/// Not `Clone`: handing it to [`SignalingClient::exchange`] consumes it, so a
/// credential authorizes exactly one offer.
pub struct Credential {
    value: String,
    expires_at: Option<u64>,
    session: Value,
}

impl Credential {
    #[must_use]
    pub fn new(value: impl Into<String>, expires_at: Option<u64>) -> Self {
        Self {
            value: value.into(),
            expires_at,
            session: Value::Null,
        }
    }

    #[must_use]
    pub fn secret(&self) -> &str {
        &self.value
    }

    /// Unix timestamp after which the relay's secret stops working.
    #[must_use]
    pub const fn expires_at(&self) -> Option<u64> {
        self.expires_at
    }

    /// Informational session fields echoed by the relay.
    #[must_use]
    pub const fn session(&self) -> &Value {
        &self.session
    }

    fn from_relay_body(body: Value) -> Result<Self> {
        let secret = body.get("client_secret");
        let value = secret
            .and_then(|s| s.get("value"))
            .and_then(Value::as_str)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| Error::Auth("response is missing client_secret.value".to_string()))?
            .to_string();
        let expires_at = secret.and_then(|s| s.get("expires_at")).and_then(Value::as_u64);
        Ok(Self { value, expires_at, session: body })
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("value", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Serialize)]
struct CredentialRequest<'a> {
    model: &'a str,
    voice: &'a str,
}

/// Fetches session credentials from the token relay.
#[derive(Clone, Debug)]
pub struct CredentialClient {
    client: Client,
    endpoint: Url,
}

impl CredentialClient {
    /// # Errors
    /// Returns an error if `relay_base` is not a valid URL or the client cannot be built.
    #[allow(clippy::result_large_err)]
    pub fn new(relay_base: &str) -> Result<Self> {
        Self::new_with_timeout(relay_base, DEFAULT_TIMEOUT)
    }

    /// # Errors
    /// Returns an error if `relay_base` is not a valid URL or the client cannot be built.
    #[allow(clippy::result_large_err)]
    pub fn new_with_timeout(relay_base: &str, timeout: Duration) -> Result<Self> {
        let endpoint = Url::parse(&format!("{}/session", relay_base.trim_end_matches('/')))?;
        Ok(Self {
            client: build_client(timeout)?,
            endpoint,
        })
    }

    #[must_use]
    pub const fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Request a credential for the given model and voice. No retry.
    ///
    /// # Errors
    /// Returns `Error::Auth` if the relay is unreachable, answers non-2xx, or
    /// the body lacks `client_secret.value`.
    pub async fn fetch_credential(&self, model: &str, voice: &str) -> Result<Credential> {
        tracing::debug!(%model, %voice, endpoint = %self.endpoint, "Requesting session credential");
        let res = self
            .client
            .post(self.endpoint.clone())
            .json(&CredentialRequest { model, voice })
            .send()
            .await
            .map_err(|e| Error::Auth(format!("relay unreachable: {e}")))?;

        let status = res.status();
        if !status.is_success() {
            let message = relay_error_message(res).await;
            return Err(Error::Auth(format!("relay returned {status}: {message}")));
        }

        let body: Value = res
            .json()
            .await
            .map_err(|e| Error::Auth(format!("invalid relay response: {e}")))?;
        let credential = Credential::from_relay_body(body)?;
        tracing::info!(expires_at = ?credential.expires_at, "Obtained session credential");
        Ok(credential)
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RelayErrorField {
    Text(String),
    Object { message: String },
}

#[derive(Debug, Deserialize)]
struct RelayErrorBody {
    error: Option<RelayErrorField>,
    message: Option<String>,
}

async fn relay_error_message(res: Response) -> String {
    let fallback = res.status().canonical_reason().unwrap_or("unknown error").to_string();
    let Ok(text) = res.text().await else {
        return fallback;
    };
    match serde_json::from_str::<RelayErrorBody>(&text) {
        Ok(RelayErrorBody { error: Some(RelayErrorField::Text(msg) | RelayErrorField::Object { message: msg }), .. })
        | Ok(RelayErrorBody { message: Some(msg), .. }) => msg,
        _ if text.trim().is_empty() => fallback,
        _ => text,
    }
}

#[derive(Debug, Deserialize)]
struct SdpJsonAnswer {
    sdp: String,
}

/// Posts local offers to the realtime negotiation endpoint.
#[derive(Clone, Debug)]
pub struct SignalingClient {
    client: Client,
    base: Url,
}

impl SignalingClient {
    /// # Errors
    /// Returns an error if `realtime_base` is not a valid URL or the client cannot be built.
    #[allow(clippy::result_large_err)]
    pub fn new(realtime_base: &str) -> Result<Self> {
        Self::new_with_timeout(realtime_base, DEFAULT_TIMEOUT)
    }

    /// # Errors
    /// Returns an error if `realtime_base` is not a valid URL or the client cannot be built.
    #[allow(clippy::result_large_err)]
    pub fn new_with_timeout(realtime_base: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            base: Url::parse(realtime_base)?,
        })
    }

    fn endpoint(&self, model: &str) -> Url {
        let mut url = self.base.clone();
        url.query_pairs_mut().append_pair("model", model);
        url
    }

    /// Exchange the local offer for the remote answer, spending `credential`.
    ///
    /// # Errors
    /// Returns `Error::Negotiation` carrying the status code and status text on a
    /// non-2xx answer, or when the request itself fails.
    pub async fn exchange(
        &self,
        credential: Credential,
        model: &str,
        offer: &SessionDescription,
    ) -> Result<SessionDescription> {
        let url = self.endpoint(model);
        tracing::debug!(%url, offer_bytes = offer.sdp.len(), "Posting SDP offer");

        let res = self
            .client
            .post(url)
            .header(AUTHORIZATION, bearer(&credential.value)?)
            .header(CONTENT_TYPE, SDP_CONTENT_TYPE)
            .body(offer.sdp.clone())
            .send()
            .await
            .map_err(|e| Error::negotiation(None, format!("offer request failed: {e}")))?;
        drop(credential);

        let status = res.status();
        if !status.is_success() {
            return Err(Error::negotiation(Some(status.as_u16()), status_text(status)));
        }

        let is_json = res
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/json"));
        let body = res
            .text()
            .await
            .map_err(|e| Error::negotiation(Some(status.as_u16()), format!("unreadable answer: {e}")))?;

        let sdp = if is_json {
            serde_json::from_str::<SdpJsonAnswer>(&body)
                .map_err(|e| Error::negotiation(Some(status.as_u16()), format!("malformed answer: {e}")))?
                .sdp
        } else {
            body
        };
        if sdp.trim().is_empty() {
            return Err(Error::negotiation(Some(status.as_u16()), "empty answer"));
        }
        Ok(SessionDescription::answer(sdp))
    }
}

fn status_text(status: StatusCode) -> String {
    status.canonical_reason().unwrap_or("Unknown Status").to_string()
}

/// Session parameters the relay forwards upstream.
#[derive(Debug, Clone, Serialize)]
pub struct MintRequest {
    pub model: String,
    pub voice: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

/// Upstream half of the token relay: trades the long-lived API key for a
/// short-lived client secret. Runs server-side only.
#[derive(Clone)]
pub struct SessionMinter {
    client: Client,
    auth_header: HeaderValue,
    base: String,
}

impl std::fmt::Debug for SessionMinter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionMinter").field("base", &self.base).finish_non_exhaustive()
    }
}

impl SessionMinter {
    /// # Errors
    /// Returns an error if the API key results in an invalid header or client build fails.
    #[allow(clippy::result_large_err)]
    pub fn new(api_key: &str) -> Result<Self> {
        Self::with_base_url(api_key, REALTIME_BASE_URL)
    }

    /// # Errors
    /// Returns an error if the API key results in an invalid header or client build fails.
    #[allow(clippy::result_large_err)]
    pub fn with_base_url(api_key: &str, base: &str) -> Result<Self> {
        Ok(Self {
            client: build_client(DEFAULT_TIMEOUT)?,
            auth_header: bearer(api_key)?,
            base: base.trim_end_matches('/').to_string(),
        })
    }

    /// Create a realtime session and return the upstream JSON verbatim, so the
    /// relay can pass `client_secret` and the session echo through unchanged.
    ///
    /// # Errors
    /// Returns an error if the HTTP request fails or upstream answers non-2xx.
    pub async fn mint(&self, request: &MintRequest) -> Result<Value> {
        let res = self
            .client
            .post(format!("{}/sessions", self.base))
            .header(AUTHORIZATION, &self.auth_header)
            .json(request)
            .send()
            .await?
            .error_for_status()?;
        Ok(res.json().await?)
    }
}
