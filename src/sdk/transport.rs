use crate::Result;
use crate::transport::peer::SessionDescription;
use crate::transport::rest::{Credential, CredentialClient, SignalingClient};
use async_trait::async_trait;

/// Source of single-use session credentials.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn fetch_credential(&self, model: &str, voice: &str) -> Result<Credential>;
}

/// Remote side of the offer/answer exchange.
#[async_trait]
pub trait OfferExchange: Send + Sync {
    async fn exchange(
        &self,
        credential: Credential,
        model: &str,
        offer: &SessionDescription,
    ) -> Result<SessionDescription>;
}

#[async_trait]
impl CredentialProvider for CredentialClient {
    async fn fetch_credential(&self, model: &str, voice: &str) -> Result<Credential> {
        Self::fetch_credential(self, model, voice).await
    }
}

#[async_trait]
impl OfferExchange for SignalingClient {
    async fn exchange(
        &self,
        credential: Credential,
        model: &str,
        offer: &SessionDescription,
    ) -> Result<SessionDescription> {
        Self::exchange(self, credential, model, offer).await
    }
}
