//! Webhook signature verification.
//!
//! The platform signs each callback with
//! `base64(HMAC-SHA256(channel_secret, raw_body))` in `X-Line-Signature`.

use crate::error::WebhookError;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the callback signature.
pub const SIGNATURE_HEADER: &str = "x-line-signature";

/// Verifies callback bodies against the channel secret.
#[derive(Clone)]
pub struct SignatureVerifier {
    secret: Vec<u8>,
}

impl SignatureVerifier {
    #[must_use]
    pub fn new(channel_secret: &str) -> Self {
        Self {
            secret: channel_secret.as_bytes().to_vec(),
        }
    }

    /// Computes the signature for `body`.
    ///
    /// # Errors
    ///
    /// Fails only if the MAC cannot be keyed.
    pub fn sign(&self, body: &[u8]) -> Result<String, WebhookError> {
        let mut mac = self.mac()?;
        mac.update(body);
        Ok(STANDARD.encode(mac.finalize().into_bytes()))
    }

    /// Checks `signature` against `body` in constant time.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSignature` if the signature is not base64 or does
    /// not match.
    pub fn verify(&self, body: &[u8], signature: &str) -> Result<(), WebhookError> {
        let expected = STANDARD
            .decode(signature.trim())
            .map_err(|_| WebhookError::InvalidSignature)?;
        let mut mac = self.mac()?;
        mac.update(body);
        mac.verify_slice(&expected)
            .map_err(|_| WebhookError::InvalidSignature)
    }

    fn mac(&self) -> Result<HmacSha256, WebhookError> {
        HmacSha256::new_from_slice(&self.secret).map_err(|_| WebhookError::InvalidSignature)
    }
}
