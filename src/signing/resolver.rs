//! Credential resolution
//!
//! Pure, synchronous mapping from request data to a [`SigningCredential`].
//! No keychain or ledger access happens here.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;

use crate::types::{GatewayError, Result};

use super::credential::{SigningCredential, SigningType, VaultKey};

/// Standard alphabet; `=` padding optional on decode.
const VAULT_HEADER: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Builds signing credentials for one keychain.
#[derive(Debug, Clone)]
pub struct CredentialResolver {
    keychain_id: String,
}

impl CredentialResolver {
    pub fn new(keychain_id: impl Into<String>) -> Self {
        Self {
            keychain_id: keychain_id.into(),
        }
    }

    /// Resolve the credential a request asserts.
    ///
    /// `authorization` is only inspected for `VAULT` identities.
    pub fn resolve(
        &self,
        username: &str,
        signing_type: SigningType,
        authorization: Option<&str>,
    ) -> Result<SigningCredential> {
        match signing_type {
            SigningType::Default => Ok(SigningCredential::local(&self.keychain_id, username)),
            SigningType::Vault => {
                let header = authorization.ok_or_else(|| {
                    GatewayError::MissingCredential("authorization header not provided".into())
                })?;
                let key = parse_vault_authorization(header)?;
                Ok(SigningCredential::vault_backed(
                    &self.keychain_id,
                    username,
                    key,
                ))
            }
        }
    }
}

/// Decode `"<scheme> base64(keyName:token)"` into a [`VaultKey`].
///
/// The payload is split on the first `:` so tokens may themselves contain colons.
/// Empty key names or tokens are passed through; the vault rejects them.
pub fn parse_vault_authorization(header: &str) -> Result<VaultKey> {
    if !header.is_ascii() {
        return Err(GatewayError::MalformedCredential(
            "authorization header is not visible ASCII".into(),
        ));
    }

    let encoded = header
        .trim()
        .split_once(' ')
        .map(|(_, payload)| payload.trim())
        .filter(|payload| !payload.is_empty())
        .ok_or_else(|| {
            GatewayError::MalformedCredential(
                "authorization header must be '<scheme> <base64(keyName:token)>'".into(),
            )
        })?;

    let raw = VAULT_HEADER.decode(encoded).map_err(|e| {
        GatewayError::MalformedCredential(format!("authorization payload is not base64: {e}"))
    })?;

    let decoded = String::from_utf8(raw).map_err(|_| {
        GatewayError::MalformedCredential("authorization payload is not valid UTF-8".into())
    })?;

    let (key_name, token) = decoded.split_once(':').ok_or_else(|| {
        GatewayError::MalformedCredential(
            "authorization payload must be 'keyName:token'".into(),
        )
    })?;

    Ok(VaultKey::new(key_name, token))
}
