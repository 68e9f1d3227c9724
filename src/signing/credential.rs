//! Signing credential descriptors

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Signing type as declared by the caller in the query string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SigningType {
    /// Key material lives in the local keychain
    Default,
    /// Key lives in the transit vault
    Vault,
}

impl SigningType {
    pub const ALLOWED: &'static str = "only VAULT and DEFAULT identity supported";

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "DEFAULT",
            Self::Vault => "VAULT",
        }
    }
}

impl FromStr for SigningType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DEFAULT" => Ok(Self::Default),
            "VAULT" => Ok(Self::Vault),
            _ => Err(Self::ALLOWED.to_string()),
        }
    }
}

impl fmt::Display for SigningType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to a key managed by the transit vault.
///
/// The token is wiped from memory when the key is dropped and never shows up
/// in `Debug` output.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct VaultKey {
    key_name: String,
    token: String,
}

impl VaultKey {
    pub fn new(key_name: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            key_name: key_name.into(),
            token: token.into(),
        }
    }

    pub fn key_name(&self) -> &str {
        &self.key_name
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

impl fmt::Debug for VaultKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultKey")
            .field("key_name", &self.key_name)
            .field("token", &"<redacted>")
            .finish()
    }
}

impl Serialize for VaultKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Wire<'a> {
            key_name: &'a str,
            token: &'a str,
        }

        Wire {
            key_name: &self.key_name,
            token: &self.token,
        }
        .serialize(serializer)
    }
}

/// Where the private key of an identity lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityType {
    /// X.509 certificate and private key both stored in the keychain
    Local,
    /// Certificate in the keychain, private key in the transit vault
    VaultBacked(VaultKey),
}

impl IdentityType {
    /// Connector wire name for this identity type.
    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::Local => "X.509",
            Self::VaultBacked(_) => "Vault-X.509",
        }
    }
}

/// Describes how one ledger operation is to be signed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningCredential {
    keychain_id: String,
    keychain_ref: String,
    identity: IdentityType,
}

impl SigningCredential {
    /// Credential backed entirely by the local keychain.
    pub fn local(keychain_id: impl Into<String>, username: &str) -> Self {
        Self {
            keychain_id: keychain_id.into(),
            keychain_ref: keychain_ref(username, SigningType::Default),
            identity: IdentityType::Local,
        }
    }

    /// Credential whose private key is held by the transit vault.
    pub fn vault_backed(keychain_id: impl Into<String>, username: &str, key: VaultKey) -> Self {
        Self {
            keychain_id: keychain_id.into(),
            keychain_ref: keychain_ref(username, SigningType::Vault),
            identity: IdentityType::VaultBacked(key),
        }
    }

    pub fn keychain_id(&self) -> &str {
        &self.keychain_id
    }

    pub fn keychain_ref(&self) -> &str {
        &self.keychain_ref
    }

    pub fn identity(&self) -> &IdentityType {
        &self.identity
    }

    pub fn vault_key(&self) -> Option<&VaultKey> {
        match &self.identity {
            IdentityType::Local => None,
            IdentityType::VaultBacked(key) => Some(key),
        }
    }
}

/// Composite keychain key for one identity: `<username>-<signingType>`.
pub fn keychain_ref(username: &str, signing_type: SigningType) -> String {
    format!("{}-{}", username, signing_type.as_str())
}

impl Serialize for SigningCredential {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Wire<'a> {
            keychain_id: &'a str,
            keychain_ref: &'a str,
            #[serde(rename = "type")]
            identity_type: &'static str,
            #[serde(skip_serializing_if = "Option::is_none")]
            vault_transit_key: Option<&'a VaultKey>,
        }

        Wire {
            keychain_id: &self.keychain_id,
            keychain_ref: &self.keychain_ref,
            identity_type: self.identity.wire_name(),
            vault_transit_key: self.vault_key(),
        }
        .serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signing_type_parse() {
        assert_eq!("DEFAULT".parse::<SigningType>(), Ok(SigningType::Default));
        assert_eq!("VAULT".parse::<SigningType>(), Ok(SigningType::Vault));
        assert!("vault".parse::<SigningType>().is_err());
        assert!("".parse::<SigningType>().is_err());
    }

    #[test]
    fn test_local_credential_has_no_vault_key() {
        let cred = SigningCredential::local("certStore", "alice");
        assert_eq!(cred.keychain_ref(), "alice-DEFAULT");
        assert_eq!(cred.identity(), &IdentityType::Local);
        assert!(cred.vault_key().is_none());

        let json = serde_json::to_value(&cred).unwrap();
        assert_eq!(json["type"], "X.509");
        assert!(json.get("vaultTransitKey").is_none());
    }

    #[test]
    fn test_vault_credential_wire_format() {
        let cred =
            SigningCredential::vault_backed("certStore", "bob", VaultKey::new("keyA", "tok123"));
        assert_eq!(cred.keychain_ref(), "bob-VAULT");

        let json = serde_json::to_value(&cred).unwrap();
        assert_eq!(json["keychainId"], "certStore");
        assert_eq!(json["keychainRef"], "bob-VAULT");
        assert_eq!(json["type"], "Vault-X.509");
        assert_eq!(json["vaultTransitKey"]["keyName"], "keyA");
        assert_eq!(json["vaultTransitKey"]["token"], "tok123");
    }

    #[test]
    fn test_vault_key_debug_redacts_token() {
        let key = VaultKey::new("keyA", "tok123");
        let debug = format!("{:?}", key);
        assert!(debug.contains("keyA"));
        assert!(!debug.contains("tok123"));
    }
}
