//! Browser-facing ceremony options (`PublicKeyCredentialCreationOptions` and
//! `PublicKeyCredentialRequestOptions` in their JSON form).

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const PUBLIC_KEY: &str = "public-key";
pub const ALG_ES256: i64 = -7;
pub const ALG_RS256: i64 = -257;
pub const PREFERRED: &str = "preferred";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RelyingPartyEntity {
    pub id: String,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserEntity {
    /// Base64url user handle.
    pub id: String,
    pub name: String,
    pub display_name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CredentialParameter {
    #[serde(rename = "type")]
    pub kind: String,
    pub alg: i64,
}

impl CredentialParameter {
    fn public_key(alg: i64) -> Self {
        Self {
            kind: PUBLIC_KEY.to_string(),
            alg,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CredentialDescriptor {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl CredentialDescriptor {
    #[must_use]
    pub fn public_key(id: &str) -> Self {
        Self {
            id: id.to_string(),
            kind: PUBLIC_KEY.to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatorSelection {
    pub resident_key: String,
    pub user_verification: String,
}

impl Default for AuthenticatorSelection {
    fn default() -> Self {
        Self {
            resident_key: PREFERRED.to_string(),
            user_verification: PREFERRED.to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationOptions {
    pub challenge: String,
    pub rp: RelyingPartyEntity,
    pub user: UserEntity,
    pub pub_key_cred_params: Vec<CredentialParameter>,
    /// Milliseconds.
    pub timeout: u64,
    pub attestation: String,
    pub authenticator_selection: AuthenticatorSelection,
    pub exclude_credentials: Vec<CredentialDescriptor>,
}

impl RegistrationOptions {
    #[must_use]
    pub fn new(challenge: String, rp: RelyingPartyEntity, user: UserEntity, timeout: u64) -> Self {
        Self {
            challenge,
            rp,
            user,
            pub_key_cred_params: vec![
                CredentialParameter::public_key(ALG_ES256),
                CredentialParameter::public_key(ALG_RS256),
            ],
            timeout,
            attestation: "none".to_string(),
            authenticator_selection: AuthenticatorSelection::default(),
            exclude_credentials: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginOptions {
    pub challenge: String,
    pub rp_id: String,
    /// Milliseconds.
    pub timeout: u64,
    pub user_verification: String,
    pub allow_credentials: Vec<CredentialDescriptor>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn registration_options_use_browser_field_names() -> Result<(), serde_json::Error> {
        let options = RegistrationOptions::new(
            "abc".to_string(),
            RelyingPartyEntity {
                id: "localhost".to_string(),
                name: "Passgate".to_string(),
            },
            UserEntity {
                id: "dTE".to_string(),
                name: "a@b.co".to_string(),
                display_name: "alice".to_string(),
            },
            300_000,
        );
        let value = serde_json::to_value(&options)?;
        assert_eq!(value["pubKeyCredParams"][0], json!({"type": "public-key", "alg": -7}));
        assert_eq!(value["pubKeyCredParams"][1]["alg"], json!(-257));
        assert_eq!(value["user"]["displayName"], json!("alice"));
        assert_eq!(value["authenticatorSelection"]["residentKey"], json!("preferred"));
        assert_eq!(value["attestation"], json!("none"));
        assert_eq!(value["excludeCredentials"], json!([]));
        Ok(())
    }

    #[test]
    fn login_options_use_browser_field_names() -> Result<(), serde_json::Error> {
        let options = LoginOptions {
            challenge: "abc".to_string(),
            rp_id: "localhost".to_string(),
            timeout: 1000,
            user_verification: PREFERRED.to_string(),
            allow_credentials: vec![CredentialDescriptor::public_key("cred-1")],
        };
        let value = serde_json::to_value(&options)?;
        assert_eq!(value["rpId"], json!("localhost"));
        assert_eq!(
            value["allowCredentials"],
            json!([{"id": "cred-1", "type": "public-key"}])
        );
        Ok(())
    }
}
