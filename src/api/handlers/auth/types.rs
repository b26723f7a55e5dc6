//! Request/response types for auth endpoints.

use crate::webauthn::{LoginOptions, RegistrationOptions};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RegisterChallengeRequest {
    pub email: Option<String>,
    pub username: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RegisterVerifyRequest {
    pub email: Option<String>,
    pub username: Option<String>,
    /// `PublicKeyCredential` JSON produced by the browser.
    #[schema(value_type = Object)]
    pub credential: Option<serde_json::Value>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginChallengeRequest {
    pub email: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginVerifyRequest {
    pub email: Option<String>,
    #[schema(value_type = Object)]
    pub credential: Option<serde_json::Value>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RegistrationChallengeResponse {
    pub success: bool,
    pub options: RegistrationOptions,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginChallengeResponse {
    pub success: bool,
    pub options: LoginOptions,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub success: bool,
    pub user_id: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub user_id: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ErrorResponse {
    pub error: String,
}
