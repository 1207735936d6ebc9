use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::principal::Principal;
use super::profile::Profile;

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    #[schema(example = "Ada Lovelace")]
    pub full_name: String,
    #[schema(example = "ada@example.com")]
    pub email: String,
    #[schema(example = "secret123")]
    pub password: String,
    #[schema(example = "secret123")]
    pub confirm_password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[schema(example = "ada@example.com")]
    pub email: String,
    #[schema(example = "secret123")]
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PasswordRecoveryRequest {
    pub email: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RecoverRequest {
    /// Token from the recovery link.
    pub token: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdatePasswordRequest {
    pub password: String,
    pub confirm_password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RegisterResponse {
    pub principal: Principal,
    /// Where the client should go next; always the verification notice.
    #[schema(example = "/verificar-email")]
    pub redirect: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    /// Bearer token naming the client session.
    pub token: String,
    pub principal: Principal,
    pub profile: Option<Profile>,
    #[schema(example = "/panel")]
    pub redirect: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}
