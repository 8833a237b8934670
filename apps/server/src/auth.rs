use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use argon2::{
    password_hash::{Error as PasswordHashError, PasswordHash, PasswordVerifier},
    Argon2,
};
use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::main_lib::AppState;

const TOKEN_SUBJECT: &str = "quantfolio";

#[derive(Clone)]
pub struct AuthConfig {
    /// Argon2 PHC string; login is disabled without it.
    pub password_hash: Option<String>,
    pub jwt_secret: Vec<u8>,
    pub access_token_ttl: Duration,
}

pub struct AuthManager {
    password_hash: Option<String>,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    token_ttl: Duration,
}

#[derive(Debug)]
pub enum AuthError {
    Unauthorized,
    InvalidCredentials,
    NotConfigured,
    Internal(String),
}

#[derive(Serialize)]
struct AuthErrorBody {
    code: u16,
    message: String,
}

/// Token claims. Tokens minted by other services sharing the secret may
/// omit `sub` and carry extra claims.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
    exp: usize,
    #[serde(default)]
    iat: usize,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub password: String,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthStatusResponse {
    pub requires_password: bool,
}

impl AuthManager {
    pub fn new(config: &AuthConfig) -> anyhow::Result<Self> {
        if let Some(hash) = &config.password_hash {
            PasswordHash::new(hash)?;
        }
        let encoding_key = EncodingKey::from_secret(&config.jwt_secret);
        let decoding_key = DecodingKey::from_secret(&config.jwt_secret);
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.validate_aud = false;
        Ok(Self {
            password_hash: config.password_hash.clone(),
            encoding_key,
            decoding_key,
            validation,
            token_ttl: config.access_token_ttl,
        })
    }

    pub fn requires_password(&self) -> bool {
        self.password_hash.is_some()
    }

    pub fn verify_password(&self, candidate: &str) -> Result<(), AuthError> {
        let hash = self.password_hash.as_ref().ok_or(AuthError::NotConfigured)?;
        let parsed = PasswordHash::new(hash).map_err(|e| {
            AuthError::Internal(format!("Invalid password hash configuration: {e}"))
        })?;
        Argon2::default()
            .verify_password(candidate.as_bytes(), &parsed)
            .map_err(|err| match err {
                PasswordHashError::Password => AuthError::InvalidCredentials,
                other => AuthError::Internal(format!("Password verification failed: {other}")),
            })
    }

    pub fn issue_token(&self) -> Result<String, AuthError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|_| AuthError::Internal("System clock is before UNIX_EPOCH".into()))?;
        let exp = now + self.token_ttl;
        let claims = Claims {
            sub: Some(TOKEN_SUBJECT.to_string()),
            user_id: None,
            iat: now.as_secs() as usize,
            exp: exp.as_secs() as usize,
        };
        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(format!("Failed to sign token: {e}")))
    }

    /// Validates a bearer token and returns the caller it names, if any.
    pub fn validate_token(&self, token: &str) -> Result<Option<String>, AuthError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims.user_id.or(data.claims.sub))
            .map_err(|err| match err.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature
                | jsonwebtoken::errors::ErrorKind::InvalidToken
                | jsonwebtoken::errors::ErrorKind::InvalidSignature
                | jsonwebtoken::errors::ErrorKind::InvalidAlgorithm
                | jsonwebtoken::errors::ErrorKind::Base64(_)
                | jsonwebtoken::errors::ErrorKind::Json(_)
                | jsonwebtoken::errors::ErrorKind::Utf8(_)
                | jsonwebtoken::errors::ErrorKind::MissingRequiredClaim(_) => {
                    AuthError::Unauthorized
                }
                other => AuthError::Internal(format!("Failed to validate token: {other:?}")),
            })
    }

    pub fn expires_in(&self) -> Duration {
        self.token_ttl
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            AuthError::InvalidCredentials => {
                (StatusCode::UNAUTHORIZED, "Invalid password".to_string())
            }
            AuthError::NotConfigured => (
                StatusCode::NOT_FOUND,
                "Password login is not configured for this server".to_string(),
            ),
            AuthError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        let body = Json(AuthErrorBody {
            code: status.as_u16(),
            message,
        });
        (status, body).into_response()
    }
}

pub fn decode_secret_key(raw: &str) -> anyhow::Result<Vec<u8>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        anyhow::bail!("JWT secret cannot be empty");
    }
    let decoded = match BASE64.decode(trimmed) {
        Ok(bytes) => bytes,
        Err(_) if trimmed.len() == 32 => trimmed.as_bytes().to_vec(),
        Err(_) => {
            anyhow::bail!("JWT secret must be base64 encoded or a 32-byte ASCII string")
        }
    };

    if decoded.len() != 32 {
        anyhow::bail!("JWT secret must decode to exactly 32 bytes");
    }

    Ok(decoded)
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, body = LoginResponse),
        (status = 401, description = "Wrong password"),
        (status = 404, description = "Password login disabled")
    )
)]
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AuthError> {
    let auth = state.auth.clone();
    if !auth.requires_password() {
        return Err(AuthError::NotConfigured);
    }
    auth.verify_password(&payload.password).inspect_err(|err| {
        if matches!(err, AuthError::InvalidCredentials) {
            tracing::warn!("Rejected login attempt with an invalid password");
        }
    })?;
    let token = auth.issue_token()?;
    Ok(Json(LoginResponse {
        access_token: token,
        token_type: "Bearer".to_string(),
        expires_in: auth.expires_in().as_secs(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/auth/status",
    responses((status = 200, body = AuthStatusResponse))
)]
pub async fn auth_status(State(state): State<Arc<AppState>>) -> Json<AuthStatusResponse> {
    Json(AuthStatusResponse {
        requires_password: state.auth.requires_password(),
    })
}

pub async fn require_jwt(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or(AuthError::Unauthorized)?;

    let mut parts = header.splitn(2, ' ');
    let (Some(scheme), Some(token)) = (parts.next(), parts.next()) else {
        return Err(AuthError::Unauthorized);
    };

    if !scheme.eq_ignore_ascii_case("Bearer") {
        return Err(AuthError::Unauthorized);
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::Unauthorized);
    }

    let caller = state.auth.validate_token(token)?;
    tracing::debug!(caller = caller.as_deref().unwrap_or("anonymous"), "Authenticated request");
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(ttl: Duration) -> AuthManager {
        AuthManager::new(&AuthConfig {
            password_hash: None,
            jwt_secret: vec![7u8; 32],
            access_token_ttl: ttl,
        })
        .unwrap()
    }

    #[test]
    fn test_issued_token_validates() {
        let auth = manager(Duration::from_secs(600));
        let token = auth.issue_token().unwrap();
        assert_eq!(
            auth.validate_token(&token).unwrap(),
            Some(TOKEN_SUBJECT.to_string())
        );
    }

    #[test]
    fn test_token_from_other_secret_is_rejected() {
        let token = manager(Duration::from_secs(600)).issue_token().unwrap();
        let other = AuthManager::new(&AuthConfig {
            password_hash: None,
            jwt_secret: vec![9u8; 32],
            access_token_ttl: Duration::from_secs(600),
        })
        .unwrap();
        assert!(matches!(
            other.validate_token(&token),
            Err(AuthError::Unauthorized)
        ));
    }

    #[test]
    fn test_garbage_token_is_unauthorized() {
        let auth = manager(Duration::from_secs(600));
        assert!(matches!(
            auth.validate_token("not-a-jwt"),
            Err(AuthError::Unauthorized)
        ));
    }

    #[test]
    fn test_login_disabled_without_hash() {
        let auth = manager(Duration::from_secs(600));
        assert!(!auth.requires_password());
        assert!(matches!(
            auth.verify_password("anything"),
            Err(AuthError::NotConfigured)
        ));
    }

    #[test]
    fn test_decode_secret_key() {
        assert_eq!(decode_secret_key(&BASE64.encode([1u8; 32])).unwrap(), vec![1u8; 32]);
        assert_eq!(
            decode_secret_key("quantfolio-test-secret-32-bytes!").unwrap().len(),
            32
        );
        assert!(decode_secret_key("").is_err());
        assert!(decode_secret_key(&BASE64.encode([1u8; 16])).is_err());
    }
}
