use async_trait::async_trait;
use axum::extract::MatchedPath;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use mockall::automock;
use serde::{Deserialize, Serialize};
use tower_http::trace::MakeSpan;
use tracing::Span;
use uuid::Uuid;

use crate::config::Config;

pub mod api;

/// Represents the currently authenticated user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: Uuid,
    pub email: String,
}

impl CurrentUser {
    /// Creates a new CurrentUser instance.
    pub fn new(id: Uuid, email: String) -> Self {
        Self { id, email }
    }
}

/// Token signing settings derived from the application config.
#[derive(Clone)]
pub struct AuthState {
    pub jwt_secret: String,
    pub access_token_ttl: chrono::Duration,
    pub refresh_token_ttl: chrono::Duration,
    pub google_client_id: Option<String>,
}

impl AuthState {
    /// Creates a new AuthState from the application config.
    pub fn from_config(config: &Config) -> Self {
        Self {
            jwt_secret: config.jwt_secret.clone(),
            access_token_ttl: chrono::Duration::minutes(config.access_token_minutes),
            refresh_token_ttl: chrono::Duration::hours(config.refresh_token_hours),
            google_client_id: config.google_client_id.clone(),
        }
    }

    /// Issues a fresh access/refresh token pair for the user.
    pub fn issue_session(&self, user: &CurrentUser) -> Result<SessionTokens, AuthError> {
        Ok(SessionTokens {
            access_token: encode_jwt(
                user,
                TokenKind::Access,
                self.access_token_ttl,
                &self.jwt_secret,
            )?,
            refresh_token: encode_jwt(
                user,
                TokenKind::Refresh,
                self.refresh_token_ttl,
                &self.jwt_secret,
            )?,
        })
    }

    /// Decodes a token and checks it is of the expected kind.
    pub fn verify_token(
        &self,
        token: &str,
        expected: TokenKind,
    ) -> Result<CurrentUser, AuthError> {
        let claims =
            decode_jwt(token, &self.jwt_secret).map_err(|_| AuthError::InvalidToken)?;
        if claims.kind != expected {
            return Err(AuthError::InvalidToken);
        }
        let id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;
        Ok(CurrentUser::new(id, claims.email))
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct Claims {
    pub sub: String,     // ID of the authenticated user
    pub email: String,   // Email of the authenticated user
    pub kind: TokenKind, // Whether this is an access or a refresh token
    pub exp: usize,      // Expiry time of the token
    pub iat: usize,      // Issued at time of the token
}

/// Access and refresh tokens handed out on login.
#[derive(Debug, Clone)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
}

/// Custom error type for authentication operations.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Invalid or expired token")]
    InvalidToken,
    #[error("Google login is not configured")]
    GoogleLoginDisabled,
    /// The identity provider refused or could not check the credential.
    #[error("Identity provider rejected the credential: {0}")]
    IdentityProvider(String),
    /// The specific `jsonwebtoken::errors::Error` is captured as the source of this error.
    #[error("JWT operation failed")]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("Password hashing failed: {0}")]
    PasswordHash(String),
}

pub fn encode_jwt(
    user: &CurrentUser,
    kind: TokenKind,
    ttl: chrono::Duration,
    jwt_secret: &str,
) -> Result<String, AuthError> {
    let now = chrono::Utc::now();
    let exp = (now + ttl).timestamp() as usize;
    let iat = now.timestamp() as usize;
    let claims = Claims {
        sub: user.id.to_string(),
        email: user.email.clone(),
        kind,
        exp,
        iat,
    };
    let jwt = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )?;
    Ok(jwt)
}

pub fn decode_jwt(token: &str, jwt_secret: &str) -> Result<Claims, AuthError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

/// Hashes a password with Argon2id and a random salt.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    use argon2::password_hash::{PasswordHasher, SaltString, rand_core::OsRng};

    let salt = SaltString::generate(&mut OsRng);
    argon2::Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::PasswordHash(e.to_string()))
}

/// Checks a password against a stored Argon2 hash. Malformed hashes never match.
pub fn verify_password(password: &str, password_hash: &str) -> bool {
    use argon2::password_hash::{PasswordHash, PasswordVerifier};

    PasswordHash::new(password_hash)
        .map(|parsed| {
            argon2::Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

/// Identity asserted by Google for a verified ID token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleProfile {
    pub subject: String,
    pub email: String,
    pub name: String,
    pub picture: String,
}

/// Verifies Google ID tokens presented by clients.
#[automock]
#[async_trait]
pub trait GoogleVerifier {
    async fn verify(&self, id_token: &str) -> Result<GoogleProfile, AuthError>;
}

const GOOGLE_TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";

#[derive(Deserialize, Debug)]
struct TokenInfo {
    aud: String,
    sub: String,
    email: String,
    #[serde(default)]
    email_verified: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    picture: Option<String>,
}

/// Checks ID tokens against Google's tokeninfo endpoint.
pub struct GoogleTokenInfoVerifier {
    http: reqwest::Client,
    client_id: String,
    endpoint: String,
}

impl GoogleTokenInfoVerifier {
    pub fn new(client_id: String) -> Self {
        Self::with_endpoint(client_id, GOOGLE_TOKENINFO_URL.to_string())
    }

    pub fn with_endpoint(client_id: String, endpoint: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            client_id,
            endpoint,
        }
    }
}

#[async_trait]
impl GoogleVerifier for GoogleTokenInfoVerifier {
    #[tracing::instrument(skip(self, id_token))]
    async fn verify(&self, id_token: &str) -> Result<GoogleProfile, AuthError> {
        let response = self
            .http
            .get(&self.endpoint)
            .query(&[("id_token", id_token)])
            .send()
            .await
            .map_err(|e| AuthError::IdentityProvider(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AuthError::IdentityProvider(format!(
                "token rejected with status {}",
                response.status()
            )));
        }

        let info: TokenInfo = response
            .json()
            .await
            .map_err(|e| AuthError::IdentityProvider(e.to_string()))?;

        if info.aud != self.client_id {
            return Err(AuthError::IdentityProvider(
                "token was issued for another client".to_string(),
            ));
        }
        if info.email_verified.as_deref() != Some("true") {
            return Err(AuthError::IdentityProvider(
                "email address is not verified".to_string(),
            ));
        }

        let name = info.name.unwrap_or_else(|| info.email.clone());
        Ok(GoogleProfile {
            subject: info.sub,
            email: info.email,
            name,
            picture: info.picture.unwrap_or_default(),
        })
    }
}

/// Verifier installed when no Google client ID is configured.
pub struct DisabledGoogleVerifier;

#[async_trait]
impl GoogleVerifier for DisabledGoogleVerifier {
    async fn verify(&self, _id_token: &str) -> Result<GoogleProfile, AuthError> {
        Err(AuthError::GoogleLoginDisabled)
    }
}

/// Custom span maker that filters sensitive data from credential-bearing requests.
/// This implementation avoids logging request bodies and tokens for security.
#[derive(Clone, Debug)]
pub struct FilteredMakeSpan;

impl FilteredMakeSpan {
    fn is_sensitive(path: &str) -> bool {
        path.starts_with("/api/auth/") || path == "/api/users"
    }
}

impl<B> MakeSpan<B> for FilteredMakeSpan {
    fn make_span(&mut self, request: &axum::http::Request<B>) -> Span {
        let uri = request.uri();
        let method = request.method();
        let matched_path = request
            .extensions()
            .get::<MatchedPath>()
            .map(MatchedPath::as_str);

        if Self::is_sensitive(uri.path()) {
            // Query strings may carry tokens, so only the path is recorded
            tracing::info_span!(
                "request",
                method = %method,
                path = %uri.path(),
                matched_path,
                sensitive_route = true,
            )
        } else {
            tracing::info_span!(
                "request",
                method = %method,
                uri = %uri,
                matched_path,
            )
        }
    }
}
