//! JWT authentication middleware resolving the calling user

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::authorization::{Caller, Role};
use crate::flash::read_cookie;
use crate::AppState;

/// Cookie consulted when no Authorization header is sent.
pub const TOKEN_COOKIE: &str = "late_policy_token";

/// JWT Claims structure
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String, // Numeric user id
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructor_id: Option<i64>, // Instructor a TA works for
    pub exp: usize,
    pub iat: Option<usize>,
}

impl Claims {
    /// The caller these claims describe. Users without an explicit
    /// instructor are their own instructor.
    pub fn caller(&self) -> Result<Caller, String> {
        let user_id = self
            .sub
            .parse::<i64>()
            .map_err(|_| format!("subject '{}' is not a user id", self.sub))?;
        Ok(Caller {
            user_id,
            role: self.role,
            instructor_id: self.instructor_id.unwrap_or(user_id),
        })
    }
}

#[derive(Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub algorithm: Algorithm,
}

impl JwtConfig {
    pub fn new(secret: String, algorithm: Algorithm) -> Self {
        Self { secret, algorithm }
    }

    /// Accepts HS256, HS384 and HS512; anything else is None.
    pub fn parse_algorithm(name: &str) -> Option<Algorithm> {
        match name {
            "HS256" => Some(Algorithm::HS256),
            "HS384" => Some(Algorithm::HS384),
            "HS512" => Some(Algorithm::HS512),
            _ => None,
        }
    }
}

/// Validates the token, then attaches the [`Caller`] to request extensions
pub async fn jwt_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = match bearer_token(&request) {
        Ok(token) => token,
        Err(message) => {
            debug!("{}", message);
            return unauthorized_response(message);
        }
    };

    let caller = verify_jwt(&token, &state.jwt_config).and_then(|claims| claims.caller());
    match caller {
        Ok(caller) => {
            debug!(
                "JWT token validated for user: {}, role: {:?}",
                caller.user_id, caller.role
            );
            request.extensions_mut().insert(caller);
            next.run(request).await
        }
        Err(e) => {
            warn!("JWT validation failed: {}", e);
            unauthorized_response(format!("Invalid token: {}", e))
        }
    }
}

/// Token from `Authorization: Bearer`, else from the token cookie
fn bearer_token(request: &Request) -> Result<String, String> {
    match request.headers().get("Authorization") {
        Some(value) => {
            let auth_str = value
                .to_str()
                .map_err(|_| "Invalid Authorization header".to_string())?;
            auth_str
                .strip_prefix("Bearer ")
                .map(str::to_string)
                .ok_or_else(|| "Authorization header must use Bearer scheme".to_string())
        }
        None => read_cookie(request.headers(), TOKEN_COOKIE)
            .ok_or_else(|| "Missing Authorization header".to_string()),
    }
}

/// Verify JWT token and extract claims
pub fn verify_jwt(token: &str, config: &JwtConfig) -> Result<Claims, String> {
    let mut validation = Validation::new(config.algorithm);
    validation.validate_exp = true;

    let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

    let token_data = decode::<Claims>(token, &decoding_key, &validation)
        .map_err(|e| format!("Token decode error: {}", e))?;

    Ok(token_data.claims)
}

fn unauthorized_response(message: String) -> Response {
    (StatusCode::UNAUTHORIZED, message).into_response()
}
