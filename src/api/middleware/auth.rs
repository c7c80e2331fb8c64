use crate::AppState;
use crate::api::error::AppError;
use crate::utils::hash::verify_password;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use base64::{Engine, engine::general_purpose::STANDARD};

/// Username and password from a `Basic` authorization header.
pub fn decode_basic_credentials(header_value: &str) -> Option<(String, String)> {
    let (scheme, encoded) = header_value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }

    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let text = String::from_utf8(decoded).ok()?;
    let (username, password) = text.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

/// Rejects the request with a basic auth challenge unless the username matches
/// and the password hashes to the configured value. Runs before the multipart
/// body is read, so nothing touches disk for unauthenticated callers.
pub async fn basic_auth_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let config = &state.config;

    let credentials = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(decode_basic_credentials);

    match credentials {
        Some((username, password))
            if username == config.auth_username
                && verify_password(&password, &config.auth_password_hash) =>
        {
            Ok(next.run(req).await)
        }
        Some((username, _)) => {
            tracing::warn!("Rejected upload credentials for user '{}'", username);
            Err(AppError::Unauthorized {
                realm: config.realm.clone(),
            })
        }
        None => Err(AppError::Unauthorized {
            realm: config.realm.clone(),
        }),
    }
}
