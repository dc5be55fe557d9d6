use axum::{
    Extension,
    extract::{Request, State},
    http::{HeaderMap, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;

use crate::{
    adapters::http::app_state::AppState,
    app_error::AppError,
    application::{jwt, validators::is_valid_email},
};

pub const ACCESS_TOKEN_COOKIE: &str = "access_token";

/// The authenticated caller, identified by email.
#[derive(Debug, Clone)]
pub struct Viewer {
    pub email: String,
}

/// Resolves the viewer from a bearer token or the `access_token` cookie.
pub async fn require_session(
    State(app_state): State<AppState>,
    cookies: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(request.headers())
        .or_else(|| cookies.get(ACCESS_TOKEN_COOKIE).map(|c| c.value().to_owned()))
        .ok_or(AppError::InvalidCredentials)?;

    let claims = jwt::verify(&token, &app_state.config.jwt_secret)?;
    if !is_valid_email(&claims.sub) {
        return Err(AppError::InvalidCredentials);
    }

    request.extensions_mut().insert(Viewer { email: claims.sub });
    Ok(next.run(request).await)
}

/// Admin endpoints check the stored role, not a token claim, so revoking the
/// role takes effect immediately.
pub async fn require_admin(
    State(app_state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = app_state
        .user_repo
        .get_by_email(&viewer.email)
        .await?
        .ok_or(AppError::Forbidden)?;

    if !user.is_admin() {
        tracing::warn!(email = %viewer.email, "Non-admin attempted an admin action");
        return Err(AppError::Forbidden);
    }

    Ok(next.run(request).await)
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then(|| token.to_string())
}
