use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use yatube_types::api::Claims;

use crate::auth::{AppState, decode_token};

/// Authentication entry point for redirects from guarded routes.
pub const LOGIN_URL: &str = "/auth/login/";

const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Who is making the request. Inserted on every request; `None` is anonymous.
#[derive(Debug, Clone, Default)]
pub struct Viewer(pub Option<Claims>);

impl Viewer {
    pub fn claims(&self) -> Option<&Claims> {
        self.0.as_ref()
    }

    pub fn is_anonymous(&self) -> bool {
        self.0.is_none()
    }
}

/// Resolve the bearer token, if any, into a `Viewer` (and `Claims` when valid).
/// Missing or invalid tokens make the request anonymous.
pub async fn resolve_viewer(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let claims = bearer_token(req.headers())
        .and_then(|token| decode_token(&state.config.jwt_secret, token).ok());

    if let Some(claims) = &claims {
        req.extensions_mut().insert(claims.clone());
    }
    req.extensions_mut().insert(Viewer(claims));

    next.run(req).await
}

/// Redirect anonymous requests to the login page, remembering where they were going.
pub async fn require_auth(req: Request, next: Next) -> Response {
    if req.extensions().get::<Claims>().is_some() {
        return next.run(req).await;
    }

    let target = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    Redirect::to(&login_redirect(target)).into_response()
}

/// Admin routes need `X-Admin-Token` to match the configured token.
pub async fn require_admin(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let expected = state
        .config
        .admin_token
        .as_deref()
        .ok_or(StatusCode::FORBIDDEN)?;

    let given = req
        .headers()
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(StatusCode::FORBIDDEN)?;

    if given != expected {
        return Err(StatusCode::FORBIDDEN);
    }
    Ok(next.run(req).await)
}

pub fn login_redirect(next: &str) -> String {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("next", next)
        .finish();
    format!("{LOGIN_URL}?{query}")
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}
