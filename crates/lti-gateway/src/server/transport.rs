//! HTTP transport for the gateway.
//!
//! Turns axum requests into [`LaunchRequest`] values, keeps the LTI session in
//! a cookie-keyed [`SessionStore`] and answers with JSON only.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{
        HeaderMap, HeaderValue, Method, StatusCode, Uri,
        header::{CONTENT_TYPE, COOKIE, HOST, SET_COOKIE},
        uri::PathAndQuery,
    },
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::session::SessionStore;
use crate::error::LtiError;
use crate::gateway::{LtiContext, LtiGateway, Rejection, RequestKind, Requirement};
use crate::launch::LaunchRequest;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "lti_session";

/// Shared state for HTTP handlers.
#[derive(Debug)]
pub struct HttpState {
    /// Verifier, role gate and grade poster.
    pub gateway: LtiGateway,
    /// Cookie-keyed LTI sessions.
    pub sessions: SessionStore,
    /// Public base URL the consumer launches against. Falls back to the
    /// `Host` header when unset.
    pub base_url: Option<String>,
}

/// Create the HTTP router and start session cleanup.
pub fn create_router(gateway: LtiGateway, base_url: Option<String>) -> Router {
    let sessions = SessionStore::new();
    sessions.start_cleanup_task();
    create_router_with_sessions(gateway, sessions, base_url)
}

/// Create the HTTP router over an existing session store.
pub fn create_router_with_sessions(
    gateway: LtiGateway,
    sessions: SessionStore,
    base_url: Option<String>,
) -> Router {
    let state = Arc::new(HttpState {
        gateway,
        sessions,
        base_url,
    });

    Router::new()
        .route("/is_up", get(health_check))
        .route("/health", get(health_check))
        .route("/launch", get(handle_launch).post(handle_launch))
        .route("/instructor", get(handle_instructor).post(handle_instructor))
        .route("/staff", get(handle_staff).post(handle_staff))
        .route("/grade", post(handle_grade))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "lti-gateway",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn handle_launch(
    State(state): State<Arc<HttpState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let inbound = Inbound::new(&state, &method, &uri, &headers, &body);
    let (cookie, result) = guarded(&state, &Requirement::initial(), &inbound).await;

    let response = match result {
        Ok(ctx) => {
            tracing::info!(
                user_id = ?ctx.user_id(),
                consumer_key = ?ctx.consumer_key(),
                "LTI launch accepted"
            );
            Json(describe(&ctx)).into_response()
        }
        Err(rejection) => rejection.into_response(),
    };
    with_cookie(response, cookie)
}

async fn handle_instructor(
    State(state): State<Arc<HttpState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    role_gated(&state, "instructor", Inbound::new(&state, &method, &uri, &headers, &body)).await
}

async fn handle_staff(
    State(state): State<Arc<HttpState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    role_gated(&state, "staff", Inbound::new(&state, &method, &uri, &headers, &body)).await
}

async fn role_gated(state: &HttpState, role: &str, inbound: Inbound) -> Response {
    let requirement = Requirement::session().with_role(role);
    let (cookie, result) = guarded(state, &requirement, &inbound).await;

    let response = match result {
        Ok(ctx) => {
            let mut body = describe(&ctx);
            body["role"] = serde_json::Value::from(role);
            Json(body).into_response()
        }
        Err(rejection) => rejection.into_response(),
    };
    with_cookie(response, cookie)
}

async fn handle_grade(
    State(state): State<Arc<HttpState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let inbound = Inbound::new(&state, &method, &uri, &headers, &body);
    let (cookie, result) = guarded(&state, &Requirement::session(), &inbound).await;

    let response = match result {
        Ok(ctx) => post_grade(&ctx, inbound.request.parameter("score")).await,
        Err(rejection) => rejection.into_response(),
    };
    with_cookie(response, cookie)
}

async fn post_grade(ctx: &LtiContext, score: Option<&str>) -> Response {
    let Some(score) = score.and_then(|s| s.trim().parse::<f64>().ok()) else {
        return error_response(StatusCode::BAD_REQUEST, "score must be a number");
    };

    match ctx.post_grade(score).await {
        Ok(accepted) => Json(serde_json::json!({
            "accepted": accepted,
            "score": score
        }))
        .into_response(),
        Err(err) => {
            tracing::warn!(error = %err, "Grade post failed");
            let status = match err {
                LtiError::PostMessageFailed(_) => StatusCode::BAD_GATEWAY,
                LtiError::MissingProperty(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::UNAUTHORIZED,
            };
            error_response(status, &err.to_user_message())
        }
    }
}

fn describe(ctx: &LtiContext) -> serde_json::Value {
    serde_json::json!({
        "user_id": ctx.user_id(),
        "name": ctx.name(),
        "consumer_key": ctx.consumer_key(),
        "roles": ctx.roles()
    })
}

/// An inbound request as the gateway sees it.
struct Inbound {
    request: LaunchRequest,
    session_id: Option<String>,
    secure: bool,
}

impl Inbound {
    fn new(
        state: &HttpState,
        method: &Method,
        uri: &Uri,
        headers: &HeaderMap,
        body: &[u8],
    ) -> Self {
        let path = uri.path_and_query().map_or("/", PathAndQuery::as_str);
        let url = match &state.base_url {
            Some(base) => format!("{}{path}", base.trim_end_matches('/')),
            None => {
                let host = headers.get(HOST).and_then(|v| v.to_str().ok()).unwrap_or("localhost");
                format!("http://{host}{path}")
            }
        };
        let secure = url.starts_with("https://")
            || header_str(headers, "x-forwarded-proto")
                .is_some_and(|proto| proto.trim().eq_ignore_ascii_case("https"));

        let mut request = LaunchRequest::new(method.as_str(), url);
        for (name, value) in headers {
            if let Ok(value) = value.to_str() {
                request = request.with_header(name.as_str(), value);
            }
        }

        let is_form = header_str(headers, CONTENT_TYPE.as_str())
            .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));
        if is_form {
            request = request.with_parameters(url::form_urlencoded::parse(body).into_owned());
        }

        Self {
            request,
            session_id: session_cookie(headers),
            secure,
        }
    }
}

/// Run the gateway against the stored session and persist the result.
///
/// The session stays locked for the whole check. Every launch that
/// authenticates moves the session to a new id. Returns the cookie to set
/// when the session is authenticated.
async fn guarded(
    state: &HttpState,
    requirement: &Requirement,
    inbound: &Inbound,
) -> (Option<HeaderValue>, Result<LtiContext, Rejection>) {
    let mut locked = state.sessions.lock(inbound.session_id.as_deref()).await;
    let was_authenticated = locked.session().is_authenticated();
    let result =
        state.gateway.guard(requirement, &inbound.request, locked.session_mut(), |ctx| ctx);

    let rotate = requirement.kind == RequestKind::Initial || !was_authenticated;
    let cookie = locked
        .commit(rotate)
        .await
        .and_then(|id| session_cookie_value(&id, inbound.secure));
    (cookie, result)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn session_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .find_map(|pair| {
            pair.trim().strip_prefix(SESSION_COOKIE)?.strip_prefix('=').map(str::to_string)
        })
}

fn session_cookie_value(id: &str, secure: bool) -> Option<HeaderValue> {
    // Launches arrive cross-site from the consumer's iframe.
    let same_site = if secure { "SameSite=None; Secure" } else { "SameSite=Lax" };
    HeaderValue::from_str(&format!("{SESSION_COOKIE}={id}; Path=/; HttpOnly; {same_site}")).ok()
}

fn with_cookie(mut response: Response, cookie: Option<HeaderValue>) -> Response {
    if let Some(cookie) = cookie {
        response.headers_mut().insert(SET_COOKIE, cookie);
    }
    response
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "error": format!("Error: {message}") }))).into_response()
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::FORBIDDEN);
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
