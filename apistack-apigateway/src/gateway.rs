//! Local authorizer gate
//!
//! Serves the declared routes of a REST API stage over HTTP. Requests to
//! Cognito-authorized methods are forwarded to the function only when they
//! carry a token the pool's authorizer would accept.

use apistack_cognito::TokenVerifier;
use apistack_core::RequestId;
use apistack_lambda::{
    event::{ApiGatewayIdentity, ApiGatewayRequestContext, AuthorizerContext},
    ApiGatewayEvent, ApiGatewayResponse, Invoker,
};
use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use bytes::Bytes;
use chrono::Utc;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::rest_api::{AuthorizationType, RouteSpec};

const BEARER_SCHEME: &str = "Bearer";

/// Everything the gate needs to answer requests for one stage
pub struct GatewayState {
    pub routes: Vec<RouteSpec>,
    pub stage: String,
    pub verifier: Arc<TokenVerifier>,
    pub invoker: Arc<dyn Invoker>,
    pub account_id: String,
    pub api_id: String,
}

pub fn create_router(state: GatewayState) -> Router {
    let shared_state = Arc::new(state);

    Router::new()
        .fallback(handle_request)
        .layer(TraceLayer::new_for_http())
        .with_state(shared_state)
}

/// A request path matched against a declared route
struct RouteMatch<'a> {
    route: &'a RouteSpec,
    path: String,
    path_parameters: HashMap<String, String>,
}

async fn handle_request(
    State(state): State<Arc<GatewayState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request_id = RequestId::new();
    info!(method = %method, path = %uri.path(), request_id = %request_id.id, "Gateway request");

    let Some(matched) = match_route(&state, &method, uri.path()) else {
        debug!(method = %method, path = %uri.path(), "No route declared");
        return error_response(StatusCode::FORBIDDEN, "Missing Authentication Token", &request_id);
    };

    let claims = match matched.route.authorization_type {
        AuthorizationType::None => None,
        AuthorizationType::Cognito => {
            let header_name = matched.route.identity_header.as_deref().unwrap_or("Authorization");
            let token = headers
                .get(header_name)
                .and_then(|v| v.to_str().ok())
                .map(bearer_token)
                .filter(|v| !v.is_empty());

            let Some(token) = token else {
                info!(path = %matched.path, "Request without token rejected");
                return error_response(StatusCode::UNAUTHORIZED, "Unauthorized", &request_id);
            };
            match state.verifier.verify(token, &matched.route.authorization_scopes) {
                Ok(claims) => Some(claims),
                Err(e) => {
                    info!(path = %matched.path, error = %e, "Request with invalid token rejected");
                    return error_response(StatusCode::UNAUTHORIZED, "Unauthorized", &request_id);
                }
            }
        }
        AuthorizationType::Iam | AuthorizationType::Custom => {
            warn!(
                authorization_type = matched.route.authorization_type.as_str(),
                "Authorization type not supported locally"
            );
            return error_response(StatusCode::FORBIDDEN, "Forbidden", &request_id);
        }
    };

    let event = build_event(
        &state,
        &matched,
        &method,
        &uri,
        &headers,
        body,
        &request_id,
        claims.map(|c| AuthorizerContext { claims: c.to_context() }),
    );

    match state.invoker.invoke(event).await {
        Ok(response) => proxy_response(response, &request_id),
        Err(e) => {
            warn!(error = %e, request_id = %request_id.id, "Integration failed");
            error_response(StatusCode::BAD_GATEWAY, "Internal server error", &request_id)
        }
    }
}

/// Find the route for a stage-prefixed request path
fn match_route<'a>(state: &'a GatewayState, method: &Method, path: &str) -> Option<RouteMatch<'a>> {
    let rest = path.strip_prefix('/')?.strip_prefix(state.stage.as_str())?;
    let path = match rest {
        "" => "/",
        r if r.starts_with('/') => r,
        _ => return None,
    };
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    state
        .routes
        .iter()
        .filter(|r| r.http_method == "ANY" || r.http_method == method.as_str())
        .find_map(|route| {
            let path_parameters = match_segments(&route.resource_path, &segments)?;
            Some(RouteMatch {
                route,
                path: path.to_string(),
                path_parameters,
            })
        })
}

/// Match `/items/{id}` style templates; `{name+}` takes the remainder
fn match_segments(template: &str, segments: &[&str]) -> Option<HashMap<String, String>> {
    let parts: Vec<&str> = template.split('/').filter(|s| !s.is_empty()).collect();
    let mut params = HashMap::new();

    for (i, part) in parts.iter().enumerate() {
        if let Some(name) = part.strip_prefix('{').and_then(|p| p.strip_suffix("+}")) {
            if i >= segments.len() || i != parts.len() - 1 {
                return None;
            }
            params.insert(name.to_string(), segments[i..].join("/"));
            return Some(params);
        }
        let segment = segments.get(i)?;
        match part.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
            Some(name) => {
                params.insert(name.to_string(), segment.to_string());
            }
            None if part == segment => {}
            None => return None,
        }
    }

    (parts.len() == segments.len()).then_some(params)
}

#[allow(clippy::too_many_arguments)]
fn build_event(
    state: &GatewayState,
    matched: &RouteMatch<'_>,
    method: &Method,
    uri: &Uri,
    headers: &HeaderMap,
    body: Bytes,
    request_id: &RequestId,
    authorizer: Option<AuthorizerContext>,
) -> ApiGatewayEvent {
    let mut single_headers = HashMap::new();
    let mut multi_value_headers: HashMap<String, Vec<String>> = HashMap::new();
    for (name, value) in headers {
        let Ok(value) = value.to_str() else { continue };
        single_headers.insert(name.as_str().to_string(), value.to_string());
        multi_value_headers
            .entry(name.as_str().to_string())
            .or_default()
            .push(value.to_string());
    }

    let mut query: HashMap<String, String> = HashMap::new();
    let mut multi_value_query: HashMap<String, Vec<String>> = HashMap::new();
    if let Some(raw) = uri.query() {
        for (k, v) in url::form_urlencoded::parse(raw.as_bytes()) {
            query.insert(k.to_string(), v.to_string());
            multi_value_query.entry(k.into_owned()).or_default().push(v.into_owned());
        }
    }

    let (body, is_base64_encoded) = if body.is_empty() {
        (None, false)
    } else {
        match std::str::from_utf8(&body) {
            Ok(text) => (Some(text.to_string()), false),
            Err(_) => (Some(STANDARD.encode(&body)), true),
        }
    };

    let now = Utc::now();
    let source_ip = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .unwrap_or_else(|| "127.0.0.1".to_string());
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let route = matched.route;

    ApiGatewayEvent {
        resource: route.resource_path.clone(),
        path: matched.path.clone(),
        http_method: method.as_str().to_string(),
        headers: single_headers,
        multi_value_headers,
        query_string_parameters: (!query.is_empty()).then_some(query),
        multi_value_query_string_parameters: (!multi_value_query.is_empty())
            .then_some(multi_value_query),
        path_parameters: (!matched.path_parameters.is_empty())
            .then(|| matched.path_parameters.clone()),
        stage_variables: None,
        request_context: ApiGatewayRequestContext {
            account_id: state.account_id.clone(),
            api_id: state.api_id.clone(),
            http_method: method.as_str().to_string(),
            identity: ApiGatewayIdentity { source_ip, user_agent },
            path: uri.path().to_string(),
            stage: state.stage.clone(),
            request_id: request_id.id.clone(),
            request_time: now.format("%d/%b/%Y:%H:%M:%S %z").to_string(),
            request_time_epoch: now.timestamp_millis(),
            resource_id: route.resource_id.clone(),
            resource_path: route.resource_path.clone(),
            operation_name: route.operation_name.clone(),
            authorizer,
        },
        body,
        is_base64_encoded,
    }
}

/// Turn the function's proxy response into an HTTP response
fn proxy_response(response: ApiGatewayResponse, request_id: &RequestId) -> Response {
    let Ok(status) = StatusCode::from_u16(response.status_code) else {
        warn!(status = response.status_code, "Function returned an invalid status code");
        return error_response(StatusCode::BAD_GATEWAY, "Internal server error", request_id);
    };

    let body = match response.body {
        Some(body) if response.is_base64_encoded => match STANDARD.decode(body.as_bytes()) {
            Ok(bytes) => Body::from(bytes),
            Err(e) => {
                warn!(error = %e, "Function returned an invalid base64 body");
                return error_response(StatusCode::BAD_GATEWAY, "Internal server error", request_id);
            }
        },
        Some(body) => Body::from(body),
        None => Body::empty(),
    };

    let mut headers = HeaderMap::new();
    let single = response.headers.into_iter().map(|(k, v)| (k, vec![v]));
    for (name, values) in single.chain(response.multi_value_headers) {
        let Ok(name) = HeaderName::try_from(name.as_str()) else { continue };
        for value in values {
            if let Ok(value) = HeaderValue::try_from(value) {
                headers.append(name.clone(), value);
            }
        }
    }
    add_request_id_headers(&mut headers, request_id);

    (status, headers, body).into_response()
}

fn add_request_id_headers(headers: &mut HeaderMap, request_id: &RequestId) {
    if let Ok(value) = HeaderValue::from_str(&request_id.id) {
        headers.insert("x-amzn-requestid", value);
    }
    if let Ok(value) = HeaderValue::from_str(&request_id.extended_id) {
        headers.insert("x-amz-apigw-id", value);
    }
}

/// Token from an identity header; the `Bearer` scheme is optional and its
/// name is case-insensitive
fn bearer_token(value: &str) -> &str {
    let value = value.trim();
    match value.split_once(char::is_whitespace) {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case(BEARER_SCHEME) => token.trim(),
        _ => value,
    }
}

fn error_response(status: StatusCode, message: &str, request_id: &RequestId) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert("x-amzn-errortype", HeaderValue::from_static(error_type(status)));
    add_request_id_headers(&mut headers, request_id);
    (status, headers, json!({ "message": message }).to_string()).into_response()
}

fn error_type(status: StatusCode) -> &'static str {
    match status {
        StatusCode::UNAUTHORIZED => "UnauthorizedException",
        StatusCode::FORBIDDEN => "MissingAuthenticationTokenException",
        _ => "InternalServerErrorException",
    }
}
