use crate::server::{
    AppState,
    body::{InboundBody, UpstreamBody},
    routes::ErrorResponse,
};
use axum::{
    Json,
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Query parameter naming the absolute URL of the upstream resource.
const URL_PARAM: &str = "url";

/// First non-empty `url` parameter. Query pairs are kept as a list so a repeated
/// parameter never turns into an extractor rejection.
fn target_url(query: Vec<(String, String)>) -> Option<String> {
    query
        .into_iter()
        .find(|(name, value)| name == URL_PARAM && !value.is_empty())
        .map(|(_, value)| value)
}

impl IntoResponse for UpstreamBody {
    fn into_response(self) -> Response {
        match self {
            Self::Json(value) => Json(value).into_response(),
            Self::Text(text) => text.into_response(),
        }
    }
}

pub async fn proxy_handler(
    State(state): State<Arc<AppState>>,
    method: Method,
    Query(query): Query<Vec<(String, String)>>,
    request_headers: HeaderMap,
    request_body: Bytes,
) -> Result<Response, (StatusCode, Json<ErrorResponse>)> {
    let Some(url) = target_url(query) else {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "Missing URL parameter",
                message: None,
            }),
        ));
    };

    info!("Relaying {method} request to {url}");
    match relay(&state, method, &url, &request_headers, request_body).await {
        Ok((status, body)) => Ok((status, body).into_response()),
        Err(err) => {
            warn!("Failed to relay request to upstream server: {err:?}");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "Proxy failed",
                    message: Some(format!("{:#}", anyhow::Error::from(err))),
                }),
            ))
        }
    }
}

/// Send the request upstream and buffer the full response.
async fn relay(
    state: &AppState,
    method: Method,
    url: &str,
    request_headers: &HeaderMap,
    request_body: Bytes,
) -> Result<(StatusCode, UpstreamBody), reqwest::Error> {
    let sends_body = !matches!(method, Method::GET | Method::HEAD);
    let mut request_builder = state
        .http_client
        .request(method, url)
        .header(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        )
        .header(header::ACCEPT, HeaderValue::from_static("application/json"));
    for header_name in &state.settings.upstream_settings.forwarded_headers {
        if let Some(header_value) = request_headers.get(header_name.as_str()) {
            debug!("Attaching header {header_name} to upstream request");
            request_builder = request_builder.header(header_name.as_str(), header_value.clone());
        }
    }
    if sends_body {
        request_builder = request_builder
            .body(InboundBody::from_request(request_headers, request_body).into_upstream());
    }

    let response = request_builder.send().await?;
    let status = response.status();
    let text = response.text().await?;
    Ok((status, UpstreamBody::from(text)))
}
