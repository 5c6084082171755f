use std::fs;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::Router;
use bytes::Bytes;
use uuid::Uuid;

use gproxy_common::GlobalConfigPatch;
use gproxy_core::{Gateway, GatewayResponse, ProviderRegistry, Surface};
use gproxy_provider_core::config::GatewayConfig;
use gproxy_provider_core::headers::Headers;
use gproxy_provider_core::provider::Dialect;
use gproxy_provider_core::GatewayError;

mod cli;

struct AppState {
    registry: ProviderRegistry,
    gateway: Gateway,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli::Cli { command } = clap::Parser::parse();
    let cli::Command::Serve { config, host, port, proxy, redact_sensitive } = command;

    let global = GlobalConfigPatch { host, port, proxy, event_redact_sensitive: redact_sensitive }
        .into_config()
        .context("applying global config defaults")?;

    let raw = fs::read_to_string(&config).with_context(|| format!("reading {}", config.display()))?;
    let mut gateway_config = GatewayConfig::from_json_str(&raw).context("parsing provider config")?;
    if let Some(proxy) = &global.proxy {
        gateway_config.apply_default_proxy(proxy);
    }
    let registry = ProviderRegistry::from_config(&gateway_config);

    let gateway = Gateway::new(gproxy_provider_impl::default_registry())
        .with_redact_sensitive(global.event_redact_sensitive);
    let state = Arc::new(AppState { registry, gateway });

    let app = Router::new()
        .route("/{provider_id}/{*path}", any(forward))
        .with_state(state);

    let bind = format!("{}:{}", global.host, global.port);
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    tracing::info!(%bind, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}

/// The thin front-end stand-in (§2 step 7): extracts the provider id from
/// the path, forwards the raw request to [`Gateway::forward`], and streams
/// the translated response straight back.
async fn forward(
    State(state): State<Arc<AppState>>,
    Path((provider_id, path)): Path<(Uuid, String)>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(provider) = state.registry.get(provider_id) else {
        return (StatusCode::NOT_FOUND, "unknown provider").into_response();
    };

    // The provider's own wire shape and the shape the caller addressed can
    // differ: a client hitting `/v1/messages` against an `openai`-dialect
    // provider wants Anthropic framing back from a Chat-Completions upstream,
    // which is exactly the cross-dialect case the translator set exists for.
    let upstream_surface = default_surface(provider.dialect);
    let client_surface = surface_from_path(&path, upstream_surface);
    let request_headers: Headers = headers
        .iter()
        .filter_map(|(name, value)| value.to_str().ok().map(|value| (name.as_str().to_string(), value.to_string())))
        .collect();
    let model = serde_json::from_slice::<serde_json::Value>(&body)
        .ok()
        .and_then(|value| value.get("model").and_then(|model| model.as_str()).map(str::to_string))
        .unwrap_or_default();

    let result = state
        .gateway
        .forward(
            &provider,
            upstream_surface,
            client_surface,
            method,
            &format!("/{path}"),
            request_headers,
            body,
            &model,
        )
        .await;

    match result {
        Ok(GatewayResponse::Json { status, headers, body }) => {
            let mut response = Response::builder().status(status);
            for (name, value) in &headers {
                response = response.header(name, value);
            }
            response.body(Body::from(body)).unwrap().into_response()
        }
        Ok(GatewayResponse::Stream { status, headers, body }) => {
            let mut response = Response::builder().status(status);
            for (name, value) in &headers {
                response = response.header(name, value);
            }
            response.body(Body::from_stream(body)).unwrap().into_response()
        }
        Err(err) => error_response(&err),
    }
}

fn default_surface(dialect: Dialect) -> Surface {
    match dialect {
        Dialect::Openai => Surface::OpenAiChat,
        Dialect::Anthropic => Surface::Anthropic,
        Dialect::Google => Surface::Google,
    }
}

/// The surface the *caller* addressed, inferred from the path it used.
/// Clients pick their wire shape by which endpoint they hit, the same way
/// they would against the real OpenAI/Anthropic APIs; a path that doesn't
/// match a known suffix keeps talking the provider's native surface.
fn surface_from_path(path: &str, fallback: Surface) -> Surface {
    if path.ends_with("chat/completions") {
        Surface::OpenAiChat
    } else if path.ends_with("responses") {
        Surface::OpenAiResponses
    } else if path.ends_with("messages") {
        Surface::Anthropic
    } else {
        fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn surface_from_path_matches_known_endpoint_suffixes() {
        assert_eq!(surface_from_path("v1/chat/completions", Surface::Anthropic), Surface::OpenAiChat);
        assert_eq!(surface_from_path("v1/responses", Surface::Anthropic), Surface::OpenAiResponses);
        assert_eq!(surface_from_path("v1/messages", Surface::OpenAiChat), Surface::Anthropic);
        assert_eq!(surface_from_path("v1/models", Surface::Anthropic), Surface::Anthropic);
    }
}

fn error_response(error: &GatewayError) -> Response {
    let status = StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, axum::Json(gproxy_core::error::error_body(error))).into_response()
}
