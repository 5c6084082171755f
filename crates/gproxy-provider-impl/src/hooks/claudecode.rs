//! Claude-Code OAuth hook (§4.3 row 1): the gateway authenticates to
//! Anthropic's own API the way the `claude-code` CLI does, which the
//! upstream only accepts from a request shaped like its own client.

use async_trait::async_trait;
use gproxy_provider_core::errors::GatewayError;
use gproxy_provider_core::headers::{header_get, header_remove, header_set};
use gproxy_provider_core::hooks::{Hook, UpstreamHttpRequest};

const USER_AGENT: &str = "claude-cli/2.1.27 (external, cli)";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const ANTHROPIC_BETA: &str = "oauth-2025-04-20";

/// Stainless is the SDK generator Anthropic's official clients are built
/// with; its headers are a weak "is this really an SDK client" signal some
/// upstream deployments check.
const STAINLESS_HEADERS: &[(&str, &str)] = &[
    ("X-Stainless-Lang", "js"),
    ("X-Stainless-Package-Version", "0.65.0"),
    ("X-Stainless-OS", "Linux"),
    ("X-Stainless-Arch", "x64"),
    ("X-Stainless-Runtime", "node"),
    ("X-Stainless-Retry-Count", "0"),
];

pub struct ClaudeCodeOAuthHook;

#[async_trait]
impl Hook for ClaudeCodeOAuthHook {
    async fn apply(&self, request: &mut UpstreamHttpRequest) -> Result<(), GatewayError> {
        if let Some(api_key) = header_get(&request.headers, "X-Api-Key").map(str::to_string) {
            header_remove(&mut request.headers, "X-Api-Key");
            header_set(&mut request.headers, "Authorization", format!("Bearer {api_key}"));
        }

        header_set(&mut request.headers, "anthropic-version", ANTHROPIC_VERSION);
        header_set(&mut request.headers, "anthropic-beta", ANTHROPIC_BETA);
        header_set(&mut request.headers, "anthropic-dangerous-direct-browser-access", "true");
        header_set(&mut request.headers, "user-agent", USER_AGENT);
        for (name, value) in STAINLESS_HEADERS {
            header_set(&mut request.headers, name, *value);
        }

        request.url = ensure_beta_query_param(&request.url);
        Ok(())
    }
}

fn ensure_beta_query_param(url: &str) -> String {
    let (path, query) = match url.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (url, None),
    };
    let has_beta = query
        .map(|query| query.split('&').any(|pair| pair == "beta" || pair.starts_with("beta=")))
        .unwrap_or(false);
    if has_beta {
        return url.to_string();
    }
    match query {
        Some(query) if !query.is_empty() => format!("{path}?{query}&beta=true"),
        _ => format!("{path}?beta=true"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::Method;

    fn request(url: &str, headers: Vec<(&str, &str)>) -> UpstreamHttpRequest {
        UpstreamHttpRequest {
            method: Method::POST,
            url: url.to_string(),
            headers: headers.into_iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            body: Bytes::new(),
        }
    }

    #[tokio::test]
    async fn moves_api_key_into_bearer_authorization() {
        let mut req = request("https://api.anthropic.com/v1/messages", vec![("X-Api-Key", "sk-ant-123")]);
        ClaudeCodeOAuthHook.apply(&mut req).await.unwrap();
        assert!(header_get(&req.headers, "X-Api-Key").is_none());
        assert_eq!(header_get(&req.headers, "Authorization"), Some("Bearer sk-ant-123"));
    }

    #[tokio::test]
    async fn injects_required_anthropic_and_stainless_headers() {
        let mut req = request("https://api.anthropic.com/v1/messages", vec![]);
        ClaudeCodeOAuthHook.apply(&mut req).await.unwrap();
        assert_eq!(header_get(&req.headers, "anthropic-version"), Some(ANTHROPIC_VERSION));
        assert_eq!(header_get(&req.headers, "anthropic-dangerous-direct-browser-access"), Some("true"));
        assert_eq!(header_get(&req.headers, "X-Stainless-Lang"), Some("js"));
    }

    #[tokio::test]
    async fn appends_beta_query_param_only_if_absent() {
        let mut req = request("https://api.anthropic.com/v1/messages", vec![]);
        ClaudeCodeOAuthHook.apply(&mut req).await.unwrap();
        assert!(req.url.ends_with("?beta=true"));

        let mut already_has_it = request("https://api.anthropic.com/v1/messages?beta=true", vec![]);
        ClaudeCodeOAuthHook.apply(&mut already_has_it).await.unwrap();
        assert_eq!(already_has_it.url, "https://api.anthropic.com/v1/messages?beta=true");
    }
}
