//! Codex OAuth hook (§4.3 row 2). The source carried two divergent
//! path-rewrite implementations — one that rewrote unconditionally, one
//! gated on the request host being `chatgpt.com`. We keep the host-gated
//! version: Codex OAuth credentials are only ever used against
//! `chatgpt.com`, and an unconditional rewrite would corrupt requests to a
//! provider that happens to reuse this hook's OAuth kind against a
//! different host (§9 open question, resolved).

use async_trait::async_trait;
use gproxy_provider_core::errors::GatewayError;
use gproxy_provider_core::headers::{header_get, header_remove, header_set};
use gproxy_provider_core::hooks::{Hook, UpstreamHttpRequest};

const CODEX_HOST: &str = "chatgpt.com";
const ORIGINATOR: &str = "codex_cli_rs";

pub struct CodexOAuthHook;

#[async_trait]
impl Hook for CodexOAuthHook {
    async fn apply(&self, request: &mut UpstreamHttpRequest) -> Result<(), GatewayError> {
        if host_of(&request.url).as_deref() == Some(CODEX_HOST) {
            request.url = rewrite_path(&request.url);
        }

        header_set(&mut request.headers, "OpenAI-Beta", "responses=experimental");
        header_set(&mut request.headers, "originator", ORIGINATOR);

        if let Some(account_id) = header_get(&request.headers, "X-ChatGPT-Account-ID").map(str::to_string) {
            header_remove(&mut request.headers, "X-ChatGPT-Account-ID");
            header_set(&mut request.headers, "ChatGPT-Account-ID", account_id);
        }

        Ok(())
    }
}

fn host_of(url: &str) -> Option<String> {
    let after_scheme = url.split_once("://").map(|(_, rest)| rest).unwrap_or(url);
    let host_and_port = after_scheme.split(['/', '?']).next().unwrap_or_default();
    let host = host_and_port.split(':').next().unwrap_or_default();
    (!host.is_empty()).then(|| host.to_string())
}

fn rewrite_path(url: &str) -> String {
    let (prefix, rest) = split_at_path(url);
    let rewritten = if let Some(suffix) = rest.strip_prefix("/backend-api/responses") {
        format!("/backend-api/codex/responses{suffix}")
    } else if let Some(suffix) = rest.strip_prefix("/backend-api/") {
        format!("/backend-api/codex/{suffix}")
    } else if rest.starts_with("/codex/") {
        rest.to_string()
    } else if let Some(suffix) = rest.strip_prefix("/v1/") {
        format!("/codex/{suffix}")
    } else {
        rest.to_string()
    };
    format!("{prefix}{rewritten}")
}

/// Splits `scheme://host` from the path-and-query tail so rewrites never
/// touch the authority.
fn split_at_path(url: &str) -> (&str, &str) {
    let Some(scheme_end) = url.find("://") else {
        return ("", url);
    };
    let authority_start = scheme_end + 3;
    match url[authority_start..].find('/') {
        Some(offset) => url.split_at(authority_start + offset),
        None => (url, ""),
    }
}
