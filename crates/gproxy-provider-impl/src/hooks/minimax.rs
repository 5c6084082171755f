//! Minimax API-key hook (§4.3 row 4). Matched by API-base substring rather
//! than OAuth kind since Minimax is an API-key provider (§6: OAuth takes
//! precedence over API-base matching, so this only ever fires for
//! non-OAuth providers).

use async_trait::async_trait;
use gproxy_provider_core::errors::GatewayError;
use gproxy_provider_core::hooks::{Hook, UpstreamHttpRequest};

const MATCH_NEEDLE: &str = "minimax.";
const OLD_SUFFIX: &str = "/chat/completions";
const NEW_SUFFIX: &str = "/text/chatcompletion_v2";

pub struct MinimaxApiKeyHook;

#[async_trait]
impl Hook for MinimaxApiKeyHook {
    async fn apply(&self, request: &mut UpstreamHttpRequest) -> Result<(), GatewayError> {
        if !request.url.contains(MATCH_NEEDLE) {
            return Ok(());
        }
        if let Some(prefix) = request.url.strip_suffix(OLD_SUFFIX) {
            request.url = format!("{prefix}{NEW_SUFFIX}");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::Method;

    fn request(url: &str) -> UpstreamHttpRequest {
        UpstreamHttpRequest {
            method: Method::POST,
            url: url.to_string(),
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    #[tokio::test]
    async fn rewrites_chat_completions_suffix_for_minimax_host() {
        let mut req = request("https://api.minimax.chat/v1/chat/completions");
        MinimaxApiKeyHook.apply(&mut req).await.unwrap();
        assert_eq!(req.url, "https://api.minimax.chat/v1/text/chatcompletion_v2");
    }

    #[tokio::test]
    async fn leaves_non_minimax_hosts_untouched() {
        let mut req = request("https://api.openai.com/v1/chat/completions");
        MinimaxApiKeyHook.apply(&mut req).await.unwrap();
        assert_eq!(req.url, "https://api.openai.com/v1/chat/completions");
    }
}
