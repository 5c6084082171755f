//! TLS fingerprint dialer (§4.1). `wreq`'s builder exposes proxy and timeout
//! configuration but not per-extension ClientHello control, so there is no
//! verified crate in this workspace's dependency stack that can reproduce a
//! named browser or custom-client ClientHello byte-for-byte. Per the design
//! note on the uTLS dependency, every [`TlsFingerprint`] value is accepted
//! but degrades to the transport's standard TLS stack; callers that need
//! real fingerprint spoofing must supply a `wreq` build with uTLS support
//! compiled in.
//!
//! What this module still owns: turning a fingerprint tag into the one
//! thing `wreq::ClientBuilder` *does* expose today — a descriptive user
//! agent matching the named profile, which some upstreams use as a weaker
//! signal than the ClientHello itself.

use gproxy_provider_core::TlsFingerprint;

pub fn user_agent_for_fingerprint(fingerprint: Option<TlsFingerprint>) -> &'static str {
    match fingerprint {
        None => "gproxy/0.1",
        Some(TlsFingerprint::Antigravity) => "antigravity",
        Some(TlsFingerprint::ClaudeCode) => "claude-code/2.1.27",
        Some(TlsFingerprint::Codex) => "codex-cli",
        Some(TlsFingerprint::GeminiCli) => "gemini-cli",
        Some(TlsFingerprint::QwenCode) => "qwen-code",
        Some(TlsFingerprint::Chrome) => {
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36"
        }
        Some(TlsFingerprint::Firefox) => {
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0"
        }
        Some(TlsFingerprint::Safari) => {
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15"
        }
        Some(TlsFingerprint::Ios) => {
            "Mozilla/5.0 (iPhone; CPU iPhone OS 17_4 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Mobile/15E148 Safari/604.1"
        }
        Some(TlsFingerprint::Android) => "Mozilla/5.0 (Linux; Android 14) okhttp/4.12.0",
    }
}

/// Whether this fingerprint's ClientHello is actually spoofed, as opposed to
/// degrading to the default TLS stack. Always `false` today; kept as a
/// named predicate so the degradation is discoverable from one place when
/// real uTLS support lands.
pub fn is_spoofed(_fingerprint: Option<TlsFingerprint>) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_fingerprint_gets_generic_agent() {
        assert_eq!(user_agent_for_fingerprint(None), "gproxy/0.1");
    }

    #[test]
    fn named_fingerprint_gets_distinct_agent() {
        assert_ne!(
            user_agent_for_fingerprint(Some(TlsFingerprint::Chrome)),
            user_agent_for_fingerprint(Some(TlsFingerprint::ClaudeCode))
        );
    }

    #[test]
    fn no_fingerprint_currently_spoofs_the_handshake() {
        assert!(!is_spoofed(Some(TlsFingerprint::Chrome)));
        assert!(!is_spoofed(None));
    }
}
