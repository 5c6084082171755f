//! The dispatcher (§2 steps 3-6; the "interface the front-end consumes"
//! from §2 step 7). Ties the hook chain, client pool, recording
//! round-tripper, and protocol translator together behind one `forward`
//! call; the HTTP front-end itself (routing, auth, SSE writer) lives in
//! `apps/gproxy` and is an external collaborator per spec §1.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use futures_core::Stream;
use futures_util::{stream, StreamExt};
use http::Method;

use gproxy_protocol::anthropic::stream::StreamEvent;
use gproxy_protocol::openai::chat::CreateChatCompletionStreamResponse;
use gproxy_protocol::openai::responses::ResponseStreamEvent;
use gproxy_protocol::sse::{self, SseParser};
use gproxy_provider_core::headers::{header_get, header_set, Headers};
use gproxy_provider_core::hooks::{HookRegistry, UpstreamHttpRequest};
use gproxy_provider_core::provider::{Auth, OAuthProviderKind, Provider};
use gproxy_provider_core::sink::RecordSink;
use gproxy_provider_core::{ClientKey, GatewayError, TransportKey};
use gproxy_provider_impl::hooks::antigravity;
use gproxy_provider_impl::recording::{self, RecordingBuffer, SingleFireRecorder};
use gproxy_provider_impl::{ClientPool, TransportPool};
use gproxy_transform::anthropic_to_openai_chat::AnthropicToOpenAiChatTranslator;
use gproxy_transform::anthropic_to_openai_responses::AnthropicToOpenAiResponsesTranslator;
use gproxy_transform::openai_chat_to_anthropic::OpenAiChatToAnthropicTranslator;
use gproxy_transform::openai_responses_to_anthropic::OpenAiResponsesToAnthropicTranslator;

pub type BoxedByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, GatewayError>> + Send>>;

/// The wire shape a stream is encoded in, independent of which upstream a
/// [`Provider`] is configured for. A single `openai`-dialect provider can be
/// called on either OpenAI surface; the caller (the out-of-scope front-end,
/// which knows which path the client and the upstream each used) supplies
/// both sides explicitly rather than this crate inferring the upstream one
/// from `Provider::dialect` (§4.5: only four translators exist, one per
/// ordered (non-Anthropic, Anthropic) pair — there is no direct
/// Chat-Completions<->Responses translator).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    OpenAiChat,
    OpenAiResponses,
    Anthropic,
    Google,
}

pub enum GatewayResponse {
    Json { status: u16, headers: Headers, body: Bytes },
    Stream { status: u16, headers: Headers, body: BoxedByteStream },
}

pub struct Gateway {
    transports: Arc<TransportPool>,
    clients: Arc<ClientPool>,
    hooks: HookRegistry,
    sink: Option<Arc<dyn RecordSink>>,
    redact_sensitive: bool,
}

impl Gateway {
    pub fn new(hooks: HookRegistry) -> Self {
        Self {
            transports: Arc::new(TransportPool::new()),
            clients: Arc::new(ClientPool::new()),
            hooks,
            sink: None,
            redact_sensitive: true,
        }
    }

    /// Sets the recording sink. Per §4.6, this applies retroactively to the
    /// client pool's existing and future entries (they don't carry their own
    /// sink reference; they read the pool's, which this also populates).
    pub fn with_sink(mut self, sink: Arc<dyn RecordSink>) -> Self {
        self.clients.set_sink(sink.clone());
        self.sink = Some(sink);
        self
    }

    /// Whether `Authorization`/`x-api-key` header values are blanked before
    /// a captured request reaches the sink. Defaults to `true`.
    pub fn with_redact_sensitive(mut self, redact_sensitive: bool) -> Self {
        self.redact_sensitive = redact_sensitive;
        self
    }

    pub fn client_pool(&self) -> &Arc<ClientPool> {
        &self.clients
    }

    /// Forwards one downstream request to `provider`. `upstream_surface` is
    /// the wire shape this particular call uses against the provider (an
    /// `openai`-dialect provider may be called on either OpenAI surface);
    /// `client_surface` is the shape the inbound client expects back. The
    /// two are translated between when they differ (§4.5).
    pub async fn forward(
        &self,
        provider: &Provider,
        upstream_surface: Surface,
        client_surface: Surface,
        method: Method,
        path_and_query: &str,
        mut headers: Headers,
        body: Bytes,
        model: &str,
    ) -> Result<GatewayResponse, GatewayError> {
        match &provider.auth {
            Auth::ApiKey(key) => header_set(&mut headers, "Authorization", format!("Bearer {key}")),
            Auth::OAuth(detail) => header_set(&mut headers, "Authorization", format!("Bearer {}", detail.access_token)),
        }
        for (name, value) in &provider.extra_headers {
            header_set(&mut headers, name, value.clone());
        }

        let url = format!("{}{}", provider.normalized_api_base(), path_and_query);
        let mut request = UpstreamHttpRequest { method: method.clone(), url, headers, body: body.clone() };

        if let Some(hook) = self.hooks.resolve(provider.auth.oauth_kind(), &provider.api_base) {
            hook.apply(&mut request).await?;
        }

        let recorder = SingleFireRecorder::new(
            self.sink.clone().unwrap_or_else(|| Arc::new(gproxy_provider_core::sink::NoopRecordSink)),
            provider.name.clone(),
            model.to_string(),
            "forward",
            recording::capture_request(
                request.method.as_str(),
                &request.url,
                &request.headers,
                &request.body,
                self.redact_sensitive,
            ),
        );

        let transport_key = TransportKey::for_provider(provider);
        let client_key = ClientKey::for_provider(provider, model);
        let transports = self.transports.clone();
        let pooled = self
            .clients
            .get(provider.dialect, &client_key, move || transports.get(&transport_key))?;

        let mut builder = pooled.transport.client.request(request.method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        builder = builder.body(request.body);

        let response = builder
            .send()
            .await
            .map_err(|err| GatewayError::UpstreamTransport(err.to_string()))?;

        let status = response.status().as_u16();
        let response_headers: Headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|value| (name.as_str().to_string(), value.to_string())))
            .collect();
        let content_type = header_get(&response_headers, "content-type").map(str::to_string);
        let is_antigravity = provider.auth.oauth_kind() == Some(OAuthProviderKind::Antigravity);

        if recording::is_streaming_response(content_type.as_deref()) {
            let translator = Translator::for_pair(upstream_surface, client_surface)?;
            let body_stream = translate_stream(
                response.bytes_stream().boxed(),
                translator,
                is_antigravity,
                recorder,
            );
            return Ok(GatewayResponse::Stream {
                status,
                headers: response_headers,
                body: Box::pin(body_stream),
            });
        }

        if upstream_surface != client_surface {
            return Err(GatewayError::Unsupported(
                "non-streaming cross-dialect translation is not supported; only streaming responses are translated",
            ));
        }

        let mut bytes = response.bytes().await.map_err(|err| GatewayError::UpstreamTransport(err.to_string()))?;
        if is_antigravity {
            bytes = antigravity::unwrap_response_body(&bytes)?;
        }

        if let Some(recorder) = recorder {
            let json_body: Option<serde_json::Value> =
                (!bytes.is_empty()).then(|| serde_json::from_slice(&bytes).ok()).flatten();
            recorder
                .fire(
                    Some(gproxy_provider_core::recorded::RecordedResponse {
                        status,
                        headers: response_headers.clone(),
                        json_body: json_body.clone(),
                        raw_sse_chunks: Vec::new(),
                        assembled_body: json_body,
                    }),
                    None,
                )
                .await;
        }

        Ok(GatewayResponse::Json { status, headers: response_headers, body: bytes })
    }
}

enum Translator {
    ChatToAnthropic(Box<OpenAiChatToAnthropicTranslator>),
    ResponsesToAnthropic(Box<OpenAiResponsesToAnthropicTranslator>),
    AnthropicToChat(Box<AnthropicToOpenAiChatTranslator>),
    AnthropicToResponses(Box<AnthropicToOpenAiResponsesTranslator>),
    Passthrough,
}

impl Translator {
    /// `upstream` is the wire shape this call actually used against the
    /// provider; `client` is the shape the inbound request expects back.
    /// Every ordered pair that mixes an OpenAI surface with Anthropic has a
    /// translator (§4.5); everything else (matching surfaces, or either side
    /// is Google) passes through. There is no direct
    /// Chat-Completions<->Responses translator (§4.5 names exactly four).
    fn for_pair(upstream: Surface, client: Surface) -> Result<Self, GatewayError> {
        use Surface::*;
        Ok(match (upstream, client) {
            (a, b) if a == b => Translator::Passthrough,
            (OpenAiChat, Anthropic) => Translator::ChatToAnthropic(Box::new(OpenAiChatToAnthropicTranslator::new())),
            (OpenAiResponses, Anthropic) => {
                Translator::ResponsesToAnthropic(Box::new(OpenAiResponsesToAnthropicTranslator::new()))
            }
            (Anthropic, OpenAiChat) => Translator::AnthropicToChat(Box::new(AnthropicToOpenAiChatTranslator::new(0))),
            (Anthropic, OpenAiResponses) => {
                Translator::AnthropicToResponses(Box::new(AnthropicToOpenAiResponsesTranslator::new()))
            }
            (Google, _) | (_, Google) => Translator::Passthrough,
            (OpenAiChat, OpenAiResponses) | (OpenAiResponses, OpenAiChat) => {
                return Err(GatewayError::Unsupported(
                    "direct OpenAI Chat-Completions <-> Responses-API translation is not supported",
                ));
            }
        })
    }

    /// Feeds one upstream SSE event, returning zero or more outgoing SSE
    /// frames (already `sse::encode`d) in emission order.
    fn feed(&mut self, event: &sse::SseEvent) -> Result<Vec<String>, GatewayError> {
        match self {
            Translator::Passthrough => Ok(vec![sse::encode(event.event.as_deref(), &event.data)]),
            Translator::ChatToAnthropic(translator) => {
                if event.data.trim() == "[DONE]" {
                    return Ok(Vec::new());
                }
                let chunk: CreateChatCompletionStreamResponse = serde_json::from_str(&event.data)
                    .map_err(|err| GatewayError::ParseMarshal(err.to_string()))?;
                Ok(render_anthropic_events(translator.transform_chunk(chunk)))
            }
            Translator::ResponsesToAnthropic(translator) => {
                let parsed: ResponseStreamEvent =
                    serde_json::from_str(&event.data).map_err(|err| GatewayError::ParseMarshal(err.to_string()))?;
                match translator.transform_event(parsed) {
                    Ok(events) => Ok(render_anthropic_events(events)),
                    Err(err) => Ok(render_anthropic_events(vec![err.event])),
                }
            }
            Translator::AnthropicToChat(translator) => {
                let parsed: StreamEvent =
                    serde_json::from_str(&event.data).map_err(|err| GatewayError::ParseMarshal(err.to_string()))?;
                Ok(translator
                    .transform_event(parsed)
                    .map(|chunk| vec![sse::encode(None, &serde_json::to_string(&chunk).unwrap_or_default())])
                    .unwrap_or_default())
            }
            Translator::AnthropicToResponses(translator) => {
                let parsed: StreamEvent =
                    serde_json::from_str(&event.data).map_err(|err| GatewayError::ParseMarshal(err.to_string()))?;
                Ok(translator
                    .transform_event(parsed)
                    .into_iter()
                    .map(|chunk| sse::encode(None, &serde_json::to_string(&chunk).unwrap_or_default()))
                    .collect())
            }
        }
    }
}

fn render_anthropic_events(events: Vec<StreamEvent>) -> Vec<String> {
    events
        .into_iter()
        .map(|event| {
            let name = event.event_name();
            let data = serde_json::to_string(&event).unwrap_or_default();
            sse::encode(Some(name), &data)
        })
        .collect()
}

struct StreamCtx {
    upstream: Pin<Box<dyn Stream<Item = Result<Bytes, wreq::Error>> + Send>>,
    parser: SseParser,
    translator: Translator,
    pending: VecDeque<Bytes>,
    recorder: Option<Arc<SingleFireRecorder>>,
    buffer: RecordingBuffer,
    status: u16,
    antigravity: bool,
    finished: bool,
}

/// Fires the recorder on a dropped `StreamCtx` that never reached
/// end-of-stream on its own (§8 invariant 7: the sink must still see an
/// exchange when the downstream consumer disconnects mid-stream, not just
/// on a clean EOF). The completion path already takes `recorder` out of
/// this struct once it has fired it, so a `Some` here means the stream was
/// abandoned before finishing.
impl Drop for StreamCtx {
    fn drop(&mut self) {
        let Some(recorder) = self.recorder.take() else { return };
        let raw_sse_chunks = self.buffer.raw_sse_chunks();
        let status = self.status;
        tokio::spawn(async move {
            recorder
                .fire(
                    Some(gproxy_provider_core::recorded::RecordedResponse {
                        status,
                        headers: Vec::new(),
                        json_body: None,
                        raw_sse_chunks,
                        assembled_body: None,
                    }),
                    Some("stream dropped before completion".to_string()),
                )
                .await;
        });
    }
}

/// Drives the translate loop (§4.5.5: "single-threaded per stream"). Built
/// with `stream::unfold` rather than a spawned task, matching the spec's
/// "translation is inline on the handler task" concurrency requirement.
fn translate_stream(
    upstream: Pin<Box<dyn Stream<Item = Result<Bytes, wreq::Error>> + Send>>,
    translator: Translator,
    antigravity: bool,
    recorder: Option<Arc<SingleFireRecorder>>,
) -> impl Stream<Item = Result<Bytes, GatewayError>> {
    let ctx = StreamCtx {
        upstream,
        parser: SseParser::new(),
        translator,
        pending: VecDeque::new(),
        recorder,
        buffer: RecordingBuffer::default(),
        status: 200,
        antigravity,
        finished: false,
    };
    stream::unfold(ctx, |mut ctx| async move {
        loop {
            if let Some(chunk) = ctx.pending.pop_front() {
                return Some((Ok(chunk), ctx));
            }
            if ctx.finished {
                if let Some(recorder) = ctx.recorder.take() {
                    recorder
                        .fire(
                            Some(gproxy_provider_core::recorded::RecordedResponse {
                                status: ctx.status,
                                headers: Vec::new(),
                                json_body: None,
                                raw_sse_chunks: ctx.buffer.raw_sse_chunks(),
                                assembled_body: None,
                            }),
                            None,
                        )
                        .await;
                }
                return None;
            }

            match ctx.upstream.next().await {
                Some(Ok(raw)) => {
                    ctx.buffer.push(&raw);
                    let events = ctx.parser.push_bytes(&raw);
                    push_translated(&mut ctx, events);
                }
                Some(Err(err)) => {
                    ctx.finished = true;
                    let message = GatewayError::UpstreamStream(err.to_string());
                    ctx.pending.push_back(Bytes::from(sse::encode(
                        Some("error"),
                        &serde_json::to_string(&crate::error::stream_error_event(&message)).unwrap_or_default(),
                    )));
                }
                None => {
                    let events = ctx.parser.finish();
                    push_translated(&mut ctx, events);
                    ctx.finished = true;
                }
            }
        }
    })
}

fn push_translated(ctx: &mut StreamCtx, events: Vec<sse::SseEvent>) {
    for mut event in events {
        if ctx.antigravity {
            let line = format!("data: {}", event.data);
            let rewritten = antigravity::unwrap_response_line(&line);
            event.data = rewritten.strip_prefix("data: ").unwrap_or(&rewritten).to_string();
        }
        match ctx.translator.feed(&event) {
            Ok(frames) => ctx.pending.extend(frames.into_iter().map(Bytes::from)),
            Err(err) => {
                ctx.pending.push_back(Bytes::from(sse::encode(
                    Some("error"),
                    &serde_json::to_string(&crate::error::stream_error_event(&err)).unwrap_or_default(),
                )));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_surface_pair_is_passthrough() {
        let translator = Translator::for_pair(Surface::OpenAiChat, Surface::OpenAiChat).unwrap();
        assert!(matches!(translator, Translator::Passthrough));
    }

    #[test]
    fn openai_chat_upstream_to_anthropic_client_picks_chat_translator() {
        let translator = Translator::for_pair(Surface::OpenAiChat, Surface::Anthropic).unwrap();
        assert!(matches!(translator, Translator::ChatToAnthropic(_)));
    }

    #[test]
    fn openai_responses_upstream_to_anthropic_client_picks_responses_translator() {
        let translator = Translator::for_pair(Surface::OpenAiResponses, Surface::Anthropic).unwrap();
        assert!(matches!(translator, Translator::ResponsesToAnthropic(_)));
    }

    #[test]
    fn anthropic_upstream_to_openai_responses_client_picks_anthropic_to_responses_translator() {
        let translator = Translator::for_pair(Surface::Anthropic, Surface::OpenAiResponses).unwrap();
        assert!(matches!(translator, Translator::AnthropicToResponses(_)));
    }

    #[test]
    fn google_upstream_always_passes_through() {
        let translator = Translator::for_pair(Surface::Google, Surface::Anthropic).unwrap();
        assert!(matches!(translator, Translator::Passthrough));
    }

    #[test]
    fn direct_openai_chat_responses_translation_is_unsupported() {
        let result = Translator::for_pair(Surface::OpenAiChat, Surface::OpenAiResponses);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn recorder_fires_when_stream_is_dropped_before_completion() {
        use futures_util::FutureExt;
        use gproxy_provider_core::recorded::RecordedExchange;
        use gproxy_provider_core::sink::RecordSink;
        use std::sync::atomic::{AtomicUsize, Ordering};

        struct CountingSink {
            calls: Arc<AtomicUsize>,
        }

        #[async_trait::async_trait]
        impl RecordSink for CountingSink {
            async fn record_with_scenario(&self, _exchange: RecordedExchange) {
                self.calls.fetch_add(1, Ordering::SeqCst);
            }
            fn is_enabled(&self) -> bool {
                true
            }
        }

        let calls = Arc::new(AtomicUsize::new(0));
        let sink: Arc<dyn RecordSink> = Arc::new(CountingSink { calls: calls.clone() });
        let recorder = recording::SingleFireRecorder::new(
            sink,
            "p",
            "m",
            "stream",
            recording::capture_request("POST", "https://example.test/v1/messages", &[], b"", true),
        );

        let upstream = stream::pending::<Result<Bytes, wreq::Error>>().boxed();
        let translated = translate_stream(upstream, Translator::Passthrough, false, recorder);
        let mut translated = Box::pin(translated);
        // Poll once without blocking so `StreamCtx` is constructed and parked
        // mid-stream, then drop it without ever reaching end-of-stream.
        let _ = translated.as_mut().next().now_or_never();
        drop(translated);

        tokio::task::yield_now().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
