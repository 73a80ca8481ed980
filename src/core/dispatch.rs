//! Request dispatch
//!
//! The dispatcher resolves a model to its provider adapter, serializes the
//! conversation, performs the HTTP exchange, and classifies every failure
//! into a [`DispatchError`]. It never touches conversation state; callers
//! append the reply (or the error text) themselves.

use std::error::Error;
use std::fmt;
use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::core::attachment::Attachment;
use crate::core::config::Config;
use crate::core::message::Message;
use crate::core::providers::{error_message, ProviderRegistry};

/// Default bound on a single provider round trip.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug)]
pub enum DispatchError {
    /// No registered provider owns the model; nothing was sent.
    UnknownModel(String),
    /// There is no message to send.
    EmptyConversation,
    /// The request body could not be serialized.
    RequestEncode { detail: String },
    /// Transport failure: connection refused, DNS, TLS, timeout.
    Network(reqwest::Error),
    /// The response body was not the JSON envelope we expected.
    ResponseParse { detail: String },
    /// The provider reported a failure.
    Provider {
        status: Option<u16>,
        message: String,
    },
}

impl DispatchError {
    pub fn status(&self) -> Option<u16> {
        match self {
            DispatchError::Provider { status, .. } => *status,
            _ => None,
        }
    }
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::UnknownModel(model) => write!(
                f,
                "Unknown model '{model}': no provider is registered for it"
            ),
            DispatchError::EmptyConversation => write!(f, "There is no message to send"),
            DispatchError::RequestEncode { detail } => {
                write!(f, "Failed to build request: {detail}")
            }
            DispatchError::Network(_) => write!(
                f,
                "Network error: Please check your internet connection and API key"
            ),
            DispatchError::ResponseParse { .. } => {
                write!(f, "Failed to parse response: Invalid API response")
            }
            DispatchError::Provider { message, .. } => write!(f, "{message}"),
        }
    }
}

impl Error for DispatchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            DispatchError::Network(err) => Some(err),
            _ => None,
        }
    }
}

/// Sends conversations to whichever provider owns the selected model.
#[derive(Clone)]
pub struct Dispatcher {
    client: Client,
    registry: ProviderRegistry,
}

impl Dispatcher {
    pub fn new(registry: ProviderRegistry, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, registry })
    }

    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        Self::new(
            ProviderRegistry::from_config(config),
            config.request_timeout(),
        )
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Send `history` to the provider owning `model` and return the reply text.
    pub async fn send(
        &self,
        model: &str,
        secret_key: &str,
        history: &[Message],
        pending: &[Attachment],
    ) -> Result<String, DispatchError> {
        let adapter = self.registry.resolve(model)?;
        let body = adapter.build_request(history, pending, model)?;
        let endpoint = adapter.endpoint(model);
        let headers = adapter.headers(secret_key);
        let header_names: Vec<&str> = headers.iter().map(|(name, _)| *name).collect();

        info!(
            provider = adapter.id(),
            endpoint = %endpoint,
            model,
            headers = ?header_names,
            message_count = history.len(),
            has_attachments = !pending.is_empty(),
            "dispatching chat request"
        );

        let request = headers
            .iter()
            .fold(self.client.post(&endpoint), |request, (name, value)| {
                request.header(*name, value)
            });

        let response = request.json(&body).send().await.map_err(|err| {
            warn!(provider = adapter.id(), "network error: {err}");
            DispatchError::Network(err)
        })?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(DispatchError::Network)?;
        let parsed = serde_json::from_slice::<Value>(&bytes);

        if !status.is_success() {
            let message = parsed
                .as_ref()
                .ok()
                .and_then(error_message)
                .unwrap_or_else(|| format!("Status {}", status.as_u16()));
            debug!(
                provider = adapter.id(),
                status = status.as_u16(),
                body = %String::from_utf8_lossy(&bytes),
                "provider returned an error response"
            );
            return Err(DispatchError::Provider {
                status: Some(status.as_u16()),
                message,
            });
        }

        let parsed = parsed.map_err(|err| {
            warn!(provider = adapter.id(), "unparseable response: {err}");
            DispatchError::ResponseParse {
                detail: err.to_string(),
            }
        })?;

        debug!(
            provider = adapter.id(),
            status = status.as_u16(),
            "provider responded"
        );
        adapter.extract_response(&parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::attachment::AttachmentPayload;
    use crate::utils::test_utils::{refused_base_url, serve_once, silent_base_url};

    fn dispatcher_for(provider: &str, base_url: &str) -> Dispatcher {
        let mut config = Config::default();
        config
            .base_urls
            .insert(provider.to_string(), base_url.to_string());
        Dispatcher::from_config(&config).expect("client builds")
    }

    #[tokio::test]
    async fn openai_round_trip_sends_full_history() {
        let (base_url, server) = serve_once(
            200,
            r#"{"choices":[{"message":{"role":"assistant","content":"4"}}]}"#,
        )
        .await;
        let dispatcher = dispatcher_for("openai", &base_url);
        let history = vec![Message::user("2+2?", vec![])];

        let reply = dispatcher
            .send("gpt-4o", "sk-test", &history, &[])
            .await
            .expect("reply");
        assert_eq!(reply, "4");

        let captured = server.await.unwrap();
        assert_eq!(
            captured.request_line(),
            "POST /v1/chat/completions HTTP/1.1"
        );
        assert_eq!(captured.header("authorization"), Some("Bearer sk-test"));
        assert_eq!(captured.body["model"], "gpt-4o");
        assert_eq!(
            captured.body["messages"],
            serde_json::json!([{"role": "user", "content": "2+2?"}])
        );
    }

    #[tokio::test]
    async fn anthropic_receives_only_last_message() {
        let (base_url, server) =
            serve_once(200, r#"{"content":[{"type":"text","text":"five!"}]}"#).await;
        let dispatcher = dispatcher_for("anthropic", &base_url);
        let history: Vec<_> = ["one", "two", "three", "four", "five"]
            .iter()
            .enumerate()
            .map(|(index, text)| {
                if index % 2 == 0 {
                    Message::user(*text, vec![])
                } else {
                    Message::assistant(*text)
                }
            })
            .collect();

        let reply = dispatcher
            .send("claude-3-5-sonnet-latest", "sk-ant", &history, &[])
            .await
            .unwrap();
        assert_eq!(reply, "five!");

        let captured = server.await.unwrap();
        assert_eq!(captured.request_line(), "POST /v1/messages HTTP/1.1");
        assert_eq!(captured.header("x-api-key"), Some("sk-ant"));
        assert!(captured.header("anthropic-version").is_some());
        assert_eq!(
            captured.body["messages"],
            serde_json::json!([{"role": "user", "content": "five"}])
        );
    }

    #[tokio::test]
    async fn google_request_targets_model_path_with_inline_data() {
        let (base_url, server) = serve_once(
            200,
            r#"{"candidates":[{"content":{"parts":[{"text":"a cat"}]}}]}"#,
        )
        .await;
        let dispatcher = dispatcher_for("google", &base_url);
        let image = Attachment {
            name: "cat.gif".into(),
            mime_type: "image/gif".into(),
            size_bytes: 3,
            payload: AttachmentPayload::DataUrl("data:image/gif;base64,R0lG".into()),
        };
        let history = vec![Message::user("what is it?", vec![image.clone()])];

        let reply = dispatcher
            .send("gemini-1.5-pro", "AIza", &history, &[image])
            .await
            .unwrap();
        assert_eq!(reply, "a cat");

        let captured = server.await.unwrap();
        assert_eq!(
            captured.request_line(),
            "POST /v1/models/gemini-1.5-pro:generateContent HTTP/1.1"
        );
        assert_eq!(captured.header("x-goog-api-key"), Some("AIza"));
        assert_eq!(
            captured.body["contents"][0]["parts"][1]["inlineData"]["data"],
            "R0lG"
        );
    }

    #[tokio::test]
    async fn error_status_surfaces_provider_message() {
        let (base_url, server) = serve_once(429, r#"{"error":{"message":"rate limited"}}"#).await;
        let dispatcher = dispatcher_for("openai", &base_url);

        let err = dispatcher
            .send("gpt-4o", "sk", &[Message::user("hi", vec![])], &[])
            .await
            .unwrap_err();
        server.await.unwrap();

        match &err {
            DispatchError::Provider { status, message } => {
                assert_eq!(*status, Some(429));
                assert_eq!(message, "rate limited");
            }
            other => panic!("expected provider error, got {other:?}"),
        }
        assert_eq!(err.to_string(), "rate limited");
    }

    #[tokio::test]
    async fn error_status_falls_back_to_top_level_message_then_status() {
        let (base_url, server) = serve_once(401, r#"{"message":"bad key"}"#).await;
        let err = dispatcher_for("google", &base_url)
            .send("gemini-1.5-pro", "k", &[Message::user("hi", vec![])], &[])
            .await
            .unwrap_err();
        server.await.unwrap();
        assert_eq!(err.to_string(), "bad key");

        let (base_url, server) = serve_once(502, "<html>bad gateway</html>").await;
        let err = dispatcher_for("google", &base_url)
            .send("gemini-1.5-pro", "k", &[Message::user("hi", vec![])], &[])
            .await
            .unwrap_err();
        server.await.unwrap();
        assert_eq!(err.to_string(), "Status 502");
        assert_eq!(err.status(), Some(502));
    }

    #[tokio::test]
    async fn malformed_success_body_is_a_parse_error() {
        let (base_url, server) = serve_once(200, "not json").await;
        let err = dispatcher_for("openai", &base_url)
            .send("gpt-4o", "sk", &[Message::user("hi", vec![])], &[])
            .await
            .unwrap_err();
        server.await.unwrap();

        assert!(matches!(err, DispatchError::ResponseParse { .. }));
        assert_eq!(
            err.to_string(),
            "Failed to parse response: Invalid API response"
        );
    }

    #[tokio::test]
    async fn embedded_error_on_success_status_is_a_provider_error() {
        let (base_url, server) = serve_once(
            200,
            r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#,
        )
        .await;
        let err = dispatcher_for("anthropic", &base_url)
            .send("claude-2", "sk", &[Message::user("hi", vec![])], &[])
            .await
            .unwrap_err();
        server.await.unwrap();

        assert!(matches!(err, DispatchError::Provider { status: None, .. }));
        assert_eq!(err.to_string(), "Overloaded");
    }

    #[tokio::test]
    async fn connection_failure_is_a_network_error() {
        let base_url = refused_base_url().await;
        let err = dispatcher_for("openai", &base_url)
            .send("gpt-4o", "sk", &[Message::user("hi", vec![])], &[])
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::Network(_)));
        assert!(err.to_string().contains("check your internet connection"));
        assert!(err.source().is_some());
    }

    #[tokio::test]
    async fn request_timeout_is_a_network_error() {
        let (base_url, server) = silent_base_url().await;
        let mut config = Config {
            request_timeout_secs: Some(1),
            ..Default::default()
        };
        config.base_urls.insert("openai".to_string(), base_url);
        let dispatcher = Dispatcher::from_config(&config).unwrap();

        let err = dispatcher
            .send("gpt-4o", "sk", &[Message::user("hi", vec![])], &[])
            .await
            .unwrap_err();
        server.abort();

        match &err {
            DispatchError::Network(source) => assert!(source.is_timeout(), "{source:?}"),
            other => panic!("expected network error, got {other:?}"),
        }
        assert_eq!(
            err.to_string(),
            "Network error: Please check your internet connection and API key"
        );
    }

    #[tokio::test]
    async fn unknown_model_fails_before_any_request() {
        let dispatcher = dispatcher_for("openai", "http://127.0.0.1:9");
        let err = dispatcher
            .send("llama-2", "sk", &[Message::user("hi", vec![])], &[])
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::UnknownModel(ref model) if model == "llama-2"));
    }
}
