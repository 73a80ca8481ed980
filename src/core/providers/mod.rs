//! Provider adapters
//!
//! Each supported LLM vendor is described by one [`ProviderAdapter`]: which
//! model identifiers it owns, how a conversation becomes that vendor's
//! request body, which headers carry the secret key, where the request goes,
//! and how the reply text is pulled back out of the response envelope.
//!
//! Adapters are stateless after construction and are shared read-only by the
//! dispatcher through the [`ProviderRegistry`].

pub mod anthropic;
pub mod google;
pub mod openai;
pub mod registry;

use serde_json::Value;

use crate::core::attachment::Attachment;
use crate::core::dispatch::DispatchError;
use crate::core::message::Message;

pub use anthropic::AnthropicAdapter;
pub use google::GoogleAdapter;
pub use openai::OpenAiAdapter;
pub use registry::ProviderRegistry;

/// Default `max_tokens` sent to providers that require it.
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

pub trait ProviderAdapter: Send + Sync {
    /// Stable lowercase identifier (`openai`, `anthropic`, `google`).
    fn id(&self) -> &'static str;

    fn display_name(&self) -> &'static str;

    /// Models offered for selection, in display order.
    fn model_options(&self) -> &'static [&'static str];

    /// Whether this adapter serves `model`.
    fn owns_model(&self, model: &str) -> bool;

    /// Serialize the conversation into the provider's request body.
    ///
    /// `pending` are the attachments submitted with the newest message; they
    /// are used for that message when it does not carry its own copy.
    fn build_request(
        &self,
        history: &[Message],
        pending: &[Attachment],
        model: &str,
    ) -> Result<Value, DispatchError>;

    /// Request headers, including authentication.
    fn headers(&self, secret_key: &str) -> Vec<(&'static str, String)>;

    fn endpoint(&self, model: &str) -> String;

    /// Pull the assistant text out of a successful response body.
    fn extract_response(&self, body: &Value) -> Result<String, DispatchError>;
}

/// Attachments that belong to `message` when serialized at `index`.
pub(crate) fn attachments_for<'a>(
    history: &'a [Message],
    index: usize,
    pending: &'a [Attachment],
) -> &'a [Attachment] {
    let message = &history[index];
    let is_last = index + 1 == history.len();
    if is_last && message.role.is_user() && message.attachments.is_empty() {
        pending
    } else {
        message.attachments.as_slice()
    }
}

/// The newest message, which single-turn providers send on its own.
pub(crate) fn last_message(history: &[Message]) -> Result<(usize, &Message), DispatchError> {
    history
        .len()
        .checked_sub(1)
        .map(|index| (index, &history[index]))
        .ok_or(DispatchError::EmptyConversation)
}

/// Blank message text is left out of multi-part content.
pub(crate) fn has_text(content: &str) -> bool {
    !content.trim().is_empty()
}

/// Text block used to inline a decoded text attachment.
pub(crate) fn text_attachment_block(attachment: &Attachment, text: &str) -> String {
    format!("[{}]\n{}", attachment.name, text)
}

/// Provider-reported error text, checking `error.message` then `message`.
pub fn error_message(body: &Value) -> Option<String> {
    body.pointer("/error/message")
        .and_then(Value::as_str)
        .or_else(|| body.get("error").and_then(Value::as_str))
        .or_else(|| body.get("message").and_then(Value::as_str))
        .map(str::to_owned)
}

/// Fetch a string at `pointer`, failing with the embedded provider error if
/// the envelope carries one, or a parse error otherwise.
pub(crate) fn extract_text(body: &Value, pointer: &str) -> Result<String, DispatchError> {
    if body.get("error").is_some_and(|error| !error.is_null()) {
        return Err(DispatchError::Provider {
            status: None,
            message: error_message(body).unwrap_or_else(|| body["error"].to_string()),
        });
    }

    body.pointer(pointer)
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| DispatchError::ResponseParse {
            detail: format!("missing {pointer}"),
        })
}
