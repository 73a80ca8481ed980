//! Anthropic messages adapter
//!
//! Single-turn framing: only the newest message is sent, with its attachments
//! inlined as base64 content blocks.

use serde::Serialize;
use serde_json::Value;

use super::{
    attachments_for, extract_text, has_text, last_message, text_attachment_block, ProviderAdapter,
};
use crate::core::attachment::{Attachment, AttachmentPayload};
use crate::core::dispatch::DispatchError;
use crate::core::message::Message;
use crate::utils::url::construct_api_url;

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_API_VERSION: &str = "2023-06-01";

const MODEL_OPTIONS: &[&str] = &["claude-2", "claude-3-5-sonnet-latest"];

pub struct AnthropicAdapter {
    base_url: String,
    api_version: String,
    max_tokens: u32,
}

impl AnthropicAdapter {
    pub fn new(
        base_url: impl Into<String>,
        api_version: impl Into<String>,
        max_tokens: u32,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            api_version: api_version.into(),
            max_tokens,
        }
    }
}

#[derive(Serialize)]
struct Request<'a> {
    model: &'a str,
    messages: [RequestMessage<'a>; 1],
    max_tokens: u32,
}

#[derive(Serialize)]
struct RequestMessage<'a> {
    role: &'static str,
    content: RequestContent<'a>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum RequestContent<'a> {
    Text(&'a str),
    Blocks(Vec<ContentBlock<'a>>),
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock<'a> {
    Text { text: String },
    Image { source: Base64Source<'a> },
    Document { source: Base64Source<'a> },
}

#[derive(Serialize)]
struct Base64Source<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    media_type: &'a str,
    data: &'a str,
}

fn attachment_block(attachment: &Attachment) -> ContentBlock<'_> {
    match &attachment.payload {
        AttachmentPayload::Text(text) => ContentBlock::Text {
            text: text_attachment_block(attachment, text),
        },
        AttachmentPayload::DataUrl(_) => {
            let source = Base64Source {
                kind: "base64",
                media_type: &attachment.mime_type,
                data: attachment.base64_data().unwrap_or_default(),
            };
            if attachment.is_image() {
                ContentBlock::Image { source }
            } else {
                ContentBlock::Document { source }
            }
        }
    }
}

impl ProviderAdapter for AnthropicAdapter {
    fn id(&self) -> &'static str {
        "anthropic"
    }

    fn display_name(&self) -> &'static str {
        "Anthropic"
    }

    fn model_options(&self) -> &'static [&'static str] {
        MODEL_OPTIONS
    }

    fn owns_model(&self, model: &str) -> bool {
        model.starts_with("claude")
    }

    fn build_request(
        &self,
        history: &[Message],
        pending: &[Attachment],
        model: &str,
    ) -> Result<Value, DispatchError> {
        let (index, last) = last_message(history)?;
        let attachments = attachments_for(history, index, pending);

        let content = if attachments.is_empty() {
            RequestContent::Text(&last.content)
        } else {
            let mut blocks = Vec::new();
            if has_text(&last.content) {
                blocks.push(ContentBlock::Text {
                    text: last.content.clone(),
                });
            }
            blocks.extend(attachments.iter().map(attachment_block));
            RequestContent::Blocks(blocks)
        };

        let request = Request {
            model,
            messages: [RequestMessage {
                role: if last.role.is_user() {
                    "user"
                } else {
                    "assistant"
                },
                content,
            }],
            max_tokens: self.max_tokens,
        };
        serde_json::to_value(request).map_err(|err| DispatchError::RequestEncode {
            detail: err.to_string(),
        })
    }

    fn headers(&self, secret_key: &str) -> Vec<(&'static str, String)> {
        vec![
            ("x-api-key", secret_key.to_string()),
            ("anthropic-version", self.api_version.clone()),
            ("content-type", "application/json".to_string()),
        ]
    }

    fn endpoint(&self, _model: &str) -> String {
        construct_api_url(&self.base_url, "v1/messages")
    }

    fn extract_response(&self, body: &Value) -> Result<String, DispatchError> {
        extract_text(body, "/content/0/text")
    }
}
