//! OpenAI chat-completions adapter. Sends the whole history every turn.

use serde::Serialize;
use serde_json::Value;

use super::{attachments_for, extract_text, has_text, text_attachment_block, ProviderAdapter};
use crate::core::attachment::{Attachment, AttachmentPayload};
use crate::core::dispatch::DispatchError;
use crate::core::message::Message;
use crate::utils::url::construct_api_url;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";

const MODEL_OPTIONS: &[&str] = &["gpt-4o", "chatgpt-4o-latest"];

pub struct OpenAiAdapter {
    base_url: String,
    max_tokens: u32,
}

impl OpenAiAdapter {
    pub fn new(base_url: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            base_url: base_url.into(),
            max_tokens,
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: ChatContent<'a>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum ChatContent<'a> {
    Text(&'a str),
    Parts(Vec<ContentPart<'a>>),
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: String },
    ImageUrl { image_url: ImageUrl<'a> },
    File { file: FileData<'a> },
}

#[derive(Serialize)]
struct ImageUrl<'a> {
    url: &'a str,
    detail: &'static str,
}

#[derive(Serialize)]
struct FileData<'a> {
    filename: &'a str,
    file_data: &'a str,
}

fn attachment_part(attachment: &Attachment) -> ContentPart<'_> {
    match &attachment.payload {
        AttachmentPayload::Text(text) => ContentPart::Text {
            text: text_attachment_block(attachment, text),
        },
        AttachmentPayload::DataUrl(url) if attachment.is_image() => ContentPart::ImageUrl {
            image_url: ImageUrl {
                url,
                detail: "high",
            },
        },
        AttachmentPayload::DataUrl(url) => ContentPart::File {
            file: FileData {
                filename: &attachment.name,
                file_data: url,
            },
        },
    }
}

impl ProviderAdapter for OpenAiAdapter {
    fn id(&self) -> &'static str {
        "openai"
    }

    fn display_name(&self) -> &'static str {
        "OpenAI"
    }

    fn model_options(&self) -> &'static [&'static str] {
        MODEL_OPTIONS
    }

    fn owns_model(&self, model: &str) -> bool {
        model.starts_with("gpt") || MODEL_OPTIONS.contains(&model)
    }

    fn build_request(
        &self,
        history: &[Message],
        pending: &[Attachment],
        model: &str,
    ) -> Result<Value, DispatchError> {
        if history.is_empty() {
            return Err(DispatchError::EmptyConversation);
        }

        let messages = history
            .iter()
            .enumerate()
            .map(|(index, message)| {
                let attachments = attachments_for(history, index, pending);
                let content = if attachments.is_empty() {
                    ChatContent::Text(&message.content)
                } else {
                    let mut parts = Vec::new();
                    if has_text(&message.content) {
                        parts.push(ContentPart::Text {
                            text: message.content.clone(),
                        });
                    }
                    parts.extend(attachments.iter().map(attachment_part));
                    ChatContent::Parts(parts)
                };
                ChatMessage {
                    role: message.role.as_str(),
                    content,
                }
            })
            .collect();

        let request = ChatRequest {
            model,
            messages,
            max_tokens: self.max_tokens,
        };
        serde_json::to_value(request).map_err(|err| DispatchError::RequestEncode {
            detail: err.to_string(),
        })
    }

    fn headers(&self, secret_key: &str) -> Vec<(&'static str, String)> {
        vec![
            ("Authorization", format!("Bearer {secret_key}")),
            ("Content-Type", "application/json".to_string()),
        ]
    }

    fn endpoint(&self, _model: &str) -> String {
        construct_api_url(&self.base_url, "v1/chat/completions")
    }

    fn extract_response(&self, body: &Value) -> Result<String, DispatchError> {
        extract_text(body, "/choices/0/message/content")
    }
}
