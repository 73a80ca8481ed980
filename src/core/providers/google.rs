//! Google Gemini `generateContent` adapter. Sends only the newest message.

use serde::Serialize;
use serde_json::Value;

use super::{
    attachments_for, extract_text, has_text, last_message, text_attachment_block, ProviderAdapter,
};
use crate::core::attachment::{Attachment, AttachmentPayload};
use crate::core::dispatch::DispatchError;
use crate::core::message::Message;
use crate::utils::url::construct_api_url;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

const MODEL_OPTIONS: &[&str] = &["gemini-1.5-pro"];

pub struct GoogleAdapter {
    base_url: String,
}

impl GoogleAdapter {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

#[derive(Serialize)]
struct Request<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text {
        text: String,
    },
    #[serde(rename_all = "camelCase")]
    InlineData {
        inline_data: InlineData<'a>,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

fn attachment_part(attachment: &Attachment) -> Part<'_> {
    match &attachment.payload {
        AttachmentPayload::Text(text) => Part::Text {
            text: text_attachment_block(attachment, text),
        },
        AttachmentPayload::DataUrl(_) => Part::InlineData {
            inline_data: InlineData {
                mime_type: &attachment.mime_type,
                data: attachment.base64_data().unwrap_or_default(),
            },
        },
    }
}

impl ProviderAdapter for GoogleAdapter {
    fn id(&self) -> &'static str {
        "google"
    }

    fn display_name(&self) -> &'static str {
        "Google"
    }

    fn model_options(&self) -> &'static [&'static str] {
        MODEL_OPTIONS
    }

    fn owns_model(&self, model: &str) -> bool {
        model.starts_with("gemini")
    }

    fn build_request(
        &self,
        history: &[Message],
        pending: &[Attachment],
        _model: &str,
    ) -> Result<Value, DispatchError> {
        let (index, last) = last_message(history)?;
        let attachments = attachments_for(history, index, pending);

        let mut parts = Vec::new();
        if has_text(&last.content) || attachments.is_empty() {
            parts.push(Part::Text {
                text: last.content.clone(),
            });
        }
        parts.extend(attachments.iter().map(attachment_part));

        let request = Request {
            contents: [Content {
                role: if last.role.is_user() { "user" } else { "model" },
                parts,
            }],
        };
        serde_json::to_value(request).map_err(|err| DispatchError::RequestEncode {
            detail: err.to_string(),
        })
    }

    fn headers(&self, secret_key: &str) -> Vec<(&'static str, String)> {
        vec![
            ("Content-Type", "application/json".to_string()),
            ("x-goog-api-key", secret_key.to_string()),
        ]
    }

    fn endpoint(&self, model: &str) -> String {
        construct_api_url(
            &self.base_url,
            &format!("v1/models/{model}:generateContent"),
        )
    }

    fn extract_response(&self, body: &Value) -> Result<String, DispatchError> {
        extract_text(body, "/candidates/0/content/parts/0/text")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn adapter() -> GoogleAdapter {
        GoogleAdapter::new(DEFAULT_BASE_URL)
    }

    #[test]
    fn sends_last_message_as_parts() {
        let history = vec![
            Message::user("hello", vec![]),
            Message::assistant("hi"),
            Message::user("what's in the clip?", vec![]),
        ];
        let pending = vec![Attachment {
            name: "clip.webm".into(),
            mime_type: "video/webm".into(),
            size_bytes: 4,
            payload: AttachmentPayload::DataUrl("data:video/webm;base64,GkXf".into()),
        }];

        let body = adapter()
            .build_request(&history, &pending, "gemini-1.5-pro")
            .unwrap();

        assert_eq!(
            body,
            json!({
                "contents": [{
                    "role": "user",
                    "parts": [
                        {"text": "what's in the clip?"},
                        {"inlineData": {"mimeType": "video/webm", "data": "GkXf"}}
                    ]
                }]
            })
        );
    }

    #[test]
    fn assistant_turns_use_model_role() {
        let body = adapter()
            .build_request(&[Message::assistant("ok")], &[], "gemini-1.5-pro")
            .unwrap();
        assert_eq!(body["contents"][0]["role"], "model");
        assert_eq!(body["contents"][0]["parts"], json!([{"text": "ok"}]));
    }

    #[test]
    fn attachment_only_message_sends_just_the_data() {
        let shot = Attachment {
            name: "shot.png".into(),
            mime_type: "image/png".into(),
            size_bytes: 3,
            payload: AttachmentPayload::DataUrl("data:image/png;base64,iVBO".into()),
        };
        let history = vec![Message::user("", vec![shot])];

        let body = adapter()
            .build_request(&history, &[], "gemini-1.5-pro")
            .unwrap();

        assert_eq!(
            body["contents"][0]["parts"],
            json!([{"inlineData": {"mimeType": "image/png", "data": "iVBO"}}])
        );
    }

    #[test]
    fn endpoint_embeds_model_name() {
        assert_eq!(
            adapter().endpoint("gemini-1.5-flash"),
            "https://generativelanguage.googleapis.com/v1/models/gemini-1.5-flash:generateContent"
        );
    }

    #[test]
    fn headers_use_goog_api_key() {
        assert!(adapter()
            .headers("AIza")
            .contains(&("x-goog-api-key", "AIza".to_string())));
    }

    #[test]
    fn extracts_first_candidate_text() {
        let body = json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": "Bonjour"}]}}]
        });
        assert_eq!(adapter().extract_response(&body).unwrap(), "Bonjour");
    }
}
