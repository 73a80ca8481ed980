//! `data:` URL helpers for inline attachment payloads.

use base64::Engine;

/// Encode raw bytes as a base64 `data:` URL.
pub fn encode_data_url(mime_type: &str, bytes: &[u8]) -> String {
    let encoded = base64::prelude::BASE64_STANDARD.encode(bytes);
    format!("data:{mime_type};base64,{encoded}")
}

/// Return the base64 payload that follows the comma of a data URL.
///
/// Providers that take raw base64 (Anthropic, Google) want only this part.
pub fn base64_payload(data_url: &str) -> Option<&str> {
    let rest = data_url.strip_prefix("data:")?;
    let (header, payload) = rest.split_once(',')?;
    if !header.ends_with(";base64") {
        return None;
    }
    Some(payload)
}

/// Decode a data URL back into bytes.
pub fn decode_data_url(data_url: &str) -> Option<Vec<u8>> {
    let payload = base64_payload(data_url)?;
    base64::prelude::BASE64_STANDARD.decode(payload).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_with_mime_header() {
        let url = encode_data_url("image/png", b"\x89PNG");
        assert_eq!(url, "data:image/png;base64,iVBORw==");
    }

    #[test]
    fn payload_is_everything_after_comma() {
        assert_eq!(
            base64_payload("data:application/pdf;base64,JVBERi0="),
            Some("JVBERi0=")
        );
        assert_eq!(base64_payload("data:text/plain,hello"), None);
        assert_eq!(base64_payload("https://example.com/a.png"), None);
    }

    #[test]
    fn decode_recovers_encoded_bytes() {
        let url = encode_data_url("audio/wav", b"RIFF\x00\x01");
        assert_eq!(decode_data_url(&url).unwrap(), b"RIFF\x00\x01");
    }
}
