//! URL utilities for provider endpoints
//!
//! Provider base URLs may come from configuration with or without trailing
//! slashes; these helpers keep endpoint construction free of double slashes.

/// Normalize a base URL by removing trailing slashes
///
/// # Examples
///
/// ```
/// use multichat::utils::url::normalize_base_url;
///
/// assert_eq!(normalize_base_url("https://api.openai.com/v1/"), "https://api.openai.com/v1");
/// assert_eq!(normalize_base_url("http://127.0.0.1:8080///"), "http://127.0.0.1:8080");
/// ```
pub fn normalize_base_url(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}

/// Join a provider base URL and an endpoint path
///
/// # Examples
///
/// ```
/// use multichat::utils::url::construct_api_url;
///
/// assert_eq!(
///     construct_api_url("https://api.anthropic.com/", "/v1/messages"),
///     "https://api.anthropic.com/v1/messages"
/// );
/// ```
pub fn construct_api_url(base_url: &str, endpoint: &str) -> String {
    let normalized_base = normalize_base_url(base_url);
    let endpoint = endpoint.trim_start_matches('/');
    format!("{}/{}", normalized_base, endpoint)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_every_trailing_slash() {
        assert_eq!(
            normalize_base_url("https://generativelanguage.googleapis.com"),
            "https://generativelanguage.googleapis.com"
        );
        assert_eq!(
            normalize_base_url("https://api.openai.com/v1///"),
            "https://api.openai.com/v1"
        );
        assert_eq!(normalize_base_url("///"), "");
    }

    #[test]
    fn construct_joins_with_single_slash() {
        assert_eq!(
            construct_api_url("https://api.openai.com/v1", "chat/completions"),
            "https://api.openai.com/v1/chat/completions"
        );
        assert_eq!(
            construct_api_url(
                "https://generativelanguage.googleapis.com/",
                "/v1/models/gemini-1.5-pro:generateContent"
            ),
            "https://generativelanguage.googleapis.com/v1/models/gemini-1.5-pro:generateContent"
        );
    }
}
