//! Share links for generated recipes

/// Messaging share endpoint; the encoded text is appended as-is
pub const SHARE_BASE_URL: &str = "https://wa.me/?text=";

/// Share link carrying the full recipe text
pub fn share_url(text: &str) -> String {
    format!("{}{}", SHARE_BASE_URL, urlencoding::encode(text))
}
