//! Azure Speech Services authentication helpers.
//!
//! Narration authenticates every request (probes and synthesis) with the
//! subscription key header. The key is the secret the whole session hangs on,
//! so it is only ever logged through [`mask_subscription_key`].

/// The HTTP header name for Azure subscription key authentication.
pub const AZURE_SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

/// Build the subscription key header value.
///
/// The value is the key itself with surrounding whitespace removed; keys pasted
/// from the Azure portal frequently carry a trailing newline.
#[inline]
pub fn build_subscription_key_header(api_key: &str) -> &str {
    api_key.trim()
}

/// Mask a subscription key for logging, keeping only the last four characters.
///
/// ```rust
/// use narrator::core::providers::azure::mask_subscription_key;
///
/// assert_eq!(mask_subscription_key("0123456789abcdef"), "****cdef");
/// assert_eq!(mask_subscription_key("abc"), "****");
/// ```
pub fn mask_subscription_key(api_key: &str) -> String {
    let key = api_key.trim();
    let count = key.chars().count();
    if count <= 4 {
        return "****".to_string();
    }
    let tail: String = key.chars().skip(count - 4).collect();
    format!("****{tail}")
}
