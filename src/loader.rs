use percent_encoding::percent_decode_str;

use crate::error::AccessError;
use crate::types::PolicyDocument;

/// Decode a policy document as returned by the identity provider.
///
/// Stored policy versions come back URL query-encoded: `+` stands for a
/// space and every other reserved byte is `%XX`. The decoded text must be
/// valid UTF-8.
///
/// Example:
/// ```rust
/// use registry_access_core::decode_provider_document;
/// let text = decode_provider_document("%7B%22Version%22%3A+%222012-10-17%22%7D").unwrap();
/// assert_eq!(text, r#"{"Version": "2012-10-17"}"#);
/// ```
pub fn decode_provider_document(encoded: &str) -> Result<String, AccessError> {
    let spaced = encoded.replace('+', " ");
    percent_decode_str(&spaced)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|e| AccessError::MalformedDocument(format!("undecodable document: {e}")))
}

/// Decode then parse a provider-encoded policy document.
pub fn parse_provider_document(encoded: &str) -> Result<PolicyDocument, AccessError> {
    PolicyDocument::from_json(&decode_provider_document(encoded)?)
}
