use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use ring::hmac;

use super::TransportError;

/// Собирает токен `SharedAccessSignature` для `resource_uri`, действующий до `expiry` (unix, сек).
pub fn generate_sas_token(
    resource_uri: &str,
    shared_access_key: &str,
    expiry: i64,
) -> Result<String, TransportError> {
    let key_bytes = STANDARD
        .decode(shared_access_key)
        .map_err(|e| TransportError::Token(format!("shared access key is not base64: {}", e)))?;

    let encoded_uri = urlencoding::encode(resource_uri);
    let to_sign = format!("{}\n{}", encoded_uri, expiry);

    let key = hmac::Key::new(hmac::HMAC_SHA256, &key_bytes);
    let signature = STANDARD.encode(hmac::sign(&key, to_sign.as_bytes()).as_ref());

    Ok(format!(
        "SharedAccessSignature sr={}&sig={}&se={}",
        encoded_uri,
        urlencoding::encode(&signature),
        expiry
    ))
}
