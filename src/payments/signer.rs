use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Field that carries the provider signature inside some webhook bodies. It is
/// never part of the signed content.
const SIGNATURE_FIELD: &str = "signature";

/// Canonical JSON: object keys sorted, no insignificant whitespace.
///
/// `serde_json::Map` is a `BTreeMap` unless `preserve_order` is enabled, so a
/// plain compact serialization already has stable key order at every depth.
pub fn canonical_json(payload: &Value) -> String {
    payload.to_string()
}

/// Signs provider requests and checks provider callbacks with the merchant secret.
#[derive(Clone)]
pub struct RequestSigner {
    merchant_id: String,
    secret: String,
}

impl RequestSigner {
    pub fn new(merchant_id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            merchant_id: merchant_id.into(),
            secret: secret.into(),
        }
    }

    pub fn merchant_id(&self) -> &str {
        &self.merchant_id
    }

    /// Lowercase hex HMAC-SHA256 over the canonical serialization of `payload`.
    pub fn sign(&self, payload: &Value) -> String {
        self.sign_str(&canonical_json(payload))
    }

    fn sign_str(&self, data: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(data.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Value for the `X-Auth` header of an outbound request.
    pub fn auth_header(&self, payload: &Value) -> String {
        format!("{}:{}", self.merchant_id, self.sign(payload))
    }

    /// Checks a callback body against the signature the provider supplied.
    ///
    /// Any `signature` field inside the body is removed before the digest is
    /// recomputed. Returns false for anything that is not a JSON object.
    pub fn verify_webhook(&self, raw_payload: &[u8], supplied_signature: &str) -> bool {
        let supplied = supplied_signature.trim().to_ascii_lowercase();
        if supplied.is_empty() {
            return false;
        }

        let mut payload: Value = match serde_json::from_slice(raw_payload) {
            Ok(value) => value,
            Err(_) => return false,
        };

        let Some(object) = payload.as_object_mut() else {
            return false;
        };
        object.remove(SIGNATURE_FIELD);

        let expected = self.sign(&payload);
        expected.as_bytes().ct_eq(supplied.as_bytes()).into()
    }
}

impl std::fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestSigner")
            .field("merchant_id", &self.merchant_id)
            .field("secret", &"<redacted>")
            .finish()
    }
}
