/*
[INPUT]:  Request path, optional JSON body, credentials and nonce source
[OUTPUT]: Signed payload plus X-MAX-* authentication headers
[POS]:    HTTP layer - request signing for authenticated endpoints
[UPDATE]: When changing signing algorithm or header format
*/

use std::collections::BTreeMap;
use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use reqwest::RequestBuilder;
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;

use crate::auth::{Credentials, NonceGenerator};

use super::error::{MaxError, Result};

pub const HEADER_ACCESS_KEY: &str = "X-MAX-ACCESSKEY";
pub const HEADER_PAYLOAD: &str = "X-MAX-PAYLOAD";
pub const HEADER_SIGNATURE: &str = "X-MAX-SIGNATURE";

/// Body and headers for one signed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedPayload {
    /// JSON body sent on the wire
    pub body: Vec<u8>,
    /// Base64 of `body`, sent as the payload header
    pub payload: String,
    /// Hex HMAC of `payload`
    pub signature: String,
}

/// Signs REST requests with a nonce-bearing payload
#[derive(Debug, Clone)]
pub struct RequestSigner {
    credentials: Credentials,
    nonce: Arc<NonceGenerator>,
}

impl RequestSigner {
    pub fn new(credentials: Credentials, nonce: Arc<NonceGenerator>) -> Self {
        Self { credentials, nonce }
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Build the signed body for `path`.
    ///
    /// `path` and a fresh `nonce` are merged into the body; caller fields
    /// with the same name win. Keys are serialized in sorted order.
    pub fn sign_request(&self, path: &str, body: Option<&Value>) -> Result<SignedPayload> {
        let mut fields: BTreeMap<String, Value> = BTreeMap::new();
        fields.insert("path".to_string(), Value::String(path.to_string()));
        fields.insert("nonce".to_string(), Value::from(self.nonce.next()));

        match body {
            None | Some(Value::Null) => {}
            Some(Value::Object(extra)) => {
                for (key, value) in extra {
                    fields.insert(key.clone(), value.clone());
                }
            }
            Some(other) => {
                return Err(MaxError::Config(format!(
                    "signed request body must be a JSON object, got {other}"
                )));
            }
        }

        let body = serde_json::to_vec(&fields)?;
        let payload = BASE64.encode(&body);
        let signature = self.credentials.sign(payload.as_bytes());

        Ok(SignedPayload {
            body,
            payload,
            signature,
        })
    }

    /// Attach the signed body and authentication headers to `builder`
    pub fn apply(&self, builder: RequestBuilder, signed: SignedPayload) -> RequestBuilder {
        builder
            .header(HEADER_ACCESS_KEY, self.credentials.access_key())
            .header(HEADER_PAYLOAD, signed.payload)
            .header(HEADER_SIGNATURE, signed.signature)
            .header(CONTENT_TYPE, "application/json")
            .body(signed.body)
    }
}
