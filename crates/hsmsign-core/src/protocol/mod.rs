//! Sign request/response exchange over a single channel.
//!
//! The workload API speaks HTTP/1.1 with JSON bodies. Only the small subset
//! needed for one request and one response per connection is implemented:
//! the request always carries `Connection: close`, and the response is framed
//! line by line through [`BufferedStream`].

mod request;
mod response;

pub use request::write_request;
pub use response::{read_response, RawResponse, MAX_BODY_LEN};

use crate::stream::{BufferedStream, FramingError};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tokio::io::{AsyncRead, AsyncWrite};

/// Signing algorithms the HSM accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignAlgorithm {
    #[serde(rename = "HMACSHA256")]
    HmacSha256,
}

/// Body of a sign request. `data` goes over the wire base64 encoded.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignRequest<'a> {
    pub key_id: &'a str,
    pub algo: SignAlgorithm,
    #[serde(serialize_with = "serialize_base64")]
    pub data: &'a [u8],
}

impl<'a> SignRequest<'a> {
    pub fn hmac_sha256(key_id: &'a str, data: &'a [u8]) -> Self {
        Self {
            key_id,
            algo: SignAlgorithm::HmacSha256,
            data,
        }
    }
}

/// Body of a 2xx response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SignResponse {
    #[serde(deserialize_with = "deserialize_base64")]
    pub digest: Vec<u8>,
}

/// Body of a non-2xx response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ErrorPayload {
    #[serde(default)]
    pub message: Option<String>,
}

/// Decoded result of one exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignOutcome {
    Signed(SignResponse),
    /// Non-2xx status. `body` is the raw body text, kept for when the payload has no message.
    Failed {
        status: u16,
        payload: ErrorPayload,
        body: String,
    },
}

/// Sends `body` to `target` and reads back the whole response.
pub async fn exchange<S>(
    stream: S,
    host: &str,
    target: &str,
    body: &[u8],
) -> Result<RawResponse, FramingError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut stream = BufferedStream::new(stream);
    write_request(&mut stream, host, target, body).await?;
    read_response(&mut stream).await
}

/// Interprets a raw response as a sign result.
///
/// A 2xx body that is not a valid sign response is a framing error; an
/// unparsable error body is tolerated and kept as text.
pub fn decode_sign_outcome(raw: RawResponse) -> Result<SignOutcome, FramingError> {
    if raw.is_success() {
        let response = serde_json::from_slice(&raw.body)
            .map_err(|e| FramingError::Body(format!("sign response: {}", e)))?;
        return Ok(SignOutcome::Signed(response));
    }
    let payload = serde_json::from_slice(&raw.body).unwrap_or_default();
    Ok(SignOutcome::Failed {
        status: raw.status,
        payload,
        body: String::from_utf8_lossy(&raw.body).trim().to_string(),
    })
}

fn serialize_base64<S: Serializer>(bytes: &&[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&STANDARD.encode(bytes))
}

fn deserialize_base64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    let text = String::deserialize(deserializer)?;
    STANDARD.decode(text).map_err(serde::de::Error::custom)
}
