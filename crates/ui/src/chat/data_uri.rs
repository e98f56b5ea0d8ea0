use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

const DATA_PREFIX: &str = "data:";
const BASE64_MARKER: &str = ";base64";

/// Encodes bytes as a self-describing `data:` URI.
pub fn encode(mime: &str, bytes: &[u8]) -> String {
    format!("{DATA_PREFIX}{mime}{BASE64_MARKER},{}", BASE64.encode(bytes))
}

/// A decoded base64 `data:` URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl DataUri {
    /// Parses `data:<mime>;base64,<payload>`. Non-base64 and malformed URIs yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        let rest = value.trim().strip_prefix(DATA_PREFIX)?;
        let (meta, payload) = rest.split_once(',')?;
        let mime = meta.strip_suffix(BASE64_MARKER)?;
        let mime = mime.split(';').next().unwrap_or_default().trim();
        let bytes = BASE64.decode(payload.trim().as_bytes()).ok()?;

        Some(Self {
            mime: if mime.is_empty() {
                "application/octet-stream".to_string()
            } else {
                mime.to_string()
            },
            bytes,
        })
    }
}
