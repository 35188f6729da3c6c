//! Small utility helpers used across modules.

use base64::{engine::general_purpose::STANDARD, Engine as _};

/// Upper bound for a decoded image sent to a vision model.
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

const ALLOWED_IMAGE_TYPES: [&str; 4] = ["image/jpeg", "image/png", "image/gif", "image/webp"];
const DEFAULT_IMAGE_TYPE: &str = "image/jpeg";

/// First `max` characters of `s` (char-boundary safe).
pub fn truncate_chars(s: &str, max: usize) -> String {
  s.chars().take(max).collect()
}

/// Log-safe truncation for large strings.
/// Avoids spamming logs with huge request/response payloads.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  let total = s.chars().count();
  if total <= max { s.to_string() } else { format!("{}… ({} chars total)", truncate_chars(s, max), total) }
}

/// Base64 image as accepted from the browser: either a data URL
/// (`data:image/png;base64,...`) or bare base64 (assumed JPEG).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImagePayload {
  pub media_type: String,
  pub data: String,
}

impl ImagePayload {
  /// Split and validate. The base64 body is decoded once to make sure it is
  /// well-formed and within the size limit; the original text is kept for the upstream call.
  pub fn parse(input: &str) -> Result<Self, String> {
    let input = input.trim();
    let (media_type, data) = match input.strip_prefix("data:") {
      Some(rest) => {
        let (header, data) = rest
          .split_once(',')
          .ok_or_else(|| "image: data URL without ',' separator".to_string())?;
        let media_type = header
          .strip_suffix(";base64")
          .ok_or_else(|| "image: only base64 data URLs are supported".to_string())?;
        (media_type.to_ascii_lowercase(), data)
      }
      None => (DEFAULT_IMAGE_TYPE.to_string(), input),
    };

    if !ALLOWED_IMAGE_TYPES.contains(&media_type.as_str()) {
      return Err(format!("image: unsupported media type '{}'", media_type));
    }

    let decoded = STANDARD
      .decode(data)
      .map_err(|e| format!("image: invalid base64 ({})", e))?;
    if decoded.is_empty() {
      return Err("image: empty image".into());
    }
    if decoded.len() > MAX_IMAGE_BYTES {
      return Err(format!("image: {} bytes exceeds limit of {} bytes", decoded.len(), MAX_IMAGE_BYTES));
    }

    Ok(Self { media_type, data: data.to_string() })
  }
}
