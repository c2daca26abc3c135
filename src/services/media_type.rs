//! Content-Type validation and normalization for uploads.

use mime_guess::mime::{self, Mime};
use thiserror::Error;

/// Content type assumed when a request does not declare one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Top-level media type categories accepted for upload.
pub const ALLOWED_TOP_LEVEL_TYPES: [&str; 9] = [
    "application",
    "audio",
    "font",
    "image",
    "message",
    "model",
    "multipart",
    "text",
    "video",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MediaTypeError {
    /// The header is not a syntactically valid media type.
    #[error("invalid Content-Type {header:?}: {reason}")]
    Unparsable { header: String, reason: String },

    /// Parsed, but the category is not allowed or the subtype is empty.
    #[error(
        "unsupported Content-Type: {0} (must be a valid MIME type like text/*, application/*, image/*, etc.)"
    )]
    Unsupported(String),
}

/// Validate a declared Content-Type and return its canonical form.
///
/// The canonical form is the lowercase `type/subtype`, followed by
/// `; charset=value` when a charset parameter was given. The charset value
/// keeps the case it was sent with. All other parameters are dropped. A
/// missing or blank header means [`DEFAULT_CONTENT_TYPE`].
pub fn normalize_content_type(header: Option<&str>) -> Result<String, MediaTypeError> {
    let header = header.map(str::trim).unwrap_or_default();
    let header = if header.is_empty() {
        DEFAULT_CONTENT_TYPE
    } else {
        header
    };

    // Whitespace around the essence is allowed (`text/plain ; charset=x`).
    let (essence, params) = match header.split_once(';') {
        Some((essence, params)) => (essence.trim(), params),
        None => (header, ""),
    };

    // `type/` parses as a category problem, not a syntax problem.
    if let Some((top, sub)) = essence.split_once('/')
        && !top.trim().is_empty()
        && sub.trim().is_empty()
    {
        return Err(MediaTypeError::Unsupported(essence.to_ascii_lowercase()));
    }

    let unparsable = |reason: String| MediaTypeError::Unparsable {
        header: header.to_string(),
        reason,
    };
    let parsed: Mime = essence
        .parse()
        .map_err(|err: mime::FromStrError| unparsable(err.to_string()))?;
    let params = parse_params(params).map_err(unparsable)?;

    let media_type = parsed.essence_str().to_ascii_lowercase();
    if !is_allowed_top_level(parsed.type_().as_str()) {
        return Err(MediaTypeError::Unsupported(media_type));
    }

    match params.iter().find(|(name, _)| name == mime::CHARSET.as_str()) {
        Some((_, charset)) => Ok(format!("{}; charset={}", media_type, charset)),
        None => Ok(media_type),
    }
}

fn is_allowed_top_level(top: &str) -> bool {
    ALLOWED_TOP_LEVEL_TYPES
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(top))
}

/// Parse `name=value` pairs separated by `;`. Names are lowercased, values
/// are kept as sent (quoted strings are unescaped). A trailing `;` is
/// ignored; empty values and repeated names are errors.
fn parse_params(mut rest: &str) -> Result<Vec<(String, String)>, String> {
    let mut params: Vec<(String, String)> = Vec::new();
    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            return Ok(params);
        }

        let (name, after_name) = split_token(rest);
        let after_eq = after_name
            .trim_start()
            .strip_prefix('=')
            .filter(|_| !name.is_empty())
            .ok_or_else(|| format!("invalid media parameter {:?}", rest))?;
        let (value, after_value) = split_value(after_eq.trim_start())?
            .filter(|(value, _)| !value.is_empty())
            .ok_or_else(|| format!("invalid media parameter {:?}", rest))?;

        let name = name.to_ascii_lowercase();
        if params.iter().any(|(seen, _)| *seen == name) {
            return Err(format!("duplicate parameter name {:?}", name));
        }
        params.push((name, value));

        rest = after_value.trim_start();
        match rest.strip_prefix(';') {
            Some(next) => rest = next,
            None if rest.is_empty() => return Ok(params),
            None => return Err(format!("invalid media parameter {:?}", rest)),
        }
    }
}

fn is_token_char(c: char) -> bool {
    c.is_ascii_graphic() && !"()<>@,;:\\\"/[]?=".contains(c)
}

fn split_token(s: &str) -> (&str, &str) {
    let end = s.find(|c: char| !is_token_char(c)).unwrap_or(s.len());
    s.split_at(end)
}

/// A token or a quoted string. `Ok(None)` when no token is present.
fn split_value(s: &str) -> Result<Option<(String, &str)>, String> {
    let Some(quoted) = s.strip_prefix('"') else {
        let (token, rest) = split_token(s);
        return Ok((!token.is_empty()).then(|| (token.to_string(), rest)));
    };

    let mut value = String::new();
    let mut chars = quoted.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Ok(Some((value, &quoted[i + 1..]))),
            '\\' => match chars.next() {
                Some((_, escaped)) => value.push(escaped),
                None => break,
            },
            _ => value.push(c),
        }
    }
    Err("unterminated quoted parameter value".to_string())
}
