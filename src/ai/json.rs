//! Pulling a JSON object out of free-form completion text.

use serde::de::DeserializeOwned;

/// Returns the first balanced `{...}` region of `text`. Braces inside JSON
/// string literals are ignored.
pub fn first_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + c.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Extracts and deserializes the first JSON object in `text`.
pub fn parse_first_object<T: DeserializeOwned>(text: &str) -> Option<T> {
    first_json_object(text).and_then(|region| serde_json::from_str(region).ok())
}
