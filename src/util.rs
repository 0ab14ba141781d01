//! Utility helpers for linerelay.
//!
//! Currently this holds the JSON span scanner used to pull a structured
//! verdict out of free-form model output. It lives here rather than in the
//! gate module because tolerating prose-wrapped JSON is a general
//! robustness concern, not classification logic.

/// Return the first balanced `{...}` span in `text`, or `None` when no
/// complete object is present.
///
/// Models are instructed to answer with a single JSON object but routinely
/// wrap it in prose or code fences anyway, so the caller cannot feed the
/// raw response to a JSON parser directly. The scanner tracks string
/// literals and escape sequences, so braces inside string values do not
/// affect the depth count. The returned span is a candidate, not validated
/// JSON; callers still run it through `serde_json`.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let start = text.find('{')?;

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=i]);
                }
            }
            _ => {}
        }
    }
    None
}
