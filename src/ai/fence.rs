const OPENING_MARKER: &str = "```svg";
const CLOSING_MARKER: &str = "```";

/// Strip the markdown fence a model may wrap its SVG output in.
///
/// Removes leading `` ```svg `` and trailing `` ``` `` markers along with
/// surrounding whitespace, repeating until neither is left, so nested fences
/// unwrap fully and a second call is a no-op.
pub fn strip_code_fence(text: &str) -> String {
    let mut payload = text.trim();
    loop {
        let mut stripped = payload;
        if let Some(rest) = stripped.strip_prefix(OPENING_MARKER) {
            stripped = rest.trim();
        }
        if let Some(rest) = stripped.strip_suffix(CLOSING_MARKER) {
            stripped = rest.trim();
        }
        if stripped.len() == payload.len() {
            return payload.to_string();
        }
        payload = stripped;
    }
}
