use crate::models::ImageContext;

pub const SVG_TEXT_SYSTEM: &str = include_str!("../data/prompts/svg_text_system.txt");
pub const SVG_IMAGE_SYSTEM: &str = include_str!("../data/prompts/svg_image_system.txt");
pub const CHAT_PERSONA: &str = include_str!("../data/prompts/chat_persona.txt");
pub const CHAT_GREETING: &str = include_str!("../data/prompts/chat_greeting.txt");
pub const CHAT_RESET_GREETING: &str = include_str!("../data/prompts/chat_reset_greeting.txt");
pub const CHAT_IMAGE_CONTEXT: &str = include_str!("../data/prompts/chat_image_context.txt");
pub const CHAT_MESSAGE: &str = include_str!("../data/prompts/chat_message.txt");

/// Rendered in place of any image context field the client left out.
pub const MISSING_FIELD: &str = "N/A";

/// Replace `{{key}}` placeholders in a template string.
///
/// The template is scanned once, so substituted values are never searched
/// for placeholders themselves. Unknown keys are left as written.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut result = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        result.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        let Some(end) = after_open.find("}}") else {
            rest = &rest[start..];
            break;
        };

        let key = &after_open[..end];
        match vars.iter().find(|(name, _)| *name == key) {
            Some((_, value)) => result.push_str(value),
            None => result.push_str(&rest[start..start + 2 + end + 2]),
        }
        rest = &after_open[end + 2..];
    }

    result.push_str(rest);
    result
}

/// Address a plain chat message to the persona.
pub fn render_chat(message: &str) -> String {
    render(CHAT_MESSAGE, &[("message", message)]).trim().to_string()
}

/// Build the single chat prompt sent when a message arrives with image details.
pub fn render_image_chat(message: &str, ctx: &ImageContext) -> String {
    fn or_missing<T: ToString>(value: Option<T>) -> String {
        value
            .map(|v| v.to_string())
            .unwrap_or_else(|| MISSING_FIELD.to_string())
    }

    let size = ctx.size.as_ref();
    let filename = or_missing(ctx.filename.as_deref());
    let width = or_missing(size.and_then(|s| s.width));
    let height = or_missing(size.and_then(|s| s.height));
    let format = or_missing(ctx.format.as_deref());
    let file_size = or_missing(ctx.file_size);
    let blob_id = or_missing(ctx.blob_id.as_deref());
    let image_url = or_missing(ctx.image_url.as_deref());

    render(
        CHAT_IMAGE_CONTEXT,
        &[
            ("message", message),
            ("filename", &filename),
            ("width", &width),
            ("height", &height),
            ("format", &format),
            ("file_size", &file_size),
            ("blob_id", &blob_id),
            ("image_url", &image_url),
        ],
    )
    .trim()
    .to_string()
}
