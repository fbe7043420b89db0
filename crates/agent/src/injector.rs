//! Multimodal result injector.
//!
//! The generation service only accepts binary content inside user-authored
//! turns, so a tool result that carries bytes cannot go into the `tool` turn
//! as-is. The injector splits it: the `tool` turn gets a sanitized text-only
//! result part, and the bytes travel in a follow-up user turn as inline data
//! with a caption. Oversized or undecodable payloads are rejected with a
//! descriptive error result and nothing is injected.

use std::io::Cursor;

use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use tracing::debug;

use skyhook_core::module::ToolOutput;
use skyhook_core::transcript::{BinaryPayload, Part, Role, Turn};

/// Bounds applied to binary payloads before injection.
#[derive(Debug, Clone, Copy)]
pub struct MediaPolicy {
    /// Images with a side longer than this are downscaled to fit.
    pub max_dimension: u32,
    /// Payloads larger than this are rejected outright.
    pub max_bytes: usize,
}

impl Default for MediaPolicy {
    fn default() -> Self {
        Self {
            max_dimension: 1024,
            max_bytes: 10 * 1024 * 1024,
        }
    }
}

/// A tool output reframed for transcript append.
pub struct Reframed {
    /// Text-only part destined for the `tool` turn.
    pub result_part: Part,
    /// Follow-up user turn carrying the binary content, when there is any.
    pub follow_up: Option<Turn>,
    /// Summary for progress display and the action log (never raw bytes).
    pub display: String,
}

impl Reframed {
    fn text_only(name: &str, text: String) -> Self {
        Self {
            display: text.clone(),
            result_part: Part::ToolCallResult {
                name: name.to_string(),
                text,
                binary: None,
            },
            follow_up: None,
        }
    }
}

/// Reframe one tool output under the given policy.
pub fn reframe(policy: &MediaPolicy, tool_name: &str, output: ToolOutput) -> Reframed {
    let Some(binary) = output.binary else {
        return Reframed::text_only(tool_name, output.text);
    };

    if binary.bytes.len() > policy.max_bytes {
        return Reframed::text_only(
            tool_name,
            format!(
                "Error: binary payload is too large ({} bytes), exceeds the {} byte limit.",
                binary.bytes.len(),
                policy.max_bytes
            ),
        );
    }

    let decoded = match image::load_from_memory(&binary.bytes) {
        Ok(img) => img,
        Err(e) => {
            return Reframed::text_only(
                tool_name,
                format!("Error: could not decode image payload: {e}"),
            )
        }
    };

    let (orig_width, orig_height) = (decoded.width(), decoded.height());
    let payload = if orig_width > policy.max_dimension || orig_height > policy.max_dimension {
        match downscale(decoded, &binary.mime_type, policy.max_dimension) {
            Ok(p) => p,
            Err(e) => {
                return Reframed::text_only(
                    tool_name,
                    format!("Error: could not re-encode downscaled image: {e}"),
                )
            }
        }
    } else {
        // Within bounds: forward the original bytes untouched.
        Scaled {
            payload: binary,
            width: orig_width,
            height: orig_height,
        }
    };

    let size_note = if (payload.width, payload.height) == (orig_width, orig_height) {
        format!("Size: {orig_width}x{orig_height}")
    } else {
        debug!(
            tool = %tool_name,
            from = format!("{orig_width}x{orig_height}"),
            to = format!("{}x{}", payload.width, payload.height),
            "Downscaled image payload"
        );
        format!(
            "Original size: {orig_width}x{orig_height}, downscaled to {}x{}",
            payload.width, payload.height
        )
    };

    let result_text = format!(
        "Image read successfully. {size_note}. See the image content below."
    );
    let caption = format!(
        "The image above is the result of the {tool_name} tool. \
         Analyze or respond based on its content."
    );
    let follow_up = Turn::new(
        Role::User,
        vec![
            Part::InlineBinary {
                mime_type: payload.payload.mime_type,
                bytes: payload.payload.bytes,
            },
            Part::text(caption),
        ],
    );

    Reframed {
        display: format!("Image read and forwarded to the model. {size_note}"),
        result_part: Part::ToolCallResult {
            name: tool_name.to_string(),
            text: result_text,
            binary: None,
        },
        follow_up: Some(follow_up),
    }
}

struct Scaled {
    payload: BinaryPayload,
    width: u32,
    height: u32,
}

/// Downscale to fit within `max_dimension`, preserving aspect ratio.
/// PNG stays PNG (it may carry transparency); everything else re-encodes
/// as JPEG.
fn downscale(
    img: DynamicImage,
    mime_type: &str,
    max_dimension: u32,
) -> Result<Scaled, image::ImageError> {
    let resized = img.resize(max_dimension, max_dimension, FilterType::Lanczos3);
    let (width, height) = (resized.width(), resized.height());

    let mut buffer = Cursor::new(Vec::new());
    let out_mime = if mime_type == "image/png" {
        resized.write_to(&mut buffer, ImageFormat::Png)?;
        "image/png"
    } else {
        // JPEG has no alpha channel.
        DynamicImage::ImageRgb8(resized.to_rgb8()).write_to(&mut buffer, ImageFormat::Jpeg)?;
        "image/jpeg"
    };

    Ok(Scaled {
        payload: BinaryPayload::new(out_mime, buffer.into_inner()),
        width,
        height,
    })
}
