use std::sync::Arc;

use image::ImageFormat;

use crate::resources::LoadError;

/**
 * Decodes an image embedded in or referenced by an asset into RGBA8.
 *
 * The mime type is only a hint; when it is missing or unknown the image crate guesses
 * the format from the magic bytes.
 */
pub fn decode_image(
    bytes: &[u8],
    mime_type: Option<&str>,
    name: &str,
) -> Result<Arc<image::RgbaImage>, LoadError> {
    let decoded = match mime_type.and_then(ImageFormat::from_mime_type) {
        Some(format) => image::load_from_memory_with_format(bytes, format),
        None => image::load_from_memory(bytes),
    };
    decoded
        .map(|img| Arc::new(img.to_rgba8()))
        .map_err(|source| LoadError::Image {
            name: name.to_string(),
            source,
        })
}
