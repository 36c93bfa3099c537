//! PDF input handling.
//!
//! [`PdfRenderer`] is the default [`DocumentRenderer`]: text comes from the
//! PDF's text layer via pdf-extract, page images come from the embedded
//! image XObjects via lopdf. Scanned documents are typically one full-page
//! image per page, so the largest image on a page stands in for the
//! rendered page.

use image::{DynamicImage, ImageBuffer, Rgba};
use lopdf::{Document, Object, ObjectId};
use std::path::Path;
use tracing::{debug, trace};

use crate::collaborators::DocumentRenderer;
use crate::error::PdfError;

type Result<T> = std::result::Result<T, PdfError>;

/// Default renderer for PDF documents.
#[derive(Debug, Default)]
pub struct PdfRenderer;

impl PdfRenderer {
    pub fn new() -> Self {
        Self
    }

    fn load(&self, path: &Path) -> Result<Document> {
        let mut doc = Document::load(path).map_err(|e| PdfError::Parse(e.to_string()))?;

        // PDFs with empty-password encryption are common in the wild.
        if doc.is_encrypted() {
            if doc.decrypt("").is_err() {
                return Err(PdfError::Encrypted);
            }
            debug!("decrypted PDF with empty password");
        }

        if doc.get_pages().is_empty() {
            return Err(PdfError::NoPages);
        }
        Ok(doc)
    }
}

impl DocumentRenderer for PdfRenderer {
    fn extract_text(&self, path: &Path) -> Result<String> {
        let data = std::fs::read(path).map_err(|e| PdfError::Parse(e.to_string()))?;
        pdf_extract::extract_text_from_mem(&data)
            .map_err(|e| PdfError::TextExtraction(e.to_string()))
    }

    fn render_pages(&self, path: &Path) -> Result<Vec<DynamicImage>> {
        let doc = self.load(path)?;
        let mut pages = Vec::new();

        for (page_number, page_id) in doc.get_pages() {
            let images = page_images(&doc, page_id);
            debug!(page = page_number, images = images.len(), "collected page images");

            // The largest image is the scanned page; smaller ones are logos
            // and stamps.
            let page = images
                .into_iter()
                .max_by_key(|img| img.width() as u64 * img.height() as u64);
            if let Some(page) = page {
                pages.push(page);
            }
        }

        Ok(pages)
    }
}

/// Images referenced by a page's XObject resources.
fn page_images(doc: &Document, page_id: ObjectId) -> Vec<DynamicImage> {
    let mut images = Vec::new();

    let Some(resources) = page_resources(doc, page_id) else {
        return images;
    };
    let Ok(xobjects) = resources.get(b"XObject") else {
        return images;
    };
    let Ok((_, Object::Dictionary(xobjects))) = doc.dereference(xobjects) else {
        return images;
    };

    for (_name, reference) in xobjects.iter() {
        if let Ok((_, object)) = doc.dereference(reference) {
            if let Some(image) = decode_image_object(doc, object) {
                images.push(image);
            }
        }
    }
    images
}

/// The page's resources dictionary, walking up the page tree for inherited
/// resources.
fn page_resources(doc: &Document, node_id: ObjectId) -> Option<lopdf::Dictionary> {
    let Ok(Object::Dictionary(dict)) = doc.get_object(node_id) else {
        return None;
    };

    if let Ok(resources) = dict.get(b"Resources") {
        if let Ok((_, Object::Dictionary(resources))) = doc.dereference(resources) {
            return Some(resources.clone());
        }
    }

    if let Ok(Object::Reference(parent_id)) = dict.get(b"Parent") {
        return page_resources(doc, *parent_id);
    }
    None
}

/// Decodes an image XObject stream into a [`DynamicImage`].
fn decode_image_object(doc: &Document, object: &Object) -> Option<DynamicImage> {
    let Object::Stream(stream) = object else {
        return None;
    };
    let dict = &stream.dict;

    if dict.get(b"Subtype").ok()?.as_name().ok()? != b"Image" {
        return None;
    }

    let width = dict.get(b"Width").ok()?.as_i64().ok()? as u32;
    let height = dict.get(b"Height").ok()?.as_i64().ok()? as u32;
    trace!(width, height, "found image object");

    if let Ok(filter) = dict.get(b"Filter") {
        let filter_name = match filter {
            Object::Name(name) => Some(name.as_slice()),
            Object::Array(arr) => arr.first().and_then(|o| o.as_name().ok()),
            _ => None,
        };

        match filter_name {
            Some(b"DCTDecode") => {
                // JPEG: the stream content is the JPEG file.
                return image::load_from_memory_with_format(
                    &stream.content,
                    image::ImageFormat::Jpeg,
                )
                .ok();
            }
            Some(b"JPXDecode") | Some(b"CCITTFaxDecode") | Some(b"JBIG2Decode") => {
                trace!("unsupported image codec");
                return None;
            }
            _ => {}
        }
    }

    let data = stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone());

    let color_space = dict
        .get(b"ColorSpace")
        .ok()
        .and_then(|o| match o {
            Object::Name(name) => Some(name.as_slice()),
            Object::Array(arr) => arr.first().and_then(|o| o.as_name().ok()),
            Object::Reference(r) => doc.get_object(*r).ok().and_then(|o| o.as_name().ok()),
            _ => None,
        })
        .unwrap_or(b"DeviceRGB");

    let bits = dict
        .get(b"BitsPerComponent")
        .ok()
        .and_then(|o| o.as_i64().ok())
        .unwrap_or(8);
    if bits != 8 {
        trace!(bits, "unsupported bits per component");
        return None;
    }

    image_from_raw(&data, width, height, color_space)
}

fn image_from_raw(
    data: &[u8],
    width: u32,
    height: u32,
    color_space: &[u8],
) -> Option<DynamicImage> {
    // Dimensions come from an untrusted dictionary; the byte counts must
    // not wrap on 32-bit targets.
    let pixel_count = usize::try_from(u64::from(width) * u64::from(height)).ok()?;
    let rgba_len = pixel_count.checked_mul(4)?;

    match color_space {
        b"DeviceRGB" | b"RGB" => {
            let rgb_len = pixel_count.checked_mul(3)?;
            if data.len() < rgb_len {
                trace!(data_len = data.len(), rgb_len, "truncated RGB image data");
                return None;
            }
            let mut rgba = Vec::with_capacity(rgba_len);
            for chunk in data[..rgb_len].chunks_exact(3) {
                rgba.extend_from_slice(chunk);
                rgba.push(255);
            }
            ImageBuffer::<Rgba<u8>, _>::from_raw(width, height, rgba)
                .map(DynamicImage::ImageRgba8)
        }
        b"DeviceGray" | b"G" => {
            if data.len() < pixel_count {
                trace!(data_len = data.len(), pixel_count, "truncated gray image data");
                return None;
            }
            let mut rgba = Vec::with_capacity(rgba_len);
            for &gray in &data[..pixel_count] {
                rgba.extend_from_slice(&[gray, gray, gray, 255]);
            }
            ImageBuffer::<Rgba<u8>, _>::from_raw(width, height, rgba)
                .map(DynamicImage::ImageRgba8)
        }
        _ => {
            trace!(
                colorspace = %String::from_utf8_lossy(color_space),
                data_len = data.len(),
                "could not decode raw image"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_from_raw_gray() {
        let data = vec![128u8; 4];
        let img = image_from_raw(&data, 2, 2, b"DeviceGray").unwrap();
        assert_eq!((img.width(), img.height()), (2, 2));
    }

    #[test]
    fn test_image_from_raw_truncated_data() {
        // Fewer bytes than pixels: refuse rather than panic.
        let data = vec![0u8; 5];
        assert!(image_from_raw(&data, 10, 10, b"DeviceRGB").is_none());
    }

    #[test]
    fn test_image_from_raw_huge_dimensions_rejected() {
        // Width and height straight out of a hostile dictionary.
        let data = vec![0u8; 16];
        assert!(image_from_raw(&data, u32::MAX, u32::MAX, b"DeviceRGB").is_none());
        assert!(image_from_raw(&data, u32::MAX, u32::MAX, b"DeviceGray").is_none());
    }

    #[test]
    fn test_missing_file_is_parse_error() {
        let renderer = PdfRenderer::new();
        let err = renderer
            .extract_text(Path::new("/nonexistent/file.pdf"))
            .unwrap_err();
        assert!(matches!(err, PdfError::Parse(_)));
    }
}
