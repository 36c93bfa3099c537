//! Handwritten signature detection.
//!
//! Signatures are found geometrically: the page is binarized with a local
//! adaptive threshold, connected ink components are collected, and their
//! bounding boxes are filtered by area and aspect ratio (signature strokes
//! are wide, not tall). Each accepted box is expanded by a margin so the
//! printed name and role next to the signature fall inside the block, then
//! OCR'd when a service is available.

use image::{DynamicImage, GrayImage, Luma};
use serde::Serialize;
use tracing::{debug, warn};

use crate::collaborators::Recognizer;
use crate::extract::collapse_whitespace;
use crate::schema::Region;

/// One detected signature block.
#[derive(Debug, Clone, Serialize)]
pub struct SignatureBlock {
    /// Expanded bounding box of the signature on the page.
    pub region: Region,
    /// OCR text of the expanded block, when an OCR service was available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Detects signature-shaped ink blobs on a page image.
pub struct SignatureDetector {
    /// Adaptive threshold neighborhood size.
    block_size: u32,
    /// Adaptive threshold offset.
    threshold_offset: i32,
    /// Accepted bounding-box pixel area.
    min_area: u32,
    max_area: u32,
    /// Accepted width/height ratio.
    min_aspect: f32,
    max_aspect: f32,
    /// Margin added around an accepted box, in pixels.
    margin: u32,
}

impl SignatureDetector {
    pub fn new() -> Self {
        Self {
            block_size: 15,
            threshold_offset: 5,
            min_area: 5_000,
            max_area: 50_000,
            min_aspect: 1.5,
            max_aspect: 4.0,
            margin: 20,
        }
    }

    /// Set the accepted bounding-box area range.
    pub fn with_area(mut self, min: u32, max: u32) -> Self {
        self.min_area = min;
        self.max_area = max;
        self
    }

    /// Set the accepted width/height ratio range.
    pub fn with_aspect(mut self, min: f32, max: f32) -> Self {
        self.min_aspect = min;
        self.max_aspect = max;
        self
    }

    /// Finds signature candidate regions on a page.
    pub fn detect(&self, page: &DynamicImage) -> Vec<Region> {
        let gray = page.to_luma8();
        let binary = self.adaptive_threshold(&gray);
        let boxes = self.connected_components(&binary);

        let (width, height) = (gray.width(), gray.height());
        let mut regions = Vec::new();
        for (x0, y0, x1, y1) in boxes {
            let w = x1 - x0 + 1;
            let h = y1 - y0 + 1;
            let area = w * h;
            if area < self.min_area || area > self.max_area {
                continue;
            }
            let aspect = w as f32 / h as f32;
            if aspect < self.min_aspect || aspect > self.max_aspect {
                continue;
            }

            // Expand so the printed name and role around the strokes are
            // captured too; the region is clamped to the page later.
            let region = Region::new(
                x0.saturating_sub(self.margin) as f32,
                y0.saturating_sub(self.margin) as f32,
                (w + 2 * self.margin).min(width) as f32,
                (h + 2 * self.margin).min(height) as f32,
            );
            debug!(?region, area, aspect, "signature candidate");
            regions.push(region);
        }
        regions
    }

    /// Detects signature blocks and OCRs each expanded region. OCR failures
    /// degrade the block to a region without text.
    pub fn detect_blocks(
        &self,
        page: &DynamicImage,
        ocr: Option<&Recognizer>,
    ) -> Vec<SignatureBlock> {
        self.detect(page)
            .into_iter()
            .map(|region| {
                let text = ocr.and_then(|service| match service.recognize_region(page, &region) {
                    Ok(t) => {
                        let t = collapse_whitespace(&t);
                        (!t.is_empty()).then_some(t)
                    }
                    Err(e) => {
                        warn!(error = %e, "OCR failed for signature block");
                        None
                    }
                });
                SignatureBlock { region, text }
            })
            .collect()
    }

    fn adaptive_threshold(&self, image: &GrayImage) -> GrayImage {
        let (width, height) = image.dimensions();
        let mut result = GrayImage::new(width, height);

        let half_block = self.block_size / 2;

        for y in 0..height {
            for x in 0..width {
                // Local mean over the neighborhood
                let mut sum = 0u32;
                let mut count = 0u32;

                let y_start = y.saturating_sub(half_block);
                let y_end = (y + half_block + 1).min(height);
                let x_start = x.saturating_sub(half_block);
                let x_end = (x + half_block + 1).min(width);

                for ly in y_start..y_end {
                    for lx in x_start..x_end {
                        sum += image.get_pixel(lx, ly)[0] as u32;
                        count += 1;
                    }
                }

                let mean = (sum / count) as i32;
                let threshold = mean - self.threshold_offset;
                let pixel_value = image.get_pixel(x, y)[0] as i32;

                let output = if pixel_value > threshold { 255 } else { 0 };
                result.put_pixel(x, y, Luma([output]));
            }
        }

        result
    }

    /// Bounding boxes `(x0, y0, x1, y1)` of connected ink (black) components,
    /// found with a flood fill over the binarized image.
    fn connected_components(&self, binary: &GrayImage) -> Vec<(u32, u32, u32, u32)> {
        let (width, height) = binary.dimensions();
        let mut visited = vec![false; (width * height) as usize];
        let mut boxes = Vec::new();
        let mut stack = Vec::new();

        let idx = |x: u32, y: u32| (y * width + x) as usize;

        for y in 0..height {
            for x in 0..width {
                if visited[idx(x, y)] || binary.get_pixel(x, y)[0] != 0 {
                    continue;
                }

                let (mut x0, mut y0, mut x1, mut y1) = (x, y, x, y);
                stack.push((x, y));
                visited[idx(x, y)] = true;

                while let Some((cx, cy)) = stack.pop() {
                    x0 = x0.min(cx);
                    y0 = y0.min(cy);
                    x1 = x1.max(cx);
                    y1 = y1.max(cy);

                    let neighbors = [
                        (cx.wrapping_sub(1), cy),
                        (cx + 1, cy),
                        (cx, cy.wrapping_sub(1)),
                        (cx, cy + 1),
                    ];
                    for (nx, ny) in neighbors {
                        if nx < width
                            && ny < height
                            && !visited[idx(nx, ny)]
                            && binary.get_pixel(nx, ny)[0] == 0
                        {
                            visited[idx(nx, ny)] = true;
                            stack.push((nx, ny));
                        }
                    }
                }

                boxes.push((x0, y0, x1, y1));
            }
        }

        boxes
    }
}

impl Default for SignatureDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    /// A white page with one black filled rectangle.
    fn page_with_blob(x: u32, y: u32, w: u32, h: u32) -> DynamicImage {
        let mut img = RgbImage::from_pixel(800, 600, image::Rgb([255, 255, 255]));
        for py in y..y + h {
            for px in x..x + w {
                img.put_pixel(px, py, image::Rgb([0, 0, 0]));
            }
        }
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn test_detects_signature_shaped_blob() {
        // 200x80 = 16000 px area, aspect 2.5: inside both filters.
        let page = page_with_blob(100, 400, 200, 80);
        let regions = SignatureDetector::new().detect(&page);

        assert_eq!(regions.len(), 1);
        let r = &regions[0];
        // Expanded by the 20 px margin.
        assert_eq!(r.left, 80.0);
        assert_eq!(r.top, 380.0);
        assert_eq!(r.width, 240.0);
        assert_eq!(r.height, 120.0);
    }

    #[test]
    fn test_small_blob_rejected() {
        // 40x20 = 800 px: under the minimum area.
        let page = page_with_blob(100, 100, 40, 20);
        assert!(SignatureDetector::new().detect(&page).is_empty());
    }

    #[test]
    fn test_tall_blob_rejected() {
        // 80x120: aspect 0.67, far from signature-shaped.
        let page = page_with_blob(100, 100, 80, 120);
        assert!(SignatureDetector::new().detect(&page).is_empty());
    }

    #[test]
    fn test_blank_page_has_no_signatures() {
        let page = DynamicImage::ImageRgb8(RgbImage::from_pixel(400, 300, image::Rgb([255; 3])));
        assert!(SignatureDetector::new().detect(&page).is_empty());
    }
}
