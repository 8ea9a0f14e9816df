use anyhow::{Context, Result};
use image::{Rgba, RgbaImage, imageops};

use crate::document::{PageRaster, PageSource};
use crate::model::BoundingBox;

pub const DEFAULT_RENDER_SCALE: f32 = 2.0;

pub const HIGHLIGHT_MARGIN_RATIO: f64 = 0.04;
pub const HIGHLIGHT_OPACITY: f64 = 0.25;
pub const HIGHLIGHT_COLOR: [u8; 3] = [255, 255, 0];

pub const CROP_SIDE_RATIO: f64 = 0.09;
pub const CROP_TOP_BOTTOM_RATIO: f64 = 0.02;

/// Rectangle with a top-left origin and Y growing downward.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterRect {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl RasterRect {
    pub fn from_document_box(bbox: &BoundingBox, page_height: f64) -> Self {
        Self {
            left: bbox.x0.min(bbox.x1),
            top: page_height - bbox.y1.max(bbox.y0),
            right: bbox.x0.max(bbox.x1),
            bottom: page_height - bbox.y0.min(bbox.y1),
        }
    }

    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn expand_horizontally(self, ratio: f64) -> Self {
        let margin = self.width() * ratio;
        Self {
            left: self.left - margin,
            right: self.right + margin,
            ..self
        }
    }

    pub fn scaled(self, scale_x: f64, scale_y: f64) -> Self {
        Self {
            left: self.left * scale_x,
            top: self.top * scale_y,
            right: self.right * scale_x,
            bottom: self.bottom * scale_y,
        }
    }
}

pub fn render<D: PageSource + ?Sized>(
    document: &D,
    page_number: usize,
    bbox: Option<&BoundingBox>,
    scale: f32,
) -> Result<RgbaImage> {
    let raster = document
        .rasterize_page(page_number, scale)
        .with_context(|| format!("failed to rasterize page {page_number}"))?;

    Ok(highlight_and_crop(raster, bbox))
}

pub fn highlight_and_crop(raster: PageRaster, bbox: Option<&BoundingBox>) -> RgbaImage {
    let (scale_x, scale_y) = (raster.scale_x(), raster.scale_y());
    let mut image = raster.image;

    if let Some(bbox) = bbox {
        let rect = RasterRect::from_document_box(bbox, raster.page_height)
            .expand_horizontally(HIGHLIGHT_MARGIN_RATIO)
            .scaled(scale_x, scale_y);
        paint_highlight(&mut image, rect, HIGHLIGHT_COLOR, HIGHLIGHT_OPACITY);
    }

    crop_page_furniture(&image)
}

pub fn paint_highlight(image: &mut RgbaImage, rect: RasterRect, color: [u8; 3], opacity: f64) {
    let opacity = opacity.clamp(0.0, 1.0);
    let x_start = clamp_to_extent(rect.left.floor(), image.width());
    let x_end = clamp_to_extent(rect.right.ceil(), image.width());
    let y_start = clamp_to_extent(rect.top.floor(), image.height());
    let y_end = clamp_to_extent(rect.bottom.ceil(), image.height());

    for y in y_start..y_end {
        for x in x_start..x_end {
            let Rgba([red, green, blue, alpha]) = *image.get_pixel(x, y);
            let blend = |base: u8, tint: u8| {
                (f64::from(base) * (1.0 - opacity) + f64::from(tint) * opacity).round() as u8
            };
            image.put_pixel(
                x,
                y,
                Rgba([
                    blend(red, color[0]),
                    blend(green, color[1]),
                    blend(blue, color[2]),
                    alpha,
                ]),
            );
        }
    }
}

pub fn crop_page_furniture(image: &RgbaImage) -> RgbaImage {
    let (width, height) = image.dimensions();
    let side = (f64::from(width) * CROP_SIDE_RATIO).round() as u32;
    let edge = (f64::from(height) * CROP_TOP_BOTTOM_RATIO).round() as u32;

    let cropped_width = width.saturating_sub(side * 2);
    let cropped_height = height.saturating_sub(edge * 2);
    if cropped_width == 0 || cropped_height == 0 {
        return image.clone();
    }

    imageops::crop_imm(image, side, edge, cropped_width, cropped_height).to_image()
}

pub fn stack_vertically(images: &[RgbaImage]) -> Option<RgbaImage> {
    let width = images.iter().map(RgbaImage::width).max()?;
    let height = images.iter().map(RgbaImage::height).sum::<u32>();
    if width == 0 || height == 0 {
        return None;
    }

    let mut canvas = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));
    let mut offset = 0i64;
    for image in images {
        imageops::overlay(&mut canvas, image, 0, offset);
        offset += i64::from(image.height());
    }

    Some(canvas)
}

fn clamp_to_extent(value: f64, extent: u32) -> u32 {
    value.clamp(0.0, f64::from(extent)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::tests::FakeDocument;

    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

    fn close(left: f64, right: f64) -> bool {
        (left - right).abs() < 1e-9
    }

    #[test]
    fn document_box_flips_into_top_left_space() {
        let bbox = BoundingBox {
            x0: 10.0,
            y0: 20.0,
            x1: 110.0,
            y1: 70.0,
        };

        let rect = RasterRect::from_document_box(&bbox, 200.0);
        assert_eq!(
            rect,
            RasterRect {
                left: 10.0,
                top: 130.0,
                right: 110.0,
                bottom: 180.0,
            }
        );

        let expanded = rect.expand_horizontally(HIGHLIGHT_MARGIN_RATIO);
        assert!(close(expanded.width(), 108.0));
        assert!(close((expanded.left + expanded.right) / 2.0, 60.0));
        assert_eq!(expanded.top, 130.0);
        assert_eq!(expanded.bottom, 180.0);
    }

    #[test]
    fn crop_removes_fixed_shares_of_each_edge() {
        let cropped = crop_page_furniture(&RgbaImage::new(1000, 1000));
        assert_eq!(cropped.dimensions(), (820, 960));
    }

    #[test]
    fn crop_keeps_pixels_from_the_interior() {
        let mut image = RgbaImage::from_pixel(100, 100, WHITE);
        image.put_pixel(9, 2, Rgba([0, 0, 0, 255]));

        let cropped = crop_page_furniture(&image);
        assert_eq!(cropped.dimensions(), (82, 96));
        assert_eq!(*cropped.get_pixel(0, 0), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn paint_highlight_blends_inside_rect_only() {
        let mut image = RgbaImage::from_pixel(10, 10, WHITE);
        let rect = RasterRect {
            left: 2.0,
            top: 2.0,
            right: 5.0,
            bottom: 5.0,
        };

        paint_highlight(&mut image, rect, [255, 255, 0], 0.25);

        assert_eq!(*image.get_pixel(3, 3), Rgba([255, 255, 191, 255]));
        assert_eq!(*image.get_pixel(5, 5), WHITE);
        assert_eq!(*image.get_pixel(0, 0), WHITE);
    }

    #[test]
    fn paint_highlight_clips_to_image_bounds() {
        let mut image = RgbaImage::from_pixel(4, 4, WHITE);
        let rect = RasterRect {
            left: -10.0,
            top: -10.0,
            right: 40.0,
            bottom: 40.0,
        };

        paint_highlight(&mut image, rect, [255, 255, 0], 1.0);
        assert!(image.pixels().all(|pixel| *pixel == Rgba([255, 255, 0, 255])));
    }

    #[test]
    fn render_highlights_before_cropping() {
        let document = FakeDocument::new(vec![vec!["CSC101"]]);
        let bbox = BoundingBox {
            x0: 10.0,
            y0: 20.0,
            x1: 50.0,
            y1: 70.0,
        };

        let highlighted = render(&document, 1, Some(&bbox), 1.0).unwrap();
        let plain = render(&document, 1, None, 1.0).unwrap();

        assert_eq!(highlighted.dimensions(), (82, 192));
        assert_eq!(plain.dimensions(), highlighted.dimensions());

        // Page point (30, 150) from the top-left, shifted by the 9px/4px crop.
        assert_ne!(*highlighted.get_pixel(21, 146), WHITE);
        assert_eq!(*plain.get_pixel(21, 146), WHITE);
        assert_eq!(*highlighted.get_pixel(0, 0), WHITE);
    }

    #[test]
    fn render_surfaces_rasterization_failure() {
        let document = FakeDocument::new(vec![vec!["CSC101"]]).with_broken_page(1);
        let err = render(&document, 1, None, 1.0).unwrap_err();
        assert!(err.to_string().contains("failed to rasterize page 1"));
    }

    #[test]
    fn stack_vertically_uses_widest_image() {
        let stacked = stack_vertically(&[
            RgbaImage::from_pixel(3, 2, Rgba([0, 0, 0, 255])),
            RgbaImage::from_pixel(5, 4, Rgba([0, 0, 0, 255])),
        ])
        .unwrap();

        assert_eq!(stacked.dimensions(), (5, 6));
        assert_eq!(*stacked.get_pixel(4, 0), WHITE);
        assert_eq!(*stacked.get_pixel(4, 5), Rgba([0, 0, 0, 255]));
        assert!(stack_vertically(&[]).is_none());
    }
}
