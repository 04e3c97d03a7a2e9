use std::io::Cursor;

use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};

use super::DetectorError;
use crate::workflows::cleanup::domain::Detection;

const STROKE: u32 = 3;
const PALETTE: [[u8; 4]; 6] = [
    [230, 57, 70, 255],
    [42, 157, 143, 255],
    [233, 196, 106, 255],
    [69, 123, 157, 255],
    [244, 162, 97, 255],
    [131, 56, 236, 255],
];

fn color_for(class_name: &str) -> Rgba<u8> {
    let index = class_name.bytes().map(usize::from).sum::<usize>() % PALETTE.len();
    Rgba(PALETTE[index])
}

/// Draw one outlined box per detection and encode the result as PNG.
pub fn render_annotations(
    image: &DynamicImage,
    detections: &[Detection],
) -> Result<Vec<u8>, DetectorError> {
    let mut canvas = image.to_rgba8();
    for detection in detections {
        draw_outline(&mut canvas, detection, color_for(&detection.class_name));
    }

    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(canvas)
        .write_to(&mut buffer, ImageFormat::Png)
        .map_err(|err| DetectorError::Encode(err.to_string()))?;
    Ok(buffer.into_inner())
}

fn draw_outline(canvas: &mut RgbaImage, detection: &Detection, color: Rgba<u8>) {
    let (width, height) = canvas.dimensions();
    if width == 0 || height == 0 {
        return;
    }

    let clamp = |value: f32, limit: u32| -> u32 {
        if value.is_finite() {
            (value.max(0.0) as u32).min(limit - 1)
        } else {
            0
        }
    };
    let bbox = detection.bbox;
    let (x1, y1) = (clamp(bbox.x1(), width), clamp(bbox.y1(), height));
    let (x2, y2) = (clamp(bbox.x2(), width), clamp(bbox.y2(), height));

    for offset in 0..STROKE {
        for x in x1..=x2 {
            put(canvas, x, y1 + offset, color);
            put(canvas, x, y2.saturating_sub(offset), color);
        }
        for y in y1..=y2 {
            put(canvas, x1 + offset, y, color);
            put(canvas, x2.saturating_sub(offset), y, color);
        }
    }
}

fn put(canvas: &mut RgbaImage, x: u32, y: u32, color: Rgba<u8>) {
    if x < canvas.width() && y < canvas.height() {
        canvas.put_pixel(x, y, color);
    }
}
