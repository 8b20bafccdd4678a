//! Placeholder thumbnails: a shaded iso-cube tinted by format with the format
//! name on its front face. This is not a render of the geometry.

use std::io::Cursor;

use image::{ImageFormat, Rgb, RgbImage};

use crate::error::MeshError;
use crate::format::MeshFormat;

pub const THUMBNAIL_SIZE: u32 = 300;

const BACKGROUND: Rgb<u8> = Rgb([0xf0, 0xf0, 0xf0]);
const LABEL: Rgb<u8> = Rgb([0xff, 0xff, 0xff]);

/// Pixel scale of the 5x7 label glyphs.
const GLYPH_SCALE: i32 = 3;

/// Front, top and right face colors.
fn palette(format: MeshFormat) -> [Rgb<u8>; 3] {
    match format {
        MeshFormat::Stl => [
            Rgb([0x25, 0x63, 0xeb]),
            Rgb([0x1d, 0x4e, 0xd8]),
            Rgb([0x1e, 0x40, 0xaf]),
        ],
        MeshFormat::Obj | MeshFormat::Other => [
            Rgb([0xea, 0x58, 0x0c]),
            Rgb([0xc2, 0x41, 0x0c]),
            Rgb([0x9a, 0x34, 0x12]),
        ],
    }
}

/// Cube faces relative to the image center, convex and in drawing order.
const FRONT: [(f32, f32); 4] = [(-50.0, -50.0), (50.0, -50.0), (50.0, 50.0), (-50.0, 50.0)];
const TOP: [(f32, f32); 4] = [(-50.0, -50.0), (0.0, -80.0), (100.0, -80.0), (50.0, -50.0)];
const RIGHT: [(f32, f32); 4] = [(50.0, -50.0), (100.0, -80.0), (100.0, 20.0), (50.0, 50.0)];

/// Render the placeholder as PNG bytes.
pub fn render_placeholder(format: MeshFormat) -> Result<Vec<u8>, MeshError> {
    let mut img = RgbImage::from_pixel(THUMBNAIL_SIZE, THUMBNAIL_SIZE, BACKGROUND);
    let [front, top, right] = palette(format);

    fill_convex(&mut img, &FRONT, front);
    fill_convex(&mut img, &TOP, top);
    fill_convex(&mut img, &RIGHT, right);
    draw_label(&mut img, format.as_str());

    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

/// Fill a convex polygon given relative to the image center. A pixel is
/// painted when its center lies inside or on the boundary.
fn fill_convex(img: &mut RgbImage, poly: &[(f32, f32)], color: Rgb<u8>) {
    let half = THUMBNAIL_SIZE as f32 / 2.0;
    let points: Vec<(f32, f32)> = poly.iter().map(|&(x, y)| (x + half, y + half)).collect();

    let (min_x, max_x) = points
        .iter()
        .fold((f32::MAX, f32::MIN), |(lo, hi), p| (lo.min(p.0), hi.max(p.0)));
    let (min_y, max_y) = points
        .iter()
        .fold((f32::MAX, f32::MIN), |(lo, hi), p| (lo.min(p.1), hi.max(p.1)));

    let limit = THUMBNAIL_SIZE as f32 - 1.0;
    let (x0, x1) = (min_x.max(0.0) as u32, max_x.min(limit) as u32);
    let (y0, y1) = (min_y.max(0.0) as u32, max_y.min(limit) as u32);

    for y in y0..=y1 {
        for x in x0..=x1 {
            if inside(&points, x as f32 + 0.5, y as f32 + 0.5) {
                img.put_pixel(x, y, color);
            }
        }
    }
}

fn inside(points: &[(f32, f32)], px: f32, py: f32) -> bool {
    let mut sign = 0.0f32;
    for i in 0..points.len() {
        let (ax, ay) = points[i];
        let (bx, by) = points[(i + 1) % points.len()];
        let cross = (bx - ax) * (py - ay) - (by - ay) * (px - ax);
        if cross != 0.0 {
            if sign != 0.0 && cross.signum() != sign {
                return false;
            }
            sign = cross.signum();
        }
    }
    true
}

/// 5x7 bitmaps, one row per byte, low five bits used, MSB on the left.
fn glyph(c: char) -> Option<[u8; 7]> {
    let rows = match c {
        'B' => [0x1e, 0x11, 0x11, 0x1e, 0x11, 0x11, 0x1e],
        'E' => [0x1f, 0x10, 0x10, 0x1e, 0x10, 0x10, 0x1f],
        'H' => [0x11, 0x11, 0x11, 0x1f, 0x11, 0x11, 0x11],
        'J' => [0x07, 0x02, 0x02, 0x02, 0x02, 0x12, 0x0c],
        'L' => [0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x1f],
        'O' => [0x0e, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0e],
        'R' => [0x1e, 0x11, 0x11, 0x1e, 0x14, 0x12, 0x11],
        'S' => [0x0f, 0x10, 0x10, 0x0e, 0x01, 0x01, 0x1e],
        'T' => [0x1f, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04],
        _ => return None,
    };
    Some(rows)
}

/// Draw `text` centered on the image. Characters without a glyph are skipped.
fn draw_label(img: &mut RgbImage, text: &str) {
    let glyphs: Vec<[u8; 7]> = text.chars().filter_map(glyph).collect();
    if glyphs.is_empty() {
        return;
    }

    let advance = 6 * GLYPH_SCALE;
    let width = glyphs.len() as i32 * advance - GLYPH_SCALE;
    let height = 7 * GLYPH_SCALE;
    let center = THUMBNAIL_SIZE as i32 / 2;
    let origin_x = center - width / 2;
    let origin_y = center - height / 2;

    for (i, rows) in glyphs.iter().enumerate() {
        let gx = origin_x + i as i32 * advance;
        for (row, bits) in rows.iter().enumerate() {
            for col in 0..5 {
                if bits & (0x10 >> col) == 0 {
                    continue;
                }
                for dy in 0..GLYPH_SCALE {
                    for dx in 0..GLYPH_SCALE {
                        let x = gx + col * GLYPH_SCALE + dx;
                        let y = origin_y + row as i32 * GLYPH_SCALE + dy;
                        if (0..THUMBNAIL_SIZE as i32).contains(&x)
                            && (0..THUMBNAIL_SIZE as i32).contains(&y)
                        {
                            img.put_pixel(x as u32, y as u32, LABEL);
                        }
                    }
                }
            }
        }
    }
}
