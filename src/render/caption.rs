//! Minimal bitmap text for canvas captions.
//!
//! Glyphs are 3x5 cells scaled by an integer factor. Lowercase letters are
//! drawn as uppercase; characters without a glyph are drawn as `?`.

use image::{Rgba, RgbaImage};

const GLYPH_WIDTH: u32 = 3;
const GLYPH_HEIGHT: u32 = 5;
/// Horizontal advance per character, in cells.
const ADVANCE: u32 = GLYPH_WIDTH + 1;

/// Rows of a glyph, most significant of the low three bits is the left column.
fn glyph(c: char) -> [u8; 5] {
    match c.to_ascii_uppercase() {
        'A' => [0b010, 0b101, 0b111, 0b101, 0b101],
        'B' => [0b110, 0b101, 0b110, 0b101, 0b110],
        'C' => [0b011, 0b100, 0b100, 0b100, 0b011],
        'D' => [0b110, 0b101, 0b101, 0b101, 0b110],
        'E' => [0b111, 0b100, 0b110, 0b100, 0b111],
        'F' => [0b111, 0b100, 0b110, 0b100, 0b100],
        'G' => [0b011, 0b100, 0b101, 0b101, 0b011],
        'H' => [0b101, 0b101, 0b111, 0b101, 0b101],
        'I' => [0b111, 0b010, 0b010, 0b010, 0b111],
        'J' => [0b001, 0b001, 0b001, 0b101, 0b010],
        'K' => [0b101, 0b101, 0b110, 0b101, 0b101],
        'L' => [0b100, 0b100, 0b100, 0b100, 0b111],
        'M' => [0b101, 0b111, 0b111, 0b101, 0b101],
        'N' => [0b110, 0b101, 0b101, 0b101, 0b101],
        'O' => [0b010, 0b101, 0b101, 0b101, 0b010],
        'P' => [0b110, 0b101, 0b110, 0b100, 0b100],
        'Q' => [0b010, 0b101, 0b101, 0b110, 0b011],
        'R' => [0b110, 0b101, 0b110, 0b101, 0b101],
        'S' => [0b011, 0b100, 0b010, 0b001, 0b110],
        'T' => [0b111, 0b010, 0b010, 0b010, 0b010],
        'U' => [0b101, 0b101, 0b101, 0b101, 0b111],
        'V' => [0b101, 0b101, 0b101, 0b101, 0b010],
        'W' => [0b101, 0b101, 0b111, 0b111, 0b101],
        'X' => [0b101, 0b101, 0b010, 0b101, 0b101],
        'Y' => [0b101, 0b101, 0b010, 0b010, 0b010],
        'Z' => [0b111, 0b001, 0b010, 0b100, 0b111],
        '0' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b110, 0b001, 0b010, 0b100, 0b111],
        '3' => [0b110, 0b001, 0b010, 0b001, 0b110],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' => [0b111, 0b100, 0b110, 0b001, 0b110],
        '6' => [0b011, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b010, 0b010, 0b010],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b110],
        ' ' => [0; 5],
        '.' => [0b000, 0b000, 0b000, 0b000, 0b010],
        ',' => [0b000, 0b000, 0b000, 0b010, 0b100],
        ':' => [0b000, 0b010, 0b000, 0b010, 0b000],
        '-' => [0b000, 0b000, 0b111, 0b000, 0b000],
        '_' => [0b000, 0b000, 0b000, 0b000, 0b111],
        '/' => [0b001, 0b001, 0b010, 0b100, 0b100],
        '(' => [0b001, 0b010, 0b010, 0b010, 0b001],
        ')' => [0b100, 0b010, 0b010, 0b010, 0b100],
        _ => [0b110, 0b001, 0b010, 0b000, 0b010],
    }
}

/// Width in pixels of `text` drawn at `scale`.
pub fn text_width(text: &str, scale: u32) -> u32 {
    let chars = text.chars().count() as u32;
    if chars == 0 {
        return 0;
    }
    (chars * ADVANCE - 1) * scale
}

/// Height in pixels of one line at `scale`.
#[inline]
pub fn text_height(scale: u32) -> u32 {
    GLYPH_HEIGHT * scale
}

/// Draw `text` with its top-left corner at (`x`, `y`). Pixels falling
/// outside the image are clipped.
pub fn draw_text(image: &mut RgbaImage, x: i64, y: i64, text: &str, scale: u32, color: Rgba<u8>) {
    let scale = i64::from(scale.max(1));
    let (width, height) = (i64::from(image.width()), i64::from(image.height()));
    for (n, c) in text.chars().enumerate() {
        let origin_x = x + n as i64 * i64::from(ADVANCE) * scale;
        if origin_x >= width {
            break;
        }
        for (row, bits) in glyph(c).iter().enumerate() {
            for col in 0..GLYPH_WIDTH {
                if bits & (0b100 >> col) == 0 {
                    continue;
                }
                let cell_x = origin_x + i64::from(col) * scale;
                let cell_y = y + row as i64 * scale;
                for py in cell_y.max(0)..(cell_y + scale).min(height) {
                    for px in cell_x.max(0)..(cell_x + scale).min(width) {
                        image.put_pixel(px as u32, py as u32, color);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INK: Rgba<u8> = Rgba([255, 0, 0, 255]);

    fn inked(image: &RgbaImage) -> usize {
        image.pixels().filter(|p| **p == INK).count()
    }

    #[test]
    fn test_text_width() {
        assert_eq!(text_width("", 2), 0);
        assert_eq!(text_width("A", 1), 3);
        assert_eq!(text_width("AB", 2), 14);
    }

    #[test]
    fn test_draw_scaled_glyph() {
        let mut image = RgbaImage::new(20, 20);
        draw_text(&mut image, 0, 0, "-", 2, INK);
        // Middle bar: 3 cells of 2x2 pixels on row 2.
        assert_eq!(inked(&image), 12);
        assert_eq!(*image.get_pixel(0, 4), INK);
        assert_eq!(*image.get_pixel(5, 5), INK);
        assert_ne!(*image.get_pixel(0, 3), INK);
    }

    #[test]
    fn test_lowercase_matches_uppercase() {
        let mut upper = RgbaImage::new(40, 10);
        let mut lower = RgbaImage::new(40, 10);
        draw_text(&mut upper, 1, 1, "W6BSD", 1, INK);
        draw_text(&mut lower, 1, 1, "w6bsd", 1, INK);
        assert_eq!(upper, lower);
    }

    #[test]
    fn test_draw_clips_at_edges() {
        let mut image = RgbaImage::new(4, 4);
        draw_text(&mut image, -2, -2, "8888", 3, INK);
        draw_text(&mut image, 100, 100, "X", 1, INK);
        assert!(inked(&image) > 0);
    }
}
