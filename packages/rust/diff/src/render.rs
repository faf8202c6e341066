//! Raster rendering of a [`DiffReport`] to PNG.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use ab_glyph::{Font, FontVec, PxScale, ScaleFont};
use image::{ImageFormat, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use tracing::debug;

use migratebot_shared::{DiffConfig, MigrateError, Result};

use crate::analysis::{DiffAnalysis, Side, intensity};
use crate::layout::{
    DiffReport, FONT_SIZE, LINE_HEIGHT, LINE_NUMBER_RIGHT, RowLayout, TEXT_INSET, TEXT_TOP,
    TextMeasure, WIDTH,
};

// ---------------------------------------------------------------------------
// Palette
// ---------------------------------------------------------------------------

const BACKGROUND: [u8; 3] = [0x12, 0x12, 0x12];
const TEXT_DIM: [u8; 3] = [0x55, 0x55, 0x55];
const LINE_NUMBER: [u8; 3] = [0x44, 0x44, 0x44];
const DIVIDER: [u8; 3] = [0x33, 0x33, 0x33];

const REMOVED_WORD: [u8; 3] = [255, 180, 171];
const ADDED_WORD: [u8; 3] = [183, 240, 217];

const REMOVED_TINT: ([u8; 3], f32) = ([65, 14, 11], 0.5);
const ADDED_TINT: ([u8; 3], f32) = ([0, 55, 30], 0.5);

/// Alpha-composite `fg` over `bg`.
fn blend(fg: [u8; 3], alpha: f32, bg: [u8; 3]) -> [u8; 3] {
    let mix = |f: u8, b: u8| (f as f32 * alpha + b as f32 * (1.0 - alpha)).round() as u8;
    [mix(fg[0], bg[0]), mix(fg[1], bg[1]), mix(fg[2], bg[2])]
}

fn tint_background(side: Side) -> [u8; 3] {
    let (color, alpha) = match side {
        Side::Old => REMOVED_TINT,
        Side::New => ADDED_TINT,
    };
    blend(color, alpha, BACKGROUND)
}

fn word_base(side: Side) -> [u8; 3] {
    match side {
        Side::Old => REMOVED_WORD,
        Side::New => ADDED_WORD,
    }
}

// ---------------------------------------------------------------------------
// Font
// ---------------------------------------------------------------------------

/// Monospace fonts tried when none is configured.
const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSansMono.ttf",
    "/usr/share/fonts/dejavu/DejaVuSansMono.ttf",
    "/usr/share/fonts/TTF/DejaVuSansMono.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationMono-Regular.ttf",
    "/usr/share/fonts/liberation-mono/LiberationMono-Regular.ttf",
    "/System/Library/Fonts/Menlo.ttc",
    "C:\\Windows\\Fonts\\consola.ttf",
];

/// A loaded font at the diff image's text size.
pub struct FontFace {
    font: FontVec,
    scale: PxScale,
}

impl std::fmt::Debug for FontFace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontFace").field("scale", &self.scale).finish()
    }
}

impl FontFace {
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let font = FontVec::try_from_vec(data)
            .map_err(|e| MigrateError::Render(format!("invalid font data: {e}")))?;
        Ok(Self {
            font,
            scale: PxScale::from(FONT_SIZE),
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read(path).map_err(|e| MigrateError::io(path, e))?;
        Self::from_bytes(data)
    }

    /// The configured font, or the first system monospace font found.
    pub fn discover(config: &DiffConfig) -> Result<Self> {
        if let Some(path) = &config.font_path {
            return Self::load(path);
        }
        let path = SYSTEM_FONTS
            .iter()
            .map(PathBuf::from)
            .find(|p| p.is_file())
            .ok_or_else(|| {
                MigrateError::Render("no monospace font found; set diff.font_path".into())
            })?;
        debug!(?path, "using system font");
        Self::load(&path)
    }

    fn draw(&self, img: &mut RgbImage, color: [u8; 3], x: f32, y: u32, text: &str) {
        draw_text_mut(img, Rgb(color), x.round() as i32, y as i32, self.scale, &self.font, text);
    }
}

impl TextMeasure for FontFace {
    fn text_width(&self, text: &str) -> f32 {
        let scaled = self.font.as_scaled(self.scale);
        text.chars()
            .map(|c| scaled.h_advance(scaled.glyph_id(c)))
            .sum()
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn fill(img: &mut RgbImage, x: u32, y: u32, w: u32, h: u32, color: [u8; 3]) {
    if w == 0 || h == 0 {
        return;
    }
    draw_filled_rect_mut(img, Rect::at(x as i32, y as i32).of_size(w, h), Rgb(color));
}

fn draw_column(
    img: &mut RgbImage,
    font: &FontFace,
    analysis: &DiffAnalysis,
    row: &RowLayout,
    side: Side,
) {
    let Some(line) = analysis.line(side, row.index) else {
        return;
    };
    let offset_x = match side {
        Side::Old => 0,
        Side::New => WIDTH / 2,
    };
    let background = if row.weight(side) > 0 {
        tint_background(side)
    } else {
        BACKGROUND
    };

    let number = (row.index + 1).to_string();
    let number_x = (offset_x + LINE_NUMBER_RIGHT) as f32 - font.text_width(&number);
    font.draw(img, LINE_NUMBER, number_x, row.top + TEXT_TOP, &number);

    for (sub, indices) in row.wrap(side).iter().enumerate() {
        let y = row.top + TEXT_TOP + sub as u32 * LINE_HEIGHT;
        let mut x = (offset_x + TEXT_INSET) as f32;
        for &i in indices {
            let Some(token) = line.tokens.get(i) else {
                continue;
            };
            let surplus = analysis.surplus(side, &token.key);
            let color = if surplus > 0 {
                blend(word_base(side), intensity(surplus), background)
            } else {
                TEXT_DIM
            };
            font.draw(img, color, x, y, &token.display);
            x += font.text_width(&format!("{} ", token.display));
        }
    }
}

/// Canvas with row tints and the column divider. Each half is tinted on its own.
fn paint_backgrounds(report: &DiffReport) -> RgbImage {
    let half = report.width / 2;
    let mut img = RgbImage::from_pixel(report.width, report.height, Rgb(BACKGROUND));
    for row in &report.rows {
        if row.weight_old > 0 {
            fill(&mut img, 0, row.top, half, row.height, tint_background(Side::Old));
        }
        if row.weight_new > 0 {
            fill(&mut img, half, row.top, report.width - half, row.height, tint_background(Side::New));
        }
    }
    fill(&mut img, half - 1, 0, 2, report.height, DIVIDER);
    img
}

/// Paint the report and encode it as PNG.
pub fn render(analysis: &DiffAnalysis, report: &DiffReport, font: &FontFace) -> Result<Vec<u8>> {
    let half = report.width / 2;
    let mut img = paint_backgrounds(report);

    for row in &report.rows {
        if row.gap_before {
            let x = half as f32 - font.text_width("...") / 2.0;
            font.draw(&mut img, TEXT_DIM, x, row.top - LINE_HEIGHT, "...");
        }
        draw_column(&mut img, font, analysis, row, Side::Old);
        draw_column(&mut img, font, analysis, row, Side::New);
    }

    let mut png = Vec::new();
    img.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| MigrateError::Render(format!("PNG encoding failed: {e}")))?;
    debug!(
        width = report.width,
        height = report.height,
        bytes = png.len(),
        "diff image rendered"
    );
    Ok(png)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::tests::FixedWidth;

    #[test]
    fn blends_tints_onto_background() {
        assert_eq!(tint_background(Side::Old), [42, 16, 15]);
        assert_eq!(tint_background(Side::New), [9, 37, 24]);
        assert_eq!(blend([255, 255, 255], 1.0, BACKGROUND), [255, 255, 255]);
        assert_eq!(blend([255, 255, 255], 0.0, BACKGROUND), BACKGROUND);
    }

    #[test]
    fn deleted_word_tints_only_the_old_half() {
        let old = "Comments\nComments serve as a sort of documentation.";
        let new = "Comments\nComments serve as a documentation.";
        let analysis = DiffAnalysis::new(old, new);
        let report = crate::layout::layout(&analysis, &FixedWidth).unwrap();
        assert_eq!(report.rows.len(), 1);

        let img = paint_backgrounds(&report);
        let row = &report.rows[0];
        let y = row.top + row.height / 2;
        assert_eq!(img.get_pixel(10, y), &Rgb([42, 16, 15]));
        assert_eq!(img.get_pixel(report.width - 10, y), &Rgb(BACKGROUND));
        assert_eq!(img.get_pixel(report.width / 2, y), &Rgb(DIVIDER));
    }

    #[test]
    fn added_line_tints_only_the_new_half() {
        let analysis = DiffAnalysis::new("kept", "kept\nfresh line");
        let report = crate::layout::layout(&analysis, &FixedWidth).unwrap();

        let img = paint_backgrounds(&report);
        let row = &report.rows[0];
        let y = row.top + row.height / 2;
        assert_eq!(img.get_pixel(10, y), &Rgb(BACKGROUND));
        assert_eq!(img.get_pixel(report.width - 10, y), &Rgb([9, 37, 24]));
    }

    #[test]
    fn invalid_font_is_render_error() {
        assert!(matches!(
            FontFace::from_bytes(vec![0, 1, 2, 3]),
            Err(MigrateError::Render(_))
        ));
    }

    #[test]
    fn missing_configured_font_is_io_error() {
        let config = DiffConfig {
            font_path: Some("/nonexistent/font.ttf".into()),
        };
        assert!(matches!(
            FontFace::discover(&config),
            Err(MigrateError::Io { .. })
        ));
    }
}
