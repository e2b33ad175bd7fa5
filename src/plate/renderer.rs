//! Text-plate rendering: turn a literal text span into a standalone PNG
//! the generation model can replicate pixel-accurately.

use crate::pipeline::types::ImageReference;
use ab_glyph::{point, Font, FontRef, GlyphId, PxScale, ScaleFont};
use image::{DynamicImage, Rgba, RgbaImage};
use imageproc::drawing::draw_text_mut;
use std::io::Cursor;
use std::path::Path;
use tracing::info;

/// Glyph size in pixels. Plates are legibility references, not art.
const PLATE_SCALE: f32 = 96.0;
const BACKGROUND: Rgba<u8> = Rgba([248, 248, 248, 255]);
const FOREGROUND: Rgba<u8> = Rgba([17, 17, 17, 255]);

/// Candidate font files checked when no explicit path is configured.
/// Ordered to prefer faces with Arabic-script coverage.
const SYSTEM_FONT_PATHS: &[&str] = &[
    "/usr/share/fonts/truetype/noto/NotoSansArabic-Regular.ttf",
    "/usr/share/fonts/truetype/noto/NotoNaskhArabic-Regular.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/Library/Fonts/Arial Unicode.ttf",
    "/System/Library/Fonts/Supplemental/Arial Unicode.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Owns the raw font bytes: `ab_glyph` rasterizes from them and `rustybuzz`
/// shapes from them, both borrowing per render.
pub struct PlateRenderer {
    font_data: Vec<u8>,
    scale: PxScale,
}

impl PlateRenderer {
    pub fn from_font_file(path: &Path) -> Result<Self, String> {
        let data = std::fs::read(path)
            .map_err(|e| format!("failed to read font {}: {}", path.display(), e))?;
        Self::from_bytes(data).map_err(|e| format!("unusable font {}: {}", path.display(), e))
    }

    fn from_bytes(data: Vec<u8>) -> Result<Self, String> {
        FontRef::try_from_slice(&data).map_err(|e| e.to_string())?;
        if rustybuzz::Face::from_slice(&data, 0).is_none() {
            return Err("face is not shapeable".to_string());
        }
        Ok(Self {
            font_data: data,
            scale: PxScale::from(PLATE_SCALE),
        })
    }

    /// Probe the known system font locations and use the first that loads.
    pub fn from_system_fonts() -> Result<Self, String> {
        for candidate in SYSTEM_FONT_PATHS {
            let path = Path::new(candidate);
            if path.exists() {
                if let Ok(renderer) = Self::from_font_file(path) {
                    info!("plate renderer using font {}", path.display());
                    return Ok(renderer);
                }
            }
        }
        Err("no usable font found in system font paths".to_string())
    }

    /// Render `text` onto a solid high-contrast plate. Returns `None` for
    /// empty or whitespace-only input; output is deterministic for a given
    /// text and font.
    pub fn render(&self, text: &str) -> Option<ImageReference> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        let font = FontRef::try_from_slice(&self.font_data).ok()?;
        let canvas = if starts_rtl(text) {
            self.render_shaped(&font, text)?
        } else {
            self.render_simple(&font, text)
        };

        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(canvas)
            .write_to(&mut buf, image::ImageFormat::Png)
            .ok()?;

        Some(ImageReference::new(
            plate_name(text),
            "image/png",
            buf.into_inner(),
        ))
    }

    fn render_simple(&self, font: &FontRef, text: &str) -> RgbaImage {
        let scaled = font.as_scaled(self.scale);
        let text_width = measure_width(font, self.scale, text).max(self.scale.x * 0.6);
        let text_height = scaled.ascent() - scaled.descent();
        let margin = self.scale.x * 0.5;

        let width = (text_width + margin * 2.0).ceil() as u32;
        let height = (text_height + margin * 2.0).ceil() as u32;

        let mut canvas = RgbaImage::from_pixel(width, height, BACKGROUND);
        draw_text_mut(
            &mut canvas,
            FOREGROUND,
            margin as i32,
            margin as i32,
            self.scale,
            font,
            text,
        );
        canvas
    }

    /// Shape right-to-left text with rustybuzz so joining scripts come out
    /// in their contextual forms and visual order, then rasterize the
    /// positioned glyphs.
    fn render_shaped(&self, font: &FontRef, text: &str) -> Option<RgbaImage> {
        let face = rustybuzz::Face::from_slice(&self.font_data, 0)?;
        let mut buffer = rustybuzz::UnicodeBuffer::new();
        buffer.push_str(text);
        buffer.guess_segment_properties();
        let shaped = rustybuzz::shape(&face, &[], buffer);

        let scaled = font.as_scaled(self.scale);
        // Shaped advances/offsets are in font units.
        let px_per_unit = scaled.h_scale_factor();

        let infos = shaped.glyph_infos();
        let positions = shaped.glyph_positions();

        let line_width: f32 = positions
            .iter()
            .map(|p| p.x_advance as f32 * px_per_unit)
            .sum();
        let line_width = line_width.max(self.scale.x * 0.6);
        let margin = self.scale.x * 0.5;

        let width = (line_width + margin * 2.0).ceil() as u32;
        let height = (scaled.ascent() - scaled.descent() + margin * 2.0).ceil() as u32;

        let mut canvas = RgbaImage::from_pixel(width, height, BACKGROUND);
        let baseline = margin + scaled.ascent();
        let mut pen_x = margin;

        for (info, pos) in infos.iter().zip(positions) {
            let glyph = GlyphId(info.glyph_id as u16).with_scale_and_position(
                self.scale,
                point(
                    pen_x + pos.x_offset as f32 * px_per_unit,
                    baseline - pos.y_offset as f32 * px_per_unit,
                ),
            );
            if let Some(outline) = font.outline_glyph(glyph) {
                let bounds = outline.px_bounds();
                outline.draw(|x, y, coverage| {
                    let px = bounds.min.x as i32 + x as i32;
                    let py = bounds.min.y as i32 + y as i32;
                    if px >= 0
                        && py >= 0
                        && (px as u32) < canvas.width()
                        && (py as u32) < canvas.height()
                    {
                        let pixel = canvas.get_pixel_mut(px as u32, py as u32);
                        *pixel = blend(*pixel, FOREGROUND, coverage);
                    }
                });
            }
            pen_x += pos.x_advance as f32 * px_per_unit;
        }

        Some(canvas)
    }
}

fn blend(under: Rgba<u8>, over: Rgba<u8>, coverage: f32) -> Rgba<u8> {
    let c = coverage.clamp(0.0, 1.0);
    let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * c).round() as u8;
    Rgba([
        mix(under[0], over[0]),
        mix(under[1], over[1]),
        mix(under[2], over[2]),
        255,
    ])
}

/// Whether the first strong-direction character is right-to-left
/// (Hebrew, Arabic, Persian ranges and their presentation forms).
fn starts_rtl(text: &str) -> bool {
    for c in text.chars() {
        let code = c as u32;
        let rtl = (0x0590..=0x08FF).contains(&code)
            || (0xFB1D..=0xFDFF).contains(&code)
            || (0xFE70..=0xFEFF).contains(&code);
        if rtl {
            return true;
        }
        if c.is_ascii_alphanumeric() {
            return false;
        }
    }
    false
}

fn measure_width(font: &FontRef, scale: PxScale, text: &str) -> f32 {
    let scaled = font.as_scaled(scale);
    let mut width = 0.0f32;
    let mut prev = None;
    for c in text.chars() {
        let glyph_id = scaled.glyph_id(c);
        if let Some(prev_id) = prev {
            width += scaled.kern(prev_id, glyph_id);
        }
        width += scaled.h_advance(glyph_id);
        prev = Some(glyph_id);
    }
    width
}

fn plate_name(text: &str) -> String {
    let slug: String = text
        .chars()
        .take(24)
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect();
    if slug.chars().all(|c| c == '_') {
        "text_plate.png".to_string()
    } else {
        format!("text_plate_{}.png", slug)
    }
}
