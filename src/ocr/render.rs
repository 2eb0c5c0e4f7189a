use anyhow::{Context, Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use resvg::render;
use std::io::Cursor;
use std::sync::Arc;
use tiny_skia::Pixmap;
use usvg::{Options, Tree, fontdb};

use super::engine::PlacedLine;
use super::{EngineId, FusionReport, Layout, Rect};

/// Rendering collaborator. `y` in `draw_text` is the top of the line box.
pub trait Canvas {
    fn fill_rect(&mut self, rect: &Rect, color: &str);
    fn stroke_rect(&mut self, rect: &Rect, color: &str, stroke_width: f32);
    fn draw_text(&mut self, text: &str, x: f32, y: f32, font_size: u32, color: &str);
}

#[derive(Debug, Clone)]
pub struct OverlayStyle {
    pub text_color: String,
    pub fill_color: String,
    pub font_family: Option<String>,
}

/// Builds an SVG document over the source image. Finish with [`SvgCanvas::finish`]
/// and rasterize with [`render_svg_bytes`].
pub struct SvgCanvas {
    body: String,
    font_family: Option<String>,
    ascent_ratio: f32,
}

impl SvgCanvas {
    pub fn new(image_bytes: &[u8], image_mime: &str, width: u32, height: u32) -> Self {
        let data_uri = format!("data:{};base64,{}", image_mime, BASE64.encode(image_bytes));
        let mut body = format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            w = width,
            h = height
        );
        body.push_str(&format!(
            r#"<image href="{uri}" xlink:href="{uri}" x="0" y="0" width="{w}" height="{h}" preserveAspectRatio="none"/>"#,
            uri = data_uri,
            w = width,
            h = height
        ));
        Self {
            body,
            font_family: None,
            ascent_ratio: 0.8,
        }
    }

    pub fn with_font_family(mut self, family: Option<String>) -> Self {
        self.font_family = family;
        self
    }

    pub fn with_ascent_ratio(mut self, ratio: f32) -> Self {
        self.ascent_ratio = ratio;
        self
    }

    pub fn finish(mut self) -> String {
        self.body.push_str("</svg>");
        self.body
    }
}

impl Canvas for SvgCanvas {
    fn fill_rect(&mut self, rect: &Rect, color: &str) {
        self.body.push_str(&format!(
            r#"<rect x="{x}" y="{y}" width="{w}" height="{h}" fill="{fill}"/>"#,
            x = rect.x_min,
            y = rect.y_min,
            w = rect.width(),
            h = rect.height(),
            fill = escape_xml(color)
        ));
    }

    fn stroke_rect(&mut self, rect: &Rect, color: &str, stroke_width: f32) {
        self.body.push_str(&format!(
            r#"<rect x="{x}" y="{y}" width="{w}" height="{h}" fill="none" stroke="{stroke}" stroke-width="{sw}"/>"#,
            x = rect.x_min,
            y = rect.y_min,
            w = rect.width(),
            h = rect.height(),
            stroke = escape_xml(color),
            sw = stroke_width
        ));
    }

    fn draw_text(&mut self, text: &str, x: f32, y: f32, font_size: u32, color: &str) {
        let baseline = y + font_size as f32 * self.ascent_ratio;
        let family = self
            .font_family
            .as_deref()
            .map(|family| format!(r#" font-family="{}""#, escape_xml(family)))
            .unwrap_or_default();
        self.body.push_str(&format!(
            r#"<text x="{x}" y="{y}" font-size="{size}" fill="{color}"{family} xml:space="preserve">{text}</text>"#,
            x = x,
            y = baseline,
            size = font_size,
            color = escape_xml(color),
            family = family,
            text = escape_xml(text)
        ));
    }
}

/// Box color per engine for the fusion overlay.
pub fn origin_color(origin: EngineId) -> &'static str {
    match origin {
        EngineId::DocTr => "#00ff00",
        EngineId::PaddleOcr => "#0000ff",
        EngineId::EasyOcr => "#ff0000",
        EngineId::Tesseract => "#ff8c00",
        EngineId::External => "#808080",
    }
}

const LABEL_SIZE: u32 = 12;

/// Outlines every shown detection in its engine color with a
/// `text conf% (engine)` label just above the box.
pub fn render_fusion_svg(
    image_bytes: &[u8],
    image_mime: &str,
    width: u32,
    height: u32,
    report: &FusionReport,
) -> String {
    let mut canvas = SvgCanvas::new(image_bytes, image_mime, width, height);
    for det in &report.shown {
        let color = origin_color(det.origin);
        canvas.stroke_rect(&det.bbox, color, 2.0);
        let label = format!(
            "{} {:.1}% ({})",
            det.text,
            det.confidence * 100.0,
            det.origin.as_str()
        );
        let top = (det.bbox.y_min - 5.0 - LABEL_SIZE as f32).max(0.0);
        canvas.draw_text(&label, det.bbox.x_min, top, LABEL_SIZE, color);
    }
    canvas.finish()
}

/// Draws the placed lines of `layout` in the overlay text color.
pub(crate) fn draw_lines(
    canvas: &mut dyn Canvas,
    layout: &Layout,
    placed: &[PlacedLine],
    style: &OverlayStyle,
) {
    for line in placed {
        canvas.draw_text(&line.text, line.x, line.y, layout.font_size, &style.text_color);
    }
}

pub fn render_svg_bytes(svg: &str, output_mime: &str, font_data: Option<&[u8]>) -> Result<Vec<u8>> {
    let format = image_format_from_mime(output_mime)
        .ok_or_else(|| anyhow!("unsupported output image mime '{}'", output_mime))?;
    let mut db = fontdb::Database::new();
    db.load_system_fonts();
    if let Some(data) = font_data {
        db.load_font_data(data.to_vec());
    }
    let options = Options {
        fontdb: Arc::new(db),
        ..Options::default()
    };
    let tree = Tree::from_str(svg, &options).with_context(|| "failed to parse SVG")?;
    let size = tree.size().to_int_size();
    let mut pixmap =
        Pixmap::new(size.width(), size.height()).ok_or_else(|| anyhow!("empty SVG size"))?;
    render(&tree, tiny_skia::Transform::identity(), &mut pixmap.as_mut());
    let rgba = image::RgbaImage::from_raw(size.width(), size.height(), pixmap.take())
        .ok_or_else(|| anyhow!("failed to build image buffer from SVG"))?;
    let image = if format == image::ImageFormat::Jpeg {
        image::DynamicImage::ImageRgb8(image::DynamicImage::ImageRgba8(rgba).to_rgb8())
    } else {
        image::DynamicImage::ImageRgba8(rgba)
    };
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), format)
        .with_context(|| "failed to encode image from SVG")?;
    Ok(bytes)
}

pub(crate) fn image_format_from_mime(mime: &str) -> Option<image::ImageFormat> {
    match mime {
        "image/png" => Some(image::ImageFormat::Png),
        "image/jpeg" | "image/jpg" => Some(image::ImageFormat::Jpeg),
        "image/gif" => Some(image::ImageFormat::Gif),
        "image/webp" => Some(image::ImageFormat::WebP),
        "image/bmp" => Some(image::ImageFormat::Bmp),
        "image/tiff" => Some(image::ImageFormat::Tiff),
        _ => None,
    }
}

/// Mime type for an output path, from its extension.
pub(crate) fn mime_from_path(path: &std::path::Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "bmp" => Some("image/bmp"),
        "tif" | "tiff" => Some("image/tiff"),
        _ => None,
    }
}

fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::{Detection, engine::Suppressed};

    #[test]
    fn text_is_escaped_and_placed_on_baseline() {
        let mut canvas = SvgCanvas::new(b"img", "image/png", 10, 10).with_ascent_ratio(0.5);
        canvas.draw_text("a<b & \"c\"", 1.0, 2.0, 10, "#000");
        let svg = canvas.finish();
        assert!(svg.contains(r#"y="7""#));
        assert!(svg.contains("a&lt;b &amp; &quot;c&quot;"));
        assert!(svg.ends_with("</svg>"));
    }

    #[test]
    fn fusion_overlay_uses_engine_colors_and_labels() {
        let report = FusionReport {
            shown: vec![Detection::new(
                "Total",
                Rect::new(10.0, 30.0, 60.0, 50.0),
                0.875,
                EngineId::DocTr,
            )],
            hidden: Vec::<Suppressed>::new(),
        };
        let svg = render_fusion_svg(b"img", "image/png", 100, 100, &report);
        assert!(svg.contains(r##"stroke="#00ff00""##));
        assert!(svg.contains("Total 87.5% (doctr)"));
        assert!(svg.contains(&format!("base64,{}", BASE64.encode(b"img"))));
    }

    #[test]
    fn label_is_clamped_to_top_edge() {
        let report = FusionReport {
            shown: vec![Detection::new(
                "edge",
                Rect::new(0.0, 2.0, 30.0, 12.0),
                0.5,
                EngineId::EasyOcr,
            )],
            hidden: Vec::new(),
        };
        let svg = render_fusion_svg(b"img", "image/png", 100, 100, &report);
        // top 0 + 12 * 0.8
        assert!(svg.contains(r#"y="9.6""#));
    }

    #[test]
    fn mime_lookup() {
        assert_eq!(mime_from_path(std::path::Path::new("out.JPG")), Some("image/jpeg"));
        assert_eq!(mime_from_path(std::path::Path::new("out")), None);
        assert!(image_format_from_mime("image/svg+xml").is_none());
    }
}
