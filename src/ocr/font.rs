use anyhow::{Context, Result, anyhow};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use ttf_parser::{Face, name_id};
use unicode_segmentation::UnicodeSegmentation;
use usvg::fontdb;

use super::engine::TextMeasure;

/// Parsed font face used to measure overlay text before it is rendered.
/// Horizontal advances are read once when the font is loaded.
#[derive(Clone)]
pub struct FontMetrics {
    data: Arc<Vec<u8>>,
    face_index: u32,
    units_per_em: f32,
    ascender_units: f32,
    line_height_units: f32,
    space_advance: u16,
    advances: Arc<HashMap<char, u16>>,
    family: Option<String>,
}

impl std::fmt::Debug for FontMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontMetrics")
            .field("family", &self.family)
            .field("face_index", &self.face_index)
            .field("units_per_em", &self.units_per_em)
            .field("glyphs", &self.advances.len())
            .finish()
    }
}

impl FontMetrics {
    pub fn family(&self) -> Option<&str> {
        self.family.as_deref()
    }

    pub fn data(&self) -> &[u8] {
        self.data.as_ref()
    }

    /// Distance from the top of a line to its baseline, as a fraction of the size.
    pub fn ascent_ratio(&self) -> f32 {
        (self.ascender_units / self.units_per_em).clamp(0.5, 1.2)
    }

    fn from_data(data: Vec<u8>, preferred_family: Option<&str>) -> Result<Self> {
        let data = Arc::new(data);
        let count = ttf_parser::fonts_in_collection(&data).unwrap_or(1);
        let mut first = None;
        let mut matched = None;
        for index in 0..count {
            let Ok(face) = Face::parse(&data, index) else {
                continue;
            };
            let family = family_name(&face);
            if let (Some(wanted), Some(found)) = (preferred_family, family.as_deref())
                && found.eq_ignore_ascii_case(wanted)
            {
                matched = Some((index, family));
                break;
            }
            if first.is_none() {
                first = Some((index, family));
            }
        }
        let (index, family) = matched
            .or(first)
            .ok_or_else(|| anyhow!("failed to parse font data"))?;
        let face = Face::parse(&data, index)
            .map_err(|err| anyhow!("failed to parse font face {}: {}", index, err))?;

        let units_per_em = face.units_per_em().max(1);
        Ok(FontMetrics {
            face_index: index,
            units_per_em: units_per_em as f32,
            ascender_units: face.ascender() as f32,
            line_height_units: (face.ascender() as f32 - face.descender() as f32)
                .max(units_per_em as f32),
            space_advance: face
                .glyph_index(' ')
                .and_then(|id| face.glyph_hor_advance(id))
                .unwrap_or(units_per_em / 2),
            advances: Arc::new(glyph_advances(&face)),
            family,
            data: Arc::clone(&data),
        })
    }
}

/// Advance width of every mapped codepoint in the face's Unicode cmaps.
fn glyph_advances(face: &Face<'_>) -> HashMap<char, u16> {
    let mut advances = HashMap::new();
    let Some(cmap) = face.tables().cmap else {
        return advances;
    };
    for subtable in cmap.subtables {
        if !subtable.is_unicode() {
            continue;
        }
        subtable.codepoints(|codepoint| {
            if let Some(ch) = char::from_u32(codepoint)
                && let Some(glyph) = subtable.glyph_index(codepoint)
                && let Some(advance) = face.glyph_hor_advance(glyph)
            {
                advances.entry(ch).or_insert(advance);
            }
        });
    }
    advances
}

impl TextMeasure for FontMetrics {
    /// Scale from font units to pixels.
    type Font = f32;

    fn font(&self, size: u32) -> f32 {
        size as f32 / self.units_per_em
    }

    fn measure(&self, text: &str, scale: &f32) -> (f32, f32) {
        let advance: u32 = text
            .chars()
            .filter(|ch| *ch != '\n')
            .map(|ch| self.advances.get(&ch).copied().unwrap_or(self.space_advance) as u32)
            .sum();
        (advance as f32 * scale, self.line_height_units * scale)
    }
}

/// Width estimate from per-character classes, for when no font file is available.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicMeasure;

impl HeuristicMeasure {
    /// Width of one grapheme cluster. Combining marks ride on the base
    /// character and add nothing.
    fn cluster_units(cluster: &str) -> f32 {
        let Some(ch) = cluster.chars().next() else {
            return 0.0;
        };
        if ch.is_whitespace() {
            0.25
        } else if ch.is_ascii_alphanumeric() {
            0.55
        } else if ch.is_ascii() {
            0.35
        } else if matches!(
            ch as u32,
            0x4E00..=0x9FFF | 0x3040..=0x30FF | 0x31F0..=0x31FF
        ) {
            1.0
        } else {
            0.6
        }
    }

    fn units(text: &str) -> f32 {
        text.graphemes(true)
            .filter(|cluster| *cluster != "\n")
            .map(Self::cluster_units)
            .sum()
    }
}

impl TextMeasure for HeuristicMeasure {
    type Font = u32;

    fn font(&self, size: u32) -> u32 {
        size
    }

    fn measure(&self, text: &str, size: &u32) -> (f32, f32) {
        let size = *size as f32;
        (Self::units(text) * size, size * 1.2)
    }
}

pub fn load_font_metrics(path: &Path) -> Result<FontMetrics> {
    let data =
        std::fs::read(path).with_context(|| format!("failed to read font: {}", path.display()))?;
    FontMetrics::from_data(data, None)
        .with_context(|| format!("failed to parse font: {}", path.display()))
}

/// Loads the configured font file, or looks the family up among system fonts,
/// or tries `fallback` families in order.
pub fn resolve_overlay_font(
    font_path: Option<&Path>,
    font_family: Option<&str>,
    fallback: &[&str],
) -> Result<FontMetrics> {
    if let Some(path) = font_path {
        return load_font_metrics(path);
    }

    let mut db = fontdb::Database::new();
    db.load_system_fonts();
    if let Some(family) = font_family {
        return system_font(&db, family);
    }
    fallback
        .iter()
        .find_map(|family| system_font(&db, family).ok())
        .ok_or_else(|| anyhow!("no fallback fonts found ({})", fallback.join(", ")))
}

fn system_font(db: &fontdb::Database, family: &str) -> Result<FontMetrics> {
    let families = if family.eq_ignore_ascii_case("sans-serif") {
        vec![fontdb::Family::SansSerif]
    } else {
        vec![fontdb::Family::Name(family)]
    };
    let query = fontdb::Query {
        families: &families,
        ..Default::default()
    };
    let id = db
        .query(&query)
        .ok_or_else(|| anyhow!("font not found: {}", family))?;
    let data = db
        .with_face_data(id, |data, _| data.to_vec())
        .ok_or_else(|| anyhow!("failed to load font data: {}", family))?;
    let preferred = (!family.eq_ignore_ascii_case("sans-serif")).then_some(family);
    FontMetrics::from_data(data, preferred)
}

fn family_name(face: &Face<'_>) -> Option<String> {
    let mut plain = None;
    for name in face.names() {
        if name.name_id == name_id::TYPOGRAPHIC_FAMILY {
            if let Some(value) = name.to_string() {
                return Some(value);
            }
        } else if name.name_id == name_id::FAMILY && plain.is_none() {
            plain = name.to_string();
        }
    }
    plain
}
