use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::ocr::{FitStrategy, TypesetOptions, WrapPolicy};

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");

#[derive(Debug, Clone)]
pub struct Settings {
    pub engines: Vec<String>,
    pub tesseract_languages: String,
    pub group_threshold: f32,
    pub min_size: u32,
    pub max_size: u32,
    pub line_spacing: f32,
    pub margin: f32,
    pub min_box: f32,
    pub wrap: WrapPolicy,
    pub strategy: FitStrategy,
    pub target_lang: String,
    pub source_lang: String,
    pub confidence_threshold: f32,
    pub endpoint: String,
    pub overlay_text_color: String,
    pub overlay_fill_color: String,
    pub overlay_font_family: Option<String>,
    pub overlay_font_path: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            engines: vec!["tesseract".to_string()],
            tesseract_languages: "eng".to_string(),
            group_threshold: 10.0,
            min_size: 10,
            max_size: 60,
            line_spacing: 4.0,
            margin: 10.0,
            min_box: 10.0,
            wrap: WrapPolicy::Greedy,
            strategy: FitStrategy::Binary,
            target_lang: "th".to_string(),
            source_lang: "auto".to_string(),
            confidence_threshold: 0.60,
            endpoint: crate::providers::GOOGLE_TRANSLATE_ENDPOINT.to_string(),
            overlay_text_color: "#ff0000".to_string(),
            overlay_fill_color: "#ffffff".to_string(),
            overlay_font_family: None,
            overlay_font_path: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    fusion: Option<FusionSettings>,
    grouping: Option<GroupingSettings>,
    typeset: Option<TypesetSettings>,
    translate: Option<TranslateSettings>,
    overlay: Option<OverlaySettings>,
}

#[derive(Debug, Default, Deserialize)]
struct FusionSettings {
    engines: Option<Vec<String>>,
    tesseract_languages: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct GroupingSettings {
    threshold: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
struct TypesetSettings {
    min_size: Option<u32>,
    max_size: Option<u32>,
    line_spacing: Option<f32>,
    margin: Option<f32>,
    min_box: Option<f32>,
    wrap: Option<WrapPolicy>,
    strategy: Option<FitStrategy>,
}

#[derive(Debug, Default, Deserialize)]
struct TranslateSettings {
    target_lang: Option<String>,
    source_lang: Option<String>,
    confidence_threshold: Option<f32>,
    endpoint: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OverlaySettings {
    text_color: Option<String>,
    fill_color: Option<String>,
    font_family: Option<String>,
    font_path: Option<String>,
}

pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();
    let embedded: SettingsFile = toml::from_str(DEFAULT_SETTINGS_TOML)
        .with_context(|| "failed to parse embedded default settings")?;
    settings.merge(embedded);
    ensure_home_settings_file()?;

    let mut ordered_paths = vec![
        PathBuf::from("settings.toml"),
        PathBuf::from("settings.local.toml"),
    ];

    if let Some(home) = home_dir() {
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join("settings.local.toml"));
    }

    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            let parsed: SettingsFile = toml::from_str(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
            settings.merge(parsed);
        }
    }

    Ok(settings)
}

impl Settings {
    pub fn typeset_options(&self) -> TypesetOptions {
        TypesetOptions {
            min_size: self.min_size,
            max_size: self.max_size,
            line_spacing: self.line_spacing,
            wrap: self.wrap,
            strategy: self.strategy,
        }
    }

    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(fusion) = incoming.fusion {
            if let Some(engines) = fusion.engines {
                self.engines = engines;
            }
            merge_text(&mut self.tesseract_languages, fusion.tesseract_languages);
        }
        if let Some(grouping) = incoming.grouping
            && let Some(threshold) = grouping.threshold
            && threshold >= 0.0
        {
            self.group_threshold = threshold;
        }
        if let Some(typeset) = incoming.typeset {
            if let Some(size) = typeset.min_size
                && size > 0
            {
                self.min_size = size;
            }
            if let Some(size) = typeset.max_size
                && size > 0
            {
                self.max_size = size;
            }
            merge_non_negative(&mut self.line_spacing, typeset.line_spacing);
            merge_non_negative(&mut self.margin, typeset.margin);
            merge_positive(&mut self.min_box, typeset.min_box);
            if let Some(wrap) = typeset.wrap {
                self.wrap = wrap;
            }
            if let Some(strategy) = typeset.strategy {
                self.strategy = strategy;
            }
        }
        if let Some(translate) = incoming.translate {
            merge_text(&mut self.target_lang, translate.target_lang);
            merge_text(&mut self.source_lang, translate.source_lang);
            merge_text(&mut self.endpoint, translate.endpoint);
            if let Some(threshold) = translate.confidence_threshold
                && (0.0..=1.0).contains(&threshold)
            {
                self.confidence_threshold = threshold;
            }
        }
        if let Some(overlay) = incoming.overlay {
            merge_text(&mut self.overlay_text_color, overlay.text_color);
            merge_text(&mut self.overlay_fill_color, overlay.fill_color);
            if let Some(family) = overlay.font_family
                && !family.trim().is_empty()
            {
                self.overlay_font_family = Some(family);
            }
            if let Some(path) = overlay.font_path
                && !path.trim().is_empty()
            {
                self.overlay_font_path = Some(path);
            }
        }
    }
}

fn merge_text(target: &mut String, value: Option<String>) {
    if let Some(value) = value
        && !value.trim().is_empty()
    {
        *target = value;
    }
}

fn merge_positive(target: &mut f32, value: Option<f32>) {
    if let Some(value) = value
        && value > 0.0
    {
        *target = value;
    }
}

fn merge_non_negative(target: &mut f32, value: Option<f32>) {
    if let Some(value) = value
        && value >= 0.0
    {
        *target = value;
    }
}

fn ensure_home_settings_file() -> Result<()> {
    let Some(home) = home_dir() else {
        return Ok(());
    };
    fs::create_dir_all(&home)
        .with_context(|| format!("failed to create settings directory: {}", home.display()))?;
    let path = home.join("settings.toml");
    if !path.exists() {
        fs::write(&path, DEFAULT_SETTINGS_TOML)
            .with_context(|| format!("failed to write settings: {}", path.display()))?;
    }
    Ok(())
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(".ocr-overlay-rust"))
        }
    })
}
