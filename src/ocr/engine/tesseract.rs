use anyhow::{Context, Result, anyhow};
use image::DynamicImage;
use std::io::Write;
use std::path::Path;
use std::process::Command;
use tracing::warn;

use crate::ocr::{EngineId, RawDetection};

use super::OcrEngine;
use super::parse::parse_tsv_words;
use super::preprocess::prepare_for_ocr;

pub fn list_tesseract_languages() -> Result<Vec<String>> {
    let output = Command::new("tesseract")
        .arg("--list-langs")
        .output()
        .with_context(|| "failed to run tesseract --list-langs")?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!("tesseract --list-langs failed: {}", stderr.trim()));
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    // First line is the "List of available languages" banner.
    Ok(stdout
        .lines()
        .skip(1)
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

/// Word-level detections from the `tesseract` CLI.
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    languages: String,
}

impl TesseractEngine {
    /// Keeps the requested languages that are installed. Fails when none are.
    pub fn new(requested: &str) -> Result<Self> {
        let languages = match list_tesseract_languages() {
            Ok(available) => select_languages(requested, &available)?,
            Err(err) => {
                warn!("could not list tesseract languages: {:#}", err);
                requested.trim().to_string()
            }
        };
        if languages.is_empty() {
            return Err(anyhow!("ocr languages is empty"));
        }
        Ok(Self { languages })
    }

    fn run_tsv(&self, path: &Path) -> Result<String> {
        let output = Command::new("tesseract")
            .arg(path)
            .arg("stdout")
            .arg("-l")
            .arg(&self.languages)
            // Sparse text: find as much text as possible in no particular order.
            .arg("--psm")
            .arg("11")
            .arg("tsv")
            .output()
            .with_context(|| "failed to run tesseract (is it installed?)")?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("tesseract failed: {}", stderr.trim()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

impl OcrEngine for TesseractEngine {
    fn id(&self) -> EngineId {
        EngineId::Tesseract
    }

    fn detect(&self, image: &DynamicImage) -> Result<Vec<RawDetection>> {
        let (prepared, scale) = prepare_for_ocr(image);
        let mut tmp = tempfile::Builder::new()
            .suffix(".png")
            .tempfile()
            .with_context(|| "failed to create temp file for OCR")?;
        DynamicImage::ImageLuma8(prepared)
            .write_to(&mut tmp, image::ImageFormat::Png)
            .with_context(|| "failed to write temp image for OCR")?;
        tmp.flush().ok();

        let tsv = self.run_tsv(tmp.path())?;
        let inverse = 1.0 / scale.max(1) as f32;
        Ok(parse_tsv_words(&tsv)
            .into_iter()
            .map(|mut det| {
                for point in &mut det.polygon {
                    point.x *= inverse;
                    point.y *= inverse;
                }
                det
            })
            .collect())
    }
}

fn select_languages(requested: &str, available: &[String]) -> Result<String> {
    let mut chosen = Vec::new();
    let mut missing = Vec::new();
    for lang in requested
        .split(['+', ',', ' '])
        .map(str::trim)
        .filter(|lang| !lang.is_empty())
    {
        if available.iter().any(|value| value == lang) {
            chosen.push(lang);
        } else {
            missing.push(lang);
        }
    }
    if chosen.is_empty() {
        return Err(anyhow!(
            "ocr language(s) not available: {} (available: {})",
            missing.join(", "),
            available.join(", ")
        ));
    }
    if !missing.is_empty() {
        warn!("ocr language(s) not available: {}", missing.join(", "));
    }
    Ok(chosen.join("+"))
}
