use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use ocr_overlay_rust::{FuseConfig, TranslateConfig};

#[derive(Parser, Debug)]
#[command(
    name = "ocr-overlay-rust",
    version,
    about = "Fuse OCR detections and overlay translated text on images"
)]
struct Cli {
    /// Enable verbose logging
    #[arg(long = "verbose", global = true)]
    verbose: bool,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings", global = true)]
    read_settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fuse detections from several engines and draw them over the image
    Fuse {
        /// Source image
        #[arg(short = 'i', long = "image")]
        image: PathBuf,

        /// Detection JSON (EasyOCR, PaddleOCR, docTR or native). Prefix with
        /// `engine=` to set the engine id, e.g. `paddle=page.json`
        #[arg(short = 'd', long = "detections")]
        detections: Vec<String>,

        /// Also run the tesseract CLI
        #[arg(long = "tesseract")]
        tesseract: bool,

        /// Output image (.svg, .png, .jpg, ...)
        #[arg(short = 'o', long = "output")]
        output: PathBuf,

        /// Write the fusion report as JSON
        #[arg(long = "report")]
        report: Option<PathBuf>,
    },
    /// Translate grouped text regions and typeset them over the image
    Translate {
        /// Source image
        #[arg(short = 'i', long = "image")]
        image: PathBuf,

        /// Detection JSON to read text regions from
        #[arg(short = 'd', long = "detections", conflicts_with = "tesseract")]
        detections: Option<String>,

        /// Detect text with the tesseract CLI
        #[arg(long = "tesseract")]
        tesseract: bool,

        /// Re-recognize each region crop with tesseract before translating
        #[arg(long = "reread")]
        reread: bool,

        /// Output image (.svg, .png, .jpg, ...)
        #[arg(short = 'o', long = "output")]
        output: PathBuf,

        /// Target language (default from settings: th)
        #[arg(short = 'l', long = "lang")]
        lang: Option<String>,

        /// Grouping distance in pixels
        #[arg(short = 't', long = "threshold")]
        threshold: Option<f32>,

        /// Draw the recognized text without translating it
        #[arg(long = "no-translate")]
        no_translate: bool,

        /// Write the per-region report as JSON
        #[arg(long = "report")]
        report: Option<PathBuf>,
    },
    /// List installed tesseract languages
    Languages,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    ocr_overlay_rust::logging::init(cli.verbose)?;

    let output = match cli.command {
        Command::Fuse {
            image,
            detections,
            tesseract,
            output,
            report,
        } => ocr_overlay_rust::run_fuse(FuseConfig {
            image,
            detections,
            tesseract,
            output,
            report,
            settings_path: cli.read_settings,
        })?,
        Command::Translate {
            image,
            detections,
            tesseract,
            reread,
            output,
            lang,
            threshold,
            no_translate,
            report,
        } => {
            ocr_overlay_rust::run_translate(TranslateConfig {
                image,
                detections,
                tesseract,
                reread,
                output,
                lang,
                threshold,
                no_translate,
                report,
                settings_path: cli.read_settings,
            })
            .await?
        }
        Command::Languages => ocr_overlay_rust::ocr::list_tesseract_languages()?.join("\n"),
    };
    println!("{}", output);
    Ok(())
}
