use crate::ocr::{Detection, EngineId, Rect, TextMeasure};

pub(crate) fn with_temp_home<F, R>(func: F) -> R
where
    F: FnOnce(&std::path::Path) -> R,
{
    static HOME_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());
    let _guard = HOME_MUTEX
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    let dir = tempfile::tempdir().expect("tempdir");
    let old_home = std::env::var("HOME").ok();
    // Serialized by HOME_MUTEX.
    unsafe { std::env::set_var("HOME", dir.path()) };
    let result = func(dir.path());
    match old_home {
        Some(old) => unsafe { std::env::set_var("HOME", old) },
        None => unsafe { std::env::remove_var("HOME") },
    }
    result
}

/// Monospace stand-in: `w = chars * size * 0.6`, `h = size * 1.2`.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct StubMeasure;

impl TextMeasure for StubMeasure {
    type Font = u32;

    fn font(&self, size: u32) -> u32 {
        size
    }

    fn measure(&self, text: &str, size: &u32) -> (f32, f32) {
        let size = *size as f32;
        (text.chars().count() as f32 * size * 0.6, size * 1.2)
    }
}

pub(crate) fn det(
    text: &str,
    (x_min, y_min, x_max, y_max): (f32, f32, f32, f32),
    confidence: f32,
    origin: EngineId,
) -> Detection {
    Detection::new(text, Rect::new(x_min, y_min, x_max, y_max), confidence, origin)
}
