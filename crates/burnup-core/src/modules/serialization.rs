use serde::Serialize;
use std::fs;
use std::path::Path;

/// Scientific notation with a signed, at least two-digit exponent (`1.502000e+00`),
/// the form material card readers expect.
pub fn format_scientific(value: f64, precision: usize) -> String {
    let rendered = format!("{value:.precision$e}", precision = precision);
    let Some((mantissa, exponent)) = rendered.split_once('e') else {
        return rendered;
    };
    let (sign, digits) = match exponent.strip_prefix('-') {
        Some(digits) => ('-', digits),
        None => ('+', exponent),
    };
    format!("{mantissa}e{sign}{digits:0>2}")
}

pub fn normalize_text_artifact(content: &str) -> String {
    let mut normalized = content.replace("\r\n", "\n").replace('\r', "\n");
    if !normalized.is_empty() && !normalized.ends_with('\n') {
        normalized.push('\n');
    }
    normalized
}

pub fn write_text_artifact(path: &Path, content: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, normalize_text_artifact(content))
}

pub fn write_json_artifact<T: Serialize>(path: &Path, value: &T) -> std::io::Result<()> {
    let rendered = serde_json::to_string_pretty(value).map_err(std::io::Error::other)?;
    write_text_artifact(path, &rendered)
}
