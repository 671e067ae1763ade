// Utility functions
use std::path::Path;

/// Достаёт цену в тенге из текста вида «150 000 ₸».
pub fn parse_price(text: &str) -> Option<f64> {
    let before_currency = text.split('₸').next()?;
    if before_currency.len() == text.len() {
        return None;
    }
    let digits: String = before_currency
        .chars()
        .rev()
        .skip_while(|c| c.is_whitespace())
        .take_while(|c| c.is_ascii_digit() || c.is_whitespace())
        .filter(|c| c.is_ascii_digit())
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    digits.parse::<f64>().ok()
}

/// File name without extension, used as the prefix of output chunks.
pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string())
}

/// Replaces characters that are unsafe in file names.
pub fn to_file_slug(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}
