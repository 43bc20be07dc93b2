use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Folds OCR output and expected values into a comparable form: lowercase,
/// no diacritics, punctuation turned into separators, single spaces.
///
/// `normalize(normalize(x)) == normalize(x)` for any input.
pub fn normalize(value: &str) -> String {
    let folded = value
        .to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>();

    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub(crate) fn tokens(normalized: &str) -> Vec<&str> {
    normalized.split(' ').filter(|token| !token.is_empty()).collect()
}
