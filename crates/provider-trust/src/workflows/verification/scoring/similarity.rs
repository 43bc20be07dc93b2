/// Best-scoring span of the document text for one expected value.
#[derive(Debug, Clone, PartialEq)]
pub struct SpanMatch {
    pub span: String,
    pub similarity: f64,
    pub start: usize,
}

pub fn levenshtein(a: &str, b: &str) -> usize {
    let a = a.chars().collect::<Vec<_>>();
    let b = b.chars().collect::<Vec<_>>();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut previous = (0..=b.len()).collect::<Vec<_>>();
    let mut current = vec![0; b.len() + 1];
    for (i, left) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, right) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(left != right);
            current[j + 1] = substitution
                .min(previous[j + 1] + 1)
                .min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}

/// Normalized edit similarity in `[0, 1]`; `1.0` only for identical input.
pub fn edit_similarity(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 0.0;
    }
    1.0 - levenshtein(a, b) as f64 / longest as f64
}

/// Compares normalized strings both as written and with spaces removed, since
/// OCR frequently splits or merges registration numbers.
pub fn similarity(expected: &str, candidate: &str) -> f64 {
    let spaced = edit_similarity(expected, candidate);
    let compact = edit_similarity(&compact(expected), &compact(candidate));
    spaced.max(compact)
}

fn compact(value: &str) -> String {
    value.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Candidate spans of `width` tokens, one per start position.
fn windows<'a>(tokens: &'a [&'a str], width: usize) -> impl Iterator<Item = (usize, String)> + 'a {
    let width = width.max(1);
    let count = if tokens.len() >= width {
        tokens.len() - width + 1
    } else {
        0
    };
    (0..count).map(move |start| (start, tokens[start..start + width].join(" ")))
}

/// Slides windows of `n-1`, `n` and `n+1` tokens over the text and keeps the
/// most similar one. Ties resolve to the narrowest, then earliest, window.
pub fn best_match(
    expected: &str,
    expected_tokens: usize,
    text_tokens: &[&str],
) -> Option<SpanMatch> {
    let n = expected_tokens.max(1);
    let widths = [n.saturating_sub(1).max(1), n, n + 1];

    let mut widths = widths.to_vec();
    widths.dedup();

    widths
        .into_iter()
        .flat_map(|width| windows(text_tokens, width))
        .map(|(start, span)| {
            let similarity = similarity(expected, &span);
            SpanMatch {
                span,
                similarity,
                start,
            }
        })
        .fold(None, |best: Option<SpanMatch>, candidate| match best {
            Some(current) if current.similarity >= candidate.similarity => Some(current),
            _ => Some(candidate),
        })
}
