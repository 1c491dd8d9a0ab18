use crate::text::measure::TextMeasure;

/// A quote's source text paired with the pixel budget it must wrap into.
///
/// Immutable once constructed; wrapped lines are derived on demand so the
/// typewriter animation can re-wrap partial text every frame.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TextBlock {
    pub text: String,
    pub max_width_px: f64,
}

impl TextBlock {
    pub fn new(text: impl Into<String>, max_width_px: f64) -> Self {
        Self {
            text: text.into(),
            max_width_px,
        }
    }

    pub fn wrapped(&self, measure: &dyn TextMeasure) -> Vec<String> {
        wrap(&self.text, self.max_width_px, measure)
    }

    /// Character count of the raw text, spaces and newlines included.
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

/// Greedy word-wrap of `text` into lines measuring at most `max_width_px`.
///
/// Explicit newlines split paragraphs first; each paragraph wraps
/// independently and an empty paragraph contributes one empty line, so blank
/// lines in the source keep their spacing. Within a paragraph, words are
/// appended to the current line while the tentative line still fits, then the
/// line is flushed and the word starts a new one.
///
/// A single word wider than the budget is emitted as an over-wide line rather
/// than split or rejected. Never fails: the empty string wraps to one empty
/// line.
pub fn wrap(text: &str, max_width_px: f64, measure: &dyn TextMeasure) -> Vec<String> {
    let mut out = Vec::new();
    for paragraph in text.split('\n') {
        wrap_paragraph(paragraph, max_width_px, measure, &mut out);
    }
    out
}

fn wrap_paragraph(
    paragraph: &str,
    max_width_px: f64,
    measure: &dyn TextMeasure,
    out: &mut Vec<String>,
) {
    let mut words = paragraph.split_whitespace();
    let Some(first) = words.next() else {
        out.push(String::new());
        return;
    };

    let mut current = first.to_string();
    for word in words {
        let mut tentative = String::with_capacity(current.len() + 1 + word.len());
        tentative.push_str(&current);
        tentative.push(' ');
        tentative.push_str(word);

        if measure.width_px(&tentative) <= max_width_px {
            current = tentative;
        } else {
            out.push(std::mem::replace(&mut current, word.to_string()));
        }
    }
    out.push(current);
}

/// Widest line and total block height for already-wrapped lines.
///
/// Block height is `n * line_height + (n - 1) * line_gap_px`; an empty slice
/// measures (0, 0).
pub fn block_size(lines: &[String], measure: &dyn TextMeasure, line_gap_px: f64) -> (f64, f64) {
    if lines.is_empty() {
        return (0.0, 0.0);
    }
    let width = lines
        .iter()
        .map(|l| measure.width_px(l))
        .fold(0.0, f64::max);
    let n = lines.len() as f64;
    let height = n * measure.line_height_px() + (n - 1.0) * line_gap_px;
    (width, height)
}
