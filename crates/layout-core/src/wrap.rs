//! Width-aware line wrapping for overlay text.
//!
//! The renderer's text overlay has no line breaking of its own, so commentary
//! is split into lines up front. Widths are measured in abstract units: a
//! non-ASCII code point (CJK and other wide glyphs) counts 1.0, anything ASCII
//! counts 0.5. Breaking is per character with no word-boundary logic, which
//! suits CJK text where spaces are rare.

/// Width of a single character in layout units.
pub fn glyph_width(ch: char) -> f64 {
    if ch.is_ascii() {
        0.5
    } else {
        1.0
    }
}

/// Total width of a string in layout units.
pub fn text_width(text: &str) -> f64 {
    text.chars().map(glyph_width).sum()
}

/// Wrap `text` into lines no wider than `max_width_units`.
///
/// Explicit newlines are always hard breaks and empty source lines produce no
/// output. A character is moved to a new line only when adding it would push
/// the running width past the limit, so a line may end exactly at the limit.
/// A single glyph wider than the limit still gets a line of its own.
pub fn wrap(text: &str, max_width_units: f64) -> Vec<String> {
    let mut lines = Vec::new();

    for source_line in text.split('\n') {
        let source_line = source_line.strip_suffix('\r').unwrap_or(source_line);

        let mut current = String::new();
        let mut width = 0.0;
        for ch in source_line.chars() {
            let w = glyph_width(ch);
            if width + w > max_width_units && !current.is_empty() {
                lines.push(std::mem::take(&mut current));
                width = 0.0;
            }
            current.push(ch);
            width += w;
        }

        if !current.is_empty() {
            lines.push(current);
        }
    }

    lines
}
