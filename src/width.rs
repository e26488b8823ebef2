//! Display-width helpers used by the nav rail title truncation.
//!
//! Titles coming from host navigation models may carry ANSI styling; width
//! math strips escapes first so truncation never counts invisible bytes.

use unicode_width::UnicodeWidthStr;

/// Returns the number of terminal columns `text` occupies once ANSI escape
/// sequences are removed.
pub fn display_width(text: &str) -> usize {
    strip_ansi_escapes::strip_str(text).width()
}

/// Truncates `text` to at most `max_width` columns, appending an ellipsis
/// when anything was cut.
pub fn truncate_display(text: &str, max_width: usize) -> String {
    if display_width(text) <= max_width {
        return text.to_string();
    }

    let mut result = String::new();
    let mut width = 0usize;
    for ch in text.chars() {
        let w = display_width(&ch.to_string());
        if width + w >= max_width {
            if width < max_width {
                result.push('…');
            }
            break;
        }
        width += w;
        result.push(ch);
    }
    result
}
