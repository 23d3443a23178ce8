//! Key-value and label proximity scanning of free-form output.

use super::labels::LabelIndex;
use crate::fields::locate_value;
use crate::models::field::FieldSpec;

/// Values captured after `Label:` separators, aligned with the field list.
///
/// A value runs to the next recognized label or the end of the line;
/// when nothing follows the separator the next non-empty line is used.
/// The first occurrence carrying a value wins.
pub(crate) fn key_values(text: &str, labels: &LabelIndex, field_count: usize) -> Vec<Option<String>> {
    let mut values = vec![None; field_count];
    let matches = labels.key_values(text);

    for (i, label) in matches.iter().enumerate() {
        if values[label.field].is_some() {
            continue;
        }

        let limit = matches.get(i + 1).map_or(text.len(), |next| next.start);
        let line_end = text[label.end..]
            .find('\n')
            .map_or(text.len(), |p| label.end + p);

        let mut value = clean_value(&text[label.end..line_end.min(limit)]);
        if value.is_empty() && line_end < limit {
            value = text[line_end..limit]
                .lines()
                .map(clean_value)
                .find(|l| !l.is_empty())
                .unwrap_or_default();
        }

        if !value.is_empty() {
            values[label.field] = Some(value.to_string());
        }
    }

    values
}

/// Search prose for a label of the field and take the most plausible
/// value within `window` characters after it.
///
/// The window also stops at the next label of another field. Occurrences
/// with no plausible value are skipped.
pub(crate) fn proximity(
    text: &str,
    labels: &LabelIndex,
    field: usize,
    spec: &FieldSpec,
    window: usize,
) -> Option<String> {
    let mentions = labels.mentions(text);

    for (i, mention) in mentions.iter().enumerate() {
        if mention.field != field {
            continue;
        }

        let next_label = mentions[i + 1..]
            .iter()
            .find(|m| m.field != field)
            .map_or(text.len(), |m| m.start);
        let window_end = text[mention.end..]
            .char_indices()
            .nth(window)
            .map_or(text.len(), |(p, _)| mention.end + p);

        let span = &text[mention.end..window_end.min(next_label)];
        if let Some(found) = locate_value(span, spec) {
            return Some(found.value);
        }
    }

    None
}

/// Strip separators, quotes and markup left around a captured value.
fn clean_value(raw: &str) -> &str {
    let markup = |c: char| matches!(c, '"' | '\'' | '`' | '*' | '_') || c.is_whitespace();
    raw.trim_matches(markup)
        .trim_end_matches(|c: char| matches!(c, ',' | ';' | '}' | ']') || markup(c))
}
