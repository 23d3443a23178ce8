//! Field label matching.
//!
//! All accepted label spellings of all fields are compiled into a single
//! alternation, longest first, so the longest synonym wins when several
//! start at the same position. Key-value labels must make up the whole
//! key: `Tax Amount:` is not a `Total` key even though `amount` is one of
//! its synonyms.

use std::collections::HashMap;

use regex::Regex;

use crate::models::field::{FieldSpec, normalize_label};

/// A label occurrence in model output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LabelMatch {
    /// Index of the field in the parser's spec list.
    pub field: usize,
    /// Start of the match: the key's line start or delimiter for
    /// key-value matches, the label for mentions.
    pub start: usize,
    /// End of the match: after the separator for key-value matches,
    /// after the label for mentions.
    pub end: usize,
}

/// Compiled label patterns for a fixed set of fields.
#[derive(Debug, Clone)]
pub(crate) struct LabelIndex {
    key_value: Regex,
    mention: Regex,
    lookup: HashMap<String, usize>,
}

impl LabelIndex {
    pub fn new(specs: &[FieldSpec]) -> Result<Self, regex::Error> {
        let mut lookup = HashMap::new();
        for (index, spec) in specs.iter().enumerate() {
            for label in spec.labels() {
                let label = normalize_label(label);
                if !label.is_empty() {
                    lookup.entry(label).or_insert(index);
                }
            }
        }

        let mut labels: Vec<&String> = lookup.keys().collect();
        labels.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

        let alternation = if labels.is_empty() {
            // Matches nothing
            r"\b\B".to_string()
        } else {
            labels
                .iter()
                .map(|l| label_pattern(l))
                .collect::<Vec<_>>()
                .join("|")
        };

        // A key starts a line or follows `,` `;` `{` `(` `[`, with only
        // bullets, list numbers, quotes or emphasis in front of the label.
        let key_value = Regex::new(&format!(
            r#"(?im)(?:^|[,;{{(\[])[ \t]*(?:(?:[-*+>#•]|\d+[.)])[ \t]*)*[ \t"'*_`]*(?P<label>{alternation})(?:[ \t]*(?:#|no\.|no\b))?[ \t"'*_`]*[:=][ \t*_]*"#
        ))?;
        let mention = Regex::new(&format!(r"(?i)(?P<label>{alternation})"))?;

        Ok(Self {
            key_value,
            mention,
            lookup,
        })
    }

    /// `Label: value` separators in document order.
    pub fn key_values(&self, text: &str) -> Vec<LabelMatch> {
        self.collect(&self.key_value, text)
    }

    /// Bare label occurrences in document order.
    pub fn mentions(&self, text: &str) -> Vec<LabelMatch> {
        self.collect(&self.mention, text)
    }

    fn collect(&self, pattern: &Regex, text: &str) -> Vec<LabelMatch> {
        pattern
            .captures_iter(text)
            .filter_map(|caps| {
                let full_match = caps.get(0)?;
                let label = caps.name("label")?;
                let field = *self.lookup.get(&normalize_label(label.as_str()))?;
                Some(LabelMatch {
                    field,
                    start: full_match.start(),
                    end: full_match.end(),
                })
            })
            .collect()
    }
}

/// Regex for one normalized label: words may be joined by any run of
/// whitespace, `_` or `-`.
fn label_pattern(label: &str) -> String {
    let body = label
        .split(' ')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(r"[\s_\-]+");

    let starts_word = label.chars().next().is_some_and(|c| c.is_alphanumeric());
    let ends_word = label.chars().last().is_some_and(|c| c.is_alphanumeric());

    format!(
        "{}{}{}",
        if starts_word { r"\b" } else { "" },
        body,
        if ends_word { r"\b" } else { "" }
    )
}
