//! Token-budgeted context assembly for prompt injection.
//!
//! Shared by the knowledge base (passages labelled with their source file) and
//! the memory subsystem (passages labelled with their memory kind).

use serde::Serialize;

/// Approximate token accounting: one token per four characters.
pub const CHARS_PER_TOKEN: usize = 4;

/// Separator placed between accepted passages.
pub const PASSAGE_SEPARATOR: &str = "\n\n---\n\n";

/// One ranked passage offered to the assembler.
#[derive(Debug, Clone, PartialEq)]
pub struct Passage {
    /// Header line rendered above the text when labels are included.
    pub label: Option<String>,
    pub text: String,
}

impl Passage {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            label: None,
            text: text.into(),
        }
    }

    /// A knowledge-base passage headed `[Source: <name>]`.
    pub fn sourced(source: &str, text: impl Into<String>) -> Self {
        Self {
            label: Some(format!("[Source: {source}]")),
            text: text.into(),
        }
    }

    /// A memory passage headed with its upper-cased kind tag, e.g. `[EPISODIC]`.
    pub fn tagged(tag: &str, text: impl Into<String>) -> Self {
        Self {
            label: Some(format!("[{}]", tag.to_uppercase())),
            text: text.into(),
        }
    }

    fn render(&self, include_label: bool) -> String {
        match (&self.label, include_label) {
            (Some(label), true) => format!("{label}\n{}", self.text),
            _ => self.text.clone(),
        }
    }
}

/// The assembled context and how many leading passages it consumed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AssembledContext {
    pub text: String,
    pub consumed: usize,
}

impl AssembledContext {
    pub fn estimated_tokens(&self) -> usize {
        self.text.chars().count() / CHARS_PER_TOKEN
    }
}

/// Concatenate passages in rank order until the next one would push the
/// output past `max_tokens * 4` characters.
///
/// Passages are all-or-nothing: assembly stops at the first passage that does
/// not fit, even if a later, shorter one would. Labels and separators count
/// toward the budget, so the returned text never exceeds it.
pub fn assemble(passages: &[Passage], max_tokens: usize, include_labels: bool) -> AssembledContext {
    let budget = max_tokens.saturating_mul(CHARS_PER_TOKEN);
    let separator_len = PASSAGE_SEPARATOR.chars().count();

    let mut text = String::new();
    let mut used = 0usize;
    let mut consumed = 0usize;

    for passage in passages {
        let rendered = passage.render(include_labels);
        let cost = rendered.chars().count() + if consumed == 0 { 0 } else { separator_len };
        if used + cost > budget {
            break;
        }
        if consumed > 0 {
            text.push_str(PASSAGE_SEPARATOR);
        }
        text.push_str(&rendered);
        used += cost;
        consumed += 1;
    }

    AssembledContext { text, consumed }
}
