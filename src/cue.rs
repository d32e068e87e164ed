use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

static MARKUP_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>|\{\\[^}]*\}").expect("valid markup regex"));

/// One timed line of subtitle text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cue {
    index: usize,
    start: f64,
    end: Option<f64>,
    text: String,
}

impl Cue {
    /// Builds a cue; `text` is normalised on the way in.
    pub fn new(index: usize, start: f64, end: Option<f64>, text: &str) -> Self {
        Self {
            index,
            start,
            end,
            text: normalize_text(text),
        }
    }

    /// Position of the cue in its source, from 0.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Start time in seconds.
    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn end(&self) -> Option<f64> {
        self.end
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// True when there is nothing left to speak.
    pub fn is_blank(&self) -> bool {
        self.text.is_empty()
    }

    /// Time budget of the cue, when it has an end.
    pub fn slot(&self) -> Option<f64> {
        self.end.map(|end| end - self.start)
    }
}

/// Strips markup tags and collapses whitespace, including line breaks.
pub fn normalize_text(raw: &str) -> String {
    let stripped = MARKUP_TAG.replace_all(raw, "");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}
