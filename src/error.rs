use thiserror::Error;

/// Everything that can abort a run.
///
/// Cue-scoped variants carry the 1-based cue number and its text so the
/// caller can tell the user exactly which subtitle broke the run.
#[derive(Error, Debug)]
pub enum DubError {
    #[error("invalid subtitle input at line {line}: {message}")]
    InputParse { line: usize, message: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("speech synthesis failed for cue #{index} ({text:?}): {source}")]
    Synthesis {
        index: usize,
        text: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("could not determine duration of cue #{index} ({text:?}): {source}")]
    Probe {
        index: usize,
        text: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("time-stretch failed for cue #{index} ({text:?}): {source}")]
    Fit {
        index: usize,
        text: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("silence generation failed before cue #{index}: {source}")]
    Silence {
        index: usize,
        #[source]
        source: anyhow::Error,
    },

    #[error("final concatenation failed: {0}")]
    Concat(#[source] anyhow::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type DubResult<T> = Result<T, DubError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cue_errors_name_the_cue() {
        let err = DubError::Synthesis {
            index: 3,
            text: "xin chào".into(),
            source: anyhow::anyhow!("backend unavailable"),
        };
        let msg = err.to_string();
        assert!(msg.contains("cue #3"));
        assert!(msg.contains("xin chào"));
        assert!(msg.contains("backend unavailable"));
    }
}
