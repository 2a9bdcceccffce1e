//! Error types for run recording and cluster decomposition

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by [`crate::recorder::RunRecorder`]
#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("output directory not set: call set_output_dir before {operation}")]
    OutputDirNotSet { operation: String },

    #[error("output directory already set to {0}")]
    OutputDirAlreadySet(PathBuf),

    #[error("ground truth has {labels} labels but the problem has {texts} texts")]
    LabelCountMismatch { labels: usize, texts: usize },

    #[error("ground truth label {label} at text {text} has no class description ({classes} classes)")]
    LabelOutOfRange {
        text: usize,
        label: usize,
        classes: usize,
    },

    #[error("iteration {iteration} stage {stage}: expected {expected} {what}, got {actual}")]
    ShapeMismatch {
        iteration: usize,
        stage: String,
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error(
        "iteration {iteration} stage {stage}: prediction {prediction} at text {text} is not a description index or -1 ({descriptions} descriptions)"
    )]
    PredictionOutOfRange {
        iteration: usize,
        stage: String,
        text: usize,
        prediction: i64,
        descriptions: usize,
    },

    #[error("iteration {iteration} stage {stage}: invalid stage name {stage:?}")]
    InvalidStageName { iteration: usize, stage: String },

    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize {}: {source}", path.display())]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl RecorderError {
    /// Caller invoked an operation out of order or with inconsistent inputs
    pub fn is_usage_error(&self) -> bool {
        !matches!(self, RecorderError::Io { .. } | RecorderError::Serialize { .. })
    }
}

/// Operator-facing errors raised while decomposing a finished run
#[derive(Debug, Error)]
pub enum DecomposeError {
    #[error("parent run lacks a completed final artifact: no {artifact} under {}", run_dir.display())]
    MissingFinalArtifact { run_dir: PathBuf, artifact: String },

    #[error("cluster index {index} not present in descriptions ({descriptions} descriptions)")]
    IndexNotPresent { index: usize, descriptions: usize },

    #[error("invalid cluster selection {input:?}: expected space or comma separated indices")]
    InvalidSelection { input: String },

    #[error("no cluster indices selected")]
    EmptySelection,

    #[error("final artifact has {predictions} predictions but the parent problem has {texts} texts")]
    PopulationMismatch { predictions: usize, texts: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_errors_are_distinguished_from_resource_errors() {
        let usage = RecorderError::OutputDirNotSet {
            operation: "record_select".to_string(),
        };
        assert!(usage.is_usage_error());
        assert!(usage.to_string().contains("output directory not set"));

        let resource = RecorderError::Io {
            path: PathBuf::from("/nope/iteration-0"),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        assert!(!resource.is_usage_error());
    }

    #[test]
    fn shape_mismatch_names_iteration_and_stage() {
        let err = RecorderError::ShapeMismatch {
            iteration: 3,
            stage: "final".to_string(),
            what: "cluster predictions",
            expected: 5,
            actual: 4,
        };
        let message = err.to_string();
        assert!(message.contains("iteration 3"));
        assert!(message.contains("stage final"));
    }
}
