use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::util::read_json;

pub const DATA_FILE: &str = "data.json";
pub const LABELS_FILE: &str = "labels.json";
pub const RUN_ARGS_FILE: &str = "args.json";

/// Prediction value for a text no description covers.
pub const UNMATCHED: i64 = -1;

/// Texts under clustering plus the goal that steers description proposals.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Problem {
    #[serde(default)]
    pub goal: Option<String>,
    pub texts: Vec<String>,
    #[serde(default)]
    pub example_descriptions: Vec<String>,
}

impl Problem {
    pub fn new(texts: Vec<String>) -> Self {
        Self {
            goal: None,
            texts,
            example_descriptions: Vec::new(),
        }
    }

    pub fn with_goal(mut self, goal: impl Into<String>) -> Self {
        self.goal = Some(goal.into());
        self
    }

    pub fn len(&self) -> usize {
        self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }

    pub fn load(data_path: &Path) -> Result<Self> {
        read_json(&data_path.join(DATA_FILE))
            .with_context(|| format!("failed to load problem from {}", data_path.display()))
    }
}

/// Ground-truth annotation parallel to [`Problem::texts`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LabelSet {
    pub labels: Vec<usize>,
    pub class_descriptions: Vec<String>,
}

/// Whether a run is scored against known classes.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Evaluation {
    #[default]
    None,
    GroundTruth(LabelSet),
}

impl Evaluation {
    pub fn ground_truth(labels: Vec<usize>, class_descriptions: Vec<String>) -> Self {
        Self::GroundTruth(LabelSet {
            labels,
            class_descriptions,
        })
    }

    /// Reads `labels.json` next to the problem data; its absence means no evaluation.
    pub fn load(data_path: &Path) -> Result<Self> {
        let path = data_path.join(LABELS_FILE);
        if !path.exists() {
            return Ok(Self::None);
        }
        let labels: LabelSet = read_json(&path)?;
        Ok(Self::GroundTruth(labels))
    }
}

/// Texts x descriptions match scores, stored row-major (one row per text).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct AssignmentMatrix {
    rows: Vec<Vec<f64>>,
}

impl AssignmentMatrix {
    /// Scores at or above this value count as a match.
    pub const MATCH_THRESHOLD: f64 = 0.5;

    pub fn from_rows(rows: Vec<Vec<f64>>) -> Self {
        Self { rows }
    }

    pub fn from_bools(rows: &[Vec<bool>]) -> Self {
        Self {
            rows: rows
                .iter()
                .map(|row| row.iter().map(|&hit| if hit { 1.0 } else { 0.0 }).collect())
                .collect(),
        }
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn num_texts(&self) -> usize {
        self.rows.len()
    }

    /// First row whose width differs from `descriptions`, with its width.
    pub fn ragged_row(&self, descriptions: usize) -> Option<(usize, usize)> {
        self.rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != descriptions)
            .map(|(text, row)| (text, row.len()))
    }

    pub fn is_match(&self, text: usize, description: usize) -> bool {
        self.rows
            .get(text)
            .and_then(|row| row.get(description))
            .is_some_and(|&score| score >= Self::MATCH_THRESHOLD)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProposeArtifact {
    pub descriptions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssignArtifact {
    pub descriptions: Vec<String>,
    pub text_descriptions_matching: AssignmentMatrix,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SelectArtifact {
    pub descriptions: Vec<String>,
    pub cluster_predictions: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SelectResults {
    pub normalized_mutual_info: f64,
    pub adjusted_rand_index: f64,
    pub macro_f1: f64,
    pub mapped_descriptions: Vec<Vec<String>>,
    pub num_unmatched_text_indices: usize,
}

/// Model and algorithm parameters handed to the external clustering pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineParams {
    pub proposer_model: String,
    pub assigner_name: String,
    pub proposer_num_descriptions_to_propose: u32,
    pub assigner_for_final_assignment_template: String,
    pub cluster_num_clusters: u32,
    pub cluster_overlap_penalty: f64,
    pub cluster_not_cover_penalty: f64,
    pub iterative_max_rounds: u32,
    pub verbose: bool,
}

impl Default for PipelineParams {
    fn default() -> Self {
        Self {
            proposer_model: "gpt-4".to_string(),
            assigner_name: "google/flan-t5-xl".to_string(),
            proposer_num_descriptions_to_propose: 20,
            assigner_for_final_assignment_template: "templates/t5_multi_assigner_one_output.txt"
                .to_string(),
            cluster_num_clusters: 5,
            cluster_overlap_penalty: 0.2,
            cluster_not_cover_penalty: 1.0,
            iterative_max_rounds: 1,
            verbose: true,
        }
    }
}

/// `args.json` of a run directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunArgs {
    pub data_path: PathBuf,
    #[serde(default)]
    pub exp_dir: Option<PathBuf>,
    #[serde(flatten)]
    pub params: PipelineParams,
}

impl RunArgs {
    pub fn load(run_dir: &Path) -> Result<Self> {
        read_json(&run_dir.join(RUN_ARGS_FILE))
            .with_context(|| format!("failed to load run args from {}", run_dir.display()))
    }
}
