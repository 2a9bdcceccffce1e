//! Run recorder
//!
//! Durable record of every stage of every iteration of a clustering run.
//! Artifacts for iteration `n` and stage `s` land in
//! `{output_dir}/iteration-{n}/`:
//!
//! - `{s}.json`: stage inputs (descriptions plus matching matrix or predictions)
//! - `{s}_results.json`: agreement with ground truth (select stage, labelled runs)
//! - `{s}_cluster_info.txt`: cluster summary report
//! - `plot.svg`: cluster distribution chart

pub mod chart;
mod evaluation;
pub mod summary;


use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use rand::RngCore;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::RecorderError;
use crate::metrics::{DescriptionPerformance, description_performance, expected_membership};
use crate::model::{
    AssignArtifact, AssignmentMatrix, Evaluation, Problem, ProposeArtifact, SelectArtifact,
    SelectResults, UNMATCHED,
};
use chart::{CHART_FILE, ChartRenderer, SvgPieChart};
use evaluation::score_selection;
use summary::{ClusterDistribution, ClusterSummary};

pub const CHART_TITLE: &str = "Cluster Distribution";

pub fn iteration_dir_name(iteration: usize) -> String {
    format!("iteration-{iteration}")
}

pub fn stage_file_name(stage: &str) -> String {
    format!("{stage}.json")
}

pub fn results_file_name(stage: &str) -> String {
    format!("{stage}_results.json")
}

pub fn cluster_info_file_name(stage: &str) -> String {
    format!("{stage}_cluster_info.txt")
}

enum OutputBinding {
    Unbound,
    Bound { root: PathBuf },
}

#[derive(Debug, Clone)]
pub struct AssignReport {
    pub artifact: PathBuf,
    /// Present only when the run carries ground truth.
    pub performance: Option<DescriptionPerformance>,
}

#[derive(Debug, Clone)]
pub struct SelectReport {
    pub artifact: PathBuf,
    pub distribution: ClusterDistribution,
    pub results: Option<SelectResults>,
    pub summary: ClusterSummary,
    pub cluster_info: PathBuf,
    /// `None` when chart rendering failed.
    pub chart: Option<PathBuf>,
}

/// Per-run recording context.
///
/// Bind the output directory once with [`RunRecorder::set_output_dir`], then
/// call `record_propose`, `record_assign`, `record_select` for each iteration,
/// advancing with [`RunRecorder::next_iteration`].
pub struct RunRecorder {
    problem: Problem,
    evaluation: Evaluation,
    output: OutputBinding,
    iteration: usize,
    rng: Box<dyn RngCore>,
    chart: Box<dyn ChartRenderer>,
}

impl RunRecorder {
    pub fn new(problem: Problem, evaluation: Evaluation) -> Result<Self, RecorderError> {
        if let Evaluation::GroundTruth(truth) = &evaluation {
            if truth.labels.len() != problem.len() {
                return Err(RecorderError::LabelCountMismatch {
                    labels: truth.labels.len(),
                    texts: problem.len(),
                });
            }
            let classes = truth.class_descriptions.len();
            if let Some((text, &label)) = truth
                .labels
                .iter()
                .enumerate()
                .find(|(_, label)| **label >= classes)
            {
                return Err(RecorderError::LabelOutOfRange {
                    text,
                    label,
                    classes,
                });
            }
        }

        Ok(Self {
            problem,
            evaluation,
            output: OutputBinding::Unbound,
            iteration: 0,
            rng: Box::new(rand::rng()),
            chart: Box::new(SvgPieChart),
        })
    }

    /// Replaces the example-sampling source.
    pub fn with_rng(mut self, rng: impl RngCore + 'static) -> Self {
        self.rng = Box::new(rng);
        self
    }

    pub fn with_chart_renderer(mut self, renderer: impl ChartRenderer + 'static) -> Self {
        self.chart = Box::new(renderer);
        self
    }

    pub fn problem(&self) -> &Problem {
        &self.problem
    }

    pub fn iteration(&self) -> usize {
        self.iteration
    }

    pub fn output_dir(&self) -> Option<&Path> {
        match &self.output {
            OutputBinding::Unbound => None,
            OutputBinding::Bound { root } => Some(root),
        }
    }

    pub fn iteration_dir(&self) -> Option<PathBuf> {
        self.output_dir()
            .map(|root| root.join(iteration_dir_name(self.iteration)))
    }

    pub fn set_output_dir(&mut self, dir: impl Into<PathBuf>) -> Result<(), RecorderError> {
        if let OutputBinding::Bound { root } = &self.output {
            return Err(RecorderError::OutputDirAlreadySet(root.clone()));
        }

        let root = dir.into();
        create_dir(&root.join(iteration_dir_name(self.iteration)))?;
        info!(output_dir = %root.display(), iteration = self.iteration, "output directory bound");
        self.output = OutputBinding::Bound { root };
        Ok(())
    }

    /// Moves to the next iteration; earlier iterations are never written again.
    pub fn next_iteration(&mut self) -> Result<usize, RecorderError> {
        let root = self.root("next_iteration")?;
        let next = self.iteration + 1;
        create_dir(&root.join(iteration_dir_name(next)))?;

        self.iteration = next;
        info!(iteration = next, "advanced iteration");
        Ok(next)
    }

    pub fn record_propose(
        &self,
        descriptions: &[String],
        stage: &str,
    ) -> Result<PathBuf, RecorderError> {
        let dir = self.stage_dir("record_propose", stage)?;
        info!(
            iteration = self.iteration,
            stage,
            descriptions = descriptions.len(),
            "stage propose"
        );

        let path = dir.join(stage_file_name(stage));
        write_json(
            &path,
            &ProposeArtifact {
                descriptions: descriptions.to_vec(),
            },
        )?;
        Ok(path)
    }

    pub fn record_assign(
        &self,
        descriptions: &[String],
        matching: &AssignmentMatrix,
        stage: &str,
    ) -> Result<AssignReport, RecorderError> {
        let dir = self.stage_dir("record_assign", stage)?;
        if matching.num_texts() != self.problem.len() {
            return Err(self.shape_error(
                stage,
                "assignment rows",
                self.problem.len(),
                matching.num_texts(),
            ));
        }
        if let Some((_, width)) = matching.ragged_row(descriptions.len()) {
            return Err(self.shape_error(stage, "assignment columns", descriptions.len(), width));
        }

        info!(iteration = self.iteration, stage, "stage assign");
        let performance = match &self.evaluation {
            Evaluation::None => {
                debug!(stage, "no ground truth; skipping description performance");
                None
            }
            Evaluation::GroundTruth(truth) => {
                let expected = expected_membership(
                    matching,
                    &truth.labels,
                    descriptions.len(),
                    truth.class_descriptions.len(),
                );
                let performance = description_performance(matching, &expected, descriptions.len());
                info!(
                    recall = performance.overall.recall,
                    precision = performance.overall.precision,
                    "assigned all"
                );
                for (description, score) in descriptions.iter().zip(&performance.per_description) {
                    info!(
                        description = %description,
                        recall = score.recall,
                        precision = score.precision,
                        "assigned description"
                    );
                }
                Some(performance)
            }
        };

        let path = dir.join(stage_file_name(stage));
        write_json(
            &path,
            &AssignArtifact {
                descriptions: descriptions.to_vec(),
                text_descriptions_matching: matching.clone(),
            },
        )?;

        Ok(AssignReport {
            artifact: path,
            performance,
        })
    }

    pub fn record_select(
        &mut self,
        descriptions: &[String],
        predictions: &[i64],
        stage: &str,
    ) -> Result<SelectReport, RecorderError> {
        let dir = self.stage_dir("record_select", stage)?;
        self.validate_predictions(descriptions.len(), predictions, stage)?;

        let distribution = ClusterDistribution::from_predictions(predictions, descriptions.len());
        info!(
            iteration = self.iteration,
            stage,
            unmatched = distribution.unmatched(),
            "stage select"
        );
        for (description, count) in descriptions.iter().zip(distribution.counts()) {
            info!(description = %description, count, "selected description");
        }

        let results = match &self.evaluation {
            Evaluation::None => None,
            Evaluation::GroundTruth(truth) => {
                let results = score_selection(truth, descriptions, predictions);
                write_json(&dir.join(results_file_name(stage)), &results)?;
                Some(results)
            }
        };

        let artifact = dir.join(stage_file_name(stage));
        write_json(
            &artifact,
            &SelectArtifact {
                descriptions: descriptions.to_vec(),
                cluster_predictions: predictions.to_vec(),
            },
        )?;

        let summary = ClusterSummary::build(
            &self.problem.texts,
            descriptions,
            predictions,
            self.rng.as_mut(),
        );
        let cluster_info = dir.join(cluster_info_file_name(stage));
        write_report(&cluster_info, &summary)?;

        let chart_path = dir.join(CHART_FILE);
        let chart = match self
            .chart
            .render(CHART_TITLE, &summary.chart_slices(), &chart_path)
        {
            Ok(()) => Some(chart_path),
            Err(err) => {
                warn!(
                    iteration = self.iteration,
                    stage,
                    error = %err,
                    "chart rendering failed; cluster report kept"
                );
                None
            }
        };

        Ok(SelectReport {
            artifact,
            distribution,
            results,
            summary,
            cluster_info,
            chart,
        })
    }

    fn root(&self, operation: &str) -> Result<&Path, RecorderError> {
        self.output_dir()
            .ok_or_else(|| RecorderError::OutputDirNotSet {
                operation: operation.to_string(),
            })
    }

    fn stage_dir(&self, operation: &str, stage: &str) -> Result<PathBuf, RecorderError> {
        let root = self.root(operation)?;
        let invalid = stage.is_empty()
            || stage == "."
            || stage == ".."
            || stage.contains(['/', '\\']);
        if invalid {
            return Err(RecorderError::InvalidStageName {
                iteration: self.iteration,
                stage: stage.to_string(),
            });
        }
        Ok(root.join(iteration_dir_name(self.iteration)))
    }

    fn shape_error(
        &self,
        stage: &str,
        what: &'static str,
        expected: usize,
        actual: usize,
    ) -> RecorderError {
        RecorderError::ShapeMismatch {
            iteration: self.iteration,
            stage: stage.to_string(),
            what,
            expected,
            actual,
        }
    }

    fn validate_predictions(
        &self,
        descriptions: usize,
        predictions: &[i64],
        stage: &str,
    ) -> Result<(), RecorderError> {
        if predictions.len() != self.problem.len() {
            return Err(self.shape_error(
                stage,
                "cluster predictions",
                self.problem.len(),
                predictions.len(),
            ));
        }

        let out_of_range = predictions.iter().enumerate().find(|&(_, &prediction)| {
            prediction != UNMATCHED
                && usize::try_from(prediction).map_or(true, |index| index >= descriptions)
        });
        if let Some((text, &prediction)) = out_of_range {
            return Err(RecorderError::PredictionOutOfRange {
                iteration: self.iteration,
                stage: stage.to_string(),
                text,
                prediction,
                descriptions,
            });
        }
        Ok(())
    }
}

fn create_dir(path: &Path) -> Result<(), RecorderError> {
    fs::create_dir_all(path).map_err(|source| RecorderError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn write_report(path: &Path, summary: &ClusterSummary) -> Result<(), RecorderError> {
    let io_error = |source: io::Error| RecorderError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut out = BufWriter::new(File::create(path).map_err(io_error)?);
    summary.write_report(&mut out).map_err(io_error)?;
    out.flush().map_err(io_error)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), RecorderError> {
    let mut data = serde_json::to_vec_pretty(value).map_err(|source| RecorderError::Serialize {
        path: path.to_path_buf(),
        source,
    })?;
    data.push(b'\n');

    fs::write(path, data).map_err(|source| RecorderError::Io {
        path: path.to_path_buf(),
        source,
    })
}
