//! Hierarchical decomposition of a finished run
//!
//! Carves the texts of chosen clusters out of a parent run and scopes a child
//! clustering job to each subset.

mod jobs;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::error::DecomposeError;
use crate::model::{Problem, SelectArtifact};
use crate::recorder::summary::{ClusterDistribution, percentage};
use crate::recorder::stage_file_name;
use crate::util::read_json;

pub use jobs::{
    ChildJob, JobLauncher, JobSpec, ParentRef, PrintLauncher, SubclusterEntry,
    SubclusterManifest, plan_child_jobs, write_child_jobs,
};

pub const FINAL_STAGE: &str = "final";
pub const SUBCLUSTER_MANIFEST_FILE: &str = "subcluster_jobs.json";
pub const JOB_FILE: &str = "job.json";

pub fn subcluster_dir_name(index: usize) -> String {
    format!("subcluster_{index}")
}

/// Goal handed to a child run, carrying the parent cluster as context.
pub fn subcluster_goal(parent_description: &str) -> String {
    format!(
        "I would like to cluster them based on topics; each cluster should have a description of '<topic>'. \
         Keep in mind that all these texts are already part of a broader cluster of: {parent_description}"
    )
}

/// `iteration-{n}` directories of a run, in iteration order.
pub fn list_iterations(run_dir: &Path) -> Result<Vec<(usize, PathBuf)>> {
    let entries =
        fs::read_dir(run_dir).with_context(|| format!("failed to read {}", run_dir.display()))?;

    let mut iterations = Vec::new();
    for entry in entries {
        let entry =
            entry.with_context(|| format!("failed to read entry in {}", run_dir.display()))?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let iteration = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| name.strip_prefix("iteration-"))
            .and_then(|number| number.parse::<usize>().ok());
        if let Some(iteration) = iteration {
            iterations.push((iteration, path));
        }
    }
    iterations.sort_by_key(|(iteration, _)| *iteration);
    Ok(iterations)
}

/// Latest iteration directory holding `{stage}.json`, if any.
pub fn latest_iteration_with(run_dir: &Path, stage: &str) -> Result<Option<PathBuf>> {
    let artifact = stage_file_name(stage);
    Ok(list_iterations(run_dir)?
        .into_iter()
        .rev()
        .map(|(_, dir)| dir)
        .find(|dir| dir.join(&artifact).is_file()))
}

/// Latest `iteration-{n}` directory under `run_dir` holding a final selection.
pub fn locate_final_iteration(run_dir: &Path) -> Result<PathBuf> {
    latest_iteration_with(run_dir, FINAL_STAGE)?.ok_or_else(|| {
        DecomposeError::MissingFinalArtifact {
            run_dir: run_dir.to_path_buf(),
            artifact: stage_file_name(FINAL_STAGE),
        }
        .into()
    })
}

/// One row of the operator-facing cluster listing. `index` is `None` for the
/// unmatched bucket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterListing {
    pub index: Option<usize>,
    pub description: String,
    pub count: usize,
    pub percentage: f64,
}

/// Final select-stage artifact of a completed run.
#[derive(Debug, Clone, PartialEq)]
pub struct FinalSelection {
    pub iteration_dir: PathBuf,
    pub descriptions: Vec<String>,
    pub cluster_predictions: Vec<i64>,
}

impl FinalSelection {
    pub fn load(iteration_dir: &Path) -> Result<Self> {
        let path = iteration_dir.join(stage_file_name(FINAL_STAGE));
        if !path.is_file() {
            return Err(DecomposeError::MissingFinalArtifact {
                run_dir: iteration_dir.to_path_buf(),
                artifact: stage_file_name(FINAL_STAGE),
            }
            .into());
        }

        let artifact: SelectArtifact = read_json(&path)?;
        Ok(Self {
            iteration_dir: iteration_dir.to_path_buf(),
            descriptions: artifact.descriptions,
            cluster_predictions: artifact.cluster_predictions,
        })
    }

    pub fn distribution(&self) -> ClusterDistribution {
        ClusterDistribution::from_predictions(&self.cluster_predictions, self.descriptions.len())
    }

    pub fn listing(&self) -> Vec<ClusterListing> {
        let distribution = self.distribution();
        let population = self.cluster_predictions.len();

        let mut rows: Vec<ClusterListing> = self
            .descriptions
            .iter()
            .enumerate()
            .map(|(index, description)| ClusterListing {
                index: Some(index),
                description: description.clone(),
                count: distribution.count(index),
                percentage: percentage(distribution.count(index), population),
            })
            .collect();
        rows.push(ClusterListing {
            index: None,
            description: "unmatched".to_string(),
            count: distribution.unmatched(),
            percentage: percentage(distribution.unmatched(), population),
        });
        rows
    }

    pub fn validate_index(&self, index: usize) -> Result<&str, DecomposeError> {
        self.descriptions
            .get(index)
            .map(String::as_str)
            .ok_or(DecomposeError::IndexNotPresent {
                index,
                descriptions: self.descriptions.len(),
            })
    }
}

/// Parses operator input such as `"0 2"` or `"1,3"`. Repeats are dropped,
/// first-seen order is kept.
pub fn parse_indices(input: &str) -> Result<Vec<usize>, DecomposeError> {
    let mut indices = Vec::new();
    for token in input
        .split(|ch: char| ch.is_whitespace() || ch == ',')
        .filter(|token| !token.is_empty())
    {
        let index = token
            .parse::<usize>()
            .map_err(|_| DecomposeError::InvalidSelection {
                input: input.trim().to_string(),
            })?;
        if !indices.contains(&index) {
            indices.push(index);
        }
    }

    if indices.is_empty() {
        return Err(DecomposeError::EmptySelection);
    }
    Ok(indices)
}

/// Texts predicted into cluster `index`, in their original order.
pub fn extract_subset(texts: &[String], predictions: &[i64], index: usize) -> Vec<String> {
    texts
        .iter()
        .zip(predictions)
        .filter(|&(_, &prediction)| usize::try_from(prediction).is_ok_and(|p| p == index))
        .map(|(text, _)| text.clone())
        .collect()
}

/// Child problem over `texts`, seeded with no example descriptions.
pub fn sub_problem(parent_description: &str, texts: Vec<String>) -> Problem {
    Problem::new(texts).with_goal(subcluster_goal(parent_description))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::write_json_pretty;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    fn write_final(iteration_dir: &Path, descriptions: &[&str], predictions: &[i64]) {
        write_json_pretty(
            &iteration_dir.join("final.json"),
            &SelectArtifact {
                descriptions: strings(descriptions),
                cluster_predictions: predictions.to_vec(),
            },
        )
        .expect("write final");
    }

    #[test]
    fn extract_subset_keeps_original_order() {
        let texts = strings(&["t0", "t1", "t2", "t3", "t4"]);
        let subset = extract_subset(&texts, &[0, 0, 1, 1, 2], 1);
        assert_eq!(subset, strings(&["t2", "t3"]));

        let problem = sub_problem("finance", subset);
        assert_eq!(problem.texts.len(), 2);
        assert!(problem.example_descriptions.is_empty());
        assert!(problem.goal.as_deref().is_some_and(|goal| goal.ends_with("cluster of: finance")));
    }

    #[test]
    fn extract_subset_of_empty_cluster_is_empty() {
        let texts = strings(&["t0", "t1"]);
        assert!(extract_subset(&texts, &[-1, 0], 1).is_empty());
    }

    #[test]
    fn parse_indices_accepts_spaces_and_commas() {
        assert_eq!(parse_indices("2 0, 2,3").expect("parse"), vec![2, 0, 3]);
    }

    #[test]
    fn parse_indices_rejects_garbage_and_empty_input() {
        assert!(matches!(
            parse_indices("1 two"),
            Err(DecomposeError::InvalidSelection { .. })
        ));
        assert!(matches!(
            parse_indices("-1"),
            Err(DecomposeError::InvalidSelection { .. })
        ));
        assert!(matches!(parse_indices("  "), Err(DecomposeError::EmptySelection)));
    }

    #[test]
    fn validate_index_reports_absent_index() {
        let selection = FinalSelection {
            iteration_dir: PathBuf::from("run/iteration-0"),
            descriptions: strings(&["a", "b"]),
            cluster_predictions: vec![0, 1],
        };
        assert_eq!(selection.validate_index(1).expect("present"), "b");

        let err = selection.validate_index(2).expect_err("absent");
        assert!(err.to_string().contains("cluster index 2 not present in descriptions"));
    }

    #[test]
    fn listing_includes_unmatched_bucket() {
        let selection = FinalSelection {
            iteration_dir: PathBuf::from("run/iteration-0"),
            descriptions: strings(&["a", "b"]),
            cluster_predictions: vec![0, 0, -1, 1, 1],
        };
        let listing = selection.listing();

        assert_eq!(listing.len(), 3);
        assert_eq!(listing[0].percentage, 40.0);
        assert_eq!(listing[2].index, None);
        assert_eq!(listing[2].count, 1);
        assert_eq!(listing[2].percentage, 20.0);
    }

    #[test]
    fn iterations_sort_numerically_and_skip_other_entries() {
        let dir = tempfile::tempdir().expect("tempdir");
        for name in ["iteration-10", "iteration-2", "iteration-x", "notes"] {
            fs::create_dir_all(dir.path().join(name)).expect("mkdir");
        }
        fs::write(dir.path().join("iteration-3"), "not a directory").expect("write");

        let found: Vec<usize> = list_iterations(dir.path())
            .expect("list")
            .into_iter()
            .map(|(iteration, _)| iteration)
            .collect();
        assert_eq!(found, vec![2, 10]);
    }

    #[test]
    fn locate_final_iteration_picks_latest_completed_iteration() {
        let dir = tempfile::tempdir().expect("tempdir");
        for iteration in [0, 1, 2] {
            fs::create_dir_all(dir.path().join(format!("iteration-{iteration}"))).expect("mkdir");
        }
        write_final(&dir.path().join("iteration-0"), &["a"], &[0]);
        write_final(&dir.path().join("iteration-1"), &["a"], &[0]);

        let located = locate_final_iteration(dir.path()).expect("locate");
        assert_eq!(located, dir.path().join("iteration-1"));
    }

    #[test]
    fn missing_final_artifact_is_a_usage_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join("iteration-0")).expect("mkdir");

        let err = locate_final_iteration(dir.path()).expect_err("no final.json");
        assert!(matches!(
            err.downcast_ref::<DecomposeError>(),
            Some(DecomposeError::MissingFinalArtifact { .. })
        ));

        let err = FinalSelection::load(&dir.path().join("iteration-0")).expect_err("no final.json");
        assert!(err.to_string().contains("lacks a completed final artifact"));
    }
}
