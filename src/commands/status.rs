use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::decompose::{SUBCLUSTER_MANIFEST_FILE, SubclusterManifest, list_iterations};
use crate::model::{Evaluation, RUN_ARGS_FILE, RunArgs, SelectResults};
use crate::util::read_json;

const RESULTS_SUFFIX: &str = "_results.json";

/// Recorded state of one iteration directory.
#[derive(Debug, Clone, PartialEq)]
pub struct IterationOverview {
    pub iteration: usize,
    pub dir: PathBuf,
    pub stages: Vec<String>,
    pub results: Vec<(String, SelectResults)>,
    pub subclusters: usize,
}

/// Launch configuration of a run and whether its data carries ground truth.
#[derive(Debug, Clone, PartialEq)]
pub struct RunProfile {
    pub args: RunArgs,
    /// Number of ground-truth classes; `None` for unlabelled data.
    pub classes: Option<usize>,
}

pub fn run(args: StatusArgs) -> Result<()> {
    info!(run_dir = %args.run_dir.display(), "status requested");

    match load_profile(&args.run_dir)? {
        Some(profile) => {
            let run_args = &profile.args;
            let exp_dir = run_args
                .exp_dir
                .as_deref()
                .map(|dir| dir.display().to_string())
                .unwrap_or_default();
            info!(
                data_path = %run_args.data_path.display(),
                exp_dir = %exp_dir,
                proposer_model = %run_args.params.proposer_model,
                assigner_name = %run_args.params.assigner_name,
                num_clusters = run_args.params.cluster_num_clusters,
                max_rounds = run_args.params.iterative_max_rounds,
                "loaded run args"
            );
            match profile.classes {
                Some(classes) => info!(classes, "ground truth available"),
                None => info!("no ground truth; results files are not expected"),
            }
        }
        None => {
            warn!(path = %args.run_dir.join(RUN_ARGS_FILE).display(), "run args missing");
        }
    }

    let overview = collect_overview(&args.run_dir)?;
    if overview.is_empty() {
        warn!(run_dir = %args.run_dir.display(), "no iterations recorded");
    }
    for iteration in &overview {
        info!(
            iteration = iteration.iteration,
            stages = %iteration.stages.join(","),
            subclusters = iteration.subclusters,
            "iteration"
        );
        for (stage, results) in &iteration.results {
            info!(
                iteration = iteration.iteration,
                stage = %stage,
                nmi = results.normalized_mutual_info,
                ari = results.adjusted_rand_index,
                macro_f1 = results.macro_f1,
                unmatched = results.num_unmatched_text_indices,
                "stage metrics"
            );
        }
    }

    Ok(())
}

pub fn load_profile(run_dir: &Path) -> Result<Option<RunProfile>> {
    if !run_dir.join(RUN_ARGS_FILE).is_file() {
        return Ok(None);
    }
    let args = RunArgs::load(run_dir)?;
    let classes = match Evaluation::load(&args.data_path)? {
        Evaluation::None => None,
        Evaluation::GroundTruth(truth) => Some(truth.class_descriptions.len()),
    };
    Ok(Some(RunProfile { args, classes }))
}

pub fn collect_overview(run_dir: &Path) -> Result<Vec<IterationOverview>> {
    list_iterations(run_dir)?
        .into_iter()
        .map(|(iteration, dir)| inspect_iteration(iteration, dir))
        .collect()
}

fn inspect_iteration(iteration: usize, dir: PathBuf) -> Result<IterationOverview> {
    let mut names = Vec::new();
    for entry in fs::read_dir(&dir).with_context(|| format!("failed to read {}", dir.display()))? {
        let entry = entry.with_context(|| format!("failed to read entry in {}", dir.display()))?;
        if let Some(name) = entry.file_name().to_str() {
            names.push(name.to_string());
        }
    }
    names.sort();

    let mut stages = Vec::new();
    let mut results = Vec::new();
    for name in &names {
        if name == SUBCLUSTER_MANIFEST_FILE {
            continue;
        }
        if let Some(stage) = name.strip_suffix(RESULTS_SUFFIX) {
            let scored: SelectResults = read_json(&dir.join(name))?;
            results.push((stage.to_string(), scored));
        } else if let Some(stage) = name.strip_suffix(".json") {
            stages.push(stage.to_string());
        }
    }

    let manifest_path = dir.join(SUBCLUSTER_MANIFEST_FILE);
    let subclusters = if manifest_path.is_file() {
        read_json::<SubclusterManifest>(&manifest_path)?.jobs.len()
    } else {
        0
    };

    Ok(IterationOverview {
        iteration,
        dir,
        stages,
        results,
        subclusters,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::write_json_pretty;

    #[test]
    fn overview_lists_stages_and_metrics_per_iteration() {
        let dir = tempfile::tempdir().expect("tempdir");
        let first = dir.path().join("iteration-0");
        let second = dir.path().join("iteration-1");
        fs::create_dir_all(&second).expect("mkdir");

        for stage in ["propose", "assign", "final"] {
            write_json_pretty(&first.join(format!("{stage}.json")), &serde_json::json!({}))
                .expect("stage");
        }
        fs::write(first.join("final_cluster_info.txt"), "report").expect("report");
        write_json_pretty(
            &first.join("final_results.json"),
            &SelectResults {
                normalized_mutual_info: 0.8,
                adjusted_rand_index: 0.5,
                macro_f1: 0.75,
                mapped_descriptions: vec![vec!["a".into()]],
                num_unmatched_text_indices: 1,
            },
        )
        .expect("results");

        let overview = collect_overview(dir.path()).expect("overview");
        assert_eq!(overview.len(), 2);
        assert_eq!(overview[0].stages, vec!["assign", "final", "propose"]);
        assert_eq!(overview[0].results.len(), 1);
        assert_eq!(overview[0].results[0].0, "final");
        assert_eq!(overview[0].results[0].1.macro_f1, 0.75);
        assert_eq!(overview[0].subclusters, 0);
        assert!(overview[1].stages.is_empty());
    }

    #[test]
    fn profile_reports_ground_truth_and_output_root() {
        let dir = tempfile::tempdir().expect("tempdir");
        let data_path = dir.path().join("data");
        let run_dir = dir.path().join("run");
        write_json_pretty(
            &run_dir.join("args.json"),
            &serde_json::json!({ "data_path": data_path, "exp_dir": dir.path() }),
        )
        .expect("args");

        let profile = load_profile(&run_dir).expect("profile").expect("args present");
        assert_eq!(profile.classes, None);
        assert_eq!(profile.args.exp_dir.as_deref(), Some(dir.path()));

        write_json_pretty(
            &data_path.join("labels.json"),
            &serde_json::json!({ "labels": [0, 1], "class_descriptions": ["a", "b"] }),
        )
        .expect("labels");
        let profile = load_profile(&run_dir).expect("profile").expect("args present");
        assert_eq!(profile.classes, Some(2));

        assert!(load_profile(dir.path()).expect("no args").is_none());
    }

    #[test]
    fn missing_run_dir_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(collect_overview(&dir.path().join("absent")).is_err());
    }
}
