use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{
    FinalSelection, JOB_FILE, SUBCLUSTER_MANIFEST_FILE, extract_subset, sub_problem,
    subcluster_dir_name,
};
use crate::error::DecomposeError;
use crate::model::{DATA_FILE, PipelineParams, Problem, RunArgs};
use crate::util::{ensure_directory, now_utc_string, read_json, sha256_file, write_json_pretty};

const MANIFEST_VERSION: u32 = 1;

/// Where a child job came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParentRef {
    pub run_dir: PathBuf,
    pub iteration_dir: PathBuf,
    pub cluster_index: usize,
    pub description: String,
}

/// Everything an external launcher needs to start a child pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    pub data_path: PathBuf,
    pub exp_dir: PathBuf,
    pub params: PipelineParams,
    pub parent: ParentRef,
}

impl JobSpec {
    /// Pipeline arguments in launch order.
    pub fn command_args(&self) -> Vec<String> {
        let params = &self.params;
        let mut args = vec![
            "--data_path".to_string(),
            self.data_path.display().to_string(),
            "--exp_dir".to_string(),
            self.exp_dir.display().to_string(),
            "--proposer_model".to_string(),
            params.proposer_model.clone(),
            "--assigner_name".to_string(),
            params.assigner_name.clone(),
            "--proposer_num_descriptions_to_propose".to_string(),
            params.proposer_num_descriptions_to_propose.to_string(),
            "--assigner_for_final_assignment_template".to_string(),
            params.assigner_for_final_assignment_template.clone(),
            "--cluster_num_clusters".to_string(),
            params.cluster_num_clusters.to_string(),
            "--cluster_overlap_penalty".to_string(),
            params.cluster_overlap_penalty.to_string(),
            "--cluster_not_cover_penalty".to_string(),
            params.cluster_not_cover_penalty.to_string(),
            "--iterative_max_rounds".to_string(),
            params.iterative_max_rounds.to_string(),
        ];
        if params.verbose {
            args.push("--verbose".to_string());
        }
        args
    }
}

/// Hands a planned child job to whatever runs pipelines.
pub trait JobLauncher {
    fn launch(&mut self, job: &JobSpec) -> Result<()>;
}

/// Emits each child's command line for the operator to run.
pub struct PrintLauncher<W: Write> {
    program: String,
    out: W,
}

impl<W: Write> PrintLauncher<W> {
    pub fn new(program: impl Into<String>, out: W) -> Self {
        Self {
            program: program.into(),
            out,
        }
    }

    pub fn command_line(&self, job: &JobSpec) -> String {
        let mut parts = vec![self.program.clone()];
        parts.extend(job.command_args().into_iter().map(|arg| shell_quote(&arg)));
        parts.join(" ")
    }
}

impl<W: Write> JobLauncher for PrintLauncher<W> {
    fn launch(&mut self, job: &JobSpec) -> Result<()> {
        let line = self.command_line(job);
        writeln!(self.out, "{line}").context("failed to emit launch command")
    }
}

fn shell_quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || "-_./=:,+@".contains(ch));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

/// A child sub-problem and the job that clusters it.
#[derive(Debug, Clone, PartialEq)]
pub struct ChildJob {
    pub cluster_index: usize,
    pub description: String,
    pub problem: Problem,
    pub spec: JobSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubclusterEntry {
    pub cluster_index: usize,
    pub description: String,
    pub text_count: usize,
    pub data_path: String,
    pub data_sha256: String,
    pub exp_dir: String,
    pub job_path: String,
}

/// Record of the child jobs spawned from one parent iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubclusterManifest {
    pub manifest_version: u32,
    pub generated_at: String,
    pub parent_run_dir: String,
    pub parent_iteration_dir: String,
    pub jobs: Vec<SubclusterEntry>,
}

/// Builds one child job per index. Every index is validated before any job
/// is produced, so a bad selection yields nothing.
pub fn plan_child_jobs(
    run_dir: &Path,
    run_args: &RunArgs,
    selection: &FinalSelection,
    parent: &Problem,
    indices: &[usize],
) -> Result<Vec<ChildJob>> {
    if indices.is_empty() {
        return Err(DecomposeError::EmptySelection.into());
    }
    if selection.cluster_predictions.len() != parent.len() {
        return Err(DecomposeError::PopulationMismatch {
            predictions: selection.cluster_predictions.len(),
            texts: parent.len(),
        }
        .into());
    }
    for &index in indices {
        selection.validate_index(index)?;
    }

    let mut jobs = Vec::with_capacity(indices.len());
    for &index in indices {
        let description = selection.validate_index(index)?.to_string();
        let texts = extract_subset(&parent.texts, &selection.cluster_predictions, index);
        if texts.is_empty() {
            warn!(index, description = %description, "selected cluster has no texts");
        }

        let dir_name = subcluster_dir_name(index);
        let spec = JobSpec {
            data_path: run_args.data_path.join(&dir_name),
            exp_dir: selection.iteration_dir.join(&dir_name),
            params: run_args.params.clone(),
            parent: ParentRef {
                run_dir: run_dir.to_path_buf(),
                iteration_dir: selection.iteration_dir.clone(),
                cluster_index: index,
                description: description.clone(),
            },
        };

        jobs.push(ChildJob {
            cluster_index: index,
            problem: sub_problem(&description, texts),
            description,
            spec,
        });
    }
    Ok(jobs)
}

/// Writes each child's `data.json`, output directory and `job.json`, then
/// merges the jobs into the parent iteration's subcluster manifest.
pub fn write_child_jobs(
    run_dir: &Path,
    iteration_dir: &Path,
    jobs: &[ChildJob],
) -> Result<SubclusterManifest> {
    let manifest_path = iteration_dir.join(SUBCLUSTER_MANIFEST_FILE);
    let mut entries: Vec<SubclusterEntry> = if manifest_path.is_file() {
        read_json::<SubclusterManifest>(&manifest_path)?.jobs
    } else {
        Vec::new()
    };

    for job in jobs {
        let data_file = job.spec.data_path.join(DATA_FILE);
        write_json_pretty(&data_file, &job.problem)?;
        ensure_directory(&job.spec.exp_dir)?;
        let job_path = job.spec.exp_dir.join(JOB_FILE);
        write_json_pretty(&job_path, &job.spec)?;

        info!(
            index = job.cluster_index,
            texts = job.problem.len(),
            data = %data_file.display(),
            exp_dir = %job.spec.exp_dir.display(),
            "wrote sub-problem"
        );

        let entry = SubclusterEntry {
            cluster_index: job.cluster_index,
            description: job.description.clone(),
            text_count: job.problem.len(),
            data_path: job.spec.data_path.display().to_string(),
            data_sha256: sha256_file(&data_file)?,
            exp_dir: job.spec.exp_dir.display().to_string(),
            job_path: job_path.display().to_string(),
        };
        entries.retain(|existing| existing.cluster_index != entry.cluster_index);
        entries.push(entry);
    }
    entries.sort_by_key(|entry| entry.cluster_index);

    let manifest = SubclusterManifest {
        manifest_version: MANIFEST_VERSION,
        generated_at: now_utc_string(),
        parent_run_dir: run_dir.display().to_string(),
        parent_iteration_dir: iteration_dir.display().to_string(),
        jobs: entries,
    };
    write_json_pretty(&manifest_path, &manifest)?;
    info!(path = %manifest_path.display(), jobs = manifest.jobs.len(), "wrote subcluster manifest");

    Ok(manifest)
}
