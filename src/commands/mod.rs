pub mod decompose;
pub mod status;
pub mod summarize;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

use crate::decompose::{latest_iteration_with, locate_final_iteration};
use crate::recorder::{iteration_dir_name, stage_file_name};

/// Explicit iteration directory, or the latest one holding a final selection.
fn resolve_iteration_dir(run_dir: &Path, iteration: Option<usize>) -> Result<PathBuf> {
    match iteration {
        Some(iteration) => Ok(run_dir.join(iteration_dir_name(iteration))),
        None => locate_final_iteration(run_dir),
    }
}

/// Explicit iteration directory, or the latest one holding `{stage}.json`.
fn resolve_stage_iteration(
    run_dir: &Path,
    iteration: Option<usize>,
    stage: &str,
) -> Result<PathBuf> {
    let artifact = stage_file_name(stage);
    if let Some(iteration) = iteration {
        let dir = run_dir.join(iteration_dir_name(iteration));
        if !dir.join(&artifact).is_file() {
            bail!("{} has no {artifact}", dir.display());
        }
        return Ok(dir);
    }

    latest_iteration_with(run_dir, stage)?
        .with_context(|| format!("no iteration in {} has {artifact}", run_dir.display()))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn stage_iteration_prefers_latest_with_artifact() {
        let dir = tempfile::tempdir().expect("tempdir");
        for iteration in 0..3 {
            fs::create_dir_all(dir.path().join(format!("iteration-{iteration}"))).expect("mkdir");
        }
        fs::write(dir.path().join("iteration-0/round.json"), "{}").expect("write");
        fs::write(dir.path().join("iteration-1/round.json"), "{}").expect("write");

        let found = resolve_stage_iteration(dir.path(), None, "round").expect("resolve");
        assert_eq!(found, dir.path().join("iteration-1"));

        assert!(resolve_stage_iteration(dir.path(), Some(2), "round").is_err());
        assert!(resolve_stage_iteration(dir.path(), None, "final").is_err());
    }
}
