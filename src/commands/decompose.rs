use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use tracing::info;

use super::resolve_iteration_dir;
use crate::cli::DecomposeArgs;
use crate::decompose::{
    FinalSelection, JobLauncher, PrintLauncher, parse_indices, plan_child_jobs, write_child_jobs,
};
use crate::error::DecomposeError;
use crate::model::{Problem, RunArgs};

pub fn run(args: DecomposeArgs) -> Result<()> {
    let stdin = io::stdin();
    let stdout = io::stdout();
    run_with_io(args, &mut stdin.lock(), &mut stdout.lock())
}

/// Operator loop over arbitrary input/output streams.
pub fn run_with_io<R: BufRead, W: Write>(
    args: DecomposeArgs,
    input: &mut R,
    out: &mut W,
) -> Result<()> {
    let iteration_dir = resolve_iteration_dir(&args.run_dir, args.iteration)?;
    let selection = FinalSelection::load(&iteration_dir)?;
    let run_args = RunArgs::load(&args.run_dir)?;
    let parent = Problem::load(&run_args.data_path)?;

    info!(
        iteration_dir = %iteration_dir.display(),
        descriptions = selection.descriptions.len(),
        texts = parent.len(),
        "loaded final selection"
    );

    writeln!(out, "Available clusters and their indices:")?;
    for row in selection.listing() {
        match row.index {
            Some(index) => writeln!(
                out,
                "Index {index}: {}  ({:.2}%)",
                row.description, row.percentage
            )?,
            None => writeln!(out, "Unmatched: {} texts  ({:.2}%)", row.count, row.percentage)?,
        }
    }

    let indices = if args.indices.is_empty() {
        prompt_indices(input, out)?
    } else {
        let mut indices = Vec::with_capacity(args.indices.len());
        for &index in &args.indices {
            if !indices.contains(&index) {
                indices.push(index);
            }
        }
        indices
    };

    let jobs = plan_child_jobs(&args.run_dir, &run_args, &selection, &parent, &indices)?;
    if args.dry_run {
        info!(jobs = jobs.len(), "dry-run; no sub-problems written");
    } else {
        write_child_jobs(&args.run_dir, &iteration_dir, &jobs)?;
    }

    let mut launcher = PrintLauncher::new(args.launcher_program, &mut *out);
    for job in &jobs {
        launcher.launch(&job.spec)?;
    }
    Ok(())
}

fn prompt_indices<R: BufRead, W: Write>(input: &mut R, out: &mut W) -> Result<Vec<usize>> {
    write!(
        out,
        "Enter the indices of clusters you want to sub-cluster (separated by space): "
    )?;
    out.flush().context("failed to flush prompt")?;

    let mut line = String::new();
    let read = input
        .read_line(&mut line)
        .context("failed to read cluster selection")?;
    if read == 0 {
        return Err(DecomposeError::EmptySelection.into());
    }
    Ok(parse_indices(&line)?)
}
