use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use tracing::{info, warn};

use super::resolve_stage_iteration;
use crate::cli::SummarizeArgs;
use crate::model::{Problem, RunArgs, SelectArtifact};
use crate::recorder::chart::{CHART_FILE, ChartRenderer, SvgPieChart};
use crate::recorder::summary::ClusterSummary;
use crate::recorder::{CHART_TITLE, cluster_info_file_name, stage_file_name};
use crate::util::read_json;

/// Files rebuilt by one summarize invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct SummarizeOutput {
    pub cluster_info: PathBuf,
    pub chart: Option<PathBuf>,
}

pub fn run(args: SummarizeArgs) -> Result<()> {
    summarize(&args, &SvgPieChart).map(|_| ())
}

pub fn summarize(args: &SummarizeArgs, chart: &dyn ChartRenderer) -> Result<SummarizeOutput> {
    let iteration_dir = resolve_stage_iteration(&args.run_dir, args.iteration, &args.stage)?;
    let run_args = RunArgs::load(&args.run_dir)?;
    let problem = Problem::load(&run_args.data_path)?;

    let artifact_path = iteration_dir.join(stage_file_name(&args.stage));
    let artifact: SelectArtifact = read_json(&artifact_path)
        .with_context(|| format!("{} is not a select artifact", artifact_path.display()))?;
    if artifact.cluster_predictions.len() != problem.len() {
        bail!(
            "{} holds {} predictions but the problem has {} texts",
            artifact_path.display(),
            artifact.cluster_predictions.len(),
            problem.len()
        );
    }

    let mut rng: Box<dyn RngCore> = match args.seed {
        Some(seed) => Box::new(StdRng::seed_from_u64(seed)),
        None => Box::new(rand::rng()),
    };
    let summary = ClusterSummary::build(
        &problem.texts,
        &artifact.descriptions,
        &artifact.cluster_predictions,
        rng.as_mut(),
    );

    let cluster_info = iteration_dir.join(cluster_info_file_name(&args.stage));
    let mut out = BufWriter::new(
        File::create(&cluster_info)
            .with_context(|| format!("failed to create {}", cluster_info.display()))?,
    );
    summary
        .write_report(&mut out)
        .and_then(|()| out.flush())
        .with_context(|| format!("failed to write {}", cluster_info.display()))?;
    info!(
        path = %cluster_info.display(),
        clusters = summary.clusters.len(),
        unmatched = summary.unmatched_count,
        "wrote cluster summary"
    );

    let chart_path = iteration_dir.join(CHART_FILE);
    let chart = match chart.render(CHART_TITLE, &summary.chart_slices(), &chart_path) {
        Ok(()) => {
            info!(path = %chart_path.display(), "wrote cluster chart");
            Some(chart_path)
        }
        Err(err) => {
            warn!(error = %err, "chart rendering failed; cluster report kept");
            None
        }
    };

    Ok(SummarizeOutput {
        cluster_info,
        chart,
    })
}
