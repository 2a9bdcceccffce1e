use std::io::{self, Write};

use rand::Rng;
use rand::seq::IndexedRandom;
use serde::Serialize;

use super::chart::ChartSlice;
use crate::model::UNMATCHED;

const EXAMPLES_PER_CLUSTER: usize = 3;
const RULE_WIDTH: usize = 70;

/// Share of `population` taken by `count`, in percent. An empty population is 0%.
pub fn percentage(count: usize, population: usize) -> f64 {
    if population == 0 {
        0.0
    } else {
        count as f64 / population as f64 * 100.0
    }
}

/// Cluster sizes for one selection, including the unmatched bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClusterDistribution {
    counts: Vec<usize>,
    unmatched: usize,
}

impl ClusterDistribution {
    /// Predictions outside `-1..descriptions` are not counted.
    pub fn from_predictions(predictions: &[i64], descriptions: usize) -> Self {
        let mut counts = vec![0usize; descriptions];
        let mut unmatched = 0usize;
        for &prediction in predictions {
            if prediction == UNMATCHED {
                unmatched += 1;
            } else if let Some(count) = usize::try_from(prediction)
                .ok()
                .and_then(|index| counts.get_mut(index))
            {
                *count += 1;
            }
        }
        Self { counts, unmatched }
    }

    pub fn counts(&self) -> &[usize] {
        &self.counts
    }

    pub fn count(&self, description: usize) -> usize {
        self.counts.get(description).copied().unwrap_or(0)
    }

    pub fn unmatched(&self) -> usize {
        self.unmatched
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum::<usize>() + self.unmatched
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterEntry {
    pub description: String,
    pub count: usize,
    pub percentage: f64,
    pub examples: Vec<String>,
}

/// Operator-facing digest of a select stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterSummary {
    pub population: usize,
    pub unmatched_count: usize,
    pub unmatched_percentage: f64,
    pub clusters: Vec<ClusterEntry>,
}

impl ClusterSummary {
    pub fn build<R: Rng + ?Sized>(
        texts: &[String],
        descriptions: &[String],
        predictions: &[i64],
        rng: &mut R,
    ) -> Self {
        let population = texts.len();
        let distribution = ClusterDistribution::from_predictions(predictions, descriptions.len());

        let clusters = descriptions
            .iter()
            .enumerate()
            .map(|(index, description)| {
                let members: Vec<&String> = texts
                    .iter()
                    .zip(predictions)
                    .filter(|&(_, &prediction)| prediction == index as i64)
                    .map(|(text, _)| text)
                    .collect();
                let examples = members
                    .choose_multiple(&mut *rng, EXAMPLES_PER_CLUSTER.min(members.len()))
                    .map(|text| (*text).clone())
                    .collect();
                let count = distribution.count(index);

                ClusterEntry {
                    description: description.clone(),
                    count,
                    percentage: percentage(count, population),
                    examples,
                }
            })
            .collect();

        Self {
            population,
            unmatched_count: distribution.unmatched(),
            unmatched_percentage: percentage(distribution.unmatched(), population),
            clusters,
        }
    }

    /// Writes the plain-text cluster report.
    pub fn write_report<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let rule = "-".repeat(RULE_WIDTH);

        writeln!(
            out,
            "This text file provides more information about each selected cluster"
        )?;
        writeln!(out, "{rule}")?;
        writeln!(
            out,
            "Unmatched count: {} = {:.2}%   Data size: {}",
            self.unmatched_count, self.unmatched_percentage, self.population
        )?;
        writeln!(out, "{rule}")?;

        for cluster in &self.clusters {
            writeln!(out, "==> Description: {}", cluster.description)?;
            writeln!(out, "==> Count: {}", cluster.count)?;
            writeln!(out, "==> Percentage: {:.2}%", cluster.percentage)?;
            writeln!(out, "==> Examples:")?;
            for example in &cluster.examples {
                writeln!(out, "- {example}")?;
            }
            writeln!(out)?;
            writeln!(out, "{rule}")?;
        }
        Ok(())
    }

    pub fn chart_slices(&self) -> Vec<ChartSlice> {
        self.clusters
            .iter()
            .map(|cluster| ChartSlice {
                label: cluster.description.clone(),
                value: cluster.percentage,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    fn texts(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("text {i}")).collect()
    }

    fn report(summary: &ClusterSummary) -> String {
        let mut out = Vec::new();
        summary.write_report(&mut out).expect("write report");
        String::from_utf8(out).expect("utf8 report")
    }

    #[test]
    fn five_text_scenario_counts_and_percentages() {
        let texts = texts(5);
        let descriptions = vec!["sports".to_string(), "finance".to_string()];
        let predictions = [0, 0, -1, 1, 1];
        let mut rng = StdRng::seed_from_u64(7);

        let summary = ClusterSummary::build(&texts, &descriptions, &predictions, &mut rng);

        assert_eq!(summary.population, 5);
        assert_eq!(summary.unmatched_count, 1);
        assert_eq!(summary.unmatched_percentage, 20.0);
        assert_eq!(summary.clusters[0].count, 2);
        assert_eq!(summary.clusters[0].percentage, 40.0);
        assert_eq!(summary.clusters[1].count, 2);
        assert_eq!(summary.clusters[1].percentage, 40.0);
        assert_eq!(summary.clusters[0].examples.len(), 2);
        assert_eq!(summary.clusters[1].examples.len(), 2);

        let text = report(&summary);
        assert!(text.contains("Unmatched count: 1 = 20.00%   Data size: 5"));
        assert!(text.contains("==> Description: sports"));
        assert!(text.contains("==> Description: finance"));
        assert_eq!(text.matches("==> Percentage: 40.00%").count(), 2);
    }

    #[test]
    fn empty_population_reports_zero_percent() {
        let descriptions = vec!["anything".to_string()];
        let mut rng = StdRng::seed_from_u64(1);

        let summary = ClusterSummary::build(&[], &descriptions, &[], &mut rng);
        assert_eq!(summary.unmatched_percentage, 0.0);
        assert_eq!(summary.clusters[0].percentage, 0.0);
        assert!(summary.clusters[0].examples.is_empty());
        assert!(report(&summary).contains("Data size: 0"));
    }

    #[test]
    fn zero_count_cluster_has_no_examples() {
        let texts = texts(2);
        let descriptions = vec!["used".to_string(), "unused".to_string()];
        let mut rng = StdRng::seed_from_u64(3);

        let summary = ClusterSummary::build(&texts, &descriptions, &[0, 0], &mut rng);
        assert_eq!(summary.clusters[1].count, 0);
        assert!(summary.clusters[1].examples.is_empty());
        assert!(report(&summary).contains("==> Percentage: 0.00%"));
    }

    struct ClosedSink;

    impl Write for ClosedSink {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn report_write_failure_is_returned() {
        let mut rng = StdRng::seed_from_u64(5);
        let summary = ClusterSummary::build(&texts(2), &["a".to_string()], &[0, -1], &mut rng);

        let err = summary
            .write_report(&mut ClosedSink)
            .expect_err("sink rejects writes");
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn distribution_ignores_out_of_range_predictions() {
        let distribution = ClusterDistribution::from_predictions(&[0, 5, -1, -7], 2);
        assert_eq!(distribution.counts(), &[1, 0]);
        assert_eq!(distribution.unmatched(), 1);
    }

    proptest! {
        #[test]
        fn counts_and_percentages_are_conserved(
            raw in prop::collection::vec(-1i64..4, 0..40),
            seed in any::<u64>()
        ) {
            let texts = texts(raw.len());
            let descriptions: Vec<String> = (0..4).map(|i| format!("d{i}")).collect();
            let mut rng = StdRng::seed_from_u64(seed);

            let distribution = ClusterDistribution::from_predictions(&raw, descriptions.len());
            prop_assert_eq!(distribution.total(), raw.len());

            let summary = ClusterSummary::build(&texts, &descriptions, &raw, &mut rng);
            let described: f64 = summary.clusters.iter().map(|cluster| cluster.percentage).sum();
            prop_assert!(described <= 100.0 + 1e-9);
            prop_assert!((0.0..=100.0).contains(&summary.unmatched_percentage));
            if !raw.is_empty() {
                prop_assert!((described + summary.unmatched_percentage - 100.0).abs() < 1e-9);
            }

            for (index, cluster) in summary.clusters.iter().enumerate() {
                prop_assert!((0.0..=100.0).contains(&cluster.percentage));
                prop_assert_eq!(cluster.examples.len(), cluster.count.min(3));

                let members: Vec<&String> = texts
                    .iter()
                    .zip(&raw)
                    .filter(|&(_, &p)| p == index as i64)
                    .map(|(text, _)| text)
                    .collect();
                let mut seen = cluster.examples.clone();
                seen.sort();
                seen.dedup();
                prop_assert_eq!(seen.len(), cluster.examples.len());
                prop_assert!(cluster.examples.iter().all(|example| members.contains(&example)));
            }
        }
    }
}
