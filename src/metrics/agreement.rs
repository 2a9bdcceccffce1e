use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use super::assignment::{best_label_mapping, contingency};

/// Agreement between predicted clusters and ground-truth classes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ClusterAgreement {
    pub normalized_mutual_info: f64,
    pub adjusted_rand_index: f64,
    pub macro_f1: f64,
}

/// Scores two parallel labelings. Callers pass matched texts only; unmatched
/// texts are never scored as a class of their own.
pub fn cluster_agreement(labels: &[usize], predictions: &[usize]) -> ClusterAgreement {
    if labels.is_empty() || labels.len() != predictions.len() {
        return ClusterAgreement::default();
    }

    let table = contingency(labels, predictions);
    let mapping = best_label_mapping(labels, predictions);

    ClusterAgreement {
        normalized_mutual_info: normalized_mutual_info(&table, labels.len()),
        adjusted_rand_index: adjusted_rand_index(&table, labels.len()),
        macro_f1: macro_f1(labels, predictions, &mapping),
    }
}

fn row_sums(table: &[Vec<usize>]) -> Vec<usize> {
    table.iter().map(|row| row.iter().sum()).collect()
}

fn col_sums(table: &[Vec<usize>]) -> Vec<usize> {
    let cols = table.first().map_or(0, Vec::len);
    (0..cols)
        .map(|col| table.iter().map(|row| row[col]).sum())
        .collect()
}

fn entropy(counts: &[usize], n: f64) -> f64 {
    counts
        .iter()
        .filter(|&&count| count > 0)
        .map(|&count| {
            let p = count as f64 / n;
            -p * p.ln()
        })
        .sum()
}

fn non_empty(counts: &[usize]) -> usize {
    counts.iter().filter(|&&count| count > 0).count()
}

/// Mutual information normalized by the arithmetic mean of both entropies.
fn normalized_mutual_info(table: &[Vec<usize>], total: usize) -> f64 {
    let n = total as f64;
    let clusters = row_sums(table);
    let classes = col_sums(table);

    // Both sides a single group: the partitions are identical.
    if non_empty(&clusters) == 1 && non_empty(&classes) == 1 {
        return 1.0;
    }

    let mut mutual_info = 0.0_f64;
    for (cluster, row) in table.iter().enumerate() {
        for (class, &count) in row.iter().enumerate() {
            if count == 0 {
                continue;
            }
            let p_joint = count as f64 / n;
            let p_cluster = clusters[cluster] as f64 / n;
            let p_class = classes[class] as f64 / n;
            mutual_info += p_joint * (p_joint / (p_cluster * p_class)).ln();
        }
    }

    let denominator = 0.5 * (entropy(&clusters, n) + entropy(&classes, n));
    if denominator < f64::EPSILON {
        return 0.0;
    }
    (mutual_info / denominator).clamp(0.0, 1.0)
}

fn pairs(count: usize) -> f64 {
    if count < 2 {
        0.0
    } else {
        (count * (count - 1)) as f64 / 2.0
    }
}

fn adjusted_rand_index(table: &[Vec<usize>], total: usize) -> f64 {
    let clusters = row_sums(table);
    let classes = col_sums(table);
    let cluster_groups = non_empty(&clusters);
    let class_groups = non_empty(&classes);

    // Trivial partitions that agree exactly.
    if cluster_groups == class_groups && (cluster_groups == 1 || cluster_groups == total) {
        return 1.0;
    }

    let sum_joint: f64 = table.iter().flatten().map(|&count| pairs(count)).sum();
    let sum_clusters: f64 = clusters.iter().map(|&count| pairs(count)).sum();
    let sum_classes: f64 = classes.iter().map(|&count| pairs(count)).sum();
    let total_pairs = pairs(total);
    if total_pairs < f64::EPSILON {
        return 0.0;
    }

    let expected = sum_clusters * sum_classes / total_pairs;
    let max_index = 0.5 * (sum_clusters + sum_classes);
    let denominator = max_index - expected;
    if denominator.abs() < f64::EPSILON {
        return 0.0;
    }
    (sum_joint - expected) / denominator
}

/// F1 per true class after relabelling clusters through `mapping`, averaged
/// over the classes present. Unmapped clusters count as misses.
fn macro_f1(labels: &[usize], predictions: &[usize], mapping: &BTreeMap<usize, usize>) -> f64 {
    let present: BTreeSet<usize> = labels.iter().copied().collect();
    if present.is_empty() {
        return 0.0;
    }

    let mapped: Vec<Option<usize>> = predictions
        .iter()
        .map(|cluster| mapping.get(cluster).copied())
        .collect();

    let total: f64 = present
        .iter()
        .map(|&class| {
            let true_count = labels.iter().filter(|&&label| label == class).count();
            let predicted_count = mapped.iter().filter(|&&p| p == Some(class)).count();
            let hits = labels
                .iter()
                .zip(&mapped)
                .filter(|&(&label, &p)| label == class && p == Some(class))
                .count();

            let denominator = true_count + predicted_count;
            if denominator == 0 {
                0.0
            } else {
                2.0 * hits as f64 / denominator as f64
            }
        })
        .sum();

    total / present.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(left: f64, right: f64) -> bool {
        (left - right).abs() < 1e-9
    }

    #[test]
    fn perfectly_aligned_labels_score_one_after_relabelling() {
        let labels = [0, 0, 1, 1, 2, 2, 2];
        let predictions = [2, 2, 0, 0, 1, 1, 1];
        let agreement = cluster_agreement(&labels, &predictions);

        assert!(close(agreement.normalized_mutual_info, 1.0));
        assert!(close(agreement.adjusted_rand_index, 1.0));
        assert!(close(agreement.macro_f1, 1.0));
    }

    #[test]
    fn single_group_on_both_sides_is_perfect() {
        let agreement = cluster_agreement(&[4, 4, 4], &[1, 1, 1]);
        assert!(close(agreement.normalized_mutual_info, 1.0));
        assert!(close(agreement.adjusted_rand_index, 1.0));
        assert!(close(agreement.macro_f1, 1.0));
    }

    #[test]
    fn empty_or_mismatched_inputs_default_to_zero() {
        assert_eq!(cluster_agreement(&[], &[]), ClusterAgreement::default());
        assert_eq!(cluster_agreement(&[0, 1], &[0]), ClusterAgreement::default());
    }

    #[test]
    fn independent_labelings_have_no_mutual_information() {
        // Every cluster contains one text of each class.
        let labels = [0, 1, 0, 1];
        let predictions = [0, 0, 1, 1];
        let agreement = cluster_agreement(&labels, &predictions);

        assert!(close(agreement.normalized_mutual_info, 0.0));
        assert!(agreement.adjusted_rand_index < 0.0);
        assert!(close(agreement.macro_f1, 0.5));
    }

    #[test]
    fn adjusted_rand_index_matches_reference_value() {
        // sklearn.metrics.adjusted_rand_score([0, 0, 1, 1], [0, 0, 1, 2]) == 0.5714285714285715
        let agreement = cluster_agreement(&[0, 0, 1, 1], &[0, 0, 1, 2]);
        assert!(close(agreement.adjusted_rand_index, 4.0 / 7.0));
    }

    #[test]
    fn normalized_mutual_info_matches_reference_value() {
        // sklearn.metrics.normalized_mutual_info_score([0, 0, 1, 1], [0, 0, 1, 2]) == 0.8
        let agreement = cluster_agreement(&[0, 0, 1, 1], &[0, 0, 1, 2]);
        assert!(close(agreement.normalized_mutual_info, 0.8));
    }

    #[test]
    fn unmapped_cluster_members_count_as_misses_for_macro_f1() {
        // Cluster 2 has no class left to map to.
        let labels = [0, 0, 1, 1];
        let predictions = [0, 0, 1, 2];
        let agreement = cluster_agreement(&labels, &predictions);

        // class 0: f1 = 1.0; class 1: hits 1, true 2, predicted 1 -> 2/3
        assert!(close(agreement.macro_f1, (1.0 + 2.0 / 3.0) / 2.0));
    }
}
