use tracing::info;

use crate::metrics::{best_label_mapping, cluster_agreement};
use crate::model::{LabelSet, SelectResults, UNMATCHED};

/// Scores a selection against ground truth.
///
/// Unmatched texts are dropped before scoring: they count toward
/// `num_unmatched_text_indices` only, never as an extra class or a miss.
pub(crate) fn score_selection(
    truth: &LabelSet,
    descriptions: &[String],
    predictions: &[i64],
) -> SelectResults {
    let mut labels = Vec::with_capacity(predictions.len());
    let mut matched = Vec::with_capacity(predictions.len());
    let mut unmatched = 0usize;

    for (&label, &prediction) in truth.labels.iter().zip(predictions) {
        if prediction == UNMATCHED {
            unmatched += 1;
        } else if let Ok(cluster) = usize::try_from(prediction) {
            labels.push(label);
            matched.push(cluster);
        }
    }

    let agreement = cluster_agreement(&labels, &matched);
    info!(
        normalized_mutual_info = agreement.normalized_mutual_info,
        adjusted_rand_index = agreement.adjusted_rand_index,
        macro_f1 = agreement.macro_f1,
        matched = labels.len(),
        unmatched,
        "agreement on matched texts"
    );

    let mapping = best_label_mapping(&labels, &matched);
    let mapped_descriptions: Vec<Vec<String>> = (0..truth.class_descriptions.len())
        .map(|class| {
            descriptions
                .iter()
                .enumerate()
                .filter(|(cluster, _)| mapping.get(cluster) == Some(&class))
                .map(|(_, description)| description.clone())
                .collect()
        })
        .collect();

    for (true_description, mapped) in truth.class_descriptions.iter().zip(&mapped_descriptions) {
        info!(
            true_description = %true_description,
            mapped = ?mapped,
            "label mapping"
        );
    }

    SelectResults {
        normalized_mutual_info: agreement.normalized_mutual_info,
        adjusted_rand_index: agreement.adjusted_rand_index,
        macro_f1: agreement.macro_f1,
        mapped_descriptions,
        num_unmatched_text_indices: unmatched,
    }
}
