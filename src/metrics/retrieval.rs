use serde::Serialize;

use super::assignment::max_weight_matching;
use crate::model::AssignmentMatrix;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RetrievalScore {
    pub recall: f64,
    pub precision: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DescriptionPerformance {
    /// Pooled over every (text, description) pair.
    pub overall: RetrievalScore,
    pub per_description: Vec<RetrievalScore>,
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Recall and precision of `matching` against the texts each description
/// should cover. `expected` is texts x descriptions, parallel to `matching`.
/// Every description gets a score, even over an empty population.
pub fn description_performance(
    matching: &AssignmentMatrix,
    expected: &[Vec<bool>],
    descriptions: usize,
) -> DescriptionPerformance {
    let mut hits = vec![0usize; descriptions];
    let mut should = vec![0usize; descriptions];
    let mut matched = vec![0usize; descriptions];

    for (text, row) in expected.iter().enumerate() {
        for (description, &wanted) in row.iter().enumerate().take(descriptions) {
            let predicted = matching.is_match(text, description);
            if wanted {
                should[description] += 1;
            }
            if predicted {
                matched[description] += 1;
            }
            if wanted && predicted {
                hits[description] += 1;
            }
        }
    }

    let per_description = (0..descriptions)
        .map(|description| RetrievalScore {
            recall: ratio(hits[description], should[description]),
            precision: ratio(hits[description], matched[description]),
        })
        .collect();

    DescriptionPerformance {
        overall: RetrievalScore {
            recall: ratio(hits.iter().sum(), should.iter().sum()),
            precision: ratio(hits.iter().sum(), matched.iter().sum()),
        },
        per_description,
    }
}

/// Which description each text should match, derived from class labels.
///
/// Descriptions are paired one-to-one with classes by maximal overlap between
/// the texts a description matches and the texts of a class. A text should
/// match exactly the description paired with its class; unpaired descriptions
/// should match nothing.
pub fn expected_membership(
    matching: &AssignmentMatrix,
    labels: &[usize],
    descriptions: usize,
    classes: usize,
) -> Vec<Vec<bool>> {
    let mut overlap = vec![vec![0usize; classes]; descriptions];
    for (text, &class) in labels.iter().enumerate() {
        if class >= classes {
            continue;
        }
        for (description, row) in overlap.iter_mut().enumerate() {
            if matching.is_match(text, description) {
                row[class] += 1;
            }
        }
    }

    let pairing = max_weight_matching(&overlap);
    labels
        .iter()
        .map(|&class| {
            (0..descriptions)
                .map(|description| pairing.get(&description) == Some(&class))
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_description_and_pooled_scores() {
        let matching = AssignmentMatrix::from_bools(&[
            vec![true, false],
            vec![true, true],
            vec![false, false],
        ]);
        let expected = vec![vec![true, false], vec![false, true], vec![false, true]];

        let performance = description_performance(&matching, &expected, 2);

        // description 0: should {0}, matched {0, 1}
        assert_eq!(performance.per_description[0].recall, 1.0);
        assert_eq!(performance.per_description[0].precision, 0.5);
        // description 1: should {1, 2}, matched {1}
        assert_eq!(performance.per_description[1].recall, 0.5);
        assert_eq!(performance.per_description[1].precision, 1.0);
        // pooled: hits 2, should 3, matched 3
        assert!((performance.overall.recall - 2.0 / 3.0).abs() < 1e-12);
        assert!((performance.overall.precision - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn descriptions_without_matches_default_to_zero() {
        let matching = AssignmentMatrix::from_bools(&[vec![false], vec![false]]);
        let expected = vec![vec![false], vec![false]];

        let performance = description_performance(&matching, &expected, 1);
        assert_eq!(performance.per_description, vec![RetrievalScore::default()]);
        assert_eq!(performance.overall, RetrievalScore::default());
    }

    #[test]
    fn empty_population_scores_every_description_zero() {
        let matching = AssignmentMatrix::from_rows(Vec::new());

        let performance = description_performance(&matching, &[], 2);
        assert_eq!(performance.per_description, vec![RetrievalScore::default(); 2]);
        assert_eq!(performance.overall, RetrievalScore::default());
    }

    #[test]
    fn real_valued_scores_use_match_threshold() {
        let matching = AssignmentMatrix::from_rows(vec![vec![0.49], vec![0.5]]);
        let expected = vec![vec![true], vec![true]];

        let performance = description_performance(&matching, &expected, 1);
        assert_eq!(performance.per_description[0].recall, 0.5);
        assert_eq!(performance.per_description[0].precision, 1.0);
    }

    #[test]
    fn expected_membership_pairs_descriptions_with_classes() {
        // Description 0 covers class 1 texts, description 1 covers class 0 texts,
        // description 2 matches nothing.
        let matching = AssignmentMatrix::from_bools(&[
            vec![false, true, false],
            vec![false, true, false],
            vec![true, false, false],
        ]);
        let labels = [0, 0, 1];

        let expected = expected_membership(&matching, &labels, 3, 2);
        assert_eq!(
            expected,
            vec![
                vec![false, true, false],
                vec![false, true, false],
                vec![true, false, false],
            ]
        );
    }
}
