use std::collections::BTreeMap;

const UNREACHABLE: i64 = i64::MAX / 4;

/// Co-occurrence counts indexed `[cluster][class]`.
pub fn contingency(labels: &[usize], predictions: &[usize]) -> Vec<Vec<usize>> {
    let clusters = predictions.iter().max().map_or(0, |max| max + 1);
    let classes = labels.iter().max().map_or(0, |max| max + 1);

    let mut table = vec![vec![0usize; classes]; clusters];
    for (&class, &cluster) in labels.iter().zip(predictions) {
        table[cluster][class] += 1;
    }
    table
}

/// Injective cluster -> class mapping maximizing total co-occurrence.
///
/// Solved as a rectangular assignment problem rather than greedily. Pairs with
/// zero overlap are left out, so clusters without a worthwhile partner stay
/// unmapped.
pub fn best_label_mapping(labels: &[usize], predictions: &[usize]) -> BTreeMap<usize, usize> {
    let table = contingency(labels, predictions);
    max_weight_matching(&table)
}

/// Row -> column matching with maximal total weight over a (possibly
/// rectangular) weight table. Zero-weight pairs are dropped from the result.
pub fn max_weight_matching(weights: &[Vec<usize>]) -> BTreeMap<usize, usize> {
    let rows = weights.len();
    let cols = weights.iter().map(Vec::len).max().unwrap_or(0);
    if rows == 0 || cols == 0 {
        return BTreeMap::new();
    }

    let weight = |row: usize, col: usize| weights[row].get(col).copied().unwrap_or(0);

    let pairs: Vec<(usize, usize)> = if rows <= cols {
        let cost: Vec<Vec<i64>> = (0..rows)
            .map(|row| (0..cols).map(|col| -(weight(row, col) as i64)).collect())
            .collect();
        hungarian(&cost).into_iter().enumerate().collect()
    } else {
        let cost: Vec<Vec<i64>> = (0..cols)
            .map(|col| (0..rows).map(|row| -(weight(row, col) as i64)).collect())
            .collect();
        hungarian(&cost)
            .into_iter()
            .enumerate()
            .map(|(col, row)| (row, col))
            .collect()
    };

    pairs
        .into_iter()
        .filter(|&(row, col)| weight(row, col) > 0)
        .collect()
}

/// Minimum-cost assignment for `n <= m`; returns the column chosen for every row.
fn hungarian(cost: &[Vec<i64>]) -> Vec<usize> {
    let n = cost.len();
    let m = cost.first().map_or(0, Vec::len);
    debug_assert!(n <= m);

    // 1-indexed potentials; column 0 is a virtual source.
    let mut u = vec![0i64; n + 1];
    let mut v = vec![0i64; m + 1];
    let mut owner = vec![0usize; m + 1];
    let mut way = vec![0usize; m + 1];

    for row in 1..=n {
        owner[0] = row;
        let mut current = 0usize;
        let mut min_slack = vec![UNREACHABLE; m + 1];
        let mut used = vec![false; m + 1];

        loop {
            used[current] = true;
            let active_row = owner[current];
            let mut delta = UNREACHABLE;
            let mut next = 0usize;

            for col in 1..=m {
                if used[col] {
                    continue;
                }
                let slack = cost[active_row - 1][col - 1] - u[active_row] - v[col];
                if slack < min_slack[col] {
                    min_slack[col] = slack;
                    way[col] = current;
                }
                if min_slack[col] < delta {
                    delta = min_slack[col];
                    next = col;
                }
            }

            for col in 0..=m {
                if used[col] {
                    u[owner[col]] += delta;
                    v[col] -= delta;
                } else {
                    min_slack[col] -= delta;
                }
            }

            current = next;
            if owner[current] == 0 {
                break;
            }
        }

        loop {
            let previous = way[current];
            owner[current] = owner[previous];
            current = previous;
            if current == 0 {
                break;
            }
        }
    }

    let mut assignment = vec![0usize; n];
    for col in 1..=m {
        if owner[col] != 0 {
            assignment[owner[col] - 1] = col - 1;
        }
    }
    assignment
}
