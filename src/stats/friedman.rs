//! Friedman rank test with tie correction.

use tracing::debug;

use crate::error::{EvalError, Result};
use crate::stats::distributions::chi_square_sf;

#[derive(Debug, Clone, PartialEq)]
pub struct FriedmanResult {
    pub statistic: f64,
    pub p_value: f64,
    pub degrees_of_freedom: usize,
    /// Number of blocks (rows).
    pub blocks: usize,
    /// Number of treatments (models).
    pub treatments: usize,
    /// Mean within-block rank of each treatment.
    pub mean_ranks: Vec<f64>,
}

/// Ranks one block, giving tied values the average of the ranks they span.
///
/// Also returns the block's tie term `Σ t (t² − 1)` over tie groups of size `t`.
pub fn rank_block(values: &[f64]) -> (Vec<f64>, f64) {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; values.len()];
    let mut ties = 0.0;
    let mut start = 0;

    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && values[order[end]] == values[order[start]] {
            end += 1;
        }

        // positions start..end hold ranks start+1..=end
        let avg = (start + 1 + end) as f64 / 2.0;
        for &idx in &order[start..end] {
            ranks[idx] = avg;
        }

        let t = (end - start) as f64;
        ties += t * (t * t - 1.0);
        start = end;
    }

    (ranks, ties)
}

/// Per-treatment rank sums and the total tie term over all blocks.
pub(crate) fn rank_sums(blocks: &[Vec<f64>], treatments: usize) -> (Vec<f64>, f64) {
    let mut sums = vec![0.0; treatments];
    let mut ties = 0.0;

    for block in blocks {
        let (ranks, block_ties) = rank_block(block);
        for (sum, rank) in sums.iter_mut().zip(ranks) {
            *sum += rank;
        }
        ties += block_ties;
    }

    (sums, ties)
}

/// Checks that there are at least two treatments, at least one block, and
/// that every block has one value per treatment. Returns the treatment count.
pub(crate) fn check_blocks(blocks: &[Vec<f64>]) -> Result<usize> {
    let treatments = blocks.first().map_or(0, Vec::len);

    if blocks.is_empty() {
        return Err(EvalError::empty("score matrix", "no blocks to rank"));
    }
    if treatments < 2 {
        return Err(EvalError::InsufficientInput {
            required: 2,
            found: treatments,
        });
    }
    if let Some(bad) = blocks.iter().position(|b| b.len() != treatments) {
        return Err(EvalError::Configuration(format!(
            "block {bad} has {} values, expected {treatments}",
            blocks[bad].len()
        )));
    }

    Ok(treatments)
}

/// Friedman chi-square test with tie correction.
///
/// `blocks` holds one row per block, each with one score per treatment.
/// When every block is fully tied the correction factor vanishes; the
/// statistic is then reported as 0 with a p-value of 1.
pub fn friedman(blocks: &[Vec<f64>]) -> Result<FriedmanResult> {
    let k = check_blocks(blocks)?;
    let n = blocks.len();
    let (kf, nf) = (k as f64, n as f64);

    let (sums, ties) = rank_sums(blocks, k);
    let mean_ranks = sums.iter().map(|s| s / nf).collect();

    let correction = 1.0 - ties / (kf * (kf * kf - 1.0) * nf);
    let (statistic, p_value) = if correction <= f64::EPSILON {
        (0.0, 1.0)
    } else {
        let ss: f64 = sums.iter().map(|s| s * s).sum();
        let raw = 12.0 * ss / (kf * nf * (kf + 1.0)) - 3.0 * nf * (kf + 1.0);
        // rounding can push an all-equal rank sum slightly below zero
        let statistic = (raw / correction).max(0.0);
        (statistic, chi_square_sf(statistic, k - 1))
    };

    debug!(statistic, p_value, blocks = n, treatments = k, correction, "Friedman test");

    Ok(FriedmanResult {
        statistic,
        p_value,
        degrees_of_freedom: k - 1,
        blocks: n,
        treatments: k,
        mean_ranks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns_to_blocks(columns: &[&[f64]]) -> Vec<Vec<f64>> {
        (0..columns[0].len())
            .map(|row| columns.iter().map(|c| c[row]).collect())
            .collect()
    }

    #[test]
    fn test_rank_block_averages_ties() {
        let (ranks, ties) = rank_block(&[1.0, 0.0, 1.0]);
        assert_eq!(ranks, vec![2.5, 1.0, 2.5]);
        assert_eq!(ties, 6.0);

        let (ranks, ties) = rank_block(&[3.0, 1.0, 2.0]);
        assert_eq!(ranks, vec![3.0, 1.0, 2.0]);
        assert_eq!(ties, 0.0);
    }

    #[test]
    fn test_reference_scenario() {
        let blocks = columns_to_blocks(&[&[1.0, 1.0, 0.0], &[1.0, 0.0, 0.0], &[0.0, 0.0, 0.0]]);
        let result = friedman(&blocks).unwrap();

        assert!((result.statistic - 3.0).abs() < 1e-12);
        assert!((result.p_value - (-1.5f64).exp()).abs() < 1e-12);
        assert_eq!(result.degrees_of_freedom, 2);
        assert_eq!(result.mean_ranks, vec![2.5, 2.0, 1.5]);
    }

    #[test]
    fn test_identical_models_are_not_different() {
        let pattern = [1.0, 0.0, 1.0, 1.0];
        let blocks = columns_to_blocks(&[&pattern, &pattern, &pattern]);
        let result = friedman(&blocks).unwrap();

        assert_eq!(result.statistic, 0.0);
        assert_eq!(result.p_value, 1.0);
    }

    #[test]
    fn test_untied_scores_match_scipy() {
        // scipy.stats.friedmanchisquare([1,2,3,4],[2,3,4,5],[3,4,5,6]) -> (8.0, 0.01831563888873418)
        let blocks = columns_to_blocks(&[&[1.0, 2.0, 3.0, 4.0], &[2.0, 3.0, 4.0, 5.0], &[3.0, 4.0, 5.0, 6.0]]);
        let result = friedman(&blocks).unwrap();

        assert!((result.statistic - 8.0).abs() < 1e-12);
        assert!((result.p_value - 0.018_315_638_888_734_18).abs() < 1e-12);
    }

    #[test]
    fn test_two_treatments_are_accepted() {
        let blocks = columns_to_blocks(&[&[1.0, 1.0, 1.0, 0.0], &[0.0, 0.0, 0.0, 0.0]]);
        let result = friedman(&blocks).unwrap();
        assert_eq!(result.degrees_of_freedom, 1);
        assert!(result.statistic > 0.0);
    }

    #[test]
    fn test_single_treatment_is_insufficient() {
        let blocks = vec![vec![1.0], vec![0.0]];
        assert!(matches!(
            friedman(&blocks),
            Err(EvalError::InsufficientInput { required: 2, found: 1 })
        ));
    }

    #[test]
    fn test_no_blocks_is_empty() {
        assert!(matches!(friedman(&[]), Err(EvalError::EmptyResult { .. })));
    }

    #[test]
    fn test_ragged_blocks_are_rejected() {
        let blocks = vec![vec![1.0, 0.0], vec![1.0]];
        assert!(matches!(friedman(&blocks), Err(EvalError::Configuration(_))));
    }
}
