//! Nemenyi post-hoc test on Friedman mean ranks.

use crate::error::{EvalError, Result};
use crate::stats::distributions::studentized_range_sf;
use crate::stats::friedman::{check_blocks, rank_sums};

/// Symmetric model × model matrix of pairwise p-values.
#[derive(Debug, Clone, PartialEq)]
pub struct PairwiseMatrix {
    pub models: Vec<String>,
    pub p_values: Vec<Vec<f64>>,
}

impl PairwiseMatrix {
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.models.iter().position(|m| m == a)?;
        let j = self.models.iter().position(|m| m == b)?;
        Some(self.p_values[i][j])
    }

    /// Pairs whose p-value falls below `alpha`, each pair listed once.
    pub fn significant_pairs(&self, alpha: f64) -> Vec<(&str, &str, f64)> {
        let mut pairs = Vec::new();
        for i in 0..self.models.len() {
            for j in (i + 1)..self.models.len() {
                let p = self.p_values[i][j];
                if p < alpha {
                    pairs.push((self.models[i].as_str(), self.models[j].as_str(), p));
                }
            }
        }
        pairs
    }
}

/// Nemenyi post-hoc test following a Friedman test over the same blocks.
///
/// For each pair the mean-rank difference is scaled by
/// `sqrt(k (k + 1) / (6 n))`, multiplied by √2, and referred to the
/// studentized range distribution with `k` groups and infinite degrees of
/// freedom. The diagonal is 1.
pub fn nemenyi(blocks: &[Vec<f64>], models: &[String]) -> Result<PairwiseMatrix> {
    let k = check_blocks(blocks)?;
    if models.len() != k {
        return Err(EvalError::Configuration(format!(
            "{} model names given for {k} score columns",
            models.len()
        )));
    }

    let n = blocks.len() as f64;
    let kf = k as f64;
    let (sums, _) = rank_sums(blocks, k);
    let mean_ranks: Vec<f64> = sums.iter().map(|s| s / n).collect();
    let scale = (kf * (kf + 1.0) / (6.0 * n)).sqrt();

    let mut p_values = vec![vec![1.0; k]; k];
    for i in 0..k {
        for j in (i + 1)..k {
            let q = (mean_ranks[i] - mean_ranks[j]).abs() / scale * std::f64::consts::SQRT_2;
            let p = studentized_range_sf(q, k);
            p_values[i][j] = p;
            p_values[j][i] = p;
        }
    }

    Ok(PairwiseMatrix {
        models: models.to_vec(),
        p_values,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("m{i}")).collect()
    }

    #[test]
    fn test_matrix_is_symmetric_with_unit_diagonal() {
        let blocks = vec![
            vec![1.0, 1.0, 0.0],
            vec![1.0, 0.0, 0.0],
            vec![1.0, 0.0, 0.0],
            vec![1.0, 1.0, 0.0],
            vec![1.0, 0.0, 1.0],
        ];
        let matrix = nemenyi(&blocks, &names(3)).unwrap();

        for i in 0..3 {
            assert_eq!(matrix.p_values[i][i], 1.0);
            for j in 0..3 {
                assert_eq!(matrix.p_values[i][j], matrix.p_values[j][i]);
                assert!((0.0..=1.0).contains(&matrix.p_values[i][j]));
            }
        }
    }

    #[test]
    fn test_two_models_closed_form() {
        // all 10 blocks favour m1: mean ranks 2 and 1, scale sqrt(2*3/60)
        let blocks = vec![vec![1.0, 0.0]; 10];
        let matrix = nemenyi(&blocks, &names(2)).unwrap();

        let q = 1.0 / (0.1f64).sqrt() * std::f64::consts::SQRT_2;
        let expected = crate::stats::distributions::erfc(q / 2.0);
        assert!((matrix.get("m1", "m2").unwrap() - expected).abs() < 1e-7);
    }

    #[test]
    fn test_three_models_match_reference_values() {
        // mean ranks 31/12, 22/12 and 19/12; expected values are
        // studentized_range.sf(q, 3, inf), as posthoc_nemenyi_friedman reports
        let mut blocks = vec![vec![1.0, 0.0, 0.0]; 6];
        blocks.extend(vec![vec![1.0, 1.0, 0.0]; 4]);
        blocks.extend(vec![vec![0.0, 0.0, 1.0]; 2]);
        let matrix = nemenyi(&blocks, &names(3)).unwrap();

        let expected = [
            ("m1", "m2", 0.157_546_959_4),
            ("m1", "m3", 0.038_034_586_7),
            ("m2", "m3", 0.813_356_919_7),
        ];
        for (a, b, p) in expected {
            let got = matrix.get(a, b).unwrap();
            assert!((got - p).abs() < 1e-6, "{a} vs {b}: {got} != {p}");
        }
        assert_eq!(
            matrix.significant_pairs(0.05).into_iter().map(|(a, b, _)| (a, b)).collect::<Vec<_>>(),
            vec![("m1", "m3")]
        );
    }

    #[test]
    fn test_larger_gap_means_smaller_p() {
        let blocks: Vec<Vec<f64>> = (0..30)
            .map(|i| vec![1.0, if i % 2 == 0 { 1.0 } else { 0.0 }, 0.0])
            .collect();
        let matrix = nemenyi(&blocks, &names(3)).unwrap();

        let p12 = matrix.get("m1", "m2").unwrap();
        let p13 = matrix.get("m1", "m3").unwrap();
        assert!(p13 < p12);
        let strict: Vec<_> = matrix
            .significant_pairs(0.001)
            .into_iter()
            .map(|(a, b, _)| (a, b))
            .collect();
        assert_eq!(strict, vec![("m1", "m3")]);
    }

    #[test]
    fn test_model_count_must_match() {
        let blocks = vec![vec![1.0, 0.0, 1.0]];
        assert!(matches!(nemenyi(&blocks, &names(2)), Err(EvalError::Configuration(_))));
    }
}
