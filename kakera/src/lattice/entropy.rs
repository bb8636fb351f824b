use super::Lattice;
use crate::errors::{KakeraError, Result};

impl Lattice<'_> {
    /// Computes the entropy of the path distribution `P(path) ∝ exp(alpha * score(path))`.
    ///
    /// # Errors
    ///
    /// [`KakeraError::Configuration`] is returned when `alpha` is not a positive finite number.
    pub fn entropy(&self, alpha: f32) -> Result<f64> {
        if !alpha.is_finite() || alpha <= 0.0 {
            return Err(KakeraError::configuration(
                "alpha",
                format!("must be a positive finite number, but got {alpha}"),
            ));
        }
        let alpha = f64::from(alpha);
        let fwd = self.forward_log_z(alpha);
        let len = self.len();
        let mut h = vec![0.0; len + 1];
        for e in self.end_positions() {
            let mut acc = 0.0;
            for &i in &self.end_nodes[e] {
                let node = &self.nodes[i];
                let log_p = fwd[node.begin] + alpha * f64::from(node.score) - fwd[e];
                acc += log_p.exp() * (h[node.begin] + log_p);
            }
            h[e] = acc;
        }
        Ok(-h[len])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::test_utils::ab_vocab;

    #[test]
    fn test_entropy_two_paths() {
        let vocab = ab_vocab();
        let lattice = Lattice::new(&vocab, "ab");

        assert!((lattice.entropy(1.0).unwrap() - 2f64.ln()).abs() < 1e-9);
    }

    #[test]
    fn test_entropy_uniform() {
        let vocab = ab_vocab();
        let lattice = Lattice::new(&vocab, "abab");

        // All four paths have the same score.
        assert!((lattice.entropy(0.3).unwrap() - 4f64.ln()).abs() < 1e-9);
    }

    #[test]
    fn test_entropy_single_path() {
        let vocab = ab_vocab();

        assert_eq!(0.0, Lattice::new(&vocab, "a猫").entropy(1.0).unwrap());
        assert_eq!(0.0, Lattice::new(&vocab, "").entropy(1.0).unwrap());
    }

    #[test]
    fn test_entropy_invalid_alpha() {
        let vocab = ab_vocab();
        let lattice = Lattice::new(&vocab, "ab");

        for alpha in [0.0, -1.0, f32::NAN, f32::INFINITY] {
            assert!(matches!(
                lattice.entropy(alpha),
                Err(KakeraError::Configuration(_))
            ));
        }
    }
}
