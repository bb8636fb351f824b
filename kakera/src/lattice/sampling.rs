use hashbrown::HashSet;
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

use super::{Lattice, Path};

/// Computes `log(exp(x) + exp(y))`.
fn log_sum_exp(x: f64, y: f64) -> f64 {
    if x == f64::NEG_INFINITY {
        return y;
    }
    if y == f64::NEG_INFINITY {
        return x;
    }
    let m = x.max(y);
    m + (-(x - y).abs()).exp().ln_1p()
}

/// Draws an index proportionally to `weights`. Falls back to the first index when the weights
/// are degenerate.
fn draw<R>(weights: &[f64], rng: &mut R) -> usize
where
    R: Rng + ?Sized,
{
    WeightedIndex::new(weights).map_or(0, |dist| dist.sample(rng))
}

impl Lattice<'_> {
    /// Computes the log of the partition function over paths reaching each position, where the
    /// weight of a path is `exp(alpha * score)`.
    pub(crate) fn forward_log_z(&self, alpha: f64) -> Vec<f64> {
        let len = self.len();
        let mut fwd = vec![f64::NEG_INFINITY; len + 1];
        fwd[0] = 0.0;
        for e in self.end_positions() {
            let mut acc = f64::NEG_INFINITY;
            for &i in &self.end_nodes[e] {
                let node = &self.nodes[i];
                acc = log_sum_exp(acc, fwd[node.begin] + alpha * f64::from(node.score));
            }
            fwd[e] = acc;
        }
        fwd
    }

    fn sample_with<R>(&self, fwd: &[f64], alpha: f64, rng: &mut R) -> Path
    where
        R: Rng + ?Sized,
    {
        let mut nodes = vec![];
        let mut pos = self.len();
        let mut weights = vec![];
        while pos > 0 {
            let candidates = &self.end_nodes[pos];
            weights.clear();
            weights.extend(candidates.iter().map(|&i| {
                let node = &self.nodes[i];
                (fwd[node.begin] + alpha * f64::from(node.score) - fwd[pos]).exp()
            }));
            let i = candidates[draw(&weights, rng)];
            nodes.push(i);
            pos = self.nodes[i].begin;
        }
        nodes.reverse();
        self.make_path(nodes)
    }

    /// Samples a path from the distribution `P(path) ∝ exp(alpha * score(path))` over all paths.
    pub fn sample<R>(&self, alpha: f32, rng: &mut R) -> Path
    where
        R: Rng + ?Sized,
    {
        let alpha = f64::from(alpha);
        let fwd = self.forward_log_z(alpha);
        self.sample_with(&fwd, alpha, rng)
    }

    /// Samples a path from the `nbest_size` best paths with weights `exp(alpha * score)`.
    pub fn sample_nbest<R>(&self, nbest_size: usize, alpha: f32, rng: &mut R) -> Path
    where
        R: Rng + ?Sized,
    {
        let alpha = f64::from(alpha);
        let mut nbest = self.nbest(nbest_size);
        let max_score = nbest
            .iter()
            .map(|p| p.score)
            .fold(f64::NEG_INFINITY, f64::max);
        let weights: Vec<f64> = nbest
            .iter()
            .map(|p| (alpha * (p.score - max_score)).exp())
            .collect();
        let i = draw(&weights, rng);
        if i < nbest.len() {
            nbest.swap_remove(i)
        } else {
            self.viterbi()
        }
    }

    /// Samples `num_samples` paths and scores each with its log-probability.
    ///
    /// # Arguments
    ///
    /// * `alpha` - Inverse temperature.
    /// * `num_samples` - The number of samples.
    /// * `wor` - Samples without replacement. At most [`Lattice::count_paths()`] paths are
    ///   returned.
    /// * `include_best` - Puts the best path at the front.
    /// * `rng` - A random number generator.
    ///
    /// # Returns
    ///
    /// Pairs of a path and `alpha * score - log Z`, in the order of sampling.
    pub fn sample_and_score<R>(
        &self,
        alpha: f32,
        num_samples: usize,
        wor: bool,
        include_best: bool,
        rng: &mut R,
    ) -> Vec<(Path, f64)>
    where
        R: Rng + ?Sized,
    {
        let alpha_f64 = f64::from(alpha);
        let fwd = self.forward_log_z(alpha_f64);
        let log_z = fwd[self.len()];
        let scored = |path: Path| {
            let log_prob = alpha_f64 * path.score - log_z;
            (path, log_prob)
        };

        let target = if wor {
            usize::try_from(self.count_paths()).map_or(num_samples, |n| n.min(num_samples))
        } else {
            num_samples
        };
        let mut results = Vec::with_capacity(target);
        let mut seen = HashSet::new();
        if include_best && target != 0 {
            let best = self.viterbi();
            seen.insert(best.nodes.clone());
            results.push(scored(best));
        }
        if !wor {
            while results.len() < target {
                results.push(scored(self.sample_with(&fwd, alpha_f64, rng)));
            }
            return results;
        }

        let max_attempts = target.saturating_mul(10).max(100);
        let mut attempts = 0;
        while results.len() < target && attempts < max_attempts {
            attempts += 1;
            let path = self.sample_with(&fwd, alpha_f64, rng);
            if seen.insert(path.nodes.clone()) {
                results.push(scored(path));
            }
        }
        if results.len() < target {
            log::debug!(
                "filling {} samples from the n-best list after {attempts} draws",
                target - results.len()
            );
            for path in self.nbest(target) {
                if results.len() >= target {
                    break;
                }
                if seen.insert(path.nodes.clone()) {
                    results.push(scored(path));
                }
            }
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use hashbrown::HashSet;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use crate::test_utils::ab_vocab;

    #[test]
    fn test_log_sum_exp() {
        assert!((log_sum_exp(0.0, 0.0) - 2f64.ln()).abs() < 1e-12);
        assert_eq!(1.5, log_sum_exp(f64::NEG_INFINITY, 1.5));
        assert_eq!(1.5, log_sum_exp(1.5, f64::NEG_INFINITY));
    }

    #[test]
    fn test_forward_log_z() {
        let vocab = ab_vocab();
        let lattice = Lattice::new(&vocab, "ab");
        let fwd = lattice.forward_log_z(1.0);

        assert_eq!(0.0, fwd[0]);
        assert_eq!(-1.0, fwd[1]);
        assert!((fwd[2] - (-2.0 + 2f64.ln())).abs() < 1e-12);
    }

    #[test]
    fn test_sample_covers_all_paths() {
        let vocab = ab_vocab();
        let lattice = Lattice::new(&vocab, "abab");
        let mut rng = StdRng::seed_from_u64(0);

        let mut seen = HashSet::new();
        for _ in 0..200 {
            let path = lattice.sample(1.0, &mut rng);
            let surface: String = path
                .nodes()
                .iter()
                .map(|&i| lattice.surface(lattice.node(i)))
                .collect();
            assert_eq!("abab", surface);
            seen.insert(path.nodes().to_vec());
        }
        assert_eq!(4, seen.len());
    }

    #[test]
    fn test_sample_is_deterministic_with_seed() {
        let vocab = ab_vocab();
        let lattice = Lattice::new(&vocab, "ababab");

        let a: Vec<_> = {
            let mut rng = StdRng::seed_from_u64(42);
            (0..10).map(|_| lattice.sample(0.5, &mut rng)).collect()
        };
        let b: Vec<_> = {
            let mut rng = StdRng::seed_from_u64(42);
            (0..10).map(|_| lattice.sample(0.5, &mut rng)).collect()
        };
        assert_eq!(a, b);
    }

    #[test]
    fn test_sample_nbest() {
        let vocab = ab_vocab();
        let lattice = Lattice::new(&vocab, "a猫b");
        let mut rng = StdRng::seed_from_u64(0);

        assert_eq!(lattice.viterbi(), lattice.sample_nbest(2, 1.0, &mut rng));
    }

    #[test]
    fn test_sample_and_score_wor() {
        let vocab = ab_vocab();
        let lattice = Lattice::new(&vocab, "ab");
        let mut rng = StdRng::seed_from_u64(0);
        let samples = lattice.sample_and_score(1.0, 5, true, false, &mut rng);

        assert_eq!(2, samples.len());
        assert_ne!(samples[0].0, samples[1].0);
        for (_, log_prob) in &samples {
            assert!((log_prob - 0.5f64.ln()).abs() < 1e-9);
        }
    }

    #[test]
    fn test_sample_and_score_include_best() {
        let vocab = ab_vocab();
        let lattice = Lattice::new(&vocab, "ababab");
        let mut rng = StdRng::seed_from_u64(1);
        let samples = lattice.sample_and_score(0.1, 4, true, true, &mut rng);

        assert_eq!(4, samples.len());
        assert_eq!(lattice.viterbi(), samples[0].0);
        let distinct: HashSet<_> = samples.iter().map(|(p, _)| p.nodes().to_vec()).collect();
        assert_eq!(4, distinct.len());
    }

    #[test]
    fn test_sample_and_score_with_replacement() {
        let vocab = ab_vocab();
        let lattice = Lattice::new(&vocab, "ab");
        let mut rng = StdRng::seed_from_u64(0);
        let samples = lattice.sample_and_score(1.0, 7, false, false, &mut rng);

        assert_eq!(7, samples.len());
    }
}
