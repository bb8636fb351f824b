use std::cmp::Ordering;
use std::collections::BinaryHeap;

use super::{Lattice, Path};

const MAX_AGENDA_SIZE: usize = 100_000;
const MIN_AGENDA_SIZE: usize = 512;

/// A partial path from the beginning of the text to a node.
struct Hypothesis {
    node: Option<usize>,
    prev: Option<usize>,
    gx: f64,
}

struct AgendaItem {
    fx: f64,
    seq: usize,
    hyp: usize,
}

impl PartialEq for AgendaItem {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for AgendaItem {}

impl PartialOrd for AgendaItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for AgendaItem {
    // On ties, the most recently pushed item comes first.
    fn cmp(&self, other: &Self) -> Ordering {
        self.fx
            .total_cmp(&other.fx)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

impl Lattice<'_> {
    /// Finds the `k` best paths in descending order of the score.
    ///
    /// Hypotheses are expanded forward from the beginning of the text, and the best scores to
    /// the end serve as an exact heuristic. Longer edges are expanded first among ties, so the
    /// first path is the same as [`Lattice::viterbi()`].
    pub fn nbest(&self, k: usize) -> Vec<Path> {
        if k == 0 {
            return vec![];
        }
        let len = self.len();
        let (best, _) = self.backward_best();

        let mut hyps = vec![Hypothesis {
            node: None,
            prev: None,
            gx: 0.0,
        }];
        let mut agenda = BinaryHeap::new();
        let mut seq = 0;
        agenda.push(AgendaItem {
            fx: best[0],
            seq,
            hyp: 0,
        });

        let mut results = vec![];
        while let Some(AgendaItem { hyp: top, .. }) = agenda.pop() {
            let end = hyps[top].node.map_or(0, |i| self.nodes[i].end);
            if end == len {
                let mut nodes = vec![];
                let mut cur = Some(top);
                while let Some(h) = cur {
                    nodes.extend(hyps[h].node);
                    cur = hyps[h].prev;
                }
                nodes.reverse();
                results.push(self.make_path(nodes));
                if results.len() == k {
                    break;
                }
                continue;
            }

            let gx = hyps[top].gx;
            for &i in self.begin_nodes[end].iter().rev() {
                let node = &self.nodes[i];
                let gx = gx + f64::from(node.score);
                hyps.push(Hypothesis {
                    node: Some(i),
                    prev: Some(top),
                    gx,
                });
                seq += 1;
                agenda.push(AgendaItem {
                    fx: gx + best[node.end],
                    seq,
                    hyp: hyps.len() - 1,
                });
            }

            if agenda.len() >= MAX_AGENDA_SIZE {
                let keep = MIN_AGENDA_SIZE.min(k.saturating_mul(10));
                log::debug!("shrinking the n-best agenda to {keep} items");
                let mut shrunk = BinaryHeap::with_capacity(keep);
                for _ in 0..keep {
                    match agenda.pop() {
                        Some(item) => shrunk.push(item),
                        None => break,
                    }
                }
                agenda = shrunk;
            }
        }
        results
    }
}
