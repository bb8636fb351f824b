use super::{Lattice, Path};

impl Lattice<'_> {
    /// Computes the best score from each position to the end of the text and the first node of
    /// the best remaining path.
    ///
    /// Positions are visited from right to left and edges starting at the same position longest
    /// first. A candidate replaces the current one only when it is strictly better, so ties are
    /// broken toward the longest leftmost edge.
    pub(crate) fn backward_best(&self) -> (Vec<f64>, Vec<Option<usize>>) {
        let len = self.len();
        let mut best = vec![f64::NEG_INFINITY; len + 1];
        let mut next = vec![None; len + 1];
        best[len] = 0.0;
        for (b, _) in self.text.char_indices().rev() {
            for &i in &self.begin_nodes[b] {
                let node = &self.nodes[i];
                let score = f64::from(node.score) + best[node.end];
                if score > best[b] {
                    best[b] = score;
                    next[b] = Some(i);
                }
            }
        }
        (best, next)
    }

    /// Finds the best path. Among paths of the same score, the one whose pieces are longest
    /// from left to right is chosen.
    pub fn viterbi(&self) -> Path {
        let (_, next) = self.backward_best();
        let mut nodes = vec![];
        let mut pos = 0;
        while let Some(i) = next[pos] {
            nodes.push(i);
            pos = self.nodes[i].end;
        }
        self.make_path(nodes)
    }
}
