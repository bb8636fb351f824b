//! Segmentation lattice.
//!
//! A lattice holds every vocabulary match found in a normalized text. Each path from the
//! beginning to the end of the text is a segmentation candidate.

mod entropy;
mod nbest;
mod sampling;
mod viterbi;

use crate::vocab::Vocabulary;

/// An edge of the lattice.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Node {
    pub(crate) begin: usize,
    pub(crate) end: usize,
    pub(crate) id: u32,
    pub(crate) score: f32,
    pub(crate) unknown: bool,
}

impl Node {
    /// Gets the beginning byte position in the normalized text.
    pub const fn begin(&self) -> usize {
        self.begin
    }

    /// Gets the ending byte position in the normalized text.
    pub const fn end(&self) -> usize {
        self.end
    }

    /// Gets the piece id.
    pub const fn id(&self) -> u32 {
        self.id
    }

    /// Gets the score used by the segmenters.
    pub const fn score(&self) -> f32 {
        self.score
    }

    /// Checks if the edge is the fallback for a character not in the vocabulary.
    pub const fn is_unknown(&self) -> bool {
        self.unknown
    }
}

/// A path through the lattice.
#[derive(Clone, Debug, PartialEq)]
pub struct Path {
    nodes: Vec<usize>,
    score: f64,
}

impl Path {
    /// Gets indices of the nodes from left to right.
    pub fn nodes(&self) -> &[usize] {
        &self.nodes
    }

    /// Gets the total score of the path.
    pub const fn score(&self) -> f64 {
        self.score
    }
}

/// Lattice of a normalized text.
pub struct Lattice<'a> {
    text: &'a str,
    nodes: Vec<Node>,

    // Node indices starting at each position, longest first.
    begin_nodes: Vec<Vec<usize>>,

    // Node indices ending at each position, in ascending order of the beginning position.
    end_nodes: Vec<Vec<usize>>,
}

impl<'a> Lattice<'a> {
    /// Builds a lattice.
    ///
    /// # Arguments
    ///
    /// * `vocab` - A vocabulary.
    /// * `text` - A normalized text.
    ///
    /// # Returns
    ///
    /// A lattice in which every character is covered by at least one edge.
    pub fn new(vocab: &Vocabulary, text: &'a str) -> Self {
        let len = text.len();
        let mut lattice = Self {
            text,
            nodes: vec![],
            begin_nodes: vec![vec![]; len + 1],
            end_nodes: vec![vec![]; len + 1],
        };
        if let Some(matcher) = vocab.matcher() {
            for m in matcher.find_overlapping_iter(text) {
                let id = m.value();
                lattice.push_node(m.start(), m.end(), id, vocab.lattice_score(id), false);
            }
        }
        let unk_id = vocab.unk_id();
        let unk_score = vocab.unk_score();
        for (begin, c) in text.char_indices() {
            let end = begin + c.len_utf8();
            let covered = lattice.begin_nodes[begin]
                .iter()
                .any(|&i| lattice.nodes[i].end == end);
            if !covered {
                lattice.push_node(begin, end, unk_id, unk_score, true);
            }
        }
        let nodes = &lattice.nodes;
        for ids in &mut lattice.begin_nodes {
            ids.sort_unstable_by(|&a, &b| nodes[b].end.cmp(&nodes[a].end));
        }
        for ids in &mut lattice.end_nodes {
            ids.sort_unstable_by_key(|&i| nodes[i].begin);
        }
        lattice
    }

    fn push_node(&mut self, begin: usize, end: usize, id: u32, score: f32, unknown: bool) {
        let idx = self.nodes.len();
        self.nodes.push(Node {
            begin,
            end,
            id,
            score,
            unknown,
        });
        self.begin_nodes[begin].push(idx);
        self.end_nodes[end].push(idx);
    }

    /// Gets the normalized text.
    pub const fn text(&self) -> &'a str {
        self.text
    }

    /// Gets the number of bytes of the normalized text.
    pub fn len(&self) -> usize {
        self.text.len()
    }

    /// Checks if the text is empty.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Gets the node of the given index.
    pub fn node(&self, idx: usize) -> &Node {
        &self.nodes[idx]
    }

    /// Gets all nodes.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Gets the text covered by a node.
    pub fn surface(&self, node: &Node) -> &'a str {
        &self.text[node.begin..node.end]
    }

    /// Gets indices of the nodes starting at `pos`, longest first.
    pub fn begin_nodes(&self, pos: usize) -> &[usize] {
        &self.begin_nodes[pos]
    }

    /// Gets indices of the nodes ending at `pos`, longest first.
    pub fn end_nodes(&self, pos: usize) -> &[usize] {
        &self.end_nodes[pos]
    }

    /// Character boundaries except 0, in ascending order.
    fn end_positions(&self) -> impl Iterator<Item = usize> + 'a {
        self.text.char_indices().map(|(i, c)| i + c.len_utf8())
    }

    /// Creates a path and sums its score from left to right.
    fn make_path(&self, nodes: Vec<usize>) -> Path {
        let score = nodes
            .iter()
            .fold(0.0, |acc, &i| acc + f64::from(self.nodes[i].score));
        Path { nodes, score }
    }

    /// Counts the paths. The count saturates at `u64::MAX`.
    pub fn count_paths(&self) -> u64 {
        let mut counts = vec![0u64; self.len() + 1];
        counts[0] = 1;
        for e in self.end_positions() {
            let mut count = 0u64;
            for &i in &self.end_nodes[e] {
                count = count.saturating_add(counts[self.nodes[i].begin]);
            }
            counts[e] = count;
        }
        counts[self.len()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::test_utils::ab_vocab;

    fn edges(lattice: &Lattice) -> Vec<(usize, usize, u32)> {
        let mut edges: Vec<_> = lattice
            .nodes()
            .iter()
            .map(|n| (n.begin(), n.end(), n.id()))
            .collect();
        edges.sort_unstable();
        edges
    }

    #[test]
    fn test_lattice_matches() {
        let vocab = ab_vocab();
        let lattice = Lattice::new(&vocab, "abab");

        assert_eq!(
            vec![
                (0, 1, 1),
                (0, 2, 3),
                (1, 2, 2),
                (2, 3, 1),
                (2, 4, 3),
                (3, 4, 2),
            ],
            edges(&lattice)
        );
        let ends: Vec<_> = lattice
            .begin_nodes(0)
            .iter()
            .map(|&i| lattice.node(i).end())
            .collect();
        assert_eq!(vec![2, 1], ends);
    }

    #[test]
    fn test_lattice_unknown_edge() {
        let vocab = ab_vocab();
        let lattice = Lattice::new(&vocab, "a猫b");

        assert_eq!(vec![(0, 1, 1), (1, 4, 0), (4, 5, 2)], edges(&lattice));
        let unk = lattice.node(lattice.begin_nodes(1)[0]);
        assert!(unk.is_unknown());
        assert_eq!(-12.0, unk.score());
        assert_eq!("猫", lattice.surface(unk));
    }

    #[test]
    fn test_lattice_control_is_not_matched() {
        let vocab = ab_vocab();
        let lattice = Lattice::new(&vocab, "<ctrl>");

        assert!(lattice.nodes().iter().all(|n| n.is_unknown()));
        assert_eq!(6, lattice.nodes().len());
    }

    #[test]
    fn test_lattice_end_nodes_order() {
        let vocab = ab_vocab();
        let lattice = Lattice::new(&vocab, "ab");

        let begins: Vec<_> = lattice
            .end_nodes(2)
            .iter()
            .map(|&i| lattice.node(i).begin())
            .collect();
        assert_eq!(vec![0, 1], begins);
    }

    #[test]
    fn test_count_paths() {
        let vocab = ab_vocab();

        assert_eq!(1, Lattice::new(&vocab, "").count_paths());
        assert_eq!(2, Lattice::new(&vocab, "ab").count_paths());
        assert_eq!(4, Lattice::new(&vocab, "abab").count_paths());
        assert_eq!(1, Lattice::new(&vocab, "猫").count_paths());
    }
}
