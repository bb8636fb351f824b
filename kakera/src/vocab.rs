use daachorse::DoubleArrayAhoCorasick;
use hashbrown::HashMap;

use crate::errors::{KakeraError, Result};
use crate::model::{byte_to_piece, Model, Piece, PieceType};

/// Read-only vocabulary built from a model.
///
/// All queries take `&self`, so a vocabulary can be shared by any number of threads.
pub struct Vocabulary {
    pieces: Vec<Piece>,
    piece_ids: HashMap<String, u32>,
    matcher: Option<DoubleArrayAhoCorasick<u32>>,
    byte_ids: Option<Vec<u32>>,
    unk_id: u32,
    bos_id: Option<u32>,
    eos_id: Option<u32>,
    pad_id: Option<u32>,
    unk_surface: String,
    min_score: f32,
    max_score: f32,
}

impl Vocabulary {
    /// Creates a new vocabulary.
    ///
    /// # Errors
    ///
    /// [`KakeraError::Load`] is returned when the model is invalid.
    pub fn new(model: &Model) -> Result<Self> {
        model.validate()?;

        let mut piece_ids = HashMap::with_capacity(model.pieces.len());
        let mut patterns = vec![];
        let mut min_score = f32::INFINITY;
        let mut max_score = f32::NEG_INFINITY;
        for (i, p) in model.pieces.iter().enumerate() {
            let id = u32::try_from(i).map_err(|_| KakeraError::load("vocabulary is too large"))?;
            piece_ids.insert(p.piece.clone(), id);
            match p.piece_type {
                PieceType::Normal => {
                    min_score = min_score.min(p.score);
                    max_score = max_score.max(p.score);
                    patterns.push((p.piece.as_str(), id));
                }
                PieceType::UserDefined => patterns.push((p.piece.as_str(), id)),
                _ => (),
            }
        }
        if !min_score.is_finite() {
            min_score = 0.0;
            max_score = 0.0;
        }
        let matcher = if patterns.is_empty() {
            None
        } else {
            Some(
                DoubleArrayAhoCorasick::with_values(patterns)
                    .map_err(|e| KakeraError::load(format!("failed to build the matcher: {e}")))?,
            )
        };

        let byte_ids = if model.byte_fallback {
            let mut ids = Vec::with_capacity(256);
            for b in 0..=255 {
                let id = piece_ids
                    .get(&byte_to_piece(b))
                    .copied()
                    .ok_or_else(|| KakeraError::load(format!("missing byte piece for {b}")))?;
                ids.push(id);
            }
            Some(ids)
        } else {
            None
        };

        log::debug!(
            "vocabulary: {} pieces, unk_id={}, byte_fallback={}",
            model.pieces.len(),
            model.unk_id,
            model.byte_fallback
        );

        Ok(Self {
            pieces: model.pieces.clone(),
            piece_ids,
            matcher,
            byte_ids,
            unk_id: model.unk_id,
            bos_id: model.bos_id,
            eos_id: model.eos_id,
            pad_id: model.pad_id,
            unk_surface: model.unk_surface.clone(),
            min_score,
            max_score,
        })
    }

    /// Gets the number of pieces.
    pub fn piece_size(&self) -> usize {
        self.pieces.len()
    }

    /// Gets the id of a piece. The unknown id is returned for pieces not in the vocabulary.
    pub fn piece_to_id(&self, piece: &str) -> u32 {
        self.piece_ids.get(piece).copied().unwrap_or(self.unk_id)
    }

    /// Gets the id of a piece if it exists.
    pub fn get_id(&self, piece: &str) -> Option<u32> {
        self.piece_ids.get(piece).copied()
    }

    /// Gets the piece of the given id.
    ///
    /// # Errors
    ///
    /// [`KakeraError::Range`] is returned when `id` is not smaller than [`Self::piece_size()`].
    pub fn piece(&self, id: u32) -> Result<&Piece> {
        self.pieces
            .get(id as usize)
            .ok_or_else(|| KakeraError::out_of_range(id, self.pieces.len()))
    }

    /// Gets the text of the given id.
    ///
    /// # Errors
    ///
    /// [`KakeraError::Range`] is returned when `id` is out of range.
    pub fn id_to_piece(&self, id: u32) -> Result<&str> {
        Ok(self.piece(id)?.piece())
    }

    /// Gets the score of the given id.
    ///
    /// # Errors
    ///
    /// [`KakeraError::Range`] is returned when `id` is out of range.
    pub fn score(&self, id: u32) -> Result<f32> {
        Ok(self.piece(id)?.score())
    }

    /// Checks if the given id is the unknown piece.
    ///
    /// # Errors
    ///
    /// [`KakeraError::Range`] is returned when `id` is out of range.
    pub fn is_unknown(&self, id: u32) -> Result<bool> {
        self.has_type(id, PieceType::Unknown)
    }

    /// Checks if the given id is a control piece.
    ///
    /// # Errors
    ///
    /// [`KakeraError::Range`] is returned when `id` is out of range.
    pub fn is_control(&self, id: u32) -> Result<bool> {
        self.has_type(id, PieceType::Control)
    }

    /// Checks if the given id is an unused piece.
    ///
    /// # Errors
    ///
    /// [`KakeraError::Range`] is returned when `id` is out of range.
    pub fn is_unused(&self, id: u32) -> Result<bool> {
        self.has_type(id, PieceType::Unused)
    }

    /// Checks if the given id is a byte piece.
    ///
    /// # Errors
    ///
    /// [`KakeraError::Range`] is returned when `id` is out of range.
    pub fn is_byte(&self, id: u32) -> Result<bool> {
        self.has_type(id, PieceType::Byte)
    }

    /// Checks if the given id is a user-defined piece.
    ///
    /// # Errors
    ///
    /// [`KakeraError::Range`] is returned when `id` is out of range.
    pub fn is_user_defined(&self, id: u32) -> Result<bool> {
        self.has_type(id, PieceType::UserDefined)
    }

    fn has_type(&self, id: u32, piece_type: PieceType) -> Result<bool> {
        Ok(self.piece(id)?.piece_type() == piece_type)
    }

    pub const fn unk_id(&self) -> u32 {
        self.unk_id
    }

    pub const fn bos_id(&self) -> Option<u32> {
        self.bos_id
    }

    pub const fn eos_id(&self) -> Option<u32> {
        self.eos_id
    }

    pub const fn pad_id(&self) -> Option<u32> {
        self.pad_id
    }

    /// Checks if unknown characters are split into byte pieces.
    pub const fn byte_fallback(&self) -> bool {
        self.byte_ids.is_some()
    }

    /// Gets the surface emitted when the unknown piece is decoded.
    pub fn unk_surface(&self) -> &str {
        &self.unk_surface
    }

    /// Gets the id of the byte piece of `b` when byte fallback is enabled.
    pub fn byte_id(&self, b: u8) -> Option<u32> {
        self.byte_ids.as_ref().map(|ids| ids[usize::from(b)])
    }

    pub(crate) const fn matcher(&self) -> Option<&DoubleArrayAhoCorasick<u32>> {
        self.matcher.as_ref()
    }

    /// Score of the unknown edge.
    pub(crate) fn unk_score(&self) -> f32 {
        self.min_score - 10.0
    }

    /// Score of a user-defined edge covering `n_chars` characters.
    pub(crate) fn user_defined_score(&self, n_chars: usize) -> f32 {
        n_chars as f32 * self.max_score - 0.1
    }

    /// Score of the piece used in the lattice.
    pub(crate) fn lattice_score(&self, id: u32) -> f32 {
        match self.pieces.get(id as usize) {
            Some(p) if p.piece_type == PieceType::UserDefined => {
                self.user_defined_score(p.piece.chars().count())
            }
            Some(p) => p.score,
            None => self.unk_score(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::test_utils::english_model;

    #[test]
    fn test_piece_to_id() {
        let vocab = Vocabulary::new(&english_model()).unwrap();

        assert_eq!(0, vocab.piece_to_id("<unk>"));
        assert_eq!(1, vocab.piece_to_id("<s>"));
        assert_eq!(2, vocab.piece_to_id("</s>"));
        assert_eq!(0, vocab.piece_to_id("never-in-vocabulary"));
        assert_eq!(None, vocab.get_id("never-in-vocabulary"));
        let id = vocab.piece_to_id("▁saw");
        assert_eq!("▁saw", vocab.id_to_piece(id).unwrap());
    }

    #[test]
    fn test_range_check() {
        let vocab = Vocabulary::new(&english_model()).unwrap();
        let size = u32::try_from(vocab.piece_size()).unwrap();

        assert!(vocab.id_to_piece(size - 1).is_ok());
        assert!(vocab.score(size - 1).is_ok());
        assert!(vocab.is_unknown(size - 1).is_ok());

        for result in [
            vocab.id_to_piece(size).map(|_| ()),
            vocab.score(size).map(|_| ()),
            vocab.is_unknown(size).map(|_| ()),
            vocab.is_control(size).map(|_| ()),
            vocab.is_unused(size).map(|_| ()),
            vocab.is_byte(size).map(|_| ()),
            vocab.is_user_defined(size).map(|_| ()),
        ] {
            match result {
                Err(KakeraError::Range(e)) => assert_eq!(size, e.id()),
                _ => panic!("RangeError expected"),
            }
        }
    }

    #[test]
    fn test_piece_types() {
        let vocab = Vocabulary::new(&english_model()).unwrap();

        assert!(vocab.is_unknown(0).unwrap());
        assert!(vocab.is_control(1).unwrap());
        assert!(vocab.is_control(2).unwrap());
        assert!(!vocab.is_control(3).unwrap());
        assert!(!vocab.is_byte(3).unwrap());
        assert_eq!(0, vocab.unk_id());
        assert_eq!(Some(1), vocab.bos_id());
        assert_eq!(Some(2), vocab.eos_id());
        assert_eq!(None, vocab.pad_id());
        assert!(!vocab.byte_fallback());
        assert_eq!(" \u{2047} ", vocab.unk_surface());
    }

    #[test]
    fn test_lattice_scores() {
        let model = Model::new(
            vec![
                Piece::new("<unk>", 0.0, PieceType::Unknown),
                Piece::new("▁a", -1.0, PieceType::Normal),
                Piece::new("b", -3.0, PieceType::Normal),
                Piece::new("<x>", 0.0, PieceType::UserDefined),
            ],
            0,
        )
        .unwrap();
        let vocab = Vocabulary::new(&model).unwrap();

        assert_eq!(-13.0, vocab.unk_score());
        assert_eq!(-1.0, vocab.lattice_score(1));
        assert!((vocab.lattice_score(3) - (3.0 * -1.0 - 0.1)).abs() < 1e-6);
    }
}
