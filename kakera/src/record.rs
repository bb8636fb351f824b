//! Structured segmentation records.

use std::hash::{Hash, Hasher};

use bincode::{Decode, Encode};

use crate::errors::Result;

/// A piece of a segmentation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Decode, Encode)]
pub struct SegmentedPiece {
    /// Piece id.
    pub id: u32,

    /// Piece text.
    pub piece: String,

    /// Substring of the input covered by the piece.
    pub surface: String,

    /// Beginning byte position in the input.
    pub begin: usize,

    /// Ending byte position in the input.
    pub end: usize,
}

/// A segmentation of a text.
///
/// Two records are equal if and only if every field is equal. Scores are compared by their bit
/// patterns.
#[derive(Clone, Debug, Default, Decode, Encode)]
pub struct SegmentedText {
    /// The input text.
    pub text: String,

    /// Score of the segmentation.
    pub score: f32,

    /// Pieces from left to right.
    pub pieces: Vec<SegmentedPiece>,
}

impl SegmentedText {
    /// Gets the piece ids.
    pub fn ids(&self) -> Vec<u32> {
        self.pieces.iter().map(|p| p.id).collect()
    }

    /// Gets the piece texts.
    pub fn piece_texts(&self) -> Vec<String> {
        self.pieces.iter().map(|p| p.piece.clone()).collect()
    }

    /// Serializes the record.
    ///
    /// # Errors
    ///
    /// An error is returned when the record cannot be encoded.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::encode_to_vec(self, bincode::config::standard())?)
    }

    /// Deserializes a record.
    ///
    /// # Errors
    ///
    /// An error is returned when `bytes` is not a serialized record.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let (record, _) = bincode::decode_from_slice(bytes, bincode::config::standard())?;
        Ok(record)
    }
}

impl PartialEq for SegmentedText {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
            && self.score.to_bits() == other.score.to_bits()
            && self.pieces == other.pieces
    }
}

impl Eq for SegmentedText {}

impl Hash for SegmentedText {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.text.hash(state);
        self.score.to_bits().hash(state);
        self.pieces.hash(state);
    }
}

/// Segmentations of a text in descending order of the score.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Decode, Encode)]
pub struct NBestSegmentedText {
    pub nbests: Vec<SegmentedText>,
}

impl NBestSegmentedText {
    /// Serializes the record.
    ///
    /// # Errors
    ///
    /// An error is returned when the record cannot be encoded.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::encode_to_vec(self, bincode::config::standard())?)
    }

    /// Deserializes a record.
    ///
    /// # Errors
    ///
    /// An error is returned when `bytes` is not a serialized record.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let (record, _) = bincode::decode_from_slice(bytes, bincode::config::standard())?;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use hashbrown::HashSet;

    fn record(score: f32) -> SegmentedText {
        SegmentedText {
            text: "hello".to_string(),
            score,
            pieces: vec![
                SegmentedPiece {
                    id: 10,
                    piece: "▁he".to_string(),
                    surface: "he".to_string(),
                    begin: 0,
                    end: 2,
                },
                SegmentedPiece {
                    id: 11,
                    piece: "llo".to_string(),
                    surface: "llo".to_string(),
                    begin: 2,
                    end: 5,
                },
            ],
        }
    }

    #[test]
    fn test_record_serialization() {
        let r = record(-1.5);
        let bytes = r.to_bytes().unwrap();

        assert_eq!(r, SegmentedText::from_bytes(&bytes).unwrap());
        assert_eq!(vec![10, 11], r.ids());
        assert_eq!(vec!["▁he".to_string(), "llo".to_string()], r.piece_texts());
    }

    #[test]
    fn test_nbest_serialization() {
        let r = NBestSegmentedText {
            nbests: vec![record(-1.0), record(-2.0)],
        };
        let bytes = r.to_bytes().unwrap();

        assert_eq!(r, NBestSegmentedText::from_bytes(&bytes).unwrap());
    }

    #[test]
    fn test_record_equality() {
        assert_eq!(record(-1.0), record(-1.0));
        assert_ne!(record(-1.0), record(-2.0));
        assert_eq!(record(f32::NAN), record(f32::NAN));

        let set: HashSet<_> = [record(-1.0), record(-1.0), record(-2.0)]
            .into_iter()
            .collect();
        assert_eq!(2, set.len());
    }

    #[test]
    fn test_record_from_invalid_bytes() {
        assert!(SegmentedText::from_bytes(&[0xff, 0xff, 0xff]).is_err());
    }
}
