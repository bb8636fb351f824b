use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;

use bincode::{Decode, Encode};
use hashbrown::HashSet;

use crate::errors::{KakeraError, Result};
use crate::normalizer::NormalizerSpec;

const MODEL_MAGIC: &[u8; 8] = b"KAKERA\0\0";
const MODEL_VERSION: u32 = 1;

/// Default surface emitted when the unknown piece is decoded.
pub const DEFAULT_UNK_SURFACE: &str = " \u{2047} ";

/// Type of a vocabulary piece.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Decode, Encode)]
pub enum PieceType {
    /// Ordinary piece learned from data.
    Normal,

    /// The fallback piece. Exactly one exists in each vocabulary.
    Unknown,

    /// Symbol such as `<s>` that never appears in segmentation results.
    Control,

    /// Piece that is always matched when it appears in the text.
    UserDefined,

    /// Reserved piece that is never matched.
    Unused,

    /// Raw byte `<0xXX>` used by byte fallback.
    Byte,
}

impl PieceType {
    /// Gets the name of the type.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Unknown => "unknown",
            Self::Control => "control",
            Self::UserDefined => "user_defined",
            Self::Unused => "unused",
            Self::Byte => "byte",
        }
    }
}

impl fmt::Display for PieceType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PieceType {
    type Err = KakeraError;

    fn from_str(name: &str) -> Result<Self> {
        match name {
            "normal" => Ok(Self::Normal),
            "unknown" => Ok(Self::Unknown),
            "control" => Ok(Self::Control),
            "user_defined" => Ok(Self::UserDefined),
            "unused" => Ok(Self::Unused),
            "byte" => Ok(Self::Byte),
            _ => Err(KakeraError::configuration(
                "piece_type",
                format!("unknown piece type: {name}"),
            )),
        }
    }
}

/// An entry of the vocabulary.
#[derive(Clone, Debug, PartialEq, Decode, Encode)]
pub struct Piece {
    pub(crate) piece: String,
    pub(crate) score: f32,
    pub(crate) piece_type: PieceType,
}

impl Piece {
    /// Creates a new piece.
    ///
    /// # Arguments
    ///
    /// * `piece` - Text of the piece. Whitespaces are expected to be escaped as `▁`.
    /// * `score` - Log-probability like score used by the segmenters.
    /// * `piece_type` - Type of the piece.
    pub fn new<S>(piece: S, score: f32, piece_type: PieceType) -> Self
    where
        S: Into<String>,
    {
        Self {
            piece: piece.into(),
            score,
            piece_type,
        }
    }

    /// Gets the text of the piece.
    pub fn piece(&self) -> &str {
        &self.piece
    }

    /// Gets the score of the piece.
    pub const fn score(&self) -> f32 {
        self.score
    }

    /// Gets the type of the piece.
    pub const fn piece_type(&self) -> PieceType {
        self.piece_type
    }
}

/// Returns the text of the byte piece representing `b`.
pub fn byte_to_piece(b: u8) -> String {
    format!("<0x{b:02X}>")
}

/// Returns the byte represented by a `<0xXX>` piece.
pub fn piece_to_byte(piece: &str) -> Option<u8> {
    let hex = piece.strip_prefix("<0x")?.strip_suffix('>')?;
    if hex.len() != 2 {
        return None;
    }
    u8::from_str_radix(hex, 16).ok()
}

/// Model data.
///
/// A model is the serialized form of a trained vocabulary together with the normalization rules
/// it was trained with.
#[derive(Clone, Debug, Decode, Encode)]
pub struct Model {
    pub(crate) pieces: Vec<Piece>,
    pub(crate) unk_id: u32,
    pub(crate) bos_id: Option<u32>,
    pub(crate) eos_id: Option<u32>,
    pub(crate) pad_id: Option<u32>,
    pub(crate) byte_fallback: bool,
    pub(crate) unk_surface: String,
    pub(crate) normalizer_spec: NormalizerSpec,
}

impl Model {
    /// Creates a new model from pieces. The index of each piece becomes its id.
    ///
    /// # Arguments
    ///
    /// * `pieces` - Vocabulary pieces.
    /// * `unk_id` - Id of the unknown piece.
    ///
    /// # Errors
    ///
    /// [`KakeraError::Load`] is returned when the pieces do not form a valid vocabulary.
    ///
    /// # Examples
    ///
    /// ```
    /// use kakera::{Model, Piece, PieceType};
    ///
    /// let model = Model::new(
    ///     vec![
    ///         Piece::new("<unk>", 0.0, PieceType::Unknown),
    ///         Piece::new("▁a", -1.0, PieceType::Normal),
    ///     ],
    ///     0,
    /// );
    /// assert!(model.is_ok());
    ///
    /// let model = Model::new(vec![], 0);
    /// assert!(model.is_err());
    /// ```
    pub fn new(pieces: Vec<Piece>, unk_id: u32) -> Result<Self> {
        let model = Self {
            pieces,
            unk_id,
            bos_id: None,
            eos_id: None,
            pad_id: None,
            byte_fallback: false,
            unk_surface: DEFAULT_UNK_SURFACE.to_string(),
            normalizer_spec: NormalizerSpec::default(),
        };
        model.validate()?;
        Ok(model)
    }

    /// Sets the id of the beginning-of-sentence piece.
    ///
    /// # Errors
    ///
    /// [`KakeraError::Load`] is returned when the id is not a valid piece id.
    pub fn bos_id(mut self, id: Option<u32>) -> Result<Self> {
        self.bos_id = id;
        self.validate()?;
        Ok(self)
    }

    /// Sets the id of the end-of-sentence piece.
    ///
    /// # Errors
    ///
    /// [`KakeraError::Load`] is returned when the id is not a valid piece id.
    pub fn eos_id(mut self, id: Option<u32>) -> Result<Self> {
        self.eos_id = id;
        self.validate()?;
        Ok(self)
    }

    /// Sets the id of the padding piece.
    ///
    /// # Errors
    ///
    /// [`KakeraError::Load`] is returned when the id is not a valid piece id.
    pub fn pad_id(mut self, id: Option<u32>) -> Result<Self> {
        self.pad_id = id;
        self.validate()?;
        Ok(self)
    }

    /// Enables or disables byte fallback.
    ///
    /// # Errors
    ///
    /// [`KakeraError::Load`] is returned when byte fallback is enabled but the vocabulary does
    /// not contain all 256 byte pieces.
    pub fn byte_fallback(mut self, enabled: bool) -> Result<Self> {
        self.byte_fallback = enabled;
        self.validate()?;
        Ok(self)
    }

    /// Sets the surface used when the unknown piece is decoded.
    pub fn unk_surface<S>(mut self, surface: S) -> Self
    where
        S: Into<String>,
    {
        self.unk_surface = surface.into();
        self
    }

    /// Sets the normalization rules stored in the model.
    pub fn normalizer_spec(mut self, spec: NormalizerSpec) -> Self {
        self.normalizer_spec = spec;
        self
    }

    /// Gets the pieces of the model.
    pub fn pieces(&self) -> &[Piece] {
        &self.pieces
    }

    /// Gets the normalization rules stored in the model.
    pub const fn get_normalizer_spec(&self) -> &NormalizerSpec {
        &self.normalizer_spec
    }

    /// Replaces the pieces of the model. Special ids are kept.
    ///
    /// # Errors
    ///
    /// [`KakeraError::Load`] is returned when the new pieces do not form a valid vocabulary.
    pub fn replace_pieces(&mut self, pieces: Vec<Piece>) -> Result<()> {
        let old = std::mem::replace(&mut self.pieces, pieces);
        if let Err(e) = self.validate() {
            self.pieces = old;
            return Err(e);
        }
        Ok(())
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.pieces.is_empty() {
            return Err(KakeraError::load("vocabulary is empty"));
        }
        let size = self.pieces.len();
        if u32::try_from(size).is_err() {
            return Err(KakeraError::load("vocabulary is too large"));
        }
        let n_unknown = self
            .pieces
            .iter()
            .filter(|p| p.piece_type == PieceType::Unknown)
            .count();
        if n_unknown != 1 {
            return Err(KakeraError::load(format!(
                "vocabulary must contain exactly one unknown piece, but contains {n_unknown}"
            )));
        }
        match self.pieces.get(self.unk_id as usize) {
            Some(p) if p.piece_type == PieceType::Unknown => (),
            _ => {
                return Err(KakeraError::load(format!(
                    "unk_id {} does not point to the unknown piece",
                    self.unk_id
                )))
            }
        }
        for (name, id) in [
            ("bos_id", self.bos_id),
            ("eos_id", self.eos_id),
            ("pad_id", self.pad_id),
        ] {
            if let Some(id) = id {
                if id as usize >= size {
                    return Err(KakeraError::load(format!(
                        "{name} {id} is out of range [0, {size})"
                    )));
                }
            }
        }
        let mut seen = HashSet::with_capacity(size);
        for p in &self.pieces {
            if p.piece.is_empty() {
                return Err(KakeraError::load("vocabulary contains an empty piece"));
            }
            if !seen.insert(p.piece.as_str()) {
                return Err(KakeraError::load(format!(
                    "vocabulary contains a duplicated piece: {}",
                    p.piece
                )));
            }
            if p.piece_type == PieceType::Byte && piece_to_byte(&p.piece).is_none() {
                return Err(KakeraError::load(format!(
                    "invalid byte piece: {}",
                    p.piece
                )));
            }
        }
        if self.byte_fallback {
            let n_bytes = self
                .pieces
                .iter()
                .filter(|p| p.piece_type == PieceType::Byte)
                .count();
            if n_bytes != 256 {
                return Err(KakeraError::load(format!(
                    "byte fallback requires 256 byte pieces, but {n_bytes} found"
                )));
            }
        }
        Ok(())
    }

    /// Exports the model data.
    ///
    /// # Arguments
    ///
    /// * `wtr` - Byte-oriented sink object.
    ///
    /// # Errors
    ///
    /// When `wtr` generates an error, it will be returned as is.
    pub fn write<W>(&self, wtr: &mut W) -> Result<()>
    where
        W: Write,
    {
        wtr.write_all(MODEL_MAGIC)?;
        wtr.write_all(&MODEL_VERSION.to_le_bytes())?;
        bincode::encode_into_std_write(self, wtr, bincode::config::standard())?;
        Ok(())
    }

    /// Exports the model data into a byte vector.
    ///
    /// # Errors
    ///
    /// An error is returned when the model cannot be encoded.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = vec![];
        self.write(&mut buf)?;
        Ok(buf)
    }

    /// Creates a model from a reader.
    ///
    /// # Arguments
    ///
    /// * `rdr` - A data source.
    ///
    /// # Returns
    ///
    /// A model data read from `rdr`.
    ///
    /// # Errors
    ///
    /// [`KakeraError::Load`] is returned when the header is malformed, the version is not
    /// supported, or the vocabulary is invalid.
    pub fn read<R>(rdr: &mut R) -> Result<Self>
    where
        R: Read,
    {
        let mut header = [0; 12];
        rdr.read_exact(&mut header)
            .map_err(|_| KakeraError::load("malformed header: the model is truncated"))?;
        if &header[..8] != MODEL_MAGIC {
            return Err(KakeraError::load("malformed header: unknown magic number"));
        }
        let mut version = [0; 4];
        version.copy_from_slice(&header[8..]);
        let version = u32::from_le_bytes(version);
        if version != MODEL_VERSION {
            return Err(KakeraError::load(format!(
                "unsupported version: {version} (expected {MODEL_VERSION})"
            )));
        }
        let model: Self = bincode::decode_from_std_read(rdr, bincode::config::standard())
            .map_err(|e| KakeraError::load(format!("malformed model data: {e}")))?;
        model.validate()?;
        Ok(model)
    }

    /// Creates a model from an in-memory blob.
    ///
    /// # Errors
    ///
    /// Same as [`Model::read()`].
    pub fn from_bytes(mut bytes: &[u8]) -> Result<Self> {
        Self::read(&mut bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pieces() -> Vec<Piece> {
        vec![
            Piece::new("<unk>", 0.0, PieceType::Unknown),
            Piece::new("<s>", 0.0, PieceType::Control),
            Piece::new("</s>", 0.0, PieceType::Control),
            Piece::new("▁a", -1.0, PieceType::Normal),
        ]
    }

    #[test]
    fn test_model_roundtrip() {
        let model = Model::new(pieces(), 0)
            .unwrap()
            .bos_id(Some(1))
            .unwrap()
            .eos_id(Some(2))
            .unwrap();
        let bytes = model.to_bytes().unwrap();
        let model = Model::from_bytes(&bytes).unwrap();

        assert_eq!(pieces(), model.pieces());
        assert_eq!(0, model.unk_id);
        assert_eq!(Some(1), model.bos_id);
        assert_eq!(Some(2), model.eos_id);
        assert_eq!(None, model.pad_id);
    }

    #[test]
    fn test_model_empty_vocabulary() {
        let e = Model::new(vec![], 0).unwrap_err();

        assert_eq!("LoadError: vocabulary is empty", e.to_string());
    }

    #[test]
    fn test_model_truncated_header() {
        let e = Model::from_bytes(b"KAKE").unwrap_err();

        assert!(matches!(e, KakeraError::Load(_)));
    }

    #[test]
    fn test_model_unknown_magic() {
        let e = Model::from_bytes(b"NOTAMODEL\0\0\0\0\0").unwrap_err();

        assert_eq!(
            "LoadError: malformed header: unknown magic number",
            e.to_string()
        );
    }

    #[test]
    fn test_model_unsupported_version() {
        let mut bytes = Model::new(pieces(), 0).unwrap().to_bytes().unwrap();
        bytes[8..12].copy_from_slice(&99u32.to_le_bytes());
        let e = Model::from_bytes(&bytes).unwrap_err();

        assert_eq!(
            "LoadError: unsupported version: 99 (expected 1)",
            e.to_string()
        );
    }

    #[test]
    fn test_model_truncated_payload() {
        let bytes = Model::new(pieces(), 0).unwrap().to_bytes().unwrap();
        let e = Model::from_bytes(&bytes[..bytes.len() - 3]).unwrap_err();

        assert!(matches!(e, KakeraError::Load(_)));
    }

    #[test]
    fn test_model_duplicated_piece() {
        let mut p = pieces();
        p.push(Piece::new("▁a", -2.0, PieceType::Normal));

        assert!(Model::new(p, 0).is_err());
    }

    #[test]
    fn test_model_wrong_unk_id() {
        assert!(Model::new(pieces(), 1).is_err());
    }

    #[test]
    fn test_model_special_id_out_of_range() {
        let model = Model::new(pieces(), 0).unwrap();

        assert!(model.bos_id(Some(4)).is_err());
    }

    #[test]
    fn test_model_byte_fallback_without_bytes() {
        let model = Model::new(pieces(), 0).unwrap();

        assert!(model.byte_fallback(true).is_err());
    }

    #[test]
    fn test_replace_pieces_keeps_old_on_error() {
        let mut model = Model::new(pieces(), 0).unwrap();

        assert!(model.replace_pieces(vec![]).is_err());
        assert_eq!(pieces(), model.pieces());
    }

    #[test]
    fn test_piece_type_name() {
        for t in [
            PieceType::Normal,
            PieceType::Unknown,
            PieceType::Control,
            PieceType::UserDefined,
            PieceType::Unused,
            PieceType::Byte,
        ] {
            assert_eq!(t, t.to_string().parse::<PieceType>().unwrap());
        }
        assert!("word".parse::<PieceType>().is_err());
    }

    #[test]
    fn test_byte_piece() {
        assert_eq!("<0x0A>", byte_to_piece(b'\n'));
        assert_eq!(Some(0xE3), piece_to_byte("<0xE3>"));
        assert_eq!(None, piece_to_byte("<0xE>"));
        assert_eq!(None, piece_to_byte("▁a"));
    }
}
