use crate::model::{byte_to_piece, Model, Piece, PieceType};
use crate::vocab::Vocabulary;

/// Vocabulary over `a` and `b` in which `ab` and `a b` tie.
pub fn ab_vocab() -> Vocabulary {
    let model = Model::new(
        vec![
            Piece::new("<unk>", 0.0, PieceType::Unknown),
            Piece::new("a", -1.0, PieceType::Normal),
            Piece::new("b", -1.0, PieceType::Normal),
            Piece::new("ab", -2.0, PieceType::Normal),
            Piece::new("<ctrl>", 0.0, PieceType::Control),
        ],
        0,
    )
    .unwrap();
    Vocabulary::new(&model).unwrap()
}

/// Vocabulary over `a` in which `aa a`, `a aa`, and `a a a` tie.
pub fn a_aa_vocab() -> Vocabulary {
    let model = Model::new(
        vec![
            Piece::new("<unk>", 0.0, PieceType::Unknown),
            Piece::new("a", -1.0, PieceType::Normal),
            Piece::new("aa", -2.0, PieceType::Normal),
        ],
        0,
    )
    .unwrap();
    Vocabulary::new(&model).unwrap()
}

fn english_pieces() -> Vec<Piece> {
    let mut pieces = vec![
        Piece::new("<unk>", 0.0, PieceType::Unknown),
        Piece::new("<s>", 0.0, PieceType::Control),
        Piece::new("</s>", 0.0, PieceType::Control),
        Piece::new("▁", -3.0, PieceType::Normal),
        Piece::new(".", -2.0, PieceType::Normal),
        Piece::new("I", -5.0, PieceType::Normal),
    ];
    for c in 'a'..='z' {
        pieces.push(Piece::new(c.to_string(), -5.0, PieceType::Normal));
    }
    for (piece, score) in [
        ("▁I", -4.0),
        ("▁saw", -6.0),
        ("▁s", -5.5),
        ("aw", -6.5),
        ("▁a", -4.5),
        ("▁girl", -7.0),
        ("▁gi", -6.75),
        ("rl", -6.25),
        ("▁with", -6.5),
        ("wi", -7.25),
        ("th", -5.25),
        ("▁tele", -8.0),
        ("scope", -8.5),
        ("tele", -7.5),
        ("▁telescope", -9.0),
        ("▁the", -5.0),
        ("er", -6.0),
        ("in", -6.0),
        ("ing", -6.5),
        ("▁hello", -7.0),
        ("▁world", -7.0),
        ("hello", -7.5),
        ("world", -7.75),
        ("he", -5.75),
        ("ll", -6.0),
        ("lo", -6.25),
        ("or", -6.25),
    ] {
        pieces.push(Piece::new(piece, score, PieceType::Normal));
    }
    pieces.push(Piece::new("<pad>", 0.0, PieceType::Unused));
    pieces
}

/// English vocabulary with `unk = 0`, `bos = 1`, and `eos = 2`.
pub fn english_model() -> Model {
    Model::new(english_pieces(), 0)
        .unwrap()
        .bos_id(Some(1))
        .unwrap()
        .eos_id(Some(2))
        .unwrap()
}

/// [`english_model()`] with all 256 byte pieces and byte fallback enabled.
pub fn byte_fallback_model() -> Model {
    let mut pieces = english_pieces();
    for b in 0..=255 {
        pieces.push(Piece::new(byte_to_piece(b), 0.0, PieceType::Byte));
    }
    Model::new(pieces, 0)
        .unwrap()
        .bos_id(Some(1))
        .unwrap()
        .eos_id(Some(2))
        .unwrap()
        .byte_fallback(true)
        .unwrap()
}
