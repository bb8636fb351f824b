#![cfg_attr(docsrs, feature(doc_cfg))]

//! # Kakera
//!
//! Kakera is a lattice based subword tokenizer. It splits a text into pieces of a trained
//! vocabulary, deterministically, by sampling, or as a k-best list, and restores the text from
//! the pieces.
//!
//! ## Examples
//!
//! ```no_run
//! use std::io::{prelude::*, stdin};
//!
//! use kakera::{EncodeOptions, Encoding, OutputType, Processor};
//!
//! let processor = Processor::from_file("kakera.model").unwrap();
//! let opts = EncodeOptions::new().out_type(OutputType::Pieces);
//!
//! for line in stdin().lock().lines() {
//!     let line = line.unwrap();
//!     if let Encoding::Pieces(pieces) = processor.encode(&line, &opts).unwrap() {
//!         println!("{}", pieces.join(" "));
//!     }
//!     let ids = processor.encode_as_ids(&line);
//!     assert_eq!(line.trim(), processor.decode_ids(&ids).unwrap());
//! }
//! ```
//!
//! Batch calls spread the work over threads when the **crate feature** `multithreading` is
//! enabled (default). For more details, see [`Processor::encode_batch()`].

pub mod diagnostics;
pub mod errors;

mod lattice;
mod model;
mod normalizer;
mod processor;
mod record;
mod vocab;

#[cfg(test)]
mod test_utils;

pub use lattice::{Lattice, Node, Path};
pub use model::{byte_to_piece, piece_to_byte, Model, Piece, PieceType, DEFAULT_UNK_SURFACE};
pub use normalizer::{NormalizedText, Normalizer, NormalizerSpec, RuleSet, SPACE_SYMBOL};
pub use processor::{
    DecodeInput, DecodeOutputType, Decoded, EncodeOptions, Encoding, NBestEncoding, NumThreads,
    OutputType, Processor,
};
pub use record::{NBestSegmentedText, SegmentedPiece, SegmentedText};
pub use vocab::Vocabulary;
