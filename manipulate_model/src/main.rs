use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use kakera::diagnostics;
use kakera::{Model, NormalizerSpec, Piece, PieceType, RuleSet};
use serde::{Deserialize, Serialize};

#[derive(Parser, Debug)]
#[command(about = "A program to build and manipulate subword models.")]
struct Args {
    /// Input path of the model file
    #[arg(long, conflicts_with = "build_from")]
    model_in: Option<PathBuf>,

    /// Builds a new model from a vocabulary file (piece, score, kind separated by tabs)
    #[arg(long)]
    build_from: Option<PathBuf>,

    /// Output path of the model file
    #[arg(long)]
    model_out: Option<PathBuf>,

    /// Output the vocabulary contained in the model
    #[arg(long)]
    dump_vocab: Option<PathBuf>,

    /// Replace the vocabulary if the argument is specified. Special ids are kept
    #[arg(long)]
    replace_vocab: Option<PathBuf>,

    /// Beginning-of-sentence piece of a new model
    #[arg(long)]
    bos_piece: Option<String>,

    /// End-of-sentence piece of a new model
    #[arg(long)]
    eos_piece: Option<String>,

    /// Padding piece of a new model
    #[arg(long)]
    pad_piece: Option<String>,

    /// Enables byte fallback of a new model
    #[arg(long)]
    byte_fallback: bool,

    /// Rule set {identity, nfkc, nmt_nfkc, nfkc_cf, nmt_nfkc_cf} stored in the model
    #[arg(long)]
    rule_set: Option<String>,
}

#[derive(Deserialize, Serialize)]
struct PieceRecord {
    piece: String,
    score: f32,
    kind: String,
}

fn read_pieces(path: &Path) -> Result<Vec<Piece>, Box<dyn std::error::Error>> {
    let file = fs::File::open(path)?;
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .quoting(false)
        .from_reader(file);
    let mut pieces = vec![];
    for result in rdr.deserialize() {
        let record: PieceRecord = result?;
        pieces.push(Piece::new(record.piece, record.score, record.kind.parse()?));
    }
    Ok(pieces)
}

fn find_piece(pieces: &[Piece], piece: Option<&str>) -> Result<Option<u32>, String> {
    piece
        .map(|piece| {
            pieces
                .iter()
                .position(|p| p.piece() == piece)
                .and_then(|i| u32::try_from(i).ok())
                .ok_or_else(|| format!("piece not found: {piece}"))
        })
        .transpose()
}

fn build_model(args: &Args, pieces: Vec<Piece>) -> Result<Model, Box<dyn std::error::Error>> {
    let unk_id = pieces
        .iter()
        .position(|p| p.piece_type() == PieceType::Unknown)
        .and_then(|i| u32::try_from(i).ok())
        .ok_or("the vocabulary has no unknown piece")?;
    let bos_id = find_piece(&pieces, args.bos_piece.as_deref())?;
    let eos_id = find_piece(&pieces, args.eos_piece.as_deref())?;
    let pad_id = find_piece(&pieces, args.pad_piece.as_deref())?;
    Ok(Model::new(pieces, unk_id)?
        .bos_id(bos_id)?
        .eos_id(eos_id)?
        .pad_id(pad_id)?
        .byte_fallback(args.byte_fallback)?)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    diagnostics::init_logger();

    let mut model = if let Some(path) = &args.build_from {
        log::info!("Loading vocabulary file...");
        let pieces = read_pieces(path)?;
        build_model(&args, pieces)?
    } else if let Some(path) = &args.model_in {
        log::info!("Loading model file...");
        let mut f = zstd::Decoder::new(fs::File::open(path)?)?;
        Model::read(&mut f)?
    } else {
        return Err("either --model-in or --build-from is required".into());
    };

    if let Some(rule_set) = &args.rule_set {
        let spec = NormalizerSpec {
            rule_set: rule_set.parse::<RuleSet>()?,
            ..model.get_normalizer_spec().clone()
        };
        model = model.normalizer_spec(spec);
    }

    if let Some(path) = &args.dump_vocab {
        log::info!("Saving vocabulary file...");
        let file = fs::File::create(path)?;
        let mut wtr = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .quote_style(csv::QuoteStyle::Never)
            .from_writer(file);
        for piece in model.pieces() {
            wtr.serialize(PieceRecord {
                piece: piece.piece().to_string(),
                score: piece.score(),
                kind: piece.piece_type().to_string(),
            })?;
        }
        wtr.flush()?;
    }

    if let Some(path) = &args.replace_vocab {
        log::info!("Loading vocabulary file...");
        let pieces = read_pieces(path)?;
        model.replace_pieces(pieces)?;
    }

    if let Some(path) = &args.model_out {
        log::info!("Saving model file...");
        let mut f = zstd::Encoder::new(fs::File::create(path)?, 19)?;
        model.write(&mut f)?;
        f.finish()?;
    }

    Ok(())
}
