use std::fs::File;
use std::io::{prelude::*, stdin, stdout, BufWriter};
use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, ValueEnum};
use kakera::diagnostics;
use kakera::{EncodeOptions, Encoding, Model, NBestEncoding, NumThreads, OutputType, Processor};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Ids,
    Pieces,
}

#[derive(Parser, Debug)]
#[command(about = "A program to split text into subword pieces.")]
struct Args {
    /// The model file to use when encoding text
    #[arg(long)]
    model: PathBuf,

    /// Output format
    #[arg(long, value_enum, default_value = "pieces")]
    output_format: OutputFormat,

    /// Outputs the given number of best segmentations separated by tabs
    #[arg(long)]
    nbest: Option<usize>,

    /// Enables subword sampling
    #[arg(long)]
    enable_sampling: bool,

    /// Sampling candidates. A negative value samples from all segmentations
    #[arg(long, default_value = "-1", allow_hyphen_values = true)]
    nbest_size: i32,

    /// Inverse temperature of sampling
    #[arg(long, default_value = "0.1")]
    alpha: f32,

    /// Random seed of sampling
    #[arg(long)]
    seed: Option<u64>,

    /// Prepends the beginning-of-sentence piece
    #[arg(long)]
    add_bos: bool,

    /// Appends the end-of-sentence piece
    #[arg(long)]
    add_eos: bool,

    /// Reverses the pieces
    #[arg(long)]
    reverse: bool,

    /// Emits the unknown piece instead of the unknown text
    #[arg(long)]
    emit_unk_piece: bool,

    /// Number of threads (0 or less means all available threads)
    #[arg(long, default_value = "1", allow_hyphen_values = true)]
    n_threads: i32,

    /// Number of lines processed at once
    #[arg(long, default_value = "1000")]
    batch_size: usize,

    /// Minimum log level (0: INFO, 1: WARNING, 2: ERROR, 3: none)
    #[arg(long, default_value = "0")]
    min_log_level: i32,
}

fn format_ids(ids: &[u32]) -> String {
    ids.iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

fn format_encoding(encoding: &Encoding) -> String {
    match encoding {
        Encoding::Ids(ids) => format_ids(ids),
        Encoding::Pieces(pieces) => pieces.join(" "),
        Encoding::Record(record) => record.piece_texts().join(" "),
        Encoding::SerializedRecord(_) => String::new(),
    }
}

fn format_nbest(encoding: &NBestEncoding) -> String {
    match encoding {
        NBestEncoding::Ids(ids) => ids
            .iter()
            .map(|ids| format_ids(ids))
            .collect::<Vec<_>>()
            .join("\t"),
        NBestEncoding::Pieces(pieces) => pieces
            .iter()
            .map(|pieces| pieces.join(" "))
            .collect::<Vec<_>>()
            .join("\t"),
        NBestEncoding::Record(record) => record
            .nbests
            .iter()
            .map(|r| r.piece_texts().join(" "))
            .collect::<Vec<_>>()
            .join("\t"),
        NBestEncoding::SerializedRecord(_) => String::new(),
    }
}

/// Options of a batch starting at the `first_line`-th line of the input. Line `i` is sampled
/// with `seed + i` regardless of the batch size.
fn batch_options(opts: &EncodeOptions, seed: Option<u64>, first_line: usize) -> EncodeOptions {
    opts.clone()
        .seed(seed.map(|seed| seed.wrapping_add(first_line as u64)))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    diagnostics::init_logger();
    diagnostics::set_min_log_level(args.min_log_level);

    log::info!("Loading model file...");
    let mut f = zstd::Decoder::new(File::open(args.model)?)?;
    let model = Model::read(&mut f)?;
    let processor = Processor::new(model)?;

    let out_type = match args.output_format {
        OutputFormat::Ids => OutputType::Ids,
        OutputFormat::Pieces => OutputType::Pieces,
    };
    let opts = EncodeOptions::new()
        .out_type(out_type)
        .enable_sampling(args.enable_sampling)
        .nbest_size(args.nbest_size)
        .alpha(args.alpha)
        .add_bos(args.add_bos)
        .add_eos(args.add_eos)
        .reverse(args.reverse)
        .emit_unk_piece(args.emit_unk_piece)
        .num_threads(NumThreads::from_i32(args.n_threads));

    log::info!("Start encoding");
    let mut out = BufWriter::new(stdout().lock());
    let mut n_lines = 0;
    let mut n_pieces = 0;
    let start = Instant::now();
    let mut lines = stdin().lock().lines();
    loop {
        let mut batch = Vec::with_capacity(args.batch_size);
        for line in lines.by_ref().take(args.batch_size.max(1)) {
            batch.push(line?);
        }
        if batch.is_empty() {
            break;
        }
        let opts = batch_options(&opts, args.seed, n_lines);
        n_lines += batch.len();
        if let Some(nbest) = args.nbest {
            for result in processor.nbest_encode_batch(&batch, nbest, &opts) {
                writeln!(out, "{}", format_nbest(&result?))?;
            }
        } else {
            for result in processor.encode_batch(&batch, &opts) {
                let encoding = result?;
                n_pieces += match &encoding {
                    Encoding::Ids(ids) => ids.len(),
                    Encoding::Pieces(pieces) => pieces.len(),
                    _ => 0,
                };
                writeln!(out, "{}", format_encoding(&encoding))?;
            }
        }
    }
    out.flush()?;

    let duration = start.elapsed();
    log::info!("Elapsed: {} [sec]", duration.as_secs_f64());
    log::info!(
        "Speed: {} [lines/sec], {} [pieces/sec]",
        n_lines as f64 / duration.as_secs_f64(),
        n_pieces as f64 / duration.as_secs_f64()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use kakera::{Piece, PieceType};

    fn processor() -> Processor {
        let mut pieces = vec![
            Piece::new("<unk>", 0.0, PieceType::Unknown),
            Piece::new("▁", -3.0, PieceType::Normal),
            Piece::new("▁hello", -7.0, PieceType::Normal),
            Piece::new("▁world", -7.0, PieceType::Normal),
            Piece::new("he", -5.0, PieceType::Normal),
            Piece::new("ll", -5.0, PieceType::Normal),
            Piece::new("or", -5.0, PieceType::Normal),
        ];
        for c in "helowrd".chars() {
            pieces.push(Piece::new(c.to_string(), -4.0, PieceType::Normal));
        }
        Processor::new(Model::new(pieces, 0).unwrap()).unwrap()
    }

    #[test]
    fn test_batch_options_independent_of_batch_size() {
        let processor = processor();
        let opts = EncodeOptions::new()
            .out_type(OutputType::Pieces)
            .enable_sampling(true)
            .alpha(0.5)
            .num_threads(NumThreads::Fixed(1));
        let lines = vec!["hello world".to_string(); 8];

        let expected: Vec<_> = processor
            .encode_batch(&lines[..], &batch_options(&opts, Some(42), 0))
            .into_iter()
            .map(Result::unwrap)
            .collect();
        let mut actual = vec![];
        for (first_line, batch) in [(0, &lines[..3]), (3, &lines[3..5]), (5, &lines[5..])] {
            let batch_opts = batch_options(&opts, Some(42), first_line);
            actual.extend(
                processor
                    .encode_batch(batch, &batch_opts)
                    .into_iter()
                    .map(Result::unwrap),
            );
        }

        assert_eq!(expected, actual);
    }
}
