use std::fs::File;
use std::io::{prelude::*, stdin, stdout, BufWriter};
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use kakera::diagnostics;
use kakera::{DecodeInput, DecodeOutputType, Decoded, Model, NumThreads, Processor};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum InputFormat {
    Ids,
    Pieces,
}

#[derive(Parser, Debug)]
#[command(about = "A program to restore text from subword pieces.")]
struct Args {
    /// The model file to use when decoding pieces
    #[arg(long)]
    model: PathBuf,

    /// Input format. Each line contains ids or pieces separated by spaces
    #[arg(long, value_enum, default_value = "pieces")]
    input_format: InputFormat,

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

fn parse_line(line: &str, format: InputFormat) -> Result<DecodeInput, std::num::ParseIntError> {
    Ok(match format {
        InputFormat::Ids => DecodeInput::Ids(
            line.split_whitespace()
                .map(str::parse)
                .collect::<Result<_, _>>()?,
        ),
        InputFormat::Pieces => {
            DecodeInput::Pieces(line.split_whitespace().map(str::to_string).collect())
        }
    })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    diagnostics::init_logger();
    diagnostics::set_min_log_level(args.min_log_level);

    log::info!("Loading model file...");
    let mut f = zstd::Decoder::new(File::open(args.model)?)?;
    let model = Model::read(&mut f)?;
    let processor = Processor::new(model)?;
    let num_threads = NumThreads::from_i32(args.n_threads);

    log::info!("Start decoding");
    let mut out = BufWriter::new(stdout().lock());
    let mut lines = stdin().lock().lines();
    loop {
        let mut batch = Vec::with_capacity(args.batch_size);
        for line in lines.by_ref().take(args.batch_size.max(1)) {
            batch.push(parse_line(&line?, args.input_format)?);
        }
        if batch.is_empty() {
            break;
        }
        for result in processor.decode_batch(&batch, DecodeOutputType::Text, num_threads) {
            if let Decoded::Text(text) = result? {
                writeln!(out, "{text}")?;
            }
        }
    }
    out.flush()?;

    Ok(())
}
