use std::fs::File;
use std::io::{prelude::*, stdin, stdout, BufWriter};
use std::path::PathBuf;

use clap::Parser;
use kakera::diagnostics;
use kakera::{Model, Normalizer, NormalizerSpec, RuleSet};

#[derive(Parser, Debug)]
#[command(about = "A program to normalize text.")]
struct Args {
    /// The model file whose normalization rules are used
    #[arg(long)]
    model: Option<PathBuf>,

    /// Rule set {identity, nfkc, nmt_nfkc, nfkc_cf, nmt_nfkc_cf}. Overrides the model
    #[arg(long)]
    rule_set: Option<String>,

    /// Do not insert a whitespace at the beginning of text
    #[arg(long)]
    no_dummy_prefix: bool,

    /// Keep leading, trailing, and duplicated whitespaces
    #[arg(long)]
    keep_extra_whitespaces: bool,

    /// Do not replace whitespaces with U+2581
    #[arg(long)]
    no_escape_whitespaces: bool,

    /// Append character offsets to the original text after a tab
    #[arg(long)]
    offsets: bool,

    /// Minimum log level (0: INFO, 1: WARNING, 2: ERROR, 3: none)
    #[arg(long, default_value = "0")]
    min_log_level: i32,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    diagnostics::init_logger();
    diagnostics::set_min_log_level(args.min_log_level);

    let mut spec = if let Some(path) = args.model {
        log::info!("Loading model file...");
        let mut f = zstd::Decoder::new(File::open(path)?)?;
        Model::read(&mut f)?.get_normalizer_spec().clone()
    } else {
        NormalizerSpec::default()
    };
    if let Some(rule_set) = args.rule_set {
        spec.rule_set = rule_set.parse::<RuleSet>()?;
    }
    spec.add_dummy_prefix &= !args.no_dummy_prefix;
    spec.remove_extra_whitespaces &= !args.keep_extra_whitespaces;
    spec.escape_whitespaces &= !args.no_escape_whitespaces;
    log::info!("Rule set: {}", spec.rule_set);
    let normalizer = Normalizer::new(spec);

    let mut out = BufWriter::new(stdout().lock());
    for line in stdin().lock().lines() {
        let line = line?;
        let normalized = normalizer.normalize(&line);
        if args.offsets {
            let offsets = normalized
                .char_offsets(&line)
                .iter()
                .map(usize::to_string)
                .collect::<Vec<_>>()
                .join(" ");
            writeln!(out, "{}\t{offsets}", normalized.text())?;
        } else {
            writeln!(out, "{}", normalized.text())?;
        }
    }
    out.flush()?;

    Ok(())
}
