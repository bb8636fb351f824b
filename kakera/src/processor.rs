//! Encoder and decoder.

use std::fs::File;
use std::io::BufReader;
#[cfg(feature = "multithreading")]
use std::num::NonZeroUsize;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::diagnostics;
use crate::errors::{KakeraError, Result};
use crate::lattice::{Lattice, Path};
use crate::model::{byte_to_piece, piece_to_byte, Model, PieceType};
use crate::normalizer::{NormalizedText, Normalizer, NormalizerSpec, SPACE_SYMBOL};
use crate::record::{NBestSegmentedText, SegmentedPiece, SegmentedText};
use crate::vocab::Vocabulary;

/// Representation of an encoding result.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum OutputType {
    /// Piece ids.
    #[default]
    Ids,

    /// Piece texts.
    Pieces,

    /// [`SegmentedText`].
    Record,

    /// Serialized [`SegmentedText`].
    SerializedRecord,
}

/// Result of [`Processor::encode()`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Encoding {
    Ids(Vec<u32>),
    Pieces(Vec<String>),
    Record(SegmentedText),
    SerializedRecord(Vec<u8>),
}

/// Result of [`Processor::nbest_encode()`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NBestEncoding {
    Ids(Vec<Vec<u32>>),
    Pieces(Vec<Vec<String>>),
    Record(NBestSegmentedText),
    SerializedRecord(Vec<u8>),
}

/// Input of [`Processor::decode()`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DecodeInput {
    Ids(Vec<u32>),
    Pieces(Vec<String>),
}

/// Representation of a decoding result.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum DecodeOutputType {
    #[default]
    Text,
    Bytes,
    Record,
    SerializedRecord,
}

/// Result of [`Processor::decode()`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decoded {
    Text(String),
    Bytes(Vec<u8>),
    Record(SegmentedText),
    SerializedRecord(Vec<u8>),
}

/// The number of worker threads of batch calls.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum NumThreads {
    /// As many threads as the available parallelism.
    #[default]
    Auto,

    /// A fixed number of threads.
    Fixed(usize),
}

impl NumThreads {
    /// Converts an integer. Values less than or equal to 0 mean [`NumThreads::Auto`].
    pub fn from_i32(n: i32) -> Self {
        usize::try_from(n)
            .ok()
            .filter(|&n| n != 0)
            .map_or(Self::Auto, Self::Fixed)
    }

    #[cfg(feature = "multithreading")]
    fn resolve(self) -> usize {
        match self {
            Self::Auto => std::thread::available_parallelism().map_or(1, NonZeroUsize::get),
            Self::Fixed(n) => n.max(1),
        }
    }
}

/// Options of encoding calls.
#[derive(Clone, Debug)]
pub struct EncodeOptions {
    out_type: OutputType,
    enable_sampling: bool,
    nbest_size: i32,
    alpha: f32,
    add_bos: bool,
    add_eos: bool,
    reverse: bool,
    emit_unk_piece: bool,
    num_threads: NumThreads,
    num_samples: usize,
    wor: bool,
    include_best: bool,
    seed: Option<u64>,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            out_type: OutputType::Ids,
            enable_sampling: false,
            nbest_size: -1,
            alpha: 0.1,
            add_bos: false,
            add_eos: false,
            reverse: false,
            emit_unk_piece: false,
            num_threads: NumThreads::Auto,
            num_samples: 1,
            wor: false,
            include_best: false,
            seed: None,
        }
    }
}

impl EncodeOptions {
    /// Creates options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the output representation.
    pub const fn out_type(mut self, out_type: OutputType) -> Self {
        self.out_type = out_type;
        self
    }

    /// Enables subword sampling.
    pub const fn enable_sampling(mut self, enable: bool) -> Self {
        self.enable_sampling = enable;
        self
    }

    /// Sets the size of the sampling candidates.
    ///
    /// A negative value samples from the whole lattice, 0 or 1 disables sampling, and a larger
    /// value samples from the given number of best segmentations.
    pub const fn nbest_size(mut self, nbest_size: i32) -> Self {
        self.nbest_size = nbest_size;
        self
    }

    /// Sets the inverse temperature of sampling. It must be a positive finite number when
    /// sampling is used.
    pub const fn alpha(mut self, alpha: f32) -> Self {
        self.alpha = alpha;
        self
    }

    /// Prepends the beginning-of-sentence piece.
    pub const fn add_bos(mut self, add: bool) -> Self {
        self.add_bos = add;
        self
    }

    /// Appends the end-of-sentence piece.
    pub const fn add_eos(mut self, add: bool) -> Self {
        self.add_eos = add;
        self
    }

    /// Reverses the pieces. This is applied before adding the bos and eos pieces.
    pub const fn reverse(mut self, reverse: bool) -> Self {
        self.reverse = reverse;
        self
    }

    /// Emits the unknown piece instead of the unknown text.
    pub const fn emit_unk_piece(mut self, emit: bool) -> Self {
        self.emit_unk_piece = emit;
        self
    }

    /// Sets the number of threads of batch calls.
    pub const fn num_threads(mut self, num_threads: NumThreads) -> Self {
        self.num_threads = num_threads;
        self
    }

    /// Sets the number of samples of [`Processor::sample_encode_and_score()`].
    pub const fn num_samples(mut self, num_samples: usize) -> Self {
        self.num_samples = num_samples;
        self
    }

    /// Samples without replacement in [`Processor::sample_encode_and_score()`].
    pub const fn wor(mut self, wor: bool) -> Self {
        self.wor = wor;
        self
    }

    /// Puts the best segmentation at the front in [`Processor::sample_encode_and_score()`].
    pub const fn include_best(mut self, include_best: bool) -> Self {
        self.include_best = include_best;
        self
    }

    /// Fixes the random seed. In batch calls, the `i`-th item uses `seed + i`.
    pub const fn seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    fn for_item(&self, i: usize) -> Self {
        let mut opts = self.clone();
        opts.seed = self.seed.map(|seed| seed.wrapping_add(i as u64));
        opts
    }
}

fn with_rng<F, T>(seed: Option<u64>, f: F) -> T
where
    F: FnOnce(&mut StdRng) -> T,
{
    match seed {
        Some(seed) => f(&mut StdRng::seed_from_u64(seed)),
        None => diagnostics::with_thread_rng(f),
    }
}

fn check_sampling_alpha(alpha: f32) -> Result<()> {
    if !alpha.is_finite() || alpha <= 0.0 {
        return Err(KakeraError::configuration(
            "alpha",
            format!("must be a positive finite number, but got {alpha}"),
        ));
    }
    Ok(())
}

fn project(record: SegmentedText, out_type: OutputType) -> Result<Encoding> {
    Ok(match out_type {
        OutputType::Ids => Encoding::Ids(record.ids()),
        OutputType::Pieces => Encoding::Pieces(record.piece_texts()),
        OutputType::Record => Encoding::Record(record),
        OutputType::SerializedRecord => Encoding::SerializedRecord(record.to_bytes()?),
    })
}

/// Runs `f` on every item and returns the results in the order of `items`.
#[cfg(feature = "multithreading")]
fn run_batch<I, T, F>(items: &[I], num_threads: NumThreads, f: F) -> Vec<T>
where
    I: Sync,
    T: Send,
    F: Fn(usize, &I) -> T + Sync,
{
    let n_threads = num_threads.resolve().min(items.len());
    if n_threads <= 1 {
        return items.iter().enumerate().map(|(i, item)| f(i, item)).collect();
    }
    log::debug!("processing {} items with {n_threads} threads", items.len());

    let (task_tx, task_rx) = crossbeam_channel::unbounded::<usize>();
    let (result_tx, result_rx) = crossbeam_channel::unbounded::<(usize, T)>();
    for i in 0..items.len() {
        // The receiver is alive here.
        let _ = task_tx.send(i);
    }
    drop(task_tx);
    std::thread::scope(|s| {
        for _ in 0..n_threads {
            let task_rx = task_rx.clone();
            let result_tx = result_tx.clone();
            let f = &f;
            s.spawn(move || {
                for i in task_rx {
                    if result_tx.send((i, f(i, &items[i]))).is_err() {
                        break;
                    }
                }
            });
        }
    });
    drop(result_tx);

    let mut results: Vec<Option<T>> = items.iter().map(|_| None).collect();
    for (i, result) in result_rx {
        results[i] = Some(result);
    }
    results.into_iter().flatten().collect()
}

#[cfg(not(feature = "multithreading"))]
fn run_batch<I, T, F>(items: &[I], _num_threads: NumThreads, f: F) -> Vec<T>
where
    F: Fn(usize, &I) -> T,
{
    items.iter().enumerate().map(|(i, item)| f(i, item)).collect()
}

/// Subword encoder and decoder.
///
/// A processor is immutable after construction and can be shared by threads.
pub struct Processor {
    vocab: Vocabulary,
    normalizer: Normalizer,
}

impl Processor {
    /// Creates a new processor.
    ///
    /// # Errors
    ///
    /// [`KakeraError::Load`] is returned when the model is invalid.
    pub fn new(model: Model) -> Result<Self> {
        let vocab = Vocabulary::new(&model)?;
        let normalizer = Normalizer::new(model.normalizer_spec);
        log::debug!(
            "processor: {} pieces, rule set {}",
            vocab.piece_size(),
            normalizer.spec().rule_set
        );
        Ok(Self { vocab, normalizer })
    }

    /// Creates a processor from a serialized model.
    ///
    /// # Errors
    ///
    /// [`KakeraError::Load`] is returned when the model is malformed.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::new(Model::from_bytes(bytes)?)
    }

    /// Creates a processor from a model file.
    ///
    /// # Errors
    ///
    /// [`KakeraError::Load`] is returned when the file cannot be opened or the model is
    /// malformed.
    pub fn from_file<P>(path: P) -> Result<Self>
    where
        P: AsRef<std::path::Path>,
    {
        let path = path.as_ref();
        let f = File::open(path)
            .map_err(|e| KakeraError::load(format!("{}: {e}", path.display())))?;
        let mut rdr = BufReader::new(f);
        Self::new(Model::read(&mut rdr)?)
    }

    /// Overrides the normalization rules stored in the model.
    pub fn normalizer_spec(mut self, spec: NormalizerSpec) -> Self {
        self.normalizer = Normalizer::new(spec);
        self
    }

    /// Gets the vocabulary.
    pub const fn vocab(&self) -> &Vocabulary {
        &self.vocab
    }

    /// Gets the normalizer.
    pub const fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    fn make_record(
        &self,
        raw: &str,
        normalized: &NormalizedText,
        lattice: &Lattice,
        path: &Path,
        emit_unk_piece: bool,
        score: f32,
    ) -> SegmentedText {
        let offsets = normalized.offsets();
        let mut pieces = Vec::with_capacity(path.nodes().len());
        for &i in path.nodes() {
            let node = lattice.node(i);
            let begin = offsets[node.begin()];
            let end = offsets[node.end()];
            let surface = &raw[begin..end];

            if node.is_unknown() && self.vocab.byte_fallback() {
                // Only the last byte piece covers the surface.
                let bytes = lattice.surface(node).as_bytes();
                for (j, &b) in bytes.iter().enumerate() {
                    let last = j + 1 == bytes.len();
                    pieces.push(SegmentedPiece {
                        id: self.vocab.byte_id(b).unwrap_or(node.id()),
                        piece: byte_to_piece(b),
                        surface: if last {
                            surface.to_string()
                        } else {
                            String::new()
                        },
                        begin,
                        end: if last { end } else { begin },
                    });
                }
                continue;
            }

            let piece = if node.is_unknown() && !emit_unk_piece {
                lattice.surface(node).to_string()
            } else {
                self.vocab
                    .id_to_piece(node.id())
                    .unwrap_or_default()
                    .to_string()
            };
            pieces.push(SegmentedPiece {
                id: node.id(),
                piece,
                surface: surface.to_string(),
                begin,
                end,
            });
        }
        SegmentedText {
            text: raw.to_string(),
            score,
            pieces,
        }
    }

    fn control_piece(&self, id: u32, pos: usize) -> Result<SegmentedPiece> {
        Ok(SegmentedPiece {
            id,
            piece: self.vocab.id_to_piece(id)?.to_string(),
            surface: String::new(),
            begin: pos,
            end: pos,
        })
    }

    fn apply_transforms(&self, record: &mut SegmentedText, opts: &EncodeOptions) -> Result<()> {
        if opts.reverse {
            record.pieces.reverse();
        }
        if opts.add_bos {
            let id = self.vocab.bos_id().ok_or_else(|| {
                KakeraError::configuration("add_bos", "the model does not define the bos piece")
            })?;
            record.pieces.insert(0, self.control_piece(id, 0)?);
        }
        if opts.add_eos {
            let id = self.vocab.eos_id().ok_or_else(|| {
                KakeraError::configuration("add_eos", "the model does not define the eos piece")
            })?;
            let piece = self.control_piece(id, record.text.len())?;
            record.pieces.push(piece);
        }
        Ok(())
    }

    fn check_transforms(&self, opts: &EncodeOptions) -> Result<()> {
        if opts.add_bos && self.vocab.bos_id().is_none() {
            return Err(KakeraError::configuration(
                "add_bos",
                "the model does not define the bos piece",
            ));
        }
        if opts.add_eos && self.vocab.eos_id().is_none() {
            return Err(KakeraError::configuration(
                "add_eos",
                "the model does not define the eos piece",
            ));
        }
        Ok(())
    }

    fn encode_record(
        &self,
        text: &str,
        opts: &EncodeOptions,
        rng: &mut StdRng,
    ) -> Result<SegmentedText> {
        self.check_transforms(opts)?;
        let normalized = self.normalizer.normalize(text);
        let lattice = Lattice::new(&self.vocab, normalized.text());
        let path = if opts.enable_sampling {
            check_sampling_alpha(opts.alpha)?;
            match opts.nbest_size {
                n if n < 0 => lattice.sample(opts.alpha, rng),
                0 | 1 => lattice.viterbi(),
                n => lattice.sample_nbest(n.unsigned_abs() as usize, opts.alpha, rng),
            }
        } else {
            lattice.viterbi()
        };
        let mut record = self.make_record(
            text,
            &normalized,
            &lattice,
            &path,
            opts.emit_unk_piece,
            0.0,
        );
        self.apply_transforms(&mut record, opts)?;
        Ok(record)
    }

    /// Encodes a text.
    ///
    /// # Arguments
    ///
    /// * `text` - A raw text.
    /// * `opts` - Options.
    ///
    /// # Errors
    ///
    /// [`KakeraError::Configuration`] is returned when the options are not supported by the
    /// model.
    ///
    /// # Examples
    ///
    /// ```
    /// use kakera::{EncodeOptions, Encoding, Model, OutputType, Piece, PieceType, Processor};
    ///
    /// let model = Model::new(
    ///     vec![
    ///         Piece::new("<unk>", 0.0, PieceType::Unknown),
    ///         Piece::new("▁", -2.0, PieceType::Normal),
    ///         Piece::new("▁ab", -1.0, PieceType::Normal),
    ///         Piece::new("c", -3.0, PieceType::Normal),
    ///     ],
    ///     0,
    /// )
    /// .unwrap();
    /// let processor = Processor::new(model).unwrap();
    ///
    /// let opts = EncodeOptions::new().out_type(OutputType::Pieces);
    /// assert_eq!(
    ///     Encoding::Pieces(vec!["▁ab".to_string(), "c".to_string()]),
    ///     processor.encode("abc", &opts).unwrap(),
    /// );
    /// ```
    pub fn encode(&self, text: &str, opts: &EncodeOptions) -> Result<Encoding> {
        let record = with_rng(opts.seed, |rng| self.encode_record(text, opts, rng))?;
        project(record, opts.out_type)
    }

    /// Encodes texts with worker threads.
    ///
    /// The results are in the order of `texts` and are the same as calling
    /// [`Processor::encode()`] for each text, where the `i`-th call uses `seed + i` when a seed
    /// is given.
    pub fn encode_batch<S>(&self, texts: &[S], opts: &EncodeOptions) -> Vec<Result<Encoding>>
    where
        S: AsRef<str> + Sync,
    {
        run_batch(texts, opts.num_threads, |i, text| {
            self.encode(text.as_ref(), &opts.for_item(i))
        })
    }

    /// Gets the ids of the best segmentation.
    pub fn encode_as_ids(&self, text: &str) -> Vec<u32> {
        self.best_record(text).ids()
    }

    /// Gets the pieces of the best segmentation.
    pub fn encode_as_pieces(&self, text: &str) -> Vec<String> {
        self.best_record(text).piece_texts()
    }

    fn best_record(&self, text: &str) -> SegmentedText {
        let normalized = self.normalizer.normalize(text);
        let lattice = Lattice::new(&self.vocab, normalized.text());
        let path = lattice.viterbi();
        self.make_record(text, &normalized, &lattice, &path, false, 0.0)
    }

    /// Encodes a text into the `nbest_size` best segmentations.
    ///
    /// Sampling options and the seed are ignored.
    ///
    /// # Errors
    ///
    /// [`KakeraError::Configuration`] is returned when `nbest_size` is 0 or the options are not
    /// supported by the model.
    pub fn nbest_encode(
        &self,
        text: &str,
        nbest_size: usize,
        opts: &EncodeOptions,
    ) -> Result<NBestEncoding> {
        if nbest_size == 0 {
            return Err(KakeraError::configuration(
                "nbest_size",
                "must be a positive number",
            ));
        }
        self.check_transforms(opts)?;
        let normalized = self.normalizer.normalize(text);
        let lattice = Lattice::new(&self.vocab, normalized.text());
        let mut nbests = vec![];
        for path in lattice.nbest(nbest_size) {
            let mut record = self.make_record(
                text,
                &normalized,
                &lattice,
                &path,
                opts.emit_unk_piece,
                path.score() as f32,
            );
            self.apply_transforms(&mut record, opts)?;
            nbests.push(record);
        }
        Ok(match opts.out_type {
            OutputType::Ids => NBestEncoding::Ids(nbests.iter().map(SegmentedText::ids).collect()),
            OutputType::Pieces => {
                NBestEncoding::Pieces(nbests.iter().map(SegmentedText::piece_texts).collect())
            }
            OutputType::Record => NBestEncoding::Record(NBestSegmentedText { nbests }),
            OutputType::SerializedRecord => {
                NBestEncoding::SerializedRecord(NBestSegmentedText { nbests }.to_bytes()?)
            }
        })
    }

    /// Batch version of [`Processor::nbest_encode()`].
    pub fn nbest_encode_batch<S>(
        &self,
        texts: &[S],
        nbest_size: usize,
        opts: &EncodeOptions,
    ) -> Vec<Result<NBestEncoding>>
    where
        S: AsRef<str> + Sync,
    {
        run_batch(texts, opts.num_threads, |_, text| {
            self.nbest_encode(text.as_ref(), nbest_size, opts)
        })
    }

    /// Samples `num_samples` segmentations and scores each with its log-probability.
    ///
    /// Uses `alpha`, `num_samples`, `wor`, `include_best`, and `seed` of the options. Records
    /// carry the same score as the pair.
    ///
    /// # Errors
    ///
    /// [`KakeraError::Configuration`] is returned when `alpha` is invalid, when `include_best`
    /// is given without `wor`, or when the options are not supported by the model.
    pub fn sample_encode_and_score(
        &self,
        text: &str,
        opts: &EncodeOptions,
    ) -> Result<Vec<(Encoding, f32)>> {
        check_sampling_alpha(opts.alpha)?;
        if opts.include_best && !opts.wor {
            return Err(KakeraError::configuration(
                "include_best",
                "is supported only with wor",
            ));
        }
        self.check_transforms(opts)?;
        let normalized = self.normalizer.normalize(text);
        let lattice = Lattice::new(&self.vocab, normalized.text());
        let samples = with_rng(opts.seed, |rng| {
            lattice.sample_and_score(
                opts.alpha,
                opts.num_samples,
                opts.wor,
                opts.include_best,
                rng,
            )
        });
        let mut results = Vec::with_capacity(samples.len());
        for (path, log_prob) in samples {
            let score = log_prob as f32;
            let mut record = self.make_record(
                text,
                &normalized,
                &lattice,
                &path,
                opts.emit_unk_piece,
                score,
            );
            self.apply_transforms(&mut record, opts)?;
            results.push((project(record, opts.out_type)?, score));
        }
        Ok(results)
    }

    /// Batch version of [`Processor::sample_encode_and_score()`].
    pub fn sample_encode_and_score_batch<S>(
        &self,
        texts: &[S],
        opts: &EncodeOptions,
    ) -> Vec<Result<Vec<(Encoding, f32)>>>
    where
        S: AsRef<str> + Sync,
    {
        run_batch(texts, opts.num_threads, |i, text| {
            self.sample_encode_and_score(text.as_ref(), &opts.for_item(i))
        })
    }

    /// Computes the entropy of the segmentation distribution of a text.
    ///
    /// # Errors
    ///
    /// [`KakeraError::Configuration`] is returned when `alpha` is not positive.
    pub fn calculate_entropy(&self, text: &str, alpha: f32) -> Result<f32> {
        let normalized = self.normalizer.normalize(text);
        let lattice = Lattice::new(&self.vocab, normalized.text());
        Ok(lattice.entropy(alpha)? as f32)
    }

    /// Batch version of [`Processor::calculate_entropy()`].
    pub fn calculate_entropy_batch<S>(
        &self,
        texts: &[S],
        alpha: f32,
        num_threads: NumThreads,
    ) -> Vec<Result<f32>>
    where
        S: AsRef<str> + Sync,
    {
        run_batch(texts, num_threads, |_, text| {
            self.calculate_entropy(text.as_ref(), alpha)
        })
    }

    fn decode_items(&self, items: &[(u32, &str, PieceType)]) -> SegmentedText {
        let spec = self.normalizer.spec();
        let unescape = |piece: &str, at_bos: &mut bool| {
            let mut surface = if spec.escape_whitespaces {
                piece.replace(SPACE_SYMBOL, " ")
            } else {
                piece.to_string()
            };
            if *at_bos && spec.add_dummy_prefix && surface.starts_with(' ') {
                surface.remove(0);
            }
            *at_bos = false;
            surface
        };

        let mut text = String::new();
        let mut pieces = Vec::with_capacity(items.len());
        let mut at_bos = true;
        let mut i = 0;
        while i < items.len() {
            let (id, piece, piece_type) = items[i];
            if piece_type == PieceType::Byte {
                let mut j = i;
                let mut bytes = vec![];
                while j < items.len() && items[j].2 == PieceType::Byte {
                    bytes.extend(piece_to_byte(items[j].1));
                    j += 1;
                }
                let surface = unescape(&String::from_utf8_lossy(&bytes), &mut at_bos);
                let begin = text.len();
                text.push_str(&surface);
                for (k, &(id, piece, _)) in items[i..j].iter().enumerate() {
                    let last = i + k + 1 == j;
                    pieces.push(SegmentedPiece {
                        id,
                        piece: piece.to_string(),
                        surface: if last {
                            surface.clone()
                        } else {
                            String::new()
                        },
                        begin,
                        end: if last { text.len() } else { begin },
                    });
                }
                i = j;
                continue;
            }

            let surface = match piece_type {
                PieceType::Control => String::new(),
                PieceType::Unknown => {
                    at_bos = false;
                    self.vocab.unk_surface().to_string()
                }
                _ => unescape(piece, &mut at_bos),
            };
            let begin = text.len();
            text.push_str(&surface);
            pieces.push(SegmentedPiece {
                id,
                piece: piece.to_string(),
                surface,
                begin,
                end: text.len(),
            });
            i += 1;
        }
        SegmentedText {
            text,
            score: 0.0,
            pieces,
        }
    }

    /// Decodes ids into a record.
    ///
    /// # Errors
    ///
    /// [`KakeraError::Range`] is returned when an id is out of range.
    pub fn decode_ids_to_record(&self, ids: &[u32]) -> Result<SegmentedText> {
        let mut items = Vec::with_capacity(ids.len());
        for &id in ids {
            let piece = self.vocab.piece(id)?;
            items.push((id, piece.piece(), piece.piece_type()));
        }
        Ok(self.decode_items(&items))
    }

    /// Decodes pieces into a record. Pieces not in the vocabulary are decoded as they are.
    ///
    /// # Errors
    ///
    /// This function does not fail currently; the signature mirrors
    /// [`Processor::decode_ids_to_record()`].
    pub fn decode_pieces_to_record<S>(&self, pieces: &[S]) -> Result<SegmentedText>
    where
        S: AsRef<str>,
    {
        let mut items = Vec::with_capacity(pieces.len());
        for piece in pieces {
            let piece = piece.as_ref();
            match self.vocab.get_id(piece) {
                Some(id) => items.push((id, piece, self.vocab.piece(id)?.piece_type())),
                None => items.push((self.vocab.unk_id(), piece, PieceType::Normal)),
            }
        }
        Ok(self.decode_items(&items))
    }

    /// Decodes ids into a text.
    ///
    /// # Errors
    ///
    /// [`KakeraError::Range`] is returned when an id is out of range.
    ///
    /// # Examples
    ///
    /// ```
    /// use kakera::{Model, Piece, PieceType, Processor};
    ///
    /// let model = Model::new(
    ///     vec![
    ///         Piece::new("<unk>", 0.0, PieceType::Unknown),
    ///         Piece::new("▁hello", -1.0, PieceType::Normal),
    ///         Piece::new("▁world", -1.0, PieceType::Normal),
    ///     ],
    ///     0,
    /// )
    /// .unwrap();
    /// let processor = Processor::new(model).unwrap();
    ///
    /// assert_eq!("hello world", processor.decode_ids(&[1, 2]).unwrap());
    /// assert!(processor.decode_ids(&[3]).is_err());
    /// ```
    pub fn decode_ids(&self, ids: &[u32]) -> Result<String> {
        Ok(self.decode_ids_to_record(ids)?.text)
    }

    /// Decodes pieces into a text.
    ///
    /// # Errors
    ///
    /// See [`Processor::decode_pieces_to_record()`].
    pub fn decode_pieces<S>(&self, pieces: &[S]) -> Result<String>
    where
        S: AsRef<str>,
    {
        Ok(self.decode_pieces_to_record(pieces)?.text)
    }

    /// Decodes ids or pieces into the given representation.
    ///
    /// # Errors
    ///
    /// [`KakeraError::Range`] is returned when an id is out of range.
    pub fn decode(&self, input: &DecodeInput, out_type: DecodeOutputType) -> Result<Decoded> {
        let record = match input {
            DecodeInput::Ids(ids) => self.decode_ids_to_record(ids)?,
            DecodeInput::Pieces(pieces) => self.decode_pieces_to_record(pieces)?,
        };
        Ok(match out_type {
            DecodeOutputType::Text => Decoded::Text(record.text),
            DecodeOutputType::Bytes => Decoded::Bytes(record.text.into_bytes()),
            DecodeOutputType::Record => Decoded::Record(record),
            DecodeOutputType::SerializedRecord => Decoded::SerializedRecord(record.to_bytes()?),
        })
    }

    /// Batch version of [`Processor::decode()`].
    pub fn decode_batch(
        &self,
        inputs: &[DecodeInput],
        out_type: DecodeOutputType,
        num_threads: NumThreads,
    ) -> Vec<Result<Decoded>> {
        run_batch(inputs, num_threads, |_, input| self.decode(input, out_type))
    }

    /// Normalizes a text.
    pub fn normalize(&self, text: &str) -> String {
        self.normalizer.normalize(text).text
    }

    /// Normalizes a text and returns the byte offset map.
    pub fn normalize_with_offsets(&self, text: &str) -> NormalizedText {
        self.normalizer.normalize(text)
    }

    /// Normalizes a text and returns the character offset map.
    pub fn normalize_with_char_offsets(&self, text: &str) -> (String, Vec<usize>) {
        let normalized = self.normalizer.normalize(text);
        let offsets = normalized.char_offsets(text);
        (normalized.text, offsets)
    }

    /// Normalizes a byte sequence. Invalid UTF-8 sequences are replaced with U+FFFD.
    pub fn normalize_bytes(&self, bytes: &[u8]) -> NormalizedText {
        self.normalizer.normalize_bytes(bytes)
    }

    /// Batch version of [`Processor::normalize_with_offsets()`].
    pub fn normalize_batch<S>(&self, texts: &[S], num_threads: NumThreads) -> Vec<NormalizedText>
    where
        S: AsRef<str> + Sync,
    {
        run_batch(texts, num_threads, |_, text| {
            self.normalizer.normalize(text.as_ref())
        })
    }
}
