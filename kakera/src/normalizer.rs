//! Reversible text normalization.

use std::fmt;
use std::iter;
use std::str::FromStr;

use bincode::{Decode, Encode};
use unicode_normalization::char::canonical_combining_class;
use unicode_normalization::UnicodeNormalization;

use crate::errors::{KakeraError, Result};

/// Escaped representation of a whitespace.
pub const SPACE_SYMBOL: char = '\u{2581}';

/// Character-level rewriting rules applied before whitespace handling.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Decode, Encode)]
pub enum RuleSet {
    /// Keeps characters as they are.
    Identity,

    /// Unicode NFKC.
    Nfkc,

    /// NFKC after removing control characters and mapping separators to U+0020.
    NmtNfkc,

    /// NFKC followed by lower-casing.
    NfkcCf,

    /// [`RuleSet::NmtNfkc`] followed by lower-casing.
    NmtNfkcCf,
}

impl RuleSet {
    /// Gets the name of the rule set.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::Nfkc => "nfkc",
            Self::NmtNfkc => "nmt_nfkc",
            Self::NfkcCf => "nfkc_cf",
            Self::NmtNfkcCf => "nmt_nfkc_cf",
        }
    }

    const fn is_nmt(self) -> bool {
        matches!(self, Self::NmtNfkc | Self::NmtNfkcCf)
    }

    const fn is_case_folding(self) -> bool {
        matches!(self, Self::NfkcCf | Self::NmtNfkcCf)
    }
}

impl fmt::Display for RuleSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RuleSet {
    type Err = KakeraError;

    fn from_str(name: &str) -> Result<Self> {
        match name {
            "identity" => Ok(Self::Identity),
            "nfkc" => Ok(Self::Nfkc),
            "nmt_nfkc" => Ok(Self::NmtNfkc),
            "nfkc_cf" => Ok(Self::NfkcCf),
            "nmt_nfkc_cf" => Ok(Self::NmtNfkcCf),
            _ => Err(KakeraError::configuration(
                "rule_set",
                format!("unknown rule set: {name}"),
            )),
        }
    }
}

/// Options of the normalizer.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Decode, Encode)]
pub struct NormalizerSpec {
    /// Character rewriting rules.
    pub rule_set: RuleSet,

    /// Inserts a whitespace at the beginning of non-empty text.
    pub add_dummy_prefix: bool,

    /// Removes leading and trailing whitespaces and collapses internal runs of whitespaces.
    pub remove_extra_whitespaces: bool,

    /// Replaces whitespaces with `▁` (U+2581).
    pub escape_whitespaces: bool,
}

impl Default for NormalizerSpec {
    fn default() -> Self {
        Self {
            rule_set: RuleSet::NmtNfkc,
            add_dummy_prefix: true,
            remove_extra_whitespaces: true,
            escape_whitespaces: true,
        }
    }
}

/// Normalized text with a map back to the raw input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NormalizedText {
    pub(crate) text: String,
    pub(crate) offsets: Vec<usize>,
}

impl NormalizedText {
    /// Gets the normalized text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Gets the byte offset map.
    ///
    /// `offsets()[i]` is the byte position in the raw input corresponding to the `i`-th byte of
    /// the normalized text. The last element is the length of the raw input.
    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    /// Converts the byte offset map into a character offset map.
    ///
    /// # Arguments
    ///
    /// * `raw` - The raw input given to the normalizer.
    ///
    /// # Returns
    ///
    /// For each character of the normalized text, the index of the corresponding raw character,
    /// followed by the number of raw characters.
    ///
    /// # Examples
    ///
    /// ```
    /// use kakera::{Normalizer, NormalizerSpec};
    ///
    /// let normalizer = Normalizer::new(NormalizerSpec::default());
    /// let raw = "ＫＡＤＯＫＡＷＡABC";
    /// let n = normalizer.normalize(raw);
    /// assert_eq!("▁KADOKAWAABC", n.text());
    /// assert_eq!(vec![0, 0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11], n.char_offsets(raw));
    /// ```
    pub fn char_offsets(&self, raw: &str) -> Vec<usize> {
        let mut str_to_char_pos = vec![0; raw.len() + 1];
        let mut n_chars = 0;
        for (i, (pos, _)) in raw.char_indices().enumerate() {
            str_to_char_pos[pos] = i;
            n_chars = i + 1;
        }
        str_to_char_pos[raw.len()] = n_chars;
        let mut result = Vec::with_capacity(self.text.len() + 1);
        for (pos, _) in self.text.char_indices() {
            result.push(str_to_char_pos[self.offsets[pos]]);
        }
        result.push(n_chars);
        result
    }

    /// Consumes the object and returns the text and the byte offset map.
    pub fn into_parts(self) -> (String, Vec<usize>) {
        (self.text, self.offsets)
    }
}

/// Normalizer.
#[derive(Clone, Debug, Default)]
pub struct Normalizer {
    spec: NormalizerSpec,
}

impl Normalizer {
    /// Creates a new normalizer.
    pub const fn new(spec: NormalizerSpec) -> Self {
        Self { spec }
    }

    /// Gets the options of the normalizer.
    pub const fn spec(&self) -> &NormalizerSpec {
        &self.spec
    }

    /// Normalizes a string.
    ///
    /// # Arguments
    ///
    /// * `text` - A raw string.
    ///
    /// # Returns
    ///
    /// Normalized text and its byte offset map.
    ///
    /// # Examples
    ///
    /// ```
    /// use kakera::{Normalizer, NormalizerSpec};
    ///
    /// let normalizer = Normalizer::new(NormalizerSpec::default());
    /// let n = normalizer.normalize("  hello  world  ");
    /// assert_eq!("▁hello▁world", n.text());
    /// ```
    pub fn normalize(&self, text: &str) -> NormalizedText {
        self.normalize_units(text.char_indices(), text.len())
    }

    /// Normalizes a byte sequence. Invalid UTF-8 sequences are replaced with U+FFFD.
    ///
    /// Offsets point into `bytes`.
    pub fn normalize_bytes(&self, bytes: &[u8]) -> NormalizedText {
        let mut units = vec![];
        let mut pos = 0;
        while pos < bytes.len() {
            match std::str::from_utf8(&bytes[pos..]) {
                Ok(s) => {
                    units.extend(s.char_indices().map(|(i, c)| (pos + i, c)));
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    // The prefix is valid by definition.
                    if let Ok(s) = std::str::from_utf8(&bytes[pos..pos + valid]) {
                        units.extend(s.char_indices().map(|(i, c)| (pos + i, c)));
                    }
                    units.push((pos + valid, char::REPLACEMENT_CHARACTER));
                    pos += valid + e.error_len().unwrap_or(bytes.len() - pos - valid);
                }
            }
        }
        self.normalize_units(units.into_iter(), bytes.len())
    }

    fn normalize_units<I>(&self, raw: I, raw_len: usize) -> NormalizedText
    where
        I: Iterator<Item = (usize, char)>,
    {
        let units = self.apply_rules(raw);
        self.arrange_whitespaces(&units, raw_len)
    }

    /// Rewrites characters according to the rule set. Each output character is paired with the
    /// raw offset of the cluster it came from.
    fn apply_rules<I>(&self, raw: I) -> Vec<(char, usize)>
    where
        I: Iterator<Item = (usize, char)>,
    {
        let rule_set = self.spec.rule_set;
        let mut units = vec![];
        if rule_set == RuleSet::Identity {
            units.extend(raw.map(|(pos, c)| (c, pos)));
            return units;
        }

        // Splits the input into clusters that normalize independently of their neighbors.
        let mut cluster = String::new();
        let mut cluster_start = 0;
        let flush = |cluster: &mut String, start: usize, units: &mut Vec<(char, usize)>| {
            if cluster.is_empty() {
                return;
            }
            for c in cluster.nfkc() {
                if rule_set.is_case_folding() {
                    units.extend(c.to_lowercase().map(|c| (c, start)));
                } else {
                    units.push((c, start));
                }
            }
            cluster.clear();
        };
        for (pos, c) in raw {
            let c = if rule_set.is_nmt() {
                match nmt_map(c) {
                    Some(c) => c,
                    None => continue,
                }
            } else {
                c
            };
            if canonical_combining_class(c) == 0 && !composes_with(&cluster, c) {
                flush(&mut cluster, cluster_start, &mut units);
            }
            if cluster.is_empty() {
                cluster_start = pos;
            }
            cluster.push(c);
        }
        flush(&mut cluster, cluster_start, &mut units);
        units
    }

    fn arrange_whitespaces(&self, units: &[(char, usize)], raw_len: usize) -> NormalizedText {
        let spec = &self.spec;
        let mut units = units;
        if spec.remove_extra_whitespaces {
            while let Some(((' ', _), rest)) = units.split_first() {
                units = rest;
            }
        }
        if units.is_empty() {
            return NormalizedText {
                text: String::new(),
                offsets: vec![raw_len],
            };
        }

        let mut arranged: Vec<(char, usize)> = Vec::with_capacity(units.len() + 1);
        if spec.add_dummy_prefix {
            // The inserted character points to the following original character.
            arranged.push((' ', units[0].1));
        }
        for &(c, pos) in units {
            if spec.remove_extra_whitespaces
                && c == ' '
                && matches!(arranged.last(), Some((' ', _)))
            {
                continue;
            }
            arranged.push((c, pos));
        }
        if spec.remove_extra_whitespaces {
            while let Some((' ', _)) = arranged.last() {
                arranged.pop();
            }
        }

        let mut text = String::with_capacity(arranged.len() * 3);
        let mut offsets = Vec::with_capacity(arranged.len() * 3 + 1);
        for (c, pos) in arranged {
            let c = if spec.escape_whitespaces && c == ' ' {
                SPACE_SYMBOL
            } else {
                c
            };
            text.push(c);
            offsets.resize(text.len(), pos);
        }
        offsets.push(raw_len);
        NormalizedText { text, offsets }
    }
}

/// Checks whether appending a starter `c` changes the NFKC form of `cluster`, as with a
/// halfwidth voiced sound mark or a Hangul vowel jamo.
fn composes_with(cluster: &str, c: char) -> bool {
    if cluster.is_empty() {
        return false;
    }
    let joined = cluster.chars().chain(iter::once(c)).nfkc();
    let separate = cluster.nfkc().chain(iter::once(c).nfkc());
    !joined.eq(separate)
}

/// Removes control characters and maps separators to U+0020. `None` means the character is
/// removed.
const fn nmt_map(c: char) -> Option<char> {
    match c as u32 {
        0x0009 | 0x000A | 0x000B | 0x000C | 0x000D => Some(' '),
        0x0000..=0x0008 | 0x000E..=0x001F | 0x007F | 0x008F | 0x009F => None,
        0x1680 | 0x200B..=0x200F | 0x2028 | 0x2029 | 0xFEFF => Some(' '),
        _ => Some(c),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer(
        rule_set: RuleSet,
        add_dummy_prefix: bool,
        remove_extra_whitespaces: bool,
        escape_whitespaces: bool,
    ) -> Normalizer {
        Normalizer::new(NormalizerSpec {
            rule_set,
            add_dummy_prefix,
            remove_extra_whitespaces,
            escape_whitespaces,
        })
    }

    fn assert_offset_invariants(raw: &str, n: &NormalizedText) {
        assert_eq!(n.text().len() + 1, n.offsets().len());
        assert!(n.offsets().windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(raw.len(), *n.offsets().last().unwrap());
    }

    #[test]
    fn test_normalize_kadokawa() {
        let n = Normalizer::default().normalize("ＫＡＤＯＫＡＷＡABC");

        assert_eq!("▁KADOKAWAABC", n.text());
        assert_eq!(
            &[0, 0, 0, 0, 3, 6, 9, 12, 15, 18, 21, 24, 25, 26, 27],
            n.offsets()
        );
        assert_eq!(
            vec![0, 0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11],
            n.char_offsets("ＫＡＤＯＫＡＷＡABC")
        );
    }

    #[test]
    fn test_normalize_compatibility_ideograph() {
        let n = Normalizer::default().normalize("㍻");

        assert_eq!("▁平成", n.text());
        assert_eq!(vec![0, 0, 0, 1], n.char_offsets("㍻"));
    }

    #[test]
    fn test_normalize_without_dummy_prefix() {
        let n = normalizer(RuleSet::NmtNfkc, false, true, true).normalize("㍻");

        assert_eq!("平成", n.text());
        assert_eq!(vec![0, 0, 1], n.char_offsets("㍻"));
    }

    #[test]
    fn test_normalize_keep_whitespaces() {
        let n = normalizer(RuleSet::NmtNfkc, true, false, true).normalize("hello  world");

        assert_eq!("▁hello▁▁world", n.text());
        assert_offset_invariants("hello  world", &n);
    }

    #[test]
    fn test_normalize_remove_extra_whitespaces() {
        let raw = "  hello  world  ";
        let n = Normalizer::default().normalize(raw);

        assert_eq!("▁hello▁world", n.text());
        // The dummy prefix points to `h`, the collapsed run to its first space.
        assert_eq!(&[2, 2, 2], &n.offsets()[..3]);
        assert_eq!(7, n.offsets()[8]);
        assert_offset_invariants(raw, &n);
    }

    #[test]
    fn test_normalize_no_escape() {
        let n = normalizer(RuleSet::NmtNfkc, false, true, false).normalize("  hello  world  ");

        assert_eq!("hello world", n.text());
    }

    #[test]
    fn test_normalize_empty() {
        let n = Normalizer::default().normalize("");

        assert_eq!("", n.text());
        assert_eq!(&[0], n.offsets());
    }

    #[test]
    fn test_normalize_only_whitespaces() {
        let n = Normalizer::default().normalize("   ");

        assert_eq!("", n.text());
        assert_eq!(&[3], n.offsets());
    }

    #[test]
    fn test_normalize_identity() {
        let n = normalizer(RuleSet::Identity, false, false, false).normalize("ＡＢＣ");

        assert_eq!("ＡＢＣ", n.text());
        assert_eq!(&[0, 0, 0, 3, 3, 3, 6, 6, 6, 9], n.offsets());
    }

    #[test]
    fn test_normalize_case_folding() {
        let n = normalizer(RuleSet::NfkcCf, false, false, false).normalize("ＡＢＣ");

        assert_eq!("abc", n.text());
        assert_eq!(&[0, 3, 6, 9], n.offsets());
    }

    #[test]
    fn test_normalize_nmt_controls() {
        let raw = "a\tb\u{0001}c";
        let n = normalizer(RuleSet::NmtNfkc, false, true, false).normalize(raw);

        assert_eq!("a bc", n.text());
        assert_eq!(&[0, 1, 2, 4, 5], n.offsets());
    }

    #[test]
    fn test_normalize_combining_marks() {
        let raw = "e\u{0301}x";
        let n = normalizer(RuleSet::Nfkc, false, false, false).normalize(raw);

        assert_eq!("\u{e9}x", n.text());
        assert_eq!(&[0, 0, 3, 4], n.offsets());
    }

    #[test]
    fn test_normalize_halfwidth_voiced_marks() {
        let raw = "ｶﾞｲﾄﾞ";
        let n = normalizer(RuleSet::Nfkc, false, false, false).normalize(raw);

        assert_eq!("ガイド", n.text());
        assert_eq!(vec![0, 2, 3, 5], n.char_offsets(raw));
        assert_offset_invariants(raw, &n);
    }

    #[test]
    fn test_normalize_conjoining_jamo() {
        let raw = "\u{1100}\u{1161}\u{1102}";
        let n = normalizer(RuleSet::Nfkc, false, false, false).normalize(raw);

        assert_eq!("\u{ac00}\u{1102}", n.text());
        assert_eq!(vec![0, 2, 3], n.char_offsets(raw));
    }

    #[test]
    fn test_normalize_bytes() {
        let raw = "ＫＡＤＯＫＡＷＡABC".as_bytes();
        let n = Normalizer::default().normalize_bytes(raw);

        assert_eq!("▁KADOKAWAABC", n.text());
        assert_eq!(
            &[0, 0, 0, 0, 3, 6, 9, 12, 15, 18, 21, 24, 25, 26, 27],
            n.offsets()
        );
    }

    #[test]
    fn test_normalize_invalid_bytes() {
        let n = normalizer(RuleSet::Identity, false, false, false).normalize_bytes(b"a\xffb");

        assert_eq!("a\u{fffd}b", n.text());
        assert_eq!(&[0, 1, 1, 1, 2, 3], n.offsets());
    }

    #[test]
    fn test_rule_set_from_str() {
        assert_eq!(RuleSet::NfkcCf, "nfkc_cf".parse::<RuleSet>().unwrap());
        assert_eq!("nmt_nfkc", RuleSet::NmtNfkc.to_string());
        assert!("nfd".parse::<RuleSet>().is_err());
    }

    #[test]
    fn test_offset_invariants() {
        for raw in [
            "I saw a girl with a telescope.",
            " \t leading and trailing \n",
            "吾輩は猫である。Hello world. ABC 123",
            "\u{1f468}\u{200d}\u{1f469}",
        ] {
            let n = Normalizer::default().normalize(raw);
            assert_offset_invariants(raw, &n);
            let chars = n.char_offsets(raw);
            assert_eq!(n.text().chars().count() + 1, chars.len());
            assert_eq!(raw.chars().count(), *chars.last().unwrap());
        }
    }
}
