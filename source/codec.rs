// The nine named repertoires of https://www.ietf.org/archive/id/draft-kunze-noid (the mask
// language) plus the check-character algorithm. Pure functions only: no I/O, no logging, exercised
// directly by the unit tests below.

use once_cell::sync::Lazy;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Repertoire {
  /// `d`: digits only.
  Digit,
  /// `e`: digits plus consonants, excluding vowels and `l` (the historical NOID default).
  ExtendedLower,
  /// `i`: digits plus `x` (used for the final, identity-distinguishing character of a mask).
  NumericX,
  /// `x`: hex digits plus underscore.
  HexUnderscore,
  /// `v`: lowercase alphanumeric plus underscore.
  AlnumLowerUnderscore,
  /// `E`: digits (no 0) plus mixed-case consonants, excluding vowels and `l`/`L`.
  ExtendedMixed,
  /// `w`: full alphanumeric plus a handful of punctuation marks.
  AlnumPunct,
  /// `c`: printable ASCII, excluding `% - . / \` (and space).
  Printable,
  /// `l`: full alphanumeric, excluding lowercase `l`.
  AlnumNoL,
}

const DIGIT: &[u8] = b"0123456789";
const EXTENDED_LOWER: &[u8] = b"0123456789bcdfghjkmnpqrstvwxz";
const NUMERIC_X: &[u8] = b"0123456789x";
const HEX_UNDERSCORE: &[u8] = b"0123456789abcdef_";
const ALNUM_LOWER_UNDERSCORE: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz_";
const EXTENDED_MIXED: &[u8] = b"123456789bcdfghjkmnpqrstvwxzBCDFGHJKMNPQRSTVWXZ";
const ALNUM_PUNCT: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ#*+@_";
const ALNUM_NO_L: &[u8] = b"0123456789abcdefghijkmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

// Printable ASCII ('!'..='~') minus the five punctuation marks that NOID templates reserve for
// separators/escaping ('%', '-', '.', '/', '\'), in ascending code-point order. Computed once so
// the 89-character cardinality falls out of the definition rather than being hand-copied (and
// risking a typo in an 89-character literal).
static PRINTABLE: Lazy<Vec<u8>> = Lazy::new(|| {
  (0x21u8..=0x7e)
    .filter(|byte| !matches!(byte, b'%' | b'-' | b'.' | b'/' | b'\\'))
    .collect()
});

impl Repertoire {
  /// The mask-language letter that selects this repertoire.
  pub fn letter(self) -> char {
    match self {
      Repertoire::Digit => 'd',
      Repertoire::ExtendedLower => 'e',
      Repertoire::NumericX => 'i',
      Repertoire::HexUnderscore => 'x',
      Repertoire::AlnumLowerUnderscore => 'v',
      Repertoire::ExtendedMixed => 'E',
      Repertoire::AlnumPunct => 'w',
      Repertoire::Printable => 'c',
      Repertoire::AlnumNoL => 'l',
    }
  }

  pub fn from_letter(letter: char) -> Option<Repertoire> {
    match letter {
      'd' => Some(Repertoire::Digit),
      'e' => Some(Repertoire::ExtendedLower),
      'i' => Some(Repertoire::NumericX),
      'x' => Some(Repertoire::HexUnderscore),
      'v' => Some(Repertoire::AlnumLowerUnderscore),
      'E' => Some(Repertoire::ExtendedMixed),
      'w' => Some(Repertoire::AlnumPunct),
      'c' => Some(Repertoire::Printable),
      'l' => Some(Repertoire::AlnumNoL),
      _ => None,
    }
  }

  pub fn alphabet(self) -> &'static [u8] {
    match self {
      Repertoire::Digit => DIGIT,
      Repertoire::ExtendedLower => EXTENDED_LOWER,
      Repertoire::NumericX => NUMERIC_X,
      Repertoire::HexUnderscore => HEX_UNDERSCORE,
      Repertoire::AlnumLowerUnderscore => ALNUM_LOWER_UNDERSCORE,
      Repertoire::ExtendedMixed => EXTENDED_MIXED,
      Repertoire::AlnumPunct => ALNUM_PUNCT,
      Repertoire::Printable => PRINTABLE.as_slice(),
      Repertoire::AlnumNoL => ALNUM_NO_L,
    }
  }

  pub fn cardinality(self) -> u64 {
    self.alphabet().len() as u64
  }

  /// The auto-detect rule of C1: the smallest repertoire whose alphabet is a superset of every
  /// letter used in `letters`, with the `d`+`e` pair special-cased to stay on `e` for historical
  /// compatibility.
  pub fn detect(letters: &[Repertoire]) -> Option<Repertoire> {
    if letters
      .iter()
      .all(|letter| matches!(letter, Repertoire::Digit | Repertoire::ExtendedLower))
      && letters.contains(&Repertoire::ExtendedLower)
    {
      return Some(Repertoire::ExtendedLower);
    }
    let mut used = std::collections::BTreeSet::new();
    for letter in letters {
      used.extend(letter.alphabet().iter().copied());
    }
    let mut candidates: Vec<Repertoire> = ALL
      .iter()
      .copied()
      .filter(|candidate| {
        let alphabet: std::collections::BTreeSet<u8> =
          candidate.alphabet().iter().copied().collect();
        used.iter().all(|byte| alphabet.contains(byte))
      })
      .collect();
    candidates.sort_by_key(|candidate| candidate.cardinality());
    candidates.into_iter().next()
  }
}

const ALL: [Repertoire; 9] = [
  Repertoire::Digit,
  Repertoire::ExtendedLower,
  Repertoire::NumericX,
  Repertoire::HexUnderscore,
  Repertoire::AlnumLowerUnderscore,
  Repertoire::ExtendedMixed,
  Repertoire::AlnumPunct,
  Repertoire::Printable,
  Repertoire::AlnumNoL,
];

/// Encodes `n` right-to-left over `repertoires`, one character of output per repertoire, most
/// significant position last in the slice. `unbounded` mirrors the mask's `z` mode: once every
/// fixed position has consumed a digit, any remaining magnitude of `n` keeps producing extra
/// high-order characters using `repertoires[0]`'s alphabet instead of being truncated.
pub fn n2xdig(mut n: u128, repertoires: &[Repertoire], unbounded: bool) -> String {
  let mut out = Vec::with_capacity(repertoires.len() + 1);
  for repertoire in repertoires.iter().rev() {
    let base = repertoire.cardinality() as u128;
    out.push(repertoire.alphabet()[(n % base) as usize]);
    n /= base;
  }
  if unbounded {
    if let Some(leading) = repertoires.first() {
      let base = leading.cardinality() as u128;
      while n > 0 {
        out.push(leading.alphabet()[(n % base) as usize]);
        n /= base;
      }
    }
  }
  out.reverse();
  String::from_utf8(out).expect("alphabets are ASCII")
}

/// `Σᵢ cᵢ · (i+1) mod |repertoire|`, over every character of `id` (a trailing `+` sentinel, if
/// present, is excluded). Characters absent from `repertoire` contribute zero rather than erroring,
/// per C1.
pub fn check_char(id: &str, repertoire: Repertoire) -> u8 {
  let alphabet = repertoire.alphabet();
  let modulus = alphabet.len() as u64;
  let body = id.strip_suffix('+').unwrap_or(id);
  let mut sum: u64 = 0;
  for (index, byte) in body.bytes().enumerate() {
    let position = alphabet.iter().position(|candidate| *candidate == byte);
    let digit = position.unwrap_or(0) as u64;
    sum += digit * (index as u64 + 1);
  }
  alphabet[(sum % modulus) as usize]
}

/// Appends (or, if `id` ends in the `+` sentinel left by `n2xdig`, replaces) the check character.
pub fn with_check_char(id: &str, repertoire: Repertoire) -> String {
  let check = check_char(id, repertoire);
  let body = id.strip_suffix('+').unwrap_or(id);
  let mut with_check = body.to_string();
  with_check.push(check as char);
  with_check
}

/// Recomputes the check character over everything but the last byte of `id` and compares.
pub fn verify_check_char(id: &str, repertoire: Repertoire) -> bool {
  match id.as_bytes().split_last() {
    Some((last, body)) => check_char(std::str::from_utf8(body).unwrap_or(""), repertoire) == *last,
    None => false,
  }
}
