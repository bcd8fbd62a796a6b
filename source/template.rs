// https://metacpan.org/dist/Noid/view/noid#NOID-TEMPLATES - the prefix.mask template grammar
//
// prefix ::= [A-Za-z0-9]*
// mask   ::= [rsz] [deixvEwcl]+ k?

use crate::codec::Repertoire;
use crate::error::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
  Random,
  Sequential,
  SequentialUnbounded,
}

/// The sentinel capacity of an unbounded (`z`-mode) mask, NOLIMIT in the source vocabulary.
pub const NOLIMIT: i64 = -1;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mask {
  pub mode: Mode,
  pub repertoires: Vec<Repertoire>,
  pub check: bool,
}

impl Mask {
  /// Product of repertoire cardinalities over the fixed part of the mask; `None` for `z`-mode
  /// (NOLIMIT).
  pub fn capacity(&self) -> Option<u64> {
    if self.mode == Mode::SequentialUnbounded {
      return None;
    }
    self
      .repertoires
      .iter()
      .try_fold(1u64, |accumulator, repertoire| {
        accumulator.checked_mul(repertoire.cardinality())
      })
  }

  /// The repertoire-auto-detect rule of C1, applied to this mask's repertoire sequence.
  pub fn check_repertoire(&self) -> Option<Repertoire> {
    Repertoire::detect(&self.repertoires)
  }

  pub fn encode(&self, n: u128) -> String {
    let body = crate::codec::n2xdig(
      n,
      &self.repertoires,
      self.mode == Mode::SequentialUnbounded,
    );
    if self.check {
      format!("{body}+")
    } else {
      body
    }
  }

  pub fn to_mask_string(&self) -> String {
    let mode = match self.mode {
      Mode::Random => 'r',
      Mode::Sequential => 's',
      Mode::SequentialUnbounded => 'z',
    };
    let mut out = String::new();
    out.push(mode);
    for repertoire in &self.repertoires {
      out.push(repertoire.letter());
    }
    if self.check {
      out.push('k');
    }
    out
  }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Template {
  pub prefix: String,
  pub mask: Option<Mask>,
}

impl Template {
  /// `firstpart = naan + "/" + prefix`, except that an empty `naan` drops the slash: a bind-only
  /// or short-term minter without a naming authority just uses the bare prefix.
  pub fn firstpart(&self, naan: &str) -> String {
    if naan.is_empty() {
      self.prefix.clone()
    } else {
      format!("{naan}/{}", self.prefix)
    }
  }

  pub fn to_template_string(&self) -> String {
    match &self.mask {
      Some(mask) => format!("{}.{}", self.prefix, mask.to_mask_string()),
      None => self.prefix.clone(),
    }
  }
}

peg::parser! {
  grammar grammar_() for str {
    rule prefix() -> &'input str
      = $(['A'..='Z' | 'a'..='z' | '0'..='9']*)

    rule mode() -> Mode
      = "r" { Mode::Random }
      / "s" { Mode::Sequential }
      / "z" { Mode::SequentialUnbounded }

    rule repertoire() -> Repertoire
      = letter:['d' | 'e' | 'i' | 'x' | 'v' | 'E' | 'w' | 'c' | 'l']
        { Repertoire::from_letter(letter).expect("letter class matches Repertoire::from_letter") }

    rule check() -> bool
      = "k" { true }

    rule mask() -> Mask
      = mode:mode() repertoires:repertoire()+ check:check()?
        { Mask { mode, repertoires, check: check.unwrap_or(false) } }

    pub rule template() -> (String, Option<Mask>)
      = prefix:prefix() "." mask:mask() { (prefix.to_string(), Some(mask)) }
      / prefix:prefix() { (prefix.to_string(), None) }
  }
}

/// Parses a `prefix.mask` template string. An empty mask (no `.mask` suffix at all) yields a
/// bind-only minter per C11 step 2.
pub fn parse(template: &str) -> Result<Template> {
  let (prefix, mask) =
    grammar_::template(template).map_err(|error| Error::BadTemplate(format!("{template:?}: {error}")))?;
  Ok(Template { prefix, mask })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_random_two_position() {
    let template = parse("tst3.rde").unwrap();
    assert_eq!("tst3", template.prefix);
    let mask = template.mask.unwrap();
    assert_eq!(Mode::Random, mask.mode);
    assert_eq!(
      vec![Repertoire::Digit, Repertoire::ExtendedLower],
      mask.repertoires
    );
    assert!(!mask.check);
    assert_eq!(Some(290), mask.capacity());
  }

  #[test]
  fn parses_empty_prefix() {
    let template = parse(".sdd").unwrap();
    assert_eq!("", template.prefix);
    let mask = template.mask.unwrap();
    assert_eq!(Mode::Sequential, mask.mode);
    assert_eq!(Some(100), mask.capacity());
  }

  #[test]
  fn parses_check_char_suffix() {
    let template = parse("fk.redek").unwrap();
    let mask = template.mask.unwrap();
    assert!(mask.check);
    assert_eq!(
      vec![
        Repertoire::ExtendedLower,
        Repertoire::Digit,
        Repertoire::ExtendedLower
      ],
      mask.repertoires
    );
  }

  #[test]
  fn unbounded_mask_has_no_limit() {
    let template = parse("ark.zd").unwrap();
    assert_eq!(None, template.mask.unwrap().capacity());
  }

  #[test]
  fn rejects_bad_mode() {
    assert!(parse("tst.qde").is_err());
  }

  #[test]
  fn formats_back_to_the_same_template() {
    for text in ["tst3.rde", ".sdd", "fk.redek", "ark.zd"] {
      let template = parse(text).unwrap();
      assert_eq!(text, template.to_template_string());
    }
  }
}
