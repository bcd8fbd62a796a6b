// Read-through cache of the immutable admin keys written once at create time (C5). Hot-path reads
// (`mask`, `firstpart`, `longterm`, `wrap`, ...) all go through this struct instead of hitting the
// store directly. Mutable keys (`oacounter`, sub-counter values, `held`, `queued`) are deliberately
// absent here: they are read straight from storage by the modules that own them (queue, pregen,
// minter), never cached.

use crate::codec::Repertoire;
use crate::error::{Error, Result};
use crate::keys;
use crate::store::Store;
use crate::template::{self, Mask, Template};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GeneratorType {
  Sequential,
  Random,
}

impl GeneratorType {
  pub fn as_str(self) -> &'static str {
    match self {
      GeneratorType::Sequential => "sequential",
      GeneratorType::Random => "random",
    }
  }

  fn parse(value: &str) -> Result<Self> {
    match value {
      "sequential" => Ok(GeneratorType::Sequential),
      "random" => Ok(GeneratorType::Random),
      other => Err(Error::Config(format!("unrecognized generator_type {other:?}"))),
    }
  }
}

/// `term` as accepted by `create` (§4.11 step 1): `long` forbids re-issue, the others are weaker
/// durability classes that only gate input validation (a `long` minter additionally requires a
/// 5-digit NAAN).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Term {
  Long,
  Medium,
  Short,
  Unspecified,
}

impl Term {
  pub fn parse(value: &str) -> Result<Self> {
    match value {
      "long" => Ok(Term::Long),
      "medium" => Ok(Term::Medium),
      "short" => Ok(Term::Short),
      "-" => Ok(Term::Unspecified),
      other => Err(Error::BadInput(format!(
        "term must be one of long, medium, short, - (got {other:?})"
      ))),
    }
  }

  fn longterm(self) -> bool {
    self == Term::Long
  }
}

#[derive(Clone, Debug)]
pub struct Admin {
  pub template: Template,
  pub firstpart: String,
  pub generator_type: GeneratorType,
  pub generator_random: Option<String>,
  /// NOLIMIT (-1) for unbounded.
  pub total: i64,
  pub oatop: i64,
  pub padwidth: usize,
  pub percounter: u64,
  pub longterm: bool,
  pub wrap: bool,
  pub addcheckchar: bool,
  pub checkrepertoire: Option<Repertoire>,
  pub naan: String,
  pub naa: String,
  pub subnaa: String,
  pub properties: String,
  pub counter_count: usize,
  /// Whether bind/queue operations must validate an id's syntax (and check character) against the
  /// template before accepting it. Defaults to `true`, since every minter this library creates
  /// writes the key explicitly; the default only matters for a store created by a foreign writer.
  pub genonly: bool,
}

impl Admin {
  /// Reads every admin key listed in §3 back out of `store` and reassembles the cache, the way
  /// `Session::open` does once per session.
  pub fn load(store: &dyn Store) -> Result<Admin> {
    let template_string = read_string(store, "template")?;
    let template = template::parse(&template_string)?;
    let firstpart = read_string(store, "firstpart")?;
    let generator_type = GeneratorType::parse(&read_string(store, "generator_type")?)?;
    let generator_random = read_optional_string(store, "generator_random")?;
    let total = read_i64(store, "total")?;
    let oatop = read_i64(store, "oatop")?;
    let padwidth = read_i64(store, "padwidth")? as usize;
    let percounter = read_i64(store, "percounter")?.max(0) as u64;
    let longterm = read_bool(store, "longterm")?;
    let wrap = read_bool(store, "wrap")?;
    let addcheckchar = read_bool(store, "addcheckchar")?;
    let checkrepertoire = match read_optional_string(store, "checkrepertoire")? {
      Some(letter) => Some(
        letter
          .chars()
          .next()
          .and_then(Repertoire::from_letter)
          .ok_or_else(|| Error::Config(format!("unrecognized checkrepertoire {letter:?}")))?,
      ),
      None => None,
    };
    let naan = read_string(store, "naan")?;
    let naa = read_string(store, "naa")?;
    let subnaa = read_string(store, "subnaa")?;
    let properties = read_string(store, "properties")?;
    let saclist = read_string(store, "saclist")?;
    let siclist = read_string(store, "siclist")?;
    let counter_count = saclist.split_whitespace().count() + siclist.split_whitespace().count();
    let genonly = match read_optional_string(store, "genonly")? {
      Some(value) => value == "true",
      None => true,
    };

    Ok(Admin {
      template,
      firstpart,
      generator_type,
      generator_random,
      total,
      oatop,
      padwidth,
      percounter,
      longterm,
      wrap,
      addcheckchar,
      checkrepertoire,
      naan,
      naa,
      subnaa,
      properties,
      counter_count,
      genonly,
    })
  }

  pub fn mask(&self) -> Option<&Mask> {
    self.template.mask.as_ref()
  }
}

fn read_string(store: &dyn Store, name: &str) -> Result<String> {
  read_optional_string(store, name)?.ok_or_else(|| Error::Config(format!("missing admin key R/{name}")))
}

fn read_optional_string(store: &dyn Store, name: &str) -> Result<Option<String>> {
  match store.get(&keys::admin_key(name))? {
    Some(bytes) => Ok(Some(
      String::from_utf8(bytes).map_err(|error| Error::Config(error.to_string()))?,
    )),
    None => Ok(None),
  }
}

fn read_i64(store: &dyn Store, name: &str) -> Result<i64> {
  let text = read_string(store, name)?;
  text
    .parse()
    .map_err(|_| Error::Config(format!("admin key R/{name} is not an integer: {text:?}")))
}

fn read_bool(store: &dyn Store, name: &str) -> Result<bool> {
  Ok(read_string(store, name)? == "true")
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::settings::{Backend, Settings};
  use crate::store;

  #[test]
  fn round_trips_through_a_store() {
    let directory = tempfile::tempdir().unwrap();
    let settings = Settings::new(directory.path(), "db", Backend::Sled);
    let mut created = store::open(&settings, store::Mode::Create).unwrap();
    for (key, value) in [
      ("template", "tst3.rde"),
      ("firstpart", "13030/tst3"),
      ("generator_type", "random"),
      ("generator_random", "lcg_drand48"),
      ("total", "290"),
      ("oatop", "290"),
      ("padwidth", "2"),
      ("percounter", "290"),
      ("longterm", "true"),
      ("wrap", "false"),
      ("addcheckchar", "false"),
      ("naan", "13030"),
      ("naa", "test"),
      ("subnaa", ""),
      ("properties", "GRANTE"),
      ("saclist", "c0 "),
      ("siclist", ""),
    ] {
      created.set(&keys::admin_key(key), value.as_bytes()).unwrap();
    }
    created.close().unwrap();

    let reopened = store::open(&settings, store::Mode::ReadWrite).unwrap();
    let admin = Admin::load(reopened.as_ref()).unwrap();
    assert_eq!("13030/tst3", admin.firstpart);
    assert_eq!(GeneratorType::Random, admin.generator_type);
    assert_eq!(290, admin.total);
    assert!(admin.longterm);
    assert!(!admin.wrap);
    assert_eq!(1, admin.counter_count);
  }
}
