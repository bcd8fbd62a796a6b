// The binding engine (C9): attaches named element values to identifiers, with idmap indirection
// for fetches that miss a direct binding.

use crate::admin::Admin;
use crate::circulation;
use crate::error::{Error, Result};
use crate::keys;
use crate::minter;
use crate::queue;
use crate::store::Store;
use chrono::{DateTime, Utc};
use regex::Regex;

pub const MAX_BATCH: usize = 10_000;

/// The sentinel identifier that requests a fresh mint-then-bind.
pub const MINT_SENTINEL: &str = "new";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum How {
  Set,
  New,
  Replace,
  Append,
  Prepend,
  Delete,
  Mint,
}

impl How {
  pub fn parse(value: &str) -> Result<How> {
    match value {
      "set" => Ok(How::Set),
      "new" => Ok(How::New),
      "replace" => Ok(How::Replace),
      "append" | "add" => Ok(How::Append),
      "prepend" | "insert" => Ok(How::Prepend),
      "delete" | "purge" => Ok(How::Delete),
      "mint" => Ok(How::Mint),
      other => Err(Error::BadInput(format!("unrecognized bind operation {other:?}"))),
    }
  }
}

pub struct BindRequest {
  pub id: String,
  pub elem: String,
  pub value: String,
  pub how: How,
}

fn validate_syntax(admin: &Admin, id: &str) -> Result<()> {
  // A `:`-prefixed id (e.g. `:idmap/<elem>`) is an administrative pseudo-identifier, never minted
  // and never matched against the template.
  if !admin.genonly || id.starts_with(':') {
    return Ok(());
  }
  if !id.starts_with(&admin.firstpart) {
    return Err(Error::BadInput(format!("{id}: does not match template {}", admin.firstpart)));
  }
  if admin.addcheckchar {
    if let Some(repertoire) = admin.checkrepertoire {
      if !crate::codec::verify_check_char(id, repertoire) {
        return Err(Error::BadInput(format!("{id}: fails check character validation")));
      }
    }
  }
  Ok(())
}

/// The long-term circulation guard of C9: a `longterm` minter refuses to bind an id that has
/// neither a circulation record nor an active hold, unless the caller first reserves it with a
/// hold.
fn guard_longterm(store: &dyn Store, admin: &Admin, id: &str) -> Result<()> {
  if !admin.longterm || id.starts_with(':') {
    return Ok(());
  }
  let has_circulation = circulation::read(store, id)?.is_some();
  let has_hold = store.exists(&keys::hold_key(id))?;
  if !has_circulation && !has_hold {
    return Err(Error::LongtermUnissued(format!(
      "{id}: long-term identifier has not been issued and has no hold; bind refused"
    )));
  }
  Ok(())
}

/// Binds one `(id, elem, value)` under `how`, per the table in C9. `store`/`admin` are the already
/// session-locked handles; this function does no locking of its own.
pub fn bind_one(
  store: &mut dyn Store,
  admin: &Admin,
  contact: &str,
  request: &BindRequest,
  now: DateTime<Utc>,
) -> Result<()> {
  if request.elem.is_empty() {
    return Err(Error::BadInput("element name must be non-empty".to_string()));
  }

  if request.how == How::Mint {
    if request.id != MINT_SENTINEL {
      return Err(Error::BadInput(format!(
        "bind how=mint requires id == {MINT_SENTINEL:?}, got {:?}",
        request.id
      )));
    }
    let minted = minter::mint_one(store, admin, contact, now)?;
    let key = keys::elem_key(&minted, &request.elem);
    store.set(&key, request.value.as_bytes())?;
    return Ok(());
  }

  if request.id.is_empty() {
    return Err(Error::BadInput("identifier must be non-empty".to_string()));
  }
  validate_syntax(admin, &request.id)?;
  guard_longterm(store, admin, &request.id)?;

  let key = keys::elem_key(&request.id, &request.elem);
  let existing = store.get(&key)?;

  match request.how {
    How::Set => {
      store.set(&key, request.value.as_bytes())?;
    }
    How::New => {
      if existing.is_some() {
        return Err(Error::BadInput(format!("{}/{}: already bound", request.id, request.elem)));
      }
      store.set(&key, request.value.as_bytes())?;
    }
    How::Replace => {
      if existing.is_none() {
        return Err(Error::NotFound(format!("{}/{}: not bound", request.id, request.elem)));
      }
      store.set(&key, request.value.as_bytes())?;
    }
    How::Append => {
      let prior = existing.ok_or_else(|| Error::NotFound(format!("{}/{}: not bound", request.id, request.elem)))?;
      let mut combined = prior;
      combined.extend_from_slice(request.value.as_bytes());
      store.set(&key, &combined)?;
    }
    How::Prepend => {
      let prior = existing.ok_or_else(|| Error::NotFound(format!("{}/{}: not bound", request.id, request.elem)))?;
      let mut combined = request.value.as_bytes().to_vec();
      combined.extend_from_slice(&prior);
      store.set(&key, &combined)?;
    }
    How::Delete => {
      store.delete(&key)?;
    }
    How::Mint => unreachable!("handled above"),
  }
  Ok(())
}

/// `bindMultiple`: pre-validates every entry outside the lock (here: before any mutation), then
/// applies the remaining ones, returning per-entry results in input order (an `Err` stands in for
/// the "null" a rejected entry gets in the source).
pub fn bind_multiple(
  store: &mut dyn Store,
  admin: &Admin,
  contact: &str,
  requests: &[BindRequest],
  now: DateTime<Utc>,
) -> Result<Vec<Result<()>>> {
  if requests.len() > MAX_BATCH {
    return Err(Error::BadInput(format!(
      "bindMultiple accepts at most {MAX_BATCH} entries, got {}",
      requests.len()
    )));
  }
  Ok(requests.iter().map(|request| bind_one(store, admin, contact, request, now)).collect())
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchedElement {
  pub elem: String,
  pub value: String,
}

/// `idmap/<elem>` indirection: an identifier `:idmap/<elem>` bound to a pattern substitutes it for
/// any id lacking a direct binding for `elem`. One substitution step only -- the design note in §9
/// forbids iterating in case of a cycle.
fn idmap_pattern(store: &dyn Store, elem: &str) -> Result<Option<String>> {
  let idmap_id = format!(":idmap/{elem}");
  match store.get(&keys::elem_key(&idmap_id, elem))? {
    Some(bytes) => Ok(Some(String::from_utf8(bytes).map_err(|error| Error::Io(error.to_string()))?)),
    None => Ok(None),
  }
}

/// `s/<find>/<replace>/` over the identifier text; any other pattern is treated as a literal
/// replacement value with no substitution performed.
fn substitute(id: &str, pattern: &str) -> Result<String> {
  let mut parts = pattern.splitn(4, '/');
  match (parts.next(), parts.next(), parts.next(), parts.next()) {
    (Some("s"), Some(find), Some(replace), Some("")) => {
      let regex = Regex::new(find).map_err(|error| Error::BadInput(error.to_string()))?;
      let replacement = replace.replace("\\0", "$0");
      Ok(regex.replace(id, replacement.as_str()).into_owned())
    }
    _ => Ok(pattern.to_string()),
  }
}

/// Fetches `(id, elem)`. Falls back to idmap substitution when there is no direct binding.
pub fn fetch(store: &dyn Store, id: &str, elem: &str) -> Result<Option<String>> {
  if let Some(bytes) = store.get(&keys::elem_key(id, elem))? {
    return Ok(Some(String::from_utf8(bytes).map_err(|error| Error::Io(error.to_string()))?));
  }
  match idmap_pattern(store, elem)? {
    Some(pattern) => Ok(Some(substitute(id, &pattern)?)),
    None => Ok(None),
  }
}

/// Fetches every non-reserved element bound to `id` (no `elem` filter): a `<id>\t` prefix scan
/// excluding the `R/`-prefixed per-identifier sub-keys (circulation, hold, pepper).
pub fn fetch_all(store: &dyn Store, id: &str) -> Result<Vec<FetchedElement>> {
  let prefix = keys::id_prefix(id);
  let mut out = Vec::new();
  for (key, value) in store.range(&prefix, None)? {
    let elem_bytes = &key[prefix.len()..];
    if keys::is_reserved_elem(elem_bytes) {
      continue;
    }
    out.push(FetchedElement {
      elem: String::from_utf8_lossy(elem_bytes).to_string(),
      value: String::from_utf8_lossy(&value).to_string(),
    });
  }
  Ok(out)
}

/// A single-line circulation summary for the "labelled" fetch verbosity mode of C9.
pub fn circulation_summary(store: &dyn Store, id: &str) -> Result<String> {
  match circulation::read(store, id)? {
    Some(circulation) => Ok(format!(
      "id: {id} circulation: {} date: {} contact: {} counter: {}",
      circulation.svec, circulation.date, circulation.contact, circulation.counter
    )),
    None => Ok(format!("id: {id} circulation: (never minted)")),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::admin::GeneratorType;
  use crate::settings::{Backend, Settings};
  use crate::store;
  use chrono::TimeZone;

  fn test_admin(longterm: bool) -> Admin {
    Admin {
      template: crate::template::parse("tst4.rde").unwrap(),
      firstpart: "13030/tst4".to_string(),
      generator_type: GeneratorType::Random,
      generator_random: Some("lcg_drand48".to_string()),
      total: 290,
      oatop: 290,
      padwidth: 2,
      percounter: 290,
      longterm,
      wrap: false,
      addcheckchar: false,
      checkrepertoire: None,
      naan: "13030".to_string(),
      naa: String::new(),
      subnaa: String::new(),
      properties: String::new(),
      counter_count: 1,
      genonly: false,
    }
  }

  #[test]
  fn set_then_replace_then_append() {
    let directory = tempfile::tempdir().unwrap();
    let settings = Settings::new(directory.path(), "db", Backend::Sled);
    let mut store = store::open(&settings, store::Mode::Create).unwrap();
    let admin = test_admin(false);
    let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();

    let id = "13030/tst401";
    bind_one(
      store.as_mut(),
      &admin,
      "",
      &BindRequest { id: id.to_string(), elem: "color".to_string(), value: "red".to_string(), how: How::Set },
      now,
    )
    .unwrap();
    assert_eq!(Some("red".to_string()), fetch(store.as_ref(), id, "color").unwrap());

    bind_one(
      store.as_mut(),
      &admin,
      "",
      &BindRequest { id: id.to_string(), elem: "color".to_string(), value: "blue".to_string(), how: How::Replace },
      now,
    )
    .unwrap();
    assert_eq!(Some("blue".to_string()), fetch(store.as_ref(), id, "color").unwrap());

    bind_one(
      store.as_mut(),
      &admin,
      "",
      &BindRequest { id: id.to_string(), elem: "color".to_string(), value: "!".to_string(), how: How::Append },
      now,
    )
    .unwrap();
    assert_eq!(Some("blue!".to_string()), fetch(store.as_ref(), id, "color").unwrap());
  }

  #[test]
  fn new_fails_if_already_bound() {
    let directory = tempfile::tempdir().unwrap();
    let settings = Settings::new(directory.path(), "db", Backend::Sled);
    let mut store = store::open(&settings, store::Mode::Create).unwrap();
    let admin = test_admin(false);
    let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    let request = BindRequest {
      id: "13030/tst402".to_string(),
      elem: "color".to_string(),
      value: "red".to_string(),
      how: How::New,
    };
    bind_one(store.as_mut(), &admin, "", &request, now).unwrap();
    assert!(bind_one(store.as_mut(), &admin, "", &request, now).is_err());
  }

  #[test]
  fn longterm_refuses_bind_without_circulation_or_hold() {
    let directory = tempfile::tempdir().unwrap();
    let settings = Settings::new(directory.path(), "db", Backend::Sled);
    let mut store = store::open(&settings, store::Mode::Create).unwrap();
    let admin = test_admin(true);
    let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    let request = BindRequest {
      id: "13030/tst403".to_string(),
      elem: "color".to_string(),
      value: "red".to_string(),
      how: How::Set,
    };
    assert!(matches!(
      bind_one(store.as_mut(), &admin, "", &request, now),
      Err(Error::LongtermUnissued(_))
    ));

    queue::hold_set(store.as_mut(), &admin, "13030/tst403").unwrap();
    bind_one(store.as_mut(), &admin, "", &request, now).unwrap();
  }

  #[test]
  fn idmap_substitution_applies_when_no_direct_binding() {
    let directory = tempfile::tempdir().unwrap();
    let settings = Settings::new(directory.path(), "db", Backend::Sled);
    let mut store = store::open(&settings, store::Mode::Create).unwrap();
    store
      .set(&keys::elem_key(":idmap/target", "target"), b"s/^13030/ark:99999/")
      .unwrap();
    assert_eq!(
      Some("ark:99999/tst450".to_string()),
      fetch(store.as_ref(), "13030/tst450", "target").unwrap()
    );
  }
}
