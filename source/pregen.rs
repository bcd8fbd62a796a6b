// The pre-generation pool (C7): a FIFO of already-minted identifiers kept under `R/p/<index>` for
// latency-sensitive callers who want `mint` to be a pure pop rather than a generate-and-validate
// loop. `pregenerate` shares the minter's generation path (see `minter::generate_one`) but records
// circulation as `p` instead of `i`; the mint path's fast path then flips that leading byte to `i`
// when the slot is actually consumed.

use crate::circulation;
use crate::error::{Error, Result};
use crate::keys;
use crate::mutstate;
use crate::store::Store;

pub const MAX_BATCH: usize = 10_000;

/// The caller-supplied hook that produces one fresh, unheld, unqueued candidate id — this is
/// `minter::generate_one` in production and a stub in tests, kept generic here so C7 has no direct
/// dependency on C8 (the minter depends on C7, not the other way around).
pub type Generate<'a> = dyn FnMut(&mut dyn Store) -> Result<String> + 'a;

/// Generates up to `count` identifiers (capped at [`MAX_BATCH`]) and appends them to the pool tail,
/// recording each one's circulation as `p`. Returns the identifiers actually produced; generation
/// stops early (without error) if the underlying generator is exhausted.
pub fn pregenerate(store: &mut dyn Store, count: usize, mut generate: Box<Generate<'_>>, date: &str) -> Result<Vec<String>> {
  if count == 0 || count > MAX_BATCH {
    return Err(Error::BadInput(format!("pregenerate count must be in 1..={MAX_BATCH}, got {count}")));
  }
  let mut tail = mutstate::get_i64_or(store, "pregen_tail", 0)?;
  let mut produced = Vec::with_capacity(count);
  for _ in 0..count {
    let id = match generate(store) {
      Ok(id) => id,
      Err(Error::Exhausted) => break,
      Err(other) => return Err(other),
    };
    store.set(&keys::pregen_slot_key(tail as u64), id.as_bytes())?;
    circulation::prepend(store, &id, 'p', date, "", None)?;
    tail += 1;
    produced.push(id);
  }
  mutstate::set_i64(store, "pregen_tail", tail)?;
  mutstate::increment(store, "pregenerated", produced.len() as i64)?;
  Ok(produced)
}

/// Pops the head of the pool, if any, flipping its circulation SVEC leading byte from `p` to `i`.
pub fn pop(store: &mut dyn Store, date: &str, contact: &str, oacounter: i64) -> Result<Option<String>> {
  let head = mutstate::get_i64_or(store, "pregen_head", 0)?;
  let tail = mutstate::get_i64_or(store, "pregen_tail", 0)?;
  if head >= tail {
    return Ok(None);
  }
  let slot_key = keys::pregen_slot_key(head as u64);
  let id = match store.get(&slot_key)? {
    Some(bytes) => String::from_utf8(bytes).map_err(|error| Error::Io(error.to_string()))?,
    None => return Ok(None),
  };
  store.delete(&slot_key)?;
  mutstate::set_i64(store, "pregen_head", head + 1)?;
  mutstate::increment(store, "pregenerated", -1)?;
  circulation::prepend(store, &id, 'i', date, contact, Some(oacounter))?;
  Ok(Some(id))
}

pub fn count(store: &dyn Store) -> Result<i64> {
  mutstate::get_i64_or(store, "pregenerated", 0)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::settings::{Backend, Settings};
  use crate::store;

  #[test]
  fn pregenerate_then_pop_preserves_fifo_order() {
    let directory = tempfile::tempdir().unwrap();
    let settings = Settings::new(directory.path(), "db", Backend::Sled);
    let mut store = store::open(&settings, store::Mode::Create).unwrap();

    let mut next = 0u32;
    let generate: Box<Generate<'_>> = Box::new(move |_store| {
      next += 1;
      Ok(format!("id{next}"))
    });
    let produced = pregenerate(store.as_mut(), 5, generate, "20260101000000").unwrap();
    assert_eq!(5, produced.len());
    assert_eq!(5, count(store.as_ref()).unwrap());

    let mut popped = Vec::new();
    while let Some(id) = pop(store.as_mut(), "20260101000100", "", 1).unwrap() {
      popped.push(id);
    }
    assert_eq!(produced, popped);
    assert_eq!(0, count(store.as_ref()).unwrap());
  }

  #[test]
  fn rejects_batch_over_the_cap() {
    let directory = tempfile::tempdir().unwrap();
    let settings = Settings::new(directory.path(), "db", Backend::Sled);
    let mut store = store::open(&settings, store::Mode::Create).unwrap();
    let generate: Box<Generate<'_>> = Box::new(|_store| Ok("x".to_string()));
    assert!(pregenerate(store.as_mut(), MAX_BATCH + 1, generate, "20260101000000").is_err());
  }
}
