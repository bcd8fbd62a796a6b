// The single authoritative mint algorithm (C8): fast path (pregen pool) -> queue path -> generator
// path (sequential counter or LCG-seeded random sub-counter draw), under the caller's session lock.

use crate::admin::{Admin, GeneratorType};
use crate::circulation;
use crate::codec::{self, Repertoire};
use crate::error::{Error, Result};
use crate::keys;
use crate::lcg::Lcg;
use crate::mutstate;
use crate::pregen;
use crate::queue;
use crate::store::Store;
use crate::template::NOLIMIT;
use chrono::{DateTime, Utc};
use log::{error, warn};

pub const MAX_BATCH: usize = 10_000;
const QDATE_FORMAT: &str = "%Y%m%d%H%M%S";

/// Mints a single identifier, trying the pool, then the queue, then the generator, in that order.
pub fn mint_one(store: &mut dyn Store, admin: &Admin, contact: &str, now: DateTime<Utc>) -> Result<String> {
  let date = now.format(QDATE_FORMAT).to_string();

  if pregen::count(store)? > 0 {
    let oacounter = mutstate::get_i64_or(store, "oacounter", 0)?;
    if let Some(id) = pregen::pop(store, &date, contact, oacounter)? {
      return Ok(id);
    }
  }

  if mutstate::get_i64_or(store, "queued", 0)? > 0 {
    if let Some(popped) = queue::pop_ripe(store, now)? {
      circulation::prepend(store, &popped.id, 'i', &date, contact, None)?;
      purge_bindings(store, &popped.id)?;
      if admin.longterm {
        queue::hold_set(store, admin, &popped.id)?;
      }
      return Ok(popped.id);
    }
  }

  generate(store, admin, contact, &date)
}

/// `mintMultiple`: one setup, then a loop over the single-mint path; stops early (without error) on
/// exhaustion and returns whatever was minted so far.
pub fn mint_multiple(
  store: &mut dyn Store,
  admin: &Admin,
  contact: &str,
  count: usize,
  now: DateTime<Utc>,
) -> Result<Vec<String>> {
  if count == 0 || count > MAX_BATCH {
    return Err(Error::BadInput(format!("mint count must be in 1..={MAX_BATCH}, got {count}")));
  }
  let mut minted = Vec::with_capacity(count);
  for _ in 0..count {
    match mint_one(store, admin, contact, now) {
      Ok(id) => minted.push(id),
      Err(Error::Exhausted) => break,
      Err(other) => return Err(other),
    }
  }
  Ok(minted)
}

/// The generator path: produces and commits a fresh candidate, retrying past held/queued/issued
/// collisions. Each iteration advances `oacounter` (directly for sequential, via a sub-counter draw
/// for random), so the loop is bounded by the identifier space itself.
fn generate(store: &mut dyn Store, admin: &Admin, contact: &str, date: &str) -> Result<String> {
  loop {
    let oacounter = next_candidate_setup(store, admin)?;
    let n = match oacounter {
      Setup::Exhausted => return Err(Error::Exhausted),
      Setup::Counter(oacounter) => draw(store, admin, oacounter)?,
    };

    let candidate = encode_id(admin, n)?;

    if store.exists(&keys::hold_key(&candidate))? {
      continue;
    }
    if let Some(circulation) = circulation::read(store, &candidate)? {
      match circulation.current() {
        Some('q') => continue,
        Some('i') if admin.longterm || !admin.wrap => {
          error!("minter: {candidate} already issued, skipping");
          continue;
        }
        Some('u') => {
          warn!("minter: {candidate} was unqueued, skipping");
          continue;
        }
        _ => {}
      }
    }

    let committed_counter = mutstate::get_i64_or(store, "oacounter", 0)? - 1;
    circulation::prepend(store, &candidate, 'i', date, contact, Some(committed_counter))?;
    purge_bindings(store, &candidate)?;
    if admin.longterm {
      queue::hold_set(store, admin, &candidate)?;
    }
    return Ok(candidate);
  }
}

/// Generates one candidate without any per-id commit, for `pregen::pregenerate` to call; the pool
/// records circulation as `p` itself, so this only needs to hand back a syntactically valid,
/// currently-unheld, currently-unissued id.
pub fn generate_for_pregen(store: &mut dyn Store, admin: &Admin) -> Result<String> {
  loop {
    let setup = next_candidate_setup(store, admin)?;
    let n = match setup {
      Setup::Exhausted => return Err(Error::Exhausted),
      Setup::Counter(oacounter) => draw(store, admin, oacounter)?,
    };
    let candidate = encode_id(admin, n)?;
    if store.exists(&keys::hold_key(&candidate))? {
      continue;
    }
    if circulation::read(store, &candidate)?.is_some() {
      continue;
    }
    return Ok(candidate);
  }
}

enum Setup {
  Counter(i64),
  Exhausted,
}

/// Reads `oacounter`, handling the exhaustion/wrap check of C8 step 3a. Returns the pre-increment
/// counter value to seed this draw, or `Setup::Exhausted` when the space is permanently spent.
fn next_candidate_setup(store: &mut dyn Store, admin: &Admin) -> Result<Setup> {
  loop {
    let oacounter = mutstate::get_i64_or(store, "oacounter", 0)?;
    if oacounter != admin.oatop || admin.oatop == NOLIMIT {
      return Ok(Setup::Counter(oacounter));
    }
    if admin.longterm || !admin.wrap {
      return Ok(Setup::Exhausted);
    }
    warn!("minter: counter space exhausted, wrapping per R/wrap");
    reset_for_wrap(store, admin)?;
  }
}

/// Advances `oacounter` by one and returns the magnitude to encode: the counter itself for
/// sequential minters, or `subcounter_value + index * percounter` for random ones.
fn draw(store: &mut dyn Store, admin: &Admin, oacounter: i64) -> Result<u128> {
  mutstate::set_i64(store, "oacounter", oacounter + 1)?;
  match admin.generator_type {
    GeneratorType::Sequential => Ok(oacounter as u128),
    GeneratorType::Random => draw_random(store, admin, oacounter),
  }
}

fn draw_random(store: &mut dyn Store, admin: &Admin, oacounter: i64) -> Result<u128> {
  let mut saclist = read_list(store, "saclist")?;
  if saclist.is_empty() {
    return Err(Error::Exhausted);
  }
  let mut lcg = Lcg::new(oacounter as u32);
  let k = lcg.int_rand(saclist.len() as u32) as usize;
  let name = saclist[k].clone();
  let index = subcounter_index(&name)?;

  let value = mutstate::get_i64_or(store, &format!("c{index}/value"), 0)?;
  let top = mutstate::get_i64_or(store, &format!("c{index}/top"), 0)?;
  let next_value = value + 1;
  mutstate::set_i64(store, &format!("c{index}/value"), next_value)?;

  if next_value == top {
    saclist.remove(k);
    let mut siclist = read_list(store, "siclist")?;
    siclist.push(name);
    write_list(store, "saclist", &saclist)?;
    write_list(store, "siclist", &siclist)?;
  }

  Ok(value as u128 + index as u128 * admin.percounter as u128)
}

fn reset_for_wrap(store: &mut dyn Store, admin: &Admin) -> Result<()> {
  mutstate::set_i64(store, "oacounter", 0)?;
  if admin.generator_type == GeneratorType::Random {
    let mut all = Vec::with_capacity(admin.counter_count);
    for index in 0..admin.counter_count {
      mutstate::set_i64(store, &format!("c{index}/value"), 0)?;
      all.push(format!("c{index}"));
    }
    write_list(store, "saclist", &all)?;
    write_list(store, "siclist", &[])?;
  }
  Ok(())
}

fn subcounter_index(name: &str) -> Result<usize> {
  name
    .strip_prefix('c')
    .and_then(|rest| rest.parse().ok())
    .ok_or_else(|| Error::Io(format!("malformed sub-counter name {name:?}")))
}

fn read_list(store: &dyn Store, name: &str) -> Result<Vec<String>> {
  Ok(
    mutstate::get_string_or(store, name, "")?
      .split_whitespace()
      .map(str::to_string)
      .collect(),
  )
}

fn write_list(store: &mut dyn Store, name: &str, list: &[String]) -> Result<()> {
  let joined = if list.is_empty() {
    String::new()
  } else {
    format!("{} ", list.join(" "))
  };
  mutstate::set_string(store, name, &joined)
}

fn encode_id(admin: &Admin, n: u128) -> Result<String> {
  let mask = admin
    .mask()
    .ok_or_else(|| Error::BadInput("this minter has no mask and cannot generate ids".to_string()))?;
  let body = mask.encode(n);
  let candidate = format!("{}{body}", admin.firstpart);
  if admin.addcheckchar {
    let repertoire = admin
      .checkrepertoire
      .or_else(|| mask.check_repertoire())
      .unwrap_or(Repertoire::Digit);
    Ok(codec::with_check_char(&candidate, repertoire))
  } else {
    Ok(candidate)
  }
}

/// "purge any residual non-admin bindings on the id": a wrapping minter can reissue an id that
/// previously carried user bindings from its earlier life; those must not leak into the new one.
fn purge_bindings(store: &mut dyn Store, id: &str) -> Result<()> {
  let prefix = keys::id_prefix(id);
  let stale: Vec<Vec<u8>> = store
    .range(&prefix, None)?
    .into_iter()
    .filter(|(key, _)| !keys::is_reserved_elem(&key[prefix.len()..]))
    .map(|(key, _)| key)
    .collect();
  for key in stale {
    store.delete(&key)?;
  }
  Ok(())
}
