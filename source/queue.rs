// The FIFO recyclable-identifier queue (C6). Entries sort under `R/q/<qdate>/<seqnum>/<paddedid>`;
// the reserved all-zero-date lane (`first`/`lvf` modes) always sorts ahead of any real-time lane, so
// a plain prefix scan from `R/q/` always inspects the reserved lane first.

use crate::admin::Admin;
use crate::circulation;
use crate::error::{Error, Result};
use crate::keys;
use crate::mutstate;
use crate::store::Store;
use chrono::{DateTime, Duration, Utc};
use log::{error, warn};

pub const RESERVED_QDATE: &str = "00000000000000";
const QDATE_FORMAT: &str = "%Y%m%d%H%M%S";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QueueMode {
  Now,
  After(i64, TimeUnit),
  First,
  Lvf,
  Delete,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimeUnit {
  Seconds,
  Days,
}

/// `now`, `<N>s`, `<N>d`, `first`, `lvf`, `delete`, per C6.
pub fn parse_mode(mode: &str) -> Result<QueueMode> {
  match mode {
    "now" => Ok(QueueMode::Now),
    "first" => Ok(QueueMode::First),
    "lvf" => Ok(QueueMode::Lvf),
    "delete" => Ok(QueueMode::Delete),
    other => {
      let (digits, unit) = other.split_at(other.len().saturating_sub(1));
      let unit = match unit {
        "s" => TimeUnit::Seconds,
        "d" => TimeUnit::Days,
        _ => return Err(Error::BadInput(format!("unrecognized queue mode {other:?}"))),
      };
      let n: i64 = digits
        .parse()
        .map_err(|_| Error::BadInput(format!("unrecognized queue mode {other:?}")))?;
      Ok(QueueMode::After(n, unit))
    }
  }
}

fn qdate_for(mode: &QueueMode, now: DateTime<Utc>) -> String {
  match mode {
    QueueMode::Now => now.format(QDATE_FORMAT).to_string(),
    QueueMode::After(n, TimeUnit::Seconds) => (now + Duration::seconds(*n)).format(QDATE_FORMAT).to_string(),
    QueueMode::After(n, TimeUnit::Days) => (now + Duration::days(*n)).format(QDATE_FORMAT).to_string(),
    QueueMode::First | QueueMode::Lvf => RESERVED_QDATE.to_string(),
    QueueMode::Delete => RESERVED_QDATE.to_string(),
  }
}

/// `fseqnum`, advanced on every `first` enqueue; `gseqnum`, reset to 1 whenever the computed
/// `qdate` differs from the stored `gseqnum_date`.
fn next_seqnum(store: &mut dyn Store, mode: &QueueMode, qdate: &str) -> Result<u32> {
  match mode {
    QueueMode::First => {
      let current = mutstate::get_i64_or(store, "fseqnum", 1)?;
      mutstate::set_i64(store, "fseqnum", current + 1)?;
      Ok(current as u32)
    }
    QueueMode::Lvf => Ok(0),
    _ => {
      let stored_date = mutstate::get_string_or(store, "gseqnum_date", "")?;
      let current = if stored_date == qdate {
        mutstate::get_i64_or(store, "gseqnum", 1)?
      } else {
        mutstate::set_string(store, "gseqnum_date", qdate)?;
        1
      };
      mutstate::set_i64(store, "gseqnum", current + 1)?;
      Ok(current as u32)
    }
  }
}

fn padded_id(store: &dyn Store, admin: &Admin, id: &str) -> Result<String> {
  let counter = match circulation::read(store, id)? {
    Some(circulation) => circulation.counter,
    None => 0,
  };
  Ok(format!("{counter:0width$}", width = admin.padwidth))
}

fn validate_syntax(admin: &Admin, id: &str) -> Result<()> {
  if !admin.genonly {
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

/// Enqueues every id in `ids` under `mode`, returning the per-id outcome in input order so a
/// caller (e.g. the CLI) can report partial failures without aborting the whole batch.
pub fn enqueue(
  store: &mut dyn Store,
  admin: &Admin,
  mode: &QueueMode,
  ids: &[String],
  now: DateTime<Utc>,
) -> Result<Vec<Result<()>>> {
  let qdate = qdate_for(mode, now);
  let mut results = Vec::with_capacity(ids.len());
  for id in ids {
    results.push(enqueue_one(store, admin, mode, id, &qdate, now));
  }
  Ok(results)
}

fn enqueue_one(
  store: &mut dyn Store,
  admin: &Admin,
  mode: &QueueMode,
  id: &str,
  qdate: &str,
  now: DateTime<Utc>,
) -> Result<()> {
  if *mode == QueueMode::Delete {
    return dequeue(store, id);
  }

  validate_syntax(admin, id)?;
  if store.exists(&keys::hold_key(id))? {
    return Err(Error::CirculationConflict(format!(
      "a hold has been set for {id} and must be released before the identifier can be queued"
    )));
  }

  let seqnum = next_seqnum(store, mode, qdate)?;
  let padded = padded_id(store, admin, id)?;
  let key = keys::queue_key(qdate, seqnum, &padded);
  store.set(&key, id.as_bytes())?;
  mutstate::increment(store, "queued", 1)?;
  circulation::prepend(store, id, 'q', &now.format(QDATE_FORMAT).to_string(), "", None)?;
  Ok(())
}

fn dequeue(store: &mut dyn Store, id: &str) -> Result<()> {
  let entries = store.range(keys::QUEUE_PREFIX, None)?;
  let hit = entries.into_iter().find(|(_, value)| value == id.as_bytes());
  match hit {
    Some((key, _)) => {
      store.delete(&key)?;
      mutstate::increment(store, "queued", -1)?;
      circulation::prepend(store, id, 'u', "", "", None)?;
      Ok(())
    }
    None => Err(Error::NotFound(format!("{id} is not in the queue"))),
  }
}

/// The entry popped at mint time, already past all circulation guards.
pub struct Popped {
  pub id: String,
  pub key: Vec<u8>,
}

/// Scans the head of the queue and returns the first ripe, valid entry, applying the guard table
/// of C6 and silently skipping (while logging) anything that fails it. Returns `None` if the queue
/// is empty or its head is not yet ripe (the reserved lane is always ripe; a real-time lane is ripe
/// once `now >= qdate`).
pub fn pop_ripe(store: &mut dyn Store, now: DateTime<Utc>) -> Result<Option<Popped>> {
  loop {
    let head = store.range(keys::QUEUE_PREFIX, Some(1))?;
    let (key, value) = match head.into_iter().next() {
      Some(entry) => entry,
      None => return Ok(None),
    };
    let id = String::from_utf8(value).map_err(|error| Error::Io(error.to_string()))?;

    let key_text = String::from_utf8_lossy(&key).to_string();
    let qdate = key_text
      .strip_prefix(std::str::from_utf8(keys::QUEUE_PREFIX).unwrap())
      .and_then(|rest| rest.split('/').next())
      .unwrap_or(RESERVED_QDATE);
    if qdate != RESERVED_QDATE {
      let ripe = DateTime::parse_from_str(&format!("{qdate}+0000"), "%Y%m%d%H%M%S%z")
        .map(|parsed| parsed.with_timezone(&Utc) <= now)
        .unwrap_or(true);
      if !ripe {
        return Ok(None);
      }
    }

    store.delete(&key)?;
    mutstate::increment(store, "queued", -1)?;

    if store.exists(&keys::hold_key(&id))? {
      warn!("queue: {id} is held, dropping from queue");
      continue;
    }

    match circulation::read(store, &id)? {
      Some(circulation) => match circulation.current() {
        Some('q') => return Ok(Some(Popped { id, key })),
        Some('i') => {
          error!("queue: {id} already issued while queued, skipping");
          continue;
        }
        Some('u') => {
          warn!("queue: {id} was unqueued, skipping");
          continue;
        }
        _ => {
          warn!("queue: {id} in an unexpected circulation state, skipping");
          continue;
        }
      },
      None => return Ok(Some(Popped { id, key })),
    }
  }
}

/// `hold.set(id)`: creates `<id>\tR/h` and increments `R/held`. Fails if the hold count would
/// exceed `oatop` for a bounded minter.
pub fn hold_set(store: &mut dyn Store, admin: &Admin, id: &str) -> Result<()> {
  if store.exists(&keys::hold_key(id))? {
    return Ok(());
  }
  let held = mutstate::get_i64_or(store, "held", 0)?;
  if admin.oatop != crate::template::NOLIMIT && held >= admin.oatop {
    return Err(Error::CirculationConflict(format!(
      "{id}: cannot hold, R/held would exceed R/oatop ({})",
      admin.oatop
    )));
  }
  store.set(&keys::hold_key(id), b"1")?;
  mutstate::increment(store, "held", 1)?;
  Ok(())
}

/// `hold.release(id)`: deletes `<id>\tR/h` and decrements `R/held`. Idempotent.
pub fn hold_release(store: &mut dyn Store, id: &str) -> Result<()> {
  if !store.exists(&keys::hold_key(id))? {
    return Ok(());
  }
  store.delete(&keys::hold_key(id))?;
  mutstate::increment(store, "held", -1)?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::settings::{Backend, Settings};
  use crate::store;
  use chrono::TimeZone;

  fn test_admin() -> Admin {
    Admin {
      template: crate::template::parse("tst4.rde").unwrap(),
      firstpart: "13030/tst4".to_string(),
      generator_type: crate::admin::GeneratorType::Random,
      generator_random: Some("lcg_drand48".to_string()),
      total: 290,
      oatop: 290,
      padwidth: 2,
      percounter: 290,
      longterm: true,
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
  fn parses_every_mode() {
    assert_eq!(QueueMode::Now, parse_mode("now").unwrap());
    assert_eq!(QueueMode::First, parse_mode("first").unwrap());
    assert_eq!(QueueMode::Lvf, parse_mode("lvf").unwrap());
    assert_eq!(QueueMode::Delete, parse_mode("delete").unwrap());
    assert_eq!(QueueMode::After(30, TimeUnit::Seconds), parse_mode("30s").unwrap());
    assert_eq!(QueueMode::After(2, TimeUnit::Days), parse_mode("2d").unwrap());
  }

  #[test]
  fn first_mode_entries_pop_in_insertion_order() {
    let directory = tempfile::tempdir().unwrap();
    let settings = Settings::new(directory.path(), "db", Backend::Sled);
    let mut store = store::open(&settings, store::Mode::Create).unwrap();
    let admin = test_admin();
    let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();

    enqueue(
      store.as_mut(),
      &admin,
      &QueueMode::Now,
      &["13030/tst43m".to_string(), "13030/tst47h".to_string(), "13030/tst44k".to_string()],
      now,
    )
    .unwrap();

    let mut popped = Vec::new();
    while let Some(entry) = pop_ripe(store.as_mut(), now).unwrap() {
      popped.push(entry.id);
    }
    assert_eq!(
      vec!["13030/tst43m", "13030/tst47h", "13030/tst44k"],
      popped
    );
  }

  #[test]
  fn held_ids_are_rejected_at_enqueue() {
    let directory = tempfile::tempdir().unwrap();
    let settings = Settings::new(directory.path(), "db", Backend::Sled);
    let mut store = store::open(&settings, store::Mode::Create).unwrap();
    let admin = test_admin();
    let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    store.set(&keys::hold_key("13030/tst412"), b"1").unwrap();

    let results = enqueue(store.as_mut(), &admin, &QueueMode::Now, &["13030/tst412".to_string()], now).unwrap();
    assert!(results[0].is_err());
  }
}
