// The per-identifier circulation record (`<id>\tR/c`, §3): `SVEC|date|contact|counter`, where SVEC
// is a non-empty, leftmost-extended string over {i, q, u, p} recording issue/queue/unqueue/pregen
// history. Shared by the minter, queue, pregen and binding modules, all of which need to read or
// extend this record.

use crate::error::{Error, Result};
use crate::keys;
use crate::store::Store;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Circulation {
  pub svec: String,
  pub date: String,
  pub contact: String,
  pub counter: i64,
}

impl Circulation {
  pub fn current(&self) -> Option<char> {
    self.svec.chars().next()
  }

  pub fn to_record(&self) -> String {
    format!("{}|{}|{}|{}", self.svec, self.date, self.contact, self.counter)
  }

  pub fn parse(record: &str) -> Result<Circulation> {
    let mut parts = record.splitn(4, '|');
    let svec = parts.next().unwrap_or_default().to_string();
    let date = parts.next().unwrap_or_default().to_string();
    let contact = parts.next().unwrap_or_default().to_string();
    let counter = parts
      .next()
      .unwrap_or("0")
      .parse()
      .map_err(|_| Error::Io(format!("malformed circulation record {record:?}")))?;
    if svec.is_empty() {
      return Err(Error::Io(format!("malformed circulation record {record:?}")));
    }
    Ok(Circulation { svec, date, contact, counter })
  }
}

pub fn read(store: &dyn Store, id: &str) -> Result<Option<Circulation>> {
  match store.get(&keys::circulation_key(id))? {
    Some(bytes) => {
      let text = String::from_utf8(bytes).map_err(|error| Error::Io(error.to_string()))?;
      Ok(Some(Circulation::parse(&text)?))
    }
    None => Ok(None),
  }
}

/// Prepends `event` to the SVEC of `id`'s circulation record, creating the record (with an empty
/// prior SVEC) if none exists yet. `counter`, when given, replaces the stored counter; otherwise the
/// prior counter (or 0 for a new record) is kept.
pub fn prepend(
  store: &mut dyn Store,
  id: &str,
  event: char,
  date: &str,
  contact: &str,
  counter: Option<i64>,
) -> Result<Circulation> {
  let existing = read(store, id)?;
  let mut svec = String::new();
  svec.push(event);
  if let Some(existing) = &existing {
    svec.push_str(&existing.svec);
  }
  let circulation = Circulation {
    svec,
    date: date.to_string(),
    contact: contact.to_string(),
    counter: counter.or(existing.map(|existing| existing.counter)).unwrap_or(0),
  };
  store.set(&keys::circulation_key(id), circulation.to_record().as_bytes())?;
  Ok(circulation)
}
