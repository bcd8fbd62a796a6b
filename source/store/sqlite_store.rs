use super::{Mode, Store};
use crate::error::Result;
use crate::settings::Settings;
use rusqlite::{params, Connection};

/// `(k BLOB PRIMARY KEY, v BLOB)`, per C4. SQLite's default BLOB collation is byte-wise memcmp, so
/// `ORDER BY k ASC` already gives the strict lexicographic ordering the contract requires.
#[derive(Debug)]
pub struct SqliteStore {
  connection: Connection,
}

impl SqliteStore {
  pub fn open(settings: &Settings, _mode: Mode) -> Result<Self> {
    let connection = Connection::open(settings.backend_file())?;
    connection.execute(
      "CREATE TABLE IF NOT EXISTS noid (k BLOB PRIMARY KEY, v BLOB NOT NULL) WITHOUT ROWID",
      [],
    )?;
    Ok(SqliteStore { connection })
  }
}

impl Store for SqliteStore {
  fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
    let mut statement = self
      .connection
      .prepare("SELECT v FROM noid WHERE k = ?1")?;
    let mut rows = statement.query(params![key])?;
    match rows.next()? {
      Some(row) => Ok(Some(row.get(0)?)),
      None => Ok(None),
    }
  }

  fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
    self.connection.execute(
      "INSERT INTO noid (k, v) VALUES (?1, ?2) ON CONFLICT(k) DO UPDATE SET v = excluded.v",
      params![key, value],
    )?;
    Ok(())
  }

  fn delete(&mut self, key: &[u8]) -> Result<()> {
    self
      .connection
      .execute("DELETE FROM noid WHERE k = ?1", params![key])?;
    Ok(())
  }

  fn range(&self, prefix: &[u8], limit: Option<usize>) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
    // Exclusive upper bound: the smallest key that is strictly greater than every key starting
    // with `prefix`. An empty prefix matches everything, so it has no upper bound.
    let mut statement = self
      .connection
      .prepare("SELECT k, v FROM noid WHERE k >= ?1 AND (?2 IS NULL OR k < ?2) ORDER BY k ASC")?;
    let upper_bound = upper_bound(prefix);
    let rows = statement.query_map(params![prefix, upper_bound], |row| {
      Ok((row.get::<_, Vec<u8>>(0)?, row.get::<_, Vec<u8>>(1)?))
    })?;
    let mut out = Vec::new();
    for row in rows {
      out.push(row?);
      if let Some(limit) = limit {
        if out.len() >= limit {
          break;
        }
      }
    }
    Ok(out)
  }

  fn close(self: Box<Self>) -> Result<()> {
    Ok(())
  }
}

fn upper_bound(prefix: &[u8]) -> Option<Vec<u8>> {
  if prefix.is_empty() {
    return None;
  }
  let mut bound = prefix.to_vec();
  while let Some(last) = bound.last().copied() {
    if last == 0xFF {
      bound.pop();
      continue;
    }
    *bound.last_mut().unwrap() = last + 1;
    return Some(bound);
  }
  None
}
