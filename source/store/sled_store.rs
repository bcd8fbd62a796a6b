use super::{Mode, Store};
use crate::error::Result;
use crate::settings::Settings;

/// The preferred default backend: an embedded, memory-mapped, natively ordered KV store. Sled
/// already guarantees lexicographic byte ordering on its keys, so `range` is a direct
/// `scan_prefix`.
#[derive(Debug)]
pub struct SledStore {
  db: sled::Db,
}

impl SledStore {
  pub fn open(settings: &Settings, _mode: Mode) -> Result<Self> {
    let db = sled::open(settings.backend_file())?;
    Ok(SledStore { db })
  }
}

impl Store for SledStore {
  fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
    Ok(self.db.get(key)?.map(|value| value.to_vec()))
  }

  fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
    self.db.insert(key, value)?;
    Ok(())
  }

  fn delete(&mut self, key: &[u8]) -> Result<()> {
    self.db.remove(key)?;
    Ok(())
  }

  fn range(&self, prefix: &[u8], limit: Option<usize>) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
    let mut out = Vec::new();
    for entry in self.db.scan_prefix(prefix) {
      let (key, value) = entry?;
      out.push((key.to_vec(), value.to_vec()));
      if let Some(limit) = limit {
        if out.len() >= limit {
          break;
        }
      }
    }
    Ok(out)
  }

  fn close(self: Box<Self>) -> Result<()> {
    self.db.flush()?;
    Ok(())
  }
}
