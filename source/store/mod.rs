// The KV store abstraction (C4): one capability set (open/close/get/set/delete/exists/range/import)
// expressed as a trait, with backends plugged in underneath. Modelled directly on the way the
// teacher expresses its mail backends (notmuch::Database, maildir::Maildir) as independent modules
// behind a narrow set of operations rather than a deep inheritance hierarchy.

use crate::error::Result;
use crate::settings::{Backend, Settings};
use std::fs;

mod sled_store;
mod sqlite_store;
mod xml_store;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
  Create,
  ReadOnly,
  ReadWrite,
}

/// An ordered key→value map. Ordering is strict lexicographic byte comparison; a backend that
/// cannot guarantee that natively (the XML backend) sorts in memory instead.
pub trait Store: std::fmt::Debug + Send {
  fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;
  fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()>;
  fn delete(&mut self, key: &[u8]) -> Result<()>;
  fn exists(&self, key: &[u8]) -> Result<bool> {
    Ok(self.get(key)?.is_some())
  }
  /// All pairs whose key starts with `prefix`, ascending, honouring `limit` if set.
  fn range(&self, prefix: &[u8], limit: Option<usize>) -> Result<Vec<(Vec<u8>, Vec<u8>)>>;
  fn close(self: Box<Self>) -> Result<()>;

  /// Erases self, then copies every pair from `src`. The default implementation is expressed
  /// purely in terms of `range`/`set`/`delete`, so a new backend only has to implement the six
  /// primitive operations above.
  fn import(&mut self, src: &dyn Store) -> Result<()> {
    for (key, _) in self.range(b"", None)? {
      self.delete(&key)?;
    }
    for (key, value) in src.range(b"", None)? {
      self.set(&key, &value)?;
    }
    Ok(())
  }
}

/// Opens (or creates) the backend named by `settings.backend`. On `Mode::Create`, any previous
/// store at the same path is removed first; the session directory is created before any state is
/// written.
pub fn open(settings: &Settings, mode: Mode) -> Result<Box<dyn Store>> {
  fs::create_dir_all(settings.directory())?;
  if mode == Mode::Create {
    let path = settings.backend_file();
    if path.is_dir() {
      fs::remove_dir_all(&path)?;
    } else if path.exists() {
      fs::remove_file(&path)?;
    }
  }
  match settings.backend {
    Backend::Sled => Ok(Box::new(sled_store::SledStore::open(settings, mode)?)),
    Backend::Sqlite => Ok(Box::new(sqlite_store::SqliteStore::open(settings, mode)?)),
    Backend::Xml => Ok(Box::new(xml_store::XmlStore::open(settings, mode)?)),
  }
}
