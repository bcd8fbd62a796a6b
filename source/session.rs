// Session lifecycle (C10): open/close, optional persistent-connection reuse, and the single
// process-local mutex every mutating operation acquires for its read-modify-write sequence. The
// mutex guarding the store doubles as that lock, since the store is the only mutable state a
// session owns.

use crate::admin::Admin;
use crate::binding::{self, BindRequest, FetchedElement, How};
use crate::circulation;
use crate::error::{Error, Result};
use crate::minter;
use crate::pregen;
use crate::queue::{self, QueueMode};
use crate::settings::Settings;
use crate::store::{self, Store};
use chrono::Utc;
use log::{error, warn};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::io::Write as _;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Keyed by the session directory's canonical path: a process-wide map behind a `Lazy` mutex,
/// used only when `Settings::persistent` is set.
static REGISTRY: Lazy<Mutex<HashMap<PathBuf, Arc<Session>>>> = Lazy::new(|| Mutex::new(HashMap::new()));

pub struct Session {
  settings: Settings,
  store: Mutex<Option<Box<dyn Store>>>,
  pub admin: Admin,
  errmsg: Mutex<Option<String>>,
  log_sink: Mutex<std::fs::File>,
}

fn canonical_directory(settings: &Settings) -> Result<PathBuf> {
  std::fs::create_dir_all(settings.directory())?;
  Ok(settings.directory().canonicalize()?)
}

impl Session {
  /// Opens (or creates) a minter and returns a shared handle. When `settings.persistent` is set,
  /// a later `open` of an identical `settings`/path reuses the registered session instead of
  /// opening the backend again; `mode == Create` opens are never reused (a fresh database always
  /// gets a fresh handle, even under persistent-connection mode).
  pub fn open(settings: &Settings, mode: store::Mode) -> Result<Arc<Session>> {
    if settings.persistent && mode != store::Mode::Create {
      let canonical = canonical_directory(settings)?;
      let mut registry = REGISTRY.lock().unwrap();
      if let Some(existing) = registry.get(&canonical) {
        if existing.settings == *settings {
          return Ok(Arc::clone(existing));
        }
      }
      let session = Arc::new(Self::open_fresh(settings, mode)?);
      registry.insert(canonical, Arc::clone(&session));
      return Ok(session);
    }
    Ok(Arc::new(Self::open_fresh(settings, mode)?))
  }

  fn open_fresh(settings: &Settings, mode: store::Mode) -> Result<Session> {
    let store = store::open(settings, mode)?;
    let admin = match mode {
      store::Mode::Create => Admin::load(store.as_ref()).unwrap_or_else(|_| {
        // `create` (C11) hasn't written the admin keys yet when `open_fresh` is first called from
        // inside it; the caller reloads the cache itself once creation finishes.
        placeholder_admin()
      }),
      _ => {
        let admin = Admin::load(store.as_ref())?;
        if let Some(expected) = &admin.generator_random {
          if expected != crate::lcg::GENERATOR_NAME {
            return Err(Error::Config(format!(
              "database requires generator {expected:?}, this implementation provides {:?}",
              crate::lcg::GENERATOR_NAME
            )));
          }
        }
        admin
      }
    };
    let log_sink = std::fs::OpenOptions::new()
      .create(true)
      .append(true)
      .open(settings.log_file())?;
    Ok(Session {
      settings: settings.clone(),
      store: Mutex::new(Some(store)),
      admin,
      errmsg: Mutex::new(None),
      log_sink: Mutex::new(log_sink),
    })
  }

  /// Writes a single admin key directly to the store, bypassing the operation modules; used only by
  /// `create` (C11) while assembling a fresh database, before `reload_admin` populates the cache.
  pub(crate) fn set_admin_key(&self, name: &str, value: &str) -> Result<()> {
    let mut guard = self.store.lock().unwrap();
    let store = guard.as_deref_mut().ok_or_else(closed)?;
    store.set(&crate::keys::admin_key(name), value.as_bytes())
  }

  /// Reloads the admin cache from storage; used by `create` (C11) once it has finished writing the
  /// admin keys into a session opened before they existed.
  pub fn reload_admin(&mut self) -> Result<()> {
    let guard = self.store.lock().unwrap();
    let store = guard.as_ref().ok_or_else(closed)?;
    self.admin = Admin::load(store.as_ref())?;
    Ok(())
  }

  /// `close`: a no-op under persistent-connection mode (the session stays registered); otherwise
  /// tears the backend down and, if registered, removes it from the registry.
  pub fn close(session: Arc<Session>) -> Result<()> {
    if session.settings.persistent {
      return Ok(());
    }
    Self::teardown(&session)
  }

  /// `unpersist`: clears the persistent-connection flag's effect for this path and forces a close,
  /// regardless of what `settings.persistent` said at open time.
  pub fn unpersist(settings: &Settings) -> Result<()> {
    let canonical = canonical_directory(settings)?;
    let removed = REGISTRY.lock().unwrap().remove(&canonical);
    match removed {
      Some(session) => Self::teardown(&session),
      None => Ok(()),
    }
  }

  fn teardown(session: &Session) -> Result<()> {
    let mut guard = session.store.lock().unwrap();
    if let Some(store) = guard.take() {
      store.close()?;
    }
    Ok(())
  }

  fn with_store<T>(&self, f: impl FnOnce(&mut dyn Store) -> Result<T>) -> Result<T> {
    let mut guard = self.store.lock().unwrap();
    let store = guard.as_deref_mut().ok_or_else(closed)?;
    let result = f(store);
    if let Err(error) = &result {
      self.record_errmsg(error.to_string());
    }
    result
  }

  fn record_errmsg(&self, message: String) {
    *self.errmsg.lock().unwrap() = Some(message);
  }

  /// The last human-readable error message recorded for this session, if any.
  pub fn errmsg(&self) -> Option<String> {
    self.errmsg.lock().unwrap().clone()
  }

  pub fn log_fatal(&self, message: &str) {
    error!("{message}");
    if let Ok(mut sink) = self.log_sink.lock() {
      let _ = writeln!(sink, "{} {message}", Utc::now().format("%Y-%m-%d %H:%M:%S"));
    }
  }

  pub fn mint(&self, contact: &str) -> Result<String> {
    self.with_store(|store| {
      let result = minter::mint_one(store, &self.admin, contact, Utc::now());
      if matches!(result, Err(Error::Exhausted)) {
        self.log_fatal("mint: identifier space exhausted");
      }
      result
    })
  }

  pub fn mint_multiple(&self, contact: &str, count: usize) -> Result<Vec<String>> {
    self.with_store(|store| minter::mint_multiple(store, &self.admin, contact, count, Utc::now()))
  }

  pub fn pregenerate(&self, count: usize) -> Result<Vec<String>> {
    let admin = self.admin.clone();
    self.with_store(|store| {
      let date = Utc::now().format("%Y%m%d%H%M%S").to_string();
      let generate: Box<pregen::Generate<'_>> =
        Box::new(move |store: &mut dyn Store| minter::generate_for_pregen(store, &admin));
      pregen::pregenerate(store, count, generate, &date)
    })
  }

  pub fn pregen_count(&self) -> Result<i64> {
    self.with_store(|store| pregen::count(store))
  }

  pub fn queue(&self, mode: &str, ids: &[String]) -> Result<Vec<Result<()>>> {
    let mode = QueueMode::try_from(mode)?;
    self.with_store(|store| queue::enqueue(store, &self.admin, &mode, ids, Utc::now()))
  }

  pub fn hold_set(&self, id: &str) -> Result<()> {
    self.with_store(|store| queue::hold_set(store, &self.admin, id))
  }

  pub fn hold_release(&self, id: &str) -> Result<()> {
    self.with_store(|store| queue::hold_release(store, id))
  }

  pub fn bind(&self, contact: &str, id: &str, elem: &str, value: &str, how: &str) -> Result<()> {
    let request = BindRequest { id: id.to_string(), elem: elem.to_string(), value: value.to_string(), how: How::parse(how)? };
    self.with_store(|store| binding::bind_one(store, &self.admin, contact, &request, Utc::now()))
  }

  pub fn bind_multiple(&self, contact: &str, requests: Vec<BindRequest>) -> Result<Vec<Result<()>>> {
    self.with_store(|store| binding::bind_multiple(store, &self.admin, contact, &requests, Utc::now()))
  }

  pub fn fetch(&self, id: &str, elem: &str) -> Result<Option<String>> {
    let guard = self.store.lock().unwrap();
    let store = guard.as_ref().ok_or_else(closed)?;
    binding::fetch(store.as_ref(), id, elem)
  }

  pub fn fetch_all(&self, id: &str) -> Result<Vec<FetchedElement>> {
    let guard = self.store.lock().unwrap();
    let store = guard.as_ref().ok_or_else(closed)?;
    binding::fetch_all(store.as_ref(), id)
  }

  pub fn validate(&self, id: &str) -> Result<()> {
    let guard = self.store.lock().unwrap();
    let store = guard.as_ref().ok_or_else(closed)?;
    if !id.starts_with(&self.admin.firstpart) {
      return Err(Error::BadInput(format!("iderr: {id} does not match template {}", self.admin.firstpart)));
    }
    if self.admin.addcheckchar {
      if let Some(repertoire) = self.admin.checkrepertoire {
        if !crate::codec::verify_check_char(id, repertoire) {
          return Err(Error::BadInput(format!("iderr: {id} fails check character validation")));
        }
      }
    }
    let _ = circulation::read(store.as_ref(), id)?;
    Ok(())
  }

  pub fn settings(&self) -> &Settings {
    &self.settings
  }
}

fn placeholder_admin() -> Admin {
  Admin {
    template: crate::template::Template { prefix: String::new(), mask: None },
    firstpart: String::new(),
    generator_type: crate::admin::GeneratorType::Sequential,
    generator_random: None,
    total: crate::template::NOLIMIT,
    oatop: crate::template::NOLIMIT,
    padwidth: 0,
    percounter: 0,
    longterm: false,
    wrap: false,
    addcheckchar: false,
    checkrepertoire: None,
    naan: String::new(),
    naa: String::new(),
    subnaa: String::new(),
    properties: String::new(),
    counter_count: 0,
    genonly: true,
  }
}

fn closed() -> Error {
  Error::Config("session is closed".to_string())
}

impl TryFrom<&str> for QueueMode {
  type Error = Error;

  fn try_from(value: &str) -> Result<QueueMode> {
    queue::parse_mode(value)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::settings::Backend;

  #[test]
  fn reopening_a_non_persistent_store_gives_a_fresh_admin_cache() {
    let directory = tempfile::tempdir().unwrap();
    let settings = Settings::new(directory.path(), "db", Backend::Sled);

    let session = Session::open(&settings, store::Mode::Create).unwrap();
    {
      let mut guard = session.store.lock().unwrap();
      let store = guard.as_deref_mut().unwrap();
      for (key, value) in [
        ("template", ".sdd"),
        ("firstpart", ""),
        ("generator_type", "sequential"),
        ("total", "100"),
        ("oatop", "100"),
        ("padwidth", "2"),
        ("percounter", "0"),
        ("longterm", "false"),
        ("wrap", "false"),
        ("addcheckchar", "false"),
        ("naan", ""),
        ("naa", ""),
        ("subnaa", ""),
        ("properties", ""),
        ("saclist", ""),
        ("siclist", ""),
      ] {
        store.set(&crate::keys::admin_key(key), value.as_bytes()).unwrap();
      }
    }
    let mut session_mut = Arc::try_unwrap(session).ok().unwrap();
    session_mut.reload_admin().unwrap();
    assert_eq!(100, session_mut.admin.total);
    let session = Arc::new(session_mut);

    Session::close(session).unwrap();

    let reopened = Session::open(&settings, store::Mode::ReadWrite).unwrap();
    assert_eq!(100, reopened.admin.total);
  }

  #[test]
  fn persistent_mode_reuses_the_registered_session() {
    let directory = tempfile::tempdir().unwrap();
    let settings = Settings::new(directory.path(), "db", Backend::Sled);

    // `Mode::Create` opens are never registered (see `open`'s doc comment), so build the database
    // and close it first; only then does a persistent-connection open have anything to reuse.
    let created = Session::open(&settings, store::Mode::Create).unwrap();
    {
      let mut guard = created.store.lock().unwrap();
      let store = guard.as_deref_mut().unwrap();
      for (key, value) in [
        ("template", ".sdd"),
        ("firstpart", ""),
        ("generator_type", "sequential"),
        ("total", "100"),
        ("oatop", "100"),
        ("padwidth", "2"),
        ("percounter", "0"),
        ("longterm", "false"),
        ("wrap", "false"),
        ("addcheckchar", "false"),
        ("naan", ""),
        ("naa", ""),
        ("subnaa", ""),
        ("properties", ""),
        ("saclist", ""),
        ("siclist", ""),
      ] {
        store.set(&crate::keys::admin_key(key), value.as_bytes()).unwrap();
      }
    }
    Session::close(created).unwrap();

    let mut settings = settings;
    settings.persistent = true;

    let first = Session::open(&settings, store::Mode::ReadWrite).unwrap();
    let second = Session::open(&settings, store::Mode::ReadWrite).unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    Session::unpersist(&settings).unwrap();
  }
}
