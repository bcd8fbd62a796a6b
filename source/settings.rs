use std::path;

/// The library-facing configuration surface: callers construct a `Settings` and pass it to
/// `Session::open`/`Session::create`. Parsing one out of a config file, environment, or CLI flags
/// is explicitly out of scope (the thin `cli` module does only the last of those, for the binary).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
  pub data_dir: path::PathBuf,
  pub db_name: String,
  pub backend: Backend,
  /// Overrides the PRNG name recorded/expected in `R/generator_random`. `None` uses the
  /// implementation's own generator (`lcg::GENERATOR_NAME`).
  pub generator_random: Option<String>,
  /// Mirrors the "optional persistent-connection mode" of C10: when set, `Session::close` on this
  /// path is a no-op and a later `open` of the same settings/path reuses the registered session.
  pub persistent: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backend {
  /// The preferred default: an embedded, memory-mapped, natively ordered KV store.
  Sled,
  /// `(k BLOB PRIMARY KEY, v BLOB)` over a bundled SQLite connection.
  Sqlite,
  /// A document XML serializer; whole-document rewrite on close.
  Xml,
}

impl Backend {
  pub fn extension(self) -> &'static str {
    match self {
      Backend::Sled => "sled",
      Backend::Sqlite => "sqlite3",
      Backend::Xml => "xml",
    }
  }
}

impl Settings {
  pub fn new(data_dir: impl Into<path::PathBuf>, db_name: impl Into<String>, backend: Backend) -> Self {
    Settings {
      data_dir: data_dir.into(),
      db_name: db_name.into(),
      backend,
      generator_random: None,
      persistent: false,
    }
  }

  /// `<data_dir>/<db_name>/`, per §6.
  pub fn directory(&self) -> path::PathBuf {
    self.data_dir.join(&self.db_name)
  }

  pub fn backend_file(&self) -> path::PathBuf {
    self.directory().join(format!("noid.{}", self.backend.extension()))
  }

  pub fn log_file(&self) -> path::PathBuf {
    self.directory().join("log")
  }

  pub fn readme_file(&self) -> path::PathBuf {
    self.directory().join("README")
  }
}
