// The CLI front-end (C12, ambient): a thin `clap`-derived dispatcher over the library's public
// API. No behavior of its own beyond argument parsing, opening/creating a session, and formatting
// results.

use crate::create::{self, CreateRequest};
use crate::error::{Error, Result};
use crate::session::Session;
use crate::settings::{Backend, Settings};
use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "noid", about = "Mints, tracks, and binds Nice Opaque Identifiers")]
pub struct Arguments {
  /// Path to the database directory (`<data_dir>/<db_name>`).
  #[arg(short = 'f', long = "file")]
  pub file: PathBuf,

  /// Storage backend for `dbcreate`; ignored when opening an existing database.
  #[arg(short = 't', long = "backend", value_enum, default_value = "sled")]
  pub backend: BackendArg,

  /// Overrides the PRNG name recorded/expected in `R/generator_random`.
  #[arg(short = 'g', long = "generator")]
  pub generator: Option<String>,

  /// Keeps the session registered across invocations instead of closing it on exit.
  #[arg(long)]
  pub persistent: bool,

  #[command(subcommand)]
  pub command: Command,

  #[clap(flatten)]
  pub verbose: Verbosity<InfoLevel>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum BackendArg {
  Sled,
  Sqlite,
  Xml,
}

impl From<BackendArg> for Backend {
  fn from(value: BackendArg) -> Self {
    match value {
      BackendArg::Sled => Backend::Sled,
      BackendArg::Sqlite => Backend::Sqlite,
      BackendArg::Xml => Backend::Xml,
    }
  }
}

#[derive(Subcommand, Debug)]
pub enum Command {
  /// Create a fresh minter.
  Dbcreate {
    #[arg(long)]
    contact: String,
    /// `prefix.mask`, e.g. `tst3.rde`; an empty mask yields a bind-only minter.
    #[arg(long, default_value = "")]
    template: String,
    #[arg(long, default_value = "-")]
    term: String,
    #[arg(long, default_value = "")]
    naan: String,
    #[arg(long, default_value = "")]
    naa: String,
    #[arg(long, default_value = "")]
    subnaa: String,
    #[arg(long)]
    wrap: bool,
  },
  /// Mint one or more identifiers.
  Mint {
    #[arg(long, default_value = "")]
    contact: String,
    #[arg(default_value_t = 1)]
    count: usize,
  },
  /// Set or release a hold on one or more identifiers.
  Hold {
    #[arg(value_enum)]
    action: HoldAction,
    ids: Vec<String>,
  },
  /// Enqueue or dequeue identifiers for (re-)issue.
  Queue { mode: String, ids: Vec<String> },
  /// Attach a value to an identifier's element.
  Bind { how: String, id: String, elem: String, value: String },
  /// Read one or all elements bound to an identifier.
  Fetch { id: String, elems: Vec<String> },
  /// Check an identifier's syntax and check character against the open minter.
  Validate { ids: Vec<String> },
  /// Print admin state.
  Dbinfo {
    #[arg(value_enum, default_value = "brief")]
    mode: InfoMode,
  },
  /// Copy every entry from another backend's database into this one.
  Dbimport {
    #[arg(value_enum)]
    src_backend: BackendArg,
  },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum HoldAction {
  Set,
  Release,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum InfoMode {
  Brief,
  Full,
  Dump,
}

fn settings_for(arguments: &Arguments) -> Settings {
  let (data_dir, db_name) = match (arguments.file.parent(), arguments.file.file_name()) {
    (Some(parent), Some(name)) if !parent.as_os_str().is_empty() => (parent.to_path_buf(), name.to_string_lossy().to_string()),
    (_, Some(name)) => (PathBuf::from("."), name.to_string_lossy().to_string()),
    _ => (PathBuf::from("."), arguments.file.to_string_lossy().to_string()),
  };
  let mut settings = Settings::new(data_dir, db_name, arguments.backend.into());
  settings.generator_random = arguments.generator.clone();
  settings.persistent = arguments.persistent;
  settings
}

/// Dispatches `arguments.command`, returning the text the binary prints to stdout.
pub fn run(arguments: &Arguments) -> Result<String> {
  let settings = settings_for(arguments);

  if let Command::Dbcreate { contact, template, term, naan, naa, subnaa, wrap } = &arguments.command {
    let request = CreateRequest {
      contact,
      template,
      term,
      naan,
      naa,
      subnaa,
      longterm_override: None,
      wrap: *wrap,
      addcheckchar_override: None,
    };
    return create::create(&settings, &request);
  }

  let mode = match &arguments.command {
    Command::Fetch { .. } | Command::Validate { .. } | Command::Dbinfo { .. } => crate::store::Mode::ReadOnly,
    _ => crate::store::Mode::ReadWrite,
  };
  let session = Session::open(&settings, mode)?;
  let result = dispatch(&session, &arguments.command);
  Session::close(session)?;
  result
}

fn dispatch(session: &Session, command: &Command) -> Result<String> {
  match command {
    Command::Dbcreate { .. } => unreachable!("handled in run"),
    Command::Mint { contact, count } => {
      if *count == 1 {
        Ok(session.mint(contact)?)
      } else {
        Ok(session.mint_multiple(contact, *count)?.join("\n"))
      }
    }
    Command::Hold { action, ids } => {
      for id in ids {
        match action {
          HoldAction::Set => session.hold_set(id)?,
          HoldAction::Release => session.hold_release(id)?,
        }
      }
      Ok(format!("{} identifier(s) updated", ids.len()))
    }
    Command::Queue { mode, ids } => {
      let results = session.queue(mode, ids)?;
      Ok(report_per_id(ids, &results))
    }
    Command::Bind { how, id, elem, value } => {
      session.bind("", id, elem, value, how)?;
      Ok(format!("{id}\t{elem} bound"))
    }
    Command::Fetch { id, elems } => {
      if elems.is_empty() {
        let fetched = session.fetch_all(id)?;
        Ok(
          fetched
            .into_iter()
            .map(|entry| format!("{}\t{}: {}", id, entry.elem, entry.value))
            .collect::<Vec<_>>()
            .join("\n"),
        )
      } else {
        let mut lines = Vec::with_capacity(elems.len());
        for elem in elems {
          let value = session.fetch(id, elem)?;
          lines.push(format!("{id}\t{elem}: {}", value.as_deref().unwrap_or("(unbound)")));
        }
        Ok(lines.join("\n"))
      }
    }
    Command::Validate { ids } => {
      let mut lines = Vec::with_capacity(ids.len());
      for id in ids {
        match session.validate(id) {
          Ok(()) => lines.push(format!("{id}: ok")),
          Err(error) => lines.push(error.to_string()),
        }
      }
      Ok(lines.join("\n"))
    }
    Command::Dbinfo { mode } => Ok(dbinfo(session, *mode)),
    Command::Dbimport { .. } => Err(Error::Config(
      "dbimport must be run against a freshly created destination; invoke Store::import directly from an embedder".to_string(),
    )),
  }
}

fn report_per_id(ids: &[String], results: &[Result<()>]) -> String {
  ids.iter()
    .zip(results)
    .map(|(id, result)| match result {
      Ok(()) => format!("{id}: ok"),
      Err(error) => format!("{id}: {error}"),
    })
    .collect::<Vec<_>>()
    .join("\n")
}

fn dbinfo(session: &Session, mode: InfoMode) -> String {
  let admin = &session.admin;
  match mode {
    InfoMode::Brief => format!("template={} firstpart={} total={}", admin.template.to_template_string(), admin.firstpart, admin.total),
    InfoMode::Full => format!(
      "template={}\nfirstpart={}\ngenerator_type={}\ntotal={}\noatop={}\nlongterm={}\nwrap={}\nnaan={}\nnaa={}\nsubnaa={}\nproperties={}",
      admin.template.to_template_string(),
      admin.firstpart,
      admin.generator_type.as_str(),
      admin.total,
      admin.oatop,
      admin.longterm,
      admin.wrap,
      admin.naan,
      admin.naa,
      admin.subnaa,
      admin.properties,
    ),
    InfoMode::Dump => format!("{admin:#?}"),
  }
}
