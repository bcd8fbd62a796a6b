use std::{error, fmt, io};

/// The kinds enumerated in the error taxonomy: every fallible operation in this crate returns one
/// of these, never a bare string or a panic.
#[derive(Debug)]
pub enum Error {
  BadTemplate(String),
  BadInput(String),
  NotFound(String),
  Exhausted,
  LongtermUnissued(String),
  CirculationConflict(String),
  Io(String),
  Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl fmt::Display for Error {
  fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Error::BadTemplate(message) => write!(formatter, "bad template: {message}"),
      Error::BadInput(message) => write!(formatter, "bad input: {message}"),
      Error::NotFound(message) => write!(formatter, "not found: {message}"),
      Error::Exhausted => write!(formatter, "identifier space exhausted"),
      Error::LongtermUnissued(id) => write!(
        formatter,
        "{id} is long-term and has never been issued or held"
      ),
      Error::CirculationConflict(message) => write!(formatter, "circulation conflict: {message}"),
      Error::Io(message) => write!(formatter, "storage error: {message}"),
      Error::Config(message) => write!(formatter, "configuration error: {message}"),
    }
  }
}

impl error::Error for Error {}

impl From<io::Error> for Error {
  fn from(error: io::Error) -> Self {
    Error::Io(error.to_string())
  }
}

impl From<sled::Error> for Error {
  fn from(error: sled::Error) -> Self {
    Error::Io(error.to_string())
  }
}

impl From<rusqlite::Error> for Error {
  fn from(error: rusqlite::Error) -> Self {
    Error::Io(error.to_string())
  }
}

impl From<quick_xml::Error> for Error {
  fn from(error: quick_xml::Error) -> Self {
    Error::Io(error.to_string())
  }
}

impl From<base64::DecodeError> for Error {
  fn from(error: base64::DecodeError) -> Self {
    Error::Io(error.to_string())
  }
}

impl<L> From<peg::error::ParseError<L>> for Error
where
  L: fmt::Display,
{
  fn from(error: peg::error::ParseError<L>) -> Self {
    Error::BadTemplate(format!("at {}: expected one of {}", error.location, error.expected))
  }
}
