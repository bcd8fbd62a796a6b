// https://noid.example/ - Nice Opaque Identifier minting, tracking, and binding.
//
// A `noid` database is a key/value store (sled, SQLite, or an XML document) holding an admin
// section (§3: template, counters, bookkeeping) plus one record per minted identifier. Every
// mutating operation goes through a single process-local lock per directory (`session`), so two
// threads sharing a `Session` never race on the same counters.

mod admin;
mod binding;
mod circulation;
mod codec;
pub mod create;
mod error;
mod keys;
mod lcg;
mod minter;
mod mutstate;
mod pregen;
mod queue;
pub mod session;
pub mod settings;
pub mod store;
mod template;

pub mod cli;

pub use error::{Error, Result};
pub use session::Session;
pub use settings::{Backend, Settings};

pub fn run(arguments: &cli::Arguments) -> Result<String> {
  cli::run(arguments)
}
