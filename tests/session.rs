// C10 end-to-end: reopening a store yields a byte-identical admin cache (quantified invariant 6),
// and persistent-connection mode reuses the same handle across `open` calls.

use noid::create::{self, CreateRequest};
use noid::settings::{Backend, Settings};
use noid::store;
use noid::Session;
use std::sync::Arc;

fn create_sequential(settings: &Settings) {
  let request = CreateRequest {
    contact: "admin@example.org",
    template: ".sdd",
    term: "-",
    naan: "",
    naa: "",
    subnaa: "",
    longterm_override: None,
    wrap: false,
    addcheckchar_override: None,
  };
  create::create(settings, &request).unwrap();
}

#[test]
fn reopening_reproduces_the_admin_cache() {
  let directory = tempfile::tempdir().unwrap();
  let settings = Settings::new(directory.path(), "db", Backend::Sled);
  create_sequential(&settings);

  let first = Session::open(&settings, store::Mode::ReadWrite).unwrap();
  first.mint("alice@example.org").unwrap();
  Session::close(first).unwrap();

  let second = Session::open(&settings, store::Mode::ReadWrite).unwrap();
  assert_eq!("", second.admin.firstpart);
  assert_eq!(100, second.admin.total);
  assert_eq!(2, second.admin.padwidth);
  Session::close(second).unwrap();
}

#[test]
fn persistent_mode_reuses_the_session_across_opens() {
  let directory = tempfile::tempdir().unwrap();
  let mut settings = Settings::new(directory.path(), "db", Backend::Sled);
  settings.persistent = true;
  create_sequential(&settings);

  let first = Session::open(&settings, store::Mode::ReadWrite).unwrap();
  let minted_first = first.mint("alice@example.org").unwrap();
  let second = Session::open(&settings, store::Mode::ReadWrite).unwrap();
  assert!(Arc::ptr_eq(&first, &second));

  let minted_second = second.mint("alice@example.org").unwrap();
  assert_ne!(minted_first, minted_second);

  Session::close(first).unwrap();
  let third = Session::open(&settings, store::Mode::ReadWrite).unwrap();
  assert!(Arc::ptr_eq(&second, &third));
  Session::unpersist(&settings).unwrap();
}
