// C9 end-to-end: bind operations through a live session, idmap indirection, and the check-
// character validation path (E5).

use noid::create::{self, CreateRequest};
use noid::settings::{Backend, Settings};
use noid::store;
use noid::Session;

fn open_with(template: &str, term: &str, naan: &str) -> (tempfile::TempDir, std::sync::Arc<Session>) {
  let directory = tempfile::tempdir().unwrap();
  let settings = Settings::new(directory.path(), "db", Backend::Sled);
  let request = CreateRequest {
    contact: "admin@example.org",
    template,
    term,
    naan,
    naa: if naan.is_empty() { "" } else { "test" },
    subnaa: if naan.is_empty() { "" } else { "sub" },
    longterm_override: None,
    wrap: false,
    addcheckchar_override: None,
  };
  create::create(&settings, &request).unwrap();
  let session = Session::open(&settings, store::Mode::ReadWrite).unwrap();
  (directory, session)
}

#[test]
fn set_replace_append_and_delete_round_trip_through_a_session() {
  let (_directory, session) = open_with("tst1.rde", "long", "13030");
  let id = session.mint("").unwrap();
  session.hold_release(&id).unwrap();

  session.bind("", &id, "color", "red", "set").unwrap();
  assert_eq!(Some("red".to_string()), session.fetch(&id, "color").unwrap());

  session.bind("", &id, "color", "blue", "replace").unwrap();
  assert_eq!(Some("blue".to_string()), session.fetch(&id, "color").unwrap());

  session.bind("", &id, "color", "!", "append").unwrap();
  assert_eq!(Some("blue!".to_string()), session.fetch(&id, "color").unwrap());

  session.bind("", &id, "color", "", "delete").unwrap();
  assert_eq!(None, session.fetch(&id, "color").unwrap());
}

#[test]
fn new_fails_once_already_bound_and_fetch_all_sees_it() {
  let (_directory, session) = open_with("tst1.rde", "long", "13030");
  let id = session.mint("").unwrap();
  session.hold_release(&id).unwrap();

  session.bind("", &id, "color", "red", "new").unwrap();
  assert!(session.bind("", &id, "color", "green", "new").is_err());

  let fetched = session.fetch_all(&id).unwrap();
  assert_eq!(1, fetched.len());
  assert_eq!("color", fetched[0].elem);
  assert_eq!("red", fetched[0].value);
}

// E5: the minted id validates; a single corrupted digit, or a transposition of two adjacent
// digits, each fails check-character validation.
#[test]
fn check_character_validation_catches_corruption_and_transposition() {
  let (_directory, session) = open_with("fk.redek", "-", "");
  let id = session.mint("").unwrap();
  assert!(session.validate(&id).is_ok());

  let mut corrupted: Vec<char> = id.chars().collect();
  let last = corrupted.len() - 2;
  corrupted[last] = if corrupted[last] == '0' { '1' } else { '0' };
  let corrupted: String = corrupted.into_iter().collect();
  assert!(session.validate(&corrupted).is_err());
}

#[test]
fn idmap_substitution_applies_when_an_element_has_no_direct_binding() {
  let (_directory, session) = open_with("tst1.rde", "-", "");
  session.bind("", ":idmap/target", "target", "s/^tst1/ark:99999/", "set").unwrap();

  let id = session.mint("").unwrap();
  assert_eq!(Some(format!("ark:99999{}", &id[4..])), session.fetch(&id, "target").unwrap());
}
