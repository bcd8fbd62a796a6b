// C11 end-to-end: database creation writes a report file and leaves an admin cache a session can
// reopen with the expected shape.

use noid::create::{self, CreateRequest};
use noid::settings::{Backend, Settings};
use noid::store;
use noid::Session;

fn fresh_settings() -> (tempfile::TempDir, Settings) {
  let directory = tempfile::tempdir().unwrap();
  let settings = Settings::new(directory.path(), "db", Backend::Sled);
  (directory, settings)
}

#[test]
fn bind_only_minter_has_no_capacity_line_issue() {
  let (_directory, settings) = fresh_settings();
  let request = CreateRequest {
    contact: "admin@example.org",
    template: "ark",
    term: "-",
    naan: "",
    naa: "",
    subnaa: "",
    longterm_override: None,
    wrap: false,
    addcheckchar_override: None,
  };
  let report = create::create(&settings, &request).unwrap();
  assert!(report.contains("template: ark"));
  assert!(report.contains("capacity: unbounded"));
  pretty_assertions::assert_eq!(report, std::fs::read_to_string(settings.readme_file()).unwrap());
}

#[test]
fn long_term_minter_records_naan_and_properties() {
  let (_directory, settings) = fresh_settings();
  let request = CreateRequest {
    contact: "admin@example.org",
    template: "tst3.rde",
    term: "long",
    naan: "13030",
    naa: "test",
    subnaa: "sub",
    longterm_override: None,
    wrap: false,
    addcheckchar_override: None,
  };
  let report = create::create(&settings, &request).unwrap();
  assert!(report.contains("naan/naa/subnaa: 13030/test/sub"));
  assert!(report.contains("longterm: true"));

  let session = Session::open(&settings, store::Mode::ReadWrite).unwrap();
  assert_eq!(290, session.admin.total);
  assert_eq!("13030/tst3", session.admin.firstpart);
  assert!(session.admin.properties.starts_with('G'));
}

#[test]
fn unbounded_mask_reports_no_capacity() {
  let (_directory, settings) = fresh_settings();
  let request = CreateRequest {
    contact: "admin@example.org",
    template: "ark.zd",
    term: "-",
    naan: "",
    naa: "",
    subnaa: "",
    longterm_override: None,
    wrap: false,
    addcheckchar_override: None,
  };
  let report = create::create(&settings, &request).unwrap();
  assert!(report.contains("capacity: unbounded"));

  let session = Session::open(&settings, store::Mode::ReadWrite).unwrap();
  assert_eq!(noid::settings::Backend::Sled, session.settings().backend);
}
