// The database creator (C11): validates inputs, writes every admin key from a freshly parsed
// template, partitions the sub-counters, derives the GRANITE properties mnemonic, and emits (and
// persists) a human-readable creation report.

use crate::admin::Term;
use crate::error::{Error, Result};
use crate::session::Session;
use crate::settings::Settings;
use crate::store;
use crate::template::{self, Mode, NOLIMIT};
use std::sync::Arc;

const SUBCOUNTER_BUCKETS: u64 = 293;

pub struct CreateRequest<'a> {
  pub contact: &'a str,
  pub template: &'a str,
  pub term: &'a str,
  pub naan: &'a str,
  pub naa: &'a str,
  pub subnaa: &'a str,
  pub longterm_override: Option<bool>,
  pub wrap: bool,
  pub addcheckchar_override: Option<bool>,
}

/// `create(settings, contact, template, term, naan, naa, subnaa)`: step 1 input validation, step 2
/// template parse, step 3 backend creation, step 4 admin key writes and sub-counter
/// initialization, step 5 properties derivation, step 6 report emission (returned, and written to
/// `<data_dir>/<db_name>/README`).
pub fn create(settings: &Settings, request: &CreateRequest) -> Result<String> {
  if request.contact.is_empty() {
    return Err(Error::BadInput("contact must be non-empty".to_string()));
  }
  let term = Term::parse(request.term)?;
  let longterm = request.longterm_override.unwrap_or(matches!(term, Term::Long));
  if matches!(term, Term::Long) {
    if !is_five_digits(request.naan) {
      return Err(Error::BadInput(format!("naan must be a 5-digit number for term=long, got {:?}", request.naan)));
    }
    if request.naa.is_empty() || request.subnaa.is_empty() {
      return Err(Error::BadInput("naa and subnaa must be non-empty for term=long".to_string()));
    }
  }

  let parsed = template::parse(request.template)?;

  let session = Session::open(settings, store::Mode::Create)?;
  let mut session = Arc::try_unwrap(session)
    .map_err(|_| Error::Config("database creation requires exclusive access to the session".to_string()))?;

  write_admin(&session, &parsed, request, longterm)?;
  session.reload_admin()?;

  let report = render_report(&session.admin, settings);
  std::fs::write(settings.readme_file(), &report)?;
  Ok(report)
}

fn is_five_digits(value: &str) -> bool {
  value.len() == 5 && value.bytes().all(|byte| byte.is_ascii_digit())
}

fn write_admin(
  session: &Session,
  parsed: &template::Template,
  request: &CreateRequest,
  longterm: bool,
) -> Result<()> {
  let firstpart = parsed.firstpart(request.naan);
  let capacity = parsed.mask.as_ref().and_then(|mask| mask.capacity());
  let total = capacity.map(|capacity| capacity as i64).unwrap_or(NOLIMIT);
  let oatop = total;
  let mode = parsed.mask.as_ref().map(|mask| mask.mode);
  let generator_type = match mode {
    Some(Mode::Random) => "random",
    Some(Mode::Sequential) | Some(Mode::SequentialUnbounded) | None => "sequential",
  };
  let addcheckchar = request
    .addcheckchar_override
    .unwrap_or_else(|| parsed.mask.as_ref().map(|mask| mask.check).unwrap_or(false));
  let checkrepertoire = parsed.mask.as_ref().and_then(|mask| mask.check_repertoire());
  let padwidth = parsed
    .mask
    .as_ref()
    .map(|mask| mask.repertoires.len())
    .unwrap_or(0);

  let percounter = if generator_type == "random" && total != NOLIMIT {
    ((total as u64) + SUBCOUNTER_BUCKETS - 1) / SUBCOUNTER_BUCKETS
  } else {
    0
  };
  let counter_count = if percounter > 0 {
    ((total as u64) + percounter - 1) / percounter
  } else {
    0
  };

  let mut entries: Vec<(String, String)> = vec![
    ("template".to_string(), parsed.to_template_string()),
    ("prefix".to_string(), parsed.prefix.clone()),
    (
      "mask".to_string(),
      parsed.mask.as_ref().map(|mask| mask.to_mask_string()).unwrap_or_default(),
    ),
    ("firstpart".to_string(), firstpart),
    ("generator_type".to_string(), generator_type.to_string()),
    (
      "generator_random".to_string(),
      if generator_type == "random" { crate::lcg::GENERATOR_NAME.to_string() } else { String::new() },
    ),
    ("total".to_string(), total.to_string()),
    ("oatop".to_string(), oatop.to_string()),
    ("padwidth".to_string(), padwidth.to_string()),
    ("percounter".to_string(), percounter.to_string()),
    ("longterm".to_string(), longterm.to_string()),
    ("wrap".to_string(), request.wrap.to_string()),
    ("addcheckchar".to_string(), addcheckchar.to_string()),
    (
      "checkrepertoire".to_string(),
      checkrepertoire.map(|repertoire| repertoire.letter().to_string()).unwrap_or_default(),
    ),
    ("naan".to_string(), request.naan.to_string()),
    ("naa".to_string(), request.naa.to_string()),
    ("subnaa".to_string(), request.subnaa.to_string()),
    ("genonly".to_string(), "true".to_string()),
    ("oacounter".to_string(), "0".to_string()),
    ("held".to_string(), "0".to_string()),
    ("queued".to_string(), "0".to_string()),
    ("pregenerated".to_string(), "0".to_string()),
    ("fseqnum".to_string(), "1".to_string()),
    ("gseqnum".to_string(), "1".to_string()),
    ("gseqnum_date".to_string(), String::new()),
    ("pregen_head".to_string(), "0".to_string()),
    ("pregen_tail".to_string(), "0".to_string()),
  ];

  let mut names = Vec::with_capacity(counter_count as usize);
  let mut remaining = total.max(0) as u64;
  for index in 0..counter_count {
    let top = remaining.min(percounter);
    remaining -= top;
    entries.push((format!("c{index}/value"), "0".to_string()));
    entries.push((format!("c{index}/top"), top.to_string()));
    names.push(format!("c{index}"));
  }
  let saclist = if names.is_empty() { String::new() } else { format!("{} ", names.join(" ")) };
  entries.push(("saclist".to_string(), saclist));
  entries.push(("siclist".to_string(), String::new()));

  let properties = granite(request, &parsed, generator_type, longterm, addcheckchar);
  entries.push(("properties".to_string(), properties));

  for (name, value) in &entries {
    session.set_admin_key(name, value)?;
  }
  Ok(())
}

/// The seven-letter durability mnemonic: **G**enuine NAAN, **R**andom generator, no triple vowel-
/// elided **A** run, lo**N**g-term, no hyphen **I**n prefix, check character **T**, no-vowel
/// r**E**pertoires only. A `-` stands in for any letter whose condition doesn't hold.
fn granite(request: &CreateRequest, parsed: &template::Template, generator_type: &str, longterm: bool, addcheckchar: bool) -> String {
  let mut mnemonic = String::with_capacity(7);
  mnemonic.push(if is_five_digits(request.naan) { 'G' } else { '-' });
  mnemonic.push(if generator_type == "random" { 'R' } else { '-' });
  mnemonic.push(if !has_triple_vowel_elided_run(&parsed.to_template_string()) { 'A' } else { '-' });
  mnemonic.push(if longterm { 'N' } else { '-' });
  mnemonic.push(if !parsed.prefix.contains('-') { 'I' } else { '-' });
  mnemonic.push(if addcheckchar { 'T' } else { '-' });
  let only_no_vowel_repertoires = parsed
    .mask
    .as_ref()
    .map(|mask| {
      mask
        .repertoires
        .iter()
        .all(|repertoire| matches!(repertoire, crate::codec::Repertoire::Digit | crate::codec::Repertoire::ExtendedLower))
    })
    .unwrap_or(false);
  mnemonic.push(if only_no_vowel_repertoires { 'E' } else { '-' });
  mnemonic
}

/// Three or more consecutive alphabetic characters with no vowel among them: a run where vowels
/// have been "elided" the way the `e`/`E` repertoires elide them from their alphabets.
fn has_triple_vowel_elided_run(text: &str) -> bool {
  let mut run = 0;
  for byte in text.bytes() {
    if byte.is_ascii_alphabetic() {
      if matches!(byte.to_ascii_lowercase(), b'a' | b'e' | b'i' | b'o' | b'u') {
        run = 0;
      } else {
        run += 1;
        if run >= 3 {
          return true;
        }
      }
    } else {
      run = 0;
    }
  }
  false
}

fn render_report(admin: &crate::admin::Admin, settings: &Settings) -> String {
  format!(
    "noid database created\n\
     directory: {}\n\
     template: {}\n\
     firstpart: {}\n\
     generator: {}\n\
     capacity: {}\n\
     longterm: {}\n\
     wrap: {}\n\
     naan/naa/subnaa: {}/{}/{}\n\
     properties: {}\n",
    settings.directory().display(),
    admin.template.to_template_string(),
    admin.firstpart,
    admin.generator_type.as_str(),
    if admin.total == NOLIMIT { "unbounded".to_string() } else { admin.total.to_string() },
    admin.longterm,
    admin.wrap,
    admin.naan,
    admin.naa,
    admin.subnaa,
    admin.properties,
  )
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::settings::Backend;

  #[test]
  fn creates_a_sequential_minter_and_writes_a_readme() {
    let directory = tempfile::tempdir().unwrap();
    let settings = Settings::new(directory.path(), "db", Backend::Sled);
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
    let report = create(&settings, &request).unwrap();
    assert!(report.contains("template: .sdd"));
    assert!(settings.readme_file().exists());
  }

  #[test]
  fn rejects_long_term_without_a_five_digit_naan() {
    let directory = tempfile::tempdir().unwrap();
    let settings = Settings::new(directory.path(), "db", Backend::Sled);
    let request = CreateRequest {
      contact: "admin@example.org",
      template: "tst3.rde",
      term: "long",
      naan: "123",
      naa: "test",
      subnaa: "sub",
      longterm_override: None,
      wrap: false,
      addcheckchar_override: None,
    };
    assert!(create(&settings, &request).is_err());
  }

  #[test]
  fn creates_a_random_minter_with_partitioned_subcounters() {
    let directory = tempfile::tempdir().unwrap();
    let settings = Settings::new(directory.path(), "db", Backend::Sled);
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
    let report = create(&settings, &request).unwrap();
    assert!(report.contains("capacity: 290"));

    let session = Session::open(&settings, store::Mode::ReadWrite).unwrap();
    assert_eq!(290, session.admin.counter_count);
    assert_eq!(1, session.admin.percounter);
    assert!(session.admin.properties.starts_with('G'));
  }
}
