use super::{Mode, Store};
use crate::error::{Error, Result};
use crate::settings::Settings;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;
use std::collections::BTreeMap;
use std::fs;
use std::io::Cursor;

/// The document-oriented backend: `<noid><entry k="...">...</entry></noid>`, with the key carried
/// as a base64 attribute and the value as base64 element text, since neither is guaranteed to be
/// valid XML on its own. Everything lives in an in-memory `BTreeMap` between `open` and `close`, so
/// ordering is enforced in memory rather than relied upon from the file format.
#[derive(Debug)]
pub struct XmlStore {
  path: std::path::PathBuf,
  entries: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl XmlStore {
  pub fn open(settings: &Settings, _mode: Mode) -> Result<Self> {
    let path = settings.backend_file();
    let entries = if path.exists() {
      read_document(&path)?
    } else {
      BTreeMap::new()
    };
    Ok(XmlStore { path, entries })
  }
}

impl Store for XmlStore {
  fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
    Ok(self.entries.get(key).cloned())
  }

  fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
    self.entries.insert(key.to_vec(), value.to_vec());
    Ok(())
  }

  fn delete(&mut self, key: &[u8]) -> Result<()> {
    self.entries.remove(key);
    Ok(())
  }

  fn range(&self, prefix: &[u8], limit: Option<usize>) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
    let mut out = Vec::new();
    for (key, value) in self.entries.range(prefix.to_vec()..) {
      if !key.starts_with(prefix) {
        break;
      }
      out.push((key.clone(), value.clone()));
      if let Some(limit) = limit {
        if out.len() >= limit {
          break;
        }
      }
    }
    Ok(out)
  }

  fn close(self: Box<Self>) -> Result<()> {
    write_document(&self.path, &self.entries)
  }
}

fn read_document(path: &std::path::Path) -> Result<BTreeMap<Vec<u8>, Vec<u8>>> {
  let mut reader = Reader::from_file(path)?;
  reader.config_mut().trim_text(true);
  let mut entries = BTreeMap::new();
  let mut buf = Vec::new();
  let mut current_key: Option<Vec<u8>> = None;
  loop {
    match reader.read_event_into(&mut buf)? {
      Event::Start(tag) if tag.name().as_ref() == b"entry" => {
        let key_attr = tag
          .attributes()
          .flatten()
          .find(|attr| attr.key.as_ref() == b"k")
          .ok_or_else(|| Error::Io("xml store: entry missing k attribute".to_string()))?;
        current_key = Some(BASE64.decode(key_attr.value.as_ref())?);
      }
      Event::Text(text) if current_key.is_some() => {
        let value = BASE64.decode(text.into_inner().as_ref())?;
        entries.insert(current_key.take().unwrap(), value);
      }
      Event::Empty(tag) if tag.name().as_ref() == b"entry" => {
        let key_attr = tag
          .attributes()
          .flatten()
          .find(|attr| attr.key.as_ref() == b"k")
          .ok_or_else(|| Error::Io("xml store: entry missing k attribute".to_string()))?;
        entries.insert(BASE64.decode(key_attr.value.as_ref())?, Vec::new());
      }
      Event::Eof => break,
      _ => {}
    }
    buf.clear();
  }
  Ok(entries)
}

fn write_document(path: &std::path::Path, entries: &BTreeMap<Vec<u8>, Vec<u8>>) -> Result<()> {
  let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
  writer.write_event(Event::Start(BytesStart::new("noid")))?;
  for (key, value) in entries {
    let mut entry = BytesStart::new("entry");
    entry.push_attribute(("k", BASE64.encode(key).as_str()));
    writer.write_event(Event::Start(entry))?;
    writer.write_event(Event::Text(BytesText::new(&BASE64.encode(value))))?;
    writer.write_event(Event::End(quick_xml::events::BytesEnd::new("entry")))?;
  }
  writer.write_event(Event::End(quick_xml::events::BytesEnd::new("noid")))?;
  fs::write(path, writer.into_inner().into_inner())?;
  Ok(())
}
