// Small helpers for the mutable admin scalars (`oacounter`, `held`, `queued`, `pregenerated`,
// `fseqnum`, `gseqnum`, `gseqnum_date`, sub-counter values...) that C5 deliberately excludes from
// the read-through cache: every read goes straight to the store.

use crate::error::{Error, Result};
use crate::keys;
use crate::store::Store;

pub fn get_i64(store: &dyn Store, name: &str) -> Result<i64> {
  match store.get(&keys::admin_key(name))? {
    Some(bytes) => {
      let text = String::from_utf8(bytes).map_err(|error| Error::Io(error.to_string()))?;
      text
        .parse()
        .map_err(|_| Error::Io(format!("admin key R/{name} is not an integer: {text:?}")))
    }
    None => Err(Error::Io(format!("missing mutable admin key R/{name}"))),
  }
}

pub fn get_i64_or(store: &dyn Store, name: &str, default: i64) -> Result<i64> {
  match store.get(&keys::admin_key(name))? {
    Some(_) => get_i64(store, name),
    None => Ok(default),
  }
}

pub fn set_i64(store: &mut dyn Store, name: &str, value: i64) -> Result<()> {
  store.set(&keys::admin_key(name), value.to_string().as_bytes())
}

pub fn get_string_or(store: &dyn Store, name: &str, default: &str) -> Result<String> {
  match store.get(&keys::admin_key(name))? {
    Some(bytes) => String::from_utf8(bytes).map_err(|error| Error::Io(error.to_string())),
    None => Ok(default.to_string()),
  }
}

pub fn set_string(store: &mut dyn Store, name: &str, value: &str) -> Result<()> {
  store.set(&keys::admin_key(name), value.as_bytes())
}

pub fn increment(store: &mut dyn Store, name: &str, delta: i64) -> Result<i64> {
  let next = get_i64_or(store, name, 0)? + delta;
  set_i64(store, name, next)?;
  Ok(next)
}
