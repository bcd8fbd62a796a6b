// Key-space layout (§3): two namespaces share one ordered byte-string map. Administrative keys
// begin with the two-byte prefix `R/`; identifier keys are `<id>\t<suffix>`, where `\t` (0x09)
// cannot appear in any identifier because the codec alphabets never include it.

pub const ADMIN_PREFIX: &[u8] = b"R/";
pub const ELEM_SEP: u8 = b'\t';

pub fn admin_key(name: &str) -> Vec<u8> {
  let mut key = ADMIN_PREFIX.to_vec();
  key.extend_from_slice(name.as_bytes());
  key
}

pub fn note_key(name: &str) -> Vec<u8> {
  admin_key(&format!("R/{name}"))
}

pub fn counter_value_key(index: usize) -> Vec<u8> {
  admin_key(&format!("c{index}/value"))
}

pub fn counter_top_key(index: usize) -> Vec<u8> {
  admin_key(&format!("c{index}/top"))
}

/// `<id>\t<elem>`, the user-binding key. `elem` must not begin with `R/` (those sub-keys are
/// reserved for the per-identifier entities below).
pub fn elem_key(id: &str, elem: &str) -> Vec<u8> {
  let mut key = id.as_bytes().to_vec();
  key.push(ELEM_SEP);
  key.extend_from_slice(elem.as_bytes());
  key
}

pub fn id_prefix(id: &str) -> Vec<u8> {
  let mut key = id.as_bytes().to_vec();
  key.push(ELEM_SEP);
  key
}

pub fn circulation_key(id: &str) -> Vec<u8> {
  elem_key(id, "R/c")
}

pub fn hold_key(id: &str) -> Vec<u8> {
  elem_key(id, "R/h")
}

pub fn pepper_key(id: &str) -> Vec<u8> {
  elem_key(id, "R/p")
}

/// A per-identifier sub-key, as opposed to a user element binding (used to distinguish the two
/// when scanning `<id>\t` ranges for `fetch`).
pub fn is_reserved_elem(elem: &[u8]) -> bool {
  elem.starts_with(b"R/")
}

pub const QUEUE_PREFIX: &[u8] = b"R/q/";

/// `R/q/<qdate>/<seqnum>/<paddedid>`. `qdate` is a 14-digit UTC timestamp (or all zeros for the
/// reserved lane), `seqnum` is 6 digits, `paddedid` is the identifier's numeric suffix zero-padded
/// to `padwidth`.
pub fn queue_key(qdate: &str, seqnum: u32, padded_id: &str) -> Vec<u8> {
  let mut key = QUEUE_PREFIX.to_vec();
  key.extend_from_slice(qdate.as_bytes());
  key.push(b'/');
  key.extend_from_slice(format!("{seqnum:06}").as_bytes());
  key.push(b'/');
  key.extend_from_slice(padded_id.as_bytes());
  key
}

pub const PREGEN_PREFIX: &[u8] = b"R/p/";

pub fn pregen_slot_key(index: u64) -> Vec<u8> {
  let mut key = PREGEN_PREFIX.to_vec();
  key.extend_from_slice(index.to_string().as_bytes());
  key
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn elem_key_separates_id_and_element() {
    assert_eq!(b"13030/tst394\tcolor".to_vec(), elem_key("13030/tst394", "color"));
  }

  #[test]
  fn circulation_and_hold_keys_are_reserved() {
    assert!(is_reserved_elem(b"R/c"));
    assert!(is_reserved_elem(b"R/h"));
    assert!(!is_reserved_elem(b"color"));
  }

  #[test]
  fn queue_key_sorts_lexicographically_by_date_then_seqnum() {
    let earlier = queue_key("20260101000000", 1, "000005");
    let later = queue_key("20260101000000", 2, "000001");
    assert!(earlier < later);
    let reserved = queue_key("00000000000000", 1, "000000");
    assert!(reserved < earlier);
  }
}
