//! Drop snapshots whose watched keys did not change.

use log::trace;

use crate::value::FormValue;

/// Returns `true` when `prev` and `next` agree on every key in `keys`.
///
/// A key missing from both snapshots counts as equal; missing from only one
/// counts as a change. With no keys at all the whole snapshots are compared
/// through their JSON serialization.
///
/// # Example
///
/// ```
/// use formwatch::{FormValue, distinct::keys_unchanged};
///
/// let a = FormValue::new().with("email", "a@b.c").with("note", "x");
/// let b = FormValue::new().with("email", "a@b.c").with("note", "y");
///
/// assert!(keys_unchanged(&a, &b, &["email"]));
/// assert!(!keys_unchanged(&a, &b, &["email", "note"]));
/// ```
pub fn keys_unchanged<K: AsRef<str>>(prev: &FormValue, next: &FormValue, keys: &[K]) -> bool {
    if keys.is_empty() {
        return serialized_eq(prev, next);
    }
    keys.iter()
        .all(|key| prev.get(key.as_ref()) == next.get(key.as_ref()))
}

fn serialized_eq(prev: &FormValue, next: &FormValue) -> bool {
    match (serde_json::to_string(prev), serde_json::to_string(next)) {
        (Ok(a), Ok(b)) => a == b,
        // Unserializable snapshots are never treated as duplicates.
        _ => false,
    }
}

/// Stateful stage that remembers the last accepted snapshot.
///
/// The first snapshot is always accepted. Later ones are accepted only if a
/// watched key differs from the previously *accepted* snapshot.
#[derive(Debug, Clone)]
pub struct DistinctUntilKeysChanged {
    keys: Vec<String>,
    last: Option<FormValue>,
}

impl DistinctUntilKeysChanged {
    /// Create a stage watching `keys`.
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
            last: None,
        }
    }

    /// The watched keys.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Decide whether `value` passes, remembering it if so.
    pub fn accept(&mut self, value: &FormValue) -> bool {
        if let Some(last) = &self.last
            && keys_unchanged(last, value, &self.keys)
        {
            trace!("[distinct] watched keys unchanged, dropping");
            return false;
        }
        self.last = Some(value.clone());
        true
    }
}
