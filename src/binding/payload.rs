//! # Payload
//!
//! Key/value data extracted by handlers and merged into one Secret body.

use k8s_openapi::ByteString;
use std::collections::BTreeMap;

/// Key/value pairs produced by one handler invocation
pub type Fragment = BTreeMap<String, Vec<u8>>;

/// Union of all fragments of one resolution pass
///
/// Keys are kept sorted, so iteration order never depends on how the payload was built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Payload(BTreeMap<String, Vec<u8>>);

impl Payload {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert one entry, replacing any previous value for the key
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) {
        self.0.insert(key.into(), value.into());
    }

    /// Fold a fragment in; its keys overwrite existing ones
    pub fn merge(&mut self, fragment: Fragment) {
        self.0.extend(fragment);
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.0.get(key).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<u8>)> {
        self.0.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Secret `data` representation
    #[must_use]
    pub fn to_secret_data(&self) -> BTreeMap<String, ByteString> {
        self.0
            .iter()
            .map(|(k, v)| (k.clone(), ByteString(v.clone())))
            .collect()
    }
}

impl<K: Into<String>, V: Into<Vec<u8>>> FromIterator<(K, V)> for Payload {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut payload = Payload::new();
        for (k, v) in iter {
            payload.insert(k, v);
        }
        payload
    }
}
