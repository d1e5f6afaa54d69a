use std::fmt::Display;

/// Ordered query parameters for a Bitrix24 REST call.
///
/// Bitrix parses PHP-style keys, so list values are sent as repeated `key[]` pairs
/// and filters as `filter[FIELD]`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Params {
    pairs: Vec<(String, String)>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a scalar parameter, replacing an earlier value under the same key.
    pub fn set(mut self, key: &str, value: impl Display) -> Self {
        self.put(key, value);
        self
    }

    pub fn filter(self, field: &str, value: impl Display) -> Self {
        self.set(&format!("filter[{field}]"), value)
    }

    pub fn list(mut self, key: &str, values: &[&str]) -> Self {
        let key = format!("{key}[]");
        self.pairs.retain(|(k, _)| k != &key);
        self.pairs
            .extend(values.iter().map(|v| (key.clone(), v.to_string())));
        self
    }

    /// In-place variant of [`Params::set`], used by the paginator for `start`.
    pub fn put(&mut self, key: &str, value: impl Display) {
        let value = value.to_string();
        match self.pairs.iter_mut().find(|(k, _)| k == key) {
            Some(slot) => slot.1 = value,
            None => self.pairs.push((key.to_string(), value)),
        }
    }

    #[cfg(test)]
    pub(crate) fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }
}
