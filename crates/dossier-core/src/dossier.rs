use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Map, Value};

/// Resources collected for one deal, in the order they are fetched.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceKey {
    Deal,
    Contact,
    User,
    Timeline,
    Activities,
    DialogMessages,
    OpenlineDialog,
}

impl ResourceKey {
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKey::Deal => "deal",
            ResourceKey::Contact => "contact",
            ResourceKey::User => "user",
            ResourceKey::Timeline => "timeline",
            ResourceKey::Activities => "activities",
            ResourceKey::DialogMessages => "dialog_messages",
            ResourceKey::OpenlineDialog => "openline_dialog",
        }
    }
}

/// Outcome of one resource step.
///
/// `Missing` and `Failed` are in-band markers for optional resources that could not
/// be fetched; they serialize as `{"info": ..}` and `{"error": ..}` respectively.
#[derive(Clone, Debug, PartialEq)]
pub enum Slot {
    Fetched(Value),
    Missing(String),
    Failed(String),
}

impl Slot {
    /// Stand-in for a resource the dossier does not hold.
    pub fn empty() -> Self {
        Slot::Fetched(Value::Object(Map::new()))
    }

    pub fn to_value(&self) -> Value {
        match self {
            Slot::Fetched(v) => v.clone(),
            Slot::Missing(info) => json!({ "info": info }),
            Slot::Failed(error) => json!({ "error": error }),
        }
    }

    /// Inverse of [`Slot::to_value`]: single-key `info`/`error` objects become markers.
    pub fn from_value(v: Value) -> Self {
        if let Value::Object(map) = &v {
            if map.len() == 1 {
                if let Some(Value::String(info)) = map.get("info") {
                    return Slot::Missing(info.clone());
                }
                if let Some(Value::String(error)) = map.get("error") {
                    return Slot::Failed(error.clone());
                }
            }
        }
        Slot::Fetched(v)
    }

    pub fn as_fetched(&self) -> Option<&Value> {
        match self {
            Slot::Fetched(v) => Some(v),
            _ => None,
        }
    }
}

impl Serialize for Slot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Slot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Slot::from_value)
    }
}

/// Whether a record field counts as set: not null, not `false`, not numeric zero and
/// not an empty string, list or object. The string `"0"` is set.
pub fn is_truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64() != Some(0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Accumulated result of one deal aggregation run.
///
/// Keys are write-once. A set `error` means the run was aborted; slots filled before
/// the abort are still valid.
#[derive(Clone, Debug, Default)]
pub struct Dossier {
    slots: Vec<(ResourceKey, Slot)>,
    error: Option<String>,
}

impl Dossier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `slot` under `key`. Returns `false` (and keeps the old slot) when the key
    /// is already populated.
    pub fn insert(&mut self, key: ResourceKey, slot: Slot) -> bool {
        if self.contains(key) {
            tracing::warn!(key = key.as_str(), "dossier key already set; keeping first value");
            return false;
        }
        self.slots.push((key, slot));
        true
    }

    pub fn contains(&self, key: ResourceKey) -> bool {
        self.slots.iter().any(|(k, _)| *k == key)
    }

    pub fn get(&self, key: ResourceKey) -> Option<&Slot> {
        self.slots.iter().find(|(k, _)| *k == key).map(|(_, s)| s)
    }

    /// Fetched JSON under `key`, skipping marker slots.
    pub fn value(&self, key: ResourceKey) -> Option<&Value> {
        self.get(key).and_then(Slot::as_fetched)
    }

    pub fn keys(&self) -> impl Iterator<Item = ResourceKey> + '_ {
        self.slots.iter().map(|(k, _)| *k)
    }

    /// Record the fatal error that stopped the run. The first error wins.
    pub fn abort(&mut self, error: impl Into<String>) {
        if self.error.is_none() {
            self.error = Some(error.into());
        }
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}
