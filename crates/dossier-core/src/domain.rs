use std::fmt;

/// Bitrix24 CRM deal id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DealId(pub u64);

impl fmt::Display for DealId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Bitrix24 user id, kept as the API returned it (string or number).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct UserId(pub String);

/// Identifier of an open-line chat conversation attached to a deal.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DialogId(pub String);
