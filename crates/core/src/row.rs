//! Typed CSV row and the natural key used for deduplication.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of fields a well-formed row carries.
pub const ROW_FIELDS: usize = 4;

/// One accepted input row. Fields are trimmed; `email` keeps the case it
/// was typed in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    pub name: String,
    pub email: String,
    pub address: String,
    pub contact_no: String,
}

impl Row {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        address: impl Into<String>,
        contact_no: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into().trim().to_string(),
            email: email.into().trim().to_string(),
            address: address.into().trim().to_string(),
            contact_no: contact_no.into().trim().to_string(),
        }
    }

    /// Build a row from raw fields. Returns `None` unless exactly
    /// [`ROW_FIELDS`] fields are present and the name and email are
    /// non-empty after trimming.
    pub fn from_fields<S: AsRef<str>>(fields: &[S]) -> Option<Self> {
        let row = match fields {
            [name, email, address, contact_no] => Self::new(
                name.as_ref(),
                email.as_ref(),
                address.as_ref(),
                contact_no.as_ref(),
            ),
            _ => return None,
        };
        if row.name.is_empty() || row.email.is_empty() {
            return None;
        }
        Some(row)
    }

    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey::new(&self.name, &self.email)
    }
}

/// `{name, lower(email)}`: the uniqueness criterion for records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NaturalKey {
    pub name: String,
    pub email: String,
}

impl NaturalKey {
    pub fn new(name: &str, email: &str) -> Self {
        Self {
            name: name.trim().to_string(),
            email: email.trim().to_lowercase(),
        }
    }
}

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}>", self.name, self.email)
    }
}
