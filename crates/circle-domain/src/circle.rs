use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A group that shares one ledger. `current_balance` is a denormalized cache of the
/// reconstructed balance over the circle's full event log, in minor currency units.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Circle {
    pub id: Uuid,
    pub name: String,
    pub currency: String,
    #[serde(default)]
    pub current_balance: i64,
    pub created_at: DateTime<Utc>,
}

impl Circle {
    /// Creates a new circle with a zero balance.
    pub fn new(name: impl Into<String>, currency: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            currency: currency.into().trim().to_ascii_uppercase(),
            current_balance: 0,
            created_at,
        }
    }
}
