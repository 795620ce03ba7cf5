//! Ledger events: the closed set of things that can happen to a circle's balance.

use std::{fmt, str::FromStr};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One entry of a circle's append-only log. Common fields live here; the kind-specific
/// payload is a closed tagged union serialized under the `kind` discriminant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerEvent {
    pub id: Uuid,
    pub circle_id: Uuid,
    pub user_id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// Creation sequence assigned by the store; breaks ties between equal timestamps.
    pub sequence: u64,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl LedgerEvent {
    pub fn new(
        circle_id: Uuid,
        user_id: Uuid,
        timestamp: DateTime<Utc>,
        sequence: u64,
        payload: EventPayload,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            circle_id,
            user_id,
            timestamp,
            sequence,
            payload,
        }
    }

    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    /// Position of the event in the total order used by every read path.
    pub fn order(&self) -> EventOrder {
        EventOrder {
            timestamp: self.timestamp,
            sequence: self.sequence,
            id: self.id,
        }
    }

    /// UTC calendar date of the event.
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }

    /// Amount as shown in feeds: negative for debits, positive otherwise.
    pub fn signed_amount(&self) -> i64 {
        match &self.payload {
            EventPayload::Checkpoint(checkpoint) => checkpoint.amount,
            EventPayload::Debit(debit) => -debit.amount,
            EventPayload::Credit(credit) => credit.amount,
        }
    }

    pub fn as_checkpoint(&self) -> Option<&Checkpoint> {
        match &self.payload {
            EventPayload::Checkpoint(checkpoint) => Some(checkpoint),
            _ => None,
        }
    }

    pub fn as_debit(&self) -> Option<&Debit> {
        match &self.payload {
            EventPayload::Debit(debit) => Some(debit),
            _ => None,
        }
    }

    pub fn tags(&self) -> &[String] {
        match &self.payload {
            EventPayload::Checkpoint(_) => &[],
            EventPayload::Debit(debit) => &debit.tags,
            EventPayload::Credit(credit) => &credit.tags,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventPayload {
    Checkpoint(Checkpoint),
    Debit(Debit),
    Credit(Credit),
}

impl EventPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            EventPayload::Checkpoint(_) => EventKind::Checkpoint,
            EventPayload::Debit(_) => EventKind::Debit,
            EventPayload::Credit(_) => EventKind::Credit,
        }
    }
}

/// Absolute balance declaration that overrides the running balance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Checkpoint {
    pub amount: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Delta against the preceding checkpoint of the same circle, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff_from_previous: Option<i64>,
}

/// An expense. `amount` is a positive magnitude.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Debit {
    pub amount: i64,
    #[serde(default)]
    pub category: DebitCategory,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place: Option<String>,
}

/// An income. `amount` is a positive magnitude.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credit {
    pub amount: i64,
    #[serde(default)]
    pub category: CreditCategory,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Checkpoint,
    Debit,
    Credit,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EventKind::Checkpoint => "checkpoint",
            EventKind::Debit => "debit",
            EventKind::Credit => "credit",
        };
        f.write_str(label)
    }
}

/// Which event kinds a store query should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindFilter {
    pub checkpoints: bool,
    pub debits: bool,
    pub credits: bool,
}

impl KindFilter {
    pub fn all() -> Self {
        Self {
            checkpoints: true,
            debits: true,
            credits: true,
        }
    }

    pub fn only(kind: EventKind) -> Self {
        Self {
            checkpoints: kind == EventKind::Checkpoint,
            debits: kind == EventKind::Debit,
            credits: kind == EventKind::Credit,
        }
    }

    /// Relative entries only (debits and credits).
    pub fn deltas() -> Self {
        Self {
            checkpoints: false,
            debits: true,
            credits: true,
        }
    }

    pub fn contains(&self, kind: EventKind) -> bool {
        match kind {
            EventKind::Checkpoint => self.checkpoints,
            EventKind::Debit => self.debits,
            EventKind::Credit => self.credits,
        }
    }
}

impl Default for KindFilter {
    fn default() -> Self {
        Self::all()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum DebitCategory {
    Food,
    Transport,
    Housing,
    Utilities,
    Health,
    Entertainment,
    Shopping,
    Travel,
    #[default]
    Other,
}

impl FromStr for DebitCategory {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "food" => Ok(DebitCategory::Food),
            "transport" => Ok(DebitCategory::Transport),
            "housing" => Ok(DebitCategory::Housing),
            "utilities" => Ok(DebitCategory::Utilities),
            "health" => Ok(DebitCategory::Health),
            "entertainment" => Ok(DebitCategory::Entertainment),
            "shopping" => Ok(DebitCategory::Shopping),
            "travel" => Ok(DebitCategory::Travel),
            "other" => Ok(DebitCategory::Other),
            other => Err(format!("unknown debit category `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum CreditCategory {
    Salary,
    Gift,
    Refund,
    Transfer,
    Sale,
    #[default]
    Other,
}

impl FromStr for CreditCategory {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "salary" => Ok(CreditCategory::Salary),
            "gift" => Ok(CreditCategory::Gift),
            "refund" => Ok(CreditCategory::Refund),
            "transfer" => Ok(CreditCategory::Transfer),
            "sale" => Ok(CreditCategory::Sale),
            "other" => Ok(CreditCategory::Other),
            other => Err(format!("unknown credit category `{other}`")),
        }
    }
}

/// Total order over events: timestamp, then creation sequence, then id.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventOrder {
    pub timestamp: DateTime<Utc>,
    pub sequence: u64,
    pub id: Uuid,
}

impl fmt::Display for EventOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.timestamp.to_rfc3339(), self.sequence, self.id)
    }
}

/// A position in the event stream used as an exclusive bound.
///
/// `At` compares on timestamp alone; `Event` compares on the full [`EventOrder`], which is
/// what pagination hands back so that ties at a page boundary are handled exactly once.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Cursor {
    At { timestamp: DateTime<Utc> },
    Event(EventOrder),
}

impl Cursor {
    pub fn at(timestamp: DateTime<Utc>) -> Self {
        Cursor::At { timestamp }
    }

    /// True when `order` lies strictly before this cursor.
    pub fn is_after(&self, order: &EventOrder) -> bool {
        match self {
            Cursor::At { timestamp } => order.timestamp < *timestamp,
            Cursor::Event(bound) => order < bound,
        }
    }

    /// True when `order` lies strictly after this cursor.
    pub fn is_before(&self, order: &EventOrder) -> bool {
        match self {
            Cursor::At { timestamp } => order.timestamp > *timestamp,
            Cursor::Event(bound) => order > bound,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Cursor::At { timestamp } => *timestamp,
            Cursor::Event(order) => order.timestamp,
        }
    }
}

impl From<EventOrder> for Cursor {
    fn from(order: EventOrder) -> Self {
        Cursor::Event(order)
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cursor::At { timestamp } => f.write_str(&timestamp.to_rfc3339()),
            Cursor::Event(order) => order.fmt(f),
        }
    }
}

impl FromStr for Cursor {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let mut parts = value.trim().split('/');
        let timestamp = parts
            .next()
            .ok_or_else(|| "empty cursor".to_string())
            .and_then(|raw| {
                DateTime::parse_from_rfc3339(raw)
                    .map(|ts| ts.with_timezone(&Utc))
                    .map_err(|err| format!("invalid cursor timestamp `{raw}`: {err}"))
            })?;
        match (parts.next(), parts.next(), parts.next()) {
            (None, _, _) => Ok(Cursor::At { timestamp }),
            (Some(sequence), Some(id), None) => {
                let sequence = sequence
                    .parse::<u64>()
                    .map_err(|err| format!("invalid cursor sequence `{sequence}`: {err}"))?;
                let id = Uuid::parse_str(id).map_err(|err| format!("invalid cursor id `{id}`: {err}"))?;
                Ok(Cursor::Event(EventOrder {
                    timestamp,
                    sequence,
                    id,
                }))
            }
            _ => Err(format!("malformed cursor `{value}`")),
        }
    }
}

/// Trims tags, drops empty ones and removes duplicates while keeping first-seen order.
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut normalized: Vec<String> = Vec::new();
    for tag in tags {
        let trimmed = tag.as_ref().trim();
        if trimmed.is_empty() || normalized.iter().any(|existing| existing == trimmed) {
            continue;
        }
        normalized.push(trimmed.to_string());
    }
    normalized
}
