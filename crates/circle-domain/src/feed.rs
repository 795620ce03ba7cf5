use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::event::{Cursor, EventKind, EventOrder, LedgerEvent};

/// A feed row annotated with point-in-time balance information.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FeedItem {
    pub id: Uuid,
    pub kind: EventKind,
    pub circle_id: Uuid,
    pub user_id: Uuid,
    /// Negative for debits, positive for credits and checkpoints.
    pub amount: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balance_after: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff_from_previous: Option<i64>,
    pub timestamp: DateTime<Utc>,
    pub sequence: u64,
}

impl FeedItem {
    /// Builds an unannotated item from a stored event.
    pub fn from_event(event: &LedgerEvent) -> Self {
        Self {
            id: event.id,
            kind: event.kind(),
            circle_id: event.circle_id,
            user_id: event.user_id,
            amount: event.signed_amount(),
            balance_after: None,
            diff_from_previous: None,
            timestamp: event.timestamp,
            sequence: event.sequence,
        }
    }

    pub fn order(&self) -> EventOrder {
        EventOrder {
            timestamp: self.timestamp,
            sequence: self.sequence,
            id: self.id,
        }
    }
}

/// One page of a feed, newest first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct FeedPage {
    pub items: Vec<FeedItem>,
    pub has_more: bool,
    /// Cursor that fetches the next older page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<Cursor>,
    /// Balance of each circle immediately before its oldest item on this page.
    #[serde(default)]
    pub anchors: BTreeMap<Uuid, i64>,
}

impl FeedPage {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
