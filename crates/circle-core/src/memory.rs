use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, RwLock},
};

use circle_domain::{Circle, LedgerEvent};
use tracing::debug;
use uuid::Uuid;

use crate::{
    store::{CircleLog, CircleWork, EventQuery, EventStore},
    CoreError, CoreResult,
};

type Slot = Arc<Mutex<CircleLog>>;

/// In-process event store. Each circle sits behind its own mutex so writers to one circle
/// are serialized while other circles stay available.
#[derive(Debug, Default)]
pub struct MemoryEventStore {
    circles: RwLock<BTreeMap<Uuid, Slot>>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store with a previously persisted log, replacing any existing entry.
    pub fn load(&self, log: CircleLog) -> CoreResult<()> {
        let mut circles = self.circles.write().map_err(|_| poisoned())?;
        circles.insert(log.circle.id, Arc::new(Mutex::new(log)));
        Ok(())
    }

    /// Runs `work` against a staged copy of the circle and calls `commit` with the result
    /// before publishing it. Nothing is published if either step fails.
    pub fn write_circle_with<F>(
        &self,
        circle_id: Uuid,
        work: &mut CircleWork<'_>,
        commit: F,
    ) -> CoreResult<()>
    where
        F: FnOnce(&CircleLog) -> CoreResult<()>,
    {
        let slot = self.slot(circle_id)?;
        let mut guard = slot.lock().map_err(|_| poisoned())?;
        let mut staged = guard.clone();
        work(&mut staged)?;
        commit(&staged)?;
        debug!(
            circle = %circle_id,
            events = staged.events.len(),
            balance = staged.circle.current_balance,
            "committed circle unit of work"
        );
        *guard = staged;
        Ok(())
    }

    /// Inserts a new circle, calling `commit` with its empty log first.
    pub fn insert_circle_with<F>(&self, circle: Circle, commit: F) -> CoreResult<()>
    where
        F: FnOnce(&CircleLog) -> CoreResult<()>,
    {
        let mut circles = self.circles.write().map_err(|_| poisoned())?;
        if circles.contains_key(&circle.id) {
            return Err(CoreError::CircleExists(circle.id));
        }
        let log = CircleLog::new(circle);
        commit(&log)?;
        circles.insert(log.circle.id, Arc::new(Mutex::new(log)));
        Ok(())
    }

    fn slot(&self, circle_id: Uuid) -> CoreResult<Slot> {
        let circles = self.circles.read().map_err(|_| poisoned())?;
        circles
            .get(&circle_id)
            .cloned()
            .ok_or(CoreError::CircleNotFound(circle_id))
    }

    fn slots(&self) -> CoreResult<Vec<Slot>> {
        let circles = self.circles.read().map_err(|_| poisoned())?;
        Ok(circles.values().cloned().collect())
    }
}

impl EventStore for MemoryEventStore {
    fn circles(&self) -> CoreResult<Vec<Circle>> {
        self.slots()?
            .iter()
            .map(|slot| {
                slot.lock()
                    .map(|log| log.circle.clone())
                    .map_err(|_| poisoned())
            })
            .collect()
    }

    fn circle(&self, id: Uuid) -> CoreResult<Circle> {
        Ok(self.snapshot(id)?.circle)
    }

    fn insert_circle(&self, circle: Circle) -> CoreResult<()> {
        self.insert_circle_with(circle, |_| Ok(()))
    }

    fn list_events(&self, query: &EventQuery) -> CoreResult<Vec<LedgerEvent>> {
        let mut events: Vec<LedgerEvent> = Vec::new();
        for circle_id in &query.circles {
            let slot = match self.slot(*circle_id) {
                Ok(slot) => slot,
                Err(CoreError::CircleNotFound(_)) => continue,
                Err(err) => return Err(err),
            };
            let log = slot.lock().map_err(|_| poisoned())?;
            events.extend(query.apply(log.events.iter()));
        }
        Ok(query.apply(events.iter()))
    }

    fn snapshot(&self, circle_id: Uuid) -> CoreResult<CircleLog> {
        let slot = self.slot(circle_id)?;
        let log = slot.lock().map_err(|_| poisoned())?;
        Ok(log.clone())
    }

    fn write_circle(&self, circle_id: Uuid, work: &mut CircleWork<'_>) -> CoreResult<()> {
        self.write_circle_with(circle_id, work, |_| Ok(()))
    }
}

fn poisoned() -> CoreError {
    CoreError::Storage("event store lock poisoned".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use circle_domain::{Checkpoint, EventPayload};

    fn store_with_circle() -> (MemoryEventStore, Uuid) {
        let store = MemoryEventStore::new();
        let circle = Circle::new("Home", "EUR", Utc::now());
        let id = circle.id;
        store.insert_circle(circle).unwrap();
        (store, id)
    }

    #[test]
    fn failed_work_is_not_committed() {
        let (store, id) = store_with_circle();
        let result = store.write_circle(id, &mut |log: &mut CircleLog| {
            log.circle.current_balance = 999;
            Err(CoreError::Validation("abort".into()))
        });
        assert!(result.is_err());
        assert_eq!(store.circle(id).unwrap().current_balance, 0);
    }

    #[test]
    fn duplicate_circle_is_rejected() {
        let (store, id) = store_with_circle();
        let mut again = store.circle(id).unwrap();
        again.name = "Again".into();
        assert!(matches!(
            store.insert_circle(again),
            Err(CoreError::CircleExists(existing)) if existing == id
        ));
    }

    #[test]
    fn latest_checkpoint_respects_bound() {
        let (store, id) = store_with_circle();
        let now = Utc::now();
        let mut ids = Vec::new();
        for (offset, amount) in [(3, 100), (2, 200), (1, 300)] {
            store
                .write_circle(id, &mut |log: &mut CircleLog| {
                    let sequence = log.allocate_sequence();
                    let event = LedgerEvent::new(
                        id,
                        Uuid::nil(),
                        now - chrono::Duration::hours(offset),
                        sequence,
                        EventPayload::Checkpoint(Checkpoint {
                            amount,
                            note: None,
                            diff_from_previous: None,
                        }),
                    );
                    ids.push(event.order());
                    log.events.push(event);
                    Ok(())
                })
                .unwrap();
        }
        let newest = store.latest_checkpoint(id, None).unwrap().unwrap();
        assert_eq!(newest.as_checkpoint().unwrap().amount, 300);

        let bound = circle_domain::Cursor::Event(ids[2]);
        let before = store.latest_checkpoint(id, Some(&bound)).unwrap().unwrap();
        assert_eq!(before.as_checkpoint().unwrap().amount, 200);
    }
}
