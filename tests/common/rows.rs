//! Typed test rows and change event builders.

use live_table::{ChangeEvent, LiveUpdate, Row, RowId, Timestamp};
use tokio::sync::mpsc;

/// Timestamp from microseconds.
pub fn ts(micros: i64) -> Timestamp {
    Timestamp::from_micros(micros)
}

/// The `thing` table: an id, a name and the two timestamp columns.
#[derive(Debug, Clone, PartialEq)]
pub struct ThingRow {
    pub id: i64,
    pub name: String,
    pub created_at: Timestamp,
    pub updated_at: Option<Timestamp>,
}

impl Row for ThingRow {
    fn id(&self) -> RowId {
        RowId::Int(self.id)
    }

    fn created_at(&self) -> Timestamp {
        self.created_at
    }

    fn updated_at(&self) -> Option<Timestamp> {
        self.updated_at
    }
}

/// A never-updated row created at `created`.
pub fn thing(id: i64, name: &str, created: i64) -> ThingRow {
    ThingRow {
        id,
        name: name.to_string(),
        created_at: ts(created),
        updated_at: None,
    }
}

/// A row created at `created` and last updated at `updated`.
pub fn thing_updated(id: i64, name: &str, created: i64, updated: i64) -> ThingRow {
    ThingRow {
        updated_at: Some(ts(updated)),
        ..thing(id, name, created)
    }
}

/// INSERT committed at the row's effective timestamp.
pub fn insert(row: ThingRow) -> ChangeEvent<ThingRow> {
    let at = row.effective_timestamp();
    ChangeEvent::insert(row, at)
}

/// UPDATE committed at the row's effective timestamp.
pub fn update(row: ThingRow) -> ChangeEvent<ThingRow> {
    let at = row.effective_timestamp();
    ChangeEvent::update(row, at)
}

/// DELETE of `id` committed at `at`.
pub fn delete(id: i64, at: i64) -> ChangeEvent<ThingRow> {
    ChangeEvent::delete(id, ts(at))
}

/// `(id, name)` pairs sorted by id.
pub fn names(records: &[ThingRow]) -> Vec<(i64, String)> {
    let mut pairs: Vec<(i64, String)> = records.iter().map(|r| (r.id, r.name.clone())).collect();
    pairs.sort();
    pairs
}

/// Shorthand for building expected `(id, name)` lists.
pub fn expect(pairs: &[(i64, &str)]) -> Vec<(i64, String)> {
    pairs.iter().map(|(id, name)| (*id, name.to_string())).collect()
}

/// Everything currently queued in a sink channel.
pub fn drain_updates(rx: &mut mpsc::UnboundedReceiver<LiveUpdate<ThingRow>>) -> Vec<LiveUpdate<ThingRow>> {
    let mut updates = Vec::new();
    while let Ok(update) = rx.try_recv() {
        updates.push(update);
    }
    updates
}
