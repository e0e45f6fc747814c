//! Fuzz target for the reconciler.
//!
//! Decodes the input into a sequence of events and snapshots and checks
//! that the reconciler never panics and never mutates the replica (or
//! records a change) on an integrity error.

#![no_main]

use libfuzzer_sys::fuzz_target;
use live_table::{
    ChangeEvent, DeletedRow, DynamicRow, ReconcilerConfig, Reconciler, ReplayPolicy, Timestamp,
};

fuzz_target!(|data: &[u8]| {
    let Some((&first, rest)) = data.split_first() else {
        return;
    };

    let policy = if first & 1 == 0 {
        ReplayPolicy::Watermark
    } else {
        ReplayPolicy::PerRow
    };
    let mut reconciler: Reconciler<DynamicRow> = Reconciler::with_config(
        "fuzz",
        ReconcilerConfig {
            replay_policy: policy,
            buffer_warn_threshold: 8,
            record_changes: true,
        },
    );

    for chunk in rest.chunks(4) {
        let [op, id, a, b] = match chunk {
            [op, id, a, b] => [*op, *id, *a, *b],
            _ => return,
        };
        let id = i64::from(id % 8);
        let created = Timestamp::from_micros(i64::from(a));
        let later = Timestamp::from_micros(i64::from(a) + i64::from(b));

        match op % 6 {
            0 => {
                let _ = reconciler.submit_event(ChangeEvent::insert(DynamicRow::new(id, created), created));
            }
            1 => {
                let row = DynamicRow::new(id, created).updated(later);
                let before = reconciler.records().len();
                reconciler.take_changes();
                let result = reconciler.submit_event(ChangeEvent::update(row, later));
                let changes = reconciler.take_changes();
                if result.is_err() {
                    assert_eq!(reconciler.records().len(), before);
                    assert!(changes.is_empty());
                }
            }
            2 => {
                let _ = reconciler.submit_event(ChangeEvent::delete(id, later));
            }
            3 => {
                let event = ChangeEvent::Delete {
                    old: DeletedRow::default(),
                    timestamp: later,
                };
                let _ = reconciler.submit_event(event);
            }
            _ => {
                let rows = (0..(b % 4) as i64)
                    .map(|n| DynamicRow::new((id + n) % 8, created))
                    .collect();
                let report = reconciler.submit_snapshot(rows);
                assert!(reconciler.is_live());
                assert_eq!(reconciler.buffered_len(), 0);
                assert!(report.replayed + report.discarded >= report.changed);
            }
        }
    }

    // Copy-on-read: the returned rows are always unique by id.
    let records = reconciler.records();
    let mut ids: Vec<_> = records.iter().map(|r| r.id.clone()).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), records.len());
});
