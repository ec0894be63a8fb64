//! Handler registry.
//!
//! Per direction, an ordered list of buckets keyed by substituted pattern
//! text. Handlers whose patterns expand to the same text share a bucket and
//! run in bucket order. Empty buckets are removed on detach.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use super::{CompiledPattern, Direction, Event, Handler, HandlerId, Pattern};
use crate::bot::Settings;
use crate::error::PatternError;

struct Entry {
    id: HandlerId,
    pattern: Pattern,
    handler: Arc<dyn Handler>,
}

struct Bucket {
    compiled: CompiledPattern,
    entries: Vec<Entry>,
}

#[derive(Default)]
struct Tables {
    directions: [Vec<Bucket>; 4],
}

/// A handler selected for a line, with its event.
pub struct WorkItem {
    pub handler: Arc<dyn Handler>,
    pub event: Event,
}

/// Pattern → handler registry.
#[derive(Default)]
pub struct Registry {
    tables: Mutex<Tables>,
    next_id: AtomicU64,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `handler` to `pattern`.
    ///
    /// With `priority`, a new bucket goes to the front of its direction and
    /// the handler goes to the front of an existing bucket.
    pub fn attach(
        &self,
        pattern: Pattern,
        handler: Arc<dyn Handler>,
        priority: bool,
        settings: &Settings,
    ) -> Result<HandlerId, PatternError> {
        let text = pattern.expand(settings)?;
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let direction = pattern.direction();

        let mut tables = self.tables.lock();
        let buckets = &mut tables.directions[direction.index()];

        let entry = Entry {
            id,
            pattern,
            handler,
        };

        if let Some(bucket) = buckets.iter_mut().find(|b| b.compiled.text() == text) {
            if priority {
                bucket.entries.insert(0, entry);
            } else {
                bucket.entries.push(entry);
            }
        } else {
            let bucket = Bucket {
                compiled: CompiledPattern::new(text)?,
                entries: vec![entry],
            };
            if priority {
                buckets.insert(0, bucket);
            } else {
                buckets.push(bucket);
            }
        }

        debug!(handler = %id, %direction, priority, "Handler attached");
        Ok(id)
    }

    /// Remove a handler. Returns false if it was not attached.
    pub fn detach(&self, id: HandlerId) -> bool {
        let mut tables = self.tables.lock();
        for buckets in tables.directions.iter_mut() {
            let Some(index) = buckets
                .iter()
                .position(|b| b.entries.iter().any(|e| e.id == id))
            else {
                continue;
            };
            let bucket = &mut buckets[index];
            bucket.entries.retain(|e| e.id != id);
            if bucket.entries.is_empty() {
                buckets.remove(index);
            }
            debug!(handler = %id, "Handler detached");
            return true;
        }
        false
    }

    /// Rebuild every bucket against new settings, keeping handler order.
    ///
    /// On error nothing changes.
    pub fn recompile(&self, settings: &Settings) -> Result<(), PatternError> {
        let mut tables = self.tables.lock();
        let mut rebuilt: [Vec<(String, Vec<usize>)>; 4] = Default::default();

        for (dir, buckets) in tables.directions.iter().enumerate() {
            let mut flat = 0;
            for bucket in buckets {
                for entry in &bucket.entries {
                    let text = entry.pattern.expand(settings)?;
                    match rebuilt[dir].iter_mut().find(|(t, _)| *t == text) {
                        Some((_, members)) => members.push(flat),
                        None => rebuilt[dir].push((text, vec![flat])),
                    }
                    flat += 1;
                }
            }
        }

        let mut cache: HashMap<String, CompiledPattern> = HashMap::new();
        for bucket in tables.directions.iter().flatten() {
            cache.insert(bucket.compiled.text().to_string(), bucket.compiled.clone());
        }
        let mut compiled: [Vec<CompiledPattern>; 4] = Default::default();
        for (dir, layout) in rebuilt.iter().enumerate() {
            for (text, _) in layout {
                let pattern = match cache.get(text) {
                    Some(existing) => existing.clone(),
                    None => CompiledPattern::new(text.clone())?,
                };
                compiled[dir].push(pattern);
            }
        }

        for (dir, (layout, patterns)) in rebuilt.into_iter().zip(compiled).enumerate() {
            let mut entries: Vec<Option<Entry>> = std::mem::take(&mut tables.directions[dir])
                .into_iter()
                .flat_map(|b| b.entries)
                .map(Some)
                .collect();
            tables.directions[dir] = layout
                .into_iter()
                .zip(patterns)
                .map(|((_, members), compiled)| Bucket {
                    compiled,
                    entries: members
                        .into_iter()
                        .filter_map(|i| entries[i].take())
                        .collect(),
                })
                .collect();
        }

        debug!("Handler registry recompiled");
        Ok(())
    }

    /// Snapshot the handlers matching `line`, in invocation order.
    pub fn matches(&self, line: &str, direction: Direction) -> Vec<WorkItem> {
        let tables = self.tables.lock();
        let line: Arc<str> = Arc::from(line);
        let mut items = Vec::new();
        for bucket in &tables.directions[direction.index()] {
            let Some(fields) = bucket.compiled.captures(&line) else {
                continue;
            };
            for entry in &bucket.entries {
                items.push(WorkItem {
                    handler: Arc::clone(&entry.handler),
                    event: Event {
                        line: Arc::clone(&line),
                        direction,
                        fields: fields.clone(),
                        handler_id: entry.id,
                        dcc: None,
                    },
                });
            }
        }
        items
    }

    /// Number of buckets for `direction`.
    pub fn len(&self, direction: Direction) -> usize {
        self.tables.lock().directions[direction.index()].len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.lock().directions.iter().all(Vec::is_empty)
    }

    /// Number of handlers attached for `direction`.
    pub fn handler_count(&self, direction: Direction) -> usize {
        self.tables.lock().directions[direction.index()]
            .iter()
            .map(|b| b.entries.len())
            .sum()
    }

    /// Substituted pattern text of each bucket, in order.
    pub fn buckets(&self, direction: Direction) -> Vec<String> {
        self.tables.lock().directions[direction.index()]
            .iter()
            .map(|b| b.compiled.text().to_string())
            .collect()
    }

    /// Handler ids of each bucket, in order.
    pub fn handlers(&self, direction: Direction) -> Vec<Vec<HandlerId>> {
        self.tables.lock().directions[direction.index()]
            .iter()
            .map(|b| b.entries.iter().map(|e| e.id).collect())
            .collect()
    }

    pub fn is_attached(&self, id: HandlerId) -> bool {
        self.tables
            .lock()
            .directions
            .iter()
            .flatten()
            .any(|b| b.entries.iter().any(|e| e.id == id))
    }
}
