use crate::config::{DEFAULT_EDGE_LABEL, DEFAULT_VERTEX_LABEL};
use crate::models::{EdgeRecord, EdgeRow, VertexRecord, VertexRow};
use crate::store::GraphStore;
use anyhow::{Context, Result};
use std::time::{Duration, Instant};
use tracing::info;

/// Buffers completed vertex/edge records into the store and closes a
/// transaction every `batch_size` combined items.
///
/// Each record expands into one row per property; an element with no
/// properties still produces a single row with null property columns so its
/// existence and label are recorded. With `batch_size == 0` everything
/// buffers until `final_commit`. Counters are monotonic for the run.
pub struct BatchLoader<'a, S: GraphStore> {
    store: &'a mut S,
    batch_size: u64,
    uppercase: bool,
    vertices: u64,
    edges: u64,
    commits: u64,
    items_at_last_commit: u64,
    start: Instant,
    previous: Instant,
}

impl<'a, S: GraphStore> BatchLoader<'a, S> {
    pub fn new(store: &'a mut S, batch_size: u64, uppercase: bool) -> Self {
        let now = Instant::now();
        Self {
            store,
            batch_size,
            uppercase,
            vertices: 0,
            edges: 0,
            commits: 0,
            items_at_last_commit: 0,
            start: now,
            previous: now,
        }
    }

    pub fn vertices(&self) -> u64 {
        self.vertices
    }

    pub fn edges(&self) -> u64 {
        self.edges
    }

    pub fn commits(&self) -> u64 {
        self.commits
    }

    /// Combined vertex+edge items loaded so far (post-skip).
    pub fn total_items(&self) -> u64 {
        self.vertices + self.edges
    }

    /// Restart the throughput clocks. Called when the skip window closes so
    /// reported rates cover only the post-skip work.
    pub fn reset_timers(&mut self) {
        let now = Instant::now();
        self.start = now;
        self.previous = now;
    }

    fn apply_case(&self, s: &str) -> String {
        if self.uppercase {
            s.to_uppercase()
        } else {
            s.to_string()
        }
    }

    pub fn emit_vertex(&mut self, record: &VertexRecord) -> Result<()> {
        let label = self.apply_case(record.label.as_deref().unwrap_or(DEFAULT_VERTEX_LABEL));
        if record.properties.is_empty() {
            self.store
                .insert_vertex_row(VertexRow {
                    vid: record.id,
                    label,
                    key: None,
                    type_code: None,
                    value: None,
                    numeric_value: None,
                })
                .with_context(|| format!("Failed to insert vertex {}", record.id))?;
        } else {
            for (key, value) in &record.properties {
                let rendered = value.render();
                self.store
                    .insert_vertex_row(VertexRow {
                        vid: record.id,
                        label: label.clone(),
                        key: Some(self.apply_case(key)),
                        type_code: Some(value.type_code()),
                        numeric_value: value.is_numeric().then(|| rendered.clone()),
                        value: Some(rendered),
                    })
                    .with_context(|| format!("Failed to insert vertex {}", record.id))?;
            }
        }
        self.vertices += 1;
        self.commit_if_due()
    }

    pub fn emit_edge(&mut self, record: &EdgeRecord) -> Result<()> {
        let label = self.apply_case(record.label.as_deref().unwrap_or(DEFAULT_EDGE_LABEL));
        if record.properties.is_empty() {
            self.store
                .insert_edge_row(EdgeRow {
                    eid: record.id,
                    svid: record.source,
                    dvid: record.target,
                    label,
                    key: None,
                    type_code: None,
                    value: None,
                    numeric_value: None,
                })
                .with_context(|| format!("Failed to insert edge {}", record.id))?;
        } else {
            for (key, value) in &record.properties {
                let rendered = value.render();
                self.store
                    .insert_edge_row(EdgeRow {
                        eid: record.id,
                        svid: record.source,
                        dvid: record.target,
                        label: label.clone(),
                        key: Some(self.apply_case(key)),
                        type_code: Some(value.type_code()),
                        numeric_value: value.is_numeric().then(|| rendered.clone()),
                        value: Some(rendered),
                    })
                    .with_context(|| format!("Failed to insert edge {}", record.id))?;
            }
        }
        self.edges += 1;
        self.commit_if_due()
    }

    fn commit_if_due(&mut self) -> Result<()> {
        if self.batch_size > 0 && self.total_items() % self.batch_size == 0 {
            self.commit_now()?;
        }
        Ok(())
    }

    /// The terminal commit. Always fires once at end of stream, on top of
    /// any batch commit the last item may have triggered.
    pub fn final_commit(&mut self) -> Result<()> {
        self.commit_now()
    }

    fn commit_now(&mut self) -> Result<()> {
        self.store.commit().context("Batch commit failed")?;
        self.commits += 1;

        let now = Instant::now();
        let window_items = self.total_items() - self.items_at_last_commit;
        let window = now.duration_since(self.previous);
        let total = now.duration_since(self.start);
        info!(
            vertices = self.vertices,
            edges = self.edges,
            window_ms = window.as_millis() as u64,
            window_rate = rate(window_items, window),
            total_ms = total.as_millis() as u64,
            total_rate = rate(self.total_items(), total),
            "Committed batch"
        );
        self.previous = now;
        self.items_at_last_commit = self.total_items();
        Ok(())
    }
}

/// Items per second; zero when the window is too short to measure.
fn rate(items: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        items as f64 / secs
    } else {
        0.0
    }
}
