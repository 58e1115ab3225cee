use crate::models::{EdgeRow, VertexRow};
use anyhow::{bail, Context, Result};
use csv::WriterBuilder;
use std::fs::{self, File, OpenOptions};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const VERTEX_HEADER: [&str; 6] = ["vid", "label", "key", "type", "value", "numeric_value"];
const EDGE_HEADER: [&str; 8] = [
    "eid",
    "svid",
    "dvid",
    "label",
    "key",
    "type",
    "value",
    "numeric_value",
];

const WRITE_BUFFER_SIZE: usize = 128 * 1024;

/// The storage collaborator behind the import pipeline.
///
/// A store instance is scoped to one destination graph, named at
/// construction. Row inserts buffer; `commit` makes everything buffered so
/// far durable as one transaction. Rows inserted after the last successful
/// commit are lost on failure and must be replayed with a skip count.
pub trait GraphStore {
    fn graph_exists(&self) -> Result<bool>;
    fn create_graph(&mut self) -> Result<()>;
    fn clear_graph(&mut self) -> Result<()>;
    /// Dropping a graph that does not exist is not an error.
    fn drop_graph(&mut self) -> Result<()>;
    fn insert_vertex_row(&mut self, row: VertexRow) -> Result<()>;
    fn insert_edge_row(&mut self, row: EdgeRow) -> Result<()>;
    /// Flush both pending batches (either may be empty) and close a
    /// transaction boundary.
    fn commit(&mut self) -> Result<()>;
    /// Post-load finish step: full topology build, or indexes only.
    fn finish_graph(&mut self, build_topology: bool) -> Result<()>;
}

type CsvWriter = csv::Writer<BufWriter<File>>;

/// File-based graph store: one directory per graph holding `vertices.csv`
/// and `edges.csv` with header rows. Null columns render as empty fields.
///
/// Appending to an existing graph reopens the files in append mode; commit
/// writes the pending rows and flushes, so everything up to the last commit
/// survives a crash.
pub struct CsvDirStore {
    dir: PathBuf,
    vertices: Option<CsvWriter>,
    edges: Option<CsvWriter>,
    pending_vertices: Vec<VertexRow>,
    pending_edges: Vec<EdgeRow>,
}

impl CsvDirStore {
    pub fn new(root: &Path, graph: &str) -> Self {
        Self {
            dir: root.join(graph),
            vertices: None,
            edges: None,
            pending_vertices: Vec::new(),
            pending_edges: Vec::new(),
        }
    }

    fn vertices_path(&self) -> PathBuf {
        self.dir.join("vertices.csv")
    }

    fn edges_path(&self) -> PathBuf {
        self.dir.join("edges.csv")
    }

    fn fresh_writer(path: &Path, header: &[&str]) -> Result<CsvWriter> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        let mut writer = WriterBuilder::new()
            .has_headers(false)
            .from_writer(BufWriter::with_capacity(WRITE_BUFFER_SIZE, file));
        writer
            .write_record(header)
            .with_context(|| format!("Failed to write header to {}", path.display()))?;
        Ok(writer)
    }

    fn append_writer(path: &Path) -> Result<CsvWriter> {
        let file = OpenOptions::new()
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open {} for append", path.display()))?;
        Ok(WriterBuilder::new()
            .has_headers(false)
            .from_writer(BufWriter::with_capacity(WRITE_BUFFER_SIZE, file)))
    }

    /// Create the graph directory and both table files with headers,
    /// truncating anything already there.
    fn create_files(&mut self) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create graph directory {}", self.dir.display()))?;
        self.vertices = Some(Self::fresh_writer(&self.vertices_path(), &VERTEX_HEADER)?);
        self.edges = Some(Self::fresh_writer(&self.edges_path(), &EDGE_HEADER)?);
        Ok(())
    }

    /// Lazily open writers on the first insert path that needs them: append
    /// to existing table files, or create them fresh.
    fn ensure_writers(&mut self) -> Result<()> {
        if self.vertices.is_some() && self.edges.is_some() {
            return Ok(());
        }
        if self.vertices_path().exists() && self.edges_path().exists() {
            self.vertices = Some(Self::append_writer(&self.vertices_path())?);
            self.edges = Some(Self::append_writer(&self.edges_path())?);
            Ok(())
        } else {
            self.create_files()
        }
    }
}

impl GraphStore for CsvDirStore {
    fn graph_exists(&self) -> Result<bool> {
        Ok(self.dir.is_dir())
    }

    fn create_graph(&mut self) -> Result<()> {
        info!(dir = %self.dir.display(), "Creating graph tables");
        self.create_files()
    }

    fn clear_graph(&mut self) -> Result<()> {
        info!(dir = %self.dir.display(), "Clearing graph tables");
        self.pending_vertices.clear();
        self.pending_edges.clear();
        self.create_files()
    }

    fn drop_graph(&mut self) -> Result<()> {
        self.vertices = None;
        self.edges = None;
        self.pending_vertices.clear();
        self.pending_edges.clear();
        if self.dir.is_dir() {
            info!(dir = %self.dir.display(), "Dropping graph tables");
            fs::remove_dir_all(&self.dir)
                .with_context(|| format!("Failed to drop graph at {}", self.dir.display()))?;
        } else {
            debug!(dir = %self.dir.display(), "Graph does not exist, nothing to drop");
        }
        Ok(())
    }

    fn insert_vertex_row(&mut self, row: VertexRow) -> Result<()> {
        self.pending_vertices.push(row);
        Ok(())
    }

    fn insert_edge_row(&mut self, row: EdgeRow) -> Result<()> {
        self.pending_edges.push(row);
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.ensure_writers()?;
        let vertices = self
            .vertices
            .as_mut()
            .context("Vertex table writer unavailable")?;
        for row in self.pending_vertices.drain(..) {
            vertices
                .serialize(&row)
                .with_context(|| format!("Failed to write vertex row for vid {}", row.vid))?;
        }
        vertices.flush().context("Failed to flush vertex table")?;

        let edges = self
            .edges
            .as_mut()
            .context("Edge table writer unavailable")?;
        for row in self.pending_edges.drain(..) {
            edges
                .serialize(&row)
                .with_context(|| format!("Failed to write edge row for eid {}", row.eid))?;
        }
        edges.flush().context("Failed to flush edge table")?;
        Ok(())
    }

    fn finish_graph(&mut self, build_topology: bool) -> Result<()> {
        // The CSV backend keeps no topology tables or indexes.
        if build_topology {
            info!("CSV backend has no topology tables, skipping topology build");
        } else {
            info!("CSV backend has no indexes, skipping index build");
        }
        Ok(())
    }
}

/// In-memory store used by the test suite. Records rows per commit boundary
/// and every lifecycle call, and can inject insert/commit failures.
#[derive(Debug, Default)]
pub struct MemoryStore {
    pub exists: bool,
    pub creates: u32,
    pub clears: u32,
    pub drops: u32,
    pub finished: Option<bool>,
    pub pending_vertices: Vec<VertexRow>,
    pub pending_edges: Vec<EdgeRow>,
    pub vertex_rows: Vec<VertexRow>,
    pub edge_rows: Vec<EdgeRow>,
    /// Combined rows flushed at each commit, in commit order.
    pub commit_sizes: Vec<usize>,
    /// Fail the insert once this many rows have been accepted.
    pub fail_after_rows: Option<usize>,
    pub fail_commit: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commits(&self) -> usize {
        self.commit_sizes.len()
    }

    fn accepted_rows(&self) -> usize {
        self.vertex_rows.len()
            + self.edge_rows.len()
            + self.pending_vertices.len()
            + self.pending_edges.len()
    }

    fn check_insert(&self) -> Result<()> {
        if let Some(limit) = self.fail_after_rows {
            if self.accepted_rows() >= limit {
                bail!("Simulated insert failure after {limit} rows");
            }
        }
        Ok(())
    }
}

impl GraphStore for MemoryStore {
    fn graph_exists(&self) -> Result<bool> {
        Ok(self.exists)
    }

    fn create_graph(&mut self) -> Result<()> {
        self.exists = true;
        self.creates += 1;
        Ok(())
    }

    fn clear_graph(&mut self) -> Result<()> {
        self.clears += 1;
        self.pending_vertices.clear();
        self.pending_edges.clear();
        self.vertex_rows.clear();
        self.edge_rows.clear();
        Ok(())
    }

    fn drop_graph(&mut self) -> Result<()> {
        self.exists = false;
        self.drops += 1;
        self.pending_vertices.clear();
        self.pending_edges.clear();
        self.vertex_rows.clear();
        self.edge_rows.clear();
        Ok(())
    }

    fn insert_vertex_row(&mut self, row: VertexRow) -> Result<()> {
        self.check_insert()?;
        self.pending_vertices.push(row);
        Ok(())
    }

    fn insert_edge_row(&mut self, row: EdgeRow) -> Result<()> {
        self.check_insert()?;
        self.pending_edges.push(row);
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        if self.fail_commit {
            bail!("Simulated commit failure");
        }
        let flushed = self.pending_vertices.len() + self.pending_edges.len();
        self.vertex_rows.append(&mut self.pending_vertices);
        self.edge_rows.append(&mut self.pending_edges);
        self.commit_sizes.push(flushed);
        Ok(())
    }

    fn finish_graph(&mut self, build_topology: bool) -> Result<()> {
        self.finished = Some(build_topology);
        Ok(())
    }
}
