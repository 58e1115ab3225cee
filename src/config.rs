use anyhow::{Context, Result};
use clap::ValueEnum;

/// Label applied to a vertex that declares none.
pub const DEFAULT_VERTEX_LABEL: &str = "vertex";

/// Label applied to an edge that declares none.
pub const DEFAULT_EDGE_LABEL: &str = "edge";

/// Spinner tick interval while consuming the skip window (items).
pub const SKIP_PROGRESS_INTERVAL: u64 = 1000;

/// What to do with the destination graph before loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LifecycleAction {
    /// Create a new graph; refuse if it already exists.
    Create,
    /// Load into an existing graph as-is.
    Append,
    /// Drop the graph if present, then create it fresh.
    Replace,
    /// Clear an existing graph, keeping its structure.
    Truncate,
}

/// Which GraphML export convention the source file follows.
///
/// The two conventions differ in how identifiers are encoded and which
/// `<data>` keys carry the element label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceFormat {
    /// Neo4j-style export: ids carry a one-character type-tag prefix
    /// (`v12`, `e7`); vertex labels under key `labels` with a leading `:`.
    Neo4j,
    /// Tinkerpop-style export: bare integer ids; labels under `labelV` and
    /// `labelE`, used verbatim.
    Tinkerpop,
}

impl SourceFormat {
    /// The reserved `<data>` key carrying a vertex label.
    pub fn vertex_label_key(self) -> &'static str {
        match self {
            SourceFormat::Neo4j => "labels",
            SourceFormat::Tinkerpop => "labelV",
        }
    }

    /// The reserved `<data>` key carrying an edge label.
    pub fn edge_label_key(self) -> &'static str {
        match self {
            SourceFormat::Neo4j => "label",
            SourceFormat::Tinkerpop => "labelE",
        }
    }

    /// Decode a vertex/edge identifier attribute into its integer form.
    ///
    /// Neo4j-style ids strip the one-character type tag before parsing;
    /// Tinkerpop-style ids parse directly.
    pub fn decode_id(self, raw: &str) -> Result<i64> {
        let digits = match self {
            SourceFormat::Neo4j => raw
                .get(1..)
                .with_context(|| format!("Neo4j identifier too short: {raw:?}"))?,
            SourceFormat::Tinkerpop => raw,
        };
        digits
            .parse::<i64>()
            .with_context(|| format!("Invalid identifier: {raw:?}"))
    }

    /// Resolve a raw vertex-label value to the stored label. Neo4j-style
    /// values drop their leading `:` delimiter; Tinkerpop-style values are
    /// used verbatim. Edge labels are verbatim in both conventions.
    pub fn vertex_label_value(self, raw: &str) -> &str {
        match self {
            SourceFormat::Neo4j => raw.strip_prefix(':').unwrap_or(raw),
            SourceFormat::Tinkerpop => raw,
        }
    }
}

/// Run parameters for one import, handed from the CLI into the pipeline.
#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Name of the graph to create or load into.
    pub graph: String,
    pub action: LifecycleAction,
    pub format: SourceFormat,
    /// Commit interval in combined vertex+edge items (0 = commit once at
    /// the end).
    pub batch_size: u64,
    /// Number of leading items to parse but not load (0 = nothing).
    pub skip_items: u64,
    /// Number of post-skip items to load before stopping (0 = to the end).
    pub num_items: u64,
    /// Build full topology after the load, vs indexes only.
    pub build_topology: bool,
    /// Uppercase all labels and property names on the way out.
    pub uppercase: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            graph: String::new(),
            action: LifecycleAction::Create,
            format: SourceFormat::Tinkerpop,
            batch_size: 0,
            skip_items: 0,
            num_items: 0,
            build_topology: true,
            uppercase: true,
        }
    }
}
