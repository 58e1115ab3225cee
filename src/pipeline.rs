use crate::config::{ImportOptions, LifecycleAction};
use crate::loader::BatchLoader;
use crate::parser::{self, GraphmlParser};
use crate::store::GraphStore;
use anyhow::{bail, Context, Result};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Totals reported after a completed import run.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportSummary {
    pub vertices: u64,
    pub edges: u64,
    pub commits: u64,
    pub import_secs: f64,
    pub finish_secs: f64,
}

/// Run one import end to end: graph lifecycle, stream open, parse-and-load,
/// final commit, post-load finish step.
///
/// Lifecycle and stream-open failures happen before any row is written.
/// Later failures abort the run; rows committed in earlier batches stay
/// durable and can be replayed past with a skip count.
pub fn run_import<S: GraphStore>(
    input: &Path,
    options: &ImportOptions,
    store: &mut S,
) -> Result<ImportSummary> {
    prepare_graph(options, store)?;

    let source = parser::open_source(input)?;
    info!(file = %input.display(), graph = %options.graph, "Processing file");

    let start = Instant::now();
    let mut loader = BatchLoader::new(store, options.batch_size, options.uppercase);
    let mut graphml = GraphmlParser::new(options.format, options.skip_items, options.num_items);
    graphml.run(source, &mut loader)?;
    loader.final_commit()?;

    let vertices = loader.vertices();
    let edges = loader.edges();
    let commits = loader.commits();
    let import_secs = start.elapsed().as_secs_f64();
    info!(
        graph = %options.graph,
        vertices,
        edges,
        secs = import_secs,
        "Graph imported"
    );

    let finish_start = Instant::now();
    if options.build_topology {
        info!("Creating topology and indexes");
    } else {
        info!("Creating indexes");
    }
    store
        .finish_graph(options.build_topology)
        .with_context(|| format!("Failed to finish graph {:?}", options.graph))?;
    let finish_secs = finish_start.elapsed().as_secs_f64();
    info!(secs = finish_secs, "Finish step complete");

    Ok(ImportSummary {
        vertices,
        edges,
        commits,
        import_secs,
        finish_secs,
    })
}

/// Apply the requested lifecycle action before any data is read.
fn prepare_graph<S: GraphStore>(options: &ImportOptions, store: &mut S) -> Result<()> {
    match options.action {
        LifecycleAction::Create => {
            if store.graph_exists()? {
                bail!(
                    "Graph {:?} already exists\n\
                     Use '--action append' to add to the existing graph\n\
                     Use '--action truncate' to clear it before importing\n\
                     Use '--action replace' to drop and re-create it",
                    options.graph
                );
            }
            info!(graph = %options.graph, "Creating graph");
            store
                .create_graph()
                .with_context(|| format!("Failed to create graph {:?}", options.graph))?;
        }
        LifecycleAction::Truncate => {
            if !store.graph_exists()? {
                bail!(
                    "Cannot truncate graph {:?}: it does not exist\n\
                     Use '--action create' to create it",
                    options.graph
                );
            }
            info!(graph = %options.graph, "Clearing graph");
            store
                .clear_graph()
                .with_context(|| format!("Failed to clear graph {:?}", options.graph))?;
        }
        LifecycleAction::Replace => {
            info!(graph = %options.graph, "Replacing graph");
            store
                .drop_graph()
                .with_context(|| format!("Failed to drop graph {:?}", options.graph))?;
            store
                .create_graph()
                .with_context(|| format!("Failed to create graph {:?}", options.graph))?;
        }
        LifecycleAction::Append => {
            debug!(graph = %options.graph, "Appending to graph");
        }
    }
    Ok(())
}
