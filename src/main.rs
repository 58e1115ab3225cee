use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use theseus::config::{ImportOptions, LifecycleAction, SourceFormat};
use theseus::pipeline;
use theseus::store::CsvDirStore;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "theseus")]
#[command(about = "Import GraphML files into relational property-graph tables")]
struct Cli {
    /// GraphML file to import (.graphml, or .bz2 for compressed input)
    #[arg(short, long)]
    filename: PathBuf,

    /// Name of the graph to create or load into
    #[arg(short, long)]
    graph: String,

    /// Root directory holding the graph tables
    #[arg(short, long, default_value = "graphs")]
    output: PathBuf,

    /// What to do with the destination graph before loading
    #[arg(short, long, value_enum, default_value_t = LifecycleAction::Create)]
    action: LifecycleAction,

    /// Source export convention
    #[arg(short = 't', long, value_enum, default_value_t = SourceFormat::Tinkerpop)]
    format: SourceFormat,

    /// Commit interval in items (0 = only commit at the end)
    #[arg(short, long, default_value_t = 0)]
    batchsize: u64,

    /// Number of items to skip (0 = nothing to skip)
    #[arg(short, long, default_value_t = 0)]
    skip_items: u64,

    /// Number of items to read (0 = until the end)
    #[arg(short, long, default_value_t = 0)]
    num_items: u64,

    /// Populate topology tables after the load (false = indexes only)
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    topology: bool,

    /// Uppercase all property names and labels
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    uppercase: bool,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn run(cli: Cli) -> Result<()> {
    let options = ImportOptions {
        graph: cli.graph.clone(),
        action: cli.action,
        format: cli.format,
        batch_size: cli.batchsize,
        skip_items: cli.skip_items,
        num_items: cli.num_items,
        build_topology: cli.topology,
        uppercase: cli.uppercase,
    };

    let mut store = CsvDirStore::new(&cli.output, &cli.graph);
    let summary = pipeline::run_import(&cli.filename, &options, &mut store)?;

    println!();
    println!("=== Summary ===");
    println!("Import time:        {:.2}s", summary.import_secs);
    println!("Finish time:        {:.2}s", summary.finish_secs);
    println!("Vertices loaded:    {}", summary.vertices);
    println!("Edges loaded:       {}", summary.edges);
    println!("Commits:            {}", summary.commits);

    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    match run(cli) {
        Ok(()) => {
            info!("Completed successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Error: {:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
