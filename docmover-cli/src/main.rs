//! DocMover CLI
//!
//! Seeds a workspace and runs the reorganization commands against it.

use clap::{Args, Parser, Subcommand};
use docmover_core::{
    read_outline_file, Document, GraphQuery, OutlinePromoter, Reorganizer, Selection, TreeObserver,
    Workspace,
};
use serde::Serialize;
use std::path::{Path, PathBuf};

mod settings;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Debug, Parser)]
#[command(name = "docmover")]
#[command(about = "DocMover - reference-driven document reorganization", long_about = None)]
struct Cli {
    /// Workspace database (defaults to the stored setting)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create a new workspace database
    Init {
        /// Remember this database as the default
        #[arg(long)]
        set_default: bool,
    },
    /// Create a container (notebook)
    Container { name: String },
    /// Create a document
    Add(AddArgs),
    /// Append a paragraph to a document
    Para { doc: String, text: String },
    /// Record a reference from a block to a document or block
    Link { source: String, target: String },
    /// Move referenced documents under a root and sort them last
    MoveAndSort(MoveAndSortArgs),
    /// Sort every referenced descendant within its own sibling group
    MultiSort { root: String },
    /// Promote outline paragraphs into child documents
    Promote {
        root: String,
        /// JSON file holding an array of outline nodes
        #[arg(long)]
        outline: PathBuf,
    },
    /// Print the document tree below a document or container
    Tree {
        /// Document ID, or a container ID with --container
        id: String,
        #[arg(long)]
        container: bool,
    },
    /// List logged operations
    Ops {
        /// Filter by operation type (e.g. MoveDocument)
        #[arg(long = "type")]
        operation_type: Option<String>,
    },
}

#[derive(Debug, Args)]
struct AddArgs {
    title: String,
    /// Parent document
    #[arg(long, conflicts_with = "container")]
    parent: Option<String>,
    /// Container for a top-level document
    #[arg(long, required_unless_present = "parent")]
    container: Option<String>,
}

#[derive(Debug, Args)]
struct MoveAndSortArgs {
    root: String,
    /// Ordered document IDs to use instead of the root's references
    #[arg(long, value_delimiter = ',', conflicts_with = "from_blocks")]
    bound: Option<Vec<String>>,
    /// Use only the references found in these blocks
    #[arg(long, value_delimiter = ',')]
    from_blocks: Option<Vec<String>>,
    /// Skip relocation and only re-rank
    #[arg(long)]
    only_sort: bool,
}

impl MoveAndSortArgs {
    fn selection(&self) -> Selection {
        match (&self.bound, &self.from_blocks) {
            (Some(ids), _) => Selection::BoundList(ids.clone()),
            (None, Some(blocks)) => Selection::FromBlocks(blocks.clone()),
            (None, None) => Selection::ReferenceScan,
        }
    }
}

/// Tells the user which part of the tree to reload.
struct RefreshHint;

impl TreeObserver for RefreshHint {
    fn tree_changed(&self, root_id: &str) {
        eprintln!("tree under {root_id} changed; refresh any open view");
    }
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    if let Err(e) = run(cli) {
        match e.downcast_ref::<docmover_core::DocMoverError>() {
            Some(core) => eprintln!("Error: {}", core.user_message()),
            None => eprintln!("Error: {}", e),
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> CliResult<()> {
    let db_path = match &cli.db {
        Some(path) => path.clone(),
        None => PathBuf::from(settings::load_settings().database_path),
    };
    log::debug!("using workspace {}", db_path.display());

    if let Commands::Init { set_default } = cli.command {
        return init(&db_path, set_default);
    }

    let mut ws = Workspace::open(&db_path)?;
    let json = cli.json;
    match cli.command {
        Commands::Init { .. } => {}
        Commands::Container { name } => println!("{}", ws.create_container(&name)?),
        Commands::Add(args) => {
            let id = match (&args.parent, &args.container) {
                (Some(parent), _) => ws.create_child_document(parent, &args.title)?,
                (None, Some(container)) => ws.create_top_level_document(container, &args.title)?,
                (None, None) => return Err("either --parent or --container is required".into()),
            };
            println!("{id}");
        }
        Commands::Para { doc, text } => println!("{}", ws.add_paragraph(&doc, &text)?),
        Commands::Link { source, target } => ws.add_reference(&source, &target)?,
        Commands::MoveAndSort(args) => {
            let outcome = Reorganizer::new(&mut ws)
                .with_observer(&RefreshHint)
                .move_and_sort(&args.root, &args.selection(), args.only_sort)?;
            report(json, &outcome, &outcome.summary())?;
        }
        Commands::MultiSort { root } => {
            let outcome = Reorganizer::new(&mut ws)
                .with_observer(&RefreshHint)
                .multi_level_sort(&root)?;
            report(json, &outcome, &outcome.summary())?;
        }
        Commands::Promote { root, outline } => {
            let nodes = read_outline_file(&outline)?;
            let outcome = OutlinePromoter::new(&mut ws)
                .with_observer(&RefreshHint)
                .promote_outline(&root, &nodes)?;
            report(json, &outcome, &outcome.summary())?;
            for failure in &outcome.failures {
                eprintln!("  {} ({}): {}", failure.text, failure.block_id, failure.reason);
            }
        }
        Commands::Tree { id, container } => {
            let top = if container {
                ws.top_level_documents(&id)?
            } else {
                vec![ws.resolve_document(&id)?]
            };
            for doc in &top {
                print_tree(&ws, doc, 0)?;
            }
        }
        Commands::Ops { operation_type } => {
            let ops = ws.list_operations(operation_type.as_deref())?;
            if json {
                println!("{}", serde_json::to_string_pretty(&ops)?);
            } else {
                for op in ops {
                    println!("{}  {}  {}", op.timestamp, op.operation_type, op.operation_id);
                }
            }
        }
    }
    Ok(())
}

fn init(db_path: &Path, set_default: bool) -> CliResult<()> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let ws = Workspace::create(db_path)?;
    println!("Created workspace {} ({})", db_path.display(), ws.store_id());

    if set_default {
        let settings = settings::CliSettings {
            database_path: db_path.to_string_lossy().to_string(),
        };
        settings::save_settings(&settings)?;
    }
    Ok(())
}

fn report<T: Serialize>(json: bool, value: &T, summary: &str) -> CliResult<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{summary}");
    }
    Ok(())
}

fn print_tree(ws: &Workspace, doc: &Document, depth: usize) -> CliResult<()> {
    println!("{}{}  [{}]", "  ".repeat(depth), doc.title, doc.id);
    for child in ws.sorted_children(&doc.id)? {
        print_tree(ws, &child, depth + 1)?;
    }
    Ok(())
}
