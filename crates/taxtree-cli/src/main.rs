//! Taxonomy tree maintenance CLI.
//!
//! Provides the `taxtree` binary with subcommands for merging a second
//! taxonomy into a database, garbage-collecting unannotated structure,
//! ingesting genome annotation files, and validating tree integrity.
//!
//! Uses the same `taxtree_merge` pipeline whichever source is supplied,
//! so database and flat-file merges behave identically.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use taxtree_merge::{
    annotate_from_file, clean, merge_with_database, merge_with_file, MergeError, MergeOptions,
};
use taxtree_storage::{SqliteStore, TreeStore};

/// Taxonomy tree maintenance tools.
#[derive(Parser)]
#[command(name = "taxtree", about = "Taxonomy tree maintenance tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Merge a second taxonomy into an anchor node of the database.
    Merge {
        /// Path to the taxonomy database file.
        #[arg(short, long)]
        db: PathBuf,

        /// Name of the existing node to graft under.
        #[arg(short, long)]
        anchor: String,

        /// Path to a modification database to merge from.
        #[arg(long, conflicts_with = "mod_file")]
        mod_db: Option<PathBuf>,

        /// Path to a flat delta file to merge from.
        #[arg(long)]
        mod_file: Option<PathBuf>,

        /// Delete descendants of the anchor missing from the source.
        #[arg(long)]
        replace: bool,

        /// Field separator for flat files.
        #[arg(long, default_value = "\t")]
        separator: String,

        /// Print the resulting counters as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Remove all nodes and links not needed by a genome annotation.
    Clean {
        /// Path to the taxonomy database file.
        #[arg(short, long)]
        db: PathBuf,

        /// Keep the root's immediate children even when unannotated.
        #[arg(long)]
        preserve_top_level: bool,

        /// Print the resulting counters as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Point genome accessions at taxonomy nodes from a flat file.
    Annotate {
        /// Path to the taxonomy database file.
        #[arg(short, long)]
        db: PathBuf,

        /// Path to the genome-to-taxon file.
        #[arg(short, long)]
        file: PathBuf,

        /// Field separator.
        #[arg(long, default_value = "\t")]
        separator: String,

        /// Print the resulting counters as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Check the whole-tree invariant and exit.
    Validate {
        /// Path to the taxonomy database file.
        #[arg(short, long)]
        db: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let exit_code = match cli.command {
        Commands::Merge {
            db,
            anchor,
            mod_db,
            mod_file,
            replace,
            separator,
            json,
        } => run_merge(&db, &anchor, mod_db, mod_file, replace, &separator, json),
        Commands::Clean {
            db,
            preserve_top_level,
            json,
        } => run_clean(&db, preserve_top_level, json),
        Commands::Annotate {
            db,
            file,
            separator,
            json,
        } => run_annotate(&db, &file, &separator, json),
        Commands::Validate { db } => run_validate(&db),
    };
    process::exit(exit_code);
}

/// Exit code for a pipeline error: 1 = bad input, 2 = broken tree
/// structure, 3 = storage or I/O failure.
fn exit_code(err: &MergeError) -> i32 {
    if err.is_input() {
        1
    } else if matches!(err, MergeError::Tree { .. }) {
        2
    } else {
        3
    }
}

fn open_store(db: &PathBuf) -> Result<SqliteStore, i32> {
    SqliteStore::open(db).map_err(|e| {
        eprintln!("Error: failed to open database '{}': {}", db.display(), e);
        3
    })
}

/// Execute the merge subcommand.
fn run_merge(
    db: &PathBuf,
    anchor: &str,
    mod_db: Option<PathBuf>,
    mod_file: Option<PathBuf>,
    replace: bool,
    separator: &str,
    json: bool,
) -> i32 {
    let mut store = match open_store(db) {
        Ok(s) => s,
        Err(code) => return code,
    };
    let options = MergeOptions::new(anchor)
        .replace(replace)
        .separator(separator);

    let result = if let Some(path) = mod_db {
        merge_with_database(&mut store, &path, &options)
    } else if let Some(path) = mod_file {
        merge_with_file(&mut store, &path, &options)
    } else {
        Err(MergeError::MissingSource)
    };

    match result {
        Ok(stats) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&stats).unwrap());
            } else if stats.changed {
                println!(
                    "Merged: {} links and {} nodes added, {} links and {} nodes removed",
                    stats.links_added, stats.nodes_added, stats.links_removed, stats.nodes_removed
                );
            } else {
                println!("All updates already found in database, nothing has been changed");
            }
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            exit_code(&e)
        }
    }
}

/// Execute the clean subcommand.
fn run_clean(db: &PathBuf, preserve_top_level: bool, json: bool) -> i32 {
    let mut store = match open_store(db) {
        Ok(s) => s,
        Err(code) => return code,
    };
    match clean(&mut store, preserve_top_level) {
        Ok(stats) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&stats).unwrap());
            } else {
                println!(
                    "Cleaned: {} links and {} nodes removed, {} nodes kept",
                    stats.links_removed, stats.nodes_removed, stats.nodes_kept
                );
            }
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            exit_code(&e)
        }
    }
}

/// Execute the annotate subcommand.
fn run_annotate(db: &PathBuf, file: &PathBuf, separator: &str, json: bool) -> i32 {
    let mut store = match open_store(db) {
        Ok(s) => s,
        Err(code) => return code,
    };
    match annotate_from_file(&mut store, file, separator) {
        Ok(stats) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&stats).unwrap());
            } else {
                println!(
                    "Annotated: {} added, {} updated, {} skipped",
                    stats.added, stats.updated, stats.skipped
                );
            }
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            exit_code(&e)
        }
    }
}

/// Execute the validate subcommand.
fn run_validate(db: &PathBuf) -> i32 {
    let store = match open_store(db) {
        Ok(s) => s,
        Err(code) => return code,
    };
    match store.validate_tree() {
        Ok(()) => {
            println!("Tree is valid");
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            2
        }
    }
}
