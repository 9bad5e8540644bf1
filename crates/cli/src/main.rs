//! TeXSearch CLI: approximate search over LaTeX fragments.
//!
//! Three subcommands share one snapshot file:
//! - **init**: write an empty index snapshot (after a confirm prompt)
//! - **update**: pull the document store's update feed to a fixed point
//! - **query**: serve requests, one JSON line in, one JSON line out
//!
//! The updater and the query loop never share memory; the snapshot file,
//! replaced atomically, is their only coordination point.

mod format;
mod orchestrator;
mod repl;
mod request;

use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::{Arg, ArgMatches, Command};
use tracing::info;
use tracing_subscriber::EnvFilter;

use orchestrator::QueryContext;
use texsearch_store::{run_updates, DocStoreClient, PersistentIndex, PreprocessorClient};

const DEFAULT_INDEX_PATH: &str = "/opt/texsearch/index_store";
const DEFAULT_STORE_URL: &str = "http://localhost:5984/documents";
const DEFAULT_PREPROCESSOR_URL: &str = "http://localhost:5984/documents/_external/preprocess";
const STORE_TIMEOUT: Duration = Duration::from_secs(30);

struct Config {
    index_path: PathBuf,
    store_url: String,
    preprocessor_url: String,
}

impl Config {
    fn from_matches(matches: &ArgMatches) -> Self {
        let get = |name: &str| -> String {
            matches
                .get_one::<String>(name)
                .cloned()
                .unwrap_or_default()
        };
        Config {
            index_path: PathBuf::from(get("index")),
            store_url: get("store-url"),
            preprocessor_url: get("preprocessor-url"),
        }
    }
}

fn build_cli() -> Command {
    Command::new("texsearch")
        .about("Approximate search over LaTeX fragments by tree edit distance")
        .version(env!("CARGO_PKG_VERSION"))
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("index")
                .long("index")
                .value_name("PATH")
                .default_value(DEFAULT_INDEX_PATH)
                .global(true)
                .help("Path of the index snapshot file"),
        )
        .arg(
            Arg::new("store-url")
                .long("store-url")
                .value_name("URL")
                .default_value(DEFAULT_STORE_URL)
                .global(true)
                .help("Base URL of the document store"),
        )
        .arg(
            Arg::new("preprocessor-url")
                .long("preprocessor-url")
                .value_name("URL")
                .default_value(DEFAULT_PREPROCESSOR_URL)
                .global(true)
                .help("URL of the LaTeX preprocessor"),
        )
        .subcommand(Command::new("init").about("Write an empty index snapshot (destructive)"))
        .subcommand(Command::new("update").about("Apply pending document updates to the index"))
        .subcommand(Command::new("query").about("Serve queries: one JSON request per line"))
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let matches = build_cli().get_matches();
    let config = Config::from_matches(&matches);

    let exit_code = match matches.subcommand() {
        Some(("init", _)) => run_init(&config),
        Some(("update", _)) => run_update(&config),
        Some(("query", _)) => run_query_loop(&config),
        _ => unreachable!("subcommand_required"),
    };
    process::exit(exit_code);
}

fn run_init(config: &Config) -> i32 {
    eprint!(
        "This will erase the index at {}. Continue? [y/N] ",
        config.index_path.display()
    );
    let _ = io::stderr().flush();

    let mut answer = String::new();
    if io::stdin().lock().read_line(&mut answer).is_err() {
        eprintln!("aborted");
        return 1;
    }
    if !matches!(answer.trim(), "y" | "Y" | "yes") {
        eprintln!("aborted");
        return 1;
    }

    match PersistentIndex::empty().save(&config.index_path) {
        Ok(()) => {
            info!(path = %config.index_path.display(), "empty index written");
            0
        }
        Err(e) => {
            eprintln!("{}", e);
            1
        }
    }
}

fn run_update(config: &Config) -> i32 {
    let store = DocStoreClient::new(config.store_url.clone(), STORE_TIMEOUT);
    match run_updates(&config.index_path, &store) {
        Ok(last_update) => {
            info!(last_update, "update complete");
            0
        }
        Err(e) => {
            eprintln!("{}", e);
            1
        }
    }
}

fn run_query_loop(config: &Config) -> i32 {
    let index = match PersistentIndex::load(&config.index_path) {
        Ok(index) => index,
        Err(e) => {
            eprintln!("{}", e);
            return 1;
        }
    };
    info!(
        last_update = index.last_update,
        entries = index.tree.len(),
        "index loaded"
    );

    let store = DocStoreClient::new(config.store_url.clone(), STORE_TIMEOUT);
    let preprocessor = PreprocessorClient::new(config.preprocessor_url.clone());
    let ctx = QueryContext {
        tree: &index.tree,
        store: &store,
        preprocessor: &preprocessor,
    };

    if io::stdin().is_terminal() {
        repl::run_repl(&ctx)
    } else {
        repl::run_pipe(&ctx)
    }
}
