mod config;
mod fs_store;
mod items;
mod output;

use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use duelrank_core::constants::{
    DEFAULT_SESSION_MAX_AGE_HOURS, MIN_JUDGMENTS_FOR_CONFIDENT_RANKING,
};
use duelrank_core::{
    EngineError, GlobalAggregator, Item, SessionManager, SessionState, StartScope,
};
use rand::Rng;

use crate::config::DuelrankConfig;
use crate::fs_store::{FileCatalogProvider, FsGlobalStore, FsSessionStore};

pub fn bail(msg: impl std::fmt::Display) -> ! {
    eprintln!("Error: {msg}");
    std::process::exit(1);
}

#[derive(Parser)]
#[command(name = "duelrank", version, about = "Rank characters with pairwise duels")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Run an interactive ranking session
    Rank(RankArgs),
    /// Show your last completed ranking
    Results(ResultsArgs),
    /// Show the global ranking across all users
    Global(GlobalArgs),
    /// Create a default config file at ~/.config/duelrank/config.toml
    Init,
}

#[derive(Parser)]
struct RankArgs {
    /// File with items: JSON array (names or records) or one name per line
    #[arg(long)]
    items: Option<PathBuf>,

    /// User id to rank as
    #[arg(long, default_value_t = 1)]
    user: i64,

    /// Only rate items you have not rated before
    #[arg(long)]
    new_only: bool,

    /// Stop after this many comparisons
    #[arg(long)]
    max_comparisons: Option<usize>,

    /// Discard any session in progress and start over
    #[arg(long)]
    restart: bool,

    /// Output the final ranking as JSON instead of a table
    #[arg(long)]
    json: bool,

    /// Show extra progress information
    #[arg(short, long)]
    verbose: bool,

    /// Path to config file (default: ~/.config/duelrank/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory for session and global state
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

#[derive(Parser)]
struct ResultsArgs {
    /// File with items (same one used for ranking)
    #[arg(long)]
    items: Option<PathBuf>,

    /// User id whose results to show
    #[arg(long, default_value_t = 1)]
    user: i64,

    /// Output JSON instead of a table
    #[arg(long)]
    json: bool,

    /// Path to config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory for session and global state
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

#[derive(Parser)]
struct GlobalArgs {
    /// File with items (same one used for ranking)
    #[arg(long)]
    items: Option<PathBuf>,

    /// Show only the top N entries
    #[arg(long)]
    top: Option<usize>,

    /// Output JSON instead of a table
    #[arg(long)]
    json: bool,

    /// Path to config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory for session and global state
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

/// Resolved environment shared by all subcommands: the item list, a
/// name lookup, the data directory, and the parsed config.
struct Env {
    items: Vec<Item>,
    names: HashMap<i64, String>,
    data_dir: PathBuf,
    cfg: DuelrankConfig,
}

fn resolve_env(
    items_arg: Option<PathBuf>,
    config_arg: Option<PathBuf>,
    data_dir_arg: Option<PathBuf>,
) -> Env {
    let config_path = config_arg.unwrap_or_else(config::config_path);
    let cfg = config::load_config(&config_path);

    let items_path = items_arg
        .or_else(|| cfg.items.clone().map(PathBuf::from))
        .unwrap_or_else(|| {
            bail(format!(
                "No items file specified. Pass --items or set it in {}",
                config_path.display()
            ))
        });
    let items = items::load_items_file(&items_path);
    let names = items.iter().map(|i| (i.id, i.name.clone())).collect();

    let data_dir = data_dir_arg
        .or_else(|| cfg.data_dir.clone().map(PathBuf::from))
        .unwrap_or_else(config::default_data_dir);

    Env { items, names, data_dir, cfg }
}

fn open_manager(env: &Env) -> (SessionManager, Arc<FileCatalogProvider>) {
    let provider = Arc::new(
        FileCatalogProvider::open(env.items.clone(), &env.data_dir).unwrap_or_else(|e| bail(e)),
    );
    let sessions = Arc::new(FsSessionStore::open(&env.data_dir).unwrap_or_else(|e| bail(e)));
    let global = Arc::new(FsGlobalStore::open(&env.data_dir).unwrap_or_else(|e| bail(e)));
    (SessionManager::new(provider.clone(), sessions, global), provider)
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Rank(args) => run_rank(args),
        Commands::Results(args) => run_results(args),
        Commands::Global(args) => run_global(args),
        Commands::Init => {
            let path = config::create_default_config();
            println!("Created config at {}", path.display());
            println!("Edit it to set your items file and data directory.");
        }
    }
}

fn run_rank(args: RankArgs) {
    let env = resolve_env(args.items.clone(), args.config.clone(), args.data_dir.clone());
    let (manager, provider) = open_manager(&env);

    let max_age = env.cfg.session_max_age_hours.unwrap_or(DEFAULT_SESSION_MAX_AGE_HOURS);
    let swept = manager
        .cleanup_stale(chrono::Duration::hours(max_age))
        .unwrap_or_else(|e| bail(e));
    if swept > 0 && args.verbose {
        eprintln!("Discarded {swept} stale session(s)");
    }

    let scope = if args.new_only { StartScope::NewItemsOnly } else { StartScope::Full };
    let max_comparisons = args.max_comparisons.or(env.cfg.max_comparisons);

    let started = if args.restart {
        manager.restart(args.user, scope, max_comparisons)
    } else {
        manager.start_or_resume(args.user, scope, max_comparisons)
    };
    let mut outcome = started.unwrap_or_else(|e| bail(e));

    if outcome.state == SessionState::InProgress && outcome.progress.made > 0 {
        eprintln!(
            "Resuming your session ({} comparisons made). Use --restart to start over.",
            outcome.progress.made
        );
    }

    let name = |id: i64| env.names.get(&id).cloned().unwrap_or_else(|| format!("item {id}"));
    let mut rng = rand::rng();
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    while let Some(pair) = outcome.next_pair {
        // Unordered pair; flip a coin for which side shows first so
        // presentation order carries no signal.
        let (first, second) = if rng.random::<f64>() < 0.5 {
            (pair.lo(), pair.hi())
        } else {
            (pair.hi(), pair.lo())
        };

        println!();
        println!(
            "[{} of ~{}] Which do you prefer?",
            outcome.progress.made + 1,
            outcome.progress.estimated_total,
        );
        println!("  1) {}", name(first));
        println!("  2) {}", name(second));
        print!("1/2 to choose, (u)ndo, (s)kip, (r)anking so far, (q)uit: ");
        io::stdout().flush().ok();

        let Some(Ok(line)) = lines.next() else {
            // EOF: leave the session in the store, resumable later.
            eprintln!("\nSession saved. Run `duelrank rank` again to continue.");
            return;
        };

        let result = match line.trim().to_lowercase().as_str() {
            "1" => manager.submit_choice(args.user, pair, first),
            "2" => manager.submit_choice(args.user, pair, second),
            "u" | "undo" => manager.go_back(args.user),
            "s" | "skip" => manager.skip(args.user),
            "r" | "ranking" => {
                let ranking = manager.current_ranking(args.user).unwrap_or_else(|e| bail(e));
                output::print_ranking_table(&ranking);
                continue;
            }
            "q" | "quit" => {
                if outcome.progress.made < MIN_JUDGMENTS_FOR_CONFIDENT_RANKING {
                    eprintln!(
                        "Stopping after {} comparisons — the order below is low-confidence.",
                        outcome.progress.made
                    );
                }
                let ranking = manager.current_ranking(args.user).unwrap_or_else(|e| bail(e));
                output::print_ranking_table(&ranking);
                eprintln!("Session saved. Run `duelrank rank` again to continue.");
                return;
            }
            "" => continue,
            other => {
                eprintln!("Unrecognized input \"{other}\"");
                continue;
            }
        };

        match result {
            Ok(next) => outcome = next,
            Err(EngineError::EmptyLedger) => eprintln!("Nothing to undo."),
            Err(e) => bail(e),
        }
    }

    if outcome.state == SessionState::Completed {
        println!("\nRanking complete ({} comparisons).", outcome.progress.made);
        let ranking = manager.final_ranking(args.user).unwrap_or_else(|e| bail(e));
        if args.json {
            output::print_ranking_json(&ranking);
        } else {
            output::print_ranking_table(&ranking);
        }

        let all_ids: Vec<i64> = env.items.iter().map(|i| i.id).collect();
        provider.mark_rated(args.user, &all_ids).unwrap_or_else(|e| bail(e));
    }
}

fn run_results(args: ResultsArgs) {
    let env = resolve_env(args.items, args.config, args.data_dir);
    let (manager, _) = open_manager(&env);

    let ranking = match manager.final_ranking(args.user) {
        Ok(r) => r,
        Err(EngineError::NoActiveSession(_)) => {
            bail(format!("No ranking found for user {}. Run `duelrank rank` first.", args.user))
        }
        Err(EngineError::IncompleteSession(_)) => {
            bail("Your ranking session is still in progress. Finish it with `duelrank rank`.")
        }
        Err(e) => bail(e),
    };

    if args.json {
        output::print_ranking_json(&ranking);
    } else {
        output::print_ranking_table(&ranking);
    }
}

fn run_global(args: GlobalArgs) {
    let env = resolve_env(args.items, args.config, args.data_dir);
    let global = Arc::new(FsGlobalStore::open(&env.data_dir).unwrap_or_else(|e| bail(e)));
    let aggregator = GlobalAggregator::new(global);

    let listed = match args.top.or(env.cfg.global_top) {
        Some(n) => aggregator.top_n(n),
        None => aggregator.rank(),
    };
    let entries = listed.unwrap_or_else(|e| bail(e));

    if entries.is_empty() {
        println!("No completed sessions yet.");
        return;
    }

    if args.json {
        output::print_global_json(&entries, &env.names);
    } else {
        output::print_global_table(&entries, &env.names);
    }
}
