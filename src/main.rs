use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};

use symkit::db::{size_groups, DB};
use symkit::interact::{Prompt, TerminalPrompt};
use symkit::options::Options;
use symkit::repair::rules::Replacer;
use symkit::repair::{RepairConfig, RepairEngine, ResultFilters};
use symkit::retarget::{Retarget, RetargetStats};
use symkit::search::fuzzy::LevenshteinCost;
use symkit::search::locate_all;
use symkit::search::matcher::{parse_method_chain, Method};
use symkit::serve::{serve, ServeState, DEFAULT_TEMPLATE};

#[cfg(unix)]
use std::os::unix::fs::symlink;
#[cfg(windows)]
use std::os::windows::fs::symlink_file as symlink;

const DEFAULT_DATABASES: &str = "/var/lib/mlocate/mlocate.db";

#[derive(Parser)]
#[command(name = "symkit")]
#[command(version, about = "Locate-backed symlink repair and filesystem maintenance toolkit")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbosity: 0 errors only, 1 plus warnings, 2 everything
    #[arg(short = 'v', long, global = true, default_value_t = 0)]
    verbose: u8,
}

/// Database and search flags shared by the searching subcommands.
#[derive(Args)]
struct SearchArgs {
    /// Database files, colon-separated
    #[arg(short = 'd', long = "databases", default_value = DEFAULT_DATABASES)]
    databases: String,

    /// Ignore case
    #[arg(short = 'i', long)]
    ignore_case: bool,

    /// List only files that exist on disk
    #[arg(short = 'e', long)]
    existing: bool,

    /// List only files readable by the current user
    #[arg(short = 'a', long)]
    accessable: bool,

    /// Include symlinks in the candidate list
    #[arg(short = 's', long)]
    symlinks: bool,

    /// Match only basenames, stripping directory parts
    #[arg(short = 'b', long)]
    strip_path: bool,

    /// Require candidate basenames to equal the pattern's
    #[arg(short = 'B', long)]
    basename_must_match: bool,

    /// Ignore file extensions while matching
    #[arg(short = 'x', short_alias = 'E', long)]
    strip_extension: bool,

    /// Stop after this many matches, 0 means unlimited
    #[arg(short = 'l', long, default_value_t = 0)]
    limit: usize,

    /// Comma-separated method chain; later methods run only when the
    /// earlier ones found nothing
    #[arg(short = 'm', long, default_value = "hashmap,substring")]
    methods: String,

    /// Parallel workers per search
    #[arg(long, default_value_t = 1)]
    nworkers: usize,

    /// Only report files under this prefix
    #[arg(long, default_value = "/")]
    root: String,

    /// Fuzzy parameters as threshold,del,ins,subs
    #[arg(long)]
    levenshtein: Option<String>,

    /// Keep going when one of several databases cannot be read
    #[arg(long)]
    skip_bad_databases: bool,
}

impl SearchArgs {
    fn db_paths(&self) -> Vec<PathBuf> {
        self.databases.split(':').map(PathBuf::from).collect()
    }

    fn methods(&self) -> Result<Vec<Method>> {
        parse_method_chain(&self.methods)
    }

    fn options(&self) -> Result<Options> {
        let (threshold, cost) = match &self.levenshtein {
            Some(params) => parse_levenshtein(params)?,
            None => (0, LevenshteinCost::default()),
        };
        Ok(Options {
            ignore_case: self.ignore_case,
            strip_extension: self.strip_extension,
            basename_must_match: self.basename_must_match,
            strip_path: self.strip_path,
            existing: self.existing,
            accessable: self.accessable,
            symlink: self.symlinks,
            hash_map: self.methods.contains("hashmap"),
            levenshtein_cost: cost,
            levenshtein_threshold: threshold,
            max_matches: self.limit,
            n_workers: self.nworkers,
            root: self.root.clone(),
            skip_bad_databases: self.skip_bad_databases,
        })
    }

    fn open_db(&self) -> Result<DB> {
        let options = self.options()?;
        let db = DB::open(&self.db_paths(), &options)?;
        info!("loaded {} paths", db.files().len());
        Ok(db)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum DupAction {
    /// Only list the duplicates
    None,
    /// Remove duplicates, keeping a chosen origin
    Rm,
    /// Replace duplicates with symlinks to a chosen origin
    Ln,
}

#[derive(Subcommand)]
enum Commands {
    /// Search the locate databases for a pattern
    Locate {
        pattern: String,

        #[command(flatten)]
        search: SearchArgs,

        /// Print only the number of matches
        #[arg(short = 'c', long)]
        count: bool,
    },
    /// Find and repair broken symlinks
    Fix {
        /// Files or directories to inspect
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        #[command(flatten)]
        search: SearchArgs,

        /// Recurse into directories
        #[arg(short = 'r', long)]
        recurse: bool,

        /// Never prompt; skip links without a single certain fix
        #[arg(short = 'A', long)]
        automated: bool,

        /// Delete broken links that have no replacement candidate
        #[arg(long)]
        delete_dead: bool,

        /// Assume yes for every confirmation
        #[arg(short = 'Y', long)]
        yes_to_all: bool,

        /// Rename repaired links to their new target's basename
        #[arg(long)]
        rename: bool,

        /// Treat links whose name differs from the target's as broken
        #[arg(long = "names")]
        match_names: bool,

        /// Print a summary when done
        #[arg(long)]
        summary: bool,

        /// Newline-separated regexp filters for candidates; a leading !
        /// drops matching candidates instead
        #[arg(long)]
        filter: Option<String>,

        /// File with replacement rules for links nothing was found for
        #[arg(long = "replace")]
        replace_file: Option<PathBuf>,
    },
    /// List files sharing a basename (and, by default, a size)
    Dups {
        #[command(flatten)]
        search: SearchArgs,

        /// Minimum file size in the chosen unit
        #[arg(long, default_value_t = 0)]
        min: u64,

        /// Size unit: B, K, M, G or T
        #[arg(long, default_value = "B")]
        unit: String,

        /// Split basename groups by equal file size
        #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
        match_size: bool,

        /// What to do with duplicates
        #[arg(long, value_enum, default_value_t = DupAction::None)]
        action: DupAction,

        /// Assume yes for every confirmation
        #[arg(short = 'Y', long)]
        yes_to_all: bool,
    },
    /// Re-point symlinks whose targets match a pattern
    Retarget {
        /// Files or directories to inspect
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Pattern matched against the links' current targets
        #[arg(short = 'p', long)]
        pattern: String,

        /// Replacement target; without it matching links are printed
        #[arg(short = 't', long)]
        target: Option<String>,

        /// Match method: exact, substring, wildcard or regexp
        #[arg(short = 'm', long, default_value = "exact")]
        method: String,

        /// Case-insensitive matching
        #[arg(short = 'i', long)]
        ignore_case: bool,

        /// Recurse into directories
        #[arg(short = 'r', long)]
        recurse: bool,

        /// Rename links to the new target's basename
        #[arg(short = 'R', long)]
        rename: bool,
    },
    /// Serve search results over HTTP
    Serve {
        /// Listen address, e.g. 127.0.0.1:9188
        #[arg(long = "http")]
        addr: String,

        #[command(flatten)]
        search: SearchArgs,

        /// Per-match template with {n}, {path} and {base} placeholders
        #[arg(long, default_value = DEFAULT_TEMPLATE)]
        template: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Locate {
            pattern,
            search,
            count,
        } => run_locate(&pattern, &search, count),
        Commands::Fix {
            paths,
            search,
            recurse,
            automated,
            delete_dead,
            yes_to_all,
            rename,
            match_names,
            summary,
            filter,
            replace_file,
        } => run_fix(
            &paths,
            &search,
            RepairConfig {
                recurse,
                automated,
                delete_dead,
                yes_to_all,
                rename_symlink: rename,
                match_names,
                methods: Vec::new(),
            },
            summary,
            filter.as_deref(),
            replace_file.as_deref(),
        ),
        Commands::Dups {
            search,
            min,
            unit,
            match_size,
            action,
            yes_to_all,
        } => run_dups(&search, min, &unit, match_size, action, yes_to_all),
        Commands::Retarget {
            paths,
            pattern,
            target,
            method,
            ignore_case,
            recurse,
            rename,
        } => run_retarget(&paths, &pattern, target, &method, ignore_case, recurse, rename),
        Commands::Serve {
            addr,
            search,
            template,
        } => run_serve(&addr, &search, template),
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "error",
        1 => "warn",
        _ => "debug",
    };
    let env = env_logger::Env::default().default_filter_or(level);
    env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .init();
}

/// Parse `threshold,del,ins,subs`, all integers.
fn parse_levenshtein(params: &str) -> Result<(usize, LevenshteinCost)> {
    let fields: Vec<&str> = params.split(',').collect();
    if fields.len() != 4 {
        bail!(
            "levenshtein parameters must be threshold,del,ins,subs, got {:?}",
            params
        );
    }
    let mut values = [0usize; 4];
    for (value, field) in values.iter_mut().zip(&fields) {
        *value = field
            .trim()
            .parse()
            .with_context(|| format!("bad levenshtein parameter {:?}", field))?;
    }
    Ok((
        values[0],
        LevenshteinCost {
            del: values[1],
            ins: values[2],
            subs: values[3],
        },
    ))
}

fn run_locate(pattern: &str, search: &SearchArgs, count: bool) -> Result<()> {
    let methods = search.methods()?;
    let db = search.open_db()?;

    let mut matches = locate_all(&db, &methods, pattern)?;
    matches.sort();

    if count {
        println!("{}", matches.len());
    } else {
        for m in &matches {
            println!("{}", m);
        }
    }
    Ok(())
}

fn run_fix(
    paths: &[PathBuf],
    search: &SearchArgs,
    mut config: RepairConfig,
    summary: bool,
    filter: Option<&str>,
    replace_file: Option<&Path>,
) -> Result<()> {
    config.methods = search.methods()?;

    let filters = match filter {
        Some(spec) => ResultFilters::parse(spec)?,
        None => ResultFilters::default(),
    };
    let replacer = replace_file.map(Replacer::from_file).transpose()?;

    let db = search.open_db()?;
    let mut engine = RepairEngine::new(&db, config, filters, replacer, TerminalPrompt);
    for path in paths {
        engine.run(path);
    }

    if summary {
        engine.summary().print();
    }
    Ok(())
}

fn run_dups(
    search: &SearchArgs,
    min: u64,
    unit: &str,
    match_size: bool,
    action: DupAction,
    yes_to_all: bool,
) -> Result<()> {
    let multiplier: u64 = match unit {
        "B" => 1,
        "K" => 1 << 10,
        "M" => 1 << 20,
        "G" => 1 << 30,
        "T" => 1 << 40,
        other => bail!("invalid size unit {:?}", other),
    };
    let min_size = min * multiplier;

    let mut options = search.options()?;
    options.hash_map = true;
    let db = DB::open(&search.db_paths(), &options)?;

    let dups = db.duplicates();
    info!("{} basenames are shared by several files", dups.len());

    let mut prompt = TerminalPrompt;
    let mut names: Vec<&String> = dups.keys().collect();
    names.sort();

    for name in names {
        let paths = &dups[name];
        if !match_size {
            handle_dup_group(paths, action, yes_to_all, &mut prompt);
            continue;
        }
        for (size, group) in size_groups(paths, min_size) {
            for path in &group {
                println!("[{} B] {}", size, path);
            }
            handle_dup_group(&group, action, yes_to_all, &mut prompt);
        }
    }
    Ok(())
}

fn handle_dup_group(paths: &[String], action: DupAction, yes: bool, prompt: &mut dyn Prompt) {
    if paths.len() < 2 {
        return;
    }

    if action == DupAction::None {
        for path in paths {
            println!("{}", path);
        }
        return;
    }

    let Some(origin) = prompt.choose("Which of these is the origin?", paths) else {
        info!("user cancel");
        return;
    };

    for (i, path) in paths.iter().enumerate() {
        if i == origin {
            continue;
        }
        if !yes && !prompt.confirm(&format!("Really remove the file?: {}", path)) {
            continue;
        }
        if let Err(e) = fs::remove_file(path) {
            warn!("remove {}: {}", path, e);
            continue;
        }
        if action == DupAction::Ln {
            if !yes && !prompt.confirm(&format!("Okay to create the symlink?: {} -> {}", path, paths[origin])) {
                continue;
            }
            if let Err(e) = symlink(&paths[origin], path) {
                warn!("symlink {} -> {}: {}", path, paths[origin], e);
            }
        }
    }
}

fn run_retarget(
    paths: &[PathBuf],
    pattern: &str,
    target: Option<String>,
    method: &str,
    ignore_case: bool,
    recurse: bool,
    rename: bool,
) -> Result<()> {
    let retarget = Retarget::new(method, pattern, ignore_case, target, rename, recurse)?;

    let mut total = RetargetStats::default();
    for path in paths {
        let stats = retarget.run(path);
        total.matched += stats.matched;
        total.replaced += stats.replaced;
    }
    info!("{} links matched, {} replaced", total.matched, total.replaced);
    Ok(())
}

fn run_serve(addr: &str, search: &SearchArgs, template: String) -> Result<()> {
    let methods = search.methods()?;
    let db = search.open_db()?;
    serve(
        ServeState {
            db,
            methods,
            template,
        },
        addr,
    )
}
