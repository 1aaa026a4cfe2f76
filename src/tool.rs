//! CLI tool for exploring segment tables

use clap::{ArgAction, CommandFactory, Parser, Subcommand, ValueEnum};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rustyline::DefaultEditor;
use segment_hash::analysis::{self, generate_keys, Distribution};
use segment_hash::export::export_to_path;
use segment_hash::{
    chaining, open_addressing, ChainStats, ChainingTable, InsertKind, OpenAddressingTable,
    OpenStats, SegmentTable, TableError,
};
use std::fs::File;
use std::io::{self, BufRead, BufWriter, IsTerminal, Write};
use std::path::PathBuf;
use tracing_subscriber::{
    filter::{EnvFilter, LevelFilter},
    prelude::*,
    registry::Registry,
};

macro_rules! die {
    ($fmt:literal, $($arg:tt)*) => {{
        eprintln!($fmt, $($arg)*);
        std::process::exit(1);
    }};

    ($msg:literal) => {{
        eprintln!($msg);
        std::process::exit(1);
    }};
}

use tracing::info;

pub fn init_tracing(quiet: bool, verbose: u8) -> LevelFilter {
    let level_filter = if quiet {
        LevelFilter::ERROR
    } else {
        match verbose {
            0 => LevelFilter::WARN,
            1 => LevelFilter::INFO,
            2 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    };

    // Library code logs through the log facade
    if tracing_log::LogTracer::init().is_err() {
        die!("INTERNAL ERROR: setting log tracer failed");
    }

    let env_filter = EnvFilter::builder()
        .with_default_directive(level_filter.into())
        .with_env_var("SEGTAB_LOG")
        .from_env_lossy();

    let subscriber = Registry::default().with(env_filter).with(
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .compact(),
    );

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        die!("INTERNAL ERROR: setting default tracing::subscriber failed");
    }

    level_filter
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Variant {
    /// Double hashing with tombstones, `dddLdd` keys
    Open,
    /// Separate chaining, `dLLLLd` keys
    Chained,
}

/// CLI tool for exploring segment tables
#[derive(Parser, Debug)]
#[command(name = "segtab")]
#[command(about = "CLI tool for exploring fixed-size hash tables")]
struct ToolArgs {
    /// Suppress all output except for errors. This overrides the -v flag.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Turn on verbose output. Supply -v multiple times to increase verbosity.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Collision resolution scheme
    #[arg(long, value_enum, default_value_t = Variant::Open, global = true)]
    variant: Variant,

    /// Number of segments (defaults: 2500 open, 1500 chained)
    #[arg(short = 'n', long, global = true, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    size: Option<usize>,

    /// Command to run (if omitted, starts interactive shell)
    #[command(subcommand)]
    command: Option<ToolCommand>,
}

#[derive(Subcommand, Debug, Clone)]
enum ToolCommand {
    /// Hash random keys and report how evenly they spread over the segments
    Analyze {
        /// Number of keys to generate
        #[arg(short, long, default_value_t = analysis::DEFAULT_KEY_COUNT)]
        keys: usize,
        /// Seed for reproducible key batches
        #[arg(long)]
        seed: Option<u64>,
        /// Per-segment hit counts (CSV)
        #[arg(short, long, default_value = "hash_analysis.csv")]
        output: PathBuf,
    },
}

#[derive(Parser, Debug)]
#[command(name = "")]
#[command(no_binary_name = true)]
#[command(disable_version_flag = true)]
#[command(help_template = "
Available Commands:

{subcommands}

Use `help COMMAND` or `COMMAND --help` for more details.

")]
struct ShellArgs {
    #[command(subcommand)]
    command: ShellCommand,
}

#[derive(Subcommand, Debug, Clone)]
enum ShellCommand {
    /// Insert a key, or overwrite its value
    #[command(visible_alias = "set")]
    Add {
        key: String,
        /// Defaults to the key itself
        value: Option<String>,
    },
    /// Find an entry by key
    Get { key: String },
    /// List the entries stored in one segment
    Segment { index: usize },
    /// Show the table segment by segment
    #[command(visible_alias = "ls")]
    View {
        /// Only segments holding entries
        #[arg(short, long)]
        filled: bool,
        /// Maximum rows to print
        #[arg(short, long, default_value_t = 50)]
        limit: usize,
    },
    /// Delete a key and list the keys that collided with it
    #[command(visible_alias = "rm")]
    Del { key: String },
    /// Write the table and its histogram as CSV
    Export {
        /// Defaults to hash_table_export.csv
        file: Option<String>,
    },
    /// Show fill statistics
    Stats,
    /// Remove every entry
    Clear,
    /// Exit the shell
    #[command(visible_alias = "quit")]
    Exit,
}

/// Advisory lines shown under `stats`.
trait StatsWarnings {
    fn warnings(&self) -> Vec<&'static str>;
}

impl StatsWarnings for OpenStats {
    fn warnings(&self) -> Vec<&'static str> {
        let mut w = Vec::new();
        if self.fill_percentage >= 90.0 {
            w.push("more than 90% of slots are filled");
        }
        w
    }
}

impl StatsWarnings for ChainStats {
    fn warnings(&self) -> Vec<&'static str> {
        let mut w = Vec::new();
        if self.fill_percentage >= 90.0 {
            w.push("more than 90% of buckets are filled");
        }
        if self.avg_chain_length > 10.0 {
            w.push("average chain length exceeds 10");
        }
        if self.max_chain_length > 20 {
            w.push("some chains are longer than 20");
        }
        w
    }
}

enum CommandResult {
    Continue,
    Exit,
}

fn report_error<T: SegmentTable>(table: &T, e: &TableError) {
    eprintln!("Error: {e}");
    if let TableError::InvalidKey(_) = e {
        let format = table.key_format();
        eprintln!("Expected format {format}, e.g. {}", format.example());
    }
}

fn handle_add<T>(table: &mut T, key: &str, value: Option<String>)
where
    T: SegmentTable<Value = String>,
{
    let value = value.unwrap_or_else(|| key.to_owned());
    match table.insert(key, value) {
        Ok(ins) => {
            let verb = match ins.kind {
                InsertKind::Inserted => "inserted into",
                InsertKind::Updated => "updated in",
            };
            println!("OK ({verb} segment {})", ins.index);
            for w in ins.warnings {
                println!("Warning: {w}");
            }
        }
        Err(e) => report_error(table, &e),
    }
}

fn handle_get<T>(table: &T, key: &str)
where
    T: SegmentTable<Value = String>,
{
    match table.locate(key) {
        Ok(Some(found)) => {
            println!("Segment: {}", found.index);
            println!("Key:     {}", found.key);
            println!("Value:   {}", found.value);
        }
        Ok(None) => println!("(not found)"),
        Err(e) => report_error(table, &e),
    }
}

fn handle_segment<T>(table: &T, index: usize)
where
    T: SegmentTable<Value = String>,
{
    match table.locate_by_index(index) {
        Ok(entries) if entries.is_empty() => println!("(segment {index} is empty)"),
        Ok(entries) => {
            println!("{} entries in segment {index}:", entries.len());
            println!("{:<15} {:<20}", "Key", "Value");
            for (key, value) in entries {
                println!("{key:<15} {value:<20}");
            }
        }
        Err(e) => report_error(table, &e),
    }
}

fn handle_view<T>(table: &T, filled: bool, limit: usize)
where
    T: SegmentTable<Value = String>,
{
    let rows: Vec<_> = table
        .rows()
        .into_iter()
        .filter(|r| !filled || r.entry.is_some())
        .collect();
    if rows.is_empty() {
        println!("(table is empty)");
        return;
    }

    println!("{:<10} {:<15} {:<20}", "Segment", "Key", "Value");
    for row in rows.iter().take(limit) {
        match row.entry {
            Some((key, value)) => println!("{:<10} {key:<15} {value:<20}", row.index),
            None => println!("{:<10} {:<15} {:<20}", row.index, "---", "---"),
        }
    }
    if rows.len() > limit {
        println!("... and {} more rows", rows.len() - limit);
    }
}

fn handle_del<T>(table: &mut T, key: &str)
where
    T: SegmentTable<Value = String>,
{
    match table.delete(key) {
        Ok(Some(deleted)) => {
            println!("OK (deleted {} from segment {})", deleted.key, deleted.index);
            if deleted.collisions.is_empty() {
                println!("No colliding keys");
            } else {
                println!("Keys that collided with it:");
                for k in &deleted.collisions {
                    println!("  - {k}");
                }
            }
        }
        Ok(None) => println!("(not found)"),
        Err(e) => report_error(table, &e),
    }
}

fn handle_export<T>(table: &T, file: Option<String>)
where
    T: SegmentTable<Value = String>,
{
    let mut file = file.unwrap_or_else(|| "hash_table_export.csv".to_owned());
    if !file.ends_with(".csv") {
        file.push_str(".csv");
    }
    match export_to_path(table, &file) {
        Ok(paths) => {
            println!("OK (wrote {})", paths.dump.display());
            println!("Histogram: {}", paths.histogram.display());
        }
        Err(e) => eprintln!("Error: {e}"),
    }
}

fn handle_stats<T>(table: &T)
where
    T: SegmentTable<Value = String>,
    T::Stats: StatsWarnings,
{
    let stats = table.statistics();
    println!("{stats}");
    for w in stats.warnings() {
        println!("Warning: {w}");
    }
}

fn execute_shell_command<T>(table: &mut T, cmd: ShellCommand) -> CommandResult
where
    T: SegmentTable<Value = String>,
    T::Stats: StatsWarnings,
{
    match cmd {
        ShellCommand::Add { key, value } => handle_add(table, &key, value),
        ShellCommand::Get { key } => handle_get(table, &key),
        ShellCommand::Segment { index } => handle_segment(table, index),
        ShellCommand::View { filled, limit } => handle_view(table, filled, limit),
        ShellCommand::Del { key } => handle_del(table, &key),
        ShellCommand::Export { file } => handle_export(table, file),
        ShellCommand::Stats => handle_stats(table),
        ShellCommand::Clear => {
            table.reset();
            println!("OK (cleared)");
        }
        ShellCommand::Exit => return CommandResult::Exit,
    }
    CommandResult::Continue
}

/// Parse and run a shell command line
fn run_shell_command<T>(table: &mut T, line: &str) -> CommandResult
where
    T: SegmentTable<Value = String>,
    T::Stats: StatsWarnings,
{
    let line = line.trim();
    if line.is_empty() {
        return CommandResult::Continue;
    }

    let tokens = match shlex::split(line) {
        Some(t) if !t.is_empty() => t,
        Some(_) => return CommandResult::Continue,
        None => {
            eprintln!("error: unclosed quote");
            return CommandResult::Continue;
        }
    };

    match ShellArgs::try_parse_from(&tokens) {
        Ok(args) => execute_shell_command(table, args.command),
        Err(e) => {
            eprintln!("{}", e);
            CommandResult::Continue
        }
    }
}

fn run_shell<T>(mut table: T)
where
    T: SegmentTable<Value = String>,
    T::Stats: StatsWarnings,
{
    if io::stdin().is_terminal() {
        run_shell_interactive(&mut table);
    } else {
        run_shell_non_interactive(&mut table);
    }
}

fn run_shell_interactive<T>(table: &mut T)
where
    T: SegmentTable<Value = String>,
    T::Stats: StatsWarnings,
{
    let format = table.key_format();
    println!("Segment table with {} segments", table.size());
    println!("Key format: {format} (e.g. {})", format.example());
    println!("Type 'help' for available commands, 'exit' to quit.\n");

    let mut rl = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(e) => {
            eprintln!("Error initializing line editor: {}", e);
            return;
        }
    };

    loop {
        match rl.readline("segtab> ") {
            Ok(line) => {
                let _ = rl.add_history_entry(&line);
                if let CommandResult::Exit = run_shell_command(table, &line) {
                    break;
                }
            }
            Err(rustyline::error::ReadlineError::Interrupted) => {
                continue;
            }
            Err(rustyline::error::ReadlineError::Eof) => {
                println!();
                break;
            }
            Err(e) => {
                eprintln!("Error reading input: {}", e);
                break;
            }
        }
    }
}

fn run_shell_non_interactive<T>(table: &mut T)
where
    T: SegmentTable<Value = String>,
    T::Stats: StatsWarnings,
{
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        if stdout.flush().is_err() {
            die!("can't flush stdout");
        }

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {
                if let CommandResult::Exit = run_shell_command(table, &line) {
                    break;
                }
            }
            Err(e) => {
                die!("Error reading input: {}", e);
            }
        }
    }
}

fn run_analyze<T: SegmentTable>(table: &T, keys: usize, seed: Option<u64>, output: PathBuf) {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    info!("generating {keys} keys of format {}", table.key_format());
    let batch = generate_keys(table.key_format(), keys, &mut rng);
    let dist = Distribution::tally(table, batch.iter().map(String::as_str));
    println!("{dist}");

    let written = File::create(&output).and_then(|f| dist.write_csv(BufWriter::new(f)));
    match written {
        Ok(()) => println!("\nPer-segment hits written to {}", output.display()),
        Err(e) => die!("Error writing {}: {}", output.display(), e),
    }
}

fn main() {
    let args = ToolArgs::parse();
    let level_filter = init_tracing(args.quiet, args.verbose);

    let app = ToolArgs::command();
    info!(
        "starting {} ({} {}), log level: {level_filter}",
        app.get_name(),
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );

    let size = args.size;
    match (args.variant, args.command) {
        (Variant::Open, cmd) => {
            let table =
                OpenAddressingTable::<String>::new(size.unwrap_or(open_addressing::DEFAULT_SIZE));
            match cmd {
                Some(ToolCommand::Analyze { keys, seed, output }) => {
                    run_analyze(&table, keys, seed, output)
                }
                None => run_shell(table),
            }
        }
        (Variant::Chained, cmd) => {
            let table = ChainingTable::<String>::new(size.unwrap_or(chaining::DEFAULT_SIZE));
            match cmd {
                Some(ToolCommand::Analyze { keys, seed, output }) => {
                    run_analyze(&table, keys, seed, output)
                }
                None => run_shell(table),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_flag_is_a_positive_usize() {
        let args = ToolArgs::try_parse_from(["segtab", "--size", "97"]).unwrap();
        assert_eq!(args.size, Some(97usize));
        assert!(ToolArgs::try_parse_from(["segtab", "--size", "0"]).is_err());
        assert!(ToolArgs::try_parse_from(["segtab", "--size", "-3"]).is_err());
        let too_big = format!("{}0", usize::MAX);
        assert!(ToolArgs::try_parse_from(["segtab", "--size", too_big.as_str()]).is_err());
    }
}
