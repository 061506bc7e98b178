//! Chain-of-table CLI: answer questions about tabular files.

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};

use tablechain::io::config::load_config;
use tablechain::io::oracle::HttpOracle;
use tablechain::io::table_store::{load_table, save_results};
use tablechain::logging;
use tablechain::reason::Reasoner;

#[derive(Parser)]
#[command(
    name = "tablechain",
    version,
    about = "Step-by-step tabular reasoning over an LLM oracle"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Answer a question about a table by chaining atomic transforms.
    Answer {
        /// Path to the table file (.json or .csv).
        #[arg(long)]
        table: PathBuf,
        /// Question to answer.
        #[arg(long)]
        question: String,
        /// Write the full result record (answer, chain, tables) here.
        #[arg(long)]
        output: Option<PathBuf>,
        /// Maximum number of applied operations.
        #[arg(long, default_value_t = 10)]
        max_steps: usize,
        /// Oracle configuration file (TOML); defaults apply when missing.
        #[arg(long, default_value = "oracle.toml")]
        config: PathBuf,
        /// Print only the answer line.
        #[arg(long)]
        quiet: bool,
    },
    /// Check a table file for format problems.
    Validate {
        /// Path to the table file (.json or .csv).
        #[arg(long)]
        table: PathBuf,
    },
}

fn main() {
    logging::init();
    if let Err(err) = run() {
        eprintln!("{:#}", err);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Answer {
            table,
            question,
            output,
            max_steps,
            config,
            quiet,
        } => cmd_answer(&table, &question, output.as_deref(), max_steps, &config, quiet),
        Command::Validate { table } => cmd_validate(&table),
    }
}

fn cmd_answer(
    table_path: &std::path::Path,
    question: &str,
    output: Option<&std::path::Path>,
    max_steps: usize,
    config_path: &std::path::Path,
    quiet: bool,
) -> Result<()> {
    let table = load_table(table_path)?;
    let config = load_config(config_path)?;
    let oracle = HttpOracle::new(config)?;
    let reasoner = Reasoner::new(oracle, max_steps);

    let outcome = reasoner.reason(&table, question)?;

    if quiet {
        println!("{}", outcome.answer);
    } else {
        println!("question: {question}");
        println!("answer: {}", outcome.answer);
        println!("steps: {}", outcome.steps);
        println!();
        println!("chain:");
        for (index, step) in outcome.chain.steps().iter().enumerate() {
            println!("  {index}. {step}");
        }
        println!();
        println!("final table:");
        println!("{}", outcome.final_table.render_pipe());
    }
    if let Some(warning) = &outcome.warning {
        eprintln!("warning: {warning}");
    }

    if let Some(output) = output {
        save_results(&outcome, output)?;
    }
    Ok(())
}

fn cmd_validate(table_path: &std::path::Path) -> Result<()> {
    let table = load_table(table_path)?;
    let violations = table.format_violations();
    if violations.is_empty() {
        println!(
            "ok: {} rows, {} columns",
            table.len(),
            table.schema().len()
        );
        return Ok(());
    }
    for violation in &violations {
        eprintln!("error: {violation}");
    }
    bail!("table {} is not well-formed", table_path.display());
}
