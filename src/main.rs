mod aggregator;
mod categorizer;
mod cells;
mod cli;
mod error;
mod export;
mod extractor;
mod fmt;
mod funds;
mod grid;
mod header;
mod hierarchy;
mod models;
mod settings;
mod summary;

use clap::Parser;

use cli::{CategoriesCommands, Cli, Commands};

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "fiscal=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing();

    let result = match cli.command {
        None | Some(Commands::Status) => cli::status::run(),
        Some(Commands::Init {
            source_dir,
            output_dir,
            first_year,
            last_year,
        }) => cli::init::run(source_dir, output_dir, first_year, last_year),
        Some(Commands::Extract(args)) => cli::extract::run(&args),
        Some(Commands::Aggregate { output }) => cli::aggregate::run(output),
        Some(Commands::Run(args)) => cli::run::run(&args),
        Some(Commands::Inspect { file, rows, kind, year }) => cli::inspect::run(&file, rows, kind.as_deref(), year),
        Some(Commands::Categories { command }) => match command {
            CategoriesCommands::List => cli::categories::list(),
            CategoriesCommands::Match { label } => cli::categories::match_label(&label),
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
