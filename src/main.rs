mod account;
mod balance;
mod batches;
mod classifier;
mod cli;
mod db;
mod error;
mod fmt;
mod grid;
mod importer;
mod models;
mod normalize;
mod progress;
mod reader;
mod reports;
mod settings;

use clap::Parser;

use cli::{BatchesCommands, Cli, Commands, ReportCommands};

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "auxiliar=info".into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init { data_dir } => cli::init::run(data_dir),
        Commands::Ingest {
            files,
            user,
            workers,
            batch_size,
        } => cli::ingest::run(&files, user, workers, batch_size),
        Commands::Batches { command } => match command {
            BatchesCommands::List { limit } => cli::batches::list(limit),
            BatchesCommands::Show { batch_id } => cli::batches::show(&batch_id),
            BatchesCommands::Purge { batch_id, all } => cli::batches::purge(batch_id.as_deref(), all),
        },
        Commands::Transactions { filters, limit, page } => cli::transactions::run(&filters, limit, page),
        Commands::Report { command } => match command {
            ReportCommands::Stats => cli::report::stats(),
            ReportCommands::Dependencies => cli::report::values("dependency"),
            ReportCommands::Values { field } => cli::report::values(&field),
            ReportCommands::Distributions => cli::report::distributions(),
            ReportCommands::Balances { batch } => cli::report::balances(batch.as_deref()),
        },
        Commands::Export {
            filters,
            output,
            limit,
        } => cli::export::run(&filters, output, limit),
        Commands::Decode { code, json } => cli::decode::run(&code, json),
        Commands::Status => cli::status::run(),
        Commands::Config {
            workers,
            batch_size,
            user,
        } => cli::config::run(workers, batch_size, user),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
