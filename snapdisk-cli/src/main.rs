mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands, GlobalFlags};
use snapdisk::util;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();

    // Keep the guard alive until exit so buffered log lines reach the file
    let log_guard = match init_logging(&cli.global) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };

    let code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            1
        }
    };

    drop(log_guard);
    std::process::exit(code);
}

fn run(cli: Cli) -> anyhow::Result<i32> {
    match cli.command {
        Commands::Inspect(args) => commands::inspect::execute(args).map(|_| 0),
        Commands::Tmpdir => commands::tmpdir::execute(&cli.global).map(|_| 0),
        Commands::Snapshot(args) => commands::snapshot::execute(args, &cli.global),
    }
}

fn init_logging(
    global: &GlobalFlags,
) -> anyhow::Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(global.log_level()))?;

    let (file, guard) = match &global.log_dir {
        Some(dir) => {
            let (writer, guard) = util::init_file_logging(dir)?;
            (Some(writer), Some(guard))
        }
        None => (None, None),
    };

    util::register_to_tracing(file, env_filter);
    Ok(guard)
}
