//! `lims` command-line front end.

use std::io::{self, IsTerminal};

use clap::{ColorChoice, Parser};
use tracing::level_filters::LevelFilter;

use lims_cli::cli::{BatchCommand, Cli, Command, LogFormatArg, LogLevelArg, SamplesCommand};
use lims_cli::commands::{
    EXIT_FAILURE, Session, run_batch_create, run_batch_show, run_fsa, run_ingest, run_paternity,
    run_samples_import, run_samples_list, run_status, store_error,
};
use lims_cli::config::LimsConfig;
use lims_cli::logging::{LogConfig, LogFormat, init_logging};

fn main() {
    let cli = Cli::parse();
    cli.color.write_global();
    let log_config = log_config_from_cli(&cli);
    if let Err(error) = init_logging(&log_config) {
        eprintln!("error: failed to initialize logging: {error}");
        std::process::exit(EXIT_FAILURE);
    }
    let exit_code = match run(&cli) {
        Ok(code) => code,
        Err(error) => {
            report_error(&error);
            EXIT_FAILURE
        }
    };
    std::process::exit(exit_code);
}

fn run(cli: &Cli) -> anyhow::Result<i32> {
    match &cli.command {
        Command::Ingest(args) => run_ingest(args),
        Command::Paternity(args) => run_paternity(args),
        Command::Fsa(args) => run_fsa(args),
        Command::Samples(command) => {
            let session = session(cli)?;
            match command {
                SamplesCommand::Import { file } => run_samples_import(&session, file),
                SamplesCommand::List { status, json } => {
                    run_samples_list(&session, status.as_deref(), *json)
                }
            }
        }
        Command::Batch(command) => {
            let session = session(cli)?;
            match command {
                BatchCommand::Create(args) => run_batch_create(&session, args),
                BatchCommand::Show { batch_number, json } => {
                    run_batch_show(&session, batch_number, *json)
                }
            }
        }
        Command::Status(args) => run_status(&session(cli)?, args),
    }
}

fn session(cli: &Cli) -> anyhow::Result<Session> {
    let config = LimsConfig::load(cli.config.as_deref(), cli.store.as_deref())?;
    Ok(Session::new(config))
}

fn report_error(error: &anyhow::Error) {
    eprintln!("error: {error:#}");
    if let Some(store) = store_error(error) {
        eprintln!("{}", store.user_message());
        if let Some(hint) = store.suggestion() {
            eprintln!("hint: {hint}");
        }
    }
}

/// Build logging configuration from CLI flags with consistent precedence.
fn log_config_from_cli(cli: &Cli) -> LogConfig {
    let mut config = LogConfig {
        level_filter: cli.verbosity.tracing_level_filter(),
        ..LogConfig::default()
    };
    config.use_env_filter = !(cli.verbosity.is_present() || cli.log_level.is_some());
    if let Some(level) = cli.log_level {
        config.level_filter = match level {
            LogLevelArg::Error => LevelFilter::ERROR,
            LogLevelArg::Warn => LevelFilter::WARN,
            LogLevelArg::Info => LevelFilter::INFO,
            LogLevelArg::Debug => LevelFilter::DEBUG,
            LogLevelArg::Trace => LevelFilter::TRACE,
        };
    }
    config.format = match cli.log_format {
        LogFormatArg::Pretty => LogFormat::Pretty,
        LogFormatArg::Compact => LogFormat::Compact,
        LogFormatArg::Json => LogFormat::Json,
    };
    config.log_file.clone_from(&cli.log_file);
    config.log_data = cli.log_data;
    config.with_ansi = match cli.color.color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => cli.log_file.is_none() && io::stderr().is_terminal(),
    };
    config
}
