use std::fs;
use std::process::ExitCode;

use clap::Parser;

use bitpull::cli::Cli;
use bitpull::client::Client;
use bitpull::config::Config;
use bitpull::logger::{Logger, LoggerSender};
use bitpull::torrent::parser::TorrentParser;

fn main() -> ExitCode {
    // `try_parse` instead of `parse` so a usage error falls through our own
    // exit-code path (1) rather than clap's default `process::exit(2)`.
    // `--help`/`--version` still print and exit 0 via DisplayHelp/DisplayVersion.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return if err.exit_code() == 0 {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            };
        }
    };

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), String> {
    let logging = cli.logging;
    let log_file = cli.log_file.clone();
    let config: Config = cli.into();

    let logger = build_logger(logging, log_file.as_deref())?;

    let bytes = fs::read(&config.torrent_file)
        .map_err(|err| format!("could not read torrent file: {err}"))?;
    let meta = TorrentParser::parse(&bytes)
        .map_err(|err| format!("malformed torrent file: {err:?}"))?;

    let client = Client::new(meta, config, logger)
        .map_err(|err| format!("could not start download: {err:?}"))?;
    client.run().map_err(|err| format!("download failed: {err:?}"))
}

fn build_logger(logging: bool, log_file: Option<&std::path::Path>) -> Result<LoggerSender, String> {
    if !logging {
        return Ok(LoggerSender::disabled());
    }
    let path = log_file.ok_or("--logging requires --log-file")?;
    let logger = Logger::new(&path.to_string_lossy())
        .map_err(|err| format!("could not open log file: {err:?}"))?;
    let sender = logger.new_sender();
    // Leaking keeps the writer thread alive for the process lifetime; the
    // OS reclaims it on exit.
    Box::leak(Box::new(logger));
    Ok(sender)
}
