use std::path::PathBuf;

use crate::cli::Cli;

/// Resolved run configuration, built once from parsed CLI arguments.
#[derive(Debug, Clone)]
pub struct Config {
    pub torrent_file: PathBuf,
    pub output_dir: String,
    pub thread_num: u16,
    pub logging: bool,
    pub log_file: Option<PathBuf>,
}

impl From<Cli> for Config {
    fn from(cli: Cli) -> Self {
        Self {
            torrent_file: cli.torrent_file,
            output_dir: cli.output_dir.to_string_lossy().into_owned(),
            thread_num: cli.thread_num,
            logging: cli.logging,
            log_file: cli.log_file,
        }
    }
}
