use std::path::PathBuf;

use clap::Parser;

const DEFAULT_THREAD_NUM: u16 = 5;

/// Downloads a single-file torrent to local disk.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to the .torrent meta-file.
    #[arg(short = 't', long = "torrent-file")]
    pub torrent_file: PathBuf,

    /// Directory the downloaded file is written into.
    #[arg(short = 'o', long = "output-dir")]
    pub output_dir: PathBuf,

    /// Number of concurrent peer connections.
    #[arg(short = 'n', long = "thread-num", default_value_t = DEFAULT_THREAD_NUM)]
    pub thread_num: u16,

    /// Enable logging.
    #[arg(short = 'l', long = "logging")]
    pub logging: bool,

    /// Path to the log file (required when logging is enabled).
    #[arg(short = 'f', long = "log-file")]
    pub log_file: Option<PathBuf>,
}
