use chrono::Local;
use std::fs;
use std::fs::File;
use std::io::Write;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread;

use super::error::LoggerError;
use super::sender::LoggerSender;

const LOGGER_THREAD_NAME: &str = "logger";

/// A file-backed logger.
///
/// Log lines are written from a single dedicated thread, so callers on any
/// other thread only ever touch a cheap channel send through a
/// [`LoggerSender`]. Construct one with [`Logger::new`] and hand out
/// [`LoggerSender`] clones with [`Logger::new_sender`].
#[derive(Debug)]
pub struct Logger {
    sender: LoggerSender,
}

impl Logger {
    /// Creates a new file at `log_path` and starts the writer thread.
    ///
    /// Returns `BadLogPathError` if the file cannot be created, or
    /// `SpawnThreadError` if the writer thread could not be spawned.
    pub fn new(log_path: &str) -> Result<Self, LoggerError> {
        let (sender, receiver): (Sender<String>, Receiver<String>) = channel();

        let file = Self::create_log_file(log_path)?;
        Self::spawn_log_receiver(receiver, file)?;

        Ok(Self {
            sender: LoggerSender::new(sender),
        })
    }

    pub fn new_sender(&self) -> LoggerSender {
        self.sender.clone()
    }

    fn spawn_log_receiver(receiver: Receiver<String>, file: File) -> Result<(), LoggerError> {
        let builder = thread::Builder::new().name(LOGGER_THREAD_NAME.to_string());
        let result = builder.spawn(move || {
            let mut file = file;
            while let Ok(line) = receiver.recv() {
                let time = Local::now();
                let formatted = format!("{} {}\n", time.format("[%Y-%m-%d %H:%M:%S]"), line);
                if let Err(err) = file.write_all(formatted.as_bytes()) {
                    eprintln!("error writing to log file: {err}");
                }
            }
        });

        result.map(|_| ()).map_err(|_| LoggerError::SpawnThreadError)
    }

    fn create_log_file(log_path: &str) -> Result<File, LoggerError> {
        if let Some(parent) = std::path::Path::new(log_path).parent() {
            if !parent.as_os_str().is_empty() {
                let _ = fs::create_dir_all(parent);
            }
        }

        fs::OpenOptions::new()
            .create(true)
            .write(true)
            .append(true)
            .open(log_path)
            .map_err(|_| LoggerError::BadLogPathError(log_path.to_string()))
    }
}
