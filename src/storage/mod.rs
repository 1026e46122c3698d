use std::fs::{self, File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// The on-disk output file for a single-file torrent. Pre-sized to the
/// torrent's total length at construction so later writes land at the
/// correct offset without growing the file underneath concurrent readers.
pub struct FileSink {
    file: File,
}

impl FileSink {
    pub fn create(output_dir: &str, name: &str, total_length: u64) -> io::Result<Self> {
        let dir = Path::new(output_dir);
        if !dir.exists() {
            fs::create_dir_all(dir)?;
        }

        let path: PathBuf = dir.join(name);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;

        if total_length > 0 {
            file.set_len(total_length)?;
        }

        Ok(Self { file })
    }

    /// Writes `data` at byte `offset`, used to commit one verified piece.
    pub fn write_at(&mut self, offset: u64, data: &[u8]) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(data)
    }
}
