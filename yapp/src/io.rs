use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Read side of a YAPP transfer: the bytes the sender streams out.
pub trait FileSource {
    fn len(&self) -> u64;
    fn read_at(&mut self, offset: u64, max: usize) -> io::Result<Vec<u8>>;
}

/// Write side of a YAPP transfer. `existing_len` drives the receiver's
/// resume decision: a file that already exists partially on disk, with
/// resume enabled, can be continued instead of retransmitted from scratch.
pub trait FileSink {
    fn existing_len(&self) -> Option<u64>;
    fn open(&mut self, append: bool) -> io::Result<()>;
    fn write_at(&mut self, bytes: &[u8]) -> io::Result<()>;
    /// Commits the file to its final name. Called only after a clean
    /// end-of-file; a cancelled transfer must never reach this, so a
    /// checksum failure mid-stream delivers no file at all.
    fn finalize(self: Box<Self>) -> io::Result<()>;
    /// Discards any partial data written so far.
    fn abort(self: Box<Self>);
}

/// Plain-file `FileSource` for sending a file already on disk.
pub struct FsSource {
    file: File,
    size: u64,
}

impl FsSource {
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        let size = file.metadata()?.len();
        Ok(Self { file, size })
    }
}

impl FileSource for FsSource {
    fn len(&self) -> u64 {
        self.size
    }

    fn read_at(&mut self, offset: u64, max: usize) -> io::Result<Vec<u8>> {
        self.file.seek(SeekFrom::Start(offset))?;
        let remaining = self.size.saturating_sub(offset) as usize;
        let want = remaining.min(max);
        let mut buf = vec![0u8; want];
        self.file.read_exact(&mut buf)?;
        Ok(buf)
    }
}

/// Plain-file `FileSink` that writes to a temporary path and only renames
/// onto `final_path` once the transfer completes cleanly — the same
/// write-to-tmp-then-rename pattern used for blob writes elsewhere in this
/// workspace, so a crash or cancel mid-transfer never leaves a corrupt file
/// at the destination name.
pub struct FsSink {
    final_path: PathBuf,
    tmp_path: PathBuf,
    file: Option<File>,
    existing_len: Option<u64>,
}

impl FsSink {
    pub fn new(final_path: PathBuf) -> Self {
        let existing_len = fs::metadata(&final_path).ok().map(|m| m.len());
        let mut tmp_path = final_path.clone();
        tmp_path.set_extension("yapp-tmp");
        Self {
            final_path,
            tmp_path,
            file: None,
            existing_len,
        }
    }
}

impl FileSink for FsSink {
    fn existing_len(&self) -> Option<u64> {
        self.existing_len
    }

    fn open(&mut self, append: bool) -> io::Result<()> {
        if append {
            fs::copy(&self.final_path, &self.tmp_path)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(&self.tmp_path)?;
        self.file = Some(file);
        Ok(())
    }

    fn write_at(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.file
            .as_mut()
            .expect("open() called before write_at()")
            .write_all(bytes)
    }

    fn finalize(mut self: Box<Self>) -> io::Result<()> {
        self.file.take();
        fs::rename(&self.tmp_path, &self.final_path)
    }

    fn abort(mut self: Box<Self>) {
        self.file.take();
        let _ = fs::remove_file(&self.tmp_path);
    }
}
