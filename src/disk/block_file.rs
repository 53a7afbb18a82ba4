use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::error::{DiskError, DiskResult};
use super::{BLOCK_SIZE, BlockNum, DISK_BLOCKS};

/// A simulated disk: one file holding `DISK_BLOCKS` blocks of `BLOCK_SIZE` bytes
///
/// The file is sparse; blocks never written read back as zeros.
pub struct Disk {
    file: File,
    path: PathBuf,
}

impl Disk {
    /// Create (or truncate) a disk file
    pub fn create<P: AsRef<Path>>(path: P) -> DiskResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Open an existing disk file
    pub fn open<P: AsRef<Path>>(path: P) -> DiskResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(DiskError::FileNotFound(path.display().to_string()));
        }

        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn check(block: BlockNum, len: usize) -> DiskResult<u64> {
        if block >= DISK_BLOCKS {
            return Err(DiskError::BlockOutOfRange(block));
        }
        if len != BLOCK_SIZE {
            return Err(DiskError::InvalidBlockSize {
                expected: BLOCK_SIZE,
                actual: len,
            });
        }
        Ok((block * BLOCK_SIZE) as u64)
    }

    /// Read a block into `buffer`
    pub fn read_block(&mut self, block: BlockNum, buffer: &mut [u8]) -> DiskResult<()> {
        let offset = Self::check(block, buffer.len())?;
        self.file.seek(SeekFrom::Start(offset))?;

        let mut filled = 0;
        while filled < BLOCK_SIZE {
            let n = self.file.read(&mut buffer[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }

        // Past the end of the file the disk reads as zeros
        buffer[filled..].fill(0);
        Ok(())
    }

    /// Write `buffer` to a block, growing the file if needed
    pub fn write_block(&mut self, block: BlockNum, buffer: &[u8]) -> DiskResult<()> {
        let offset = Self::check(block, buffer.len())?;

        let required_size = offset + BLOCK_SIZE as u64;
        if self.file.metadata()?.len() < required_size {
            self.file.set_len(required_size)?;
        }

        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(buffer)?;
        Ok(())
    }

    /// Flush OS buffers for the disk file
    pub fn sync(&mut self) -> DiskResult<()> {
        self.file.sync_data()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_disk() -> (TempDir, Disk) {
        let temp_dir = tempfile::tempdir().unwrap();
        let disk = Disk::create(temp_dir.path().join("disk")).unwrap();
        (temp_dir, disk)
    }

    #[test]
    fn test_read_write_block() {
        let (_temp_dir, mut disk) = setup_disk();

        let mut write_buffer = vec![0u8; BLOCK_SIZE];
        write_buffer[0] = 42;
        write_buffer[BLOCK_SIZE - 1] = 255;
        disk.write_block(9, &write_buffer).unwrap();

        let mut read_buffer = vec![0u8; BLOCK_SIZE];
        disk.read_block(9, &mut read_buffer).unwrap();
        assert_eq!(read_buffer, write_buffer);
    }

    #[test]
    fn test_unwritten_block_reads_zero() {
        let (_temp_dir, mut disk) = setup_disk();

        let mut buffer = vec![7u8; BLOCK_SIZE];
        disk.read_block(100, &mut buffer).unwrap();
        assert!(buffer.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_block_out_of_range() {
        let (_temp_dir, mut disk) = setup_disk();

        let mut buffer = vec![0u8; BLOCK_SIZE];
        let result = disk.read_block(DISK_BLOCKS, &mut buffer);
        assert!(matches!(result, Err(DiskError::BlockOutOfRange(_))));
    }

    #[test]
    fn test_invalid_buffer_size() {
        let (_temp_dir, mut disk) = setup_disk();

        let result = disk.write_block(0, &[0u8; 10]);
        assert!(matches!(
            result,
            Err(DiskError::InvalidBlockSize {
                expected: BLOCK_SIZE,
                actual: 10
            })
        ));
    }

    #[test]
    fn test_reopen_keeps_blocks() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("disk");

        {
            let mut disk = Disk::create(&path).unwrap();
            let mut buffer = vec![0u8; BLOCK_SIZE];
            buffer[3] = 3;
            disk.write_block(2, &buffer).unwrap();
            disk.sync().unwrap();
        }

        let mut disk = Disk::open(&path).unwrap();
        let mut buffer = vec![0u8; BLOCK_SIZE];
        disk.read_block(2, &mut buffer).unwrap();
        assert_eq!(buffer[3], 3);
    }

    #[test]
    fn test_open_missing_disk() {
        let temp_dir = tempfile::tempdir().unwrap();
        let result = Disk::open(temp_dir.path().join("nope"));
        assert!(matches!(result, Err(DiskError::FileNotFound(_))));
    }
}
