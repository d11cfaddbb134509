//! The memory-mapped byte region backing a datamodel.
//!
//! A region is a fixed-size file mapped `MAP_SHARED`/`PROT_READ|PROT_WRITE`.
//! Opening one creates the backing file if absent, grows it to the requested
//! size when given, and fills any newly added tail with `0xFF` (the erased
//! byte value every datamodel treats as "unused").

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use log::debug;
use memmap2::MmapMut;

use eeprom_types::record::TLV_EMPTY;

use crate::error::{EepromError, Result};

/// An open, memory-mapped, fixed-size byte region.
pub struct Region {
    path: PathBuf,
    file: File,
    map: MmapMut,
}

impl Region {
    /// Opens (creating if absent) the file at `path` and maps it.
    ///
    /// `size` optionally grows or shrinks the file to that exact length
    /// before mapping; `None` keeps whatever size the file already has. If
    /// mapping fails and the file did not exist before this call, it is
    /// removed rather than left behind half-initialized.
    pub fn open(path: impl AsRef<Path>, size: Option<u64>) -> Result<Self> {
        let path = path.as_ref();
        let preexisting = path.exists();

        debug!("opening storage region {} (preferred size {:?})", path.display(), size);

        let result = Self::open_inner(path, size);
        if result.is_err() && !preexisting {
            let _ = std::fs::remove_file(path);
        }
        result
    }

    fn open_inner(path: &Path, size: Option<u64>) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(path)
            .map_err(|source| EepromError::Io { path: path.to_path_buf(), source })?;

        let original_len = file
            .metadata()
            .map_err(|source| EepromError::Io { path: path.to_path_buf(), source })?
            .len();

        let final_len = match size {
            Some(requested) => {
                file.set_len(requested)
                    .map_err(|source| EepromError::Io { path: path.to_path_buf(), source })?;
                requested
            }
            None => original_len,
        };

        if final_len == 0 {
            return Err(EepromError::State("storage region has zero size"));
        }

        let mut map = unsafe {
            MmapMut::map_mut(&file).map_err(|source| EepromError::Mmap { path: path.to_path_buf(), source })?
        };

        for byte in map[original_len.min(final_len) as usize..].iter_mut() {
            *byte = TLV_EMPTY;
        }

        Ok(Self { path: path.to_path_buf(), file, map })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.map
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.map
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Flushes the mapping and syncs the backing file to disk.
    pub fn close(mut self) -> Result<()> {
        self.map
            .flush()
            .map_err(|source| EepromError::Io { path: self.path.clone(), source })?;
        self.file
            .sync_all()
            .map_err(|source| EepromError::Io { path: self.path.clone(), source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn opening_a_new_path_creates_and_fills_with_erased_bytes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.bin");
        let region = Region::open(&path, Some(64)).unwrap();
        assert_eq!(region.len(), 64);
        assert!(region.as_slice().iter().all(|&b| b == TLV_EMPTY));
    }

    #[test]
    fn reopening_preserves_existing_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.bin");
        {
            let mut region = Region::open(&path, Some(32)).unwrap();
            region.as_mut_slice()[0] = 0x42;
            region.close().unwrap();
        }
        let region = Region::open(&path, None).unwrap();
        assert_eq!(region.len(), 32);
        assert_eq!(region.as_slice()[0], 0x42);
    }

    #[test]
    fn zero_size_without_preexisting_file_is_rejected_and_cleaned_up() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.bin");
        let err = Region::open(&path, Some(0));
        assert!(err.is_err());
        assert!(!path.exists());
    }
}
