//! The top-level entry point tying a [`Region`] to a [`ModelHandle`] and
//! exposing the operations the CLI drives.

use crate::error::Result;
use crate::model::Model;
use crate::region::Region;
use crate::registry::{self, ModelHandle};

/// An open EEPROM store: a mapped region bound to whichever datamodel the
/// registry recognized.
pub struct Store {
    region: Region,
}

impl Store {
    /// Opens (creating if absent) the backing file and probes it against
    /// the registry. `size` optionally grows/shrinks the file before
    /// probing; `force` reinitializes it as the default datamodel.
    pub fn open(path: impl AsRef<std::path::Path>, size: Option<u64>) -> Result<Self> {
        let region = Region::open(path, size)?;
        Ok(Self { region })
    }

    /// Runs `f` against whichever model the registry resolves, without
    /// flushing afterward (for read-only operations, so a read-mostly
    /// model like `legacy-tlv` doesn't trip its flush refusal).
    fn with_model<T>(&mut self, force: bool, f: impl FnOnce(&mut ModelHandle<'_>) -> Result<T>) -> Result<T> {
        let mut handle = registry::open(self.region.as_mut_slice(), force)?;
        f(&mut handle)
    }

    /// Like [`Self::with_model`], but flushes the resolved model afterward.
    /// For operations that mutate storage.
    fn with_model_mut<T>(&mut self, force: bool, f: impl FnOnce(&mut ModelHandle<'_>) -> Result<T>) -> Result<T> {
        let mut handle = registry::open(self.region.as_mut_slice(), force)?;
        let result = f(&mut handle)?;
        handle.flush()?;
        Ok(result)
    }

    /// Every property key the resident datamodel recognizes.
    pub fn list(&mut self) -> Result<Vec<String>> {
        self.with_model(false, |m| Ok(m.list()))
    }

    /// Validates `key`/`value` without mutating storage.
    pub fn check(&mut self, key: &str, value: Option<&str>) -> Result<()> {
        self.with_model(false, |m| m.check(key, value))
    }

    /// Formats one property, or every occupied property if `key` is `None`.
    pub fn print(&mut self, key: Option<&str>, out: Option<&str>) -> Result<i64> {
        self.with_model(false, |m| m.print(key, out))
    }

    /// Writes `value` to `key`, using the resident datamodel's codec.
    pub fn store(&mut self, key: &str, value: &str) -> Result<()> {
        self.with_model_mut(false, |m| m.store(key, value))
    }

    /// Reinitializes the region as the default datamodel, discarding any
    /// data under the previous layout.
    pub fn force_reinit(&mut self) -> Result<()> {
        self.with_model_mut(true, |_| Ok(()))
    }

    /// Flushes the mapping and syncs the backing file.
    pub fn close(self) -> Result<()> {
        self.region.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn store_round_trips_a_property_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("eeprom.bin");

        {
            let mut store = Store::open(&path, Some(4096)).unwrap();
            store.store("PRODUCT_ID", "ACME-1").unwrap();
            store.close().unwrap();
        }

        let mut store = Store::open(&path, None).unwrap();
        let dest = dir.path().join("out.txt");
        store.print(Some("PRODUCT_ID"), Some(&format!("@{}", dest.display()))).unwrap();
        let out = std::fs::read(&dest).unwrap();
        assert_eq!(out, b"ACME-1");
    }

    #[test]
    fn list_reflects_the_default_datamodel() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("eeprom.bin");
        let mut store = Store::open(&path, Some(4096)).unwrap();
        let keys = store.list().unwrap();
        assert!(keys.contains(&"PRODUCT_ID".to_string()));
    }

    #[test]
    fn force_reinit_discards_prior_data() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("eeprom.bin");

        let mut store = Store::open(&path, Some(4096)).unwrap();
        store.store("PRODUCT_ID", "ACME-1").unwrap();
        store.force_reinit().unwrap();

        assert_eq!(store.print(Some("PRODUCT_ID"), Some("@/dev/null")).unwrap(), 1);
    }
}
