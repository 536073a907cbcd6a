//! Image store: inbound uploads and the on-demand catalog.
//!
//! Two role-keyed directories. Inbound files are written once under a
//! collision-avoiding name (`<timestamp>_<sender>_<original>`) and never
//! mutated. The catalog is enumerated from disk on every request; there is
//! deliberately no in-memory cache, so operator-managed files appear without
//! a reload.

use std::{
    fs,
    net::IpAddr,
    path::{Path, PathBuf},
};

use thiserror::Error;

/// Filename extensions treated as catalog images (case-insensitive).
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp"];

/// Errors from image store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Requested catalog entry does not exist.
    #[error("file not found: {0}")]
    NotFound(String),

    /// Requested name tried to escape the catalog directory.
    #[error("invalid image name: {0}")]
    InvalidName(String),

    /// Underlying filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Disk-backed store for the two image roles.
#[derive(Debug, Clone)]
pub struct ImageStore {
    inbound_dir: PathBuf,
    catalog_dir: PathBuf,
}

impl ImageStore {
    /// Open (and create if missing) the inbound and catalog directories.
    pub fn open(
        inbound_dir: impl Into<PathBuf>,
        catalog_dir: impl Into<PathBuf>,
    ) -> Result<Self, StoreError> {
        let inbound_dir = inbound_dir.into();
        let catalog_dir = catalog_dir.into();
        fs::create_dir_all(&inbound_dir)?;
        fs::create_dir_all(&catalog_dir)?;
        Ok(Self { inbound_dir, catalog_dir })
    }

    /// Directory holding images uploaded by peers.
    pub fn inbound_dir(&self) -> &Path {
        &self.inbound_dir
    }

    /// Directory holding catalog images.
    pub fn catalog_dir(&self) -> &Path {
        &self.catalog_dir
    }

    /// Persist an uploaded image and return the stored filename.
    ///
    /// The stored name is `<YYYYmmdd_HHMMSS>_<sender>_<original>` with the
    /// sender address flattened to filename-safe characters. The original
    /// name is reduced to its final path component so uploads cannot place
    /// files outside the inbound directory.
    pub fn save_inbound(
        &self,
        sender: IpAddr,
        original_name: &str,
        bytes: &[u8],
    ) -> Result<String, StoreError> {
        let safe_name = Path::new(original_name)
            .file_name()
            .and_then(|name| name.to_str())
            .filter(|name| *name != "..")
            .unwrap_or("image.bin");

        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let sender = sender.to_string().replace(['.', ':'], "_");
        let filename = format!("{timestamp}_{sender}_{safe_name}");

        fs::write(self.inbound_dir.join(&filename), bytes)?;
        Ok(filename)
    }

    /// Enumerate catalog image filenames, sorted for stable listings.
    pub fn catalog(&self) -> Result<Vec<String>, StoreError> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.catalog_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if has_image_extension(name) {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Read one catalog image by filename.
    pub fn load_catalog(&self, name: &str) -> Result<Vec<u8>, StoreError> {
        if name.is_empty() || name == ".." || name.contains(['/', '\\']) {
            return Err(StoreError::InvalidName(name.to_string()));
        }

        let path = self.catalog_dir.join(name);
        if !path.is_file() {
            return Err(StoreError::NotFound(name.to_string()));
        }
        Ok(fs::read(path)?)
    }
}

fn has_image_extension(name: &str) -> bool {
    name.rsplit_once('.')
        .is_some_and(|(_, ext)| IMAGE_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};

    use super::*;

    fn store() -> (tempfile::TempDir, ImageStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::open(dir.path().join("inbound"), dir.path().join("catalog")).unwrap();
        (dir, store)
    }

    fn sender() -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))
    }

    #[test]
    fn save_inbound_preserves_bytes() {
        let (_dir, store) = store();
        let bytes = [1u8, 2, 3, 4, 5, 6, 7, 8, 9, 10];

        let stored = store.save_inbound(sender(), "pic.png", &bytes).unwrap();
        assert!(stored.ends_with("_10_0_0_1_pic.png"));

        let on_disk = fs::read(store.inbound_dir().join(&stored)).unwrap();
        assert_eq!(on_disk, bytes);
    }

    #[test]
    fn save_inbound_flattens_path_components() {
        let (_dir, store) = store();

        let stored = store.save_inbound(sender(), "../../etc/passwd", b"x").unwrap();
        assert!(stored.ends_with("_passwd"));
        assert!(store.inbound_dir().join(&stored).is_file());
    }

    #[test]
    fn catalog_filters_by_extension_and_sorts() {
        let (_dir, store) = store();
        fs::write(store.catalog_dir().join("b.PNG"), b"x").unwrap();
        fs::write(store.catalog_dir().join("a.jpg"), b"x").unwrap();
        fs::write(store.catalog_dir().join("notes.txt"), b"x").unwrap();

        assert_eq!(store.catalog().unwrap(), vec!["a.jpg".to_string(), "b.PNG".to_string()]);
    }

    #[test]
    fn catalog_of_empty_directory_is_empty() {
        let (_dir, store) = store();
        assert!(store.catalog().unwrap().is_empty());
    }

    #[test]
    fn load_missing_catalog_entry_is_not_found() {
        let (_dir, store) = store();
        assert!(matches!(store.load_catalog("missing.png"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn load_rejects_traversal_names() {
        let (_dir, store) = store();
        assert!(matches!(store.load_catalog("../x.png"), Err(StoreError::InvalidName(_))));
        assert!(matches!(store.load_catalog("a/../b.png"), Err(StoreError::InvalidName(_))));
        assert!(matches!(store.load_catalog(""), Err(StoreError::InvalidName(_))));
    }

    #[test]
    fn load_round_trips_catalog_bytes() {
        let (_dir, store) = store();
        fs::write(store.catalog_dir().join("cat.png"), [9u8, 8, 7]).unwrap();
        assert_eq!(store.load_catalog("cat.png").unwrap(), vec![9, 8, 7]);
    }
}
