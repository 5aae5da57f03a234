//! File system utilities
//!
//! Safe, atomic file operations shared by the metadata store and the file
//! transfer layer.
//!
//! # Key Features
//!
//! - **Atomic operations**: documents are written temp-then-rename
//! - **Checksum validation**: streamed SHA-256 for integrity records
//! - **Path handling**: lexical normalization, symlink-resolving
//!   canonicalization of not-yet-existing paths, `~` expansion
//!
//! # Examples
//!
//! ```rust,no_run
//! use crew_installer::utils::fs::{ensure_dir, safe_write, calculate_checksum};
//! use std::path::Path;
//!
//! # fn example() -> anyhow::Result<()> {
//! ensure_dir(Path::new("output/commands"))?;
//! safe_write(Path::new("output/settings.json"), "{}")?;
//! let checksum = calculate_checksum(Path::new("output/settings.json"))?;
//! println!("File checksum: {}", checksum);
//! # Ok(())
//! # }
//! ```

pub mod atomic;
pub mod dirs;
pub mod formats;
pub mod metadata;
pub mod paths;

pub use atomic::{atomic_write, safe_write};
pub use dirs::{ensure_dir, ensure_parent_dir, remove_dir_all, remove_dir_if_empty};
pub use formats::{read_json_file, write_json_file};
pub use metadata::{CHECKSUM_PREFIX, calculate_checksum, normalize_checksum, prefixed_checksum};
pub use paths::{
    absolutize, canonicalize_existing_prefix, expand_path, normalize_path,
    normalize_path_for_storage,
};
