//! Cross-platform utilities and helpers
//!
//! # Modules
//!
//! - [`fs`] - File system operations with atomic writes and checksums
//! - [`progress`] - Progress reporting for long-running installs

pub mod fs;
pub mod progress;

pub use fs::{
    atomic_write, calculate_checksum, ensure_dir, normalize_path, normalize_path_for_storage,
    read_json_file, safe_write, write_json_file,
};
pub use progress::InstallProgress;
