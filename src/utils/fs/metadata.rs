//! File checksums.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::Path;

/// Prefix stored in front of every recorded hash.
pub const CHECKSUM_PREFIX: &str = "sha256:";

/// Calculates the SHA-256 checksum of a file as lowercase hex.
///
/// The file is streamed through the hasher rather than read into memory.
///
/// # Examples
///
/// ```rust,no_run
/// use crew_installer::utils::fs::calculate_checksum;
/// use std::path::Path;
///
/// # fn example() -> anyhow::Result<()> {
/// let hex = calculate_checksum(Path::new("CLAUDE.md"))?;
/// assert_eq!(hex.len(), 64);
/// # Ok(())
/// # }
/// ```
pub fn calculate_checksum(path: &Path) -> Result<String> {
    let mut file = fs::File::open(path)
        .with_context(|| format!("Failed to read file for checksum: {}", path.display()))?;

    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)
        .with_context(|| format!("Failed to hash file: {}", path.display()))?;

    Ok(hex::encode(hasher.finalize()))
}

/// Checksum in the stored `sha256:<hex>` form.
pub fn prefixed_checksum(path: &Path) -> Result<String> {
    Ok(format!("{CHECKSUM_PREFIX}{}", calculate_checksum(path)?))
}

/// Strips an optional `sha256:` prefix and lowercases the digest.
#[must_use]
pub fn normalize_checksum(checksum: &str) -> String {
    checksum.trim().strip_prefix(CHECKSUM_PREFIX).unwrap_or(checksum.trim()).to_ascii_lowercase()
}
