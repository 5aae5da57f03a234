//! Global constants used throughout the installer.
//!
//! File names, directory names, retention limits, and the fixed lists that
//! drive security validation and legacy migration live here so that the
//! on-disk layout is defined in exactly one place.

use std::time::Duration;

/// Name of the installer's private directory inside an install root.
pub const CREW_DIR: &str = ".crew";

/// File name of the Unified Metadata Document (under `.crew/config/`).
pub const METADATA_FILE: &str = "crew-metadata.json";

/// File name of the installer inventory (under `.crew/config/`).
pub const INVENTORY_FILE: &str = "inventory.json";

/// File name of the user-facing Settings Document at the install root.
pub const SETTINGS_FILE: &str = "settings.json";

/// Prefix of settings backup files; the timestamp follows.
pub const SETTINGS_BACKUP_PREFIX: &str = "settings_";

/// Number of settings backups kept after each backup operation.
pub const DEFAULT_BACKUP_RETENTION: usize = 10;

/// Installer version recorded in `installation.installer_version`.
pub const INSTALLER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Framework version shipped by this installer.
pub const FRAMEWORK_VERSION: &str = "4.1.0";

/// Release date of [`FRAMEWORK_VERSION`].
pub const FRAMEWORK_RELEASE_DATE: &str = "2026-09-30";

/// Settings keys that belong in the Unified Metadata Document.
///
/// Older installers wrote these into `settings.json`; `migrate_metadata`
/// moves them out.
pub const LEGACY_SETTINGS_KEYS: &[&str] = &["components", "framework", "crew", "mcp"];

/// Files that are merged by appending rather than overwritten.
pub const MERGEABLE_FILES: &[&str] = &["CLAUDE.md"];

/// Marker written between existing content and appended framework content.
pub const MERGE_MARKER: &str = "<!-- crew framework content";

/// Directories whose contents are user data and survive uninstall when
/// `preserve_user_data` is set.
pub const USER_DATA_DIRS: &[&str] = &["logs", "memory", "user"];

/// Timeout for probing external tools (e.g. `node --version`).
pub const TOOL_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default number of components installed concurrently within one level.
pub const DEFAULT_MAX_PARALLEL: usize = 1;

/// Directories that may never be used as an install root, nor contain one.
pub static PROTECTED_TREES: &[&str] = &[
    "/etc",
    "/usr",
    "/bin",
    "/sbin",
    "/boot",
    "/dev",
    "/proc",
    "/sys",
    "/lib",
    "/lib64",
    "/System",
    "/Library",
    "/private/etc",
    "/private/var/db",
    "C:\\Windows",
    "C:\\Program Files",
    "C:\\Program Files (x86)",
    "C:\\ProgramData",
];

/// Directories that may not be an install root themselves, though nested
/// paths below them are fine (temp dirs, home directories).
pub static PROTECTED_ROOTS: &[&str] = &[
    "/",
    "/home",
    "/Users",
    "/root",
    "/tmp",
    "/var",
    "/opt",
    "/private",
    "/private/tmp",
    "/private/var",
    "C:\\",
    "C:\\Users",
];

/// Characters that never appear in a legitimate install path or file name.
pub const SHELL_METACHARACTERS: &[char] = &[';', '|', '&', '`', '$', '<', '>', '\n', '\r', '\0'];

/// Substrings rejected anywhere in an install path, before and after cleaning.
pub const SUSPICIOUS_PATH_SUBSTRINGS: &[&str] = &["..", "~"];

/// Additional characters rejected in component file names.
pub const INVALID_FILENAME_CHARS: &[char] = &[':', '"', '?', '*', '\\'];
