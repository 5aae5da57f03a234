//! External tool requirements (`node >= 18`, ...).
//!
//! Tools are located on `PATH` with `which` and asked for `--version`. The
//! probe is bounded by [`TOOL_PROBE_TIMEOUT`]; a tool that hangs is killed and
//! reported as unusable.

use anyhow::{Context, Result, anyhow, bail};
use semver::{Version, VersionReq};
use std::fmt;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::constants::TOOL_PROBE_TIMEOUT;
use crate::core::InstallerError;

/// Reports the installed version of an external tool.
pub trait ToolProbe: Send + Sync + fmt::Debug {
    fn version(&self, tool: &str) -> Result<Version>;
}

/// Runs `<tool> --version` from `PATH`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemToolProbe;

impl ToolProbe for SystemToolProbe {
    fn version(&self, tool: &str) -> Result<Version> {
        let path = which::which(tool).with_context(|| format!("'{tool}' not found on PATH"))?;
        debug!(tool, path = %path.display(), "Probing tool version");

        let mut child = Command::new(&path)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("Failed to run {} --version", path.display()))?;

        let deadline = Instant::now() + TOOL_PROBE_TIMEOUT;
        loop {
            if child.try_wait()?.is_some() {
                break;
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                warn!(tool, "Version probe timed out after {}s", TOOL_PROBE_TIMEOUT.as_secs());
                bail!("'{tool} --version' did not finish within {}s", TOOL_PROBE_TIMEOUT.as_secs());
            }
            thread::sleep(Duration::from_millis(20));
        }

        let output = child.wait_with_output()?;
        if !output.status.success() {
            bail!("'{tool} --version' exited with {}", output.status);
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_tool_version(&stdout)
            .ok_or_else(|| anyhow!("Unrecognized version output from {tool}: {}", stdout.trim()))
    }
}

/// Extracts the first version number from tool output.
///
/// Accepts `v18.17.0`, `18.17`, `node 20` and similar; missing minor and
/// patch parts are zero.
pub fn parse_tool_version(output: &str) -> Option<Version> {
    let token = output
        .split_whitespace()
        .map(|t| t.trim_start_matches(['v', 'V']))
        .find(|t| t.chars().next().is_some_and(|c| c.is_ascii_digit()))?;

    let numeric: String =
        token.chars().take_while(|c| c.is_ascii_digit() || *c == '.').collect();
    let mut parts: Vec<u64> = numeric
        .split('.')
        .filter(|p| !p.is_empty())
        .map(str::parse)
        .collect::<Result<_, _>>()
        .ok()?;
    parts.resize(3, 0);
    Some(Version::new(parts[0], parts[1], parts[2]))
}

/// Checks one requirement; the error names the tool and the needed version.
pub fn check_requirement(
    probe: &dyn ToolProbe,
    tool: &str,
    min_version: &str,
) -> Result<Version, InstallerError> {
    let not_met = |reason: String| InstallerError::RequirementNotMet {
        tool: tool.to_string(),
        required: min_version.to_string(),
        reason,
    };

    let requirement = VersionReq::parse(&format!(">={min_version}"))
        .map_err(|e| not_met(format!("invalid minimum version: {e}")))?;
    let found = probe.version(tool).map_err(|e| not_met(e.to_string()))?;

    if requirement.matches(&found) {
        Ok(found)
    } else {
        Err(not_met(format!("found {found}")))
    }
}
