//! Artifact file operations.
//!
//! Unit files and autostart entries are whole files and are written
//! atomically (temp file, sync, rename) so a crashed install never
//! leaves a half-written unit behind. The shell initialization file is
//! shared with the user: the installer only ever owns the marker-fenced
//! block inside it, and removal excises the block rather than touching
//! anything else.

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::account::current_uid;
use crate::error::InstallError;

pub const RC_BLOCK_BEGIN: &str = "# >>> ledwall-client session autostart >>>";
pub const RC_BLOCK_END: &str = "# <<< ledwall-client session autostart <<<";

/// Write `content` atomically and set world-readable permissions.
pub fn write_file_atomic(path: &Path, content: &str) -> Result<(), InstallError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            InstallError::System(format!("failed to create {}: {e}", parent.display()))
        })?;
    }

    let temp_path = path.with_extension("tmp");
    {
        let mut file = fs::File::create(&temp_path).map_err(|e| {
            InstallError::System(format!("failed to create {}: {e}", temp_path.display()))
        })?;
        file.write_all(content.as_bytes())
            .map_err(|e| InstallError::System(format!("failed to write temp file: {e}")))?;
        file.sync_all()
            .map_err(|e| InstallError::System(format!("failed to sync temp file: {e}")))?;
    }

    fs::rename(&temp_path, path)
        .map_err(|e| InstallError::System(format!("failed to rename temp file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(path)
            .map_err(|e| InstallError::System(format!("failed to stat {}: {e}", path.display())))?
            .permissions();
        perms.set_mode(0o644);
        fs::set_permissions(path, perms).map_err(|e| {
            InstallError::System(format!("failed to set permissions on {}: {e}", path.display()))
        })?;
    }

    Ok(())
}

/// Hand a file written by root over to the target account. No-op when
/// the installer runs unprivileged (tests, dry runs).
pub fn chown_if_root(path: &Path, uid: u32, gid: u32) -> Result<(), InstallError> {
    if current_uid() != 0 {
        return Ok(());
    }
    std::os::unix::fs::chown(path, Some(uid), Some(gid)).map_err(|e| {
        InstallError::System(format!("failed to chown {}: {e}", path.display()))
    })
}

/// Replace (or append) the installer's fenced block in `rc_path`.
/// Re-running produces byte-identical content, never a second block.
pub fn upsert_rc_block(rc_path: &Path, body: &str) -> Result<(), InstallError> {
    let existing = read_optional(rc_path)?;
    let (mut content, _) = strip_block(&existing);

    if !content.is_empty() && !content.ends_with('\n') {
        content.push('\n');
    }
    content.push_str(RC_BLOCK_BEGIN);
    content.push('\n');
    content.push_str(body);
    if !body.ends_with('\n') {
        content.push('\n');
    }
    content.push_str(RC_BLOCK_END);
    content.push('\n');

    write_file_atomic(rc_path, &content)
}

/// Excise the fenced block. Returns whether one was present. The file is
/// left untouched when it holds no block.
pub fn remove_rc_block(rc_path: &Path) -> Result<bool, InstallError> {
    if !rc_path.exists() {
        return Ok(false);
    }

    let existing = read_optional(rc_path)?;
    let (stripped, removed) = strip_block(&existing);
    if removed {
        write_file_atomic(rc_path, &stripped)?;
    }
    Ok(removed)
}

pub fn has_rc_block(rc_path: &Path) -> bool {
    fs::read_to_string(rc_path)
        .map(|c| c.contains(RC_BLOCK_BEGIN))
        .unwrap_or(false)
}

fn read_optional(path: &Path) -> Result<String, InstallError> {
    if path.exists() {
        fs::read_to_string(path).map_err(|e| {
            InstallError::System(format!("failed to read {}: {e}", path.display()))
        })
    } else {
        Ok(String::new())
    }
}

/// Drop every line from the begin marker through the end marker,
/// inclusive. Anything outside the fence is preserved verbatim.
fn strip_block(content: &str) -> (String, bool) {
    let mut out = String::with_capacity(content.len());
    let mut inside = false;
    let mut removed = false;

    for line in content.lines() {
        if line.trim_end() == RC_BLOCK_BEGIN {
            inside = true;
            removed = true;
            continue;
        }
        if line.trim_end() == RC_BLOCK_END {
            inside = false;
            continue;
        }
        if !inside {
            out.push_str(line);
            out.push('\n');
        }
    }

    (out, removed)
}
