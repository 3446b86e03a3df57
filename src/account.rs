//! Target account resolution.
//!
//! Display access is account-scoped, so every probe and every generated
//! unit is tied to one Unix account. The account is resolved once, up
//! front, from the account database; a missing account is a fatal
//! configuration error, not something to retry.

use std::path::PathBuf;

use users::os::unix::UserExt;

use crate::error::InstallError;

/// A resolved Unix account the client runs as.
#[derive(Debug, Clone)]
pub struct Account {
    pub name: String,
    pub uid: u32,
    pub gid: u32,
    pub group: String,
    pub home: PathBuf,
}

impl Account {
    /// Resolve `name` against the account database.
    pub fn lookup(name: &str) -> Result<Self, InstallError> {
        let user = users::get_user_by_name(name)
            .ok_or_else(|| InstallError::UnknownAccount(name.to_string()))?;

        let gid = user.primary_group_id();
        let group = users::get_group_by_gid(gid)
            .map(|g| g.name().to_string_lossy().into_owned())
            .unwrap_or_else(|| name.to_string());

        Ok(Self {
            name: name.to_string(),
            uid: user.uid(),
            gid,
            group,
            home: user.home_dir().to_path_buf(),
        })
    }

    /// Whether the installer process already runs as this account.
    pub fn is_current_user(&self) -> bool {
        self.uid == current_uid()
    }
}

pub fn current_uid() -> u32 {
    unsafe { libc::getuid() }
}

/// System units and account-owned files require root.
pub fn require_root() -> Result<(), InstallError> {
    if current_uid() != 0 {
        return Err(InstallError::Privileges(
            "installing system units requires root (re-run with sudo)".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
pub fn fixture() -> Account {
    Account {
        name: "pi".to_string(),
        uid: 1000,
        gid: 1000,
        group: "pi".to_string(),
        home: PathBuf::from("/home/pi"),
    }
}
