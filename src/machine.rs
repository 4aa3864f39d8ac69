use sha2::{Digest, Sha256};
use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System, UpdateKind, Users};

const MACHINE_ID_LEN: usize = 16;

/// Pseudonymous machine id: the first 16 hex chars of
/// `sha256("<hostname>::<username>")`.
pub fn machine_id(hostname: &str, username: &str) -> String {
    let digest = Sha256::digest(format!("{}::{}", hostname, username).as_bytes());
    let mut hex = format!("{:x}", digest);
    hex.truncate(MACHINE_ID_LEN);
    hex
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub hostname: String,
    pub username: String,
}

impl Identity {
    pub fn new(hostname: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            username: username.into(),
        }
    }

    pub fn detect() -> Self {
        let hostname = sysinfo::System::host_name().unwrap_or_else(|| "unknown".to_string());
        let username = pick_username(process_owner(), |key| std::env::var(key).ok());

        tracing::debug!(%hostname, %username, "detected machine identity");
        Self { hostname, username }
    }

    pub fn machine_id(&self) -> String {
        machine_id(&self.hostname, &self.username)
    }
}

const USER_VARS: [&str; 3] = ["USER", "USERNAME", "LOGNAME"];

/// Account that owns this process, resolved through the OS user table.
fn process_owner() -> Option<String> {
    let pid = sysinfo::get_current_pid().ok()?;
    let mut sys = System::new();
    sys.refresh_processes_specifics(
        ProcessesToUpdate::Some(&[pid]),
        true,
        ProcessRefreshKind::new().with_user(UpdateKind::Always),
    );
    let uid = sys.process(pid)?.user_id()?.clone();
    let users = Users::new_with_refreshed_list();
    let name = users.get_user_by_id(&uid)?.name().to_string();
    Some(name).filter(|n| !n.is_empty())
}

/// The process owner wins. Login variables only cover platforms where the
/// owner cannot be resolved.
fn pick_username(owner: Option<String>, env: impl Fn(&str) -> Option<String>) -> String {
    owner
        .or_else(|| {
            USER_VARS
                .iter()
                .find_map(|key| env(key).filter(|v| !v.trim().is_empty()))
        })
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_is_sixteen_lowercase_hex_chars() {
        let id = machine_id("devbox", "alice");
        assert_eq!(id.len(), 16);
        assert!(id
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn id_is_deterministic() {
        assert_eq!(machine_id("devbox", "alice"), machine_id("devbox", "alice"));
    }

    #[test]
    fn id_changes_with_basis() {
        let base = machine_id("devbox", "alice");
        assert_ne!(base, machine_id("devbox", "bob"));
        assert_ne!(base, machine_id("laptop", "alice"));
    }

    #[test]
    fn id_matches_known_digest_prefix() {
        // sha256("host::user")
        let full = format!("{:x}", Sha256::digest(b"host::user"));
        assert_eq!(machine_id("host", "user"), full[..16]);
    }

    #[test]
    fn owner_wins_over_login_vars() {
        let name = pick_username(Some("alice".to_string()), |_| Some("mallory".to_string()));
        assert_eq!(name, "alice");
    }

    #[test]
    fn login_vars_cover_missing_owner() {
        let name = pick_username(None, |key| match key {
            "USER" => Some(" ".to_string()),
            "LOGNAME" => Some("bob".to_string()),
            _ => None,
        });
        assert_eq!(name, "bob");
    }

    #[test]
    fn unknown_when_nothing_resolves() {
        assert_eq!(pick_username(None, |_| None), "unknown");
    }

    #[cfg(unix)]
    #[test]
    fn process_owner_resolves_on_unix() {
        let owner = process_owner();
        assert!(owner.is_some());
        assert_ne!(owner.as_deref(), Some(""));
    }
}
