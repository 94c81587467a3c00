//! JSON state file backing the CLI
//!
//! The whole system is loaded, one operation applied, and the result written
//! back atomically (temp file + rename in the same directory). Mutations go
//! through a [`StateLock`], an exclusive advisory lock on a `<state>.lock`
//! sidecar held from load to save, so concurrent `vntw` processes apply their
//! operations one after another.

use anyhow::{bail, Context, Result};
use fs4::FileExt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use vntw_token::{SystemState, TokenSystem};

/// Exclusive hold on a state file for one load-apply-save cycle
///
/// Released when dropped.
pub struct StateLock {
    path: PathBuf,
    _guard: File,
}

impl StateLock {
    /// Block until no other process holds the state file
    pub fn acquire(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(parent_dir(path))
            .with_context(|| format!("creating state directory {}", parent_dir(path).display()))?;

        let lock_path = lock_path(path);
        let guard = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .with_context(|| format!("opening lock file {}", lock_path.display()))?;
        guard
            .lock_exclusive()
            .with_context(|| format!("locking {}", lock_path.display()))?;

        tracing::debug!(path = %lock_path.display(), "State lock acquired");
        Ok(Self {
            path: path.to_path_buf(),
            _guard: guard,
        })
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load the current state under the lock
    pub fn load(&self) -> Result<TokenSystem> {
        load(&self.path)
    }

    /// Persist the state while still holding the lock
    pub fn save(&self, system: &TokenSystem) -> Result<()> {
        save(&self.path, system)
    }
}

fn lock_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Load and validate a persisted system
pub fn load(path: &Path) -> Result<TokenSystem> {
    if !path.exists() {
        bail!(
            "state file {} not found (run 'vntw deploy' first)",
            path.display()
        );
    }
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("reading state file {}", path.display()))?;
    let state = SystemState::from_json(&json)
        .with_context(|| format!("decoding state file {}", path.display()))?;
    TokenSystem::restore(state).with_context(|| format!("validating state file {}", path.display()))
}

/// Persist the system, replacing `path` atomically
fn save(path: &Path, system: &TokenSystem) -> Result<()> {
    let json = system.snapshot().to_json().context("encoding state")?;

    let dir = parent_dir(path);
    std::fs::create_dir_all(dir)
        .with_context(|| format!("creating state directory {}", dir.display()))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("creating temporary file in {}", dir.display()))?;
    tmp.write_all(json.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)
        .with_context(|| format!("writing state file {}", path.display()))?;

    tracing::debug!(path = %path.display(), bytes = json.len(), "State saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vntw_core::Address;
    use vntw_token::DeployParams;

    fn system() -> TokenSystem {
        TokenSystem::deploy(DeployParams {
            name: "Token".into(),
            symbol: "TKN".into(),
            initial_supply: 1000,
            burn_rate_bps: 100,
            deployer: Address::from_label("deployer"),
            vesting_reserve: 100,
            signers: vec![Address::from_label("a"), Address::from_label("b")],
            threshold: 2,
        })
        .unwrap()
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");

        let system = system();
        system
            .transfer(Address::from_label("deployer"), Address::from_label("bob"), 500)
            .unwrap();
        StateLock::acquire(&path).unwrap().save(&system).unwrap();

        let loaded = load(&path).unwrap();
        assert_eq!(loaded.balance_of(&Address::from_label("bob")), 495);
        assert_eq!(loaded.total_supply(), 995);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(&dir.path().join("missing.json")).err().unwrap();
        assert!(err.to_string().contains("vntw deploy"));
    }

    #[test]
    fn test_lock_serializes_concurrent_updates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        StateLock::acquire(&path).unwrap().save(&system()).unwrap();

        let first = StateLock::acquire(&path).unwrap();
        let first_system = first.load().unwrap();

        std::thread::scope(|scope| {
            let path = &path;
            let second = scope.spawn(move || {
                // Blocks until the first update is saved and unlocked
                let lock = StateLock::acquire(path).unwrap();
                let system = lock.load().unwrap();
                system
                    .transfer(Address::from_label("deployer"), Address::from_label("carol"), 100)
                    .unwrap();
                lock.save(&system).unwrap();
            });

            first_system
                .transfer(Address::from_label("deployer"), Address::from_label("bob"), 100)
                .unwrap();
            first.save(&first_system).unwrap();
            drop(first);

            second.join().unwrap();
        });

        let loaded = load(&path).unwrap();
        assert_eq!(loaded.balance_of(&Address::from_label("bob")), 99);
        assert_eq!(loaded.balance_of(&Address::from_label("carol")), 99);
        assert_eq!(loaded.balance_of(&Address::from_label("deployer")), 700);
        assert_eq!(loaded.events_since(0).len(), 2);
    }

    #[test]
    fn test_lock_file_sits_next_to_state() {
        assert_eq!(
            lock_path(Path::new("data/state.json")),
            PathBuf::from("data/state.json.lock")
        );
    }

    #[test]
    fn test_load_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{\"not\": \"a state\"}").unwrap();
        assert!(load(&path).is_err());
    }
}
