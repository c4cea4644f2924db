//! The user profile and its XP counter.

use crate::snapshot::write_json_atomic;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const DEMO_USER_ID: &str = "00000000-0000-0000-0000-000000000001";
pub const DEMO_USER_EMAIL: &str = "demo@impulse-tracker.app";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    /// XP. Only grows, except when all user data is cleared.
    pub agency_points: u64,
}

impl UserProfile {
    pub fn new(id: impl Into<String>, email: impl Into<String>) -> Self {
        UserProfile {
            id: id.into(),
            email: email.into(),
            agency_points: 0,
        }
    }
}

/// Stores one profile as `user.json`, replaced atomically on every write.
#[derive(Debug, Clone)]
pub struct UserStore {
    path: PathBuf,
}

impl UserStore {
    pub fn new(dir: &Path) -> Self {
        UserStore {
            path: dir.join("user.json"),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the profile for `template.id`, creating it on first access.
    ///
    /// A stored profile with the same id is returned unchanged, so repeated
    /// calls are idempotent. A stored profile for another id is replaced by
    /// `template`.
    pub fn ensure(&self, template: &UserProfile) -> io::Result<UserProfile> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => {
                let stored: UserProfile = serde_json::from_str(&contents)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
                if stored.id == template.id {
                    return Ok(stored);
                }
                log::info!(
                    "replacing user profile {} with {} at {}",
                    stored.id,
                    template.id,
                    self.path.display()
                );
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::info!("creating user profile {} at {}", template.id, self.path.display());
            }
            Err(e) => return Err(e),
        }
        self.save(template)?;
        Ok(template.clone())
    }

    pub fn save(&self, profile: &UserProfile) -> io::Result<()> {
        write_json_atomic(&self.path, profile)
    }

    /// Add `amount` XP, saturating, and return the new total.
    pub fn add_points(&self, template: &UserProfile, amount: u64) -> io::Result<u64> {
        let mut profile = self.ensure(template)?;
        profile.agency_points = profile.agency_points.saturating_add(amount);
        self.save(&profile)?;
        Ok(profile.agency_points)
    }

    /// Set XP back to zero, keeping identity.
    pub fn reset_points(&self, template: &UserProfile) -> io::Result<()> {
        let mut profile = self.ensure(template)?;
        profile.agency_points = 0;
        self.save(&profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn ensure_keeps_the_stored_profile_for_the_same_id() {
        let dir = tempdir().unwrap();
        let store = UserStore::new(dir.path());
        let alice = UserProfile::new("alice", "a@example.com");
        assert_eq!(store.add_points(&alice, 40).unwrap(), 40);
        assert_eq!(store.ensure(&alice).unwrap().agency_points, 40);
    }

    #[test]
    fn ensure_switches_to_a_new_id() {
        let dir = tempdir().unwrap();
        let store = UserStore::new(dir.path());
        let alice = UserProfile::new("alice", "a@example.com");
        store.add_points(&alice, 40).unwrap();

        let bob = UserProfile::new("bob", "b@example.com");
        assert_eq!(store.ensure(&bob).unwrap(), bob);
        assert_eq!(store.add_points(&bob, 10).unwrap(), 10);

        let on_disk: UserProfile =
            serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(on_disk.id, "bob");
        assert_eq!(on_disk.agency_points, 10);
    }
}
