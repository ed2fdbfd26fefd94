use anyhow::{anyhow, Result};
use log::info;
use lounge_chat::UserIdentity;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::path::Path;
use uuid::Uuid;

// Cached profile of the signed-in user. Stands in for the identity provider
// when running the terminal client on its own.

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Profile {
    pub user_id: String,
    pub username: String,
}

impl Profile {
    pub fn new(username: &str) -> Result<Self> {
        let username = username.trim();
        if username.is_empty() {
            return Err(anyhow!("Username cannot be empty"));
        }
        Ok(Profile {
            user_id: Uuid::new_v4().to_string(),
            username: username.to_string(),
        })
    }

    pub fn identity(&self) -> UserIdentity {
        UserIdentity::new(&self.user_id, &self.username)
    }
}

pub fn save_profile(dir: &Path, profile: &Profile) -> Result<()> {
    let file = File::create(dir.join("profile.json"))?;
    serde_json::to_writer_pretty(file, profile)?;

    info!("Profile saved for {}", profile.username);
    Ok(())
}

pub fn load_profile(dir: &Path) -> Result<Option<Profile>> {
    let path = dir.join("profile.json");

    if !path.exists() {
        return Ok(None);
    }

    let contents = fs::read_to_string(&path)?;
    let profile: Profile = serde_json::from_str(&contents)?;
    info!("Loaded profile for {} from {}", profile.username, path.display());

    Ok(Some(profile))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(load_profile(dir.path()).unwrap(), None);

        let profile = Profile::new("  river_rat ").unwrap();
        assert_eq!(profile.username, "river_rat");
        save_profile(dir.path(), &profile).unwrap();

        let loaded = load_profile(dir.path()).unwrap().unwrap();
        assert_eq!(loaded, profile);
        assert_eq!(loaded.identity().id, profile.user_id);
    }

    #[test]
    fn test_empty_username_rejected() {
        assert!(Profile::new("   ").is_err());
    }
}
