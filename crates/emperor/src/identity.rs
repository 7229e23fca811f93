//! Identity store: the local keypair kept in `keychain.key`.
//!
//! The file is JSON `{"key": "<nsec>", "pub": "<npub>"}`.

use crate::error::{EmperorError, Result};
use nostr::Keys;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use tracing::info;

pub const KEYFILE_NAME: &str = "keychain.key";

#[derive(Debug, Serialize, Deserialize)]
struct KeyFile {
    key: String,
    #[serde(rename = "pub")]
    public: String,
}

/// Load the identity at `path`, generating and saving one on first use.
pub fn get_or_create_identity(path: &Path) -> Result<Keys> {
    if path.exists() {
        load_identity(path)
    } else {
        create_identity(path)
    }
}

pub fn load_identity(path: &Path) -> Result<Keys> {
    let content = fs::read_to_string(path)?;
    let file: KeyFile = serde_json::from_str(&content)
        .map_err(|e| EmperorError::Identity(format!("{}: {}", path.display(), e)))?;

    let keys = Keys::parse(&file.key)
        .map_err(|e| EmperorError::Identity(format!("invalid secret key: {}", e)))?;
    let stored_pub = parse_public_key(&file.public)?;
    if &stored_pub != keys.public_key() {
        return Err(EmperorError::Identity(format!(
            "{}: stored public key does not belong to the secret key",
            path.display()
        )));
    }

    Ok(keys)
}

fn create_identity(path: &Path) -> Result<Keys> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let keys = Keys::generate();
    let file = KeyFile {
        key: keys.nsec()?,
        public: keys.npub()?,
    };

    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut out = options.open(path)?;
    out.write_all(serde_json::to_string(&file)?.as_bytes())?;

    info!("Created new identity {} at {}", file.public, path.display());
    Ok(keys)
}

/// Parse a public key given as `npub1…` or 64 hex characters.
pub fn parse_public_key(value: &str) -> Result<[u8; 32]> {
    nostr::parse_public_key(value)
        .map_err(|e| EmperorError::Identity(format!("invalid public key {:?}: {}", value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_created_once_then_reloaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(KEYFILE_NAME);

        let created = get_or_create_identity(&path).unwrap();
        let reloaded = get_or_create_identity(&path).unwrap();
        assert_eq!(created, reloaded);

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert!(raw["key"].as_str().unwrap().starts_with("nsec1"));
        assert_eq!(raw["pub"].as_str().unwrap(), created.npub().unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn test_keyfile_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(KEYFILE_NAME);
        get_or_create_identity(&path).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o077, 0);
    }

    #[test]
    fn test_mismatched_pub_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(KEYFILE_NAME);
        let keys = Keys::generate();
        let other = Keys::generate();
        fs::write(
            &path,
            format!(
                r#"{{"key":"{}","pub":"{}"}}"#,
                keys.nsec().unwrap(),
                other.npub().unwrap()
            ),
        )
        .unwrap();

        assert!(matches!(load_identity(&path), Err(EmperorError::Identity(_))));
    }

    #[test]
    fn test_garbage_keyfile_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(KEYFILE_NAME);
        fs::write(&path, "not json").unwrap();
        assert!(matches!(get_or_create_identity(&path), Err(EmperorError::Identity(_))));
    }

    #[test]
    fn test_parse_public_key_forms() {
        let keys = Keys::generate();
        assert_eq!(&parse_public_key(&keys.npub().unwrap()).unwrap(), keys.public_key());
        assert_eq!(&parse_public_key(&keys.public_key_hex()).unwrap(), keys.public_key());
        assert!(parse_public_key("npub1nope").is_err());
    }
}
