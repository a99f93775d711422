use std::path::Path;
use std::sync::LazyLock;

use anyhow::Result;
use log::{error, info};
use regex::Regex;
use tokio::fs;

static MAC_ADDRESS: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"([0-9A-Fa-f]{2}[:-]){5}([0-9A-Fa-f]{2})").ok());

/// Asynchronously ensures that a directory exists, creating it if it does not.
/// This function is idempotent.
pub async fn ensure_directory_exists<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();
    if !path.exists() {
        if let Err(e) = fs::create_dir_all(path).await {
            error!("Failed to create directory at {:?}: {}", path, e);
            return Err(e.into());
        }
        info!("Created directory at: {:?}", path);
    }
    Ok(())
}

/// Pulls the last MAC address out of a platform device id, upper-cased
/// with its original separators.
pub fn extract_mac_address(device_id: &str) -> Option<String> {
    let re = MAC_ADDRESS.as_ref()?;
    re.find_iter(device_id)
        .last()
        .map(|m| m.as_str().to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_trailing_mac() {
        assert_eq!(
            extract_mac_address("BluetoothLE#BluetoothLE00:1a:7d:da:71:13-aa:bb:cc:dd:ee:ff"),
            Some("AA:BB:CC:DD:EE:FF".to_string())
        );
        assert_eq!(
            extract_mac_address("/org/bluez/hci0/dev_AA-BB-CC-DD-EE-01"),
            Some("AA-BB-CC-DD-EE-01".to_string())
        );
    }

    #[test]
    fn ids_without_mac_yield_none() {
        assert_eq!(extract_mac_address("6F1E2B7A-0C2D-4E55-9B4C-1A2B3C4D5E6F"), None);
    }

    #[tokio::test]
    async fn creates_missing_directories() {
        let root = std::env::temp_dir().join(format!("ble-thermometer-{}", std::process::id()));
        let nested = root.join("a").join("b");
        ensure_directory_exists(&nested).await.unwrap();
        assert!(nested.is_dir());
        ensure_directory_exists(&nested).await.unwrap();
        std::fs::remove_dir_all(root).unwrap();
    }
}
