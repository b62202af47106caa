//! Credential store — NVS-backed persistence for Wi-Fi credentials, TLS
//! material, and system configuration.
//!
//! Implements [`CredentialStorePort`]. On ESP-IDF targets records live in
//! the `fieldlink` NVS namespace (credentials on the encrypted partition in
//! production); on simulation targets an in-memory map stands in.
//!
//! ## Record layout
//!
//! | Key           | Content                                   | Encoding |
//! |---------------|-------------------------------------------|----------|
//! | `wificred`    | provisioned Wi-Fi credentials             | postcard |
//! | `syscfg`      | [`SystemConfig`] override                 | JSON     |
//! | `root_ca`     | PEM-encoded broker CA chain               | raw      |
//! | `client_cert` | PEM-encoded device certificate            | raw      |
//! | `client_key`  | PEM-encoded device private key            | raw      |

use log::{info, warn};

use crate::app::ports::{CredentialStorePort, WifiCredentials};
use crate::config::SystemConfig;
use crate::error::CredentialError;

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

const KEY_WIFI_CREDENTIALS: &str = "wificred";
const KEY_SYSTEM_CONFIG: &str = "syscfg";
const KEY_ROOT_CA: &str = "root_ca";
const KEY_CLIENT_CERT: &str = "client_cert";
const KEY_CLIENT_KEY: &str = "client_key";

/// Maximum certificate size (PEM format, includes headers).
const MAX_CERT_SIZE: usize = 4096;

/// Maximum private key size.
const MAX_KEY_SIZE: usize = 2048;

// ───────────────────────────────────────────────────────────────
// TLS material
// ───────────────────────────────────────────────────────────────

/// Container for the control-plane TLS material.
pub struct TlsBundle {
    /// Broker CA chain (PEM-encoded, NUL-terminated for mbedTLS).
    pub root_ca: heapless::Vec<u8, MAX_CERT_SIZE>,
    /// Device certificate (PEM-encoded, NUL-terminated for mbedTLS).
    pub client_cert: heapless::Vec<u8, MAX_CERT_SIZE>,
    /// Device private key (PEM-encoded, NUL-terminated for mbedTLS).
    pub client_key: heapless::Vec<u8, MAX_KEY_SIZE>,
}

impl TlsBundle {
    pub fn is_complete(&self) -> bool {
        !self.root_ca.is_empty() && !self.client_cert.is_empty() && !self.client_key.is_empty()
    }
}

// ───────────────────────────────────────────────────────────────
// Store
// ───────────────────────────────────────────────────────────────

pub struct CredentialStore {
    #[cfg(target_os = "espidf")]
    nvs: esp_idf_svc::nvs::EspNvs<esp_idf_svc::nvs::NvsDefault>,
    #[cfg(not(target_os = "espidf"))]
    store: HashMap<&'static str, Vec<u8>>,
}

impl CredentialStore {
    /// Open the store (initialises the NVS namespace on target).
    #[cfg(target_os = "espidf")]
    pub fn new() -> Result<Self, CredentialError> {
        use esp_idf_svc::nvs::{EspNvs, EspNvsPartition, NvsDefault};

        let partition =
            EspNvsPartition::<NvsDefault>::take().map_err(|_| CredentialError::Io)?;
        let nvs = EspNvs::new(partition, "fieldlink", true).map_err(|_| CredentialError::Io)?;
        info!("credstore: ESP-IDF NVS namespace opened");
        Ok(Self { nvs })
    }

    /// Open the store (in-memory backend on the host).
    #[cfg(not(target_os = "espidf"))]
    pub fn new() -> Result<Self, CredentialError> {
        info!("credstore: simulation backend");
        Ok(Self {
            store: HashMap::new(),
        })
    }

    // ── System config ─────────────────────────────────────────

    /// Load the stored configuration override, if present and well-formed.
    pub fn load_config(&self) -> Option<SystemConfig> {
        let raw = self.read_blob(KEY_SYSTEM_CONFIG)?;
        match serde_json::from_slice(&raw) {
            Ok(config) => Some(config),
            Err(e) => {
                warn!("credstore: stored config unreadable ({e}); using defaults");
                None
            }
        }
    }

    /// Persist a configuration override.
    pub fn save_config(&mut self, config: &SystemConfig) -> Result<(), CredentialError> {
        let json = serde_json::to_vec(config).map_err(|_| CredentialError::Io)?;
        self.write_blob(KEY_SYSTEM_CONFIG, &json)
    }

    // ── TLS material ──────────────────────────────────────────

    /// Load the TLS bundle. `None` when any component is missing — the
    /// transport cannot authenticate with a partial bundle.
    pub fn load_tls_bundle(&self) -> Option<TlsBundle> {
        let bundle = TlsBundle {
            root_ca: self.read_bounded(KEY_ROOT_CA)?,
            client_cert: self.read_bounded(KEY_CLIENT_CERT)?,
            client_key: self.read_bounded(KEY_CLIENT_KEY)?,
        };
        if !bundle.is_complete() {
            warn!("credstore: incomplete TLS bundle");
            return None;
        }
        info!(
            "credstore: TLS bundle loaded (ca={}B cert={}B key={}B)",
            bundle.root_ca.len(),
            bundle.client_cert.len(),
            bundle.client_key.len(),
        );
        Some(bundle)
    }

    /// Store one TLS component (factory provisioning path).
    pub fn store_tls_component(
        &mut self,
        key: &'static str,
        data: &[u8],
    ) -> Result<(), CredentialError> {
        if data.len() > MAX_CERT_SIZE {
            return Err(CredentialError::Invalid("certificate exceeds size bound"));
        }
        self.write_blob(key, data)?;
        info!("credstore: stored '{}' ({}B)", key, data.len());
        Ok(())
    }

    // ── Backend ───────────────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn read_blob(&self, key: &str) -> Option<Vec<u8>> {
        let mut buf = [0u8; MAX_CERT_SIZE];
        match self.nvs.get_blob(key, &mut buf) {
            Ok(Some(data)) => Some(data.to_vec()),
            Ok(None) => None,
            Err(e) => {
                warn!("credstore: read '{}' failed: {:?}", key, e);
                None
            }
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_blob(&self, key: &str) -> Option<Vec<u8>> {
        self.store.get(key).cloned()
    }

    #[cfg(target_os = "espidf")]
    fn write_blob(&mut self, key: &str, data: &[u8]) -> Result<(), CredentialError> {
        self.nvs.set_blob(key, data).map_err(|e| {
            warn!("credstore: write '{}' failed: {:?}", key, e);
            CredentialError::Io
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn write_blob(&mut self, key: &'static str, data: &[u8]) -> Result<(), CredentialError> {
        self.store.insert(key, data.to_vec());
        Ok(())
    }

    fn read_bounded<const N: usize>(&self, key: &str) -> Option<heapless::Vec<u8, N>> {
        let raw = self.read_blob(key)?;
        heapless::Vec::from_slice(&raw).ok()
    }
}

// ───────────────────────────────────────────────────────────────
// CredentialStorePort
// ───────────────────────────────────────────────────────────────

impl CredentialStorePort for CredentialStore {
    fn load(&self) -> Option<WifiCredentials> {
        let raw = self.read_blob(KEY_WIFI_CREDENTIALS)?;
        match postcard::from_bytes(&raw) {
            Ok(credentials) => Some(credentials),
            Err(e) => {
                warn!("credstore: stored credentials unreadable ({e})");
                None
            }
        }
    }

    fn persist(&mut self, credentials: &WifiCredentials) -> Result<(), CredentialError> {
        if credentials.ssid.is_empty() {
            return Err(CredentialError::Invalid("SSID must not be empty"));
        }
        let blob =
            postcard::to_allocvec(credentials).map_err(|_| CredentialError::Corrupted)?;
        self.write_blob(KEY_WIFI_CREDENTIALS, &blob)?;
        info!("credstore: credentials persisted (SSID='{}')", credentials.ssid);
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
