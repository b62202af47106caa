//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter         | Implements               | Connects to               |
//! |-----------------|--------------------------|---------------------------|
//! | `wifi`          | RadioPort                | ESP-IDF Wi-Fi driver      |
//! |                 | ProvisioningProtocolPort | SoftAP provisioning       |
//! | `tls_transport` | ControlTransportPort     | mbedTLS client session    |
//! | `agent`         | UpdateAgentPort          | update agent / esp-ota    |
//! | `cert_store`    | CredentialStorePort      | NVS credential storage    |
//! | `time`          | ClockPort                | ESP32 system timer        |
//! | `entropy`       | JitterRng                | hardware RNG              |
//! | `log_sink`      | EventSink                | serial log output         |
//! | `device_id`     | —                        | eFuse factory MAC         |

pub mod agent;
pub mod cert_store;
pub mod device_id;
pub mod entropy;
pub mod log_sink;
pub mod time;
pub mod tls_transport;
pub mod wifi;
