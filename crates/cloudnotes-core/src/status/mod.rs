//! Server status and capability discovery.

mod version;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use version::Version;

use crate::events::{ApiEvent, EventBus};
use crate::transport::{Dispatcher, Reply, Route};

pub const STATUS_ENDPOINT: &str = "/status.php";
pub const CAPABILITIES_ENDPOINT: &str = "/ocs/v2.php/cloud/capabilities";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NextcloudStatus {
    #[default]
    Unknown,
    Busy,
    Success,
    Failed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CapabilitiesStatus {
    #[default]
    Unknown,
    Busy,
    Success,
    Failed,
}

/// Contents of `status.php`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusSnapshot {
    pub installed: bool,
    pub maintenance: bool,
    #[serde(rename = "needsDbUpgrade")]
    pub needs_db_upgrade: bool,
    #[serde(rename = "extendedSupport")]
    pub extended_support: bool,
    pub version: String,
    #[serde(rename = "versionstring")]
    pub version_string: String,
    pub edition: String,
    #[serde(rename = "productname")]
    pub product_name: String,
}

impl StatusSnapshot {
    pub fn parsed_version(&self) -> Option<Version> {
        Version::parse(&self.version)
    }
}

/// Raw `capabilities` object of the OCS capabilities response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Capabilities(Map<String, Value>);

impl Capabilities {
    pub const fn raw(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn app(&self, name: &str) -> Option<AppCapabilities> {
        self.0.get(name).and_then(Value::as_object).map(AppCapabilities::from_object)
    }

    pub fn notes(&self) -> Option<AppCapabilities> {
        self.app("notes")
    }
}

/// Version information one app advertises.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppCapabilities {
    version: Option<Version>,
    api_versions: Vec<Version>,
}

impl AppCapabilities {
    fn from_object(object: &Map<String, Value>) -> Self {
        let version = object
            .get("version")
            .and_then(Value::as_str)
            .and_then(Version::parse);
        let api_versions: Vec<Version> = match object.get("api_version") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .filter_map(Version::parse)
                .collect(),
            Some(Value::String(single)) => Version::parse(single).into_iter().collect(),
            _ => Vec::new(),
        };
        Self {
            version,
            api_versions,
        }
    }

    pub const fn version(&self) -> Option<&Version> {
        self.version.as_ref()
    }

    /// Supported API versions in the order the server lists them.
    pub fn api_versions(&self) -> &[Version] {
        &self.api_versions
    }

    pub fn supports_api(&self, major: u32) -> bool {
        self.api_versions.iter().any(|version| version.major() == major)
    }
}

#[derive(Deserialize)]
struct OcsEnvelope<T> {
    ocs: OcsBody<T>,
}

#[derive(Deserialize)]
struct OcsBody<T> {
    data: T,
}

#[derive(Deserialize)]
struct CapabilitiesData {
    capabilities: Map<String, Value>,
}

/// Parses an OCS response and returns its `ocs.data` payload.
pub(crate) fn ocs_data<T: serde::de::DeserializeOwned>(reply: &Reply) -> Option<T> {
    match reply.json::<OcsEnvelope<T>>() {
        Ok(envelope) => Some(envelope.ocs.data),
        Err(error) => {
            tracing::warn!("Invalid OCS reply from {}: {}", reply.meta.url, error);
            None
        }
    }
}

/// Tracks the status and capabilities fetches of one server.
#[derive(Debug)]
pub struct StatusTracker {
    status: NextcloudStatus,
    capabilities_status: CapabilitiesStatus,
    snapshot: StatusSnapshot,
    capabilities: Capabilities,
    dispatcher: Dispatcher,
    events: EventBus,
}

impl StatusTracker {
    pub fn new(dispatcher: Dispatcher, events: EventBus) -> Self {
        Self {
            status: NextcloudStatus::Unknown,
            capabilities_status: CapabilitiesStatus::Unknown,
            snapshot: StatusSnapshot::default(),
            capabilities: Capabilities::default(),
            dispatcher,
            events,
        }
    }

    pub const fn status(&self) -> NextcloudStatus {
        self.status
    }

    pub const fn capabilities_status(&self) -> CapabilitiesStatus {
        self.capabilities_status
    }

    pub const fn snapshot(&self) -> &StatusSnapshot {
        &self.snapshot
    }

    pub const fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    pub fn get_status(&mut self) -> bool {
        let accepted = self
            .dispatcher
            .get(Route::Status, STATUS_ENDPOINT, &[], false);
        self.set_status(if accepted {
            NextcloudStatus::Busy
        } else {
            NextcloudStatus::Failed
        });
        accepted
    }

    pub fn get_capabilities(&mut self) -> bool {
        let accepted = self.dispatcher.get(
            Route::Capabilities,
            CAPABILITIES_ENDPOINT,
            &[("format", "json")],
            true,
        );
        self.set_capabilities_status(if accepted {
            CapabilitiesStatus::Busy
        } else {
            CapabilitiesStatus::Failed
        });
        accepted
    }

    pub fn handle_status_reply(&mut self, reply: &Reply) {
        if let Some(error) = &reply.error {
            tracing::warn!("Status request failed: {}", error);
            self.set_status(NextcloudStatus::Failed);
            return;
        }
        match reply.json::<StatusSnapshot>() {
            Ok(snapshot) => {
                tracing::debug!(
                    "{} {} (installed: {}, maintenance: {})",
                    snapshot.product_name,
                    snapshot.version_string,
                    snapshot.installed,
                    snapshot.maintenance
                );
                self.snapshot = snapshot;
                self.set_status(NextcloudStatus::Success);
            }
            Err(error) => {
                tracing::warn!("Invalid status reply: {}", error);
                self.set_status(NextcloudStatus::Failed);
            }
        }
    }

    pub fn handle_capabilities_reply(&mut self, reply: &Reply) {
        if let Some(error) = &reply.error {
            tracing::warn!("Capabilities request failed: {}", error);
            self.set_capabilities_status(CapabilitiesStatus::Failed);
            return;
        }
        match ocs_data::<CapabilitiesData>(reply) {
            Some(data) => {
                self.capabilities = Capabilities(data.capabilities);
                self.set_capabilities_status(CapabilitiesStatus::Success);
            }
            None => self.set_capabilities_status(CapabilitiesStatus::Failed),
        }
    }

    fn set_status(&mut self, status: NextcloudStatus) {
        if status != self.status {
            self.status = status;
            self.events.emit(ApiEvent::StatusChanged(status));
        }
    }

    fn set_capabilities_status(&mut self, status: CapabilitiesStatus) {
        if status != self.capabilities_status {
            self.capabilities_status = status;
            self.events.emit(ApiEvent::CapabilitiesStatusChanged(status));
        }
    }
}
