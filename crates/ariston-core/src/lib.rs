// ariston-core: State-synchronization engine for one Ariston NET plant.
//
// The host application owns discovery, configuration files, and entity
// registration; this crate owns the session lifecycle, the poll loop
// with availability tracking, and the write-reconciliation protocol.

pub mod config;
pub mod error;
pub mod params;
pub mod plant;

mod poll;
mod reconcile;
mod store;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{PlantConfig, ARISTON_URL};
pub use error::CoreError;
pub use params::{ChMode, ParamKind, ParameterMap, PendingChanges, PlantMode};
pub use plant::{AvailabilityChanged, Plant};

// Re-export the wire model for consumers reading snapshots.
pub use ariston_api::{PlantData, TempSetting, Zone, ZoneMode};
