// ariston-api: Async Rust client for the Ariston NET dashboard backend

pub mod client;
pub mod error;
pub mod model;
pub mod transport;

pub use client::AristonClient;
pub use error::Error;
pub use model::{PlantData, PlantUpdate, TempSetting, Zone, ZoneMode};
pub use transport::{Timeouts, TransportConfig};
