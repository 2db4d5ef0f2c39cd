//! Record fetcher: backend client, normalization into dated records, and the source seam.

pub mod client;
pub mod error;
pub mod normalize;
pub mod provider;
pub mod resources;

pub use client::DairyApiClient;
pub use error::FetchError;
pub use normalize::{normalize_json, RecordSchema};
pub use provider::{fetch_animal_roster, fetch_dated, DateRange, RecordSource};
pub use resources::Resource;
