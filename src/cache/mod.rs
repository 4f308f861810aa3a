//! Process-wide read-through caching for expensive external fetches.

pub mod singleflight;
pub mod ttl;

pub use singleflight::{FlightAborted, SingleFlight};
pub use ttl::{CacheEntry, EntryState, TtlCache};
