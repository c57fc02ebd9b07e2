//! Repository layer: entity-scoped database operations.
//!
//! Free functions over a borrowed `Connection`; the store adapters in
//! `crate::store` own the connection and its locking.

mod armed_alarm;
mod medication;
mod preference;

pub use armed_alarm::*;
pub use medication::*;
pub use preference::*;

/// Storage format for trigger instants (minute precision).
pub const TRIGGER_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Storage format for calendar dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";
