pub mod armed_alarm;
pub mod enums;
pub mod medication;

pub use armed_alarm::*;
pub use enums::*;
pub use medication::*;
