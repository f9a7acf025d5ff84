pub mod battery;
pub mod input;
pub mod result;
pub mod schedule;
pub mod units;

pub use battery::*;
pub use input::*;
pub use result::*;
pub use schedule::*;
pub use units::*;
