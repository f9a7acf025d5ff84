//! External interfaces (`spec.md` §6): thin trait boundaries for the
//! collaborators the core is agnostic to the sourcing of. None of these
//! ship a real HTTP/database/register implementation — ingestion, tariff
//! fetching, solar forecast retrieval and inverter register I/O are
//! explicitly out of scope for the core (`spec.md` §1).

pub mod inverter;
pub mod load;
pub mod measurement;
pub mod solar;
pub mod tariff;

pub use inverter::{InverterControlProvider, ScheduleDelta};
pub use load::{LoadForecast, LoadForecastProvider};
pub use measurement::{MeasurementProvider, MeasurementSnapshot};
pub use solar::{SolarForecast, SolarForecastProvider};
pub use tariff::{TariffForecast, TariffProvider};
