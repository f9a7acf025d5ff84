//! `wattplan`: plans battery charge/export windows for a home battery
//! coupled to solar generation, a variable-tariff grid connection and
//! optional loads, by repeatedly simulating candidate schedules and
//! hill-climbing toward lower cost.
//!
//! The core lives in [`domain`], [`simulator`], [`pool`], [`optimizer`] and
//! [`scoring`]; everything outside the core (forecast/tariff sourcing,
//! inverter control, configuration, the periodic driver) is in
//! [`external`], [`config`], [`plan`] and [`schedule_loop`].

pub mod config;
pub mod constants;
pub mod domain;
pub mod error;
pub mod external;
pub mod optimizer;
pub mod plan;
pub mod pool;
pub mod schedule_loop;
pub mod scoring;
pub mod simulator;
pub mod telemetry;
