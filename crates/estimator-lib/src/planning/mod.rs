//! Capacity planning and sensitivity analysis on top of predictions

mod capacity;
mod sensitivity;

pub use capacity::{
    CapacityPlan, CapacityPlanEntry, CapacityPlanner, LogisticsConfig, ShiftConfig,
};
pub use sensitivity::{sweep, SensitivityPoint, SweepRange, DEFAULT_SWEEP_STEPS};
