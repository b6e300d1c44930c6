//! Sweep module - validated frequency sweeps and their observable state.

mod errors;
mod plan;
mod state;

pub use errors::SweepError;
pub use plan::{sweep_command, SweepPlan, SweepRequest, SWEEP_COMMAND_MARKER};
pub use state::{SweepState, SweepStatus};
