//! Swap orchestration

mod mode;
mod orchestrator;
mod plan;

pub use mode::{SwapMode, ACCEPTED_MODES};
pub use orchestrator::{SwapOrchestrator, FD_COMPLETION_POLL, LOCAL_WAIT_AGAVE, LOCAL_WAIT_FD};
pub use plan::{Dispatch, SwapOutcome, SwapPlan, SwapReport, TowerAction};
