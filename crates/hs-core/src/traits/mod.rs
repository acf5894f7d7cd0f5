//! Collaborator traits injected into the swap engine

mod operator;
mod process;
mod remote;
mod tower;

pub use operator::{Confirmation, NoopSink, OperatorSink, PlanEntry};
pub use process::{LocalChild, LocalExec, LocalSpawner, ProcessInfo, ProcessSnapshotProvider};
pub use remote::{ChannelProcess, CommandOutput, RemoteChannel, RemoteExec, RunOptions};
pub use tower::{NoTowerSync, TowerSync};
