pub mod config;
pub mod master_scheduler;
pub mod runner;
pub mod scheduler_state;

pub use config::RunConfig;
pub use master_scheduler::MasterScheduler;
pub use runner::{run_all, Runnable};
pub use scheduler_state::SchedulerState;
