use super::master_scheduler::MasterScheduler;
use crate::core::components::Component;
use crate::core::errors::SimError;
use futures::future::BoxFuture;
use log::{error, info};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// A unit that runs as its own task: the scheduler or one component
pub trait Runnable: Send + 'static {
    fn name(&self) -> String;

    /// Open channel handles
    fn set_up(&mut self) -> BoxFuture<'_, Result<(), SimError>>;

    /// Serve until `shutdown` is cancelled, releasing channels on exit
    fn run_forever(self: Box<Self>, shutdown: CancellationToken) -> BoxFuture<'static, Result<(), SimError>>;
}

impl Runnable for Component {
    fn name(&self) -> String {
        format!("component {}", self.id())
    }

    fn set_up(&mut self) -> BoxFuture<'_, Result<(), SimError>> {
        Box::pin(Component::set_up(self))
    }

    fn run_forever(self: Box<Self>, shutdown: CancellationToken) -> BoxFuture<'static, Result<(), SimError>> {
        Box::pin(Component::run_forever(*self, shutdown))
    }
}

impl Runnable for MasterScheduler {
    fn name(&self) -> String {
        "scheduler".to_string()
    }

    fn set_up(&mut self) -> BoxFuture<'_, Result<(), SimError>> {
        Box::pin(MasterScheduler::set_up(self))
    }

    fn run_forever(self: Box<Self>, shutdown: CancellationToken) -> BoxFuture<'static, Result<(), SimError>> {
        Box::pin(MasterScheduler::run_forever(*self, shutdown))
    }
}

/// Set up every unit, then run them all concurrently until `shutdown` is
/// cancelled. The first unit to stop cancels `shutdown` for the others;
/// the first failure is returned once every unit has stopped.
pub async fn run_all(
    mut units: Vec<Box<dyn Runnable>>,
    shutdown: CancellationToken,
) -> Result<(), SimError> {
    for unit in units.iter_mut() {
        unit.set_up().await?;
    }

    let mut tasks = JoinSet::new();
    for unit in units {
        let name = unit.name();
        let token = shutdown.clone();
        tasks.spawn(async move { (name, unit.run_forever(token).await) });
    }
    info!("Running {} unit(s)", tasks.len());

    let mut first_error = None;
    while let Some(joined) = tasks.join_next().await {
        shutdown.cancel();
        match joined {
            Ok((name, Ok(()))) => info!("{} stopped", name),
            Ok((name, Err(e))) => {
                error!("{} failed: {}", name, e);
                first_error.get_or_insert(e);
            }
            Err(e) => {
                first_error.get_or_insert(SimError::from(e));
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
