use super::scheduler_state::SchedulerState;
use crate::core::channels::{StateConsumer, StateProducer, Transport};
use crate::core::connections::InverseWiring;
use crate::core::errors::{ChannelError, SimError};
use crate::core::topics::{input_topic, output_topic};
use crate::core::types::{Input, Message, SimTime};
use log::{debug, error, info};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Owner of simulated time.
///
/// Subscribes to every component's output topic and publishes `Input`s on
/// their input topics as decided by [`SchedulerState`].
pub struct MasterScheduler {
    wiring: Arc<InverseWiring>,
    transport: Arc<dyn Transport>,
    state: SchedulerState,
    stop_at: Option<SimTime>,
    consumer: Option<StateConsumer>,
    producer: Option<Arc<dyn StateProducer>>,
}

impl MasterScheduler {
    pub fn new(wiring: Arc<InverseWiring>, transport: Arc<dyn Transport>) -> Self {
        let state = SchedulerState::new(wiring.clone());
        Self {
            wiring,
            transport,
            state,
            stop_at: None,
            consumer: None,
            producer: None,
        }
    }

    /// Stop instead of advancing past `time`
    pub fn with_stop_at(mut self, time: Option<SimTime>) -> Self {
        self.stop_at = time;
        self
    }

    pub fn wiring(&self) -> &InverseWiring {
        &self.wiring
    }

    pub fn state(&self) -> &SchedulerState {
        &self.state
    }

    pub fn is_set_up(&self) -> bool {
        self.consumer.is_some() && self.producer.is_some()
    }

    /// Subscribe to all output topics and open the input producer.
    /// Calling it again is a no-op.
    pub async fn set_up(&mut self) -> Result<(), SimError> {
        if self.is_set_up() {
            return Ok(());
        }
        let topics: Vec<String> = self.wiring.components().map(output_topic).collect();
        let consumer = self.transport.subscribe(topics).await?;
        let producer = self.transport.producer().await?;
        self.consumer = Some(consumer);
        self.producer = Some(producer);

        let stats = self.wiring.stats();
        info!(
            "Scheduler set up on '{}' backend: {} components, {} bound outputs, {} bound inputs",
            self.transport.name(),
            stats.components,
            stats.bound_outputs,
            stats.bound_inputs
        );
        Ok(())
    }

    /// Drive the simulation until `shutdown` is cancelled or `stop_at` is
    /// passed. Output topics closing before that is an error. Channels are
    /// released on every exit path.
    pub async fn run_forever(mut self, shutdown: CancellationToken) -> Result<(), SimError> {
        let result = match self.set_up().await {
            Ok(()) => self.schedule_until(&shutdown).await,
            Err(e) => Err(e),
        };
        if let Err(e) = &result {
            error!("Scheduler stopped at t={}: {}", self.state.time(), e);
        }
        let released = self.tear_down().await;
        result.and(released)
    }

    async fn schedule_until(&mut self, shutdown: &CancellationToken) -> Result<(), SimError> {
        let seed = self.state.start();
        info!("Scheduler seeding {} component(s) at t=0", seed.len());
        if !self.publish(seed)? {
            return Ok(());
        }

        loop {
            let consumer = self.consumer.as_mut().ok_or(ChannelError::NotSetUp)?;
            let message = tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Scheduler shutting down at t={}", self.state.time());
                    return Ok(());
                }
                message = consumer.recv() => message,
            };
            let Some(message) = message else {
                let reason = consumer.close_reason().await;
                error!("Output topics closed at t={}: {}", self.state.time(), reason);
                return Err(reason.into());
            };
            debug!("Scheduler received {:?}", message);
            let inputs = self.state.handle_message(message);
            if !self.publish(inputs)? {
                return Ok(());
            }
        }
    }

    /// Publish `inputs`, or return `false` when they lie past `stop_at`
    fn publish(&self, inputs: Vec<Input>) -> Result<bool, SimError> {
        if inputs.is_empty() {
            return Ok(true);
        }
        if let Some(stop_at) = self.stop_at {
            if self.state.time() > stop_at {
                info!("Reached stop time {} (next due at t={})", stop_at, self.state.time());
                return Ok(false);
            }
        }
        let producer = self.producer.as_ref().ok_or(ChannelError::NotSetUp)?;
        for input in inputs {
            let topic = input_topic(&input.target);
            producer.produce(&topic, Message::Input(input))?;
        }
        Ok(true)
    }

    /// Close the subscription and flush the producer
    pub async fn tear_down(&mut self) -> Result<(), SimError> {
        if let Some(mut consumer) = self.consumer.take() {
            consumer.close();
        }
        if let Some(producer) = self.producer.take() {
            producer.close().await?;
        }
        debug!("Scheduler released its channels");
        Ok(())
    }
}

impl std::fmt::Debug for MasterScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterScheduler")
            .field("backend", &self.transport.name())
            .field("time", &self.state.time())
            .field("stop_at", &self.stop_at)
            .field("set_up", &self.is_set_up())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changes;
    use crate::config::{ComponentConfig, DeviceConfig};
    use crate::core::channels::InternalTransport;
    use crate::core::types::{ComponentId, Output};
    use std::time::Duration;
    use tokio::time::timeout;

    fn pc_wiring() -> Arc<InverseWiring> {
        let configs = vec![
            ComponentConfig::new("P", DeviceConfig::Sink),
            ComponentConfig::new("C", DeviceConfig::Sink).with_input("in", "P", "out"),
        ];
        Arc::new(InverseWiring::from_component_configs(&configs).unwrap())
    }

    async fn next_input(consumer: &mut StateConsumer) -> Input {
        match timeout(Duration::from_secs(5), consumer.recv()).await {
            Ok(Some(Message::Input(input))) => input,
            other => panic!("expected an input, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_set_up_subscribes_to_every_output_topic() {
        let transport = InternalTransport::new();
        let mut scheduler = MasterScheduler::new(pc_wiring(), Arc::new(transport.clone()));
        scheduler.set_up().await.unwrap();

        assert!(scheduler.is_set_up());
        assert_eq!(transport.bus().subscriber_count("ticksim-P-out"), 1);
        assert_eq!(transport.bus().subscriber_count("ticksim-C-out"), 1);
    }

    #[tokio::test]
    async fn test_dispatches_over_the_bus() {
        let transport = InternalTransport::new();
        let mut p_in = transport.subscribe(vec![input_topic(&ComponentId::new("P"))]).await.unwrap();
        let mut c_in = transport.subscribe(vec![input_topic(&ComponentId::new("C"))]).await.unwrap();
        let producer = transport.producer().await.unwrap();

        let shutdown = CancellationToken::new();
        let scheduler = MasterScheduler::new(pc_wiring(), Arc::new(transport.clone()));
        let task = tokio::spawn(scheduler.run_forever(shutdown.clone()));

        assert_eq!(next_input(&mut p_in).await, Input::new("P".into(), 0, changes! {}));

        let output = Output::new("P".into(), 0, changes! {"out" => 5}, Some(10));
        producer.produce("ticksim-P-out", output.into()).unwrap();
        assert_eq!(next_input(&mut c_in).await, Input::new("C".into(), 0, changes! {"in" => 5}));

        producer
            .produce("ticksim-C-out", Output::new("C".into(), 0, changes! {}, None).into())
            .unwrap();
        assert_eq!(next_input(&mut p_in).await, Input::new("P".into(), 10, changes! {}));

        shutdown.cancel();
        timeout(Duration::from_secs(5), task).await.unwrap().unwrap().unwrap();
        assert_eq!(transport.bus().subscriber_count("ticksim-P-out"), 0);
    }

    #[tokio::test]
    async fn test_stops_before_passing_stop_at() {
        let transport = InternalTransport::new();
        let mut p_in = transport.subscribe(vec![input_topic(&ComponentId::new("P"))]).await.unwrap();
        let producer = transport.producer().await.unwrap();

        let scheduler =
            MasterScheduler::new(pc_wiring(), Arc::new(transport.clone())).with_stop_at(Some(5));
        let task = tokio::spawn(scheduler.run_forever(CancellationToken::new()));

        assert_eq!(next_input(&mut p_in).await.time, 0);
        producer
            .produce("ticksim-P-out", Output::new("P".into(), 0, changes! {}, Some(10)).into())
            .unwrap();

        timeout(Duration::from_secs(5), task).await.unwrap().unwrap().unwrap();
        assert_eq!(p_in.try_recv(), None);
    }

    #[tokio::test]
    async fn test_lost_broker_fails_the_run() {
        use crate::core::channels::{Broker, BrokerTransport};

        let broker = Broker::bind("127.0.0.1:0").await.unwrap();
        let transport = BrokerTransport::new(broker.local_addr().unwrap());
        let broker_shutdown = CancellationToken::new();
        tokio::spawn(broker.serve(broker_shutdown.clone()));

        let mut p_in = transport.subscribe(vec![input_topic(&ComponentId::new("P"))]).await.unwrap();
        let scheduler = MasterScheduler::new(pc_wiring(), Arc::new(transport));
        let task = tokio::spawn(scheduler.run_forever(CancellationToken::new()));

        // the seed input proves the scheduler is up and waiting on P
        assert_eq!(next_input(&mut p_in).await.time, 0);
        broker_shutdown.cancel();

        let result = timeout(Duration::from_secs(5), task).await.unwrap().unwrap();
        assert!(matches!(result, Err(SimError::Channel(_))), "got {:?}", result);
    }
}
