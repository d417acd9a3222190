use crate::core::connections::InverseWiring;
use crate::core::types::{Changes, ComponentId, Input, Interrupt, Message, Output, SimTime};
use log::{debug, trace, warn};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Decision core of the master scheduler.
///
/// Pure and synchronous: it consumes the `Output`s and `Interrupt`s
/// reported by components and answers with the `Input`s to publish next.
/// All delta cycles at one time are resolved before time advances.
#[derive(Debug)]
pub struct SchedulerState {
    wiring: Arc<InverseWiring>,
    /// Current simulated time
    time: SimTime,
    /// Components with an outstanding callback request
    next_wake: BTreeMap<ComponentId, SimTime>,
    /// Components that asked to be ticked at the next opportunity
    pending_interrupts: BTreeSet<ComponentId>,
    /// Changes buffered for components not yet dispatched at `time`
    routed_changes: BTreeMap<ComponentId, Changes>,
    /// Components dispatched in the current delta cycle that have not replied
    awaiting: BTreeSet<ComponentId>,
    started: bool,
}

impl SchedulerState {
    pub fn new(wiring: Arc<InverseWiring>) -> Self {
        Self {
            wiring,
            time: 0,
            next_wake: BTreeMap::new(),
            pending_interrupts: BTreeSet::new(),
            routed_changes: BTreeMap::new(),
            awaiting: BTreeSet::new(),
            started: false,
        }
    }

    /// Seed the simulation: every component without a wired input is
    /// ticked at time zero with empty changes.
    pub fn start(&mut self) -> Vec<Input> {
        if self.started {
            warn!("Scheduler already started, ignoring");
            return Vec::new();
        }
        self.started = true;

        let roots = self.wiring.roots();
        if roots.is_empty() {
            warn!("No component is free of wired inputs; nothing will ever be ticked");
        }
        self.dispatch(roots)
    }

    /// Apply one message from a component's output topic. Returns the
    /// inputs that are due once the current delta cycle has completed.
    pub fn handle_message(&mut self, message: Message) -> Vec<Input> {
        match message {
            Message::Output(output) => self.handle_output(output),
            Message::Interrupt(interrupt) => self.handle_interrupt(interrupt),
            Message::Input(input) => {
                warn!("Scheduler ignoring input addressed to {}", input.target);
                return Vec::new();
            }
        }

        if self.awaiting.is_empty() {
            self.advance()
        } else {
            trace!("Still awaiting {} component(s) at t={}", self.awaiting.len(), self.time);
            Vec::new()
        }
    }

    fn handle_output(&mut self, output: Output) {
        let source = output.source;
        if !self.wiring.contains(&source) {
            warn!("Ignoring output from unknown component {}", source);
            return;
        }
        if !self.awaiting.remove(&source) {
            warn!("Stray output from {} at t={} (not awaited)", source, self.time);
        }
        if output.time != self.time {
            debug!(
                "Output from {} is stamped t={} but scheduler is at t={}",
                source, output.time, self.time
            );
        }

        match output.callback_period {
            Some(period) => {
                self.next_wake.insert(source.clone(), self.time.saturating_add(period));
            }
            None => {
                self.next_wake.remove(&source);
            }
        }

        for (port, value) in output.changes.iter() {
            for input in self.wiring.lookup(&source, port) {
                trace!("Routing {}.{} -> {}", source, port, input);
                self.routed_changes
                    .entry(input.component_id().clone())
                    .or_default()
                    .insert(input.port_name(), value.clone());
            }
        }
    }

    fn handle_interrupt(&mut self, interrupt: Interrupt) {
        let source = interrupt.source;
        if !self.wiring.contains(&source) {
            warn!("Ignoring interrupt from unknown component {}", source);
            return;
        }
        debug!("Interrupt from {} at t={}", source, self.time);
        self.next_wake.remove(&source);
        self.pending_interrupts.insert(source);
    }

    /// Run the next delta cycle at the current time, or advance to the
    /// earliest wake-up. Returns nothing when no component is due anywhere.
    fn advance(&mut self) -> Vec<Input> {
        if !self.due_now() {
            match self.next_wake.values().min() {
                Some(&next) => {
                    debug!("Advancing time {} -> {}", self.time, next);
                    self.time = next;
                }
                None => {
                    debug!("Idle at t={}, waiting for a component to report", self.time);
                    return Vec::new();
                }
            }
        }

        let time = self.time;
        let mut due: BTreeSet<ComponentId> = self
            .next_wake
            .iter()
            .filter(|(_, &wake)| wake <= time)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &due {
            self.next_wake.remove(id);
        }
        due.append(&mut self.pending_interrupts);
        due.extend(self.routed_changes.keys().cloned());

        self.dispatch(due)
    }

    fn due_now(&self) -> bool {
        !self.routed_changes.is_empty()
            || !self.pending_interrupts.is_empty()
            || self.next_wake.values().any(|&wake| wake <= self.time)
    }

    fn dispatch(&mut self, due: impl IntoIterator<Item = ComponentId>) -> Vec<Input> {
        let inputs: Vec<Input> = due
            .into_iter()
            .map(|id| {
                let changes = self.routed_changes.remove(&id).unwrap_or_default();
                Input::new(id, self.time, changes)
            })
            .collect();
        self.awaiting = inputs.iter().map(|input| input.target.clone()).collect();
        if !inputs.is_empty() {
            debug!("Dispatching {} input(s) at t={}", inputs.len(), self.time);
        }
        inputs
    }

    pub fn time(&self) -> SimTime {
        self.time
    }

    pub fn awaiting(&self) -> &BTreeSet<ComponentId> {
        &self.awaiting
    }

    pub fn next_wake(&self, id: &ComponentId) -> Option<SimTime> {
        self.next_wake.get(id).copied()
    }

    /// Nothing in flight and nothing scheduled
    pub fn is_idle(&self) -> bool {
        self.awaiting.is_empty()
            && self.next_wake.is_empty()
            && self.pending_interrupts.is_empty()
            && self.routed_changes.is_empty()
    }
}
