//! Stateright Model for the Buffer Operation Queue
//!
//! Exhaustively explores arrivals, completions, faults, evictions and session
//! stop against a buffer that holds `capacity` segments:
//! - at_most_one_in_flight: nothing is submitted while a mutation is outstanding
//! - appends_never_lost_to_capacity: every append is queued, in flight,
//!   stored, evicted, dropped by a fault or abandoned by a stop, exactly once
//! - capacity_failure_requeues_at_head: a rejected append goes back in
//!   front of every later arrival
//! - single_remove: never two removes outstanding

use stateright::{Model, Property};
use std::collections::VecDeque;

#[derive(Clone, Debug)]
pub struct QueueModelConfig {
    /// Segments the buffer can hold
    pub capacity: usize,
    /// Arrivals to explore
    pub max_appends: u8,
    /// Asynchronous mutation faults to explore
    pub max_faults: u8,
}

impl Default for QueueModelConfig {
    fn default() -> Self {
        QueueModelConfig {
            capacity: 2,
            max_appends: 4,
            max_faults: 1,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ModelOp {
    Append(u8),
    /// Drop everything but the newest stored segment
    Remove,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct QueueState {
    pub pending: VecDeque<ModelOp>,
    pub in_flight: Option<ModelOp>,
    pub next_seq: u8,
    /// Segments held by the buffer, oldest first
    pub stored: Vec<u8>,
    pub evicted: Vec<u8>,
    /// Appends lost to mutation faults
    pub dropped: Vec<u8>,
    /// Appends still queued when the session stopped
    pub abandoned: Vec<u8>,
    pub stopped: bool,
    /// Appends in the order the buffer accepted them
    pub accepted: Vec<u8>,
    pub faults: u8,
    pub overlapping_submissions: u8,
    pub capacity_rejections: u8,
    pub forced_evictions: u8,
}

impl QueueState {
    pub fn new() -> Self {
        QueueState {
            pending: VecDeque::new(),
            in_flight: None,
            next_seq: 0,
            stored: Vec::new(),
            evicted: Vec::new(),
            dropped: Vec::new(),
            abandoned: Vec::new(),
            stopped: false,
            accepted: Vec::new(),
            faults: 0,
            overlapping_submissions: 0,
            capacity_rejections: 0,
            forced_evictions: 0,
        }
    }

    fn removes_outstanding(&self) -> usize {
        self.in_flight
            .iter()
            .chain(self.pending.iter())
            .filter(|op| **op == ModelOp::Remove)
            .count()
    }

    fn occurrences(&self, seq: u8) -> usize {
        let queued = self
            .in_flight
            .iter()
            .chain(self.pending.iter())
            .filter(|op| **op == ModelOp::Append(seq))
            .count();
        let held = [&self.stored, &self.evicted, &self.dropped, &self.abandoned]
            .iter()
            .map(|v| v.iter().filter(|&&s| s == seq).count())
            .sum::<usize>();
        queued + held
    }
}

impl Default for QueueState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum QueueAction {
    /// A segment arrives from the source
    Arrive,
    /// The in-flight mutation completes
    Complete,
    /// The in-flight mutation fails asynchronously
    Fault,
    /// Periodic trailing-window eviction
    Evict,
    /// Eviction tick retrying a parked append
    Retry,
    /// Session teardown: the queue is flushed, the in-flight op abandoned
    Stop,
}

pub struct OperationQueueModel {
    pub config: QueueModelConfig,
}

impl OperationQueueModel {
    pub fn new() -> Self {
        OperationQueueModel {
            config: QueueModelConfig::default(),
        }
    }

    pub fn with_config(config: QueueModelConfig) -> Self {
        OperationQueueModel { config }
    }

    fn submit(&self, state: &mut QueueState, op: &ModelOp) -> bool {
        if state.in_flight.is_some() {
            state.overlapping_submissions += 1;
        }
        match op {
            ModelOp::Append(_) => state.stored.len() < self.config.capacity,
            ModelOp::Remove => true,
        }
    }

    /// Queue a remove ahead of the parked append, or promote the queued one
    fn force_evict(&self, state: &mut QueueState) -> bool {
        if let Some(pos) = state.pending.iter().position(|op| *op == ModelOp::Remove) {
            state.pending.remove(pos);
            state.pending.push_front(ModelOp::Remove);
            return true;
        }
        if state.stored.len() > 1 {
            state.pending.push_front(ModelOp::Remove);
            state.forced_evictions += 1;
            return true;
        }
        false
    }

    fn drain(&self, state: &mut QueueState) {
        let mut forced = false;
        while state.in_flight.is_none() {
            let Some(op) = state.pending.pop_front() else {
                return;
            };
            if self.submit(state, &op) {
                if let ModelOp::Append(seq) = op {
                    state.accepted.push(seq);
                }
                state.in_flight = Some(op);
                continue;
            }

            state.capacity_rejections += 1;
            state.pending.push_front(op);
            // A second rejection stays parked until the next drain
            if forced || !self.force_evict(state) {
                return;
            }
            forced = true;
        }
    }
}

impl Default for OperationQueueModel {
    fn default() -> Self {
        Self::new()
    }
}

impl Model for OperationQueueModel {
    type State = QueueState;
    type Action = QueueAction;

    fn init_states(&self) -> Vec<Self::State> {
        vec![QueueState::new()]
    }

    fn actions(&self, state: &Self::State, actions: &mut Vec<Self::Action>) {
        if state.stopped {
            return;
        }
        actions.push(QueueAction::Stop);
        if state.next_seq < self.config.max_appends {
            actions.push(QueueAction::Arrive);
        }
        if state.in_flight.is_some() {
            actions.push(QueueAction::Complete);
            if state.faults < self.config.max_faults {
                actions.push(QueueAction::Fault);
            }
        } else {
            if state.removes_outstanding() == 0 && state.stored.len() > 1 {
                actions.push(QueueAction::Evict);
            }
            if !state.pending.is_empty() {
                actions.push(QueueAction::Retry);
            }
        }
    }

    fn next_state(&self, state: &Self::State, action: Self::Action) -> Option<Self::State> {
        let mut next = state.clone();
        if next.stopped {
            return None;
        }

        match action {
            QueueAction::Arrive => {
                next.pending.push_back(ModelOp::Append(next.next_seq));
                next.next_seq += 1;
            }
            QueueAction::Complete => match next.in_flight.take()? {
                ModelOp::Append(seq) => next.stored.push(seq),
                ModelOp::Remove => {
                    let keep_from = next.stored.len().saturating_sub(1);
                    let old: Vec<u8> = next.stored.drain(..keep_from).collect();
                    next.evicted.extend(old);
                }
            },
            QueueAction::Fault => {
                if let ModelOp::Append(seq) = next.in_flight.take()? {
                    next.dropped.push(seq);
                }
                next.faults += 1;
            }
            QueueAction::Evict => {
                if next.in_flight.is_some() || next.removes_outstanding() > 0 {
                    return None;
                }
                next.pending.push_back(ModelOp::Remove);
            }
            QueueAction::Retry => {
                if next.in_flight.is_some() || next.pending.is_empty() {
                    return None;
                }
            }
            QueueAction::Stop => {
                let flushed: Vec<u8> = next
                    .in_flight
                    .take()
                    .into_iter()
                    .chain(next.pending.drain(..))
                    .filter_map(|op| match op {
                        ModelOp::Append(seq) => Some(seq),
                        ModelOp::Remove => None,
                    })
                    .collect();
                next.abandoned.extend(flushed);
                next.stopped = true;
                return Some(next);
            }
        }

        self.drain(&mut next);
        Some(next)
    }

    fn properties(&self) -> Vec<Property<Self>> {
        vec![
            Property::always("at_most_one_in_flight", |_: &OperationQueueModel, state: &QueueState| {
                state.overlapping_submissions == 0
            }),
            Property::always(
                "appends_never_lost_to_capacity",
                |_: &OperationQueueModel, state: &QueueState| {
                    (0..state.next_seq).all(|seq| state.occurrences(seq) == 1)
                },
            ),
            Property::always(
                "capacity_failure_requeues_at_head",
                |_: &OperationQueueModel, state: &QueueState| {
                    let newest_accepted = state.accepted.last().copied();
                    let mut last_pending: Option<u8> = None;
                    for op in &state.pending {
                        if let ModelOp::Append(seq) = op {
                            if newest_accepted.is_some_and(|a| *seq <= a) {
                                return false;
                            }
                            if last_pending.is_some_and(|p| *seq <= p) {
                                return false;
                            }
                            last_pending = Some(*seq);
                        }
                    }
                    state.accepted.windows(2).all(|w| w[0] < w[1])
                },
            ),
            Property::always("single_remove", |_: &OperationQueueModel, state: &QueueState| {
                state.removes_outstanding() <= 1
            }),
            Property::sometimes("forced_eviction_reachable", |_: &OperationQueueModel, state: &QueueState| {
                state.forced_evictions > 0
            }),
            Property::sometimes(
                "capacity_rejection_recovered",
                |model: &OperationQueueModel, state: &QueueState| {
                    state.capacity_rejections > 0
                        && state.next_seq == model.config.max_appends
                        && state.pending.is_empty()
                        && state.in_flight.is_none()
                },
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(model: &OperationQueueModel, state: &QueueState, action: QueueAction) -> QueueState {
        model.next_state(state, action).unwrap()
    }

    #[test]
    fn test_arrivals_serialize() {
        let model = OperationQueueModel::new();
        let s = step(&model, &QueueState::new(), QueueAction::Arrive);
        let s = step(&model, &s, QueueAction::Arrive);

        assert_eq!(s.in_flight, Some(ModelOp::Append(0)));
        assert_eq!(s.pending, VecDeque::from(vec![ModelOp::Append(1)]));

        let s = step(&model, &s, QueueAction::Complete);
        assert_eq!(s.stored, vec![0]);
        assert_eq!(s.in_flight, Some(ModelOp::Append(1)));
    }

    #[test]
    fn test_full_buffer_forces_eviction_ahead_of_append() {
        let model = OperationQueueModel::new();
        let mut s = QueueState::new();
        for _ in 0..2 {
            s = step(&model, &s, QueueAction::Arrive);
            s = step(&model, &s, QueueAction::Complete);
        }
        assert_eq!(s.stored, vec![0, 1]);

        let s = step(&model, &s, QueueAction::Arrive);
        assert_eq!(s.capacity_rejections, 1);
        assert_eq!(s.forced_evictions, 1);
        assert_eq!(s.in_flight, Some(ModelOp::Remove));
        assert_eq!(s.pending.front(), Some(&ModelOp::Append(2)));

        let s = step(&model, &s, QueueAction::Complete);
        assert_eq!(s.evicted, vec![0]);
        assert_eq!(s.in_flight, Some(ModelOp::Append(2)));
    }

    #[test]
    fn test_fault_drops_append() {
        let model = OperationQueueModel::new();
        let s = step(&model, &QueueState::new(), QueueAction::Arrive);
        let s = step(&model, &s, QueueAction::Fault);
        assert_eq!(s.dropped, vec![0]);
        assert!(s.in_flight.is_none());
        assert_eq!(s.occurrences(0), 1);
    }

    #[test]
    fn test_evict_not_offered_while_busy() {
        let model = OperationQueueModel::new();
        let mut s = QueueState::new();
        for _ in 0..2 {
            s = step(&model, &s, QueueAction::Arrive);
            s = step(&model, &s, QueueAction::Complete);
        }
        let mut actions = Vec::new();
        model.actions(&s, &mut actions);
        assert!(actions.contains(&QueueAction::Evict));

        let s = step(&model, &s, QueueAction::Evict);
        let mut actions = Vec::new();
        model.actions(&s, &mut actions);
        assert!(!actions.contains(&QueueAction::Evict));
    }

    #[test]
    fn test_stop_abandons_queued_appends() {
        let model = OperationQueueModel::new();
        let s = step(&model, &QueueState::new(), QueueAction::Arrive);
        let s = step(&model, &s, QueueAction::Arrive);
        let s = step(&model, &s, QueueAction::Stop);

        assert!(s.stopped);
        assert_eq!(s.abandoned, vec![0, 1]);
        assert!(s.in_flight.is_none() && s.pending.is_empty());

        let mut actions = Vec::new();
        model.actions(&s, &mut actions);
        assert!(actions.is_empty());
    }

    #[test]
    #[ignore] // Run with: cargo test stateright_queue -- --ignored --nocapture
    fn stateright_queue_model_check() {
        use stateright::Checker;

        let model = OperationQueueModel::with_config(QueueModelConfig {
            capacity: 2,
            max_appends: 5,
            max_faults: 2,
        });

        let checker = model.checker().spawn_bfs().join();

        println!("States explored: {}", checker.unique_state_count());

        checker.assert_properties();

        println!("Model check passed! All operation queue invariants hold.");
    }
}
