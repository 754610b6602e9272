//! Completed plans waiting for the actuator to poll

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::plan::ActionPlan;

/// Bounded FIFO of validated plans
///
/// Plans are handed out in generation order. When full, publishing a new
/// plan supersedes the oldest pending one, so a capacity of 1 behaves as
/// "latest plan wins".
#[derive(Debug, Clone)]
pub struct PlanOutbox {
    plans: Arc<Mutex<VecDeque<ActionPlan>>>,
    capacity: usize,
    superseded: Arc<AtomicU64>,
}

impl PlanOutbox {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            plans: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
            superseded: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Add a plan; returns the plan it superseded, if any
    pub fn publish(&self, plan: ActionPlan) -> Option<ActionPlan> {
        let evicted = {
            let mut plans = self.plans.lock().unwrap_or_else(PoisonError::into_inner);
            let evicted = if plans.len() >= self.capacity {
                plans.pop_front()
            } else {
                None
            };
            plans.push_back(plan);
            evicted
        };

        if let Some(old) = &evicted {
            let total = self.superseded.fetch_add(1, Ordering::Relaxed) + 1;
            tracing::warn!(
                steps = old.len(),
                superseded = total,
                "outbox full, oldest pending plan superseded"
            );
        }

        evicted
    }

    /// Remove the next plan without waiting
    #[must_use]
    pub fn take(&self) -> Option<ActionPlan> {
        self.plans
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }

    /// Plans waiting to be fetched
    #[must_use]
    pub fn pending(&self) -> usize {
        self.plans
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Plans dropped unfetched
    #[must_use]
    pub fn superseded(&self) -> u64 {
        self.superseded.load(Ordering::Relaxed)
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_take_is_none() {
        assert!(PlanOutbox::new(2).take().is_none());
    }

    #[test]
    fn test_fifo_order() {
        let outbox = PlanOutbox::new(4);
        outbox.publish(ActionPlan::halt("first"));
        outbox.publish(ActionPlan::halt("second"));
        assert_eq!(outbox.pending(), 2);

        assert_eq!(outbox.take().unwrap().steps()[0].notes(), Some("first"));
        assert_eq!(outbox.take().unwrap().steps()[0].notes(), Some("second"));
        assert!(outbox.take().is_none());
    }

    #[test]
    fn test_full_outbox_supersedes_oldest() {
        let outbox = PlanOutbox::new(2);
        assert!(outbox.publish(ActionPlan::halt("a")).is_none());
        assert!(outbox.publish(ActionPlan::halt("b")).is_none());

        let evicted = outbox.publish(ActionPlan::halt("c")).unwrap();
        assert_eq!(evicted.steps()[0].notes(), Some("a"));
        assert_eq!(outbox.superseded(), 1);
        assert_eq!(outbox.take().unwrap().steps()[0].notes(), Some("b"));
    }

    #[test]
    fn test_single_slot_latest_wins() {
        let outbox = PlanOutbox::new(1);
        outbox.publish(ActionPlan::halt("old"));
        outbox.publish(ActionPlan::halt("new"));
        assert_eq!(outbox.pending(), 1);
        assert_eq!(outbox.take().unwrap().steps()[0].notes(), Some("new"));
    }
}
