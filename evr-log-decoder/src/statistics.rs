//! Start/stop interval statistics
//!
//! Events of class 0xEF mark the start or stop of an interval in one of four
//! groups (A..D) with sixteen slots each. The aggregator pairs starts with
//! stops per (group, slot) and accumulates the durations.

use crate::types::{IdParts, Phase, RawRecord, CLASS_INTERVAL};

/// Number of interval groups (A..D)
pub const GROUPS: usize = 4;
/// Slots per group
pub const SLOTS: usize = 16;
/// A stop on this slot stops every slot of its group
pub const BROADCAST_SLOT: u8 = 15;

/// Slots affected by a stop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopTarget {
    One(u8),
    All,
}

/// One interval operation on a group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntervalOp {
    Start(u8),
    Stop(StopTarget),
}

impl IntervalOp {
    pub fn from_parts(parts: &IdParts) -> Self {
        match parts.phase {
            Phase::Start => IntervalOp::Start(parts.slot),
            Phase::Stop if parts.slot == BROADCAST_SLOT => IntervalOp::Stop(StopTarget::All),
            Phase::Stop => IntervalOp::Stop(StopTarget::One(parts.slot)),
        }
    }
}

/// Accumulated state of one (group, slot)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntervalState {
    /// A start was seen and not yet stopped
    pub running: bool,
    pub start_time: f64,
    pub start_caption: String,
    /// Completed intervals
    pub count: u64,
    pub total: f64,
    pub min: f64,
    pub max: f64,
    /// Start time of the shortest interval
    pub min_time: f64,
    /// Start time of the longest interval
    pub max_time: f64,
    /// (start, stop) captions of the shortest interval
    pub min_captions: (String, String),
    /// (start, stop) captions of the longest interval
    pub max_captions: (String, String),
    pub first: f64,
    pub last: f64,
    pub first_time: f64,
    pub last_time: f64,
}

impl IntervalState {
    fn start(&mut self, time: f64, caption: &str) {
        if self.running {
            return;
        }
        self.running = true;
        self.start_time = time;
        self.start_caption = caption.to_string();
    }

    fn stop(&mut self, time: f64, caption: &str) {
        if !self.running {
            return;
        }
        self.running = false;

        let duration = time - self.start_time;
        let seeded = self.count == 0;

        if seeded || duration < self.min {
            self.min = duration;
            self.min_time = self.start_time;
            self.min_captions = (self.start_caption.clone(), caption.to_string());
        }
        if seeded || duration > self.max {
            self.max = duration;
            self.max_time = self.start_time;
            self.max_captions = (self.start_caption.clone(), caption.to_string());
        }
        if seeded {
            self.first = duration;
            self.first_time = self.start_time;
        }
        self.last = duration;
        self.last_time = self.start_time;
        self.total += duration;
        self.count += 1;
    }

    pub fn average(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total / self.count as f64
        }
    }

    /// A start is waiting for its stop at the end of the stream
    pub fn is_pending(&self) -> bool {
        self.running
    }

    pub fn min_stop_time(&self) -> f64 {
        self.min_time + self.min
    }

    pub fn max_stop_time(&self) -> f64 {
        self.max_time + self.max
    }
}

/// Statistics of one (group, slot) with at least one completed interval
#[derive(Debug, Clone, PartialEq)]
pub struct SlotStatistics {
    pub group: u8,
    pub slot: u8,
    pub state: IntervalState,
}

impl SlotStatistics {
    /// Display label such as `A(0)` or `D(15)`
    pub fn label(&self) -> String {
        format!("{}({})", (b'A' + self.group) as char, self.slot)
    }
}

/// Pairs start/stop events of one pass
#[derive(Debug, Clone, Default)]
pub struct StatisticsAggregator {
    groups: [[IntervalState; SLOTS]; GROUPS],
}

impl StatisticsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget all intervals
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Apply one operation to `group`
    pub fn apply(&mut self, group: u8, op: IntervalOp, time: f64, caption: &str) {
        let Some(slots) = self.groups.get_mut(group as usize) else {
            return;
        };
        match op {
            IntervalOp::Start(slot) => {
                if let Some(state) = slots.get_mut(slot as usize) {
                    state.start(time, caption);
                }
            }
            IntervalOp::Stop(StopTarget::One(slot)) => {
                if let Some(state) = slots.get_mut(slot as usize) {
                    state.stop(time, caption);
                }
            }
            IntervalOp::Stop(StopTarget::All) => {
                for state in slots.iter_mut() {
                    state.stop(time, caption);
                }
            }
        }
    }

    /// Feed a decoded record; returns false for records outside the interval class
    pub fn record(&mut self, record: &RawRecord, time: f64, caption: &str) -> bool {
        let parts = record.parts();
        if parts.class != CLASS_INTERVAL {
            return false;
        }
        log::trace!(
            "Interval {:?} group {} at {:.8}s",
            IntervalOp::from_parts(&parts),
            parts.group,
            time
        );
        self.apply(parts.group, IntervalOp::from_parts(&parts), time, caption);
        true
    }

    pub fn state(&self, group: u8, slot: u8) -> Option<&IntervalState> {
        self.groups.get(group as usize)?.get(slot as usize)
    }

    /// Slots with completed intervals, ordered by group then slot
    pub fn completed(&self) -> Vec<SlotStatistics> {
        let mut out = Vec::new();
        for (group, slots) in self.groups.iter().enumerate() {
            for (slot, state) in slots.iter().enumerate() {
                if state.count > 0 {
                    out.push(SlotStatistics {
                        group: group as u8,
                        slot: slot as u8,
                        state: state.clone(),
                    });
                }
            }
        }
        out
    }

    /// Total number of completed intervals across all slots
    pub fn completed_intervals(&self) -> u64 {
        self.groups.iter().flatten().map(|s| s.count).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{split_id, Payload, TypeTag};

    fn interval_record(id: u16) -> RawRecord {
        RawRecord {
            ticks: 0,
            type_tag: TypeTag::Two,
            id,
            length_info: 0,
            payload: Payload::Two([0, 0]),
        }
    }

    #[test]
    fn test_single_interval() {
        let mut stats = StatisticsAggregator::new();
        stats.apply(0, IntervalOp::Start(0), 1.0, "begin");
        stats.apply(0, IntervalOp::Stop(StopTarget::One(0)), 1.25, "end");

        let state = stats.state(0, 0).unwrap();
        assert_eq!(state.count, 1);
        for value in [state.total, state.min, state.max, state.average(), state.first, state.last] {
            assert_eq!(value, 0.25);
        }
        assert_eq!(state.min_time, 1.0);
        assert_eq!(state.max_stop_time(), 1.25);
        assert_eq!(state.min_captions, ("begin".to_string(), "end".to_string()));
        assert!(!state.is_pending());
    }

    #[test]
    fn test_orphan_stop_ignored() {
        let mut stats = StatisticsAggregator::new();
        stats.apply(1, IntervalOp::Stop(StopTarget::One(3)), 2.0, "");
        assert_eq!(stats.state(1, 3).unwrap().count, 0);
        assert!(stats.completed().is_empty());
    }

    #[test]
    fn test_duplicate_start_keeps_first() {
        let mut stats = StatisticsAggregator::new();
        stats.apply(0, IntervalOp::Start(2), 1.0, "first");
        stats.apply(0, IntervalOp::Start(2), 1.5, "second");
        stats.apply(0, IntervalOp::Stop(StopTarget::One(2)), 2.0, "stop");

        let state = stats.state(0, 2).unwrap();
        assert_eq!(state.count, 1);
        assert_eq!(state.total, 1.0);
        assert_eq!(state.min_captions.0, "first");
    }

    #[test]
    fn test_min_max_tracking() {
        let mut stats = StatisticsAggregator::new();
        for (start, stop) in [(0.0, 2.0), (3.0, 3.5), (4.0, 7.0)] {
            stats.apply(3, IntervalOp::Start(1), start, "s");
            stats.apply(3, IntervalOp::Stop(StopTarget::One(1)), stop, "e");
        }

        let state = stats.state(3, 1).unwrap();
        assert_eq!(state.count, 3);
        assert_eq!(state.min, 0.5);
        assert_eq!(state.min_time, 3.0);
        assert_eq!(state.max, 3.0);
        assert_eq!(state.max_time, 4.0);
        assert_eq!(state.first, 2.0);
        assert_eq!(state.last, 3.0);
        assert_eq!(state.last_time, 4.0);
        assert_eq!(state.total, 5.5);
    }

    #[test]
    fn test_broadcast_stop() {
        let mut stats = StatisticsAggregator::new();
        stats.record(&interval_record(0xEF41), 1.0, "start B(1)");
        stats.record(&interval_record(0xEF44), 2.0, "start B(4)");
        stats.record(&interval_record(0xEF6F), 3.0, "stop all");

        let completed = stats.completed();
        let labels: Vec<String> = completed.iter().map(SlotStatistics::label).collect();
        assert_eq!(labels, vec!["B(1)", "B(4)"]);
        assert_eq!(completed[0].state.total, 2.0);
        assert_eq!(completed[1].state.total, 1.0);
        assert_eq!(stats.completed_intervals(), 2);
    }

    #[test]
    fn test_pending_start() {
        let mut stats = StatisticsAggregator::new();
        stats.record(&interval_record(0xEF00), 0.0, "");
        stats.record(&interval_record(0xEF20), 1.0, "");
        stats.record(&interval_record(0xEF00), 2.0, "");

        let state = stats.state(0, 0).unwrap();
        assert_eq!(state.count, 1);
        assert!(state.is_pending());
    }

    #[test]
    fn test_other_classes_ignored() {
        let mut stats = StatisticsAggregator::new();
        assert!(!stats.record(&interval_record(0xFF00), 0.0, ""));
        assert!(stats.record(&interval_record(0xEF00), 0.0, ""));
        stats.reset();
        assert!(!stats.state(0, 0).unwrap().running);
    }

    #[test]
    fn test_op_from_parts() {
        assert_eq!(IntervalOp::from_parts(&split_id(0xEF91)), IntervalOp::Start(1));
        assert_eq!(
            IntervalOp::from_parts(&split_id(0xEF35)),
            IntervalOp::Stop(StopTarget::One(5))
        );
        assert_eq!(
            IntervalOp::from_parts(&split_id(0xEF2F)),
            IntervalOp::Stop(StopTarget::All)
        );
        assert_eq!(IntervalOp::from_parts(&split_id(0xEF0F)), IntervalOp::Start(15));
    }

    #[test]
    fn test_deterministic() {
        let run = || {
            let mut stats = StatisticsAggregator::new();
            for (i, id) in [0xEF00u16, 0xEF41, 0xEF20, 0xEF61, 0xEF00, 0xEF20].iter().enumerate() {
                stats.record(&interval_record(*id), i as f64 * 0.1, &format!("#{}", i));
            }
            stats.completed()
        };
        assert_eq!(run(), run());
    }
}
