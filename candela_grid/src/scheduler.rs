//! Scheduler for emitting events at a specific time in the future.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

pub type TimerId = u64;

/// Scheduler tracking all pending timers.
pub struct Scheduler<T> {
    timers: VecDeque<Timer<T>>,
    next_id: TimerId,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self { timers: VecDeque::new(), next_id: 0 }
    }
}

impl<T: Clone> Scheduler<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process all pending timers.
    ///
    /// If there are still timers pending after all ready events have been
    /// collected, the closest pending deadline is returned.
    pub fn update(&mut self, event_queue: &mut Vec<T>) -> Option<Instant> {
        let now = Instant::now();
        while !self.timers.is_empty() && self.timers[0].deadline <= now {
            if let Some(timer) = self.timers.pop_front() {
                // Automatically repeat the event.
                if let Some(interval) = timer.interval {
                    self.schedule(timer.event.clone(), interval, true, Some(timer.id));
                }

                event_queue.push(timer.event);
            }
        }

        self.timers.front().map(|timer| timer.deadline)
    }

    /// Schedule a new event.
    pub fn schedule(
        &mut self,
        event: T,
        interval: Duration,
        repeat: bool,
        id: Option<TimerId>,
    ) -> TimerId {
        let deadline = Instant::now() + interval;

        // Get insert position in the schedule.
        let mut index = self.timers.len();
        loop {
            if index == 0 {
                break;
            }
            index -= 1;

            if self.timers[index].deadline < deadline {
                index += 1;
                break;
            }
        }

        // Retrieve the next free ID.
        let id = match id {
            Some(id) => id,
            None => {
                self.next_id += 1;
                self.next_id
            },
        };

        // Set the automatic event repeat rate.
        let interval = if repeat { Some(interval) } else { None };

        self.timers.insert(index, Timer { interval, deadline, event, id });

        id
    }

    /// Cancel a scheduled event.
    pub fn unschedule(&mut self, id: TimerId) -> Option<T> {
        let index = self.timers.iter().position(|timer| timer.id == id)?;
        self.timers.remove(index).map(|timer| timer.event)
    }

    pub fn scheduled(&self, id: TimerId) -> bool {
        self.timers.iter().any(|timer| timer.id == id)
    }
}

/// Event scheduled to be emitted at a specific time.
struct Timer<T> {
    deadline: Instant,
    event: T,

    interval: Option<Duration>,
    id: TimerId,
}
