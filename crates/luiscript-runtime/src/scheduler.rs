use std::time::{Duration, Instant};

use crate::events::{EntityRef, Event};

/// Unique identifier for a scheduled task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

/// Type of task
#[derive(Debug, Clone)]
enum TaskType {
    /// Fires once and is removed
    OneShot,
    /// Fires repeatedly, re-armed relative to its previous due time
    Repeating { interval: Duration },
}

#[derive(Debug, Clone)]
struct Task<C> {
    id: TaskId,
    callback: C,
    due: Instant,
    task_type: TaskType,
    /// (entity, event) pairs that cancel this task when notified
    endon: Vec<(EntityRef, String)>,
}

/// Cooperative timer queue of one context
///
/// Tasks are kept in insertion order and the scheduler never runs a callback
/// itself. Each frame the owner asks for the tasks that are [`Scheduler::due`]
/// and then [`Scheduler::begin`]s them one at a time, so a callback can add or
/// cancel tasks without a live borrow on the queue.
#[derive(Debug)]
pub struct Scheduler<C> {
    tasks: Vec<Task<C>>,
    next_id: u64,
}

impl<C: Clone> Scheduler<C> {
    pub fn new() -> Self {
        Self {
            tasks: Vec::new(),
            next_id: 0,
        }
    }

    /// Schedule a callback `delay` after `now`
    ///
    /// A zero delay on a repeating task makes it run every frame.
    pub fn add(&mut self, callback: C, delay: Duration, one_shot: bool, now: Instant) -> TaskId {
        let id = TaskId(self.next_id);
        self.next_id += 1;

        let task_type = if one_shot {
            TaskType::OneShot
        } else {
            TaskType::Repeating { interval: delay }
        };

        self.tasks.push(Task {
            id,
            callback,
            due: now + delay,
            task_type,
            endon: Vec::new(),
        });
        id
    }

    /// Cancel a task, returns whether it was still queued
    pub fn cancel(&mut self, id: TaskId) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.id != id);
        self.tasks.len() != before
    }

    /// Cancel the task once `event` is notified on `entity`
    pub fn add_endon(&mut self, id: TaskId, entity: EntityRef, event: impl Into<String>) -> bool {
        match self.tasks.iter_mut().find(|t| t.id == id) {
            Some(task) => {
                task.endon.push((entity, event.into()));
                true
            }
            None => false,
        }
    }

    /// Tasks whose due time has elapsed, in queue order
    pub fn due(&self, now: Instant) -> Vec<TaskId> {
        self.tasks
            .iter()
            .filter(|t| t.due <= now)
            .map(|t| t.id)
            .collect()
    }

    /// Take the callback of a task about to run
    ///
    /// One-shot tasks leave the queue here, before their callback executes.
    /// Repeating tasks are re-armed one interval after their previous due time;
    /// when that is still in the past the due time skips ahead to the first
    /// interval boundary after `now`.
    pub fn begin(&mut self, id: TaskId, now: Instant) -> Option<C> {
        let pos = self.tasks.iter().position(|t| t.id == id)?;

        match self.tasks[pos].task_type {
            TaskType::OneShot => Some(self.tasks.remove(pos).callback),
            TaskType::Repeating { interval } => {
                let task = &mut self.tasks[pos];
                task.due = next_due(task.due, interval, now);
                Some(task.callback.clone())
            }
        }
    }

    /// Cancel every task waiting on `event`
    pub fn dispatch(&mut self, event: &Event) {
        self.tasks.retain(|t| {
            !t.endon
                .iter()
                .any(|(entity, name)| *entity == event.entity && *name == event.name)
        });
    }

    pub fn clear(&mut self) {
        self.tasks.clear();
    }

    /// Get the number of queued tasks
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl<C: Clone> Default for Scheduler<C> {
    fn default() -> Self {
        Self::new()
    }
}

fn next_due(previous: Instant, interval: Duration, now: Instant) -> Instant {
    if interval.is_zero() {
        return now;
    }

    let next = previous + interval;
    if next > now {
        return next;
    }

    let behind = now.duration_since(previous).as_nanos();
    let step = interval.as_nanos();
    let periods = behind / step + 1;
    let skip = u64::try_from(periods.saturating_mul(step)).unwrap_or(u64::MAX);
    previous + Duration::from_nanos(skip)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn tick(scheduler: &mut Scheduler<&'static str>, now: Instant) -> Vec<&'static str> {
        scheduler
            .due(now)
            .into_iter()
            .filter_map(|id| scheduler.begin(id, now))
            .collect()
    }

    #[test]
    fn test_one_shot_fires_once() {
        let start = Instant::now();
        let mut scheduler = Scheduler::new();
        scheduler.add("timeout", ms(50), true, start);

        assert!(tick(&mut scheduler, start + ms(10)).is_empty());
        assert_eq!(tick(&mut scheduler, start + ms(50)), vec!["timeout"]);
        assert!(tick(&mut scheduler, start + ms(200)).is_empty());
        assert!(scheduler.is_empty());
    }

    #[test]
    fn test_repeating_rearms_from_previous_due() {
        let start = Instant::now();
        let mut scheduler = Scheduler::new();
        scheduler.add("interval", ms(100), false, start);

        assert_eq!(tick(&mut scheduler, start + ms(100)), vec!["interval"]);
        assert_eq!(tick(&mut scheduler, start + ms(205)), vec!["interval"]);
        // due at 300, not 305
        assert_eq!(tick(&mut scheduler, start + ms(300)), vec!["interval"]);
        assert_eq!(scheduler.len(), 1);
    }

    #[test]
    fn test_missed_intervals_fire_once_and_skip_ahead() {
        let start = Instant::now();
        let mut scheduler = Scheduler::new();
        scheduler.add("interval", ms(100), false, start);

        assert_eq!(tick(&mut scheduler, start + ms(1050)), vec!["interval"]);
        assert!(tick(&mut scheduler, start + ms(1090)).is_empty());
        assert_eq!(tick(&mut scheduler, start + ms(1100)), vec!["interval"]);
    }

    #[test]
    fn test_every_frame_task() {
        let start = Instant::now();
        let mut scheduler = Scheduler::new();
        scheduler.add("frame", Duration::ZERO, false, start);

        assert_eq!(tick(&mut scheduler, start), vec!["frame"]);
        assert_eq!(tick(&mut scheduler, start + ms(16)), vec!["frame"]);
        assert_eq!(tick(&mut scheduler, start + ms(32)), vec!["frame"]);
    }

    #[test]
    fn test_cancelled_task_never_runs() {
        let start = Instant::now();
        let mut scheduler = Scheduler::new();
        let a = scheduler.add("a", ms(10), true, start);
        scheduler.add("b", ms(10), true, start);

        let due = scheduler.due(start + ms(10));
        assert!(scheduler.cancel(a));
        let fired: Vec<_> = due
            .into_iter()
            .filter_map(|id| scheduler.begin(id, start + ms(10)))
            .collect();
        assert_eq!(fired, vec!["b"]);
        assert!(!scheduler.cancel(a));
    }

    #[test]
    fn test_endon_cancels_matching_tasks() {
        let start = Instant::now();
        let mut scheduler = Scheduler::new();
        let menu = EntityRef::Menu("hud".to_string());
        let a = scheduler.add("a", ms(10), false, start);
        scheduler.add("b", ms(10), false, start);
        assert!(scheduler.add_endon(a, menu.clone(), "close"));

        scheduler.dispatch(&Event::game("close"));
        assert_eq!(scheduler.len(), 2);

        scheduler.dispatch(&Event::new(menu, "close"));
        assert_eq!(tick(&mut scheduler, start + ms(10)), vec!["b"]);
    }
}
