//! Deferred work for the playback state machine.
//!
//! Every task is stamped with the source generation it was scheduled for.
//! Switching sources cancels the previous generation, and a task that still
//! reaches the player with a stale generation is dropped there as well.

/// Work the player performs once its due time passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    /// Reload the source after the given failed load attempt.
    RetryLoad { attempt: u64 },
    /// Read the duration again after a non-finite report.
    RepollDuration,
    /// Decide whether the buffering episode that started at `episode` is visible.
    BufferingCheck { episode: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledTask {
    pub due_ms: u64,
    pub generation: u64,
    pub kind: TaskKind,
}

/// Pending tasks ordered by insertion; drained by due time.
#[derive(Debug, Default)]
pub struct TaskQueue {
    tasks: Vec<ScheduledTask>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, due_ms: u64, generation: u64, kind: TaskKind) {
        self.tasks.push(ScheduledTask {
            due_ms,
            generation,
            kind,
        });
    }

    /// Drop every task scheduled for `generation`.
    pub fn cancel_generation(&mut self, generation: u64) {
        self.tasks.retain(|task| task.generation != generation);
    }

    /// Drop tasks matching a predicate.
    pub fn cancel_where(&mut self, predicate: impl Fn(&ScheduledTask) -> bool) {
        self.tasks.retain(|task| !predicate(task));
    }

    pub fn contains(&self, predicate: impl Fn(&ScheduledTask) -> bool) -> bool {
        self.tasks.iter().any(predicate)
    }

    /// Remove and return tasks due at `now_ms`, earliest first.
    pub fn take_due(&mut self, now_ms: u64) -> Vec<ScheduledTask> {
        let mut due = Vec::new();
        self.tasks.retain(|task| {
            if task.due_ms <= now_ms {
                due.push(*task);
                false
            } else {
                true
            }
        });
        due.sort_by_key(|task| task.due_ms);
        due
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
