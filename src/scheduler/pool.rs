//! Worker slot bookkeeping

use crate::types::TaskId;

/// Fixed set of worker slots, each bound to at most one task
///
/// Lowering `max_concurrent` never unbinds a running task. It only stops new
/// bindings until enough slots are released.
#[derive(Debug)]
pub(crate) struct WorkerPool {
    max_concurrent: usize,
    slots: Vec<Option<TaskId>>,
}

impl WorkerPool {
    pub(crate) fn new(max_concurrent: usize) -> Self {
        Self {
            max_concurrent,
            slots: Vec::with_capacity(max_concurrent),
        }
    }

    pub(crate) fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    pub(crate) fn set_max_concurrent(&mut self, max: usize) {
        self.max_concurrent = max;
    }

    /// Number of bound slots
    pub(crate) fn running(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub(crate) fn has_capacity(&self) -> bool {
        self.running() < self.max_concurrent
    }

    /// Bind `id` to a free slot, or `None` when at capacity
    pub(crate) fn acquire(&mut self, id: TaskId) -> Option<usize> {
        if !self.has_capacity() {
            return None;
        }
        match self.slots.iter().position(Option::is_none) {
            Some(index) => {
                self.slots[index] = Some(id);
                Some(index)
            }
            None => {
                self.slots.push(Some(id));
                Some(self.slots.len() - 1)
            }
        }
    }

    /// Free `slot` if it is still bound to `id`
    pub(crate) fn release(&mut self, slot: usize, id: TaskId) -> bool {
        match self.slots.get_mut(slot) {
            Some(bound) if *bound == Some(id) => {
                *bound = None;
                true
            }
            _ => false,
        }
    }

    /// Slot a task is bound to
    pub(crate) fn slot_of(&self, id: TaskId) -> Option<usize> {
        self.slots.iter().position(|slot| *slot == Some(id))
    }

    /// Ids of all bound tasks
    pub(crate) fn bound(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.slots.iter().flatten().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_stops_at_capacity() {
        let mut pool = WorkerPool::new(2);
        assert_eq!(pool.acquire(TaskId(1)), Some(0));
        assert_eq!(pool.acquire(TaskId(2)), Some(1));
        assert_eq!(pool.acquire(TaskId(3)), None);
        assert_eq!(pool.running(), 2);
    }

    #[test]
    fn released_slot_is_reused() {
        let mut pool = WorkerPool::new(2);
        pool.acquire(TaskId(1));
        pool.acquire(TaskId(2));
        assert!(pool.release(0, TaskId(1)));
        assert_eq!(pool.acquire(TaskId(3)), Some(0));
        assert_eq!(pool.slot_of(TaskId(3)), Some(0));
    }

    #[test]
    fn release_checks_the_bound_task() {
        let mut pool = WorkerPool::new(1);
        pool.acquire(TaskId(1));
        assert!(!pool.release(0, TaskId(9)));
        assert!(!pool.release(5, TaskId(1)));
        assert!(pool.release(0, TaskId(1)));
        assert!(!pool.release(0, TaskId(1)), "double release is a no-op");
    }

    #[test]
    fn lowering_capacity_keeps_running_tasks() {
        let mut pool = WorkerPool::new(3);
        pool.acquire(TaskId(1));
        pool.acquire(TaskId(2));
        pool.acquire(TaskId(3));

        pool.set_max_concurrent(1);
        assert_eq!(pool.running(), 3);
        assert!(!pool.has_capacity());

        pool.release(0, TaskId(1));
        pool.release(1, TaskId(2));
        assert!(!pool.has_capacity(), "still one running at limit 1");
        pool.release(2, TaskId(3));
        assert!(pool.has_capacity());
    }

    #[test]
    fn bound_lists_running_ids() {
        let mut pool = WorkerPool::new(3);
        pool.acquire(TaskId(4));
        pool.acquire(TaskId(5));
        pool.release(0, TaskId(4));
        assert_eq!(pool.bound().collect::<Vec<_>>(), vec![TaskId(5)]);
    }
}
