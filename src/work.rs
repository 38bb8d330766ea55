//! Incremental work queue
//!
//! Long CPU jobs (atlas rasterization) are split into bounded slices and
//! driven from the per-frame callback so no single frame stalls.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// Progress report from one slice of work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Progress {
    pub done: usize,
    pub total: usize,
    pub finished: bool,
}

impl Progress {
    pub fn fraction(&self) -> f32 {
        if self.total == 0 {
            1.0
        } else {
            self.done as f32 / self.total as f32
        }
    }
}

/// A resumable unit of work
pub trait Job {
    /// Where the job stands, without doing any work
    fn progress(&self) -> Progress;

    /// Do at most `budget` units of work and report where the job stands.
    fn step(&mut self, budget: usize) -> Progress;

    fn label(&self) -> &str {
        "job"
    }
}

/// Receiving end of a job's output, filled when the job finishes
#[derive(Debug)]
pub struct Pending<T>(Rc<RefCell<Option<T>>>);

impl<T> Clone for Pending<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Default for Pending<T> {
    fn default() -> Self {
        Self(Rc::new(RefCell::new(None)))
    }
}

impl<T> Pending<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fulfill(&self, value: T) {
        *self.0.borrow_mut() = Some(value);
    }

    pub fn is_ready(&self) -> bool {
        self.0.borrow().is_some()
    }

    /// Take the output, leaving the slot empty
    pub fn take(&self) -> Option<T> {
        self.0.borrow_mut().take()
    }
}

/// Run a job to completion in one go
pub fn run_to_end<J: Job + ?Sized>(job: &mut J) -> Progress {
    loop {
        let progress = job.step(usize::MAX);
        if progress.finished {
            return progress;
        }
    }
}

/// FIFO of jobs sharing a per-frame budget
#[derive(Default)]
pub struct WorkQueue {
    jobs: VecDeque<Box<dyn Job>>,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, job: Box<dyn Job>) {
        self.jobs.push_back(job);
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Spend up to `budget` units on the queue front. Returns the number of
    /// jobs that finished during this call.
    pub fn run(&mut self, mut budget: usize) -> usize {
        let mut finished = 0;
        while budget > 0 {
            let Some(job) = self.jobs.front_mut() else {
                break;
            };
            let before = job.progress().done;
            let progress = job.step(budget);
            budget = budget.saturating_sub(progress.done.saturating_sub(before).max(1));
            if progress.finished {
                log::debug!("{} finished ({} units)", job.label(), progress.total);
                self.jobs.pop_front();
                finished += 1;
            }
        }
        finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    struct Counter {
        done: usize,
        total: usize,
        finished_flag: Rc<Cell<bool>>,
    }

    impl Job for Counter {
        fn progress(&self) -> Progress {
            Progress {
                done: self.done,
                total: self.total,
                finished: self.finished_flag.get(),
            }
        }

        fn step(&mut self, budget: usize) -> Progress {
            let n = budget.min(self.total - self.done);
            self.done += n;
            let finished = self.done == self.total;
            if finished {
                self.finished_flag.set(true);
            }
            Progress {
                done: self.done,
                total: self.total,
                finished,
            }
        }
    }

    fn counter(total: usize) -> (Counter, Rc<Cell<bool>>) {
        let flag = Rc::new(Cell::new(false));
        (
            Counter {
                done: 0,
                total,
                finished_flag: flag.clone(),
            },
            flag,
        )
    }

    #[test]
    fn test_queue_respects_budget() {
        let (job, flag) = counter(10);
        let mut queue = WorkQueue::new();
        queue.push(Box::new(job));

        assert_eq!(queue.run(4), 0);
        assert!(!flag.get());
        assert_eq!(queue.run(4), 0);
        assert_eq!(queue.run(4), 1);
        assert!(flag.get());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_queue_moves_to_next_job() {
        let (a, a_done) = counter(2);
        let (b, b_done) = counter(2);
        let mut queue = WorkQueue::new();
        queue.push(Box::new(a));
        queue.push(Box::new(b));

        assert_eq!(queue.run(10), 2);
        assert!(a_done.get() && b_done.get());
    }

    #[test]
    fn test_empty_job_finishes() {
        let (job, flag) = counter(0);
        let mut queue = WorkQueue::new();
        queue.push(Box::new(job));
        assert_eq!(queue.run(1), 1);
        assert!(flag.get());
    }

    #[test]
    fn test_peeking_progress_does_not_finish_an_empty_job() {
        let (job, flag) = counter(0);
        assert!(!job.progress().finished);
        assert!(!flag.get());

        let mut queue = WorkQueue::new();
        queue.push(Box::new(job));
        assert_eq!(queue.run(1), 1);
        assert!(flag.get());
    }

    #[test]
    fn test_run_to_end() {
        let (mut job, _) = counter(1000);
        let progress = run_to_end(&mut job);
        assert!(progress.finished);
        assert_eq!(progress.fraction(), 1.0);
    }
}
