//! Simulated thread table.

use kdbg_protocol::{Address, Context, ThreadId};

use crate::ring::Ring;
use crate::target::{ThreadRef, Threads};

/// One simulated kernel thread
#[derive(Debug, Clone, Default)]
pub struct SimThread
{
    pub id: ThreadId,
    pub tib: Address,
    pub suspend_count: u32,
    pub exit_code: i32,
    /// Saved registers while halted at a trap
    pub context: Option<Context>,
}

impl SimThread
{
    /// Runnable thread with no stored context.
    #[must_use]
    pub fn new(id: u32, tib: Address) -> Self
    {
        Self {
            id: ThreadId(id),
            tib,
            ..Self::default()
        }
    }
}

/// Circular thread list with a current thread
///
/// [`Threads::dispatch`] only counts yields; no other thread actually runs.
#[derive(Debug, Clone)]
pub struct SimThreads
{
    ring: Ring<SimThread>,
    current: ThreadRef,
    yields: usize,
}

impl SimThreads
{
    /// Thread table whose only, and current, thread is `initial`.
    #[must_use]
    pub fn new(initial: SimThread) -> Self
    {
        let mut ring = Ring::new();
        let current = ring.push(initial);
        Self {
            ring,
            current,
            yields: 0,
        }
    }

    /// Append a thread to the list.
    pub fn spawn(&mut self, thread: SimThread) -> ThreadRef
    {
        self.ring.push(thread)
    }

    /// Make `thread` the running thread.
    pub fn set_current(&mut self, thread: ThreadRef)
    {
        self.current = thread;
    }

    /// Borrow a thread.
    #[must_use]
    pub fn thread(&self, thread: ThreadRef) -> &SimThread
    {
        &self.ring[thread]
    }

    /// Mutably borrow a thread.
    pub fn thread_mut(&mut self, thread: ThreadRef) -> &mut SimThread
    {
        &mut self.ring[thread]
    }

    /// Number of times a thread gave up the CPU.
    #[must_use]
    pub fn yields(&self) -> usize
    {
        self.yields
    }
}

impl Threads for SimThreads
{
    fn lookup(&self, id: ThreadId) -> Option<ThreadRef>
    {
        self.ring.find(|thread| thread.id == id)
    }

    fn current(&self) -> ThreadRef
    {
        self.current
    }

    fn head(&self) -> ThreadRef
    {
        // The ring is seeded with one thread and never shrinks.
        self.ring.head().unwrap_or(self.current)
    }

    fn next(&self, thread: ThreadRef) -> ThreadRef
    {
        self.ring.next(thread)
    }

    fn id(&self, thread: ThreadRef) -> ThreadId
    {
        self.ring[thread].id
    }

    fn tib(&self, thread: ThreadRef) -> Address
    {
        self.ring[thread].tib
    }

    fn exit_code(&self, thread: ThreadRef) -> i32
    {
        self.ring[thread].exit_code
    }

    fn suspend_count(&self, thread: ThreadRef) -> u32
    {
        self.ring[thread].suspend_count
    }

    fn suspend(&mut self, thread: ThreadRef) -> i32
    {
        let entry = &mut self.ring[thread];
        entry.suspend_count += 1;
        entry.suspend_count as i32
    }

    fn resume(&mut self, thread: ThreadRef) -> i32
    {
        let entry = &mut self.ring[thread];
        entry.suspend_count = entry.suspend_count.saturating_sub(1);
        entry.suspend_count as i32
    }

    fn stored_context(&self, thread: ThreadRef) -> Option<Context>
    {
        self.ring[thread].context
    }

    fn set_stored_context(&mut self, thread: ThreadRef, context: Option<Context>)
    {
        self.ring[thread].context = context;
    }

    fn dispatch(&mut self)
    {
        self.yields += 1;
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_suspend_and_resume_counts()
    {
        let mut threads = SimThreads::new(SimThread::new(1, Address::ZERO));
        let t = threads.current();
        assert_eq!(threads.suspend(t), 1);
        assert_eq!(threads.suspend(t), 2);
        assert_eq!(threads.resume(t), 1);
        assert_eq!(threads.resume(t), 0);
        assert_eq!(threads.resume(t), 0);
    }

    #[test]
    fn test_lookup_by_id()
    {
        let mut threads = SimThreads::new(SimThread::new(1, Address::ZERO));
        let second = threads.spawn(SimThread::new(9, Address::new(0x7FFD_F000)));
        assert_eq!(threads.lookup(ThreadId(9)), Some(second));
        assert_eq!(threads.lookup(ThreadId(5)), None);
        assert_eq!(threads.tib(second), Address::new(0x7FFD_F000));
    }
}
