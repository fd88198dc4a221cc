//! `SUSPEND_THREAD`, `RESUME_THREAD` and `GET_THREADS`.
//!
//! Suspend and resume work on a batch of ids. Each entry is answered in
//! place: the collaborator's result for a known thread, or
//! [`NO_SUCH_ENTITY`] for an unknown one. A missing thread does not stop the
//! rest of the batch.

use kdbg_protocol::codes::NO_SUCH_ENTITY;
use kdbg_protocol::wire::{BodyReader, BodyWriter};
use kdbg_protocol::ThreadId;
use tracing::warn;

use super::{HandlerContext, HandlerResult};
use crate::ring::walk;
use crate::target::{ThreadRef, Threads};

pub(super) fn suspend_threads(cx: &mut HandlerContext<'_>, request: &[u8], reply: &mut BodyWriter<'_>) -> HandlerResult
{
    apply_to_batch(cx, request, reply, |threads, thread| threads.suspend(thread))
}

pub(super) fn resume_threads(cx: &mut HandlerContext<'_>, request: &[u8], reply: &mut BodyWriter<'_>) -> HandlerResult
{
    apply_to_batch(cx, request, reply, |threads, thread| threads.resume(thread))
}

fn apply_to_batch(
    cx: &mut HandlerContext<'_>,
    request: &[u8],
    reply: &mut BodyWriter<'_>,
    mut op: impl FnMut(&mut dyn Threads, ThreadRef) -> i32,
) -> HandlerResult
{
    let mut r = BodyReader::new(request);
    // Validates the whole batch is present before anything is touched.
    let count = r.count(4)?;

    let threads = cx.kernel.threads();
    reply.put_u32(count as u32);
    for _ in 0..count {
        let id = ThreadId(r.u32()?);
        let result = match threads.lookup(id) {
            Some(thread) => op(&mut *threads, thread),
            None => NO_SUCH_ENTITY,
        };
        reply.put_i32(result);
    }
    Ok(())
}

pub(super) fn get_threads(cx: &mut HandlerContext<'_>, reply: &mut BodyWriter<'_>) -> HandlerResult
{
    let capacity = cx.config.max_packet_len.saturating_sub(4) / 4;
    let threads: &dyn Threads = cx.kernel.threads();

    reply.put_u32(0);
    let mut count = 0usize;
    for thread in walk(Some(threads.head()), |thread| threads.next(thread)) {
        if count == capacity {
            warn!(count, "thread list truncated to one packet");
            break;
        }
        reply.put_u32(threads.id(thread).raw());
        count += 1;
    }
    reply.patch_u32(0, count as u32);
    Ok(())
}
