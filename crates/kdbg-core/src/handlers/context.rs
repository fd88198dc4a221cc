//! `GET_THREAD_CONTEXT` / `SET_THREAD_CONTEXT`.
//!
//! Only a thread halted at a trap has a stored context. Writing one changes
//! the registers the thread resumes with.

use kdbg_protocol::message::{decode_body, ContextBody, WireEncode};
use kdbg_protocol::wire::{BodyReader, BodyWriter};
use kdbg_protocol::{ErrorCode, ThreadId};

use super::{HandlerContext, HandlerResult};

pub(super) fn get_thread_context(cx: &mut HandlerContext<'_>, request: &[u8], reply: &mut BodyWriter<'_>) -> HandlerResult
{
    let thread = ThreadId(BodyReader::new(request).u32()?);

    let threads = cx.kernel.threads();
    let handle = threads.lookup(thread).ok_or(ErrorCode::InvalidThread)?;
    let context = threads.stored_context(handle).ok_or(ErrorCode::NoContext)?;

    ContextBody { thread, context }.encode(reply);
    Ok(())
}

pub(super) fn set_thread_context(cx: &mut HandlerContext<'_>, request: &[u8]) -> HandlerResult
{
    let ContextBody { thread, context } = decode_body(request)?;

    let threads = cx.kernel.threads();
    let handle = threads.lookup(thread).ok_or(ErrorCode::InvalidThread)?;
    if threads.stored_context(handle).is_none() {
        return Err(ErrorCode::NoContext);
    }
    threads.set_stored_context(handle, Some(context));
    Ok(())
}
