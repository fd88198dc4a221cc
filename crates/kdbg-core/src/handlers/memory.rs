//! `READ_MEMORY` / `WRITE_MEMORY`.
//!
//! The whole range must be mapped; there are no alignment rules.

use kdbg_protocol::message::{MemoryRequest, WireDecode};
use kdbg_protocol::wire::{BodyReader, BodyWriter};
use kdbg_protocol::ErrorCode;

use super::{HandlerContext, HandlerResult};

pub(super) fn read_memory(cx: &mut HandlerContext<'_>, request: &[u8], reply: &mut BodyWriter<'_>) -> HandlerResult
{
    let MemoryRequest { address, size } = MemoryRequest::decode(&mut BodyReader::new(request))?;

    // The reply must fit one packet.
    if size as usize > cx.config.max_chunk_size {
        return Err(ErrorCode::InvalidAddress);
    }

    let memory = cx.kernel.memory();
    if !memory.is_mapped(address, size) {
        return Err(ErrorCode::InvalidAddress);
    }
    memory.read(address, reply.reserve_bytes(size as usize));
    Ok(())
}

pub(super) fn write_memory(cx: &mut HandlerContext<'_>, request: &[u8]) -> HandlerResult
{
    let mut r = BodyReader::new(request);
    let MemoryRequest { address, size } = MemoryRequest::decode(&mut r)?;
    let data = r.bytes(size as usize)?;

    let memory = cx.kernel.memory();
    if !memory.is_mapped(address, size) {
        return Err(ErrorCode::InvalidAddress);
    }
    memory.write(address, data);
    Ok(())
}
