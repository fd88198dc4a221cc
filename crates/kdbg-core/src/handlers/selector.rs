//! `GET_SELECTOR`: raw descriptor lookup.

use kdbg_protocol::message::{SelectorBody, WireEncode};
use kdbg_protocol::wire::{BodyReader, BodyWriter};
use kdbg_protocol::{Descriptor, ErrorCode};

use super::{HandlerContext, HandlerResult};

pub(super) fn get_selector(cx: &mut HandlerContext<'_>, request: &[u8], reply: &mut BodyWriter<'_>) -> HandlerResult
{
    let selector = BodyReader::new(request).u32()?;
    // RPL and table-indicator bits fall away with the division.
    let index = selector as usize / Descriptor::SIZE;

    let descriptor = cx
        .kernel
        .descriptors()
        .descriptor(index)
        .ok_or(ErrorCode::InvalidSelector)?;

    SelectorBody { selector, descriptor }.encode(reply);
    Ok(())
}
