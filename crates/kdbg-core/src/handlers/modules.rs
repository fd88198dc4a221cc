//! `GET_MODULES`: kernel modules, then the current process's modules.
//!
//! The reply is never empty: with nothing on either list the kernel image
//! itself is reported.

use kdbg_protocol::message::{encode_module_entry, module_entry_size};
use kdbg_protocol::wire::BodyWriter;
use tracing::warn;

use super::{HandlerContext, HandlerResult};
use crate::ring::walk;

pub(super) fn get_modules(cx: &mut HandlerContext<'_>, reply: &mut BodyWriter<'_>) -> HandlerResult
{
    let modules = cx.kernel.modules();
    let lists = std::iter::once(modules.kernel_modules()).chain(modules.process_modules());

    reply.put_u32(0);
    let mut count = 0u32;
    let mut seen = false;
    'lists: for list in lists {
        for module in walk(list.head(), |module| list.next(module)) {
            seen = true;
            let name = list.name(module);
            if reply.len() + module_entry_size(name) > cx.config.max_packet_len {
                warn!(count, "module list truncated to one packet");
                break 'lists;
            }
            encode_module_entry(reply, list.handle(module), name);
            count += 1;
        }
    }

    if !seen {
        encode_module_entry(reply, cx.config.kernel_image_handle, &cx.config.kernel_image_name);
        count = 1;
    }
    reply.patch_u32(0, count);
    Ok(())
}
