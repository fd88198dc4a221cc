//! `CONNECT`: version handshake plus the last trap snapshot.

use kdbg_protocol::message::{decode_body, ConnectReply, ConnectRequest, WireEncode};
use kdbg_protocol::wire::BodyWriter;
use kdbg_protocol::ErrorCode;
use tracing::{info, warn};

use super::{HandlerContext, HandlerResult};

pub(super) fn connect(cx: &mut HandlerContext<'_>, request: &[u8], reply: &mut BodyWriter<'_>) -> HandlerResult
{
    let hello: ConnectRequest = decode_body(request)?;
    if hello.version != cx.config.protocol_version {
        warn!(
            theirs = hello.version,
            ours = cx.config.protocol_version,
            "debugger protocol version mismatch"
        );
        return Err(ErrorCode::VersionMismatch);
    }

    let trap = *cx.session.last_trap();
    info!(thread = %trap.thread, trap = trap.trap_type, "remote debugger connected");
    ConnectReply {
        version: cx.config.protocol_version,
        trap,
    }
    .encode(reply);
    Ok(())
}
