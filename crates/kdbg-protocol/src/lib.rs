//! # kdbg-protocol
//!
//! Wire protocol shared by the kernel debug monitor and host-side debuggers.
//!
//! This crate provides:
//! - Command, event and error code spaces ([`codes`])
//! - Packet framing with checksums and signature resynchronization ([`codec`])
//! - Typed request, reply and event bodies ([`message`])
//! - The byte [`Transport`] abstraction and a stream adapter
//! - A blocking host-side [`Client`]
//!
//! ## Packet layout
//!
//! ```text
//! ┌───────────┬─────────┬────┬──────────┬──────────┬──────────────┐
//! │ Signature │ Command │ Id │ Checksum │ Length   │ Body         │
//! │ 1 byte    │ 1 byte  │ 1B │ 1 byte   │ u32 LE   │ Length bytes │
//! └───────────┴─────────┴────┴──────────┴──────────┴──────────────┘
//! ```
//!
//! The 8-bit sum of every header byte (checksum included) and every body
//! byte is zero for a well-formed packet.

pub mod client;
pub mod codec;
pub mod codes;
pub mod context;
pub mod error;
pub mod message;
pub mod transport;
pub mod types;
pub mod wire;

pub use client::Client;
pub use codec::{Packet, PacketHeader};
pub use codes::{Command, ErrorCode, EventCode};
pub use context::{Context, Descriptor};
pub use error::{BodyError, ClientError, CodecError};
pub use message::{TargetEvent, TrapSnapshot};
pub use transport::{ScriptedLink, StreamTransport, Transport};
pub use types::{Address, ModuleHandle, ThreadId};
