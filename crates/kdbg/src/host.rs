//! Host-side debugger commands. Each one opens a connection, issues its
//! request, prints the result and disconnects.

use std::net::TcpStream;

use clap::Args;
use kdbg_protocol::{Address, Client, StreamTransport, ThreadId};
use kdbg_utils::info;

type HostResult = Result<(), Box<dyn std::error::Error>>;

/// Where the target listens
#[derive(Args, Debug, Clone)]
pub(crate) struct Link
{
    /// Target address
    #[arg(long, default_value = "127.0.0.1:4000")]
    pub connect: String,
}

fn open(link: &Link) -> Result<Client<StreamTransport<TcpStream>>, std::io::Error>
{
    let stream = TcpStream::connect(&link.connect)?;
    stream.set_nodelay(true)?;
    info!(address = %link.connect, "connected to target");
    Ok(Client::new(StreamTransport::new(stream)))
}

pub(crate) fn connect(link: &Link) -> HostResult
{
    let hello = open(link)?.connect()?;
    let trap = hello.trap;
    println!("Protocol version {}", hello.version);
    println!(
        "Stopped by trap {} in thread {} at {} (error code {:#x}, address {})",
        trap.trap_type, trap.thread, trap.eip, trap.error_code, trap.fault_address
    );
    Ok(())
}

pub(crate) fn threads(link: &Link) -> HostResult
{
    for thread in open(link)?.threads()? {
        println!("{thread}");
    }
    Ok(())
}

pub(crate) fn modules(link: &Link) -> HostResult
{
    for module in open(link)?.modules()? {
        println!("{}  {}", module.handle, module.name);
    }
    Ok(())
}

pub(crate) fn read(link: &Link, address: u32, length: u32) -> HostResult
{
    let bytes = open(link)?.read_memory(Address::new(address), length)?;
    print!("{}", hex_dump(address, &bytes));
    Ok(())
}

pub(crate) fn regs(link: &Link, thread: u32) -> HostResult
{
    let context = open(link)?.thread_context(ThreadId(thread))?;
    println!("{context}");
    Ok(())
}

pub(crate) fn selector(link: &Link, selector: u32) -> HostResult
{
    let descriptor = open(link)?.selector(selector)?;
    println!("{selector:#06x}  {descriptor}");
    Ok(())
}

pub(crate) fn suspend(link: &Link, threads: &[u32]) -> HostResult
{
    let ids: Vec<_> = threads.iter().copied().map(ThreadId).collect();
    let results = open(link)?.suspend_threads(&ids)?;
    print_batch(&ids, &results);
    Ok(())
}

pub(crate) fn resume(link: &Link, threads: &[u32]) -> HostResult
{
    let ids: Vec<_> = threads.iter().copied().map(ThreadId).collect();
    let results = open(link)?.resume_threads(&ids)?;
    print_batch(&ids, &results);
    Ok(())
}

pub(crate) fn continue_execution(link: &Link) -> HostResult
{
    open(link)?.continue_execution()?;
    println!("Target resumed");
    Ok(())
}

pub(crate) fn wait(link: &Link) -> HostResult
{
    let event = open(link)?.wait_event()?;
    println!("{event:?}");
    Ok(())
}

fn print_batch(ids: &[ThreadId], results: &[i32])
{
    for (id, result) in ids.iter().zip(results) {
        if *result < 0 {
            println!("{id}: no such thread");
        } else {
            println!("{id}: suspend count {result}");
        }
    }
}

/// Classic 16-bytes-per-row dump with an ASCII column.
fn hex_dump(base: u32, bytes: &[u8]) -> String
{
    let mut out = String::new();
    for (row, chunk) in bytes.chunks(16).enumerate() {
        let address = base.wrapping_add(row as u32 * 16);
        let hex: Vec<_> = chunk.iter().map(|b| format!("{b:02x}")).collect();
        let ascii: String = chunk
            .iter()
            .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' })
            .collect();
        out.push_str(&format!("{address:08x}  {:<47}  {ascii}\n", hex.join(" ")));
    }
    out
}
