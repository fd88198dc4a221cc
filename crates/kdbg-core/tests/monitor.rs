//! Command loop behavior, driven through trap entry over a scripted link

use kdbg_core::config::{MonitorConfig, KERNEL_IMAGE_NAME, OS_BASE};
use kdbg_core::sim::{SimKernel, SimModule, MAX_GDT, SEL_TIB, TIB_BASE};
use kdbg_core::{Monitor, MonitorState, Threads};
use kdbg_protocol::codec::Packet;
use kdbg_protocol::codes::{
    Command, ErrorCode, EventCode, MAX_CHUNK_SIZE, MAX_PACKET_LEN, NO_SUCH_ENTITY, PROTOCOL_VERSION,
};
use kdbg_protocol::message::{
    decode_body, decode_module_list, decode_thread_list, encode_body, ConnectReply, ConnectRequest, ContextBody,
    MemoryRequest, SelectorBody, TargetEvent,
};
use kdbg_protocol::{Address, Context, ModuleHandle, ScriptedLink, ThreadId};

fn trap_frame() -> Context
{
    Context {
        eax: 0x1234,
        trap_type: 3,
        eip: 0x8000_1000,
        cs: 0x08,
        eflags: 0x202,
        ..Context::default()
    }
}

fn words(values: &[u32]) -> Vec<u8>
{
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn memory_request(address: u32, size: u32) -> Vec<u8>
{
    encode_body(&MemoryRequest {
        address: Address::new(address),
        size,
    })
}

/// Queue `requests` (ids 1, 2, ...) followed by `CONTINUE`.
fn script(requests: &[(Command, Vec<u8>)]) -> ScriptedLink
{
    let mut link = ScriptedLink::new();
    let mut id = 1;
    for (command, body) in requests {
        link.push_packet(command.code(), id, body);
        id += 1;
    }
    link.push_packet(Command::Continue.code(), id, &[]);
    link
}

/// Take one trap with `requests` queued; returns every packet sent and the
/// frame the thread resumes with.
fn run_trap(kernel: &mut SimKernel, requests: &[(Command, Vec<u8>)]) -> (Vec<Packet>, Context)
{
    let mut link = script(requests);
    let mut frame = trap_frame();
    let mut monitor = Monitor::new(&mut link);
    monitor.on_trap(kernel, &mut frame, Address::ZERO);
    assert_eq!(monitor.state(), MonitorState::Idle);
    drop(monitor);
    assert_eq!(link.pending_inbound(), 0);
    (link.take_sent_packets().unwrap(), frame)
}

fn assert_error(packet: &Packet, code: ErrorCode)
{
    assert_eq!(packet.header.command, code.code());
    assert!(packet.body.is_empty());
}

#[test]
fn test_connect_after_trap_reports_snapshot()
{
    let mut kernel = SimKernel::new();
    let hello = encode_body(&ConnectRequest {
        version: PROTOCOL_VERSION,
    });
    let (sent, _) = run_trap(&mut kernel, &[(Command::Connect, hello)]);

    // First trap: no TRAP event, just the two replies.
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].header.command, Command::Connect.reply_code());
    assert_eq!(sent[0].header.id, 1);
    let reply: ConnectReply = decode_body(&sent[0].body).unwrap();
    assert_eq!(reply.version, PROTOCOL_VERSION);
    assert_eq!(reply.trap.thread, ThreadId(1));
    assert_eq!(reply.trap.trap_type, 3);
    assert_eq!(reply.trap.eip, Address::new(0x8000_1000));
    assert_eq!(reply.trap.fault_address, Address::ZERO);
}

#[test]
fn test_connect_rejects_other_version()
{
    let mut kernel = SimKernel::new();
    let hello = encode_body(&ConnectRequest {
        version: PROTOCOL_VERSION + 1,
    });
    let (sent, _) = run_trap(&mut kernel, &[(Command::Connect, hello)]);
    assert_error(&sent[0], ErrorCode::VersionMismatch);
    assert_eq!(sent[0].header.id, 1);
}

#[test]
fn test_continue_reply_echoes_id()
{
    let mut kernel = SimKernel::new();
    let (sent, _) = run_trap(&mut kernel, &[]);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].header.command, Command::Continue.reply_code());
    assert_eq!(sent[0].header.id, 1);
    assert!(sent[0].body.is_empty());
}

#[test]
fn test_trap_enables_interrupts()
{
    let mut kernel = SimKernel::new();
    assert!(!kernel.interrupts_enabled());
    run_trap(&mut kernel, &[]);
    assert!(kernel.interrupts_enabled());
}

#[test]
fn test_mixed_suspend_batch()
{
    let mut kernel = SimKernel::demo();
    // Count 3: threads 2, 99 and 2 again.
    let (sent, _) = run_trap(&mut kernel, &[(Command::SuspendThread, words(&[3, 2, 99, 2]))]);

    assert_eq!(sent[0].header.command, Command::SuspendThread.reply_code());
    assert_eq!(decode_thread_list(&sent[0].body).unwrap(), vec![1, NO_SUCH_ENTITY, 2]);

    let second = kernel.threads.lookup(ThreadId(2)).unwrap();
    assert_eq!(kernel.threads.suspend_count(second), 2);
}

#[test]
fn test_resume_batch_counts_down()
{
    let mut kernel = SimKernel::demo();
    let second = kernel.threads.lookup(ThreadId(2)).unwrap();
    kernel.threads.thread_mut(second).suspend_count = 2;

    let (sent, _) = run_trap(&mut kernel, &[(Command::ResumeThread, words(&[2, 2, 42]))]);
    assert_eq!(decode_thread_list(&sent[0].body).unwrap(), vec![1, NO_SUCH_ENTITY]);
    assert_eq!(kernel.threads.suspend_count(second), 1);
}

#[test]
fn test_truncated_batch_changes_nothing()
{
    let mut kernel = SimKernel::demo();
    // Claims three ids, carries two.
    let (sent, _) = run_trap(&mut kernel, &[(Command::SuspendThread, words(&[3, 2, 3]))]);

    assert_error(&sent[0], ErrorCode::InvalidCommand);
    let second = kernel.threads.lookup(ThreadId(2)).unwrap();
    assert_eq!(kernel.threads.suspend_count(second), 0);
}

#[test]
fn test_read_mapped_memory()
{
    let mut kernel = SimKernel::demo();
    let (sent, _) = run_trap(&mut kernel, &[(Command::ReadMemory, memory_request(OS_BASE, 2))]);
    assert_eq!(sent[0].header.command, Command::ReadMemory.reply_code());
    assert_eq!(sent[0].body, b"MZ");
}

#[test]
fn test_read_unmapped_memory_fails()
{
    let mut kernel = SimKernel::demo();
    let image_tail = kernel.memory.peek(Address::new(OS_BASE + 0xFFFE));
    let (sent, frame) = run_trap(
        &mut kernel,
        &[
            (Command::ReadMemory, memory_request(0x1000, 4)),
            // Starts mapped, runs off the end of the image.
            (Command::ReadMemory, memory_request(OS_BASE + 0xFFFE, 4)),
        ],
    );
    assert_error(&sent[0], ErrorCode::InvalidAddress);
    assert_error(&sent[1], ErrorCode::InvalidAddress);
    assert_eq!(sent[2].header.command, Command::Continue.reply_code());

    assert_eq!(frame, trap_frame());
    assert_eq!(kernel.memory.peek(Address::new(0x1000)), None);
    assert_eq!(kernel.memory.peek(Address::new(OS_BASE)), Some(b'M'));
    assert_eq!(kernel.memory.peek(Address::new(OS_BASE + 0xFFFE)), image_tail);
}

#[test]
fn test_read_chunk_clamped_to_packet()
{
    let config = MonitorConfig {
        max_packet_len: 64,
        ..MonitorConfig::default()
    };
    let mut kernel = SimKernel::demo();
    let mut link = script(&[
        (Command::ReadMemory, memory_request(OS_BASE, 64)),
        (Command::ReadMemory, memory_request(OS_BASE, 65)),
    ]);
    let mut frame = trap_frame();
    let mut monitor = Monitor::with_config(&mut link, config);
    assert_eq!(monitor.config().max_chunk_size, 64);
    monitor.on_trap(&mut kernel, &mut frame, Address::ZERO);
    drop(monitor);

    let sent = link.take_sent_packets().unwrap();
    assert_eq!(sent[0].body.len(), 64);
    assert_error(&sent[1], ErrorCode::InvalidAddress);
}

#[test]
fn test_read_larger_than_one_chunk_fails()
{
    let mut kernel = SimKernel::demo();
    let (sent, _) = run_trap(
        &mut kernel,
        &[
            (Command::ReadMemory, memory_request(OS_BASE, MAX_CHUNK_SIZE as u32)),
            (Command::ReadMemory, memory_request(OS_BASE, MAX_CHUNK_SIZE as u32 + 1)),
        ],
    );
    assert_eq!(sent[0].body.len(), MAX_CHUNK_SIZE);
    assert_error(&sent[1], ErrorCode::InvalidAddress);
}

#[test]
fn test_write_then_read_memory()
{
    let mut kernel = SimKernel::demo();
    let mut write = memory_request(0x0040_0010, 4);
    write.extend_from_slice(&[0xCC, 0x90, 0x90, 0xC3]);

    let (sent, _) = run_trap(
        &mut kernel,
        &[
            (Command::WriteMemory, write),
            (Command::ReadMemory, memory_request(0x0040_000F, 6)),
        ],
    );
    assert_eq!(sent[0].header.command, Command::WriteMemory.reply_code());
    assert!(sent[0].body.is_empty());
    assert_eq!(sent[1].body, [0x00, 0xCC, 0x90, 0x90, 0xC3, 0x00]);
}

#[test]
fn test_write_unmapped_memory_changes_nothing()
{
    let mut kernel = SimKernel::demo();
    // Last byte falls outside the process image.
    let mut write = memory_request(0x0040_3FFE, 3);
    write.extend_from_slice(&[1, 2, 3]);

    let (sent, _) = run_trap(&mut kernel, &[(Command::WriteMemory, write)]);
    assert_error(&sent[0], ErrorCode::InvalidAddress);
    assert_eq!(kernel.memory.peek(Address::new(0x0040_3FFE)), Some(0));
}

#[test]
fn test_short_body_is_invalid_command()
{
    let mut kernel = SimKernel::demo();
    let (sent, _) = run_trap(
        &mut kernel,
        &[
            (Command::ReadMemory, words(&[OS_BASE])),
            (Command::Connect, Vec::new()),
            (Command::GetSelector, vec![0x08]),
        ],
    );
    assert_error(&sent[0], ErrorCode::InvalidCommand);
    assert_error(&sent[1], ErrorCode::InvalidCommand);
    assert_error(&sent[2], ErrorCode::InvalidCommand);
}

#[test]
fn test_unknown_command_keeps_loop_running()
{
    let mut kernel = SimKernel::new();
    let mut link = ScriptedLink::new();
    link.push_packet(0x1F, 7, &[]);
    link.push_packet(Command::GetThreads.code(), 8, &[]);
    link.push_packet(Command::Continue.code(), 9, &[]);

    let mut frame = trap_frame();
    let mut monitor = Monitor::new(&mut link);
    monitor.on_trap(&mut kernel, &mut frame, Address::ZERO);
    drop(monitor);

    let sent = link.take_sent_packets().unwrap();
    assert_eq!(sent.len(), 3);
    assert_error(&sent[0], ErrorCode::InvalidCommand);
    assert_eq!(sent[0].header.id, 7);
    assert_eq!(sent[1].header.command, Command::GetThreads.reply_code());
    assert_eq!(sent[2].header.id, 9);
}

#[test]
fn test_corrupt_packet_gets_no_reply()
{
    let mut kernel = SimKernel::new();
    let mut link = ScriptedLink::new();
    let mut bad = kdbg_protocol::codec::encode_packet(Command::GetThreads.code(), 1, &[]);
    bad[1] ^= 0x01;
    link.push_bytes(&bad);
    link.push_packet(Command::Continue.code(), 2, &[]);

    let mut frame = trap_frame();
    let mut monitor = Monitor::new(&mut link);
    monitor.on_trap(&mut kernel, &mut frame, Address::ZERO);
    drop(monitor);

    let sent = link.take_sent_packets().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].header.command, Command::Continue.reply_code());
    assert_eq!(sent[0].header.id, 2);
}

#[test]
fn test_get_context_of_trapping_thread()
{
    let mut kernel = SimKernel::new();
    let (sent, frame) = run_trap(&mut kernel, &[(Command::GetThreadContext, words(&[1]))]);

    let body: ContextBody = decode_body(&sent[0].body).unwrap();
    assert_eq!(body.thread, ThreadId(1));
    assert_eq!(body.context, trap_frame());
    assert_eq!(frame, trap_frame());
}

#[test]
fn test_set_context_is_resumed_with()
{
    let mut kernel = SimKernel::new();
    let patched = Context {
        eip: 0x8000_2000,
        eax: 0,
        ..trap_frame()
    };
    let (sent, frame) = run_trap(
        &mut kernel,
        &[
            (
                Command::SetThreadContext,
                encode_body(&ContextBody {
                    thread: ThreadId(1),
                    context: patched,
                }),
            ),
            (Command::GetThreadContext, words(&[1])),
        ],
    );

    assert_eq!(sent[0].header.command, Command::SetThreadContext.reply_code());
    assert_eq!(decode_body::<ContextBody>(&sent[1].body).unwrap().context, patched);
    assert_eq!(frame, patched);

    // Detached once the thread resumed.
    let current = kernel.threads.current();
    assert_eq!(kernel.threads.stored_context(current), None);
}

#[test]
fn test_context_of_running_or_unknown_thread()
{
    let mut kernel = SimKernel::demo();
    let set_running = encode_body(&ContextBody {
        thread: ThreadId(2),
        context: Context::default(),
    });
    let (sent, _) = run_trap(
        &mut kernel,
        &[
            (Command::GetThreadContext, words(&[2])),
            (Command::GetThreadContext, words(&[99])),
            (Command::SetThreadContext, set_running),
        ],
    );
    assert_error(&sent[0], ErrorCode::NoContext);
    assert_error(&sent[1], ErrorCode::InvalidThread);
    assert_error(&sent[2], ErrorCode::NoContext);
}

#[test]
fn test_selector_lookup()
{
    let mut kernel = SimKernel::new();
    let past_end = (MAX_GDT * 8) as u32;
    let (sent, _) = run_trap(
        &mut kernel,
        &[
            (Command::GetSelector, words(&[SEL_TIB])),
            // RPL bits do not change the slot.
            (Command::GetSelector, words(&[SEL_TIB | 3])),
            (Command::GetSelector, words(&[past_end])),
        ],
    );

    let tib: SelectorBody = decode_body(&sent[0].body).unwrap();
    assert_eq!(tib.selector, SEL_TIB);
    assert_eq!(tib.descriptor.base(), TIB_BASE);
    let with_rpl: SelectorBody = decode_body(&sent[1].body).unwrap();
    assert_eq!(with_rpl.descriptor, tib.descriptor);
    assert_error(&sent[2], ErrorCode::InvalidSelector);
}

#[test]
fn test_threads_in_list_order()
{
    let mut kernel = SimKernel::demo();
    let (sent, _) = run_trap(&mut kernel, &[(Command::GetThreads, Vec::new())]);
    assert_eq!(decode_thread_list(&sent[0].body).unwrap(), vec![1, 2, 3, 4]);
}

#[test]
fn test_modules_kernel_then_process()
{
    let mut kernel = SimKernel::demo();
    let (sent, _) = run_trap(&mut kernel, &[(Command::GetModules, Vec::new())]);

    let modules = decode_module_list(&sent[0].body).unwrap();
    let names: Vec<_> = modules.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, ["krnl.dll", "3c905c.sys", "init.exe", "os.dll"]);
    assert_eq!(modules[2].handle, ModuleHandle(0x0040_0000));
}

#[test]
fn test_empty_module_lists_report_kernel_image()
{
    let mut kernel = SimKernel::new();
    let (sent, _) = run_trap(&mut kernel, &[(Command::GetModules, Vec::new())]);

    let modules = decode_module_list(&sent[0].body).unwrap();
    assert_eq!(modules.len(), 1);
    assert_eq!(modules[0].handle, ModuleHandle(OS_BASE));
    assert_eq!(modules[0].name, KERNEL_IMAGE_NAME);
}

#[test]
fn test_module_too_large_for_packet_is_not_the_kernel_image()
{
    let mut kernel = SimKernel::new();
    let name = "m".repeat(MAX_PACKET_LEN);
    kernel.modules.load_kernel_module(SimModule::new(0x8010_0000, &name));

    let (sent, _) = run_trap(&mut kernel, &[(Command::GetModules, Vec::new())]);
    assert_eq!(sent[0].header.command, Command::GetModules.reply_code());
    assert!(decode_module_list(&sent[0].body).unwrap().is_empty());
}

#[test]
fn test_suspended_trapping_thread_yields()
{
    let mut kernel = SimKernel::new();
    let (sent, frame) = run_trap(&mut kernel, &[(Command::SuspendThread, words(&[1, 1]))]);

    assert_eq!(decode_thread_list(&sent[0].body).unwrap(), vec![1]);
    assert_eq!(kernel.threads.yields(), 1);
    assert_eq!(frame, trap_frame());
    let current = kernel.threads.current();
    assert_eq!(kernel.threads.stored_context(current), None);
}

#[test]
fn test_running_thread_does_not_yield()
{
    let mut kernel = SimKernel::new();
    run_trap(&mut kernel, &[]);
    assert_eq!(kernel.threads.yields(), 0);
}

#[test]
fn test_second_trap_sends_event_and_inits_once()
{
    let mut kernel = SimKernel::new();
    let mut link = ScriptedLink::new();
    link.push_packet(Command::Continue.code(), 1, &[]);
    link.push_packet(Command::Continue.code(), 2, &[]);

    let mut monitor = Monitor::new(&mut link);
    assert!(!monitor.session().is_debugging());

    let mut frame = trap_frame();
    monitor.on_trap(&mut kernel, &mut frame, Address::ZERO);
    assert!(monitor.session().is_debugging());

    let mut fault = Context {
        trap_type: 14,
        error_code: 2,
        ..trap_frame()
    };
    monitor.on_trap(&mut kernel, &mut fault, Address::new(0xDEAD_0000));
    assert_eq!(monitor.session().last_trap().fault_address, Address::new(0xDEAD_0000));
    drop(monitor);

    assert_eq!(link.init_calls(), 1);
    let sent = link.take_sent_packets().unwrap();
    let codes: Vec<_> = sent.iter().map(|p| p.header.command).collect();
    assert_eq!(
        codes,
        [
            Command::Continue.reply_code(),
            EventCode::Trap.code(),
            Command::Continue.reply_code()
        ]
    );
    assert_eq!(sent[1].header.id, 0);
    match TargetEvent::decode(sent[1].header.command, &sent[1].body).unwrap() {
        TargetEvent::Trap(trap) => {
            assert_eq!(trap.trap_type, 14);
            assert_eq!(trap.error_code, 2);
            assert_eq!(trap.fault_address, Address::new(0xDEAD_0000));
        }
        other => panic!("expected trap event, got {other:?}"),
    }
}

#[test]
fn test_link_failure_resumes_target()
{
    let mut kernel = SimKernel::new();
    // No CONTINUE ever arrives.
    let mut link = ScriptedLink::new();
    link.push_packet(Command::GetThreads.code(), 1, &[]);

    let mut frame = trap_frame();
    let mut monitor = Monitor::new(&mut link);
    monitor.on_trap(&mut kernel, &mut frame, Address::ZERO);

    assert_eq!(monitor.state(), MonitorState::Idle);
    assert!(!monitor.session().is_driving_output());
    assert_eq!(frame, trap_frame());
}
