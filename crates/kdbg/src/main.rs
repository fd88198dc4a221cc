use std::process;

use clap::{Parser, Subcommand};
use kdbg_utils::{init_logging, init_logging_with_level, LogFormat, LogLevel};

mod host;
mod target;

/// Remote kernel debugger over a byte-oriented link.
#[derive(Parser, Debug)]
#[command(name = "kdbg")]
#[command(version)]
#[command(about = "Remote kernel debugger over a byte-oriented link", long_about = None)]
struct Cli
{
    /// Log level, overrides RUST_LOG
    #[arg(long, global = true)]
    log_level: Option<LogLevel>,
    /// Log format (pretty or json), overrides KDBG_LOG_FORMAT
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands
{
    /// Serve a simulated kernel halted at a trap
    Target
    {
        /// Address to accept debugger connections on
        #[arg(long, default_value = "127.0.0.1:4000")]
        listen: String,
        /// Trap vector to report
        #[arg(long, default_value_t = 3)]
        trap_type: u32,
        /// Instruction pointer at the trap (hex: 0x80001000 or decimal)
        #[arg(long, default_value = "0x80001000", value_parser = parse_word)]
        eip: u32,
        /// After the trap, raise thread, module and output events
        #[arg(long, default_value_t = false)]
        notify: bool,
    },
    /// Check the protocol version and show the last trap
    Connect
    {
        #[command(flatten)]
        link: host::Link,
    },
    /// List thread ids
    Threads
    {
        #[command(flatten)]
        link: host::Link,
    },
    /// List loaded modules
    Modules
    {
        #[command(flatten)]
        link: host::Link,
    },
    /// Dump target memory
    Read
    {
        #[command(flatten)]
        link: host::Link,
        /// Start address (hex: 0x80000000 or decimal)
        #[arg(value_parser = parse_word)]
        address: u32,
        /// Number of bytes to read
        #[arg(default_value_t = 64)]
        length: u32,
    },
    /// Show the stored registers of a halted thread
    Regs
    {
        #[command(flatten)]
        link: host::Link,
        /// Thread id
        thread: u32,
    },
    /// Show a segment descriptor
    Selector
    {
        #[command(flatten)]
        link: host::Link,
        /// Selector value (hex: 0x28 or decimal)
        #[arg(value_parser = parse_word)]
        selector: u32,
    },
    /// Suspend threads
    Suspend
    {
        #[command(flatten)]
        link: host::Link,
        /// Thread ids
        #[arg(required = true)]
        threads: Vec<u32>,
    },
    /// Resume threads
    Resume
    {
        #[command(flatten)]
        link: host::Link,
        /// Thread ids
        #[arg(required = true)]
        threads: Vec<u32>,
    },
    /// Let the target run
    Continue
    {
        #[command(flatten)]
        link: host::Link,
    },
    /// Wait for the next target event
    Wait
    {
        #[command(flatten)]
        link: host::Link,
    },
}

/// Parse a 32-bit target word given in hex (`0x` prefix) or decimal.
fn parse_word(s: &str) -> Result<u32, String>
{
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(&hex.replace('_', ""), 16),
        None => s.replace('_', "").parse(),
    };
    parsed.map_err(|e| format!("invalid value '{s}': {e}"))
}

fn main()
{
    let cli = Cli::parse();

    let logging = match (cli.log_level, cli.log_format) {
        (None, None) => init_logging(),
        (level, format) => init_logging_with_level(level, format.unwrap_or_default()),
    };
    let _guard = match logging {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = run_command(cli.command) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run_command(command: Commands) -> Result<(), Box<dyn std::error::Error>>
{
    match command {
        Commands::Target {
            listen,
            trap_type,
            eip,
            notify,
        } => target::serve(&listen, trap_type, eip, notify),
        Commands::Connect { link } => host::connect(&link),
        Commands::Threads { link } => host::threads(&link),
        Commands::Modules { link } => host::modules(&link),
        Commands::Read { link, address, length } => host::read(&link, address, length),
        Commands::Regs { link, thread } => host::regs(&link, thread),
        Commands::Selector { link, selector } => host::selector(&link, selector),
        Commands::Suspend { link, threads } => host::suspend(&link, &threads),
        Commands::Resume { link, threads } => host::resume(&link, &threads),
        Commands::Continue { link } => host::continue_execution(&link),
        Commands::Wait { link } => host::wait(&link),
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_parse_word()
    {
        assert_eq!(parse_word("0x8000_1000"), Ok(0x8000_1000));
        assert_eq!(parse_word("40"), Ok(40));
        assert!(parse_word("0x1_0000_0000").is_err());
        assert!(parse_word("eax").is_err());
    }

    #[test]
    fn test_cli_parses_host_command()
    {
        let cli = Cli::try_parse_from(["kdbg", "read", "--connect", "10.0.0.2:4000", "0x80000000", "16"]).unwrap();
        match cli.command {
            Commands::Read { link, address, length } => {
                assert_eq!(link.connect, "10.0.0.2:4000");
                assert_eq!(address, 0x8000_0000);
                assert_eq!(length, 16);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_cli_global_log_flags()
    {
        let cli = Cli::try_parse_from(["kdbg", "target", "--log-level", "debug", "--notify"]).unwrap();
        assert_eq!(cli.log_level, Some(LogLevel::Debug));
        assert!(matches!(cli.command, Commands::Target { notify: true, trap_type: 3, .. }));
    }

    #[test]
    fn test_suspend_needs_thread_ids()
    {
        assert!(Cli::try_parse_from(["kdbg", "suspend"]).is_err());
    }
}
