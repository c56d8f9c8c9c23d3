use clap::{Args, Parser, Subcommand, ValueEnum};
use serial485::config::ConfigLoader;
use serial485::{
    logging, port, Config, ControlPin, DataBits, FlowControl, OpenConfig, Parity, Rs485Config,
    Rs485Strategy, SerialLink, StopBits,
};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

// Command-line arguments
#[derive(Parser, Debug)]
#[command(
    name = "serial485",
    version,
    about = "Serial port tool with RS-485 half-duplex direction control.",
    long_about = "Lists serial devices and sends, receives and loop-tests data over them. Ports opened with --rs485 switch the transceiver direction around every write, using the Linux kernel driver when it is available and RTS/DTR toggling otherwise."
)]
struct Cli {
    /// Configuration file. Defaults to SERIAL485_CONFIG, ./serial485.toml, then the user config dir.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level or filter directive. RUST_LOG takes priority.
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List serial devices.
    List {
        /// Print JSON instead of tab-separated lines.
        #[arg(long)]
        json: bool,
    },
    /// Write data to a port.
    Send {
        port: String,
        data: String,
        /// Interpret DATA as hex bytes ("01 03 00 00").
        #[arg(long)]
        hex: bool,
        #[command(flatten)]
        line: LineArgs,
        #[command(flatten)]
        rs485: Rs485Args,
    },
    /// Print whatever arrives on a port.
    Listen {
        port: String,
        #[arg(long, default_value_t = 5000)]
        duration_ms: u64,
        /// Print received bytes as hex.
        #[arg(long)]
        hex: bool,
        #[command(flatten)]
        line: LineArgs,
        #[command(flatten)]
        rs485: Rs485Args,
    },
    /// Send frames from one port and check they arrive on another.
    Loopback {
        sender: String,
        receiver: String,
        #[arg(long, default_value_t = 10)]
        count: u32,
        #[arg(long, default_value_t = 16)]
        payload_size: usize,
        #[command(flatten)]
        line: LineArgs,
        #[command(flatten)]
        rs485: Rs485Args,
    },
    /// Open a port and report which direction control it ended up with.
    Probe {
        port: String,
        #[command(flatten)]
        line: LineArgs,
        #[command(flatten)]
        rs485: Rs485Args,
    },
}

#[derive(Args, Debug, Default)]
struct LineArgs {
    #[arg(short, long)]
    baud: Option<u32>,
    /// 5, 6, 7 or 8.
    #[arg(long)]
    data_bits: Option<i32>,
    /// 1 or 2.
    #[arg(long)]
    stop_bits: Option<i32>,
    #[arg(long, value_enum)]
    parity: Option<ParityArg>,
    #[arg(long, value_enum)]
    flow_control: Option<FlowControlArg>,
    #[arg(long)]
    timeout_ms: Option<u64>,
    /// Leave DTR deasserted after opening.
    #[arg(long)]
    no_dtr: bool,
}

#[derive(Args, Debug, Default)]
struct Rs485Args {
    /// Enable RS-485 direction control.
    #[arg(long, value_enum)]
    rs485: Option<StrategyArg>,
    #[arg(long, value_enum)]
    pin: Option<PinArg>,
    /// Drive the direction pin low to transmit.
    #[arg(long)]
    active_low: bool,
    #[arg(long)]
    rx_during_tx: bool,
    #[arg(long)]
    termination: bool,
    #[arg(long)]
    delay_before_us: Option<u32>,
    #[arg(long)]
    delay_after_us: Option<u32>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ParityArg {
    None,
    Odd,
    Even,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum FlowControlArg {
    None,
    Software,
    Hardware,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum StrategyArg {
    Auto,
    Manual,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum PinArg {
    Rts,
    Dtr,
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> CliResult<()> {
    let loader = match &cli.config {
        Some(path) => ConfigLoader::load_from(path)?,
        None => ConfigLoader::load()?,
    };
    let mut config = loader.into_config();
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    logging::init(&config.logging)?;
    debug!(?config, "configuration loaded");

    match cli.command {
        Command::List { json } => list(json),
        Command::Send {
            port,
            data,
            hex,
            line,
            rs485,
        } => {
            let payload = if hex {
                parse_hex(&data)?
            } else {
                data.into_bytes()
            };
            let mut link = SerialLink::open(open_config(&config, &port, &line, &rs485)?)?;
            let written = link.write(&payload)?;
            println!("{written} bytes written to {} ({})", link.name(), link.direction_mode());
            link.close()?;
            Ok(())
        }
        Command::Listen {
            port,
            duration_ms,
            hex,
            line,
            rs485,
        } => {
            let mut link = SerialLink::open(open_config(&config, &port, &line, &rs485)?)?;
            listen(&mut link, Duration::from_millis(duration_ms), hex)
        }
        Command::Loopback {
            sender,
            receiver,
            count,
            payload_size,
            line,
            rs485,
        } => {
            let mut tx = SerialLink::open(open_config(&config, &sender, &line, &rs485)?)?;
            let mut rx = SerialLink::open(open_config(&config, &receiver, &line, &rs485)?)?;
            loopback(&mut tx, &mut rx, count, payload_size)
        }
        Command::Probe { port, line, rs485 } => {
            let link = SerialLink::open(open_config(&config, &port, &line, &rs485)?)?;
            println!("port:            {}", link.name());
            println!("direction:       {}", link.direction_mode());
            println!("kernel rs485:    {}", link.is_kernel_rs485_active());
            println!(
                "read timeout:    {} ms",
                link.effective_timeout().as_millis()
            );
            Ok(())
        }
    }
}

fn list(json: bool) -> CliResult<()> {
    let records = port::list_ports()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
    } else if records.is_empty() {
        eprintln!("no serial ports found");
    } else {
        println!("{}", port::format_records(&records));
    }
    Ok(())
}

fn listen<B: serial485::SerialBackend>(
    link: &mut SerialLink<B>,
    duration: Duration,
    hex: bool,
) -> CliResult<()> {
    info!(port = %link.name(), ?duration, "listening");
    let deadline = Instant::now() + duration;
    let mut buffer = [0u8; 1024];
    let mut total = 0usize;
    while Instant::now() < deadline {
        let n = link.read(&mut buffer)?;
        if n == 0 {
            if let Some(pause) = idle_pause(link.effective_timeout()) {
                std::thread::sleep(pause.min(deadline.saturating_duration_since(Instant::now())));
            }
            continue;
        }
        total += n;
        if hex {
            println!("{}", format_hex(&buffer[..n]));
        } else {
            print!("{}", String::from_utf8_lossy(&buffer[..n]));
        }
    }
    eprintln!("{total} bytes received");
    Ok(())
}

/// Pause between empty reads when the port itself never blocks.
const IDLE_POLL: Duration = Duration::from_millis(10);

fn idle_pause(effective_timeout: Duration) -> Option<Duration> {
    effective_timeout.is_zero().then_some(IDLE_POLL)
}

fn loopback<A: serial485::SerialBackend, B: serial485::SerialBackend>(
    tx: &mut SerialLink<A>,
    rx: &mut SerialLink<B>,
    count: u32,
    payload_size: usize,
) -> CliResult<()> {
    rx.clear_input()?;
    let mut failures = 0u32;
    let mut slowest = Duration::ZERO;

    for round in 0..count {
        let payload: Vec<u8> = (0..payload_size)
            .map(|i| (i as u32).wrapping_add(round) as u8)
            .collect();
        let started = Instant::now();
        tx.write(&payload)?;

        let mut received = Vec::with_capacity(payload_size);
        let mut buffer = vec![0u8; payload_size.max(1)];
        while received.len() < payload_size {
            let n = rx.read(&mut buffer)?;
            if n == 0 {
                break;
            }
            received.extend_from_slice(&buffer[..n]);
        }
        let elapsed = started.elapsed();
        slowest = slowest.max(elapsed);

        if received == payload {
            debug!(round, ?elapsed, "frame ok");
        } else {
            failures += 1;
            warn!(
                round,
                expected = payload.len(),
                received = received.len(),
                "frame mismatch"
            );
        }
    }

    println!(
        "{}/{count} frames ok, direction {} / {}, slowest round trip {} ms",
        count - failures,
        tx.direction_mode(),
        rx.direction_mode(),
        slowest.as_millis()
    );
    if failures > 0 {
        return Err(format!("{failures} of {count} frames failed").into());
    }
    Ok(())
}

/// Config defaults for `port`, overridden by whatever was given on the command line.
fn open_config(
    config: &Config,
    port: &str,
    line: &LineArgs,
    rs485: &Rs485Args,
) -> CliResult<OpenConfig> {
    let mut open = config.open_config(port);
    if let Some(baud) = line.baud {
        open.line.baud_rate = baud;
    }
    if let Some(bits) = line.data_bits {
        open.line.data_bits = DataBits::try_from(bits)?;
    }
    if let Some(bits) = line.stop_bits {
        open.line.stop_bits = StopBits::try_from(bits)?;
    }
    if let Some(parity) = line.parity {
        open.line.parity = match parity {
            ParityArg::None => Parity::None,
            ParityArg::Odd => Parity::Odd,
            ParityArg::Even => Parity::Even,
        };
    }
    if let Some(flow) = line.flow_control {
        open.line.flow_control = match flow {
            FlowControlArg::None => FlowControl::None,
            FlowControlArg::Software => FlowControl::Software,
            FlowControlArg::Hardware => FlowControl::Hardware,
        };
    }
    if let Some(ms) = line.timeout_ms {
        open.line.timeout = Duration::from_millis(ms);
    }
    if line.no_dtr {
        open.dtr_on_open = false;
    }
    apply_rs485_args(&mut open.rs485, rs485);
    Ok(open)
}

fn apply_rs485_args(target: &mut Rs485Config, args: &Rs485Args) {
    if let Some(strategy) = args.rs485 {
        target.enabled = true;
        target.strategy = match strategy {
            StrategyArg::Auto => Rs485Strategy::Auto,
            StrategyArg::Manual => Rs485Strategy::Manual,
        };
    }
    if let Some(pin) = args.pin {
        target.pin = match pin {
            PinArg::Rts => ControlPin::Rts,
            PinArg::Dtr => ControlPin::Dtr,
        };
    }
    if args.active_low {
        target.rts_active_high = false;
    }
    if args.rx_during_tx {
        target.rx_during_tx = true;
    }
    if args.termination {
        target.termination_enabled = true;
    }
    if let Some(us) = args.delay_before_us {
        target.delay_before_send_us = us;
    }
    if let Some(us) = args.delay_after_us {
        target.delay_after_send_us = us;
    }
}

fn parse_hex(text: &str) -> CliResult<Vec<u8>> {
    let digits: String = text
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':' && *c != ',')
        .collect();
    let digits = digits.strip_prefix("0x").unwrap_or(&digits);
    if digits.len() % 2 != 0 {
        return Err(format!("odd number of hex digits in '{text}'").into());
    }
    let bytes: Result<Vec<u8>, String> = (0..digits.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map_err(|e| format!("invalid hex byte '{}': {e}", &digits[i..i + 2]))
        })
        .collect();
    Ok(bytes?)
}

fn format_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}
