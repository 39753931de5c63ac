//! Modscan CLI
//!
//! Concurrent Modbus TCP reader/writer. Queries one or more slave ids behind
//! a TCP endpoint, sweeping register ranges in parallel, or writes values to
//! holding registers and coils.
//!
//! Addresses are given in the classic logical numbering: holding registers
//! from 40001, input registers from 30001, discrete inputs from 10001, coils
//! from 1.
//!
//! Usage:
//!   modscan --ip 10.0.0.50 --slaveids 1-5 --read --hr 40001-40010
//!   modscan --ip 10.0.0.50 --slaveids 1 --write --hr 40001-40002 --value 1234,5678
//!   modscan --ip 10.0.0.50 --slaveids 1,3,5 --read --coil 1-16 --di 10001-10008

use std::time::{Duration, Instant};

use clap::{ArgAction, Parser};
use tracing::info;

use modscan::{
    expand, read_operations, ModbusError, ModbusResult, Operation, Orchestrator, QueryOutcome,
    QueryResult, RegisterRange, RegisterSpace, ResponsePayload, ScanConfig, SlaveTarget,
    TcpConnector, DEFAULT_TCP_PORT, DEFAULT_TIMEOUT_MS, DEFAULT_WORKERS,
};

#[derive(Parser, Debug)]
#[command(name = "modscan", version, about = "Concurrent Modbus TCP reader/writer")]
struct Cli {
    /// IP address or hostname of the device/gateway
    #[arg(long)]
    ip: String,

    /// TCP port of the device
    #[arg(long, default_value_t = DEFAULT_TCP_PORT)]
    port: u16,

    /// Slave ids to query, as a range or list (e.g. 1-5 or 1,3,5)
    #[arg(long, default_value = "1")]
    slaveids: String,

    /// Read the addressed points
    #[arg(long)]
    read: bool,

    /// Write values to the addressed points
    #[arg(long)]
    write: bool,

    /// Holding register addresses (e.g. 40001-40010)
    #[arg(long)]
    hr: Option<String>,

    /// Coil addresses (e.g. 1-10)
    #[arg(long)]
    coil: Option<String>,

    /// Input register addresses (e.g. 30001-30010)
    #[arg(long)]
    ir: Option<String>,

    /// Discrete input addresses (e.g. 10001-10010)
    #[arg(long)]
    di: Option<String>,

    /// Comma-separated values to write (coils take 0/1)
    #[arg(long)]
    value: Option<String>,

    /// Worker pool size
    #[arg(long, default_value_t = DEFAULT_WORKERS)]
    workers: usize,

    /// Per-request timeout in milliseconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_MS)]
    timeout_ms: u64,

    /// Abandon jobs still in flight after this many milliseconds
    #[arg(long)]
    deadline_ms: Option<u64>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if cli.read == cli.write {
        return Err(ModbusError::configuration("specify exactly one of --read or --write").into());
    }

    let slave_ids = parse_id_list(&cli.slaveids)?;
    let specs = collect_space_specs(&cli)?;
    if specs.is_empty() {
        return Err(ModbusError::configuration(
            "specify at least one of --hr, --coil, --ir, --di",
        )
        .into());
    }

    let (operations, spaces) = if cli.read {
        build_read_plan(&specs)?
    } else {
        let raw = cli
            .value
            .as_deref()
            .ok_or_else(|| ModbusError::configuration("--value is required with --write"))?;
        build_write_plan(&specs, raw)?
    };

    let targets: Vec<SlaveTarget> = slave_ids
        .iter()
        .map(|&id| SlaveTarget::with_port(cli.ip.clone(), cli.port, id))
        .collect();
    let jobs = expand(&targets, &operations)?;
    info!(
        "querying {} slave(s) at {}:{}, {} operation(s) each",
        targets.len(),
        cli.ip,
        cli.port,
        operations.len()
    );

    let connector = TcpConnector::with_timeout(Duration::from_millis(cli.timeout_ms));
    let mut config = ScanConfig::new()
        .with_workers(cli.workers)
        .with_request_timeout(Duration::from_millis(cli.timeout_ms));
    if let Some(ms) = cli.deadline_ms {
        config = config.with_global_deadline(Duration::from_millis(ms));
    }

    let orchestrator = Orchestrator::new(connector, config);
    let started = Instant::now();
    let results = orchestrator.run(jobs).await?;

    print_results(&targets, &spaces, &results);
    print_summary(&results, started.elapsed());
    Ok(())
}

fn init_tracing(verbosity: u8) {
    let default_level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Parse a slave id list: a range (1-5), a list (1,3,5), or a mix.
fn parse_id_list(input: &str) -> ModbusResult<Vec<u8>> {
    let mut ids = Vec::new();
    for (start, end) in parse_ranges(input)? {
        if end > u8::MAX as u32 {
            return Err(ModbusError::configuration(format!(
                "slave id {end} exceeds 255"
            )));
        }
        ids.extend((start..=end).map(|id| id as u8));
    }
    Ok(ids)
}

/// Parse comma-separated address parts, each `start-end` or a single number.
fn parse_ranges(input: &str) -> ModbusResult<Vec<(u32, u32)>> {
    let mut ranges = Vec::new();
    for part in input.split(',') {
        let part = part.trim();
        let (start, end) = match part.split_once('-') {
            Some((start, end)) => (parse_number(start)?, parse_number(end)?),
            None => {
                let single = parse_number(part)?;
                (single, single)
            }
        };
        if start > end {
            return Err(ModbusError::configuration(format!(
                "invalid range '{part}': start exceeds end"
            )));
        }
        ranges.push((start, end));
    }
    Ok(ranges)
}

fn parse_number(input: &str) -> ModbusResult<u32> {
    input
        .trim()
        .parse()
        .map_err(|_| ModbusError::configuration(format!("invalid number '{}'", input.trim())))
}

/// Gather the per-space address specs in flag order.
fn collect_space_specs(cli: &Cli) -> ModbusResult<Vec<(RegisterSpace, Vec<(u32, u32)>)>> {
    let flags = [
        (RegisterSpace::Holding, &cli.hr),
        (RegisterSpace::Coil, &cli.coil),
        (RegisterSpace::Input, &cli.ir),
        (RegisterSpace::Discrete, &cli.di),
    ];
    let mut specs = Vec::new();
    for (space, flag) in flags {
        if let Some(input) = flag {
            specs.push((space, parse_ranges(input)?));
        }
    }
    Ok(specs)
}

/// Turn read specs into operations, normalized to protocol addresses and
/// chunked to per-function-code limits. Returns the operations plus the
/// space of each, for mapping results back to logical addresses.
fn build_read_plan(
    specs: &[(RegisterSpace, Vec<(u32, u32)>)],
) -> ModbusResult<(Vec<Operation>, Vec<RegisterSpace>)> {
    let mut operations = Vec::new();
    let mut spaces = Vec::new();
    for &(space, ref ranges) in specs {
        for &(start, end) in ranges {
            let protocol_start = space.to_protocol(start)?;
            space.to_protocol(end)?;
            let count = u16::try_from(end - start + 1).map_err(|_| {
                ModbusError::configuration(format!("range {start}-{end} is too wide"))
            })?;
            let range = RegisterRange::new(protocol_start, count)?;
            for operation in read_operations(space.read_function(), range)? {
                operations.push(operation);
                spaces.push(space);
            }
        }
    }
    Ok((operations, spaces))
}

/// Turn write specs plus the value list into operations. Each writable space
/// takes one contiguous address range and consumes that many values; the
/// total value count must match the addressed point count exactly.
fn build_write_plan(
    specs: &[(RegisterSpace, Vec<(u32, u32)>)],
    raw_values: &str,
) -> ModbusResult<(Vec<Operation>, Vec<RegisterSpace>)> {
    let values: Vec<&str> = raw_values.split(',').map(str::trim).collect();

    let mut blocks = Vec::new();
    let mut total_points = 0usize;
    for &(space, ref ranges) in specs {
        if space.write_function(1).is_none() {
            return Err(ModbusError::configuration(format!(
                "{} is read-only",
                space.label()
            )));
        }
        let &[(start, end)] = ranges.as_slice() else {
            return Err(ModbusError::configuration(format!(
                "write addresses for {} must be one contiguous range",
                space.label()
            )));
        };
        let protocol_start = space.to_protocol(start)?;
        space.to_protocol(end)?;
        let count = (end - start + 1) as usize;
        blocks.push((space, protocol_start, count));
        total_points += count;
    }

    if values.len() != total_points {
        return Err(ModbusError::ValueCountMismatch {
            expected: total_points,
            actual: values.len(),
        });
    }

    let mut operations = Vec::new();
    let mut spaces = Vec::new();
    let mut next_value = values.into_iter();
    for (space, protocol_start, count) in blocks {
        let block: Vec<&str> = next_value.by_ref().take(count).collect();
        let operation = if space.is_bit() {
            let coils = block
                .iter()
                .map(|v| match *v {
                    "0" => Ok(false),
                    "1" => Ok(true),
                    other => Err(ModbusError::configuration(format!(
                        "coil value '{other}' must be 0 or 1"
                    ))),
                })
                .collect::<ModbusResult<Vec<bool>>>()?;
            Operation::write_coils(protocol_start, coils)
        } else {
            let registers = block
                .iter()
                .map(|v| {
                    v.parse::<u16>().map_err(|_| {
                        ModbusError::configuration(format!(
                            "register value '{v}' must be 0..=65535"
                        ))
                    })
                })
                .collect::<ModbusResult<Vec<u16>>>()?;
            Operation::write_registers(protocol_start, registers)
        };
        operations.push(operation);
        spaces.push(space);
    }
    Ok((operations, spaces))
}

/// Print results grouped per slave, in submission order.
fn print_results(targets: &[SlaveTarget], spaces: &[RegisterSpace], results: &[QueryResult]) {
    let per_target = spaces.len();
    for (target_index, target) in targets.iter().enumerate() {
        println!("\nSlave {} at {}:{}", target.unit_id, target.host, target.port);
        for op_index in 0..per_target {
            let result = &results[target_index * per_target + op_index];
            print_result(spaces[op_index], result);
        }
    }
}

fn print_result(space: RegisterSpace, result: &QueryResult) {
    let unit = result.job.target.unit_id;
    let label = space.label();
    let logical = space.to_logical(result.job.operation.address());
    match &result.outcome {
        QueryOutcome::Success(ResponsePayload::Registers(values)) => {
            for (i, value) in values.iter().enumerate() {
                println!("Slave {} - {}[{}]: {}", unit, label, logical + i as u32, value);
            }
        }
        QueryOutcome::Success(ResponsePayload::Bits(bits)) => {
            for (i, bit) in bits.iter().enumerate() {
                println!(
                    "Slave {} - {}[{}]: {}",
                    unit,
                    label,
                    logical + i as u32,
                    u8::from(*bit)
                );
            }
        }
        QueryOutcome::Success(ResponsePayload::WriteAck) => {
            let quantity = result.job.operation.quantity() as u32;
            if quantity == 1 {
                println!("Slave {} - wrote {}[{}]", unit, label, logical);
            } else {
                println!(
                    "Slave {} - wrote {}[{}..{}]",
                    unit,
                    label,
                    logical,
                    logical + quantity - 1
                );
            }
        }
        QueryOutcome::Success(ResponsePayload::Exception(code))
        | QueryOutcome::Exception(code) => {
            println!("Slave {} - {}[{}]: {}", unit, label, logical, code);
        }
        QueryOutcome::Protocol(e) => {
            println!("Slave {} - {}[{}]: protocol error: {}", unit, label, logical, e);
        }
        QueryOutcome::Transport(e) => {
            println!("Slave {} - {}[{}]: {}", unit, label, logical, e);
        }
        QueryOutcome::Timeout => {
            println!("Slave {} - {}[{}]: timed out", unit, label, logical);
        }
    }
}

fn print_summary(results: &[QueryResult], elapsed: Duration) {
    let ok = results.iter().filter(|r| r.outcome.is_success()).count();
    let exceptions = results
        .iter()
        .filter(|r| matches!(r.outcome, QueryOutcome::Exception(_)))
        .count();
    let failed = results.len() - ok - exceptions;
    println!(
        "\n{} ok, {} exception(s), {} failed of {} queries in {:.2?}",
        ok,
        exceptions,
        failed,
        results.len(),
        elapsed
    );
}
