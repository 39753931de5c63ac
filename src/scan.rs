//! Query job model and the concurrent orchestrator
//!
//! A scan is a set of independent request/response exchanges: the Cartesian
//! product of slave targets and operations is expanded into [`QueryJob`]s,
//! dispatched through a bounded worker pool, and collected into exactly one
//! [`QueryResult`] per job. Results are positionally keyed to the submitted
//! job list; completion order is never meaningful.
//!
//! Failure isolation is the core guarantee: a connect refusal, timeout,
//! malformed response, or device exception on one job never cancels or
//! blocks a sibling job. Only malformed top-level configuration (an empty
//! job set, an invalid operation) fails the run itself, before any I/O.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::constants::{
    DEFAULT_TCP_PORT, DEFAULT_TIMEOUT_MS, DEFAULT_WORKERS, MAX_READ_BITS, MAX_READ_REGISTERS,
};
use crate::error::{ModbusError, ModbusResult};
use crate::frame;
use crate::protocol::{
    ExceptionCode, ModbusFunction, ModbusRequest, Operation, ResponsePayload, UnitId,
};
use crate::transport::{ModbusTransport, TransportConnector};
use crate::txid::TransactionAllocator;

/// One addressable device: a TCP endpoint plus the unit id behind it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SlaveTarget {
    pub host: String,
    pub port: u16,
    pub unit_id: UnitId,
}

impl SlaveTarget {
    /// Target on the default Modbus TCP port.
    pub fn new(host: impl Into<String>, unit_id: UnitId) -> Self {
        Self::with_port(host, DEFAULT_TCP_PORT, unit_id)
    }

    /// Target on an explicit port.
    pub fn with_port(host: impl Into<String>, port: u16, unit_id: UnitId) -> Self {
        Self {
            host: host.into(),
            port,
            unit_id,
        }
    }
}

impl fmt::Display for SlaveTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} unit {}", self.host, self.port, self.unit_id)
    }
}

/// A contiguous protocol-address range, `count >= 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterRange {
    pub start: u16,
    pub count: u16,
}

impl RegisterRange {
    /// Create a range, rejecting empty ranges and 16-bit address overflow.
    pub fn new(start: u16, count: u16) -> ModbusResult<Self> {
        if count == 0 {
            return Err(ModbusError::invalid_range("range count must be at least 1"));
        }
        if start as u32 + count as u32 > 65536 {
            return Err(ModbusError::invalid_range(format!(
                "range {start}+{count} overflows the 16-bit address space"
            )));
        }
        Ok(Self { start, count })
    }

    /// Split into sub-ranges of at most `max` elements each.
    pub fn chunks(self, max: u16) -> Vec<RegisterRange> {
        let mut chunks = Vec::new();
        let mut start = self.start;
        let mut remaining = self.count;
        while remaining > 0 {
            let count = remaining.min(max);
            chunks.push(RegisterRange { start, count });
            start = start.saturating_add(count);
            remaining -= count;
        }
        chunks
    }
}

/// One unit of work: a target and the operation to run against it.
/// Immutable once created; one job is exactly one exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryJob {
    pub target: SlaveTarget,
    pub operation: Operation,
}

/// How a job ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOutcome {
    /// The device answered the request; payload per function code.
    Success(ResponsePayload),
    /// The device answered with a Modbus exception. A completed exchange
    /// carrying a negative answer, not a failure of this tool.
    Exception(ExceptionCode),
    /// The response could not be decoded or did not match the request.
    Protocol(ModbusError),
    /// The connection or the socket I/O failed.
    Transport(ModbusError),
    /// The exchange exceeded the per-request timeout or the global deadline.
    Timeout,
}

impl QueryOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, QueryOutcome::Success(_))
    }
}

/// One result per submitted job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryResult {
    pub job: QueryJob,
    pub outcome: QueryOutcome,
}

/// Orchestrator tuning knobs.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Bounded worker pool size.
    pub workers: usize,
    /// Budget for one complete exchange (connect + send + receive + decode).
    pub request_timeout: Duration,
    /// Optional whole-scan deadline; jobs still in flight past it are
    /// abandoned and reported as `Timeout`.
    pub global_deadline: Option<Duration>,
}

impl ScanConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_global_deadline(mut self, deadline: Duration) -> Self {
        self.global_deadline = Some(deadline);
        self
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            request_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            global_deadline: None,
        }
    }
}

/// Maximum quantity a single read of this function code may carry.
fn max_read_quantity(function: ModbusFunction) -> ModbusResult<u16> {
    match function {
        ModbusFunction::ReadCoils | ModbusFunction::ReadDiscreteInputs => Ok(MAX_READ_BITS),
        ModbusFunction::ReadHoldingRegisters | ModbusFunction::ReadInputRegisters => {
            Ok(MAX_READ_REGISTERS)
        }
        other => Err(ModbusError::invalid_range(format!(
            "{other} is not a read function"
        ))),
    }
}

/// Expand one read sweep into operations, splitting ranges wider than the
/// function code's per-request limit into multiple chunked reads.
pub fn read_operations(
    function: ModbusFunction,
    range: RegisterRange,
) -> ModbusResult<Vec<Operation>> {
    let max = max_read_quantity(function)?;
    range
        .chunks(max)
        .into_iter()
        .map(|chunk| Operation::read(function, chunk.start, chunk.count))
        .collect()
}

/// Expand targets x operations into the job set, target-major: all of the
/// first target's operations, then the second target's, and so on.
///
/// Construction errors (empty inputs, out-of-bounds operations) surface here,
/// before anything is dispatched.
pub fn expand(targets: &[SlaveTarget], operations: &[Operation]) -> ModbusResult<Vec<QueryJob>> {
    if targets.is_empty() {
        return Err(ModbusError::configuration("no slave targets given"));
    }
    if operations.is_empty() {
        return Err(ModbusError::configuration("no operations given"));
    }
    for operation in operations {
        operation.validate()?;
    }

    let mut jobs = Vec::with_capacity(targets.len() * operations.len());
    for target in targets {
        for operation in operations {
            jobs.push(QueryJob {
                target: target.clone(),
                operation: operation.clone(),
            });
        }
    }
    Ok(jobs)
}

/// Runs query jobs through a bounded worker pool, one connection per job.
pub struct Orchestrator<C> {
    connector: Arc<C>,
    allocator: Arc<TransactionAllocator>,
    config: ScanConfig,
}

impl<C> Orchestrator<C>
where
    C: TransportConnector + 'static,
    C::Transport: 'static,
{
    /// Create an orchestrator with its own transaction allocator.
    pub fn new(connector: C, config: ScanConfig) -> Self {
        Self::with_allocator(connector, config, TransactionAllocator::new())
    }

    /// Create an orchestrator sharing an externally owned allocator.
    pub fn with_allocator(
        connector: C,
        config: ScanConfig,
        allocator: TransactionAllocator,
    ) -> Self {
        Self {
            connector: Arc::new(connector),
            allocator: Arc::new(allocator),
            config,
        }
    }

    /// Run every job to completion and return one result per job, in
    /// submission order.
    ///
    /// Fails only for malformed configuration: an empty job set or a job
    /// whose operation violates its function-code bounds. Everything that
    /// goes wrong after dispatch is data in the returned results.
    pub async fn run(&self, jobs: Vec<QueryJob>) -> ModbusResult<Vec<QueryResult>> {
        if jobs.is_empty() {
            return Err(ModbusError::configuration("no query jobs to dispatch"));
        }
        for job in &jobs {
            job.operation.validate()?;
        }

        info!(
            "dispatching {} jobs across {} workers",
            jobs.len(),
            self.config.workers
        );
        let deadline = self
            .config
            .global_deadline
            .map(|d| tokio::time::Instant::now() + d);
        let semaphore = Arc::new(Semaphore::new(self.config.workers.max(1)));
        let request_timeout = self.config.request_timeout;

        let mut tasks: JoinSet<(usize, QueryOutcome)> = JoinSet::new();
        for (index, job) in jobs.iter().enumerate() {
            let connector = Arc::clone(&self.connector);
            let allocator = Arc::clone(&self.allocator);
            let semaphore = Arc::clone(&semaphore);
            let job = job.clone();
            tasks.spawn(async move {
                // Queue time waiting for a worker slot does not count
                // against the per-request budget.
                let _permit = semaphore.acquire_owned().await.ok();
                let outcome =
                    match timeout(request_timeout, execute_job(&*connector, &allocator, &job)).await
                    {
                        Ok(outcome) => outcome,
                        Err(_) => QueryOutcome::Timeout,
                    };
                (index, outcome)
            });
        }

        let mut outcomes: Vec<Option<QueryOutcome>> = jobs.iter().map(|_| None).collect();
        loop {
            let joined = match deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, tasks.join_next()).await {
                    Ok(joined) => joined,
                    Err(_) => {
                        warn!("global deadline reached, abandoning in-flight jobs");
                        tasks.abort_all();
                        break;
                    }
                },
                None => tasks.join_next().await,
            };
            match joined {
                Some(Ok((index, outcome))) => outcomes[index] = Some(outcome),
                // An aborted or panicked worker leaves its slot empty; the
                // job is reported as abandoned below.
                Some(Err(e)) => warn!("worker task failed: {}", e),
                None => break,
            }
        }

        let results: Vec<QueryResult> = jobs
            .into_iter()
            .zip(outcomes)
            .map(|(job, outcome)| QueryResult {
                job,
                outcome: outcome.unwrap_or(QueryOutcome::Timeout),
            })
            .collect();

        let ok = results.iter().filter(|r| r.outcome.is_success()).count();
        info!("scan finished: {}/{} jobs succeeded", ok, results.len());
        Ok(results)
    }
}

/// One complete exchange: encode, connect, send, receive, decode.
async fn execute_job<C: TransportConnector>(
    connector: &C,
    allocator: &TransactionAllocator,
    job: &QueryJob,
) -> QueryOutcome {
    let request = ModbusRequest::new(allocator.next(), job.target.unit_id, job.operation.clone());
    let frame = match frame::encode_request(&request) {
        Ok(frame) => frame,
        Err(e) => return QueryOutcome::Protocol(e),
    };

    let mut transport = match connector.connect(&job.target).await {
        Ok(transport) => transport,
        Err(e) => {
            debug!("{}: connect failed: {}", job.target, e);
            return transport_outcome(e);
        }
    };

    let outcome = exchange(&mut transport, &request, &frame).await;
    let _ = transport.close().await;
    debug!("{} {}: {:?}", job.target, job.operation.function(), outcome);
    outcome
}

async fn exchange<T: ModbusTransport>(
    transport: &mut T,
    request: &ModbusRequest,
    frame: &[u8],
) -> QueryOutcome {
    if let Err(e) = transport.send(frame).await {
        return transport_outcome(e);
    }
    let raw = match transport.receive().await {
        Ok(raw) => raw,
        Err(e) => return transport_outcome(e),
    };
    match frame::decode_response(&raw, request) {
        Ok(response) => match response.payload {
            ResponsePayload::Exception(code) => QueryOutcome::Exception(code),
            payload => QueryOutcome::Success(payload),
        },
        Err(e) => QueryOutcome::Protocol(e),
    }
}

fn transport_outcome(error: ModbusError) -> QueryOutcome {
    if error.is_timeout() {
        QueryOutcome::Timeout
    } else {
        QueryOutcome::Transport(error)
    }
}
