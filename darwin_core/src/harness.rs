use crate::genome::Genome;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

/// Cost recorded for a crashed execution before the fitness cap is applied.
pub const CRASH_SENTINEL_COST: f64 = f64::MAX;

/// How often a running child process is polled for completion.
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Extra time granted to drain a finished child's stdout when it exits close
/// to the deadline.
const STDOUT_GRACE: Duration = Duration::from_millis(50);

/// Default number of timed-out in-process targets allowed to keep running
/// before the harness refuses to start new ones.
pub const DEFAULT_MAX_ABANDONED: usize = 64;


/// Outcome class of a single harness invocation.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", tag = "status", content = "detail")]
pub enum MeasurementStatus {
    Completed,
    TimedOut,
    Crashed(String),
    ResourceExceeded(String),
    /// The harness could not run the target at all (spawn or I/O failure).
    HarnessError(String),
}

/// The result of running the target once against one genome.
///
/// `cost` is in the harness's own unit: the work counter reported by an
/// in-process target, or microseconds for wall-clock based command targets.
/// A timed-out run reports the timeout in microseconds as a lower bound.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Measurement {
    pub cost: f64,
    #[serde(with = "duration_micros")]
    pub elapsed: Duration,
    pub status: MeasurementStatus,
}

impl Measurement {
    pub fn completed(cost: f64, elapsed: Duration) -> Self {
        Self {
            cost,
            elapsed,
            status: MeasurementStatus::Completed,
        }
    }

    pub fn timed_out(timeout: Duration) -> Self {
        Self {
            cost: micros(timeout),
            elapsed: timeout,
            status: MeasurementStatus::TimedOut,
        }
    }

    pub fn crashed(description: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            cost: CRASH_SENTINEL_COST,
            elapsed,
            status: MeasurementStatus::Crashed(description.into()),
        }
    }

    pub fn resource_exceeded(cost: f64, description: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            cost,
            elapsed,
            status: MeasurementStatus::ResourceExceeded(description.into()),
        }
    }

    pub fn harness_error(description: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            cost: 0.0,
            elapsed,
            status: MeasurementStatus::HarnessError(description.into()),
        }
    }

    pub fn is_crash(&self) -> bool {
        matches!(self.status, MeasurementStatus::Crashed(_))
    }
}

fn micros(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1_000_000.0
}

mod duration_micros {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_micros() as u64)
    }
}

/// A `Harness` runs the target against a genome under a wall-clock bound.
///
/// `evaluate` must return within `timeout` (plus scheduling slack) no matter
/// what the target does, and target failures are expressed in the returned
/// [`Measurement`] rather than propagated. Harnesses are shared by the
/// evaluation worker pool, so they take `&self` and must be `Send + Sync`.
pub trait Harness: Send + Sync {
    /// Runs the target once against `genome`.
    ///
    /// # Arguments
    /// * `genome`: The candidate input. The harness only reads it.
    /// * `timeout`: Wall-clock bound for this single run. A target still
    ///   running when it expires is cancelled (or abandoned, where it cannot
    ///   be) and reported as `TimedOut`.
    ///
    /// # Returns
    /// A fresh `Measurement` carrying the cost and the outcome class. Target
    /// faults, timeouts and harness failures are all encoded in its status.
    fn evaluate(&self, genome: &Genome, timeout: Duration) -> Measurement;
}

impl<H: Harness + ?Sized> Harness for Box<H> {
    fn evaluate(&self, genome: &Genome, timeout: Duration) -> Measurement {
        (**self).evaluate(genome, timeout)
    }
}

impl<H: Harness + ?Sized> Harness for Arc<H> {
    fn evaluate(&self, genome: &Genome, timeout: Duration) -> Measurement {
        (**self).evaluate(genome, timeout)
    }
}

const RUNNING: u8 = 0;
const FINISHED: u8 = 1;
const ABANDONED: u8 = 2;

/// Handed to cancellable in-process targets. Reports stopped once the harness
/// has given up on the call; a long-running target should poll it and return.
#[derive(Debug, Clone)]
pub struct StopToken(Arc<AtomicU8>);

impl StopToken {
    fn new() -> Self {
        Self(Arc::new(AtomicU8::new(RUNNING)))
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Acquire) == ABANDONED
    }

    /// False if the harness abandoned the call first.
    fn finish(&self) -> bool {
        self.0
            .compare_exchange(RUNNING, FINISHED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// False if the target already returned.
    fn abandon(&self) -> bool {
        self.0
            .compare_exchange(RUNNING, ABANDONED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

type TargetFn = dyn Fn(&[i64], &StopToken) -> u64 + Send + Sync;

/// Runs a Rust closure as the target on a dedicated thread per evaluation.
///
/// The closure receives the genome elements and returns a synthetic work
/// counter, which becomes the measurement cost. Panics are contained and
/// reported as crashes.
///
/// On timeout the call's [`StopToken`] is set. Targets built with
/// [`InProcessHarness::cancellable`] see it and return; plain targets cannot
/// be interrupted and keep running detached. At most `max_abandoned` such
/// threads may be outstanding; past that, evaluations fail with
/// `HarnessError` until some of them return. Targets that may hang forever
/// without checking the token are better served by [`CommandHarness`].
pub struct InProcessHarness {
    target: Arc<TargetFn>,
    work_limit: Option<u64>,
    max_abandoned: usize,
    abandoned: Arc<AtomicUsize>,
}

impl InProcessHarness {
    pub fn new<F>(target: F) -> Self
    where
        F: Fn(&[i64]) -> u64 + Send + Sync + 'static,
    {
        Self::cancellable(move |data: &[i64], _: &StopToken| target(data))
    }

    /// A target that polls the token and returns early once it is stopped.
    pub fn cancellable<F>(target: F) -> Self
    where
        F: Fn(&[i64], &StopToken) -> u64 + Send + Sync + 'static,
    {
        Self {
            target: Arc::new(target),
            work_limit: None,
            max_abandoned: DEFAULT_MAX_ABANDONED,
            abandoned: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Reports `ResourceExceeded` for any run whose work counter exceeds `limit`.
    pub fn with_work_limit(mut self, limit: u64) -> Self {
        self.work_limit = Some(limit);
        self
    }

    pub fn with_max_abandoned(mut self, limit: usize) -> Self {
        self.max_abandoned = limit;
        self
    }

    /// Timed-out target threads that have not returned yet.
    pub fn abandoned_threads(&self) -> usize {
        self.abandoned.load(Ordering::SeqCst)
    }
}

impl Harness for InProcessHarness {
    fn evaluate(&self, genome: &Genome, timeout: Duration) -> Measurement {
        let start = Instant::now();
        let outstanding = self.abandoned.load(Ordering::SeqCst);
        if outstanding >= self.max_abandoned {
            log::warn!("{outstanding} timed-out targets are still running, not starting another");
            return Measurement::harness_error(
                format!("{outstanding} timed-out targets are still running"),
                start.elapsed(),
            );
        }

        let target = Arc::clone(&self.target);
        let abandoned = Arc::clone(&self.abandoned);
        let token = StopToken::new();
        let thread_token = token.clone();
        let input = genome.elements().to_vec();
        let (tx, rx) = mpsc::channel();

        let spawned = thread::Builder::new()
            .name("darwin-target".to_string())
            .spawn(move || {
                let outcome = catch_unwind(AssertUnwindSafe(|| target(&input, &thread_token)));
                if !thread_token.finish() {
                    abandoned.fetch_sub(1, Ordering::SeqCst);
                }
                // The receiver is gone if the harness already gave up on us.
                let _ = tx.send(outcome);
            });
        if let Err(e) = spawned {
            log::warn!("Failed to spawn target thread: {e}");
            return Measurement::harness_error(
                format!("Failed to spawn target thread: {e}"),
                start.elapsed(),
            );
        }

        match rx.recv_timeout(timeout) {
            Ok(Ok(work)) => {
                let elapsed = start.elapsed();
                match self.work_limit {
                    Some(limit) if work > limit => Measurement::resource_exceeded(
                        limit as f64,
                        format!("Work counter {work} exceeded limit {limit}"),
                        elapsed,
                    ),
                    _ => Measurement::completed(work as f64, elapsed),
                }
            }
            Ok(Err(panic_payload)) => {
                let msg = if let Some(s) = panic_payload.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = panic_payload.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "Unknown panic type".to_string()
                };
                Measurement::crashed(msg, start.elapsed())
            }
            Err(RecvTimeoutError::Timeout) => {
                // Counted before the token flips, so the thread never
                // decrements a count it was not added to.
                self.abandoned.fetch_add(1, Ordering::SeqCst);
                if !token.abandon() {
                    self.abandoned.fetch_sub(1, Ordering::SeqCst);
                }
                log::debug!(
                    "In-process target exceeded {timeout:?} on a genome of length {}, stopping it",
                    genome.len()
                );
                Measurement::timed_out(timeout)
            }
            Err(RecvTimeoutError::Disconnected) => Measurement::crashed(
                "Target thread exited without reporting a result",
                start.elapsed(),
            ),
        }
    }
}

/// How a genome is handed to an external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputDelivery {
    StdIn,
    /// Written to a temporary file; every `{}` in the template is replaced by
    /// its path and the result is appended to the command line, split on
    /// whitespace.
    File(String),
}

/// Byte representation of a genome for external commands.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum InputEncoding {
    /// Decimal elements separated by single spaces, newline-terminated.
    #[default]
    Text,
    /// One byte per element, truncating each value to its low 8 bits.
    Bytes,
}

impl InputEncoding {
    pub fn encode(&self, genome: &Genome) -> Vec<u8> {
        match self {
            InputEncoding::Text => {
                let mut text = genome
                    .elements()
                    .iter()
                    .map(|v| v.to_string())
                    .collect::<Vec<_>>()
                    .join(" ");
                text.push('\n');
                text.into_bytes()
            }
            InputEncoding::Bytes => genome.elements().iter().map(|v| *v as u8).collect(),
        }
    }
}

/// Where an external command's cost comes from.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum CostSource {
    /// Elapsed wall-clock time in microseconds.
    #[default]
    WallClock,
    /// The first whitespace-delimited token of stdout, parsed as a number.
    /// Falls back to wall-clock time when stdout does not start with one.
    Stdout,
}

#[derive(Debug, Clone)]
pub struct CommandHarnessConfig {
    pub command: Vec<String>,
    pub input_delivery: InputDelivery,
    pub encoding: InputEncoding,
    pub cost_source: CostSource,
    pub working_dir: Option<PathBuf>,
}

/// Runs an external command once per genome and kills it on timeout.
///
/// This is the isolating harness: a hanging or crashing target only ever takes
/// down its own process.
pub struct CommandHarness {
    config: CommandHarnessConfig,
}

impl CommandHarness {
    /// `config.command` must contain at least the program to run; the engine
    /// configuration layer rejects an empty command before this is reached.
    pub fn new(config: CommandHarnessConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CommandHarnessConfig {
        &self.config
    }

    fn wait_with_timeout(
        &self,
        child: &mut Child,
        timeout: Duration,
        start: Instant,
    ) -> Result<Option<ExitStatus>, std::io::Error> {
        loop {
            match child.try_wait()? {
                Some(status) => return Ok(Some(status)),
                None => {
                    if start.elapsed() >= timeout {
                        kill_process_group(child);
                        if let Err(e) = child.kill() {
                            log::warn!("Failed to kill timed-out target process: {e}");
                        }
                        // Reap so the timed-out child does not linger as a zombie.
                        let _ = child.wait();
                        return Ok(None);
                    }
                    thread::sleep(POLL_INTERVAL);
                }
            }
        }
    }

    fn cost_from(&self, stdout: &[u8], elapsed: Duration) -> f64 {
        match self.config.cost_source {
            CostSource::WallClock => micros(elapsed),
            CostSource::Stdout => {
                let parsed = std::str::from_utf8(stdout)
                    .ok()
                    .and_then(|s| s.split_whitespace().next())
                    .and_then(|token| token.parse::<f64>().ok())
                    .filter(|v| v.is_finite());
                match parsed {
                    Some(cost) => cost,
                    None => {
                        log::debug!("Target stdout carried no cost, using wall-clock time");
                        micros(elapsed)
                    }
                }
            }
        }
    }
}

/// Reads a child's stdout on its own thread, one chunk per message.
fn spawn_stdout_reader(mut out: impl Read + Send + 'static) -> Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut chunk = [0u8; 4096];
        loop {
            match out.read(&mut chunk) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if tx.send(chunk[..n].to_vec()).is_err() {
                        break;
                    }
                }
            }
        }
    });
    rx
}

/// Collects stdout until EOF or `deadline`. The flag is false when the pipe
/// was still open at the deadline, e.g. held by a background grandchild.
fn drain_stdout(rx: &Receiver<Vec<u8>>, deadline: Instant) -> (Vec<u8>, bool) {
    let mut buf = Vec::new();
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(remaining) {
            Ok(chunk) => buf.extend_from_slice(&chunk),
            Err(RecvTimeoutError::Disconnected) => return (buf, true),
            Err(RecvTimeoutError::Timeout) => return (buf, false),
        }
    }
}

/// Kills the child's whole process group, taking any background processes it
/// started along with it. The child leads its own group (see `evaluate`).
#[cfg(unix)]
fn kill_process_group(child: &Child) {
    let Ok(pgid) = libc::pid_t::try_from(child.id()) else {
        return;
    };
    // SAFETY: kill(2) has no memory-safety preconditions; a negative pid
    // addresses the process group the child leads.
    let rc = unsafe { libc::kill(-pgid, libc::SIGKILL) };
    if rc != 0 {
        log::debug!(
            "Could not signal process group {pgid}: {}",
            std::io::Error::last_os_error()
        );
    }
}

#[cfg(not(unix))]
fn kill_process_group(_child: &Child) {}

fn classify_exit(status: ExitStatus) -> Result<(), MeasurementStatus> {
    if status.success() {
        return Ok(());
    }
    if let Some(code) = status.code() {
        return Err(MeasurementStatus::Crashed(format!("Exited with code {code}")));
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            let desc = format!("Terminated by signal {signal}");
            return Err(if signal == libc::SIGXCPU || signal == libc::SIGXFSZ {
                MeasurementStatus::ResourceExceeded(desc)
            } else {
                MeasurementStatus::Crashed(desc)
            });
        }
    }
    Err(MeasurementStatus::Crashed("Exited abnormally".to_string()))
}

impl Harness for CommandHarness {
    fn evaluate(&self, genome: &Genome, timeout: Duration) -> Measurement {
        let start = Instant::now();
        let Some((program, args)) = self.config.command.split_first() else {
            return Measurement::harness_error("Command is empty", start.elapsed());
        };
        let payload = self.config.encoding.encode(genome);

        let mut cmd = Command::new(program);
        cmd.args(args);
        if let Some(cwd) = &self.config.working_dir {
            cmd.current_dir(cwd);
        }

        // Held until the child has been reaped; dropping it deletes the file.
        let mut _temp_file: Option<tempfile::NamedTempFile> = None;

        match &self.config.input_delivery {
            InputDelivery::StdIn => {
                cmd.stdin(Stdio::piped());
            }
            InputDelivery::File(arg_template) => {
                let mut named_temp_file = match tempfile::NamedTempFile::new() {
                    Ok(f) => f,
                    Err(e) => {
                        return Measurement::harness_error(
                            format!("Failed to create temp file: {e}"),
                            start.elapsed(),
                        );
                    }
                };
                if let Err(e) = named_temp_file
                    .write_all(&payload)
                    .and_then(|_| named_temp_file.flush())
                {
                    return Measurement::harness_error(
                        format!(
                            "Failed to write to temp file {:?}: {e}",
                            named_temp_file.path()
                        ),
                        start.elapsed(),
                    );
                }
                let Some(path_str) = named_temp_file.path().to_str().map(str::to_string) else {
                    return Measurement::harness_error(
                        "Temp file path is not valid UTF-8",
                        start.elapsed(),
                    );
                };
                for part in arg_template.replace("{}", &path_str).split_whitespace() {
                    cmd.arg(part);
                }
                cmd.stdin(Stdio::null());
                _temp_file = Some(named_temp_file);
            }
        }

        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::null());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                let error_msg = format!("Failed to spawn command '{:?}': {e}", self.config.command);
                log::warn!("{error_msg}");
                return Measurement::harness_error(error_msg, start.elapsed());
            }
        };

        // Stdin is fed from its own thread so a target that never reads it
        // cannot stall us past the timeout.
        if let Some(mut child_stdin) = child.stdin.take() {
            thread::spawn(move || {
                if let Err(e) = child_stdin.write_all(&payload) {
                    log::debug!("Target did not consume its whole input: {e}");
                }
            });
        }

        let stdout_rx = child.stdout.take().map(spawn_stdout_reader);

        let exit = match self.wait_with_timeout(&mut child, timeout, start) {
            Ok(Some(status)) => status,
            Ok(None) => return Measurement::timed_out(timeout),
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Measurement::harness_error(
                    format!("Error waiting for child: {e}"),
                    start.elapsed(),
                );
            }
        };
        let elapsed = start.elapsed();

        let stdout = match stdout_rx {
            Some(rx) => {
                let deadline = (start + timeout).max(Instant::now() + STDOUT_GRACE);
                let (stdout, complete) = drain_stdout(&rx, deadline);
                if !complete {
                    log::debug!(
                        "Target exited but its stdout stayed open past the deadline, killing leftovers"
                    );
                    kill_process_group(&child);
                }
                stdout
            }
            None => Vec::new(),
        };

        match classify_exit(exit) {
            Ok(()) => Measurement::completed(self.cost_from(&stdout, elapsed), elapsed),
            Err(MeasurementStatus::ResourceExceeded(desc)) => {
                Measurement::resource_exceeded(self.cost_from(&stdout, elapsed), desc, elapsed)
            }
            Err(MeasurementStatus::Crashed(desc)) => Measurement::crashed(desc, elapsed),
            Err(other) => Measurement {
                cost: 0.0,
                elapsed,
                status: other,
            },
        }
    }
}

#[cfg(test)]
mod in_process_harness_tests {
    use super::*;

    fn sum_target(data: &[i64]) -> u64 {
        data.iter().map(|v| *v as u64).sum()
    }

    fn panicking_target(data: &[i64]) -> u64 {
        if data.first() == Some(&0) {
            panic!("Boom!");
        }
        1
    }

    #[test]
    fn in_process_harness_reports_work_as_cost() {
        let harness = InProcessHarness::new(sum_target);
        let m = harness.evaluate(&Genome::new(vec![1, 2, 3]), Duration::from_secs(1));
        assert_eq!(m.status, MeasurementStatus::Completed);
        assert_eq!(m.cost, 6.0);
    }

    #[test]
    fn in_process_harness_catches_panic() {
        let harness = InProcessHarness::new(panicking_target);
        let m = harness.evaluate(&Genome::new(vec![0]), Duration::from_secs(1));
        match &m.status {
            MeasurementStatus::Crashed(msg) => assert!(msg.contains("Boom!")),
            other => panic!("Expected a crash, got {other:?}"),
        }
        assert_eq!(m.cost, CRASH_SENTINEL_COST);

        let ok = harness.evaluate(&Genome::new(vec![1]), Duration::from_secs(1));
        assert_eq!(ok.status, MeasurementStatus::Completed);
    }

    #[test]
    fn in_process_harness_times_out_on_a_target_that_never_returns() {
        let harness = InProcessHarness::new(|_data: &[i64]| -> u64 {
            loop {
                thread::sleep(Duration::from_secs(1));
            }
        });
        let timeout = Duration::from_millis(100);
        let start = Instant::now();
        let m = harness.evaluate(&Genome::new(vec![1, 2]), timeout);
        let waited = start.elapsed();

        assert_eq!(m.status, MeasurementStatus::TimedOut);
        assert_eq!(m.elapsed, timeout);
        assert_eq!(m.cost, 100_000.0);
        assert!(waited >= timeout);
        assert!(waited < Duration::from_millis(600), "waited {waited:?}");
    }

    #[test]
    fn cancellable_targets_stop_after_timing_out() {
        let live = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&live);
        let harness = InProcessHarness::cancellable(move |_: &[i64], stop: &StopToken| {
            counter.fetch_add(1, Ordering::SeqCst);
            let mut spins = 0u64;
            while !stop.is_stopped() {
                spins = spins.wrapping_add(1);
                std::hint::spin_loop();
            }
            counter.fetch_sub(1, Ordering::SeqCst);
            spins
        });

        for _ in 0..20 {
            let m = harness.evaluate(&Genome::new(vec![1]), Duration::from_millis(20));
            assert_eq!(m.status, MeasurementStatus::TimedOut);
        }

        let deadline = Instant::now() + Duration::from_secs(5);
        while harness.abandoned_threads() > 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(harness.abandoned_threads(), 0);
        assert_eq!(live.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn stuck_targets_are_capped() {
        let harness = InProcessHarness::new(|_: &[i64]| -> u64 {
            loop {
                thread::sleep(Duration::from_secs(1));
            }
        })
        .with_max_abandoned(2);

        for _ in 0..2 {
            let m = harness.evaluate(&Genome::new(vec![1]), Duration::from_millis(20));
            assert_eq!(m.status, MeasurementStatus::TimedOut);
        }
        assert_eq!(harness.abandoned_threads(), 2);

        let refused = harness.evaluate(&Genome::new(vec![1]), Duration::from_millis(20));
        match &refused.status {
            MeasurementStatus::HarnessError(msg) => assert!(msg.contains("still running")),
            other => panic!("Expected HarnessError, got {other:?}"),
        }
    }

    #[test]
    fn in_process_harness_flags_work_over_limit() {
        let harness = InProcessHarness::new(sum_target).with_work_limit(10);
        let under = harness.evaluate(&Genome::new(vec![5, 5]), Duration::from_secs(1));
        assert_eq!(under.status, MeasurementStatus::Completed);

        let over = harness.evaluate(&Genome::new(vec![50, 50]), Duration::from_secs(1));
        assert!(matches!(over.status, MeasurementStatus::ResourceExceeded(_)));
        assert_eq!(over.cost, 10.0);
    }

    #[test]
    fn boxed_harness_delegates() {
        let harness: Box<dyn Harness> = Box::new(InProcessHarness::new(sum_target));
        let m = harness.evaluate(&Genome::new(vec![4]), Duration::from_secs(1));
        assert_eq!(m.cost, 4.0);
    }

    #[test]
    fn text_and_byte_encodings() {
        let genome = Genome::new(vec![1, 22, 300]);
        assert_eq!(InputEncoding::Text.encode(&genome), b"1 22 300\n".to_vec());
        assert_eq!(InputEncoding::Bytes.encode(&genome), vec![1, 22, 44]);
        assert_eq!(InputEncoding::Text.encode(&Genome::default()), b"\n".to_vec());
    }
}
