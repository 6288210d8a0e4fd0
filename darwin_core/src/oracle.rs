use crate::genome::Genome;
use crate::harness::{Measurement, MeasurementStatus};
use serde::Serialize;

/// Default severity level for crashes detected by `CrashOracle`.
/// Higher values might indicate more severe issues.
const DEFAULT_CRASH_SEVERITY: u8 = 10;

/// A crash discovered during the search, reported alongside the ranking.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct CrashFinding {
    /// The genome that triggered the crash.
    pub genome: Genome,
    /// The crash description reported by the harness.
    pub description: String,
    /// MD5 of the genome, used to deduplicate findings.
    pub input_hash: String,
    pub severity: u8,
    /// Generation in which the genome was first seen crashing.
    pub generation: usize,
}

/// An `Oracle` decides whether a measurement is a finding worth reporting
/// outside of the normal fitness ranking.
pub trait Oracle: Send + Sync {
    /// Looks at one evaluated genome.
    ///
    /// # Arguments
    /// * `genome`: The genome that was run.
    /// * `measurement`: What the harness reported for it.
    /// * `generation`: Index of the generation being examined, stored in the
    ///   finding.
    ///
    /// # Returns
    /// `Some(CrashFinding)` if the run is worth reporting, otherwise `None`.
    /// The engine deduplicates findings by `input_hash`.
    fn examine(
        &self,
        genome: &Genome,
        measurement: &Measurement,
        generation: usize,
    ) -> Option<CrashFinding>;
}

/// Reports every `Crashed` measurement as a finding.
#[derive(Debug, Default)]
pub struct CrashOracle;

impl CrashOracle {
    pub fn new() -> Self {
        CrashOracle
    }
}

impl Oracle for CrashOracle {
    fn examine(
        &self,
        genome: &Genome,
        measurement: &Measurement,
        generation: usize,
    ) -> Option<CrashFinding> {
        match &measurement.status {
            MeasurementStatus::Crashed(description) => Some(CrashFinding {
                genome: genome.clone(),
                description: description.clone(),
                input_hash: genome_digest(genome),
                severity: DEFAULT_CRASH_SEVERITY,
                generation,
            }),
            _ => None,
        }
    }
}

/// Hex MD5 of the genome's elements in little-endian order.
pub fn genome_digest(genome: &Genome) -> String {
    let bytes: Vec<u8> = genome
        .elements()
        .iter()
        .flat_map(|v| v.to_le_bytes())
        .collect();
    format!("{:x}", md5::compute(bytes))
}
