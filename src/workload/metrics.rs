use serde::Serialize;

use super::OperationKind;

/// Running per-profile aggregate.
///
/// Totals always equal successes plus failures; averages are kept current on
/// every update so a snapshot never needs post-processing.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileMetrics {
    pub total_writes: u64,
    pub successful_writes: u64,
    pub failed_writes: u64,
    pub total_reads: u64,
    pub successful_reads: u64,
    pub failed_reads: u64,
    pub max_write_latency: u64,
    pub max_read_latency: u64,
    pub avg_write_latency: u64,
    pub avg_read_latency: u64,
    pub write_latencies: Vec<u64>,
    pub read_latencies: Vec<u64>,

    #[serde(skip)]
    write_latency_sum: u128,
    #[serde(skip)]
    read_latency_sum: u128,
}

impl ProfileMetrics {
    pub fn record(
        &mut self,
        kind: OperationKind,
        success: bool,
        latency_ms: u64,
    ) {
        match kind {
            OperationKind::Write => {
                self.total_writes += 1;
                if success {
                    self.successful_writes += 1;
                } else {
                    self.failed_writes += 1;
                }
                self.max_write_latency = self.max_write_latency.max(latency_ms);
                self.write_latencies.push(latency_ms);
                self.write_latency_sum += u128::from(latency_ms);
                self.avg_write_latency = rounded_mean(self.write_latency_sum, self.write_latencies.len());
            }
            OperationKind::Read => {
                self.total_reads += 1;
                if success {
                    self.successful_reads += 1;
                } else {
                    self.failed_reads += 1;
                }
                self.max_read_latency = self.max_read_latency.max(latency_ms);
                self.read_latencies.push(latency_ms);
                self.read_latency_sum += u128::from(latency_ms);
                self.avg_read_latency = rounded_mean(self.read_latency_sum, self.read_latencies.len());
            }
        }
    }

    pub fn total_failures(&self) -> u64 {
        self.failed_writes + self.failed_reads
    }

    pub fn total_successes(&self) -> u64 {
        self.successful_writes + self.successful_reads
    }
}

fn rounded_mean(
    sum: u128,
    count: usize,
) -> u64 {
    if count == 0 {
        return 0;
    }
    let count = count as u128;
    u64::try_from((sum + count / 2) / count).unwrap_or(u64::MAX)
}
