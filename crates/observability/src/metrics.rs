//! Hub 流量指标收集模块
//!
//! 通过 `metrics` facade 记录计数器，并在内存中聚合摘要。

use contracts::ConnectionKind;
use metrics::{counter, gauge, histogram};

/// 记录一次收到的数据块
pub fn record_chunk_received(bytes: usize) {
    counter!("sockethub_chunks_total").increment(1);
    counter!("sockethub_bytes_received_total").increment(bytes as u64);
    histogram!("sockethub_chunk_size_bytes").record(bytes as f64);
}

/// 记录转发给某个连接的字节数
pub fn record_bytes_sent(bytes: usize) {
    counter!("sockethub_bytes_sent_total").increment(bytes as u64);
}

/// 记录连接建立
pub fn record_connection_opened(kind: ConnectionKind) {
    counter!(
        "sockethub_connections_opened_total",
        "kind" => kind.as_str()
    )
    .increment(1);
    gauge!("sockethub_connections_live", "kind" => kind.as_str()).increment(1.0);
}

/// 记录连接关闭
pub fn record_connection_closed(kind: ConnectionKind) {
    counter!(
        "sockethub_connections_closed_total",
        "kind" => kind.as_str()
    )
    .increment(1);
    gauge!("sockethub_connections_live", "kind" => kind.as_str()).decrement(1.0);
}

/// 记录监听端点达到连接上限
pub fn record_admission_closed(port: u16) {
    counter!(
        "sockethub_admission_closed_total",
        "port" => port.to_string()
    )
    .increment(1);
}

/// 记录流量日志写入
pub fn record_sink_write(sink_name: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "sockethub_sink_writes_total",
        "sink" => sink_name.to_string(),
        "status" => status
    )
    .increment(1);
}

/// 流量指标聚合器
///
/// 在内存中聚合指标，便于关闭时输出摘要。
#[derive(Debug, Clone, Default)]
pub struct TrafficMetricsAggregator {
    /// 收到的数据块总数
    pub chunks: u64,

    /// 收到的字节总数
    pub bytes_received: u64,

    /// 转发出去的字节总数
    pub bytes_sent: u64,

    /// 接受的入站连接数
    pub accepted: u64,

    /// 建立的外呼连接数
    pub dialed: u64,

    /// 断开的连接数
    pub disconnected: u64,

    /// 数据块大小统计
    pub chunk_stats: RunningStats,

    /// 每个数据块的扇出数量统计
    pub fanout_stats: RunningStats,
}

impl TrafficMetricsAggregator {
    /// 创建新的聚合器
    pub fn new() -> Self {
        Self::default()
    }

    /// 一次读取 + 分发
    pub fn record_round(&mut self, received: usize, deliveries: usize, sent: usize) {
        self.chunks += 1;
        self.bytes_received += received as u64;
        self.bytes_sent += sent as u64;
        self.chunk_stats.push(received as f64);
        self.fanout_stats.push(deliveries as f64);
    }

    pub fn record_opened(&mut self, kind: ConnectionKind) {
        match kind {
            ConnectionKind::Accepted => self.accepted += 1,
            ConnectionKind::Dialed => self.dialed += 1,
        }
    }

    pub fn record_closed(&mut self) {
        self.disconnected += 1;
    }

    /// 生成摘要报告
    pub fn summary(&self) -> TrafficSummary {
        TrafficSummary {
            chunks: self.chunks,
            bytes_received: self.bytes_received,
            bytes_sent: self.bytes_sent,
            accepted: self.accepted,
            dialed: self.dialed,
            disconnected: self.disconnected,
            chunk_size: StatsSummary::from(&self.chunk_stats),
            fanout: StatsSummary::from(&self.fanout_stats),
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 指标摘要
#[derive(Debug, Clone, Default)]
pub struct TrafficSummary {
    pub chunks: u64,
    pub bytes_received: u64,
    pub bytes_sent: u64,
    pub accepted: u64,
    pub dialed: u64,
    pub disconnected: u64,
    pub chunk_size: StatsSummary,
    pub fanout: StatsSummary,
}

impl std::fmt::Display for TrafficSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Traffic Summary ===")?;
        writeln!(f, "Chunks relayed: {}", self.chunks)?;
        writeln!(f, "Bytes received: {}", self.bytes_received)?;
        writeln!(f, "Bytes sent: {}", self.bytes_sent)?;
        writeln!(
            f,
            "Connections: {} accepted, {} dialed, {} disconnected",
            self.accepted, self.dialed, self.disconnected
        )?;
        writeln!(f, "Chunk size (bytes): {}", self.chunk_size)?;
        writeln!(f, "Fan-out per chunk: {}", self.fanout)?;
        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.1}, max={:.1}, mean={:.1}, std={:.1} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    /// 样本数量
    pub fn count(&self) -> u64 {
        self.count
    }

    /// 均值
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    /// 标准差
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// 最小值
    pub fn min(&self) -> f64 {
        self.min
    }

    /// 最大值
    pub fn max(&self) -> f64 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();

        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            stats.push(v);
        }

        assert_eq!(stats.count(), 5);
        assert!((stats.mean() - 3.0).abs() < 1e-10);
        assert!((stats.min() - 1.0).abs() < 1e-10);
        assert!((stats.max() - 5.0).abs() < 1e-10);
        assert!((stats.variance() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_aggregator_rounds() {
        let mut aggregator = TrafficMetricsAggregator::new();

        aggregator.record_opened(ConnectionKind::Accepted);
        aggregator.record_opened(ConnectionKind::Dialed);
        aggregator.record_round(5, 1, 5);
        aggregator.record_round(100, 2, 200);
        aggregator.record_closed();

        let summary = aggregator.summary();
        assert_eq!(summary.chunks, 2);
        assert_eq!(summary.bytes_received, 105);
        assert_eq!(summary.bytes_sent, 205);
        assert_eq!(summary.accepted, 1);
        assert_eq!(summary.dialed, 1);
        assert_eq!(summary.disconnected, 1);
        assert!((summary.fanout.mean - 1.5).abs() < 1e-10);
    }

    #[test]
    fn test_summary_display() {
        let mut aggregator = TrafficMetricsAggregator::new();
        aggregator.record_round(10, 3, 30);

        let output = format!("{}", aggregator.summary());
        assert!(output.contains("Chunks relayed: 1"));
        assert!(output.contains("Bytes sent: 30"));

        aggregator.reset();
        assert!(format!("{}", aggregator.summary()).contains("Chunk size (bytes): N/A"));
    }
}
