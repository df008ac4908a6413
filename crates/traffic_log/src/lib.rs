//! # Traffic Log
//!
//! 流量持久化模块。
//!
//! 负责：
//! - 将每个收到的数据块写入唯一的活动 sink
//! - raw / framed / hexdump 三种内置格式
//! - 按名称解析的插件 sink
//! - 隔离 sink 故障，不阻塞转发主链路

pub mod factory;
pub mod frame;
pub mod handle;
pub mod hexdump;
pub mod metrics;
pub mod plugin;
pub mod sinks;

pub use contracts::TrafficSink;
pub use factory::create_sink;
pub use frame::{decode_frame, encode_frame, Frame, FrameReader};
pub use handle::SinkHandle;
pub use metrics::{MetricsSnapshot, SinkMetrics};
pub use plugin::{PluginConstructor, PluginContext, PluginRegistry};
pub use sinks::{CountSink, FramedSink, HexdumpSink, NullSink, RawSink, TraceSink};
