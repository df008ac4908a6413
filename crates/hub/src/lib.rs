//! # Hub
//!
//! 转发核心：监听端点、外呼端点、分发引擎、事件循环与连接统计。
//!
//! ## 数据流
//!
//! ```text
//! mio::Poll ──> Endpoint::service_readable ──> Chunk
//!                                               │
//!               ┌───────────────────────────────┤
//!               ▼                               ▼
//!   distribute_round (所有端点, 排除发送方)   SinkHandle::write ──> StatsAggregator
//! ```
//!
//! 外呼端点的连接在 tokio 任务中建立，通过 channel 交给事件循环，
//! 在每个 tick 开始时被接管。

pub mod connection;
pub mod dialer;
pub mod distribution;
pub mod endpoint;
pub mod event_loop;
pub mod listener;
pub mod reporter;
pub mod stats;
pub mod token;

pub use connection::{CloseReason, Connection, RecvOutcome};
pub use dialer::{DialState, DialingEndpoint};
pub use distribution::{distribute_round, Delivery, Distribution};
pub use endpoint::{Chunk, Endpoint, EndpointStatus, Serviced};
pub use event_loop::{Hub, HubReport, ShutdownHandle};
pub use listener::ListeningEndpoint;
pub use reporter::StatusReporter;
pub use stats::{RenderThrottle, StatsAggregator, StatsRow};
pub use token::TokenSource;
