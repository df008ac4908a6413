//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 真实 loopback socket 上的转发场景
//! - 准入控制、回显抑制、扇出、重连
//! - 流量日志落盘与回读

#[cfg(test)]
mod support {
    use std::net::SocketAddr;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use contracts::{EngineConfig, HubError, ReconnectConfig};
    use hub::{Chunk, Hub, HubReport, ShutdownHandle, StatsRow, StatusReporter};
    use tokio::runtime::Handle;
    use tokio::task::JoinHandle;
    use traffic_log::{NullSink, SinkHandle};

    pub const WAIT: Duration = Duration::from_secs(5);

    /// What the hub reported while running
    #[derive(Default)]
    pub struct Captured {
        pub chunks: Vec<Vec<u8>>,
        pub rows: Vec<StatsRow>,
    }

    pub struct CaptureReporter(pub Arc<Mutex<Captured>>);

    impl StatusReporter for CaptureReporter {
        fn on_chunk(&mut self, chunk: &Chunk) {
            self.0.lock().unwrap().chunks.push(chunk.data.to_vec());
        }

        fn on_stats(&mut self, rows: &[StatsRow]) {
            self.0.lock().unwrap().rows = rows.to_vec();
        }
    }

    pub fn engine() -> EngineConfig {
        EngineConfig {
            tick_ms: 5,
            poll_timeout_ms: 20,
            ..EngineConfig::default()
        }
    }

    pub fn reconnect() -> ReconnectConfig {
        ReconnectConfig {
            initial_timeout_ms: 200,
            max_timeout_ms: 1000,
            retry_delay_ms: 20,
        }
    }

    pub fn new_hub(sink: Option<SinkHandle>) -> Hub {
        let sink = sink.unwrap_or_else(|| SinkHandle::new(NullSink::new()));
        Hub::new(engine(), reconnect(), sink, Handle::current()).unwrap()
    }

    /// A hub running on a blocking thread
    pub struct RunningHub {
        pub addrs: Vec<SocketAddr>,
        pub captured: Arc<Mutex<Captured>>,
        shutdown: ShutdownHandle,
        runner: JoinHandle<Result<HubReport, HubError>>,
    }

    impl RunningHub {
        pub fn start(mut hub: Hub) -> Self {
            let captured = Arc::new(Mutex::new(Captured::default()));
            hub.set_status_interval(Duration::ZERO);
            hub.set_reporter(Box::new(CaptureReporter(Arc::clone(&captured))));

            let addrs = hub.listener_addrs();
            let shutdown = hub.shutdown_handle();
            let runner = tokio::task::spawn_blocking(move || hub.run());
            Self {
                addrs,
                captured,
                shutdown,
                runner,
            }
        }

        /// Wait until the latest stats snapshot satisfies `pred`
        pub async fn wait_rows(&self, pred: impl Fn(&[StatsRow]) -> bool) {
            let deadline = tokio::time::Instant::now() + WAIT;
            while tokio::time::Instant::now() < deadline {
                if pred(&self.captured.lock().unwrap().rows) {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            panic!("stats condition not reached");
        }

        pub async fn wait_connections(&self, n: usize) {
            self.wait_rows(|rows| rows.len() == n).await;
        }

        pub async fn stop(self) -> HubReport {
            self.shutdown.trigger();
            self.runner.await.unwrap().unwrap()
        }
    }

    pub fn row_for(rows: &[StatsRow], addr: SocketAddr) -> Option<&StatsRow> {
        rows.iter()
            .find(|r| r.peer.port == addr.port() && r.peer.host == addr.ip().to_string())
    }
}

#[cfg(test)]
mod relay_tests {
    use std::time::Duration;

    use contracts::{DialSpec, ListenSpec};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::time::timeout;

    use crate::support::{new_hub, row_for, RunningHub, WAIT};

    /// One listener (max 2) relaying to one dialed upstream.
    ///
    /// 验证：
    /// 1. 客户端 A 的 `hello` 被转发到外呼连接
    /// 2. 统计显示 A rx=5，外呼连接 tx=5
    /// 3. 达到上限后第三个客户端被拒绝，断开一个后重新接受
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_scenario_listener_to_dialer() {
        let upstream = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let upstream_port = upstream.local_addr().unwrap().port();

        let mut hub = new_hub(None);
        hub.add_listener(ListenSpec::new("127.0.0.1", 0).with_max_connections(2))
            .unwrap();
        hub.add_dialer(DialSpec::new("127.0.0.1", upstream_port));
        let running = RunningHub::start(hub);
        let addr = running.addrs[0];

        let (mut remote, _) = timeout(WAIT, upstream.accept()).await.unwrap().unwrap();
        let mut a = TcpStream::connect(addr).await.unwrap();
        let a_addr = a.local_addr().unwrap();
        running.wait_connections(2).await;

        a.write_all(b"hello").await.unwrap();
        let mut buf = [0u8; 5];
        timeout(WAIT, remote.read_exact(&mut buf)).await.unwrap().unwrap();
        assert_eq!(&buf, b"hello");

        running
            .wait_rows(|rows| {
                let a_row = row_for(rows, a_addr);
                let dial_row = rows.iter().find(|r| r.peer.port == upstream_port);
                matches!((a_row, dial_row), (Some(a), Some(d)) if a.rx_bytes == 5 && d.tx_bytes == 5)
            })
            .await;
        assert_eq!(running.captured.lock().unwrap().chunks, vec![b"hello".to_vec()]);

        let b = TcpStream::connect(addr).await.unwrap();
        running.wait_connections(3).await;

        // Cap reached: the listen socket is closed
        assert!(TcpStream::connect(addr).await.is_err());

        drop(b);
        running.wait_connections(2).await;
        let c = timeout(WAIT, TcpStream::connect(addr)).await.unwrap();
        assert!(c.is_ok());
        running.wait_connections(3).await;

        let report = running.stop().await;
        assert_eq!(report.traffic.chunks, 1);
        assert_eq!(report.traffic.bytes_received, 5);
        assert_eq!(report.traffic.accepted, 3);
        assert_eq!(report.traffic.dialed, 1);
    }

    /// Data from one connection reaches every other connection of every endpoint
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_fan_out_with_echo_suppression() {
        let mut hub = new_hub(None);
        hub.add_listener(ListenSpec::new("127.0.0.1", 0)).unwrap();
        hub.add_listener(ListenSpec::new("127.0.0.1", 0)).unwrap();
        let running = RunningHub::start(hub);
        let (first, second) = (running.addrs[0], running.addrs[1]);

        let mut a1 = TcpStream::connect(first).await.unwrap();
        let mut a2 = TcpStream::connect(first).await.unwrap();
        let mut b1 = TcpStream::connect(second).await.unwrap();
        running.wait_connections(3).await;

        a1.write_all(b"fan-out").await.unwrap();

        for peer in [&mut a2, &mut b1] {
            let mut buf = [0u8; 7];
            timeout(WAIT, peer.read_exact(&mut buf)).await.unwrap().unwrap();
            assert_eq!(&buf, b"fan-out");
        }

        let mut echo = [0u8; 7];
        assert!(
            timeout(Duration::from_millis(200), a1.read(&mut echo))
                .await
                .is_err(),
            "sender received its own bytes"
        );

        let report = running.stop().await;
        assert_eq!(report.traffic.bytes_sent, 14);
    }

    /// A dropped upstream connection is re-established
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_reconnect_liveness() {
        let upstream = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = upstream.local_addr().unwrap().port();

        let mut hub = new_hub(None);
        hub.add_dialer(DialSpec::new("127.0.0.1", port));
        let running = RunningHub::start(hub);

        let (first, _) = timeout(WAIT, upstream.accept()).await.unwrap().unwrap();
        running.wait_connections(1).await;
        let first_id = running.captured.lock().unwrap().rows[0].id;
        drop(first);

        let (_second, _) = timeout(WAIT, upstream.accept()).await.unwrap().unwrap();
        running
            .wait_rows(|rows| rows.len() == 1 && rows[0].id != first_id)
            .await;

        let report = running.stop().await;
        assert_eq!(report.traffic.dialed, 2);
        assert_eq!(report.traffic.disconnected, 1);
    }

    /// Two dialers to the same upstream relay to each other
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_dialer_to_dialer() {
        let upstream = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = upstream.local_addr().unwrap().port();

        let mut hub = new_hub(None);
        hub.add_dialer(DialSpec::new("127.0.0.1", port));
        hub.add_dialer(DialSpec::new("127.0.0.1", port));
        let running = RunningHub::start(hub);

        let (mut x, _) = timeout(WAIT, upstream.accept()).await.unwrap().unwrap();
        let (mut y, _) = timeout(WAIT, upstream.accept()).await.unwrap().unwrap();
        running.wait_connections(2).await;

        x.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        timeout(WAIT, y.read_exact(&mut buf)).await.unwrap().unwrap();
        assert_eq!(&buf, b"ping");

        running.stop().await;
    }
}

#[cfg(test)]
mod traffic_log_tests {
    use std::fs::File;

    use contracts::{ListenSpec, LogFormat, LoggingConfig};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio::time::timeout;
    use traffic_log::{create_sink, FrameReader, PluginRegistry};

    use crate::support::{new_hub, RunningHub, WAIT};

    fn logging(format: LogFormat, path: std::path::PathBuf) -> LoggingConfig {
        LoggingConfig {
            enabled: true,
            format,
            path: Some(path),
        }
    }

    /// Relayed chunks land in the framed log with their sender's identity
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_framed_log_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("traffic.frames");
        let sink = create_sink(
            &logging(LogFormat::Framed, path.clone()),
            &PluginRegistry::with_builtins(),
        )
        .unwrap();

        let mut hub = new_hub(Some(sink));
        hub.add_listener(ListenSpec::new("127.0.0.1", 0)).unwrap();
        let running = RunningHub::start(hub);
        let addr = running.addrs[0];

        let mut a = TcpStream::connect(addr).await.unwrap();
        let mut b = TcpStream::connect(addr).await.unwrap();
        running.wait_connections(2).await;

        a.write_all(b"abc").await.unwrap();
        let mut buf = [0u8; 3];
        timeout(WAIT, b.read_exact(&mut buf)).await.unwrap().unwrap();

        b.write_all(b"defg").await.unwrap();
        let mut buf = [0u8; 4];
        timeout(WAIT, a.read_exact(&mut buf)).await.unwrap().unwrap();

        let a_port = a.local_addr().unwrap().port();
        let b_port = b.local_addr().unwrap().port();
        let report = running.stop().await;
        assert_eq!(report.sink.write_count, 2);

        let frames: Vec<_> = FrameReader::new(File::open(&path).unwrap())
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].peer.host, "127.0.0.1");
        assert_eq!(frames[0].peer.port, a_port);
        assert_eq!(&frames[0].payload[..], b"abc");
        assert_eq!(frames[1].peer.port, b_port);
        assert_eq!(&frames[1].payload[..], b"defg");
    }

    /// The `count` plugin is resolved by name and receives every chunk
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_count_plugin_through_hub() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("counts.txt");
        let sink = create_sink(
            &logging(LogFormat::Plugin("count".into()), path.clone()),
            &PluginRegistry::with_builtins(),
        )
        .unwrap();

        let mut hub = new_hub(Some(sink));
        hub.add_listener(ListenSpec::new("127.0.0.1", 0)).unwrap();
        let running = RunningHub::start(hub);
        let addr = running.addrs[0];

        let mut a = TcpStream::connect(addr).await.unwrap();
        let mut b = TcpStream::connect(addr).await.unwrap();
        running.wait_connections(2).await;

        a.write_all(b"hello").await.unwrap();
        let mut buf = [0u8; 5];
        timeout(WAIT, b.read_exact(&mut buf)).await.unwrap().unwrap();

        let report = running.stop().await;
        assert_eq!(report.sink_name, "count");

        let text = std::fs::read_to_string(&path).unwrap();
        let line = text.lines().next().unwrap();
        assert!(line.ends_with(" 5"), "got: {line}");
    }

    #[test]
    fn test_unknown_plugin_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let result = create_sink(
            &logging(LogFormat::Plugin("nope".into()), dir.path().join("x")),
            &PluginRegistry::with_builtins(),
        );
        assert!(matches!(
            result,
            Err(contracts::HubError::PluginNotFound { .. })
        ));
    }
}

#[cfg(test)]
mod config_tests {
    use config_loader::{ConfigFormat, ConfigLoader};
    use hub::{EndpointStatus, Hub};
    use tokio::runtime::Handle;
    use traffic_log::{NullSink, SinkHandle};

    /// A TOML file drives endpoint creation end to end
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_hub_from_toml() {
        let config = ConfigLoader::load_from_str(
            r#"
[[listen]]
host = "127.0.0.1"
port = 0
max_connections = 3

[[remote]]
host = "127.0.0.1"
port = 1
auto_reconnect = false

[engine]
tick_ms = 5
"#,
            ConfigFormat::Toml,
        )
        .unwrap();

        let hub = Hub::from_config(&config, SinkHandle::new(NullSink::new()), Handle::current())
            .unwrap();
        let status = hub.endpoint_status();
        assert_eq!(status.len(), 2);
        assert!(matches!(
            status[0],
            EndpointStatus::Listening {
                armed: true,
                connections: 0,
                max_connections: 3,
                ..
            }
        ));
        assert!(matches!(status[1], EndpointStatus::Dialing { connections: 0, .. }));

        hub.shutdown();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_bind_conflict_fails_startup() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = taken.local_addr().unwrap().port();
        let toml = format!("[[listen]]\nhost = \"127.0.0.1\"\nport = {port}\n");
        let config = ConfigLoader::load_from_str(&toml, ConfigFormat::Toml).unwrap();

        let result = Hub::from_config(&config, SinkHandle::new(NullSink::new()), Handle::current());
        assert!(matches!(result, Err(contracts::HubError::Bind { .. })));
    }
}
