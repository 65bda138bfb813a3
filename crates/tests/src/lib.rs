//! # Integration Tests
//!
//! End-to-end tests over real UDP sockets, using synthetic capture and
//! mock detectors (no camera or detection models required).

#[cfg(test)]
mod contract_tests {
    #[test]
    fn test_contracts_compile() {
        let _ = contracts::ConfigVersion::V1;
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::Arc;
    use std::time::Duration;

    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{DetectorKind, SinkKind, SinkSpec, SourceKind};
    use dispatcher::{Dispatcher, DispatcherBuilder, SinkRegistry, UdpTransport};
    use ingestion::{FrameSource, FrameSourceConfig, MockOpener, SyntheticConfig};
    use landmark_engine::MockDetector;
    use observability::StreamMetricsAggregator;
    use tokio::net::UdpSocket;

    const RECV_TIMEOUT: Duration = Duration::from_secs(5);

    fn source() -> Arc<FrameSource> {
        let opener = Arc::new(MockOpener::new(SyntheticConfig {
            width: 64,
            height: 48,
            fps: 100.0,
            file_frames: 12,
        }));
        Arc::new(FrameSource::new(opener, FrameSourceConfig::default()))
    }

    async fn receiver() -> (UdpSocket, u16) {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = socket.local_addr().unwrap().port();
        (socket, port)
    }

    async fn recv(socket: &UdpSocket) -> Vec<u8> {
        let mut buf = vec![0u8; 65_536];
        let (n, _) = tokio::time::timeout(RECV_TIMEOUT, socket.recv_from(&mut buf))
            .await
            .expect("datagram not received in time")
            .unwrap();
        buf.truncate(n);
        buf
    }

    async fn recv_json(socket: &UdpSocket) -> serde_json::Value {
        serde_json::from_slice(&recv(socket).await).unwrap()
    }

    async fn udp_dispatcher(
        registry: Arc<SinkRegistry>,
        detectors: Vec<MockDetector>,
    ) -> Dispatcher<UdpTransport> {
        let transport = UdpTransport::bind_to("e2e", "127.0.0.1:0").await.unwrap();
        let mut builder = DispatcherBuilder::new(registry, source(), transport);
        for detector in detectors {
            builder = builder.detector(Arc::new(detector));
        }
        builder.build()
    }

    fn sink(kind: SinkKind, port: u16) -> SinkSpec {
        SinkSpec {
            port: Some(port),
            kind,
            ..Default::default()
        }
    }

    /// Config file -> registry -> dispatcher -> UDP receivers
    #[tokio::test]
    async fn test_config_to_udp_stream() {
        let (info_rx, info_port) = receiver().await;
        let (video_rx, video_port) = receiver().await;
        let toml = format!(
            r#"
version = "V1"

[globals]
scale = 1.0
flip_horizontal = false

[globals.source]
kind = "none"

[[sinks]]
kind = "info_dictionary"
port = {info_port}

[[sinks]]
kind = "raw_video"
port = {video_port}
"#
        );
        let config = ConfigLoader::load_from_str(&toml, ConfigFormat::Toml).unwrap();
        let registry = Arc::new(SinkRegistry::from_config(&config));
        let mut d = udp_dispatcher(registry, vec![]).await;

        let report = d.tick().await;
        assert!(report.frame_read);
        assert_eq!(report.sent, 2);

        let info = recv_json(&info_rx).await;
        assert_eq!(info["source_type"], "none");
        assert_eq!(info["image_width"], 320);
        assert_eq!(info["image_height"], 240);
        let streams = info["streams"].as_array().unwrap();
        assert_eq!(streams.len(), 2);
        assert_eq!(streams[1]["type"], "Raw Video");
        assert_eq!(streams[1]["port"], video_port);

        let jpeg = recv(&video_rx).await;
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    }

    /// Default ports fill from 11110, and removal shifts later sinks down
    #[tokio::test]
    async fn test_registry_indices_and_default_ports() {
        let registry = Arc::new(SinkRegistry::new());
        let first = registry.add();
        let second = registry.add();
        assert_eq!((first.index, first.port), (0, 11110));
        assert_eq!((second.index, second.port), (1, 11111));

        registry.remove(0).unwrap();
        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.sinks[0].index, 0);
        assert_eq!(snapshot.sinks[0].port, 11111);
        // The freed port is handed out again
        assert_eq!(registry.add().port, 11110);
    }

    /// A hand sink requiring two hands replays the last two-hand payload
    #[tokio::test]
    async fn test_hands_min_entities_replays_over_udp() {
        let (hands_rx, hands_port) = receiver().await;
        let registry = Arc::new(SinkRegistry::new());
        let mut hands = sink(SinkKind::HandLandmarks, hands_port);
        hands.settings.min_entities = 2;
        registry.insert(hands);
        let mut d = udp_dispatcher(
            registry,
            vec![MockDetector::inline(DetectorKind::Hands, vec![2, 1])],
        )
        .await;

        let first = d.tick().await;
        assert_eq!((first.sent, first.replayed), (1, 0));
        let second = d.tick().await;
        assert_eq!((second.sent, second.replayed), (0, 1));

        let fresh = recv(&hands_rx).await;
        let replayed = recv(&hands_rx).await;
        assert_eq!(fresh, replayed);

        let json: serde_json::Value = serde_json::from_slice(&fresh).unwrap();
        let object = json.as_object().unwrap();
        assert_eq!(object.len(), 2);
        assert_eq!(json["Left"].as_array().unwrap().len(), 21);
        assert!(json["Right"][0]["z"].as_f64().unwrap().is_finite());
    }

    /// Removing a sink invalidates payloads cached under old indices
    #[tokio::test]
    async fn test_removal_invalidates_cache() {
        let (info_rx, info_port) = receiver().await;
        let (hands_rx, hands_port) = receiver().await;
        let registry = Arc::new(SinkRegistry::new());
        registry.insert(sink(SinkKind::InfoDictionary, info_port));
        let mut hands = sink(SinkKind::HandLandmarks, hands_port);
        hands.settings.min_entities = 2;
        registry.insert(hands);
        let mut d = udp_dispatcher(
            registry.clone(),
            vec![MockDetector::inline(DetectorKind::Hands, vec![2, 1, 1])],
        )
        .await;

        let mut aggregator = StreamMetricsAggregator::new();
        aggregator.update(&d.tick().await);
        recv(&info_rx).await;
        recv(&hands_rx).await;

        registry.remove(0).unwrap();
        let report = d.tick().await;
        aggregator.update(&report);
        assert!(report.invalidated);
        assert_eq!(report.sent, 0);
        assert_eq!(report.replayed, 0);
        assert_eq!(report.idle, 1);

        let summary = aggregator.summary();
        assert_eq!(summary.reindexes, 1);
        assert_eq!(summary.total_sent, 2);
    }

    /// File sources report playback position in the info payload
    #[tokio::test]
    async fn test_file_source_info_reports_playback() {
        let (info_rx, info_port) = receiver().await;
        let registry = Arc::new(SinkRegistry::new());
        registry.update_globals(|g| {
            g.source = SourceKind::File {
                path: "clip.mjpeg".into(),
            }
        });
        registry.insert(sink(SinkKind::InfoDictionary, info_port));
        let mut d = udp_dispatcher(registry, vec![]).await;

        let mut delivered = false;
        for _ in 0..200 {
            if d.tick().await.frame_read {
                delivered = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(delivered, "file source never produced a frame");

        let info = recv_json(&info_rx).await;
        assert_eq!(info["source_type"], "video");
        assert_eq!(info["source_file"], "clip.mjpeg");
        assert_eq!(info["num_frames"], 12);
        assert!(info["curr_frame"].as_u64().unwrap() < 12);
        assert_eq!(info["native_width"], 64);
        d.source().stop();
    }

    /// `run` drives ticks until the limit and stops detectors
    #[tokio::test]
    async fn test_run_with_threaded_detector() {
        let (body_rx, body_port) = receiver().await;
        let registry = Arc::new(SinkRegistry::new());
        registry.insert(sink(SinkKind::BodyLandmarks, body_port));

        let transport = UdpTransport::bind_to("e2e", "127.0.0.1:0").await.unwrap();
        let detector = MockDetector::threaded(DetectorKind::Body, vec![1]).unwrap();
        let mut d = DispatcherBuilder::new(registry, source(), transport)
            .detector(Arc::new(detector))
            .config(dispatcher::DispatcherConfig {
                tick_interval: Duration::from_millis(5),
                max_ticks: Some(40),
                ..Default::default()
            })
            .build();
        let mut delivered = 0u64;
        d = d
            .run(|r| delivered += r.delivered() as u64, std::future::pending())
            .await;
        assert_eq!(d.ticks(), 40);
        assert!(delivered > 0);

        let json = recv_json(&body_rx).await;
        assert_eq!(json["Body0"].as_array().unwrap().len(), 33);
    }
}
