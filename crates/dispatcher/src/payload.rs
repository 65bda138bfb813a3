//! Datagram payload builders

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use contracts::{ConfigSnapshot, Frame, Landmarks, SinkConfig, SourceInfo};

use crate::error::DispatcherError;

/// One entry of the info payload stream list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEntry {
    #[serde(rename = "type")]
    pub kind: String,
    pub address: String,
    pub port: u16,
}

/// Info dictionary payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfoPayload {
    pub image_width: u32,
    pub image_height: u32,
    pub native_width: u32,
    pub native_height: u32,
    pub source_type: String,
    pub source_file: String,

    /// File sources only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_frames: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub curr_frame: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_fps: Option<f64>,

    /// Every configured sink, in index order
    pub streams: Vec<StreamEntry>,
}

impl InfoPayload {
    /// Describe the frame being dispatched, its source and the sink list
    pub fn new(info: &SourceInfo, frame: &Frame, snapshot: &ConfigSnapshot) -> Self {
        let file = info.kind.is_file();
        Self {
            image_width: frame.width,
            image_height: frame.height,
            native_width: info.native_width,
            native_height: info.native_height,
            source_type: info.kind.source_type().to_string(),
            source_file: info.kind.source_file(),
            num_frames: file.then_some(info.frame_count),
            curr_frame: file.then_some(info.position),
            source_fps: file.then_some(info.source_fps),
            streams: snapshot
                .sinks
                .iter()
                .map(|s| StreamEntry {
                    kind: s.kind.label().to_string(),
                    address: s.address.clone(),
                    port: s.port,
                })
                .collect(),
        }
    }
}

/// JSON-encode `value` for `sink`
///
/// # Errors
/// `Payload` if serialization fails.
pub fn encode_json<T: Serialize + ?Sized>(
    sink: &SinkConfig,
    value: &T,
) -> Result<Bytes, DispatcherError> {
    serde_json::to_vec(value)
        .map(Bytes::from)
        .map_err(|e| DispatcherError::payload(sink.name(), e.to_string()))
}

/// Landmark payload: `{"<Entity>": [{"x":..,"y":..,"z":..}, ...]}`
///
/// # Errors
/// `Payload` if serialization fails.
pub fn landmarks_payload(sink: &SinkConfig, landmarks: &Landmarks) -> Result<Bytes, DispatcherError> {
    encode_json(sink, landmarks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{Point3, SinkKind, SourceKind};
    use std::path::PathBuf;

    fn sink(index: usize, port: u16, kind: SinkKind) -> SinkConfig {
        SinkConfig {
            index,
            address: "127.0.0.1".to_string(),
            port,
            kind,
            settings: Default::default(),
        }
    }

    fn snapshot() -> ConfigSnapshot {
        ConfigSnapshot {
            sinks: vec![
                sink(0, 11110, SinkKind::InfoDictionary),
                sink(1, 11111, SinkKind::HandLandmarks),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_info_for_device_omits_file_fields() {
        let info = SourceInfo {
            kind: SourceKind::Device { id: 0 },
            native_width: 640,
            native_height: 480,
            width: 320,
            height: 240,
            scale: 0.5,
            ..Default::default()
        };
        let frame = Frame::blank(320, 240).unwrap();
        let payload = InfoPayload::new(&info, &frame, &snapshot());
        let json: serde_json::Value =
            serde_json::from_slice(&encode_json(&sink(0, 11110, SinkKind::InfoDictionary), &payload).unwrap())
                .unwrap();

        assert_eq!(json["image_width"], 320);
        assert_eq!(json["native_width"], 640);
        assert_eq!(json["source_type"], "webcam");
        assert_eq!(json["source_file"], "0");
        assert!(json.get("num_frames").is_none());
        assert_eq!(json["streams"][1]["type"], "Hand Landmarks");
        assert_eq!(json["streams"][1]["port"], 11111);
    }

    #[test]
    fn test_info_for_file_reports_playback() {
        let info = SourceInfo {
            kind: SourceKind::File {
                path: PathBuf::from("clip.mjpeg"),
            },
            native_width: 32,
            native_height: 24,
            frame_count: 48,
            position: 7,
            source_fps: 24.0,
            ..Default::default()
        };
        let frame = Frame::blank(32, 24).unwrap();
        let payload = InfoPayload::new(&info, &frame, &snapshot());
        assert_eq!(payload.source_type, "video");
        assert_eq!(payload.num_frames, Some(48));
        assert_eq!(payload.curr_frame, Some(7));
        assert_eq!(payload.source_fps, Some(24.0));
    }

    #[test]
    fn test_landmarks_payload_format() {
        let mut landmarks = Landmarks::new();
        landmarks.insert("Right".to_string(), vec![Point3::new(0.5, -1.0, 2.0)]);
        let bytes = landmarks_payload(&sink(0, 1, SinkKind::HandLandmarks), &landmarks).unwrap();
        assert_eq!(&bytes[..], br#"{"Right":[{"x":0.5,"y":-1.0,"z":2.0}]}"#);
    }
}
