//! Startup configuration.
//!
//! The host hands the daemon a single JSON object on the command line.
//! Every recognized key has a documented default; a missing (or
//! wrong-typed) key is announced on the host channel as a `status`
//! diagnostic and never fatal. Model and gallery locations come from
//! `MIRRORFACE_*` environment variables.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use mirrorface_core::events::{Event, EventSink};
use mirrorface_core::matcher::DEFAULT_MATCH_THRESHOLD;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("config must be a JSON object")]
    NotAnObject,
}

/// Resolved runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Match distance ceiling.
    pub threshold: f32,
    /// Grace period before a departed user is logged out.
    pub logout_delay: Duration,
    /// Frame loop pacing.
    pub interval: Duration,
    /// Select the USB camera (/dev/video1) over the built-in (/dev/video0).
    pub use_usb_cam: bool,
    /// Embedding model file name inside the model directory.
    pub training_file: String,
    /// Remaining keys belong to collaborators outside this engine (UI
    /// classes, motion detection); parsed and surfaced, not interpreted.
    pub users: Vec<String>,
    pub default_class: String,
    pub everyone_class: String,
    pub welcome_message: bool,
    pub motion_stop_delay: Duration,
    pub motion_detection_threshold: f64,
    /// Directory holding the detector and embedding models.
    pub model_dir: PathBuf,
    /// Root of the enrolled-image layout.
    pub gallery_dir: PathBuf,
}

impl Settings {
    /// Parse the host's JSON blob, reporting every fallback on the sink.
    pub fn from_json(blob: &str, sink: &Arc<dyn EventSink>) -> Result<Self, ConfigError> {
        let value: Value = serde_json::from_str(blob)?;
        let Value::Object(data) = value else {
            return Err(ConfigError::NotAnObject);
        };
        let lookup = Lookup { data, sink };

        Ok(Self {
            threshold: lookup.f64("threshold", DEFAULT_MATCH_THRESHOLD as f64) as f32,
            logout_delay: Duration::from_secs_f64(lookup.f64("logoutDelay", 10.0)),
            interval: Duration::from_secs_f64(lookup.f64("interval", 1.0)),
            use_usb_cam: lookup.bool("useUSBCam", false),
            training_file: lookup.string("trainingFile", "facenet_celeb.onnx"),
            users: lookup.strings("users"),
            default_class: lookup.string("defaultClass", "default"),
            everyone_class: lookup.string("everyoneClass", "everyone"),
            welcome_message: lookup.bool("welcomeMessage", true),
            motion_stop_delay: Duration::from_secs_f64(lookup.f64("motionStopDelay", 60.0)),
            motion_detection_threshold: lookup.f64("motionDetectionThreshold", 4000.0),
            model_dir: env_path("MIRRORFACE_MODEL_DIR", "models"),
            gallery_dir: env_path("MIRRORFACE_GALLERY_DIR", "validated_images"),
        })
    }

    pub fn detector_model_path(&self) -> String {
        self.model_dir
            .join("seeta_fd_frontal_v1.0.bin")
            .to_string_lossy()
            .into_owned()
    }

    pub fn embedder_model_path(&self) -> String {
        self.model_dir
            .join(&self.training_file)
            .to_string_lossy()
            .into_owned()
    }

    /// Announce the collaborator-facing settings on the host channel so
    /// the resolved configuration is diagnosable from the event stream.
    pub fn announce(&self, sink: &Arc<dyn EventSink>) {
        sink.emit(&Event::log(format!(
            "config resolved: threshold={} logoutDelay={}s interval={}s useUSBCam={} \
             users={:?} defaultClass={} everyoneClass={} welcomeMessage={} \
             motionStopDelay={}s motionDetectionThreshold={}",
            self.threshold,
            self.logout_delay.as_secs_f64(),
            self.interval.as_secs_f64(),
            self.use_usb_cam,
            self.users,
            self.default_class,
            self.everyone_class,
            self.welcome_message,
            self.motion_stop_delay.as_secs_f64(),
            self.motion_detection_threshold,
        )));
    }
}

fn env_path(key: &str, default: &str) -> PathBuf {
    std::env::var(key)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(default))
}

struct Lookup<'a> {
    data: Map<String, Value>,
    sink: &'a Arc<dyn EventSink>,
}

impl Lookup<'_> {
    fn get(&self, key: &str) -> Option<&Value> {
        let value = self.data.get(key);
        if value.is_none() {
            self.sink.emit(&Event::status(format!(
                "Could not find key \"{key}\" in config"
            )));
        }
        value
    }

    fn wrong_type(&self, key: &str) {
        self.sink.emit(&Event::status(format!(
            "Unexpected type for key \"{key}\" in config"
        )));
    }

    fn f64(&self, key: &str, default: f64) -> f64 {
        let Some(v) = self.get(key) else {
            return default;
        };
        let Some(value) = v.as_f64() else {
            self.wrong_type(key);
            return default;
        };
        // Every numeric key here is a threshold or a duration in seconds;
        // negative or non-finite values would panic in the Duration
        // conversions downstream.
        if !value.is_finite() || value < 0.0 {
            self.sink.emit(&Event::status(format!(
                "Invalid value for key \"{key}\" in config"
            )));
            return default;
        }
        value
    }

    fn bool(&self, key: &str, default: bool) -> bool {
        match self.get(key) {
            None => default,
            Some(v) => v.as_bool().unwrap_or_else(|| {
                self.wrong_type(key);
                default
            }),
        }
    }

    fn string(&self, key: &str, default: &str) -> String {
        match self.get(key) {
            None => default.to_string(),
            Some(v) => match v.as_str() {
                Some(s) => s.to_string(),
                None => {
                    self.wrong_type(key);
                    default.to_string()
                }
            },
        }
    }

    fn strings(&self, key: &str) -> Vec<String> {
        match self.get(key) {
            None => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            Some(_) => {
                self.wrong_type(key);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mirrorface_core::events::MemorySink;

    fn sinks() -> (Arc<MemorySink>, Arc<dyn EventSink>) {
        let sink = Arc::new(MemorySink::new());
        let dyn_sink: Arc<dyn EventSink> = sink.clone();
        (sink, dyn_sink)
    }

    #[test]
    fn test_full_config_parses_without_diagnostics() {
        let (sink, dyn_sink) = sinks();
        let blob = r#"{
            "threshold": 0.5,
            "logoutDelay": 15,
            "interval": 2,
            "useUSBCam": true,
            "trainingFile": "custom.onnx",
            "users": ["alice", "bob"],
            "defaultClass": "d",
            "everyoneClass": "e",
            "welcomeMessage": false,
            "motionStopDelay": 30,
            "motionDetectionThreshold": 1234
        }"#;
        let settings = Settings::from_json(blob, &dyn_sink).unwrap();
        assert_eq!(settings.threshold, 0.5);
        assert_eq!(settings.logout_delay, Duration::from_secs(15));
        assert!(settings.use_usb_cam);
        assert_eq!(settings.users, vec!["alice", "bob"]);
        assert!(sink.events_of_type("status").is_empty());
    }

    #[test]
    fn test_missing_keys_fall_back_with_status_diagnostics() {
        let (sink, dyn_sink) = sinks();
        let settings = Settings::from_json("{}", &dyn_sink).unwrap();
        assert_eq!(settings.threshold, DEFAULT_MATCH_THRESHOLD);
        assert_eq!(settings.logout_delay, Duration::from_secs(10));
        assert_eq!(settings.interval, Duration::from_secs(1));
        assert!(!settings.use_usb_cam);
        assert!(settings.users.is_empty());
        // One status diagnostic per recognized key (11 of them).
        assert_eq!(sink.events_of_type("status").len(), 11);
    }

    #[test]
    fn test_wrong_typed_key_falls_back_with_diagnostic() {
        let (sink, dyn_sink) = sinks();
        let settings =
            Settings::from_json(r#"{"threshold": "not a number"}"#, &dyn_sink).unwrap();
        assert_eq!(settings.threshold, DEFAULT_MATCH_THRESHOLD);
        let statuses = sink.events_of_type("status");
        assert!(statuses.iter().any(|e| {
            e.message()
                .as_str()
                .is_some_and(|m| m.contains("Unexpected type"))
        }));
    }

    #[test]
    fn test_negative_duration_falls_back_instead_of_panicking() {
        let (sink, dyn_sink) = sinks();
        let settings = Settings::from_json(
            r#"{"logoutDelay": -1, "interval": -0.5, "threshold": -2}"#,
            &dyn_sink,
        )
        .unwrap();
        assert_eq!(settings.logout_delay, Duration::from_secs(10));
        assert_eq!(settings.interval, Duration::from_secs(1));
        assert_eq!(settings.threshold, DEFAULT_MATCH_THRESHOLD);
        let invalid = sink
            .events_of_type("status")
            .iter()
            .filter(|e| {
                e.message()
                    .as_str()
                    .is_some_and(|m| m.contains("Invalid value"))
            })
            .count();
        assert_eq!(invalid, 3);
    }

    #[test]
    fn test_non_object_blob_is_fatal() {
        let (_, dyn_sink) = sinks();
        assert!(matches!(
            Settings::from_json("[1, 2]", &dyn_sink),
            Err(ConfigError::NotAnObject)
        ));
        assert!(Settings::from_json("not json", &dyn_sink).is_err());
    }

    #[test]
    fn test_model_paths_derive_from_training_file() {
        let (_, dyn_sink) = sinks();
        let settings =
            Settings::from_json(r#"{"trainingFile": "graph.onnx"}"#, &dyn_sink).unwrap();
        assert!(settings.embedder_model_path().ends_with("graph.onnx"));
        assert!(settings
            .detector_model_path()
            .ends_with("seeta_fd_frontal_v1.0.bin"));
    }
}
