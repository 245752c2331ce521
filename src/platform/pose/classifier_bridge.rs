// Pose classifier bridge
// Abstraction over the external pose estimation + classification model

use crate::models::capture::RawFrame;
use crate::models::pose::{ModelMetadata, PoseError, PoseEstimate, PoseResult};
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Classifier bridge trait
/// Implement this for each model backend
pub trait PoseClassifier: Send {
    /// Estimate the pose in a frame and classify it
    fn classify(&mut self, frame: &RawFrame) -> PoseResult<PoseEstimate>;

    /// Number of classes the model distinguishes
    fn total_classes(&self) -> usize;

    /// Get model info
    fn model_info(&self) -> String;
}

// ==============================================================================
// Replay Implementation (recorded classifier output)
// ==============================================================================

/// Plays back a JSON-lines recording, one `PoseEstimate` per frame
pub struct ReplayClassifier {
    path: PathBuf,
    estimates: VecDeque<PoseEstimate>,
    metadata: ModelMetadata,
}

impl ReplayClassifier {
    pub fn open(path: &Path, metadata: ModelMetadata) -> PoseResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let classifier = Self::from_jsonl(&contents, metadata)?;

        info!(
            "Replay classifier loaded {} frames from {:?}",
            classifier.remaining(),
            path
        );

        Ok(Self {
            path: path.to_path_buf(),
            ..classifier
        })
    }

    pub fn from_jsonl(contents: &str, metadata: ModelMetadata) -> PoseResult<Self> {
        let mut estimates = VecDeque::new();
        let mut unknown_labels = HashSet::new();

        for (idx, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let estimate: PoseEstimate =
                serde_json::from_str(line).map_err(|e| PoseError::InvalidRecording {
                    line: idx + 1,
                    reason: e.to_string(),
                })?;

            for prediction in &estimate.predictions {
                if !metadata.has_label(&prediction.class_name)
                    && unknown_labels.insert(prediction.class_name.clone())
                {
                    warn!(
                        "Recording line {} uses label '{}' which the model does not declare",
                        idx + 1,
                        prediction.class_name
                    );
                }
            }

            estimates.push_back(estimate);
        }

        Ok(Self {
            path: PathBuf::new(),
            estimates,
            metadata,
        })
    }

    pub fn remaining(&self) -> usize {
        self.estimates.len()
    }
}

impl PoseClassifier for ReplayClassifier {
    fn classify(&mut self, _frame: &RawFrame) -> PoseResult<PoseEstimate> {
        self.estimates.pop_front().ok_or(PoseError::StreamEnded)
    }

    fn total_classes(&self) -> usize {
        self.metadata.total_classes()
    }

    fn model_info(&self) -> String {
        format!(
            "Replay of {:?} ({} classes: {})",
            self.path,
            self.metadata.total_classes(),
            self.metadata.labels.join(", ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> ModelMetadata {
        ModelMetadata {
            labels: vec!["correct".to_string(), "other".to_string()],
            model_name: None,
            tm_version: None,
            package_version: None,
        }
    }

    fn frame() -> RawFrame {
        RawFrame {
            index: 0,
            timestamp: 0,
            width: 1,
            height: 1,
            data: vec![0; 4],
        }
    }

    #[test]
    fn test_replay_in_order_then_ends() {
        let recording = r#"
{"predictions": [{"className": "correct", "probability": 0.9}, {"className": "other", "probability": 0.1}]}

{"predictions": [{"className": "other", "probability": 0.6}, {"className": "correct", "probability": 0.4}]}
"#;
        let mut classifier = ReplayClassifier::from_jsonl(recording, metadata()).unwrap();
        assert_eq!(classifier.remaining(), 2);
        assert_eq!(classifier.total_classes(), 2);

        let first = classifier.classify(&frame()).unwrap();
        assert_eq!(first.top_sample().unwrap().label, "correct");

        let second = classifier.classify(&frame()).unwrap();
        assert_eq!(second.top_sample().unwrap().label, "other");

        assert!(matches!(
            classifier.classify(&frame()),
            Err(PoseError::StreamEnded)
        ));
    }

    #[test]
    fn test_malformed_line_reports_line_number() {
        let recording = "{\"predictions\": []}\nnot json\n";
        let result = ReplayClassifier::from_jsonl(recording, metadata());
        assert!(matches!(
            result,
            Err(PoseError::InvalidRecording { line: 2, .. })
        ));
    }

    #[test]
    fn test_unknown_labels_are_accepted() {
        let recording = r#"{"predictions": [{"className": "wave", "probability": 1.0}]}"#;
        let mut classifier = ReplayClassifier::from_jsonl(recording, metadata()).unwrap();
        let estimate = classifier.classify(&frame()).unwrap();
        assert_eq!(estimate.top_sample().unwrap().label, "wave");
    }

    #[test]
    fn test_open_from_file() {
        let path = std::env::temp_dir().join("pose_signal_replay_test.jsonl");
        std::fs::write(&path, "{\"predictions\": []}\n").unwrap();

        let classifier = ReplayClassifier::open(&path, metadata()).unwrap();
        assert_eq!(classifier.remaining(), 1);
        assert!(classifier.model_info().contains("correct, other"));

        let _ = std::fs::remove_file(&path);
    }
}
