// Data models for pose estimation and pose classification

use crate::models::capture::CaptureError;
use serde::{Deserialize, Serialize};

// ==============================================================================
// Pose Estimate (Unified Result)
// ==============================================================================

/// Complete classifier output for a single frame
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PoseEstimate {
    #[serde(default)]
    pub pose: Option<Pose>,
    #[serde(default)]
    pub predictions: Vec<ClassPrediction>,
}

impl PoseEstimate {
    /// The prediction with the highest probability, as a gate sample
    pub fn top_sample(&self) -> Option<ClassificationSample> {
        ClassificationSample::from_predictions(&self.predictions)
    }
}

// ==============================================================================
// Body Pose (17 PoseNet keypoints)
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pose {
    pub score: f32,
    pub keypoints: Vec<Keypoint>,
}

impl Pose {
    pub fn keypoint(&self, part: BodyPart) -> Option<&Keypoint> {
        let name = part.as_str();
        self.keypoints.iter().find(|k| k.part == name)
    }
}

/// A 2D keypoint in frame pixel coordinates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Keypoint {
    pub part: String,
    pub position: Position,
    pub score: f32,
}

impl Keypoint {
    pub fn new(part: BodyPart, x: f32, y: f32, score: f32) -> Self {
        Self {
            part: part.as_str().to_string(),
            position: Position { x, y },
            score,
        }
    }

    pub fn is_visible(&self, threshold: f32) -> bool {
        self.score >= threshold
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

/// PoseNet part indices (17 total)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BodyPart {
    Nose = 0,
    LeftEye = 1,
    RightEye = 2,
    LeftEar = 3,
    RightEar = 4,
    LeftShoulder = 5,
    RightShoulder = 6,
    LeftElbow = 7,
    RightElbow = 8,
    LeftWrist = 9,
    RightWrist = 10,
    LeftHip = 11,
    RightHip = 12,
    LeftKnee = 13,
    RightKnee = 14,
    LeftAnkle = 15,
    RightAnkle = 16,
}

impl BodyPart {
    pub fn as_str(&self) -> &'static str {
        match self {
            BodyPart::Nose => "nose",
            BodyPart::LeftEye => "leftEye",
            BodyPart::RightEye => "rightEye",
            BodyPart::LeftEar => "leftEar",
            BodyPart::RightEar => "rightEar",
            BodyPart::LeftShoulder => "leftShoulder",
            BodyPart::RightShoulder => "rightShoulder",
            BodyPart::LeftElbow => "leftElbow",
            BodyPart::RightElbow => "rightElbow",
            BodyPart::LeftWrist => "leftWrist",
            BodyPart::RightWrist => "rightWrist",
            BodyPart::LeftHip => "leftHip",
            BodyPart::RightHip => "rightHip",
            BodyPart::LeftKnee => "leftKnee",
            BodyPart::RightKnee => "rightKnee",
            BodyPart::LeftAnkle => "leftAnkle",
            BodyPart::RightAnkle => "rightAnkle",
        }
    }
}

/// Segments drawn as the skeleton (PoseNet adjacent keypoints)
pub const SKELETON: [(BodyPart, BodyPart); 12] = [
    (BodyPart::LeftHip, BodyPart::LeftShoulder),
    (BodyPart::LeftElbow, BodyPart::LeftShoulder),
    (BodyPart::LeftElbow, BodyPart::LeftWrist),
    (BodyPart::LeftHip, BodyPart::LeftKnee),
    (BodyPart::LeftKnee, BodyPart::LeftAnkle),
    (BodyPart::RightHip, BodyPart::RightShoulder),
    (BodyPart::RightElbow, BodyPart::RightShoulder),
    (BodyPart::RightElbow, BodyPart::RightWrist),
    (BodyPart::RightHip, BodyPart::RightKnee),
    (BodyPart::RightKnee, BodyPart::RightAnkle),
    (BodyPart::LeftShoulder, BodyPart::RightShoulder),
    (BodyPart::LeftHip, BodyPart::RightHip),
];

// ==============================================================================
// Classification
// ==============================================================================

/// Probability of one model class for a frame
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassPrediction {
    pub class_name: String,
    pub probability: f32,
}

/// One frame's classification result, as consumed by the debounce gate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationSample {
    pub label: String,
    pub confidence: f32,
}

impl ClassificationSample {
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }

    /// Pick the most probable class. Ties keep the earlier prediction.
    pub fn from_predictions(predictions: &[ClassPrediction]) -> Option<Self> {
        let mut best: Option<&ClassPrediction> = None;
        for prediction in predictions {
            match best {
                Some(current) if current.probability >= prediction.probability => {}
                _ => best = Some(prediction),
            }
        }

        best.map(|p| Self::new(p.class_name.clone(), p.probability))
    }
}

// ==============================================================================
// Model Metadata
// ==============================================================================

/// Contents of the `metadata.json` shipped next to the model topology
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelMetadata {
    pub labels: Vec<String>,
    #[serde(default)]
    pub model_name: Option<String>,
    #[serde(default)]
    pub tm_version: Option<String>,
    #[serde(default)]
    pub package_version: Option<String>,
}

impl ModelMetadata {
    pub fn total_classes(&self) -> usize {
        self.labels.len()
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }
}

// ==============================================================================
// Error Types
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum PoseError {
    #[error("Pose classification already running")]
    AlreadyRunning,

    #[error("Invalid recording at line {line}: {reason}")]
    InvalidRecording { line: usize, reason: String },

    #[error("Classifier stream ended")]
    StreamEnded,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Frame capture failed: {0}")]
    Capture(#[from] CaptureError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type PoseResult<T> = Result<T, PoseError>;
