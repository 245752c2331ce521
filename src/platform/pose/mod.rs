// Pose classification platform integration
// Provides the classifier bridge and its backends

pub mod classifier_bridge;

pub use classifier_bridge::{PoseClassifier, ReplayClassifier};
