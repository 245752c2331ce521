pub mod config;
pub mod debounce_gate;
pub mod model_loader;
pub mod overlay;
pub mod signal_sink;

// Frame loop tying the gate to the classifier and the sink
pub mod pose_session;
