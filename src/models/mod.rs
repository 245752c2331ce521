// Data models for camera frames, pose classification, and the output signal

pub mod capture;
pub mod pose;
pub mod signal;
