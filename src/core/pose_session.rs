use crate::core::config::Config;
use crate::core::debounce_gate::DebounceGate;
use crate::core::overlay::OverlayRenderer;
use crate::core::signal_sink::{spawn_dispatcher, SignalSink};
use crate::models::capture::RawFrame;
use crate::models::pose::{ClassificationSample, PoseError, PoseResult};
use crate::models::signal::{Signal, Transition};
use crate::platform::camera::FrameSource;
use crate::platform::pose::PoseClassifier;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use uuid::Uuid;

const TRANSITION_QUEUE_CAPACITY: usize = 16;

// ==============================================================================
// Session Models
// ==============================================================================

/// What happened while processing one frame
#[derive(Debug, Clone)]
pub struct FrameOutcome {
    pub sample: Option<ClassificationSample>,
    pub transition: Option<Transition>,
    pub processing_time_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionStatistics {
    pub session_id: String,
    pub total_frames: u64,
    pub matching_frames: u64,
    pub frames_without_pose: u64,
    pub transitions_to_high: u32,
    pub transitions_to_low: u32,
    pub transitions_delivered: u64,
    pub transitions_dropped: u64,
    pub average_processing_time_ms: f32,
    pub final_signal: Signal,
}

// ==============================================================================
// Pose Session
// ==============================================================================

/// Per-frame loop: classify, debounce, forward transitions, draw
pub struct PoseSession {
    session_id: String,
    gate: DebounceGate,
    classifier: Box<dyn PoseClassifier>,
    overlay: OverlayRenderer,
    frame_interval: Duration,
    transition_tx: Option<mpsc::Sender<Transition>>,
    dispatcher: Option<JoinHandle<u64>>,
    stats: SessionStatistics,
    total_processing_ms: u64,
}

impl PoseSession {
    pub fn new(
        config: &Config,
        classifier: Box<dyn PoseClassifier>,
        overlay: OverlayRenderer,
    ) -> PoseResult<Self> {
        let gate = DebounceGate::new(config.gate_config())
            .map_err(|e| PoseError::InvalidConfig(e.to_string()))?;

        if config.target_fps == 0 {
            return Err(PoseError::InvalidConfig("target_fps must be positive".to_string()));
        }

        let session_id = Uuid::new_v4().to_string();
        info!(
            "Session {} using {} ({} classes), target label '{}'",
            session_id,
            classifier.model_info(),
            classifier.total_classes(),
            gate.target_label()
        );

        Ok(Self {
            stats: SessionStatistics {
                session_id: session_id.clone(),
                ..Default::default()
            },
            session_id,
            gate,
            classifier,
            overlay,
            frame_interval: Duration::from_secs_f64(1.0 / config.target_fps as f64),
            transition_tx: None,
            dispatcher: None,
            total_processing_ms: 0,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn signal(&self) -> Signal {
        self.gate.signal()
    }

    /// Attach a sink; transitions are delivered to it on a background task
    pub fn start(&mut self, sink: Box<dyn SignalSink>) -> PoseResult<()> {
        if self.transition_tx.is_some() {
            return Err(PoseError::AlreadyRunning);
        }

        let (tx, rx) = mpsc::channel(TRANSITION_QUEUE_CAPACITY);
        info!("Forwarding signal transitions to {}", sink.describe());
        self.dispatcher = Some(spawn_dispatcher(rx, sink));
        self.transition_tx = Some(tx);

        Ok(())
    }

    /// Classify one frame and feed the result through the gate
    pub fn process_frame(&mut self, frame: &RawFrame) -> PoseResult<FrameOutcome> {
        let start_time = Instant::now();
        let estimate = self.classifier.classify(frame)?;

        let sample = estimate.top_sample();
        let transition = match &sample {
            Some(sample) => {
                debug!(
                    "Frame {}: {} ({:.2})",
                    frame.index, sample.label, sample.confidence
                );
                if sample.label == self.gate.target_label() {
                    self.stats.matching_frames += 1;
                }
                self.gate.observe(sample)
            }
            None => {
                debug!("Frame {}: no predictions", frame.index);
                None
            }
        };

        if let Some(transition) = transition {
            match transition.to {
                Signal::High => self.stats.transitions_to_high += 1,
                Signal::Low => self.stats.transitions_to_low += 1,
            }
            self.forward(transition);
        }

        match &estimate.pose {
            Some(pose) => {
                if let Err(e) = self.overlay.render_and_save(frame, pose, self.gate.signal()) {
                    warn!("Overlay for frame {} failed: {}", frame.index, e);
                }
            }
            None => self.stats.frames_without_pose += 1,
        }

        let processing_time_ms = start_time.elapsed().as_millis() as u64;
        self.stats.total_frames += 1;
        self.total_processing_ms += processing_time_ms;

        Ok(FrameOutcome {
            sample,
            transition,
            processing_time_ms,
        })
    }

    // Fire-and-forget: the frame loop never waits on the sink
    fn forward(&mut self, transition: Transition) {
        let tx = match &self.transition_tx {
            Some(tx) => tx,
            None => {
                debug!("No sink attached, {} not forwarded", transition.to);
                return;
            }
        };

        match tx.try_send(transition) {
            Ok(()) => return,
            Err(TrySendError::Full(_)) => {
                warn!("Transition queue full, dropping {}", transition.to)
            }
            Err(TrySendError::Closed(_)) => {
                warn!("Signal dispatcher gone, dropping {}", transition.to)
            }
        }
        self.stats.transitions_dropped += 1;
    }

    /// Pull frames at the target rate until the source or classifier runs dry,
    /// or `shutdown` resolves
    pub async fn run<F>(&mut self, source: &mut dyn FrameSource, shutdown: F) -> PoseResult<()>
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(self.frame_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                _ = ticker.tick() => {
                    let frame = match source.next_frame()? {
                        Some(frame) => frame,
                        None => {
                            info!("Frame source exhausted");
                            break;
                        }
                    };

                    match self.process_frame(&frame) {
                        Ok(_) => {}
                        Err(PoseError::StreamEnded) => {
                            info!("Classifier stream ended");
                            break;
                        }
                        Err(e) => return Err(e),
                    }
                }
            }
        }

        Ok(())
    }

    /// Detach the sink, waiting for queued transitions to be delivered
    pub async fn stop(&mut self) -> SessionStatistics {
        self.transition_tx = None;

        if let Some(dispatcher) = self.dispatcher.take() {
            match dispatcher.await {
                Ok(delivered) => self.stats.transitions_delivered += delivered,
                Err(e) => warn!("Signal dispatcher failed: {}", e),
            }
        }

        info!("Stopped session {}", self.session_id);
        self.statistics()
    }

    pub fn statistics(&self) -> SessionStatistics {
        let mut stats = self.stats.clone();
        stats.final_signal = self.gate.signal();
        if stats.total_frames > 0 {
            stats.average_processing_time_ms =
                self.total_processing_ms as f32 / stats.total_frames as f32;
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::capture::CaptureResult;
    use crate::models::pose::{BodyPart, ClassPrediction, Keypoint, Pose, PoseEstimate};
    use crate::models::signal::SignalResult;
    use async_trait::async_trait;
    use image::RgbaImage;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    struct ScriptedClassifier {
        labels: VecDeque<&'static str>,
    }

    impl PoseClassifier for ScriptedClassifier {
        fn classify(&mut self, _frame: &RawFrame) -> PoseResult<PoseEstimate> {
            let label = self.labels.pop_front().ok_or(PoseError::StreamEnded)?;
            if label.is_empty() {
                return Ok(PoseEstimate::default());
            }

            Ok(PoseEstimate {
                pose: Some(Pose {
                    score: 0.9,
                    keypoints: vec![Keypoint::new(BodyPart::Nose, 16.0, 16.0, 0.9)],
                }),
                predictions: vec![
                    ClassPrediction {
                        class_name: label.to_string(),
                        probability: 0.8,
                    },
                    ClassPrediction {
                        class_name: "background".to_string(),
                        probability: 0.2,
                    },
                ],
            })
        }

        fn total_classes(&self) -> usize {
            2
        }

        fn model_info(&self) -> String {
            "scripted".to_string()
        }
    }

    struct BlankFrames {
        remaining: u64,
        next: u64,
    }

    impl FrameSource for BlankFrames {
        fn next_frame(&mut self) -> CaptureResult<Option<RawFrame>> {
            if self.remaining == 0 {
                return Ok(None);
            }
            self.remaining -= 1;
            self.next += 1;
            Ok(Some(RawFrame::from_image(self.next, 0, RgbaImage::new(32, 32))))
        }

        fn frame_size(&self) -> u32 {
            32
        }
    }

    #[derive(Clone, Default)]
    struct RecordingSink {
        received: Arc<Mutex<Vec<Transition>>>,
    }

    #[async_trait]
    impl SignalSink for RecordingSink {
        async fn deliver(&mut self, transition: &Transition) -> SignalResult<()> {
            self.received.lock().unwrap().push(*transition);
            Ok(())
        }

        fn describe(&self) -> String {
            "recording".to_string()
        }
    }

    fn config(threshold: u32) -> Config {
        Config {
            activation_threshold: threshold,
            max_match_count: 100,
            target_fps: 240,
            ..Config::default()
        }
    }

    fn session(threshold: u32, labels: &[&'static str]) -> PoseSession {
        let classifier = ScriptedClassifier {
            labels: labels.iter().copied().collect(),
        };
        let overlay = OverlayRenderer::new(0.5, None).unwrap();
        PoseSession::new(&config(threshold), Box::new(classifier), overlay).unwrap()
    }

    fn frame(index: u64) -> RawFrame {
        RawFrame::from_image(index, 0, RgbaImage::new(32, 32))
    }

    #[test]
    fn test_invalid_gate_config_rejected() {
        let classifier = ScriptedClassifier {
            labels: VecDeque::new(),
        };
        let overlay = OverlayRenderer::new(0.5, None).unwrap();
        let mut config = config(3);
        config.activation_threshold = 500;

        let result = PoseSession::new(&config, Box::new(classifier), overlay);
        assert!(matches!(result, Err(PoseError::InvalidConfig(_))));
    }

    #[test]
    fn test_process_frame_without_sink() {
        let mut session = session(2, &["correct", "correct", ""]);

        assert_eq!(session.process_frame(&frame(0)).unwrap().transition, None);
        let outcome = session.process_frame(&frame(1)).unwrap();
        assert_eq!(outcome.transition, Some(Transition::high()));
        assert_eq!(outcome.sample.unwrap().label, "correct");

        // No predictions: the gate is left alone
        let outcome = session.process_frame(&frame(2)).unwrap();
        assert!(outcome.sample.is_none());
        assert_eq!(session.signal(), Signal::High);

        let stats = session.statistics();
        assert_eq!(stats.total_frames, 3);
        assert_eq!(stats.matching_frames, 2);
        assert_eq!(stats.frames_without_pose, 1);
        assert_eq!(stats.transitions_to_high, 1);
    }

    #[tokio::test]
    async fn test_start_twice_fails() {
        let mut session = session(2, &[]);
        session.start(Box::new(RecordingSink::default())).unwrap();
        assert!(matches!(
            session.start(Box::new(RecordingSink::default())),
            Err(PoseError::AlreadyRunning)
        ));
        session.stop().await;
    }

    #[tokio::test]
    async fn test_run_forwards_transitions_to_sink() {
        let labels = ["correct", "correct", "other", "correct", "correct", "correct", "other"];
        let mut session = session(3, &labels);
        let sink = RecordingSink::default();
        session.start(Box::new(sink.clone())).unwrap();

        let mut source = BlankFrames {
            remaining: 20,
            next: 0,
        };
        session
            .run(&mut source, std::future::pending())
            .await
            .unwrap();

        let stats = session.stop().await;
        assert_eq!(stats.total_frames, 7);
        assert_eq!(stats.transitions_to_high, 1);
        assert_eq!(stats.transitions_to_low, 1);
        assert_eq!(stats.transitions_delivered, 2);
        assert_eq!(stats.final_signal, Signal::Low);
        assert_eq!(
            *sink.received.lock().unwrap(),
            vec![Transition::high(), Transition::low()]
        );
    }

    fn alternating(frames: usize) -> Vec<&'static str> {
        (0..frames)
            .map(|i| if i % 2 == 0 { "correct" } else { "other" })
            .collect()
    }

    #[tokio::test]
    async fn test_full_queue_drops_transitions() {
        let labels = alternating(40);
        let mut session = session(1, &labels);
        let sink = RecordingSink::default();
        session.start(Box::new(sink.clone())).unwrap();

        // No await in between, so the dispatcher has not drained anything yet
        for index in 0..40 {
            let outcome = session.process_frame(&frame(index)).unwrap();
            assert!(outcome.transition.is_some());
        }

        let stats = session.stop().await;
        assert_eq!(stats.transitions_to_high + stats.transitions_to_low, 40);
        assert_eq!(stats.transitions_delivered, TRANSITION_QUEUE_CAPACITY as u64);
        assert_eq!(stats.transitions_dropped, 40 - TRANSITION_QUEUE_CAPACITY as u64);
        assert_eq!(sink.received.lock().unwrap().len(), TRANSITION_QUEUE_CAPACITY);
        assert_eq!(sink.received.lock().unwrap()[0], Transition::high());
    }

    #[tokio::test]
    async fn test_closed_queue_drops_transitions() {
        let labels = alternating(4);
        let mut session = session(1, &labels);
        session.start(Box::new(RecordingSink::default())).unwrap();

        let dispatcher = session.dispatcher.take().unwrap();
        dispatcher.abort();
        assert!(dispatcher.await.unwrap_err().is_cancelled());

        for index in 0..4 {
            session.process_frame(&frame(index)).unwrap();
        }

        let stats = session.stop().await;
        assert_eq!(stats.transitions_dropped, 4);
        assert_eq!(stats.transitions_delivered, 0);
        assert_eq!(stats.final_signal, Signal::Low);
    }

    #[tokio::test]
    async fn test_run_stops_when_source_exhausted() {
        let mut session = session(2, &["correct", "correct", "correct", "correct"]);
        let mut source = BlankFrames {
            remaining: 2,
            next: 0,
        };

        session
            .run(&mut source, std::future::pending())
            .await
            .unwrap();

        let stats = session.stop().await;
        assert_eq!(stats.total_frames, 2);
        assert_eq!(stats.final_signal, Signal::High);
    }

    #[tokio::test]
    async fn test_run_honours_shutdown() {
        let mut session = session(2, &["correct", "correct"]);
        let mut source = BlankFrames {
            remaining: 10,
            next: 0,
        };

        session.run(&mut source, async {}).await.unwrap();
        assert_eq!(session.statistics().total_frames, 0);
    }
}
