// Poller module: capture session lifecycle, fixed-interval ticks, and request dispatch

use crate::camera::{CameraOpener, FrameSource};
use crate::error::{OverlayError, Result};
use crate::models::{Detection, Emotion};
use crate::render::{render_detection, Canvas, Indicator};
use crate::transport::{process_frame, DetectionTransport};
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Fixed period between polls
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Fixed-period timer driven by the host event loop
///
/// Late polls fire once and skip the periods they missed.
#[derive(Debug)]
pub struct Interval {
    period: Duration,
    next_due: Instant,
}

impl Interval {
    /// First tick is due one period after `now`
    pub fn starting_at(now: Instant, period: Duration) -> Self {
        Self {
            period,
            next_due: now + period,
        }
    }

    /// Returns true if a tick is due and advances the schedule past `now`
    pub fn poll_due(&mut self, now: Instant) -> bool {
        if now < self.next_due {
            return false;
        }
        let behind = now.duration_since(self.next_due).as_nanos();
        let missed = behind / self.period.as_nanos().max(1);
        self.next_due += self.period * (missed as u32 + 1);
        true
    }

    pub fn next_due(&self) -> Instant {
        self.next_due
    }
}

/// Everything that exists only while detection is running
pub struct CaptureSession {
    generation: u64,
    endpoint: String,
    camera: Box<dyn FrameSource>,
    timer: Interval,
}

impl CaptureSession {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        // The camera field drops right after this and releases the stream
        info!("Capture session {} closed", self.generation);
    }
}

/// Result of one dispatched poll, tagged with the session that sent it
struct Outcome {
    generation: u64,
    result: Result<Option<Detection>>,
}

/// Reports exactly one outcome per dispatched request
///
/// If the request task panics or is dropped unrun, the guard reports an abort on drop.
struct OutcomeGuard {
    generation: u64,
    sender: Option<mpsc::Sender<Outcome>>,
}

impl OutcomeGuard {
    fn new(generation: u64, sender: mpsc::Sender<Outcome>) -> Self {
        Self {
            generation,
            sender: Some(sender),
        }
    }

    fn finish(mut self, result: Result<Option<Detection>>) {
        self.send(result);
    }

    fn send(&mut self, result: Result<Option<Detection>>) {
        if let Some(sender) = self.sender.take() {
            // The poller may be gone by now
            let _ = sender.send(Outcome {
                generation: self.generation,
                result,
            });
        }
    }
}

impl Drop for OutcomeGuard {
    fn drop(&mut self) {
        if self.sender.is_some() {
            warn!("Request task for session {} ended without a result", self.generation);
            self.send(Err(OverlayError::Aborted));
        }
    }
}

/// Owns the capture session and the display state it feeds
///
/// Lives on the UI thread; the host calls [`Poller::pump`] on every frame.
pub struct Poller {
    opener: Box<dyn CameraOpener>,
    transport: Arc<dyn DetectionTransport>,
    runtime: tokio::runtime::Handle,
    session: Option<CaptureSession>,
    generation: u64,
    in_flight: bool,
    outcome_sender: mpsc::Sender<Outcome>,
    outcome_receiver: mpsc::Receiver<Outcome>,
    canvas: Canvas,
    indicator: Indicator,
    alert: Option<&'static str>,
}

impl Poller {
    /// Creates an idle poller
    pub fn new(
        opener: Box<dyn CameraOpener>,
        transport: Arc<dyn DetectionTransport>,
        runtime: tokio::runtime::Handle,
    ) -> Self {
        let (outcome_sender, outcome_receiver) = mpsc::channel();
        Self {
            opener,
            transport,
            runtime,
            session: None,
            generation: 0,
            in_flight: false,
            outcome_sender,
            outcome_receiver,
            canvas: Canvas::new(640, 480),
            indicator: Indicator::default(),
            alert: None,
        }
    }

    /// Validates the endpoint, acquires the camera, and starts ticking
    ///
    /// On failure an alert is raised and the poller stays idle.
    pub fn start(&mut self, endpoint: &str) -> Result<()> {
        if self.session.is_some() {
            warn!("Detection is already running");
            return Ok(());
        }

        if !endpoint.starts_with("http") {
            return Err(self.raise(OverlayError::InvalidEndpoint(endpoint.to_string())));
        }

        let camera = match self.opener.open() {
            Ok(camera) => camera,
            Err(e) => return Err(self.raise(e)),
        };

        let (width, height) = camera.resolution();
        self.canvas.resize(width, height);

        self.generation += 1;
        info!(
            "Capture session {} started: {}x{} -> {}",
            self.generation, width, height, endpoint
        );
        self.session = Some(CaptureSession {
            generation: self.generation,
            endpoint: endpoint.to_string(),
            camera,
            timer: Interval::starting_at(Instant::now(), POLL_INTERVAL),
        });
        Ok(())
    }

    /// Releases the camera and cancels the timer. Safe to call when idle.
    ///
    /// A request still in flight completes in the background and its result is dropped.
    pub fn stop(&mut self) {
        if let Some(session) = self.session.take() {
            info!("Stopping capture session {}", session.generation());
            drop(session);
            self.indicator.clear();
        }
    }

    /// Advances the poller to `now`: applies finished requests, then fires a due tick
    pub fn pump(&mut self, now: Instant) {
        self.drain_outcomes();
        self.tick(now);
    }

    pub fn is_running(&self) -> bool {
        self.session.is_some()
    }

    /// True while a request is outstanding
    pub fn is_processing(&self) -> bool {
        self.in_flight
    }

    pub fn session(&self) -> Option<&CaptureSession> {
        self.session.as_ref()
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    pub fn current_emotion(&self) -> Option<Emotion> {
        self.indicator.current()
    }

    /// Returns the pending alert once
    pub fn take_alert(&mut self) -> Option<&'static str> {
        self.alert.take()
    }

    fn raise(&mut self, err: OverlayError) -> OverlayError {
        error!("{}", err);
        self.alert = Some(err.alert_message());
        err
    }

    fn drain_outcomes(&mut self) {
        while let Ok(outcome) = self.outcome_receiver.try_recv() {
            // Only one request is ever outstanding
            self.in_flight = false;

            let current = self.session.as_ref().map(CaptureSession::generation);
            if current != Some(outcome.generation) {
                debug!(
                    "Discarding result from closed session {}",
                    outcome.generation
                );
                continue;
            }

            match outcome.result {
                Ok(Some(detection)) => {
                    render_detection(&mut self.canvas, &mut self.indicator, &detection);
                }
                Ok(None) => debug!("Response carried no usable result"),
                Err(e) => {
                    error!("Error processing frame: {}", e);
                    self.alert = Some(e.alert_message());
                }
            }
        }
    }

    fn tick(&mut self, now: Instant) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if !session.timer.poll_due(now) {
            return;
        }
        if self.in_flight {
            debug!("Previous frame still processing, skipping tick");
            return;
        }

        let frame = match session.camera.capture_frame() {
            Ok(frame) => frame,
            Err(e) => {
                error!("Error processing frame: {}", e);
                self.alert = Some(e.alert_message());
                return;
            }
        };
        self.canvas.draw_frame(&frame);

        let generation = session.generation;
        let endpoint = session.endpoint.clone();
        let snapshot = self.canvas.image().clone();
        let transport = Arc::clone(&self.transport);
        let guard = OutcomeGuard::new(generation, self.outcome_sender.clone());

        self.in_flight = true;
        self.runtime.spawn_blocking(move || {
            let result = process_frame(transport.as_ref(), &endpoint, &snapshot);
            guard.finish(result);
        });
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dropped_guard_reports_abort() {
        let (sender, receiver) = mpsc::channel();
        drop(OutcomeGuard::new(7, sender));

        let outcome = receiver.try_recv().expect("abort outcome");
        assert_eq!(outcome.generation, 7);
        assert!(matches!(outcome.result, Err(OverlayError::Aborted)));
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn finished_guard_reports_once() {
        let (sender, receiver) = mpsc::channel();
        OutcomeGuard::new(3, sender).finish(Ok(None));

        let outcome = receiver.try_recv().expect("outcome");
        assert!(matches!(outcome.result, Ok(None)));
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn interval_first_tick_after_one_period() {
        let t0 = Instant::now();
        let mut timer = Interval::starting_at(t0, POLL_INTERVAL);
        assert!(!timer.poll_due(t0));
        assert!(!timer.poll_due(t0 + Duration::from_millis(999)));
        assert!(timer.poll_due(t0 + POLL_INTERVAL));
        assert!(!timer.poll_due(t0 + POLL_INTERVAL));
        assert!(timer.poll_due(t0 + POLL_INTERVAL * 2));
    }

    #[test]
    fn interval_skips_missed_periods() {
        let t0 = Instant::now();
        let mut timer = Interval::starting_at(t0, POLL_INTERVAL);

        // Five periods late: one tick, schedule moves past now
        let late = t0 + Duration::from_millis(5_500);
        assert!(timer.poll_due(late));
        assert!(!timer.poll_due(late));
        assert_eq!(timer.next_due(), t0 + POLL_INTERVAL * 6);
    }
}
