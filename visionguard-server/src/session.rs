//! Per-connection stream session
//!
//! A session owns everything one client's stream needs: its frame source,
//! its hazard policy and last-hazard timestamp, and its counters. The
//! transport loop in `websocket` drives it one tick at a time:
//! `acquire` a frame, then `process` it into a `frame_update`.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;
use visionguard_core::{Alert, ServerMessage};
use visionguard_eye::codec;
use visionguard_eye::{Detector, Frame, FrameSource, HazardPolicy, StreamMode};
use visionguard_llm::AlertEnricher;

use crate::error::Result;

/// Connection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Streaming,
    Closing,
    Failed,
    Terminated,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Connecting => "connecting",
            SessionState::Streaming => "streaming",
            SessionState::Closing => "closing",
            SessionState::Failed => "failed",
            SessionState::Terminated => "terminated",
        }
    }

    fn can_move_to(&self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Connecting, Streaming)
                | (Connecting, Closing)
                | (Connecting, Failed)
                | (Streaming, Closing)
                | (Streaming, Failed)
                | (Closing, Terminated)
                | (Failed, Terminated)
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub frames_emitted: u64,
    pub ticks_skipped: u64,
    pub alerts_emitted: u64,
}

/// What a tick's acquisition step produced
pub enum Acquired {
    Frame(Frame),
    /// Nothing usable this tick; emit nothing and move on
    Skip,
    /// Push channel closed: the client is gone
    Closed,
}

/// Collaborators shared by every session
#[derive(Clone)]
pub struct Pipeline {
    pub detector: Arc<Detector>,
    pub enricher: Arc<AlertEnricher>,
    pub jpeg_quality: u8,
}

pub struct StreamSession {
    id: Uuid,
    state: SessionState,
    source: FrameSource,
    policy: HazardPolicy,
    last_hazard_at: Option<Instant>,
    pipeline: Pipeline,
    stats: SessionStats,
}

impl StreamSession {
    /// `accepted_at` seeds the cooldown, so no hazard fires in the first window
    pub fn new(id: Uuid, source: FrameSource, policy: HazardPolicy, pipeline: Pipeline, accepted_at: Instant) -> Self {
        debug!(connection = %id, mode = %source.mode(), "Session created");
        Self {
            id,
            state: SessionState::Connecting,
            source,
            policy,
            last_hazard_at: Some(accepted_at),
            pipeline,
            stats: SessionStats::default(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn mode(&self) -> StreamMode {
        self.source.mode()
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn last_hazard_at(&self) -> Option<Instant> {
        self.last_hazard_at
    }

    /// Move to `next` if the lifecycle allows it; returns whether it moved
    pub fn transition(&mut self, next: SessionState) -> bool {
        if !self.state.can_move_to(next) {
            debug!(connection = %self.id, "Ignoring transition {} -> {}", self.state, next);
            return false;
        }
        debug!(connection = %self.id, "Session {} -> {}", self.state, next);
        self.state = next;
        if next == SessionState::Closing || next == SessionState::Failed {
            self.source.release();
        }
        true
    }

    /// Obtain this tick's frame. Pull mode never skips; push mode waits for the client.
    pub async fn acquire(&mut self, pushed: &mut mpsc::Receiver<String>) -> Acquired {
        match &mut self.source {
            FrameSource::Pull(source) => Acquired::Frame(source.next_frame().await),
            FrameSource::Push(source) => match pushed.recv().await {
                Some(payload) => match source.accept(payload).await {
                    Some(frame) => Acquired::Frame(frame),
                    None => {
                        self.stats.ticks_skipped += 1;
                        Acquired::Skip
                    }
                },
                None => Acquired::Closed,
            },
        }
    }

    /// Detect, evaluate the hazard policy, enrich and encode one frame
    pub async fn process(&mut self, frame: Frame) -> Result<ServerMessage> {
        let index = frame.index();
        let detector = self.pipeline.detector.clone();
        let output = tokio::task::spawn_blocking(move || detector.detect(&frame)).await??;

        let outcome = self
            .policy
            .evaluate(output.annotated, &output.detections, Instant::now(), self.last_hazard_at);
        self.last_hazard_at = outcome.last_hazard_at;

        let mut alerts = Vec::with_capacity(outcome.events.len());
        for event in outcome.events {
            info!(connection = %self.id, frame = index, "Hazard {} ({}), enriching", event.kind, event.severity);
            let enrichment = self
                .pipeline
                .enricher
                .enrich(&event.kind, event.severity, event.detected_at)
                .await;
            alerts.push(Alert::from_enrichment(event, enrichment));
        }

        let annotated = outcome.annotated;
        let quality = self.pipeline.jpeg_quality;
        let image = tokio::task::spawn_blocking(move || codec::encode_jpeg_data_url(&annotated, quality)).await??;

        Ok(ServerMessage::FrameUpdate { image, alerts })
    }

    /// Count a message the transport accepted
    pub fn record_emitted(&mut self, message: &ServerMessage) {
        self.stats.frames_emitted += 1;
        let ServerMessage::FrameUpdate { alerts, .. } = message;
        self.stats.alerts_emitted += alerts.len() as u64;
    }

    /// Final transition; releases the source whatever state the session was in
    pub fn terminate(&mut self) {
        if self.state == SessionState::Connecting || self.state == SessionState::Streaming {
            self.transition(SessionState::Closing);
        }
        self.source.release();
        self.transition(SessionState::Terminated);
        info!(
            connection = %self.id,
            frames = self.stats.frames_emitted,
            skipped = self.stats.ticks_skipped,
            alerts = self.stats.alerts_emitted,
            "Stream terminated"
        );
    }
}
