//! Frame Pacer
//!
//! Drains a frame source at a fixed 20ms cadence, sending one protected
//! datagram per tick. A small speaking state machine wraps the stream:
//!
//! ```text
//!            real frame (notify true, reset silence budget)
//!   Idle ─────────────────────────────────────────────▶ Speaking
//!    ▲                                                    │
//!    └────────────────────────────────────────────────────┘
//!      no frame and silence budget spent (notify false)
//! ```
//!
//! While speaking, ticks without a frame are filled with a short Opus
//! silence frame until the budget runs out, so the peer's decoder winds down
//! gracefully instead of cutting off.

use crate::provider::{PacketError, PacketProvider};
use crate::session::VoiceSession;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use voxpipe_crypto::EncryptionStrategy;
use voxpipe_io::socket::{SocketError, Transport};
use voxpipe_io::time::{format_position, frames_duration, FrameClock, FRAME_DURATION};

/// Opus frame decoding to silence
pub const SILENT_FRAME: [u8; 3] = [0xFC, 0xFF, 0xFE];

/// Silence frames sent after audio stops
pub const SILENCE_BUDGET: u8 = 5;

/// Ticks between checkup log lines (one second of audio)
const CHECKUP_TICKS: u64 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeakingState {
    Idle,
    Speaking,
}

#[derive(Error, Debug)]
pub enum PacerError {
    #[error("Packet error: {0}")]
    Packet(#[from] PacketError),

    #[error("Transport error: {0}")]
    Transport(#[from] SocketError),
}

/// Pacer statistics
#[derive(Debug, Clone, Default)]
pub struct PacerStats {
    /// Ticks elapsed
    pub ticks: u64,
    /// Datagrams sent, silence included
    pub frames_sent: u64,
    /// Silence frames substituted for missing audio
    pub silence_frames: u64,
    /// Total datagram bytes handed to the transport
    pub bytes_sent: u64,
    /// Speaking state changes
    pub speaking_transitions: u64,
    /// Time spent building and sending datagrams
    pub processing_time: Duration,
}

impl PacerStats {
    /// Mean time spent per sent frame
    pub fn average_processing_time(&self) -> Duration {
        if self.frames_sent == 0 {
            return Duration::ZERO;
        }
        let nanos = self.processing_time.as_nanos() / u128::from(self.frames_sent);
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }

    /// Audio position covered by the frames sent
    pub fn position(&self) -> Duration {
        frames_duration(self.frames_sent)
    }
}

/// Fixed-cadence sender for one connection
pub struct FramePacer<S, T, V> {
    provider: PacketProvider<S>,
    transport: T,
    session: V,
    state: SpeakingState,
    silence: u8,
    interval: Duration,
    cancel: CancellationToken,
    stats: PacerStats,
}

impl<S, T, V> FramePacer<S, T, V>
where
    S: EncryptionStrategy,
    T: Transport,
    V: VoiceSession,
{
    pub fn new(provider: PacketProvider<S>, transport: T, session: V) -> Self {
        FramePacer {
            provider,
            transport,
            session,
            state: SpeakingState::Idle,
            silence: 0,
            interval: FRAME_DURATION,
            cancel: CancellationToken::new(),
            stats: PacerStats::default(),
        }
    }

    /// Stop when `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that stops this pacer
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> SpeakingState {
        self.state
    }

    pub fn stats(&self) -> &PacerStats {
        &self.stats
    }

    pub fn provider(&self) -> &PacketProvider<S> {
        &self.provider
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn session(&self) -> &V {
        &self.session
    }

    async fn set_speaking(&mut self, speaking: bool) {
        tracing::info!(speaking, "setting speaking state");
        self.state = if speaking {
            SpeakingState::Speaking
        } else {
            SpeakingState::Idle
        };
        self.stats.speaking_transitions += 1;

        if let Err(e) = self.session.update_speaking(speaking).await {
            tracing::warn!(error = %e, speaking, "failed to update speaking state");
        }
    }

    /// Advance the state machine; returns the frame to send this tick
    async fn next_frame(&mut self, frame: Option<Bytes>) -> Option<Bytes> {
        match (frame, self.state) {
            (Some(frame), state) => {
                if state == SpeakingState::Idle {
                    self.set_speaking(true).await;
                    self.silence = SILENCE_BUDGET;
                }
                Some(frame)
            }
            (None, SpeakingState::Speaking) if self.silence > 0 => {
                self.silence -= 1;
                self.stats.silence_frames += 1;
                Some(Bytes::from_static(&SILENT_FRAME))
            }
            (None, SpeakingState::Speaking) => {
                self.set_speaking(false).await;
                None
            }
            (None, SpeakingState::Idle) => None,
        }
    }

    async fn send(&mut self, frame: &[u8]) -> Result<(), PacerError> {
        let datagram = self.provider.provide(frame)?;
        let sent = self.transport.send(&datagram).await?;

        self.stats.frames_sent += 1;
        self.stats.bytes_sent += sent as u64;
        Ok(())
    }

    /// Pace `frames` until the source ends or the pacer is cancelled
    ///
    /// Encryption and transport failures stop the loop and are returned.
    pub async fn run<F>(&mut self, frames: F) -> Result<PacerStats, PacerError>
    where
        F: Stream<Item = Option<Bytes>>,
    {
        let mut frames = std::pin::pin!(frames);
        let mut clock = FrameClock::start(self.interval);
        let mut window = (Duration::ZERO, 0u32);

        tracing::info!(
            ssrc = self.provider.ssrc(),
            suite = self.provider.strategy().name(),
            "pacer started"
        );

        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    tracing::info!("pacer cancelled");
                    break;
                }
                next = frames.next() => next,
            };
            let Some(frame) = next else { break };

            let started = Instant::now();
            if let Some(frame) = self.next_frame(frame).await {
                self.send(&frame).await?;

                let elapsed = started.elapsed();
                self.stats.processing_time += elapsed;
                window.0 += elapsed;
                window.1 += 1;
            }
            self.stats.ticks += 1;

            if clock.ticks() % CHECKUP_TICKS == CHECKUP_TICKS - 1 && window.1 > 0 {
                let average = window.0 / window.1;
                tracing::info!(
                    avg_frame_time_ms = %format!("{:.2}", average.as_secs_f64() * 1000.0),
                    progress = %format_position(self.stats.position()),
                    "checkup"
                );
                window = (Duration::ZERO, 0);
            }

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    tracing::info!("pacer cancelled");
                    break;
                }
                _ = clock.tick() => {}
            }
        }

        if self.state == SpeakingState::Speaking {
            self.set_speaking(false).await;
        }

        tracing::info!(
            frames = self.stats.frames_sent,
            silence = self.stats.silence_frames,
            bytes = self.stats.bytes_sent,
            "pacer stopped"
        );
        Ok(self.stats.clone())
    }
}
