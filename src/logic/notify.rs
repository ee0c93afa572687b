//! Notification Sink & Audio Guard
//!
//! The Notification Sink is an external collaborator: in-app
//! notifications, audit trail, activity feed and an optional audio cue.
//! The guard serializes audio so overlapping cues never play
//! concurrently - a cue arriving while one is playing is dropped, not
//! queued.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::types::Severity;

// ============================================================================
// RECORD TYPES
// ============================================================================

/// In-app notification level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Info,
    Success,
    Warning,
    Critical,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Info => "info",
            NotificationKind::Success => "success",
            NotificationKind::Warning => "warning",
            NotificationKind::Critical => "critical",
        }
    }

    /// Level used for a freshly stored alert of the given severity
    pub fn for_severity(severity: Severity) -> Self {
        match severity {
            Severity::Critical => NotificationKind::Critical,
            Severity::High => NotificationKind::Warning,
            _ => NotificationKind::Info,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub incident_ref: Option<Uuid>,
}

/// Audit trail entry for a lifecycle action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub action: String,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub entity_name: String,
    /// "system" for engine-driven actions, otherwise the acting user
    pub actor: String,
    pub details: String,
}

/// Activity feed entry shown on incident timelines
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub incident_ref: Option<Uuid>,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub description: String,
}

/// Spoken/audio cue request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioCue {
    pub severity: Severity,
    pub phrase: String,
}

// ============================================================================
// SINK TRAIT
// ============================================================================

/// External Notification Sink collaborator.
///
/// `notify`/`audit`/`activity` are fire-and-forget from the engine's
/// perspective; `play_cue` may fail (unsupported capability, playback
/// error) and that failure is swallowed by the guard.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, notification: Notification);
    async fn audit(&self, entry: AuditEntry);
    async fn activity(&self, entry: ActivityEntry);
    async fn play_cue(&self, cue: AudioCue) -> Result<(), String>;
}

// ============================================================================
// AUDIO GUARD
// ============================================================================

/// Single shared mutual-exclusion flag for audio playback. No queueing:
/// a cue requested while another is playing is dropped.
pub struct AudioGuard {
    playing: AtomicBool,
    enabled: AtomicBool,
}

impl AudioGuard {
    pub fn new() -> Self {
        Self {
            playing: AtomicBool::new(false),
            enabled: AtomicBool::new(true),
        }
    }

    /// User-configurable flag, consulted at request time
    pub fn set_audio_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_audio_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Whether a cue is currently playing
    pub fn is_busy(&self) -> bool {
        self.playing.load(Ordering::Relaxed)
    }

    /// Request a cue. Returns true if the cue was played (or at least
    /// attempted), false if it was dropped. Playback errors never
    /// propagate.
    pub async fn request_cue(&self, sink: &dyn NotificationSink, cue: AudioCue) -> bool {
        if !self.enabled.load(Ordering::Relaxed) {
            return false;
        }

        // swap(true) wins the flag exactly once
        if self.playing.swap(true, Ordering::AcqRel) {
            log::debug!("Audio cue dropped, another cue is playing");
            return false;
        }

        if let Err(e) = sink.play_cue(cue).await {
            log::debug!("Audio cue failed: {}", e);
        }
        self.playing.store(false, Ordering::Release);
        true
    }
}

impl Default for AudioGuard {
    fn default() -> Self {
        Self::new()
    }
}
