use crate::preset::{Preset, Wording};
use crate::session::{Phase, Session};
use crate::workflow::Verdict;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct CreatedSession {
    pub id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct PresetResponse {
    pub preset: Preset,
    pub wording: &'static Wording,
}

/// Dimensions of a decoded upload
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Serialize)]
pub struct SessionStatus {
    pub id: Uuid,
    pub phase: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verdict: Option<Verdict>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageInfo>,
}

impl SessionStatus {
    pub fn new(id: Uuid, session: &Session) -> Self {
        let (phase, verdict, error) = match session.phase() {
            Phase::Idle => ("idle", None, None),
            Phase::ImageLoaded => ("image_loaded", None, None),
            Phase::Requesting => ("requesting", None, None),
            Phase::Succeeded(verdict) => ("succeeded", Some(verdict.clone()), None),
            Phase::Failed(message) => ("failed", None, Some(message.clone())),
        };
        SessionStatus {
            id,
            phase,
            verdict,
            error,
            image: session.image().map(|img| ImageInfo {
                width: img.width(),
                height: img.height(),
            }),
        }
    }
}
