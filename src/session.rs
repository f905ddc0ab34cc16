//! Per-user sessions. Each session owns at most one uploaded image and moves
//! through `Idle -> ImageLoaded -> Requesting -> Succeeded | Failed`. Sessions
//! are independent of each other; the store is only locked for state
//! transitions, never while a request is in flight. Sessions left idle for
//! longer than the configured TTL are swept, so an abandoned tab does not keep
//! its bitmap alive.

use crate::error::{Error, Result};
use crate::ingest::IngestedImage;
use crate::workflow::{Classifier, Verdict};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Where a session is in the classification workflow
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    /// Nothing uploaded yet
    Idle,

    /// An image is decoded and ready to classify
    ImageLoaded,

    /// Waiting on the model service. The only state in which a trigger is
    /// refused.
    Requesting,

    Succeeded(Verdict),

    /// Holds the user-visible failure message
    Failed(String),
}

#[derive(Debug)]
pub struct Session {
    image: Option<Arc<IngestedImage>>,
    phase: Phase,
    last_seen: Instant,
}

impl Session {
    fn new() -> Self {
        Session {
            image: None,
            phase: Phase::Idle,
            last_seen: Instant::now(),
        }
    }

    fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn image(&self) -> Option<Arc<IngestedImage>> {
        self.image.clone()
    }
}

/// All live sessions
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: HashMap<Uuid, Session>,
}

impl SessionStore {
    pub fn new() -> Self {
        SessionStore::default()
    }

    /// Start a new session in `Idle`
    pub fn create(&mut self) -> Uuid {
        let id = Uuid::new_v4();
        self.sessions.insert(id, Session::new());
        debug!("created session {id}");
        id
    }

    /// End a session and discard its image
    pub fn remove(&mut self, id: Uuid) -> Result<()> {
        match self.sessions.remove(&id) {
            Some(_) => {
                debug!("removed session {id}");
                Ok(())
            }
            None => Err(Error::SessionNotFound(id)),
        }
    }

    pub fn get(&self, id: Uuid) -> Result<&Session> {
        self.sessions.get(&id).ok_or(Error::SessionNotFound(id))
    }

    /// Look up a session for a state change and mark it as seen
    fn get_mut(&mut self, id: Uuid) -> Result<&mut Session> {
        let session = self.sessions.get_mut(&id).ok_or(Error::SessionNotFound(id))?;
        session.touch();
        Ok(session)
    }

    /// Mark a session as still in use
    pub fn touch(&mut self, id: Uuid) -> Result<()> {
        self.get_mut(id).map(|_| ())
    }

    /// Drop every session not seen for at least `ttl`, returning how many
    /// were removed. A session waiting on the model is kept until its
    /// request finishes.
    pub fn expire_idle(&mut self, ttl: Duration) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|id, session| {
            let keep = session.phase == Phase::Requesting || session.last_seen.elapsed() < ttl;
            if !keep {
                debug!("session {id} expired");
            }
            keep
        });
        before - self.sessions.len()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Replace the session's image. Refused while a request is outstanding.
    pub fn load_image(&mut self, id: Uuid, image: IngestedImage) -> Result<()> {
        let session = self.get_mut(id)?;
        if session.phase == Phase::Requesting {
            return Err(Error::Busy);
        }
        session.image = Some(Arc::new(image));
        session.phase = Phase::ImageLoaded;
        Ok(())
    }

    /// Move the session to `Requesting` and hand out its image
    pub fn begin_request(&mut self, id: Uuid) -> Result<Arc<IngestedImage>> {
        let session = self.get_mut(id)?;
        if session.phase == Phase::Requesting {
            return Err(Error::Busy);
        }
        let image = session.image.clone().ok_or(Error::NoImage)?;
        session.phase = Phase::Requesting;
        Ok(image)
    }

    /// Record the outcome of a request. A session removed in the meantime is
    /// ignored.
    pub fn finish_request(&mut self, id: Uuid, outcome: std::result::Result<Verdict, String>) {
        match self.sessions.get_mut(&id) {
            Some(session) => {
                session.touch();
                session.phase = match outcome {
                    Ok(verdict) => Phase::Succeeded(verdict),
                    Err(message) => Phase::Failed(message),
                }
            }
            None => debug!("session {id} ended before its request finished"),
        }
    }
}

/// Shared handle to the store
pub type SharedSessions = Arc<RwLock<SessionStore>>;

fn write(sessions: &SharedSessions) -> std::sync::RwLockWriteGuard<'_, SessionStore> {
    sessions.write().unwrap_or_else(|e| e.into_inner())
}

/// Periodically remove sessions idle for longer than `ttl`
pub fn spawn_sweeper(sessions: SharedSessions, ttl: Duration, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            let removed = write(&sessions).expire_idle(ttl);
            if removed > 0 {
                info!("expired {removed} idle sessions");
            }
        }
    })
}

/// Run one classification for session `id`. The remote call runs on its own
/// task, so the session still reaches `Succeeded` or `Failed` if the caller
/// goes away while it is in flight.
pub async fn classify_session(
    sessions: SharedSessions,
    classifier: Classifier,
    id: Uuid,
) -> Result<Verdict> {
    let image = write(&sessions).begin_request(id)?;
    info!("session {id}: classification started");

    let task = {
        let sessions = sessions.clone();
        tokio::spawn(async move {
            let result = classifier.classify(&image).await;
            let outcome = match &result {
                Ok(verdict) => Ok(verdict.clone()),
                Err(e) => Err(classifier.error_message(e)),
            };
            write(&sessions).finish_request(id, outcome);
            result
        })
    };

    match task.await {
        Ok(result) => {
            info!("session {id}: classification finished (ok = {})", result.is_ok());
            result
        }
        Err(e) => {
            warn!("session {id}: classification task failed: {e}");
            let err = Error::Task(e);
            write(&sessions).finish_request(id, Err(err.to_string()));
            Err(err)
        }
    }
}
