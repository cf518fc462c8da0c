use crate::{
    error::AppError,
    media::{
        validate_youtube_url, MediaService, ProgressReporter, RetrievalMode, RetrievedMedia,
        VideoMetadata,
    },
};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
    time::{Duration, Instant},
};
use tracing::{debug, info};
use uuid::Uuid;

/// State of one user's interaction: the URL they entered and what was fetched for it.
#[derive(Debug, Default)]
pub struct Session {
    url: Option<String>,
    metadata: Option<VideoMetadata>,
}

impl Session {
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn metadata(&self) -> Option<&VideoMetadata> {
        self.metadata.as_ref()
    }

    pub fn clear(&mut self) {
        self.url = None;
        self.metadata = None;
    }

    /// Validates and fetches info for a new URL. Prior state is discarded first,
    /// so a failure leaves the session empty.
    pub async fn submit_url(
        &mut self,
        service: &MediaService,
        url: &str,
    ) -> Result<&VideoMetadata, AppError> {
        self.clear();

        let url = url.trim();
        if url.is_empty() {
            return Err(AppError::Validation("Please enter a video URL".to_string()));
        }
        if !validate_youtube_url(url) {
            return Err(AppError::Validation(format!(
                "{} is not a valid YouTube video URL",
                url
            )));
        }

        let metadata = service.fetch_info(url).await?;
        self.url = Some(url.to_string());
        Ok(self.metadata.insert(metadata))
    }

    /// Retrieves media for the current URL. The result is handed to the caller, never kept.
    pub async fn download(
        &self,
        service: &MediaService,
        mode: RetrievalMode,
        progress: &ProgressReporter,
    ) -> Result<RetrievedMedia, AppError> {
        let Some(url) = self.url().filter(|_| self.metadata().is_some()) else {
            return Err(AppError::Validation(
                "Enter a video URL and load its info before downloading".to_string(),
            ));
        };

        progress.reset();
        service.retrieve(url, mode, progress).await
    }
}

#[derive(Debug)]
pub struct SessionHandle {
    pub session: tokio::sync::Mutex<Session>,
    pub progress: ProgressReporter,
    last_seen: Mutex<Instant>,
}

impl SessionHandle {
    fn new() -> Self {
        Self {
            session: tokio::sync::Mutex::new(Session::default()),
            progress: ProgressReporter::new(),
            last_seen: Mutex::new(Instant::now()),
        }
    }

    fn touch(&self) {
        *lock(&self.last_seen) = Instant::now();
    }

    fn idle_for(&self) -> Duration {
        lock(&self.last_seen).elapsed()
    }

    fn is_busy(&self) -> bool {
        self.session.try_lock().is_err()
    }
}

/// Maps session ids to their handles. Sessions share nothing with each other.
pub struct SessionStore {
    sessions: Mutex<HashMap<Uuid, Arc<SessionHandle>>>,
    idle_timeout: Duration,
}

impl SessionStore {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            idle_timeout,
        }
    }

    pub fn create(&self) -> (Uuid, Arc<SessionHandle>) {
        self.sweep_idle();

        let id = Uuid::new_v4();
        let handle = Arc::new(SessionHandle::new());
        let active = {
            let mut sessions = lock(&self.sessions);
            sessions.insert(id, handle.clone());
            sessions.len()
        };
        debug!("Created session {} ({} active)", id, active);
        (id, handle)
    }

    pub fn get(&self, id: &Uuid) -> Result<Arc<SessionHandle>, AppError> {
        let handle = lock(&self.sessions).get(id).cloned().ok_or_else(|| {
            AppError::Validation("Session expired, reload the page to start over".to_string())
        })?;
        handle.touch();
        Ok(handle)
    }

    pub fn remove(&self, id: &Uuid) -> bool {
        let removed = lock(&self.sessions).remove(id).is_some();
        if removed {
            debug!("Ended session {}", id);
        }
        removed
    }

    fn sweep_idle(&self) {
        let mut sessions = lock(&self.sessions);
        let before = sessions.len();
        sessions.retain(|_, handle| handle.is_busy() || handle.idle_for() < self.idle_timeout);

        let swept = before - sessions.len();
        if swept > 0 {
            info!("Dropped {} idle sessions", swept);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
