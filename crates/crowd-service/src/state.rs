use crowd_analytics::{AnalyticsError, CrowdMonitor, MonitorSettings};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

/// Default cap on the number of venues a service instance tracks
pub const DEFAULT_MAX_VENUES: usize = 1_000;

pub type SharedMonitor = Arc<Mutex<CrowdMonitor>>;

#[derive(Debug, Error)]
pub enum VenueError {
    #[error("venue limit of {max} reached")]
    LimitReached { max: usize },

    #[error(transparent)]
    Monitor(#[from] AnalyticsError),
}

/// Per-venue monitors. Each venue has its own lock so frames for different
/// venues are processed independently.
#[derive(Clone)]
pub struct CrowdServiceState {
    inner: Arc<CrowdServiceStateInner>,
}

struct CrowdServiceStateInner {
    defaults: MonitorSettings,
    max_venues: usize,
    venues: RwLock<HashMap<String, SharedMonitor>>,
}

impl CrowdServiceState {
    pub fn new(defaults: MonitorSettings) -> Self {
        Self::with_max_venues(defaults, DEFAULT_MAX_VENUES)
    }

    pub fn with_max_venues(defaults: MonitorSettings, max_venues: usize) -> Self {
        Self {
            inner: Arc::new(CrowdServiceStateInner {
                defaults,
                max_venues,
                venues: RwLock::new(HashMap::new()),
            }),
        }
    }

    pub fn defaults(&self) -> &MonitorSettings {
        &self.inner.defaults
    }

    pub fn max_venues(&self) -> usize {
        self.inner.max_venues
    }

    pub async fn venue(&self, venue_id: &str) -> Option<SharedMonitor> {
        let venues = self.inner.venues.read().await;
        venues.get(venue_id).cloned()
    }

    /// Look up a venue monitor, creating it with the default settings.
    /// Fails once `max_venues` venues exist.
    pub async fn venue_or_create(&self, venue_id: &str) -> Result<SharedMonitor, VenueError> {
        if let Some(monitor) = self.venue(venue_id).await {
            return Ok(monitor);
        }

        let mut venues = self.inner.venues.write().await;
        if let Some(monitor) = venues.get(venue_id) {
            return Ok(monitor.clone());
        }

        let max = self.inner.max_venues;
        if venues.len() >= max {
            warn!(venue_id, max, "Venue limit reached, not creating monitor");
            return Err(VenueError::LimitReached { max });
        }

        let monitor = Arc::new(Mutex::new(CrowdMonitor::new(
            venue_id,
            self.inner.defaults.clone(),
        )?));
        venues.insert(venue_id.to_string(), monitor.clone());
        info!(venue_id, "Created crowd monitor for venue");

        Ok(monitor)
    }

    pub async fn venue_ids(&self) -> Vec<String> {
        let venues = self.inner.venues.read().await;
        let mut ids: Vec<String> = venues.keys().cloned().collect();
        ids.sort();
        ids
    }
}
