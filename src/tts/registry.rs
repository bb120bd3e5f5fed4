//! Process-wide backend instances.
//!
//! Backends are expensive to bring up, so each engine gets one slot that is
//! filled on first use and shared by every request afterwards. A failed
//! construction leaves the slot empty and the next request tries again.
//! [`BackendRegistry::shutdown`] empties all slots at service teardown.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::Serialize;
use tokio::sync::Mutex;

use super::{Backend, EngineKind, SpeechBackend};
use crate::config::ServiceConfig;
use crate::error::Result;

/// Usability report for one engine
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub engine: EngineKind,
    /// "ok" or "error"
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub checked_at: DateTime<Utc>,
}

type Slot = Mutex<Option<Arc<Backend>>>;

pub struct BackendRegistry {
    config: Arc<ServiceConfig>,
    xtts: Slot,
    dia: Slot,
}

impl BackendRegistry {
    pub fn new(config: Arc<ServiceConfig>) -> Self {
        Self {
            config,
            xtts: Mutex::new(None),
            dia: Mutex::new(None),
        }
    }

    fn slot(&self, kind: EngineKind) -> &Slot {
        match kind {
            EngineKind::Xtts => &self.xtts,
            EngineKind::Dia => &self.dia,
        }
    }

    /// Get the backend for `kind`, constructing it on first demand
    pub async fn get(&self, kind: EngineKind) -> Result<Arc<Backend>> {
        // holding the slot lock keeps concurrent first requests from constructing twice
        let mut slot = self.slot(kind).lock().await;

        if let Some(backend) = slot.as_ref() {
            return Ok(Arc::clone(backend));
        }

        info!("Initializing {} backend", kind);
        let backend = Arc::new(Backend::connect(kind, &self.config).await?);
        *slot = Some(Arc::clone(&backend));
        info!("{} backend ready", kind);

        Ok(backend)
    }

    /// Whether a backend has been constructed, without triggering construction
    #[cfg(test)]
    pub async fn is_loaded(&self, kind: EngineKind) -> bool {
        self.slot(kind).lock().await.is_some()
    }

    /// Report every engine: construct it if needed, then probe it
    pub async fn statuses(&self) -> Vec<EngineStatus> {
        let mut statuses = Vec::with_capacity(EngineKind::ALL.len());

        for kind in EngineKind::ALL {
            let error = match self.get(kind).await {
                Ok(backend) => {
                    let health = backend.health_check().await;
                    if health.usable {
                        None
                    } else {
                        Some(health.detail.unwrap_or_else(|| "unavailable".to_string()))
                    }
                }
                Err(e) => {
                    warn!("{} backend unavailable: {}", kind, e);
                    Some(e.to_string())
                }
            };

            statuses.push(EngineStatus {
                engine: kind,
                status: if error.is_none() { "ok" } else { "error" },
                error,
                checked_at: Utc::now(),
            });
        }

        statuses
    }

    /// Release every constructed backend
    pub async fn shutdown(&self) {
        for kind in EngineKind::ALL {
            if let Some(backend) = self.slot(kind).lock().await.take() {
                let outstanding = Arc::strong_count(&backend) - 1;
                if outstanding > 0 {
                    warn!("{} backend released with {} request(s) still holding it", kind, outstanding);
                }
                info!("Released {} backend", kind);
            }
        }
    }
}
