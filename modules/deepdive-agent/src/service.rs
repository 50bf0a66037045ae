use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tracing::{error, info};
use uuid::Uuid;

use deepdive_common::{DeepdiveError, EvidenceMatrix, ProgressUpdate};

use crate::evidence::evidence_matrix;
use crate::orchestrator::ResearchOrchestrator;
use crate::progress::{ProgressChannel, ProgressSink};

const QUEUED_MESSAGE: &str = "Job queued...";

/// In-process registry of research jobs and their progress channels.
///
/// Jobs run on the tokio runtime; `start*` must be called from within one.
/// Registered jobs are kept for the life of the service.
pub struct ResearchService {
    orchestrator: Arc<ResearchOrchestrator>,
    jobs: Mutex<HashMap<String, ProgressChannel>>,
}

impl ResearchService {
    pub fn new(orchestrator: Arc<ResearchOrchestrator>) -> Self {
        Self {
            orchestrator,
            jobs: Mutex::new(HashMap::new()),
        }
    }

    /// Start a job under a fresh id and return the id.
    pub fn start(&self, query: &str) -> Result<String, DeepdiveError> {
        let research_id = Uuid::new_v4().to_string();
        self.start_with_id(&research_id, query)?;
        Ok(research_id)
    }

    pub fn start_with_id(&self, research_id: &str, query: &str) -> Result<(), DeepdiveError> {
        let channel = {
            let mut jobs = self.jobs.lock().expect("jobs lock poisoned");
            if jobs.contains_key(research_id) {
                return Err(DeepdiveError::JobExists(research_id.to_string()));
            }
            let channel = ProgressChannel::new(ProgressUpdate::new(research_id, QUEUED_MESSAGE));
            jobs.insert(research_id.to_string(), channel.clone());
            channel
        };
        info!(research_id, query, "Research job queued");

        let orchestrator = self.orchestrator.clone();
        let id = research_id.to_string();
        let query = query.to_string();
        let sink: Arc<dyn ProgressSink> = Arc::new(channel.clone());
        let run = tokio::spawn(async move {
            orchestrator.conduct_research(&id, &query, sink).await;
        });

        // A run that dies without publishing a terminal event still gets one.
        let id = research_id.to_string();
        tokio::spawn(async move {
            if let Err(e) = run.await {
                error!(research_id = id.as_str(), error = %e, "Research task aborted");
                let mut update = ProgressUpdate::new(id, format!("Error: {e}"));
                update.is_complete = true;
                channel.publish(update);
            }
        });
        Ok(())
    }

    /// Receiver positioned at the job's latest snapshot.
    pub fn subscribe(
        &self,
        research_id: &str,
    ) -> Result<watch::Receiver<ProgressUpdate>, DeepdiveError> {
        self.jobs
            .lock()
            .expect("jobs lock poisoned")
            .get(research_id)
            .map(ProgressChannel::subscribe)
            .ok_or_else(|| DeepdiveError::JobNotFound(research_id.to_string()))
    }

    /// Support matrix over whatever the shared knowledge store holds now.
    pub fn evidence_matrix(&self) -> EvidenceMatrix {
        evidence_matrix(&self.orchestrator.store().get_all_facts())
    }

    pub fn active_jobs(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .jobs
            .lock()
            .expect("jobs lock poisoned")
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }
}

/// Wait until the job behind `rx` publishes its terminal update.
pub async fn wait_for_completion(
    rx: &mut watch::Receiver<ProgressUpdate>,
) -> Result<ProgressUpdate, DeepdiveError> {
    let update = rx
        .wait_for(|u| u.is_complete)
        .await
        .map_err(|_| DeepdiveError::Anyhow(anyhow::anyhow!("progress channel closed")))?;
    Ok(update.clone())
}
