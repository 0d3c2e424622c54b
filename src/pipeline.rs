use chrono::Utc;
use std::sync::Arc;

use crate::dispatcher::{Alert, AlertDispatcher};
use crate::domain::DomainExtractor;
use crate::features::extract_features;
use crate::reassembly::CompletedMessage;
use crate::scorer::Scorer;

/// Runs the analysis chain for completed messages: feature extraction,
/// scoring, domain extraction, alert dispatch. One spawned task per message;
/// tasks for different messages run independently and never report back to
/// the request path.
pub struct Pipeline {
    scorer: Scorer,
    domains: DomainExtractor,
    dispatcher: AlertDispatcher,
    alert_threshold: f64,
}

impl Pipeline {
    pub fn new(
        scorer: Scorer,
        domains: DomainExtractor,
        dispatcher: AlertDispatcher,
        alert_threshold: f64,
    ) -> Self {
        Self {
            scorer,
            domains,
            dispatcher,
            alert_threshold,
        }
    }

    pub fn model_loaded(&self) -> bool {
        self.scorer.is_model()
    }

    /// Score a completed message and build its alert without dispatching.
    pub fn analyze(&self, completed: &CompletedMessage) -> Alert {
        let (features, reassembled) = extract_features(&completed.chunks);
        let result = self.scorer.score(&features);
        let domain = self.domains.extract_domain(&reassembled);
        Alert {
            domain,
            message_id: completed.message_id.clone(),
            client_id: completed.client_id.clone(),
            features,
            score: result.score,
            reasons: result.reasons,
            observed_at: Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        }
    }

    /// Full processing for one completed message. Returns whether an alert
    /// was delivered downstream. Never errors; every failure mode inside the
    /// chain degrades and logs.
    pub async fn process(&self, completed: CompletedMessage) -> bool {
        let alert = self.analyze(&completed);
        log::info!(
            "Processed message {} from {:?}: score {:.3}, domain {:?}",
            alert.message_id,
            alert.client_id,
            alert.score,
            alert.domain
        );

        if alert.score < self.alert_threshold {
            log::debug!(
                "Score {:.3} below threshold {:.3} for {}, not alerting",
                alert.score,
                self.alert_threshold,
                alert.message_id
            );
            return false;
        }
        if alert.domain.is_none() {
            // The downstream store rejects domain-less alerts, so don't send one.
            log::debug!("No domain resolved for {}, skipping dispatch", alert.message_id);
            return false;
        }
        self.dispatcher.dispatch(&alert).await
    }

    /// Hand a completed message to a background task and return immediately.
    pub fn spawn_process(self: &Arc<Self>, completed: CompletedMessage) {
        let pipeline = Arc::clone(self);
        tokio::spawn(async move {
            pipeline.process(completed).await;
        });
    }
}
