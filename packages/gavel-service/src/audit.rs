//! Bounded telemetry channel for offline-review events. A full queue
//! increments a dead-letter counter instead of blocking the query path.

use std::sync::{
	Arc,
	atomic::{AtomicU64, Ordering},
};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

use gavel_domain::FuzzyCandidate;

use crate::decision::Strategy;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AuditEvent {
	/// Below-threshold comparisons kept for matcher review.
	FuzzyCandidates { text: String, candidates: Vec<FuzzyCandidate> },
	/// The LLM plan disagreed with the rule-based choice.
	StrategyDisagreement {
		text: String,
		rule_strategy: Strategy,
		llm_strategy: Strategy,
		llm_confidence: f64,
		llm_reasoning: String,
	},
	/// A plan failed validation and was discarded before execution.
	DiscardedPlan { text: String, reason: String },
}

#[derive(Clone)]
pub struct AuditSink {
	tx: mpsc::Sender<AuditEvent>,
	dead_letters: Arc<AtomicU64>,
}
impl AuditSink {
	pub fn new(capacity: usize) -> (Self, mpsc::Receiver<AuditEvent>) {
		let (tx, rx) = mpsc::channel(capacity);

		(Self { tx, dead_letters: Arc::new(AtomicU64::new(0)) }, rx)
	}

	/// Non-blocking publish. Dropped events are counted, never silently lost.
	pub fn publish(&self, event: AuditEvent) {
		if let Err(err) = self.tx.try_send(event) {
			self.dead_letters.fetch_add(1, Ordering::Relaxed);

			debug!(error = %err, "Audit event dropped; queue full or closed.");
		}
	}

	pub fn dead_letters(&self) -> u64 {
		self.dead_letters.load(Ordering::Relaxed)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn full_queue_increments_dead_letter_counter() {
		let (sink, mut rx) = AuditSink::new(1);

		sink.publish(AuditEvent::DiscardedPlan {
			text: "q1".to_string(),
			reason: "empty query text".to_string(),
		});
		sink.publish(AuditEvent::DiscardedPlan {
			text: "q2".to_string(),
			reason: "empty query text".to_string(),
		});

		assert_eq!(sink.dead_letters(), 1);
		assert!(rx.recv().await.is_some());
	}
}
