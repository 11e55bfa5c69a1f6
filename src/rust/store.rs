use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::triage::{escalation, AnalysisResult, EscalationPolicy, ReasonCode, TriageError};

/// Review state of a stored feedback record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Pending,
    Reviewed,
    Escalated,
    Dismissed,
}

/// Feedback as submitted by a user, before analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackSubmission {
    pub text: String,
    #[serde(default)]
    pub consent: bool,
    #[serde(default)]
    pub region_code: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
}

impl FeedbackSubmission {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            consent: false,
            region_code: None,
            channel: None,
        }
    }

    pub fn with_consent(mut self, consent: bool) -> Self {
        self.consent = consent;
        self
    }

    pub fn with_region(mut self, region_code: impl Into<String>) -> Self {
        self.region_code = Some(region_code.into());
        self
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }
}

/// A consented submission together with its triage outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub text_content: String,
    pub region: Option<String>,
    pub channel: Option<String>,
    pub urgency: String,
    pub emotion: String,
    pub topic: String,
    #[serde(serialize_with = "crate::triage::serialize_rounded")]
    pub confidence: f32,
    pub is_flagged: bool,
    pub status: RecordStatus,
    pub reasons: Vec<ReasonCode>,
}

impl FeedbackRecord {
    pub fn from_analysis(
        submission: &FeedbackSubmission,
        result: &AnalysisResult,
        policy: &EscalationPolicy,
    ) -> Self {
        Self {
            text_content: submission.text.trim().to_string(),
            region: submission.region_code.clone(),
            channel: submission.channel.clone(),
            urgency: result.urgency_label.to_lowercase(),
            emotion: escalation::map_emotion_to_schema(&result.emotion_label).to_string(),
            topic: escalation::predict_topic(&submission.text).to_string(),
            confidence: result.urgency_confidence,
            is_flagged: policy.should_flag(result),
            status: RecordStatus::Pending,
            reasons: result.reasons.as_slice().to_vec(),
        }
    }
}

/// Identifier assigned by a record store.
pub type RecordId = u64;

/// Persistence collaborator for consented feedback.
pub trait RecordStore: Send + Sync {
    fn insert(&self, record: FeedbackRecord) -> Result<RecordId, TriageError>;
}

/// Process-local store, mainly for tests and the CLI.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    records: Mutex<Vec<FeedbackRecord>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<FeedbackRecord> {
        match self.records.lock() {
            Ok(records) => records.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RecordStore for InMemoryRecordStore {
    fn insert(&self, record: FeedbackRecord) -> Result<RecordId, TriageError> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| TriageError::Store("Record store lock poisoned".into()))?;
        records.push(record);
        Ok(records.len() as RecordId)
    }
}
