use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── Open loops ──────────────────────────────────────────────────────────────

/// A tracked, unresolved conversational topic worth proactively revisiting.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenLoop {
    pub id: String,
    pub user_id: String,
    pub loop_type: LoopType,
    pub topic: String,
    pub suggested_followup: Option<String>,
    pub timeframe: Option<Timeframe>,
    /// 0..=1, clamped on creation.
    pub salience: f64,
    pub status: LoopStatus,
    pub surface_count: u32,
    pub max_surfaces: u32,
    pub created_at: DateTime<Utc>,
    pub last_mentioned: Option<DateTime<Utc>>,
}

/// Candidate loop signal supplied by the detection collaborator.
#[derive(Debug, Clone)]
pub struct LoopSignal {
    pub user_id: String,
    pub loop_type: LoopType,
    pub topic: String,
    pub salience: f64,
    pub suggested_followup: Option<String>,
    pub timeframe: Option<Timeframe>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopType {
    PendingEvent,
    EmotionalFollowup,
    CommitmentCheck,
}

impl std::fmt::Display for LoopType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::PendingEvent => "pending_event",
            Self::EmotionalFollowup => "emotional_followup",
            Self::CommitmentCheck => "commitment_check",
        };
        write!(f, "{label}")
    }
}

impl std::str::FromStr for LoopType {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let parsed = match value.trim().to_lowercase().as_str() {
            "pending_event" => Self::PendingEvent,
            "emotional_followup" => Self::EmotionalFollowup,
            "commitment_check" => Self::CommitmentCheck,
            _ => anyhow::bail!("invalid loop_type: {value}"),
        };
        Ok(parsed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Timeframe {
    Tomorrow,
    ThisWeek,
    Soon,
    Later,
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Tomorrow => "tomorrow",
            Self::ThisWeek => "this_week",
            Self::Soon => "soon",
            Self::Later => "later",
        };
        write!(f, "{label}")
    }
}

impl std::str::FromStr for Timeframe {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let parsed = match value.trim().to_lowercase().as_str() {
            "tomorrow" => Self::Tomorrow,
            "this_week" => Self::ThisWeek,
            "soon" => Self::Soon,
            "later" => Self::Later,
            _ => anyhow::bail!("invalid timeframe: {value}"),
        };
        Ok(parsed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopStatus {
    Active,
    Surfaced,
    Resolved,
    Dismissed,
}

impl LoopStatus {
    /// Resolved and dismissed loops are inert history.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Resolved | Self::Dismissed)
    }
}

impl std::fmt::Display for LoopStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Active => "active",
            Self::Surfaced => "surfaced",
            Self::Resolved => "resolved",
            Self::Dismissed => "dismissed",
        };
        write!(f, "{label}")
    }
}

impl std::str::FromStr for LoopStatus {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let parsed = match value.trim().to_lowercase().as_str() {
            "active" => Self::Active,
            "surfaced" => Self::Surfaced,
            "resolved" => Self::Resolved,
            "dismissed" => Self::Dismissed,
            _ => anyhow::bail!("invalid loop status: {value}"),
        };
        Ok(parsed)
    }
}

// ─── Ongoing threads ─────────────────────────────────────────────────────────

/// An internal "thought" record eligible for autonomous sharing.
///
/// Persisted as part of a whole per-user JSON collection, not row-addressed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OngoingThread {
    pub id: String,
    pub user_id: String,
    pub theme: String,
    pub current_state: String,
    /// 0..=1.
    pub intensity: f64,
    pub user_related: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_mentioned: Option<DateTime<Utc>>,
}

// ─── Promises ────────────────────────────────────────────────────────────────

/// A recorded future commitment with a caller-supplied fulfillment time.
#[derive(Debug, Clone, PartialEq)]
pub struct Promise {
    pub id: String,
    pub user_id: String,
    pub promise_type: PromiseType,
    pub description: String,
    /// Human-stated condition, e.g. "when I go on my walk".
    pub trigger_event: String,
    pub estimated_timing: DateTime<Utc>,
    pub commitment_context: String,
    pub fulfillment_data: Option<FulfillmentData>,
    pub status: PromiseStatus,
    pub created_at: DateTime<Utc>,
}

/// Creation payload for [`Promise`].
#[derive(Debug, Clone)]
pub struct PromiseDraft {
    pub user_id: String,
    pub promise_type: PromiseType,
    pub description: String,
    pub trigger_event: String,
    pub estimated_timing: DateTime<Utc>,
    pub commitment_context: String,
    pub fulfillment_data: Option<FulfillmentData>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromiseType {
    SendSelfie,
    ShareUpdate,
    FollowUp,
}

impl PromiseType {
    /// Fallback message when the fulfillment payload carries no text.
    pub const fn default_message_text(self) -> &'static str {
        match self {
            Self::SendSelfie => "Here's that photo I promised you 📸",
            Self::ShareUpdate => "I said I'd share an update with you — here it is.",
            Self::FollowUp => "Hey, just checking in like I said I would. How did it go?",
        }
    }

    pub const fn message_type(self) -> MessageType {
        match self {
            Self::SendSelfie => MessageType::Photo,
            Self::ShareUpdate | Self::FollowUp => MessageType::Text,
        }
    }
}

impl std::fmt::Display for PromiseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::SendSelfie => "send_selfie",
            Self::ShareUpdate => "share_update",
            Self::FollowUp => "follow_up",
        };
        write!(f, "{label}")
    }
}

impl std::str::FromStr for PromiseType {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let parsed = match value.trim().to_lowercase().as_str() {
            "send_selfie" => Self::SendSelfie,
            "share_update" => Self::ShareUpdate,
            "follow_up" => Self::FollowUp,
            _ => anyhow::bail!("invalid promise_type: {value}"),
        };
        Ok(parsed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromiseStatus {
    Pending,
    Fulfilled,
    Cancelled,
}

impl PromiseStatus {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Fulfilled | Self::Cancelled)
    }
}

impl std::fmt::Display for PromiseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Pending => "pending",
            Self::Fulfilled => "fulfilled",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{label}")
    }
}

impl std::str::FromStr for PromiseStatus {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let parsed = match value.trim().to_lowercase().as_str() {
            "pending" => Self::Pending,
            "fulfilled" => Self::Fulfilled,
            "cancelled" => Self::Cancelled,
            _ => anyhow::bail!("invalid promise status: {value}"),
        };
        Ok(parsed)
    }
}

/// Per-type fulfillment payload. Tagged so each promise type's required data
/// is enforced at the type level instead of an untyped bag of fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FulfillmentData {
    SendSelfie {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message_text: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        selfie_params: Option<serde_json::Value>,
    },
    ShareUpdate {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message_text: Option<String>,
    },
    FollowUp {},
}

impl FulfillmentData {
    pub const fn promise_type(&self) -> PromiseType {
        match self {
            Self::SendSelfie { .. } => PromiseType::SendSelfie,
            Self::ShareUpdate { .. } => PromiseType::ShareUpdate,
            Self::FollowUp {} => PromiseType::FollowUp,
        }
    }

    pub fn message_text(&self) -> Option<&str> {
        match self {
            Self::SendSelfie { message_text, .. } | Self::ShareUpdate { message_text } => {
                message_text.as_deref()
            }
            Self::FollowUp {} => None,
        }
    }

    pub fn selfie_params(&self) -> Option<&serde_json::Value> {
        match self {
            Self::SendSelfie { selfie_params, .. } => selfie_params.as_ref(),
            _ => None,
        }
    }
}

// ─── Pending messages ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Text,
    Photo,
}

impl MessageType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Photo => "photo",
        }
    }
}

/// Request handed to the external pending-message sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingMessageRequest {
    pub message_text: String,
    pub message_type: MessageType,
    pub trigger: String,
    pub priority: String,
    pub metadata: serde_json::Value,
}

/// Record returned by the pending-message sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingMessage {
    pub id: String,
    pub created_at: DateTime<Utc>,
}

// ─── Tasks ───────────────────────────────────────────────────────────────────

/// High-priority task supplied by the external task store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn enum_codecs_round_trip() {
        for loop_type in [
            LoopType::PendingEvent,
            LoopType::EmotionalFollowup,
            LoopType::CommitmentCheck,
        ] {
            assert_eq!(LoopType::from_str(&loop_type.to_string()).unwrap(), loop_type);
        }
        for status in [
            LoopStatus::Active,
            LoopStatus::Surfaced,
            LoopStatus::Resolved,
            LoopStatus::Dismissed,
        ] {
            assert_eq!(LoopStatus::from_str(&status.to_string()).unwrap(), status);
        }
        assert!(LoopType::from_str("mystery").is_err());
    }

    #[test]
    fn terminal_statuses() {
        assert!(LoopStatus::Resolved.is_terminal());
        assert!(LoopStatus::Dismissed.is_terminal());
        assert!(!LoopStatus::Active.is_terminal());
        assert!(!LoopStatus::Surfaced.is_terminal());
        assert!(PromiseStatus::Fulfilled.is_terminal());
        assert!(!PromiseStatus::Pending.is_terminal());
    }

    #[test]
    fn selfie_promises_send_photos() {
        assert_eq!(PromiseType::SendSelfie.message_type(), MessageType::Photo);
        assert_eq!(PromiseType::FollowUp.message_type(), MessageType::Text);
        assert_eq!(PromiseType::ShareUpdate.message_type(), MessageType::Text);
    }

    #[test]
    fn default_message_text_is_never_empty() {
        for promise_type in [
            PromiseType::SendSelfie,
            PromiseType::ShareUpdate,
            PromiseType::FollowUp,
        ] {
            assert!(!promise_type.default_message_text().is_empty());
        }
    }

    #[test]
    fn fulfillment_data_serde_tagging() {
        let payload = FulfillmentData::SendSelfie {
            message_text: Some("on my walk!".into()),
            selfie_params: Some(serde_json::json!({"pose": "outdoors"})),
        };
        let raw = serde_json::to_string(&payload).unwrap();
        assert!(raw.contains("\"kind\":\"send_selfie\""));

        let decoded: FulfillmentData = serde_json::from_str(&raw).unwrap();
        assert_eq!(decoded, payload);
        assert_eq!(decoded.promise_type(), PromiseType::SendSelfie);
        assert_eq!(decoded.message_text(), Some("on my walk!"));
    }

    #[test]
    fn follow_up_payload_has_no_text() {
        let payload = FulfillmentData::FollowUp {};
        assert_eq!(payload.message_text(), None);
        assert_eq!(payload.promise_type(), PromiseType::FollowUp);
    }
}
