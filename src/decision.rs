//! Deterministic decision engine.
//!
//! Routes an annotated message to an action from its classification,
//! priority score, and the user's automation policy. No IO and no
//! randomness: same message and policy always yield the same decision.

use serde::{Deserialize, Serialize};

use crate::pipeline::types::{Classification, Message};

/// Confidence floor above which an `AutoHandle` decision may act
/// without the user in the loop.
pub const DEFAULT_AUTO_SEND_THRESHOLD: f32 = 0.8;

/// Score assumed when the scorer stage has not populated the message.
const UNSCORED_PRIORITY: i32 = 50;

/// How much autonomy the user has granted the assistant.
///
/// Ordered from least to most autonomous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutomationPolicy {
    /// Observe and summarize only; never act.
    ReadOnly,
    /// Draft actions, queue everything for approval.
    AssistMode,
    /// Act on low-stakes items, queue the rest.
    AutoHandle,
    /// Act on most items without asking.
    FullDelegate,
}

impl std::fmt::Display for AutomationPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ReadOnly => write!(f, "read_only"),
            Self::AssistMode => write!(f, "assist_mode"),
            Self::AutoHandle => write!(f, "auto_handle"),
            Self::FullDelegate => write!(f, "full_delegate"),
        }
    }
}

impl std::str::FromStr for AutomationPolicy {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read_only" => Ok(Self::ReadOnly),
            "assist_mode" => Ok(Self::AssistMode),
            "auto_handle" => Ok(Self::AutoHandle),
            "full_delegate" => Ok(Self::FullDelegate),
            _ => Err(format!("Unknown automation policy: {}", s)),
        }
    }
}

/// What the pipeline should do with a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Handle autonomously without user involvement.
    AutoHandle,
    /// Stage for explicit user approval.
    QueueApproval,
    /// Include in the user's brief; take no action.
    SurfaceBrief,
    /// Move out of the inbox.
    Archive,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AutoHandle => write!(f, "auto_handle"),
            Self::QueueApproval => write!(f, "queue_approval"),
            Self::SurfaceBrief => write!(f, "surface_brief"),
            Self::Archive => write!(f, "archive"),
        }
    }
}

/// The engine's verdict for one message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub action: Action,
    /// Human-readable explanation of which rule fired.
    pub reason: String,
    /// Engine confidence in [0,1].
    pub confidence: f32,
}

impl Decision {
    fn new(action: Action, reason: &str, confidence: f32) -> Self {
        Self {
            action,
            reason: reason.to_string(),
            confidence,
        }
    }

    /// Whether an autonomous send is permitted: the action must be
    /// `AutoHandle` and confidence must meet the threshold.
    pub fn should_auto_send(&self, confidence_threshold: f32) -> bool {
        self.action == Action::AutoHandle && self.confidence >= confidence_threshold
    }
}

/// Decide what to do with a message under the given policy.
///
/// Rules are evaluated in order; the first match wins. Spam is archived
/// before the policy is consulted, so it is archived even in read-only
/// mode.
pub fn decide(message: &Message, policy: AutomationPolicy) -> Decision {
    let priority = message.priority_score.unwrap_or(UNSCORED_PRIORITY);
    let classification = message.classification;

    // Rule 1: spam is always archived.
    if classification == Some(Classification::Spam) {
        return Decision::new(Action::Archive, "Classified as spam", 0.95);
    }

    // Rule 2: read-only mode never acts.
    if policy == AutomationPolicy::ReadOnly {
        return Decision::new(Action::SurfaceBrief, "Read-only mode enabled", 1.0);
    }

    // Rule 3: high-priority urgent messages are always surfaced.
    if classification == Some(Classification::Urgent) && priority >= 80 {
        return Decision::new(
            Action::SurfaceBrief,
            "High priority urgent message requires attention",
            0.9,
        );
    }

    // Rule 4: low-priority fyi.
    if classification == Some(Classification::Fyi) && priority < 30 {
        return if policy >= AutomationPolicy::AutoHandle {
            Decision::new(Action::Archive, "Low priority FYI message", 0.85)
        } else {
            Decision::new(Action::SurfaceBrief, "FYI message for review", 0.7)
        };
    }

    // Rule 5: action-required messages.
    if classification == Some(Classification::ActionRequired) {
        return if policy == AutomationPolicy::FullDelegate && priority < 60 {
            Decision::new(
                Action::AutoHandle,
                "Routine action in full delegate mode",
                0.8,
            )
        } else if policy == AutomationPolicy::AutoHandle && priority < 40 {
            Decision::new(Action::AutoHandle, "Low complexity action", 0.75)
        } else {
            Decision::new(Action::QueueApproval, "Action requires user approval", 0.85)
        };
    }

    // Rule 6: meeting requests detected in the summary.
    if let Some(summary) = &message.summary {
        let lower = summary.to_lowercase();
        if lower.contains("meeting") || lower.contains("schedule") {
            return if policy == AutomationPolicy::FullDelegate {
                Decision::new(
                    Action::AutoHandle,
                    "Auto-schedule meeting in full delegate mode",
                    0.8,
                )
            } else {
                Decision::new(Action::QueueApproval, "Meeting request needs approval", 0.9)
            };
        }
    }

    // Rule 7: assist mode splits on priority.
    if policy == AutomationPolicy::AssistMode {
        return if priority >= 50 {
            Decision::new(Action::QueueApproval, "Draft reply for approval", 0.75)
        } else {
            Decision::new(Action::SurfaceBrief, "Low priority in assist mode", 0.7)
        };
    }

    // Rule 8: everything else goes to the brief.
    Decision::new(Action::SurfaceBrief, "Default routing for review", 0.6)
}

/// Source of per-user automation policies.
pub trait PolicySource: Send + Sync {
    fn policy_for(&self, user_id: &str) -> AutomationPolicy;
}

/// A policy source that applies one policy to every user.
pub struct FixedPolicy(pub AutomationPolicy);

impl PolicySource for FixedPolicy {
    fn policy_for(&self, _user_id: &str) -> AutomationPolicy {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::{ProcessingStatus, RawMessage};
    use chrono::Utc;

    fn annotated(
        classification: Option<Classification>,
        priority: Option<i32>,
        summary: Option<&str>,
    ) -> Message {
        let mut msg = Message::from_raw(
            "user-1",
            RawMessage {
                external_id: "ext-1".into(),
                thread_id: "thread-1".into(),
                subject: "Subject".into(),
                sender: "sender@example.com".into(),
                sender_name: None,
                body: "Body".into(),
                received_at: Utc::now(),
            },
        );
        msg.classification = classification;
        msg.priority_score = priority;
        msg.summary = summary.map(str::to_string);
        msg.status = ProcessingStatus::Processed;
        msg
    }

    #[test]
    fn spam_archived_under_every_policy() {
        let msg = annotated(Some(Classification::Spam), Some(90), Some("Buy now"));
        for policy in [
            AutomationPolicy::ReadOnly,
            AutomationPolicy::AssistMode,
            AutomationPolicy::AutoHandle,
            AutomationPolicy::FullDelegate,
        ] {
            let decision = decide(&msg, policy);
            assert_eq!(decision.action, Action::Archive);
            assert_eq!(decision.confidence, 0.95);
        }
    }

    #[test]
    fn read_only_surfaces_everything_else() {
        for c in [
            Classification::Urgent,
            Classification::ActionRequired,
            Classification::Fyi,
        ] {
            let msg = annotated(Some(c), Some(95), Some("meeting at noon"));
            let decision = decide(&msg, AutomationPolicy::ReadOnly);
            assert_eq!(decision.action, Action::SurfaceBrief);
            assert_eq!(decision.confidence, 1.0);
        }
    }

    #[test]
    fn urgent_high_priority_surfaced_in_all_active_policies() {
        let msg = annotated(Some(Classification::Urgent), Some(85), None);
        for policy in [
            AutomationPolicy::AssistMode,
            AutomationPolicy::AutoHandle,
            AutomationPolicy::FullDelegate,
        ] {
            let decision = decide(&msg, policy);
            assert_eq!(decision.action, Action::SurfaceBrief);
            assert_eq!(decision.confidence, 0.9);
        }
    }

    #[test]
    fn urgent_below_80_falls_through() {
        let msg = annotated(Some(Classification::Urgent), Some(79), None);
        let decision = decide(&msg, AutomationPolicy::AssistMode);
        // Falls through to rule 7: priority >= 50 queues approval.
        assert_eq!(decision.action, Action::QueueApproval);
        assert_eq!(decision.reason, "Draft reply for approval");
    }

    #[test]
    fn low_priority_fyi_archived_only_with_enough_autonomy() {
        let msg = annotated(Some(Classification::Fyi), Some(20), None);

        for policy in [AutomationPolicy::AutoHandle, AutomationPolicy::FullDelegate] {
            assert_eq!(decide(&msg, policy).action, Action::Archive);
        }
        let assist = decide(&msg, AutomationPolicy::AssistMode);
        assert_eq!(assist.action, Action::SurfaceBrief);
        assert_eq!(assist.reason, "FYI message for review");
    }

    #[test]
    fn fyi_at_boundary_30_is_not_archived() {
        let msg = annotated(Some(Classification::Fyi), Some(30), None);
        let decision = decide(&msg, AutomationPolicy::FullDelegate);
        assert_ne!(decision.action, Action::Archive);
    }

    #[test]
    fn action_required_routing_by_policy_and_priority() {
        let low = annotated(Some(Classification::ActionRequired), Some(35), None);
        let mid = annotated(Some(Classification::ActionRequired), Some(55), None);
        let high = annotated(Some(Classification::ActionRequired), Some(75), None);

        // Full delegate handles anything under 60.
        assert_eq!(
            decide(&mid, AutomationPolicy::FullDelegate).action,
            Action::AutoHandle
        );
        assert_eq!(
            decide(&high, AutomationPolicy::FullDelegate).action,
            Action::QueueApproval
        );

        // Auto handle only under 40.
        let auto = decide(&low, AutomationPolicy::AutoHandle);
        assert_eq!(auto.action, Action::AutoHandle);
        assert_eq!(auto.confidence, 0.75);
        assert_eq!(
            decide(&mid, AutomationPolicy::AutoHandle).action,
            Action::QueueApproval
        );

        // Assist mode always queues action-required.
        assert_eq!(
            decide(&low, AutomationPolicy::AssistMode).action,
            Action::QueueApproval
        );
    }

    #[test]
    fn meeting_in_summary_routes_to_scheduling() {
        let msg = annotated(Some(Classification::Fyi), Some(60), Some("Wants to schedule a sync"));

        let delegate = decide(&msg, AutomationPolicy::FullDelegate);
        assert_eq!(delegate.action, Action::AutoHandle);
        assert_eq!(delegate.reason, "Auto-schedule meeting in full delegate mode");

        let assist = decide(&msg, AutomationPolicy::AssistMode);
        assert_eq!(assist.action, Action::QueueApproval);
        assert_eq!(assist.confidence, 0.9);
    }

    #[test]
    fn meeting_detection_is_case_insensitive() {
        let msg = annotated(Some(Classification::Fyi), Some(60), Some("MEETING tomorrow"));
        let decision = decide(&msg, AutomationPolicy::AssistMode);
        assert_eq!(decision.reason, "Meeting request needs approval");
    }

    #[test]
    fn action_required_takes_precedence_over_meeting_summary() {
        let msg = annotated(
            Some(Classification::ActionRequired),
            Some(35),
            Some("Asks to schedule a meeting"),
        );
        let decision = decide(&msg, AutomationPolicy::AutoHandle);
        assert_eq!(decision.reason, "Low complexity action");
    }

    #[test]
    fn assist_mode_splits_on_priority_50() {
        let high = annotated(Some(Classification::Fyi), Some(50), None);
        let low = annotated(Some(Classification::Fyi), Some(49), None);
        assert_eq!(decide(&high, AutomationPolicy::AssistMode).action, Action::QueueApproval);
        assert_eq!(decide(&low, AutomationPolicy::AssistMode).action, Action::SurfaceBrief);
    }

    #[test]
    fn unannotated_message_gets_default_routing() {
        let msg = annotated(None, None, None);
        let decision = decide(&msg, AutomationPolicy::FullDelegate);
        assert_eq!(decision.action, Action::SurfaceBrief);
        assert_eq!(decision.reason, "Default routing for review");
        assert_eq!(decision.confidence, 0.6);
    }

    #[test]
    fn missing_score_defaults_to_midpoint() {
        // Unscored fyi is not treated as low priority (50 >= 30).
        let msg = annotated(Some(Classification::Fyi), None, None);
        let decision = decide(&msg, AutomationPolicy::FullDelegate);
        assert_ne!(decision.action, Action::Archive);
    }

    #[test]
    fn decision_is_deterministic() {
        let msg = annotated(Some(Classification::ActionRequired), Some(55), Some("s"));
        let first = decide(&msg, AutomationPolicy::AutoHandle);
        for _ in 0..10 {
            assert_eq!(decide(&msg, AutomationPolicy::AutoHandle), first);
        }
    }

    #[test]
    fn auto_send_requires_auto_handle_and_threshold() {
        let handle = Decision::new(Action::AutoHandle, "r", 0.8);
        assert!(handle.should_auto_send(DEFAULT_AUTO_SEND_THRESHOLD));

        let low_confidence = Decision::new(Action::AutoHandle, "r", 0.75);
        assert!(!low_confidence.should_auto_send(DEFAULT_AUTO_SEND_THRESHOLD));

        let surfaced = Decision::new(Action::SurfaceBrief, "r", 1.0);
        assert!(!surfaced.should_auto_send(DEFAULT_AUTO_SEND_THRESHOLD));
    }

    #[test]
    fn policy_string_roundtrip() {
        use AutomationPolicy::*;
        for p in [ReadOnly, AssistMode, AutoHandle, FullDelegate] {
            let parsed: AutomationPolicy = p.to_string().parse().unwrap();
            assert_eq!(parsed, p);
        }
        assert!("yolo".parse::<AutomationPolicy>().is_err());
    }

    #[test]
    fn fixed_policy_ignores_user() {
        let source = FixedPolicy(AutomationPolicy::AssistMode);
        assert_eq!(source.policy_for("a"), AutomationPolicy::AssistMode);
        assert_eq!(source.policy_for("b"), AutomationPolicy::AssistMode);
    }
}
