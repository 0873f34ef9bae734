//! Prompt construction for the annotation stages.
//!
//! Each stage sends role instructions plus a bounded user prompt and expects
//! a single JSON object back. Keep these tight — they run on every message.

/// System prompt for the classifier stage.
pub const CLASSIFIER_SYSTEM: &str =
    "You are a message classification engine for an executive assistant. \
     Always respond with valid JSON.";

/// System prompt for the priority scorer stage.
pub const SCORER_SYSTEM: &str =
    "You are a priority scoring engine for an executive assistant. \
     Always respond with valid JSON.";

/// System prompt for the summarizer stage.
pub const SUMMARIZER_SYSTEM: &str =
    "You are an executive assistant creating concise message summaries. \
     Always respond with valid JSON.";

/// Build the classifier user prompt.
pub fn build_classifier_prompt(sender: &str, subject: &str, body: &str) -> String {
    format!(
        "Analyze this message and classify it into ONE of these categories:\n\
         - urgent: requires immediate attention (deadlines, time-sensitive matters)\n\
         - action_required: needs a response or action from the user\n\
         - fyi: informational only, no action needed\n\
         - spam: unwanted, promotional, or irrelevant content\n\n\
         Message:\n\
         From: {sender}\n\
         Subject: {subject}\n\
         Body: {body}\n\n\
         Respond ONLY with valid JSON in this exact format:\n\
         {{\"classification\": \"urgent|action_required|fyi|spam\", \
         \"reasoning\": \"brief explanation in one sentence\"}}"
    )
}

/// Build the priority scorer user prompt.
pub fn build_scorer_prompt(
    sender: &str,
    subject: &str,
    body: &str,
    important_contacts: &[String],
    working_hours: &str,
) -> String {
    let contacts = if important_contacts.is_empty() {
        "None specified".to_string()
    } else {
        important_contacts.join(", ")
    };

    format!(
        "Score this message from 1-100 based on these factors:\n\
         - Sender importance (30 points): is this from a VIP contact or important person?\n\
         - Urgency (30 points): urgent keywords, deadlines, or time-sensitive content?\n\
         - Action required (20 points): does it need a response or action?\n\
         - Time sensitivity (20 points): is there a specific deadline or time constraint?\n\n\
         Important contacts: {contacts}\n\
         User's working hours: {working_hours}\n\n\
         Message:\n\
         From: {sender}\n\
         Subject: {subject}\n\
         Body: {body}\n\n\
         Respond ONLY with valid JSON in this exact format:\n\
         {{\"priority_score\": 75, \
         \"factors\": {{\"sender_importance\": 30, \"urgency\": 20, \
         \"action_required\": 15, \"time_sensitivity\": 10}}, \
         \"reasoning\": \"brief explanation in one sentence\"}}"
    )
}

/// Build the summarizer user prompt.
pub fn build_summarizer_prompt(sender: &str, subject: &str, body: &str) -> String {
    format!(
        "Create a concise 2-3 sentence summary that answers:\n\
         1. What is this message about?\n\
         2. What's needed from the user (if anything)?\n\
         3. What's the next action?\n\n\
         Message:\n\
         From: {sender}\n\
         Subject: {subject}\n\
         Body: {body}\n\n\
         Respond ONLY with valid JSON in this exact format:\n\
         {{\"summary\": \"concise 2-3 sentence summary\", \
         \"next_action\": \"specific next step or 'none' if no action needed\"}}"
    )
}
