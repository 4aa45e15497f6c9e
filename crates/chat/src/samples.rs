use unolingo_storage::{MessageRecord, MessageRole, SessionRecord};

use crate::message::truncate_title;

pub const SAMPLE_PROMPTS: [&str; 10] = [
    "How do you say \"smacznego\" in English?",
    "Fix the grammar in this sentence: She go to school everyday.",
    "What does the word \"ubiquitous\" mean?",
    "How do I pronounce the word \"thorough\"?",
    "Describe a photo of a dog playing in the park, in simple English.",
    "Translate: Czy mógłbyś mi pomóc znaleźć drogę?",
    "Write a short story about a space journey using the Past Simple tense.",
    "Explain the difference between \"affect\" and \"effect\".",
    "Give me 5 example sentences with the idiom \"break a leg\".",
    "Start a conversation about my favourite hobbies.",
];

/// First-run sessions: one per sample prompt, each with a canned answer.
///
/// Ids count down from `newest_id` so the first prompt is the most recent.
pub fn sample_sessions(newest_id: u64) -> Vec<SessionRecord> {
    SAMPLE_PROMPTS
        .iter()
        .zip(0_u64..)
        .map(|(prompt, offset)| {
            SessionRecord::new(
                newest_id.saturating_sub(offset),
                truncate_title(prompt),
                vec![
                    MessageRecord::new(MessageRole::User, *prompt),
                    MessageRecord::new(
                        MessageRole::Assistant,
                        format!("Sample answer for: \"{prompt}\""),
                    ),
                ],
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::store::MAX_SESSIONS;

    #[test]
    fn samples_fit_the_collection_with_unique_ids() {
        let sessions = sample_sessions(1_000);

        assert_eq!(sessions.len(), MAX_SESSIONS);
        let ids = sessions.iter().map(|session| session.id).collect::<HashSet<_>>();
        assert_eq!(ids.len(), MAX_SESSIONS);
        assert_eq!(sessions[0].id, 1_000);
        assert_eq!(sessions[0].title, SAMPLE_PROMPTS[0]);
        assert_eq!(sessions[0].messages.len(), 2);
    }
}
