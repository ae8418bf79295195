//! Prompt construction for the inference server.
//!
//! A prompt is the persona instruction for the selected mode, a transcript of
//! the most recent stored turns, the new user message, and a trailing
//! `Assistant:` cue telling the model to continue from that point.

use crate::session::{Role, Turn};

/// Maximum number of stored turns replayed into a prompt. Older turns stay
/// in the session but never reach the model again.
pub const HISTORY_WINDOW: usize = 16;

/// Persona selector for the system instruction prefixed to every prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    CustomerSupport,
    StudyHelper,
    BusinessAssistant,
    VirtualAssistant,
    InterviewAi,
}

impl Mode {
    /// Parse a mode name. Unrecognized values fall back to `VirtualAssistant`.
    pub fn parse(value: &str) -> Self {
        match value {
            "customer_support" => Self::CustomerSupport,
            "study_helper" => Self::StudyHelper,
            "business_assistant" => Self::BusinessAssistant,
            "virtual_assistant" => Self::VirtualAssistant,
            "interview_ai" => Self::InterviewAi,
            _ => Self::VirtualAssistant,
        }
    }

    /// The fixed instruction string for this persona.
    pub fn instruction(&self) -> &'static str {
        match self {
            Self::CustomerSupport => {
                "You are a patient customer support agent. Answer politely, ask clarifying \
                 questions when a request is ambiguous, and keep replies short and actionable."
            }
            Self::StudyHelper => {
                "You are a study helper. Explain concepts step by step in plain language and \
                 check the student's understanding before moving on."
            }
            Self::BusinessAssistant => {
                "You are a professional business assistant. Be concise, structured, and \
                 formal; prefer bullet points for lists of actions."
            }
            Self::VirtualAssistant => {
                "You are a helpful virtual assistant. Answer clearly and concisely."
            }
            Self::InterviewAi => {
                "You are an interview coach. Ask one question at a time, then give brief \
                 constructive feedback on the candidate's answer."
            }
        }
    }
}

/// Build the full prompt text for one exchange. Pure and side-effect-free.
///
/// Only the most recent [`HISTORY_WINDOW`] turns of `history` are rendered,
/// oldest first.
pub fn build_prompt(mode: Mode, history: &[Turn], new_message: &str) -> String {
    let start = history.len().saturating_sub(HISTORY_WINDOW);

    let mut prompt = String::from(mode.instruction());
    prompt.push_str("\n\n");

    for turn in &history[start..] {
        let label = match turn.role {
            Role::User => "User",
            Role::Assistant => "Assistant",
        };
        prompt.push_str(label);
        prompt.push_str(": ");
        prompt.push_str(&turn.content);
        prompt.push('\n');
    }

    prompt.push_str("User: ");
    prompt.push_str(new_message);
    prompt.push_str("\nAssistant:");
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Turn;

    #[test]
    fn test_parse_known_modes() {
        assert_eq!(Mode::parse("customer_support"), Mode::CustomerSupport);
        assert_eq!(Mode::parse("study_helper"), Mode::StudyHelper);
        assert_eq!(Mode::parse("business_assistant"), Mode::BusinessAssistant);
        assert_eq!(Mode::parse("virtual_assistant"), Mode::VirtualAssistant);
        assert_eq!(Mode::parse("interview_ai"), Mode::InterviewAi);
    }

    #[test]
    fn test_parse_unknown_falls_back_to_virtual_assistant() {
        assert_eq!(Mode::parse(""), Mode::VirtualAssistant);
        assert_eq!(Mode::parse("pirate"), Mode::VirtualAssistant);
        assert_eq!(Mode::parse("CUSTOMER_SUPPORT"), Mode::VirtualAssistant);
    }

    #[test]
    fn test_empty_history_renders_instruction_and_user_line() {
        let prompt = build_prompt(Mode::VirtualAssistant, &[], "hello");
        let expected = format!(
            "{}\n\nUser: hello\nAssistant:",
            Mode::VirtualAssistant.instruction()
        );
        assert_eq!(prompt, expected);
    }

    #[test]
    fn test_history_is_rendered_in_order() {
        let history = vec![
            Turn::user("one"),
            Turn::assistant("two"),
            Turn::user("three"),
        ];
        let prompt = build_prompt(Mode::StudyHelper, &history, "four");

        let expected = format!(
            "{}\n\nUser: one\nAssistant: two\nUser: three\nUser: four\nAssistant:",
            Mode::StudyHelper.instruction()
        );
        assert_eq!(prompt, expected);
    }

    #[test]
    fn test_history_capped_to_most_recent_window() {
        // 20 prior turns; only the last 16 may appear
        let history: Vec<Turn> = (0..20).map(|i| Turn::user(format!("msg-{i}"))).collect();
        let prompt = build_prompt(Mode::VirtualAssistant, &history, "latest");

        for i in 0..4 {
            assert!(
                !prompt.contains(&format!("msg-{i}\n")),
                "old turn msg-{i} leaked into prompt"
            );
        }
        for i in 4..20 {
            assert!(prompt.contains(&format!("User: msg-{i}\n")));
        }
        // Order preserved
        let pos_4 = prompt.find("msg-4").unwrap();
        let pos_19 = prompt.find("msg-19").unwrap();
        assert!(pos_4 < pos_19);
    }

    #[test]
    fn test_exactly_window_sized_history_fully_rendered() {
        let history: Vec<Turn> = (0..HISTORY_WINDOW)
            .map(|i| Turn::user(format!("m{i}")))
            .collect();
        let prompt = build_prompt(Mode::VirtualAssistant, &history, "x");
        for i in 0..HISTORY_WINDOW {
            assert!(prompt.contains(&format!("User: m{i}\n")));
        }
    }

    #[test]
    fn test_trailing_assistant_cue_has_no_content() {
        let prompt = build_prompt(Mode::BusinessAssistant, &[], "plan my week");
        assert!(prompt.ends_with("\nAssistant:"));
    }
}
