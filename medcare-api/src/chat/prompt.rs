use serde_json::Value;

const PREAMBLE: &str = "You are MedCare AI, a helpful medical assistant. \
Analyze the user's symptoms or questions and provide general medical advice. \
IMPORTANT: Always advise the user to consult a real doctor for serious issues. ";

const CLOSING_GUIDANCE: &str = "Do not make definitive diagnoses. \
If context is provided, assume it is a potential condition to discuss.\n\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorTurn {
    pub role: Role,
    pub content: String,
}

/// Full prompt sent upstream: safety preamble, caller context, then the
/// user's message.
pub fn build_prompt(message: &str, context: &str) -> String {
    format!(
        "{PREAMBLE}Context Info: {context}\n{CLOSING_GUIDANCE}User: {message}\nMedCare AI:"
    )
}

/// Best-effort reading of caller-supplied history. Entries are accepted as
/// `{role, content}`, `{role, text}` or bare strings (treated as user turns);
/// anything else is skipped.
pub fn parse_history(history: &[Value]) -> Vec<PriorTurn> {
    history.iter().filter_map(parse_turn).collect()
}

fn parse_turn(entry: &Value) -> Option<PriorTurn> {
    match entry {
        Value::String(text) => Some(PriorTurn {
            role: Role::User,
            content: text.clone(),
        }),
        Value::Object(fields) => {
            let content = fields
                .get("content")
                .or_else(|| fields.get("text"))
                .and_then(Value::as_str)?;
            let role = match fields.get("role").and_then(Value::as_str) {
                Some("assistant") | Some("model") => Role::Assistant,
                Some("system") => Role::System,
                Some("user") | None => Role::User,
                Some(_) => return None,
            };
            Some(PriorTurn {
                role,
                content: content.to_string(),
            })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_prompt_layout() {
        let prompt = build_prompt("I have a fever", "Patient Diagnosis: Influenza");

        assert!(prompt.starts_with("You are MedCare AI"));
        assert!(prompt.contains("consult a real doctor"));
        assert!(prompt.contains("Context Info: Patient Diagnosis: Influenza\n"));
        assert!(prompt.ends_with("User: I have a fever\nMedCare AI:"));

        let context_at = prompt.find("Context Info").unwrap();
        let user_at = prompt.find("User:").unwrap();
        assert!(context_at < user_at);
    }

    #[test]
    fn test_history_shapes() {
        let history = vec![
            json!({"role": "user", "content": "hello"}),
            json!({"role": "model", "text": "hi there"}),
            json!("bare string"),
            json!({"role": "tool", "content": "skipped"}),
            json!(42),
            json!({"role": "assistant"}),
        ];

        let turns = parse_history(&history);
        assert_eq!(
            turns,
            vec![
                PriorTurn { role: Role::User, content: "hello".into() },
                PriorTurn { role: Role::Assistant, content: "hi there".into() },
                PriorTurn { role: Role::User, content: "bare string".into() },
            ]
        );
    }
}
