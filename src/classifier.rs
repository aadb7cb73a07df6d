/*
 * Golf Caddie CLI - Rust Edition
 * Copyright (c) 2024 Golf Caddie Contributors
 *
 * This work is licensed under the Creative Commons Attribution-NonCommercial 4.0 International License.
 * To view a copy of this license, visit http://creativecommons.org/licenses/by-nc/4.0/
 *
 * You are free to share and adapt this work for non-commercial purposes with attribution.
 * Commercial use is prohibited without explicit written permission.
 *
 * For commercial licensing inquiries, please contact the project maintainers.
 */

use regex::Regex;
use reqwest::Client;
use serde_json::{json, Value};

use crate::config::Config;
use crate::error::CaddieError;
use crate::types::{ClassifiedCommand, CommandParameters, CommandType, Utterance};

/// Fixed directive sent with every classification request. The external
/// service must pick from the closed command set and return one structured
/// object; anything else fails parsing rather than being coerced.
const SYSTEM_DIRECTIVE: &str = "You are the command parser for a golf competition assistant. \
Reply with a single JSON object and nothing else, using exactly these fields: \
\"command_type\", \"parameters\", \"response\". \
\"command_type\" must be one of: start_round, record_score, add_note, ask_question. \
\"parameters\" is an object with what you extracted from the message \
(strokes, hole_number, round_id, course_id, event_id, text as applicable) \
and must echo the player's original words under \"utterance\". \
\"response\" is one short, friendly confirmation sentence for the player.";

/// Turns an utterance plus context hints into a `ClassifiedCommand` via the
/// external language-understanding capability.
pub struct CommandClassifier {
    client: Client,
    api_base: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl CommandClassifier {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            api_base: config.openai.api_base.clone(),
            model: config.openai.model.clone(),
            max_tokens: config.openai.max_tokens,
            temperature: config.openai.temperature,
        }
    }

    pub async fn classify(
        &self,
        utterance: &Utterance,
        credential: &str,
    ) -> Result<ClassifiedCommand, CaddieError> {
        let user_message = build_user_message(utterance);

        let request_body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": SYSTEM_DIRECTIVE},
                {"role": "user", "content": user_message}
            ],
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
            "stream": false
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .header("Authorization", format!("Bearer {}", credential))
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "classification request failed to reach the service");
                CaddieError::ClassificationFailure(format!("transport: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            tracing::warn!(%status, "classification service returned an error");
            return Err(CaddieError::ClassificationFailure(format!(
                "service returned {}",
                status
            )));
        }

        let response_json: Value = response
            .json()
            .await
            .map_err(|e| CaddieError::ClassificationFailure(format!("body read: {}", e)))?;

        let content = response_json
            .get("choices")
            .and_then(|choices| choices.get(0))
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(|content| content.as_str())
            .ok_or_else(|| {
                CaddieError::ClassificationFailure("no completion content in response".to_string())
            })?;

        parse_command(content, &utterance.text)
    }
}

/// Appends the present context hints in a fixed order (round id, hole
/// number, course id, then extras by key) so prompts are reproducible.
fn build_user_message(utterance: &Utterance) -> String {
    let mut message = utterance.text.clone();
    let hints = &utterance.hints;

    if let Some(round_id) = &hints.round_id {
        message.push_str(&format!("\n[context] round_id: {}", round_id));
    }
    if let Some(hole_number) = hints.hole_number {
        message.push_str(&format!("\n[context] hole_number: {}", hole_number));
    }
    if let Some(course_id) = &hints.course_id {
        message.push_str(&format!("\n[context] course_id: {}", course_id));
    }
    for (key, value) in &hints.extra {
        message.push_str(&format!("\n[context] {}: {}", key, value));
    }

    message
}

/// Strict parse of the model reply. Missing structure, an unknown command
/// type or a non-object parameters field all fail; nothing is guessed.
fn parse_command(content: &str, original_utterance: &str) -> Result<ClassifiedCommand, CaddieError> {
    let payload = strip_fences(content);

    let value: Value = serde_json::from_str(payload.trim()).map_err(|e| {
        CaddieError::ClassificationFailure(format!("malformed payload: {}", e))
    })?;

    let command_type_str = value
        .get("command_type")
        .and_then(Value::as_str)
        .ok_or_else(|| CaddieError::ClassificationFailure("missing command_type".to_string()))?;

    let command_type = CommandType::parse(command_type_str).ok_or_else(|| {
        CaddieError::ClassificationFailure(format!("unknown command_type '{}'", command_type_str))
    })?;

    let params = value
        .get("parameters")
        .and_then(Value::as_object)
        .ok_or_else(|| CaddieError::ClassificationFailure("missing parameters object".to_string()))?;

    let response = value
        .get("response")
        .and_then(Value::as_str)
        .ok_or_else(|| CaddieError::ClassificationFailure("missing response text".to_string()))?
        .to_string();

    let echo = params
        .get("utterance")
        .and_then(Value::as_str)
        .unwrap_or(original_utterance)
        .to_string();

    let parameters = match command_type {
        CommandType::StartRound => CommandParameters::StartRound {
            course_id: get_string(params, "course_id"),
            event_id: get_string(params, "event_id"),
            utterance: echo,
        },
        CommandType::RecordScore => CommandParameters::RecordScore {
            strokes: get_u32(params, "strokes"),
            hole_number: get_u32(params, "hole_number"),
            round_id: get_string(params, "round_id"),
            utterance: echo,
        },
        CommandType::AddNote => CommandParameters::AddNote {
            text: get_string(params, "text").unwrap_or_else(|| original_utterance.to_string()),
            round_id: get_string(params, "round_id"),
            utterance: echo,
        },
        CommandType::AskQuestion => CommandParameters::AskQuestion { utterance: echo },
    };

    Ok(ClassifiedCommand {
        command_type,
        parameters,
        response,
    })
}

fn strip_fences(content: &str) -> String {
    let trimmed = content.trim();
    let fence = Regex::new(r"(?s)^```(?:json)?\s*(.+?)\s*```$").expect("static regex");
    match fence.captures(trimmed) {
        Some(caps) => caps[1].to_string(),
        None => trimmed.to_string(),
    }
}

fn get_string(params: &serde_json::Map<String, Value>, key: &str) -> Option<String> {
    match params.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

fn get_u32(params: &serde_json::Map<String, Value>, key: &str) -> Option<u32> {
    match params.get(key) {
        Some(Value::Number(n)) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ContextHints, InteractionKind};

    fn utterance_with_hints() -> Utterance {
        let mut hints = ContextHints {
            round_id: Some("r-42".to_string()),
            hole_number: Some(3),
            course_id: Some("lakeside".to_string()),
            ..Default::default()
        };
        hints.extra.insert("weather".to_string(), "windy".to_string());
        hints.extra.insert("group".to_string(), "b".to_string());
        Utterance::new("I got a 5 on hole 3", InteractionKind::VoiceCommand, hints)
    }

    #[test]
    fn context_suffix_is_ordered_and_deterministic() {
        let message = build_user_message(&utterance_with_hints());
        let round = message.find("round_id: r-42").unwrap();
        let hole = message.find("hole_number: 3").unwrap();
        let course = message.find("course_id: lakeside").unwrap();
        let group = message.find("group: b").unwrap();
        let weather = message.find("weather: windy").unwrap();
        assert!(round < hole && hole < course && course < group && group < weather);

        // Same input, same prompt
        assert_eq!(message, build_user_message(&utterance_with_hints()));
    }

    #[test]
    fn no_hints_means_no_suffix() {
        let u = Utterance::new("start a round", InteractionKind::TextCommand, ContextHints::default());
        assert_eq!(build_user_message(&u), "start a round");
    }

    #[test]
    fn parses_a_record_score_payload() {
        let content = r#"{
            "command_type": "record_score",
            "parameters": {"strokes": 5, "hole_number": 3, "utterance": "I got a 5 on hole 3"},
            "response": "Recorded a 5 on hole 3."
        }"#;
        let command = parse_command(content, "I got a 5 on hole 3").unwrap();
        assert_eq!(command.command_type, CommandType::RecordScore);
        assert_eq!(command.response, "Recorded a 5 on hole 3.");
        match command.parameters {
            CommandParameters::RecordScore {
                strokes,
                hole_number,
                round_id,
                ref utterance,
            } => {
                assert_eq!(strokes, Some(5));
                assert_eq!(hole_number, Some(3));
                assert_eq!(round_id, None);
                assert_eq!(utterance, "I got a 5 on hole 3");
            }
            ref other => panic!("wrong parameter shape: {:?}", other),
        }
    }

    #[test]
    fn accepts_fenced_payloads() {
        let content = "```json\n{\"command_type\": \"ask_question\", \"parameters\": {}, \"response\": \"Par is 4.\"}\n```";
        let command = parse_command(content, "what's par here").unwrap();
        assert_eq!(command.command_type, CommandType::AskQuestion);
        // Echo falls back to the original utterance when the service omits it
        assert_eq!(command.parameters.utterance(), "what's par here");
    }

    #[test]
    fn accepts_numeric_strings_for_strokes() {
        let content = r#"{
            "command_type": "record_score",
            "parameters": {"strokes": "5", "hole_number": "3"},
            "response": "Recorded."
        }"#;
        let command = parse_command(content, "five on three").unwrap();
        match command.parameters {
            CommandParameters::RecordScore { strokes, hole_number, .. } => {
                assert_eq!(strokes, Some(5));
                assert_eq!(hole_number, Some(3));
            }
            ref other => panic!("wrong parameter shape: {:?}", other),
        }
    }

    #[test]
    fn unknown_command_type_is_a_classification_failure() {
        let content = r#"{"command_type": "delete_round", "parameters": {}, "response": "ok"}"#;
        let err = parse_command(content, "delete my round").unwrap_err();
        assert!(matches!(err, CaddieError::ClassificationFailure(_)));
    }

    #[test]
    fn missing_structure_is_a_classification_failure() {
        for content in [
            "not json at all",
            r#"{"command_type": "add_note", "response": "ok"}"#,
            r#"{"command_type": "add_note", "parameters": "flat string", "response": "ok"}"#,
            r#"{"command_type": "add_note", "parameters": {}}"#,
        ] {
            let err = parse_command(content, "note the wind").unwrap_err();
            assert!(matches!(err, CaddieError::ClassificationFailure(_)), "content: {}", content);
        }
    }

    #[tokio::test]
    async fn service_error_surfaces_as_classification_failure() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(503)
            .create_async()
            .await;

        let config = Config {
            openai: crate::config::OpenAiConfig {
                api_key: "app-key".to_string(),
                api_base: server.url(),
                ..Default::default()
            },
            audio: Default::default(),
            data_dir: std::env::temp_dir(),
            temp_dir: std::env::temp_dir(),
            nav_delay_ms: 0,
            verbose_trace: false,
            language: "en".to_string(),
            user_id: None,
        };
        let classifier = CommandClassifier::new(&config);
        let u = Utterance::new("start a round", InteractionKind::TextCommand, ContextHints::default());
        let err = classifier.classify(&u, "app-key").await.unwrap_err();
        assert!(matches!(err, CaddieError::ClassificationFailure(_)));
    }
}
