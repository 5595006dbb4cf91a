//! Builders for flow tests

use super::config::{AnswerOption, BotConfiguration, NextStep, NodeKind, QuestionNode};
use chrono::{TimeZone, Utc};
use std::collections::BTreeMap;

pub fn config(flows: Vec<QuestionNode>) -> BotConfiguration {
    let stamp = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    BotConfiguration {
        id: "test-config".to_string(),
        name: "Test Bot".to_string(),
        description: "Built by tests".to_string(),
        is_active: true,
        created_at: stamp,
        updated_at: stamp,
        flows,
    }
}

pub fn text(id: &str, next: Option<NextStep>) -> QuestionNode {
    QuestionNode {
        id: id.to_string(),
        question: format!("Question {id}?"),
        kind: NodeKind::Text,
        required: true,
        options: vec![],
        next,
        triggers: vec![],
    }
}

pub fn choice(id: &str, options: &[&str], next: Option<NextStep>) -> QuestionNode {
    QuestionNode {
        kind: NodeKind::MultipleChoice,
        options: options.iter().map(|o| AnswerOption::plain(*o)).collect(),
        ..text(id, next)
    }
}

pub fn branch(pairs: &[(&str, &str)]) -> NextStep {
    NextStep::Branch(
        pairs
            .iter()
            .map(|(value, target)| ((*value).to_string(), (*target).to_string()))
            .collect::<BTreeMap<_, _>>(),
    )
}
