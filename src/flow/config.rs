//! Bot configuration types and load-time normalization

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use thiserror::Error;

/// Branch key that matches any answer on a text node
pub const ANY_ANSWER: &str = "";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Configuration is missing {0}")]
    MissingField(&'static str),
    #[error("Node identifier must not be empty")]
    EmptyNodeId,
    #[error("Duplicate node id: {0}")]
    DuplicateNode(String),
    #[error("Node {0} is a choice question without options")]
    MissingOptions(String),
    #[error("Node {node} lists option value {value:?} more than once")]
    DuplicateOption { node: String, value: String },
    #[error("Node {node} routes answer {value:?} to both {first} and {second}")]
    ContradictoryBranch {
        node: String,
        value: String,
        first: String,
        second: String,
    },
}

/// Kind of question a node asks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Text,
    MultipleChoice,
    YesNo,
}

impl NodeKind {
    pub fn is_choice(self) -> bool {
        matches!(self, NodeKind::MultipleChoice | NodeKind::YesNo)
    }
}

/// Where the flow goes after a node is answered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NextStep {
    /// Unconditional jump
    Node(String),
    /// Answer value -> node id
    Branch(BTreeMap<String, String>),
}

impl NextStep {
    fn targets(&self) -> Vec<&str> {
        match self {
            NextStep::Node(id) => vec![id.as_str()],
            NextStep::Branch(map) => map.values().map(String::as_str).collect(),
        }
    }
}

/// A selectable answer on a choice node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawOption")]
pub struct AnswerOption {
    pub label: String,
    pub value: String,
    /// Per-option branch target; folded into the node's `next` map on load
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
}

impl AnswerOption {
    pub fn plain(value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            label: value.clone(),
            value,
            next: None,
        }
    }
}

/// Options may be bare strings or `{label, value, next}` objects
#[derive(Deserialize)]
#[serde(untagged)]
enum RawOption {
    Plain(String),
    Detailed {
        label: String,
        #[serde(default)]
        value: Option<String>,
        #[serde(default)]
        next: Option<String>,
    },
}

impl From<RawOption> for AnswerOption {
    fn from(raw: RawOption) -> Self {
        match raw {
            RawOption::Plain(value) => AnswerOption::plain(value),
            RawOption::Detailed { label, value, next } => Self {
                value: value.unwrap_or_else(|| label.clone()),
                label,
                next,
            },
        }
    }
}

/// One question in a configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionNode {
    pub id: String,
    pub question: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<AnswerOption>,
    #[serde(default, alias = "nextStep", skip_serializing_if = "Option::is_none")]
    pub next: Option<NextStep>,
    /// Keywords carried for the admin tooling; the engine ignores them
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub triggers: Vec<String>,
}

impl QuestionNode {
    /// Find the option an answer selects, by value first and then by label
    pub fn option_for(&self, answer: &str) -> Option<&AnswerOption> {
        self.options
            .iter()
            .find(|opt| opt.value == answer)
            .or_else(|| self.options.iter().find(|opt| opt.label == answer))
    }

    fn normalize(&mut self) -> Result<(), ConfigError> {
        if !self.kind.is_choice() {
            return Ok(());
        }

        if self.options.is_empty() {
            if self.kind == NodeKind::YesNo {
                self.options = vec![AnswerOption::plain("Yes"), AnswerOption::plain("No")];
            } else {
                return Err(ConfigError::MissingOptions(self.id.clone()));
            }
        }

        let mut values = HashSet::new();
        for opt in &self.options {
            if !values.insert(opt.value.as_str()) {
                return Err(ConfigError::DuplicateOption {
                    node: self.id.clone(),
                    value: opt.value.clone(),
                });
            }
        }

        let overrides: Vec<(String, String)> = self
            .options
            .iter_mut()
            .filter_map(|opt| opt.next.take().map(|target| (opt.value.clone(), target)))
            .collect();
        if overrides.is_empty() {
            return Ok(());
        }

        // A scalar `next` on a choice node applies to every option
        let mut branch = match self.next.take() {
            None => BTreeMap::new(),
            Some(NextStep::Branch(map)) => map,
            Some(NextStep::Node(target)) => self
                .options
                .iter()
                .map(|opt| (opt.value.clone(), target.clone()))
                .collect(),
        };

        for (value, target) in overrides {
            if let Some(existing) = branch.get(&value) {
                if *existing != target {
                    return Err(ConfigError::ContradictoryBranch {
                        node: self.id.clone(),
                        first: existing.clone(),
                        value,
                        second: target,
                    });
                }
            }
            branch.insert(value, target);
        }

        self.next = Some(NextStep::Branch(branch));
        Ok(())
    }
}

/// A named, branching question tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotConfiguration {
    pub id: String,
    pub name: String,
    pub description: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub flows: Vec<QuestionNode>,
}

impl BotConfiguration {
    /// Parse and normalize a single configuration document
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.normalize()
    }

    /// Validate identifiers and fold option-level branch targets into the
    /// node-level `next` map, so the engine sees a single representation.
    pub fn normalize(mut self) -> Result<Self, ConfigError> {
        if self.id.trim().is_empty() {
            return Err(ConfigError::MissingField("id"));
        }
        if self.name.trim().is_empty() {
            return Err(ConfigError::MissingField("name"));
        }

        {
            let mut seen = HashSet::new();
            for node in &self.flows {
                if node.id.trim().is_empty() {
                    return Err(ConfigError::EmptyNodeId);
                }
                if !seen.insert(node.id.as_str()) {
                    return Err(ConfigError::DuplicateNode(node.id.clone()));
                }
            }
        }

        for node in &mut self.flows {
            node.normalize()?;
        }

        for (node, target) in self.dangling_targets() {
            tracing::warn!(
                config_id = %self.id,
                node = %node,
                target = %target,
                "Transition target does not exist; answering this branch ends the conversation"
            );
        }

        Ok(self)
    }

    pub fn node(&self, id: &str) -> Option<&QuestionNode> {
        self.flows.iter().find(|node| node.id == id)
    }

    pub fn first_node(&self) -> Option<&QuestionNode> {
        self.flows.first()
    }

    /// `(node, target)` pairs whose target names no node in this configuration
    pub fn dangling_targets(&self) -> Vec<(String, String)> {
        self.flows
            .iter()
            .filter_map(|node| node.next.as_ref().map(|next| (node, next)))
            .flat_map(|(node, next)| {
                next.targets()
                    .into_iter()
                    .filter(|target| !target.is_empty() && self.node(target).is_none())
                    .map(|target| (node.id.clone(), target.to_string()))
                    .collect::<Vec<_>>()
            })
            .collect()
    }
}
