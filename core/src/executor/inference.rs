//! Dependency inference from task descriptions.
//!
//! Used only when a submitted batch carries no explicit dependency edges.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::config::InferenceKind;
use crate::executor::types::Task;

/// Strategy that derives `task id -> dependency ids` for a batch of tasks.
///
/// Every task id must appear as a key in the returned map.
pub trait DependencyInferenceStrategy: Send + Sync {
    fn name(&self) -> &str;

    fn infer(&self, tasks: &[Task]) -> HashMap<String, Vec<String>>;
}

pub fn strategy_for(kind: InferenceKind) -> Box<dyn DependencyInferenceStrategy> {
    match kind {
        InferenceKind::Lexical => Box::new(LexicalInference),
        InferenceKind::Explicit => Box::new(ExplicitOnly),
    }
}

/// Never infers anything; every task stays independent.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExplicitOnly;

impl DependencyInferenceStrategy for ExplicitOnly {
    fn name(&self) -> &str {
        "explicit"
    }

    fn infer(&self, tasks: &[Task]) -> HashMap<String, Vec<String>> {
        tasks
            .iter()
            .map(|t| (t.id().to_string(), Vec::new()))
            .collect()
    }
}

/// Matches "produces" verbs against "consumes" verbs on the object token.
///
/// `"create the schema"` produces `schema`; `"use the schema in the API"`
/// consumes it, so the second task depends on the first.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalInference;

static PRODUCES_REGEX: OnceLock<Regex> = OnceLock::new();
static CONSUMES_REGEX: OnceLock<Regex> = OnceLock::new();

fn produces_regex() -> &'static Regex {
    PRODUCES_REGEX.get_or_init(|| {
        Regex::new(
            r"\b(?:create|implement|build|set\s+up|setup|initialize|add|write)\s+(?:(?:the|a|an|new)\s+)*([a-z][a-z0-9_\-]*)",
        )
        .expect("PRODUCES_REGEX is valid")
    })
}

fn consumes_regex() -> &'static Regex {
    CONSUMES_REGEX.get_or_init(|| {
        Regex::new(
            r"\b(?:use|using|with|integrate|connect\s+to|test|update)\s+(?:(?:the|a|an|new)\s+)*([a-z][a-z0-9_\-]*)",
        )
        .expect("CONSUMES_REGEX is valid")
    })
}

const STOP_WORDS: &[&str] = &[
    "it", "its", "this", "that", "these", "those", "them", "they", "and", "or", "to", "of", "in",
    "on", "for", "from", "by", "all", "any", "some", "each", "every", "more", "other", "another",
    "our", "your", "my", "their", "up",
];

fn object_tokens(re: &Regex, content: &str) -> Vec<String> {
    let lowered = content.to_lowercase();
    let mut tokens: Vec<String> = Vec::new();
    for caps in re.captures_iter(&lowered) {
        let Some(m) = caps.get(1) else { continue };
        let token = m.as_str().trim_end_matches(['-', '_']);
        if token.is_empty() || STOP_WORDS.contains(&token) {
            continue;
        }
        if !tokens.iter().any(|t| t == token) {
            tokens.push(token.to_string());
        }
    }
    tokens
}

impl DependencyInferenceStrategy for LexicalInference {
    fn name(&self) -> &str {
        "lexical"
    }

    fn infer(&self, tasks: &[Task]) -> HashMap<String, Vec<String>> {
        let outputs: Vec<Vec<String>> = tasks
            .iter()
            .map(|t| object_tokens(produces_regex(), &t.content))
            .collect();

        let mut result: HashMap<String, Vec<String>> = HashMap::with_capacity(tasks.len());

        for (idx, task) in tasks.iter().enumerate() {
            let inputs = object_tokens(consumes_regex(), &task.content);
            let mut deps: Vec<String> = Vec::new();

            for input in &inputs {
                // First producer in input order wins
                let producer = tasks
                    .iter()
                    .enumerate()
                    .find(|(other, t)| {
                        *other != idx && t.id() != task.id() && outputs[*other].contains(input)
                    })
                    .map(|(_, t)| t.id().to_string());

                if let Some(dep) = producer {
                    if !deps.contains(&dep) {
                        deps.push(dep);
                    }
                }
            }

            if !deps.is_empty() {
                tracing::debug!(task_id = %task.id(), deps = ?deps, "inferred dependencies");
            }
            result.insert(task.id().to_string(), deps);
        }

        result
    }
}
