//! Prompt templating for the stage prompts.

use std::collections::BTreeMap;

/// Substituted when a stage has no retrieved context to show the model.
pub const NO_CONTEXT: &str = "No additional context provided.";

/// Values substituted into a template's `{key}` placeholders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptVars {
    data: BTreeMap<String, String>,
}

impl PromptVars {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(|s| s.as_str())
    }
}

/// Build a prompt string with variable substitution.
///
/// Replaces `{key}` placeholders in the template with values from `vars`.
/// Placeholders without a value are left as they are.
///
/// Use `{{` to insert a literal `{` and `}}` to insert a literal `}`.
///
/// # Example
///
/// ```
/// use medilens::prompt::{render, PromptVars};
///
/// let vars = PromptVars::new().insert("region", "chest");
/// let result = render("Region: {region}, JSON: {{\"key\": \"val\"}}", &vars);
/// assert_eq!(result, r#"Region: chest, JSON: {"key": "val"}"#);
/// ```
pub fn render(template: &str, vars: &PromptVars) -> String {
    let mut rendered = String::with_capacity(template.len());
    let mut rest = template;

    // Single pass: substituted values are written once and never rescanned.
    while let Some(pos) = rest.find(['{', '}']) {
        rendered.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        if tail.starts_with("{{") {
            rendered.push('{');
            rest = &tail[2..];
            continue;
        }
        if tail.starts_with("}}") {
            rendered.push('}');
            rest = &tail[2..];
            continue;
        }
        if tail.starts_with('{') {
            if let Some(end) = tail.find('}') {
                let key = &tail[1..end];
                if !key.contains('{') {
                    if let Some(value) = vars.get(key) {
                        rendered.push_str(value);
                        rest = &tail[end + 1..];
                        continue;
                    }
                }
            }
        }

        // Lone brace or unknown placeholder: keep it literally.
        rendered.push_str(&tail[..1]);
        rest = &tail[1..];
    }

    rendered.push_str(rest);
    rendered
}

/// `context`, or [`NO_CONTEXT`] when it is blank.
pub fn context_or_default(context: &str) -> &str {
    if context.trim().is_empty() {
        NO_CONTEXT
    } else {
        context
    }
}

/// Join items with `", "`, the inline list form used in stage prompts.
pub fn inline_list(items: &[String]) -> String {
    items.join(", ")
}

/// Create a numbered list from items (1-indexed).
pub fn numbered_list(items: &[String]) -> String {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| format!("{}. {}", i + 1, item))
        .collect::<Vec<_>>()
        .join("\n")
}
