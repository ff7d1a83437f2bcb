use bepp_core::CanonicalTransaction;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use thiserror::Error;

/// Rules shipped with the crate.
pub const DEFAULT_RULES: &str = include_str!("../rules/narration.toml");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarrationRule {
    pub name: String,
    pub pattern: String,
    /// Replacement text; `${counterparty}` and `${purpose}` refer to the
    /// pattern's named groups.
    pub template: String,
}

#[derive(Debug, Deserialize)]
struct RuleFile {
    #[serde(default, rename = "rule")]
    rules: Vec<NarrationRule>,
}

#[derive(Error, Debug)]
pub enum NarrationError {
    #[error("Failed to parse rules: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Rule '{rule}' has an invalid pattern: {source}")]
    InvalidPattern { rule: String, source: regex::Error },
    #[error("Rule '{rule}' has no 'counterparty' group")]
    MissingCounterparty { rule: String },
    #[error("Rule '{rule}' refers to unknown group '{group}'")]
    UnknownGroup { rule: String, group: String },
}

struct CompiledRule {
    rule: NarrationRule,
    regex: Regex,
}

/// Ordered pattern substitutions that turn bank narrations into
/// `counterparty, purpose` notes.
///
/// Every rule is tried against the output of the rules before it, so a note
/// may be rewritten several times on its way through.
pub struct NarrationCascade {
    rules: Vec<CompiledRule>,
}

impl NarrationCascade {
    pub fn new(rules: Vec<NarrationRule>) -> Result<Self, NarrationError> {
        let rules = rules
            .into_iter()
            .map(compile)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    pub fn from_toml(toml_content: &str) -> Result<Self, NarrationError> {
        let file: RuleFile = toml::from_str(toml_content)?;
        Self::new(file.rules)
    }

    pub fn default_rules() -> Result<Self, NarrationError> {
        Self::from_toml(DEFAULT_RULES)
    }

    pub fn rules(&self) -> impl Iterator<Item = &NarrationRule> {
        self.rules.iter().map(|cr| &cr.rule)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn normalize(&self, note: &str) -> String {
        self.run(note, |_| {})
    }

    /// Names of the rules that fired for `note`, in firing order.
    pub fn applied_rules(&self, note: &str) -> Vec<&str> {
        let mut fired = Vec::new();
        self.run(note, |name| fired.push(name));
        fired
    }

    /// Feeds `note` through every rule in order, reporting each rule that fired.
    fn run<'a>(&'a self, note: &str, mut fired: impl FnMut(&'a str)) -> String {
        let mut current = note.to_string();
        for cr in &self.rules {
            if cr.regex.is_match(&current) {
                current = cr
                    .regex
                    .replace_all(&current, cr.rule.template.as_str())
                    .into_owned();
                fired(cr.rule.name.as_str());
            }
        }
        current
    }

    /// Rewrites every note in place. Returns how many notes changed.
    pub fn apply(&self, transactions: &mut [CanonicalTransaction]) -> usize {
        let mut changed = 0;
        for tx in transactions.iter_mut() {
            let normalized = self.normalize(&tx.note);
            if normalized != tx.note {
                tracing::trace!(before = %tx.note, after = %normalized, "normalized note");
                tx.note = normalized;
                changed += 1;
            }
        }
        changed
    }
}

fn compile(rule: NarrationRule) -> Result<CompiledRule, NarrationError> {
    let regex = RegexBuilder::new(&rule.pattern)
        .case_insensitive(true)
        .build()
        .map_err(|source| NarrationError::InvalidPattern {
            rule: rule.name.clone(),
            source,
        })?;

    let names: Vec<&str> = regex.capture_names().flatten().collect();
    if !names.contains(&"counterparty") {
        return Err(NarrationError::MissingCounterparty { rule: rule.name });
    }

    for caps in template_refs().captures_iter(&rule.template) {
        let Some(group) = caps.get(1).or_else(|| caps.get(2)) else {
            continue;
        };
        let group = group.as_str();
        let known = match group.parse::<usize>() {
            Ok(idx) => idx < regex.captures_len(),
            Err(_) => names.contains(&group),
        };
        if !known {
            return Err(NarrationError::UnknownGroup {
                rule: rule.name,
                group: group.to_string(),
            });
        }
    }

    Ok(CompiledRule { rule, regex })
}

/// `${name}` or `$name` inside a template. `$$` is a literal dollar.
fn template_refs() -> &'static Regex {
    static REFS: OnceLock<Regex> = OnceLock::new();
    REFS.get_or_init(|| {
        Regex::new(r"\$\$|\$\{([A-Za-z0-9_]+)\}|\$([A-Za-z0-9_]+)").expect("invalid regex")
    })
}
