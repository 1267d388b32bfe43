//! Channel classification
//!
//! Ordered pattern rules assign every raw channel name a group and a logo
//! identity. Rules are evaluated first-match-wins, group rules and logo rules
//! independently of each other. Rule sets are compiled once from
//! configuration; nothing here performs I/O.

use regex::{Captures, Regex};

use crate::config::RulesConfig;
use crate::errors::{AppError, AppResult};

/// A group rule: names matching `pattern` belong to `group`
#[derive(Debug, Clone)]
pub struct GroupRule {
    pattern: Regex,
    group: String,
}

/// Piece of a compiled logo template
#[derive(Debug, Clone, PartialEq, Eq)]
enum TemplatePart {
    Literal(String),
    Capture(usize),
}

/// A logo rule: names matching `pattern` get the instantiated template
#[derive(Debug, Clone)]
pub struct LogoRule {
    pattern: Regex,
    template: Vec<TemplatePart>,
}

/// Result of classifying one channel name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub group: String,
    pub logo_identity: String,
}

/// Compiled, immutable rule set
#[derive(Debug, Clone)]
pub struct ClassificationRules {
    exclude: Vec<Regex>,
    groups: Vec<GroupRule>,
    logos: Vec<LogoRule>,
    default_group: String,
}

fn compile_pattern(pattern: &str) -> AppResult<Regex> {
    Regex::new(pattern)
        .map_err(|e| AppError::configuration(format!("Invalid rule pattern '{pattern}': {e}")))
}

/// Split a template like `CCTV$1HD` into literal and capture parts, checking
/// every `$N` against the number of groups the pattern produces.
fn compile_template(template: &str, pattern: &Regex) -> AppResult<Vec<TemplatePart>> {
    let reference = compile_pattern(r"\$(\d+)")?;
    let group_count = pattern.captures_len();
    let mut parts = Vec::new();
    let mut last = 0;

    for cap in reference.captures_iter(template) {
        let (Some(whole), Some(digits)) = (cap.get(0), cap.get(1)) else {
            continue;
        };
        let index: usize = digits.as_str().parse().map_err(|_| {
            AppError::configuration(format!(
                "Capture reference '{}' in template '{template}' is out of range",
                whole.as_str()
            ))
        })?;
        if index >= group_count {
            return Err(AppError::configuration(format!(
                "Template '{template}' references ${index} but pattern '{}' has {} capture group(s)",
                pattern.as_str(),
                group_count - 1
            )));
        }
        if whole.start() > last {
            parts.push(TemplatePart::Literal(template[last..whole.start()].to_string()));
        }
        parts.push(TemplatePart::Capture(index));
        last = whole.end();
    }
    if last < template.len() {
        parts.push(TemplatePart::Literal(template[last..].to_string()));
    }

    Ok(parts)
}

impl LogoRule {
    fn instantiate(&self, captures: &Captures<'_>) -> String {
        self.template
            .iter()
            .map(|part| match part {
                TemplatePart::Literal(text) => text.as_str(),
                // unmatched optional groups substitute as empty
                TemplatePart::Capture(index) => {
                    captures.get(*index).map_or("", |m| m.as_str())
                }
            })
            .collect()
    }
}

impl ClassificationRules {
    /// Compile a rule set. Any invalid pattern or template rejects the whole
    /// set.
    pub fn compile(config: &RulesConfig) -> AppResult<Self> {
        let exclude = config
            .exclude
            .iter()
            .map(|pattern| compile_pattern(pattern))
            .collect::<AppResult<Vec<_>>>()?;

        let groups = config
            .groups
            .iter()
            .map(|rule| {
                Ok(GroupRule {
                    pattern: compile_pattern(&rule.pattern)?,
                    group: rule.group.clone(),
                })
            })
            .collect::<AppResult<Vec<_>>>()?;

        let logos = config
            .logos
            .iter()
            .map(|rule| {
                let pattern = compile_pattern(&rule.pattern)?;
                let template = compile_template(&rule.logo, &pattern)?;
                Ok(LogoRule { pattern, template })
            })
            .collect::<AppResult<Vec<_>>>()?;

        Ok(Self {
            exclude,
            groups,
            logos,
            default_group: config.default_group.clone(),
        })
    }

    /// Whether the channel name hits an exclusion pattern
    pub fn is_excluded(&self, raw_name: &str) -> bool {
        self.exclude.iter().any(|pattern| pattern.is_match(raw_name))
    }

    pub fn classify(&self, raw_name: &str) -> Classification {
        let group = self
            .groups
            .iter()
            .find(|rule| rule.pattern.is_match(raw_name))
            .map_or_else(|| self.default_group.clone(), |rule| rule.group.clone());

        let logo_identity = self
            .logos
            .iter()
            .find_map(|rule| {
                rule.pattern
                    .captures(raw_name)
                    .map(|captures| rule.instantiate(&captures))
            })
            .unwrap_or_else(|| raw_name.to_string());

        Classification {
            group,
            logo_identity,
        }
    }
}
