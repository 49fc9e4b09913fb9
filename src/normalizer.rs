//! Pipeline text normalization
//!
//! Folds legacy stage spellings and memory annotations into their current
//! equivalents and drops filter stages made redundant by inference stages that
//! accept the memory type natively. The rules form an ordered table: a later
//! rule may rely on an earlier rewrite (the decoder rules expect `vaapi*`
//! names to have been folded to `va*` already).
//!
//! The table is applied in order, and the whole pass repeats until nothing
//! changes, so normalization is idempotent.

use regex::Regex;

/// Built-in rule table: (pattern, replacement), applied in order
pub const BUILTIN_RULES: &[(&str, &str)] = &[
    ("vaapi", "va"),
    ("memory:VASurface", "memory:VAMemory"),
    (
        r"! capsfilter caps=video/x-raw\(memory:VAMemory\) !(.*(gvadetect|gvaclassify))",
        "!${1}",
    ),
    (
        r"! video/x-raw\(memory:VAMemory\) !(.*(gvadetect|gvaclassify))",
        "!${1}",
    ),
    (r"parsebin ! vah\w*dec", "decodebin3"),
    (r"\w*parse ! vah\w*dec", "decodebin3"),
    (r"\bdecodebin\b", "decodebin3"),
];

/// One pattern -> replacement rewrite
#[derive(Debug, Clone)]
pub struct RewriteRule {
    pattern: Regex,
    replacement: String,
}

impl RewriteRule {
    pub fn new(pattern: &str, replacement: impl Into<String>) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            replacement: replacement.into(),
        })
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    /// Rewrite `text` if the rule matches; `None` when it does not
    fn apply(&self, text: &str) -> Option<String> {
        if !self.pattern.is_match(text) {
            return None;
        }
        let rewritten = self.pattern.replace_all(text, self.replacement.as_str());
        (rewritten != text).then(|| rewritten.into_owned())
    }
}

/// Ordered rule table applied to serialized pipelines
#[derive(Debug, Clone)]
pub struct Normalizer {
    rules: Vec<RewriteRule>,
}

impl Default for Normalizer {
    fn default() -> Self {
        let rules = BUILTIN_RULES
            .iter()
            .filter_map(|(pattern, replacement)| match RewriteRule::new(pattern, *replacement) {
                Ok(rule) => Some(rule),
                Err(e) => {
                    tracing::error!(pattern, error = %e, "Skipping invalid rewrite rule");
                    None
                }
            })
            .collect();
        Self { rules }
    }
}

impl Normalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rules(rules: Vec<RewriteRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[RewriteRule] {
        &self.rules
    }

    /// Rewrite a serialized pipeline until no rule matches. Total: unmatched
    /// rules are no-ops.
    pub fn normalize(&self, text: &str) -> String {
        // Built-in rules either shorten the text or fire once per occurrence,
        // so they reach a fixpoint well inside this bound
        let max_passes = text.len() + self.rules.len() + 1;

        let mut current = text.to_string();
        for pass in 0..max_passes {
            let mut changed = false;
            for rule in &self.rules {
                if let Some(rewritten) = rule.apply(&current) {
                    tracing::debug!(rule = rule.pattern(), "Applied rewrite rule");
                    current = rewritten;
                    changed = true;
                }
            }
            if !changed {
                return current;
            }
            tracing::trace!(pass, "Normalization pass changed the pipeline");
        }
        tracing::warn!("Normalization did not settle after {} passes", max_passes);
        current
    }
}
