//! Display-name resolution: fallback, truncation, sanitization, de-duplication.

use crate::config::ConvertConfig;
use crate::error::{ConversionIssue, IssueKind};
use rand::seq::SliceRandom;
use std::collections::HashMap;

const UNSAFE_CHARS: &[char] = &[
    '\\', '/', ':', '*', '?', '"', '\'', '<', '>', '|', '+', '=', ',',
];
const TOKEN_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const TOKEN_LEN: usize = 12;
const ELLIPSIS: &str = "...";

/// Batch-scoped count of every finalized base name.
#[derive(Debug, Default)]
pub struct NameRegistry {
    counts: HashMap<String, usize>,
}

impl NameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `name` and return how many times it was seen before.
    fn claim(&mut self, name: &str) -> usize {
        let count = self.counts.entry(name.to_string()).or_insert(0);
        let seen = *count;
        *count += 1;
        seen
    }

    /// Reserve a name carried over from a previous run so new names cannot shadow it.
    pub fn reserve(&mut self, name: &str) {
        self.claim(name);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.counts.contains_key(name)
    }
}

/// Finalized name and the warnings produced on the way.
///
/// Issues carry no path yet; the orchestrator attaches it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub name: String,
    pub issues: Vec<ConversionIssue>,
}

#[derive(Debug, Clone)]
pub struct IdentityResolver {
    max_len: usize,
    empty_template: String,
}

impl IdentityResolver {
    pub fn new(max_len: usize, empty_template: impl Into<String>) -> Self {
        Self {
            max_len,
            empty_template: empty_template.into(),
        }
    }

    pub fn from_config(cfg: &ConvertConfig) -> Self {
        Self::new(cfg.max_name_len, cfg.empty_name_template.clone())
    }

    pub fn resolve(
        &self,
        candidate: &str,
        fallback_id: &str,
        registry: &mut NameRegistry,
    ) -> Resolution {
        let mut issues = Vec::new();
        let hint = identity_hint(fallback_id);

        let mut name = candidate.to_string();
        if name.trim().is_empty() {
            let prefix: String = fallback_id.chars().take(1).collect();
            name = self.empty_template.replacen("{}", &prefix, 1);
            issues.push(
                ConversionIssue::new(
                    IssueKind::EmptyIdentity,
                    "",
                    "Team name is empty or does not exist",
                )
                .with_hint(hint.clone()),
            );
        }

        if self.max_len > 0 && name.chars().count() > self.max_len {
            name = name
                .chars()
                .take(self.max_len - ELLIPSIS.len())
                .collect::<String>()
                + ELLIPSIS;
            issues.push(
                ConversionIssue::new(
                    IssueKind::NameTruncated,
                    "",
                    format!(
                        "(minor) Team name longer than {} chars, truncated",
                        self.max_len
                    ),
                )
                .with_hint(name.clone()),
            );
        }

        let mut base = sanitize(&name);
        if base.is_empty() {
            base = random_token();
            issues.push(
                ConversionIssue::new(
                    IssueKind::NameUnencodable,
                    "",
                    "Team name has no usable characters, replaced with a random token",
                )
                .with_hint(base.clone()),
            );
        }

        let seen = registry.claim(&base);
        let name = if seen > 0 {
            let mut n = seen;
            let mut suffixed = format!("{base}_{n}");
            // A submission may literally be called "Pigs_1".
            while registry.contains(&suffixed) {
                n += 1;
                suffixed = format!("{base}_{n}");
            }
            registry.claim(&suffixed);
            issues.push(
                ConversionIssue::new(
                    IssueKind::DuplicateIdentity,
                    "",
                    format!("Duplicate team name {base}"),
                )
                .with_hint(suffixed.clone()),
            );
            suffixed
        } else {
            base
        };

        Resolution { name, issues }
    }
}

/// Keep printable ASCII minus characters that break file or table names.
pub fn sanitize(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii() && !c.is_ascii_control() && !UNSAFE_CHARS.contains(c))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Short, non-identifying reference to a submission's owner.
pub fn identity_hint(fallback_id: &str) -> String {
    let prefix: String = fallback_id.chars().take(2).collect();
    format!("{prefix}...")
}

fn random_token() -> String {
    let mut rng = rand::thread_rng();
    (0..TOKEN_LEN)
        .filter_map(|_| TOKEN_CHARSET.choose(&mut rng).map(|&b| b as char))
        .collect()
}
