use std::collections::BTreeSet;

use regex::Regex;

use crate::message::MessageFeatures;

/// Classification outcome for one message, carrying the matched pattern
/// (or harvested address) for logging. Produced by the engine, consumed
/// immediately by the account processor, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Keep,
    /// Message sat in a folder literally named "blacklist": confirmed spam
    /// sample, its sender and IP become new signals.
    DeleteBlacklistFolder { address: String },
    DeleteIpMatch { pattern: String },
    DeleteFuzzyFromMatch { pattern: String },
    DeleteSubstringFromMatch { pattern: String },
    DeleteSubjectMatch { pattern: String },
    MoveWhitelist { pattern: String },
}

impl Verdict {
    pub fn reason(&self) -> String {
        match self {
            Verdict::Keep => "kept".to_string(),
            Verdict::DeleteBlacklistFolder { address } => {
                format!("deleted on blacklist folder ({address})")
            }
            Verdict::DeleteIpMatch { pattern } => format!("deleted on IP ({pattern})"),
            Verdict::DeleteFuzzyFromMatch { pattern } => {
                format!("deleted on From-ratio ({pattern})")
            }
            Verdict::DeleteSubstringFromMatch { pattern } => {
                format!("deleted on in-From ({pattern})")
            }
            Verdict::DeleteSubjectMatch { pattern } => format!("deleted on Subject ({pattern})"),
            Verdict::MoveWhitelist { pattern } => format!("moved on whitelist ({pattern})"),
        }
    }

    /// Whether this verdict persists the message's originating IP as a new
    /// blacklist signal. An IP match appends nothing: the pattern that
    /// matched is already on the list.
    pub fn records_ip_signal(&self) -> bool {
        matches!(
            self,
            Verdict::DeleteFuzzyFromMatch { .. }
                | Verdict::DeleteSubstringFromMatch { .. }
                | Verdict::DeleteSubjectMatch { .. }
        )
    }
}

struct BlacklistPattern {
    raw: String,
    lowered: String,
    /// Pre-compiled for the IP rule; patterns that are not valid regexes
    /// fall back to a literal substring test against the IP.
    regex: Option<Regex>,
}

/// Evaluates message features against the blacklist loaded at pass start.
/// Signals appended mid-pass take effect on the next run.
pub struct Classifier {
    patterns: Vec<BlacklistPattern>,
}

/// Minimum full-string similarity (0-100) between a blacklist pattern and
/// the sender for the fuzzy rule to fire.
pub const FUZZY_THRESHOLD: f64 = 60.0;

impl Classifier {
    pub fn new(patterns: &BTreeSet<String>) -> Self {
        let patterns = patterns
            .iter()
            .map(|p| BlacklistPattern {
                raw: p.clone(),
                lowered: p.to_lowercase(),
                regex: Regex::new(p).ok(),
            })
            .collect();
        Classifier { patterns }
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Folders with this name hold confirmed spam samples; every message
    /// in them is harvested and deleted regardless of the cascade.
    pub fn is_harvest_folder(folder: &str) -> bool {
        folder.trim().eq_ignore_ascii_case("blacklist")
    }

    /// The ordered rule cascade, short-circuiting on first match:
    /// IP regex match, fuzzy sender match, substring sender match,
    /// substring subject match, otherwise Keep. Messages lacking either a
    /// sender or an originating IP are kept without evaluation.
    pub fn classify(&self, features: &MessageFeatures) -> Verdict {
        let (Some(sender), Some(ip)) = (&features.sender, &features.origin_ip) else {
            return Verdict::Keep;
        };

        for pattern in &self.patterns {
            if pattern.matches_ip(ip) {
                return Verdict::DeleteIpMatch {
                    pattern: pattern.raw.clone(),
                };
            }
        }

        let sender_lower = sender.to_lowercase();
        for pattern in &self.patterns {
            if fuzzy_ratio(&pattern.lowered, &sender_lower) >= FUZZY_THRESHOLD {
                return Verdict::DeleteFuzzyFromMatch {
                    pattern: pattern.raw.clone(),
                };
            }
        }

        for pattern in &self.patterns {
            if sender_lower.contains(&pattern.lowered) {
                return Verdict::DeleteSubstringFromMatch {
                    pattern: pattern.raw.clone(),
                };
            }
        }

        if let Some(subject) = &features.subject {
            let subject_lower = subject.to_lowercase();
            for pattern in &self.patterns {
                if subject_lower.contains(&pattern.lowered) {
                    return Verdict::DeleteSubjectMatch {
                        pattern: pattern.raw.clone(),
                    };
                }
            }
        }

        Verdict::Keep
    }
}

impl BlacklistPattern {
    fn matches_ip(&self, ip: &str) -> bool {
        match &self.regex {
            Some(regex) => regex.is_match(ip),
            None => ip.contains(&self.raw),
        }
    }
}

/// Edit-distance similarity over the full strings, scaled to 0-100.
fn fuzzy_ratio(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(a, b) * 100.0
}

/// Whitelist matching is a case-sensitive substring test against the raw
/// From header value; no list mutation on match.
pub fn whitelist_match<'a>(patterns: &'a BTreeSet<String>, raw_from: &str) -> Option<&'a str> {
    patterns
        .iter()
        .map(String::as_str)
        .find(|pattern| raw_from.contains(*pattern))
}
