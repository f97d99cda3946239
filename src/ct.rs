//! Normalization of free-text qPCR cycle threshold (Ct) values.
//!
//! Ct values are typed in by hand or pasted from instrument exports, so the
//! same reading shows up as `21.3`, `(Ct. 21.3)`, `E:21.3`, `21.3 PANTHER`
//! and so on. [`normalize`] reduces such a value to the numeral embedded in
//! it, to the empty string if it is known to carry no measurement, or leaves
//! it alone if none of the rules below recognize it.

use lazy_static::lazy_static;
use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    /// Keep capture group 1, wherever the pattern matches
    Extract,
    /// Replace the whole value with the empty string
    Discard,
}

struct Rule {
    name: &'static str,
    re: Regex,
    action: Action,
}

impl Rule {
    /// A rule that searches the whole value for a recoverable numeral
    fn extract(name: &'static str, pattern: &str) -> Self {
        Rule {
            name,
            re: Regex::new(pattern).unwrap(),
            action: Action::Extract,
        }
    }

    /// A rule for junk values, matched at the start of the value only
    fn discard(name: &'static str, pattern: &str) -> Self {
        Rule {
            name,
            re: Regex::new(&format!("^(?:{})", pattern)).unwrap(),
            action: Action::Discard,
        }
    }
}

lazy_static! {
    static ref CLEAN_DECIMAL: Regex = Regex::new(r"^\d+\.\d+$").unwrap();

    // Order matters. The first matching rule decides, extraction rules are
    // all tried before any discard rule.
    static ref RULES: Vec<Rule> = vec![
        Rule::extract("integer", r"^(\d+)$"),                                 // "36"
        Rule::extract("ct-phrase", r"\(Ct\.\s+(\d+\.\d+)\)"),                 // "(Ct. 21.3)"
        Rule::extract("separator", r"[:=-][\s+]?(\d+\.\d+)"),                 // "CT=22.1", "E:20.5"
        Rule::extract("duplicate", r"(\d+\.\d+)\s+\d+\.\d+"),                 // "27.6   27.6"
        Rule::extract("keyed-second", r"[A-Z][:=]\d+\s+(\d+\.\d+)"),          // "E=1038   10.38"
        Rule::extract("letter-spaced", r"[A-Z]\s+(\d+\.\d+)"),                // "NAT   28.2"
        Rule::extract("letter-glued", r"[A-Z]+(\d+\.\d+)"),                   // "EL31.13"
        Rule::extract("integer-spaced", r"\d+\s+(\d+\.\d+)"),                 // "24  24.00"
        Rule::extract("instrument", r"(\d+\.\d+)\s+[A-Za-z]+"),               // "33.21 PANTHER"
        Rule::extract("tag-decimal", r"[A-Za-z0-9]+[:=]-?\s+(\d+\.\d+)"),     // "E:-   36.8"
        Rule::extract("tag-integer", r"[A-Za-z0-9]+[:=]-?(\d+)$"),            // "ORF:36"
        Rule::extract("tag-annotated", r"[A-Za-z0-9]+[:=]\s+(\d+)\s+[A-Za-z\(\)]+"), // "ORF1AB: 36 (PANTHER)"

        Rule::discard("nega", r"NEGA$"),
        Rule::discard("epicov", r"EPICOV$"),
        Rule::discard("not-available", r"N/A$"),
        Rule::discard("nat", r"NAT$"),
        Rule::discard("ct-empty", r"CT[=:]?$"),
        Rule::discard("tag-not-available", r"[A-Za-z0-9]+[:=]N/A$"),
        Rule::discard("tag-empty", r"[A-Za-z0-9]+[:=][0\-]?$"),
        Rule::discard("tag-negative", r"[A-Za-z0-9]+[:=]NEG$"),
        Rule::discard("negative-number", r"-\d+$"),
        Rule::discard("hyphen", r"-$"),
        Rule::discard("uppercase", r"[A-Z]+$"),
        Rule::discard("words", r"^[A-Za-z][A-Za-z0-9\s\(\)/]+$"),
        Rule::discard("censored", r">\d+$"),
    ];
}

/// How a raw Ct value was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome<'a> {
    /// Already a clean decimal, kept as is
    Clean,
    /// A numeral was recovered by the named rule
    Extracted { rule: &'static str, value: &'a str },
    /// Recognized as carrying no measurement by the named rule
    Discarded { rule: &'static str },
    /// No rule matched. The value is kept so it can be reviewed manually.
    Unrecognized,
}

impl Outcome<'_> {
    /// Name of the deciding rule, `clean` or `unrecognized` if no rule decided
    pub fn rule(&self) -> &'static str {
        match self {
            Outcome::Clean => "clean",
            Outcome::Extracted { rule, .. } | Outcome::Discarded { rule } => *rule,
            Outcome::Unrecognized => "unrecognized",
        }
    }
}

/// Returns true if `value` is a plain `digits.digits` decimal
pub fn is_clean(value: &str) -> bool {
    CLEAN_DECIMAL.is_match(value)
}

/// Runs the rule cascade on `raw` and reports which rule, if any, decided.
pub fn classify(raw: &str) -> Outcome<'_> {
    if is_clean(raw) {
        return Outcome::Clean;
    }

    for rule in RULES.iter() {
        match rule.action {
            Action::Extract => {
                if let Some(m) = rule.re.captures(raw).and_then(|c| c.get(1)) {
                    return Outcome::Extracted {
                        rule: rule.name,
                        value: m.as_str(),
                    };
                }
            }
            Action::Discard => {
                if rule.re.is_match(raw) {
                    return Outcome::Discarded { rule: rule.name };
                }
            }
        }
    }

    Outcome::Unrecognized
}

/// Cleans a single raw Ct value.
///
/// The result is either a decimal numeral, a bare integer recovered from the
/// input, the empty string, or `raw` itself when no rule applies. Never fails.
/// `$` anchors only at the very end, so callers trim line endings first.
pub fn normalize(raw: &str) -> String {
    match classify(raw) {
        Outcome::Clean | Outcome::Unrecognized => raw.to_string(),
        Outcome::Extracted { value, .. } => value.to_string(),
        Outcome::Discarded { .. } => String::new(),
    }
}
