//! `ovbridge-highlight` - Server-driven (regex-based) token classification.
//!
//! The language server pushes an ordered table of `(pattern, class)` pairs. This crate compiles
//! that table into a [`TokenClassifier`] and runs it over document text. A new table always
//! replaces the previous classifier wholesale; there is no incremental merge.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;
use thiserror::Error;

/// Errors produced while compiling a classifier table.
#[derive(Debug, Error)]
pub enum ClassifierError {
    /// A pattern failed to compile.
    #[error("invalid token pattern '{pattern}': {source}")]
    InvalidPattern {
        /// The offending pattern.
        pattern: String,
        /// The regex compiler error.
        #[source]
        source: regex::Error,
    },
}

/// Highlighting class assigned to a matched span.
///
/// Serialized as its plain name (`"keyword"`, `"string"`, ...). Unknown names are kept verbatim
/// in [`TokenClass::Custom`] so that themes can still map them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TokenClass {
    Keyword,
    Type,
    String,
    Number,
    Comment,
    Operator,
    Delimiter,
    Identifier,
    Variable,
    Function,
    Constant,
    Annotation,
    Invalid,
    Custom(std::string::String),
}

impl TokenClass {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Keyword => "keyword",
            Self::Type => "type",
            Self::String => "string",
            Self::Number => "number",
            Self::Comment => "comment",
            Self::Operator => "operator",
            Self::Delimiter => "delimiter",
            Self::Identifier => "identifier",
            Self::Variable => "variable",
            Self::Function => "function",
            Self::Constant => "constant",
            Self::Annotation => "annotation",
            Self::Invalid => "invalid",
            Self::Custom(name) => name,
        }
    }
}

impl From<&str> for TokenClass {
    fn from(name: &str) -> Self {
        match name {
            "keyword" => Self::Keyword,
            "type" => Self::Type,
            "string" => Self::String,
            "number" => Self::Number,
            "comment" => Self::Comment,
            "operator" => Self::Operator,
            "delimiter" => Self::Delimiter,
            "identifier" => Self::Identifier,
            "variable" => Self::Variable,
            "function" => Self::Function,
            "constant" => Self::Constant,
            "annotation" => Self::Annotation,
            "invalid" => Self::Invalid,
            other => Self::Custom(other.to_string()),
        }
    }
}

impl From<std::string::String> for TokenClass {
    fn from(name: std::string::String) -> Self {
        match Self::from(name.as_str()) {
            Self::Custom(_) => Self::Custom(name),
            known => known,
        }
    }
}

impl From<TokenClass> for std::string::String {
    fn from(class: TokenClass) -> Self {
        match class {
            TokenClass::Custom(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for TokenClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified span of text, in char offsets (half-open).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSpan {
    /// Start char offset.
    pub start: usize,
    /// End char offset (exclusive).
    pub end: usize,
    /// Class of the span.
    pub class: TokenClass,
}

/// A single compiled classifier rule.
#[derive(Debug, Clone)]
pub struct ClassifierRule {
    regex: Regex,
    class: TokenClass,
    capture_group: Option<usize>,
}

struct RuleMatch {
    whole: Range<usize>,
    span: Option<Range<usize>>,
}

impl ClassifierRule {
    pub fn new(pattern: &str, class: TokenClass) -> Result<Self, ClassifierError> {
        let regex = Regex::new(pattern).map_err(|source| ClassifierError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self {
            regex,
            class,
            capture_group: None,
        })
    }

    /// Classify only a capture group of each match.
    ///
    /// The scanner still advances past the whole match.
    pub fn with_capture_group(mut self, group: usize) -> Self {
        self.capture_group = Some(group);
        self
    }

    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }

    pub fn class(&self) -> &TokenClass {
        &self.class
    }

    // First non-empty match starting at or after `pos` (byte offset).
    fn find_at(&self, line: &str, mut pos: usize) -> Option<RuleMatch> {
        while pos <= line.len() {
            let (whole, span) = match self.capture_group {
                Some(group) => {
                    let caps = self.regex.captures_at(line, pos)?;
                    let whole = caps.get(0)?.range();
                    (whole, caps.get(group).map(|m| m.range()))
                }
                None => {
                    let m = self.regex.find_at(line, pos)?;
                    (m.range(), Some(m.range()))
                }
            };

            if whole.end > whole.start {
                return Some(RuleMatch { whole, span });
            }
            pos = next_char_boundary(line, whole.start);
        }
        None
    }
}

/// An ordered token classifier table.
///
/// Rule order is precedence: when two rules match at the same position the earlier rule wins.
#[derive(Debug, Clone, Default)]
pub struct TokenClassifier {
    rules: Vec<ClassifierRule>,
}

impl TokenClassifier {
    pub fn new(rules: Vec<ClassifierRule>) -> Self {
        Self { rules }
    }

    /// Compile a server-provided `(pattern, class)` table.
    ///
    /// Empty patterns are skipped; the remaining entries keep their relative order.
    pub fn from_pairs<I, P>(pairs: I) -> Result<Self, ClassifierError>
    where
        I: IntoIterator<Item = (P, TokenClass)>,
        P: AsRef<str>,
    {
        let mut rules = Vec::new();
        for (pattern, class) in pairs {
            let pattern = pattern.as_ref();
            if pattern.is_empty() {
                continue;
            }
            rules.push(ClassifierRule::new(pattern, class)?);
        }
        Ok(Self::new(rules))
    }

    pub fn rules(&self) -> &[ClassifierRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Classify `text` into non-overlapping spans (char offsets), line by line.
    pub fn classify(&self, text: &str) -> Vec<TokenSpan> {
        let mut spans = Vec::new();
        if self.rules.is_empty() {
            return spans;
        }

        let mut line_start = 0usize;
        for line in text.split('\n') {
            self.classify_line(line, line_start, &mut spans);
            line_start += line.chars().count() + 1;
        }
        spans
    }

    fn classify_line(&self, line: &str, line_start: usize, out: &mut Vec<TokenSpan>) {
        let mut pos = 0usize;
        while pos < line.len() {
            let mut best: Option<(RuleMatch, &ClassifierRule)> = None;
            for rule in &self.rules {
                let Some(found) = rule.find_at(line, pos) else {
                    continue;
                };
                if best
                    .as_ref()
                    .is_none_or(|(current, _)| found.whole.start < current.whole.start)
                {
                    best = Some((found, rule));
                }
            }

            let Some((found, rule)) = best else {
                break;
            };

            if let Some(span) = found.span.as_ref()
                && let Some(token) = span_from_match(line_start, line, span, &rule.class)
            {
                out.push(token);
            }
            pos = found.whole.end;
        }
    }
}

fn next_char_boundary(line: &str, byte: usize) -> usize {
    line[byte..]
        .chars()
        .next()
        .map_or(line.len() + 1, |c| byte + c.len_utf8())
}

fn span_from_match(
    line_start_offset: usize,
    line_text: &str,
    bytes: &Range<usize>,
    class: &TokenClass,
) -> Option<TokenSpan> {
    if bytes.start >= bytes.end || bytes.end > line_text.len() {
        return None;
    }

    let start_col = line_text[..bytes.start].chars().count();
    let end_col = start_col + line_text[bytes.start..bytes.end].chars().count();

    Some(TokenSpan {
        start: line_start_offset + start_col,
        end: line_start_offset + end_col,
        class: class.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn span(start: usize, end: usize, class: TokenClass) -> TokenSpan {
        TokenSpan { start, end, class }
    }

    #[test]
    fn test_from_pairs_skips_empty_patterns() {
        let classifier = TokenClassifier::from_pairs(vec![
            ("", TokenClass::Keyword),
            (r"\bentity\b", TokenClass::Keyword),
        ])
        .unwrap();

        assert_eq!(classifier.len(), 1);
        assert_eq!(classifier.rules()[0].pattern(), r"\bentity\b");
        assert_eq!(classifier.rules()[0].class(), &TokenClass::Keyword);
    }

    #[test]
    fn test_invalid_pattern_reports_pattern() {
        let err = TokenClassifier::from_pairs(vec![("(unclosed", TokenClass::String)]).unwrap_err();
        match err {
            ClassifierError::InvalidPattern { pattern, .. } => assert_eq!(pattern, "(unclosed"),
        }
    }

    #[test]
    fn test_earlier_rule_wins_at_same_position() {
        let classifier = TokenClassifier::from_pairs(vec![
            (r"\bif\b", TokenClass::Keyword),
            (r"[a-z]+", TokenClass::Identifier),
        ])
        .unwrap();

        let spans = classifier.classify("if value");
        assert_eq!(
            spans,
            vec![
                span(0, 2, TokenClass::Keyword),
                span(3, 8, TokenClass::Identifier),
            ]
        );
    }

    #[test]
    fn test_spans_use_char_offsets_across_lines() {
        let classifier =
            TokenClassifier::from_pairs(vec![(r"\d+", TokenClass::Number)]).unwrap();

        let spans = classifier.classify("é 12\n3");
        assert_eq!(
            spans,
            vec![span(2, 4, TokenClass::Number), span(5, 6, TokenClass::Number)]
        );
    }

    #[test]
    fn test_empty_matches_do_not_stall() {
        let classifier = TokenClassifier::from_pairs(vec![
            ("x*", TokenClass::Variable),
            ("y", TokenClass::Constant),
        ])
        .unwrap();

        let spans = classifier.classify("ayxx");
        assert_eq!(
            spans,
            vec![
                span(1, 2, TokenClass::Constant),
                span(2, 4, TokenClass::Variable),
            ]
        );
    }

    #[test]
    fn test_capture_group_classifies_group_only() {
        let rule = ClassifierRule::new(r"^\s*([A-Za-z]+)\s*:", TokenClass::Type)
            .unwrap()
            .with_capture_group(1);
        let classifier = TokenClassifier::new(vec![rule]);

        assert_eq!(
            classifier.classify("  name: x"),
            vec![span(2, 6, TokenClass::Type)]
        );
    }

    #[test]
    fn test_token_class_serde_round_trips_custom_names() {
        let classes: Vec<TokenClass> =
            serde_json::from_str(r#"["keyword", "regexp", "comment"]"#).unwrap();
        assert_eq!(
            classes,
            vec![
                TokenClass::Keyword,
                TokenClass::Custom("regexp".to_string()),
                TokenClass::Comment,
            ]
        );
        assert_eq!(
            serde_json::to_string(&classes).unwrap(),
            r#"["keyword","regexp","comment"]"#
        );
    }
}
