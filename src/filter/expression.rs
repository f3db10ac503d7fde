//! Filter expression grammar and compilation.
//!
//! Expressions take the form `/pattern/flags`. Bare text is wrapped in slashes
//! and a leading `!` is shorthand for the negate flag:
//!
//! | input       | normalized    |
//! |-------------|---------------|
//! | `error`     | `/error/`     |
//! | `!debug`    | `/debug/!`    |
//! | `a/b`       | `/a\/b/`      |
//! | `/warn/i`   | `/warn/i`     |
//! | `!`         | `/!/`         |
//!
//! Only `i` (case-insensitive) and `!` (negate) are valid flags.

use crate::error::{FewerError, Result};
use grep_matcher::Matcher;
use grep_regex::{RegexMatcher, RegexMatcherBuilder};

/// Parsed flag set of an expression
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flags {
    pub case_insensitive: bool,
    pub negate: bool,
}

/// Canonical `/pattern/flags` form of user input; empty input stays empty
pub fn normalize(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    if text.starts_with('/') && closing_slash(text).is_some() {
        return text.to_string();
    }
    if text == "!" {
        return "/!/".to_string();
    }
    match text.strip_prefix('!') {
        Some(rest) => format!("/{}/!", escape_slashes(rest)),
        None => format!("/{}/", escape_slashes(text)),
    }
}

/// Split a normalized expression into its regex pattern and flag characters
///
/// `\/` in the pattern becomes `/`; every other escape is left for the regex
/// engine.
pub fn split(normalized: &str) -> Result<(String, &str)> {
    let close = normalized
        .starts_with('/')
        .then(|| closing_slash(normalized))
        .flatten()
        .ok_or_else(|| FewerError::pattern_compile(normalized, "missing closing slash"))?;

    let body = &normalized[1..close];
    let mut pattern = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('/') => pattern.push('/'),
                Some(other) => {
                    pattern.push('\\');
                    pattern.push(other);
                }
                None => pattern.push('\\'),
            }
        } else {
            pattern.push(c);
        }
    }

    Ok((pattern, &normalized[close + 1..]))
}

/// Interpret the flag characters following the closing slash
pub fn parse_flags(expression: &str, flags: &str) -> Result<Flags> {
    let mut parsed = Flags::default();
    for c in flags.chars() {
        match c {
            'i' => parsed.case_insensitive = true,
            '!' => parsed.negate = true,
            other => {
                return Err(FewerError::pattern_compile(
                    expression,
                    format!("invalid regular expression flags character: {}", other),
                ))
            }
        }
    }
    Ok(parsed)
}

/// Byte offset of the first unescaped `/` after the leading one
fn closing_slash(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut i = 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'/' => return Some(i),
            _ => i += 1,
        }
    }
    None
}

fn escape_slashes(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len() + 2);
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(next) => {
                    escaped.push('\\');
                    escaped.push(next);
                }
                // a lone trailing backslash would escape the closing slash
                None => escaped.push_str("\\\\"),
            },
            '/' => escaped.push_str("\\/"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Keep only the line of a regex error that says what went wrong
fn short_message(err: &grep_regex::Error) -> String {
    let text = err.to_string();
    text.lines()
        .find_map(|line| line.trim().strip_prefix("error:").map(str::trim))
        .or_else(|| text.lines().map(str::trim).find(|line| !line.is_empty()))
        .unwrap_or("invalid regular expression")
        .to_string()
}

/// A compiled filter expression
#[derive(Debug, Clone)]
pub struct Filter {
    text: String,
    pattern: String,
    flags: Flags,
    matcher: RegexMatcher,
}

impl Filter {
    /// Normalize and compile `text`
    ///
    /// # Errors
    /// * `PatternCompile` for empty input, bad flags or invalid regex syntax
    pub fn compile(text: &str) -> Result<Self> {
        let normalized = normalize(text);
        if normalized.is_empty() {
            return Err(FewerError::pattern_compile(text, "empty expression"));
        }

        let (pattern, flag_chars) = split(&normalized)?;
        let flags = parse_flags(&normalized, flag_chars)?;
        let matcher = RegexMatcherBuilder::new()
            .case_insensitive(flags.case_insensitive)
            .build(&pattern)
            .map_err(|e| FewerError::pattern_compile(normalized.as_str(), short_message(&e)))?;

        Ok(Self {
            text: normalized,
            pattern,
            flags,
            matcher,
        })
    }

    /// Whether the line is kept: a pattern match, inverted for negated filters
    pub fn is_match(&self, line: &[u8]) -> bool {
        let found = matches!(self.matcher.is_match(line), Ok(true));
        found != self.flags.negate
    }

    /// Normalized expression text, also the cache key
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }
}
