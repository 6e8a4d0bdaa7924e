//! Streaming literal substitution for command output.
//!
//! mockroot runs commands inside a scratch workspace, so compiler diagnostics,
//! test failures and stack traces mention scratch paths and marked identifiers
//! the user never wrote. This crate rewrites those back to their real
//! counterparts as the bytes stream past.
//!
//! Rules are plain `(needle, replacement)` byte strings. At any position the
//! first registered rule that matches wins. A needle is never split across
//! two flushed writes: bytes that could still turn into a match are held back
//! until the next chunk arrives or the stream is finished.
//!
//! # Example
//!
//! ```
//! use mockroot_translate::{Rules, Translator};
//! use std::sync::Arc;
//!
//! let mut rules = Rules::new();
//! rules.push("/tmp/work/src/@app", "/home/me/app");
//! let mut translator = Translator::new(Arc::new(rules));
//!
//! let mut out = Vec::new();
//! translator.feed(b"error in /tmp/work/sr", &mut out);
//! translator.feed(b"c/@app/main.go", &mut out);
//! translator.finish(&mut out);
//! assert_eq!(out, b"error in /home/me/app/main.go");
//! ```

mod stream;

pub use stream::{CHUNK_SIZE, TranslatingWriter, pump};

use std::sync::Arc;

/// A single literal substitution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    needle: Vec<u8>,
    replacement: Vec<u8>,
}

impl Rule {
    /// The byte string being searched for.
    #[must_use]
    pub fn needle(&self) -> &[u8] {
        &self.needle
    }

    /// The bytes written in place of the needle.
    #[must_use]
    pub fn replacement(&self) -> &[u8] {
        &self.replacement
    }
}

/// Ordered set of substitution rules.
#[derive(Debug, Clone)]
pub struct Rules {
    rules: Vec<Rule>,
    // Bytes that begin at least one needle; anything else is copied through.
    first_bytes: [bool; 256],
}

impl Default for Rules {
    fn default() -> Self {
        Self {
            rules: Vec::new(),
            first_bytes: [false; 256],
        }
    }
}

impl Rules {
    /// Create an empty rule set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a rule after all existing ones.
    ///
    /// Empty needles and rules whose replacement equals the needle are
    /// discarded. Returns whether the rule was kept.
    pub fn push(&mut self, needle: impl Into<Vec<u8>>, replacement: impl Into<Vec<u8>>) -> bool {
        let needle = needle.into();
        let replacement = replacement.into();

        if needle.is_empty() || needle == replacement {
            tracing::trace!(
                needle = %String::from_utf8_lossy(&needle),
                "discarding no-op translation rule"
            );
            return false;
        }

        self.first_bytes[usize::from(needle[0])] = true;
        self.rules.push(Rule {
            needle,
            replacement,
        });
        true
    }

    /// Number of registered rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether no rules are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Iterate over the rules in priority order.
    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    /// Translate a complete buffer in one go.
    #[must_use]
    pub fn apply(self: &Arc<Self>, input: &[u8]) -> Vec<u8> {
        let mut translator = Translator::new(Arc::clone(self));
        let mut out = Vec::with_capacity(input.len());
        translator.feed(input, &mut out);
        translator.finish(&mut out);
        out
    }
}

/// Incremental translator over a byte stream.
///
/// Feed chunks in order with [`Translator::feed`] and call
/// [`Translator::finish`] once the input is exhausted; until then a trailing
/// partial match may be held back.
#[derive(Debug)]
pub struct Translator {
    rules: Arc<Rules>,
    pending: Vec<u8>,
}

impl Translator {
    /// Create a translator over the given rules.
    #[must_use]
    pub fn new(rules: Arc<Rules>) -> Self {
        Self {
            rules,
            pending: Vec::new(),
        }
    }

    /// Number of bytes currently held back waiting for more input.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Consume a chunk, appending every byte that can be decided to `out`.
    pub fn feed(&mut self, chunk: &[u8], out: &mut Vec<u8>) {
        if self.rules.is_empty() && self.pending.is_empty() {
            out.extend_from_slice(chunk);
            return;
        }

        self.pending.extend_from_slice(chunk);
        let consumed = scan(&self.rules, &self.pending, out, false);
        self.pending.drain(..consumed);
    }

    /// Flush everything still held back. The translator is empty afterwards
    /// and may be reused for a new stream.
    pub fn finish(&mut self, out: &mut Vec<u8>) {
        scan(&self.rules, &self.pending, out, true);
        self.pending.clear();
    }
}

/// Translate `buf` into `out`, returning how many bytes of `buf` were
/// consumed. Unless `eof` is set, scanning stops at the first position where
/// a higher-priority needle could still match with more input.
fn scan(rules: &Rules, buf: &[u8], out: &mut Vec<u8>, eof: bool) -> usize {
    let mut pos = 0;

    'outer: while pos < buf.len() {
        if !rules.first_bytes[usize::from(buf[pos])] {
            let run = buf[pos..]
                .iter()
                .position(|b| rules.first_bytes[usize::from(*b)])
                .unwrap_or(buf.len() - pos);
            out.extend_from_slice(&buf[pos..pos + run]);
            pos += run;
            continue;
        }

        let rest = &buf[pos..];
        for rule in &rules.rules {
            if rest.starts_with(&rule.needle) {
                out.extend_from_slice(&rule.replacement);
                pos += rule.needle.len();
                continue 'outer;
            }
            if !eof && rule.needle.starts_with(rest) {
                return pos;
            }
        }

        out.push(buf[pos]);
        pos += 1;
    }

    pos
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules(pairs: &[(&str, &str)]) -> Arc<Rules> {
        let mut rules = Rules::new();
        for (needle, replacement) in pairs {
            rules.push(*needle, *replacement);
        }
        Arc::new(rules)
    }

    fn run_chunks(rules: &Arc<Rules>, chunks: &[&str]) -> String {
        let mut translator = Translator::new(Arc::clone(rules));
        let mut out = Vec::new();
        for chunk in chunks {
            translator.feed(chunk.as_bytes(), &mut out);
        }
        translator.finish(&mut out);
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_push_discards_noop_rules() {
        let mut rules = Rules::new();
        assert!(!rules.push("", "x"));
        assert!(!rules.push("same", "same"));
        assert!(rules.push("a", "b"));
        assert_eq!(rules.len(), 1);
    }

    #[test]
    fn test_empty_rules_pass_through() {
        let rules = rules(&[]);
        assert_eq!(run_chunks(&rules, &["hello ", "world"]), "hello world");
    }

    #[test]
    fn test_replaces_every_occurrence() {
        let rules = rules(&[("x/_b", "x/b")]);
        assert_eq!(
            run_chunks(&rules, &["x/_b and x/_b/c"]),
            "x/b and x/b/c"
        );
    }

    #[test]
    fn test_needle_split_across_chunks() {
        let rules = rules(&[("/scratch/src/@app", "/real/app")]);
        let out = run_chunks(&rules, &["at /scr", "atch/sr", "c/@app/main:3"]);
        assert_eq!(out, "at /real/app/main:3");
    }

    #[test]
    fn test_holds_partial_match_until_more_input() {
        let rules = rules(&[("abcdef", "X")]);
        let mut translator = Translator::new(rules);
        let mut out = Vec::new();

        translator.feed(b"zzabc", &mut out);
        assert_eq!(out, b"zz");
        assert_eq!(translator.pending_len(), 3);

        translator.feed(b"xyz", &mut out);
        assert_eq!(out, b"zzabcxyz");
        assert_eq!(translator.pending_len(), 0);
    }

    #[test]
    fn test_finish_flushes_unmatched_prefix() {
        let rules = rules(&[("abcdef", "X")]);
        assert_eq!(run_chunks(&rules, &["tail abc"]), "tail abc");
    }

    #[test]
    fn test_first_registered_rule_wins() {
        let short_first = rules(&[("ab", "1"), ("abc", "2")]);
        assert_eq!(run_chunks(&short_first, &["abc"]), "1c");

        let long_first = rules(&[("abc", "2"), ("ab", "1")]);
        assert_eq!(run_chunks(&long_first, &["abc"]), "2");
    }

    #[test]
    fn test_lower_priority_rule_applies_at_eof() {
        // "abc" has priority but never completes; "ab" applies once the
        // stream ends.
        let rules = rules(&[("abc", "2"), ("ab", "1")]);
        assert_eq!(run_chunks(&rules, &["xab"]), "x1");
    }

    #[test]
    fn test_replacement_is_not_rescanned() {
        let rules = rules(&[("a", "aa")]);
        assert_eq!(run_chunks(&rules, &["aba"]), "aabaa");
    }

    #[test]
    fn test_apply_one_shot() {
        let rules = rules(&[("_lib", "lib")]);
        assert_eq!(rules.apply(b"pkg/_lib failed"), b"pkg/lib failed");
    }
}
