// SPDX-License-Identifier: Apache-2.0

//! Identifier quoting
//!
//! An [`Escaper`] wraps an identifier in the dialect's quote characters only
//! when it has to: the identifier is a reserved word or contains a character
//! outside the dialect's plain identifier alphabet.

use std::collections::HashSet;
use std::fmt;

/// Per-dialect identifier escaping rules.
#[derive(Clone)]
pub struct Escaper {
    left: char,
    right: char,
    reserved: HashSet<String>,
    valid: fn(char) -> bool,
}

impl fmt::Debug for Escaper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Escaper")
            .field("left", &self.left)
            .field("right", &self.right)
            .field("reserved", &self.reserved.len())
            .finish()
    }
}

impl Escaper {
    pub fn new(left: char, right: char, valid: fn(char) -> bool) -> Self {
        Self {
            left,
            right,
            reserved: HashSet::new(),
            valid,
        }
    }

    pub fn with_reserved_words<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.reserved
            .extend(words.into_iter().map(|w| w.as_ref().to_uppercase()));
        self
    }

    pub fn left(&self) -> char {
        self.left
    }

    pub fn right(&self) -> char {
        self.right
    }

    pub fn is_reserved(&self, identifier: &str) -> bool {
        self.reserved.contains(&identifier.to_uppercase())
    }

    pub fn needs_escaping(&self, identifier: &str) -> bool {
        if identifier.is_empty() {
            return false;
        }
        self.is_reserved(identifier) || !identifier.chars().all(self.valid)
    }

    /// Quotes `identifier` if needed. Each quote is added only when that end
    /// does not already carry it.
    pub fn escape(&self, identifier: &str) -> String {
        if !self.needs_escaping(identifier) {
            return identifier.to_string();
        }
        let mut escaped = String::with_capacity(identifier.len() + 2);
        if !identifier.starts_with(self.left) {
            escaped.push(self.left);
        }
        escaped.push_str(identifier);
        if !identifier.ends_with(self.right) {
            escaped.push(self.right);
        }
        escaped
    }

    /// Strips every leading and trailing quote character.
    pub fn unescape<'a>(&self, identifier: &'a str) -> &'a str {
        identifier
            .trim_start_matches(self.left)
            .trim_end_matches(self.right)
    }

    /// Joins the non-blank parts with `.`, normalising each part's quoting.
    pub fn escape_path<I, S>(&self, parts: I) -> String
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        parts
            .into_iter()
            .filter(|part| !part.as_ref().trim().is_empty())
            .map(|part| self.escape(self.unescape(part.as_ref())))
            .collect::<Vec<_>>()
            .join(".")
    }
}
