// Data model of the compiled script and its execution context
//
// SPDX-License-Identifier: MIT
//
// This file is part of the sedr package.
// It is licensed under the MIT License.
// For the full copyright and license information, please view the LICENSE
// file that was distributed with this source code.

use crate::errors::ScriptLocation;
use crate::named_writer::NamedWriter;

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::Rc;

use regex::{Captures, Regex};

/// A script specification given on the command line: either the text of
/// a -e expression (or the lone script argument) or the path of a -f
/// script file.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptValue {
    StringVal(String),
    PathVal(PathBuf),
}

/// Settings derived from the command-line invocation, shared between
/// compilation and processing. `saved_regex` is the most recently
/// compiled pattern, reused by an empty pattern `//`.
#[derive(Debug, Clone, Default)]
pub struct ProcessingContext {
    pub regex_extended: bool,
    pub quiet: bool,
    pub separate: bool,
    pub in_place: bool,
    pub in_place_suffix: Option<String>,
    /// Wrap width for the l command; 0 disables wrapping.
    pub length: usize,
    pub saved_regex: Option<Regex>,
}

/// A single address of a command.
#[derive(Debug, Clone)]
pub enum Address {
    /// An absolute input line number.
    Line(usize),
    /// $, the last line of input.
    Last,
    /// A context (pattern-matching) address.
    Pattern(Regex),
}

/// One compiled command. Commands live in a flat array; control flow
/// ({, b, t, T) is expressed as indices into that array.
#[derive(Debug)]
pub struct Instruction {
    pub code: char,
    pub addr1: Option<Address>,
    pub addr2: Option<Address>,
    /// True for commands negated with !
    pub non_select: bool,
    pub data: InstructionData,
    pub location: ScriptLocation,
}

/// The per-command payload.
#[derive(Debug)]
pub enum InstructionData {
    None,
    /// Text argument of a, c, i.
    Text(String),
    /// Label defined by :.
    Label(String),
    /// b, t, T. `target` is filled in after compilation; a missing
    /// label means "end of script".
    Branch {
        label: Option<String>,
        target: usize,
    },
    /// {. Index of the matching }.
    BlockEnd(usize),
    /// r. Path queued for interpolation at cycle end.
    ReadFile(PathBuf),
    /// w. Shared handle on the output file.
    WriteFile(Rc<RefCell<NamedWriter>>),
    Substitution(Box<Substitution>),
    Transliteration(Box<Transliteration>),
}

/// A compiled script, ready to run.
#[derive(Debug, Default)]
pub struct Executable {
    pub instructions: Vec<Instruction>,
}

impl Executable {
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

/// An element of a substitution's replacement text.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplacementPart {
    /// Verbatim text.
    Literal(String),
    /// &: the whole matched text.
    WholeMatch,
    /// \N: the text of capture group N.
    Group(u32),
}

/// The parsed replacement of an s command.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplacementTemplate {
    pub parts: Vec<ReplacementPart>,
}

impl ReplacementTemplate {
    pub fn new(parts: Vec<ReplacementPart>) -> Self {
        ReplacementTemplate { parts }
    }

    /// The highest group number the template references.
    pub fn max_group_number(&self) -> u32 {
        self.parts
            .iter()
            .map(|part| match part {
                ReplacementPart::Group(n) => *n,
                _ => 0,
            })
            .max()
            .unwrap_or(0)
    }

    /// Materialize the replacement for one match. A group that did not
    /// participate in the match yields the empty string.
    pub fn apply(&self, caps: &Captures) -> String {
        let mut result = String::new();
        for part in &self.parts {
            match part {
                ReplacementPart::Literal(text) => result.push_str(text),
                ReplacementPart::WholeMatch => {
                    if let Some(m) = caps.get(0) {
                        result.push_str(m.as_str());
                    }
                }
                ReplacementPart::Group(n) => {
                    if let Some(m) = caps.get(*n as usize) {
                        result.push_str(m.as_str());
                    }
                }
            }
        }
        result
    }
}

/// A compiled s command.
#[derive(Debug)]
pub struct Substitution {
    pub regex: Regex,
    pub replacement: ReplacementTemplate,
    /// One-based index of the first match to replace.
    pub occurrence: usize,
    /// Replace every match from `occurrence` on.
    pub global: bool,
    /// p flag: print the pattern space on success.
    pub print_flag: bool,
    /// w flag: write the pattern space on success.
    pub write_file: Option<Rc<RefCell<NamedWriter>>>,
}

impl Substitution {
    /// Apply the substitution to `text`, returning the rewritten string
    /// if at least one replacement was made.
    pub fn apply(&self, text: &str) -> Option<String> {
        let mut result = String::with_capacity(text.len());
        let mut copied_to = 0;
        let mut search_at = 0;
        let mut seen = 0usize;
        let mut replaced = false;

        while search_at <= text.len() {
            let Some(caps) = self.regex.captures_at(text, search_at) else {
                break;
            };
            let Some(whole) = caps.get(0) else {
                break;
            };
            seen += 1;

            let wanted = if self.global {
                seen >= self.occurrence
            } else {
                seen == self.occurrence
            };
            if wanted {
                result.push_str(&text[copied_to..whole.start()]);
                result.push_str(&self.replacement.apply(&caps));
                copied_to = whole.end();
                replaced = true;
            }

            // A zero-length match must not stall the scan.
            if whole.is_empty() {
                match text[whole.end()..].chars().next() {
                    Some(c) => search_at = whole.end() + c.len_utf8(),
                    None => break,
                }
            } else {
                search_at = whole.end();
            }

            if !self.global && seen >= self.occurrence {
                break;
            }
        }

        if replaced {
            result.push_str(&text[copied_to..]);
            Some(result)
        } else {
            None
        }
    }
}

/// A compiled y command. ASCII mappings live in a direct-indexed table,
/// anything wider in a map.
#[derive(Debug, Default)]
pub struct Transliteration {
    ascii: Vec<u8>,
    wide: HashMap<char, char>,
}

impl Transliteration {
    /// Build the mapping from two character lists of equal length.
    pub fn from_pairs(source: &str, target: &str) -> Self {
        let mut ascii: Vec<u8> = (0u8..128).collect();
        let mut wide = HashMap::new();
        for (from, to) in source.chars().zip(target.chars()) {
            if from.is_ascii() && to.is_ascii() {
                ascii[from as usize] = to as u8;
            } else {
                wide.insert(from, to);
            }
        }
        Transliteration { ascii, wide }
    }

    pub fn translate(&self, text: &str) -> String {
        text.chars()
            .map(|c| {
                if c.is_ascii() {
                    let mapped = self.ascii[c as usize];
                    if mapped != c as u8 {
                        return mapped as char;
                    }
                }
                self.wide.get(&c).copied().unwrap_or(c)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template(parts: Vec<ReplacementPart>) -> ReplacementTemplate {
        ReplacementTemplate::new(parts)
    }

    fn subst(pattern: &str, parts: Vec<ReplacementPart>) -> Substitution {
        Substitution {
            regex: Regex::new(pattern).unwrap(),
            replacement: template(parts),
            occurrence: 1,
            global: false,
            print_flag: false,
            write_file: None,
        }
    }

    #[test]
    fn test_replacement_literal_and_whole_match() {
        let re = Regex::new("l+").unwrap();
        let caps = re.captures("hello").unwrap();
        let t = template(vec![
            ReplacementPart::Literal("<".to_string()),
            ReplacementPart::WholeMatch,
            ReplacementPart::Literal(">".to_string()),
        ]);
        assert_eq!(t.apply(&caps), "<ll>");
    }

    #[test]
    fn test_replacement_groups() {
        let re = Regex::new("(a+)(b+)?").unwrap();
        let caps = re.captures("aaa").unwrap();
        let t = template(vec![
            ReplacementPart::Group(1),
            ReplacementPart::Literal("-".to_string()),
            ReplacementPart::Group(2),
        ]);
        // Group 2 did not participate: empty.
        assert_eq!(t.apply(&caps), "aaa-");
    }

    #[test]
    fn test_max_group_number() {
        let t = template(vec![
            ReplacementPart::Group(2),
            ReplacementPart::WholeMatch,
            ReplacementPart::Group(5),
        ]);
        assert_eq!(t.max_group_number(), 5);
        assert_eq!(template(vec![]).max_group_number(), 0);
    }

    #[test]
    fn test_substitute_first_only() {
        let s = subst("o", vec![ReplacementPart::Literal("0".to_string())]);
        assert_eq!(s.apply("foo boo"), Some("f0o boo".to_string()));
    }

    #[test]
    fn test_substitute_global() {
        let mut s = subst("o", vec![ReplacementPart::Literal("0".to_string())]);
        s.global = true;
        assert_eq!(s.apply("foo boo"), Some("f00 b00".to_string()));
    }

    #[test]
    fn test_substitute_nth() {
        let mut s = subst("o", vec![ReplacementPart::Literal("0".to_string())]);
        s.occurrence = 3;
        assert_eq!(s.apply("foo boo"), Some("foo b0o".to_string()));
    }

    #[test]
    fn test_substitute_nth_and_global() {
        let mut s = subst("o", vec![ReplacementPart::Literal("0".to_string())]);
        s.occurrence = 2;
        s.global = true;
        assert_eq!(s.apply("foo boo"), Some("fo0 b00".to_string()));
    }

    #[test]
    fn test_substitute_no_match() {
        let s = subst("z", vec![ReplacementPart::Literal("!".to_string())]);
        assert_eq!(s.apply("foo"), None);
    }

    #[test]
    fn test_substitute_nth_beyond_matches() {
        let mut s = subst("o", vec![ReplacementPart::Literal("0".to_string())]);
        s.occurrence = 5;
        assert_eq!(s.apply("foo"), None);
    }

    #[test]
    fn test_substitute_zero_length_matches_advance() {
        let mut s = subst("x*", vec![ReplacementPart::Literal("-".to_string())]);
        s.global = true;
        assert_eq!(s.apply("abc"), Some("-a-b-c-".to_string()));
    }

    #[test]
    fn test_substitute_zero_length_at_end() {
        let s = subst("$", vec![ReplacementPart::Literal(".".to_string())]);
        assert_eq!(s.apply("ab"), Some("ab.".to_string()));
    }

    #[test]
    fn test_substitute_with_backreference() {
        let s = subst(
            "(b+)",
            vec![
                ReplacementPart::Group(1),
                ReplacementPart::Group(1),
            ],
        );
        assert_eq!(s.apply("abbc"), Some("abbbbc".to_string()));
    }

    #[test]
    fn test_transliterate_ascii() {
        let t = Transliteration::from_pairs("abc", "xyz");
        assert_eq!(t.translate("aabbccdd"), "xxyyzzdd");
    }

    #[test]
    fn test_transliterate_wide() {
        let t = Transliteration::from_pairs("aé", "àe");
        assert_eq!(t.translate("café"), "càfe");
    }

    #[test]
    fn test_transliterate_identity() {
        let t = Transliteration::from_pairs("", "");
        assert_eq!(t.translate("hello"), "hello");
    }
}
