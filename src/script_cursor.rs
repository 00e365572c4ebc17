// Character-level cursor over a single script line
//
// SPDX-License-Identifier: MIT
//
// This file is part of the sedr package.
// It is licensed under the MIT License.
// For the full copyright and license information, please view the LICENSE
// file that was distributed with this source code.

/// A cursor over the characters of one script line.
///
/// The compiler walks every script line through one of these; `pos` is
/// the zero-based character offset used for error columns.
#[derive(Debug)]
pub struct ScriptCursor {
    chars: Vec<char>,
    pos: usize,
}

impl ScriptCursor {
    pub fn new(line: &str) -> Self {
        ScriptCursor {
            chars: line.chars().collect(),
            pos: 0,
        }
    }

    /// The character under the cursor, or `None` at end of line.
    pub fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    /// Consume and return the character under the cursor.
    pub fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    /// Skip over spaces and tabs.
    pub fn skip_blanks(&mut self) {
        while matches!(self.peek(), Some(' ') | Some('\t')) {
            self.pos += 1;
        }
    }

    /// Zero-based offset of the cursor within the line.
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Reset the cursor to an offset previously obtained from `pos`.
    pub fn rewind(&mut self, pos: usize) {
        self.pos = pos.min(self.chars.len());
    }

    /// Consume the rest of the line.
    pub fn take_rest(&mut self) -> String {
        let rest: String = self.chars[self.pos..].iter().collect();
        self.pos = self.chars.len();
        rest
    }
}
