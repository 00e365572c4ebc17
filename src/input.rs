// Line-oriented input with trailing-newline detection
//
// SPDX-License-Identifier: MIT
//
// This file is part of the sedr package.
// It is licensed under the MIT License.
// For the full copyright and license information, please view the LICENSE
// file that was distributed with this source code.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

/// Buffered reader over one input file (or stdin for "-"), yielding
/// lines without their newline plus a flag telling whether the newline
/// was present. Supports peeking for end of input, which the $ address
/// needs before the last line is processed.
pub struct LineReader {
    reader: Box<dyn BufRead>,
}

impl LineReader {
    pub fn open(path: &Path) -> io::Result<Self> {
        let reader: Box<dyn BufRead> = if path == Path::new("-") {
            Box::new(BufReader::new(io::stdin()))
        } else {
            Box::new(BufReader::new(File::open(path)?))
        };
        Ok(LineReader { reader })
    }

    pub fn from_reader<R: Read + 'static>(reader: R) -> Self {
        LineReader {
            reader: Box::new(BufReader::new(reader)),
        }
    }

    /// The next line, with its trailing newline stripped, and whether
    /// that newline existed.
    pub fn next_line(&mut self) -> io::Result<Option<(String, bool)>> {
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let had_newline = line.ends_with('\n');
        if had_newline {
            line.pop();
        }
        Ok(Some((line, had_newline)))
    }

    /// True when no further line will come from this reader.
    pub fn at_eof(&mut self) -> io::Result<bool> {
        Ok(self.reader.fill_buf()?.is_empty())
    }
}
