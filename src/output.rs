// Output sink with trailing-newline bookkeeping
//
// SPDX-License-Identifier: MIT
//
// This file is part of the sedr package.
// It is licensed under the MIT License.
// For the full copyright and license information, please view the LICENSE
// file that was distributed with this source code.

use std::io::{BufWriter, Write};

use uucore::error::{UResult, USimpleError};

/// Buffered destination for all processed output. A chunk written from
/// an input line that had no trailing newline leaves the sink in a
/// "missing newline" state; the next chunk first writes the separating
/// newline, so that concatenated output never glues two lines together
/// while a final incomplete line stays incomplete.
pub struct OutputSink {
    writer: BufWriter<Box<dyn Write>>,
    missing_newline: bool,
}

impl OutputSink {
    pub fn new(writer: Box<dyn Write>) -> Self {
        OutputSink {
            writer: BufWriter::new(writer),
            missing_newline: false,
        }
    }

    /// Write one chunk. `has_newline` tells whether the chunk is a
    /// complete line.
    pub fn emit(&mut self, content: &str, has_newline: bool) -> UResult<()> {
        if self.missing_newline {
            self.write_bytes(b"\n")?;
        }
        self.write_bytes(content.as_bytes())?;
        if has_newline {
            self.write_bytes(b"\n")?;
        }
        self.missing_newline = !has_newline;
        Ok(())
    }

    /// Write a complete line.
    pub fn emit_line(&mut self, content: &str) -> UResult<()> {
        self.emit(content, true)
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> UResult<()> {
        self.writer
            .write_all(bytes)
            .map_err(|e| USimpleError::new(2, format!("error writing output: {e}")))
    }

    pub fn flush(&mut self) -> UResult<()> {
        self.writer
            .flush()
            .map_err(|e| USimpleError::new(2, format!("error writing output: {e}")))
    }
}
