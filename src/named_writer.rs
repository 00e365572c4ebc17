// Output files for the w command, opened on compile and flushed on exit
//
// SPDX-License-Identifier: MIT
//
// This file is part of the sedr package.
// It is licensed under the MIT License.
// For the full copyright and license information, please view the LICENSE
// file that was distributed with this source code.

use crate::errors::{ScriptLocation, runtime_failure};

use std::cell::RefCell;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::rc::Rc;

use uucore::display::Quotable;
use uucore::error::UResult;

thread_local! {
    /// All writers opened during compilation, flushed at shutdown.
    static FLUSH_LIST: RefCell<Vec<Rc<RefCell<NamedWriter>>>> = const { RefCell::new(Vec::new()) };
}

/// Writer that tracks its file name and the command that opened it,
/// for error messages.
#[derive(Debug)]
pub struct NamedWriter {
    pub path: PathBuf,
    writer: BufWriter<File>,
    location: ScriptLocation,
}

impl NamedWriter {
    /// Open the file for appending, creating it if needed, and register
    /// the writer for flushing.
    pub fn open(path: PathBuf, location: ScriptLocation) -> UResult<Rc<RefCell<Self>>> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| {
                runtime_failure(
                    &location,
                    'w',
                    format!("creating file {}: {e}", path.quote()),
                )
            })?;

        let writer = Rc::new(RefCell::new(NamedWriter {
            path,
            writer: BufWriter::new(file),
            location,
        }));

        FLUSH_LIST.with(|list| list.borrow_mut().push(Rc::clone(&writer)));
        Ok(writer)
    }

    /// Write a line to the file with a newline, returning descriptive errors.
    pub fn write_line(&mut self, line: &str) -> UResult<()> {
        writeln!(self.writer, "{line}").map_err(|e| {
            runtime_failure(
                &self.location,
                'w',
                format!("writing to file {}: {e}", self.path.quote()),
            )
        })
    }

    fn flush(&mut self) -> UResult<()> {
        self.writer.flush().map_err(|e| {
            runtime_failure(
                &self.location,
                'w',
                format!("writing to file {}: {e}", self.path.quote()),
            )
        })
    }
}

/// Flush every registered writer.
pub fn flush_all() -> UResult<()> {
    FLUSH_LIST.with(|cell| {
        for handle in cell.borrow().iter() {
            handle.borrow_mut().flush()?;
        }

        Ok(())
    })
}
