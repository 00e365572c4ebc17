// Support for in-place editing
//
// SPDX-License-Identifier: MIT
//
// This file is part of the sedr package.
// It is licensed under the MIT License.
// For the full copyright and license information, please view the LICENSE
// file that was distributed with this source code.

use crate::command::ProcessingContext;
use crate::output::OutputSink;

use std::fs;
use std::io::stdout;
use std::path::{Path, PathBuf};

use tempfile::TempPath;
use uucore::display::Quotable;
use uucore::error::{UResult, USimpleError};

/// Destination management for a processing run. Without -i all files
/// share one stdout sink, so trailing-newline bookkeeping carries
/// across file boundaries. With -i each file is edited through a
/// temporary file in its directory which replaces the original when
/// the file is done, after an optional backup.
pub struct InPlace<'a> {
    context: &'a ProcessingContext,
    stdout_sink: OutputSink,
    temp: Option<TempOutput>,
}

struct TempOutput {
    sink: OutputSink,
    temp_path: TempPath,
    dest: PathBuf,
}

impl<'a> InPlace<'a> {
    pub fn new(context: &'a ProcessingContext) -> Self {
        InPlace {
            context,
            stdout_sink: OutputSink::new(Box::new(stdout())),
            temp: None,
        }
    }

    /// The sink that output for the given input file should go to.
    pub fn begin(&mut self, path: &Path) -> UResult<&mut OutputSink> {
        if !self.context.in_place || path == Path::new("-") {
            return Ok(&mut self.stdout_sink);
        }

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let temp_file = tempfile::Builder::new()
            .prefix(".sedr-")
            .tempfile_in(dir)
            .map_err(|e| {
                USimpleError::new(2, format!("couldn't create temporary file: {e}"))
            })?;
        let (file, temp_path) = temp_file.into_parts();

        let slot = self.temp.insert(TempOutput {
            sink: OutputSink::new(Box::new(file)),
            temp_path,
            dest: path.to_path_buf(),
        });
        Ok(&mut slot.sink)
    }

    /// Finish the current file: flush, and for in-place editing move
    /// the result over the original.
    pub fn end(&mut self) -> UResult<()> {
        let Some(TempOutput {
            mut sink,
            temp_path,
            dest,
        }) = self.temp.take()
        else {
            return self.stdout_sink.flush();
        };

        sink.flush()?;
        drop(sink);

        if let Ok(metadata) = fs::metadata(&dest) {
            let _ = fs::set_permissions(&*temp_path, metadata.permissions());
        }

        if let Some(suffix) = &self.context.in_place_suffix {
            let backup = backup_path(&dest, suffix);
            fs::rename(&dest, &backup).map_err(|e| {
                USimpleError::new(2, format!("cannot back up {}: {e}", dest.quote()))
            })?;
        }

        temp_path.persist(&dest).map_err(|e| {
            USimpleError::new(2, format!("cannot rename to {}: {e}", dest.quote()))
        })?;
        Ok(())
    }

    /// Flush the shared stdout sink at the end of the run.
    pub fn finish(&mut self) -> UResult<()> {
        self.stdout_sink.flush()
    }
}

fn backup_path(dest: &Path, suffix: &str) -> PathBuf {
    let mut name = dest.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}
