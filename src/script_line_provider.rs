// Provide script lines from a sequence of -e and -f sources
//
// SPDX-License-Identifier: MIT
//
// This file is part of the sedr package.
// It is licensed under the MIT License.
// For the full copyright and license information, please view the LICENSE
// file that was distributed with this source code.

use crate::command::ScriptValue;

use std::fs::File;
use std::io::{self, BufRead, BufReader, Cursor};
use std::path::Path;

/// Successive lines of the script, drawn from all -e strings and -f
/// files in the order they were given. Tracks the current source name
/// and line number for error messages.
pub struct ScriptLineProvider {
    pending: std::vec::IntoIter<ScriptValue>,
    active: Option<ActiveSource>,
    string_count: usize,
}

struct ActiveSource {
    reader: Box<dyn BufRead>,
    name: String,
    line_number: usize,
}

impl ScriptLineProvider {
    pub fn new(scripts: Vec<ScriptValue>) -> Self {
        ScriptLineProvider {
            pending: scripts.into_iter(),
            active: None,
            string_count: 0,
        }
    }

    /// Name of the source the last returned line came from.
    pub fn input_name(&self) -> &str {
        self.active.as_ref().map_or("<none>", |s| s.name.as_str())
    }

    /// One-based number of the last returned line within its source.
    pub fn line_number(&self) -> usize {
        self.active.as_ref().map_or(0, |s| s.line_number)
    }

    /// Return the next script line without its trailing newline, or
    /// `None` when all sources are exhausted.
    pub fn next_line(&mut self) -> io::Result<Option<String>> {
        loop {
            if let Some(active) = &mut self.active {
                let mut buffer = String::new();
                if active.reader.read_line(&mut buffer)? > 0 {
                    if buffer.ends_with('\n') {
                        buffer.pop();
                    }
                    active.line_number += 1;
                    return Ok(Some(buffer));
                }
                self.active = None;
            }

            match self.pending.next() {
                Some(source) => self.active = Some(self.open_source(source)?),
                None => return Ok(None),
            }
        }
    }

    fn open_source(&mut self, source: ScriptValue) -> io::Result<ActiveSource> {
        match source {
            ScriptValue::StringVal(text) => {
                self.string_count += 1;
                Ok(ActiveSource {
                    reader: Box::new(Cursor::new(text)),
                    name: format!("-e expression #{}", self.string_count),
                    line_number: 0,
                })
            }
            ScriptValue::PathVal(path) => {
                let reader: Box<dyn BufRead> = if path == Path::new("-") {
                    Box::new(BufReader::new(io::stdin()))
                } else {
                    Box::new(BufReader::new(File::open(&path).map_err(|e| {
                        io::Error::new(e.kind(), format!("couldn't open {}: {e}", path.display()))
                    })?))
                };
                Ok(ActiveSource {
                    reader,
                    name: path.display().to_string(),
                    line_number: 0,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    #[test]
    fn test_string_source_lines() {
        let mut provider =
            ScriptLineProvider::new(vec![ScriptValue::StringVal("p\nd\n".to_string())]);
        assert_eq!(provider.next_line().unwrap(), Some("p".to_string()));
        assert_eq!(provider.line_number(), 1);
        assert_eq!(provider.next_line().unwrap(), Some("d".to_string()));
        assert_eq!(provider.line_number(), 2);
        assert_eq!(provider.next_line().unwrap(), None);
    }

    #[test]
    fn test_string_without_trailing_newline() {
        let mut provider = ScriptLineProvider::new(vec![ScriptValue::StringVal("s/a/b/".into())]);
        assert_eq!(provider.next_line().unwrap(), Some("s/a/b/".to_string()));
        assert_eq!(provider.next_line().unwrap(), None);
    }

    #[test]
    fn test_multiple_string_sources() {
        let mut provider = ScriptLineProvider::new(vec![
            ScriptValue::StringVal("x".into()),
            ScriptValue::StringVal("y".into()),
        ]);
        assert_eq!(provider.next_line().unwrap(), Some("x".to_string()));
        assert_eq!(provider.input_name(), "-e expression #1");
        assert_eq!(provider.next_line().unwrap(), Some("y".to_string()));
        assert_eq!(provider.input_name(), "-e expression #2");
        assert_eq!(provider.line_number(), 1);
        assert_eq!(provider.next_line().unwrap(), None);
    }

    #[test]
    fn test_file_source() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "G").unwrap();
        writeln!(file, "p").unwrap();
        let path = file.path().to_path_buf();

        let mut provider = ScriptLineProvider::new(vec![ScriptValue::PathVal(path.clone())]);
        assert_eq!(provider.next_line().unwrap(), Some("G".to_string()));
        assert_eq!(provider.input_name(), path.display().to_string());
        assert_eq!(provider.next_line().unwrap(), Some("p".to_string()));
        assert_eq!(provider.next_line().unwrap(), None);
    }

    #[test]
    fn test_missing_file_reports_error() {
        let mut provider = ScriptLineProvider::new(vec![ScriptValue::PathVal(PathBuf::from(
            "/nonexistent/script.sed",
        ))]);
        assert!(provider.next_line().is_err());
    }

    #[test]
    fn test_empty_source_list() {
        let mut provider = ScriptLineProvider::new(vec![]);
        assert_eq!(provider.next_line().unwrap(), None);
        assert_eq!(provider.input_name(), "<none>");
    }
}
