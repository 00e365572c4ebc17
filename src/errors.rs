// Error construction with script locations
//
// SPDX-License-Identifier: MIT
//
// This file is part of the sedr package.
// It is licensed under the MIT License.
// For the full copyright and license information, please view the LICENSE
// file that was distributed with this source code.

use crate::script_cursor::ScriptCursor;
use crate::script_line_provider::ScriptLineProvider;

use uucore::error::{UError, UResult, USimpleError};

/// Position of a script construct, kept for error messages.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScriptLocation {
    pub input_name: String,
    pub line: usize,
    pub column: usize,
}

impl ScriptLocation {
    pub fn new(input_name: impl Into<String>, line: usize, column: usize) -> Self {
        ScriptLocation {
            input_name: input_name.into(),
            line,
            column,
        }
    }
}

/// The location under the compiler's cursor, with a one-based column.
pub fn script_location(lines: &ScriptLineProvider, cursor: &ScriptCursor) -> ScriptLocation {
    ScriptLocation::new(lines.input_name(), lines.line_number(), cursor.pos() + 1)
}

/// A compile-phase error at the given location. Exit code 1.
pub fn compile_failure(location: &ScriptLocation, msg: impl ToString) -> Box<dyn UError> {
    USimpleError::new(
        1,
        format!(
            "{}:{}:{}: error: {}",
            location.input_name,
            location.line,
            location.column,
            msg.to_string()
        ),
    )
}

/// Fail with msg as a compile error at the given location.
pub fn compile_error<T>(location: &ScriptLocation, msg: impl ToString) -> UResult<T> {
    Err(compile_failure(location, msg))
}

/// Fail with msg as a compile error at the compiler's cursor.
pub fn compile_error_at<T>(
    lines: &ScriptLineProvider,
    cursor: &ScriptCursor,
    msg: impl ToString,
) -> UResult<T> {
    compile_error(&script_location(lines, cursor), msg)
}

fn command_failure(
    location: &ScriptLocation,
    code: char,
    msg: impl ToString,
    exit_code: i32,
) -> Box<dyn UError> {
    USimpleError::new(
        exit_code,
        format!(
            "{}:{}:{}: command `{}': error: {}",
            location.input_name,
            location.line,
            location.column,
            code,
            msg.to_string()
        ),
    )
}

/// Fail with msg as a compile-phase error blamed on a whole command.
/// Exit code 1.
pub fn semantic_error<T>(location: &ScriptLocation, code: char, msg: impl ToString) -> UResult<T> {
    Err(command_failure(location, code, msg, 1))
}

/// A processing-phase error blamed on a command. Exit code 2.
pub fn runtime_failure(location: &ScriptLocation, code: char, msg: impl ToString) -> Box<dyn UError> {
    command_failure(location, code, msg, 2)
}
