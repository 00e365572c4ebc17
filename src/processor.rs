// Execute the compiled script on the input files
//
// SPDX-License-Identifier: MIT
//
// This file is part of the sedr package.
// It is licensed under the MIT License.
// For the full copyright and license information, please view the LICENSE
// file that was distributed with this source code.

use crate::command::{
    Address, Executable, Instruction, InstructionData, ProcessingContext,
};
use crate::in_place::InPlace;
use crate::input::LineReader;
use crate::named_writer;
use crate::output::OutputSink;

use std::fs;
use std::path::PathBuf;

use memchr::memchr;
use uucore::display::Quotable;
use uucore::error::{UResult, USimpleError, set_exit_code};
use uucore::show_error;

/// Content queued by a or r for writing at the end of the cycle.
#[derive(Debug)]
enum AppendEntry {
    Text(String),
    FileContents(PathBuf),
}

/// Where to continue execution when n or N suspended the current cycle
/// waiting for the next input line.
#[derive(Debug, Clone, Copy)]
struct Resume {
    at: usize,
    /// True for N: the new line joins the pattern space.
    append: bool,
}

/// Everything that changes while lines are processed.
#[derive(Debug)]
struct ExecutionState {
    pattern_space: String,
    /// Whether the line(s) in the pattern space ended with a newline.
    has_newline: bool,
    hold_space: String,
    /// Number of input lines consumed so far.
    line_number: usize,
    last_line: bool,
    /// An s command succeeded since the last line was read (or n ran).
    substituted: bool,
    append_queue: Vec<AppendEntry>,
    /// Active flag per instruction, for two-address ranges.
    range_active: Vec<bool>,
    resume: Option<Resume>,
    quit: bool,
}

impl ExecutionState {
    fn new(program_len: usize) -> Self {
        ExecutionState {
            pattern_space: String::new(),
            has_newline: true,
            hold_space: String::new(),
            line_number: 0,
            last_line: false,
            substituted: false,
            append_queue: Vec::new(),
            range_active: vec![false; program_len],
            resume: None,
            quit: false,
        }
    }
}

/// The interpreter for one compiled program. In the default combined
/// mode one executor spans all input files; with -s or -i it is reset
/// for each file.
pub struct Executor<'p> {
    program: &'p Executable,
    context: &'p ProcessingContext,
    state: ExecutionState,
}

impl<'p> Executor<'p> {
    pub fn new(program: &'p Executable, context: &'p ProcessingContext) -> Self {
        Executor {
            program,
            context,
            state: ExecutionState::new(program.len()),
        }
    }

    /// Forget all state, for per-file processing.
    pub fn reset(&mut self) {
        self.state = ExecutionState::new(self.program.len());
    }

    /// True once a q command has ended the run.
    pub fn finished(&self) -> bool {
        self.state.quit
    }

    /// Feed every line of one input file through the program.
    /// `last_file` marks the file whose end is the end of the whole
    /// input stream.
    pub fn process_file(
        &mut self,
        reader: &mut LineReader,
        output: &mut OutputSink,
        last_file: bool,
    ) -> UResult<()> {
        while !self.state.quit {
            let Some((text, had_newline)) = reader
                .next_line()
                .map_err(|e| USimpleError::new(2, format!("read error: {e}")))?
            else {
                break;
            };

            self.state.last_line = reader
                .at_eof()
                .map_err(|e| USimpleError::new(2, format!("read error: {e}")))?
                && (self.context.separate || last_file);
            self.state.line_number += 1;

            let start = match self.state.resume.take() {
                Some(resume) if resume.append => {
                    self.state.pattern_space.push('\n');
                    self.state.pattern_space.push_str(&text);
                    self.state.has_newline = had_newline;
                    resume.at
                }
                Some(resume) => {
                    self.state.pattern_space = text;
                    self.state.has_newline = had_newline;
                    self.state.substituted = false;
                    resume.at
                }
                None => {
                    self.state.pattern_space = text;
                    self.state.has_newline = had_newline;
                    self.state.substituted = false;
                    0
                }
            };
            self.run_cycle(start, output)?;
        }
        Ok(())
    }

    /// Run one cycle of the program over the current pattern space,
    /// starting at instruction `start`.
    fn run_cycle(&mut self, start: usize, output: &mut OutputSink) -> UResult<()> {
        let program = self.program;
        let mut pc = start;
        let mut print_at_end = true;

        while pc < program.instructions.len() {
            let instruction = &program.instructions[pc];

            if !self.selected(pc, instruction) {
                if let InstructionData::BlockEnd(close) = instruction.data {
                    pc = close + 1;
                } else {
                    pc += 1;
                }
                continue;
            }

            match instruction.code {
                '{' | '}' | ':' => {}
                '=' => output.emit_line(&self.state.line_number.to_string())?,
                'a' => {
                    if let InstructionData::Text(text) = &instruction.data {
                        self.state.append_queue.push(AppendEntry::Text(text.clone()));
                    }
                }
                'i' => {
                    if let InstructionData::Text(text) = &instruction.data {
                        output.emit_line(text)?;
                    }
                }
                'c' => {
                    if let InstructionData::Text(text) = &instruction.data {
                        output.emit_line(text)?;
                    }
                    print_at_end = false;
                    break;
                }
                'd' => {
                    print_at_end = false;
                    break;
                }
                'D' => match memchr(b'\n', self.state.pattern_space.as_bytes()) {
                    Some(newline) => {
                        self.state.pattern_space.drain(..=newline);
                        pc = 0;
                        continue;
                    }
                    None => {
                        print_at_end = false;
                        break;
                    }
                },
                'g' => {
                    self.state.pattern_space = self.state.hold_space.clone();
                }
                'G' => {
                    self.state.pattern_space.push('\n');
                    self.state.pattern_space.push_str(&self.state.hold_space);
                }
                'h' => {
                    self.state.hold_space = self.state.pattern_space.clone();
                }
                'H' => {
                    self.state.hold_space.push('\n');
                    self.state.hold_space.push_str(&self.state.pattern_space);
                }
                'x' => {
                    std::mem::swap(&mut self.state.pattern_space, &mut self.state.hold_space);
                }
                'l' => {
                    let rendered = visible_rendering(&self.state.pattern_space, self.context.length);
                    output.emit_line(&rendered)?;
                }
                'n' => {
                    if !self.context.quiet {
                        output.emit(&self.state.pattern_space, self.state.has_newline)?;
                    }
                    self.state.resume = Some(Resume {
                        at: pc + 1,
                        append: false,
                    });
                    print_at_end = false;
                    break;
                }
                'N' => {
                    self.state.resume = Some(Resume {
                        at: pc + 1,
                        append: true,
                    });
                    print_at_end = false;
                    break;
                }
                'p' => output.emit(&self.state.pattern_space, self.state.has_newline)?,
                'P' => match memchr(b'\n', self.state.pattern_space.as_bytes()) {
                    Some(newline) => output.emit(&self.state.pattern_space[..newline], true)?,
                    None => output.emit(&self.state.pattern_space, self.state.has_newline)?,
                },
                'q' => {
                    self.state.quit = true;
                    break;
                }
                'r' => {
                    if let InstructionData::ReadFile(path) = &instruction.data {
                        self.state
                            .append_queue
                            .push(AppendEntry::FileContents(path.clone()));
                    }
                }
                's' => {
                    if let InstructionData::Substitution(substitution) = &instruction.data {
                        if let Some(rewritten) = substitution.apply(&self.state.pattern_space) {
                            self.state.pattern_space = rewritten;
                            self.state.substituted = true;
                            if substitution.print_flag {
                                output.emit(&self.state.pattern_space, self.state.has_newline)?;
                            }
                            if let Some(writer) = &substitution.write_file {
                                writer.borrow_mut().write_line(&self.state.pattern_space)?;
                            }
                        }
                    }
                }
                'w' => {
                    if let InstructionData::WriteFile(writer) = &instruction.data {
                        writer.borrow_mut().write_line(&self.state.pattern_space)?;
                    }
                }
                'y' => {
                    if let InstructionData::Transliteration(table) = &instruction.data {
                        self.state.pattern_space = table.translate(&self.state.pattern_space);
                    }
                }
                'b' => {
                    if let InstructionData::Branch { target, .. } = &instruction.data {
                        pc = *target;
                        continue;
                    }
                }
                't' => {
                    if self.state.substituted {
                        self.state.substituted = false;
                        if let InstructionData::Branch { target, .. } = &instruction.data {
                            pc = *target;
                            continue;
                        }
                    }
                }
                'T' => {
                    if !self.state.substituted {
                        if let InstructionData::Branch { target, .. } = &instruction.data {
                            pc = *target;
                            continue;
                        }
                    }
                }
                _ => {}
            }
            pc += 1;
        }

        if print_at_end && !self.context.quiet {
            output.emit(&self.state.pattern_space, self.state.has_newline)?;
        }
        self.flush_append_queue(output)
    }

    /// Decide whether the instruction applies to the current pattern
    /// space, updating its range activation.
    fn selected(&mut self, index: usize, instruction: &Instruction) -> bool {
        let state = &mut self.state;
        let picked = match (&instruction.addr1, &instruction.addr2) {
            (None, _) => true,
            (Some(address), None) => address_matches(address, state),
            (Some(start), Some(end)) => {
                if state.range_active[index] {
                    match end {
                        // Once the counter has passed a numeric end the
                        // range is over and the line is not selected.
                        Address::Line(n) => {
                            if *n < state.line_number {
                                state.range_active[index] = false;
                                false
                            } else {
                                true
                            }
                        }
                        Address::Last => true,
                        // The line ending a pattern range is still
                        // selected; deactivation takes effect after.
                        Address::Pattern(regex) => {
                            if regex.is_match(&state.pattern_space) {
                                state.range_active[index] = false;
                            }
                            true
                        }
                    }
                } else {
                    let starts = address_matches(start, state);
                    if starts {
                        state.range_active[index] = true;
                    }
                    starts
                }
            }
        };
        picked != instruction.non_select
    }

    fn flush_append_queue(&mut self, output: &mut OutputSink) -> UResult<()> {
        for entry in std::mem::take(&mut self.state.append_queue) {
            match entry {
                AppendEntry::Text(text) => output.emit_line(&text)?,
                AppendEntry::FileContents(path) => {
                    // An unreadable file contributes nothing.
                    let Ok(content) = fs::read_to_string(&path) else {
                        continue;
                    };
                    if content.is_empty() {
                        continue;
                    }
                    match content.strip_suffix('\n') {
                        Some(body) => output.emit(body, true)?,
                        None => output.emit(&content, false)?,
                    }
                }
            }
        }
        Ok(())
    }
}

fn address_matches(address: &Address, state: &ExecutionState) -> bool {
    match address {
        Address::Line(n) => *n == state.line_number,
        Address::Last => state.last_line,
        Address::Pattern(regex) => regex.is_match(&state.pattern_space),
    }
}

/// Render the pattern space for the l command: known control
/// characters get their backslash names, a backslash doubles, other
/// non-printable bytes become three-digit octal escapes, and long
/// lines wrap with a trailing backslash. `width` 0 disables wrapping.
fn visible_rendering(text: &str, width: usize) -> String {
    let wrap_at = width.saturating_sub(1);
    let mut result = String::new();
    let mut column = 0usize;

    fn push_token(result: &mut String, column: &mut usize, wrap_at: usize, token: &str) {
        if wrap_at > 0 && *column + token.len() > wrap_at {
            result.push_str("\\\n");
            *column = 0;
        }
        result.push_str(token);
        *column += token.len();
    }

    let mut buffer = [0u8; 4];
    for c in text.chars() {
        match c {
            '\n' => {
                result.push('\n');
                column = 0;
            }
            '\\' => push_token(&mut result, &mut column, wrap_at, "\\\\"),
            '\x07' => push_token(&mut result, &mut column, wrap_at, "\\a"),
            '\x08' => push_token(&mut result, &mut column, wrap_at, "\\b"),
            '\x0c' => push_token(&mut result, &mut column, wrap_at, "\\f"),
            '\r' => push_token(&mut result, &mut column, wrap_at, "\\r"),
            '\t' => push_token(&mut result, &mut column, wrap_at, "\\t"),
            '\x0b' => push_token(&mut result, &mut column, wrap_at, "\\v"),
            c if c.is_ascii_graphic() || c == ' ' => {
                push_token(&mut result, &mut column, wrap_at, c.encode_utf8(&mut buffer));
            }
            c => {
                for byte in c.encode_utf8(&mut buffer).as_bytes() {
                    push_token(&mut result, &mut column, wrap_at, &format!("\\{byte:03o}"));
                }
            }
        }
    }
    result
}

/// Index of the last reader that will produce a line. Trailing empty
/// files must not push the end of the stream past the line that really
/// finishes it.
fn last_index_with_content(readers: &mut [(PathBuf, LineReader)]) -> UResult<usize> {
    let mut last = 0;
    for (index, (_, reader)) in readers.iter_mut().enumerate() {
        let empty = reader
            .at_eof()
            .map_err(|e| USimpleError::new(2, format!("read error: {e}")))?;
        if !empty {
            last = index;
        }
    }
    Ok(last)
}

/// Run the program over all input files in order.
pub fn process_all_files(
    program: &Executable,
    files: &[PathBuf],
    context: &ProcessingContext,
) -> UResult<()> {
    let mut in_place = InPlace::new(context);
    let mut executor = Executor::new(program, context);

    let mut readers: Vec<(PathBuf, LineReader)> = Vec::new();
    for path in files {
        match LineReader::open(path) {
            Ok(reader) => readers.push((path.clone(), reader)),
            Err(e) => {
                show_error!("can't read {}: {e}", path.quote());
                set_exit_code(2);
            }
        }
    }
    let last = last_index_with_content(&mut readers)?;

    for (index, (path, mut reader)) in readers.into_iter().enumerate() {
        if context.separate {
            executor.reset();
        }
        let output = in_place.begin(&path)?;
        executor.process_file(&mut reader, output, index >= last)?;
        in_place.end()?;
        if executor.finished() {
            break;
        }
    }

    in_place.finish()?;
    named_writer::flush_all()
}
