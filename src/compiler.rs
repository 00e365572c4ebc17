// Compile scripts into the internal representation
//
// SPDX-License-Identifier: MIT
//
// This file is part of the sedr package.
// It is licensed under the MIT License.
// For the full copyright and license information, please view the LICENSE
// file that was distributed with this source code.

use crate::command::{
    Address, Executable, Instruction, InstructionData, ProcessingContext, ReplacementPart,
    ReplacementTemplate, ScriptValue, Substitution, Transliteration,
};
use crate::delimited_parser::{DelimitedKind, parse_delimited, scan_delimiter};
use crate::errors::{
    ScriptLocation, compile_error, compile_error_at, compile_failure, script_location,
    semantic_error,
};
use crate::escape::decode_escape;
use crate::named_writer::NamedWriter;
use crate::script_cursor::ScriptCursor;
use crate::script_line_provider::ScriptLineProvider;

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::Rc;

use once_cell::sync::Lazy;
use regex::Regex;
use uucore::error::UResult;

/// The argument syntax that follows a command letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CommandArgs {
    /// No argument; the command ends here.
    Empty,
    /// Text argument (a, c, i).
    Text,
    /// Block open.
    Group,
    /// Block close.
    EndGroup,
    /// Optional label (b, t, T).
    Branch,
    /// Mandatory label (:).
    Label,
    /// File to read (r).
    ReadFile,
    /// File to write (w).
    WriteFile,
    /// s/pattern/replacement/flags
    Substitute,
    /// y/source/target/
    Transliterate,
}

struct CommandSpec {
    /// Maximum number of addresses the command accepts.
    n_addr: usize,
    args: CommandArgs,
}

/// Map from command letters to their specifications.
static CMD_MAP: Lazy<HashMap<char, CommandSpec>> = Lazy::new(|| {
    use CommandArgs::*;
    let specs = [
        ('{', 2, Group),
        ('}', 0, EndGroup),
        ('a', 1, Text),
        ('b', 2, Branch),
        ('c', 2, Text),
        ('d', 2, Empty),
        ('D', 2, Empty),
        ('g', 2, Empty),
        ('G', 2, Empty),
        ('h', 2, Empty),
        ('H', 2, Empty),
        ('i', 1, Text),
        ('l', 2, Empty),
        ('n', 2, Empty),
        ('N', 2, Empty),
        ('p', 2, Empty),
        ('P', 2, Empty),
        ('q', 1, Empty),
        ('r', 1, ReadFile),
        ('s', 2, Substitute),
        ('t', 2, Branch),
        ('T', 2, Branch),
        ('w', 2, WriteFile),
        ('x', 2, Empty),
        ('y', 2, Transliterate),
        (':', 0, Label),
        ('=', 1, Empty),
    ];
    specs
        .into_iter()
        .map(|(code, n_addr, args)| (code, CommandSpec { n_addr, args }))
        .collect()
});

/// Compile the given script specifications into an executable program.
pub fn compile(scripts: Vec<ScriptValue>, context: &mut ProcessingContext) -> UResult<Executable> {
    let mut lines = ScriptLineProvider::new(scripts);
    let mut instructions = parse_program(&mut lines, context)?;
    resolve_branches(&mut instructions)?;
    Ok(Executable { instructions })
}

fn parse_program(
    lines: &mut ScriptLineProvider,
    context: &mut ProcessingContext,
) -> UResult<Vec<Instruction>> {
    let mut instructions: Vec<Instruction> = Vec::new();
    let mut open_blocks: Vec<usize> = Vec::new();
    let mut first_line = true;

    'lines: loop {
        let Some(text) = lines.next_line()? else {
            break;
        };
        // POSIX: #n as the first script line implies -n.
        if first_line && text == "#n" {
            context.quiet = true;
        }
        first_line = false;

        let mut cursor = ScriptCursor::new(&text);
        loop {
            cursor.skip_blanks();
            while cursor.peek() == Some(';') {
                cursor.bump();
                cursor.skip_blanks();
            }
            match cursor.peek() {
                None | Some('#') => continue 'lines,
                _ => {}
            }
            parse_command(lines, &mut cursor, context, &mut instructions, &mut open_blocks)?;
        }
    }

    if let Some(open) = open_blocks.pop() {
        return compile_error(&instructions[open].location, "unmatched `{'");
    }
    Ok(instructions)
}

/// Parse one command at the cursor and append it to the program.
fn parse_command(
    lines: &mut ScriptLineProvider,
    cursor: &mut ScriptCursor,
    context: &mut ProcessingContext,
    instructions: &mut Vec<Instruction>,
    open_blocks: &mut Vec<usize>,
) -> UResult<()> {
    let location = script_location(lines, cursor);
    let (addr1, addr2) = parse_addresses(lines, cursor, context)?;
    let n_addr = match (&addr1, &addr2) {
        (None, _) => 0,
        (Some(_), None) => 1,
        _ => 2,
    };

    cursor.skip_blanks();
    let mut non_select = false;
    while cursor.peek() == Some('!') {
        non_select = true;
        cursor.bump();
        cursor.skip_blanks();
    }

    let Some(code) = cursor.peek() else {
        return compile_error_at(lines, cursor, "missing command");
    };
    let Some(spec) = CMD_MAP.get(&code) else {
        return compile_error_at(lines, cursor, format!("unknown command: `{code}'"));
    };
    if n_addr > spec.n_addr {
        return compile_error_at(
            lines,
            cursor,
            format!("command {code} accepts up to {} address(es), found {n_addr}", spec.n_addr),
        );
    }
    cursor.bump();

    let data = match spec.args {
        CommandArgs::Empty => {
            parse_command_ending(lines, cursor, code)?;
            InstructionData::None
        }
        CommandArgs::Group => {
            open_blocks.push(instructions.len());
            InstructionData::BlockEnd(0)
        }
        CommandArgs::EndGroup => {
            let Some(open) = open_blocks.pop() else {
                return compile_error_at(lines, cursor, "unexpected `}'");
            };
            instructions[open].data = InstructionData::BlockEnd(instructions.len());
            parse_command_ending(lines, cursor, code)?;
            InstructionData::None
        }
        CommandArgs::Text => InstructionData::Text(parse_text_argument(lines, cursor)?),
        CommandArgs::Branch => {
            cursor.skip_blanks();
            let label = parse_label(cursor);
            parse_command_ending(lines, cursor, code)?;
            InstructionData::Branch {
                label: (!label.is_empty()).then_some(label),
                target: 0,
            }
        }
        CommandArgs::Label => {
            cursor.skip_blanks();
            let label = parse_label(cursor);
            if label.is_empty() {
                return compile_error_at(lines, cursor, "\":\" lacks a label");
            }
            parse_command_ending(lines, cursor, code)?;
            InstructionData::Label(label)
        }
        CommandArgs::ReadFile => InstructionData::ReadFile(parse_filename(lines, cursor)?),
        CommandArgs::WriteFile => {
            let path = parse_filename(lines, cursor)?;
            InstructionData::WriteFile(NamedWriter::open(path, location.clone())?)
        }
        CommandArgs::Substitute => {
            InstructionData::Substitution(parse_substitution(lines, cursor, context, &location)?)
        }
        CommandArgs::Transliterate => {
            InstructionData::Transliteration(parse_transliteration(lines, cursor)?)
        }
    };

    instructions.push(Instruction {
        code,
        addr1,
        addr2,
        non_select,
        data,
        location,
    });
    Ok(())
}

/// Parse zero, one, or two comma-separated addresses.
fn parse_addresses(
    lines: &mut ScriptLineProvider,
    cursor: &mut ScriptCursor,
    context: &mut ProcessingContext,
) -> UResult<(Option<Address>, Option<Address>)> {
    cursor.skip_blanks();
    let first = match cursor.peek() {
        Some(c) if is_address_start(c) => parse_address(lines, cursor, context)?,
        _ => return Ok((None, None)),
    };

    cursor.skip_blanks();
    if cursor.peek() != Some(',') {
        return Ok((Some(first), None));
    }
    cursor.bump();
    cursor.skip_blanks();
    match cursor.peek() {
        Some(c) if is_address_start(c) => {
            let second = parse_address(lines, cursor, context)?;
            Ok((Some(first), Some(second)))
        }
        _ => compile_error_at(lines, cursor, "expected context address"),
    }
}

fn is_address_start(c: char) -> bool {
    matches!(c, '0'..='9' | '/' | '\\' | '$')
}

fn parse_address(
    lines: &mut ScriptLineProvider,
    cursor: &mut ScriptCursor,
    context: &mut ProcessingContext,
) -> UResult<Address> {
    match cursor.peek() {
        Some('$') => {
            cursor.bump();
            Ok(Address::Last)
        }
        Some('0'..='9') => Ok(Address::Line(parse_number(lines, cursor)?)),
        _ => {
            let delimiter = match cursor.bump() {
                Some('/') => '/',
                // \cREc with an arbitrary delimiter character.
                Some('\\') => match cursor.bump() {
                    Some(c) => c,
                    None => return compile_error_at(lines, cursor, "expected context address"),
                },
                _ => return compile_error_at(lines, cursor, "expected context address"),
            };
            let pattern = parse_delimited(lines, cursor, delimiter, DelimitedKind::Pattern)?;
            let icase = cursor.peek() == Some('I');
            if icase {
                cursor.bump();
            }
            let regex = compile_regex(lines, cursor, &pattern, icase, context)?;
            Ok(Address::Pattern(regex))
        }
    }
}

fn parse_number(lines: &ScriptLineProvider, cursor: &mut ScriptCursor) -> UResult<usize> {
    let mut value: usize = 0;
    let mut any = false;
    while let Some(digit) = cursor.peek().and_then(|c| c.to_digit(10)) {
        any = true;
        value = value
            .checked_mul(10)
            .and_then(|v| v.checked_add(digit as usize))
            .ok_or_else(|| {
                compile_failure(&script_location(lines, cursor), "number out of range")
            })?;
        cursor.bump();
    }
    if !any {
        return compile_error_at(lines, cursor, "expected line number");
    }
    Ok(value)
}

/// Compile a pattern into a regex, translating BRE syntax when -E was
/// not given. An empty pattern reuses the most recently compiled one.
fn compile_regex(
    lines: &ScriptLineProvider,
    cursor: &ScriptCursor,
    pattern: &str,
    icase: bool,
    context: &mut ProcessingContext,
) -> UResult<Regex> {
    if pattern.is_empty() {
        return match &context.saved_regex {
            Some(regex) => Ok(regex.clone()),
            None => compile_error_at(lines, cursor, "no previous regular expression"),
        };
    }

    let translated;
    let source = if context.regex_extended {
        pattern
    } else {
        translated = bre_to_ere(pattern);
        &translated
    };
    let source = if icase {
        format!("(?i){source}")
    } else {
        source.to_string()
    };

    let regex = Regex::new(&source).map_err(|e| {
        compile_failure(
            &script_location(lines, cursor),
            format!("invalid regular expression: {e}"),
        )
    })?;
    context.saved_regex = Some(regex.clone());
    Ok(regex)
}

/// Rewrite a POSIX basic regular expression into the extended syntax
/// the matching engine consumes: grouping and alternation operators
/// swap their escaped and unescaped forms, and bracket expressions pass
/// through untouched.
fn bre_to_ere(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut result = String::with_capacity(pattern.len());
    let mut in_class = false;
    let mut class_len = 0;

    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if in_class {
            result.push(c);
            match c {
                ']' if class_len > 0 => in_class = false,
                '^' if class_len == 0 => {}
                _ => class_len += 1,
            }
            i += 1;
            continue;
        }
        match c {
            '[' => {
                in_class = true;
                class_len = 0;
                result.push('[');
                i += 1;
            }
            '\\' if i + 1 < chars.len() => {
                let next = chars[i + 1];
                match next {
                    // BRE operator spellings become bare operators.
                    '(' | ')' | '{' | '}' | '|' | '+' | '?' => result.push(next),
                    _ => {
                        result.push('\\');
                        result.push(next);
                    }
                }
                i += 2;
            }
            // Bare ERE operators are literals in a BRE.
            '(' | ')' | '{' | '}' | '|' | '+' | '?' => {
                result.push('\\');
                result.push(c);
                i += 1;
            }
            _ => {
                result.push(c);
                i += 1;
            }
        }
    }
    result
}

/// Check that nothing but a terminator follows a completed command.
fn parse_command_ending(
    lines: &ScriptLineProvider,
    cursor: &mut ScriptCursor,
    code: char,
) -> UResult<()> {
    cursor.skip_blanks();
    match cursor.peek() {
        None | Some(';') | Some('}') => Ok(()),
        Some(_) => compile_error_at(
            lines,
            cursor,
            format!("extra characters after `{code}' command"),
        ),
    }
}

/// Collect a label name: everything up to whitespace or a separator.
fn parse_label(cursor: &mut ScriptCursor) -> String {
    let mut label = String::new();
    while let Some(c) = cursor.peek() {
        if c == ';' || c.is_whitespace() {
            break;
        }
        label.push(c);
        cursor.bump();
    }
    label
}

/// Parse a file name argument: the rest of the line, trimmed.
fn parse_filename(lines: &ScriptLineProvider, cursor: &mut ScriptCursor) -> UResult<PathBuf> {
    cursor.skip_blanks();
    let name = cursor.take_rest();
    let name = name.trim_end();
    if name.is_empty() {
        return compile_error_at(lines, cursor, "missing file name");
    }
    Ok(PathBuf::from(name))
}

/// Parse the text argument of a, c, i. Both the one-line form
/// (`a text`) and the classic backslash-newline form are accepted;
/// escape sequences in the text are decoded.
fn parse_text_argument(
    lines: &mut ScriptLineProvider,
    cursor: &mut ScriptCursor,
) -> UResult<String> {
    cursor.skip_blanks();
    let mut text = String::new();
    loop {
        match cursor.peek() {
            None => break,
            Some('\\') => {
                cursor.bump();
                match cursor.peek() {
                    None => {
                        // Text continues on the next script line.
                        let Some(next) = lines.next_line()? else {
                            break;
                        };
                        if !text.is_empty() {
                            text.push('\n');
                        }
                        *cursor = ScriptCursor::new(&next);
                    }
                    Some(_) => match decode_escape(cursor) {
                        Some(decoded) => text.push(decoded),
                        None => {
                            if let Some(c) = cursor.bump() {
                                text.push(c);
                            }
                        }
                    },
                }
            }
            Some(c) => {
                text.push(c);
                cursor.bump();
            }
        }
    }
    Ok(text)
}

/// Parse s/pattern/replacement/flags past the s.
fn parse_substitution(
    lines: &mut ScriptLineProvider,
    cursor: &mut ScriptCursor,
    context: &mut ProcessingContext,
    location: &ScriptLocation,
) -> UResult<Box<Substitution>> {
    let delimiter = scan_delimiter(lines, cursor, 's')?;
    let pattern = parse_delimited(lines, cursor, delimiter, DelimitedKind::Pattern)?;
    let replacement = parse_replacement(lines, cursor, delimiter)?;
    let flags = parse_substitution_flags(lines, cursor)?;
    let regex = compile_regex(lines, cursor, &pattern, flags.icase, context)?;

    let available = regex.captures_len().saturating_sub(1);
    let wanted = replacement.max_group_number() as usize;
    if wanted > available {
        return semantic_error(
            location,
            's',
            format!("invalid reference \\{wanted} on command's right-hand side"),
        );
    }

    Ok(Box::new(Substitution {
        regex,
        replacement,
        occurrence: flags.occurrence.unwrap_or(1),
        global: flags.global,
        print_flag: flags.print_flag,
        write_file: flags.write_file,
    }))
}

/// Parse the replacement part of s, up to the closing delimiter.
fn parse_replacement(
    lines: &mut ScriptLineProvider,
    cursor: &mut ScriptCursor,
    delimiter: char,
) -> UResult<ReplacementTemplate> {
    let mut parts = Vec::new();
    let mut literal = String::new();

    let flush = |literal: &mut String, parts: &mut Vec<ReplacementPart>| {
        if !literal.is_empty() {
            parts.push(ReplacementPart::Literal(std::mem::take(literal)));
        }
    };

    loop {
        match cursor.bump() {
            None => return compile_error_at(lines, cursor, "unterminated `s' command"),
            Some(c) if c == delimiter => {
                flush(&mut literal, &mut parts);
                return Ok(ReplacementTemplate::new(parts));
            }
            Some('&') => {
                flush(&mut literal, &mut parts);
                parts.push(ReplacementPart::WholeMatch);
            }
            Some('\\') => match cursor.peek() {
                None => {
                    // Escaped newline: the replacement continues.
                    let Some(next) = lines.next_line()? else {
                        return compile_error_at(lines, cursor, "unterminated `s' command");
                    };
                    literal.push('\n');
                    *cursor = ScriptCursor::new(&next);
                }
                Some(c @ '1'..='9') => {
                    flush(&mut literal, &mut parts);
                    parts.push(ReplacementPart::Group(c as u32 - '0' as u32));
                    cursor.bump();
                }
                Some('\\') | Some('&') => {
                    if let Some(c) = cursor.bump() {
                        literal.push(c);
                    }
                }
                Some(c) if c == delimiter => {
                    literal.push(c);
                    cursor.bump();
                }
                Some(_) => match decode_escape(cursor) {
                    Some(decoded) => literal.push(decoded),
                    None => {
                        if let Some(c) = cursor.bump() {
                            literal.push(c);
                        }
                    }
                },
            },
            Some(c) => literal.push(c),
        }
    }
}

#[derive(Default)]
struct SubstitutionFlags {
    occurrence: Option<usize>,
    global: bool,
    print_flag: bool,
    icase: bool,
    write_file: Option<Rc<RefCell<NamedWriter>>>,
}

/// Parse the flags after the closing delimiter of s. A w flag consumes
/// the rest of the line as a file name and must come last.
fn parse_substitution_flags(
    lines: &mut ScriptLineProvider,
    cursor: &mut ScriptCursor,
) -> UResult<SubstitutionFlags> {
    let mut flags = SubstitutionFlags::default();
    loop {
        match cursor.peek() {
            None | Some(';') | Some('}') => return Ok(flags),
            Some(' ') | Some('\t') => {
                cursor.bump();
            }
            Some('g') => {
                flags.global = true;
                cursor.bump();
            }
            Some('p') => {
                flags.print_flag = true;
                cursor.bump();
            }
            Some('i') | Some('I') => {
                flags.icase = true;
                cursor.bump();
            }
            Some('0'..='9') => {
                if flags.occurrence.is_some() {
                    return compile_error_at(lines, cursor, "multiple number options to `s' command");
                }
                let location = script_location(lines, cursor);
                let n = parse_number(lines, cursor)?;
                if n == 0 {
                    return compile_error(
                        &location,
                        "number option to `s' command may not be zero",
                    );
                }
                flags.occurrence = Some(n);
            }
            Some('w') => {
                cursor.bump();
                let location = script_location(lines, cursor);
                let path = parse_filename(lines, cursor)?;
                flags.write_file = Some(NamedWriter::open(path, location)?);
                return Ok(flags);
            }
            Some(c) => {
                return compile_error_at(lines, cursor, format!("unknown option to `s': {c}"));
            }
        }
    }
}

/// Parse y/source/target/ past the y.
fn parse_transliteration(
    lines: &mut ScriptLineProvider,
    cursor: &mut ScriptCursor,
) -> UResult<Box<Transliteration>> {
    let delimiter = scan_delimiter(lines, cursor, 'y')?;
    let source = parse_delimited(lines, cursor, delimiter, DelimitedKind::CharList)?;
    let target = parse_delimited(lines, cursor, delimiter, DelimitedKind::CharList)?;
    if source.chars().count() != target.chars().count() {
        return compile_error_at(lines, cursor, "strings for `y' command are different lengths");
    }
    parse_command_ending(lines, cursor, 'y')?;
    Ok(Box::new(Transliteration::from_pairs(&source, &target)))
}

/// Resolve branch targets to instruction indices. A branch without a
/// label jumps past the end of the program.
fn resolve_branches(instructions: &mut [Instruction]) -> UResult<()> {
    let mut labels: HashMap<String, usize> = HashMap::new();
    for (index, instruction) in instructions.iter().enumerate() {
        if let InstructionData::Label(name) = &instruction.data {
            if labels.insert(name.clone(), index).is_some() {
                return semantic_error(
                    &instruction.location,
                    ':',
                    format!("duplicate label `{name}'"),
                );
            }
        }
    }

    let end = instructions.len();
    for instruction in instructions.iter_mut() {
        let location = instruction.location.clone();
        let code = instruction.code;
        if let InstructionData::Branch { label, target } = &mut instruction.data {
            *target = match label {
                None => end,
                Some(name) => match labels.get(name) {
                    Some(&index) => index,
                    None => {
                        return semantic_error(
                            &location,
                            code,
                            format!("can't find label for jump to `{name}'"),
                        );
                    }
                },
            };
        }
    }
    Ok(())
}
