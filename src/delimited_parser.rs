// Parse delimited character sequences
//
// SPDX-License-Identifier: MIT
//
// This file is part of the sedr package.
// It is licensed under the MIT License.
// For the full copyright and license information, please view the LICENSE
// file that was distributed with this source code.

use crate::errors::compile_error_at;
use crate::escape::decode_escape;
use crate::script_cursor::ScriptCursor;
use crate::script_line_provider::ScriptLineProvider;

use uucore::error::UResult;

/// What a delimited sequence is for. Patterns keep regex syntax intact
/// for the matching engine; character lists (the y command) decode
/// every escape down to the character it names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelimitedKind {
    Pattern,
    CharList,
}

/// Read the delimiter character that opens a delimited sequence.
pub fn scan_delimiter(
    lines: &ScriptLineProvider,
    cursor: &mut ScriptCursor,
    code: char,
) -> UResult<char> {
    match cursor.bump() {
        None => compile_error_at(lines, cursor, format!("unterminated `{code}' command")),
        Some('\\') => compile_error_at(lines, cursor, "delimiter can not be a backslash"),
        Some(c) => Ok(c),
    }
}

/// Parse a delimited sequence up to and including the closing
/// delimiter. An escaped delimiter stands for the delimiter itself. In
/// pattern mode a backslash at end of line continues the sequence on
/// the next script line with an embedded newline.
pub fn parse_delimited(
    lines: &mut ScriptLineProvider,
    cursor: &mut ScriptCursor,
    delimiter: char,
    kind: DelimitedKind,
) -> UResult<String> {
    let mut result = String::new();

    loop {
        match cursor.peek() {
            None => return unterminated(lines, cursor, kind),
            Some(c) if c == delimiter => {
                cursor.bump();
                return Ok(result);
            }
            Some('[') if kind == DelimitedKind::Pattern && delimiter != '[' => {
                parse_bracket_expression(lines, cursor, &mut result)?;
            }
            Some('\\') => {
                cursor.bump();
                match cursor.peek() {
                    None => {
                        if kind != DelimitedKind::Pattern {
                            return unterminated(lines, cursor, kind);
                        }
                        let Some(next) = lines.next_line()? else {
                            return unterminated(lines, cursor, kind);
                        };
                        result.push('\n');
                        *cursor = ScriptCursor::new(&next);
                    }
                    Some(c) if c == delimiter => {
                        result.push(c);
                        cursor.bump();
                    }
                    Some('\\') if kind == DelimitedKind::CharList => {
                        result.push('\\');
                        cursor.bump();
                    }
                    // Word boundaries belong to the matching engine.
                    Some('b') if kind == DelimitedKind::Pattern => {
                        result.push_str("\\b");
                        cursor.bump();
                    }
                    Some(c) => match decode_escape(cursor) {
                        Some(decoded) => result.push(decoded),
                        None => {
                            result.push('\\');
                            result.push(c);
                            cursor.bump();
                        }
                    },
                }
            }
            Some(c) => {
                result.push(c);
                cursor.bump();
            }
        }
    }
}

fn unterminated<T>(
    lines: &ScriptLineProvider,
    cursor: &ScriptCursor,
    kind: DelimitedKind,
) -> UResult<T> {
    let what = match kind {
        DelimitedKind::Pattern => "unterminated regular expression",
        DelimitedKind::CharList => "unterminated transliteration string",
    };
    compile_error_at(lines, cursor, what)
}

/// Copy a POSIX bracket expression verbatim, so that a delimiter
/// character inside it does not end the pattern. Handles a leading ^
/// and a literal ] in first position, and the [:class:], [.coll.],
/// [=equiv=] inner forms.
fn parse_bracket_expression(
    lines: &ScriptLineProvider,
    cursor: &mut ScriptCursor,
    result: &mut String,
) -> UResult<()> {
    result.push('[');
    cursor.bump();

    if cursor.peek() == Some('^') {
        result.push('^');
        cursor.bump();
    }
    if cursor.peek() == Some(']') {
        result.push(']');
        cursor.bump();
    }

    loop {
        match cursor.peek() {
            None => return compile_error_at(lines, cursor, "unterminated bracket expression"),
            Some(']') => {
                result.push(']');
                cursor.bump();
                return Ok(());
            }
            Some('[') => {
                cursor.bump();
                match cursor.peek() {
                    Some(tag @ (':' | '.' | '=')) => {
                        cursor.bump();
                        result.push('[');
                        result.push(tag);
                        copy_inner_class(lines, cursor, tag, result)?;
                    }
                    _ => result.push('['),
                }
            }
            Some('\\') => {
                cursor.bump();
                match cursor.bump() {
                    Some(c) => {
                        result.push('\\');
                        result.push(c);
                    }
                    None => {
                        return compile_error_at(lines, cursor, "unterminated bracket expression");
                    }
                }
            }
            Some(c) => {
                result.push(c);
                cursor.bump();
            }
        }
    }
}

/// Copy the body of [:...:], [....], or [=...=] up to its closing
/// tag-bracket pair.
fn copy_inner_class(
    lines: &ScriptLineProvider,
    cursor: &mut ScriptCursor,
    tag: char,
    result: &mut String,
) -> UResult<()> {
    loop {
        match cursor.bump() {
            None => {
                return compile_error_at(
                    lines,
                    cursor,
                    format!("unterminated [{tag} {tag}] expression"),
                );
            }
            Some(c) if c == tag && cursor.peek() == Some(']') => {
                result.push(tag);
                result.push(']');
                cursor.bump();
                return Ok(());
            }
            Some(c) => result.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> ScriptLineProvider {
        ScriptLineProvider::new(vec![])
    }

    fn parse(input: &str, delimiter: char, kind: DelimitedKind) -> UResult<(String, Option<char>)> {
        let mut lines = provider();
        let mut cursor = ScriptCursor::new(input);
        let parsed = parse_delimited(&mut lines, &mut cursor, delimiter, kind)?;
        Ok((parsed, cursor.peek()))
    }

    #[test]
    fn test_scan_delimiter() {
        let lines = provider();
        let mut cursor = ScriptCursor::new(",a,b,");
        assert_eq!(scan_delimiter(&lines, &mut cursor, 's').unwrap(), ',');
        assert_eq!(cursor.peek(), Some('a'));
    }

    #[test]
    fn test_scan_delimiter_rejects_backslash() {
        let lines = provider();
        let mut cursor = ScriptCursor::new("\\a\\b\\");
        assert!(scan_delimiter(&lines, &mut cursor, 's').is_err());
    }

    #[test]
    fn test_scan_delimiter_at_eol() {
        let lines = provider();
        let mut cursor = ScriptCursor::new("");
        let err = scan_delimiter(&lines, &mut cursor, 'y').unwrap_err();
        assert!(err.to_string().contains("unterminated `y' command"));
    }

    #[test]
    fn test_simple_pattern() {
        let (parsed, rest) = parse("abc/p", '/', DelimitedKind::Pattern).unwrap();
        assert_eq!(parsed, "abc");
        assert_eq!(rest, Some('p'));
    }

    #[test]
    fn test_escaped_delimiter_becomes_literal() {
        let (parsed, _) = parse(r"a\/b/", '/', DelimitedKind::Pattern).unwrap();
        assert_eq!(parsed, "a/b");
    }

    #[test]
    fn test_custom_delimiter() {
        let (parsed, rest) = parse("a/b,x", ',', DelimitedKind::Pattern).unwrap();
        assert_eq!(parsed, "a/b");
        assert_eq!(rest, Some('x'));
    }

    #[test]
    fn test_regex_syntax_passes_through() {
        let (parsed, _) = parse(r"^a.*\(b\)$/", '/', DelimitedKind::Pattern).unwrap();
        assert_eq!(parsed, r"^a.*\(b\)$");
    }

    #[test]
    fn test_word_boundary_passes_through() {
        let (parsed, _) = parse(r"\bword\b/", '/', DelimitedKind::Pattern).unwrap();
        assert_eq!(parsed, r"\bword\b");
    }

    #[test]
    fn test_newline_escape_decoded() {
        let (parsed, _) = parse(r"a\nb/", '/', DelimitedKind::Pattern).unwrap();
        assert_eq!(parsed, "a\nb");
    }

    #[test]
    fn test_delimiter_inside_bracket_expression() {
        let (parsed, rest) = parse("[/]x/p", '/', DelimitedKind::Pattern).unwrap();
        assert_eq!(parsed, "[/]x");
        assert_eq!(rest, Some('p'));
    }

    #[test]
    fn test_posix_class_with_delimiter() {
        let (parsed, _) = parse("[[:alpha:]/]+/", '/', DelimitedKind::Pattern).unwrap();
        assert_eq!(parsed, "[[:alpha:]/]+");
    }

    #[test]
    fn test_negated_class_with_literal_bracket() {
        let (parsed, _) = parse("[^]ab]/", '/', DelimitedKind::Pattern).unwrap();
        assert_eq!(parsed, "[^]ab]");
    }

    #[test]
    fn test_unterminated_pattern() {
        assert!(parse("abc", '/', DelimitedKind::Pattern).is_err());
    }

    #[test]
    fn test_unterminated_bracket_expression() {
        assert!(parse("[abc", '/', DelimitedKind::Pattern).is_err());
    }

    #[test]
    fn test_char_list_decodes_escapes() {
        let (parsed, _) = parse(r"a\tb/", '/', DelimitedKind::CharList).unwrap();
        assert_eq!(parsed, "a\tb");
    }

    #[test]
    fn test_char_list_backslash() {
        let (parsed, _) = parse(r"\\n/", '/', DelimitedKind::CharList).unwrap();
        assert_eq!(parsed, "\\n");
    }

    #[test]
    fn test_char_list_does_not_continue_lines() {
        let mut lines = ScriptLineProvider::new(vec![]);
        let mut cursor = ScriptCursor::new("ab\\");
        assert!(parse_delimited(&mut lines, &mut cursor, '/', DelimitedKind::CharList).is_err());
    }

    #[test]
    fn test_pattern_continues_on_escaped_newline() {
        let mut lines = ScriptLineProvider::new(vec![crate::command::ScriptValue::StringVal(
            "b/".to_string(),
        )]);
        let mut cursor = ScriptCursor::new("a\\");
        let parsed =
            parse_delimited(&mut lines, &mut cursor, '/', DelimitedKind::Pattern).unwrap();
        assert_eq!(parsed, "a\nb");
    }
}
