// Program entry point and CLI processing
//
// SPDX-License-Identifier: MIT
//
// This file is part of the sedr package.
// It is licensed under the MIT License.
// For the full copyright and license information, please view the LICENSE
// file that was distributed with this source code.

pub mod command;
pub mod compiler;
pub mod delimited_parser;
pub mod errors;
pub mod escape;
pub mod in_place;
pub mod input;
pub mod named_writer;
pub mod output;
pub mod processor;
pub mod script_cursor;
pub mod script_line_provider;

use crate::command::{ProcessingContext, ScriptValue};
use crate::compiler::compile;
use crate::processor::process_all_files;
use clap::{Arg, ArgMatches, Command, arg};
use std::path::PathBuf;
use uucore::error::{UResult, UUsageError};
use uucore::format_usage;

const ABOUT: &str = "Stream editor for filtering and transforming text";
const USAGE: &str = "sedr [OPTION]... [script] [file]...";

#[uucore::main]
pub fn uumain(args: impl uucore::Args) -> UResult<()> {
    let matches = uu_app().try_get_matches_from(args)?;
    let (scripts, files) = get_scripts_files(&matches)?;
    let mut context = build_context(&matches);

    let executable = compile(scripts, &mut context)?;
    process_all_files(&executable, &files, &context)
}

pub fn uu_app() -> Command {
    Command::new(uucore::util_name())
        .about(ABOUT)
        .override_usage(format_usage(USAGE))
        .infer_long_args(true)
        .args([
            arg!([script] "Script to execute if not otherwise provided."),
            Arg::new("file")
                .help("Input files")
                .value_parser(clap::value_parser!(PathBuf))
                .num_args(0..),
            Arg::new("regexp-extended")
                .short('E')
                .long("regexp-extended")
                .short_alias('r')
                .help("Use extended regular expressions.")
                .action(clap::ArgAction::SetTrue),
            arg!(-e --expression <SCRIPT> "Add script to executed commands.")
                .action(clap::ArgAction::Append),
            // Access with .get_many::<PathBuf>("script-file")
            Arg::new("script-file")
                .short('f')
                .long("script-file")
                .help("Specify script file.")
                .value_parser(clap::value_parser!(PathBuf))
                .action(clap::ArgAction::Append),
            // Access with .get_one::<String>("in-place")
            Arg::new("in-place")
                .short('i')
                .long("in-place")
                .help("Edit files in place, making a backup if SUFFIX is supplied (-i=SUFFIX).")
                .num_args(0..=1)
                .require_equals(true)
                .default_missing_value(""),
            // Access with .get_one::<u32>("length")
            arg!(-l --length <NUM> "Specify the 'l' command line-wrap length.")
                .value_parser(clap::value_parser!(u32)),
            arg!(-n --quiet "Suppress automatic printing of pattern space.").aliases(["silent"]),
            arg!(-s --separate "Consider files as separate rather than as a long stream."),
        ])
}

// Iterate through script and file arguments specified in matches and
// return vectors of all scripts and input files in the specified order.
// If no script is specified fail with "missing script" error.
fn get_scripts_files(matches: &ArgMatches) -> UResult<(Vec<ScriptValue>, Vec<PathBuf>)> {
    let mut indexed_scripts: Vec<(usize, ScriptValue)> = Vec::new();
    let mut files: Vec<PathBuf> = Vec::new();

    let script_through_options =
        // The specification of a script: through a string or a file.
        matches.contains_id("expression") || matches.contains_id("script-file");

    if script_through_options {
        // Second and third POSIX usage cases; clap script arg is actually an input file
        // sedr [-En] -e script [-e script]... [-f script_file]... [file...]
        // sedr [-En] [-e script]... -f script_file [-f script_file]... [file...]
        if let Some(val) = matches.get_one::<String>("script") {
            files.push(PathBuf::from(val.to_owned()));
        }
    } else {
        // First POSIX spec usage case; script is the first arg.
        // sedr [-En] script [file...]
        if let Some(val) = matches.get_one::<String>("script") {
            indexed_scripts.push((0, ScriptValue::StringVal(val.to_owned())));
        } else {
            return Err(UUsageError::new(1, "missing script"));
        }
    }

    // Capture -e occurrences (STRING)
    if let Some(indices) = matches.indices_of("expression") {
        for (idx, val) in indices.zip(matches.get_many::<String>("expression").unwrap_or_default())
        {
            indexed_scripts.push((idx, ScriptValue::StringVal(val.to_owned())));
        }
    }

    // Capture -f occurrences (FILE)
    if let Some(indices) = matches.indices_of("script-file") {
        for (idx, val) in indices.zip(
            matches
                .get_many::<PathBuf>("script-file")
                .unwrap_or_default(),
        ) {
            indexed_scripts.push((idx, ScriptValue::PathVal(val.to_owned())));
        }
    }

    // Sort by index to preserve argument order.
    indexed_scripts.sort_by_key(|k| k.0);
    // Keep only the values.
    let scripts = indexed_scripts
        .into_iter()
        .map(|(_, value)| value)
        .collect();

    let rest_files: Vec<PathBuf> = matches
        .get_many::<PathBuf>("file")
        .unwrap_or_default()
        .cloned()
        .collect();
    if !rest_files.is_empty() {
        files.extend(rest_files);
    }

    // Read from stdin if no file has been specified.
    if files.is_empty() {
        files.push(PathBuf::from("-"));
    }

    Ok((scripts, files))
}

/// The l wrap width when -l is not given: the terminal width, or 70
/// when there is no terminal.
fn default_length() -> usize {
    terminal_size::terminal_size().map_or(70, |(width, _)| width.0 as usize)
}

// Parse CLI flag arguments and return a ProcessingContext struct based on them
fn build_context(matches: &ArgMatches) -> ProcessingContext {
    let in_place = matches.contains_id("in-place");
    ProcessingContext {
        regex_extended: matches.get_flag("regexp-extended"),
        quiet: matches.get_flag("quiet"),
        // In-place editing scopes $ and the line counter to each file.
        separate: matches.get_flag("separate") || in_place,
        in_place,
        in_place_suffix: matches.get_one::<String>("in-place").and_then(|s| {
            if s.is_empty() {
                None
            } else {
                Some(s.clone())
            }
        }),
        length: matches
            .get_one::<u32>("length")
            .map_or_else(default_length, |v| *v as usize),
        saved_regex: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*; // Allows access to private functions/items in this module

    // get_scripts_files

    // Helper function for supplying arguments
    fn get_test_matches(args: &[&str]) -> ArgMatches {
        uu_app().get_matches_from(["sedr"].iter().chain(args.iter()))
    }

    #[test]
    fn test_script_as_first_argument() {
        let matches = get_test_matches(&["1d", "file1.txt"]);
        let (scripts, files) = get_scripts_files(&matches).expect("Should succeed");

        assert_eq!(scripts, vec![ScriptValue::StringVal("1d".to_string())]);
        assert_eq!(files, vec![PathBuf::from("file1.txt")]);
    }

    #[test]
    fn test_expression_argument() {
        let matches = get_test_matches(&["-e", "s/foo/bar/", "file1.txt"]);
        let (scripts, files) = get_scripts_files(&matches).expect("Should succeed");

        assert_eq!(
            scripts,
            vec![ScriptValue::StringVal("s/foo/bar/".to_string())]
        );
        assert_eq!(files, vec![PathBuf::from("file1.txt")]);
    }

    #[test]
    fn test_script_file_argument() {
        let matches = get_test_matches(&["-f", "script.sed", "file1.txt"]);
        let (scripts, files) = get_scripts_files(&matches).expect("Should succeed");

        assert_eq!(
            scripts,
            vec![ScriptValue::PathVal(PathBuf::from("script.sed"))]
        );
        assert_eq!(files, vec![PathBuf::from("file1.txt")]);
    }

    #[test]
    fn test_expression_and_script_file_order() {
        let matches = get_test_matches(&["-f", "a.sed", "-e", "p", "data.txt"]);
        let (scripts, _) = get_scripts_files(&matches).expect("Should succeed");

        assert_eq!(
            scripts,
            vec![
                ScriptValue::PathVal(PathBuf::from("a.sed")),
                ScriptValue::StringVal("p".to_string()),
            ]
        );
    }

    #[test]
    fn test_multiple_files() {
        let matches = get_test_matches(&["-e", "s/foo/bar/", "file1.txt", "file2.txt"]);
        let (scripts, files) = get_scripts_files(&matches).expect("Should succeed");

        assert_eq!(
            scripts,
            vec![ScriptValue::StringVal("s/foo/bar/".to_string())]
        );
        assert_eq!(
            files,
            vec![PathBuf::from("file1.txt"), PathBuf::from("file2.txt")]
        );
    }

    #[test]
    fn test_multiple_files_script() {
        let matches = get_test_matches(&["s/foo/bar/", "file1.txt", "file2.txt"]);
        let (scripts, files) = get_scripts_files(&matches).expect("Should succeed");

        assert_eq!(
            scripts,
            vec![ScriptValue::StringVal("s/foo/bar/".to_string())]
        );
        assert_eq!(
            files,
            vec![PathBuf::from("file1.txt"), PathBuf::from("file2.txt")]
        );
    }

    #[test]
    fn test_stdin_when_no_files() {
        let matches = get_test_matches(&["-e", "s/foo/bar/"]);
        let (scripts, files) = get_scripts_files(&matches).expect("Should succeed");

        assert_eq!(
            scripts,
            vec![ScriptValue::StringVal("s/foo/bar/".to_string())]
        );
        assert_eq!(files, vec![PathBuf::from("-")]); // Stdin should be used
    }

    #[test]
    fn test_missing_script() {
        let matches = get_test_matches(&[]);
        assert!(get_scripts_files(&matches).is_err());
    }

    // build_context

    #[test]
    fn test_defaults() {
        let matches = get_test_matches(&["p"]);
        let ctx = build_context(&matches);

        assert!(!ctx.regex_extended);
        assert!(!ctx.quiet);
        assert!(!ctx.separate);
        assert!(!ctx.in_place);
        assert_eq!(ctx.in_place_suffix, None);
        assert!(ctx.saved_regex.is_none());
    }

    #[test]
    fn test_all_flags() {
        let matches = get_test_matches(&["-E", "-i", "-l", "80", "-n", "-s", "p"]);
        let ctx = build_context(&matches);

        assert!(ctx.regex_extended);
        assert!(ctx.in_place);
        assert!(ctx.in_place_suffix.is_none());
        assert_eq!(ctx.length, 80);
        assert!(ctx.quiet);
        assert!(ctx.separate);
    }

    #[test]
    fn test_in_place_with_suffix() {
        let matches = get_test_matches(&["-i=.bak", "p"]);
        let ctx = build_context(&matches);

        assert!(ctx.in_place);
        assert_eq!(ctx.in_place_suffix, Some(".bak".to_string()));
    }

    #[test]
    fn test_in_place_implies_separate() {
        let matches = get_test_matches(&["-i", "p"]);
        let ctx = build_context(&matches);

        assert!(ctx.separate);
    }

    #[test]
    fn test_custom_length() {
        let matches = get_test_matches(&["-l", "120", "p"]);
        let ctx = build_context(&matches);

        assert_eq!(ctx.length, 120);
    }

    #[test]
    fn test_silent_alias() {
        let matches = get_test_matches(&["--silent", "p"]);
        let ctx = build_context(&matches);

        assert!(ctx.quiet);
    }
}
