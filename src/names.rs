//! Validation of package, split, process and class names.
//!
//! A name is one or more `.`-separated segments; each segment starts with an
//! ASCII letter followed by letters, digits or `_`.

use crate::error::ParseResult;
use nom::bytes::complete::take_while;
use nom::character::complete::{char, satisfy};
use nom::combinator::recognize;
use nom::sequence::pair;
use nom::IResult;

/// Hidden activity synthesized into every non-library package.
pub const APP_DETAILS_ACTIVITY_CLASS_NAME: &str = "android.app.AppDetailsActivity";

fn segment(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        satisfy(|c| c.is_ascii_alphabetic()),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
    ))(input)
}

fn separator(input: &str) -> IResult<&str, char> {
    char('.')(input)
}

fn bad_character(rest: &str) -> String {
    match rest.chars().next() {
        None | Some('.') => "empty name segment".to_string(),
        Some(c) => format!("bad character '{}'", c),
    }
}

/// Whether `name` is a legal single filesystem entry name.
pub fn is_valid_ext_filename(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && name.len() <= 255
        && !name.chars().any(|c| c == '/' || c == '\0')
}

/// Validates `name` against the segment grammar.
///
/// Returns a human-readable reason on failure and `None` when the name is valid.
pub fn validate_name(name: &str, require_separator: bool, require_filename: bool) -> Option<String> {
    if name.is_empty() {
        return Some("name is empty".to_string());
    }
    let mut rest = name;
    let mut has_separator = false;
    loop {
        match segment(rest) {
            Ok((remaining, _)) => rest = remaining,
            Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
                return Some(bad_character(e.input))
            }
            Err(nom::Err::Incomplete(_)) => return Some("truncated name".to_string()),
        }
        match separator(rest) {
            Ok((remaining, _)) => {
                has_separator = true;
                rest = remaining;
            }
            Err(_) => break,
        }
    }
    if !rest.is_empty() {
        return Some(bad_character(rest));
    }
    if require_filename && !is_valid_ext_filename(name) {
        return Some("Invalid filename".to_string());
    }
    if require_separator && !has_separator {
        return Some("must have at least one '.' separator".to_string());
    }
    None
}

/// Resolves a possibly-relative component class name against its package.
pub fn build_class_name(pkg: &str, raw: Option<&str>) -> ParseResult<String> {
    let cls = match raw {
        Some(cls) if !cls.is_empty() => cls,
        _ => fail!(BadManifest, "Empty class name in package {}", pkg),
    };
    if cls.starts_with('.') {
        return Ok(format!("{}{}", pkg, cls));
    }
    if !cls.contains('.') {
        return Ok(format!("{}.{}", pkg, cls));
    }
    Ok(cls.to_string())
}

/// Resolves a process or task-affinity name; `kind` labels error messages.
pub fn build_compound_name(pkg: &str, raw: &str, kind: &str) -> ParseResult<String> {
    if let Some(sub_name) = raw.strip_prefix(':') {
        if raw.len() < 2 {
            fail!(
                BadManifest,
                "Bad {} name {} in package {}: must be at least two characters",
                kind,
                raw,
                pkg
            );
        }
        if let Some(reason) = validate_name(sub_name, false, false) {
            fail!(
                BadManifest,
                "Invalid {} name {} in package {}: {}",
                kind,
                raw,
                pkg,
                reason
            );
        }
        return Ok(format!("{}{}", pkg, raw));
    }
    match validate_name(raw, true, false) {
        Some(reason) if raw != "system" => fail!(
            BadManifest,
            "Invalid {} name {} in package {}: {}",
            kind,
            raw,
            pkg,
            reason
        ),
        _ => Ok(raw.to_string()),
    }
}

/// Resolves a component process name.
///
/// Returns `None` when neither a default nor an explicit name applies, which
/// callers read as "the package's own process".
pub fn build_process_name(
    pkg: &str,
    default_process: Option<&str>,
    raw: Option<&str>,
    ignore_processes: bool,
    separate_processes: &[String],
) -> ParseResult<Option<String>> {
    if ignore_processes && raw != Some("system") {
        return Ok(Some(default_process.unwrap_or(pkg).to_string()));
    }
    for sp in separate_processes.iter().rev() {
        if sp == pkg || Some(sp.as_str()) == default_process || Some(sp.as_str()) == raw {
            return Ok(Some(pkg.to_string()));
        }
    }
    match raw {
        Some(raw) if !raw.is_empty() => {
            build_compound_name(pkg, raw, "process").map(Some)
        }
        _ => Ok(default_process.map(str::to_string)),
    }
}

/// Resolves a task affinity; an explicitly empty value means "no affinity".
pub fn build_task_affinity_name(
    pkg: &str,
    default_affinity: Option<&str>,
    raw: Option<&str>,
) -> ParseResult<Option<String>> {
    match raw {
        None => Ok(default_affinity.map(str::to_string)),
        Some("") => Ok(None),
        Some(raw) => build_compound_name(pkg, raw, "taskAffinity").map(Some),
    }
}
