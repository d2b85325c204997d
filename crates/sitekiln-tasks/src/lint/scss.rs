//! Stylesheet linting.
//!
//! A single pass over a masked copy of the source: comments, string contents
//! and unquoted `url(...)` arguments are blanked out so the rules only see
//! selectors, properties and values.

use std::collections::HashSet;

/// Units for which a zero value needs no unit.
const LENGTH_UNITS: &[&str] = &[
    "px", "em", "rem", "ex", "ch", "vw", "vh", "vmin", "vmax", "cm", "mm", "in", "pt", "pc", "q",
];

/// Stand-in for masked comment characters; comments count as block content.
const COMMENT: char = '\0';

/// A single stylesheet lint finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub line: usize,
    pub column: usize,
    pub rule: &'static str,
    pub message: String,
}

impl Finding {
    fn new(line: usize, column: usize, rule: &'static str, message: impl Into<String>) -> Self {
        Self {
            line,
            column,
            rule,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Pos {
    c: char,
    line: usize,
    column: usize,
}

#[derive(Debug)]
struct Block {
    line: usize,
    column: usize,
    has_content: bool,
    properties: HashSet<String>,
}

/// Lint SCSS source, returning findings ordered by position.
pub fn lint_scss(source: &str) -> Vec<Finding> {
    if source.trim().is_empty() {
        return vec![Finding::new(1, 1, "no-empty-source", "Unexpected empty source")];
    }

    let mut findings = Vec::new();
    check_eol_whitespace(source, &mut findings);

    let masked = mask(source);
    let mut blocks: Vec<Block> = Vec::new();
    let mut statement: Vec<Pos> = Vec::new();
    let (mut line, mut column) = (1, 0);
    let mut i = 0;

    while i < masked.len() {
        let c = masked[i];
        if c == '\n' {
            line += 1;
            column = 0;
        } else {
            column += 1;
        }

        match c {
            COMMENT => {
                if let Some(block) = blocks.last_mut() {
                    block.has_content = true;
                }
            }
            '#' if masked.get(i + 1) == Some(&'{') => {
                // Interpolation braces are part of the statement, not blocks.
                let mut depth = 0;
                while i < masked.len() {
                    let c = masked[i];
                    statement.push(Pos { c, line, column });
                    match c {
                        '{' => depth += 1,
                        '}' => depth -= 1,
                        _ => {}
                    }
                    if depth == 0 && c == '}' {
                        break;
                    }
                    i += 1;
                    if masked.get(i).is_some_and(|c| *c != '\n') {
                        column += 1;
                    } else if masked.get(i).is_some() {
                        line += 1;
                        column = 0;
                    }
                }
            }
            '{' => {
                if let Some(parent) = blocks.last_mut() {
                    parent.has_content = true;
                }
                statement.clear();
                blocks.push(Block {
                    line,
                    column,
                    has_content: false,
                    properties: HashSet::new(),
                });
            }
            ';' => {
                finish_statement(&statement, blocks.last_mut(), &mut findings);
                statement.clear();
            }
            '}' => {
                finish_statement(&statement, blocks.last_mut(), &mut findings);
                statement.clear();
                if let Some(block) = blocks.pop() {
                    if !block.has_content {
                        findings.push(Finding::new(
                            block.line,
                            block.column,
                            "block-no-empty",
                            "Unexpected empty block",
                        ));
                    }
                }
            }
            _ => statement.push(Pos { c, line, column }),
        }
        i += 1;
    }

    findings.sort_by_key(|f| (f.line, f.column));
    findings
}

fn check_eol_whitespace(source: &str, findings: &mut Vec<Finding>) {
    for (idx, raw) in source.lines().enumerate() {
        let raw = raw.strip_suffix('\r').unwrap_or(raw);
        let trimmed = raw.trim_end_matches([' ', '\t']);
        if trimmed.len() != raw.len() && !trimmed.is_empty() {
            findings.push(Finding::new(
                idx + 1,
                trimmed.chars().count() + 1,
                "no-eol-whitespace",
                "Unexpected whitespace at end of line",
            ));
        }
    }
}

/// Blank out comments, string contents and unquoted `url()` arguments.
fn mask(source: &str) -> Vec<char> {
    let chars: Vec<char> = source.chars().collect();
    let mut out = chars.clone();
    let blank = |out: &mut Vec<char>, idx: usize, with: char| {
        if out[idx] != '\n' {
            out[idx] = with;
        }
    };

    let mut i = 0;
    while i < chars.len() {
        let next = chars.get(i + 1).copied();
        match chars[i] {
            '/' if next == Some('*') => {
                let mut j = i;
                while j < chars.len() {
                    let closing = chars[j] == '/' && j > i + 1 && chars[j - 1] == '*';
                    blank(&mut out, j, COMMENT);
                    j += 1;
                    if closing {
                        break;
                    }
                }
                i = j;
            }
            '/' if next == Some('/') => {
                while i < chars.len() && chars[i] != '\n' {
                    blank(&mut out, i, COMMENT);
                    i += 1;
                }
            }
            quote @ ('"' | '\'') => {
                i += 1;
                while i < chars.len() && chars[i] != quote {
                    if chars[i] == '\\' && i + 1 < chars.len() {
                        blank(&mut out, i, ' ');
                        i += 1;
                    }
                    blank(&mut out, i, ' ');
                    i += 1;
                }
                i += 1;
            }
            'u' | 'U' if is_unquoted_url(&chars[i..]) => {
                i += 4;
                while i < chars.len() && chars[i] != ')' {
                    blank(&mut out, i, ' ');
                    i += 1;
                }
            }
            _ => i += 1,
        }
    }
    out
}

fn is_unquoted_url(chars: &[char]) -> bool {
    let prefix: String = chars.iter().take(4).collect();
    if !prefix.eq_ignore_ascii_case("url(") {
        return false;
    }
    chars[4..]
        .iter()
        .find(|c| !c.is_whitespace())
        .is_some_and(|c| *c != '"' && *c != '\'')
}

/// Check a `property: value` statement inside a block.
fn finish_statement(statement: &[Pos], block: Option<&mut Block>, findings: &mut Vec<Finding>) {
    let Some(start) = statement.iter().position(|p| !p.c.is_whitespace()) else {
        return;
    };
    let statement = &statement[start..];
    let Some(block) = block else {
        return;
    };
    block.has_content = true;

    let first = statement[0];
    if first.c == '@' || first.c == '&' {
        return;
    }
    let Some(colon) = statement.iter().position(|p| p.c == ':') else {
        return;
    };

    let property: String = statement[..colon].iter().map(|p| p.c).collect();
    let property = property.trim().to_ascii_lowercase();
    let value = &statement[colon + 1..];

    let is_variable = property.starts_with('$');
    let is_custom = property.starts_with("--");
    if !is_variable && !is_custom && !property.contains("#{") && !block.properties.insert(property.clone()) {
        findings.push(Finding::new(
            first.line,
            first.column,
            "declaration-block-no-duplicate-properties",
            format!("Unexpected duplicate \"{property}\""),
        ));
    }

    check_hex_colors(value, findings);
    if !is_custom {
        check_zero_lengths(value, findings);
    }
}

fn check_hex_colors(value: &[Pos], findings: &mut Vec<Finding>) {
    let mut i = 0;
    while i < value.len() {
        if value[i].c != '#' || value.get(i + 1).is_some_and(|p| p.c == '{') {
            i += 1;
            continue;
        }
        let run: String = value[i + 1..]
            .iter()
            .take_while(|p| p.c.is_ascii_alphanumeric())
            .map(|p| p.c)
            .collect();
        let at = value[i];
        if !run.is_empty() {
            let is_hex = run.chars().all(|c| c.is_ascii_hexdigit());
            if !is_hex || ![3, 4, 6, 8].contains(&run.len()) {
                findings.push(Finding::new(
                    at.line,
                    at.column,
                    "color-no-invalid-hex",
                    format!("Unexpected invalid hex color \"#{run}\""),
                ));
            } else if run.chars().any(|c| c.is_ascii_uppercase()) {
                findings.push(Finding::new(
                    at.line,
                    at.column,
                    "color-hex-case",
                    format!(
                        "Expected \"#{run}\" to be \"#{}\"",
                        run.to_ascii_lowercase()
                    ),
                ));
            }
        }
        i += 1 + run.len();
    }
}

fn check_zero_lengths(value: &[Pos], findings: &mut Vec<Finding>) {
    let mut i = 0;
    while i < value.len() {
        let c = value[i].c;
        let starts_number = c.is_ascii_digit()
            || (c == '.' && value.get(i + 1).is_some_and(|p| p.c.is_ascii_digit()));
        let preceded_by_word = i > 0 && {
            let prev = value[i - 1].c;
            prev.is_ascii_alphanumeric() || matches!(prev, '-' | '_' | '.' | '#' | '$')
        };

        if !starts_number || preceded_by_word {
            // Skip the rest of an identifier or hex colour in one go.
            if c.is_ascii_alphanumeric() || c == '#' || c == '$' {
                while i < value.len()
                    && (value[i].c.is_ascii_alphanumeric() || matches!(value[i].c, '#' | '$' | '-' | '_'))
                {
                    i += 1;
                }
            } else {
                i += 1;
            }
            continue;
        }

        let number_end = i + value[i..]
            .iter()
            .take_while(|p| p.c.is_ascii_digit() || p.c == '.')
            .count();
        let unit: String = value[number_end..]
            .iter()
            .take_while(|p| p.c.is_ascii_alphabetic() || p.c == '%')
            .map(|p| p.c)
            .collect();
        let is_zero = value[i..number_end].iter().all(|p| p.c == '0' || p.c == '.');

        if is_zero && LENGTH_UNITS.contains(&unit.to_ascii_lowercase().as_str()) {
            let at = value[number_end];
            findings.push(Finding::new(
                at.line,
                at.column,
                "length-zero-no-unit",
                "Unexpected unit",
            ));
        }
        i = number_end + unit.chars().count();
    }
}
