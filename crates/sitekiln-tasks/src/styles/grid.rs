//! `-ms-` grid fallbacks for Internet Explorer 10 and 11.
//!
//! Works on expanded Sass output, one declaration per line. Each grid
//! declaration IE can express gets its `-ms-` counterpart inserted on the
//! line before it. Named areas and line names have no IE equivalent and
//! are left alone.

use std::fmt::Write as _;

/// Insert `-ms-` grid declarations ahead of their standard forms.
pub fn prefix_grid(css: &str) -> String {
    let mut out = String::with_capacity(css.len());
    for line in css.lines() {
        if let Some((indent, name, value)) = split_declaration(line) {
            let (value, important) = match value.strip_suffix("!important") {
                Some(value) => (value.trim_end(), " !important"),
                None => (value, ""),
            };
            for (prop, val) in fallbacks(name, value) {
                let _ = writeln!(out, "{indent}{prop}: {val}{important};");
            }
        }
        out.push_str(line);
        out.push('\n');
    }
    out
}

fn split_declaration(line: &str) -> Option<(&str, &str, &str)> {
    let body = line.trim_start();
    let indent = &line[..line.len() - body.len()];
    let (name, value) = body.strip_suffix(';')?.split_once(':')?;
    let name = name.trim();
    if name.is_empty() || !name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-') {
        return None;
    }
    Some((indent, name, value.trim()))
}

fn fallbacks(name: &str, value: &str) -> Vec<(&'static str, String)> {
    match name {
        "display" => match value {
            "grid" => vec![("display", "-ms-grid".to_string())],
            "inline-grid" => vec![("display", "-ms-inline-grid".to_string())],
            _ => Vec::new(),
        },
        "grid-template-columns" => tracks(value).map(|v| vec![("-ms-grid-columns", v)]).unwrap_or_default(),
        "grid-template-rows" => tracks(value).map(|v| vec![("-ms-grid-rows", v)]).unwrap_or_default(),
        "grid-row-start" => line_number(value).map(|n| vec![("-ms-grid-row", n.to_string())]).unwrap_or_default(),
        "grid-column-start" => line_number(value)
            .map(|n| vec![("-ms-grid-column", n.to_string())])
            .unwrap_or_default(),
        "grid-row" => {
            let parts: Vec<&str> = value.split('/').map(str::trim).collect();
            placement(parts.first(), parts.get(1), "-ms-grid-row", "-ms-grid-row-span")
        }
        "grid-column" => {
            let parts: Vec<&str> = value.split('/').map(str::trim).collect();
            placement(parts.first(), parts.get(1), "-ms-grid-column", "-ms-grid-column-span")
        }
        "grid-area" => {
            let parts: Vec<&str> = value.split('/').map(str::trim).collect();
            let mut decls = placement(parts.first(), parts.get(2), "-ms-grid-row", "-ms-grid-row-span");
            decls.extend(placement(parts.get(1), parts.get(3), "-ms-grid-column", "-ms-grid-column-span"));
            decls
        }
        _ => Vec::new(),
    }
}

/// Start line plus span, when the start is a plain line number.
fn placement(
    start: Option<&&str>,
    end: Option<&&str>,
    start_prop: &'static str,
    span_prop: &'static str,
) -> Vec<(&'static str, String)> {
    let Some(start) = start.and_then(|s| line_number(s)) else {
        return Vec::new();
    };

    let mut decls = vec![(start_prop, start.to_string())];
    let span = end.and_then(|end| match end.strip_prefix("span") {
        Some(count) => count.trim().parse::<u32>().ok(),
        None => line_number(end).and_then(|end| end.checked_sub(start)),
    });
    if let Some(span) = span.filter(|&span| span > 1) {
        decls.push((span_prop, span.to_string()));
    }
    decls
}

fn line_number(value: &str) -> Option<u32> {
    value.trim().parse::<u32>().ok().filter(|&n| n > 0)
}

/// Track list in IE syntax, `repeat(n, x)` becoming `(x)[n]`.
fn tracks(value: &str) -> Option<String> {
    const UNSUPPORTED: [&str; 8] = [
        "[", "auto-fill", "auto-fit", "subgrid", "masonry", "none", "inherit", "initial",
    ];
    if value.is_empty() || UNSUPPORTED.iter().any(|word| value.contains(word)) {
        return None;
    }

    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(idx) = rest.find("repeat(") {
        out.push_str(&rest[..idx]);
        let args_start = idx + "repeat(".len();
        let close = args_start + closing_paren(&rest[args_start..])?;
        let (count, list) = rest[args_start..close].split_once(',')?;
        let count = count.trim().parse::<u32>().ok()?;
        let _ = write!(out, "({})[{count}]", list.trim());
        rest = &rest[close + 1..];
    }
    out.push_str(rest);
    Some(out)
}

fn closing_paren(input: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (idx, c) in input.char_indices() {
        match c {
            '(' => depth += 1,
            ')' if depth == 0 => return Some(idx),
            ')' => depth -= 1,
            _ => {}
        }
    }
    None
}
