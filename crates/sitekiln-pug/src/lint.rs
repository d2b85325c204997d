//! Template linting.
//!
//! Rules work on the raw source (whitespace rules) and on the parsed tree
//! (attribute and tag rules). A file that fails to parse yields a `syntax`
//! violation and only the whitespace rules.

use std::collections::HashSet;

use crate::{
    ast::{AttrValue, walk_elements},
    parser::parse,
};

/// A single lint finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LintViolation {
    pub line: usize,
    pub column: usize,
    pub rule: &'static str,
    pub message: String,
}

impl LintViolation {
    fn new(line: usize, column: usize, rule: &'static str, message: impl Into<String>) -> Self {
        Self {
            line,
            column,
            rule,
            message: message.into(),
        }
    }
}

/// Lint template source, returning violations ordered by position.
pub fn lint(source: &str) -> Vec<LintViolation> {
    let mut violations = Vec::new();

    check_whitespace(source, &mut violations);

    match parse(source) {
        Ok(nodes) => {
            walk_elements(&nodes, &mut |el| {
                if el.tag.chars().any(|c| c.is_ascii_uppercase()) {
                    violations.push(LintViolation::new(
                        el.line,
                        el.column,
                        "require-lower-case-tags",
                        format!("Tag `{}` must be lower case", el.tag),
                    ));
                }

                let mut seen = HashSet::new();
                for attr in &el.attrs {
                    if !seen.insert(attr.name.to_ascii_lowercase()) {
                        violations.push(LintViolation::new(
                            attr.line,
                            attr.column,
                            "disallow-duplicate-attributes",
                            format!("Duplicate attribute `{}`", attr.name),
                        ));
                    }
                    if let AttrValue::Str(value) = &attr.value {
                        match attr.name.as_str() {
                            "class" => violations.push(LintViolation::new(
                                attr.line,
                                attr.column,
                                "disallow-class-attribute-with-static-value",
                                format!("Static class attribute, use `.{}` instead", first_word(value)),
                            )),
                            "id" => violations.push(LintViolation::new(
                                attr.line,
                                attr.column,
                                "disallow-id-attribute-with-static-value",
                                format!("Static id attribute, use `#{value}` instead"),
                            )),
                            _ => {}
                        }
                    }
                }
            });
        }
        Err(err) => violations.push(LintViolation::new(err.line, 1, "syntax", err.message)),
    }

    violations.sort_by_key(|v| (v.line, v.column));
    violations
}

fn first_word(value: &str) -> &str {
    value.split_whitespace().next().unwrap_or(value)
}

fn check_whitespace(source: &str, violations: &mut Vec<LintViolation>) {
    let mut indent_char = None;

    for (idx, line) in source.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.strip_suffix('\r').unwrap_or(line);

        let trimmed = line.trim_end_matches([' ', '\t']);
        if trimmed.len() != line.len() && !trimmed.is_empty() {
            violations.push(LintViolation::new(
                line_no,
                trimmed.chars().count() + 1,
                "no-trailing-whitespace",
                "Trailing whitespace",
            ));
        }

        let leading: &str = &line[..line.len() - line.trim_start_matches([' ', '\t']).len()];
        if leading.is_empty() || trimmed.is_empty() {
            continue;
        }

        let has_tab = leading.contains('\t');
        let has_space = leading.contains(' ');
        if has_tab && has_space {
            violations.push(LintViolation::new(
                line_no,
                1,
                "disallow-mixed-indentation",
                "Indentation mixes tabs and spaces",
            ));
            continue;
        }

        let this_char = if has_tab { '\t' } else { ' ' };
        match indent_char {
            None => indent_char = Some(this_char),
            Some(expected) if expected != this_char => {
                violations.push(LintViolation::new(
                    line_no,
                    1,
                    "disallow-mixed-indentation",
                    if expected == '\t' {
                        "Expected tab indentation"
                    } else {
                        "Expected space indentation"
                    },
                ));
            }
            Some(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules(source: &str) -> Vec<&'static str> {
        lint(source).into_iter().map(|v| v.rule).collect()
    }

    #[test]
    fn test_clean_template() {
        let source = "doctype html\nhtml\n  body\n    h1.title#top Hello\n    a(href=\"/\") Home\n";
        assert!(lint(source).is_empty());
    }

    #[test]
    fn test_trailing_whitespace() {
        let violations = lint("div  \np");
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].rule, "no-trailing-whitespace");
        assert_eq!((violations[0].line, violations[0].column), (1, 4));
    }

    #[test]
    fn test_mixed_indentation() {
        assert_eq!(rules("div\n \tp"), vec!["disallow-mixed-indentation"]);
        assert_eq!(
            rules("div\n  p\nsection\n\tspan"),
            vec!["disallow-mixed-indentation"]
        );
    }

    #[test]
    fn test_duplicate_attributes() {
        let violations = lint("a(href=\"/\" title=\"x\" href=\"/y\")");
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].rule, "disallow-duplicate-attributes");
        assert_eq!(violations[0].column, 22);
    }

    #[test]
    fn test_static_class_and_id() {
        assert_eq!(
            rules("div(class=\"card\" id=\"main\")"),
            vec![
                "disallow-class-attribute-with-static-value",
                "disallow-id-attribute-with-static-value"
            ]
        );
    }

    #[test]
    fn test_lower_case_tags() {
        assert_eq!(rules("DIV"), vec!["require-lower-case-tags"]);
    }

    #[test]
    fn test_syntax_error_reported() {
        let violations = lint("div\n    p\n  span");
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].rule, "syntax");
        assert_eq!(violations[0].line, 3);
    }

    #[test]
    fn test_nested_elements_are_checked() {
        let source = "mixin card\n  div(class=\"c\")\nblock content\n  ul\n    li: A(href=\"/\") x";
        assert_eq!(
            rules(source),
            vec![
                "disallow-class-attribute-with-static-value",
                "require-lower-case-tags"
            ]
        );
    }
}
