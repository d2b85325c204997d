//! File-level compilation: `include` and `extends` resolution.

use std::{
    fs,
    path::{Path, PathBuf},
};

use tracing::debug;

use crate::{
    PugError, Result,
    ast::{BlockMode, Node},
    parser::parse,
    render::render,
};

/// Compiles template files to HTML.
///
/// Relative `include`/`extends` paths resolve against the including file;
/// `/`-rooted paths resolve against `basedir`.
#[derive(Debug, Clone)]
pub struct Compiler {
    basedir: PathBuf,
}

impl Compiler {
    /// Create a compiler rooted at `basedir`, in `html` doctype mode.
    #[must_use]
    pub fn new(basedir: impl Into<PathBuf>) -> Self {
        Self {
            basedir: basedir.into(),
        }
    }

    /// Compile a template file.
    pub fn compile_file(&self, path: &Path) -> Result<String> {
        let source = read(path)?;
        self.compile_str(&source, path)
    }

    /// Compile template source that lives at `path`.
    pub fn compile_str(&self, source: &str, path: &Path) -> Result<String> {
        let mut stack = vec![identity(path)];
        let nodes = parse(source).map_err(|e| PugError::from_parse(path, e))?;
        let nodes = self.link(nodes, path, &mut stack)?;

        render(&nodes, true).map_err(|e| PugError::from_parse(path, e))
    }

    /// Read, parse and link a dependency, guarding against cycles.
    fn load(&self, path: &Path, stack: &mut Vec<PathBuf>) -> Result<Vec<Node>> {
        let id = identity(path);
        if stack.contains(&id) {
            let chain = stack
                .iter()
                .chain(std::iter::once(&id))
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(" -> ");
            return Err(PugError::IncludeCycle(chain));
        }

        debug!(path = %path.display(), "loading template dependency");
        let source = read(path)?;
        let nodes = parse(&source).map_err(|e| PugError::from_parse(path, e))?;

        stack.push(id);
        let linked = self.link(nodes, path, stack);
        stack.pop();
        linked
    }

    fn link(&self, nodes: Vec<Node>, file: &Path, stack: &mut Vec<PathBuf>) -> Result<Vec<Node>> {
        let extends = nodes.iter().find_map(|node| match node {
            Node::Extends { path, line } => Some((path.clone(), *line)),
            _ => None,
        });

        let nodes = self.link_includes(nodes, file, stack)?;

        let Some((target, line)) = extends else {
            return Ok(nodes);
        };

        let parent_path = self.resolve(file, &target, line)?;
        let mut tree = self.load(&parent_path, stack)?;

        let mut mixins = Vec::new();
        for node in nodes {
            match node {
                Node::Block {
                    name,
                    mode,
                    children,
                    line,
                } => {
                    if !apply_block(&mut tree, &name, mode, children) {
                        return Err(PugError::Syntax {
                            path: file.to_path_buf(),
                            line,
                            message: format!(
                                "block `{name}` does not exist in {}",
                                parent_path.display()
                            ),
                        });
                    }
                }
                def @ Node::MixinDef { .. } => mixins.push(def),
                Node::Element(el) => return Err(top_level_error(file, el.line)),
                Node::Text(text) => return Err(top_level_error(file, text.line)),
                _ => {}
            }
        }

        mixins.extend(tree);
        Ok(mixins)
    }

    fn link_includes(
        &self,
        nodes: Vec<Node>,
        file: &Path,
        stack: &mut Vec<PathBuf>,
    ) -> Result<Vec<Node>> {
        let mut linked = Vec::with_capacity(nodes.len());

        for node in nodes {
            match node {
                Node::Include { path, line } => {
                    let target = self.resolve(file, &path, line)?;
                    if target.extension().is_some_and(|ext| ext == "pug") {
                        linked.extend(self.load(&target, stack)?);
                    } else {
                        linked.push(Node::Text(crate::ast::Text {
                            value: read(&target)?,
                            line,
                        }));
                    }
                }
                Node::Element(mut el) => {
                    el.children = self.link_includes(el.children, file, stack)?;
                    linked.push(Node::Element(el));
                }
                Node::Block {
                    name,
                    mode,
                    children,
                    line,
                } => linked.push(Node::Block {
                    name,
                    mode,
                    children: self.link_includes(children, file, stack)?,
                    line,
                }),
                Node::MixinDef {
                    name,
                    children,
                    line,
                } => linked.push(Node::MixinDef {
                    name,
                    children: self.link_includes(children, file, stack)?,
                    line,
                }),
                Node::MixinCall {
                    name,
                    children,
                    line,
                } => linked.push(Node::MixinCall {
                    name,
                    children: self.link_includes(children, file, stack)?,
                    line,
                }),
                other => linked.push(other),
            }
        }

        Ok(linked)
    }

    fn resolve(&self, from: &Path, target: &str, line: usize) -> Result<PathBuf> {
        let resolved = match target.strip_prefix('/') {
            Some(rooted) => self.basedir.join(rooted),
            None => from.parent().unwrap_or(Path::new(".")).join(target),
        };
        let resolved = if resolved.extension().is_none() {
            resolved.with_extension("pug")
        } else {
            resolved
        };

        if !resolved.is_file() {
            return Err(PugError::IncludeNotFound {
                path: from.to_path_buf(),
                line,
                target: resolved,
            });
        }
        Ok(resolved)
    }
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| PugError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn identity(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

fn top_level_error(file: &Path, line: usize) -> PugError {
    PugError::Syntax {
        path: file.to_path_buf(),
        line,
        message: "only named blocks and mixins can appear at the top level of an extending template"
            .to_string(),
    }
}

/// Merge an overriding block into the first block of the same name.
fn apply_block(tree: &mut [Node], name: &str, mode: BlockMode, content: Vec<Node>) -> bool {
    let mut content = Some(content);
    apply_block_inner(tree, name, mode, &mut content)
}

fn apply_block_inner(
    tree: &mut [Node],
    name: &str,
    mode: BlockMode,
    content: &mut Option<Vec<Node>>,
) -> bool {
    for node in tree.iter_mut() {
        match node {
            Node::Block {
                name: block_name,
                children,
                ..
            } if block_name == name => {
                let Some(new) = content.take() else {
                    return false;
                };
                match mode {
                    BlockMode::Replace => *children = new,
                    BlockMode::Append => children.extend(new),
                    BlockMode::Prepend => {
                        let existing = std::mem::replace(children, new);
                        children.extend(existing);
                    }
                }
                return true;
            }
            Node::Element(el) => {
                if apply_block_inner(&mut el.children, name, mode, content) {
                    return true;
                }
            }
            Node::Block { children, .. }
            | Node::MixinDef { children, .. }
            | Node::MixinCall { children, .. } => {
                if apply_block_inner(children, name, mode, content) {
                    return true;
                }
            }
            _ => {}
        }
    }
    false
}
