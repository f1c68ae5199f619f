//! Graphviz rendering of the per-method route trees.
//!
//! Each supported method becomes one `digraph` whose root is labelled with
//! the method name. Parameter nodes are drawn green and labelled with their
//! placeholder and recognizer pattern; nodes where a declared path ends use a
//! red font. Render the files with e.g. `dot -Tpng GET.dot -o GET.png`.

use http::Method;
use std::fmt::Write as _;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::router::{RouteNode, Specification};
use crate::spec::SUPPORTED_METHODS;

/// Quote a string as a DOT identifier
fn quote(label: &str) -> String {
    let mut out = String::with_capacity(label.len() + 2);
    out.push('"');
    for c in label.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn node_attributes(node: &RouteNode) -> String {
    let mut attrs = Vec::new();
    match node.recognizer() {
        Some(recognizer) => {
            attrs.push(format!(
                "label={}",
                quote(&format!("{}\n{}", node.segment(), recognizer.as_str()))
            ));
            attrs.push("color=green".to_string());
        }
        None => attrs.push(format!("label={}", quote(node.segment()))),
    }
    if node.can_be_leaf() {
        attrs.push("fontcolor=red".to_string());
    }
    attrs.join(", ")
}

/// DOT document for one method's tree; empty graph when the method has no routes
#[must_use]
pub fn render_dot(spec: &Specification, method: &Method) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "digraph {} {{", quote(method.as_str()));

    let mut root_attrs = format!("label={}, shape=box", quote(method.as_str()));
    if let Some(tree) = spec.tree(method) {
        if tree.root().can_be_leaf() {
            root_attrs.push_str(", fontcolor=red");
        }
    }
    let _ = writeln!(out, "  n0 [{root_attrs}];");

    if let Some(tree) = spec.tree(method) {
        let mut next_id = 1usize;
        // Depth-first with explicit stack, children visited in stable order
        let mut stack: Vec<(usize, &RouteNode)> = vec![(0, tree.root())];
        while let Some((id, node)) = stack.pop() {
            let children = node.children();
            let mut ids = Vec::with_capacity(children.len());
            for child in &children {
                let child_id = next_id;
                next_id += 1;
                let _ = writeln!(out, "  n{child_id} [{}];", node_attributes(child));
                let _ = writeln!(out, "  n{id} -> n{child_id};");
                ids.push(child_id);
            }
            for (child_id, child) in ids.into_iter().zip(children).rev() {
                stack.push((child_id, child));
            }
        }
    }

    out.push_str("}\n");
    out
}

/// Write `<METHOD>.dot` for every supported method into `dir`, creating it if
/// needed. Returns the written paths.
pub fn write_dot_files(spec: &Specification, dir: impl AsRef<Path>) -> io::Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)?;

    let mut written = Vec::with_capacity(SUPPORTED_METHODS.len());
    for method in &SUPPORTED_METHODS {
        let path = dir.join(format!("{}.dot", method.as_str()));
        std::fs::write(&path, render_dot(spec, method))?;
        debug!(path = %path.display(), method = %method, "Wrote route graph");
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::load_spec_str;

    const SPEC: &str = r#"
openapi: 3.1.0
info: { title: Graph, version: "1" }
paths:
  /users:
    get:
      responses: { "200": { description: OK } }
  /users/{id}:
    get:
      parameters:
        - { name: id, in: path, required: true, schema: { type: integer } }
      responses: { "200": { description: OK } }
  /admin:
    get:
      responses: { "200": { description: OK } }
"#;

    #[test]
    fn test_render_dot() {
        let spec = load_spec_str(SPEC).unwrap();
        let dot = render_dot(&spec, &Method::GET);
        assert_eq!(
            dot,
            concat!(
                "digraph \"GET\" {\n",
                "  n0 [label=\"GET\", shape=box];\n",
                "  n1 [label=\"admin\", fontcolor=red];\n",
                "  n0 -> n1;\n",
                "  n2 [label=\"users\", fontcolor=red];\n",
                "  n0 -> n2;\n",
                "  n3 [label=\"{id}\\n^(?:[0-9]+)$\", color=green, fontcolor=red];\n",
                "  n2 -> n3;\n",
                "}\n",
            )
        );
    }

    #[test]
    fn test_render_is_deterministic() {
        let spec = load_spec_str(SPEC).unwrap();
        assert_eq!(render_dot(&spec, &Method::GET), render_dot(&spec, &Method::GET));
    }

    #[test]
    fn test_empty_method_graph() {
        let spec = load_spec_str(SPEC).unwrap();
        let dot = render_dot(&spec, &Method::DELETE);
        assert_eq!(dot, "digraph \"DELETE\" {\n  n0 [label=\"DELETE\", shape=box];\n}\n");
    }

    #[test]
    fn test_write_dot_files() {
        let spec = load_spec_str(SPEC).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("graph");
        let written = write_dot_files(&spec, &out).unwrap();
        assert_eq!(written.len(), SUPPORTED_METHODS.len());
        assert!(out.join("GET.dot").exists());
        assert!(out.join("HEAD.dot").exists());
    }
}
