#![forbid(unsafe_code)]

//! Text diagrams of trees.
//!
//! # Example
//! ```
//! use ntree_core::{Node, Tree};
//! use ntree_graph::{GraphConfig, Guides, TreeGraph};
//!
//! let mut tree: Tree<&str, i32> = Tree::new("files");
//! tree.set_root(&Node::new("src").child(Node::new("lib.rs").with_value(3)));
//!
//! let graph = TreeGraph::new(GraphConfig::default().guides(Guides::Ascii).width(3));
//! assert_eq!(graph.render(&tree), "src\n|\n`--lib.rs\n");
//! ```

use std::fmt::{Display, Write};

use ntree_core::{NodeRef, Tree, callback};
use serde::{Deserialize, Serialize};

/// Guide character sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Guides {
    /// `|`, `+--`, `` `-- ``.
    Ascii,
    /// Box-drawing characters (default).
    #[default]
    Unicode,
    Bold,
    /// Double-line characters.
    Double,
    /// Box-drawing with a rounded last corner.
    Rounded,
}

impl Guides {
    /// Vertical continuation.
    #[must_use]
    pub const fn vertical(&self) -> char {
        match self {
            Self::Ascii => '|',
            Self::Unicode | Self::Rounded => '\u{2502}',
            Self::Bold => '\u{2503}',
            Self::Double => '\u{2551}',
        }
    }

    /// Corner for a child with siblings below it.
    #[must_use]
    pub const fn branch(&self) -> char {
        match self {
            Self::Ascii => '+',
            Self::Unicode | Self::Rounded => '\u{251C}',
            Self::Bold => '\u{2523}',
            Self::Double => '\u{2560}',
        }
    }

    /// Corner for the last child.
    #[must_use]
    pub const fn last(&self) -> char {
        match self {
            Self::Ascii => '`',
            Self::Unicode => '\u{2514}',
            Self::Bold => '\u{2517}',
            Self::Double => '\u{255A}',
            Self::Rounded => '\u{2570}',
        }
    }

    #[must_use]
    pub const fn horizontal(&self) -> char {
        match self {
            Self::Ascii => '-',
            Self::Unicode | Self::Rounded => '\u{2500}',
            Self::Bold => '\u{2501}',
            Self::Double => '\u{2550}',
        }
    }
}

/// Diagram layout settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphConfig {
    pub guides: Guides,
    /// Columns per depth level, corner included.
    pub width: usize,
    /// Rows per child, connector rows included.
    pub height: usize,
}

impl GraphConfig {
    pub const DEFAULT_WIDTH: usize = 4;
    pub const DEFAULT_HEIGHT: usize = 2;

    #[must_use]
    pub fn guides(mut self, guides: Guides) -> Self {
        self.guides = guides;
        self
    }

    /// Set the width factor. Values below 1 select the default.
    #[must_use]
    pub fn width(mut self, width: usize) -> Self {
        self.width = if width < 1 { Self::DEFAULT_WIDTH } else { width };
        self
    }

    /// Set the height factor. Values below 1 select the default.
    #[must_use]
    pub fn height(mut self, height: usize) -> Self {
        self.height = if height < 1 { Self::DEFAULT_HEIGHT } else { height };
        self
    }

    fn normalized(self) -> Self {
        self.width(self.width).height(self.height)
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            guides: Guides::default(),
            width: Self::DEFAULT_WIDTH,
            height: Self::DEFAULT_HEIGHT,
        }
    }
}

type LabelFn<'f, K, V> = Box<dyn Fn(NodeRef<'_, K, V>) -> String + 'f>;

/// Renders a tree, or the subtree under one node, as lines of text.
///
/// Each node is printed as its id, or `id: label` when a label function is
/// set. Children follow in the tree's active sibling order. A label function
/// that panics for a node is logged and that node is printed as its bare id.
pub struct TreeGraph<'f, K, V> {
    config: GraphConfig,
    label: Option<LabelFn<'f, K, V>>,
}

impl<'f, K, V> TreeGraph<'f, K, V>
where
    K: Ord + Clone + Display + 'static,
    V: 'static,
{
    #[must_use]
    pub fn new(config: GraphConfig) -> Self {
        Self {
            config: config.normalized(),
            label: None,
        }
    }

    /// Append `: label` to every node.
    #[must_use]
    pub fn with_label(mut self, label: impl Fn(NodeRef<'_, K, V>) -> String + 'f) -> Self {
        self.label = Some(Box::new(label));
        self
    }

    #[must_use]
    pub fn config(&self) -> GraphConfig {
        self.config
    }

    /// Diagram of the whole tree, or `Empty Tree`.
    #[must_use]
    pub fn render(&self, tree: &Tree<K, V>) -> String {
        match tree.root() {
            Some(root) => self.render_node(root),
            None => "Empty Tree".to_owned(),
        }
    }

    /// Diagram of the subtree under `node`.
    #[must_use]
    pub fn render_node(&self, node: NodeRef<'_, K, V>) -> String {
        let mut out = String::new();
        self.write_label(&mut out, node);
        let mut prefix = String::new();
        self.write_children(&mut out, node, &mut prefix);
        out
    }

    fn write_label(&self, out: &mut String, node: NodeRef<'_, K, V>) {
        let text = self
            .label
            .as_ref()
            .and_then(|label| callback::apply("graph label", |n| Some(label(n)), node));
        // Writing into a String cannot fail.
        let _ = match text {
            Some(text) => writeln!(out, "{}: {}", node.id(), text),
            None => writeln!(out, "{}", node.id()),
        };
    }

    fn write_children(&self, out: &mut String, node: NodeRef<'_, K, V>, prefix: &mut String) {
        let guides = self.config.guides;
        let width = self.config.width;
        let children = node.ordered_children();
        let count = children.len();

        for (i, child) in children.into_iter().enumerate() {
            let is_last = i + 1 == count;

            for _ in 1..self.config.height {
                out.push_str(prefix);
                out.push(guides.vertical());
                out.push('\n');
            }

            out.push_str(prefix);
            out.push(if is_last { guides.last() } else { guides.branch() });
            out.extend(std::iter::repeat_n(guides.horizontal(), width - 1));
            self.write_label(out, child);

            let mark = prefix.len();
            if is_last {
                prefix.extend(std::iter::repeat_n(' ', width));
            } else {
                prefix.push(guides.vertical());
                prefix.extend(std::iter::repeat_n(' ', width - 1));
            }
            self.write_children(out, child, prefix);
            prefix.truncate(mark);
        }
    }
}

impl<K, V> Default for TreeGraph<'_, K, V>
where
    K: Ord + Clone + Display + 'static,
    V: 'static,
{
    fn default() -> Self {
        Self::new(GraphConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ntree_core::Node;

    fn tree() -> Tree<&'static str, i32> {
        let mut tree = Tree::new("T");
        tree.set_root(
            &Node::new("A1")
                .child(Node::new("B1").with_value(1).child(Node::new("C1").with_value(3)))
                .child(Node::new("B2").child(Node::new("C2")).child(Node::new("C3").with_value(2))),
        );
        tree
    }

    #[test]
    fn default_layout() {
        let text = TreeGraph::default().render(&tree());
        let expected = "\
A1
│
├───B1
│   │
│   └───C1
│
└───B2
    │
    ├───C2
    │
    └───C3
";
        assert_eq!(text, expected);
    }

    #[test]
    fn factors_and_labels() {
        let graph: TreeGraph<'_, &str, i32> =
            TreeGraph::new(GraphConfig::default().width(3).height(1).guides(Guides::Ascii));
        let graph =
            graph.with_label(|n| n.value().map_or_else(|| "null".to_owned(), |v| v.to_string()));
        let expected = "\
A1: null
+--B1: 1
|  `--C1: 3
`--B2: null
   +--C2: null
   `--C3: 2
";
        assert_eq!(graph.render(&tree()), expected);
    }

    #[test]
    fn factors_below_one_fall_back() {
        let config = GraphConfig::default().width(0).height(0);
        assert_eq!(config, GraphConfig::default());
        let graph: TreeGraph<'_, &str, i32> = TreeGraph::new(GraphConfig {
            guides: Guides::Unicode,
            width: 0,
            height: 0,
        });
        assert_eq!(graph.config(), GraphConfig::default());
    }

    #[test]
    fn empty_tree() {
        let tree: Tree<&str, i32> = Tree::new("T");
        assert_eq!(TreeGraph::default().render(&tree), "Empty Tree");
    }

    #[test]
    fn follows_active_ordering() {
        let mut tree = tree();
        tree.use_custom_ordering(|a, b| b.id().cmp(a.id()));
        let graph = TreeGraph::new(GraphConfig::default().height(1).width(2));
        let expected = "\
A1
├─B2
│ ├─C3
│ └─C2
└─B1
  └─C1
";
        assert_eq!(graph.render(&tree), expected);
    }

    #[test]
    fn panicking_label_prints_bare_id() {
        let graph: TreeGraph<'_, &str, i32> = TreeGraph::new(
            GraphConfig::default().width(3).height(1).guides(Guides::Ascii),
        );
        let graph = graph.with_label(|n| match n.value() {
            Some(3) => panic!("no label for C1"),
            Some(v) => v.to_string(),
            None => "null".to_owned(),
        });
        let expected = "\
A1: null
+--B1: 1
|  `--C1
`--B2: null
   +--C2: null
   `--C3: 2
";
        assert_eq!(graph.render(&tree()), expected);
    }

    #[test]
    fn wide_fan_out_with_panicking_comparator() {
        let mut tree: Tree<u16, i32> = Tree::new(0);
        tree.set_root(&(1..=50).fold(Node::new(0), |root, id| root.child(Node::new(id))));
        tree.use_custom_ordering(|a, b| {
            if *a.id() == 7 || *b.id() == 7 {
                panic!("incomparable");
            }
            a.id().cmp(b.id())
        });
        let graph = TreeGraph::new(GraphConfig::default().height(1).width(2));
        let text = graph.render(&tree);
        assert_eq!(text.lines().count(), 51);
        assert_eq!(text, graph.render(&tree));
    }

    #[test]
    fn subtree_and_guide_sets() {
        let tree = tree();
        let b2 = tree.find_first_with_id(&"B2").unwrap();
        let graph = TreeGraph::new(GraphConfig::default().guides(Guides::Rounded).height(1));
        assert_eq!(graph.render_node(b2), "B2\n├───C2\n╰───C3\n");

        let double = TreeGraph::new(GraphConfig::default().guides(Guides::Double).height(1));
        assert_eq!(double.render_node(b2), "B2\n╠═══C2\n╚═══C3\n");
        let bold = TreeGraph::new(GraphConfig::default().guides(Guides::Bold).height(1).width(1));
        assert_eq!(bold.render_node(b2), "B2\n┣C2\n┗C3\n");
    }

    #[test]
    fn config_serializes() {
        let config = GraphConfig::default().guides(Guides::Double);
        let text = serde_json::to_string(&config).unwrap();
        assert_eq!(text, r#"{"guides":"double","width":4,"height":2}"#);
        let back: GraphConfig = serde_json::from_str(&text).unwrap();
        assert_eq!(back, config);
    }
}
