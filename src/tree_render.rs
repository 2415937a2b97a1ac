//! ASCII tree rendering for composition hierarchies.

use futures::future::{BoxFuture, FutureExt};

use crate::error::ObjectResult;
use crate::objects::DomainObjectRef;

const CONTAINER: char = '▸';
const LEAF: char = '•';
const CYCLE: char = '↺';

/// One object in a rendered composition tree.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    pub id: String,
    pub name: String,
    pub container: bool,
    /// The object already appears among its own ancestors.
    pub cycle: bool,
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    pub fn leaf(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            container: false,
            cycle: false,
            children: Vec::new(),
        }
    }

    pub fn container(id: &str, name: &str, children: Vec<TreeNode>) -> Self {
        Self {
            container: true,
            children,
            ..Self::leaf(id, name)
        }
    }
}

fn symbol(node: &TreeNode) -> char {
    if node.cycle {
        CYCLE
    } else if node.container {
        CONTAINER
    } else {
        LEAF
    }
}

/// Walk `root`'s composition into a [`TreeNode`] tree.
///
/// Stops descending at `max_depth` levels below the root, and at any object
/// that is already one of its own ancestors.
pub async fn collect_tree(
    root: DomainObjectRef,
    max_depth: Option<usize>,
) -> ObjectResult<TreeNode> {
    collect(root, max_depth, Vec::new()).await
}

fn collect(
    object: DomainObjectRef,
    remaining: Option<usize>,
    mut ancestors: Vec<String>,
) -> BoxFuture<'static, ObjectResult<TreeNode>> {
    async move {
        let model = object.model();
        let name = model.name().unwrap_or(object.id()).to_string();
        let mut node = TreeNode::leaf(object.id(), &name);
        node.container = model.has_composition();

        if ancestors.iter().any(|id| id == object.id()) {
            node.cycle = true;
            return Ok(node);
        }
        if remaining == Some(0) {
            return Ok(node);
        }
        let Some(composition) = object.composition() else {
            return Ok(node);
        };

        ancestors.push(object.id().to_string());
        for child in composition.invoke().await? {
            let child = collect(child, remaining.map(|n| n - 1), ancestors.clone()).await?;
            node.children.push(child);
        }
        Ok(node)
    }
    .boxed()
}

/// Render a composition tree as ASCII art with type markers.
///
/// Example output:
/// ```text
/// Mission
/// ├── ▸ Telemetry
/// │   ├── • Battery Voltage
/// │   └── ↺ Mission
/// └── • Notes
/// ```
pub fn render_tree(nodes: &[TreeNode]) -> String {
    let mut output = String::new();
    for (i, node) in nodes.iter().enumerate() {
        let is_last = i == nodes.len() - 1;
        render_node(&mut output, node, "", is_last, true);
    }
    output
}

fn render_node(output: &mut String, node: &TreeNode, prefix: &str, is_last: bool, is_root: bool) {
    if is_root {
        output.push_str(&node.name);
        output.push('\n');
    } else {
        let branch = if is_last { "└── " } else { "├── " };
        output.push_str(prefix);
        output.push_str(branch);
        output.push(symbol(node));
        output.push(' ');
        output.push_str(&node.name);
        output.push('\n');
    }

    let child_prefix = if is_root {
        String::new()
    } else {
        let continuation = if is_last { "    " } else { "│   " };
        format!("{}{}", prefix, continuation)
    };

    for (i, child) in node.children.iter().enumerate() {
        let child_is_last = i == node.children.len() - 1;
        render_node(output, child, &child_prefix, child_is_last, false);
    }
}
