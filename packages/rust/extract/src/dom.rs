//! Owned, parser-independent markup tree.
//!
//! Nodes live in a flat arena and reference their children by index, so both
//! construction and traversal run on explicit stacks regardless of nesting depth.

use scraper::{ElementRef, Html, Node};

/// Index of a node inside a [`DomTree`].
pub type NodeId = usize;

/// Visibility-relevant declarations from an element's inline `style`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InlineStyle {
    pub display: Option<String>,
    pub visibility: Option<String>,
    pub opacity: Option<f32>,
}

impl InlineStyle {
    /// Parse a `style` attribute. Unknown declarations are ignored.
    pub fn parse(style: &str) -> Self {
        let mut parsed = Self::default();
        for decl in style.split(';') {
            let Some((name, value)) = decl.split_once(':') else {
                continue;
            };
            let value = value
                .trim()
                .trim_end_matches("!important")
                .trim()
                .to_ascii_lowercase();
            match name.trim().to_ascii_lowercase().as_str() {
                "display" => parsed.display = Some(value),
                "visibility" => parsed.visibility = Some(value),
                "opacity" => parsed.opacity = value.parse().ok(),
                _ => {}
            }
        }
        parsed
    }
}

/// Element payload.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementData {
    /// Lowercase tag name.
    pub tag: String,
    pub style: InlineStyle,
    /// The `hidden` attribute is present.
    pub hidden: bool,
    pub children: Vec<NodeId>,
}

/// A node is either an element or a run of text.
#[derive(Debug, Clone, PartialEq)]
pub enum DomNode {
    Element(ElementData),
    Text(String),
}

/// Arena-backed tree rooted at node `0`.
#[derive(Debug, Clone)]
pub struct DomTree {
    nodes: Vec<DomNode>,
}

impl DomTree {
    /// Copy the subtree under `root` out of a parsed document.
    pub fn from_element(root: ElementRef<'_>) -> Self {
        let mut nodes: Vec<DomNode> = Vec::new();
        let mut stack = vec![(*root, None::<NodeId>)];

        while let Some((node, parent)) = stack.pop() {
            let id = nodes.len();
            let is_element = match node.value() {
                Node::Element(el) => {
                    nodes.push(DomNode::Element(ElementData {
                        tag: el.name().to_ascii_lowercase(),
                        style: el.attr("style").map(InlineStyle::parse).unwrap_or_default(),
                        hidden: el.attr("hidden").is_some(),
                        children: Vec::new(),
                    }));
                    true
                }
                Node::Text(text) => {
                    let text: &str = text;
                    nodes.push(DomNode::Text(text.to_string()));
                    false
                }
                // Comments, doctypes and processing instructions carry no text.
                _ => continue,
            };

            if let Some(DomNode::Element(data)) = parent.map(|p| &mut nodes[p]) {
                data.children.push(id);
            }

            if is_element {
                // Reversed so the first child is popped first.
                for child in node.children().rev() {
                    stack.push((child, Some(id)));
                }
            }
        }

        Self { nodes }
    }

    /// Parse an HTML fragment. The root is the parser's synthetic `<html>` element.
    pub fn parse_fragment(html: &str) -> Self {
        let doc = Html::parse_fragment(html);
        Self::from_element(doc.root_element())
    }

    pub fn root(&self) -> NodeId {
        0
    }

    pub fn node(&self, id: NodeId) -> &DomNode {
        &self.nodes[id]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Concatenated text of every descendant, in document order.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            match &self.nodes[current] {
                DomNode::Text(text) => out.push_str(text),
                DomNode::Element(data) => stack.extend(data.children.iter().rev()),
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(tree: &DomTree, id: NodeId) -> &ElementData {
        match tree.node(id) {
            DomNode::Element(data) => data,
            DomNode::Text(t) => panic!("expected element, got text {t:?}"),
        }
    }

    #[test]
    fn parses_inline_style() {
        let style = InlineStyle::parse("color: red; DISPLAY:None ; opacity: 0.0;visibility: hidden !important");
        assert_eq!(style.display.as_deref(), Some("none"));
        assert_eq!(style.visibility.as_deref(), Some("hidden"));
        assert_eq!(style.opacity, Some(0.0));

        let style = InlineStyle::parse("garbage;;opacity:abc");
        assert_eq!(style, InlineStyle::default());
    }

    #[test]
    fn preserves_document_order() {
        let tree = DomTree::parse_fragment("<p>one<b>two</b>three</p><p>four</p>");
        assert_eq!(tree.text_content(tree.root()), "onetwothreefour");
    }

    #[test]
    fn records_tags_and_attributes() {
        let tree = DomTree::parse_fragment(r#"<div hidden style="display:flex"><span>x</span></div>"#);
        let root = element(&tree, tree.root());
        let div_id = root.children[0];
        let div = element(&tree, div_id);
        assert_eq!(div.tag, "div");
        assert!(div.hidden);
        assert_eq!(div.style.display.as_deref(), Some("flex"));
        assert_eq!(element(&tree, div.children[0]).tag, "span");
    }

    #[test]
    fn skips_comments() {
        let tree = DomTree::parse_fragment("<p>a<!-- note -->b</p>");
        assert_eq!(tree.text_content(tree.root()), "ab");
    }

    #[test]
    fn handles_deep_nesting_without_recursion() {
        let depth = 2_000;
        let html = format!("{}deep{}", "<span>".repeat(depth), "</span>".repeat(depth));
        let tree = DomTree::parse_fragment(&html);
        assert!(tree.len() > depth);
        assert_eq!(tree.text_content(tree.root()), "deep");
    }
}
