//! DOM-to-plain-text linearization used for before/after comparison.
//!
//! Rules:
//! - invisible elements (`display:none`, `visibility:hidden`, `opacity:0`, `hidden`)
//!   are skipped with their whole subtree
//! - block elements open and close a line, never producing two boundaries in a row
//! - `<br>` emits one newline, `<hr>` emits `\n---\n`
//! - `<pre>` content is emitted verbatim
//! - text runs collapse internal whitespace and merge edge spaces with their neighbours

use std::sync::LazyLock;

use regex::Regex;

use crate::dom::{DomNode, DomTree, ElementData, NodeId};

/// Tags that always start and end a line.
const BLOCK_TAGS: &[&str] = &[
    "div", "p", "h1", "h2", "h3", "h4", "h5", "h6", "ul", "ol", "li", "table", "tr", "td", "th",
    "section", "article", "header", "footer", "nav", "aside", "main", "figure", "figcaption",
    "blockquote", "pre", "form", "fieldset", "legend", "dl", "dt", "dd", "hr", "br",
];

/// Tags the user agent never displays.
const UA_HIDDEN_TAGS: &[&str] = &["head", "script", "style", "template", "title", "meta", "link"];

fn is_visible(el: &ElementData) -> bool {
    if el.hidden || UA_HIDDEN_TAGS.contains(&el.tag.as_str()) {
        return false;
    }
    el.style.display.as_deref() != Some("none")
        && el.style.visibility.as_deref() != Some("hidden")
        && el.style.opacity != Some(0.0)
}

fn is_block(el: &ElementData) -> bool {
    if BLOCK_TAGS.contains(&el.tag.as_str()) {
        return true;
    }
    match el.style.display.as_deref() {
        Some(display) => {
            matches!(display, "block" | "flex" | "grid") || display.starts_with("table")
        }
        None => false,
    }
}

/// Accumulates output and remembers the last emitted character.
#[derive(Default)]
struct TextSink {
    out: String,
    last: Option<char>,
}

impl TextSink {
    fn push(&mut self, s: &str) {
        if let Some(c) = s.chars().last() {
            self.out.push_str(s);
            self.last = Some(c);
        }
    }

    /// Line boundary unless we are at the start or already on a fresh line.
    fn boundary(&mut self) {
        if !self.out.is_empty() && self.last != Some('\n') {
            self.push("\n");
        }
    }

    fn at_separator(&self) -> bool {
        matches!(self.last, Some(' ' | '\n'))
    }

    fn text_run(&mut self, raw: &str) {
        static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

        if raw.trim().is_empty() {
            return;
        }
        let collapsed = WS_RE.replace_all(raw, " ");
        let mut text: &str = &collapsed;

        if let Some(rest) = text.strip_prefix(' ') {
            if !self.out.is_empty() && !self.at_separator() {
                self.push(" ");
            }
            text = rest;
        }

        let trailing_space = text.ends_with(' ');
        let body = text.strip_suffix(' ').unwrap_or(text);
        self.push(body);
        if trailing_space && !self.at_separator() {
            self.push(" ");
        }
    }
}

enum Step {
    Visit(NodeId),
    /// Close a block opened earlier.
    Close,
}

/// Linearize the whole tree.
pub fn linearize(tree: &DomTree) -> String {
    linearize_node(tree, tree.root())
}

/// Linearize the subtree rooted at `start`.
pub fn linearize_node(tree: &DomTree, start: NodeId) -> String {
    let mut sink = TextSink::default();
    let mut stack = vec![Step::Visit(start)];

    while let Some(step) = stack.pop() {
        let id = match step {
            Step::Close => {
                sink.boundary();
                continue;
            }
            Step::Visit(id) => id,
        };

        let el = match tree.node(id) {
            DomNode::Text(text) => {
                sink.text_run(text);
                continue;
            }
            DomNode::Element(el) => el,
        };

        if !is_visible(el) {
            continue;
        }

        match el.tag.as_str() {
            "br" => sink.push("\n"),
            "hr" => sink.push("\n---\n"),
            "pre" => {
                sink.boundary();
                sink.push(&tree.text_content(id));
                sink.boundary();
            }
            _ if is_block(el) => {
                sink.boundary();
                stack.push(Step::Close);
                stack.extend(el.children.iter().rev().map(|&c| Step::Visit(c)));
            }
            _ => stack.extend(el.children.iter().rev().map(|&c| Step::Visit(c))),
        }
    }

    finish(&sink.out)
}

/// Collapse horizontal whitespace, cap blank lines at one, trim.
fn finish(raw: &str) -> String {
    static SPACES_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[ \t]+").expect("valid regex"));
    static NEWLINES_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

    let text = SPACES_RE.replace_all(raw, " ");
    let text = NEWLINES_RE.replace_all(&text, "\n\n");
    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_of(html: &str) -> String {
        linearize(&DomTree::parse_fragment(html))
    }

    #[test]
    fn hidden_subtrees_are_skipped() {
        let out = text_of(
            r#"<p>shown</p>
            <div style="display:none">gone <b>child</b></div>
            <span style="visibility: hidden">ghost<i>nested</i></span>
            <p style="opacity:0">faded</p>
            <p hidden>attr</p>
            <p>end</p>"#,
        );
        assert_eq!(out, "shown\nend");
        for hidden in ["gone", "child", "ghost", "nested", "faded", "attr"] {
            assert!(!out.contains(hidden), "{hidden} leaked into {out:?}");
        }
    }

    #[test]
    fn scripts_and_styles_are_invisible() {
        let out = text_of("<p>a</p><script>var x = 1;</script><style>p{}</style><p>b</p>");
        assert_eq!(out, "a\nb");
    }

    #[test]
    fn br_emits_exactly_one_newline() {
        assert_eq!(text_of("one<br>two"), "one\ntwo");
        assert_eq!(text_of("<span>one</span><br><span>two</span>"), "one\ntwo");
    }

    #[test]
    fn hr_emits_rule_sequence() {
        assert_eq!(text_of("above<hr>below"), "above\n---\nbelow");
    }

    #[test]
    fn blocks_never_double_boundaries() {
        assert_eq!(
            text_of("<div><div><p>a</p></div></div><div><p>b</p></div>"),
            "a\nb"
        );
    }

    #[test]
    fn styled_display_makes_block() {
        assert_eq!(
            text_of(r#"<span>a</span><span style="display:flex">b</span><span>c</span>"#),
            "a\nb\nc"
        );
        assert_eq!(
            text_of(r#"<span>a</span><span style="display: table-cell">b</span>"#),
            "a\nb"
        );
        assert_eq!(text_of("<span>a</span><span>b</span>"), "ab");
    }

    #[test]
    fn pre_is_verbatim() {
        let out = text_of("<p>code:</p><pre>int main()\n{\n}</pre><p>after</p>");
        assert_eq!(out, "code:\nint main()\n{\n}\nafter");
    }

    #[test]
    fn text_whitespace_collapses_and_merges() {
        assert_eq!(text_of("<p>  hello \n\t world  </p>"), "hello world");
        assert_eq!(text_of("a <b> bold </b> c"), "a bold c");
        assert_eq!(text_of("<p>x</p>   <p> y</p>"), "x\ny");
    }

    #[test]
    fn excess_newlines_collapse_to_two() {
        assert_eq!(text_of("a<br><br><br><br>b"), "a\n\nb");
    }

    #[test]
    fn lists_and_tables_break_lines() {
        let out = text_of(
            "<ul><li>first</li><li>second</li></ul><table><tr><td>k</td><td>v</td></tr></table>",
        );
        assert_eq!(out, "first\nsecond\nk\nv");
    }

    #[test]
    fn empty_input_gives_empty_text() {
        assert_eq!(text_of(""), "");
        assert_eq!(text_of("<div>   </div>"), "");
    }
}
