//! Post-processing of raw model replies into the corpus dialect.
//!
//! Steps, in order: fence extraction, import stripping, component scan,
//! cross-reference rewriting, quality gate, import synthesis.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::debug;

use migratebot_shared::{ConvertedDocument, MigrateError, Result, SlugLookup, SlugTable};

/// Structural components the corpus provides.
pub const COMPONENTS: &[&str] = &[
    "Behavior",
    "Decl",
    "DeclDoc",
    "DescList",
    "Desc",
    "ParamDocList",
    "ParamDoc",
    "DocLink",
    "CHeader",
    "CppHeader",
    "FeatureTestMacro",
    "FeatureTestMacroValue",
    "DR",
    "DRList",
    "Revision",
    "RevisionBlock",
    "AutoCollapse",
    "FlexTable",
    "WG21PaperLink",
];

/// Module every component is imported from.
pub const COMPONENT_MODULE: &str = "@components/index";

/// Raw structural tags tolerated in converted output. One more fails the conversion.
pub const RAW_TAG_THRESHOLD: usize = 4;

/// Anchor used for links whose target has not been migrated yet.
pub const NOT_MIGRATED_ANCHOR: &str = "#not-migrated";

static COMPONENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"<({})[\s/>]", COMPONENTS.join("|"))).expect("valid regex")
});

static RAW_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<(?:div|section|span|table|thead|tbody|tr|td|th)\b").expect("valid regex")
});

static MD_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\]\((/[^)\s]*)\)").expect("valid regex"));

static HREF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\bhref="(/[^"]*)""#).expect("valid regex"));

/// Run the full normalization on a model reply.
pub fn normalize(reply: &str, slugs: &SlugTable) -> Result<ConvertedDocument> {
    let body = extract_fenced(reply);
    let body = strip_imports(&body).trim().to_string();
    let components = used_components(&body);
    let body = rewrite_links(&body, slugs);
    check_quality(&body)?;

    let body = match import_line(&components) {
        Some(import) => format!("{import}\n\n{body}"),
        None => body,
    };
    debug!(components = components.len(), "reply normalized");

    Ok(ConvertedDocument { body, components })
}

/// Payload of a fenced reply, or the trimmed reply when it carries no fence.
///
/// An ` ```mdx ` fence anywhere in the reply wins; otherwise a reply that
/// opens with a fence has its first line and closing fence removed.
pub fn extract_fenced(reply: &str) -> String {
    let reply = reply.trim();

    if let Some(start) = reply.find("```mdx") {
        let after = start + "```mdx".len();
        let end = reply
            .rfind("```")
            .filter(|&end| end >= after)
            .unwrap_or(reply.len());
        return reply[after..end].trim().to_string();
    }

    if reply.starts_with("```") {
        let inner = reply.split_once('\n').map(|(_, rest)| rest).unwrap_or("");
        let end = inner.rfind("```").unwrap_or(inner.len());
        return inner[..end].trim().to_string();
    }

    reply.to_string()
}

/// Drop `import ` lines outside of code fences.
pub fn strip_imports(body: &str) -> String {
    let mut in_fence = false;
    body.lines()
        .filter(|line| {
            if line.trim_start().starts_with("```") {
                in_fence = !in_fence;
                return true;
            }
            in_fence || !line.starts_with("import ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Components referenced in opening-tag form.
pub fn used_components(body: &str) -> BTreeSet<String> {
    COMPONENT_RE
        .captures_iter(body)
        .map(|caps| caps[1].to_string())
        .collect()
}

/// Single import statement for `components`, or `None` when nothing is used.
pub fn import_line(components: &BTreeSet<String>) -> Option<String> {
    if components.is_empty() {
        return None;
    }
    let names = components.iter().map(String::as_str).collect::<Vec<_>>();
    Some(format!(
        "import {{ {} }} from '{COMPONENT_MODULE}';",
        names.join(", ")
    ))
}

/// Number of raw structural tag openers.
pub fn raw_tag_count(body: &str) -> usize {
    RAW_TAG_RE.find_iter(body).count()
}

/// Fail when the output still looks like unconverted markup.
pub fn check_quality(body: &str) -> Result<()> {
    let count = raw_tag_count(body);
    debug!(count, "raw structural tags");
    if count > RAW_TAG_THRESHOLD {
        return Err(MigrateError::ConversionQuality {
            count,
            threshold: RAW_TAG_THRESHOLD,
        });
    }
    Ok(())
}

/// Slug key and fragment of an absolute in-corpus link target.
///
/// `/w/cpp/language/comments.html#Notes` gives `("cpp/language/comments", Some("#Notes"))`.
pub fn link_key(target: &str) -> Option<(String, Option<&str>)> {
    if !target.starts_with('/') || target.starts_with("//") {
        return None;
    }
    let (path, fragment) = match target.find('#') {
        Some(i) => (&target[..i], Some(&target[i..])),
        None => (target, None),
    };
    let path = path.trim_start_matches('/');
    let path = path.strip_prefix("w/").unwrap_or(path);
    let path = path.trim_end_matches('/');
    let path = [".html", ".htm", ".mdx", ".md"]
        .iter()
        .find_map(|ext| path.strip_suffix(ext))
        .unwrap_or(path);
    if path.is_empty() {
        return None;
    }
    Some((path.to_string(), fragment))
}

enum LinkRewrite {
    Mapped(String),
    NotMigrated,
    Keep,
}

fn classify(target: &str, slugs: &SlugTable) -> LinkRewrite {
    let Some((key, fragment)) = link_key(target) else {
        return LinkRewrite::Keep;
    };
    match slugs.resolve(&key) {
        SlugLookup::Mapped(dest) => LinkRewrite::Mapped(format!(
            "/{}/{}",
            dest.trim_matches('/'),
            fragment.unwrap_or("")
        )),
        SlugLookup::Unmapped => LinkRewrite::NotMigrated,
        SlugLookup::Unknown => LinkRewrite::Keep,
    }
}

/// Rewrite absolute cross-reference links through the slug table.
///
/// Mapped targets point at their destination, known-but-unmapped targets become
/// a placeholder anchor carrying the original target, unknown targets are kept.
pub fn rewrite_links(body: &str, slugs: &SlugTable) -> String {
    let body = MD_LINK_RE.replace_all(body, |caps: &Captures| {
        let target = &caps[1];
        match classify(target, slugs) {
            LinkRewrite::Mapped(dest) => format!("]({dest})"),
            LinkRewrite::NotMigrated => format!("]({NOT_MIGRATED_ANCHOR} \"{target}\")"),
            LinkRewrite::Keep => caps[0].to_string(),
        }
    });

    HREF_RE
        .replace_all(&body, |caps: &Captures| {
            let target = &caps[1];
            match classify(target, slugs) {
                LinkRewrite::Mapped(dest) => format!("href=\"{dest}\""),
                LinkRewrite::NotMigrated => {
                    format!("href=\"{NOT_MIGRATED_ANCHOR}\" data-original-href=\"{target}\"")
                }
                LinkRewrite::Keep => caps[0].to_string(),
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use migratebot_shared::SlugMapEntry;

    fn slugs() -> SlugTable {
        SlugTable::from_entries(vec![
            SlugMapEntry {
                source: "cpp/language/comments".into(),
                destination: Some("cpp/language/comments".into()),
            },
            SlugMapEntry {
                source: "cpp/language/main_function".into(),
                destination: None,
            },
        ])
    }

    #[test]
    fn extracts_mdx_fence() {
        let reply = "Here you go:\n```mdx\n# Title\n\nBody\n```\nHope this helps.";
        assert_eq!(extract_fenced(reply), "# Title\n\nBody");
    }

    #[test]
    fn mdx_fence_keeps_nested_code_blocks() {
        let reply = "```mdx\ntext\n```cpp\nint x;\n```\nmore\n```";
        assert_eq!(extract_fenced(reply), "text\n```cpp\nint x;\n```\nmore");
    }

    #[test]
    fn unterminated_mdx_fence_takes_rest() {
        assert_eq!(extract_fenced("```mdx\nbody only"), "body only");
    }

    #[test]
    fn generic_leading_fence_is_stripped() {
        assert_eq!(extract_fenced("```markdown\n# T\n```"), "# T");
        assert_eq!(extract_fenced("  plain reply  "), "plain reply");
    }

    #[test]
    fn strips_imports_outside_code() {
        let body = "import { Decl } from '@components/index';\n# T\n```cpp\nimport std;\n```\nimport x from 'y';";
        assert_eq!(strip_imports(body), "# T\n```cpp\nimport std;\n```");
    }

    #[test]
    fn finds_components_with_and_without_attributes() {
        let body = "<DeclDoc>\n<Decl slot=\"decl\">x</Decl>\n<DescList><Desc kind=\"a\"/></DescList>\n<CppHeader name=\"vector\" />\n<Unknown>";
        let found: Vec<_> = used_components(body).into_iter().collect();
        assert_eq!(found, vec!["CppHeader", "Decl", "DeclDoc", "Desc", "DescList"]);
    }

    #[test]
    fn component_prefix_does_not_match_longer_name() {
        let found = used_components("<DRList>\n</DRList>");
        assert!(found.contains("DRList"));
        assert!(!found.contains("DR"));
    }

    #[test]
    fn import_line_is_sorted_and_minimal() {
        let set: BTreeSet<String> = ["FlexTable", "Behavior"].iter().map(|s| s.to_string()).collect();
        assert_eq!(
            import_line(&set).unwrap(),
            "import { Behavior, FlexTable } from '@components/index';"
        );
        assert!(import_line(&BTreeSet::new()).is_none());
    }

    #[test]
    fn quality_gate_threshold() {
        let four = "<div>a</div><span>b</span><table><tr>c</tr></table>";
        assert_eq!(raw_tag_count(four), 4);
        assert!(check_quality(four).is_ok());

        let five = format!("{four}<td>d</td>");
        let err = check_quality(&five).unwrap_err();
        assert!(matches!(
            err,
            MigrateError::ConversionQuality {
                count: 5,
                threshold: 4
            }
        ));
        assert!(err.is_retryable());
    }

    #[test]
    fn quality_gate_matches_whole_tag_names() {
        assert_eq!(raw_tag_count("<thead><th><track><tdx><divider>"), 2);
        assert_eq!(raw_tag_count("<Desc><DescList>"), 0);
    }

    #[test]
    fn link_key_normalizes_targets() {
        assert_eq!(
            link_key("/w/cpp/language/comments.html#Notes"),
            Some(("cpp/language/comments".into(), Some("#Notes")))
        );
        assert_eq!(link_key("/cpp/language/comments/"), Some(("cpp/language/comments".into(), None)));
        assert_eq!(link_key("https://example.com/x"), None);
        assert_eq!(link_key("//cdn.example.com/x"), None);
        assert_eq!(link_key("/"), None);
    }

    #[test]
    fn rewrites_markdown_links() {
        let body = "See [comments](/w/cpp/language/comments.html#Notes), [main](/w/cpp/language/main_function.html) and [other](/w/cpp/other.html) or [ext](https://x.org/a).";
        let out = rewrite_links(body, &slugs());
        assert!(out.contains("[comments](/cpp/language/comments/#Notes)"));
        assert!(out.contains("[main](#not-migrated \"/w/cpp/language/main_function.html\")"));
        assert!(out.contains("[other](/w/cpp/other.html)"));
        assert!(out.contains("[ext](https://x.org/a)"));
    }

    #[test]
    fn rewrites_href_attributes() {
        let body = r#"<DocLink href="/w/cpp/language/comments.html">c</DocLink><a href="/w/cpp/language/main_function.html">m</a><a href="/unknown">u</a>"#;
        let out = rewrite_links(body, &slugs());
        assert!(out.contains(r#"<DocLink href="/cpp/language/comments/">"#));
        assert!(out.contains(
            r##"<a href="#not-migrated" data-original-href="/w/cpp/language/main_function.html">"##
        ));
        assert!(out.contains(r#"<a href="/unknown">"#));
    }

    #[test]
    fn normalize_assembles_document() {
        let reply = "```mdx\nimport { Foo } from 'bar';\n\n<DocLink href=\"/w/cpp/language/comments.html\">x</DocLink>\n\n<Behavior kind=\"ub\">y</Behavior>\n```";
        let doc = normalize(reply, &slugs()).unwrap();
        assert!(doc.body.starts_with("import { Behavior, DocLink } from '@components/index';\n\n"));
        assert!(!doc.body.contains("import { Foo }"));
        assert!(doc.body.contains("href=\"/cpp/language/comments/\""));
        assert_eq!(doc.components.len(), 2);
    }

    #[test]
    fn normalize_without_components_has_no_import() {
        let doc = normalize("# Plain\n\ntext", &slugs()).unwrap();
        assert_eq!(doc.body, "# Plain\n\ntext");
        assert!(doc.components.is_empty());
    }
}
