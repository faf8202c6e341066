//! Writer: persists converted documents with their front matter.

use std::path::{Path, PathBuf};

use tracing::{info, instrument};
use url::Url;

use migratebot_shared::{ConvertedDocument, MigrateError, Result};

/// Location of the document for `destination` under the corpus docs root.
pub fn output_path(docs_root: &Path, destination: &str) -> PathBuf {
    docs_root.join(format!("{}.mdx", destination.trim_matches('/')))
}

/// Front matter block, including the trailing blank line.
pub fn front_matter(title: &str, source_name: &str, source_url: &Url) -> String {
    // A JSON string is a valid YAML scalar and escapes every awkward character.
    let quoted = serde_json::Value::String(title.to_string()).to_string();
    format!(
        "---\ntitle: {quoted}\ndescription: Auto-generated from {source_name}\nsource: {source_url}\n---\n\n"
    )
}

/// Write `doc` to `path`, creating parent directories.
#[instrument(skip(doc, source_url), fields(path = %path.display()))]
pub fn write_document(
    path: &Path,
    doc: &ConvertedDocument,
    title: &str,
    source_name: &str,
    source_url: &Url,
) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| MigrateError::io(parent, e))?;
    }

    let mut content = front_matter(title, source_name, source_url);
    content.push_str(&doc.body);
    if !content.ends_with('\n') {
        content.push('\n');
    }

    std::fs::write(path, content).map_err(|e| MigrateError::io(path, e))?;
    info!(bytes = doc.body.len(), "document written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    fn url() -> Url {
        Url::parse("https://en.cppreference.com/w/cpp/comments.html").unwrap()
    }

    #[test]
    fn output_path_appends_extension() {
        let root = Path::new("/repo/src/content/docs");
        assert_eq!(
            output_path(root, "cpp/language/comments"),
            PathBuf::from("/repo/src/content/docs/cpp/language/comments.mdx")
        );
        assert_eq!(
            output_path(root, "/cpp/comments/"),
            PathBuf::from("/repo/src/content/docs/cpp/comments.mdx")
        );
    }

    #[test]
    fn front_matter_quotes_title() {
        let fm = front_matter("operator\"\" suffix: <T>", "cppreference", &url());
        assert_eq!(
            fm,
            "---\ntitle: \"operator\\\"\\\" suffix: <T>\"\ndescription: Auto-generated from cppreference\nsource: https://en.cppreference.com/w/cpp/comments.html\n---\n\n"
        );
    }

    #[test]
    fn writes_document_creating_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = output_path(dir.path(), "cpp/language/comments");
        let doc = ConvertedDocument {
            body: "import { Decl } from '@components/index';\n\n# Comments".into(),
            components: BTreeSet::from(["Decl".to_string()]),
        };

        write_document(&path, &doc, "Comments", "cppreference", &url()).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("---\ntitle: \"Comments\"\n"));
        assert!(written.contains("---\n\nimport { Decl } from '@components/index';\n\n# Comments\n"));
    }
}
