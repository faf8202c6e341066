//! Converter: source markup → corpus document via a generative model.
//!
//! This crate provides:
//! - [`Converter`]: prompt assembly and the convert-then-normalize step
//! - [`OpenRouterClient`]: the production [`ModelClient`]
//! - [`normalize`]: fence extraction, imports, cross-references, quality gate

pub mod normalize;
pub mod openrouter;

use std::path::Path;

use tracing::{info, instrument};
use url::Url;

use migratebot_shared::{
    AppConfig, ConvertedDocument, ExtractedContent, MigrateError, ModelClient, Result, SlugTable,
};

pub use openrouter::OpenRouterClient;

/// Placeholder in the instruction template replaced by component documentation.
pub const DOCS_PLACEHOLDER: &str = "{{LLM_DOCS}}";

const DEFAULT_PROMPT: &str = "\
You convert C++ reference pages from HTML into MDX for the CppDoc documentation site.

Rules:
- Reply with the converted document only, inside a single ```mdx fenced block.
- Do not emit front matter or import statements; both are added automatically.
- Use Markdown for prose, headings, lists and code. Use the components below for
  declarations, parameter lists, behaviour notes, revision markers and tables.
- Do not leave raw <div>, <span> or <table> markup in the output.
- Keep every link target exactly as it appears in the source.

Available components:

{{LLM_DOCS}}
";

const DEFAULT_COMPONENT_DOCS: &str = "\
- <Decl> / <DeclDoc>: a declaration and its documentation block.
- <ParamDocList> / <ParamDoc name=\"...\">: parameter descriptions.
- <DescList> / <Desc>: definition-style lists.
- <Behavior kind=\"...\">: behaviour notes (undefined, unspecified, ...).
- <Revision since=\"...\" until=\"...\"> / <RevisionBlock>: standard-revision markers.
- <CHeader name=\"...\"> / <CppHeader name=\"...\">: header references.
- <FeatureTestMacro> / <FeatureTestMacroValue>: feature-test macro tables.
- <DR> / <DRList>: defect reports.
- <DocLink href=\"...\">: cross-reference to another page.
- <AutoCollapse>, <FlexTable>, <WG21PaperLink paper=\"...\">.
";

/// Turns extracted pages into normalized corpus documents.
#[derive(Debug, Clone)]
pub struct Converter {
    instructions: String,
    source_name: String,
}

impl Converter {
    /// Converter with a ready-made instruction text.
    pub fn new(instructions: impl Into<String>, source_name: impl Into<String>) -> Self {
        Self {
            instructions: instructions.into(),
            source_name: source_name.into(),
        }
    }

    /// Build the instruction text from configured files, relative to the corpus root.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let root = &config.corpus.root;
        let template = match &config.openrouter.prompt_path {
            Some(path) => read_text(&root.join(path))?,
            None => DEFAULT_PROMPT.to_string(),
        };
        let docs = match &config.openrouter.component_docs_path {
            Some(path) => read_text(&root.join(path))?,
            None => DEFAULT_COMPONENT_DOCS.to_string(),
        };
        Ok(Self::new(
            assemble_prompt(&template, &docs),
            config.source.name.clone(),
        ))
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    /// User message carrying the page to convert.
    pub fn user_message(&self, content: &ExtractedContent, url: &Url) -> String {
        format!(
            "// Convert the following HTML content from {source} into MDX.\n\
             // Title: {title}\n\
             // URL: {url}\n\
             // HTML Content:\n{html}\n",
            source = self.source_name,
            title = content.title,
            html = content.html,
        )
    }

    /// One conversion attempt: model call followed by normalization.
    #[instrument(skip_all, fields(url = %url, model = model.model()))]
    pub async fn convert(
        &self,
        model: &dyn ModelClient,
        content: &ExtractedContent,
        url: &Url,
        slugs: &SlugTable,
    ) -> Result<ConvertedDocument> {
        let reply = model
            .complete(&self.instructions, &self.user_message(content, url))
            .await?;
        let doc = normalize::normalize(&reply, slugs)?;
        info!(
            body_len = doc.body.len(),
            components = doc.components.len(),
            "page converted"
        );
        Ok(doc)
    }
}

/// Splice component documentation into an instruction template.
pub fn assemble_prompt(template: &str, component_docs: &str) -> String {
    template.replace(DOCS_PLACEHOLDER, component_docs)
}

fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| MigrateError::io(path, e))
}
