//! Markup rendering for the live buffer.
//!
//! The patch handler only sees the [`Renderer`] trait. The binary picks an
//! implementation from [`RenderFormat`].

use clap::ValueEnum;
use pulldown_cmark::{html, Options, Parser};
use serde::Deserialize;

use crate::error::Result;

/// Pure function from buffer text to displayable markup.
pub trait Renderer: Send {
    fn render(&self, text: &str) -> Result<String>;
}

/// Output format selectable from config or the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RenderFormat {
    /// CommonMark with GitHub-style extensions, rendered to HTML.
    #[default]
    Markdown,
    /// Buffer text escaped into a `<pre>` block.
    Raw,
}

impl std::fmt::Display for RenderFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RenderFormat::Markdown => write!(f, "markdown"),
            RenderFormat::Raw => write!(f, "raw"),
        }
    }
}

impl RenderFormat {
    pub fn renderer(self) -> Box<dyn Renderer> {
        match self {
            RenderFormat::Markdown => Box::new(MarkdownRenderer::default()),
            RenderFormat::Raw => Box::new(PreformattedRenderer),
        }
    }
}

// ---------------------------------------------------------------------------
// Markdown
// ---------------------------------------------------------------------------

/// CommonMark to HTML via pulldown-cmark.
#[derive(Debug, Clone, Copy)]
pub struct MarkdownRenderer {
    options: Options,
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self {
            options: Options::ENABLE_TABLES
                | Options::ENABLE_STRIKETHROUGH
                | Options::ENABLE_TASKLISTS
                | Options::ENABLE_FOOTNOTES,
        }
    }
}

impl MarkdownRenderer {
    pub fn with_options(options: Options) -> Self {
        Self { options }
    }
}

impl Renderer for MarkdownRenderer {
    fn render(&self, text: &str) -> Result<String> {
        let parser = Parser::new_ext(text, self.options);
        let mut out = String::with_capacity(text.len() * 3 / 2);
        html::push_html(&mut out, parser);
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Raw
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
pub struct PreformattedRenderer;

impl Renderer for PreformattedRenderer {
    fn render(&self, text: &str) -> Result<String> {
        Ok(format!("<pre>{}</pre>\n", escape_html(text)))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Escape the five HTML-significant characters.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Wrap rendered markup in a standalone HTML document.
pub fn html_page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"UTF-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{}</title>\n</head>\n<body>\n<main id=\"content\">\n{}</main>\n</body>\n</html>\n",
        escape_html(title),
        body
    )
}
