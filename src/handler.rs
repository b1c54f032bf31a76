//! Per-message handler: apply the patch, render once, push to the sink.

use tracing::{debug, trace};

use crate::document::LiveDocument;
use crate::error::Result;
use crate::patch::PatchStats;
use crate::render::Renderer;
use crate::sink::DisplaySink;

/// Owns the live document and its two collaborators.
///
/// `on_message` runs to completion before the next message is read, so the
/// document needs no locking.
pub struct PatchHandler {
    document: LiveDocument,
    renderer: Box<dyn Renderer>,
    sink: Box<dyn DisplaySink>,
    renders: u64,
}

impl PatchHandler {
    pub fn new(renderer: Box<dyn Renderer>, sink: Box<dyn DisplaySink>) -> Self {
        Self {
            document: LiveDocument::new(),
            renderer,
            sink,
            renders: 0,
        }
    }

    /// Apply one inbound patch and render exactly once.
    ///
    /// Render and sink errors are returned to the caller. The patch has
    /// already been applied by then.
    pub fn on_message(&mut self, payload: &str) -> Result<PatchStats> {
        trace!(bytes = payload.len(), "patch received");
        let stats = self.document.apply(payload);
        debug!(
            inserted = stats.inserted,
            removed = stats.removed,
            missing = stats.missing,
            skipped = stats.skipped,
            "patch applied"
        );
        self.render()?;
        Ok(stats)
    }

    fn render(&mut self) -> Result<()> {
        let markup = self.renderer.render(self.document.text())?;
        self.sink.show(&markup)?;
        self.renders += 1;
        Ok(())
    }

    pub fn document(&self) -> &LiveDocument {
        &self.document
    }

    pub fn render_count(&self) -> u64 {
        self.renders
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LiveError;
    use crate::render::{MarkdownRenderer, PreformattedRenderer};
    use crate::sink::MemorySink;

    struct Identity;

    impl Renderer for Identity {
        fn render(&self, text: &str) -> Result<String> {
            Ok(text.to_string())
        }
    }

    struct Broken;

    impl Renderer for Broken {
        fn render(&self, _text: &str) -> Result<String> {
            Err(LiveError::Render("renderer unavailable".into()))
        }
    }

    fn identity_handler() -> (PatchHandler, MemorySink) {
        let sink = MemorySink::new();
        let handler = PatchHandler::new(Box::new(Identity), Box::new(sink.clone()));
        (handler, sink)
    }

    #[test]
    fn test_end_to_end_scenario() {
        let (mut handler, sink) = identity_handler();
        handler.on_message("+Hello").unwrap();
        handler.on_message("+World").unwrap();
        handler.on_message("-Hello").unwrap();
        assert_eq!(
            sink.frames(),
            vec!["Hello\n", "Hello\nWorld\n", "World\n"]
        );
        assert_eq!(handler.document().text(), "World\n");
    }

    #[test]
    fn test_renders_once_per_patch_regardless_of_records() {
        let (mut handler, sink) = identity_handler();
        handler.on_message("+a\n+b\n+c\n-b\n?").unwrap();
        assert_eq!(sink.render_count(), 1);
        assert_eq!(handler.render_count(), 1);
    }

    #[test]
    fn test_empty_patch_still_renders() {
        let (mut handler, sink) = identity_handler();
        handler.on_message("").unwrap();
        assert_eq!(sink.render_count(), 1);
        assert_eq!(sink.last().as_deref(), Some(""));
    }

    #[test]
    fn test_missing_removal_still_renders_once() {
        let (mut handler, sink) = identity_handler();
        handler.on_message("+X").unwrap();
        let stats = handler.on_message("+A\n-B").unwrap();
        assert_eq!(stats.missing, 1);
        assert_eq!(sink.render_count(), 2);
        assert_eq!(sink.last().as_deref(), Some("X\nA\n"));
    }

    #[test]
    fn test_markdown_frame_is_rendered_markup() {
        let sink = MemorySink::new();
        let mut handler =
            PatchHandler::new(Box::new(MarkdownRenderer::default()), Box::new(sink.clone()));
        handler.on_message("+# Title").unwrap();
        assert_eq!(sink.last().as_deref(), Some("<h1>Title</h1>\n"));
    }

    #[test]
    fn test_preformatted_frame() {
        let sink = MemorySink::new();
        let mut handler = PatchHandler::new(Box::new(PreformattedRenderer), Box::new(sink.clone()));
        handler.on_message("+a<b").unwrap();
        assert_eq!(sink.last().as_deref(), Some("<pre>a&lt;b\n</pre>\n"));
    }

    #[test]
    fn test_render_failure_propagates_after_apply() {
        let sink = MemorySink::new();
        let mut handler = PatchHandler::new(Box::new(Broken), Box::new(sink.clone()));
        let err = handler.on_message("+kept").unwrap_err();
        assert!(matches!(err, LiveError::Render(_)));
        assert_eq!(handler.document().text(), "kept\n");
        assert_eq!(sink.render_count(), 0);
        assert_eq!(handler.render_count(), 0);
    }
}
