//! Seam to the external renderer that turns a document into the plot
//! artifact stored next to a job record.

use std::path::Path;

use plotty_core::{PlotError, PlotResult};

/// Anything that can write its rendered form to a file.
pub trait DocumentRenderer {
    fn render(&self, dest: &Path) -> PlotResult<()>;
}

/// A document whose SVG text has already been produced upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SvgDocument(pub String);

impl SvgDocument {
    pub fn new(svg: impl Into<String>) -> Self {
        Self(svg.into())
    }
}

impl DocumentRenderer for SvgDocument {
    fn render(&self, dest: &Path) -> PlotResult<()> {
        std::fs::write(dest, self.0.as_bytes()).map_err(|e| PlotError::from_io(e, Some(dest)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn svg_document_writes_text_verbatim() {
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("src.svg");
        let doc = SvgDocument::new("<svg xmlns=\"http://www.w3.org/2000/svg\"/>");

        doc.render(&dest).unwrap();

        assert_eq!(std::fs::read_to_string(&dest).unwrap(), doc.0);
    }
}
