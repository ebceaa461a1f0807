//! Pairs page placeholders with cells and attaches cell outputs.

use std::sync::Arc;

use super::{Document, ElementId};
use crate::notebook::{Cell, CellId, Notebook};
use crate::status::StatusBus;

/// A source placeholder found on the page and its output placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    pub cell_id: CellId,
    /// Element holding the code.
    pub source: ElementId,
    /// Output element, if the page provided one.
    pub output: Option<ElementId>,
    /// Code text of the source element.
    pub code: String,
    /// Whether the page flagged the cell as a widget cell (`data-widget`).
    pub widget: bool,
}

/// Discovers placeholders and binds cells to them.
pub struct DomBinder {
    document: Arc<dyn Document>,
    output_class: String,
}

impl DomBinder {
    /// `output_class` is used for output elements synthesized at attach time.
    pub fn new(document: Arc<dyn Document>, output_class: impl Into<String>) -> Self {
        Self {
            document,
            output_class: output_class.into(),
        }
    }

    /// Pair the Nth source element with the Nth output element.
    ///
    /// Sources beyond the number of outputs get `output: None`. The cell id is
    /// taken from `data-cell-id`, then the element `id`, and generated otherwise.
    pub fn discover(&self, source_selector: &str, output_selector: &str) -> Vec<Placeholder> {
        let sources = self.document.query_selector_all(source_selector);
        let mut outputs = self.document.query_selector_all(output_selector).into_iter();

        sources
            .into_iter()
            .map(|source| {
                let cell_id = self
                    .document
                    .attribute(source, "data-cell-id")
                    .or_else(|| self.document.attribute(source, "id"))
                    .map(CellId::from)
                    .unwrap_or_else(CellId::generate);
                Placeholder {
                    cell_id,
                    source,
                    output: outputs.next(),
                    code: self.document.text_content(source),
                    widget: self.document.attribute(source, "data-widget").is_some(),
                }
            })
            .collect()
    }

    /// Build a notebook whose cells come straight from the placeholders.
    pub fn build_notebook(&self, id: &str, placeholders: &[Placeholder], bus: StatusBus) -> Notebook {
        let cells = placeholders
            .iter()
            .map(|p| Cell::new(Some(p.cell_id.clone()), p.code.clone()).with_widget(p.widget))
            .collect();
        Notebook::new(id, cells, bus)
    }

    /// Match placeholders against a loaded notebook: by id first, then each
    /// unmatched placeholder takes the next unclaimed cell in notebook order.
    ///
    /// A cell is handed to at most one placeholder.
    pub fn match_cells(
        &self,
        placeholders: &[Placeholder],
        notebook: &Notebook,
    ) -> Vec<(Placeholder, Option<Arc<Cell>>)> {
        let cells = notebook.cells();
        let mut claimed = vec![false; cells.len()];

        let by_id: Vec<Option<usize>> = placeholders
            .iter()
            .map(|p| {
                let index = cells.iter().position(|c| c.id() == &p.cell_id)?;
                if claimed[index] {
                    return None;
                }
                claimed[index] = true;
                Some(index)
            })
            .collect();

        let mut next = 0;
        placeholders
            .iter()
            .zip(by_id)
            .map(|(p, index)| {
                let index = index.or_else(|| {
                    while next < cells.len() && claimed[next] {
                        next += 1;
                    }
                    let free = (next < cells.len()).then_some(next)?;
                    claimed[free] = true;
                    Some(free)
                });
                (p.clone(), index.map(|i| cells[i].clone()))
            })
            .collect()
    }

    /// Attach `cell`'s output to the placeholder, synthesizing an output
    /// element after the source when the page has none.
    ///
    /// Idempotent: a cell that is already attached keeps its element and no
    /// new element is created.
    pub fn attach(&self, cell: &Cell, placeholder: &Placeholder) -> ElementId {
        if let Some(existing) = cell.element() {
            return existing;
        }

        let target = match placeholder.output {
            Some(el) => el,
            None => {
                tracing::debug!(cell = %cell.id(), "synthesizing output element");
                self.document
                    .insert_after(placeholder.source, "div", &self.output_class)
            }
        };
        cell.attach_to_dom(target);
        cell.element().unwrap_or(target)
    }

    /// Attach every matched cell, then any widget cell still detached to the
    /// element carrying its id. Returns the number of cells attached.
    pub fn attach_notebook(&self, notebook: &Notebook, placeholders: &[Placeholder]) -> usize {
        let mut attached = 0;

        for (placeholder, cell) in self.match_cells(placeholders, notebook) {
            let Some(cell) = cell else {
                tracing::warn!(cell = %placeholder.cell_id, "placeholder has no matching cell");
                continue;
            };
            if cell.element().is_none() {
                self.attach(&cell, &placeholder);
                attached += 1;
            }
        }

        for widget in notebook.widgets() {
            if widget.element().is_some() {
                continue;
            }
            match self.document.element_by_id(widget.id().as_str()) {
                Some(el) => {
                    widget.attach_to_dom(el);
                    attached += 1;
                }
                None => tracing::debug!(cell = %widget.id(), "widget cell has no element"),
            }
        }

        attached
    }
}
