//! Object trees: event arguments
//!
//! An [`Element`] is a row with children grouped by container name. The
//! [`ObjectBuilder`] fills the tree; children take their type from the
//! parent's container declaration.

use std::ops::{Deref, DerefMut};

use appstruct_core::{QName, RecordId, ValidationErrors, NULL_QNAME};

use crate::row::{Row, RowBuilder, RowCtx};

/// Row with nested children
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Element {
    pub(crate) row: Row,
    pub(crate) children: Vec<Element>,
}

impl Element {
    /// Empty element with null name.
    pub fn null() -> Self {
        Self::default()
    }

    pub(crate) fn new(row: Row) -> Self {
        Self {
            row,
            children: Vec::new(),
        }
    }

    /// The element row.
    pub fn row(&self) -> &Row {
        &self.row
    }

    /// All children in insertion order.
    pub fn children(&self) -> &[Element] {
        &self.children
    }

    /// Children of one container.
    pub fn elements<'a>(&'a self, container: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.row.container == container)
    }

    /// Distinct container names of the children, in first-use order.
    pub fn containers(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for c in &self.children {
            if !names.contains(&c.row.container.as_str()) {
                names.push(&c.row.container);
            }
        }
        names
    }

    /// Visits this element and all descendants depth first.
    pub fn for_each<'a>(&'a self, f: &mut impl FnMut(&'a Element)) {
        f(self);
        for c in &self.children {
            c.for_each(f);
        }
    }

    pub(crate) fn for_each_mut(&mut self, f: &mut impl FnMut(&mut Element)) {
        f(self);
        for c in &mut self.children {
            c.for_each_mut(f);
        }
    }

    pub(crate) fn mask_values(&mut self) {
        self.for_each_mut(&mut |e| e.row.mask_values());
    }
}

impl Deref for Element {
    type Target = Row;

    fn deref(&self) -> &Row {
        &self.row
    }
}

/// Builder of an element tree
pub struct ObjectBuilder {
    row: RowBuilder,
    children: Vec<ObjectBuilder>,
}

impl ObjectBuilder {
    pub(crate) fn new(ctx: RowCtx, qname: QName) -> Self {
        Self {
            row: RowBuilder::new(ctx, qname),
            children: Vec::new(),
        }
    }

    /// Adds a child to `container` and returns its builder.
    ///
    /// The child type comes from the container declaration; an unknown
    /// container leaves the child unnamed and fails validation later.
    pub fn child(&mut self, container: &str) -> &mut ObjectBuilder {
        let ctx = self.row.ctx().clone();
        let qname = ctx
            .app_def
            .type_def(self.row.qname())
            .and_then(|t| t.container_def(container))
            .map(|c| c.qname.clone())
            .unwrap_or(NULL_QNAME);

        let mut row = Row::new(qname);
        row.container = container.to_string();
        let parent = self.row.row().id();
        if !parent.is_null() && !row.qname.is_null() {
            row.parent = parent;
        }

        let idx = self.children.len();
        self.children.push(ObjectBuilder {
            row: RowBuilder::from_row(ctx, row),
            children: Vec::new(),
        });
        &mut self.children[idx]
    }

    /// `sys.ID` put so far.
    pub fn id(&self) -> RecordId {
        self.row.row().id()
    }

    pub(crate) fn finish(self) -> (Element, ValidationErrors) {
        let (row, mut errors) = self.row.finish();
        let mut el = Element::new(row);
        for c in self.children {
            let (child, errs) = c.finish();
            errors.extend(errs);
            el.children.push(child);
        }
        (el, errors)
    }
}

impl Deref for ObjectBuilder {
    type Target = RowBuilder;

    fn deref(&self) -> &RowBuilder {
        &self.row
    }
}

impl DerefMut for ObjectBuilder {
    fn deref_mut(&mut self) -> &mut RowBuilder {
        &mut self.row
    }
}
