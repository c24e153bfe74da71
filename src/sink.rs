//! Where filled pages go.
//!
//! A master report collects its pages; a subreport forwards them to the
//! sink of its parent, flagging the last one so the parent can stretch it
//! to the bottom.

use crate::error::QuireError;
use crate::print::Page;

pub trait PageSink {
    /// Append a fully resolved page. `is_last` is set on the final page of the fill.
    fn add_page(&mut self, page: Page, is_last: bool) -> Result<(), QuireError>;
}

impl PageSink for Vec<Page> {
    fn add_page(&mut self, page: Page, _is_last: bool) -> Result<(), QuireError> {
        self.push(page);
        Ok(())
    }
}

/// Forwards a subreport's pages to the parent's sink.
pub struct ParentSink<'a> {
    parent: &'a mut dyn PageSink,
    forwarded: usize,
    last_forwarded: bool,
}

impl<'a> ParentSink<'a> {
    pub fn new(parent: &'a mut dyn PageSink) -> Self {
        Self {
            parent,
            forwarded: 0,
            last_forwarded: false,
        }
    }

    /// Number of pages handed to the parent so far.
    pub fn forwarded(&self) -> usize {
        self.forwarded
    }

    /// Whether the final subreport page reached the parent.
    pub fn is_complete(&self) -> bool {
        self.last_forwarded
    }
}

impl PageSink for ParentSink<'_> {
    fn add_page(&mut self, page: Page, is_last: bool) -> Result<(), QuireError> {
        log::debug!(
            "forwarding subreport page {} to parent{}",
            self.forwarded + 1,
            if is_last { " (last)" } else { "" }
        );
        self.parent.add_page(page, is_last)?;
        self.forwarded += 1;
        self.last_forwarded = is_last;
        Ok(())
    }
}
