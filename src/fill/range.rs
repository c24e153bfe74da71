//! Element ranges: the vertical extent of content already placed in one
//! column of one page, so it can be moved or pulled back later.
//!
//! A range selects the elements of its page that flowed in its column and
//! start within `[top_y, bottom_y)`.

use crate::model::FooterPosition;
use crate::print::{Page, PrintElement};

#[derive(Debug, Clone, PartialEq)]
pub struct ElementRange {
    page: usize,
    column: usize,
    is_new_page: bool,
    is_new_column: bool,
    top_y: f64,
    bottom_y: f64,
}

impl ElementRange {
    /// An empty range starting at `top_y`.
    pub fn new(page: usize, column: usize, is_new_page: bool, is_new_column: bool, top_y: f64) -> Self {
        Self {
            page,
            column,
            is_new_page,
            is_new_column,
            top_y,
            bottom_y: top_y,
        }
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn column(&self) -> usize {
        self.column
    }

    /// The range started at the top of a fresh page.
    pub fn is_new_page(&self) -> bool {
        self.is_new_page
    }

    /// The range started at the top of a fresh column.
    pub fn is_new_column(&self) -> bool {
        self.is_new_column
    }

    pub fn top_y(&self) -> f64 {
        self.top_y
    }

    pub fn bottom_y(&self) -> f64 {
        self.bottom_y
    }

    pub fn height(&self) -> f64 {
        self.bottom_y - self.top_y
    }

    /// Grow the range down to `y`. Never shrinks.
    pub fn expand(&mut self, y: f64) {
        if y > self.bottom_y {
            self.bottom_y = y;
        }
    }

    pub fn same_location(&self, other: &ElementRange) -> bool {
        self.page == other.page && self.column == other.column
    }

    fn contains(&self, element: &PrintElement) -> bool {
        element.column == Some(self.column) && element.y >= self.top_y && element.y < self.bottom_y
    }
}

/// Merge `next` into `current` when both are in the same column of the same
/// page; otherwise `next` replaces it.
pub fn expand_range(current: Option<ElementRange>, next: ElementRange) -> ElementRange {
    match current {
        Some(mut range) if range.same_location(&next) => {
            range.expand(next.bottom_y);
            range
        }
        _ => next,
    }
}

/// Take the range's content off its page.
pub fn remove_content(pages: &mut [Page], range: &ElementRange) -> Vec<PrintElement> {
    let Some(page) = pages.get_mut(range.page) else {
        return Vec::new();
    };
    let (taken, kept): (Vec<_>, Vec<_>) = page
        .elements
        .drain(..)
        .partition(|element| range.contains(element));
    page.elements = kept;
    taken
}

/// Put elements on `page`, shifted by `(dx, dy)` and reassigned to `column`.
pub fn add_content(page: &mut Page, elements: Vec<PrintElement>, column: usize, dx: f64, dy: f64) {
    page.elements.extend(elements.into_iter().map(|mut element| {
        element.x += dx;
        element.y += dy;
        element.column = Some(column);
        element
    }));
}

/// Shift the range's content down so it ends at `column_footer_offset_y`.
/// Content never moves up.
pub fn move_content(pages: &mut [Page], range: &ElementRange, column_footer_offset_y: f64) {
    let delta = column_footer_offset_y - range.bottom_y;
    if delta <= 0.0 {
        return;
    }
    if let Some(page) = pages.get_mut(range.page) {
        for element in page.elements.iter_mut().filter(|e| range.contains(e)) {
            element.y += delta;
        }
    }
}

/// Group footer content whose final position is still pending.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupFooterRange {
    pub range: ElementRange,
    pub position: FooterPosition,
}

impl GroupFooterRange {
    pub fn new(range: ElementRange, position: FooterPosition) -> Self {
        Self { range, position }
    }
}

/// Combine a carried footer range with a newly placed one.
///
/// In the same column the carried range grows to cover the new content.
/// Elsewhere the carried content is pushed to the bottom of its own column,
/// unless it was collating, in which case it stays where it is.
pub fn expand_or_move(
    carried: Option<GroupFooterRange>,
    next: GroupFooterRange,
    pages: &mut [Page],
    column_footer_offset_y: f64,
) -> GroupFooterRange {
    let Some(mut carried) = carried else {
        return next;
    };
    if carried.range.same_location(&next.range) {
        carried.range.expand(next.range.bottom_y);
        return carried;
    }
    if carried.position == FooterPosition::CollateAtBottom {
        log::debug!(
            "collated footer on page {} split from the next one, left in place",
            carried.range.page
        );
    } else {
        move_content(pages, &carried.range, column_footer_offset_y);
    }
    next
}

/// The content of a keep-together group, from its header on.
#[derive(Debug, Clone, PartialEq)]
pub struct KeepTogetherRange {
    pub range: ElementRange,
    /// Index of the outermost group that asked to be kept together.
    pub group_index: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::print::{BandKind, PrintContent};

    fn element(id: u64, column: usize, y: f64, height: f64) -> PrintElement {
        PrintElement {
            id,
            x: 10.0,
            y,
            width: 50.0,
            height,
            band: BandKind::Detail,
            column: Some(column),
            content: PrintContent::Frame,
        }
    }

    fn page_with(elements: Vec<PrintElement>) -> Page {
        let mut page = Page::new(200.0, 300.0, 1);
        page.elements = elements;
        page
    }

    fn range(page: usize, column: usize, top: f64, bottom: f64) -> ElementRange {
        let mut r = ElementRange::new(page, column, false, false, top);
        r.expand(bottom);
        r
    }

    #[test]
    fn expand_never_shrinks() {
        let mut r = range(0, 0, 10.0, 50.0);
        r.expand(30.0);
        assert_eq!(r.bottom_y(), 50.0);
        assert_eq!(r.height(), 40.0);
    }

    #[test]
    fn remove_takes_only_this_column_and_extent() {
        let mut pages = vec![page_with(vec![
            element(1, 0, 10.0, 10.0),
            element(2, 0, 60.0, 10.0),
            element(3, 1, 20.0, 10.0),
        ])];
        let taken = remove_content(&mut pages, &range(0, 0, 0.0, 50.0));
        assert_eq!(taken.iter().map(|e| e.id).collect::<Vec<_>>(), vec![1]);
        assert_eq!(pages[0].elements.len(), 2);
    }

    #[test]
    fn move_aligns_bottom_with_footer_offset() {
        let mut pages = vec![page_with(vec![element(1, 0, 40.0, 10.0), element(2, 0, 100.0, 10.0)])];
        move_content(&mut pages, &range(0, 0, 40.0, 50.0), 250.0);
        assert_eq!(pages[0].find(1).unwrap().y, 240.0);
        assert_eq!(pages[0].find(2).unwrap().y, 100.0);
    }

    #[test]
    fn move_never_goes_up() {
        let mut pages = vec![page_with(vec![element(1, 0, 240.0, 10.0)])];
        move_content(&mut pages, &range(0, 0, 240.0, 250.0), 200.0);
        assert_eq!(pages[0].find(1).unwrap().y, 240.0);
    }

    #[test]
    fn same_column_ranges_merge() {
        let mut pages = vec![page_with(vec![])];
        let a = GroupFooterRange::new(range(0, 0, 10.0, 20.0), FooterPosition::StackAtBottom);
        let b = GroupFooterRange::new(range(0, 0, 20.0, 35.0), FooterPosition::StackAtBottom);
        let merged = expand_or_move(Some(a), b, &mut pages, 250.0);
        assert_eq!(merged.range.top_y(), 10.0);
        assert_eq!(merged.range.bottom_y(), 35.0);
    }

    #[test]
    fn carried_range_in_other_column_moves_down() {
        let mut pages = vec![page_with(vec![element(1, 0, 10.0, 10.0)])];
        let a = GroupFooterRange::new(range(0, 0, 10.0, 20.0), FooterPosition::StackAtBottom);
        let b = GroupFooterRange::new(range(0, 1, 0.0, 10.0), FooterPosition::StackAtBottom);
        let result = expand_or_move(Some(a), b.clone(), &mut pages, 250.0);
        assert_eq!(result, b);
        assert_eq!(pages[0].find(1).unwrap().y, 240.0);
    }

    #[test]
    fn collated_range_split_from_next_stays_put() {
        let mut pages = vec![page_with(vec![element(1, 0, 10.0, 10.0)]), page_with(vec![])];
        let a = GroupFooterRange::new(range(0, 0, 10.0, 20.0), FooterPosition::CollateAtBottom);
        let b = GroupFooterRange::new(range(1, 0, 0.0, 10.0), FooterPosition::CollateAtBottom);
        expand_or_move(Some(a), b, &mut pages, 250.0);
        assert_eq!(pages[0].find(1).unwrap().y, 10.0);
    }

    #[test]
    fn add_shifts_into_new_column() {
        let mut page = page_with(vec![]);
        add_content(&mut page, vec![element(7, 0, 100.0, 10.0)], 1, 90.0, -80.0);
        let moved = page.find(7).unwrap();
        assert_eq!((moved.x, moved.y, moved.column), (100.0, 20.0, Some(1)));
    }

    #[test]
    fn expand_range_replaces_across_columns() {
        let merged = expand_range(Some(range(0, 0, 0.0, 10.0)), range(0, 0, 10.0, 30.0));
        assert_eq!((merged.top_y(), merged.bottom_y()), (0.0, 30.0));
        let replaced = expand_range(Some(range(0, 0, 0.0, 10.0)), range(0, 1, 5.0, 30.0));
        assert_eq!(replaced.column(), 1);
    }
}
