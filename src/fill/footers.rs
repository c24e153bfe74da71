//! Group footer placement policy.
//!
//! Footers are processed innermost group first. Each placed footer is
//! combined with the range carried over from the inner groups according to
//! its [`FooterPosition`]:
//!
//! | position          | effect                                                        |
//! |-------------------|---------------------------------------------------------------|
//! | `StackAtBottom`   | merged with the carry; the stack moves to the bottom later    |
//! | `ForceAtBottom`   | merged with the carry and moved to the bottom right away      |
//! | `CollateAtBottom` | merged with the carry; dropped if the next footer lands elsewhere |
//! | `Normal`          | stays put; a stack in the same column keeps growing over it   |

use crate::model::FooterPosition;
use crate::print::Page;

use super::range::{expand_or_move, move_content, GroupFooterRange};

/// Result of placing one group footer.
#[derive(Debug, Clone, PartialEq)]
pub struct FooterPlacement {
    /// Range still waiting to be moved to the bottom of its column.
    pub carry: Option<GroupFooterRange>,
    /// Content was forced down to the column footer; the cursor follows it.
    pub at_bottom: bool,
}

pub fn place_group_footer(
    carried: Option<GroupFooterRange>,
    placed: GroupFooterRange,
    position: FooterPosition,
    pages: &mut [Page],
    column_footer_offset_y: f64,
) -> FooterPlacement {
    match position {
        FooterPosition::StackAtBottom => {
            let mut merged = expand_or_move(carried, placed, pages, column_footer_offset_y);
            merged.position = FooterPosition::StackAtBottom;
            FooterPlacement {
                carry: Some(merged),
                at_bottom: false,
            }
        }
        FooterPosition::ForceAtBottom => {
            let merged = expand_or_move(carried, placed, pages, column_footer_offset_y);
            move_content(pages, &merged.range, column_footer_offset_y);
            FooterPlacement {
                carry: None,
                at_bottom: true,
            }
        }
        FooterPosition::CollateAtBottom => FooterPlacement {
            carry: Some(expand_or_move(carried, placed, pages, column_footer_offset_y)),
            at_bottom: false,
        },
        FooterPosition::Normal => {
            let carry = match carried {
                Some(mut carried) if carried.range.same_location(&placed.range) => {
                    if carried.position == FooterPosition::StackAtBottom {
                        carried.range.expand(placed.range.bottom_y());
                        Some(carried)
                    } else {
                        // A normal footer right below ends the collation.
                        None
                    }
                }
                Some(carried) => {
                    move_content(pages, &carried.range, column_footer_offset_y);
                    None
                }
                None => None,
            };
            FooterPlacement {
                carry,
                at_bottom: false,
            }
        }
    }
}

/// Move whatever is still carried once every footer is placed.
/// Returns whether anything was moved, in which case the cursor belongs at
/// the column footer.
pub fn flush_group_footers(
    carried: Option<GroupFooterRange>,
    pages: &mut [Page],
    column_footer_offset_y: f64,
) -> bool {
    match carried {
        Some(carried) => {
            move_content(pages, &carried.range, column_footer_offset_y);
            true
        }
        None => false,
    }
}
