//! # Page-Aware Layout
//!
//! Nothing here lays content out on an endless canvas and slices it
//! afterwards. Every unit asks the open page for space before it is drawn:
//!
//! 1. Open a page with known dimensions and a cursor below the header band
//! 2. Before placing a unit, ask: "does this fit above the footer?"
//! 3. If it fits: draw it, move the cursor down
//! 4. If it doesn't and it is unbreakable (a table row, a photo cell):
//!    finish the page, start a new one, repeat the section header, draw it
//! 5. If it doesn't and it is a paragraph: draw the lines that fit, carry
//!    the rest, and keep at least two lines on each side of the break
//!
//! [`page::PageBuilder`] holds the page state, [`paginator::Paginator`]
//! drives the report order, and the remaining modules lay out single units.

pub mod grid;
pub mod page;
pub mod page_break;
pub mod paginator;
pub mod photo;
pub mod table;

pub use page::{PageBuilder, PageCursor, PageState, SpaceCheck};
pub use paginator::{PaginationSummary, Paginator};
pub use photo::{ComposedPage, PhotoGridComposer, SlotFill, SlotRender};
pub use table::TableRenderer;
