use std::num::NonZeroUsize;

use serde::Serialize;

use crate::domain::order::LineItem;

pub const DEFAULT_ROWS_PER_PAGE: usize = 18;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PageRow {
    pub serial: usize,
    pub item: LineItem,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Page {
    /// 1-based position of this page within the order.
    pub index: usize,
    pub total_pages: usize,
    pub rows: Vec<PageRow>,
}

impl Page {
    pub fn is_last(&self) -> bool {
        self.index == self.total_pages
    }
}

/// Splits an order into consecutive pages of at most `page_size` rows.
///
/// Serial numbers run 1..=N across the whole order, not per page. An empty
/// order yields no pages.
pub fn paginate(items: &[LineItem], page_size: NonZeroUsize) -> Vec<Page> {
    let total_pages = items.len().div_ceil(page_size.get());

    items
        .chunks(page_size.get())
        .enumerate()
        .map(|(chunk_index, chunk)| {
            let first_serial = chunk_index * page_size.get() + 1;
            Page {
                index: chunk_index + 1,
                total_pages,
                rows: chunk
                    .iter()
                    .enumerate()
                    .map(|(offset, item)| PageRow {
                        serial: first_serial + offset,
                        item: item.clone(),
                    })
                    .collect(),
            }
        })
        .collect()
}
