// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Offset pagination over the tracker's list endpoints.

use std::future::Future;

use jmd_core::Result;

/// Items requested per page.
pub const PAGE_SIZE: usize = 50;

/// Fetches pages starting at offset 0 until a page comes back shorter than
/// [`PAGE_SIZE`], concatenating the items in order.
///
/// `fetch_page` receives the offset of the first item it should return.
/// Any page error aborts the walk; no partial list is returned.
pub async fn collect_pages<T, F, Fut>(mut fetch_page: F) -> Result<Vec<T>>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<Vec<T>>>,
{
    let mut items = Vec::new();
    let mut start_at = 0;
    loop {
        let page = fetch_page(start_at).await?;
        let count = page.len();
        items.extend(page);
        if count < PAGE_SIZE {
            return Ok(items);
        }
        start_at += count;
    }
}

#[cfg(test)]
#[path = "pagination_tests.rs"]
mod tests;
