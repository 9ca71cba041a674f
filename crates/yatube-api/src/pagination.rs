//! Slicing of already-ordered result sets into fixed-size pages.
//!
//! Page requests are lenient: anything that is not a page number within
//! range (missing, non-numeric, zero, past the end) yields the first page.
//! Feeds resolve a [`PageWindow`] from a row count and fetch only that
//! window from the store; [`paginate`] does the same over an in-memory list.

use serde::Deserialize;

use yatube_types::api::PageMeta;

/// `?page=` as sent by the client, unparsed.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: usize,
    pub total_pages: usize,
    /// Items across all pages.
    pub count: usize,
}

/// The slice of a `count`-long sequence that one page covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub number: usize,
    pub total_pages: usize,
    pub count: usize,
    pub offset: usize,
    pub limit: usize,
}

impl PageWindow {
    /// Resolves `requested` against `count` items split into `page_size` pages.
    pub fn resolve(count: usize, page_size: usize, requested: Option<&str>) -> Self {
        let page_size = page_size.max(1);
        let total_pages = count.div_ceil(page_size);

        let number = requested
            .and_then(|raw| raw.trim().parse::<usize>().ok())
            .filter(|n| (1..=total_pages).contains(n))
            .unwrap_or(1);

        Self {
            number,
            total_pages,
            count,
            offset: (number - 1) * page_size,
            limit: page_size,
        }
    }

    /// Wraps the items fetched for this window.
    pub fn page<T>(&self, items: Vec<T>) -> Page<T> {
        Page {
            items,
            number: self.number,
            total_pages: self.total_pages,
            count: self.count,
        }
    }
}

impl<T> Page<T> {
    pub fn has_next(&self) -> bool {
        self.number < self.total_pages
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn meta(&self) -> PageMeta {
        PageMeta {
            number: self.number,
            total_pages: self.total_pages,
            has_next: self.has_next(),
            has_previous: self.has_previous(),
        }
    }

    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            number: self.number,
            total_pages: self.total_pages,
            count: self.count,
        }
    }
}

/// Cuts page `requested` out of `items`. Does not reorder.
pub fn paginate<T>(items: Vec<T>, page_size: usize, requested: Option<&str>) -> Page<T> {
    let window = PageWindow::resolve(items.len(), page_size, requested);
    let items = items
        .into_iter()
        .skip(window.offset)
        .take(window.limit)
        .collect();
    window.page(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_count_and_last_page_size() {
        for size in 1..=7 {
            for n in 0..=30 {
                let items: Vec<usize> = (0..n).collect();
                let first = paginate(items.clone(), size, None);
                assert_eq!(first.total_pages, n.div_ceil(size), "n={n} size={size}");

                if n == 0 {
                    assert!(first.items.is_empty());
                    continue;
                }

                let last_number = first.total_pages.to_string();
                let last = paginate(items, size, Some(&last_number));
                let expected = if n % size == 0 { size } else { n % size };
                assert_eq!(last.items.len(), expected, "n={n} size={size}");
                assert!(!last.has_next());
            }
        }
    }

    #[test]
    fn fifteen_items_split_ten_and_five() {
        let items: Vec<u32> = (1..=15).collect();

        let one = paginate(items.clone(), 10, Some("1"));
        assert_eq!(one.items, (1..=10).collect::<Vec<_>>());
        assert!(one.has_next());
        assert!(!one.has_previous());

        let two = paginate(items, 10, Some("2"));
        assert_eq!(two.items, vec![11, 12, 13, 14, 15]);
        assert!(!two.has_next());
        assert!(two.has_previous());
    }

    #[test]
    fn bad_requests_fall_back_to_first_page() {
        let items: Vec<u32> = (1..=25).collect();
        for raw in ["abc", "0", "-1", "4", "999", "", "2.5"] {
            let page = paginate(items.clone(), 10, Some(raw));
            assert_eq!(page.number, 1, "requested {raw:?}");
            assert_eq!(page.items.first(), Some(&1));
        }
    }

    #[test]
    fn order_is_preserved() {
        let items = vec!["c", "a", "b"];
        let page = paginate(items, 2, None);
        assert_eq!(page.items, vec!["c", "a"]);
    }

    #[test]
    fn window_offsets_match_page_number() {
        let window = PageWindow::resolve(25, 10, Some("3"));
        assert_eq!((window.number, window.offset, window.limit), (3, 20, 10));
        assert_eq!(window.total_pages, 3);

        let empty = PageWindow::resolve(0, 10, Some("2"));
        assert_eq!((empty.number, empty.total_pages, empty.offset), (1, 0, 0));
    }

    #[test]
    fn meta_reflects_position() {
        let page = paginate((0..30).collect::<Vec<_>>(), 10, Some("2"));
        let meta = page.meta();
        assert_eq!(meta.number, 2);
        assert_eq!(meta.total_pages, 3);
        assert!(meta.has_next && meta.has_previous);
    }
}
