//! Fixed-size pages over an ordered sequence.
//!
//! A requested page number comes straight from the query string, so it may be
//! missing, garbage, or out of range. None of those are errors: the number is
//! clamped to the nearest page that exists.

use serde::Deserialize;

/// `?page=` as it arrives; kept as a string so garbage does not reject the request.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paginator {
    count: usize,
    per_page: usize,
}

/// The clamped position of one page inside the full sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub number: usize,
    pub num_pages: usize,
    pub offset: usize,
    pub limit: usize,
}

#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: usize,
    pub num_pages: usize,
    pub has_next: bool,
    pub has_previous: bool,
    pub next_page_number: Option<usize>,
    pub previous_page_number: Option<usize>,
}

impl Paginator {
    /// `per_page` of zero is treated as one.
    pub fn new(count: usize, per_page: usize) -> Self {
        Self {
            count,
            per_page: per_page.max(1),
        }
    }

    /// An empty sequence still has one (empty) page.
    pub fn num_pages(&self) -> usize {
        self.count.div_ceil(self.per_page).max(1)
    }

    pub fn window(&self, requested: Option<&str>) -> PageWindow {
        let num_pages = self.num_pages();
        let number = clamp_page(requested, num_pages);
        let offset = (number - 1) * self.per_page;
        let limit = self.per_page.min(self.count.saturating_sub(offset));
        PageWindow {
            number,
            num_pages,
            offset,
            limit,
        }
    }

    /// Slice an in-memory sequence.
    pub fn get_page<T: Clone>(&self, items: &[T], requested: Option<&str>) -> Page<T> {
        let window = self.window(requested);
        let end = (window.offset + window.limit).min(items.len());
        let start = window.offset.min(end);
        Page::from_window(window, items[start..end].to_vec())
    }
}

impl<T> Page<T> {
    /// Wrap items that were already fetched for `window`.
    pub fn from_window(window: PageWindow, items: Vec<T>) -> Self {
        let has_next = window.number < window.num_pages;
        let has_previous = window.number > 1;
        Self {
            items,
            number: window.number,
            num_pages: window.num_pages,
            has_next,
            has_previous,
            next_page_number: has_next.then_some(window.number + 1),
            previous_page_number: has_previous.then_some(window.number - 1),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            number: self.number,
            num_pages: self.num_pages,
            has_next: self.has_next,
            has_previous: self.has_previous,
            next_page_number: self.next_page_number,
            previous_page_number: self.previous_page_number,
        }
    }
}

fn clamp_page(requested: Option<&str>, num_pages: usize) -> usize {
    let Some(raw) = requested.map(str::trim) else {
        return 1;
    };
    match raw.parse::<i64>() {
        Ok(n) if n < 1 => 1,
        Ok(n) => (n as u64).min(num_pages as u64) as usize,
        // Too many digits to parse is still past the end.
        Err(_) if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) => num_pages,
        Err(_) => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifteen_items_split_ten_and_five() {
        let items: Vec<u32> = (0..15).collect();
        let paginator = Paginator::new(items.len(), 10);
        assert_eq!(paginator.num_pages(), 2);

        let first = paginator.get_page(&items, Some("1"));
        assert_eq!(first.len(), 10);
        assert!(first.has_next);
        assert!(!first.has_previous);
        assert_eq!(first.next_page_number, Some(2));

        let second = paginator.get_page(&items, Some("2"));
        assert_eq!(second.items, (10..15).collect::<Vec<_>>());
        assert!(!second.has_next);
        assert!(second.has_previous);
        assert_eq!(second.previous_page_number, Some(1));
    }

    #[test]
    fn missing_or_garbage_page_is_first() {
        let paginator = Paginator::new(25, 10);
        assert_eq!(paginator.window(None).number, 1);
        assert_eq!(paginator.window(Some("abc")).number, 1);
        assert_eq!(paginator.window(Some("")).number, 1);
        assert_eq!(paginator.window(Some("1.5")).number, 1);
    }

    #[test]
    fn out_of_range_page_clamps() {
        let paginator = Paginator::new(25, 10);
        assert_eq!(paginator.window(Some("0")).number, 1);
        assert_eq!(paginator.window(Some("-4")).number, 1);
        assert_eq!(paginator.window(Some("99")).number, 3);
        assert_eq!(paginator.window(Some("99999999999999999999")).number, 3);

        let last = paginator.window(Some("7"));
        assert_eq!(last.offset, 20);
        assert_eq!(last.limit, 5);
    }

    #[test]
    fn empty_sequence_has_one_empty_page() {
        let paginator = Paginator::new(0, 10);
        assert_eq!(paginator.num_pages(), 1);
        let page = paginator.get_page::<u8>(&[], Some("3"));
        assert_eq!(page.number, 1);
        assert!(page.is_empty());
        assert!(!page.has_next && !page.has_previous);
    }

    #[test]
    fn every_page_is_bounded_and_drawn_from_the_source() {
        for count in [0usize, 1, 9, 10, 11, 37] {
            for per_page in [1usize, 3, 10] {
                let items: Vec<usize> = (0..count).collect();
                let paginator = Paginator::new(count, per_page);
                let mut seen = 0;
                for n in 1..=paginator.num_pages() {
                    let page = paginator.get_page(&items, Some(&n.to_string()));
                    assert!(page.len() <= per_page);
                    assert!(page.items.iter().all(|i| items.contains(i)));
                    seen += page.len();
                }
                assert_eq!(seen, count);
            }
        }
    }

    #[test]
    fn map_keeps_metadata() {
        let page = Paginator::new(3, 2).get_page(&[1, 2, 3], Some("2"));
        let mapped = page.map(|n| n * 10);
        assert_eq!(mapped.items, vec![30]);
        assert_eq!(mapped.number, 2);
        assert!(mapped.has_previous);
    }
}
