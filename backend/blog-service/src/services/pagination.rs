/// Page-number pagination over counted listings
///
/// Page numbers are 1-based. A missing or non-numeric page falls back to the
/// first page; any number outside `1..=num_pages` falls back to the last.
/// An empty listing still has one (empty) page.
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paginator {
    per_page: i64,
    /// Only the `cap` most recent items are ever listed
    cap: Option<i64>,
}

/// Where a resolved page sits inside the listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub number: i64,
    pub num_pages: i64,
    pub count: i64,
    pub per_page: i64,
    pub offset: i64,
    pub limit: i64,
}

impl Paginator {
    pub fn new(per_page: i64) -> Self {
        Self {
            per_page: per_page.max(1),
            cap: None,
        }
    }

    pub fn capped(per_page: i64, cap: i64) -> Self {
        Self {
            cap: Some(cap.max(0)),
            ..Self::new(per_page)
        }
    }

    pub fn per_page(&self) -> i64 {
        self.per_page
    }

    /// Resolve the raw `page` query value against `total` items
    pub fn window(&self, requested: Option<&str>, total: i64) -> PageWindow {
        let count = match self.cap {
            Some(cap) => total.clamp(0, cap),
            None => total.max(0),
        };
        let num_pages = if count == 0 {
            1
        } else {
            (count + self.per_page - 1) / self.per_page
        };

        let number = match requested.map(str::trim).and_then(|raw| raw.parse::<i64>().ok()) {
            None => 1,
            Some(n) if n < 1 || n > num_pages => num_pages,
            Some(n) => n,
        };

        let offset = (number - 1) * self.per_page;
        let limit = self.per_page.min(count - offset).max(0);

        PageWindow {
            number,
            num_pages,
            count,
            per_page: self.per_page,
            offset,
            limit,
        }
    }
}

/// One page of a listing plus the metadata templates need for navigation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub count: i64,
    pub num_pages: i64,
    pub number: i64,
    pub per_page: i64,
    pub has_next: bool,
    pub has_previous: bool,
    pub next_page_number: Option<i64>,
    pub previous_page_number: Option<i64>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, window: PageWindow) -> Self {
        let has_next = window.number < window.num_pages;
        let has_previous = window.number > 1;
        Self {
            items,
            count: window.count,
            num_pages: window.num_pages,
            number: window.number,
            per_page: window.per_page,
            has_next,
            has_previous,
            next_page_number: has_next.then_some(window.number + 1),
            previous_page_number: has_previous.then_some(window.number - 1),
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            count: self.count,
            num_pages: self.num_pages,
            number: self.number,
            per_page: self.per_page,
            has_next: self.has_next,
            has_previous: self.has_previous,
            next_page_number: self.next_page_number,
            previous_page_number: self.previous_page_number,
        }
    }
}
