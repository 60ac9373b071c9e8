//! Page-number pagination shared by every feed view.
//!
//! Pages are 1-based. A missing or malformed page number means the first
//! page, and a number past the end clamps to the last page, so a request
//! never fails because of its `page` parameter.

use std::num::NonZeroU64;

/// Number of posts shown on every paginated view.
pub const PAGE_SIZE: u64 = 10;

/// A requested page number after lenient parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageNumber(NonZeroU64);

impl PageNumber {
    pub const FIRST: Self = Self(NonZeroU64::MIN);

    /// Parse a raw `page` query value. Absent, non-numeric, zero and
    /// negative values all become page 1. Digit strings too large for `u64`
    /// saturate and later clamp to the last page.
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(value) = raw.map(str::trim).filter(|value| !value.is_empty()) else {
            return Self::FIRST;
        };

        match value.parse::<u64>() {
            Ok(number) => NonZeroU64::new(number).map_or(Self::FIRST, Self),
            Err(_) if value.bytes().all(|byte| byte.is_ascii_digit()) => {
                Self(NonZeroU64::MAX)
            }
            Err(_) => Self::FIRST,
        }
    }

    pub fn new(number: u64) -> Self {
        NonZeroU64::new(number).map_or(Self::FIRST, Self)
    }

    pub fn get(self) -> u64 {
        self.0.get()
    }
}

impl Default for PageNumber {
    fn default() -> Self {
        Self::FIRST
    }
}

/// Slice of a result set selected for one page, computed from the total
/// count alone so repositories only load the rows they return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub number: u64,
    pub num_pages: u64,
    pub total_count: u64,
    pub offset: u64,
    pub limit: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct Paginator {
    total_count: u64,
    per_page: NonZeroU64,
}

impl Paginator {
    /// `per_page` of zero is treated as one.
    pub fn new(total_count: u64, per_page: u64) -> Self {
        Self {
            total_count,
            per_page: NonZeroU64::new(per_page).unwrap_or(NonZeroU64::MIN),
        }
    }

    /// Number of pages; an empty result set still has one (empty) page.
    pub fn num_pages(&self) -> u64 {
        self.total_count.div_ceil(self.per_page.get()).max(1)
    }

    pub fn window(&self, requested: PageNumber) -> PageWindow {
        let num_pages = self.num_pages();
        let number = requested.get().min(num_pages);
        let per_page = self.per_page.get();
        let offset = (number - 1) * per_page;
        let limit = per_page.min(self.total_count.saturating_sub(offset));

        PageWindow {
            number,
            num_pages,
            total_count: self.total_count,
            offset,
            limit,
        }
    }
}

/// One page of an ordered result set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_count: u64,
    pub number: u64,
    pub num_pages: u64,
}

impl<T> Page<T> {
    pub fn from_window(window: PageWindow, items: Vec<T>) -> Self {
        Self {
            items,
            total_count: window.total_count,
            number: window.number,
            num_pages: window.num_pages,
        }
    }

    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            total_count: 0,
            number: 1,
            num_pages: 1,
        }
    }

    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    pub fn has_prev(&self) -> bool {
        self.number > 1
    }

    pub fn next_number(&self) -> Option<u64> {
        self.has_next().then(|| self.number + 1)
    }

    pub fn previous_number(&self) -> Option<u64> {
        self.has_prev().then(|| self.number - 1)
    }
}

/// Slice an already ordered, fully materialised sequence.
pub fn paginate<T>(sequence: Vec<T>, page_size: u64, page: PageNumber) -> Page<T> {
    let total_count = sequence.len() as u64;
    let window = Paginator::new(total_count, page_size).window(page);
    let start = usize::try_from(window.offset).unwrap_or(usize::MAX);
    let take = usize::try_from(window.limit).unwrap_or(usize::MAX);
    let items = sequence.into_iter().skip(start).take(take).collect();
    Page::from_window(window, items)
}
