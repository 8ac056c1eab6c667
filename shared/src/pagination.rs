//! Zero-indexed, fixed-size page arithmetic
//!
//! A page past the end of the data is an empty slice, never an error.

/// Posts per page in the home feed
pub const FEED_PAGE_SIZE: u32 = 3;
/// Comments per page under a post
pub const COMMENTS_PAGE_SIZE: u32 = 3;
/// Posts per page on a user's profile
pub const USER_POSTS_PAGE_SIZE: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub per_page: u32,
}

impl PageRequest {
    pub fn new(page: u32, per_page: u32) -> Self {
        Self { page, per_page }
    }

    pub fn feed(page: u32) -> Self {
        Self::new(page, FEED_PAGE_SIZE)
    }

    pub fn comments(page: u32) -> Self {
        Self::new(page, COMMENTS_PAGE_SIZE)
    }

    pub fn user_posts(page: u32) -> Self {
        Self::new(page, USER_POSTS_PAGE_SIZE)
    }

    /// Rows to skip. Widened to i64 so `page * per_page` cannot overflow.
    #[inline]
    pub fn offset(&self) -> i64 {
        i64::from(self.page) * i64::from(self.per_page)
    }

    #[inline]
    pub fn limit(&self) -> i64 {
        i64::from(self.per_page)
    }

    /// Apply the page to an already ordered slice
    pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let start = usize::try_from(self.offset()).unwrap_or(usize::MAX);
        if start >= items.len() {
            return &[];
        }
        let end = start.saturating_add(self.per_page as usize).min(items.len());
        &items[start..end]
    }
}
