//! PostgreSQL access. Functions take any executor so they run the same on
//! the pool or inside a transaction.

pub mod carts;
pub mod categories;
pub mod inventory;
pub mod orders;
pub mod products;
pub mod reviews;
pub mod users;

/// `LIMIT`/`OFFSET` pair for a 1-based page.
pub fn page_bounds(page: u32, limit: u32) -> (i64, i64) {
    let page = page.max(1);
    (i64::from(limit), i64::from(page - 1) * i64::from(limit))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_bounds() {
        assert_eq!(page_bounds(1, 12), (12, 0));
        assert_eq!(page_bounds(3, 10), (10, 20));
        assert_eq!(page_bounds(0, 10), (10, 0));
    }
}
