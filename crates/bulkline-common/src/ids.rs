//! Row identifier generation.
//!
//! Every row gets a UUID v7, so ids sort by creation time.

use uuid::Uuid;

/// Generate a new time-sortable row id.
pub fn generate_id() -> Uuid {
    Uuid::now_v7()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_ordered() {
        let first = generate_id();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = generate_id();
        assert_ne!(first, second);
        assert!(first < second);
    }
}
