//! UID generation.

use uuid::Uuid;

/// Generate a new globally unique UID
/// under the `2.25` root, derived from a random UUID.
pub fn new_uid() -> String {
    format!("2.25.{}", Uuid::new_v4().as_u128())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uids_are_valid_and_unique() {
        let a = new_uid();
        let b = new_uid();
        assert_ne!(a, b);
        assert!(a.starts_with("2.25."));
        assert!(a.len() <= 64);
        assert!(a[5..].chars().all(|c| c.is_ascii_digit()));
    }
}
