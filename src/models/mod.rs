use uuid::Uuid;

pub mod price_record;
pub mod product;

pub use price_record::*;
pub use product::*;

/// Row ids in the history table, UUID simple format.
pub fn generate_id() -> String {
    Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_id() {
        let id1 = generate_id();
        let id2 = generate_id();

        assert_ne!(id1, id2);
        assert_eq!(id1.len(), 32);
        assert!(id1.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
