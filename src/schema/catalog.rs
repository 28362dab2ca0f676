//! Validation rules for the GlobalMarket collections

use serde_json::{json, Value};

use super::types::{BsonType, FieldRule, ValidationLevel, ValidationSpec};

/// Products: identity and name required, numeric fields typed and ranged
pub fn products_validation(collection: &str) -> ValidationSpec {
    ValidationSpec::new(collection)
        .require("product_id")
        .require("product_name")
        .property("product_id", FieldRule::of(&[BsonType::String]))
        .property("product_name", FieldRule::of(&[BsonType::String]))
        .property(
            "price",
            FieldRule::of(&[BsonType::Double, BsonType::Int]).min(0.0),
        )
        .property(
            "rating",
            FieldRule::of(&[BsonType::Double]).min(0.0).max(5.0),
        )
        .property(
            "rating_count_clean",
            FieldRule::of(&[BsonType::Int, BsonType::Long]).min(0.0),
        )
        .property("category_clean", FieldRule::of(&[BsonType::String]))
        .with_level(ValidationLevel::Error)
}

/// Sales: product reference, date and amount required
pub fn sales_validation(collection: &str) -> ValidationSpec {
    ValidationSpec::new(collection)
        .require("product_id")
        .require("date")
        .require("total_amount")
        .property("product_id", FieldRule::of(&[BsonType::String]))
        .property("date", FieldRule::of(&[BsonType::Date]))
        .property(
            "total_amount",
            FieldRule::of(&[BsonType::Double, BsonType::Int]).min(0.0),
        )
        .with_level(ValidationLevel::Error)
}

/// A product that satisfies `products_validation`
pub fn sample_product() -> Value {
    json!({
        "product_id": "TEST-001",
        "product_name": "Producto de prueba",
        "price": 99.99,
        "rating": 4.5,
        "rating_count_clean": 100,
        "category_clean": "Test"
    })
}

/// A sale that satisfies `sales_validation`
pub fn sample_sale() -> Value {
    json!({
        "product_id": "TEST-001",
        "date": {"$date": "2024-01-15T00:00:00Z"},
        "total_amount": 99.99
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::RuleChecker;

    #[test]
    fn test_samples_satisfy_their_rules() {
        assert!(RuleChecker::is_valid(&products_validation("Products_clean"), &sample_product()));
        assert!(RuleChecker::is_valid(&sales_validation("ventas"), &sample_sale()));
    }

    #[test]
    fn test_string_rating_violates_products_rules() {
        let doc = json!({"product_id": "P1", "product_name": "Cable", "rating": "4,8"});
        assert!(!RuleChecker::is_valid(&products_validation("Products_clean"), &doc));
    }

    #[test]
    fn test_catalog_specs_are_well_formed() {
        assert!(products_validation("Products_clean").validate_structure().is_ok());
        assert!(sales_validation("ventas").validate_structure().is_ok());
    }
}
