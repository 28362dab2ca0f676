//! Secondary indexes for the GlobalMarket collections

use serde_json::json;

use super::spec::IndexSpec;
use crate::pipeline::ast::Predicate;
use crate::pipeline::SourceCollections;

/// Every index the analytics workload relies on, products first
pub fn globalmarket_indexes(collections: &SourceCollections) -> Vec<IndexSpec> {
    let products = collections.products.as_str();
    let sales = collections.sales.as_str();

    vec![
        IndexSpec::new(products, "idx_rating_count")
            .desc("rating")
            .desc("rating_count_clean")
            .partial(Predicate::exists("rating"))
            .partial(Predicate::exists("rating_count_clean")),
        IndexSpec::new(products, "idx_price")
            .asc("price")
            .partial(Predicate::exists("price"))
            .partial(Predicate::gt("price", json!(0))),
        IndexSpec::new(products, "idx_category")
            .asc("category_clean")
            .partial(Predicate::exists("category_clean")),
        IndexSpec::new(products, "idx_category_price")
            .asc("category_clean")
            .asc("price"),
        IndexSpec::new(sales, "idx_date").desc("date"),
        IndexSpec::new(sales, "idx_product_id").asc("product_id"),
        IndexSpec::new(sales, "idx_product_date")
            .asc("product_id")
            .asc("date"),
        IndexSpec::new(sales, "idx_total_amount")
            .desc("total_amount")
            .partial(Predicate::gt("total_amount", json!(1000))),
        IndexSpec::new(products, "text_search_index")
            .text("product_name", 10)
            .text("about_product", 5)
            .language("spanish"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_is_well_formed() {
        let specs = globalmarket_indexes(&SourceCollections::default());
        assert_eq!(specs.len(), 9);
        assert!(specs.iter().all(|s| s.validate().is_ok()));
        assert_eq!(specs.iter().filter(|s| s.is_text()).count(), 1);
    }

    #[test]
    fn test_names_unique_per_collection() {
        let specs = globalmarket_indexes(&SourceCollections::default());
        for (i, a) in specs.iter().enumerate() {
            for b in &specs[i + 1..] {
                if a.collection == b.collection {
                    assert_ne!(a.name, b.name);
                    assert!(!a.same_keys(b));
                }
            }
        }
    }

    #[test]
    fn test_collection_names_follow_configuration() {
        let collections = SourceCollections::new("productos", "sales");
        let specs = globalmarket_indexes(&collections);
        assert!(specs.iter().any(|s| s.collection == "productos"));
        assert!(specs.iter().all(|s| s.collection != "Products_clean"));
    }
}
