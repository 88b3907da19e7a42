//! Product catalog kept under the `products` store key

use rust_decimal::Decimal;

use crate::models::Product;
use crate::store::{Store, PRODUCTS};
use crate::traits::StoreError;
use crate::validation::{validate_product, ValidationError};

/// Category label that matches every product
pub const ALL_CATEGORIES: &str = "All";

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct CatalogManager {
    store: Store,
}

impl CatalogManager {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Products in display order. A store that has never held a catalog
    /// yields the built-in seed catalog.
    pub fn list(&self) -> Vec<Product> {
        self.load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Catalog read failed, showing seed catalog");
            default_catalog()
        })
    }

    pub fn get(&self, id: &str) -> Option<Product> {
        self.list().into_iter().find(|p| p.id == id)
    }

    /// Add a product; a duplicate SKU is a validation error
    pub fn add(&self, product: Product) -> Result<(), CatalogError> {
        validate_product(&product)?;
        let added = self.store.transaction(|tx| {
            let mut products: Vec<Product> = tx.load_or(PRODUCTS, default_catalog)?;
            if products.iter().any(|p| p.id == product.id) {
                return Ok(false);
            }
            products.push(product.clone());
            tx.save(PRODUCTS, &products)?;
            Ok(true)
        })?;
        if !added {
            return Err(ValidationError::DuplicateProduct(product.id).into());
        }
        tracing::info!(sku = %product.id, "Product added");
        Ok(())
    }

    /// Replace the product with the same id. Returns false if no such product.
    pub fn update(&self, product: Product) -> Result<bool, CatalogError> {
        validate_product(&product)?;
        let sku = product.id.clone();
        let updated = self.store.transaction(|tx| {
            let mut products: Vec<Product> = tx.load_or(PRODUCTS, default_catalog)?;
            let Some(slot) = products.iter_mut().find(|p| p.id == product.id) else {
                return Ok(false);
            };
            *slot = product;
            tx.save(PRODUCTS, &products)?;
            Ok(true)
        })?;
        if !updated {
            tracing::debug!(sku = %sku, "Update for unknown product ignored");
        }
        Ok(updated)
    }

    /// Remove by id. Returns false if no such product.
    pub fn delete(&self, id: &str) -> Result<bool, CatalogError> {
        let deleted = self.store.transaction(|tx| {
            let mut products: Vec<Product> = tx.load_or(PRODUCTS, default_catalog)?;
            let before = products.len();
            products.retain(|p| p.id != id);
            if products.len() == before {
                return Ok(false);
            }
            tx.save(PRODUCTS, &products)?;
            Ok(true)
        })?;
        if deleted {
            tracing::info!(sku = %id, "Product deleted");
        }
        Ok(deleted)
    }

    /// `All` followed by each distinct category in first-seen order
    pub fn categories(&self) -> Vec<String> {
        let mut categories = vec![ALL_CATEGORIES.to_string()];
        for product in self.list() {
            if !categories.contains(&product.category) {
                categories.push(product.category);
            }
        }
        categories
    }

    /// Case-insensitive match on name or SKU, restricted to a category unless it is `All`
    pub fn search(&self, term: &str, category: &str) -> Vec<Product> {
        let term = term.to_lowercase();
        self.list()
            .into_iter()
            .filter(|p| category == ALL_CATEGORIES || p.category == category)
            .filter(|p| p.name.to_lowercase().contains(&term) || p.id.to_lowercase().contains(&term))
            .collect()
    }

    fn load(&self) -> Result<Vec<Product>, StoreError> {
        self.store.load_or(PRODUCTS, default_catalog)
    }
}

fn seed(id: &str, name: &str, rate: i64, unit: &str, category: &str) -> Product {
    Product {
        id: id.to_string(),
        name: name.to_string(),
        rate: Decimal::from(rate),
        unit: unit.to_string(),
        category: category.to_string(),
        image: format!("https://picsum.photos/seed/{}/400", id),
    }
}

/// Catalog shipped with the app
pub fn default_catalog() -> Vec<Product> {
    vec![
        seed("ST001", "Steel Plate 10\"", 75, "pcs", "Tableware"),
        seed("ST002", "Steel Bowl 5\"", 45, "pcs", "Tableware"),
        seed("ST003", "Serving Spoon", 30, "pcs", "Cutlery"),
        seed("CK001", "Pressure Cooker 5L", 1250, "pcs", "Cookware"),
        seed("CK002", "Non-stick Pan", 600, "pcs", "Cookware"),
        seed("GL001", "Water Glass Set", 250, "set", "Glassware"),
        seed("GL002", "Juice Glass", 50, "pcs", "Glassware"),
        seed("CT001", "Stainless Steel Fork", 25, "pcs", "Cutlery"),
        seed("CT002", "Stainless Steel Knife", 35, "pcs", "Cutlery"),
        seed("CR001", "Ceramic Dinner Plate", 150, "pcs", "Crockery"),
        seed("CR002", "Ceramic Coffee Mug", 90, "pcs", "Crockery"),
        seed("KT001", "Kitchen Tongs", 80, "pcs", "Kitchen Tools"),
        seed("KT002", "Vegetable Peeler", 40, "pcs", "Kitchen Tools"),
        seed("ST004", "Steel Cutlery Stand", 180, "pcs", "Storage"),
        seed("ST005", "Masala Dabba", 350, "pcs", "Storage"),
        seed("CK003", "Cast Iron Tawa", 800, "pcs", "Cookware"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use crate::mocks::InMemoryStore;

    fn catalog() -> CatalogManager {
        CatalogManager::new(Store::new(Arc::new(InMemoryStore::new())))
    }

    #[test]
    fn test_seed_catalog_when_empty() {
        let catalog = catalog();
        assert_eq!(catalog.list().len(), 16);
        assert_eq!(catalog.get("CK001").unwrap().rate, Decimal::from(1250));
    }

    #[test]
    fn test_add_rejects_duplicate_sku() {
        let catalog = catalog();
        let err = catalog.add(seed("ST001", "Another Plate", 10, "pcs", "Tableware")).unwrap_err();
        assert!(matches!(err, CatalogError::Validation(ValidationError::DuplicateProduct(id)) if id == "ST001"));
        assert_eq!(catalog.list().len(), 16);
    }

    #[test]
    fn test_add_update_delete() {
        let catalog = catalog();

        catalog.add(seed("NEW01", "Copper Jug", 900, "pcs", "Drinkware")).unwrap();
        assert_eq!(catalog.list().last().unwrap().id, "NEW01");

        assert!(catalog.update(seed("NEW01", "Copper Jug 1L", 950, "pcs", "Drinkware")).unwrap());
        assert_eq!(catalog.get("NEW01").unwrap().rate, Decimal::from(950));

        assert!(catalog.delete("NEW01").unwrap());
        assert!(catalog.get("NEW01").is_none());
    }

    #[test]
    fn test_update_and_delete_unknown_are_noops() {
        let catalog = catalog();
        assert!(!catalog.update(seed("NOPE", "Ghost", 1, "pcs", "None")).unwrap());
        assert!(!catalog.delete("NOPE").unwrap());
        assert_eq!(catalog.list().len(), 16);
    }

    #[test]
    fn test_invalid_product_is_rejected_before_write() {
        let catalog = catalog();
        let err = catalog.add(seed("", "Nameless", 1, "pcs", "Misc")).unwrap_err();
        assert!(matches!(err, CatalogError::Validation(ValidationError::MissingProductFields)));
    }

    #[test]
    fn test_categories_and_search() {
        let catalog = catalog();

        let categories = catalog.categories();
        assert_eq!(categories[0], ALL_CATEGORIES);
        assert_eq!(categories[1], "Tableware");
        assert_eq!(categories.len(), 8);

        let steel = catalog.search("steel", ALL_CATEGORIES);
        assert_eq!(steel.len(), 5);

        let cutlery = catalog.search("steel", "Cutlery");
        assert_eq!(cutlery.iter().map(|p| p.id.as_str()).collect::<Vec<_>>(), vec!["CT001", "CT002"]);

        assert_eq!(catalog.search("ck00", ALL_CATEGORIES).len(), 3);
    }
}
