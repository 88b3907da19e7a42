//! The customer's working cart, kept under the `cartItems` store key

use rust_decimal::Decimal;

use crate::models::{items_total, total_units, CartItem, Product};
use crate::store::{Store, CART_ITEMS};
use crate::traits::StoreError;

pub struct Cart {
    store: Store,
}

impl Cart {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn items(&self) -> Vec<CartItem> {
        self.store.read(CART_ITEMS)
    }

    /// Put a product in the cart. Adding a product already present replaces its quantity.
    pub fn add(&self, product: Product, qty: u32) -> Result<(), StoreError> {
        let qty = qty.max(1);
        self.modify(|items| {
            match items.iter_mut().find(|i| i.product.id == product.id) {
                Some(existing) => existing.qty = qty,
                None => items.push(CartItem::new(product, qty)),
            }
        })
    }

    /// Set the quantity of a product in the cart; values below 1 become 1
    pub fn update_quantity(&self, product_id: &str, qty: u32) -> Result<(), StoreError> {
        self.modify(|items| {
            if let Some(item) = items.iter_mut().find(|i| i.product.id == product_id) {
                item.qty = qty.max(1);
            }
        })
    }

    pub fn remove(&self, product_id: &str) -> Result<(), StoreError> {
        self.modify(|items| items.retain(|i| i.product.id != product_id))
    }

    pub fn clear(&self) -> Result<(), StoreError> {
        self.store.save(CART_ITEMS, &Vec::<CartItem>::new())
    }

    /// Units across all lines
    pub fn total_items(&self) -> u64 {
        total_units(&self.items())
    }

    pub fn total(&self) -> Decimal {
        items_total(&self.items())
    }

    fn modify<F>(&self, apply: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut Vec<CartItem>),
    {
        self.store.transaction(|tx| {
            let mut items: Vec<CartItem> = tx.load(CART_ITEMS)?;
            apply(&mut items);
            tx.save(CART_ITEMS, &items)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use crate::catalog::default_catalog;
    use crate::mocks::InMemoryStore;

    fn product(id: &str) -> Product {
        default_catalog().into_iter().find(|p| p.id == id).unwrap()
    }

    fn cart() -> Cart {
        Cart::new(Store::new(Arc::new(InMemoryStore::new())))
    }

    #[test]
    fn test_add_and_totals() {
        let cart = cart();
        cart.add(product("ST001"), 2).unwrap();
        cart.add(product("GL001"), 1).unwrap();

        assert_eq!(cart.items().len(), 2);
        assert_eq!(cart.total_items(), 3);
        assert_eq!(cart.total(), Decimal::from(400));
    }

    #[test]
    fn test_re_adding_sets_quantity() {
        let cart = cart();
        cart.add(product("ST001"), 2).unwrap();
        cart.add(product("ST001"), 5).unwrap();

        let items = cart.items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].qty, 5);
    }

    #[test]
    fn test_update_quantity_clamps_to_one() {
        let cart = cart();
        cart.add(product("CK002"), 3).unwrap();

        cart.update_quantity("CK002", 0).unwrap();
        assert_eq!(cart.items()[0].qty, 1);

        cart.update_quantity("MISSING", 4).unwrap();
        assert_eq!(cart.items().len(), 1);
    }

    #[test]
    fn test_total_items_with_maximum_quantity() {
        let cart = cart();
        cart.add(product("ST001"), u32::MAX).unwrap();
        cart.add(product("ST002"), 2).unwrap();

        assert_eq!(cart.total_items(), u64::from(u32::MAX) + 2);
    }

    #[test]
    fn test_remove_and_clear() {
        let cart = cart();
        cart.add(product("ST001"), 1).unwrap();
        cart.add(product("ST002"), 1).unwrap();

        cart.remove("ST001").unwrap();
        assert_eq!(cart.items()[0].product.id, "ST002");

        cart.clear().unwrap();
        assert!(cart.items().is_empty());
        assert_eq!(cart.total(), Decimal::ZERO);
    }
}
