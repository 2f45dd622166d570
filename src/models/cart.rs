use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Product image reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductImage {
    pub url: String,
}

/// Catalog product as carried inside a cart line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub price: Decimal,
    #[serde(default)]
    pub images: Vec<ProductImage>,
}

impl Product {
    /// The image shown on order lines, when the catalog has one.
    pub fn primary_image(&self) -> Option<&str> {
        self.images.first().map(|image| image.url.as_str())
    }
}

/// A line in the shopping cart.
///
/// An item never exists with a non-positive quantity: updating a line to
/// zero or below removes it instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: Uuid,
    pub product: Product,
    pub quantity: i32,
}

impl CartItem {
    pub fn line_total(&self) -> Decimal {
        self.product.price * Decimal::from(self.quantity)
    }
}

/// Content fingerprint of a cart snapshot.
///
/// A payment intent is priced against a specific snapshot; comparing the
/// fingerprint recorded at intent time with the live one detects any cart
/// mutation that would make the intent's totals stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartFingerprint(String);

impl CartFingerprint {
    pub fn of(items: &[CartItem]) -> Self {
        let mut hasher = Sha256::new();
        for item in items {
            hasher.update(item.product.id.as_bytes());
            hasher.update(item.product.price.to_string().as_bytes());
            hasher.update(item.quantity.to_le_bytes());
        }
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn item(price: Decimal, quantity: i32) -> CartItem {
        CartItem {
            id: Uuid::new_v4(),
            product: Product {
                id: Uuid::new_v4(),
                name: "Widget".to_string(),
                price,
                images: vec![],
            },
            quantity,
        }
    }

    #[test]
    fn line_total_multiplies_price_by_quantity() {
        let line = item(dec!(19.99), 3);
        assert_eq!(line.line_total(), dec!(59.97));
    }

    #[test]
    fn fingerprint_is_stable_for_same_contents() {
        let line = item(dec!(100), 1);
        let a = CartFingerprint::of(std::slice::from_ref(&line));
        let b = CartFingerprint::of(std::slice::from_ref(&line));
        assert_eq!(a, b);
    }

    #[test]
    fn fingerprint_changes_when_quantity_changes() {
        let mut line = item(dec!(100), 1);
        let before = CartFingerprint::of(std::slice::from_ref(&line));
        line.quantity = 2;
        let after = CartFingerprint::of(std::slice::from_ref(&line));
        assert_ne!(before, after);
    }

    #[test]
    fn fingerprint_changes_when_price_changes() {
        let mut line = item(dec!(100), 1);
        let before = CartFingerprint::of(std::slice::from_ref(&line));
        line.product.price = dec!(101);
        let after = CartFingerprint::of(std::slice::from_ref(&line));
        assert_ne!(before, after);
    }

    #[test]
    fn empty_cart_has_a_fingerprint_too() {
        let a = CartFingerprint::of(&[]);
        let b = CartFingerprint::of(&[]);
        assert_eq!(a, b);
    }

    #[test]
    fn primary_image_takes_first_url() {
        let mut line = item(dec!(5), 1);
        assert_eq!(line.product.primary_image(), None);

        line.product.images = vec![
            ProductImage {
                url: "https://cdn.example/widget-front.png".to_string(),
            },
            ProductImage {
                url: "https://cdn.example/widget-back.png".to_string(),
            },
        ];
        assert_eq!(
            line.product.primary_image(),
            Some("https://cdn.example/widget-front.png")
        );
    }
}
