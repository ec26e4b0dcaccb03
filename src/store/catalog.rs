use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::{parse_float_prefix, read, write};
use crate::clock;
use crate::error::StoreError;

/// A product in the catalog.
///
/// Fields outside the known set survive a `PUT` merge and are kept in
/// `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogItem {
    pub id: u64,
    pub name: String,
    pub category: String,
    pub price: f64,
    pub brand: String,
    #[serde(default)]
    pub specs: Map<String, Value>,
    pub in_stock: bool,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Query filters of `GET /api/computer-items`, as raw strings.
#[derive(Debug, Clone, Default)]
pub struct ItemFilter {
    pub category: Option<String>,
    pub brand: Option<String>,
    pub in_stock: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
}

impl ItemFilter {
    /// Every filter that is set must hold.
    pub fn matches(&self, item: &CatalogItem) -> bool {
        if let Some(category) = self.category.as_deref().filter(|c| !c.is_empty()) {
            if item.category.to_lowercase() != category.to_lowercase() {
                return false;
            }
        }
        if let Some(brand) = self.brand.as_deref().filter(|b| !b.is_empty()) {
            if !item.brand.to_lowercase().contains(&brand.to_lowercase()) {
                return false;
            }
        }
        if let Some(in_stock) = self.in_stock.as_deref() {
            if item.in_stock != (in_stock == "true") {
                return false;
            }
        }
        // An unparsable bound compares false, which empties the result
        if let Some(min) = self.min_price.as_deref().filter(|p| !p.is_empty()) {
            if !parse_float_prefix(min).is_some_and(|min| item.price >= min) {
                return false;
            }
        }
        if let Some(max) = self.max_price.as_deref().filter(|p| !p.is_empty()) {
            if !parse_float_prefix(max).is_some_and(|max| item.price <= max) {
                return false;
            }
        }
        true
    }
}

fn truthy_str<'a>(body: &'a Value, key: &str) -> Option<&'a str> {
    body.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn price_of(body: &Value) -> Option<f64> {
    match body.get("price")? {
        Value::Number(n) => n.as_f64().filter(|p| *p != 0.0),
        Value::String(s) if !s.is_empty() => parse_float_prefix(s),
        _ => None,
    }
}

/// The product catalog.
pub struct Catalog {
    items: RwLock<Vec<CatalogItem>>,
}

impl Catalog {
    pub fn new(items: Vec<CatalogItem>) -> Self {
        Self {
            items: RwLock::new(items),
        }
    }

    /// The two demo products.
    pub fn seeded() -> Self {
        let now = clock::now_iso();
        let item = |id, name: &str, category: &str, price, brand: &str, specs: Value| CatalogItem {
            id,
            name: name.to_string(),
            category: category.to_string(),
            price,
            brand: brand.to_string(),
            specs: specs.as_object().cloned().unwrap_or_default(),
            in_stock: true,
            created_at: now.clone(),
            updated_at: None,
            extra: Map::new(),
        };
        Self::new(vec![
            item(
                1,
                "Gaming Laptop",
                "Laptop",
                1299.99,
                "ASUS",
                json!({
                    "processor": "Intel i7-12700H",
                    "ram": "16GB",
                    "storage": "512GB SSD",
                    "graphics": "RTX 3060"
                }),
            ),
            item(
                2,
                "Wireless Mouse",
                "Accessories",
                49.99,
                "Logitech",
                json!({
                    "dpi": "8000",
                    "battery": "Rechargeable",
                    "connectivity": "2.4GHz Wireless"
                }),
            ),
        ])
    }

    /// Items passing `filter`, in insertion order.
    pub fn list(&self, filter: &ItemFilter) -> Vec<CatalogItem> {
        read(&self.items)
            .iter()
            .filter(|item| filter.matches(item))
            .cloned()
            .collect()
    }

    /// Look an item up by id.
    pub fn get(&self, id: u64) -> Result<CatalogItem, StoreError> {
        read(&self.items)
            .iter()
            .find(|item| item.id == id)
            .cloned()
            .ok_or(StoreError::ItemNotFound)
    }

    /// Add an item from a request body.
    ///
    /// `name`, `category` and `brand` must be non-empty strings and `price`
    /// a non-zero number or a string starting with one.
    pub fn create(&self, body: &Value) -> Result<CatalogItem, StoreError> {
        let (Some(name), Some(category), Some(price), Some(brand)) = (
            truthy_str(body, "name"),
            truthy_str(body, "category"),
            price_of(body),
            truthy_str(body, "brand"),
        ) else {
            return Err(StoreError::MissingItemFields);
        };
        let specs = body
            .get("specs")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        let mut items = write(&self.items);
        let id = items.iter().map(|item| item.id).max().map_or(1, |max| max + 1);
        let item = CatalogItem {
            id,
            name: name.to_string(),
            category: category.to_string(),
            price,
            brand: brand.to_string(),
            specs,
            in_stock: true,
            created_at: clock::now_iso(),
            updated_at: None,
            extra: Map::new(),
        };
        items.push(item.clone());
        Ok(item)
    }

    /// Shallow-merge `patch` into the item. The id never changes and
    /// `updatedAt` is stamped.
    pub fn update(&self, id: u64, patch: &Value) -> Result<CatalogItem, StoreError> {
        let mut items = write(&self.items);
        let slot = items
            .iter_mut()
            .find(|item| item.id == id)
            .ok_or(StoreError::ItemNotFound)?;

        let mut merged = match serde_json::to_value(&*slot) {
            Ok(Value::Object(map)) => map,
            Ok(_) => return Err(StoreError::InvalidItem("not an object".to_string())),
            Err(e) => return Err(StoreError::InvalidItem(e.to_string())),
        };
        if let Some(patch) = patch.as_object() {
            for (key, value) in patch {
                merged.insert(key.clone(), value.clone());
            }
        }
        merged.insert("id".into(), json!(id));
        merged.insert("updatedAt".into(), json!(clock::now_iso()));

        let updated: CatalogItem = serde_json::from_value(Value::Object(merged))
            .map_err(|e| StoreError::InvalidItem(e.to_string()))?;
        *slot = updated.clone();
        Ok(updated)
    }

    /// Remove an item and hand it back.
    pub fn delete(&self, id: u64) -> Result<CatalogItem, StoreError> {
        let mut items = write(&self.items);
        let index = items
            .iter()
            .position(|item| item.id == id)
            .ok_or(StoreError::ItemNotFound)?;
        Ok(items.remove(index))
    }

    pub fn len(&self) -> usize {
        read(&self.items).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::seeded()
    }
}
