//! Typed views of the remote's JSON payloads.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};

/// Ingredient ids every pizza starts with (base and sauce).
const BASE_INGREDIENTS: [i64; 2] = [36, 42];

/// A price or version field the remote sends as either a string or a number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
#[serde(transparent)]
pub struct Text(pub String);

impl<'de> Deserialize<'de> for Text {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Str(String),
            Num(serde_json::Number),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Str(s) => Text(s),
            Raw::Num(n) => Text(n.to_string()),
        })
    }
}

impl fmt::Display for Text {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn ascii_only<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    let name = String::deserialize(deserializer)?;
    Ok(strip_non_ascii(&name))
}

/// Drops trademark symbols and other non-ASCII characters from names.
pub fn strip_non_ascii(text: &str) -> String {
    text.chars().filter(char::is_ascii).collect()
}

// ============================================================================
// Stores
// ============================================================================

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Store {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub is_open: bool,
    #[serde(default, rename = "isCollectionAvailable")]
    pub collection_available: bool,
    /// Only known for the local store, from the search response.
    #[serde(skip)]
    pub delivery_available: bool,
    pub menu_version: Text,
}

impl PartialEq for Store {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl fmt::Display for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "name: {}, open: {}", self.name, self.is_open)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStores {
    local_store: Option<Store>,
    #[serde(default)]
    local_store_can_deliver_to_address: bool,
    #[serde(default)]
    collection_stores: Vec<Store>,
}

/// Result of a store search.
#[derive(Debug, Clone, Deserialize)]
#[serde(from = "RawStores")]
pub struct Stores {
    pub local_store: Option<Store>,
    pub collection_stores: Vec<Store>,
}

impl From<RawStores> for Stores {
    fn from(raw: RawStores) -> Self {
        let local_store = raw.local_store.map(|mut store| {
            store.delivery_available = raw.local_store_can_deliver_to_address;
            store
        });
        Self {
            local_store,
            collection_stores: raw.collection_stores,
        }
    }
}

impl Stores {
    pub fn len(&self) -> usize {
        self.collection_stores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collection_stores.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Store> {
        self.collection_stores.iter()
    }
}

// ============================================================================
// Menu
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum ItemKind {
    Pizza,
    Side,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Sku {
    pub product_sku_id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub price: Option<Text>,
    #[serde(default)]
    pub ingredients: Vec<i64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Product {
    product_id: i64,
    #[serde(deserialize_with = "ascii_only")]
    name: String,
    price: Text,
    #[serde(default)]
    product_skus: Vec<Sku>,
    #[serde(rename = "type")]
    kind: ItemKind,
}

#[derive(Deserialize)]
struct Subcategory {
    #[serde(default)]
    products: Vec<Product>,
}

#[derive(Deserialize)]
struct Category {
    #[serde(default)]
    subcategories: Vec<Subcategory>,
}

/// A menu item. Pizzas also carry the ingredient list they will be ordered with.
#[derive(Debug, Clone)]
pub struct Item {
    pub id: i64,
    pub name: String,
    pub price: Text,
    pub skus: Vec<Sku>,
    pub kind: ItemKind,
    pub ingredients: Vec<i64>,
}

impl From<Product> for Item {
    fn from(product: Product) -> Self {
        let ingredients = match product.kind {
            ItemKind::Pizza => BASE_INGREDIENTS
                .iter()
                .copied()
                .chain(
                    product
                        .product_skus
                        .first()
                        .map(|sku| sku.ingredients.clone())
                        .unwrap_or_default(),
                )
                .collect(),
            _ => Vec::new(),
        };
        Self {
            id: product.product_id,
            name: product.name,
            price: product.price,
            skus: product.product_skus,
            kind: product.kind,
            ingredients,
        }
    }
}

impl PartialEq for Item {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "name: {}, type: {:?}, base price: {}", self.name, self.kind, self.price)
    }
}

impl Item {
    pub fn is_pizza(&self) -> bool {
        self.kind == ItemKind::Pizza
    }

    pub fn sku(&self, index: usize) -> Result<&Sku> {
        self.skus
            .get(index)
            .ok_or_else(|| Error::NotFound(format!("{} has no SKU at index {}", self.name, index)))
    }

    pub fn add_ingredients(&mut self, ids: &[i64]) {
        self.ingredients.extend_from_slice(ids);
    }

    pub fn remove_ingredient(&mut self, id: i64) {
        self.ingredients.retain(|&x| x != id);
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(from = "Vec<Category>")]
pub struct Menu {
    pub items: Vec<Item>,
}

impl From<Vec<Category>> for Menu {
    fn from(categories: Vec<Category>) -> Self {
        let items = categories
            .into_iter()
            .flat_map(|c| c.subcategories)
            .flat_map(|s| s.products)
            .map(Item::from)
            .collect();
        Self { items }
    }
}

impl Menu {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Case-insensitive lookup by exact name.
    pub fn product_by_name(&self, name: &str) -> Result<&Item> {
        self.items
            .iter()
            .find(|i| i.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| Error::NotFound(format!("no menu item named '{}'", name)))
    }

    pub fn get(&self, id: i64) -> Result<&Item> {
        self.items
            .iter()
            .find(|i| i.id == id)
            .ok_or_else(|| Error::NotFound(format!("no menu item with id {}", id)))
    }
}

impl fmt::Display for Menu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for item in &self.items {
            writeln!(f, "{}", item)?;
        }
        Ok(())
    }
}

// ============================================================================
// Ingredients
// ============================================================================

#[derive(Deserialize)]
struct Ingredient {
    id: i64,
    name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Half {
    #[serde(default)]
    available_crusts: Vec<Ingredient>,
    #[serde(default)]
    available_cheeses: Vec<Ingredient>,
    #[serde(default)]
    available_sauces: Vec<Ingredient>,
    #[serde(default)]
    available_toppings: Vec<Ingredient>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawIngredients {
    half_one: Half,
}

/// Ingredients that can be put on a pizza, looked up by name.
#[derive(Debug, Clone, Deserialize)]
#[serde(from = "RawIngredients")]
pub struct IngredientList {
    toppings: HashMap<String, i64>,
}

impl From<RawIngredients> for IngredientList {
    fn from(raw: RawIngredients) -> Self {
        let half = raw.half_one;
        let toppings = [
            half.available_crusts,
            half.available_cheeses,
            half.available_sauces,
            half.available_toppings,
        ]
        .into_iter()
        .flatten()
        .map(|i| (strip_non_ascii(&i.name.to_lowercase()), i.id))
        .collect();
        Self { toppings }
    }
}

impl IngredientList {
    pub fn get_by_name(&self, name: &str) -> Result<i64> {
        self.toppings
            .get(&name.to_lowercase())
            .copied()
            .ok_or_else(|| Error::NotFound(format!("'{}' was not found.", name)))
    }

    /// Adds the named ingredients to `item`; nothing is added if any is unknown.
    pub fn add_to_pizza(&self, item: &mut Item, names: &[&str]) -> Result<()> {
        let ids = names
            .iter()
            .map(|name| self.get_by_name(name))
            .collect::<Result<Vec<_>>>()?;
        item.add_ingredients(&ids);
        Ok(())
    }
}

// ============================================================================
// Basket
// ============================================================================

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BasketItem {
    pub basket_item_id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub quantity: Option<u32>,
    #[serde(default)]
    pub price: Option<Text>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Basket {
    pub total_price: Text,
    #[serde(default)]
    pub items: Vec<BasketItem>,
}
