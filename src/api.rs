//! Endpoint wrappers: stores, menu, basket and payment.
//!
//! Each wrapper builds a typed request body, runs it through
//! [`Client::execute`] and decodes the response into a model.

use serde::Serialize;

use crate::client::Client;
use crate::error::Result;
use crate::http::{Request, Response, Transport};
use crate::models::{Basket, IngredientList, Item, ItemKind, Menu, Store, Stores};

/// Pizza size; doubles as the SKU index for sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Variant {
    Personal = 0,
    Small = 1,
    #[default]
    Medium = 2,
    Large = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaymentMethod {
    #[default]
    CashOnDelivery = 0,
    Card = 1,
    Paypal = 2,
    VisaCheckout = 4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FulfilmentMethod {
    Collection,
    #[default]
    Delivery,
}

impl FulfilmentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            FulfilmentMethod::Collection => "collection",
            FulfilmentMethod::Delivery => "delivery",
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JourneyInit<'a> {
    fulfilment_method: &'static str,
    postcode: &'a str,
    #[serde(rename = "storeid")]
    store_id: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AddPizza<'a> {
    step_id: u32,
    quantity: u32,
    size_id: u8,
    product_id: i64,
    ingredients: &'a [i64],
    product_id_half_two: i64,
    ingredients_half_two: &'a [i64],
    recipe_referrer: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AddProduct {
    product_sku_id: i64,
    quantity: u32,
    #[serde(rename = "ComplimentaryItems")]
    complimentary_items: Vec<i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RemoveItem {
    basket_item_id: i64,
    wizard_item_delete: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SelectPayment {
    payment_method: u8,
}

#[derive(Serialize)]
struct Proceed<'a> {
    #[serde(rename = "__RequestVerificationToken")]
    token: &'a str,
    method: &'static str,
}

impl<T: Transport> Client<T> {
    /// Searches stores by free text (town, street or postcode).
    #[tracing::instrument(skip(self))]
    pub async fn get_stores(&self, search_term: &str) -> Result<Stores> {
        let request = Request::get("/storefindermap/storesearch").query("SearchText", search_term);
        self.execute(&request).await?.json()
    }

    /// The store serving `postcode`, with its delivery status.
    pub async fn get_nearest_store(&self, postcode: &str) -> Result<Option<Store>> {
        Ok(self.get_stores(postcode).await?.local_store)
    }

    /// Initialises the delivery system for a store and postcode.
    #[tracing::instrument(skip(self, store), fields(store = store.id))]
    pub async fn set_delivery_system(
        &self,
        store: &Store,
        postcode: &str,
        fulfilment: FulfilmentMethod,
    ) -> Result<Response> {
        let body = JourneyInit {
            fulfilment_method: fulfilment.as_str(),
            postcode,
            store_id: store.id,
        };
        self.execute(&Request::post("/Journey/Initialize", &body)?).await
    }

    #[tracing::instrument(skip(self, store), fields(store = store.id))]
    pub async fn get_menu(&self, store: &Store) -> Result<Menu> {
        let request = Request::get("/ProductCatalog/GetStoreCatalog")
            .query("collectionOnly", !store.delivery_available)
            .query("menuVersion", &store.menu_version)
            .query("storeId", store.id);
        self.execute(&request).await?.json()
    }

    pub async fn get_basket(&self) -> Result<Basket> {
        self.execute(&Request::get("/CheckoutBasket/GetBasket")).await?.json()
    }

    /// Ingredients that can be put on `item` at the given size.
    #[tracing::instrument(skip(self, item, store), fields(item = item.id, store = store.id))]
    pub async fn get_available_ingredients(
        &self,
        item: &Item,
        variant: Variant,
        store: &Store,
    ) -> Result<IngredientList> {
        let request = Request::get("/PizzaCustomisation/PizzaViewModelBySize")
            .query("isoCode", "en-GB")
            .query("sizeId", variant as u8)
            .query("id", item.id)
            .query("storeId", store.id);
        self.execute(&request).await?.json()
    }

    /// Adds a pizza or a side. Other item kinds cannot be added and yield `None`.
    pub async fn add_item_to_basket(&self, item: &Item, variant: Variant, quantity: u32) -> Result<Option<Response>> {
        match item.kind {
            ItemKind::Pizza => self.add_pizza_to_basket(item, variant, quantity).await.map(Some),
            ItemKind::Side => self.add_side_to_basket(item, quantity).await.map(Some),
            ItemKind::Other => Ok(None),
        }
    }

    #[tracing::instrument(skip(self, item), fields(item = item.id))]
    pub async fn add_pizza_to_basket(&self, item: &Item, variant: Variant, quantity: u32) -> Result<Response> {
        let body = AddPizza {
            step_id: 0,
            quantity,
            size_id: variant as u8,
            product_id: item.id,
            ingredients: &item.ingredients,
            product_id_half_two: 0,
            ingredients_half_two: &[],
            recipe_referrer: 0,
        };
        self.execute(&Request::post("/Basket/AddPizza", &body)?).await
    }

    #[tracing::instrument(skip(self, item), fields(item = item.id))]
    pub async fn add_side_to_basket(&self, item: &Item, quantity: u32) -> Result<Response> {
        let sku = item.sku(Variant::Personal as usize)?;
        let body = AddProduct {
            product_sku_id: sku.product_sku_id,
            quantity,
            complimentary_items: Vec::new(),
        };
        self.execute(&Request::post("/Basket/AddProduct", &body)?).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn remove_item_from_basket(&self, basket_item_id: i64) -> Result<Response> {
        let body = RemoveItem {
            basket_item_id,
            wizard_item_delete: false,
        };
        self.execute(&Request::post("/Basket/RemoveBasketItem", &body)?).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn set_payment_method(&self, method: PaymentMethod) -> Result<Response> {
        let body = SelectPayment {
            payment_method: method as u8,
        };
        self.execute(&Request::post("/PaymentOptions/SetPaymentMethod", &body)?).await
    }

    /// Submits payment with the method selected earlier.
    #[tracing::instrument(skip(self))]
    pub async fn process_payment(&self) -> Result<Response> {
        self.execute_with_token(|token| {
            let body = Proceed {
                token,
                method: "submit",
            };
            Request::post("/PaymentOptions/Proceed", &body)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::error::Error;
    use crate::http::{MockTransport, Outgoing, RawResponse};
    use reqwest::header::{HeaderMap, HeaderValue, SET_COOKIE};
    use std::sync::{Arc, Mutex};

    type Sent = Arc<Mutex<Vec<Outgoing>>>;

    /// Answers the store reset with a token and every other path with `body`.
    fn remote(sent: &Sent, body: &'static str) -> MockTransport {
        let sent = Arc::clone(sent);
        let mut transport = MockTransport::new();
        transport.expect_send().returning(move |out| {
            let mut headers = HeaderMap::new();
            if out.url.path() == "/Store/Reset" {
                headers.append(SET_COOKIE, HeaderValue::from_static("XSRF-TOKEN=tok; path=/"));
            }
            sent.lock().unwrap().push(out);
            Ok(RawResponse {
                status: 200,
                headers,
                body: body.as_bytes().to_vec(),
            })
        });
        transport
    }

    async fn connected(sent: &Sent, body: &'static str) -> Client<MockTransport> {
        let client = Client::with_transport(remote(sent, body), ClientConfig::default()).unwrap();
        client.reset_store().await.unwrap();
        client
    }

    fn last_body(sent: &Sent) -> serde_json::Value {
        let out = sent.lock().unwrap().last().cloned().unwrap();
        serde_json::from_slice(out.body.as_deref().unwrap()).unwrap()
    }

    fn store(delivery: bool) -> Store {
        let mut store: Store =
            serde_json::from_value(serde_json::json!({"id": 28, "name": "Camden", "menuVersion": "637"})).unwrap();
        store.delivery_available = delivery;
        store
    }

    fn side() -> Item {
        let menu: Menu = serde_json::from_value(serde_json::json!([{"subcategories": [{"products": [
            {"productId": 2, "name": "Potato Wedges", "price": "3.49", "type": "Side",
             "productSkus": [{"productSkuId": 21}]},
            {"productId": 1, "name": "Margherita", "price": "9.99", "type": "Pizza",
             "productSkus": [{"productSkuId": 11, "ingredients": [5]}]},
            {"productId": 3, "name": "Cola", "price": "1.99", "type": "Drink", "productSkus": []}
        ]}]}]))
        .unwrap();
        menu.get(2).unwrap().clone()
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_stores_sends_search_text() {
        let sent = Sent::default();
        let client = Client::with_transport(
            remote(&sent, r#"{"localStore":{"id":1,"name":"A","menuVersion":"1"},"localStoreCanDeliverToAddress":true}"#),
            ClientConfig::default(),
        )
        .unwrap();

        let store = client.get_nearest_store("NW1 2AS").await.unwrap().unwrap();
        assert!(store.delivery_available);

        let out = sent.lock().unwrap()[0].clone();
        assert_eq!(out.url.path(), "/storefindermap/storesearch");
        assert_eq!(out.url.query(), Some("SearchText=NW1+2AS"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_menu_query_for_collection_only_store() {
        let sent = Sent::default();
        let client = Client::with_transport(remote(&sent, "[]"), ClientConfig::default()).unwrap();

        let menu = client.get_menu(&store(false)).await.unwrap();
        assert!(menu.is_empty());

        let out = sent.lock().unwrap()[0].clone();
        assert_eq!(out.url.query(), Some("collectionOnly=true&menuVersion=637&storeId=28"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_available_ingredients_query() {
        let sent = Sent::default();
        let client = Client::with_transport(
            remote(&sent, r#"{"halfOne": {"availableToppings": [{"id": 9, "name": "Ham"}]}}"#),
            ClientConfig::default(),
        )
        .unwrap();

        let list = client
            .get_available_ingredients(&side(), Variant::Small, &store(true))
            .await
            .unwrap();
        assert_eq!(list.get_by_name("ham").unwrap(), 9);

        let out = sent.lock().unwrap()[0].clone();
        assert_eq!(out.url.path(), "/PizzaCustomisation/PizzaViewModelBySize");
        assert_eq!(out.url.query(), Some("isoCode=en-GB&sizeId=1&id=2&storeId=28"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_basket_is_decode_error() {
        let sent = Sent::default();
        let client = Client::with_transport(remote(&sent, r#"{"items": []}"#), ClientConfig::default()).unwrap();
        let err = client.get_basket().await.unwrap_err();
        assert!(matches!(err, Error::Decode { ref endpoint, .. } if endpoint == "/CheckoutBasket/GetBasket"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_delivery_system_body() {
        let sent = Sent::default();
        let client = connected(&sent, "{}").await;
        client
            .set_delivery_system(&store(true), "NW1 2AS", FulfilmentMethod::Collection)
            .await
            .unwrap();

        assert_eq!(
            last_body(&sent),
            serde_json::json!({"fulfilmentMethod": "collection", "postcode": "NW1 2AS", "storeid": 28})
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_add_item_dispatches_by_kind() {
        let sent = Sent::default();
        let client = connected(&sent, "{}").await;

        let wedges = side();
        assert!(client.add_item_to_basket(&wedges, Variant::Large, 2).await.unwrap().is_some());
        assert_eq!(
            last_body(&sent),
            serde_json::json!({"productSkuId": 21, "quantity": 2, "ComplimentaryItems": []})
        );

        let mut other = wedges.clone();
        other.kind = ItemKind::Other;
        let before = sent.lock().unwrap().len();
        assert!(client.add_item_to_basket(&other, Variant::Large, 1).await.unwrap().is_none());
        assert_eq!(sent.lock().unwrap().len(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_add_pizza_body() {
        let sent = Sent::default();
        let client = connected(&sent, "{}").await;

        let mut pizza = side();
        pizza.kind = ItemKind::Pizza;
        pizza.id = 1;
        pizza.ingredients = vec![36, 42, 5];
        client.add_item_to_basket(&pizza, Variant::Large, 1).await.unwrap();

        let out = sent.lock().unwrap().last().cloned().unwrap();
        assert_eq!(out.url.path(), "/Basket/AddPizza");
        assert_eq!(
            last_body(&sent),
            serde_json::json!({
                "stepId": 0, "quantity": 1, "sizeId": 3, "productId": 1,
                "ingredients": [36, 42, 5], "productIdHalfTwo": 0,
                "ingredientsHalfTwo": [], "recipeReferrer": 0
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_and_payment_bodies() {
        let sent = Sent::default();
        let client = connected(&sent, "{}").await;

        client.remove_item_from_basket(5).await.unwrap();
        assert_eq!(last_body(&sent), serde_json::json!({"basketItemId": 5, "wizardItemDelete": false}));

        client.set_payment_method(PaymentMethod::VisaCheckout).await.unwrap();
        assert_eq!(last_body(&sent), serde_json::json!({"paymentMethod": 4}));

        client.process_payment().await.unwrap();
        assert_eq!(
            last_body(&sent),
            serde_json::json!({"__RequestVerificationToken": "tok", "method": "submit"})
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_mutations_before_store_reset_fail_without_dispatch() {
        let sent = Sent::default();
        let client = Client::with_transport(remote(&sent, "{}"), ClientConfig::default()).unwrap();

        assert!(matches!(client.remove_item_from_basket(1).await, Err(Error::Session(_))));
        assert!(matches!(client.process_payment().await, Err(Error::Session(_))));
        assert!(sent.lock().unwrap().is_empty());
    }
}
