//! `/api/computer-items`

use std::sync::Arc;

use serde_json::{json, Value};

use super::JsonBody;
use crate::dispatcher::HandlerRequest;
use crate::error::ApiError;
use crate::store::{parse_int_prefix, Catalog, ItemFilter};
use crate::typed::{Handler, Json, TypedHandlerRequest};

type Reply = Result<Json<Value>, ApiError>;

impl TryFrom<HandlerRequest> for ItemFilter {
    type Error = ApiError;

    fn try_from(req: HandlerRequest) -> Result<Self, ApiError> {
        let param = |name: &str| req.get_query_param(name).map(str::to_string);
        Ok(ItemFilter {
            category: param("category"),
            brand: param("brand"),
            in_stock: param("inStock"),
            min_price: param("minPrice"),
            max_price: param("maxPrice"),
        })
    }
}

/// Item id read from the leading integer of the `{id}` segment, so `2abc`
/// and `2.9` both address item 2. Anything without one finds nothing.
#[derive(Debug, Clone)]
pub struct ItemId(pub Option<u64>);

impl TryFrom<HandlerRequest> for ItemId {
    type Error = ApiError;

    fn try_from(req: HandlerRequest) -> Result<Self, ApiError> {
        Ok(ItemId(item_id(&req)))
    }
}

/// Target id and body of a `PUT`.
#[derive(Debug, Clone)]
pub struct ItemPatch {
    pub id: Option<u64>,
    pub body: Value,
}

impl TryFrom<HandlerRequest> for ItemPatch {
    type Error = ApiError;

    fn try_from(req: HandlerRequest) -> Result<Self, ApiError> {
        let id = item_id(&req);
        let JsonBody(body) = JsonBody::try_from(req)?;
        Ok(ItemPatch { id, body })
    }
}

fn item_id(req: &HandlerRequest) -> Option<u64> {
    req.get_path_param("id")
        .and_then(parse_int_prefix)
        .and_then(|id| u64::try_from(id).ok())
}

fn not_found() -> ApiError {
    ApiError::not_found("Computer item not found")
}

/// `GET /api/computer-items`
pub struct ListItems {
    pub catalog: Arc<Catalog>,
}

impl Handler for ListItems {
    type Request = ItemFilter;
    type Response = Reply;

    fn handle(&self, req: TypedHandlerRequest<ItemFilter>) -> Reply {
        let items = self.catalog.list(&req.data);
        Ok(Json::ok(json!({
            "success": true,
            "count": items.len(),
            "data": items,
        })))
    }
}

/// `GET /api/computer-items/{id}`
pub struct GetItem {
    pub catalog: Arc<Catalog>,
}

impl Handler for GetItem {
    type Request = ItemId;
    type Response = Reply;

    fn handle(&self, req: TypedHandlerRequest<ItemId>) -> Reply {
        let id = req.data.0.ok_or_else(not_found)?;
        let item = self.catalog.get(id)?;
        Ok(Json::ok(json!({"success": true, "data": item})))
    }
}

/// `POST /api/computer-items`
pub struct CreateItem {
    pub catalog: Arc<Catalog>,
}

impl Handler for CreateItem {
    type Request = JsonBody;
    type Response = Reply;

    fn handle(&self, req: TypedHandlerRequest<JsonBody>) -> Reply {
        let item = self.catalog.create(&req.data.0)?;
        tracing::info!(request_id = %req.request_id, item_id = item.id, "Computer item created");
        Ok(Json::created(json!({
            "success": true,
            "message": "Computer item created successfully",
            "data": item,
        })))
    }
}

/// `PUT /api/computer-items/{id}`
pub struct UpdateItem {
    pub catalog: Arc<Catalog>,
}

impl Handler for UpdateItem {
    type Request = ItemPatch;
    type Response = Reply;

    fn handle(&self, req: TypedHandlerRequest<ItemPatch>) -> Reply {
        let id = req.data.id.ok_or_else(not_found)?;
        let item = self.catalog.update(id, &req.data.body)?;
        Ok(Json::ok(json!({
            "success": true,
            "message": "Computer item updated successfully",
            "data": item,
        })))
    }
}

/// `DELETE /api/computer-items/{id}`
pub struct DeleteItem {
    pub catalog: Arc<Catalog>,
}

impl Handler for DeleteItem {
    type Request = ItemId;
    type Response = Reply;

    fn handle(&self, req: TypedHandlerRequest<ItemId>) -> Reply {
        let id = req.data.0.ok_or_else(not_found)?;
        let item = self.catalog.delete(id)?;
        tracing::info!(request_id = %req.request_id, item_id = id, "Computer item deleted");
        Ok(Json::ok(json!({
            "success": true,
            "message": "Computer item deleted successfully",
            "data": item,
        })))
    }
}
