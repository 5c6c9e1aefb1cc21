//! Property listing endpoints, public and dashboard

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::{get, put},
    Extension, Json, Router,
};
use realty_catalog::{NewProperty, Visibility};
use realty_database::{
    ListingType, Page, Property, PropertyFilter, PropertyStatus, PropertyType, UpdatePropertyRequest,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::{IntoParams, ToSchema};

use crate::error::GatewayResult;
use crate::middleware::CurrentUser;
use crate::rest::ActionResponse;
use crate::state::GatewayState;

#[derive(Debug, Serialize, ToSchema)]
pub struct PropertyResponse {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub property_type: String,
    pub listing_type: String,
    pub status: String,
    pub price: i64,
    pub currency: String,
    pub bedrooms: i64,
    pub bathrooms: f64,
    pub area_sqm: Option<f64>,
    pub address: Option<String>,
    pub city: String,
    pub region: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub features: Vec<String>,
    pub images: Vec<String>,
    pub featured: bool,
    /// Public id of the listing agent. Only shown on the dashboard.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl PropertyResponse {
    fn new(property: Property, agent_id: Option<String>) -> Self {
        Self {
            id: property.public_id,
            title: property.title,
            slug: property.slug,
            description: property.description,
            property_type: property.property_type.to_string(),
            listing_type: property.listing_type.to_string(),
            status: property.status.to_string(),
            price: property.price,
            currency: property.currency,
            bedrooms: property.bedrooms,
            bathrooms: property.bathrooms,
            area_sqm: property.area_sqm,
            address: property.address,
            city: property.city,
            region: property.region,
            postal_code: property.postal_code,
            country: property.country,
            latitude: property.latitude,
            longitude: property.longitude,
            features: property.features,
            images: property.images,
            featured: property.featured,
            agent_id,
            created_at: property.created_at,
            updated_at: property.updated_at,
        }
    }

    fn public(property: Property) -> Self {
        Self::new(property, None)
    }

    fn with_directory(property: Property, directory: &HashMap<i64, String>) -> Self {
        let agent = property.agent_id.and_then(|id| directory.get(&id).cloned());
        Self::new(property, agent)
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PropertyListResponse {
    pub items: Vec<PropertyResponse>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

impl PropertyListResponse {
    fn from_page(page: Page<Property>, convert: impl FnMut(Property) -> PropertyResponse) -> Self {
        let page = page.map(convert);
        Self {
            items: page.items,
            total: page.total,
            limit: page.limit,
            offset: page.offset,
        }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PropertyQuery {
    pub city: Option<String>,
    /// sale or rent
    #[param(value_type = Option<String>)]
    pub listing_type: Option<ListingType>,
    /// house, apartment, condo, townhouse, land or commercial
    #[param(value_type = Option<String>)]
    pub property_type: Option<PropertyType>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub min_bedrooms: Option<i64>,
    pub featured: Option<bool>,
    /// The public listing never widens past available and pending.
    #[param(value_type = Option<String>)]
    pub status: Option<PropertyStatus>,
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl From<PropertyQuery> for PropertyFilter {
    fn from(query: PropertyQuery) -> Self {
        PropertyFilter {
            city: query.city,
            listing_type: query.listing_type,
            property_type: query.property_type,
            min_price: query.min_price,
            max_price: query.max_price,
            min_bedrooms: query.min_bedrooms,
            featured: query.featured,
            statuses: query.status.into_iter().collect(),
            search: query.search,
            limit: query.limit,
            offset: query.offset,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreatePropertyRequest {
    pub title: String,
    pub slug: Option<String>,
    #[serde(default)]
    pub description: String,
    #[schema(value_type = String)]
    pub property_type: PropertyType,
    #[schema(value_type = String)]
    pub listing_type: ListingType,
    /// Defaults to draft.
    #[schema(value_type = Option<String>)]
    pub status: Option<PropertyStatus>,
    pub price: i64,
    pub currency: Option<String>,
    #[serde(default)]
    pub bedrooms: i64,
    #[serde(default)]
    pub bathrooms: f64,
    pub area_sqm: Option<f64>,
    pub address: Option<String>,
    pub city: String,
    pub region: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub featured: bool,
    /// Public id of the listing agent.
    pub agent_id: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdatePropertyBody {
    pub title: Option<String>,
    pub description: Option<String>,
    #[schema(value_type = Option<String>)]
    pub property_type: Option<PropertyType>,
    #[schema(value_type = Option<String>)]
    pub listing_type: Option<ListingType>,
    pub price: Option<i64>,
    pub currency: Option<String>,
    pub bedrooms: Option<i64>,
    pub bathrooms: Option<f64>,
    pub area_sqm: Option<f64>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub features: Option<Vec<String>>,
    pub images: Option<Vec<String>>,
    pub agent_id: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PropertyStatusRequest {
    #[schema(value_type = String)]
    pub status: PropertyStatus,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PropertyFeaturedRequest {
    pub featured: bool,
}

pub fn create_public_routes() -> Router<Arc<GatewayState>> {
    Router::new()
        .route("/api/properties", get(list_public_properties))
        .route("/api/properties/:slug", get(get_public_property))
}

pub fn create_dashboard_routes() -> Router<Arc<GatewayState>> {
    Router::new()
        .route(
            "/api/dashboard/properties",
            get(list_properties).post(create_property),
        )
        .route(
            "/api/dashboard/properties/:id",
            get(get_property).put(update_property).delete(delete_property),
        )
        .route("/api/dashboard/properties/:id/status", put(set_property_status))
        .route("/api/dashboard/properties/:id/featured", put(set_property_featured))
}

#[utoipa::path(
    get,
    path = "/api/properties",
    tag = "Properties",
    params(PropertyQuery),
    responses(
        (status = 200, description = "Listings visible on the public site", body = PropertyListResponse),
        (status = 400, description = "Invalid filter", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_public_properties(
    State(state): State<Arc<GatewayState>>,
    Query(query): Query<PropertyQuery>,
) -> GatewayResult<Json<PropertyListResponse>> {
    let page = state.properties.search(query.into(), Visibility::Public).await?;
    Ok(Json(PropertyListResponse::from_page(page, PropertyResponse::public)))
}

#[utoipa::path(
    get,
    path = "/api/properties/{slug}",
    tag = "Properties",
    params(("slug" = String, Path, description = "Listing slug")),
    responses(
        (status = 200, description = "A public listing", body = PropertyResponse),
        (status = 404, description = "No such public listing", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_public_property(
    State(state): State<Arc<GatewayState>>,
    Path(slug): Path<String>,
) -> GatewayResult<Json<PropertyResponse>> {
    let property = state.properties.get_by_slug(&slug, Visibility::Public).await?;
    Ok(Json(PropertyResponse::public(property)))
}

#[utoipa::path(
    get,
    path = "/api/dashboard/properties",
    tag = "Dashboard Properties",
    security(("bearerAuth" = [])),
    params(PropertyQuery),
    responses(
        (status = 200, description = "All listings", body = PropertyListResponse),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse),
        (status = 403, description = "Not allowed", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_properties(
    State(state): State<Arc<GatewayState>>,
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<PropertyQuery>,
) -> GatewayResult<Json<PropertyListResponse>> {
    current.require_listing_access()?;

    let page = state.properties.search(query.into(), Visibility::All).await?;
    let directory = state.user_directory().await?;
    Ok(Json(PropertyListResponse::from_page(page, |p| {
        PropertyResponse::with_directory(p, &directory)
    })))
}

#[utoipa::path(
    post,
    path = "/api/dashboard/properties",
    tag = "Dashboard Properties",
    security(("bearerAuth" = [])),
    request_body = CreatePropertyRequest,
    responses(
        (status = 200, description = "Listing created", body = PropertyResponse),
        (status = 400, description = "Invalid listing", body = crate::error::ErrorResponse),
        (status = 403, description = "Not allowed", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_property(
    State(state): State<Arc<GatewayState>>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<CreatePropertyRequest>,
) -> GatewayResult<Json<PropertyResponse>> {
    let user = current.require_listing_access()?;

    let agent_id = match req.agent_id.as_deref() {
        Some(public_id) => Some(state.user_row_id(public_id).await?),
        None => None,
    };

    let property = state
        .properties
        .create(NewProperty {
            title: req.title,
            slug: req.slug,
            description: req.description,
            property_type: req.property_type,
            listing_type: req.listing_type,
            status: req.status,
            price: req.price,
            currency: req.currency,
            bedrooms: req.bedrooms,
            bathrooms: req.bathrooms,
            area_sqm: req.area_sqm,
            address: req.address,
            city: req.city,
            region: req.region,
            postal_code: req.postal_code,
            country: req.country,
            latitude: req.latitude,
            longitude: req.longitude,
            features: req.features,
            images: req.images,
            featured: req.featured,
            agent_id,
        })
        .await?;

    info!(user = %user.public_id, property = %property.public_id, "listing created from dashboard");
    let agent = req.agent_id;
    Ok(Json(PropertyResponse::new(property, agent)))
}

#[utoipa::path(
    get,
    path = "/api/dashboard/properties/{id}",
    tag = "Dashboard Properties",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "Property public ID")),
    responses(
        (status = 200, description = "The listing", body = PropertyResponse),
        (status = 404, description = "Property not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_property(
    State(state): State<Arc<GatewayState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> GatewayResult<Json<PropertyResponse>> {
    current.require_listing_access()?;

    let property = state.properties.get(&id, Visibility::All).await?;
    let directory = state.user_directory().await?;
    Ok(Json(PropertyResponse::with_directory(property, &directory)))
}

#[utoipa::path(
    put,
    path = "/api/dashboard/properties/{id}",
    tag = "Dashboard Properties",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "Property public ID")),
    request_body = UpdatePropertyBody,
    responses(
        (status = 200, description = "Listing updated", body = PropertyResponse),
        (status = 400, description = "Invalid update", body = crate::error::ErrorResponse),
        (status = 404, description = "Property not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_property(
    State(state): State<Arc<GatewayState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(req): Json<UpdatePropertyBody>,
) -> GatewayResult<Json<PropertyResponse>> {
    current.require_listing_access()?;

    let agent_id = match req.agent_id.as_deref() {
        Some(public_id) => Some(state.user_row_id(public_id).await?),
        None => None,
    };

    let property = state
        .properties
        .update(
            &id,
            UpdatePropertyRequest {
                title: req.title,
                description: req.description,
                property_type: req.property_type,
                listing_type: req.listing_type,
                price: req.price,
                currency: req.currency,
                bedrooms: req.bedrooms,
                bathrooms: req.bathrooms,
                area_sqm: req.area_sqm,
                address: req.address,
                city: req.city,
                region: req.region,
                postal_code: req.postal_code,
                country: req.country,
                latitude: req.latitude,
                longitude: req.longitude,
                features: req.features,
                images: req.images,
                agent_id,
            },
        )
        .await?;

    let directory = state.user_directory().await?;
    Ok(Json(PropertyResponse::with_directory(property, &directory)))
}

#[utoipa::path(
    delete,
    path = "/api/dashboard/properties/{id}",
    tag = "Dashboard Properties",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "Property public ID")),
    responses(
        (status = 200, description = "Listing deleted", body = ActionResponse),
        (status = 404, description = "Property not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_property(
    State(state): State<Arc<GatewayState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> GatewayResult<Json<ActionResponse>> {
    current.require_listing_access()?;
    state.properties.delete(&id).await?;
    Ok(Json(ActionResponse::ok()))
}

#[utoipa::path(
    put,
    path = "/api/dashboard/properties/{id}/status",
    tag = "Dashboard Properties",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "Property public ID")),
    request_body = PropertyStatusRequest,
    responses(
        (status = 200, description = "Status changed", body = PropertyResponse),
        (status = 404, description = "Property not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn set_property_status(
    State(state): State<Arc<GatewayState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(req): Json<PropertyStatusRequest>,
) -> GatewayResult<Json<PropertyResponse>> {
    current.require_listing_access()?;

    let property = state.properties.set_status(&id, req.status).await?;
    let directory = state.user_directory().await?;
    Ok(Json(PropertyResponse::with_directory(property, &directory)))
}

#[utoipa::path(
    put,
    path = "/api/dashboard/properties/{id}/featured",
    tag = "Dashboard Properties",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "Property public ID")),
    request_body = PropertyFeaturedRequest,
    responses(
        (status = 200, description = "Featured flag changed", body = PropertyResponse),
        (status = 404, description = "Property not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn set_property_featured(
    State(state): State<Arc<GatewayState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(req): Json<PropertyFeaturedRequest>,
) -> GatewayResult<Json<PropertyResponse>> {
    current.require_listing_access()?;

    let property = state.properties.set_featured(&id, req.featured).await?;
    let directory = state.user_directory().await?;
    Ok(Json(PropertyResponse::with_directory(property, &directory)))
}
