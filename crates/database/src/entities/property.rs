//! Property listing entity definitions

use serde::{Deserialize, Serialize};

text_enum! {
    PropertyType {
        House => "house",
        Apartment => "apartment",
        Condo => "condo",
        Townhouse => "townhouse",
        Land => "land",
        Commercial => "commercial",
    }
}

text_enum! {
    ListingType {
        Sale => "sale",
        Rent => "rent",
    }
}

text_enum! {
    PropertyStatus {
        Draft => "draft",
        Available => "available",
        Pending => "pending",
        Sold => "sold",
        Rented => "rented",
        Archived => "archived",
    }
}

impl PropertyStatus {
    /// Statuses shown on the public site.
    pub const PUBLIC: &'static [PropertyStatus] = &[PropertyStatus::Available, PropertyStatus::Pending];

    pub fn is_public(&self) -> bool {
        Self::PUBLIC.contains(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub id: i64,
    pub public_id: String,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub property_type: PropertyType,
    pub listing_type: ListingType,
    pub status: PropertyStatus,
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
    pub agent_id: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

impl Property {
    /// First image, used as the listing card cover.
    pub fn cover_image(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePropertyRequest {
    pub title: String,
    pub slug: String,
    pub description: String,
    pub property_type: PropertyType,
    pub listing_type: ListingType,
    pub status: PropertyStatus,
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
    pub agent_id: Option<i64>,
}

/// Partial update; `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePropertyRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub property_type: Option<PropertyType>,
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
    pub agent_id: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PropertyFilter {
    pub city: Option<String>,
    pub listing_type: Option<ListingType>,
    pub property_type: Option<PropertyType>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub min_bedrooms: Option<i64>,
    pub featured: Option<bool>,
    /// Empty means any status.
    pub statuses: Vec<PropertyStatus>,
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
