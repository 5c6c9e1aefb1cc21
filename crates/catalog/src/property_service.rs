//! Property listing management.

use realty_assistant::ListingSummary;
use realty_database::{
    CreatePropertyRequest, DatabaseError, ListingType, Page, Property, PropertyFilter,
    PropertyRepository, PropertyStatus, PropertyType, UpdatePropertyRequest,
};
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::info;

use crate::error::{CatalogError, CatalogResult};
use crate::slug::{candidate, slugify};

const MAX_SLUG_ATTEMPTS: u32 = 100;

/// Who is asking. The public site never sees drafts, sold or archived listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    All,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewProperty {
    pub title: String,
    /// Derived from the title when absent.
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: String,
    pub property_type: PropertyType,
    pub listing_type: ListingType,
    #[serde(default)]
    pub status: Option<PropertyStatus>,
    pub price: i64,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub bedrooms: i64,
    #[serde(default)]
    pub bathrooms: f64,
    #[serde(default)]
    pub area_sqm: Option<f64>,
    #[serde(default)]
    pub address: Option<String>,
    pub city: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub agent_id: Option<i64>,
}

fn validate_numbers(price: Option<i64>, bedrooms: Option<i64>, bathrooms: Option<f64>) -> CatalogResult<()> {
    if price.is_some_and(|p| p < 0) {
        return Err(CatalogError::validation("price must not be negative"));
    }
    if bedrooms.is_some_and(|b| b < 0) {
        return Err(CatalogError::validation("bedrooms must not be negative"));
    }
    if bathrooms.is_some_and(|b| b < 0.0 || !b.is_finite()) {
        return Err(CatalogError::validation("bathrooms must not be negative"));
    }
    Ok(())
}

fn clean_list(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .collect()
}

#[derive(Clone)]
pub struct PropertyService {
    properties: PropertyRepository,
}

impl PropertyService {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            properties: PropertyRepository::new(pool),
        }
    }

    pub async fn create(&self, new: NewProperty) -> CatalogResult<Property> {
        let title = new.title.trim().to_string();
        if title.is_empty() {
            return Err(CatalogError::validation("title is required"));
        }
        let city = new.city.trim().to_string();
        if city.is_empty() {
            return Err(CatalogError::validation("city is required"));
        }
        validate_numbers(Some(new.price), Some(new.bedrooms), Some(new.bathrooms))?;

        let base = slugify(new.slug.as_deref().unwrap_or(&title));
        if base.is_empty() {
            return Err(CatalogError::validation("title must contain letters or digits"));
        }

        let mut request = CreatePropertyRequest {
            title,
            slug: String::new(),
            description: new.description.trim().to_string(),
            property_type: new.property_type,
            listing_type: new.listing_type,
            status: new.status.unwrap_or(PropertyStatus::Draft),
            price: new.price,
            currency: new
                .currency
                .map(|c| c.trim().to_uppercase())
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| "USD".to_string()),
            bedrooms: new.bedrooms,
            bathrooms: new.bathrooms,
            area_sqm: new.area_sqm,
            address: new.address,
            city,
            region: new.region,
            postal_code: new.postal_code,
            country: new.country,
            latitude: new.latitude,
            longitude: new.longitude,
            features: clean_list(new.features),
            images: clean_list(new.images),
            featured: new.featured,
            agent_id: new.agent_id,
        };

        for attempt in 1..=MAX_SLUG_ATTEMPTS {
            let slug = candidate(&base, attempt);
            if self.properties.slug_exists(&slug).await? {
                continue;
            }
            request.slug = slug;
            match self.properties.create(&request).await {
                Ok(property) => return Ok(property),
                // Lost a race for the slug; try the next suffix.
                Err(DatabaseError::Duplicate(_)) => continue,
                Err(err) => return Err(err.into()),
            }
        }

        Err(CatalogError::validation(format!("no free slug for '{base}'")))
    }

    pub async fn update(&self, public_id: &str, update: UpdatePropertyRequest) -> CatalogResult<Property> {
        let property = self.get(public_id, Visibility::All).await?;
        if update.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(CatalogError::validation("title is required"));
        }
        if update.city.as_deref().is_some_and(|c| c.trim().is_empty()) {
            return Err(CatalogError::validation("city is required"));
        }
        validate_numbers(update.price, update.bedrooms, update.bathrooms)?;

        let update = UpdatePropertyRequest {
            features: update.features.map(clean_list),
            images: update.images.map(clean_list),
            ..update
        };
        Ok(self.properties.update(property.id, &update).await?)
    }

    pub async fn set_status(&self, public_id: &str, status: PropertyStatus) -> CatalogResult<Property> {
        let mut property = self.get(public_id, Visibility::All).await?;
        self.properties.set_status(property.id, status).await?;
        info!(property = %property.public_id, from = %property.status, to = %status, "property status changed");
        property.status = status;
        Ok(property)
    }

    pub async fn set_featured(&self, public_id: &str, featured: bool) -> CatalogResult<Property> {
        let mut property = self.get(public_id, Visibility::All).await?;
        self.properties.set_featured(property.id, featured).await?;
        property.featured = featured;
        Ok(property)
    }

    pub async fn delete(&self, public_id: &str) -> CatalogResult<()> {
        let property = self.get(public_id, Visibility::All).await?;
        self.properties.delete(property.id).await?;
        info!(property = %property.public_id, "deleted property");
        Ok(())
    }

    pub async fn get(&self, public_id: &str, visibility: Visibility) -> CatalogResult<Property> {
        self.properties
            .find_by_public_id(public_id)
            .await?
            .filter(|p| visibility == Visibility::All || p.status.is_public())
            .ok_or_else(|| CatalogError::not_found("property"))
    }

    pub async fn find_by_id(&self, id: i64) -> CatalogResult<Option<Property>> {
        Ok(self.properties.find_by_id(id).await?)
    }

    pub async fn get_by_slug(&self, slug: &str, visibility: Visibility) -> CatalogResult<Property> {
        self.properties
            .find_by_slug(slug)
            .await?
            .filter(|p| visibility == Visibility::All || p.status.is_public())
            .ok_or_else(|| CatalogError::not_found("property"))
    }

    pub async fn search(&self, mut filter: PropertyFilter, visibility: Visibility) -> CatalogResult<Page<Property>> {
        if visibility == Visibility::Public {
            if filter.statuses.is_empty() {
                filter.statuses = PropertyStatus::PUBLIC.to_vec();
            } else {
                filter.statuses.retain(PropertyStatus::is_public);
                if filter.statuses.is_empty() {
                    let (limit, offset) = realty_database::page_bounds(filter.limit, filter.offset);
                    return Ok(Page {
                        items: Vec::new(),
                        total: 0,
                        limit,
                        offset,
                    });
                }
            }
        }
        Ok(self.properties.search(&filter).await?)
    }

    /// Public listings condensed for the assistant's context.
    pub async fn listing_summaries(&self, limit: i64) -> CatalogResult<Vec<ListingSummary>> {
        let page = self
            .search(
                PropertyFilter {
                    limit: Some(limit),
                    ..Default::default()
                },
                Visibility::Public,
            )
            .await?;

        Ok(page
            .items
            .into_iter()
            .map(|p| ListingSummary {
                public_id: p.public_id,
                slug: p.slug,
                title: p.title,
                city: p.city,
                property_type: p.property_type.to_string(),
                listing_type: p.listing_type.to_string(),
                price: p.price,
                currency: p.currency,
                bedrooms: p.bedrooms,
                bathrooms: p.bathrooms,
                featured: p.featured,
            })
            .collect())
    }

    pub async fn count_by_status(&self) -> CatalogResult<Vec<(PropertyStatus, i64)>> {
        Ok(self.properties.count_by_status().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::create_test_database;

    fn new_property(title: &str, status: PropertyStatus) -> NewProperty {
        NewProperty {
            title: title.to_string(),
            slug: None,
            description: "Bright and quiet".to_string(),
            property_type: PropertyType::House,
            listing_type: ListingType::Sale,
            status: Some(status),
            price: 450_000,
            currency: Some("usd".to_string()),
            bedrooms: 3,
            bathrooms: 2.0,
            area_sqm: Some(140.0),
            address: None,
            city: "Austin".to_string(),
            region: None,
            postal_code: None,
            country: None,
            latitude: None,
            longitude: None,
            features: vec![" garden ".to_string(), "".to_string()],
            images: vec![],
            featured: false,
            agent_id: None,
        }
    }

    #[tokio::test]
    async fn create_generates_unique_slugs() {
        let (pool, _dir) = create_test_database().await;
        let service = PropertyService::new(pool);

        let first = service.create(new_property("Oak Street House", PropertyStatus::Available)).await.unwrap();
        let second = service.create(new_property("Oak Street House", PropertyStatus::Available)).await.unwrap();
        let third = service.create(new_property("Oak  Street  House!", PropertyStatus::Draft)).await.unwrap();

        assert_eq!(first.slug, "oak-street-house");
        assert_eq!(second.slug, "oak-street-house-2");
        assert_eq!(third.slug, "oak-street-house-3");
        assert_eq!(first.currency, "USD");
        assert_eq!(first.features, vec!["garden".to_string()]);
    }

    #[tokio::test]
    async fn create_rejects_invalid_input() {
        let (pool, _dir) = create_test_database().await;
        let service = PropertyService::new(pool);

        let mut negative = new_property("Cheap", PropertyStatus::Draft);
        negative.price = -1;
        assert!(matches!(service.create(negative).await, Err(CatalogError::Validation(_))));

        let blank = new_property("   ", PropertyStatus::Draft);
        assert!(matches!(service.create(blank).await, Err(CatalogError::Validation(_))));

        let symbols = new_property("???", PropertyStatus::Draft);
        assert!(matches!(service.create(symbols).await, Err(CatalogError::Validation(_))));
    }

    #[tokio::test]
    async fn public_visibility_hides_unlisted_statuses() {
        let (pool, _dir) = create_test_database().await;
        let service = PropertyService::new(pool);

        service.create(new_property("Listed", PropertyStatus::Available)).await.unwrap();
        service.create(new_property("Under Offer", PropertyStatus::Pending)).await.unwrap();
        let draft = service.create(new_property("Draft", PropertyStatus::Draft)).await.unwrap();
        service.create(new_property("Gone", PropertyStatus::Sold)).await.unwrap();

        let public = service.search(PropertyFilter::default(), Visibility::Public).await.unwrap();
        assert_eq!(public.total, 2);

        let everything = service.search(PropertyFilter::default(), Visibility::All).await.unwrap();
        assert_eq!(everything.total, 4);

        let sold_only = PropertyFilter {
            statuses: vec![PropertyStatus::Sold],
            ..Default::default()
        };
        assert_eq!(service.search(sold_only, Visibility::Public).await.unwrap().total, 0);

        assert!(matches!(
            service.get_by_slug(&draft.slug, Visibility::Public).await,
            Err(CatalogError::NotFound(_))
        ));
        assert!(service.get_by_slug(&draft.slug, Visibility::All).await.is_ok());
    }

    #[tokio::test]
    async fn status_and_featured_updates() {
        let (pool, _dir) = create_test_database().await;
        let service = PropertyService::new(pool);

        let property = service.create(new_property("Corner Lot", PropertyStatus::Draft)).await.unwrap();
        assert!(matches!(
            service.get(&property.public_id, Visibility::Public).await,
            Err(CatalogError::NotFound(_))
        ));
        let listed = service.set_status(&property.public_id, PropertyStatus::Available).await.unwrap();
        assert_eq!(listed.status, PropertyStatus::Available);
        assert_eq!(service.get(&property.public_id, Visibility::Public).await.unwrap().id, property.id);

        service.set_featured(&property.public_id, true).await.unwrap();
        let stored = service.get(&property.public_id, Visibility::All).await.unwrap();
        assert!(stored.featured);

        let updated = service
            .update(
                &property.public_id,
                UpdatePropertyRequest {
                    price: Some(399_000),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.price, 399_000);
        assert_eq!(updated.slug, property.slug);

        let summaries = service.listing_summaries(10).await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].listing_type, "sale");
        assert_eq!(summaries[0].property_type, "house");

        service.delete(&property.public_id).await.unwrap();
        assert!(matches!(service.get(&property.public_id, Visibility::All).await, Err(CatalogError::NotFound(_))));
    }
}
