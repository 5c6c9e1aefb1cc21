//! Repository for property listings.

use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, Sqlite, SqlitePool};
use tracing::info;

use crate::entities::{
    CreatePropertyRequest, Property, PropertyFilter, PropertyStatus, UpdatePropertyRequest,
};
use crate::time::now_timestamp;
use crate::types::{page_bounds, DatabaseError, DatabaseResult, Page};

const PROPERTY_COLUMNS: &str = "id, public_id, title, slug, description, property_type, listing_type, \
     status, price, currency, bedrooms, bathrooms, area_sqm, address, city, region, postal_code, \
     country, latitude, longitude, features, images, featured, agent_id, created_at, updated_at";

#[derive(Clone)]
pub struct PropertyRepository {
    pool: SqlitePool,
}

fn map_property(row: &SqliteRow) -> DatabaseResult<Property> {
    let property_type: String = row.try_get("property_type")?;
    let listing_type: String = row.try_get("listing_type")?;
    let status: String = row.try_get("status")?;
    let features: String = row.try_get("features")?;
    let images: String = row.try_get("images")?;

    Ok(Property {
        id: row.try_get("id")?,
        public_id: row.try_get("public_id")?,
        title: row.try_get("title")?,
        slug: row.try_get("slug")?,
        description: row.try_get("description")?,
        property_type: property_type.parse()?,
        listing_type: listing_type.parse()?,
        status: status.parse()?,
        price: row.try_get("price")?,
        currency: row.try_get("currency")?,
        bedrooms: row.try_get("bedrooms")?,
        bathrooms: row.try_get("bathrooms")?,
        area_sqm: row.try_get("area_sqm")?,
        address: row.try_get("address")?,
        city: row.try_get("city")?,
        region: row.try_get("region")?,
        postal_code: row.try_get("postal_code")?,
        country: row.try_get("country")?,
        latitude: row.try_get("latitude")?,
        longitude: row.try_get("longitude")?,
        features: serde_json::from_str(&features)?,
        images: serde_json::from_str(&images)?,
        featured: row.try_get("featured")?,
        agent_id: row.try_get("agent_id")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, filter: &PropertyFilter) {
    qb.push(" WHERE 1 = 1");

    if let Some(city) = filter.city.as_ref().filter(|c| !c.trim().is_empty()) {
        qb.push(" AND city = ").push_bind(city.trim().to_string()).push(" COLLATE NOCASE");
    }
    if let Some(listing_type) = filter.listing_type {
        qb.push(" AND listing_type = ").push_bind(listing_type.as_str());
    }
    if let Some(property_type) = filter.property_type {
        qb.push(" AND property_type = ").push_bind(property_type.as_str());
    }
    if let Some(min_price) = filter.min_price {
        qb.push(" AND price >= ").push_bind(min_price);
    }
    if let Some(max_price) = filter.max_price {
        qb.push(" AND price <= ").push_bind(max_price);
    }
    if let Some(min_bedrooms) = filter.min_bedrooms {
        qb.push(" AND bedrooms >= ").push_bind(min_bedrooms);
    }
    if let Some(featured) = filter.featured {
        qb.push(" AND featured = ").push_bind(featured);
    }
    if !filter.statuses.is_empty() {
        qb.push(" AND status IN (");
        let mut separated = qb.separated(", ");
        for status in &filter.statuses {
            separated.push_bind(status.as_str());
        }
        separated.push_unseparated(")");
    }
    if let Some(search) = filter.search.as_ref().filter(|s| !s.trim().is_empty()) {
        let pattern = format!("%{}%", search.trim());
        qb.push(" AND (title LIKE ")
            .push_bind(pattern.clone())
            .push(" OR description LIKE ")
            .push_bind(pattern.clone())
            .push(" OR city LIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

impl PropertyRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, request: &CreatePropertyRequest) -> DatabaseResult<Property> {
        let public_id = cuid2::cuid();
        let now = now_timestamp();

        let result = sqlx::query(
            "INSERT INTO properties (public_id, title, slug, description, property_type, listing_type, status,
                price, currency, bedrooms, bathrooms, area_sqm, address, city, region, postal_code, country,
                latitude, longitude, features, images, featured, agent_id, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&public_id)
        .bind(&request.title)
        .bind(&request.slug)
        .bind(&request.description)
        .bind(request.property_type.as_str())
        .bind(request.listing_type.as_str())
        .bind(request.status.as_str())
        .bind(request.price)
        .bind(&request.currency)
        .bind(request.bedrooms)
        .bind(request.bathrooms)
        .bind(request.area_sqm)
        .bind(&request.address)
        .bind(&request.city)
        .bind(&request.region)
        .bind(&request.postal_code)
        .bind(&request.country)
        .bind(request.latitude)
        .bind(request.longitude)
        .bind(serde_json::to_string(&request.features)?)
        .bind(serde_json::to_string(&request.images)?)
        .bind(request.featured)
        .bind(request.agent_id)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| DatabaseError::from_insert(e, "property slug"))?;

        let id = result.last_insert_rowid();
        info!(property_id = id, public_id = %public_id, slug = %request.slug, "created property");

        self.find_by_id(id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("property {id}")))
    }

    pub async fn find_by_id(&self, id: i64) -> DatabaseResult<Option<Property>> {
        let row = sqlx::query(&format!("SELECT {PROPERTY_COLUMNS} FROM properties WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_property).transpose()
    }

    pub async fn find_by_public_id(&self, public_id: &str) -> DatabaseResult<Option<Property>> {
        let row = sqlx::query(&format!("SELECT {PROPERTY_COLUMNS} FROM properties WHERE public_id = ?"))
            .bind(public_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_property).transpose()
    }

    pub async fn find_by_slug(&self, slug: &str) -> DatabaseResult<Option<Property>> {
        let row = sqlx::query(&format!("SELECT {PROPERTY_COLUMNS} FROM properties WHERE slug = ?"))
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_property).transpose()
    }

    pub async fn slug_exists(&self, slug: &str) -> DatabaseResult<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM properties WHERE slug = ?")
            .bind(slug)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    /// Filtered listing: featured first, then newest.
    pub async fn search(&self, filter: &PropertyFilter) -> DatabaseResult<Page<Property>> {
        let (limit, offset) = page_bounds(filter.limit, filter.offset);

        let mut count_query = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM properties");
        push_filters(&mut count_query, filter);
        let total: i64 = count_query
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        let mut query = QueryBuilder::<Sqlite>::new(format!("SELECT {PROPERTY_COLUMNS} FROM properties"));
        push_filters(&mut query, filter);
        query
            .push(" ORDER BY featured DESC, created_at DESC, id DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let rows = query.build().fetch_all(&self.pool).await?;
        let items = rows.iter().map(map_property).collect::<DatabaseResult<Vec<_>>>()?;

        Ok(Page {
            items,
            total,
            limit,
            offset,
        })
    }

    pub async fn update(&self, id: i64, request: &UpdatePropertyRequest) -> DatabaseResult<Property> {
        let mut current = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("property {id}")))?;

        let update = request.clone();
        if let Some(title) = update.title {
            current.title = title;
        }
        if let Some(description) = update.description {
            current.description = description;
        }
        if let Some(property_type) = update.property_type {
            current.property_type = property_type;
        }
        if let Some(listing_type) = update.listing_type {
            current.listing_type = listing_type;
        }
        if let Some(price) = update.price {
            current.price = price;
        }
        if let Some(currency) = update.currency {
            current.currency = currency;
        }
        if let Some(bedrooms) = update.bedrooms {
            current.bedrooms = bedrooms;
        }
        if let Some(bathrooms) = update.bathrooms {
            current.bathrooms = bathrooms;
        }
        if update.area_sqm.is_some() {
            current.area_sqm = update.area_sqm;
        }
        if update.address.is_some() {
            current.address = update.address;
        }
        if let Some(city) = update.city {
            current.city = city;
        }
        if update.region.is_some() {
            current.region = update.region;
        }
        if update.postal_code.is_some() {
            current.postal_code = update.postal_code;
        }
        if update.country.is_some() {
            current.country = update.country;
        }
        if update.latitude.is_some() {
            current.latitude = update.latitude;
        }
        if update.longitude.is_some() {
            current.longitude = update.longitude;
        }
        if let Some(features) = update.features {
            current.features = features;
        }
        if let Some(images) = update.images {
            current.images = images;
        }
        if update.agent_id.is_some() {
            current.agent_id = update.agent_id;
        }
        current.updated_at = now_timestamp();

        sqlx::query(
            "UPDATE properties SET title = ?, description = ?, property_type = ?, listing_type = ?, price = ?,
                currency = ?, bedrooms = ?, bathrooms = ?, area_sqm = ?, address = ?, city = ?, region = ?,
                postal_code = ?, country = ?, latitude = ?, longitude = ?, features = ?, images = ?,
                agent_id = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(&current.title)
        .bind(&current.description)
        .bind(current.property_type.as_str())
        .bind(current.listing_type.as_str())
        .bind(current.price)
        .bind(&current.currency)
        .bind(current.bedrooms)
        .bind(current.bathrooms)
        .bind(current.area_sqm)
        .bind(&current.address)
        .bind(&current.city)
        .bind(&current.region)
        .bind(&current.postal_code)
        .bind(&current.country)
        .bind(current.latitude)
        .bind(current.longitude)
        .bind(serde_json::to_string(&current.features)?)
        .bind(serde_json::to_string(&current.images)?)
        .bind(current.agent_id)
        .bind(&current.updated_at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(current)
    }

    pub async fn set_status(&self, id: i64, status: PropertyStatus) -> DatabaseResult<()> {
        let result = sqlx::query("UPDATE properties SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(now_timestamp())
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("property {id}")));
        }
        info!(property_id = id, status = %status, "property status changed");
        Ok(())
    }

    pub async fn set_featured(&self, id: i64, featured: bool) -> DatabaseResult<()> {
        let result = sqlx::query("UPDATE properties SET featured = ?, updated_at = ? WHERE id = ?")
            .bind(featured)
            .bind(now_timestamp())
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("property {id}")));
        }
        Ok(())
    }

    pub async fn delete(&self, id: i64) -> DatabaseResult<()> {
        let result = sqlx::query("DELETE FROM properties WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("property {id}")));
        }
        info!(property_id = id, "deleted property");
        Ok(())
    }

    pub async fn count_by_status(&self) -> DatabaseResult<Vec<(PropertyStatus, i64)>> {
        let rows = sqlx::query("SELECT status, COUNT(*) AS total FROM properties GROUP BY status")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| -> DatabaseResult<(PropertyStatus, i64)> {
                let status: String = row.try_get("status")?;
                Ok((status.parse()?, row.try_get("total")?))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{ListingType, PropertyType};
    use crate::test_support::create_test_database;

    fn listing(slug: &str, city: &str, price: i64, bedrooms: i64, status: PropertyStatus) -> CreatePropertyRequest {
        CreatePropertyRequest {
            title: format!("Home {slug}"),
            slug: slug.to_string(),
            description: "Bright and airy".to_string(),
            property_type: PropertyType::House,
            listing_type: ListingType::Sale,
            status,
            price,
            currency: "USD".to_string(),
            bedrooms,
            bathrooms: 2.0,
            area_sqm: Some(120.0),
            address: None,
            city: city.to_string(),
            region: None,
            postal_code: None,
            country: None,
            latitude: None,
            longitude: None,
            features: vec!["garden".to_string()],
            images: vec!["https://cdn.test/1.jpg".to_string()],
            featured: false,
            agent_id: None,
        }
    }

    #[tokio::test]
    async fn create_round_trips_json_columns() {
        let (pool, _dir) = create_test_database().await;
        let repo = PropertyRepository::new(pool);

        let created = repo
            .create(&listing("oak-house", "Lisbon", 450_000, 3, PropertyStatus::Available))
            .await
            .unwrap();
        let found = repo.find_by_slug("oak-house").await.unwrap().unwrap();

        assert_eq!(found, created);
        assert_eq!(found.features, vec!["garden".to_string()]);
        assert_eq!(found.cover_image(), Some("https://cdn.test/1.jpg"));

        let duplicate = repo
            .create(&listing("oak-house", "Porto", 1, 1, PropertyStatus::Draft))
            .await;
        assert!(matches!(duplicate, Err(DatabaseError::Duplicate(_))));
    }

    #[tokio::test]
    async fn search_applies_filters_and_counts() {
        let (pool, _dir) = create_test_database().await;
        let repo = PropertyRepository::new(pool);

        repo.create(&listing("a", "Lisbon", 300_000, 2, PropertyStatus::Available)).await.unwrap();
        repo.create(&listing("b", "lisbon", 600_000, 4, PropertyStatus::Available)).await.unwrap();
        repo.create(&listing("c", "Porto", 250_000, 3, PropertyStatus::Available)).await.unwrap();
        repo.create(&listing("d", "Lisbon", 500_000, 5, PropertyStatus::Draft)).await.unwrap();

        let filter = PropertyFilter {
            city: Some("LISBON".to_string()),
            min_bedrooms: Some(2),
            max_price: Some(650_000),
            statuses: PropertyStatus::PUBLIC.to_vec(),
            ..Default::default()
        };
        let page = repo.search(&filter).await.unwrap();
        assert_eq!(page.total, 2);
        let slugs: Vec<_> = page.items.iter().map(|p| p.slug.as_str()).collect();
        assert!(slugs.contains(&"a") && slugs.contains(&"b"));

        let paged = repo
            .search(&PropertyFilter { limit: Some(1), offset: Some(1), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(paged.total, 4);
        assert_eq!(paged.items.len(), 1);
    }

    #[tokio::test]
    async fn update_only_touches_supplied_fields() {
        let (pool, _dir) = create_test_database().await;
        let repo = PropertyRepository::new(pool);

        let created = repo
            .create(&listing("e", "Faro", 200_000, 2, PropertyStatus::Available))
            .await
            .unwrap();
        let updated = repo
            .update(
                created.id,
                &UpdatePropertyRequest {
                    price: Some(190_000),
                    features: Some(vec!["pool".to_string(), "garage".to_string()]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.price, 190_000);
        assert_eq!(updated.city, "Faro");
        assert_eq!(updated.features.len(), 2);

        repo.set_status(created.id, PropertyStatus::Sold).await.unwrap();
        let counts = repo.count_by_status().await.unwrap();
        assert_eq!(counts, vec![(PropertyStatus::Sold, 1)]);
    }
}
