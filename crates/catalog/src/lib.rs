//! Realty Catalog Crate
//!
//! Services behind the public marketing site: property listings and blog
//! posts, plus the slug helper both use.

pub mod error;
pub mod post_service;
pub mod property_service;
pub mod slug;

pub use error::{CatalogError, CatalogResult};
pub use post_service::{NewPost, PostService};
pub use property_service::{NewProperty, PropertyService, Visibility};
pub use slug::slugify;

#[cfg(test)]
pub(crate) mod test_support {
    use realty_config::DatabaseConfig;
    use realty_database::initialize_database;
    use sqlx::SqlitePool;
    use tempfile::TempDir;

    pub async fn create_test_database() -> (SqlitePool, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config = DatabaseConfig {
            url: format!("sqlite://{}", temp_dir.path().join("catalog.db").display()),
            max_connections: 2,
        };
        let pool = initialize_database(&config).await.unwrap();
        (pool, temp_dir)
    }
}
