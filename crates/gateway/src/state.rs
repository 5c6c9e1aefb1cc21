//! Shared application state for the gateway

use std::collections::HashMap;

use realty_auth::Authenticator;
use realty_database::AuthSession;
use realty_catalog::{PostService, PropertyService, Visibility};
use realty_config::HttpConfig;
use realty_crm::CrmServices;
use realty_database::User;

use crate::error::{GatewayError, GatewayResult};

/// Everything a handler can reach.
#[derive(Clone)]
pub struct GatewayState {
    pub authenticator: Authenticator,
    pub properties: PropertyService,
    pub posts: PostService,
    pub crm: CrmServices,
    pub http: HttpConfig,
}

impl GatewayState {
    pub fn new(
        authenticator: Authenticator,
        properties: PropertyService,
        posts: PostService,
        crm: CrmServices,
        http: HttpConfig,
    ) -> Self {
        Self {
            authenticator,
            properties,
            posts,
            crm,
            http,
        }
    }

    pub async fn authenticate(&self, token: &str) -> GatewayResult<(User, AuthSession)> {
        self.authenticator
            .authenticate(token)
            .await
            .map_err(GatewayError::from)
    }

    /// Row id of a back-office user addressed by public id.
    pub async fn user_row_id(&self, public_id: &str) -> GatewayResult<i64> {
        Ok(self.authenticator.user_by_public_id(public_id).await?.id)
    }

    pub async fn property_row_id(&self, public_id: &str, visibility: Visibility) -> GatewayResult<i64> {
        Ok(self.properties.get(public_id, visibility).await?.id)
    }

    pub async fn lead_row_id(&self, public_id: &str) -> GatewayResult<i64> {
        Ok(self.crm.leads.get(public_id).await?.id)
    }

    /// Public ids of every back-office user, keyed by row id.
    pub async fn user_directory(&self) -> GatewayResult<HashMap<i64, String>> {
        Ok(self
            .authenticator
            .list_users()
            .await?
            .into_iter()
            .map(|user| (user.id, user.public_id))
            .collect())
    }

    pub async fn property_public_id(&self, id: Option<i64>) -> GatewayResult<Option<String>> {
        let Some(id) = id else {
            return Ok(None);
        };
        Ok(self.properties.find_by_id(id).await?.map(|p| p.public_id))
    }

    pub async fn lead_public_id(&self, id: i64) -> GatewayResult<Option<String>> {
        Ok(self.crm.leads.find_by_id(id).await?.map(|lead| lead.public_id))
    }
}
