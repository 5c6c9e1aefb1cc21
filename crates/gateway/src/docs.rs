use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::rest;

#[derive(OpenApi)]
#[openapi(
    paths(
        rest::health::health_check,
        rest::auth::login,
        rest::auth::logout,
        rest::auth::me,
        rest::properties::list_public_properties,
        rest::properties::get_public_property,
        rest::properties::list_properties,
        rest::properties::create_property,
        rest::properties::get_property,
        rest::properties::update_property,
        rest::properties::delete_property,
        rest::properties::set_property_status,
        rest::properties::set_property_featured,
        rest::posts::list_published_posts,
        rest::posts::get_published_post,
        rest::posts::list_posts,
        rest::posts::create_post,
        rest::posts::get_post,
        rest::posts::update_post,
        rest::posts::delete_post,
        rest::posts::publish_post,
        rest::posts::unpublish_post,
        rest::leads::submit_contact_form,
        rest::leads::list_leads,
        rest::leads::get_lead,
        rest::leads::update_lead,
        rest::leads::delete_lead,
        rest::leads::update_lead_status,
        rest::leads::assign_lead,
        rest::pipeline::get_board,
        rest::pipeline::move_lead,
        rest::chat::request_code,
        rest::chat::verify_code,
        rest::chat::get_conversation,
        rest::chat::send_message,
        rest::conversations::list_conversations,
        rest::conversations::get_conversation,
        rest::conversations::list_messages,
        rest::conversations::post_agent_message,
        rest::conversations::set_assistant,
        rest::conversations::close_conversation,
        rest::conversations::reopen_conversation,
        rest::users::list_users,
        rest::users::create_user,
        rest::users::set_user_status,
        rest::emails::list_emails,
        rest::settings::get_crm_config,
        rest::settings::update_crm_config,
        rest::overview::get_overview,
    ),
    components(
        schemas(
            crate::error::ErrorResponse,
            rest::ActionResponse,
            rest::health::HealthResponse,
            rest::auth::LoginRequest,
            rest::auth::SessionResponse,
            rest::auth::UserResponse,
            rest::properties::PropertyResponse,
            rest::properties::PropertyListResponse,
            rest::properties::CreatePropertyRequest,
            rest::properties::UpdatePropertyBody,
            rest::properties::PropertyStatusRequest,
            rest::properties::PropertyFeaturedRequest,
            rest::posts::PostResponse,
            rest::posts::PostListResponse,
            rest::posts::CreatePostBody,
            rest::posts::UpdatePostBody,
            rest::leads::LeadResponse,
            rest::leads::LeadListResponse,
            rest::leads::ContactFormRequest,
            rest::leads::ContactFormResponse,
            rest::leads::UpdateLeadBody,
            rest::leads::LeadStatusRequest,
            rest::leads::AssignLeadRequest,
            rest::pipeline::BoardResponse,
            rest::pipeline::BoardColumnResponse,
            rest::pipeline::MoveLeadRequest,
            rest::chat::OtpRequest,
            rest::chat::OtpRequestResponse,
            rest::chat::OtpVerifyRequest,
            rest::chat::ChatLeadResponse,
            rest::chat::ChatSessionResponse,
            rest::chat::ChatConversationResponse,
            rest::chat::ChatMessageRequest,
            rest::chat::ChatMessageResponse,
            rest::conversations::MessageResponse,
            rest::conversations::ConversationResponse,
            rest::conversations::ConversationListResponse,
            rest::conversations::ConversationDetailResponse,
            rest::conversations::MessagesResponse,
            rest::conversations::AgentMessageRequest,
            rest::conversations::AssistantToggleRequest,
            rest::users::UsersResponse,
            rest::users::CreateUserBody,
            rest::users::UserStatusRequest,
            rest::emails::EmailResponse,
            rest::emails::EmailListResponse,
            rest::settings::CrmConfigResponse,
            rest::settings::UpdateCrmConfigBody,
            rest::overview::OverviewResponse,
            rest::overview::StatusCountResponse,
        )
    ),
    tags(
        (name = "Health", description = "Service health endpoints"),
        (name = "Auth", description = "Back-office login and sessions"),
        (name = "Properties", description = "Public property listings"),
        (name = "Posts", description = "Public blog posts"),
        (name = "Leads", description = "Public contact form"),
        (name = "Chat", description = "Chat widget: email verification and lead conversation"),
        (name = "Dashboard", description = "Dashboard home"),
        (name = "Dashboard Properties", description = "Listing management"),
        (name = "Dashboard Posts", description = "Content management"),
        (name = "Dashboard Leads", description = "Lead management"),
        (name = "Pipeline", description = "Kanban lead board"),
        (name = "Conversations", description = "Lead conversations and agent replies"),
        (name = "Users", description = "Back-office accounts"),
        (name = "Emails", description = "Outbox"),
        (name = "CRM Config", description = "Agency settings")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        let schemes = &mut components.security_schemes;

        let mut scheme = SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer));
        if let SecurityScheme::Http(http) = &mut scheme {
            http.bearer_format = Some("Bearer".to_string());
        }

        schemes.insert("bearerAuth".to_string(), scheme);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_documents_every_surface() {
        let doc = ApiDoc::openapi();
        let paths = &doc.paths.paths;

        for path in [
            "/api/health",
            "/api/properties",
            "/api/chat/otp/verify",
            "/api/dashboard/pipeline/move",
            "/api/dashboard/crm-config",
        ] {
            assert!(paths.contains_key(path), "missing {path}");
        }

        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearerAuth"));
    }
}
