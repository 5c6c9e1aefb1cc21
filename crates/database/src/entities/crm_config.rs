//! Agency-wide CRM settings

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrmConfig {
    pub agency_name: String,
    pub contact_email: Option<String>,
    pub notify_on_new_lead: bool,
    pub default_assignee_id: Option<i64>,
    pub assistant_enabled: bool,
    pub assistant_greeting: Option<String>,
    pub updated_at: String,
}

impl Default for CrmConfig {
    fn default() -> Self {
        Self {
            agency_name: "Realty".to_string(),
            contact_email: None,
            notify_on_new_lead: true,
            default_assignee_id: None,
            assistant_enabled: true,
            assistant_greeting: None,
            updated_at: String::new(),
        }
    }
}

/// Partial update. `clear_*` flags null out optional fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateCrmConfigRequest {
    pub agency_name: Option<String>,
    pub contact_email: Option<String>,
    pub notify_on_new_lead: Option<bool>,
    pub default_assignee_id: Option<i64>,
    pub assistant_enabled: Option<bool>,
    pub assistant_greeting: Option<String>,
    #[serde(default)]
    pub clear_default_assignee: bool,
    #[serde(default)]
    pub clear_contact_email: bool,
}

impl CrmConfig {
    pub fn apply(&mut self, update: UpdateCrmConfigRequest, now: &str) {
        if let Some(name) = update.agency_name {
            self.agency_name = name;
        }
        if update.clear_contact_email {
            self.contact_email = None;
        } else if let Some(email) = update.contact_email {
            self.contact_email = Some(email);
        }
        if let Some(notify) = update.notify_on_new_lead {
            self.notify_on_new_lead = notify;
        }
        if update.clear_default_assignee {
            self.default_assignee_id = None;
        } else if let Some(assignee) = update.default_assignee_id {
            self.default_assignee_id = Some(assignee);
        }
        if let Some(enabled) = update.assistant_enabled {
            self.assistant_enabled = enabled;
        }
        if let Some(greeting) = update.assistant_greeting {
            self.assistant_greeting = if greeting.trim().is_empty() {
                None
            } else {
                Some(greeting)
            };
        }
        self.updated_at = now.to_string();
    }
}
