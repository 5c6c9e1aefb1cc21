//! Lead entity definitions

use serde::{Deserialize, Serialize};

text_enum! {
    /// Pipeline column a lead sits in. Declaration order is board order.
    LeadStatus {
        New => "new",
        Contacted => "contacted",
        Qualified => "qualified",
        Proposal => "proposal",
        Negotiation => "negotiation",
        Won => "won",
        Lost => "lost",
    }
}

text_enum! {
    LeadSource {
        ContactForm => "contact_form",
        Chat => "chat",
        PropertyInquiry => "property_inquiry",
        Manual => "manual",
    }
}

impl LeadStatus {
    pub fn is_closed(&self) -> bool {
        matches!(self, LeadStatus::Won | LeadStatus::Lost)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub id: i64,
    pub public_id: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub message: Option<String>,
    pub source: LeadSource,
    pub status: LeadStatus,
    pub property_id: Option<i64>,
    pub assigned_to: Option<i64>,
    pub email_verified: bool,
    pub verified_at: Option<String>,
    pub board_position: i64,
    pub notes: Option<String>,
    pub closed_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Lead {
    /// Apply a status change in memory, keeping `closed_at` consistent.
    pub fn update_status(&mut self, status: LeadStatus, now: &str) {
        if status.is_closed() {
            if !self.status.is_closed() || self.closed_at.is_none() {
                self.closed_at = Some(now.to_string());
            }
        } else {
            self.closed_at = None;
        }
        self.status = status;
        self.updated_at = now.to_string();
    }

    pub fn mark_verified(&mut self, now: &str) {
        self.email_verified = true;
        self.verified_at = Some(now.to_string());
        self.updated_at = now.to_string();
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateLeadRequest {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub message: Option<String>,
    pub source: LeadSource,
    pub property_id: Option<i64>,
    pub assigned_to: Option<i64>,
    pub email_verified: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateLeadRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub message: Option<String>,
    pub notes: Option<String>,
    pub property_id: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeadFilter {
    pub status: Option<LeadStatus>,
    pub source: Option<LeadSource>,
    pub assigned_to: Option<i64>,
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lead(status: LeadStatus) -> Lead {
        Lead {
            id: 1,
            public_id: "lead".into(),
            name: "Jo".into(),
            email: "jo@example.com".into(),
            phone: None,
            message: None,
            source: LeadSource::Chat,
            status,
            property_id: None,
            assigned_to: None,
            email_verified: false,
            verified_at: None,
            board_position: 0,
            notes: None,
            closed_at: None,
            created_at: "2026-01-01T00:00:00.000Z".into(),
            updated_at: "2026-01-01T00:00:00.000Z".into(),
        }
    }

    #[test]
    fn closing_a_lead_stamps_closed_at() {
        let mut lead = lead(LeadStatus::Negotiation);
        lead.update_status(LeadStatus::Won, "2026-02-01T00:00:00.000Z");
        assert_eq!(lead.closed_at.as_deref(), Some("2026-02-01T00:00:00.000Z"));

        lead.update_status(LeadStatus::Lost, "2026-03-01T00:00:00.000Z");
        assert_eq!(lead.closed_at.as_deref(), Some("2026-02-01T00:00:00.000Z"));

        lead.update_status(LeadStatus::Qualified, "2026-04-01T00:00:00.000Z");
        assert!(lead.closed_at.is_none());
        assert_eq!(lead.updated_at, "2026-04-01T00:00:00.000Z");
    }

    #[test]
    fn statuses_parse_from_their_text() {
        for status in LeadStatus::ALL {
            assert_eq!(LeadStatus::parse(status.as_str()), Some(*status));
        }
        assert!("archived".parse::<LeadStatus>().is_err());
        assert_eq!(LeadSource::parse("contact_form"), Some(LeadSource::ContactForm));
    }
}
