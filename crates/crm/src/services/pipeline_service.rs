//! The Kanban view of the lead pipeline.

use realty_database::{Lead, LeadRepository, LeadStatus};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::error::{CrmError, CrmResult};

#[derive(Debug, Clone, Serialize)]
pub struct BoardColumn {
    pub status: LeadStatus,
    pub leads: Vec<Lead>,
}

#[derive(Clone)]
pub struct PipelineService {
    leads: LeadRepository,
}

impl PipelineService {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            leads: LeadRepository::new(pool),
        }
    }

    /// One column per status in pipeline order, each sorted by board position.
    /// Empty columns are included.
    pub async fn board(&self) -> CrmResult<Vec<BoardColumn>> {
        let mut columns: Vec<BoardColumn> = LeadStatus::ALL
            .iter()
            .map(|status| BoardColumn {
                status: *status,
                leads: Vec::new(),
            })
            .collect();

        for lead in self.leads.board().await? {
            if let Some(column) = columns.iter_mut().find(|c| c.status == lead.status) {
                column.leads.push(lead);
            }
        }
        Ok(columns)
    }

    /// Drop a lead at `index` in the `status` column. Indexes past the end append.
    pub async fn move_lead(&self, public_id: &str, status: LeadStatus, index: i64) -> CrmResult<Lead> {
        if index < 0 {
            return Err(CrmError::validation("index must not be negative"));
        }
        let lead = self
            .leads
            .find_by_public_id(public_id)
            .await?
            .ok_or_else(|| CrmError::not_found("lead"))?;

        Ok(self.leads.move_on_board(lead.id, status, index).await?)
    }
}
