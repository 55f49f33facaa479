use super::*;
use crate::db::{Filter, Record, Value};

impl Crm {
    // =========================================================================
    // Leads
    // =========================================================================

    /// Create a lead and return its id. A missing status becomes `"new"`.
    pub fn create_lead(&self, lead: &NewLead) -> Result<i64, CrmError> {
        let record = lead.to_record();
        check_status(&record)?;
        let id = self.store().insert(Lead::COLLECTION, &record)?;
        log::debug!("Created lead {id}");
        Ok(id)
    }

    pub fn get_lead(&self, id: i64) -> Result<Option<Lead>, CrmError> {
        Ok(self.store().find::<Lead>(id)?)
    }

    /// Leads matching every filter, in creation order. No filters returns all leads.
    pub fn search_leads(&self, filters: &[Filter<LeadField>]) -> Result<Vec<Lead>, CrmError> {
        Ok(self.store().select::<Lead>(filters, None)?)
    }

    /// Apply a partial update. Clearing the status is refused before anything
    /// is written.
    pub fn update_lead(&self, id: i64, update: &LeadUpdate) -> Result<(), CrmError> {
        if update.clears_status() {
            return Err(CrmError::InvalidState(
                "Lead status cannot be null".to_string(),
            ));
        }
        let touched = self
            .store()
            .update(Lead::COLLECTION, &update.to_record(), &[Filter::eq(LeadField::Id, id)])?;
        if touched == 0 && !update.is_empty() {
            log::debug!("update_lead: no lead with id {id}");
        }
        Ok(())
    }

    /// Delete a lead. Its actions and process are left in place.
    pub fn delete_lead(&self, id: i64) -> Result<(), CrmError> {
        self.store()
            .delete(Lead::COLLECTION, &[Filter::eq(LeadField::Id, id)])?;
        Ok(())
    }
}

/// Last check before a lead row is written. `NewLead::to_record` always fills
/// in a status, so this only trips if that defaulting is bypassed.
fn check_status(record: &Record) -> Result<(), CrmError> {
    if record.get("status").map_or(true, Value::is_null) {
        return Err(CrmError::InvalidState(
            "Lead status cannot be null".to_string(),
        ));
    }
    Ok(())
}
