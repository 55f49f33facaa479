use super::*;
use crate::db::{Filter, OrderBy, Record};
use crate::util::{canonical_timestamp, followup_after, now_local_timestamp};

impl Crm {
    // =========================================================================
    // Actions
    // =========================================================================

    /// Record an action and bring the lead's follow-up process in line with it.
    ///
    /// The first action for a lead creates an `"active"` process; later ones
    /// repoint it (channel, last action, follow-up time) and leave its status
    /// alone. The follow-up is the action's persisted timestamp plus seven days.
    /// Everything happens in one transaction: if the process can't be written,
    /// the action isn't either.
    ///
    /// A supplied timestamp is stored zero-padded (`2024-1-5 9:0:0` becomes
    /// `2024-01-05 09:00:00`) so string comparisons on the column stay ordered.
    pub fn create_action(&self, action: &NewAction) -> Result<i64, CrmError> {
        let timestamp = match action.timestamp.as_deref().map(str::trim) {
            Some(ts) if !ts.is_empty() => {
                canonical_timestamp(ts).ok_or_else(|| CrmError::InvalidTimestamp {
                    value: ts.to_string(),
                })?
            }
            _ => now_local_timestamp(),
        };
        let record = action.to_record(&timestamp);

        let store = self.store();
        store.with_transaction(|store| -> Result<i64, CrmError> {
            let action_id = store.insert(Action::COLLECTION, &record)?;
            let persisted = store
                .find::<Action>(action_id)?
                .ok_or(CrmError::MissingRow {
                    collection: Action::COLLECTION,
                    id: action_id,
                })?;
            let next_followup = followup_after(&persisted.timestamp).ok_or_else(|| {
                CrmError::InvalidTimestamp {
                    value: persisted.timestamp.clone(),
                }
            })?;

            sync_process(store, action.lead_id, &persisted, &next_followup)?;
            Ok(action_id)
        })
    }

    pub fn get_action(&self, id: i64) -> Result<Option<Action>, CrmError> {
        Ok(self.store().find::<Action>(id)?)
    }

    /// Actions matching every filter, in the order they were recorded.
    pub fn search_actions(&self, filters: &[Filter<ActionField>]) -> Result<Vec<Action>, CrmError> {
        Ok(self.store().select::<Action>(filters, None)?)
    }
}

/// Insert or refresh the process for `lead_id`. Must run inside a transaction.
fn sync_process(
    store: &Store,
    lead_id: i64,
    action: &Action,
    next_followup: &str,
) -> Result<(), CrmError> {
    let existing = store.select::<Process>(
        &[Filter::eq(ProcessField::LeadId, lead_id)],
        Some(OrderBy::asc(ProcessField::Id)),
    )?;

    match existing.as_slice() {
        [] => {
            let process_id = store.insert(
                Process::COLLECTION,
                &NewProcess {
                    lead_id,
                    channel: action.action_type.clone(),
                    last_action_id: Some(action.id),
                    next_followup_datetime: Some(next_followup.to_string()),
                    status: Some(ACTIVE_PROCESS_STATUS.to_string()),
                    ..NewProcess::default()
                }
                .to_record(),
            )?;
            log::info!(
                "Started process {process_id} for lead {lead_id} (follow up {next_followup})"
            );
        }
        [process] => {
            store.update(
                Process::COLLECTION,
                &refresh_record(action, next_followup),
                &[Filter::eq(ProcessField::Id, process.id)],
            )?;
            log::debug!(
                "Process {} for lead {lead_id} now tracks action {} (follow up {next_followup})",
                process.id,
                action.id
            );
        }
        many => {
            log::warn!(
                "Lead {lead_id} has {} processes; refusing to pick one",
                many.len()
            );
            return Err(CrmError::DuplicateProcess {
                lead_id,
                count: many.len(),
            });
        }
    }
    Ok(())
}

/// Columns that follow the latest action. Status is deliberately absent.
pub(crate) fn refresh_record(action: &Action, next_followup: &str) -> Record {
    Record::new()
        .with("channel", action.action_type.clone())
        .with("last_action_id", action.id)
        .with("next_followup_datetime", next_followup)
}
