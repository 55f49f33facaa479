use std::collections::BTreeMap;

use super::actions::refresh_record;
use super::*;
use crate::db::{Filter, OrderBy};
use crate::util::{followup_after, parse_timestamp};

impl Crm {
    // =========================================================================
    // Processes
    // =========================================================================

    /// Insert a process row as given. Nothing checks that the lead doesn't
    /// already have one; `create_action` is the normal way processes appear.
    pub fn create_process(&self, process: &NewProcess) -> Result<i64, CrmError> {
        let id = self
            .store()
            .insert(Process::COLLECTION, &process.to_record())?;
        log::debug!("Created process {id} for lead {}", process.lead_id);
        Ok(id)
    }

    pub fn get_process(&self, id: i64) -> Result<Option<Process>, CrmError> {
        Ok(self.store().find::<Process>(id)?)
    }

    pub fn search_processes(
        &self,
        filters: &[Filter<ProcessField>],
    ) -> Result<Vec<Process>, CrmError> {
        Ok(self.store().select::<Process>(filters, None)?)
    }

    /// Active processes whose follow-up is at or before `as_of`, soonest first.
    pub fn due_followups(&self, as_of: &str) -> Result<Vec<Process>, CrmError> {
        let as_of = as_of.trim();
        if parse_timestamp(as_of).is_none() {
            return Err(CrmError::InvalidTimestamp {
                value: as_of.to_string(),
            });
        }
        Ok(self.store().select::<Process>(
            &[
                Filter::eq(ProcessField::Status, ACTIVE_PROCESS_STATUS),
                Filter::le(ProcessField::NextFollowupDatetime, as_of),
            ],
            Some(OrderBy::asc(ProcessField::NextFollowupDatetime)),
        )?)
    }

    // =========================================================================
    // Repair
    // =========================================================================

    /// Bring every lead that has actions back to exactly one process that
    /// tracks its latest action.
    ///
    /// The lowest-id process is kept and any others are deleted. A lead whose
    /// latest action carries an unparseable timestamp is logged and skipped.
    /// Processes for leads without actions are left alone. Runs as a single
    /// transaction.
    pub fn reconcile_processes(&self) -> Result<ReconcileReport, CrmError> {
        let store = self.store();
        store.with_transaction(|store| -> Result<ReconcileReport, CrmError> {
            // Ids grow with insertion, so the last action seen per lead is its latest
            let mut latest: BTreeMap<i64, Action> = BTreeMap::new();
            let mut orphans = 0usize;
            for action in store.select::<Action>(&[], Some(OrderBy::asc(ActionField::Id)))? {
                match action.lead_id {
                    Some(lead_id) => {
                        latest.insert(lead_id, action);
                    }
                    None => orphans += 1,
                }
            }
            if orphans > 0 {
                log::warn!("Ignoring {orphans} actions with no lead");
            }

            let mut report = ReconcileReport {
                leads_checked: latest.len(),
                ..ReconcileReport::default()
            };

            for (lead_id, action) in &latest {
                let Some(next_followup) = followup_after(&action.timestamp) else {
                    log::warn!(
                        "Skipping lead {lead_id}: action {} has bad timestamp {:?}",
                        action.id,
                        action.timestamp
                    );
                    continue;
                };

                let mut processes = store
                    .select::<Process>(
                        &[Filter::eq(ProcessField::LeadId, *lead_id)],
                        Some(OrderBy::asc(ProcessField::Id)),
                    )?
                    .into_iter();

                let Some(keep) = processes.next() else {
                    store.insert(
                        Process::COLLECTION,
                        &NewProcess {
                            lead_id: *lead_id,
                            channel: action.action_type.clone(),
                            last_action_id: Some(action.id),
                            next_followup_datetime: Some(next_followup),
                            status: Some(ACTIVE_PROCESS_STATUS.to_string()),
                            ..NewProcess::default()
                        }
                        .to_record(),
                    )?;
                    report.created += 1;
                    continue;
                };

                for extra in processes {
                    report.duplicates_removed +=
                        store.delete(Process::COLLECTION, &[Filter::eq(ProcessField::Id, extra.id)])?;
                }

                if !keep.tracks(action, &next_followup) {
                    store.update(
                        Process::COLLECTION,
                        &refresh_record(action, &next_followup),
                        &[Filter::eq(ProcessField::Id, keep.id)],
                    )?;
                    report.refreshed += 1;
                }
            }

            if report.is_clean() {
                log::info!("Reconciled {} leads, nothing to repair", report.leads_checked);
            } else {
                log::info!(
                    "Reconciled {} leads: {} created, {} refreshed, {} duplicates removed",
                    report.leads_checked,
                    report.created,
                    report.refreshed,
                    report.duplicates_removed
                );
            }
            Ok(report)
        })
    }
}
