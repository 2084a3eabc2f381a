use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use vcg_backend::WorkspaceFs;
use vcg_cache::StateCache;
use vcg_exec::{BatchReport, CommandExecutor, FileOutcome};
use vcg_policy::is_eligible_for_check_out;
use vcg_types::{CommandKind, FileId, FileStatus, Selection};

use crate::decider::{Decider, EditAnswer, SaveAnswer, UncontrolledSaveAnswer, WritableAnswer};
use crate::error::QueryError;
use crate::flags::{EditInfo, QueryEditFlags, QuerySaveFlags};
use crate::outcome::{
    EditClass, EditOutcome, FileEdit, FileSave, SaveOutcome, SaveResult, SaveVerdict, Verdict,
};

/// Preferences that let the protocol check out without asking.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryPolicy {
    pub auto_checkout_on_edit: bool,
    pub auto_checkout_on_save: bool,
}

/// Terminal action chosen for one file, before queued checkouts run.
enum Step<T> {
    Answer(T),
    CheckOut,
}

/// The query-edit / query-save decision flow of one workspace session.
///
/// Owns the session's in-memory-edit approval set. A file in the set is
/// allowed to be edited without prompt or backend call; saving it still goes
/// through the full flow because the disk file is still read-only.
pub struct QueryProtocol {
    cache: Arc<StateCache>,
    executor: Arc<CommandExecutor>,
    fs: Arc<dyn WorkspaceFs>,
    decider: Arc<dyn Decider>,
    policy: QueryPolicy,
    approvals: RwLock<HashSet<FileId>>,
}

impl QueryProtocol {
    pub fn new(
        cache: Arc<StateCache>,
        executor: Arc<CommandExecutor>,
        fs: Arc<dyn WorkspaceFs>,
        decider: Arc<dyn Decider>,
        policy: QueryPolicy,
    ) -> Self {
        Self {
            cache,
            executor,
            fs,
            decider,
            policy,
            approvals: RwLock::new(HashSet::new()),
        }
    }

    pub fn policy(&self) -> QueryPolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: QueryPolicy) {
        self.policy = policy;
    }

    /// Replace the decision capability.
    pub fn set_decider(&mut self, decider: Arc<dyn Decider>) {
        self.decider = decider;
    }

    // -----------------------------------------------------------------------
    // Approvals
    // -----------------------------------------------------------------------

    /// Remember that `file` may be edited in memory.
    pub fn approve(&self, file: FileId) {
        self.approvals
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(file);
    }

    pub fn is_approved(&self, file: &FileId) -> bool {
        self.approvals
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(file)
    }

    /// Forget an approval, e.g. once the file was saved elsewhere or closed.
    pub fn revoke(&self, file: &FileId) -> bool {
        self.approvals
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(file)
    }

    /// Approved files, sorted.
    pub fn approvals(&self) -> Vec<FileId> {
        let mut files: Vec<FileId> = self
            .approvals
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect();
        files.sort();
        files
    }

    pub fn clear_approvals(&self) {
        self.approvals
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    // -----------------------------------------------------------------------
    // Classification
    // -----------------------------------------------------------------------

    /// Classify a file for query-edit, honoring approvals.
    pub fn classify(&self, file: &FileId) -> Result<(EditClass, FileStatus), QueryError> {
        if self.is_approved(file) {
            // Approved files answer without touching the backend, so no
            // lookup-miss refresh either.
            let status = self.cache.entry(file).map_or(FileStatus::Unknown, |e| e.status);
            return Ok((EditClass::AlreadyApproved, status));
        }
        self.classify_on_disk(file)
    }

    /// Classify from the disk and the cache only.
    fn classify_on_disk(&self, file: &FileId) -> Result<(EditClass, FileStatus), QueryError> {
        let status = self.cache.lookup(file);
        if !self.fs.exists(file) {
            return Ok((EditClass::NotBlocked, status));
        }
        let read_only = self.fs.is_read_only(file).map_err(|e| QueryError::fs(file, e))?;
        let class = if !read_only {
            EditClass::NotBlocked
        } else if is_eligible_for_check_out(status) {
            EditClass::BlockedReadOnlyUnderControl
        } else {
            EditClass::BlockedReadOnlyNotUnderControl
        };
        Ok((class, status))
    }

    // -----------------------------------------------------------------------
    // Query-edit
    // -----------------------------------------------------------------------

    /// May the host let the user modify `files`?
    ///
    /// Every file is answered; a failure on one file denies that file and
    /// the rest continue. Checkouts chosen along the way run as one batch at
    /// the end; a failed checkout is reported but does not change the
    /// verdict.
    pub fn query_edit(&self, files: &[FileId], flags: QueryEditFlags) -> EditOutcome {
        let selection: Selection = files.iter().cloned().collect();
        let mut results = Vec::with_capacity(selection.len());
        let mut queued = Selection::new();

        for file in &selection {
            let result = match self.classify(file) {
                Ok((class, status)) => match self.decide_edit(file, class, status, flags) {
                    Ok(Step::CheckOut) => {
                        queued.push_file(file.clone());
                        edit(file, Some(class), status, Verdict::Allow, EditInfo::empty())
                    }
                    Ok(Step::Answer((verdict, info))) => edit(file, Some(class), status, verdict, info),
                    Err(e) => {
                        warn!(file = %file, error = %e, "query-edit failed, denying");
                        FileEdit {
                            error: Some(e.to_string()),
                            ..edit(file, Some(class), status, Verdict::Deny, EditInfo::empty())
                        }
                    }
                },
                Err(e) => {
                    warn!(file = %file, error = %e, "query-edit classification failed, denying");
                    FileEdit {
                        error: Some(e.to_string()),
                        ..edit(file, None, FileStatus::Unknown, Verdict::Deny, EditInfo::empty())
                    }
                }
            };
            debug!(file = %file, verdict = ?result.verdict, info = ?result.info, "query-edit");
            results.push(result);
        }

        let (checkout, failed_checkouts) = self.check_out(queued);
        let verdict = if results.iter().any(|r| r.verdict == Verdict::Deny) {
            Verdict::Deny
        } else {
            Verdict::Allow
        };
        let info = results.iter().fold(EditInfo::empty(), |acc, r| acc | r.info);
        info!(
            files = results.len(),
            verdict = ?verdict,
            failed_checkouts = failed_checkouts.len(),
            "query-edit answered"
        );
        EditOutcome {
            verdict,
            info,
            files: results,
            failed_checkouts,
            checkout,
        }
    }

    fn decide_edit(
        &self,
        file: &FileId,
        class: EditClass,
        status: FileStatus,
        flags: QueryEditFlags,
    ) -> Result<Step<(Verdict, EditInfo)>, QueryError> {
        let report_only = flags.contains(QueryEditFlags::REPORT_ONLY);
        let silent = flags.contains(QueryEditFlags::SILENT);
        let step = match class {
            EditClass::AlreadyApproved | EditClass::NotBlocked => {
                Step::Answer((Verdict::Allow, EditInfo::empty()))
            }
            EditClass::BlockedReadOnlyUnderControl => {
                if report_only {
                    Step::Answer((Verdict::Deny, EditInfo::READ_ONLY_UNDER_CONTROL))
                } else if self.policy.auto_checkout_on_edit || silent {
                    Step::CheckOut
                } else {
                    match self.decider.on_checkout_edit(file, status) {
                        EditAnswer::CheckOut => Step::CheckOut,
                        EditAnswer::EditInMemory => {
                            self.approve(file.clone());
                            Step::Answer((Verdict::Allow, EditInfo::IN_MEMORY_EDIT))
                        }
                        EditAnswer::Cancel => Step::Answer((Verdict::Deny, EditInfo::CANCELED)),
                    }
                }
            }
            EditClass::BlockedReadOnlyNotUnderControl => {
                if report_only {
                    Step::Answer((Verdict::Deny, EditInfo::READ_ONLY_NOT_UNDER_CONTROL))
                } else if silent {
                    Step::Answer((Verdict::Deny, EditInfo::NOISY_PROMPT_REQUIRED))
                } else {
                    match self.decider.on_make_writable(file) {
                        WritableAnswer::MakeWritable => {
                            self.fs
                                .make_writable(file)
                                .map_err(|e| QueryError::fs(file, e))?;
                            Step::Answer((Verdict::Allow, EditInfo::MADE_WRITABLE))
                        }
                        WritableAnswer::Cancel => Step::Answer((Verdict::Deny, EditInfo::CANCELED)),
                    }
                }
            }
        };
        Ok(step)
    }

    // -----------------------------------------------------------------------
    // Query-save
    // -----------------------------------------------------------------------

    /// May the host save `files`?
    ///
    /// Approvals are ignored. A file whose queued checkout fails is skipped.
    pub fn query_save(&self, files: &[FileId], flags: QuerySaveFlags) -> SaveOutcome {
        let selection: Selection = files.iter().cloned().collect();
        let mut results = Vec::with_capacity(selection.len());
        let mut queued = Selection::new();

        for file in &selection {
            let result = match self.classify_on_disk(file) {
                Ok((class, status)) => match self.decide_save(file, class, status, flags) {
                    Ok(Step::CheckOut) => {
                        queued.push_file(file.clone());
                        save(file, Some(class), status, SaveResult::Save)
                    }
                    Ok(Step::Answer(result)) => save(file, Some(class), status, result),
                    Err(e) => {
                        warn!(file = %file, error = %e, "query-save failed, canceling");
                        FileSave {
                            error: Some(e.to_string()),
                            ..save(file, Some(class), status, SaveResult::Cancel)
                        }
                    }
                },
                Err(e) => {
                    warn!(file = %file, error = %e, "query-save classification failed, canceling");
                    FileSave {
                        error: Some(e.to_string()),
                        ..save(file, None, FileStatus::Unknown, SaveResult::Cancel)
                    }
                }
            };
            debug!(file = %file, result = ?result.result, "query-save");
            results.push(result);
        }

        let (checkout, failed_checkouts) = self.check_out(queued);
        for result in results.iter_mut() {
            if failed_checkouts.contains(&result.file) {
                result.result = SaveResult::Skip;
            }
        }
        let verdict = SaveVerdict::aggregate(results.iter().map(|r| &r.result));
        info!(
            files = results.len(),
            verdict = ?verdict,
            failed_checkouts = failed_checkouts.len(),
            "query-save answered"
        );
        SaveOutcome {
            verdict,
            files: results,
            failed_checkouts,
            checkout,
        }
    }

    fn decide_save(
        &self,
        file: &FileId,
        class: EditClass,
        status: FileStatus,
        flags: QuerySaveFlags,
    ) -> Result<Step<SaveResult>, QueryError> {
        let silent = flags.contains(QuerySaveFlags::SILENT);
        let step = match class {
            EditClass::AlreadyApproved | EditClass::NotBlocked => Step::Answer(SaveResult::Save),
            EditClass::BlockedReadOnlyUnderControl => {
                if self.policy.auto_checkout_on_save || silent {
                    Step::CheckOut
                } else {
                    match self.decider.on_checkout_save(file, status) {
                        SaveAnswer::CheckOut => Step::CheckOut,
                        SaveAnswer::SaveAs => Step::Answer(SaveResult::SaveAs),
                        SaveAnswer::Skip => Step::Answer(SaveResult::Skip),
                        SaveAnswer::Cancel => Step::Answer(SaveResult::Cancel),
                    }
                }
            }
            EditClass::BlockedReadOnlyNotUnderControl => {
                if silent {
                    Step::Answer(SaveResult::Skip)
                } else {
                    match self.decider.on_save_uncontrolled(file) {
                        UncontrolledSaveAnswer::MakeWritable => {
                            self.fs
                                .make_writable(file)
                                .map_err(|e| QueryError::fs(file, e))?;
                            Step::Answer(SaveResult::Save)
                        }
                        UncontrolledSaveAnswer::Skip => Step::Answer(SaveResult::Skip),
                    }
                }
            }
        };
        Ok(step)
    }

    // -----------------------------------------------------------------------
    // Checkout batch
    // -----------------------------------------------------------------------

    /// Run queued checkouts as one batch; returns the report and the files
    /// that did not end up checked out.
    fn check_out(&self, queued: Selection) -> (Option<BatchReport>, Vec<FileId>) {
        if queued.is_empty() {
            return (None, Vec::new());
        }
        let files = queued.files().to_vec();
        match self.executor.run(CommandKind::Edit, queued) {
            Ok(report) => {
                let failed: Vec<FileId> = files
                    .into_iter()
                    .filter(|f| !report.outcome(f).is_some_and(FileOutcome::is_done))
                    .collect();
                for file in &failed {
                    warn!(file = %file, "queued checkout did not succeed");
                }
                (Some(report), failed)
            }
            Err(e) => {
                warn!(files = files.len(), error = %e, "queued checkouts could not run");
                (None, files)
            }
        }
    }
}

fn edit(file: &FileId, class: Option<EditClass>, status: FileStatus, verdict: Verdict, info: EditInfo) -> FileEdit {
    FileEdit {
        file: file.clone(),
        class,
        status,
        verdict,
        info,
        error: None,
    }
}

fn save(file: &FileId, class: Option<EditClass>, status: FileStatus, result: SaveResult) -> FileSave {
    FileSave {
        file: file.clone(),
        class,
        status,
        result,
        error: None,
    }
}
