use crate::ResourceKind;

/// How a reconciliation run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    NothingToDelete,
    /// The prompt was answered with anything but `yes`
    Declined { pending: usize },
    Removed,
}

/// A deletion that failed; the run carried on with the remaining objects
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteFailure {
    pub kind: ResourceKind,
    pub public_id: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    pub outcome: ReconcileOutcome,
    /// Objects the service confirmed as removed
    pub removed: Vec<(ResourceKind, String)>,
    pub failed: Vec<DeleteFailure>,
}

impl ReconcileReport {
    pub fn nothing_to_delete() -> Self {
        Self {
            outcome: ReconcileOutcome::NothingToDelete,
            removed: Vec::new(),
            failed: Vec::new(),
        }
    }

    pub fn declined(pending: usize) -> Self {
        Self {
            outcome: ReconcileOutcome::Declined { pending },
            removed: Vec::new(),
            failed: Vec::new(),
        }
    }

    pub fn removed_count(&self) -> usize {
        self.removed.len()
    }

    /// Removed identifiers across all kinds
    pub fn removed_ids(&self) -> Vec<&str> {
        self.removed.iter().map(|(_, id)| id.as_str()).collect()
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn status_line(&self) -> String {
        match self.outcome {
            ReconcileOutcome::NothingToDelete => "There is no file to delete.".to_string(),
            ReconcileOutcome::Declined { .. } => "As ordered, no file has been deleted.".to_string(),
            ReconcileOutcome::Removed => {
                format!("{} files have been deleted successfully.", self.removed.len())
            }
        }
    }
}

/// Question shown before deleting `files`
pub fn confirmation_prompt(files: &[(ResourceKind, String)]) -> String {
    let mut message = format!("{} files will be deleted:\n", files.len());
    for (_, public_id) in files {
        message.push_str("- ");
        message.push_str(public_id);
        message.push('\n');
    }
    message.push_str("If you are sure that you want to delete them, type 'yes' to continue, or 'no' to cancel: ");
    message
}
