use pipeline_logging::pipeline_warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncStatus {
    #[default]
    Unsynced,
    Syncing,
    Synced,
    Failed,
}

/// Who asked for a sync attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTrigger {
    /// Issued once by the pipeline when an artifact becomes available.
    Automatic,
    /// Issued by the operator, typically to retry a failure.
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncFailureKind {
    /// The store answered with a JSON body reporting failure.
    Rejected,
    /// The store answered with something that is not the expected JSON.
    UnexpectedResponse,
    /// The request did not complete.
    Transport,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncFailure {
    pub kind: SyncFailureKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncRejected {
    #[error("a synchronization is already in flight")]
    InFlight,
    #[error("artifact already synchronized as {0}")]
    AlreadySynced(String),
    #[error("automatic synchronization already ran; retry manually")]
    AutomaticAlreadyAttempted,
}

/// Status of the single external registration of one artifact.
///
/// `Failed -> Syncing` on a manual retry is the only backwards step; `Synced` is final.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncRecord {
    status: SyncStatus,
    external_reference: Option<String>,
    failure: Option<SyncFailure>,
    attempts: u32,
}

impl SyncRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> SyncStatus {
        self.status
    }

    /// Present only once synced.
    pub fn external_reference(&self) -> Option<&str> {
        self.external_reference.as_deref()
    }

    /// Present only while failed.
    pub fn failure(&self) -> Option<&SyncFailure> {
        self.failure.as_ref()
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Claim the in-flight slot. Callers issue the external request only on `Ok`.
    pub fn begin(&mut self, trigger: SyncTrigger) -> Result<(), SyncRejected> {
        match (self.status, trigger) {
            (SyncStatus::Syncing, _) => return Err(SyncRejected::InFlight),
            (SyncStatus::Synced, _) => {
                return Err(SyncRejected::AlreadySynced(
                    self.external_reference.clone().unwrap_or_default(),
                ))
            }
            (SyncStatus::Failed, SyncTrigger::Automatic) => {
                return Err(SyncRejected::AutomaticAlreadyAttempted)
            }
            (SyncStatus::Unsynced, _) | (SyncStatus::Failed, SyncTrigger::Manual) => {}
        }
        self.status = SyncStatus::Syncing;
        self.failure = None;
        self.attempts += 1;
        Ok(())
    }

    /// Returns false when no attempt was in flight.
    pub fn succeed(&mut self, external_reference: impl Into<String>) -> bool {
        if self.status != SyncStatus::Syncing {
            pipeline_warn!("sync success reported while {:?}; ignored", self.status);
            return false;
        }
        self.status = SyncStatus::Synced;
        self.external_reference = Some(external_reference.into());
        true
    }

    /// Returns false when no attempt was in flight.
    pub fn fail(&mut self, failure: SyncFailure) -> bool {
        if self.status != SyncStatus::Syncing {
            pipeline_warn!("sync failure reported while {:?}; ignored", self.status);
            return false;
        }
        self.status = SyncStatus::Failed;
        self.failure = Some(failure);
        true
    }
}
