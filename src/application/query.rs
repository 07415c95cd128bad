use crate::domain::ports::StageStoreRef;
use crate::domain::stats::PresaleSnapshot;
use tracing::error;

/// Read side of the presale: stages plus derived stats.
pub struct PresaleQueryService {
    stages: StageStoreRef,
}

impl PresaleQueryService {
    pub fn new(stages: StageStoreRef) -> Self {
        Self { stages }
    }

    /// Reads every stage and folds the stats.
    ///
    /// A read failure degrades to an empty snapshot rather than an error so the
    /// display keeps working through transient store problems.
    pub async fn get_presale_data(&self) -> PresaleSnapshot {
        match self.stages.all_ordered().await {
            Ok(stages) => PresaleSnapshot::from_stages(stages),
            Err(e) => {
                error!(error = %e, "error fetching presale data");
                PresaleSnapshot::unavailable()
            }
        }
    }
}
