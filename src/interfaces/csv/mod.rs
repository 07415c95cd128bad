pub mod stage_reader;

use crate::domain::ports::StageStore;
use crate::error::Result;
use stage_reader::StageReader;
use std::io::Read;
use tracing::{error, warn};

/// Counts from a stage seeding run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedReport {
    pub inserted: usize,
    pub skipped: usize,
    pub rejected: usize,
}

/// Seeds stage definitions from CSV into `store`.
///
/// Rows that fail to parse or sell more than their total are logged and
/// counted; stages that already exist keep their stored counters.
pub async fn seed_stages<R: Read>(store: &dyn StageStore, source: R) -> Result<SeedReport> {
    let mut report = SeedReport::default();
    let mut active = Vec::new();

    for stage in StageReader::new(source).stages() {
        match stage {
            Ok(mut stage) => {
                // Reservations belong to open purchases, never to seed data
                stage.reserved_tokens = 0;
                if let Err(e) = stage.check_capacity() {
                    error!(error = %e, "Error reading stage");
                    report.rejected += 1;
                    continue;
                }
                if stage.is_active {
                    active.push(stage.id);
                }
                if store.seed(stage).await? {
                    report.inserted += 1;
                } else {
                    report.skipped += 1;
                }
            }
            Err(e) => {
                error!(error = %e, "Error reading stage");
                report.rejected += 1;
            }
        }
    }

    if active.len() > 1 {
        warn!(stages = ?active, "more than one stage is marked active");
    }
    Ok(report)
}
