use crate::domain::stage::Stage;
use crate::error::{PresaleError, Result};
use std::io::Read;

/// Reads stage definitions from a CSV source.
///
/// Expected header: `id, stage_number, price_per_token, total_tokens,
/// sold_tokens, start_date, end_date, is_active`. Dates are RFC 3339.
/// `sold_tokens` and `reserved_tokens` may be omitted and default to zero.
pub struct StageReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> StageReader<R> {
    /// Creates a new `StageReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Returns an iterator that lazily reads and deserializes stages.
    pub fn stages(self) -> impl Iterator<Item = Result<Stage>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(PresaleError::from))
    }
}
