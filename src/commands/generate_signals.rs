use crate::market_data::TimeSeriesTable;
use crate::signals::{apply_double_bollinger, SignalParams};
use anyhow::Result;
use log::info;
use std::path::Path;

pub fn run(
    data_file: &Path,
    output_path: &Path,
    instruments: &[String],
    params: &SignalParams,
) -> Result<TimeSeriesTable> {
    params.validate()?;
    let mut table = TimeSeriesTable::load_csv(data_file, instruments)?;

    apply_double_bollinger(&mut table, instruments, params)?;
    table.write_csv(output_path)?;
    info!(
        "Signals for {} instrument(s) over {} period(s) written to {}",
        table.instruments().len(),
        table.len(),
        output_path.display()
    );

    Ok(table)
}
