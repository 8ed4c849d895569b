//! Scripted simulation runs and CSV record I/O.
//!
//! This module provides:
//! - A struct (`CommandRecord`) for reading command scripts from CSV files
//! - A struct (`CycleRecord`) capturing one filter cycle for analysis
//! - `run_script` for driving a [`Localizer`] through a command sequence
//! - CSV import/export for both record types
//!
//! Command scripts make the interactive keyboard loop testable: a script is
//! a CSV with an `action` column holding `forward`, `backward`, `left`,
//! `right`, or `halt`, one command per row, with magnitudes supplied by the
//! filter configuration.

use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::filter::{Localizer, OutputSink, StepOutcome};
use crate::{Command, FilterConfig, FilterError};

/// One row of a command script.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CommandRecord {
    /// One of `forward`, `backward`, `left`, `right`, `halt`.
    pub action: String,
}

impl CommandRecord {
    /// Reads a CSV command script and returns the records in order.
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Vec<Self>, FilterError> {
        let mut rdr = csv::Reader::from_path(path)?;
        let mut records = Vec::new();
        for result in rdr.deserialize() {
            let record: Self = result?;
            records.push(record);
        }
        Ok(records)
    }

    /// Writes a command script to a CSV file.
    pub fn to_csv<P: AsRef<Path>>(records: &[Self], path: P) -> io::Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        for record in records {
            writer.serialize(record)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Map the action name to a [`Command`], with magnitudes from `config`.
    pub fn to_command(&self, config: &FilterConfig) -> Result<Command, FilterError> {
        match self.action.trim().to_lowercase().as_str() {
            "forward" => Ok(Command::Forward(config.step)),
            "backward" => Ok(Command::Backward(config.step)),
            "left" => Ok(Command::TurnLeft(config.turn)),
            "right" => Ok(Command::TurnRight(config.turn)),
            "halt" => Ok(Command::Halt),
            other => Err(FilterError::Parse(format!("unknown action {other:?}"))),
        }
    }
}

/// One completed filter cycle, flattened for CSV output.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CycleRecord {
    pub cycle: usize,
    pub true_x: f64,
    pub true_y: f64,
    pub true_theta: f64,
    pub est_x: f64,
    pub est_y: f64,
    pub corrected: bool,
}

impl CycleRecord {
    /// Writes cycle records to a CSV file.
    pub fn to_csv<P: AsRef<Path>>(records: &[Self], path: P) -> io::Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        for record in records {
            writer.serialize(record)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Reads cycle records back from a CSV file.
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Vec<Self>, FilterError> {
        let mut rdr = csv::Reader::from_path(path)?;
        let mut records = Vec::new();
        for result in rdr.deserialize() {
            let record: Self = result?;
            records.push(record);
        }
        Ok(records)
    }
}

/// Drive a localizer through a command sequence, collecting one
/// [`CycleRecord`] per completed cycle. Stops at the first halt (either a
/// [`Command::Halt`] in the script or an already-halted filter).
pub fn run_script(
    localizer: &mut Localizer,
    commands: &[Command],
    sink: &mut dyn OutputSink,
) -> Result<Vec<CycleRecord>, FilterError> {
    let mut records = Vec::new();
    for &command in commands {
        match localizer.step(command, sink)? {
            StepOutcome::Halted => break,
            StepOutcome::Cycle(report) => {
                let truth = localizer.true_pose();
                records.push(CycleRecord {
                    cycle: localizer.cycle_count(),
                    true_x: truth.x,
                    true_y: truth.y,
                    true_theta: truth.theta,
                    est_x: report.estimate.0,
                    est_y: report.estimate.1,
                    corrected: report.corrected,
                });
            }
        }
    }
    Ok(records)
}
