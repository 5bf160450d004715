pub mod campaign;
pub mod config;
pub mod deflation;
pub mod error;
pub mod output;
pub mod ranges;
pub mod table;

pub use campaign::{
    correlator_range, CampaignReport, Observables, SampleFailure, SectorRun, SweepCampaign,
};
pub use config::{CampaignConfig, ComputeFlags, InitialState, OutputConfig, SweepSchedule};
pub use deflation::ExcitedStateDeflator;
pub use error::{SimError, SimResult};
pub use output::{output_csv_filename, write_csv, CsvFormat};
pub use ranges::{linspace, CouplingRange};
pub use table::ResultTable;
