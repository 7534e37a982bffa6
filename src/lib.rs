//! # dated-backup
//!
//! A one-shot backup tool that gathers user files by extension and mirrors
//! whole folders into a dated folder on a local or network destination.
//!
//! ## Features
//!
//! - **Extension Collection**: Recursive, case-insensitive discovery under the user's well-known folders
//! - **Dated Destinations**: Every run lands in `<backup_root>/<YYYY-MM-DD>/`
//! - **Never Overwrites**: Same-named files are kept side by side as `name_1.ext`, `name_2.ext`, ...
//! - **Idempotent Reruns**: Files already backed up with the same size and timestamp are skipped
//! - **Folder Mirrors**: Whole folders copied with their structure preserved
//! - **CSV Logs**: Per-file and per-folder logs next to the backed up data
//! - **Parallel Processing**: Bounded worker pool for discovery and copying
//!
//! ## Quick Start
//!
//! ```no_run
//! use dated_backup::backup::backup_config::BackupConfig;
//!
//! // Load configuration from YAML file
//! let config: BackupConfig = serde_yml::from_reader(std::fs::File::open("config.yml")?)?;
//!
//! // Run one backup session
//! let summary = config.run()?;
//! println!("{}", summary.report().counts());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod backup;
