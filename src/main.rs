use clap::Parser;
use dated_backup::backup::backup_config::BackupConfig;
use dated_backup::backup::result_error::error::Error;
use dated_backup::backup::result_error::WithMsg;
use std::fs::File;
use std::path::PathBuf;
use std::process::exit;
use tracing::{error, info, warn};
use validator::Validate;

/// Copy files by extension and whole folders into a dated backup folder
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Location of config file
    #[arg(short, long)]
    config: PathBuf,
}

fn main() {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let res = File::open(&args.config)
        .map_err(Error::from)
        .and_then(|f| {
            serde_yml::from_reader::<_, BackupConfig>(f)
                .map_err(Error::from)
                .with_msg(format!("Parse YAML config failed: {:?}", &args.config))
        })
        .and_then(|bc| {
            bc.validate()
                .map_err(Error::from)
                .map(|_| bc)
                .with_msg(format!("Config validation failed: {:?}", &args.config))
        })
        .and_then(|bc| bc.run());

    match res {
        Ok(summary) => {
            let report = summary.report();
            info!(
                "Backup into {:?} finished: {}",
                summary.session().date_folder(),
                report.counts()
            );
            for folder in report.folders() {
                info!(
                    "Folder {:?}: {} copied, {} skipped, {} failed, {}",
                    folder.source_folder(),
                    folder.files_copied(),
                    folder.files_skipped(),
                    folder.files_failed(),
                    folder.status()
                );
            }
            if !report.diagnostics().is_empty() {
                warn!(
                    "{} source locations could not be fully scanned",
                    report.diagnostics().len()
                );
            }
            info!("File log: {:?}", summary.logs().file_log());
            if let Some(folder_log) = summary.logs().folder_log() {
                info!("Folder log: {:?}", folder_log);
            }
        }
        Err(e) => {
            error!("{e}");
            exit(1);
        }
    }
}
