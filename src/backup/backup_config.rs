use crate::backup::destination::{DestinationResolver, FsDestination};
use crate::backup::file_ext::normalize_extensions;
use crate::backup::log_writer::{CsvLogWriter, LogWriter};
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::WithMsg;
use crate::backup::session::{BackupSession, SessionSummary};
use crate::backup::source_roots::{
    resolve_source_roots, FixedSourceRoots, SourceRootProvider, UserDirsProvider,
};
use crate::backup::validate::{validate_backup_root, validate_extensions, validate_folders};

use bon::Builder;
use chrono::{Local, NaiveDate};
use getset::Getters;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use validator::Validate;

use std::num::NonZero;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Parallelism used when none is configured; kept low so a network
/// destination is not flooded with concurrent writes.
pub static DEFAULT_MAX_PARALLELISM: usize = 4;

#[skip_serializing_none]
#[derive(Clone, Serialize, Deserialize, Debug, Validate, Builder, Getters)]
#[serde(deny_unknown_fields)]
#[getset(get = "pub")]
pub struct BackupConfig {
    /// Local path or mounted network share receiving the dated folders.
    #[validate(custom(function = validate_backup_root))]
    #[builder(into)]
    backup_root: Arc<Path>,
    /// Extensions collected from the source roots, case-insensitive, with or
    /// without the leading dot.
    #[validate(length(min = 1), custom(function = validate_extensions))]
    #[builder(into)]
    extensions: Vec<String>,
    /// Folders mirrored as a whole, structure preserved.
    #[serde(default)]
    #[validate(custom(function = validate_folders))]
    #[builder(default, into)]
    folders: Vec<PathBuf>,
    /// Clamped to the number of available cores.
    #[validate(range(min = 1))]
    max_parallelism: Option<usize>,
    /// Replaces the current user's well-known folders as discovery roots.
    source_roots: Option<Vec<PathBuf>>,
}

impl BackupConfig {
    pub fn effective_parallelism(&self) -> usize {
        let cores = std::thread::available_parallelism()
            .map(NonZero::get)
            .unwrap_or(1);
        self.max_parallelism
            .unwrap_or(DEFAULT_MAX_PARALLELISM)
            .min(cores)
            .max(1)
    }

    pub fn source_root_provider(&self) -> Box<dyn SourceRootProvider> {
        match &self.source_roots {
            Some(roots) => Box::new(FixedSourceRoots::from(roots.clone())),
            None => Box::new(UserDirsProvider),
        }
    }

    fn session<P: Into<Arc<Path>>>(
        &self,
        date_folder: P,
        source_roots: Vec<Arc<Path>>,
    ) -> BackupSession {
        BackupSession::builder()
            .backup_root(self.backup_root.clone())
            .date_folder(date_folder)
            .source_roots(source_roots)
            .extensions(normalize_extensions(&self.extensions))
            .folders(self.folders.iter().cloned().map(Arc::<Path>::from).collect_vec())
            .max_parallelism(self.effective_parallelism())
            .build()
    }

    /// Runs one backup into today's folder with the host adapters.
    pub fn run(&self) -> Result<SessionSummary> {
        self.run_with(
            &FsDestination::new(self.backup_root.clone()),
            self.source_root_provider().as_ref(),
            &CsvLogWriter::builder().build(),
            Local::now().date_naive(),
        )
    }

    /// Destination, sources and log writer are checked or used in that order;
    /// any error returned here is fatal for the session and no log is written.
    pub fn run_with<D, S, L>(
        &self,
        destination: &D,
        sources: &S,
        log_writer: &L,
        today: NaiveDate,
    ) -> Result<SessionSummary>
    where
        D: DestinationResolver + ?Sized,
        S: SourceRootProvider + ?Sized,
        L: LogWriter + ?Sized,
    {
        let date_folder = destination
            .resolve(today)
            .with_msg("Backup destination is not usable")?;

        let source_roots = resolve_source_roots(sources);
        if source_roots.is_empty() {
            return Err(Error::no_source_roots());
        }

        let session = self.session(date_folder, source_roots);
        tracing::info!(
            "Backing up {:?} from {} source roots and {} folders into {:?} with {} workers",
            session.extensions(),
            session.source_roots().len(),
            session.folders().len(),
            session.date_folder(),
            session.max_parallelism()
        );

        let pool = session.build_pool()?;
        let report = session.execute(&pool)?;
        let logs = log_writer.write_logs(&session, &report)?;

        Ok(SessionSummary::new(session, report, logs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::aggregator::{CopyStatus, FolderStatus};
    use std::fs::File;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    fn write_with_mtime(path: &Path, content: &str, mtime: SystemTime) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
        File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(mtime)
            .unwrap();
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 9).unwrap()
    }

    fn count_files(dir: &Path) -> usize {
        walkdir::WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .count()
    }

    struct Fixture {
        _home: TempDir,
        backup: TempDir,
        documents: PathBuf,
        projects: PathBuf,
        config: BackupConfig,
    }

    fn fixture() -> Fixture {
        let home = TempDir::new().unwrap();
        let backup = TempDir::new().unwrap();
        let documents = home.path().join("Documents");
        let desktop = home.path().join("Desktop");
        let projects = home.path().join("Projects");

        write_with_mtime(&documents.join("report.pdf"), "report v1", at(1_600_000_000));
        write_with_mtime(&documents.join("taxes/2023.PDF"), "taxes", at(1_600_000_100));
        write_with_mtime(&documents.join("budget.xlsx"), "budget", at(1_600_000_200));
        write_with_mtime(&desktop.join("todo.txt"), "ignored", at(1_600_000_300));
        write_with_mtime(&desktop.join("slides.pdf"), "slides", at(1_600_000_400));
        write_with_mtime(&projects.join("a.rs"), "a", at(1_600_000_500));
        write_with_mtime(&projects.join("nested/b.rs"), "b", at(1_600_000_600));
        write_with_mtime(&projects.join("nested/c.md"), "c", at(1_600_000_700));

        let config = BackupConfig::builder()
            .backup_root(backup.path().to_path_buf())
            .extensions(vec!["PDF".to_string(), ".xlsx".to_string()])
            .folders(vec![projects.clone()])
            .max_parallelism(2)
            .source_roots(vec![documents.clone(), desktop, home.path().join("Missing")])
            .build();

        Fixture {
            _home: home,
            backup,
            documents,
            projects,
            config,
        }
    }

    fn run(f: &Fixture, stamp: &str) -> Result<SessionSummary> {
        f.config.run_with(
            &FsDestination::new(f.config.backup_root().clone()),
            f.config.source_root_provider().as_ref(),
            &CsvLogWriter::builder().stamp(stamp).build(),
            today(),
        )
    }

    #[test]
    fn test_yaml_config_deserialization() {
        let yaml = r#"
backup_root: /mnt/nas/backup
extensions: [pdf, .DOCX, xlsx]
folders:
  - /home/u/Projects
max_parallelism: 3
"#;
        let config: BackupConfig = serde_yml::from_str(yaml).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.backup_root().as_ref(), Path::new("/mnt/nas/backup"));
        assert_eq!(config.extensions().len(), 3);
        assert_eq!(config.folders(), &vec![PathBuf::from("/home/u/Projects")]);
        assert_eq!(config.max_parallelism(), &Some(3));
        assert!(config.source_roots().is_none());
    }

    #[test]
    fn test_yaml_config_rejects_unknown_fields() {
        let yaml = "backup_root: /b\nextensions: [pdf]\nschedule: daily\n";
        assert!(serde_yml::from_str::<BackupConfig>(yaml).is_err());
    }

    #[test]
    fn test_config_validation_failures() {
        let no_extensions = BackupConfig::builder()
            .backup_root(PathBuf::from("/b"))
            .extensions(Vec::<String>::new())
            .build();
        assert!(no_extensions.validate().is_err());

        let bad_extension = BackupConfig::builder()
            .backup_root(PathBuf::from("/b"))
            .extensions(vec!["p/df".to_string()])
            .build();
        assert!(bad_extension.validate().is_err());

        let zero_parallelism = BackupConfig::builder()
            .backup_root(PathBuf::from("/b"))
            .extensions(vec!["pdf".to_string()])
            .max_parallelism(0)
            .build();
        assert!(zero_parallelism.validate().is_err());

        let unnamed_folder = BackupConfig::builder()
            .backup_root(PathBuf::from("/b"))
            .extensions(vec!["pdf".to_string()])
            .folders(vec![PathBuf::from("/")])
            .build();
        assert!(unnamed_folder.validate().is_err());

        let multi_part: BackupConfig =
            serde_yml::from_str("backup_root: /b\nextensions: [pdf, tar.gz]\n").unwrap();
        assert!(multi_part.validate().is_err());
    }

    #[test]
    fn test_config_serialization_skips_none() {
        let config = BackupConfig::builder()
            .backup_root(PathBuf::from("/b"))
            .extensions(vec!["pdf".to_string()])
            .build();
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("max_parallelism"));
        assert!(!json.contains("source_roots"));
        let back: BackupConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.extensions(), config.extensions());
    }

    #[test]
    fn test_effective_parallelism_is_bounded() {
        let cores = std::thread::available_parallelism().map(NonZero::get).unwrap_or(1);
        let config = BackupConfig::builder()
            .backup_root(PathBuf::from("/b"))
            .extensions(vec!["pdf".to_string()])
            .max_parallelism(1024)
            .build();
        assert_eq!(config.effective_parallelism(), cores.min(1024));

        let default = BackupConfig::builder()
            .backup_root(PathBuf::from("/b"))
            .extensions(vec!["pdf".to_string()])
            .build();
        assert_eq!(default.effective_parallelism(), cores.min(DEFAULT_MAX_PARALLELISM));
    }

    #[test]
    fn test_full_run_then_idempotent_rerun() {
        let f = fixture();

        let first = run(&f, "first").unwrap();
        let date_folder = f.backup.path().join("2024-03-09");
        assert_eq!(first.session().date_folder().as_ref(), date_folder.as_path());
        assert_eq!(first.report().counts().success, 4);
        assert_eq!(first.report().counts().total(), first.report().outcomes().len());
        assert!(date_folder.join("pdf/report.pdf").is_file());
        assert!(date_folder.join("pdf/2023.PDF").is_file());
        assert!(date_folder.join("pdf/slides.pdf").is_file());
        assert!(date_folder.join("xlsx/budget.xlsx").is_file());
        assert!(!date_folder.join("txt").exists());
        assert!(date_folder.join("Projects/nested/c.md").is_file());
        assert_eq!(first.report().folders()[0].files_copied(), 3);
        assert_eq!(
            std::fs::metadata(date_folder.join("pdf/report.pdf")).unwrap().modified().unwrap(),
            at(1_600_000_000)
        );
        assert!(first.logs().file_log().is_file());
        assert!(first.logs().folder_log().as_ref().unwrap().is_file());

        let copied_files = count_files(&date_folder.join("pdf")) + count_files(&date_folder.join("xlsx"));
        let second = run(&f, "second").unwrap();
        assert_eq!(second.report().counts().success, 0);
        assert_eq!(second.report().counts().skipped, 4);
        assert!(second
            .report()
            .outcomes()
            .iter()
            .all(|o| o.status() == &CopyStatus::SkippedIdentical));
        assert_eq!(second.report().folders()[0].files_copied(), 0);
        assert_eq!(second.report().folders()[0].files_skipped(), 3);
        assert_eq!(
            count_files(&date_folder.join("pdf")) + count_files(&date_folder.join("xlsx")),
            copied_files
        );

        // sources untouched
        assert_eq!(std::fs::read_to_string(f.documents.join("report.pdf")).unwrap(), "report v1");
        assert_eq!(
            std::fs::metadata(f.projects.join("a.rs")).unwrap().modified().unwrap(),
            at(1_600_000_500)
        );
    }

    #[test]
    fn test_changed_source_is_versioned_and_folder_file_overwritten() {
        let f = fixture();
        run(&f, "first").unwrap();

        write_with_mtime(&f.documents.join("report.pdf"), "report v2, longer", at(1_700_000_000));
        write_with_mtime(&f.projects.join("a.rs"), "a changed", at(1_700_000_000));
        let second = run(&f, "second").unwrap();

        let date_folder = f.backup.path().join("2024-03-09");
        assert_eq!(second.report().counts().success, 1);
        assert_eq!(second.report().counts().skipped, 3);
        assert_eq!(std::fs::read_to_string(date_folder.join("pdf/report.pdf")).unwrap(), "report v1");
        assert_eq!(
            std::fs::read_to_string(date_folder.join("pdf/report_1.pdf")).unwrap(),
            "report v2, longer"
        );
        assert_eq!(std::fs::read_to_string(date_folder.join("Projects/a.rs")).unwrap(), "a changed");
        assert!(!date_folder.join("Projects/a_1.rs").exists());
        assert_eq!(second.report().folders()[0].files_copied(), 1);
        assert_eq!(second.report().folders()[0].files_skipped(), 2);
    }

    #[test]
    fn test_missing_folder_gets_failed_row_in_folder_log() {
        let f = fixture();
        let gone = f.projects.with_file_name("GoneFolder");
        let config = BackupConfig::builder()
            .backup_root(f.backup.path().to_path_buf())
            .extensions(vec!["pdf".to_string()])
            .folders(vec![gone.clone(), f.projects.clone()])
            .source_roots(vec![f.documents.clone()])
            .build();

        let summary = config
            .run_with(
                &FsDestination::new(config.backup_root().clone()),
                config.source_root_provider().as_ref(),
                &CsvLogWriter::builder().stamp("gone").build(),
                today(),
            )
            .unwrap();

        let folders = summary.report().folders();
        assert_eq!(folders.len(), 2);
        assert!(matches!(folders[0].status(), FolderStatus::Failed(_)));
        assert_eq!(folders[1].files_copied(), 3);

        let folder_log = summary.logs().folder_log().clone().unwrap();
        let rows = std::fs::read_to_string(folder_log).unwrap();
        let rows: Vec<_> = rows.lines().collect();
        assert_eq!(rows.len(), 3);
        assert!(rows[1].starts_with(&format!("{},", gone.display())));
        assert!(rows[1].contains(",0,0,0,"));
        assert!(rows[1].contains("Failed: Source folder"));
        assert!(rows[2].ends_with(",Success"));
    }

    #[test]
    fn test_no_source_roots_is_fatal() {
        let backup = TempDir::new().unwrap();
        let config = BackupConfig::builder()
            .backup_root(backup.path().to_path_buf())
            .extensions(vec!["pdf".to_string()])
            .source_roots(vec![backup.path().join("nowhere")])
            .build();

        let err = config
            .run_with(
                &FsDestination::new(config.backup_root().clone()),
                config.source_root_provider().as_ref(),
                &CsvLogWriter::builder().stamp("x").build(),
                today(),
            )
            .unwrap_err();
        assert!(matches!(err, Error::NoSourceRoots));
        assert!(!backup.path().join("2024-03-09/backup_log_x.csv").exists());
    }

    #[test]
    fn test_empty_discovery_writes_no_log() {
        let home = TempDir::new().unwrap();
        let backup = TempDir::new().unwrap();
        std::fs::write(home.path().join("notes.txt"), "x").unwrap();
        let config = BackupConfig::builder()
            .backup_root(backup.path().to_path_buf())
            .extensions(vec!["pdf".to_string()])
            .source_roots(vec![home.path().to_path_buf()])
            .build();

        let err = config
            .run_with(
                &FsDestination::new(config.backup_root().clone()),
                config.source_root_provider().as_ref(),
                &CsvLogWriter::builder().stamp("x").build(),
                today(),
            )
            .unwrap_err();
        assert!(matches!(err.root(), Error::EmptyDiscovery { .. }));
        assert!(!backup.path().join("2024-03-09/backup_log_x.csv").exists());
    }

    #[test]
    fn test_destination_failure_aborts_before_discovery() {
        let f = fixture();
        let blocker = f.backup.path().join("blocker");
        std::fs::write(&blocker, "x").unwrap();

        let err = f
            .config
            .run_with(
                &FsDestination::new(blocker),
                f.config.source_root_provider().as_ref(),
                &CsvLogWriter::builder().stamp("x").build(),
                today(),
            )
            .unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(err.root(), Error::DestinationInaccessible { .. }));
        assert!(!f.backup.path().join("2024-03-09").exists());
    }
}
