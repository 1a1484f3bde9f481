//! Import and export command handlers.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use feedgroups::Result;
use feedgroups::io::{ExportService, FetchObserver, ImportProgress, ImportReport, ImportService};

use super::App;

/// Prints one progress line per settled source.
struct ProgressPrinter;

impl FetchObserver for ProgressPrinter {
    fn batch_started(&self, pending: usize) {
        println!("Importing {pending} sources...");
    }

    fn item_settled(&self, progress: &ImportProgress) {
        print!(
            "\rSettled: {}/{} ({:.1}%) - Imported: {}, Failed: {}",
            progress.settled,
            progress.total,
            progress.percent_complete(),
            progress.imported,
            progress.failed,
        );
        let _ = std::io::stdout().flush();
    }

    fn batch_completed(&self, report: &ImportReport) {
        if report.total > 0 {
            println!();
        }
    }
}

/// Executes the import command.
pub async fn cmd_import(app: &App, file: &Path) -> Result<()> {
    let service = ImportService::new(Arc::clone(&app.store), Arc::clone(&app.catalog))
        .with_observer(Arc::new(ProgressPrinter));

    let report = service.import_from_file(file).await?;

    println!();
    println!("Import completed:");
    println!("  Sources:        {}", report.total);
    println!("  Imported:       {}", report.imported.len());
    println!("  Failed:         {}", report.failures.len());
    println!("  Groups created: {}", report.groups_created);

    if report.has_failures() {
        println!();
        println!("{}", report.summary());
    }
    Ok(())
}

/// Executes the export command.
pub fn cmd_export(app: &App, output: &Path) -> Result<()> {
    let service = ExportService::new(Arc::clone(&app.store), Arc::clone(&app.catalog))
        .with_title(app.config.export_title.clone());

    let result = service.export_to_file(output)?;

    println!("Export completed:");
    println!("  Groups:  {}", result.groups);
    println!("  Sources: {}", result.sources);
    if let Some(path) = result.output_path {
        println!("  Output:  {path}");
    }
    Ok(())
}
