//! Command dispatch: resolves settings, reads input and runs the hierarchy service.

use std::io::{self, Read};
use std::path::{Path, PathBuf};

use clap::CommandFactory;
use clap_complete::generate;
use tracing::{debug, instrument};

use crate::application::services::{HierarchyReport, HierarchyService, RecordSet};
use crate::cli::args::{Cli, Commands, ConfigCommands};
use crate::cli::output;
use crate::cli::{CliError, CliResult};
use crate::config::{global_config_path, local_config_path, Settings};
use crate::exitcode;
use crate::infrastructure::di::ServiceContainer;
use crate::infrastructure::InfraError;

/// Run the parsed command line, returning the process exit code.
pub fn execute_command(cli: &Cli) -> CliResult<i32> {
    let Some(command) = &cli.command else {
        return Err(CliError::Usage(
            "no command given, see 'hiersort --help'".to_string(),
        ));
    };

    if let Commands::Completion { shell } = command {
        let mut cmd = Cli::command();
        let name = cmd.get_name().to_string();
        generate(*shell, &mut cmd, name, &mut io::stdout());
        return Ok(exitcode::OK);
    }

    let settings = resolve_settings(cli)?;
    debug!("effective settings: {:?}", settings);

    match command {
        Commands::Sort {
            file,
            format,
            output: output_path,
        } => {
            let mut settings = settings;
            if let Some(format) = format {
                settings.output.format = *format;
            }
            cmd_sort(settings, file.as_deref(), output_path.as_deref())
        }
        Commands::Tree { file, label } => {
            let mut settings = settings;
            if label.is_some() {
                settings.output.label_property = label.clone();
            }
            cmd_tree(settings, file.as_deref())
        }
        Commands::Check { file } => cmd_check(settings, file.as_deref()),
        Commands::Config { command } => cmd_config(&settings, cli.project_dir.as_deref(), command),
        Commands::Completion { .. } => Ok(exitcode::OK),
    }
}

/// Layered settings with command line flags applied last.
fn resolve_settings(cli: &Cli) -> CliResult<Settings> {
    let mut settings = Settings::load(Some(project_dir(cli)?.as_path()))?;

    if let Some(id) = &cli.id_property {
        settings.collection.id_property = id.clone();
    }
    if let Some(node) = &cli.node_property {
        settings.collection.node_property = node.clone();
    }
    if let Some(parent) = &cli.parent_property {
        settings.collection.parent_property = parent.clone();
    }
    if let Some(policy) = cli.policy {
        settings.branch_policy = policy;
    }
    if let Some(pointer) = &cli.pointer {
        settings.records_pointer = Some(pointer.clone());
    }

    settings
        .validate()
        .map_err(|e| CliError::InvalidArgs(e.to_string()))?;
    Ok(settings)
}

fn project_dir(cli: &Cli) -> CliResult<PathBuf> {
    match &cli.project_dir {
        Some(dir) => Ok(dir.clone()),
        None => std::env::current_dir().map_err(|e| InfraError::io("current directory", e).into()),
    }
}

/// Load records from a file, or from stdin for `None` / `-`.
fn read_records(service: &HierarchyService, file: Option<&Path>) -> CliResult<RecordSet> {
    match file {
        Some(path) if path != Path::new("-") => Ok(service.load(path)?),
        _ => {
            let mut content = String::new();
            io::stdin()
                .read_to_string(&mut content)
                .map_err(|e| InfraError::io("read stdin", e))?;
            Ok(service.parse(&content, "<stdin>")?)
        }
    }
}

#[instrument(skip(settings))]
fn cmd_sort(settings: Settings, file: Option<&Path>, output_path: Option<&Path>) -> CliResult<i32> {
    let format = settings.output.format;
    let service = ServiceContainer::new(settings).hierarchy_service();
    let set = read_records(&service, file)?;

    let sorted = service.sort(&set)?;
    let text = service.render(&sorted, format)?;

    match output_path {
        Some(path) => {
            service.write_output(path, &text)?;
            output::action(
                "Sorted",
                &format!("{} records -> {}", sorted.len(), path.display()),
            );
        }
        None => output::data(&text),
    }
    Ok(exitcode::OK)
}

#[instrument(skip(settings))]
fn cmd_tree(settings: Settings, file: Option<&Path>) -> CliResult<i32> {
    let service = ServiceContainer::new(settings).hierarchy_service();
    let set = read_records(&service, file)?;

    let tree = service.tree(&set)?;
    output::info(&tree);
    Ok(exitcode::OK)
}

#[instrument(skip(settings))]
fn cmd_check(settings: Settings, file: Option<&Path>) -> CliResult<i32> {
    let service = ServiceContainer::new(settings).hierarchy_service();
    let set = read_records(&service, file)?;

    let report = service.check(&set)?;
    print_report(&report);

    if report.is_clean() {
        Ok(exitcode::OK)
    } else {
        Ok(exitcode::DATAERR)
    }
}

fn print_report(report: &HierarchyReport) {
    output::header(&report.origin);
    output::detail(&format!(
        "{} records, {} branches",
        report.records, report.branches
    ));
    if let (Some(emitted), Some(depth)) = (report.emitted, report.depth) {
        output::detail(&format!("{} emitted, depth {}", emitted, depth));
    }

    if report.duplicate_ids.is_empty() {
        output::check_ok("identifiers unique");
    } else {
        output::check_failed(&format!(
            "duplicate identifiers: {}",
            report.duplicate_ids.join(", ")
        ));
    }

    if report.orphans.is_empty() {
        output::check_ok("every parent resolves");
    } else {
        output::check_failed(&format!("orphan records: {}", report.orphans.join(", ")));
    }

    match report.unreached.as_deref() {
        Some([]) => output::check_ok("every record reached"),
        Some(unreached) => output::check_failed(&format!(
            "records never emitted: {}",
            unreached.join(", ")
        )),
        None => {}
    }

    if report.missing_fields.is_empty() {
        output::check_ok("configured fields present");
    } else {
        output::check_failed(&format!(
            "fields on no record: {}",
            report.missing_fields.join(", ")
        ));
    }

    match &report.cycle {
        None => output::check_ok("no cycles"),
        Some(cycle) => output::check_failed(cycle),
    }
}

fn cmd_config(
    settings: &Settings,
    project_dir: Option<&Path>,
    command: &ConfigCommands,
) -> CliResult<i32> {
    match command {
        ConfigCommands::Show => output::info(&settings.to_toml()?),
        ConfigCommands::Path => {
            match global_config_path() {
                Some(path) => output::action("global", &path.display()),
                None => output::warning("no global config directory on this platform"),
            }
            let dir = project_dir.map_or_else(|| PathBuf::from("."), Path::to_path_buf);
            output::action("local", &local_config_path(&dir).display());
        }
        ConfigCommands::Template => output::info(&Settings::template()),
    }
    Ok(exitcode::OK)
}
