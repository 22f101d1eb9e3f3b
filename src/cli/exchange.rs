//! Export and import commands

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::Subcommand;

use super::app::{resolve_path, Session};
use crate::domain::{NodeType, Project};
use crate::exchange::{
    export_bom, export_components_to_csv, export_project_to_markdown, export_to_json,
    import_from_json, import_from_markdown, CsvField, ExchangeError, MarkdownImportOptions,
};
use crate::storage::{project_name, Config, FileAdapter, ListOptions, ParseError, PROJECT_FILE};

#[derive(Subcommand)]
pub enum ExportCommands {
    /// Export the whole project as a JSON envelope
    Json {
        /// Write to a file instead of stdout
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Single-line JSON
        #[arg(long)]
        compact: bool,
    },

    /// Write every node as a Markdown file tree
    Markdown {
        /// Destination directory
        #[arg(long, short = 'o')]
        out_dir: PathBuf,
    },

    /// Export components as CSV
    Csv {
        /// Write to a file instead of stdout
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Prefix a UTF-8 byte order mark
        #[arg(long = "utf8-bom")]
        utf8_bom: bool,

        /// Columns to include, comma separated (e.g. title,partNumber,cost)
        #[arg(long = "fields", value_delimiter = ',')]
        fields: Vec<CsvField>,
    },

    /// Export the bill of materials as CSV
    Bom {
        /// Write to a file instead of stdout
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Prefix a UTF-8 byte order mark
        #[arg(long = "utf8-bom")]
        utf8_bom: bool,
    },
}

#[derive(Subcommand)]
pub enum ImportCommands {
    /// Import a JSON export
    Json {
        /// Exported JSON file
        file: PathBuf,

        /// New project directory
        #[arg(long)]
        into: PathBuf,
    },

    /// Import a Markdown file tree
    Markdown {
        /// Folder containing the node files
        dir: PathBuf,

        /// New project directory
        #[arg(long)]
        into: PathBuf,

        /// On duplicate ids let later files replace earlier ones
        #[arg(long)]
        replace: bool,
    },
}

pub fn export(session: &Session, cmd: ExportCommands) -> Result<()> {
    let project = session.load()?.project;

    match cmd {
        ExportCommands::Json { output, compact } => {
            let mut options = session.config.project.export.json_options();
            if compact {
                options.pretty_print = false;
            }
            let json = export_to_json(&project, &options)?;
            emit(session, output.as_deref(), &json)
        }
        ExportCommands::Markdown { out_dir } => {
            let files = export_project_to_markdown(&project)?;
            let adapter = session.store.adapter();
            for (relative, content) in &files {
                let path = out_dir.join(relative);
                adapter
                    .write_file(&path, content)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
            }
            session.output.success(&format!(
                "Exported {} files to {}",
                files.len(),
                out_dir.display()
            ));
            Ok(())
        }
        ExportCommands::Csv {
            output,
            utf8_bom,
            fields,
        } => {
            let mut options = session.config.project.csv.csv_options();
            options.include_bom |= utf8_bom;
            if !fields.is_empty() {
                options.fields = fields;
            }
            let components = project.nodes_of_type(NodeType::Component);
            let csv = export_components_to_csv(components, &options);
            emit(session, output.as_deref(), &csv)
        }
        ExportCommands::Bom { output, utf8_bom } => {
            let bom = export_bom(&project);
            if session.output.is_json() && output.is_none() {
                session.output.data(&bom);
                return Ok(());
            }
            let include_bom = utf8_bom || session.config.project.csv.include_bom;
            emit(session, output.as_deref(), &bom.to_csv(include_bom))
        }
    }
}

/// Writes to a file, or prints to stdout
fn emit(session: &Session, output: Option<&Path>, content: &str) -> Result<()> {
    match output {
        Some(path) => {
            fs::write(path, content)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            session
                .output
                .success(&format!("Wrote {}", path.display()));
        }
        None => {
            print!("{}", content);
            if !content.ends_with('\n') {
                println!();
            }
        }
    }
    Ok(())
}

fn describe(session: &Session, error: ExchangeError) -> anyhow::Error {
    if let ExchangeError::Validation { issues } = &error {
        for issue in issues {
            session.output.warn(&issue.to_string());
        }
    }
    anyhow!("[{}] {}", error.code(), error)
}

/// Writes an imported project into a brand-new project directory
fn write_imported(session: &Session, into: &Path, mut project: Project, parse_errors: &[ParseError]) -> Result<()> {
    let into = resolve_path(into)?;
    session
        .store
        .initialize(&into)
        .with_context(|| format!("Cannot import into {}", into.display()))?;
    Config::write_default_project_config(&into)?;

    project.path = into.clone();
    session.store.save_project(&project)?;

    if session.output.is_json() {
        session.output.data(&serde_json::json!({
            "imported": project.nodes.len(),
            "into": into.display().to_string(),
            "parseErrors": parse_errors,
        }));
    } else {
        session.output.parse_errors(parse_errors);
        session.output.success(&format!(
            "Imported {} nodes into {}",
            project.nodes.len(),
            into.display()
        ));
    }
    Ok(())
}

/// Collects a folder's files keyed by `/`-separated relative path.
///
/// Only `.md` files and `project.json` are read; other files are listed with
/// empty content so an import can tell "wrong folder" from "empty folder".
fn collect_files(session: &Session, dir: &Path) -> Result<BTreeMap<String, String>> {
    let adapter = session.store.adapter();
    let options = ListOptions {
        extension: None,
        recursive: true,
    };
    let paths = adapter
        .list_directory(dir, &options)
        .with_context(|| format!("Failed to read directory {}", dir.display()))?;

    let mut files = BTreeMap::new();
    for path in paths {
        let relative = path.strip_prefix(dir).unwrap_or(&path);
        let key = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");

        let wanted = path.extension().is_some_and(|e| e == "md")
            || path.file_name().is_some_and(|n| n == PROJECT_FILE);
        let content = if wanted {
            adapter
                .read_file(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?
        } else {
            String::new()
        };
        files.insert(key, content);
    }
    Ok(files)
}

pub fn import(session: &Session, cmd: ImportCommands) -> Result<()> {
    match cmd {
        ImportCommands::Json { file, into } => {
            let text = fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let imported = import_from_json(&text).map_err(|e| describe(session, e))?;
            write_imported(session, &into, imported.project, &[])
        }
        ImportCommands::Markdown { dir, into, replace } => {
            let dir = resolve_path(&dir)?;
            let files = collect_files(session, &dir)?;
            let options = MarkdownImportOptions {
                merge_mode: !replace,
            };
            let imported = import_from_markdown(&files, &project_name(&dir), &options)
                .map_err(|e| describe(session, e))?;
            write_imported(session, &into, imported.project, &imported.parse_errors)
        }
    }
}
