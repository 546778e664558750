//! CLI Application logic
//!
//! Contains the command-line interface implementation.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use doctwig_core::{CodeKind, NodeId, ParseOptions, RepairConfig, TemplateDocument, Tree, VarSet};
use doctwig_package::TemplatePackage;

/// Local file header signature of a zip container
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// Output format for listings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    #[default]
    Text,
    /// JSON output for tool consumption
    Json,
}

#[derive(Parser)]
#[command(name = "doctwig")]
#[command(author, version, about = "Twig templates inside word-processor documents", long_about = None)]
struct Cli {
    /// Log repair decisions (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the variables a template reads
    Vars {
        /// ODT/DOCX package or bare XML part
        input: PathBuf,

        /// Only list variables starting with this prefix
        #[arg(short, long)]
        prefix: Option<String>,

        /// Output format (text or json)
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Charset of a bare XML part without declaration
        #[arg(long)]
        charset: Option<String>,
    },

    /// Repair template code so it renders without breaking the markup
    Prepare {
        /// ODT/DOCX package or bare XML part
        input: PathBuf,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,

        /// Repair configuration (TOML); defaults to the package preset
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Charset of a bare XML part without declaration
        #[arg(long)]
        charset: Option<String>,
    },

    /// Show the code relations and unpaired code of a template
    Inspect {
        /// ODT/DOCX package or bare XML part
        input: PathBuf,

        /// Output format (text or json)
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Charset of a bare XML part without declaration
        #[arg(long)]
        charset: Option<String>,
    },
}

/// Run the CLI application
///
/// This is the main entry point for the command-line interface.
/// It parses arguments and dispatches to the appropriate command.
pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Vars {
            input,
            prefix,
            format,
            charset,
        } => {
            vars_command(&input, prefix.as_deref(), format, charset.as_deref())?;
        }
        Commands::Prepare {
            input,
            output,
            config,
            charset,
        } => {
            prepare_command(&input, &output, config.as_deref(), charset.as_deref())?;
        }
        Commands::Inspect {
            input,
            format,
            charset,
        } => {
            inspect_command(&input, format, charset.as_deref())?;
        }
    }

    Ok(())
}

/// Log to stderr, filtered by RUST_LOG (default `warn`)
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    // A subscriber may already be installed when embedded
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// A loaded command input
#[derive(Debug)]
pub enum Input {
    /// ODT or DOCX container
    Package(TemplatePackage),
    /// A single XML part
    Part(TemplateDocument),
}

/// Load a package or a bare XML part, telling them apart by content
pub fn load_input(path: &Path, charset: Option<&str>) -> Result<Input> {
    if !path.exists() {
        anyhow::bail!("Input file not found: {}", path.display());
    }
    let bytes =
        fs::read(path).with_context(|| format!("Failed to read input: {}", path.display()))?;

    if bytes.starts_with(ZIP_MAGIC) {
        let package = TemplatePackage::from_bytes(&bytes)
            .with_context(|| format!("Failed to open package: {}", path.display()))?;
        return Ok(Input::Package(package));
    }

    let options = match charset {
        Some(label) => ParseOptions::with_default_charset(label)
            .with_context(|| format!("Unknown charset: {}", label))?,
        None => ParseOptions::default(),
    };
    let document = TemplateDocument::parse_with(bytes.as_slice(), &options)
        .with_context(|| format!("Failed to parse template: {}", path.display()))?;
    Ok(Input::Part(document))
}

/// Variables read by a package or part
pub fn collect_vars(input: &Path, prefix: Option<&str>, charset: Option<&str>) -> Result<VarSet> {
    match load_input(input, charset)? {
        Input::Package(package) => package
            .vars(prefix)
            .with_context(|| format!("Failed to extract variables: {}", input.display())),
        Input::Part(document) => Ok(document.vars(prefix)),
    }
}

/// Execute the vars command
pub fn vars_command(
    input: &Path,
    prefix: Option<&str>,
    format: OutputFormat,
    charset: Option<&str>,
) -> Result<()> {
    let vars = collect_vars(input, prefix, charset)?;

    match format {
        OutputFormat::Json => {
            let json =
                serde_json::to_string_pretty(&vars).context("Failed to serialize variables")?;
            println!("{}", json);
        }
        OutputFormat::Text => {
            for name in vars.iter() {
                println!("{}", name);
            }
        }
    }

    Ok(())
}

/// Execute the prepare command
pub fn prepare_command(
    input: &Path,
    output: &Path,
    config: Option<&Path>,
    charset: Option<&str>,
) -> Result<()> {
    println!("doctwig v{}", doctwig_core::VERSION);
    println!("Preparing: {}", input.display());

    let config = config
        .map(|path| {
            RepairConfig::load(path)
                .with_context(|| format!("Failed to load configuration: {}", path.display()))
        })
        .transpose()?;

    match load_input(input, charset)? {
        Input::Package(mut package) => {
            let config = config.unwrap_or_else(|| package.kind().repair_config());
            let summaries = package
                .prepare(&config)
                .with_context(|| format!("Failed to prepare package: {}", input.display()))?;
            package
                .write_to_file(output)
                .with_context(|| format!("Failed to write package: {}", output.display()))?;

            for summary in &summaries {
                println!(
                    "  {}: {} edits, {} moved",
                    summary.name, summary.edits, summary.moved
                );
                warn_unrepaired(&summary.name, summary.left_in_place, summary.unresolved);
            }
        }
        Input::Part(mut document) => {
            let config = config.unwrap_or_default();
            let report = document.repair(&config);
            let bytes = document
                .to_bytes()
                .context("Failed to serialize repaired template")?;
            fs::write(output, bytes)
                .with_context(|| format!("Failed to write output: {}", output.display()))?;

            println!("  {} edits, {} moved", report.len(), report.moved());
            let name = input.display().to_string();
            warn_unrepaired(
                &name,
                report.left_in_place().count(),
                document.codes().unresolved().len(),
            );
        }
    }

    println!("  Created: {}", output.display());
    Ok(())
}

fn warn_unrepaired(part: &str, left_in_place: usize, unresolved: usize) {
    if left_in_place > 0 {
        println!("  warning: {}: {} relation(s) left in place", part, left_in_place);
    }
    if unresolved > 0 {
        println!("  warning: {}: {} unpaired code token(s)", part, unresolved);
    }
}

/// Code found in one template part
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InspectedPart {
    pub name: String,
    pub charset: String,
    pub relations: Vec<InspectedRelation>,
    pub unresolved: Vec<String>,
}

/// One paired code construct
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InspectedRelation {
    pub keyword: String,
    pub kind: String,
    pub members: Vec<String>,
}

impl InspectedPart {
    fn new(name: impl Into<String>, document: &TemplateDocument) -> Self {
        let tree = document.tree();
        let codes = document.codes();
        Self {
            name: name.into(),
            charset: document.encoding().name().to_string(),
            relations: codes
                .relations()
                .iter()
                .map(|relation| InspectedRelation {
                    keyword: relation.keyword().to_string(),
                    kind: kind_name(relation.kind()).to_string(),
                    members: relation
                        .members()
                        .iter()
                        .map(|&id| code_text(tree, id))
                        .collect(),
                })
                .collect(),
            unresolved: codes
                .unresolved()
                .iter()
                .map(|&id| code_text(tree, id))
                .collect(),
        }
    }
}

fn kind_name(kind: CodeKind) -> &'static str {
    match kind {
        CodeKind::Block => "block",
        CodeKind::Output => "output",
        CodeKind::Comment => "comment",
        CodeKind::None => "none",
    }
}

fn code_text(tree: &Tree, id: NodeId) -> String {
    let element = tree.get(id);
    element
        .start
        .as_ref()
        .or(element.end.as_ref())
        .map(|tag| tag.as_str(tree.source()).to_string())
        .unwrap_or_default()
}

/// Code relations of every template part of the input
pub fn inspect(input: &Path, charset: Option<&str>) -> Result<Vec<InspectedPart>> {
    match load_input(input, charset)? {
        Input::Package(package) => package
            .template_parts()
            .into_iter()
            .map(|part| {
                let document = package
                    .document(part)
                    .with_context(|| format!("Failed to parse part: {}", part))?;
                Ok(InspectedPart::new(part, &document))
            })
            .collect::<Result<Vec<_>>>(),
        Input::Part(document) => Ok(vec![InspectedPart::new(
            input.display().to_string(),
            &document,
        )]),
    }
}

/// Execute the inspect command
pub fn inspect_command(input: &Path, format: OutputFormat, charset: Option<&str>) -> Result<()> {
    let parts = inspect(input, charset)?;

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&parts).context("Failed to serialize report")?;
            println!("{}", json);
        }
        OutputFormat::Text => {
            for part in &parts {
                println!("{} ({})", part.name, part.charset);
                if part.relations.is_empty() && part.unresolved.is_empty() {
                    println!("  no template code");
                }
                for relation in &part.relations {
                    println!(
                        "  {} [{}]: {}",
                        relation.keyword,
                        relation.kind,
                        relation.members.join(" ... ")
                    );
                }
                for code in &part.unresolved {
                    println!("  unpaired: {}", code);
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_vars() {
        let cli = Cli::try_parse_from([
            "doctwig", "vars", "invoice.odt", "--prefix", "customer.", "--format", "json",
        ])
        .unwrap();
        match cli.command {
            Commands::Vars {
                input,
                prefix,
                format,
                charset,
            } => {
                assert_eq!(input, PathBuf::from("invoice.odt"));
                assert_eq!(prefix.as_deref(), Some("customer."));
                assert_eq!(format, OutputFormat::Json);
                assert!(charset.is_none());
            }
            _ => panic!("Expected Vars command"),
        }
        assert!(!cli.verbose);
    }

    #[test]
    fn test_cli_parse_prepare() {
        let cli = Cli::try_parse_from([
            "doctwig", "-v", "prepare", "in.docx", "-o", "out.docx", "--config", "repair.toml",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Prepare { output, config, .. } => {
                assert_eq!(output, PathBuf::from("out.docx"));
                assert_eq!(config, Some(PathBuf::from("repair.toml")));
            }
            _ => panic!("Expected Prepare command"),
        }
    }

    #[test]
    fn test_cli_prepare_requires_output() {
        assert!(Cli::try_parse_from(["doctwig", "prepare", "in.docx"]).is_err());
    }

    #[test]
    fn test_cli_parse_inspect_default_format() {
        let cli = Cli::try_parse_from(["doctwig", "inspect", "content.xml"]).unwrap();
        match cli.command {
            Commands::Inspect { format, .. } => assert_eq!(format, OutputFormat::Text),
            _ => panic!("Expected Inspect command"),
        }
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(kind_name(CodeKind::Block), "block");
        assert_eq!(kind_name(CodeKind::Output), "output");
        assert_eq!(kind_name(CodeKind::Comment), "comment");
    }
}
