use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use signease_core::{AnnotationId, Point, SignaturePad};
use signease_verify::DisplayFormat;

use crate::busy::LogIndicator;
use crate::config::{config_path, load_config_from, AppConfig, ConfigError};
use crate::error::{AppError, Operation};
use crate::session::{validate_document, EditingSession};
use crate::transport::HttpStore;

#[derive(Debug, Parser)]
#[command(name = "signease")]
#[command(about = "Place signatures, stamps and text on PDFs, and verify signed copies")]
pub struct Cli {
    /// Configuration file (defaults to the per-user config dir).
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Log at debug level.
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Apply a placement plan to a PDF, flatten it and upload the result.
    Sign {
        #[arg(value_name = "INPUT")]
        input: Option<PathBuf>,
        /// JSON placement plan.
        #[arg(long, value_name = "PLAN")]
        plan: PathBuf,
        /// Server-relative path of a document to load instead of INPUT.
        #[arg(long, value_name = "PATH")]
        handoff: Option<String>,
        /// Also write the signed PDF here.
        #[arg(long, value_name = "OUT")]
        output: Option<PathBuf>,
        /// Skip the storage upload.
        #[arg(long)]
        no_upload: bool,
    },
    /// Hash a PDF and ask the verification endpoint about it.
    Validate {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Print the SHA-256 digest of a file.
    Hash {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Print the effective configuration.
    Config,
}

/// Placement plan: what to add, where, in order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Plan {
    pub annotations: Vec<PlanEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanEntry {
    #[serde(flatten)]
    pub content: PlanContent,
    /// 1-based page to place on; the current page when absent.
    #[serde(default)]
    pub page: Option<u32>,
    /// Viewport pixels; the default position is kept when absent.
    #[serde(default)]
    pub left: Option<f64>,
    #[serde(default)]
    pub top: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PlanContent {
    /// Either a PNG file or strokes replayed through the signature pad.
    Signature {
        #[serde(default)]
        image: Option<PathBuf>,
        #[serde(default)]
        strokes: Vec<Vec<Point>>,
    },
    Stamp {
        image: PathBuf,
    },
    Text {
        text: String,
    },
    DateTime {
        value: String,
    },
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    init_logging(cli.verbose);
    dispatch(cli, config_path)
}

/// Run a parsed command. `default_config` is only consulted by commands that
/// read the configuration and only when `--config` was not given.
fn dispatch<F>(cli: Cli, default_config: F) -> Result<()>
where
    F: FnOnce() -> Result<PathBuf, ConfigError>,
{
    let explicit = cli.config;
    let config_file = move || -> Result<PathBuf> {
        match explicit {
            Some(path) => Ok(path),
            None => Ok(default_config()?),
        }
    };

    match cli.command {
        Commands::Sign {
            input,
            plan,
            handoff,
            output,
            no_upload,
        } => {
            let config = load_config_from(&config_file()?)?;
            run_sign(config, input.as_deref(), &plan, handoff, output.as_deref(), no_upload)
        }
        Commands::Validate { file } => run_validate(load_config_from(&config_file()?)?, &file),
        Commands::Hash { file } => run_hash(&file),
        Commands::Config => {
            let path = config_file()?;
            let config = load_config_from(&path)?;
            println!("# {}", path.display());
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    // A second init (tests driving `run` repeatedly) is harmless.
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).try_init();
}

fn user_error(operation: Operation) -> impl Fn(AppError) -> anyhow::Error {
    move |err| {
        let message = err.user_message(operation);
        anyhow::Error::new(err).context(message)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document.pdf".to_string())
}

fn run_sign(
    config: AppConfig,
    input: Option<&Path>,
    plan_path: &Path,
    handoff: Option<String>,
    output: Option<&Path>,
    no_upload: bool,
) -> Result<()> {
    let raw = fs::read_to_string(plan_path).with_context(|| format!("failed to read plan {}", plan_path.display()))?;
    let plan: Plan = serde_json::from_str(&raw).context("invalid plan")?;
    let plan_dir = plan_path.parent().unwrap_or_else(|| Path::new("."));

    let store = HttpStore::new(&config);
    let mut session = EditingSession::new(config, Rc::new(LogIndicator));

    match (input, handoff) {
        (Some(path), _) => {
            let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
            session
                .load_document(bytes, &file_name(path))
                .map_err(user_error(Operation::Load))?;
        }
        (None, Some(handoff)) => {
            let mut slot = Some(handoff);
            session
                .auto_load(&mut slot, &store)
                .map_err(user_error(Operation::AutoLoad))?;
        }
        (None, None) => bail!("no document: pass INPUT or --handoff"),
    }

    apply_plan(&mut session, &plan, plan_dir)?;

    let now = Utc::now();
    let flattened = if no_upload {
        session.prepare_export(now).map_err(user_error(Operation::Export))?
    } else {
        let outcome = session.export(&store, now).map_err(user_error(Operation::Export))?;
        eprintln!("{}", outcome.message);
        eprintln!("redirect: {}", outcome.redirect);
        outcome.flattened
    };

    if let Some(out) = output {
        fs::write(out, &flattened.bytes).with_context(|| format!("failed to write {}", out.display()))?;
    }
    println!("{}", serde_json::to_string_pretty(&flattened.metadata)?);
    Ok(())
}

/// Add each plan entry to the session and drag it into place.
pub fn apply_plan(session: &mut EditingSession, plan: &Plan, base_dir: &Path) -> Result<Vec<AnnotationId>> {
    let mut ids = Vec::with_capacity(plan.annotations.len());
    for (index, entry) in plan.annotations.iter().enumerate() {
        if let Some(page) = entry.page {
            let delta = page as i64 - session.current_page() as i64;
            if delta != 0 && !session.change_page(delta as i32) {
                bail!("plan entry {}: page {} is out of range", index + 1, page);
            }
        }

        let added = match &entry.content {
            PlanContent::Signature { image: Some(path), .. } => {
                let png = read_asset(base_dir, path)?;
                session.add_signature_image(png)
            }
            PlanContent::Signature { image: None, strokes } => {
                replay_strokes(session.signature_pad_mut(), strokes);
                session.save_signature()
            }
            PlanContent::Stamp { image } => {
                let png = read_asset(base_dir, image)?;
                session.add_stamp(Some(png))
            }
            PlanContent::Text { text } => session.add_text(text),
            PlanContent::DateTime { value } => session.add_date_time(value),
        };
        let id = added
            .map_err(user_error(Operation::Export))
            .with_context(|| format!("plan entry {}", index + 1))?;

        if entry.left.is_some() || entry.top.is_some() {
            if let Some(current) = session.model().get(id).map(|a| a.screen_rect) {
                let left = entry.left.unwrap_or(current.left);
                let top = entry.top.unwrap_or(current.top);
                session.move_annotation_to(id, left, top);
            }
        }
        ids.push(id);
    }
    Ok(ids)
}

fn replay_strokes(pad: &mut SignaturePad, strokes: &[Vec<Point>]) {
    pad.clear();
    for stroke in strokes {
        let Some((first, rest)) = stroke.split_first() else {
            continue;
        };
        pad.pointer_down(*first);
        for point in rest {
            pad.pointer_move(*point);
        }
        pad.pointer_up();
    }
}

fn read_asset(base_dir: &Path, path: &Path) -> Result<Vec<u8>> {
    let full = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    };
    fs::read(&full).with_context(|| format!("failed to read {}", full.display()))
}

fn run_validate(config: AppConfig, file: &Path) -> Result<()> {
    let bytes = fs::read(file).with_context(|| format!("failed to read {}", file.display()))?;
    let store = HttpStore::new(&config);
    let format = DisplayFormat::local(&config.date_time_format);
    let view = validate_document(&store, Rc::new(LogIndicator), &bytes, &file_name(file), &format)
        .map_err(user_error(Operation::Validate))?;
    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(())
}

fn run_hash(file: &Path) -> Result<()> {
    let reader = fs::File::open(file).with_context(|| format!("failed to open {}", file.display()))?;
    println!("{}", signease_verify::digest_reader(reader)?);
    Ok(())
}
