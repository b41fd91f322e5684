use super::{MetricTable, ReportError};
use super::{DEFAULT_OUTPUT, DEFAULT_SOURCES, PANEL_HEIGHT, PANEL_WIDTH, PX_PER_UNIT, VERSION};
use clap::App;
use log::{debug, info, trace, warn};
use plotters::coord::Shift;
use plotters::prelude::*;
use std::io::Write;
use std::path::{Path, PathBuf};

/// What happened to one configured source.
#[derive(Debug)]
pub enum SourceOutcome {
    Rendered { source: String, rows: usize },
    Missing { source: String, path: PathBuf },
    Failed { source: String, error: ReportError },
}

impl SourceOutcome {
    pub fn source(&self) -> &str {
        match self {
            SourceOutcome::Rendered { source, .. }
            | SourceOutcome::Missing { source, .. }
            | SourceOutcome::Failed { source, .. } => source,
        }
    }

    pub fn is_rendered(&self) -> bool {
        matches!(self, SourceOutcome::Rendered { .. })
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, SourceOutcome::Missing { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, SourceOutcome::Failed { .. })
    }
}

/// The written report with one outcome per source, in source order.
#[derive(Debug)]
pub struct ReportSummary {
    pub output: PathBuf,
    pub outcomes: Vec<SourceOutcome>,
}

impl ReportSummary {
    /// number of panels with content
    pub fn rendered(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_rendered()).count()
    }

    pub fn missing(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| o.is_missing())
            .map(|o| o.source())
            .collect()
    }

    pub fn failed(&self) -> Vec<&SourceOutcome> {
        self.outcomes
            .iter()
            .filter(|o| o.is_failed())
            .collect()
    }
}

/// The report binary takes no arguments besides help and version,
/// returns the fixed output path.
pub fn parse_cli() -> PathBuf {
    App::new("metrics_report")
        .version(VERSION.unwrap_or("unknown"))
        .author("Luca Peruzzo")
        .about("cli app to plot the open issues and open PRs of several projects into one image")
        .after_help(
            "Reads the semicolon separated csv files of the configured projects \
            from the current directory and writes combined_metrics_report.png",
        )
        .get_matches();
    PathBuf::from(DEFAULT_OUTPUT)
}

/// Info level to stdout, RUST_LOG is not read.
pub fn init_logging() {
    let mut builder = env_logger::Builder::new();
    builder
        .filter_level(log::LevelFilter::Info)
        .target(env_logger::Target::Stdout)
        .format(|buf, record| writeln!(buf, "[{}] {}", record.level(), record.args()));
    if let Err(e) = builder.try_init() {
        eprintln!("logger already initialized: {}", e);
    }
}

/// Image size in pixels for `n` stacked panels, at least one panel high.
pub fn report_size(n: usize) -> (u32, u32) {
    let rows = std::cmp::max(n, 1) as u32;
    (
        PANEL_WIDTH * PX_PER_UNIT,
        PANEL_HEIGHT * PX_PER_UNIT * rows,
    )
}

/// Panel title, the source name without its extension.
pub fn panel_title(source: &str) -> &str {
    Path::new(source)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(source)
}

/// Plots the default sources found in the current directory into `output`.
pub fn generate_report<P: AsRef<Path>>(output: P) -> Result<ReportSummary, ReportError> {
    let dir = std::env::current_dir()?;
    generate_report_in(&dir, DEFAULT_SOURCES, output)
}

/// Plots each of `sources`, resolved in `dir`, on its own panel and writes
/// the stacked panels to `output`, overwriting it.
/// Source errors are logged and leave a blank panel;
/// only failing to write the image is returned as error.
pub fn generate_report_in<P: AsRef<Path>>(
    dir: &Path,
    sources: &[&str],
    output: P,
) -> Result<ReportSummary, ReportError> {
    let output = output.as_ref();
    info!("Processing {} CSV files...", sources.len());
    let size = report_size(sources.len());
    let is_svg = output
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("svg"))
        .unwrap_or(false);
    let outcomes = if is_svg {
        let root = SVGBackend::new(output, size).into_drawing_area();
        draw_report(root, dir, sources)
    } else {
        let root = BitMapBackend::new(output, size).into_drawing_area();
        draw_report(root, dir, sources)
    };
    let outcomes = outcomes.map_err(|message| ReportError::Write {
        path: output.to_path_buf(),
        message,
    })?;
    info!("Final plot saved successfully to {}", output.display());
    Ok(ReportSummary {
        output: output.to_path_buf(),
        outcomes,
    })
}

fn draw_report<DB: DrawingBackend>(
    root: DrawingArea<DB, Shift>,
    dir: &Path,
    sources: &[&str],
) -> Result<Vec<SourceOutcome>, String> {
    root.fill(&WHITE).map_err(|e| e.to_string())?;
    let mut outcomes = Vec::with_capacity(sources.len());
    if !sources.is_empty() {
        let panels = root.split_evenly((sources.len(), 1));
        for (&source, panel) in sources.iter().zip(panels.iter()) {
            outcomes.push(process_source(dir, source, panel));
        }
    }
    root.present().map_err(|e| e.to_string())?;
    Ok(outcomes)
}

fn process_source<DB: DrawingBackend>(
    dir: &Path,
    source: &str,
    panel: &DrawingArea<DB, Shift>,
) -> SourceOutcome {
    let path = dir.join(source);
    if !path.exists() {
        warn!("{}. Skipping.", ReportError::Missing(path.clone()));
        return SourceOutcome::Missing {
            source: source.to_string(),
            path,
        };
    }
    match render_source(&path, source, panel) {
        Ok(rows) => SourceOutcome::Rendered {
            source: source.to_string(),
            rows,
        },
        Err(error) => {
            warn!("An error occurred while processing '{}': {}", source, error);
            SourceOutcome::Failed {
                source: source.to_string(),
                error,
            }
        }
    }
}

/// Loads, sorts and plots one source; a panel that fails while drawing
/// is blanked again.
fn render_source<DB: DrawingBackend>(
    path: &Path,
    source: &str,
    panel: &DrawingArea<DB, Shift>,
) -> Result<usize, ReportError> {
    let mut table = MetricTable::from_csv(path)?;
    table.sort_by_date();
    debug!("read {} rows from {}", table.len(), path.display());
    trace!("{}", table);
    if let Err(e) = table.plot_panel(panel, panel_title(source)) {
        if let Err(fill_err) = panel.fill(&WHITE) {
            debug!("could not blank panel of {}: {}", source, fill_err);
        }
        return Err(e);
    }
    Ok(table.len())
}
