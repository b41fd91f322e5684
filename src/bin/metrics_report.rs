use metrics_report::report::{init_logging, parse_cli};
use metrics_report::{generate_report, ReportError};

fn main() -> Result<(), ReportError> {
    let output = parse_cli();
    init_logging();
    let summary = generate_report(&output)?;
    log::debug!(
        "{} of {} panels rendered, missing: {:?}",
        summary.rendered(),
        summary.outcomes.len(),
        summary.missing()
    );
    Ok(())
}
