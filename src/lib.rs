use chrono::prelude::*;
use plotters::coord::Shift;
use plotters::prelude::*;
use std::fs::File;
use std::io::Read;
use std::path::Path;
pub mod error;
pub mod report;

pub use error::ReportError;
pub use report::{generate_report, generate_report_in, ReportSummary, SourceOutcome};

pub const VERSION: Option<&'static str> = option_env!("CARGO_PKG_VERSION");

/// Sources plotted by default, one panel each, in this order.
pub const DEFAULT_SOURCES: &[&str] = &[
    "camel-tooling-camel-dap-client-vscode.csv",
    "camel-tooling-camel-debug-adapter.csv",
    "camel-tooling-camel-language-server.csv",
    "camel-tooling-camel-lsp-client-vscode.csv",
    "camel-tooling-vscode-camel-extension-pack.csv",
];
pub const DEFAULT_OUTPUT: &str = "combined_metrics_report.png";

pub const DELIMITER: u8 = b';';
pub const COL_DATE: &str = "Date";
pub const COL_OPEN_ISSUES: &str = "Open Issues";
pub const COL_OPEN_PRS: &str = "Open PRs";

/// Datetime layouts tried after RFC 3339, in order.
pub const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];
/// Date-only layouts, read as midnight.
pub const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d", "%Y/%m/%d", "%d.%m.%Y", "%m/%d/%Y", "%d %b %Y", "%b %d, %Y",
];

/// Panel size in layout units, and pixels per unit.
pub const PANEL_WIDTH: u32 = 12;
pub const PANEL_HEIGHT: u32 = 5;
pub const PX_PER_UNIT: u32 = 100;

pub const ISSUES_COLOR: RGBColor = RGBColor(31, 119, 180);
pub const PRS_COLOR: RGBColor = RGBColor(255, 127, 14);

/// The open issues and open PRs time series of one project
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricTable {
    pub date: Vec<NaiveDateTime>,
    pub open_issues: Vec<u64>,
    pub open_prs: Vec<u64>,
}

impl MetricTable {
    pub fn new(capacity: usize) -> MetricTable {
        MetricTable {
            date: Vec::with_capacity(capacity),
            open_issues: Vec::with_capacity(capacity),
            open_prs: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.date.len()
    }

    pub fn is_empty(&self) -> bool {
        self.date.is_empty()
    }

    pub fn push(&mut self, date: NaiveDateTime, open_issues: u64, open_prs: u64) {
        self.date.push(date);
        self.open_issues.push(open_issues);
        self.open_prs.push(open_prs);
    }

    /// Init a MetricTable from a semicolon separated file.
    pub fn from_csv(fin: &Path) -> Result<MetricTable, ReportError> {
        let file = File::open(fin)?;
        MetricTable::from_reader(file)
    }

    /// Columns are looked up by header name, extra columns are ignored.
    /// A single bad date or count fails the whole table.
    /// Rows are kept in file order, see `sort_by_date`.
    pub fn from_reader<R: Read>(rdr: R) -> Result<MetricTable, ReportError> {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(DELIMITER)
            .trim(csv::Trim::All)
            .from_reader(rdr);
        let headers = rdr.headers()?.clone();
        let column = |name: &str| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| ReportError::MissingColumn(name.to_string()))
        };
        let i_date = column(COL_DATE)?;
        let i_issues = column(COL_OPEN_ISSUES)?;
        let i_prs = column(COL_OPEN_PRS)?;

        let mut table = MetricTable::new(256);
        for record in rdr.records() {
            let record = record?;
            let line = record.position().map(|p| p.line()).unwrap_or_default();
            let field = |i: usize| record.get(i).unwrap_or_default();
            let date = parse_date(field(i_date)).ok_or_else(|| ReportError::InvalidDate {
                line,
                value: field(i_date).to_string(),
            })?;
            let open_issues = parse_count(field(i_issues), line, COL_OPEN_ISSUES)?;
            let open_prs = parse_count(field(i_prs), line, COL_OPEN_PRS)?;
            table.push(date, open_issues, open_prs);
        }
        Ok(table)
    }

    /// sorts all the columns by date, keeping the file order of equal dates
    pub fn sort_by_date(&mut self) {
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.sort_by_key(|&i| self.date[i]);
        self.date = order.iter().map(|&i| self.date[i]).collect();
        self.open_issues = order.iter().map(|&i| self.open_issues[i]).collect();
        self.open_prs = order.iter().map(|&i| self.open_prs[i]).collect();
    }

    pub fn is_ordered(&self) -> bool {
        self.date.windows(2).all(|w| w[0] <= w[1])
    }

    /// true if every date is at midnight
    pub fn is_date_only(&self) -> bool {
        self.date
            .iter()
            .all(|d| d.num_seconds_from_midnight() == 0 && d.nanosecond() == 0)
    }

    fn points<'a>(
        &'a self,
        values: &'a [u64],
    ) -> impl Iterator<Item = (DateTime<Utc>, f64)> + 'a {
        self.date
            .iter()
            .zip(values.iter())
            .map(|(x, y)| (TimeZone::from_utc_datetime(&Utc, x), *y as f64))
    }

    /// plots open issues and open PRs against date on the given area
    pub fn plot_panel<DB: DrawingBackend>(
        &self,
        area: &DrawingArea<DB, Shift>,
        title: &str,
    ) -> Result<(), ReportError> {
        let (xmindt, xmaxdt) = min_and_max(&self.date[..]).ok_or(ReportError::EmptyTable)?;
        let xspan: chrono::Duration = xmaxdt - xmindt;
        let xmargin = std::cmp::max(xspan / 20, chrono::Duration::days(1));
        let (xmindt, xmaxdt) = match (
            xmindt.checked_sub_signed(xmargin),
            xmaxdt.checked_add_signed(xmargin),
        ) {
            (Some(min), Some(max)) => (min, max),
            _ => {
                return Err(ReportError::Render(format!(
                    "date range {} .. {} is out of bounds",
                    xmindt, xmaxdt
                )))
            }
        };
        let xminutc = TimeZone::from_utc_datetime(&Utc, &xmindt);
        let xmaxutc = TimeZone::from_utc_datetime(&Utc, &xmaxdt);
        let xfmt = suitable_xfmt(xspan, self.is_date_only());
        let ymax = self
            .open_issues
            .iter()
            .chain(self.open_prs.iter())
            .copied()
            .max()
            .unwrap_or_default()
            .max(1) as f64
            * 1.1;

        let mut chart = ChartBuilder::on(area)
            .caption(format!("Metrics for {}", title), ("sans-serif", 24))
            .margin(20)
            .x_label_area_size(110)
            .y_label_area_size(70)
            .build_cartesian_2d(xminutc..xmaxutc, 0f64..ymax)?;
        chart
            .configure_mesh()
            .light_line_style(TRANSPARENT)
            .bold_line_style(RGBColor(210, 210, 210).stroke_width(1))
            .set_all_tick_mark_size(2)
            .x_label_style(("sans-serif", 14).into_font().transform(FontTransform::Rotate90))
            .y_label_style(("sans-serif", 14))
            .axis_desc_style(("sans-serif", 16))
            .x_labels(12) // max number of labels
            .x_label_formatter(&|x: &DateTime<Utc>| x.format(xfmt).to_string())
            .y_label_formatter(&|y: &f64| format!("{:.0}", y))
            .x_desc(COL_DATE)
            .y_desc("Count")
            .draw()?;

        let series = [
            (COL_OPEN_ISSUES, &self.open_issues, ISSUES_COLOR),
            (COL_OPEN_PRS, &self.open_prs, PRS_COLOR),
        ];
        for &(name, values, color) in series.iter() {
            chart
                .draw_series(LineSeries::new(
                    self.points(values),
                    color.stroke_width(2),
                ))?
                .label(name)
                .legend(move |(x, y)| {
                    PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2))
                });
            chart.draw_series(
                self.points(values)
                    .map(|p| Circle::new(p, 4, color.filled())),
            )?;
        }
        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperRight)
            .label_font(("sans-serif", 14))
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()?;
        Ok(())
    }
}

impl std::fmt::Display for MetricTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{};{};{}", COL_DATE, COL_OPEN_ISSUES, COL_OPEN_PRS)?;
        for ((t, i), p) in self
            .date
            .iter()
            .zip(self.open_issues.iter())
            .zip(self.open_prs.iter())
        {
            writeln!(f, "{};{};{}", t, i, p)?
        }
        Ok(())
    }
}

/// Parses the common textual date and datetime layouts.
pub fn parse_date(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    DATE_FORMATS
        .iter()
        .filter_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .next()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// integer counts, also accepting floats without fractional part as "3.0"
fn parse_count(value: &str, line: u64, column: &str) -> Result<u64, ReportError> {
    if let Ok(n) = value.parse::<u64>() {
        return Ok(n);
    }
    match value.parse::<f64>() {
        Ok(f) if f.is_finite() && f >= 0. && f.fract() == 0. => Ok(f as u64),
        _ => Err(ReportError::InvalidCount {
            line,
            column: column.to_string(),
            value: value.to_string(),
        }),
    }
}

pub fn min_and_max<T: std::cmp::PartialOrd + Copy>(s: &[T]) -> Option<(T, T)> {
    let mut s_iter = s.iter();
    let (mut min, mut max) = match s_iter.next() {
        Some(v) => (*v, *v),
        None => return None,
    };
    for es in s_iter {
        if *es > max {
            max = *es
        }
        if *es < min {
            min = *es
        }
    }
    Some((min, max))
}

/// label format for a date span, no time of day for date-only series
pub fn suitable_xfmt(d: chrono::Duration, date_only: bool) -> &'static str {
    if date_only || d > chrono::Duration::weeks(1) {
        "%Y-%m-%d"
    } else if d > chrono::Duration::days(1) {
        "%m-%d %H"
    } else {
        "%d %H:%M"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn parse_date_layouts() {
        let expected = ymd(2024, 1, 15);
        for s in &[
            "2024-01-15",
            "2024/01/15",
            "15.01.2024",
            "01/15/2024",
            "15 Jan 2024",
            "Jan 15, 2024",
            "2024-01-15 00:00:00",
            "2024-01-15T00:00:00",
            "2024-01-15T00:00:00Z",
            "2024-01-15 00:00:00.000",
            "2024-01-15T00:00:00.000000",
            " 2024-01-15 ",
        ] {
            assert_eq!(parse_date(s), Some(expected), "layout {}", s);
        }
        assert_eq!(
            parse_date("2024-01-15 13:45"),
            Some(expected + chrono::Duration::minutes(13 * 60 + 45))
        );
        assert_eq!(parse_date("N/A"), None);
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("2024-13-40"), None);
    }

    #[test]
    fn reads_semicolon_table() {
        let data = "Date;Open Issues;Open PRs\n2024-01-01;5;2\n2024-01-15;3;4\n";
        let table = MetricTable::from_reader(data.as_bytes()).unwrap();
        assert_eq!(table.date, vec![ymd(2024, 1, 1), ymd(2024, 1, 15)]);
        assert_eq!(table.open_issues, vec![5, 3]);
        assert_eq!(table.open_prs, vec![2, 4]);
    }

    #[test]
    fn ignores_extra_columns_and_column_order() {
        let data = "Open PRs;Stars;Date;Open Issues\n7;100;2024-02-01;1\n";
        let table = MetricTable::from_reader(data.as_bytes()).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.date[0], ymd(2024, 2, 1));
        assert_eq!(table.open_issues[0], 1);
        assert_eq!(table.open_prs[0], 7);
    }

    #[test]
    fn accepts_integral_float_counts() {
        let data = "Date;Open Issues;Open PRs\n2024-01-01;3.0;0\n";
        let table = MetricTable::from_reader(data.as_bytes()).unwrap();
        assert_eq!(table.open_issues, vec![3]);
    }

    #[test]
    fn missing_column_fails() {
        let data = "Date;Open Issues\n2024-01-01;3\n";
        match MetricTable::from_reader(data.as_bytes()) {
            Err(ReportError::MissingColumn(c)) => assert_eq!(c, COL_OPEN_PRS),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn invalid_date_fails_whole_table() {
        let data = "Date;Open Issues;Open PRs\n2024-01-01;5;2\nN/A;3;4\n";
        match MetricTable::from_reader(data.as_bytes()) {
            Err(ReportError::InvalidDate { line, value }) => {
                assert_eq!(line, 3);
                assert_eq!(value, "N/A");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn invalid_count_fails() {
        for bad in &["-1", "2.5", "many", ""] {
            let data = format!("Date;Open Issues;Open PRs\n2024-01-01;{};2\n", bad);
            match MetricTable::from_reader(data.as_bytes()) {
                Err(ReportError::InvalidCount { column, .. }) => {
                    assert_eq!(column, COL_OPEN_ISSUES)
                }
                other => panic!("unexpected {:?} for {}", other, bad),
            }
        }
    }

    #[test]
    fn ragged_row_fails() {
        let data = "Date;Open Issues;Open PRs\n2024-01-01;5\n";
        assert!(matches!(
            MetricTable::from_reader(data.as_bytes()),
            Err(ReportError::Csv(_))
        ));
    }

    #[test]
    fn sort_by_date_is_stable() {
        let mut table = MetricTable::new(4);
        table.push(ymd(2024, 3, 1), 1, 10);
        table.push(ymd(2024, 1, 1), 2, 20);
        table.push(ymd(2024, 2, 1), 3, 30);
        table.push(ymd(2024, 1, 1), 4, 40);
        assert!(!table.is_ordered());
        table.sort_by_date();
        assert!(table.is_ordered());
        assert_eq!(
            table.date,
            vec![ymd(2024, 1, 1), ymd(2024, 1, 1), ymd(2024, 2, 1), ymd(2024, 3, 1)]
        );
        assert_eq!(table.open_issues, vec![2, 4, 3, 1]);
        assert_eq!(table.open_prs, vec![20, 40, 30, 10]);
    }

    #[test]
    fn date_only_detection() {
        let mut table = MetricTable::new(2);
        table.push(ymd(2024, 1, 1), 1, 1);
        table.push(ymd(2024, 1, 3), 1, 1);
        assert!(table.is_date_only());
        table.push(ymd(2024, 1, 4) + chrono::Duration::hours(6), 1, 1);
        assert!(!table.is_date_only());
    }

    #[test]
    fn plot_out_of_range_dates_fails() {
        let mut table = MetricTable::new(1);
        table.push(parse_date("+262142-12-31").unwrap(), 1, 1);
        let mut buf = vec![255u8; 120 * 50 * 3];
        let area = BitMapBackend::with_buffer(&mut buf, (120, 50)).into_drawing_area();
        assert!(matches!(
            table.plot_panel(&area, "far"),
            Err(ReportError::Render(_))
        ));
    }

    #[test]
    fn min_and_max_of_slices() {
        assert_eq!(min_and_max(&[3, 1, 2]), Some((1, 3)));
        assert_eq!(min_and_max(&[7]), Some((7, 7)));
        assert_eq!(min_and_max::<u64>(&[]), None);
    }

    #[test]
    fn xfmt_follows_span() {
        assert_eq!(suitable_xfmt(chrono::Duration::weeks(10), false), "%Y-%m-%d");
        assert_eq!(suitable_xfmt(chrono::Duration::days(3), false), "%m-%d %H");
        assert_eq!(suitable_xfmt(chrono::Duration::hours(5), false), "%d %H:%M");
        assert_eq!(suitable_xfmt(chrono::Duration::days(3), true), "%Y-%m-%d");
        assert_eq!(suitable_xfmt(chrono::Duration::hours(5), true), "%Y-%m-%d");
    }

    #[test]
    fn plot_empty_table_fails() {
        let mut buf = vec![255u8; 120 * 50 * 3];
        let area = BitMapBackend::with_buffer(&mut buf, (120, 50)).into_drawing_area();
        assert!(matches!(
            MetricTable::new(0).plot_panel(&area, "empty"),
            Err(ReportError::EmptyTable)
        ));
    }

    #[test]
    fn display_is_semicolon_separated() {
        let mut table = MetricTable::new(1);
        table.push(ymd(2024, 1, 1), 5, 2);
        let s = table.to_string();
        assert_eq!(
            s,
            "Date;Open Issues;Open PRs\n2024-01-01 00:00:00;5;2\n"
        );
    }
}
