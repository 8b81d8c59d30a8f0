//! Report rendering
//!
//! Writes the statistics block and the detailed event list either as fixed
//! width text, streamed line by line, or as a single JSON or XML document
//! holding both tables.

use crate::config::OutputFormat;
use crate::schema::EventDefinitionTable;
use crate::statistics::SlotStatistics;
use crate::types::{DecoderError, Result};
use serde::Serialize;
use std::io::Write;

const SIGNIFICANT_DIGITS: usize = 5;

/// (threshold, prefix, multiplier), largest band first
const SI_BANDS: [(f64, &str, f64); 7] = [
    (1e9, "G", 1e-9),
    (1e6, "M", 1e-6),
    (1e3, "k", 1e-3),
    (1.0, "", 1.0),
    (1e-3, "m", 1e3),
    (1e-6, "µ", 1e6),
    (0.0, "n", 1e9),
];
const UNIT_BAND: usize = 3;

const COMPONENT_HEADER: &str = "Component";
const PROPERTY_HEADER: &str = "Event Property";

/// Format `value` with an SI prefix, 5 significant digits, right-aligned in 9 columns
///
/// Values in the unit band get a trailing space so that all units line up.
pub fn format_si(value: f64, unit: &str) -> String {
    let magnitude = value.abs();
    let mut band = if magnitude == 0.0 {
        UNIT_BAND
    } else {
        SI_BANDS
            .iter()
            .position(|(threshold, _, _)| magnitude >= *threshold)
            .unwrap_or(UNIT_BAND)
    };

    loop {
        let (_, prefix, multiplier) = SI_BANDS[band];
        let scaled = value * multiplier;

        let mut digits = integer_digits(scaled.abs());
        let mut decimals = SIGNIFICANT_DIGITS.saturating_sub(digits);
        let rounded = round_to(scaled.abs(), decimals);
        if integer_digits(rounded) > digits {
            digits += 1;
            decimals = SIGNIFICANT_DIGITS.saturating_sub(digits);
        }
        if digits > 3 && band > 0 {
            band -= 1;
            continue;
        }

        let text = format!("{:>9.*}", decimals, scaled);
        return if prefix.is_empty() {
            format!("{}{} ", text, unit)
        } else {
            format!("{}{}{}", text, prefix, unit)
        };
    }
}

fn integer_digits(value: f64) -> usize {
    let mut digits = 1;
    let mut limit = 10.0;
    while value >= limit && digits < 20 {
        digits += 1;
        limit *= 10.0;
    }
    digits
}

fn round_to(value: f64, decimals: usize) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// One line of the detailed event list
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRow {
    pub index: u64,
    pub time: f64,
    pub component: String,
    pub event_property: String,
    pub value: String,
    /// Text reports wrap the value in double quotes (redirected stdout)
    #[serde(skip)]
    pub quoted: bool,
}

/// One (group, slot) of the statistics table
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticRow {
    pub event: String,
    pub count: u64,
    /// `+1` if a start is still waiting for its stop
    pub add_count: String,
    pub total: String,
    pub min: String,
    pub max: String,
    pub avg: String,
    pub first: String,
    pub last: String,
    pub min_time: f64,
    pub min_stop_time: f64,
    pub max_time: f64,
    pub max_stop_time: f64,
    pub first_time: f64,
    pub last_time: f64,
    pub text_min_b: String,
    pub text_min_e: String,
    pub text_max_b: String,
    pub text_max_e: String,
}

impl From<&SlotStatistics> for StatisticRow {
    fn from(stats: &SlotStatistics) -> Self {
        let state = &stats.state;
        Self {
            event: stats.label(),
            count: state.count,
            add_count: if state.is_pending() { "+1" } else { "  " }.to_string(),
            total: format_si(state.total, "s"),
            min: format_si(state.min, "s"),
            max: format_si(state.max, "s"),
            avg: format_si(state.average(), "s"),
            first: format_si(state.first, "s"),
            last: format_si(state.last, "s"),
            min_time: state.min_time,
            min_stop_time: state.min_stop_time(),
            max_time: state.max_time,
            max_stop_time: state.max_stop_time(),
            first_time: state.first_time,
            last_time: state.last_time,
            text_min_b: state.min_captions.0.clone(),
            text_min_e: state.min_captions.1.clone(),
            text_max_b: state.max_captions.0.clone(),
            text_max_e: state.max_captions.1.clone(),
        }
    }
}

/// JSON/XML document of one run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EventsTable {
    pub events: Vec<EventRow>,
    pub statistics: Vec<StatisticRow>,
}

/// Widths of the label columns of the event list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Columns {
    pub component: usize,
    pub property: usize,
}

impl Default for Columns {
    fn default() -> Self {
        Self {
            component: COMPONENT_HEADER.len(),
            property: PROPERTY_HEADER.len(),
        }
    }
}

impl Columns {
    /// Size the label columns to the longest label of any definition
    pub fn from_definitions(events: &EventDefinitionTable) -> Self {
        let (component, property) = events.label_widths();
        let floor = Self::default();
        Self {
            component: component.max(floor.component),
            property: property.max(floor.property),
        }
    }
}

/// Writes report blocks in the configured format
pub struct ReportWriter<W: Write> {
    out: W,
    format: OutputFormat,
    columns: Columns,
    table: EventsTable,
}

impl<W: Write> ReportWriter<W> {
    pub fn new(out: W, format: OutputFormat, columns: Columns) -> Self {
        Self {
            out,
            format,
            columns,
            table: EventsTable::default(),
        }
    }

    fn is_text(&self) -> bool {
        self.format == OutputFormat::Txt
    }

    /// Statistics block
    pub fn statistics(&mut self, slots: &[SlotStatistics]) -> Result<()> {
        let rows: Vec<StatisticRow> = slots.iter().map(StatisticRow::from).collect();

        if self.is_text() {
            let out = &mut self.out;
            writeln!(out, "   Start/Stop event statistic")?;
            writeln!(out, "   --------------------------")?;
            writeln!(out)?;
            writeln!(
                out,
                "Event count      total       min         max         average     first       last"
            )?;
            writeln!(
                out,
                "----- -----      -----       ---         ---         -------     -----       ----"
            )?;

            for row in &rows {
                let pad = if row.event.len() < 5 { " " } else { "" };
                writeln!(
                    out,
                    "{}{} {:5}{} {} {} {} {} {} {}",
                    row.event,
                    pad,
                    row.count,
                    row.add_count,
                    row.total,
                    row.min,
                    row.max,
                    row.avg,
                    row.first,
                    row.last
                )?;
                writeln!(
                    out,
                    "      Min: Start: {:.8} {} Stop: {:.8} {}",
                    row.min_time, row.text_min_b, row.min_stop_time, row.text_min_e
                )?;
                writeln!(
                    out,
                    "      Max: Start: {:.8} {} Stop: {:.8} {}",
                    row.max_time, row.text_max_b, row.max_stop_time, row.text_max_e
                )?;
                writeln!(out)?;
            }
        }

        self.table.statistics.extend(rows);
        Ok(())
    }

    /// Heading of the detailed event list
    pub fn detail_header(&mut self) -> Result<()> {
        if !self.is_text() {
            return Ok(());
        }
        let Columns { component, property } = self.columns;
        let out = &mut self.out;
        writeln!(out, "   Detailed event list")?;
        writeln!(out, "   -------------------")?;
        writeln!(out)?;
        writeln!(
            out,
            "{:>5} {:<10} {:<component$} {:<property$} {}",
            "Index", "Time (s)", COMPONENT_HEADER, PROPERTY_HEADER, "Value"
        )?;
        writeln!(
            out,
            "----- --------   {:<component$} {:<property$} -----",
            "---------", "--------------"
        )?;
        Ok(())
    }

    /// One line of the event list
    pub fn event(&mut self, row: EventRow) -> Result<()> {
        if self.is_text() {
            let Columns { component, property } = self.columns;
            let quote = if row.quoted { "\"" } else { "" };
            writeln!(
                self.out,
                "{:5} {:.8} {:<component$} {:<property$} {quote}{}{quote}",
                row.index, row.time, row.component, row.event_property, row.value
            )?;
        }
        self.table.events.push(row);
        Ok(())
    }

    /// Separator between the blocks of a text report
    pub fn blank_line(&mut self) -> Result<()> {
        if self.is_text() {
            writeln!(self.out)?;
        }
        Ok(())
    }

    /// Flush the report; JSON and XML output is written here
    pub fn finish(mut self) -> Result<W> {
        match self.format {
            OutputFormat::Txt => {}
            OutputFormat::Json => {
                serde_json::to_writer_pretty(&mut self.out, &self.table)?;
                writeln!(self.out)?;
            }
            OutputFormat::Xml => {
                let xml = quick_xml::se::to_string(&self.table)
                    .map_err(|e| DecoderError::XmlError(e.to_string()))?;
                writeln!(self.out, "{}", xml)?;
            }
        }
        self.out.flush()?;
        Ok(self.out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::EventDefinition;
    use crate::statistics::{IntervalOp, StatisticsAggregator, StopTarget};

    #[test]
    fn test_format_si_bands() {
        assert_eq!(format_si(1.5, "s"), "   1.5000s ");
        assert_eq!(format_si(2.5e-4, "s"), "   250.00µs");
        assert_eq!(format_si(0.012, "s"), "   12.000ms");
        assert_eq!(format_si(0.0, "s"), "   0.0000s ");
        assert_eq!(format_si(1500.0, "s"), "   1.5000ks");
        assert_eq!(format_si(3.2e-8, "s"), "   32.000ns");
        assert_eq!(format_si(2.0e9, "s"), "   2.0000Gs");
    }

    #[test]
    fn test_format_si_rounding_carries_into_next_band() {
        assert_eq!(format_si(0.9999996, "s"), "   1.0000s ");
        assert_eq!(format_si(9.999996, "s"), "   10.000s ");
    }

    #[test]
    fn test_columns_floor() {
        assert_eq!(Columns::from_definitions(&EventDefinitionTable::new()), Columns::default());

        let table: EventDefinitionTable = vec![EventDefinition::new(1, "")
            .with_labels("NetworkStack", "Tx")]
        .into_iter()
        .collect();
        let columns = Columns::from_definitions(&table);
        assert_eq!(columns.component, 12);
        assert_eq!(columns.property, 14);
    }

    #[test]
    fn test_text_event_lines() {
        let mut writer = ReportWriter::new(Vec::<u8>::new(), OutputFormat::Txt, Columns::default());
        writer.detail_header().unwrap();
        writer
            .event(EventRow {
                index: 0,
                time: 0.5,
                component: "RTX".to_string(),
                event_property: "Start".to_string(),
                value: "ok".to_string(),
                quoted: false,
            })
            .unwrap();
        let text = String::from_utf8(writer.finish().unwrap()).unwrap();

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "   Detailed event list");
        assert_eq!(lines[3], "Index Time (s)   Component Event Property Value");
        assert_eq!(lines[4], "----- --------   --------- -------------- -----");
        assert_eq!(lines[5], "    0 0.50000000 RTX       Start          ok");
    }

    #[test]
    fn test_quoted_value_only_in_text() {
        let row = EventRow {
            index: 1,
            time: 0.25,
            component: "Stdout".to_string(),
            event_property: "Output".to_string(),
            value: "boot\\n".to_string(),
            quoted: true,
        };

        let mut text = ReportWriter::new(Vec::<u8>::new(), OutputFormat::Txt, Columns::default());
        text.event(row.clone()).unwrap();
        let text = String::from_utf8(text.finish().unwrap()).unwrap();
        assert_eq!(text, "    1 0.25000000 Stdout    Output         \"boot\\n\"\n");

        let mut json = ReportWriter::new(Vec::<u8>::new(), OutputFormat::Json, Columns::default());
        json.event(row).unwrap();
        let doc: serde_json::Value = serde_json::from_slice(&json.finish().unwrap()).unwrap();
        assert_eq!(doc["events"][0]["value"], "boot\\n");
        assert!(doc["events"][0].get("quoted").is_none());
    }

    #[test]
    fn test_text_statistics_block() {
        let mut stats = StatisticsAggregator::new();
        stats.apply(0, IntervalOp::Start(0), 0.0, "go");
        stats.apply(0, IntervalOp::Stop(StopTarget::One(0)), 0.012, "done");

        let mut writer = ReportWriter::new(Vec::<u8>::new(), OutputFormat::Txt, Columns::default());
        writer.statistics(&stats.completed()).unwrap();
        let text = String::from_utf8(writer.finish().unwrap()).unwrap();

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "   Start/Stop event statistic");
        assert!(lines[5].starts_with("A(0)      1      12.000ms    12.000ms"));
        assert_eq!(lines[6], "      Min: Start: 0.00000000 go Stop: 0.01200000 done");
        assert_eq!(lines[7], "      Max: Start: 0.00000000 go Stop: 0.01200000 done");
    }

    #[test]
    fn test_pending_start_marker() {
        let mut stats = StatisticsAggregator::new();
        stats.apply(0, IntervalOp::Start(0), 0.0, "go");
        stats.apply(0, IntervalOp::Stop(StopTarget::One(0)), 0.002, "done");
        stats.apply(0, IntervalOp::Start(0), 0.010, "again");

        let slots = stats.completed();
        assert_eq!(StatisticRow::from(&slots[0]).add_count, "+1");

        let mut writer = ReportWriter::new(Vec::<u8>::new(), OutputFormat::Txt, Columns::default());
        writer.statistics(&slots).unwrap();
        let text = String::from_utf8(writer.finish().unwrap()).unwrap();
        let row = text.lines().nth(5).unwrap();
        assert!(row.starts_with("A(0)      1+1 "), "{}", row);
    }

    #[test]
    fn test_json_document() {
        let mut writer = ReportWriter::new(Vec::<u8>::new(), OutputFormat::Json, Columns::default());
        writer.detail_header().unwrap();
        writer
            .event(EventRow {
                index: 3,
                time: 1.0,
                component: "Mem".to_string(),
                event_property: "Alloc".to_string(),
                value: "size=4".to_string(),
                quoted: false,
            })
            .unwrap();
        writer.statistics(&[]).unwrap();
        let bytes = writer.finish().unwrap();

        let doc: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(doc["events"][0]["index"], 3);
        assert_eq!(doc["events"][0]["eventProperty"], "Alloc");
        assert_eq!(doc["statistics"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn test_xml_document() {
        let mut stats = StatisticsAggregator::new();
        stats.apply(1, IntervalOp::Start(2), 0.0, "go");
        stats.apply(1, IntervalOp::Stop(StopTarget::One(2)), 0.5, "done");

        let mut writer = ReportWriter::new(Vec::<u8>::new(), OutputFormat::Xml, Columns::default());
        writer.detail_header().unwrap();
        writer
            .event(EventRow {
                index: 7,
                time: 0.5,
                component: "Mem".to_string(),
                event_property: "Free".to_string(),
                value: "ok".to_string(),
                quoted: false,
            })
            .unwrap();
        writer.statistics(&stats.completed()).unwrap();
        let xml = String::from_utf8(writer.finish().unwrap()).unwrap();

        assert!(xml.starts_with("<EventsTable>"), "{}", xml);
        assert!(xml.trim_end().ends_with("</EventsTable>"));
        assert!(xml.contains("<events><index>7</index><time>0.5</time>"));
        assert!(xml.contains("<eventProperty>Free</eventProperty>"));
        assert!(xml.contains("<statistics><event>B(2)</event><count>1</count>"));
        assert!(!xml.contains("Detailed event list"));
        assert!(!xml.contains("quoted"));
    }
}
