//! Two-pass trace processing
//!
//! Pass 1 scans the whole stream to collect interval statistics. Pass 2
//! reopens the stream and renders one line per record. Both passes share one
//! time base: each pass rewinds its calibration marks, while the tick scale
//! calibrated by pass 1 carries into pass 2.

use crate::config::PipelineConfig;
use crate::formats::{RecordReader, TraceSource};
use crate::formatter::{AddressResolver, EventFormatter, NoStrings};
use crate::report::{Columns, EventRow, ReportWriter};
use crate::schema::{EventDefinitionTable, TypedefRegistry};
use crate::statistics::StatisticsAggregator;
use crate::timebase::TimeBase;
use crate::types::{Result, CLASS_INTERVAL};
use std::io::Write;

/// Outcome of the statistics pass
#[derive(Debug, Clone)]
pub struct StatisticsPass {
    /// Every record decoded, whatever its class
    pub records: u64,
    pub statistics: StatisticsAggregator,
}

/// Counts of a complete run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub records: u64,
    /// Records written to the event list
    pub listed: u64,
    /// Completed start/stop intervals
    pub intervals: u64,
}

/// Decodes a trace against a schema set and writes the report
pub struct Pipeline<'a> {
    events: &'a EventDefinitionTable,
    typedefs: &'a TypedefRegistry,
    resolver: &'a dyn AddressResolver,
    config: PipelineConfig,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        events: &'a EventDefinitionTable,
        typedefs: &'a TypedefRegistry,
        config: PipelineConfig,
    ) -> Self {
        Self {
            events,
            typedefs,
            resolver: &NoStrings,
            config,
        }
    }

    /// Builder method: resolve `t`/`F`/`N` addresses through `resolver`
    pub fn with_resolver(mut self, resolver: &'a dyn AddressResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn formatter(&self) -> EventFormatter<'a> {
        EventFormatter::new(self.typedefs, self.resolver)
    }

    fn time_base(&self) -> TimeBase {
        TimeBase::new().with_tick_period(self.config.tick_period)
    }

    /// Pass 1: scan the stream and pair interval events
    pub fn collect_statistics<S>(&self, source: &S) -> Result<StatisticsPass>
    where
        S: TraceSource + ?Sized,
    {
        self.statistics_pass(source, &mut self.time_base())
    }

    fn statistics_pass<S>(&self, source: &S, time_base: &mut TimeBase) -> Result<StatisticsPass>
    where
        S: TraceSource + ?Sized,
    {
        log::info!("Collecting start/stop statistics");

        let formatter = self.formatter();
        time_base.restart();
        let mut statistics = StatisticsAggregator::new();
        let mut records = 0u64;

        for record in RecordReader::new(source.open()?) {
            let record = record?;
            records += 1;
            time_base.observe(&record);

            if record.parts().class != CLASS_INTERVAL {
                continue;
            }
            let time = time_base.seconds(record.ticks);
            let caption = formatter.format_record(&record, self.events.get(record.id))?;
            statistics.record(&record, time, &caption);
        }

        log::debug!(
            "Statistics pass: {} records, {} completed intervals",
            records,
            statistics.completed_intervals()
        );
        Ok(StatisticsPass { records, statistics })
    }

    /// Pass 2: render every record that passes the level filter
    fn list_events<S, W>(
        &self,
        source: &S,
        time_base: &mut TimeBase,
        writer: &mut ReportWriter<W>,
    ) -> Result<u64>
    where
        S: TraceSource + ?Sized,
        W: Write,
    {
        log::info!("Listing events");
        writer.detail_header()?;

        let formatter = self.formatter();
        time_base.restart();
        let mut listed = 0u64;

        for (index, record) in RecordReader::new(source.open()?).enumerate() {
            let record = record?;
            time_base.observe(&record);

            let definition = self.events.get(record.id);
            if !self.config.should_list(definition.map(|d| d.level.as_deref())) {
                continue;
            }

            let value = formatter.format_record(&record, definition)?;
            let (component, event_property) = match definition {
                Some(definition) => (definition.component.clone(), definition.property.clone()),
                None => (
                    format!("0x{:02X}", record.parts().class),
                    format!("0x{:04X}", record.id),
                ),
            };

            writer.event(EventRow {
                index: index as u64,
                time: time_base.seconds(record.ticks),
                component,
                event_property,
                value,
                quoted: record.is_stdout_text(),
            })?;
            listed += 1;
        }

        log::debug!("Listed {} events", listed);
        Ok(listed)
    }

    /// Run both passes and write the report to `out`
    ///
    /// The statistics block is skipped for an empty stream.
    pub fn run<S, W>(&self, source: &S, out: W) -> Result<RunSummary>
    where
        S: TraceSource + ?Sized,
        W: Write,
    {
        let mut time_base = self.time_base();
        let pass = self.statistics_pass(source, &mut time_base)?;
        let slots = pass.statistics.completed();
        let has_records = pass.records > 0;
        let show_events = self.config.show_events;

        let mut writer = ReportWriter::new(
            out,
            self.config.format,
            Columns::from_definitions(self.events),
        );
        let mut listed = 0;

        if self.config.statistics_first {
            if has_records {
                writer.statistics(&slots)?;
            }
            if show_events {
                writer.blank_line()?;
            }
        }

        if show_events {
            listed = self.list_events(source, &mut time_base, &mut writer)?;
        }

        if !self.config.statistics_first {
            if show_events {
                writer.blank_line()?;
            }
            if has_records {
                writer.statistics(&slots)?;
            }
        }

        writer.finish()?;

        let summary = RunSummary {
            records: pass.records,
            listed,
            intervals: pass.statistics.completed_intervals(),
        };
        log::info!(
            "Processed {} records ({} listed, {} intervals)",
            summary.records,
            summary.listed,
            summary.intervals
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputFormat;
    use crate::schema::EventDefinition;
    use crate::types::{DecoderError, ID_INITIALIZE};

    fn two(ticks: u64, id: u16, v1: i32, v2: i32) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&2u16.to_le_bytes());
        out.extend_from_slice(&20u16.to_le_bytes());
        out.extend_from_slice(&ticks.to_le_bytes());
        out.extend_from_slice(&id.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&v1.to_le_bytes());
        out.extend_from_slice(&v2.to_le_bytes());
        out
    }

    fn header_only(tag: u16, ticks: u64, id: u16) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&tag.to_le_bytes());
        out.extend_from_slice(&12u16.to_le_bytes());
        out.extend_from_slice(&ticks.to_le_bytes());
        out.extend_from_slice(&id.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out
    }

    fn trace() -> Vec<u8> {
        let mut data = Vec::new();
        data.extend(two(0, ID_INITIALIZE, 0, 1000));
        data.extend(two(100, 0xEF00, 7, 0));
        data.extend(two(350, 0xEF20, 7, 0));
        data.extend(two(400, 0x0A01, 1, 2));
        data
    }

    fn events() -> EventDefinitionTable {
        vec![
            EventDefinition::new(0xEF00, "start %d[val1]")
                .with_labels("Stat", "StartA(0)")
                .with_level("Op"),
            EventDefinition::new(0xEF20, "stop %d[val1]")
                .with_labels("Stat", "StopA(0)")
                .with_level("Op"),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_statistics_pass() {
        let events = events();
        let typedefs = TypedefRegistry::new();
        let pipeline = Pipeline::new(&events, &typedefs, PipelineConfig::new());

        let pass = pipeline.collect_statistics(&trace()).unwrap();
        assert_eq!(pass.records, 4);

        let state = pass.statistics.state(0, 0).unwrap();
        assert_eq!(state.count, 1);
        assert!((state.total - 0.25).abs() < 1e-12);
        assert_eq!(state.min_captions, ("start 7".to_string(), "stop 7".to_string()));
    }

    #[test]
    fn test_text_report_order() {
        let events = events();
        let typedefs = TypedefRegistry::new();
        let pipeline = Pipeline::new(&events, &typedefs, PipelineConfig::new());

        let mut out = Vec::new();
        let summary = pipeline.run(&trace(), &mut out).unwrap();
        assert_eq!(
            summary,
            RunSummary {
                records: 4,
                listed: 4,
                intervals: 1
            }
        );

        let text = String::from_utf8(out).unwrap();
        let detail = text.find("Detailed event list").unwrap();
        let statistic = text.find("Start/Stop event statistic").unwrap();
        assert!(detail < statistic);
        assert!(text.contains("    1 0.10000000 Stat      StartA(0)      start 7\n"));
        assert!(text.contains("    3 0.40000000 0x0A      0x0A01         val1=0x00000001, val2=0x00000002\n"));
    }

    #[test]
    fn test_statistics_only() {
        let events = events();
        let typedefs = TypedefRegistry::new();
        let config = PipelineConfig::new().with_events(false).with_statistics_first(true);
        let pipeline = Pipeline::new(&events, &typedefs, config);

        let mut out = Vec::new();
        let summary = pipeline.run(&trace(), &mut out).unwrap();
        assert_eq!(summary.listed, 0);

        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("   Start/Stop event statistic\n"));
        assert!(!text.contains("Detailed event list"));
    }

    #[test]
    fn test_level_filter_keeps_index() {
        let mut events = events();
        events.add_event(EventDefinition::new(0x0A01, "%d[val2]").with_level("Detail"));
        let typedefs = TypedefRegistry::new();
        let config = PipelineConfig::new().with_level("Op").with_format(OutputFormat::Json);
        let pipeline = Pipeline::new(&events, &typedefs, config);

        let mut out = Vec::new();
        let summary = pipeline.run(&trace(), &mut out).unwrap();
        assert_eq!(summary.records, 4);
        assert_eq!(summary.listed, 3);

        let doc: serde_json::Value = serde_json::from_slice(&out).unwrap();
        let indices: Vec<u64> = doc["events"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["index"].as_u64().unwrap())
            .collect();
        // Record 0 has no definition and is always listed
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(doc["statistics"][0]["event"], "A(0)");
    }

    #[test]
    fn test_empty_stream() {
        let events = EventDefinitionTable::new();
        let typedefs = TypedefRegistry::new();
        let pipeline = Pipeline::new(&events, &typedefs, PipelineConfig::new());

        let mut out = Vec::new();
        let summary = pipeline.run(&Vec::<u8>::new(), &mut out).unwrap();
        assert_eq!(summary, RunSummary::default());

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Detailed event list"));
        assert!(!text.contains("Start/Stop event statistic"));
    }

    #[test]
    fn test_caption_error_aborts_run() {
        let events: EventDefinitionTable =
            vec![EventDefinition::new(0xEF00, "bad %C[val1]")].into_iter().collect();
        let typedefs = TypedefRegistry::new();
        let pipeline = Pipeline::new(&events, &typedefs, PipelineConfig::new());

        let result = pipeline.run(&trace(), std::io::sink());
        assert!(matches!(result, Err(DecoderError::SyntaxError(_))));
    }

    #[test]
    fn test_unknown_record_type_is_listed() {
        let mut data = trace();
        data.extend(header_only(7, 500, 0x0B02));
        let events = events();
        let typedefs = TypedefRegistry::new();
        let pipeline = Pipeline::new(&events, &typedefs, PipelineConfig::new());

        let mut out = Vec::new();
        let summary = pipeline.run(&data, &mut out).unwrap();
        assert_eq!(summary.records, 5);
        assert_eq!(summary.listed, 5);

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("    4 0.50000000 0x0B      0x0B02         \n"));
    }

    #[test]
    fn test_calibration_carries_into_listing() {
        // Record 0 precedes the only calibration mark
        let mut data = two(1000, 0x0A01, 0, 0);
        data.extend(two(2000, ID_INITIALIZE, 0, 1_000_000));
        data.extend(two(3000, 0x0A01, 0, 0));

        let events = EventDefinitionTable::new();
        let typedefs = TypedefRegistry::new();
        let config = PipelineConfig::new().with_format(OutputFormat::Json);
        let pipeline = Pipeline::new(&events, &typedefs, config);

        let mut out = Vec::new();
        pipeline.run(&data, &mut out).unwrap();

        let doc: serde_json::Value = serde_json::from_slice(&out).unwrap();
        let times: Vec<f64> = doc["events"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["time"].as_f64().unwrap())
            .collect();
        assert_eq!(times.len(), 3);
        for (actual, expected) in times.iter().zip([0.001, 0.002, 0.003]) {
            assert!((actual - expected).abs() < 1e-12, "{:?}", times);
        }
    }
}
