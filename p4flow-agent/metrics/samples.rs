use crate::metric_enum;

metric_enum! {
    pub enum SampleMetric {
        Samples => "p4flow_samples_total",
        OverflowScans => "p4flow_overflow_scans_total",
        ActiveCounters => "p4flow_active_counters",
    }
}

impl SampleMetric {
    pub fn help(&self) -> &'static str {
        match self {
            SampleMetric::Samples => "Counter overflows delivered as samples",
            SampleMetric::OverflowScans => "Overflow scans that found at least one overflow",
            SampleMetric::ActiveCounters => "Virtual counters armed by the last setup",
        }
    }

    pub fn labels(&self) -> &'static [&'static str] {
        match self {
            SampleMetric::Samples => &["cpu", "counter", "event", "mode"],
            SampleMetric::OverflowScans | SampleMetric::ActiveCounters => &["cpu"],
        }
    }
}
