use serde::ser::{Serialize, SerializeMap, Serializer};
use serde::Deserialize;

use crate::kernel::event::SamplingResult;

pub const TARIFF_FIELD: &str = "tarif";
pub const TIMESTAMP_FIELD: &str = "now";

/// Counting stage reported for every line. Each line has a single S0 stage.
const STAGE: u8 = 0;

/// Key style for per-line count fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldNaming {
    /// `l1Count`
    #[default]
    Plain,
    /// `l1S0Count`, as emitted by the first firmware revision.
    Staged,
}

/// Flat, ordered field map. Serializes as a JSON object in insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryRecord {
    fields: Vec<(String, i64)>,
}

impl TelemetryRecord {
    pub fn fields(&self) -> &[(String, i64)] {
        &self.fields
    }

    pub fn get(&self, key: &str) -> Option<i64> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| *v)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl Serialize for TelemetryRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TelemetryEncoder {
    naming: FieldNaming,
    report_overflow: bool,
}

impl TelemetryEncoder {
    pub fn new(naming: FieldNaming) -> Self {
        Self { naming, report_overflow: false }
    }

    /// Adds `<line>Overflow: 1` for every saturated channel, named like the count keys.
    pub fn with_overflow_fields(mut self, enabled: bool) -> Self {
        self.report_overflow = enabled;
        self
    }

    /// Pure: the same result always yields the same record.
    pub fn encode(&self, result: &SamplingResult) -> TelemetryRecord {
        let mut fields = Vec::with_capacity(result.counts().len() + 2);

        for channel in result.counts() {
            fields.push((self.key(channel.channel_id, "Count"), channel.count as i64));
        }
        if self.report_overflow {
            for channel in result.overflowed() {
                fields.push((self.key(channel.channel_id, "Overflow"), 1));
            }
        }

        fields.push((TARIFF_FIELD.to_string(), result.auxiliary_flag() as i64));
        fields.push((TIMESTAMP_FIELD.to_string(), result.timestamp()));

        TelemetryRecord { fields }
    }

    fn key(&self, channel_id: u8, suffix: &str) -> String {
        match self.naming {
            FieldNaming::Plain => format!("l{}{}", channel_id, suffix),
            FieldNaming::Staged => format!("l{}S{}{}", channel_id, STAGE, suffix),
        }
    }
}
