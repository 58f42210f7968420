//! Typed payloads of the data API.
//!
//! Every field defaults when absent, so partial or evolving payloads still decode.

use serde::{Deserialize, Serialize};

/// `/data/series/seasons`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeasonList {
    pub seasons: Vec<Season>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Season {
    pub season_id: i64,
    pub season_year: i32,
    pub season_quarter: i32,
    pub season_name: String,
    pub season_short_name: String,
    pub track_types: Vec<SeasonTrackType>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeasonTrackType {
    pub track_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeasonCarType {
    pub car_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleResponse {
    pub schedules: Vec<Schedule>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Schedule {
    pub season_id: i64,
    pub qual_attached: bool,
    pub race_week_num: i32,
}

/// `/data/lookup/get`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupResponse {
    pub lookups: Vec<Lookup>,
    pub tag: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Lookup {
    pub lookup_type: String,
    pub lookup_values: Vec<LookupValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupValue {
    pub description: String,
    pub seq: i32,
    pub value: String,
}
