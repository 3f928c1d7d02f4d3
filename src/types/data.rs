//! Statistical data and export rows.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, PickFirst, serde_as};

/// A statistical variable selected for export.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Variable {
    /// Variable id, e.g. `60559`
    pub id: String,
    /// Human readable name
    pub name: String,
}

impl Variable {
    /// Create a new variable.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Parse a variable list.
///
/// One `id,name` entry per line. Blank lines and lines starting with `#` are
/// skipped. A line without a comma uses the id as its name.
pub fn parse_variables(text: &str) -> Vec<Variable> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let (id, name) = match line.split_once(',') {
                Some((id, name)) => (id.trim(), name.trim()),
                None => (line, line),
            };
            if id.is_empty() {
                return None;
            }
            let name = if name.is_empty() { id } else { name };
            Some(Variable::new(id, name))
        })
        .collect()
}

/// The default year range: the last five years up to and including `current_year`.
pub fn default_years(current_year: i32) -> Vec<i32> {
    (current_year - 5..=current_year).collect()
}

/// One exported observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataRow {
    /// Name of the variable
    pub variable_name: String,
    /// Name of the territorial unit
    pub unit_name: String,
    /// Reference year
    pub year: i32,
    /// `None` when no value was published for the year
    pub value: Option<Decimal>,
}

/// Response of `/data/by-unit/{unit-id}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitData {
    /// Unit id echoed by the API
    #[serde(default)]
    pub unit_id: Option<String>,
    /// Unit name echoed by the API
    #[serde(default)]
    pub unit_name: Option<String>,
    /// One series per requested variable
    #[serde(default)]
    pub results: Vec<VariableSeries>,
}

impl UnitData {
    /// Values of the first returned variable, keyed by year.
    ///
    /// Years without a value are omitted.
    pub fn values_by_year(&self) -> BTreeMap<i32, Decimal> {
        self.results
            .first()
            .map(|series| {
                series
                    .values
                    .iter()
                    .filter_map(|v| Some((v.year, v.val?)))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Values of one variable.
#[derive(Debug, Clone, Deserialize)]
pub struct VariableSeries {
    /// Variable id, as sent by the API
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    /// Yearly values
    #[serde(default)]
    pub values: Vec<YearValue>,
}

/// A single yearly value.
#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YearValue {
    /// The API sends years as strings; numbers are accepted too.
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub year: i32,
    /// Published value, `None` when absent
    #[serde(default)]
    pub val: Option<Decimal>,
    /// Value attribute (footnote) id
    #[serde(default)]
    pub attr_id: Option<i64>,
}
