//! Types exchanged with the BDL API.

mod data;
mod units;

use serde::Deserialize;

pub use data::{
    DataRow, UnitData, Variable, VariableSeries, YearValue, default_years, parse_variables,
};
pub use units::{Unit, UnitLevel};

/// Paged list wrapper used by list endpoints.
///
/// A body without `results` is treated as an empty list.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse<T> {
    /// Total number of records across all pages
    #[serde(default)]
    pub total_records: Option<u64>,
    /// Records on this page
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_response_without_results() {
        let list: ListResponse<Unit> = serde_json::from_str(r#"{"totalRecords": 0}"#).unwrap();
        assert!(list.results.is_empty());
        assert_eq!(list.total_records, Some(0));
    }
}
