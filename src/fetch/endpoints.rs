//! BDL REST API endpoints and URL construction.
//!
//! URLs double as cache keys, so every builder here emits its query
//! parameters in a fixed order.

use url::Url;

use crate::error::BdlError;
use crate::types::UnitLevel;

/// Base URL for the BDL REST API.
pub const BDL_BASE_URL: &str = "https://bdl.stat.gov.pl/api/v1";

/// Header carrying a registered client id.
pub const CLIENT_ID_HEADER: &str = "X-ClientId";

/// Page size requested from list endpoints.
pub const PAGE_SIZE: u32 = 1000;

/// Endpoint paths, relative to the base URL.
pub mod paths {
    /// Territorial units.
    pub const UNITS: &str = "units";
    /// Data for one unit (`data/by-unit/{unit-id}`).
    pub const DATA_BY_UNIT: &str = "data/by-unit";
}

/// Build `/units` for the children of `parent_id` at `level`.
///
/// With neither argument the top level (`level=0`) is requested.
pub fn units_url(
    base_url: &str,
    parent_id: Option<&str>,
    level: Option<UnitLevel>,
) -> Result<Url, BdlError> {
    let mut url = endpoint(base_url, &[paths::UNITS])?;
    {
        let mut query = url.query_pairs_mut();
        if let Some(parent_id) = parent_id {
            query.append_pair("parent-id", parent_id);
        }
        match (parent_id, level) {
            (_, Some(level)) => {
                query.append_pair("level", &level.as_u8().to_string());
            }
            (None, None) => {
                query.append_pair("level", &UnitLevel::Country.as_u8().to_string());
            }
            (Some(_), None) => {}
        }
        query.append_pair("format", "json");
        query.append_pair("page-size", &PAGE_SIZE.to_string());
    }
    Ok(url)
}

/// Build `/data/by-unit/{unit_id}` for one variable over `years`.
pub fn data_by_unit_url(
    base_url: &str,
    unit_id: &str,
    var_id: &str,
    years: &[i32],
) -> Result<Url, BdlError> {
    let mut url = endpoint(base_url, &[paths::DATA_BY_UNIT, unit_id])?;
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("var-id", var_id);
        for year in years {
            query.append_pair("year", &year.to_string());
        }
        query.append_pair("format", "json");
    }
    Ok(url)
}

fn endpoint(base_url: &str, segments: &[&str]) -> Result<Url, BdlError> {
    let mut url = Url::parse(base_url)?;
    url.path_segments_mut()
        .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
        .pop_if_empty()
        .extend(segments.iter().flat_map(|s| s.split('/')));
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_units_url() {
        let url = units_url(BDL_BASE_URL, None, None).unwrap();
        assert_eq!(
            url.as_str(),
            "https://bdl.stat.gov.pl/api/v1/units?level=0&format=json&page-size=1000"
        );
    }

    #[test]
    fn test_child_units_url() {
        let url = units_url(BDL_BASE_URL, Some("011200000000"), Some(UnitLevel::Powiat)).unwrap();
        assert_eq!(
            url.as_str(),
            "https://bdl.stat.gov.pl/api/v1/units?parent-id=011200000000&level=5&format=json&page-size=1000"
        );
    }

    #[test]
    fn test_data_by_unit_url() {
        let url = data_by_unit_url(BDL_BASE_URL, "011212161011", "60559", &[2020, 2021]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://bdl.stat.gov.pl/api/v1/data/by-unit/011212161011?var-id=60559&year=2020&year=2021&format=json"
        );
    }

    #[test]
    fn test_base_url_with_trailing_slash() {
        let url = units_url("http://127.0.0.1:8080/", None, None).unwrap();
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:8080/units?level=0&format=json&page-size=1000"
        );
    }
}
