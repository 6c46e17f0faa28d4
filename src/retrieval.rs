//! Chooses how station data is retrieved.

use chrono::NaiveDate;

use crate::error::{ServiceError, ServiceResult};
use crate::models::StationDataRequest;
use crate::query::{self, SqlQuery};
use crate::validate::ReadingFilter;

// ---

/// Exactly one retrieval mode per request.
#[derive(Debug, Clone, PartialEq)]
pub enum Retrieval {
    /// Forecast rows for the given day.
    Forecast { day: NaiveDate },
    /// Mean measurement per sensor type.
    Summary,
    /// Filtered, sorted, paginated readings.
    Page(ReadingFilter),
}

impl Retrieval {
    /// `forecast` wins over `summary`; otherwise the request is a listing.
    ///
    /// The forecast day is always `today + 1`, whatever dates the request
    /// carries. Listing filters are validated only when they are used.
    pub fn select(request: &StationDataRequest, today: NaiveDate) -> ServiceResult<Self> {
        // ---
        if request.forecast {
            let day = today
                .succ_opt()
                .ok_or_else(|| ServiceError::validation("No calendar day after today"))?;
            Ok(Retrieval::Forecast { day })
        } else if request.summary {
            Ok(Retrieval::Summary)
        } else {
            Ok(Retrieval::Page(ReadingFilter::from_request(request)?))
        }
    }

    pub fn to_query(&self, station_code: i32) -> ServiceResult<SqlQuery> {
        // ---
        match self {
            Retrieval::Forecast { day } => Ok(query::forecast_lookahead(station_code, *day)),
            Retrieval::Summary => Ok(query::readings_summary(station_code)),
            Retrieval::Page(filter) => query::readings_page(station_code, filter),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Retrieval::Forecast { .. } => "forecast",
            Retrieval::Summary => "summary",
            Retrieval::Page(_) => "page",
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::query::SqlParam;
    use crate::validate::SensorType;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 12, 31).unwrap()
    }

    #[test]
    fn test_forecast_uses_tomorrow_ignoring_request_dates() {
        // ---
        let request = StationDataRequest {
            forecast: true,
            summary: true,
            date_from: NaiveDate::from_ymd_opt(2020, 1, 1),
            date_to: NaiveDate::from_ymd_opt(2020, 1, 2),
            ..Default::default()
        };
        let selected = Retrieval::select(&request, today()).unwrap();
        let tomorrow = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();

        assert_eq!(selected, Retrieval::Forecast { day: tomorrow });
        let q = selected.to_query(5).unwrap();
        assert_eq!(q.params, vec![SqlParam::Int(5), SqlParam::Date(tomorrow)]);
    }

    #[test]
    fn test_summary_ignores_listing_fields() {
        // ---
        let request = StationDataRequest {
            summary: true,
            page: Some(0),
            limit: Some(-1),
            sort: Some("measurement".into()),
            ..Default::default()
        };
        let selected = Retrieval::select(&request, today()).unwrap();

        assert_eq!(selected, Retrieval::Summary);
        let q = selected.to_query(7).unwrap();
        assert!(!q.text.contains("LIMIT"));
        assert_eq!(q.params, vec![SqlParam::Int(7)]);
    }

    #[test]
    fn test_forecast_ignores_invalid_listing_fields() {
        // ---
        let request = StationDataRequest {
            forecast: true,
            sensor_type: Some("pressure".into()),
            ..Default::default()
        };
        assert_eq!(Retrieval::select(&request, today()).unwrap().name(), "forecast");
    }

    #[test]
    fn test_default_is_page() {
        // ---
        let request = StationDataRequest {
            sensor_type: Some("temperature".into()),
            ..Default::default()
        };
        match Retrieval::select(&request, today()).unwrap() {
            Retrieval::Page(filter) => {
                assert_eq!(filter.sensor_type, Some(SensorType::Temperature));
            }
            other => panic!("expected page, got {:?}", other),
        }
    }

    #[test]
    fn test_page_validates_sort() {
        // ---
        let request = StationDataRequest {
            sort: Some("unit".into()),
            ..Default::default()
        };
        assert!(matches!(
            Retrieval::select(&request, today()),
            Err(ServiceError::Validation(_))
        ));
    }
}
