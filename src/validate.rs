//! Allow-list validation for everything that shapes query text.
//!
//! Column names and sort direction cannot be bound as parameters, so they are
//! parsed into closed enums here and the query builder only ever emits the
//! enum's own static tokens. Absent values take a default; present values that
//! are not in the allow-list are rejected.

use std::str::FromStr;

use chrono::NaiveDate;

use crate::error::{ServiceError, ServiceResult};
use crate::models::{StationDataRequest, StationQuery};

// ---

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_LIMIT: i64 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

impl FromStr for SortOrder {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // ---
        if s.eq_ignore_ascii_case("asc") {
            Ok(SortOrder::Asc)
        } else if s.eq_ignore_ascii_case("desc") {
            Ok(SortOrder::Desc)
        } else {
            Err(ServiceError::validation(format!(
                "Invalid sort order '{s}': expected ASC or DESC"
            )))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StationSortColumn {
    #[default]
    Code,
    InstallationDate,
}

impl StationSortColumn {
    pub fn column(self) -> &'static str {
        match self {
            StationSortColumn::Code => "code",
            StationSortColumn::InstallationDate => "installation_date",
        }
    }
}

impl FromStr for StationSortColumn {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "code" => Ok(StationSortColumn::Code),
            "installation_date" => Ok(StationSortColumn::InstallationDate),
            other => Err(ServiceError::validation(format!(
                "Invalid sort parameter '{other}': expected code or installation_date"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadingSortColumn {
    #[default]
    Date,
    Type,
}

impl ReadingSortColumn {
    pub fn column(self) -> &'static str {
        match self {
            ReadingSortColumn::Date => "date",
            ReadingSortColumn::Type => "type",
        }
    }
}

impl FromStr for ReadingSortColumn {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "date" => Ok(ReadingSortColumn::Date),
            "type" => Ok(ReadingSortColumn::Type),
            other => Err(ServiceError::validation(format!(
                "Invalid sort parameter '{other}': expected date or type"
            ))),
        }
    }
}

/// The closed set of sensor and forecast types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorType {
    Temperature,
    Humidity,
    Wind,
}

impl SensorType {
    pub const ALL: [SensorType; 3] = [
        SensorType::Temperature,
        SensorType::Humidity,
        SensorType::Wind,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SensorType::Temperature => "temperature",
            SensorType::Humidity => "humidity",
            SensorType::Wind => "wind",
        }
    }
}

impl FromStr for SensorType {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SensorType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| {
                ServiceError::validation(format!(
                    "Invalid sensor type '{s}': expected temperature, humidity or wind"
                ))
            })
    }
}

/// Validated page/limit pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    page: i64,
    limit: i64,
    offset: i64,
}

impl Pagination {
    pub fn new(page: Option<i64>, limit: Option<i64>) -> ServiceResult<Self> {
        // ---
        let page = page.unwrap_or(DEFAULT_PAGE);
        let limit = limit.unwrap_or(DEFAULT_LIMIT);

        if page < 1 {
            return Err(ServiceError::validation(format!(
                "Invalid page {page}: must be at least 1"
            )));
        }
        if limit < 1 {
            return Err(ServiceError::validation(format!(
                "Invalid limit {limit}: must be at least 1"
            )));
        }

        let offset = (page - 1)
            .checked_mul(limit)
            .ok_or_else(|| ServiceError::validation("Page is out of range for this limit"))?;

        Ok(Self {
            page,
            limit,
            offset,
        })
    }

    pub fn page(&self) -> i64 {
        self.page
    }

    pub fn limit(&self) -> i64 {
        self.limit
    }

    /// Rows to skip: `(page - 1) * limit`.
    pub fn offset(&self) -> i64 {
        self.offset
    }
}

/// Parse an optional allow-listed token, falling back to the type's default.
fn parse_or_default<T>(value: Option<&str>) -> ServiceResult<T>
where
    T: FromStr<Err = ServiceError> + Default,
{
    value
        .map(str::parse::<T>)
        .transpose()
        .map(Option::unwrap_or_default)
}

/// Validated form of [`StationQuery`].
#[derive(Debug, Clone, PartialEq)]
pub struct StationListing {
    pub city: Option<String>,
    pub sort: StationSortColumn,
    pub order: SortOrder,
    pub pagination: Pagination,
}

impl StationListing {
    pub fn from_query(query: &StationQuery) -> ServiceResult<Self> {
        // ---
        Ok(Self {
            city: query.city.clone().filter(|c| !c.is_empty()),
            sort: parse_or_default(query.sort.as_deref())?,
            order: parse_or_default(query.sort_order.as_deref())?,
            pagination: Pagination::new(query.page, query.limit)?,
        })
    }
}

/// Validated filters for the paginated reading listing.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadingFilter {
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub sensor_type: Option<SensorType>,
    pub sort: ReadingSortColumn,
    pub order: SortOrder,
    pub pagination: Pagination,
}

impl ReadingFilter {
    pub fn from_request(request: &StationDataRequest) -> ServiceResult<Self> {
        // ---
        if let (Some(from), Some(to)) = (request.date_from, request.date_to) {
            if from > to {
                return Err(ServiceError::validation(format!(
                    "Invalid date range: date_from {from} is after date_to {to}"
                )));
            }
        }

        Ok(Self {
            date_from: request.date_from,
            date_to: request.date_to,
            sensor_type: request
                .sensor_type
                .as_deref()
                .map(str::parse::<SensorType>)
                .transpose()?,
            sort: parse_or_default(request.sort.as_deref())?,
            order: parse_or_default(request.sort_order.as_deref())?,
            pagination: Pagination::new(request.page, request.limit)?,
        })
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    fn is_validation<T: std::fmt::Debug>(result: ServiceResult<T>) -> bool {
        matches!(result, Err(ServiceError::Validation(_)))
    }

    #[test]
    fn test_offset_is_page_minus_one_times_limit() {
        // ---
        for page in 1..=20 {
            for limit in 1..=20 {
                let p = Pagination::new(Some(page), Some(limit)).unwrap();
                assert_eq!(p.offset(), (page - 1) * limit, "page={page} limit={limit}");
            }
        }
    }

    #[test]
    fn test_pagination_defaults() {
        // ---
        let p = Pagination::new(None, None).unwrap();
        assert_eq!(p.page(), 1);
        assert_eq!(p.limit(), 50);
        assert_eq!(p.offset(), 0);
    }

    #[test]
    fn test_pagination_rejects_non_positive() {
        // ---
        assert!(is_validation(Pagination::new(Some(0), Some(10))));
        assert!(is_validation(Pagination::new(Some(1), Some(0))));
        assert!(is_validation(Pagination::new(Some(-3), None)));
    }

    #[test]
    fn test_pagination_overflow() {
        // ---
        assert!(is_validation(Pagination::new(Some(i64::MAX), Some(2))));
    }

    #[test]
    fn test_sort_order_case_insensitive() {
        // ---
        assert_eq!("desc".parse::<SortOrder>().unwrap(), SortOrder::Desc);
        assert_eq!("ASC".parse::<SortOrder>().unwrap(), SortOrder::Asc);
        assert!(is_validation("ASC; DROP TABLE stations".parse::<SortOrder>()));
    }

    #[test]
    fn test_station_sort_allow_list() {
        // ---
        assert_eq!(
            "installation_date".parse::<StationSortColumn>().unwrap(),
            StationSortColumn::InstallationDate
        );
        assert!(is_validation("city".parse::<StationSortColumn>()));
        assert!(is_validation("code; --".parse::<StationSortColumn>()));
    }

    #[test]
    fn test_reading_sort_allow_list() {
        // ---
        assert_eq!("type".parse::<ReadingSortColumn>().unwrap(), ReadingSortColumn::Type);
        assert!(is_validation("measurement".parse::<ReadingSortColumn>()));
        assert!(is_validation("sensor_type".parse::<ReadingSortColumn>()));
    }

    #[test]
    fn test_sensor_type_closed_set() {
        // ---
        for t in SensorType::ALL {
            assert_eq!(t.as_str().parse::<SensorType>().unwrap(), t);
        }
        assert!(is_validation("pressure".parse::<SensorType>()));
        assert!(is_validation("Wind".parse::<SensorType>()));
    }

    #[test]
    fn test_station_listing_defaults() {
        // ---
        let listing = StationListing::from_query(&StationQuery::default()).unwrap();

        assert_eq!(listing.city, None);
        assert_eq!(listing.sort, StationSortColumn::Code);
        assert_eq!(listing.order, SortOrder::Asc);
        assert_eq!(listing.pagination.limit(), DEFAULT_LIMIT);
    }

    #[test]
    fn test_station_listing_rejects_unknown_sort() {
        // ---
        let query = StationQuery {
            sort: Some("latitude".into()),
            ..Default::default()
        };
        assert!(is_validation(StationListing::from_query(&query)));
    }

    #[test]
    fn test_reading_filter_rejects_inverted_range() {
        // ---
        let request = StationDataRequest {
            date_from: NaiveDate::from_ymd_opt(2024, 10, 16),
            date_to: NaiveDate::from_ymd_opt(2024, 10, 15),
            ..Default::default()
        };
        assert!(is_validation(ReadingFilter::from_request(&request)));
    }

    #[test]
    fn test_reading_filter_same_day_range() {
        // ---
        let day = NaiveDate::from_ymd_opt(2024, 10, 15);
        let request = StationDataRequest {
            date_from: day,
            date_to: day,
            sensor_type: Some("humidity".into()),
            ..Default::default()
        };
        let filter = ReadingFilter::from_request(&request).unwrap();

        assert_eq!(filter.sensor_type, Some(SensorType::Humidity));
        assert_eq!(filter.sort, ReadingSortColumn::Date);
    }
}
