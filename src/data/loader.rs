use super::{DataError, ObservedPoint, ObservedSeries, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use csv::{ReaderBuilder, StringRecord};
use std::io::Read;
use std::path::Path;
use tracing::debug;

const DATE_COLUMN: &str = "date";
const PRICE_COLUMN: &str = "price";

const DATE_FORMATS: [&str; 7] = [
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d-%m-%Y",
    "%d.%m.%Y",
    "%b %d, %Y",
    "%d %b %Y",
];

const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"];

pub struct SeriesLoader;

impl SeriesLoader {
    fn locate_required_columns(headers: &StringRecord) -> Result<(usize, usize)> {
        let position = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
                .ok_or_else(|| DataError::Schema {
                    column: name.to_string(),
                })
        };

        Ok((position(DATE_COLUMN)?, position(PRICE_COLUMN)?))
    }

    pub fn from_path<P: AsRef<Path>>(path: P, fold_count: usize) -> Result<ObservedSeries> {
        debug!(path = %path.as_ref().display(), "loading price series");
        let file = std::fs::File::open(path)?;
        Self::from_reader(file, fold_count)
    }

    /// Read a `Date`/`Price` table. Extra columns are ignored and header names
    /// are matched case-insensitively.
    pub fn from_reader<R: Read>(reader: R, fold_count: usize) -> Result<ObservedSeries> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = rdr.headers()?.clone();
        let (date_idx, price_idx) = Self::locate_required_columns(&headers)?;

        let mut rows = Vec::new();
        for result in rdr.records() {
            let record = result?;
            let row = record
                .position()
                .map(|pos| pos.line() as usize)
                .unwrap_or(rows.len() + 2);

            let raw_date = record.get(date_idx).unwrap_or("");
            let raw_price = record.get(price_idx).unwrap_or("");

            let date = parse_date(raw_date).ok_or_else(|| DataError::Parse {
                row,
                field: DATE_COLUMN,
                value: raw_date.to_string(),
                reason: "unrecognised date format".to_string(),
            })?;
            let price = parse_price(raw_price).map_err(|reason| DataError::Parse {
                row,
                field: PRICE_COLUMN,
                value: raw_price.to_string(),
                reason,
            })?;

            rows.push((row, ObservedPoint::new(date, price)));
        }

        debug!(rows = rows.len(), "parsed price rows");
        ObservedSeries::from_rows(rows, fold_count)
    }
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim().trim_matches('"');
    if raw.is_empty() {
        return None;
    }

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
                .map(|dt| dt.date())
        })
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
}

/// Parse a price cell such as `29374.2` or `"29,374.20"`.
pub fn parse_price(raw: &str) -> std::result::Result<f64, String> {
    let cleaned: String = raw
        .trim()
        .trim_matches('"')
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();

    if cleaned.is_empty() {
        return Err("empty value".to_string());
    }

    let price: f64 = cleaned.parse().map_err(|e| format!("{}", e))?;
    if !price.is_finite() {
        return Err("price must be finite".to_string());
    }
    if price <= 0.0 {
        return Err("price must be positive".to_string());
    }
    Ok(price)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2021, 1, 31).unwrap();
        for raw in [
            "2021-01-31",
            "2021/01/31",
            "01/31/2021",
            "31-01-2021",
            "Jan 31, 2021",
            "31 Jan 2021",
            "2021-01-31T00:00:00",
            "2021-01-31 12:30:00",
            "2021-01-31T10:00:00+02:00",
        ] {
            assert_eq!(parse_date(raw), Some(expected), "format {}", raw);
        }
        assert_eq!(parse_date("not a date"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn test_parse_price() {
        assert_eq!(parse_price("29374.2"), Ok(29374.2));
        assert_eq!(parse_price("\"29,374.20\""), Ok(29374.2));
        assert_eq!(parse_price(" 1,000 "), Ok(1000.0));
        assert!(parse_price("-5").is_err());
        assert!(parse_price("0").is_err());
        assert!(parse_price("abc").is_err());
        assert!(parse_price("NaN").is_err());
        assert!(parse_price("").is_err());
    }

    #[test]
    fn test_missing_price_column() {
        let csv = "Date,Close\n2021-01-01,1\n";
        match SeriesLoader::from_reader(csv.as_bytes(), 2) {
            Err(DataError::Schema { column }) => assert_eq!(column, "price"),
            other => panic!("expected schema error, got {:?}", other),
        }
    }

    #[test]
    fn test_bad_date_reports_line() {
        let csv = "Date,Price\n2021-01-01,1\n2021-13-45,2\n2021-01-03,3\n";
        match SeriesLoader::from_reader(csv.as_bytes(), 2) {
            Err(DataError::Parse { row, field, .. }) => {
                assert_eq!(row, 3);
                assert_eq!(field, "date");
            }
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_headers_case_insensitive_extra_columns() {
        let csv = "Open, DATE ,price,Volume\n1,2021-01-02,\"32,100\",5\n1,2021-01-01,29200,5\n1,2021-01-03,33000,5\n";
        let series = SeriesLoader::from_reader(csv.as_bytes(), 2).unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.prices(), vec![29200.0, 32100.0, 33000.0]);
    }
}
