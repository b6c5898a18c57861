// Typed access log records and the per-field coercion rules that build them.

use chrono::{DateTime, FixedOffset};
use std::str::FromStr;

use crate::error::DecodeError;

/// Request timestamp with the offset it was logged in
pub type Timestamp = DateTime<FixedOffset>;

/// Placeholder names every template must capture, in schema order
pub const SCHEMA_FIELDS: [&str; 10] = ["h", "l", "u", "t", "r", "s", "b", "f", "a", "D"];

/// Format of the `t` field, e.g. `01/Dec/2019:11:06:05 +0100`
pub const TIMESTAMP_FORMAT: &str = "%d/%b/%Y:%H:%M:%S %z";

/// Untyped per-field captures of one matched line, borrowed from the line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord<'a> {
    fields: Vec<(&'a str, &'a str)>,
}

impl<'a> RawRecord<'a> {
    pub fn new(fields: Vec<(&'a str, &'a str)>) -> Self {
        Self { fields }
    }

    pub fn get(&self, name: &str) -> Option<&'a str> {
        self.fields
            .iter()
            .find(|(field, _)| *field == name)
            .map(|(_, value)| *value)
    }
}

/// One decoded access log entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// `h`: remote address
    pub remote_addr: String,
    /// `l`: identity, usually `-`
    pub identity: String,
    /// `u`: user name
    pub user: String,
    /// `t`: request time
    pub time: Timestamp,
    /// `r`: request line, kept opaque
    pub request: String,
    /// `s`: response status, any base-10 integer
    pub status: i64,
    /// `b`: response length, `None` for `-` or anything non-numeric
    pub size: Option<i64>,
    /// `f`: referer
    pub referer: String,
    /// `a`: user agent
    pub user_agent: String,
    /// `D`: request duration in microseconds
    pub duration_us: i64,
}

impl LogRecord {
    /// Coerce raw captures into a record.
    ///
    /// All ten schema fields are checked for presence before any coercion, so
    /// a template that omits a field fails with `MissingField` on every line.
    pub fn from_raw(raw: &RawRecord<'_>) -> Result<Self, DecodeError> {
        if let Some(missing) = SCHEMA_FIELDS.iter().copied().find(|name| raw.get(name).is_none()) {
            return Err(DecodeError::MissingField(missing));
        }
        let field = |name: &'static str| raw.get(name).ok_or(DecodeError::MissingField(name));

        Ok(Self {
            remote_addr: field("h")?.to_string(),
            identity: field("l")?.to_string(),
            user: field("u")?.to_string(),
            time: parse_timestamp(field("t")?)?,
            request: field("r")?.to_string(),
            status: parse_integer("s", field("s")?)?,
            size: field("b")?.parse().ok(),
            referer: field("f")?.to_string(),
            user_agent: field("a")?.to_string(),
            duration_us: parse_integer("D", field("D")?)?,
        })
    }

    /// 2xx response, by integer division of the status
    pub fn is_success(&self) -> bool {
        self.status / 100 == 2
    }
}

/// Parse a `t` field value
pub fn parse_timestamp(value: &str) -> Result<Timestamp, DecodeError> {
    DateTime::parse_from_str(value, TIMESTAMP_FORMAT).map_err(|source| DecodeError::InvalidTimestamp {
        value: value.to_string(),
        source,
    })
}

fn parse_integer<T: FromStr>(field: &'static str, value: &str) -> Result<T, DecodeError> {
    value.parse().map_err(|_| DecodeError::InvalidInteger {
        field,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{LineMatcher, DEFAULT_LOG_FORMAT};
    use chrono::{TimeZone, Utc};

    const LINE: &str = r#"Dec 01 11:06:05 app3-test-vm1 gunicorn[53253]: 172.16.3.14 - - [01/Dec/2019:11:06:05 +0100] "GET /internal/user/5fdbb021/agenda/2019-12-01/2019-12-02 HTTP/1.1" 200 720 "-" "python-requests/2.22.0" 72680"#;

    fn expected_record() -> LogRecord {
        LogRecord {
            remote_addr: "172.16.3.14".to_string(),
            identity: "-".to_string(),
            user: "-".to_string(),
            time: parse_timestamp("01/Dec/2019:11:06:05 +0100").unwrap(),
            request: "GET /internal/user/5fdbb021/agenda/2019-12-01/2019-12-02 HTTP/1.1".to_string(),
            status: 200,
            size: Some(720),
            referer: "-".to_string(),
            user_agent: "python-requests/2.22.0".to_string(),
            duration_us: 72680,
        }
    }

    #[test]
    fn test_decode_default_format() {
        let matcher = LineMatcher::new(DEFAULT_LOG_FORMAT).unwrap();
        assert_eq!(matcher.decode(LINE).unwrap(), expected_record());
    }

    #[test]
    fn test_decode_strips_line_terminators() {
        let matcher = LineMatcher::new(DEFAULT_LOG_FORMAT).unwrap();
        assert_eq!(matcher.decode(&format!("{LINE}\r\n")).unwrap(), expected_record());
    }

    #[test]
    fn test_decode_rearranged_format() {
        let matcher = LineMatcher::new(r#"%(t)s "%(r)s" %(s)s %(b)s "%(f)s" "%(a)s" %(D)s %(h)s %(l)s %(u)s"#).unwrap();
        let line = r#"Dec 01 11:06:05 app3-test-vm1 gunicorn[53253]: [01/Dec/2019:11:06:05 +0100] "GET /internal/user/5fdbb021/agenda/2019-12-01/2019-12-02 HTTP/1.1" 200 720 "-" "python-requests/2.22.0" 72680 172.16.3.14 - -"#;

        assert_eq!(matcher.decode(line).unwrap(), expected_record());
    }

    #[test]
    fn test_dash_size_is_absent() {
        let matcher = LineMatcher::new(DEFAULT_LOG_FORMAT).unwrap();
        let line = LINE.replace(" 200 720 ", " 200 - ");

        let record = matcher.decode(&line).unwrap();
        assert_eq!(record.size, None);
        assert_eq!(record.status, 200);
    }

    #[test]
    fn test_timestamp_keeps_offset() {
        let record = LineMatcher::new(DEFAULT_LOG_FORMAT).unwrap().decode(LINE).unwrap();

        assert_eq!(record.time.offset().local_minus_utc(), 3600);
        assert_eq!(record.time, Utc.with_ymd_and_hms(2019, 12, 1, 10, 6, 5).unwrap());
    }

    #[test]
    fn test_missing_schema_field() {
        let matcher = LineMatcher::new(r#"%(l)s %(u)s %(t)s "%(r)s" %(s)s %(b)s "%(f)s" "%(a)s" %(D)s"#).unwrap();
        let line = r#"Dec 01 11:06:05 app3-test-vm1 gunicorn[53253]: - - [01/Dec/2019:11:06:05 +0100] "GET / HTTP/1.1" 200 720 "-" "python-requests/2.22.0" 72680"#;

        assert!(matches!(matcher.decode(line), Err(DecodeError::MissingField("h"))));
    }

    #[test]
    fn test_schema_error_precedes_coercion_error() {
        // status is garbage too, but the missing field is reported
        let matcher = LineMatcher::new(r#"%(l)s %(u)s %(t)s "%(r)s" %(s)s %(b)s "%(f)s" "%(a)s" %(D)s"#).unwrap();
        let line = r#"app: - - [01/Dec/2019:11:06:05 +0100] "GET / HTTP/1.1" OK 720 "-" "curl" 1"#;

        assert!(matches!(matcher.decode(line), Err(DecodeError::MissingField("h"))));
    }

    #[test]
    fn test_bad_timestamp() {
        let matcher = LineMatcher::new(DEFAULT_LOG_FORMAT).unwrap();
        let line = LINE.replace("01/Dec/2019:11:06:05", "01-Dec-2019:11:06:05");

        assert!(matches!(matcher.decode(&line), Err(DecodeError::InvalidTimestamp { .. })));
    }

    #[test]
    fn test_bad_integers() {
        let matcher = LineMatcher::new(DEFAULT_LOG_FORMAT).unwrap();

        let bad_status = LINE.replace(" 200 720 ", " OK 720 ");
        assert!(matches!(
            matcher.decode(&bad_status),
            Err(DecodeError::InvalidInteger { field: "s", .. })
        ));

        let bad_duration = LINE.replace("72680", "fast");
        assert!(matches!(
            matcher.decode(&bad_duration),
            Err(DecodeError::InvalidInteger { field: "D", .. })
        ));
    }

    #[test]
    fn test_out_of_range_integers_still_decode() {
        let matcher = LineMatcher::new(DEFAULT_LOG_FORMAT).unwrap();

        let record = matcher.decode(&LINE.replace(" 200 720 ", " 70000 720 ")).unwrap();
        assert_eq!(record.status, 70000);
        assert!(!record.is_success());

        let record = matcher.decode(&LINE.replace(" 72680", " -1")).unwrap();
        assert_eq!(record.duration_us, -1);

        let record = matcher.decode(&LINE.replace(" 200 720 ", " -204 -5 ")).unwrap();
        assert_eq!(record.status, -204);
        assert_eq!(record.size, Some(-5));
        assert!(!record.is_success());
    }

    #[test]
    fn test_foreign_line_does_not_match() {
        let matcher = LineMatcher::new(DEFAULT_LOG_FORMAT).unwrap();
        assert!(matches!(
            matcher.decode("some kind of header that is not actual log"),
            Err(DecodeError::NoMatch)
        ));
    }

    #[test]
    fn test_success_class() {
        let mut record = expected_record();
        assert!(record.is_success());
        record.status = 204;
        assert!(record.is_success());
        record.status = 304;
        assert!(!record.is_success());
        record.status = 199;
        assert!(!record.is_success());
    }
}
