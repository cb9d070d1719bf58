//! Match records and create-payload validation.
//!
//! [`Match`] mirrors the persisted row and is what `MatchCreated` carries on
//! the wire. [`CreateMatchRequest`] is the loosely-typed inbound body; it is
//! turned into a [`NewMatch`] by [`CreateMatchRequest::validate`], which
//! collects every field issue instead of stopping at the first.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{FieldIssue, ValidationError};

/// Default page size for match listings.
pub const DEFAULT_LIST_LIMIT: usize = 50;
/// Largest page size a listing may request.
pub const MAX_LIST_LIMIT: usize = 100;

/// Lifecycle status of a match.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    /// Not started yet.
    #[default]
    Scheduled,
    /// In play.
    Live,
    /// Concluded.
    Finished,
}

impl MatchStatus {
    /// Status of a match spanning `start..end` as seen at `now`.
    pub fn at(start: DateTime<Utc>, end: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        if now < start {
            Self::Scheduled
        } else if now < end {
            Self::Live
        } else {
            Self::Finished
        }
    }

    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Live => "live",
            Self::Finished => "finished",
        }
    }
}

/// A persisted match.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    /// Store-assigned identifier.
    pub id: i64,
    /// Sport name, e.g. `"football"`.
    pub sport: String,
    /// Home team name.
    pub home_team: String,
    /// Away team name.
    pub away_team: String,
    /// Current status.
    pub status: MatchStatus,
    /// Kick-off time.
    pub start_time: Option<DateTime<Utc>>,
    /// Final whistle.
    pub end_time: Option<DateTime<Utc>>,
    /// Home team score.
    pub home_score: u32,
    /// Away team score.
    pub away_score: u32,
    /// When the record was written.
    pub created_at: DateTime<Utc>,
}

/// Raw `POST /matches` body.
///
/// Every field is optional here so that a missing or mistyped field becomes
/// a [`FieldIssue`] rather than an opaque deserialization failure.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMatchRequest {
    /// Sport name.
    #[serde(default)]
    pub sport: Option<String>,
    /// Home team name.
    #[serde(default)]
    pub home_team: Option<String>,
    /// Away team name.
    #[serde(default)]
    pub away_team: Option<String>,
    /// RFC 3339 start time.
    #[serde(default)]
    pub start_time: Option<String>,
    /// RFC 3339 end time.
    #[serde(default)]
    pub end_time: Option<String>,
    /// Number or numeric string.
    #[serde(default)]
    pub home_score: Option<Value>,
    /// Number or numeric string.
    #[serde(default)]
    pub away_score: Option<Value>,
}

/// A validated create-match command, ready to persist.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewMatch {
    /// Trimmed sport name.
    pub sport: String,
    /// Trimmed home team name.
    pub home_team: String,
    /// Trimmed away team name.
    pub away_team: String,
    /// Start time.
    pub start_time: DateTime<Utc>,
    /// End time, strictly after `start_time`.
    pub end_time: DateTime<Utc>,
    /// Initial home score.
    pub home_score: u32,
    /// Initial away score.
    pub away_score: u32,
}

impl NewMatch {
    /// Materialize the record the store writes, deriving status at `now`.
    pub fn into_match(self, id: i64, now: DateTime<Utc>) -> Match {
        Match {
            id,
            status: MatchStatus::at(self.start_time, self.end_time, now),
            sport: self.sport,
            home_team: self.home_team,
            away_team: self.away_team,
            start_time: Some(self.start_time),
            end_time: Some(self.end_time),
            home_score: self.home_score,
            away_score: self.away_score,
            created_at: now,
        }
    }
}

impl CreateMatchRequest {
    /// Validate and normalize the payload.
    pub fn validate(self) -> Result<NewMatch, ValidationError> {
        let mut issues = Vec::new();

        let sport = required_text(self.sport, "sport", "Sport is required", &mut issues);
        let home_team =
            required_text(self.home_team, "homeTeam", "Home team is required", &mut issues);
        let away_team =
            required_text(self.away_team, "awayTeam", "Away team is required", &mut issues);
        let start_time = timestamp(
            self.start_time.as_deref(),
            "startTime",
            "Start time must be a valid ISO 8601 date string",
            &mut issues,
        );
        let end_time = timestamp(
            self.end_time.as_deref(),
            "endTime",
            "End time must be a valid ISO 8601 date string",
            &mut issues,
        );
        let home_score = score(self.home_score.as_ref(), "homeScore", &mut issues);
        let away_score = score(self.away_score.as_ref(), "awayScore", &mut issues);

        if let (Some(start), Some(end)) = (start_time, end_time) {
            if end <= start {
                issues.push(FieldIssue::new(
                    "endTime",
                    "End time must be chronologically after start time",
                ));
            }
        }

        match (sport, home_team, away_team, start_time, end_time) {
            (Some(sport), Some(home_team), Some(away_team), Some(start_time), Some(end_time))
                if issues.is_empty() =>
            {
                Ok(NewMatch {
                    sport,
                    home_team,
                    away_team,
                    start_time,
                    end_time,
                    home_score,
                    away_score,
                })
            }
            _ => Err(ValidationError { issues }),
        }
    }
}

/// Parse the `limit` query parameter of a match listing.
pub fn parse_list_limit(raw: Option<&str>) -> Result<usize, ValidationError> {
    let Some(raw) = raw else {
        return Ok(DEFAULT_LIST_LIMIT);
    };
    match raw.trim().parse::<usize>() {
        Ok(0) | Err(_) => Err(ValidationError::single(
            "limit",
            "Limit must be a positive integer",
        )),
        Ok(n) if n > MAX_LIST_LIMIT => Err(ValidationError::single(
            "limit",
            format!("Limit must be at most {MAX_LIST_LIMIT}"),
        )),
        Ok(n) => Ok(n),
    }
}

fn required_text(
    value: Option<String>,
    field: &str,
    message: &str,
    issues: &mut Vec<FieldIssue>,
) -> Option<String> {
    match value.as_deref().map(str::trim) {
        Some(text) if !text.is_empty() => Some(text.to_owned()),
        _ => {
            issues.push(FieldIssue::new(field, message));
            None
        }
    }
}

fn timestamp(
    value: Option<&str>,
    field: &str,
    message: &str,
    issues: &mut Vec<FieldIssue>,
) -> Option<DateTime<Utc>> {
    let parsed = value
        .and_then(|s| DateTime::parse_from_rfc3339(s.trim()).ok())
        .map(|dt| dt.with_timezone(&Utc));
    if parsed.is_none() {
        issues.push(FieldIssue::new(field, message));
    }
    parsed
}

fn score(value: Option<&Value>, field: &str, issues: &mut Vec<FieldIssue>) -> u32 {
    let parsed = match value {
        None | Some(Value::Null) => return 0,
        Some(Value::Number(n)) => n.as_u64().or_else(|| n.as_f64().and_then(integral)),
        Some(Value::String(s)) => {
            let s = s.trim();
            s.parse::<u64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(integral))
        }
        Some(_) => None,
    };
    match parsed.and_then(|n| u32::try_from(n).ok()) {
        Some(n) => n,
        None => {
            issues.push(FieldIssue::new(
                field,
                "Score must be a non-negative integer",
            ));
            0
        }
    }
}

/// `2.0` counts as 2. Fractions, negatives and non-finite values do not.
#[allow(
    clippy::float_cmp,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn integral(x: f64) -> Option<u64> {
    (x.is_finite() && x >= 0.0 && x.fract() == 0.0 && x <= f64::from(u32::MAX))
        .then(|| x as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn request(body: Value) -> CreateMatchRequest {
        serde_json::from_value(body).unwrap()
    }

    fn valid_body() -> Value {
        json!({
            "sport": "football",
            "homeTeam": "Arsenal",
            "awayTeam": "Chelsea",
            "startTime": "2026-03-01T15:00:00Z",
            "endTime": "2026-03-01T16:45:00Z",
        })
    }

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn valid_payload_defaults_scores() {
        let new = request(valid_body()).validate().unwrap();
        assert_eq!(new.sport, "football");
        assert_eq!(new.home_team, "Arsenal");
        assert_eq!(new.home_score, 0);
        assert_eq!(new.away_score, 0);
        assert_eq!(new.start_time, ts("2026-03-01T15:00:00Z"));
    }

    #[test]
    fn names_are_trimmed() {
        let mut body = valid_body();
        body["sport"] = json!("  cricket  ");
        let new = request(body).validate().unwrap();
        assert_eq!(new.sport, "cricket");
    }

    #[test]
    fn blank_names_rejected() {
        let mut body = valid_body();
        body["homeTeam"] = json!("   ");
        body["awayTeam"] = json!("");
        let err = request(body).validate().unwrap_err();
        assert!(err.has_field("homeTeam"));
        assert!(err.has_field("awayTeam"));
        assert_eq!(err.issues.len(), 2);
    }

    #[test]
    fn empty_body_reports_every_required_field() {
        let err = request(json!({})).validate().unwrap_err();
        for field in ["sport", "homeTeam", "awayTeam", "startTime", "endTime"] {
            assert!(err.has_field(field), "missing issue for {field}");
        }
    }

    #[test]
    fn end_before_start_rejected() {
        let mut body = valid_body();
        body["endTime"] = json!("2026-03-01T14:00:00Z");
        let err = request(body).validate().unwrap_err();
        assert_eq!(err.issues.len(), 1);
        assert_eq!(err.issues[0].field, "endTime");
        assert!(err.issues[0].message.contains("after start time"));
    }

    #[test]
    fn end_equal_to_start_rejected() {
        let mut body = valid_body();
        body["endTime"] = body["startTime"].clone();
        assert!(request(body).validate().unwrap_err().has_field("endTime"));
    }

    #[test]
    fn malformed_timestamp_rejected() {
        let mut body = valid_body();
        body["startTime"] = json!("yesterday");
        let err = request(body).validate().unwrap_err();
        assert!(err.has_field("startTime"));
        assert!(!err.has_field("endTime"));
    }

    #[test]
    fn scores_coerced_from_strings() {
        let mut body = valid_body();
        body["homeScore"] = json!("2");
        body["awayScore"] = json!(1);
        let new = request(body).validate().unwrap();
        assert_eq!((new.home_score, new.away_score), (2, 1));
    }

    #[test]
    fn negative_or_fractional_scores_rejected() {
        let mut body = valid_body();
        body["homeScore"] = json!(-1);
        body["awayScore"] = json!(1.5);
        let err = request(body).validate().unwrap_err();
        assert!(err.has_field("homeScore"));
        assert!(err.has_field("awayScore"));
    }

    #[test]
    fn integral_float_scores_accepted() {
        let mut body = valid_body();
        body["homeScore"] = json!(2.0);
        body["awayScore"] = json!(" 3.0 ");
        let new = request(body).validate().unwrap();
        assert_eq!(new.home_score, 2);
        assert_eq!(new.away_score, 3);
    }

    #[test]
    fn non_finite_or_oversized_scores_rejected() {
        let mut body = valid_body();
        body["homeScore"] = json!("NaN");
        body["awayScore"] = json!(1e12);
        let err = request(body).validate().unwrap_err();
        assert!(err.has_field("homeScore"));
        assert!(err.has_field("awayScore"));
    }

    #[test]
    fn status_derivation() {
        let start = ts("2026-03-01T15:00:00Z");
        let end = ts("2026-03-01T16:45:00Z");
        assert_eq!(
            MatchStatus::at(start, end, ts("2026-03-01T14:00:00Z")),
            MatchStatus::Scheduled
        );
        assert_eq!(MatchStatus::at(start, end, start), MatchStatus::Live);
        assert_eq!(MatchStatus::at(start, end, end), MatchStatus::Finished);
    }

    #[test]
    fn into_match_fills_record() {
        let new = request(valid_body()).validate().unwrap();
        let now = ts("2026-03-01T15:30:00Z");
        let m = new.into_match(7, now);
        assert_eq!(m.id, 7);
        assert_eq!(m.status, MatchStatus::Live);
        assert_eq!(m.created_at, now);
        assert_eq!(m.end_time, Some(ts("2026-03-01T16:45:00Z")));
    }

    #[test]
    fn match_serializes_camel_case() {
        let m = request(valid_body())
            .validate()
            .unwrap()
            .into_match(1, ts("2026-03-01T10:00:00Z"));
        let v = serde_json::to_value(&m).unwrap();
        assert_eq!(v["homeTeam"], "Arsenal");
        assert_eq!(v["awayScore"], 0);
        assert_eq!(v["status"], "scheduled");
        assert!(v.get("home_team").is_none());
    }

    #[test]
    fn list_limit_parsing() {
        assert_eq!(parse_list_limit(None).unwrap(), DEFAULT_LIST_LIMIT);
        assert_eq!(parse_list_limit(Some("10")).unwrap(), 10);
        assert_eq!(parse_list_limit(Some("100")).unwrap(), 100);
        assert_matches!(parse_list_limit(Some("0")), Err(_));
        assert_matches!(parse_list_limit(Some("101")), Err(_));
        assert_matches!(parse_list_limit(Some("-3")), Err(_));
        assert_matches!(parse_list_limit(Some("ten")), Err(_));
    }

    #[test]
    fn status_wire_names() {
        assert_eq!(MatchStatus::Live.as_str(), "live");
        assert_eq!(
            serde_json::to_value(MatchStatus::Finished).unwrap(),
            json!("finished")
        );
    }
}
