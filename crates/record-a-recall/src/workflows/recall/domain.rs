use std::fmt;

use chrono::{DateTime, Days, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// NOMS number identifying the person being recalled.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrisonerId(pub String);

impl PrisonerId {
    /// Accepts a NOMS number: a letter, four digits, then two letters.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim().to_ascii_uppercase();
        let bytes = raw.as_bytes();
        let valid = bytes.len() == 7
            && bytes[0].is_ascii_uppercase()
            && bytes[1..5].iter().all(u8::is_ascii_digit)
            && bytes[5..].iter().all(u8::is_ascii_uppercase);
        valid.then_some(Self(raw))
    }
}

impl fmt::Display for PrisonerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier the case-management API assigns to a recorded recall.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecallId(pub String);

impl RecallId {
    /// Accepts the identifiers the case-management API hands out: UUIDs and
    /// other short tokens of letters, digits, `-` and `_`.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let valid = (1..=64).contains(&raw.len())
            && raw
                .bytes()
                .all(|byte| byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_');
        valid.then(|| Self(raw.to_string()))
    }
}

impl fmt::Display for RecallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier for a single create or edit journey.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JourneyId(pub Uuid);

impl JourneyId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Uuid::parse_str(raw.trim()).ok().map(Self)
    }
}

impl Default for JourneyId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JourneyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque browser session identifier carried in the session cookie.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Recall types understood by the case-management API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RecallType {
    #[serde(rename = "LR")]
    Standard,
    #[serde(rename = "FTR_14")]
    FixedTerm14,
    #[serde(rename = "FTR_28")]
    FixedTerm28,
    #[serde(rename = "FTR_HDC_14")]
    FixedTermHdc14,
    #[serde(rename = "FTR_HDC_28")]
    FixedTermHdc28,
    #[serde(rename = "CUR_HDC")]
    CurfewHdc,
    #[serde(rename = "IN_HDC")]
    InabilityToMonitorHdc,
}

impl RecallType {
    pub const ALL: [RecallType; 7] = [
        RecallType::Standard,
        RecallType::FixedTerm14,
        RecallType::FixedTerm28,
        RecallType::FixedTermHdc14,
        RecallType::FixedTermHdc28,
        RecallType::CurfewHdc,
        RecallType::InabilityToMonitorHdc,
    ];

    pub const fn code(self) -> &'static str {
        match self {
            RecallType::Standard => "LR",
            RecallType::FixedTerm14 => "FTR_14",
            RecallType::FixedTerm28 => "FTR_28",
            RecallType::FixedTermHdc14 => "FTR_HDC_14",
            RecallType::FixedTermHdc28 => "FTR_HDC_28",
            RecallType::CurfewHdc => "CUR_HDC",
            RecallType::InabilityToMonitorHdc => "IN_HDC",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            RecallType::Standard => "Standard",
            RecallType::FixedTerm14 => "14-day fixed-term",
            RecallType::FixedTerm28 => "28-day fixed-term",
            RecallType::FixedTermHdc14 => "14-day fixed-term from HDC",
            RecallType::FixedTermHdc28 => "28-day fixed-term from HDC",
            RecallType::CurfewHdc => "HDC recalled from curfew conditions",
            RecallType::InabilityToMonitorHdc => "HDC recalled from inability to monitor",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        let code = code.trim();
        Self::ALL
            .into_iter()
            .find(|candidate| candidate.code().eq_ignore_ascii_case(code))
    }

    /// Length of the statutory fixed-term window, if this is a fixed-term recall.
    pub const fn fixed_term_days(self) -> Option<u32> {
        match self {
            RecallType::FixedTerm14 | RecallType::FixedTermHdc14 => Some(14),
            RecallType::FixedTerm28 | RecallType::FixedTermHdc28 => Some(28),
            _ => None,
        }
    }

    pub const fn is_hdc(self) -> bool {
        matches!(
            self,
            RecallType::FixedTermHdc14
                | RecallType::FixedTermHdc28
                | RecallType::CurfewHdc
                | RecallType::InabilityToMonitorHdc
        )
    }
}

/// Half-open interval `[start, end)` during which a fixed-term recall blocks new recalls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FixedTermWindow {
    pub days: u32,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl FixedTermWindow {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date < self.end
    }
}

/// A recall already recorded against the person.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recall {
    #[serde(rename = "recallUuid")]
    pub recall_id: RecallId,
    pub prisoner_id: PrisonerId,
    pub revocation_date: NaiveDate,
    #[serde(default)]
    pub return_to_custody_date: Option<NaiveDate>,
    pub recall_type: RecallType,
    #[serde(default)]
    pub sentence_ids: Vec<String>,
    #[serde(default)]
    pub created_by_username: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Recall {
    pub fn fixed_term_window(&self) -> Option<FixedTermWindow> {
        let days = self.recall_type.fixed_term_days()?;
        let anchor = self.return_to_custody_date.unwrap_or(self.revocation_date);
        let end = anchor.checked_add_days(Days::new(u64::from(days)))?;
        Some(FixedTermWindow {
            days,
            start: self.revocation_date,
            end,
        })
    }
}

/// Court case with the sentences handed down on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourtCase {
    pub case_id: String,
    #[serde(default)]
    pub reference: Option<String>,
    pub court_name: String,
    pub appearance_date: NaiveDate,
    #[serde(default = "active_by_default")]
    pub active: bool,
    #[serde(default)]
    pub sentences: Vec<Sentence>,
}

fn active_by_default() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sentence {
    pub sentence_id: String,
    #[serde(default)]
    pub offence_code: String,
    #[serde(default)]
    pub offence_description: String,
    #[serde(default)]
    pub sentence_date: Option<NaiveDate>,
    #[serde(default)]
    pub classification: SentenceClassification,
    #[serde(default)]
    pub term: Option<SentenceTerm>,
    #[serde(default)]
    pub sentence_type_description: Option<String>,
}

/// Sentence type classification as reported by the case-management API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SentenceClassification {
    Standard,
    Extended,
    Sopc,
    Indeterminate,
    Botus,
    NonCustodial,
    Legacy,
    #[default]
    #[serde(other)]
    Unknown,
}

impl SentenceClassification {
    pub const fn label(self) -> &'static str {
        match self {
            SentenceClassification::Standard => "Standard determinate",
            SentenceClassification::Extended => "Extended determinate",
            SentenceClassification::Sopc => "Sentence for offenders of particular concern",
            SentenceClassification::Indeterminate => "Indeterminate",
            SentenceClassification::Botus => "Breach of top-up supervision",
            SentenceClassification::NonCustodial => "Non-custodial",
            SentenceClassification::Legacy => "Legacy",
            SentenceClassification::Unknown => "Unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SentenceTerm {
    #[serde(default)]
    pub years: u32,
    #[serde(default)]
    pub months: u32,
    #[serde(default)]
    pub weeks: u32,
    #[serde(default)]
    pub days: u32,
}

impl SentenceTerm {
    pub fn end_date(&self, start: NaiveDate) -> Option<NaiveDate> {
        let months = self.years.checked_mul(12)?.checked_add(self.months)?;
        let days = u64::from(self.weeks) * 7 + u64::from(self.days);
        start
            .checked_add_months(Months::new(months))?
            .checked_add_days(Days::new(days))
    }

    /// Whether the term reaches twelve calendar months from `start`.
    pub fn is_twelve_months_or_more(&self, start: NaiveDate) -> bool {
        match (
            self.end_date(start),
            start.checked_add_months(Months::new(12)),
        ) {
            (Some(end), Some(threshold)) => end >= threshold,
            _ => true,
        }
    }

    pub fn describe(&self) -> String {
        let parts: Vec<String> = [
            (self.years, "year"),
            (self.months, "month"),
            (self.weeks, "week"),
            (self.days, "day"),
        ]
        .into_iter()
        .filter(|(value, _)| *value > 0)
        .map(|(value, unit)| {
            if value == 1 {
                format!("1 {unit}")
            } else {
                format!("{value} {unit}s")
            }
        })
        .collect();

        if parts.is_empty() {
            "No term recorded".to_string()
        } else {
            parts.join(" ")
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prisoner {
    pub prisoner_id: PrisonerId,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub prison_name: Option<String>,
}

impl Prisoner {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Authenticated user recording the recall.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Caseworker {
    pub username: String,
    pub active_caseload: Option<String>,
}

/// Aggregated submission sent to the case-management API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecallPayload {
    pub prisoner_id: PrisonerId,
    pub revocation_date: NaiveDate,
    pub return_to_custody_date: Option<NaiveDate>,
    pub recall_type_code: RecallType,
    pub sentence_ids: Vec<String>,
    pub created_by_username: String,
    pub created_by_prison: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn identifiers_reject_anything_outside_their_shape() {
        assert_eq!(
            PrisonerId::parse(" a1234bc "),
            Some(PrisonerId("A1234BC".to_string()))
        );
        for raw in ["A\nBC", "A1234B", "11234BC", "A1234BC1", "../admin", ""] {
            assert_eq!(PrisonerId::parse(raw), None, "{raw:?} accepted");
        }

        assert_eq!(
            RecallId::parse("0b6f0b1e-6a4c-4f7d-9a53-2f1c1f1d3e10"),
            Some(RecallId("0b6f0b1e-6a4c-4f7d-9a53-2f1c1f1d3e10".to_string()))
        );
        for raw in ["", "../recall", "r 1", "r?x=1", "r#1", "r\r\n1"] {
            assert_eq!(RecallId::parse(raw), None, "{raw:?} accepted");
        }
    }

    #[test]
    fn recall_type_codes_round_trip_through_from_code() {
        for recall_type in RecallType::ALL {
            assert_eq!(RecallType::from_code(recall_type.code()), Some(recall_type));
        }
        assert_eq!(RecallType::from_code(" ftr_14 "), Some(RecallType::FixedTerm14));
        assert_eq!(RecallType::from_code("FTR_56"), None);
    }

    #[test]
    fn fixed_term_window_runs_from_revocation_to_return_plus_term() {
        let recall = Recall {
            recall_id: RecallId("r-1".to_string()),
            prisoner_id: PrisonerId("A1234BC".to_string()),
            revocation_date: date(2024, 3, 1),
            return_to_custody_date: Some(date(2024, 3, 10)),
            recall_type: RecallType::FixedTerm14,
            sentence_ids: Vec::new(),
            created_by_username: None,
            created_at: None,
        };

        let window = recall.fixed_term_window().expect("fixed term window");
        assert_eq!(window.start, date(2024, 3, 1));
        assert_eq!(window.end, date(2024, 3, 24));
        assert!(window.contains(date(2024, 3, 23)));
        assert!(!window.contains(date(2024, 3, 24)));

        let standard = Recall {
            recall_type: RecallType::Standard,
            ..recall
        };
        assert!(standard.fixed_term_window().is_none());
    }

    #[test]
    fn twelve_month_boundary_uses_calendar_months() {
        let start = date(2023, 1, 31);
        let eleven_months = SentenceTerm {
            months: 11,
            weeks: 4,
            ..SentenceTerm::default()
        };
        assert!(!eleven_months.is_twelve_months_or_more(start));

        let one_year = SentenceTerm {
            years: 1,
            ..SentenceTerm::default()
        };
        assert!(one_year.is_twelve_months_or_more(start));
        assert_eq!(one_year.describe(), "1 year");
    }

    #[test]
    fn unknown_classifications_deserialize_as_unknown() {
        let sentence: Sentence = serde_json::from_value(serde_json::json!({
            "sentenceId": "s-1",
            "classification": "SOMETHING_NEW"
        }))
        .expect("sentence parses");
        assert_eq!(sentence.classification, SentenceClassification::Unknown);
        assert!(sentence.sentence_date.is_none());
    }

    #[test]
    fn payload_serializes_recall_type_code() {
        let payload = RecallPayload {
            prisoner_id: PrisonerId("A1234BC".to_string()),
            revocation_date: date(2024, 5, 2),
            return_to_custody_date: None,
            recall_type_code: RecallType::FixedTerm28,
            sentence_ids: vec!["s-1".to_string()],
            created_by_username: "caseworker".to_string(),
            created_by_prison: Some("MDI".to_string()),
        };

        let json = serde_json::to_value(&payload).expect("payload serializes");
        assert_eq!(json["recallTypeCode"], "FTR_28");
        assert_eq!(json["revocationDate"], "2024-05-02");
        assert_eq!(json["prisonerId"], "A1234BC");
    }
}
