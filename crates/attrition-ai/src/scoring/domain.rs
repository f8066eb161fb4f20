use std::collections::BTreeMap;
use std::fmt;
use std::ops::Deref;
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Scalar cell of a submitted record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Category(String),
}

impl FieldValue {
    /// Type a raw text cell: anything that parses as a finite float is numeric.
    pub fn from_raw(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.parse::<f64>() {
            Ok(value) if value.is_finite() => Self::Number(value),
            _ => Self::Category(trimmed.to_string()),
        }
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Category(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Category(value.to_string())
    }
}

/// One subject as submitted: field name to scalar value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(BTreeMap<String, FieldValue>);

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.0.get(field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, FieldValue)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, FieldValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Request schema for on-demand scoring. Field names match the HR dataset columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EmployeeRecord {
    pub age: i64,
    pub business_travel: String,
    pub daily_rate: i64,
    pub department: String,
    pub distance_from_home: i64,
    pub education: i64,
    pub education_field: String,
    pub environment_satisfaction: i64,
    pub gender: String,
    pub hourly_rate: i64,
    pub job_involvement: i64,
    pub job_level: i64,
    pub job_role: String,
    pub job_satisfaction: i64,
    pub marital_status: String,
    pub monthly_income: i64,
    pub monthly_rate: i64,
    pub num_companies_worked: i64,
    pub over_time: String,
    pub percent_salary_hike: i64,
    pub performance_rating: i64,
    pub relationship_satisfaction: i64,
    pub stock_option_level: i64,
    pub total_working_years: i64,
    pub training_times_last_year: i64,
    pub work_life_balance: i64,
    pub years_at_company: i64,
    pub years_in_current_role: i64,
    pub years_since_last_promotion: i64,
    pub years_with_curr_manager: i64,
}

impl From<EmployeeRecord> for Record {
    fn from(employee: EmployeeRecord) -> Self {
        Record::new()
            .with("Age", employee.age)
            .with("BusinessTravel", employee.business_travel)
            .with("DailyRate", employee.daily_rate)
            .with("Department", employee.department)
            .with("DistanceFromHome", employee.distance_from_home)
            .with("Education", employee.education)
            .with("EducationField", employee.education_field)
            .with("EnvironmentSatisfaction", employee.environment_satisfaction)
            .with("Gender", employee.gender)
            .with("HourlyRate", employee.hourly_rate)
            .with("JobInvolvement", employee.job_involvement)
            .with("JobLevel", employee.job_level)
            .with("JobRole", employee.job_role)
            .with("JobSatisfaction", employee.job_satisfaction)
            .with("MaritalStatus", employee.marital_status)
            .with("MonthlyIncome", employee.monthly_income)
            .with("MonthlyRate", employee.monthly_rate)
            .with("NumCompaniesWorked", employee.num_companies_worked)
            .with("OverTime", employee.over_time)
            .with("PercentSalaryHike", employee.percent_salary_hike)
            .with("PerformanceRating", employee.performance_rating)
            .with(
                "RelationshipSatisfaction",
                employee.relationship_satisfaction,
            )
            .with("StockOptionLevel", employee.stock_option_level)
            .with("TotalWorkingYears", employee.total_working_years)
            .with("TrainingTimesLastYear", employee.training_times_last_year)
            .with("WorkLifeBalance", employee.work_life_balance)
            .with("YearsAtCompany", employee.years_at_company)
            .with("YearsInCurrentRole", employee.years_in_current_role)
            .with(
                "YearsSinceLastPromotion",
                employee.years_since_last_promotion,
            )
            .with("YearsWithCurrManager", employee.years_with_curr_manager)
    }
}

/// A single named attribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImpact {
    pub feature: String,
    pub impact: f64,
}

/// Probability and explanation for one record of a scored batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordResult {
    #[serde(rename = "employee_index")]
    pub record_index: usize,
    pub probability: f64,
    pub top_features: Vec<FeatureImpact>,
}

/// Records ordered by probability descending, ties in batch order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RankedResultSet(Vec<RecordResult>);

impl RankedResultSet {
    pub(crate) fn from_sorted(results: Vec<RecordResult>) -> Self {
        Self(results)
    }
}

impl Deref for RankedResultSet {
    type Target = [RecordResult];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<'a> IntoIterator for &'a RankedResultSet {
    type Item = &'a RecordResult;
    type IntoIter = std::slice::Iter<'a, RecordResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// How many records survive the global ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordLimit {
    Top(usize),
    All,
}

impl RecordLimit {
    pub fn apply(self, len: usize) -> usize {
        match self {
            RecordLimit::Top(limit) => limit.min(len),
            RecordLimit::All => len,
        }
    }
}

impl Default for RecordLimit {
    fn default() -> Self {
        Self::Top(5)
    }
}

impl fmt::Display for RecordLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordLimit::Top(limit) => write!(f, "{limit}"),
            RecordLimit::All => f.write_str("all"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("expected a record count or 'all', got '{0}'")]
pub struct RecordLimitParseError(String);

impl FromStr for RecordLimit {
    type Err = RecordLimitParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }

        trimmed
            .parse::<usize>()
            .map(Self::Top)
            .map_err(|_| RecordLimitParseError(raw.to_string()))
    }
}

impl Serialize for RecordLimit {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            RecordLimit::Top(limit) => serializer.serialize_u64(*limit as u64),
            RecordLimit::All => serializer.serialize_str("all"),
        }
    }
}

impl<'de> Deserialize<'de> for RecordLimit {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct LimitVisitor;

        impl Visitor<'_> for LimitVisitor {
            type Value = RecordLimit;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a non-negative integer or \"all\"")
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<RecordLimit, E> {
                usize::try_from(value)
                    .map(RecordLimit::Top)
                    .map_err(|_| E::custom("record limit out of range"))
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<RecordLimit, E> {
                u64::try_from(value)
                    .map_err(|_| E::custom("record limit must not be negative"))
                    .and_then(|value| self.visit_u64(value))
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<RecordLimit, E> {
                value.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(LimitVisitor)
    }
}

/// Summary of the loaded artifacts, served from `/model-info`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub status: String,
    pub model_loaded: bool,
    pub pipeline_loaded: bool,
    pub model_type: String,
    pub features: Vec<String>,
    pub n_features: usize,
}

impl ModelInfo {
    pub fn loaded(model_type: impl Into<String>, features: Vec<String>) -> Self {
        Self {
            status: "success".to_string(),
            model_loaded: true,
            pipeline_loaded: true,
            model_type: model_type.into(),
            n_features: features.len(),
            features,
        }
    }
}
