//! Impressions endpoints
//!
//! One route family per granularity under `/api/v1/impressions`:
//! `recent/`, `period/`, `date/:label`, plus the cache-busting shortcuts
//! `daily/last_week/`, `daily/last_month/` and `monthly/last_year/`.
//! Range results are ascending by label; `recent` ranges are open-ended.

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::{Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use sfl_common::{Bucket, Granularity, PeriodLabel};
use tracing::debug;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statistic {
    pub positive: u64,
    pub neutral: u64,
    pub negative: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateStatistic {
    pub date: String,
    pub statistic: Statistic,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateStatisticSeries {
    pub series: Vec<DateStatistic>,
}

impl From<Bucket> for DateStatistic {
    fn from(bucket: Bucket) -> Self {
        Self {
            date: bucket.period.as_str().to_string(),
            statistic: Statistic {
                positive: bucket.counts.positive,
                neutral: bucket.counts.neutral,
                negative: bucket.counts.negative,
            },
        }
    }
}

impl From<Vec<Bucket>> for DateStatisticSeries {
    fn from(buckets: Vec<Bucket>) -> Self {
        Self {
            series: buckets.into_iter().map(DateStatistic::from).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DateQuery {
    pub date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    pub n: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct PeriodQuery {
    pub start: Option<String>,
    pub end: Option<String>,
}

const DEFAULT_RECENT_DAYS: u32 = 7;
const DEFAULT_RECENT_MONTHS: u32 = 12;

pub fn impressions_routes() -> Router<AppState> {
    Router::new()
        .route("/hourly/recent/", get(hourly_recent))
        .route("/hourly/period/", get(hourly_period))
        .route("/hourly/date/:label", get(hourly_date))
        .route("/daily/recent/", get(daily_recent))
        .route("/daily/last_week/", get(daily_last_week))
        .route("/daily/last_month/", get(daily_last_month))
        .route("/daily/period/", get(daily_period))
        .route("/daily/date/:label", get(daily_date))
        .route("/monthly/recent/", get(monthly_recent))
        .route("/monthly/last_year/", get(monthly_last_year))
        .route("/monthly/period/", get(monthly_period))
        .route("/monthly/date/:label", get(monthly_date))
}

fn query_params<T>(query: Result<Query<T>, QueryRejection>) -> ApiResult<T> {
    query
        .map(|Query(params)| params)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

fn required<'a>(value: &'a Option<String>, name: &str) -> ApiResult<&'a str> {
    value
        .as_deref()
        .ok_or_else(|| ApiError::BadRequest(format!("Missing query parameter '{}'", name)))
}

fn recent_count(n: Option<u32>, default: u32) -> ApiResult<u32> {
    match n.unwrap_or(default) {
        0 => Err(ApiError::BadRequest("n must be at least 1".to_string())),
        n => Ok(n),
    }
}

async fn range(state: &AppState, from: PeriodLabel, to: Option<PeriodLabel>) -> ApiResult<Json<DateStatisticSeries>> {
    debug!(from = %from, to = ?to.as_ref().map(PeriodLabel::as_str), "Range query");
    let buckets = state.store.query_range(&from, to.as_ref()).await?;
    Ok(Json(buckets.into()))
}

async fn period(state: &AppState, granularity: Granularity, params: PeriodQuery) -> ApiResult<Json<DateStatisticSeries>> {
    let from = PeriodLabel::parse(granularity, required(&params.start, "start")?)?;
    let to = params
        .end
        .as_deref()
        .map(|end| PeriodLabel::parse(granularity, end))
        .transpose()?;
    range(state, from, to).await
}

async fn exact(state: &AppState, granularity: Granularity, label: &str) -> ApiResult<Json<DateStatistic>> {
    let period = PeriodLabel::parse(granularity, label)?;
    match state.store.query_exact(&period).await? {
        Some(bucket) => Ok(Json(bucket.into())),
        None => Err(ApiError::NotFound(format!("No impressions for '{}'", period))),
    }
}

fn out_of_range() -> ApiError {
    ApiError::BadRequest("n out of range".to_string())
}

/// First day returned by `daily/recent` for `n` days
fn daily_recent_start(today: NaiveDate, n: u32, day_offset: u32) -> ApiResult<NaiveDate> {
    let back = u64::from(n) + u64::from(day_offset.saturating_sub(1));
    today.checked_sub_days(Days::new(back)).ok_or_else(out_of_range)
}

/// First month returned by `monthly/recent` for `n` months
fn monthly_recent_start(today: NaiveDate, n: u32, day_offset: u32) -> ApiResult<NaiveDate> {
    today
        .checked_sub_months(Months::new(n))
        .and_then(|d| d.checked_sub_days(Days::new(u64::from(day_offset))))
        .ok_or_else(out_of_range)
}

// ---- hourly ----

/// GET /hourly/recent/?date=YYYY-MM-DD
pub async fn hourly_recent(
    State(state): State<AppState>,
    query: Result<Query<DateQuery>, QueryRejection>,
) -> ApiResult<Json<DateStatisticSeries>> {
    let params = query_params(query)?;
    let day = PeriodLabel::parse(Granularity::Day, required(&params.date, "date")?)?;

    let first = PeriodLabel::parse(Granularity::Hour, &format!("{}:00", day))?;
    let last = PeriodLabel::parse(Granularity::Hour, &format!("{}:23", day))?;
    range(&state, first, Some(last)).await
}

pub async fn hourly_period(
    State(state): State<AppState>,
    query: Result<Query<PeriodQuery>, QueryRejection>,
) -> ApiResult<Json<DateStatisticSeries>> {
    period(&state, Granularity::Hour, query_params(query)?).await
}

pub async fn hourly_date(State(state): State<AppState>, Path(label): Path<String>) -> ApiResult<Json<DateStatistic>> {
    exact(&state, Granularity::Hour, &label).await
}

// ---- daily ----

async fn daily_recent_n(state: &AppState, n: u32) -> ApiResult<Json<DateStatisticSeries>> {
    let start = daily_recent_start(state.today(), n, state.day_offset)?;
    range(state, PeriodLabel::for_day(start), None).await
}

/// GET /daily/recent/?n=7
pub async fn daily_recent(
    State(state): State<AppState>,
    query: Result<Query<RecentQuery>, QueryRejection>,
) -> ApiResult<Json<DateStatisticSeries>> {
    let n = recent_count(query_params(query)?.n, DEFAULT_RECENT_DAYS)?;
    daily_recent_n(&state, n).await
}

/// GET /daily/last_week/?date=YYYY-MM-DD
///
/// `date` only busts caches; it must be well formed but does not move the window.
pub async fn daily_last_week(
    State(state): State<AppState>,
    query: Result<Query<DateQuery>, QueryRejection>,
) -> ApiResult<Json<DateStatisticSeries>> {
    PeriodLabel::parse(Granularity::Day, required(&query_params(query)?.date, "date")?)?;
    daily_recent_n(&state, 7).await
}

pub async fn daily_last_month(
    State(state): State<AppState>,
    query: Result<Query<DateQuery>, QueryRejection>,
) -> ApiResult<Json<DateStatisticSeries>> {
    PeriodLabel::parse(Granularity::Day, required(&query_params(query)?.date, "date")?)?;
    daily_recent_n(&state, 31).await
}

pub async fn daily_period(
    State(state): State<AppState>,
    query: Result<Query<PeriodQuery>, QueryRejection>,
) -> ApiResult<Json<DateStatisticSeries>> {
    period(&state, Granularity::Day, query_params(query)?).await
}

pub async fn daily_date(State(state): State<AppState>, Path(label): Path<String>) -> ApiResult<Json<DateStatistic>> {
    exact(&state, Granularity::Day, &label).await
}

// ---- monthly ----

async fn monthly_recent_n(state: &AppState, n: u32) -> ApiResult<Json<DateStatisticSeries>> {
    let start = monthly_recent_start(state.today(), n, state.day_offset)?;
    range(state, PeriodLabel::for_month(start), None).await
}

/// GET /monthly/recent/?n=12
pub async fn monthly_recent(
    State(state): State<AppState>,
    query: Result<Query<RecentQuery>, QueryRejection>,
) -> ApiResult<Json<DateStatisticSeries>> {
    let n = recent_count(query_params(query)?.n, DEFAULT_RECENT_MONTHS)?;
    monthly_recent_n(&state, n).await
}

/// GET /monthly/last_year/?date=YYYY-MM
pub async fn monthly_last_year(
    State(state): State<AppState>,
    query: Result<Query<DateQuery>, QueryRejection>,
) -> ApiResult<Json<DateStatisticSeries>> {
    PeriodLabel::parse(Granularity::Month, required(&query_params(query)?.date, "date")?)?;
    monthly_recent_n(&state, 12).await
}

pub async fn monthly_period(
    State(state): State<AppState>,
    query: Result<Query<PeriodQuery>, QueryRejection>,
) -> ApiResult<Json<DateStatisticSeries>> {
    period(&state, Granularity::Month, query_params(query)?).await
}

pub async fn monthly_date(State(state): State<AppState>, Path(label): Path<String>) -> ApiResult<Json<DateStatistic>> {
    exact(&state, Granularity::Month, &label).await
}
