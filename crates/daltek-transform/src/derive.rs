use chrono::{Datelike, Duration, NaiveDate};
use daltek_formula::Formula;
use daltek_ir::{value, AggFunc, CalculationSpec, ColumnType, Table};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::debug;

use crate::aggregate::{aggregate_values, mean, variance};
use crate::{require, Result, TransformEngine, TransformError};

/// Reducer for [`TransformEngine::rolling_window`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RollingFunc {
    Mean,
    Sum,
    Min,
    Max,
    Std,
}

impl RollingFunc {
    pub fn as_str(&self) -> &'static str {
        match self {
            RollingFunc::Mean => "mean",
            RollingFunc::Sum => "sum",
            RollingFunc::Min => "min",
            RollingFunc::Max => "max",
            RollingFunc::Std => "std",
        }
    }

    fn apply(&self, window: &[f64]) -> Option<f64> {
        match self {
            RollingFunc::Mean => mean(window),
            RollingFunc::Sum => Some(window.iter().sum()),
            RollingFunc::Min => window.iter().copied().reduce(f64::min),
            RollingFunc::Max => window.iter().copied().reduce(f64::max),
            RollingFunc::Std => variance(window).map(f64::sqrt),
        }
    }
}

impl FromStr for RollingFunc {
    type Err = TransformError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "mean" | "avg" => Ok(RollingFunc::Mean),
            "sum" => Ok(RollingFunc::Sum),
            "min" => Ok(RollingFunc::Min),
            "max" => Ok(RollingFunc::Max),
            "std" => Ok(RollingFunc::Std),
            other => Err(TransformError::invalid(
                "rolling window",
                format!("unknown function '{}'", other),
            )),
        }
    }
}

impl TransformEngine {
    /// Add one derived column per calculation, in declaration order.
    ///
    /// Later formulas can reference columns added by earlier ones.
    /// Calculations without a formula are skipped.
    pub fn calculate(&self, table: &Table, calculations: &IndexMap<String, CalculationSpec>) -> Result<Table> {
        let mut out = table.clone();
        for (name, spec) in calculations {
            let Some(source) = spec.formula.as_deref().filter(|f| !f.trim().is_empty()) else {
                continue;
            };
            let values = Formula::compile(source)
                .and_then(|f| f.evaluate(&out))
                .map_err(|source| TransformError::Calculation {
                    column: name.clone(),
                    source,
                })?;
            debug!(column = %name, formula = source, "calculated column");
            out = out.with_column(name, values);
        }
        Ok(out)
    }

    /// Running total as `<column>_cumsum`. Null cells stay null and do not reset the total.
    pub fn cumulative_sum(&self, table: &Table, column: &str) -> Result<Table> {
        let idx = require(table, column)?;
        let mut total = 0.0;
        let values = table
            .column_values(idx)
            .map(|v| match value::coerce_f64(v).filter(|_| !value::is_null(v)) {
                Some(f) => {
                    total += f;
                    value::number(total)
                }
                None => Value::Null,
            })
            .collect();
        Ok(table.with_column(&format!("{}_cumsum", column), values))
    }

    /// Percent change from the previous row as `<column>_pct_change`.
    /// The first row, and any row next to a null or a zero, is null.
    pub fn percent_change(&self, table: &Table, column: &str) -> Result<Table> {
        let idx = require(table, column)?;
        let nums: Vec<Option<f64>> = table.column_values(idx).map(value::as_f64).collect();
        let values = (0..nums.len())
            .map(|i| match (i.checked_sub(1).and_then(|p| nums[p]), nums[i]) {
                (Some(prev), Some(cur)) if prev != 0.0 => value::number((cur - prev) / prev * 100.0),
                _ => Value::Null,
            })
            .collect();
        Ok(table.with_column(&format!("{}_pct_change", column), values))
    }

    /// Dense rank as `<column>_rank`, highest value first unless `ascending`
    pub fn rank(&self, table: &Table, column: &str, ascending: bool) -> Result<Table> {
        let idx = require(table, column)?;
        let nums: Vec<Option<f64>> = table.column_values(idx).map(value::coerce_f64).collect();

        let mut distinct: Vec<f64> = nums.iter().flatten().copied().collect();
        distinct.sort_by(|a, b| if ascending { a.total_cmp(b) } else { b.total_cmp(a) });
        distinct.dedup();

        let values = nums
            .iter()
            .map(|n| match n {
                Some(f) => distinct
                    .iter()
                    .position(|d| d == f)
                    .map_or(Value::Null, |p| Value::from(p + 1)),
                None => Value::Null,
            })
            .collect();
        Ok(table.with_column(&format!("{}_rank", column), values))
    }

    /// Equal-width binning into `bins` intervals as `<column>_bin`.
    ///
    /// Without labels each cell gets its interval as `"(low, high]"`, the
    /// first interval also holding the minimum. Labels, when given, must
    /// number exactly `bins`.
    pub fn bin(&self, table: &Table, column: &str, bins: usize, labels: Option<&[String]>) -> Result<Table> {
        let idx = require(table, column)?;
        if bins == 0 {
            return Err(TransformError::invalid("bin", "bin count must be positive"));
        }
        if let Some(labels) = labels.filter(|l| l.len() != bins) {
            return Err(TransformError::invalid(
                "bin",
                format!("expected {} labels, got {}", bins, labels.len()),
            ));
        }

        let nums: Vec<Option<f64>> = table.column_values(idx).map(value::as_f64).collect();
        let present = nums.iter().flatten();
        let (min, max) = present.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        let width = if max > min { (max - min) / bins as f64 } else { 1.0 };
        let edge = |i: usize| min + width * i as f64;

        let values = nums
            .iter()
            .map(|n| {
                let Some(v) = *n else {
                    return Value::Null;
                };
                let slot = (((v - min) / width).ceil() as usize).saturating_sub(1).min(bins - 1);
                match labels {
                    Some(labels) => Value::String(labels[slot].clone()),
                    None => Value::String(format!("({}, {}]", round3(edge(slot)), round3(edge(slot + 1)))),
                }
            })
            .collect();
        Ok(table.with_column(&format!("{}_bin", column), values))
    }

    /// Moving `func` over the last `window` rows as `<column>_<func>_<window>`.
    /// Null until the window is full, and wherever the window holds a null.
    pub fn rolling_window(&self, table: &Table, column: &str, window: usize, func: RollingFunc) -> Result<Table> {
        let idx = require(table, column)?;
        if window == 0 {
            return Err(TransformError::invalid("rolling window", "window must be positive"));
        }
        let nums: Vec<Option<f64>> = table.column_values(idx).map(value::as_f64).collect();
        let values = (0..nums.len())
            .map(|i| {
                if i + 1 < window {
                    return Value::Null;
                }
                nums[i + 1 - window..=i]
                    .iter()
                    .copied()
                    .collect::<Option<Vec<f64>>>()
                    .and_then(|w| func.apply(&w))
                    .map_or(Value::Null, value::number)
            })
            .collect();
        Ok(table.with_column(&format!("{}_{}_{}", column, func.as_str(), window), values))
    }
}

/// Bucket width for [`TransformEngine::resample_time_series`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResampleFreq {
    #[serde(rename = "D")]
    Day,
    #[serde(rename = "W")]
    Week,
    #[serde(rename = "M")]
    Month,
    #[serde(rename = "Q")]
    Quarter,
    #[serde(rename = "Y")]
    Year,
}

impl ResampleFreq {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResampleFreq::Day => "D",
            ResampleFreq::Week => "W",
            ResampleFreq::Month => "M",
            ResampleFreq::Quarter => "Q",
            ResampleFreq::Year => "Y",
        }
    }

    /// Last day of the period holding `date`. Weeks end on Sunday.
    fn period_end(&self, date: NaiveDate) -> Option<NaiveDate> {
        match self {
            ResampleFreq::Day => Some(date),
            ResampleFreq::Week => {
                let to_sunday = 6 - i64::from(date.weekday().num_days_from_monday());
                date.checked_add_signed(Duration::days(to_sunday))
            }
            ResampleFreq::Month => month_end(date.year(), date.month()),
            ResampleFreq::Quarter => month_end(date.year(), (date.month() - 1) / 3 * 3 + 3),
            ResampleFreq::Year => NaiveDate::from_ymd_opt(date.year(), 12, 31),
        }
    }
}

impl FromStr for ResampleFreq {
    type Err = TransformError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "D" => Ok(ResampleFreq::Day),
            "W" => Ok(ResampleFreq::Week),
            "M" | "ME" => Ok(ResampleFreq::Month),
            "Q" | "QE" => Ok(ResampleFreq::Quarter),
            "Y" | "A" | "YE" => Ok(ResampleFreq::Year),
            _ => Err(TransformError::invalid(
                "resample",
                format!("unknown frequency '{}', expected one of D, W, M, Q, Y", s),
            )),
        }
    }
}

fn month_end(year: i32, month: u32) -> Option<NaiveDate> {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)?.pred_opt()
}

impl TransformEngine {
    /// Bucket rows by period of `date_column` and reduce every numeric column
    /// with `agg`. Buckets are labelled by their last day (`%Y-%m-%d`) and run
    /// without gaps from the first to the last populated period; empty ones
    /// get the reducer's empty value. Rows with a null date are dropped.
    pub fn resample_time_series(&self, table: &Table, date_column: &str, freq: ResampleFreq, agg: AggFunc) -> Result<Table> {
        let date_idx = require(table, date_column)?;
        let numeric: Vec<usize> = (0..table.width())
            .filter(|&i| i != date_idx && ColumnType::infer(table.column_values(i)) == ColumnType::Numeric)
            .collect();

        let mut buckets: BTreeMap<NaiveDate, Vec<usize>> = BTreeMap::new();
        for (row, cell) in table.column_values(date_idx).enumerate() {
            if value::is_null(cell) {
                continue;
            }
            let end = value::as_datetime(cell)
                .and_then(|dt| freq.period_end(dt.date()))
                .ok_or_else(|| {
                    TransformError::invalid("resample", format!("'{}' in '{}' is not a date", value::display(cell), date_column))
                })?;
            buckets.entry(end).or_default().push(row);
        }

        let mut columns = vec![date_column.to_string()];
        columns.extend(numeric.iter().map(|&i| table.columns[i].clone()));
        let mut out = Table::new(columns);

        let (Some(&first), Some(&last)) = (buckets.keys().next(), buckets.keys().next_back()) else {
            return Ok(out);
        };
        let mut label = first;
        while label <= last {
            let rows = buckets.get(&label).map(Vec::as_slice).unwrap_or_default();
            let mut row = vec![Value::String(label.format("%Y-%m-%d").to_string())];
            for &col in &numeric {
                let cells: Vec<&Value> = rows.iter().map(|&r| &table.rows[r][col]).collect();
                row.push(aggregate_values(agg, &cells));
            }
            out.push_row(row);
            let Some(next) = label.succ_opt().and_then(|d| freq.period_end(d)) else {
                break;
            };
            label = next;
        }

        debug!(buckets = out.row_count(), freq = freq.as_str(), "resample");
        Ok(out)
    }
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}
