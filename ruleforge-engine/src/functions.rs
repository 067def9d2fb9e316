//! Built-in function registry (§6 "Built-in functions").
//!
//! Dispatch is a flat `match` on function name, mirroring
//! `ruleforge_core::registry::function_min_arity`'s name list so the two
//! never drift apart — arity is checked by the validator ahead of time and
//! re-checked defensively here.

use crate::error::EvalError;
use chrono::{Datelike, Duration, NaiveDate, Utc, Weekday};
use ruleforge_core::Value;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;

fn num(v: &Value) -> Result<Decimal, EvalError> {
    v.as_number().ok_or_else(|| EvalError::TypeMismatch {
        op: "function argument".to_string(),
        lhs: v.type_name(),
        rhs: "number",
    })
}

fn text(v: &Value) -> String {
    v.to_display_string()
}

/// True if any of the given values is `Value::Null` (§6 "well-defined
/// behavior on null inputs": pure functions return null, validators return
/// false, rather than raising a type-mismatch error on a missing input).
fn any_null(values: &[&Value]) -> bool {
    values.iter().any(|v| v.is_null())
}

fn arity(name: &str, args: &[Value], min: usize) -> Result<(), EvalError> {
    if args.len() < min {
        return Err(EvalError::Arity {
            name: name.to_string(),
            min,
            got: args.len(),
        });
    }
    Ok(())
}

/// Dispatch a built-in function call. Arguments have already been evaluated
/// left-to-right by the caller.
pub fn call(name: &str, args: Vec<Value>) -> Result<Value, EvalError> {
    match name {
        // ---- Math ----------------------------------------------------
        "max" => reduce_numeric(&args, Decimal::max),
        "min" => reduce_numeric(&args, Decimal::min),
        "abs" => {
            arity(name, &args, 1)?;
            Ok(Value::Number(num(&args[0])?.abs()))
        }
        "round" => {
            arity(name, &args, 1)?;
            let places = args.get(1).map(num).transpose()?.and_then(|d| d.to_u32()).unwrap_or(0);
            Ok(Value::Number(num(&args[0])?.round_dp(places)))
        }
        "ceil" => {
            arity(name, &args, 1)?;
            Ok(Value::Number(num(&args[0])?.ceil()))
        }
        "floor" => {
            arity(name, &args, 1)?;
            Ok(Value::Number(num(&args[0])?.floor()))
        }
        "sqrt" => {
            arity(name, &args, 1)?;
            let n = num(&args[0])?;
            let f = n.to_f64().unwrap_or(0.0).sqrt();
            Ok(Value::Number(Decimal::from_str(&f.to_string()).unwrap_or(Decimal::ZERO)))
        }
        "pow" => {
            arity(name, &args, 2)?;
            let base = num(&args[0])?;
            let exp = num(&args[1])?;
            Ok(Value::Number(decimal_pow(base, exp)))
        }
        "sum" => {
            arity(name, &args, 1)?;
            let list = args[0].as_list().unwrap_or(&[]);
            let mut total = Decimal::ZERO;
            for v in list {
                total += num(v)?;
            }
            Ok(Value::Number(total))
        }
        "avg" | "average" => {
            arity(name, &args, 1)?;
            let list = args[0].as_list().unwrap_or(&[]);
            if list.is_empty() {
                return Ok(Value::Null);
            }
            let mut total = Decimal::ZERO;
            for v in list {
                total += num(v)?;
            }
            Ok(Value::Number(total / Decimal::from(list.len() as i64)))
        }

        // ---- String ----------------------------------------------------
        "length" | "len" => {
            arity(name, &args, 1)?;
            Ok(Value::Number(Decimal::from(text(&args[0]).chars().count() as i64)))
        }
        "upper" | "uppercase" => {
            arity(name, &args, 1)?;
            Ok(Value::String(text(&args[0]).to_uppercase()))
        }
        "lower" | "lowercase" => {
            arity(name, &args, 1)?;
            Ok(Value::String(text(&args[0]).to_lowercase()))
        }
        "trim" => {
            arity(name, &args, 1)?;
            Ok(Value::String(text(&args[0]).trim().to_string()))
        }
        "substring" | "substr" => {
            arity(name, &args, 2)?;
            let s: Vec<char> = text(&args[0]).chars().collect();
            let start = num(&args[1])?.to_i64().unwrap_or(0).max(0) as usize;
            let end = args
                .get(2)
                .map(num)
                .transpose()?
                .and_then(|d| d.to_i64())
                .map(|n| n.max(0) as usize)
                .unwrap_or(s.len());
            let start = start.min(s.len());
            let end = end.min(s.len()).max(start);
            Ok(Value::String(s[start..end].iter().collect()))
        }
        "contains" => {
            arity(name, &args, 2)?;
            Ok(Value::Boolean(text(&args[0]).contains(&text(&args[1]))))
        }
        "startswith" => {
            arity(name, &args, 2)?;
            Ok(Value::Boolean(text(&args[0]).starts_with(&text(&args[1]))))
        }
        "endswith" => {
            arity(name, &args, 2)?;
            Ok(Value::Boolean(text(&args[0]).ends_with(&text(&args[1]))))
        }
        "replace" => {
            arity(name, &args, 3)?;
            Ok(Value::String(text(&args[0]).replace(&text(&args[1]), &text(&args[2]))))
        }

        // ---- Date/time ---------------------------------------------------
        "now" => Ok(Value::DateTime(Utc::now())),
        "today" => Ok(Value::DateTime(Utc::now())),
        "dateadd" => {
            arity(name, &args, 3)?;
            let dt = as_datetime(&args[0])?;
            let amount = num(&args[1])?.to_i64().unwrap_or(0);
            let unit = text(&args[2]);
            Ok(Value::DateTime(add_duration(dt, amount, &unit)))
        }
        "datediff" => {
            arity(name, &args, 2)?;
            let a = as_datetime(&args[0])?;
            let b = as_datetime(&args[1])?;
            Ok(Value::Number(Decimal::from((a - b).num_days())))
        }
        "time_hour" => {
            arity(name, &args, 1)?;
            Ok(Value::Number(Decimal::from(as_datetime(&args[0])?.hour())))
        }
        "format_date" => {
            arity(name, &args, 2)?;
            let dt = as_datetime(&args[0])?;
            let fmt = text(&args[1]);
            Ok(Value::String(dt.format(&fmt).to_string()))
        }
        "calculate_age" => {
            arity(name, &args, 1)?;
            let dt = as_datetime(&args[0])?;
            let now = Utc::now();
            let mut years = now.year() - dt.year();
            if (now.month(), now.day()) < (dt.month(), dt.day()) {
                years -= 1;
            }
            Ok(Value::Number(Decimal::from(years)))
        }

        // ---- List ----------------------------------------------------
        "size" | "count" => {
            arity(name, &args, 1)?;
            Ok(Value::Number(Decimal::from(args[0].as_list().map(|l| l.len()).unwrap_or(0) as i64)))
        }
        "first" => {
            arity(name, &args, 1)?;
            Ok(args[0].as_list().and_then(|l| l.first()).cloned().unwrap_or(Value::Null))
        }
        "last" => {
            arity(name, &args, 1)?;
            Ok(args[0].as_list().and_then(|l| l.last()).cloned().unwrap_or(Value::Null))
        }

        // ---- Type conversion ----------------------------------------------
        "tonumber" | "number" => {
            arity(name, &args, 1)?;
            Ok(match &args[0] {
                Value::Null => Value::Null,
                Value::Number(n) => Value::Number(*n),
                Value::String(s) => Decimal::from_str(s.trim()).map(Value::Number).unwrap_or(Value::Null),
                Value::Boolean(b) => Value::Number(if *b { Decimal::ONE } else { Decimal::ZERO }),
                _ => Value::Null,
            })
        }
        "tostring" | "string" => {
            arity(name, &args, 1)?;
            Ok(Value::String(text(&args[0])))
        }
        "toboolean" | "boolean" => {
            arity(name, &args, 1)?;
            Ok(Value::Boolean(args[0].is_truthy()))
        }

        // ---- Validation ----------------------------------------------------
        "is_valid_credit_score" => {
            arity(name, &args, 1)?;
            Ok(Value::Boolean(num(&args[0]).map(|n| (300..=850).contains(&n.to_i64().unwrap_or(0))).unwrap_or(false)))
        }
        "is_valid_ssn" => {
            arity(name, &args, 1)?;
            Ok(Value::Boolean(is_ssn_shape(&text(&args[0]))))
        }
        "is_valid_account" => {
            arity(name, &args, 1)?;
            let s = text(&args[0]);
            Ok(Value::Boolean((4..=17).contains(&s.len()) && s.chars().all(|c| c.is_ascii_digit())))
        }
        "is_valid_routing" => {
            arity(name, &args, 1)?;
            let s = text(&args[0]);
            Ok(Value::Boolean(s.len() == 9 && s.chars().all(|c| c.is_ascii_digit())))
        }
        "is_business_day" => {
            arity(name, &args, 1)?;
            if any_null(&[&args[0]]) {
                return Ok(Value::Boolean(false));
            }
            let dt = as_datetime(&args[0])?;
            Ok(Value::Boolean(!matches!(dt.weekday(), Weekday::Sat | Weekday::Sun)))
        }
        "age_meets_requirement" => {
            arity(name, &args, 2)?;
            if any_null(&[&args[0], &args[1]]) {
                return Ok(Value::Boolean(false));
            }
            let dob = as_datetime(&args[0])?;
            let min_age = num(&args[1])?.to_i64().unwrap_or(0);
            let now = Utc::now();
            let mut years = now.year() - dob.year();
            if (now.month(), now.day()) < (dob.month(), dob.day()) {
                years -= 1;
            }
            Ok(Value::Boolean(years as i64 >= min_age))
        }
        "validate_email" => {
            arity(name, &args, 1)?;
            Ok(Value::Boolean(is_email_shape(&text(&args[0]))))
        }
        "validate_phone" => {
            arity(name, &args, 1)?;
            let digits = text(&args[0]).chars().filter(|c| c.is_ascii_digit()).count();
            Ok(Value::Boolean((10..=15).contains(&digits)))
        }
        "is_valid" => {
            arity(name, &args, 1)?;
            Ok(Value::Boolean(!args[0].is_null()))
        }
        "in_range" => {
            arity(name, &args, 3)?;
            if any_null(&[&args[0], &args[1], &args[2]]) {
                return Ok(Value::Boolean(false));
            }
            let n = num(&args[0])?;
            let lo = num(&args[1])?;
            let hi = num(&args[2])?;
            let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
            Ok(Value::Boolean(n >= lo && n <= hi))
        }

        // ---- Financial domain ----------------------------------------------------
        "calculate_loan_payment" => {
            arity(name, &args, 3)?;
            if any_null(&[&args[0], &args[1], &args[2]]) {
                return Ok(Value::Null);
            }
            let principal = num(&args[0])?;
            let annual_rate = num(&args[1])?;
            let term_months = num(&args[2])?;
            Ok(Value::Number(loan_payment(principal, annual_rate, term_months)))
        }
        "calculate_compound_interest" => {
            arity(name, &args, 4)?;
            if any_null(&[&args[0], &args[1], &args[2], &args[3]]) {
                return Ok(Value::Null);
            }
            let principal = num(&args[0])?;
            let annual_rate = num(&args[1])?;
            let times_per_year = num(&args[2])?;
            let years = num(&args[3])?;
            Ok(Value::Number(compound_interest(principal, annual_rate, times_per_year, years)))
        }
        "calculate_amortization" => {
            arity(name, &args, 3)?;
            if any_null(&[&args[0], &args[1], &args[2]]) {
                return Ok(Value::Null);
            }
            let principal = num(&args[0])?;
            let annual_rate = num(&args[1])?;
            let term_months = num(&args[2])?;
            let payment = loan_payment(principal, annual_rate, term_months);
            Ok(Value::Number(payment))
        }
        "calculate_apr" => {
            arity(name, &args, 3)?;
            if any_null(&[&args[0], &args[1], &args[2]]) {
                return Ok(Value::Null);
            }
            let nominal_rate = num(&args[0])?;
            let fees = num(&args[1])?;
            let principal = num(&args[2])?;
            if principal.is_zero() {
                return Err(EvalError::DivisionByZero);
            }
            Ok(Value::Number(nominal_rate + (fees / principal) * Decimal::from(100)))
        }
        "calculate_credit_score" => {
            arity(name, &args, 1)?;
            if any_null(&[&args[0]]) {
                return Ok(Value::Null);
            }
            let ratio = num(&args[0])?;
            let score = Decimal::from(300) + (Decimal::ONE - ratio.min(Decimal::ONE).max(Decimal::ZERO)) * Decimal::from(550);
            Ok(Value::Number(score.round_dp(0)))
        }
        "calculate_risk_score" => {
            arity(name, &args, 1)?;
            if any_null(&[&args[0]]) {
                return Ok(Value::Null);
            }
            let factor = num(&args[0])?;
            Ok(Value::Number((Decimal::ONE - factor.min(Decimal::ONE).max(Decimal::ZERO)) * Decimal::from(100)))
        }
        "calculate_debt_ratio" | "debt_to_income_ratio" => {
            arity(name, &args, 2)?;
            if any_null(&[&args[0], &args[1]]) {
                return Ok(Value::Null);
            }
            let debt = num(&args[0])?;
            let income = num(&args[1])?;
            if income.is_zero() {
                return Err(EvalError::DivisionByZero);
            }
            Ok(Value::Number(debt / income))
        }
        "calculate_ltv" | "loan_to_value" => {
            arity(name, &args, 2)?;
            if any_null(&[&args[0], &args[1]]) {
                return Ok(Value::Null);
            }
            let loan = num(&args[0])?;
            let value = num(&args[1])?;
            if value.is_zero() {
                return Err(EvalError::DivisionByZero);
            }
            Ok(Value::Number(loan / value))
        }
        "calculate_payment_schedule" => {
            arity(name, &args, 3)?;
            if any_null(&[&args[0], &args[1], &args[2]]) {
                return Ok(Value::Null);
            }
            let principal = num(&args[0])?;
            let annual_rate = num(&args[1])?;
            let term_months = num(&args[2])?;
            let payment = loan_payment(principal, annual_rate, term_months);
            let months = term_months.to_i64().unwrap_or(0).max(0);
            let schedule: Vec<Value> = (0..months).map(|_| Value::Number(payment)).collect();
            Ok(Value::List(schedule))
        }
        "credit_utilization" => {
            arity(name, &args, 2)?;
            if any_null(&[&args[0], &args[1]]) {
                return Ok(Value::Null);
            }
            let balance = num(&args[0])?;
            let limit = num(&args[1])?;
            if limit.is_zero() {
                return Err(EvalError::DivisionByZero);
            }
            Ok(Value::Number(balance / limit))
        }
        "payment_history_score" => {
            arity(name, &args, 1)?;
            if any_null(&[&args[0]]) {
                return Ok(Value::Null);
            }
            let on_time_ratio = num(&args[0])?;
            Ok(Value::Number((on_time_ratio.min(Decimal::ONE).max(Decimal::ZERO)) * Decimal::from(100)))
        }

        // ---- Formatting & IDs ----------------------------------------------------
        "format_currency" => {
            arity(name, &args, 1)?;
            Ok(Value::String(format!("${:.2}", num(&args[0])?.to_f64().unwrap_or(0.0))))
        }
        "format_percentage" => {
            arity(name, &args, 1)?;
            Ok(Value::String(format!("{:.2}%", (num(&args[0])? * Decimal::from(100)).to_f64().unwrap_or(0.0))))
        }
        "generate_account_number" => Ok(Value::String(deterministic_id("ACCT"))),
        "generate_transaction_id" => Ok(Value::String(deterministic_id("TXN"))),
        "distance_between" => {
            arity(name, &args, 2)?;
            // Haversine over {lat, lon} maps; undefined inputs yield null.
            let (a_lat, a_lon) = as_latlon(&args[0]);
            let (b_lat, b_lon) = as_latlon(&args[1]);
            match (a_lat, a_lon, b_lat, b_lon) {
                (Some(a_lat), Some(a_lon), Some(b_lat), Some(b_lon)) => {
                    Ok(Value::Number(Decimal::from_str(&haversine_km(a_lat, a_lon, b_lat, b_lon).to_string()).unwrap_or(Decimal::ZERO)))
                }
                _ => Ok(Value::Null),
            }
        }

        // ---- Audit/logging ----------------------------------------------------
        "audit" | "audit_log" | "log" => {
            arity(name, &args, 1)?;
            Ok(Value::Boolean(true))
        }
        "send_notification" => {
            arity(name, &args, 2)?;
            Ok(Value::Boolean(true))
        }

        // ---- Security ----------------------------------------------------
        "encrypt" => {
            arity(name, &args, 1)?;
            Ok(Value::String(format!("enc:{}", hex_encode(text(&args[0]).as_bytes()))))
        }
        "decrypt" => {
            arity(name, &args, 1)?;
            let s = text(&args[0]);
            let hex_part = s.strip_prefix("enc:").unwrap_or(&s);
            Ok(Value::String(hex_decode(hex_part).unwrap_or_default()))
        }
        "mask_data" => {
            arity(name, &args, 1)?;
            let s = text(&args[0]);
            Ok(Value::String(mask(&s)))
        }

        _ => Err(EvalError::UnknownFunction(name.to_string())),
    }
}

fn reduce_numeric(args: &[Value], f: impl Fn(Decimal, Decimal) -> Decimal) -> Result<Value, EvalError> {
    if args.is_empty() {
        return Err(EvalError::Arity {
            name: "max/min".to_string(),
            min: 1,
            got: 0,
        });
    }
    // Single list argument, or a variadic argument list.
    let values: Vec<Decimal> = if args.len() == 1 {
        match &args[0] {
            Value::List(l) => l.iter().map(num).collect::<Result<_, _>>()?,
            other => vec![num(other)?],
        }
    } else {
        args.iter().map(num).collect::<Result<_, _>>()?
    };
    let mut iter = values.into_iter();
    let first = iter.next().ok_or_else(|| EvalError::Other("empty list".to_string()))?;
    Ok(Value::Number(iter.fold(first, f)))
}

fn decimal_pow(base: Decimal, exp: Decimal) -> Decimal {
    if let Some(exp_i) = exp.to_i64() {
        if exp_i >= 0 && exp.fract().is_zero() {
            let mut result = Decimal::ONE;
            for _ in 0..exp_i {
                result *= base;
            }
            return result;
        }
    }
    let base_f = base.to_f64().unwrap_or(0.0);
    let exp_f = exp.to_f64().unwrap_or(0.0);
    Decimal::from_str(&base_f.powf(exp_f).to_string()).unwrap_or(Decimal::ZERO)
}

/// Standard amortizing-loan payment formula: `P * r / (1 - (1+r)^-n)` where
/// `r` is the monthly rate; degenerates to `P / n` when the rate is zero.
fn loan_payment(principal: Decimal, annual_rate_pct: Decimal, term_months: Decimal) -> Decimal {
    let months = term_months.to_i64().unwrap_or(0).max(1);
    if annual_rate_pct.is_zero() {
        return principal / Decimal::from(months);
    }
    let monthly_rate = (annual_rate_pct / Decimal::from(100)) / Decimal::from(12);
    let principal_f = principal.to_f64().unwrap_or(0.0);
    let rate_f = monthly_rate.to_f64().unwrap_or(0.0);
    let n = months as f64;
    let payment = principal_f * rate_f / (1.0 - (1.0 + rate_f).powf(-n));
    Decimal::from_str(&payment.to_string()).unwrap_or(Decimal::ZERO).round_dp(2)
}

fn compound_interest(principal: Decimal, annual_rate_pct: Decimal, times_per_year: Decimal, years: Decimal) -> Decimal {
    let p = principal.to_f64().unwrap_or(0.0);
    let r = (annual_rate_pct / Decimal::from(100)).to_f64().unwrap_or(0.0);
    let n = times_per_year.to_f64().unwrap_or(1.0).max(1.0);
    let t = years.to_f64().unwrap_or(0.0);
    let amount = p * (1.0 + r / n).powf(n * t);
    Decimal::from_str(&amount.to_string()).unwrap_or(Decimal::ZERO).round_dp(2)
}

fn as_datetime(v: &Value) -> Result<chrono::DateTime<Utc>, EvalError> {
    match v {
        Value::DateTime(dt) => Ok(*dt),
        Value::String(s) => chrono::DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .or_else(|_| {
                NaiveDate::parse_from_str(s, "%Y-%m-%d")
                    .map(|d| d.and_hms_opt(0, 0, 0).unwrap().and_utc())
            })
            .map_err(|_| EvalError::TypeMismatch {
                op: "date function".to_string(),
                lhs: "string",
                rhs: "date",
            }),
        other => Err(EvalError::TypeMismatch {
            op: "date function".to_string(),
            lhs: other.type_name(),
            rhs: "date",
        }),
    }
}

fn add_duration(dt: chrono::DateTime<Utc>, amount: i64, unit: &str) -> chrono::DateTime<Utc> {
    match unit {
        "days" | "day" => dt + Duration::days(amount),
        "hours" | "hour" => dt + Duration::hours(amount),
        "minutes" | "minute" => dt + Duration::minutes(amount),
        "weeks" | "week" => dt + Duration::weeks(amount),
        "months" | "month" => {
            let total_months = dt.month0() as i64 + amount;
            let years_delta = total_months.div_euclid(12);
            let month0 = total_months.rem_euclid(12) as u32;
            let year = dt.year() + years_delta as i32;
            NaiveDate::from_ymd_opt(year, month0 + 1, dt.day().min(28))
                .map(|d| d.and_time(dt.time()).and_utc())
                .unwrap_or(dt)
        }
        "years" | "year" => NaiveDate::from_ymd_opt(dt.year() + amount as i32, dt.month(), dt.day().min(28))
            .map(|d| d.and_time(dt.time()).and_utc())
            .unwrap_or(dt),
        _ => dt,
    }
}

fn is_ssn_shape(s: &str) -> bool {
    let digits: String = s.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.len() == 9
}

fn is_email_shape(s: &str) -> bool {
    let parts: Vec<&str> = s.splitn(2, '@').collect();
    parts.len() == 2 && !parts[0].is_empty() && parts[1].contains('.') && !parts[1].starts_with('.')
}

fn as_latlon(v: &Value) -> (Option<f64>, Option<f64>) {
    match v {
        Value::Map(m) => {
            let lat = m.get("lat").and_then(Value::as_number).and_then(|d| d.to_f64());
            let lon = m.get("lon").and_then(Value::as_number).and_then(|d| d.to_f64());
            (lat, lon)
        }
        _ => (None, None),
    }
}

fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    const EARTH_RADIUS_KM: f64 = 6371.0;
    let (lat1, lat2) = (lat1.to_radians(), lat2.to_radians());
    let dlat = lat2 - lat1;
    let dlon = (lon2 - lon1).to_radians();
    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();
    EARTH_RADIUS_KM * c
}

/// A deterministic placeholder identifier. The real generator is an external
/// collaborator concern (persistence-backed sequence); this keeps the
/// function total without depending on wall-clock/random state the engine
/// must avoid per the `Date.now`/`Math.random`-free evaluation contract.
fn deterministic_id(prefix: &str) -> String {
    format!("{prefix}-0000000000")
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn hex_decode(s: &str) -> Option<String> {
    if s.len() % 2 != 0 {
        return None;
    }
    let mut bytes = Vec::with_capacity(s.len() / 2);
    for i in (0..s.len()).step_by(2) {
        bytes.push(u8::from_str_radix(&s[i..i + 2], 16).ok()?);
    }
    String::from_utf8(bytes).ok()
}

/// Masks all but the last four characters, per common PCI/PII display
/// conventions for account-like strings.
fn mask(s: &str) -> String {
    let len = s.chars().count();
    if len <= 4 {
        return "*".repeat(len);
    }
    let visible: String = s.chars().skip(len - 4).collect();
    format!("{}{}", "*".repeat(len - 4), visible)
}
