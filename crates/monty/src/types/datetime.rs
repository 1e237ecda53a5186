//! The `datetime` value kinds: `date`, `time`, `datetime`, `timedelta`,
//! `timezone`.
//!
//! Reimplemented from scratch over a proleptic Gregorian ordinal; no OS clock
//! is ever consulted — `today()`/`now()` receive civil components from the
//! host capability layer. Rendering, arithmetic and the error strings match
//! CPython, which the test suite pins verbatim.

use crate::{
    args::ArgValues,
    exception::{ExcType, RunResult},
    heap::{Heap, HeapData},
    intern::Interns,
    py_hash::{hash_i64, hash_tuple_elements},
    resource::ResourceTracker,
    value::{IntRef, Value},
};

pub(crate) const MINYEAR: i32 = 1;
pub(crate) const MAXYEAR: i32 = 9999;

const MICROS_PER_SECOND: i64 = 1_000_000;
const MICROS_PER_MINUTE: i64 = 60 * MICROS_PER_SECOND;
const MICROS_PER_HOUR: i64 = 60 * MICROS_PER_MINUTE;
const MICROS_PER_DAY: i64 = 24 * MICROS_PER_HOUR;

const MAX_DELTA_DAYS: i64 = 999_999_999;
// timedelta range: [-999999999 days, 999999999 days 23:59:59.999999]
const MIN_DELTA_MICROS: i64 = -MAX_DELTA_DAYS * MICROS_PER_DAY;
const MAX_DELTA_MICROS: i64 = MAX_DELTA_DAYS * MICROS_PER_DAY + MICROS_PER_DAY - 1;

// === timedelta ===

/// A duration stored as total microseconds.
///
/// Normalization is implicit: `days()`/`seconds()`/`microseconds()` derive
/// the canonical `0 <= seconds < 86400`, `0 <= microseconds < 10^6`
/// decomposition, so `-timedelta(days=1, seconds=30)` reads back as
/// `days=-2, seconds=86370`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct Timedelta {
    micros: i64,
}

impl Timedelta {
    pub(crate) fn from_micros(micros: i64) -> RunResult<Self> {
        if !(MIN_DELTA_MICROS..=MAX_DELTA_MICROS).contains(&micros) {
            let days = micros.div_euclid(MICROS_PER_DAY);
            return Err(ExcType::overflow_error(format!(
                "days={days}; must have magnitude <= 999999999"
            )));
        }
        Ok(Self { micros })
    }

    pub(crate) fn zero() -> Self {
        Self { micros: 0 }
    }

    pub(crate) fn min() -> Self {
        Self { micros: MIN_DELTA_MICROS }
    }

    pub(crate) fn max() -> Self {
        Self { micros: MAX_DELTA_MICROS }
    }

    pub(crate) fn resolution() -> Self {
        Self { micros: 1 }
    }

    pub(crate) fn as_micros(self) -> i64 {
        self.micros
    }

    pub(crate) fn days(self) -> i64 {
        self.micros.div_euclid(MICROS_PER_DAY)
    }

    pub(crate) fn seconds(self) -> i64 {
        self.micros.rem_euclid(MICROS_PER_DAY).div_euclid(MICROS_PER_SECOND)
    }

    pub(crate) fn microseconds(self) -> i64 {
        self.micros.rem_euclid(MICROS_PER_SECOND)
    }

    pub(crate) fn total_seconds(self) -> f64 {
        self.micros as f64 / MICROS_PER_SECOND as f64
    }

    pub(crate) fn negated(self) -> RunResult<Self> {
        Self::from_micros(-self.micros)
    }

    pub(crate) fn py_hash(self) -> u64 {
        hash_i64(self.micros)
    }
}

/// `timedelta(days=0, seconds=0, microseconds=0, milliseconds=0, minutes=0,
/// hours=0, weeks=0)`. Integer arguments are exact; floats round to the
/// nearest microsecond.
pub(crate) fn construct_timedelta(
    args: &ArgValues,
    heap: &mut Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<Value> {
    const NAMES: [&str; 7] = [
        "days",
        "seconds",
        "microseconds",
        "milliseconds",
        "minutes",
        "hours",
        "weeks",
    ];
    const UNIT_MICROS: [i64; 7] = [
        MICROS_PER_DAY,
        MICROS_PER_SECOND,
        1,
        1_000,
        MICROS_PER_MINUTE,
        MICROS_PER_HOUR,
        7 * MICROS_PER_DAY,
    ];

    args.check_arity("timedelta", 0, 7)?;
    args.reject_unknown_kwargs("timedelta", &NAMES)?;

    let mut total: i128 = 0;
    for (index, (name, unit)) in NAMES.iter().zip(UNIT_MICROS).enumerate() {
        let Some(value) = args.pos_or_kwarg("timedelta", index, name)? else {
            continue;
        };
        match value.as_int(heap, interns) {
            Some(IntRef::Small(i)) => total += i128::from(i) * i128::from(unit),
            Some(IntRef::Big(_)) => {
                return Err(ExcType::overflow_error("Python int too large to convert to C int"));
            }
            None => match value {
                Value::Float(f) => {
                    let micros = f * unit as f64;
                    if !micros.is_finite() {
                        return Err(ExcType::value_error("cannot convert float infinity to integer"));
                    }
                    total += micros.round_ties_even() as i128;
                }
                _ => {
                    return Err(ExcType::type_error(format!(
                        "unsupported type for timedelta {name} component: {}",
                        value.py_type(heap)
                    )));
                }
            },
        }
    }

    let micros = i64::try_from(total).map_err(|_| {
        let days = total / i128::from(MICROS_PER_DAY);
        ExcType::overflow_error(format!("days={days}; must have magnitude <= 999999999"))
    })?;
    let td = Timedelta::from_micros(micros)?;
    Ok(Value::Ref(heap.allocate(HeapData::Timedelta(td))?))
}

pub(crate) fn repr_timedelta(td: &Timedelta) -> String {
    let (days, seconds, micros) = (td.days(), td.seconds(), td.microseconds());
    if days == 0 && seconds == 0 && micros == 0 {
        return "datetime.timedelta(0)".to_owned();
    }
    let mut parts = Vec::new();
    if days != 0 {
        parts.push(format!("days={days}"));
    }
    if seconds != 0 {
        parts.push(format!("seconds={seconds}"));
    }
    if micros != 0 {
        parts.push(format!("microseconds={micros}"));
    }
    format!("datetime.timedelta({})", parts.join(", "))
}

pub(crate) fn str_timedelta(td: &Timedelta) -> String {
    let (days, seconds, micros) = (td.days(), td.seconds(), td.microseconds());
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    let mut body = format!("{hours}:{minutes:02}:{secs:02}");
    if micros != 0 {
        body.push_str(&format!(".{micros:06}"));
    }
    match days {
        0 => body,
        1 => format!("1 day, {body}"),
        -1 => format!("-1 day, {body}"),
        n => format!("{n} days, {body}"),
    }
}

// === calendar arithmetic ===

pub(crate) fn is_leap_year(year: i32) -> bool {
    year % 4 == 0 && (year % 100 != 0 || year % 400 == 0)
}

pub(crate) fn days_in_month(year: i32, month: u8) -> u8 {
    const DAYS: [u8; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];
    if month == 2 && is_leap_year(year) {
        29
    } else {
        DAYS[(month - 1) as usize]
    }
}

/// Proleptic Gregorian ordinal with `0001-01-01` as day 1, like
/// `date.toordinal()`.
fn ymd_to_ordinal(year: i32, month: u8, day: u8) -> i64 {
    let y = i64::from(year) - 1;
    let days_before_year = y * 365 + y / 4 - y / 100 + y / 400;
    let mut days_before_month = 0i64;
    for m in 1..month {
        days_before_month += i64::from(days_in_month(year, m));
    }
    days_before_year + days_before_month + i64::from(day)
}

/// Inverse of [`ymd_to_ordinal`]; `None` when outside year 1..=9999.
fn ordinal_to_ymd(ordinal: i64) -> Option<(i32, u8, u8)> {
    if ordinal < 1 {
        return None;
    }
    // locate the year by stepping through 400/100/4/1-year cycles
    let mut remaining = ordinal - 1;
    const DAYS_PER_400Y: i64 = 146_097;
    const DAYS_PER_100Y: i64 = 36_524;
    const DAYS_PER_4Y: i64 = 1_461;

    let n400 = remaining / DAYS_PER_400Y;
    remaining %= DAYS_PER_400Y;
    let mut n100 = remaining / DAYS_PER_100Y;
    if n100 == 4 {
        n100 = 3;
    }
    remaining -= n100 * DAYS_PER_100Y;
    let mut n4 = remaining / DAYS_PER_4Y;
    if n4 == 25 {
        // impossible inside a century, guard anyway
        n4 = 24;
    }
    remaining -= n4 * DAYS_PER_4Y;
    let mut n1 = remaining / 365;
    if n1 == 4 {
        n1 = 3;
    }
    remaining -= n1 * 365;

    let year = i64::from(1) + n400 * 400 + n100 * 100 + n4 * 4 + n1;
    let year = i32::try_from(year).ok()?;
    if year > MAXYEAR {
        return None;
    }
    let mut month = 1u8;
    let mut day_count = remaining;
    loop {
        let dim = i64::from(days_in_month(year, month));
        if day_count < dim {
            break;
        }
        day_count -= dim;
        month += 1;
    }
    Some((year, month, (day_count + 1) as u8))
}

// === date ===

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct Date {
    pub year: i32,
    pub month: u8,
    pub day: u8,
}

impl Date {
    pub(crate) fn new(year: i32, month: u8, day: u8) -> RunResult<Self> {
        if !(MINYEAR..=MAXYEAR).contains(&year) {
            return Err(ExcType::value_error(format!("year {year} is out of range")));
        }
        if !(1..=12).contains(&month) {
            return Err(ExcType::value_error("month must be in 1..12"));
        }
        if day < 1 || day > days_in_month(year, month) {
            return Err(ExcType::value_error("day is out of range for month"));
        }
        Ok(Self { year, month, day })
    }

    pub(crate) fn toordinal(self) -> i64 {
        ymd_to_ordinal(self.year, self.month, self.day)
    }

    pub(crate) fn fromordinal(ordinal: i64) -> RunResult<Self> {
        if ordinal < 1 {
            return Err(ExcType::value_error(format!("ordinal must be >= 1, got {ordinal}")));
        }
        match ordinal_to_ymd(ordinal) {
            Some((year, month, day)) => Ok(Self { year, month, day }),
            None => Err(ExcType::overflow_error("date value out of range")),
        }
    }

    /// Monday is 0.
    pub(crate) fn weekday(self) -> i64 {
        (self.toordinal() + 6) % 7
    }

    pub(crate) fn py_hash(self) -> u64 {
        hash_tuple_elements(
            [
                hash_i64(i64::from(self.year)),
                hash_i64(i64::from(self.month)),
                hash_i64(i64::from(self.day)),
            ]
            .into_iter(),
        )
    }
}

/// `date ± timedelta`, flooring the delta to whole days like CPython.
fn date_plus_days(date: Date, days: i64) -> RunResult<Date> {
    let ordinal = date.toordinal().checked_add(days);
    match ordinal.and_then(|o| if o >= 1 { ordinal_to_ymd(o) } else { None }) {
        Some((year, month, day)) => Ok(Date { year, month, day }),
        None => Err(ExcType::overflow_error("date value out of range")),
    }
}

pub(crate) fn construct_date(
    args: &ArgValues,
    heap: &mut Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<Value> {
    args.check_arity("date", 3, 3)?;
    args.reject_unknown_kwargs("date", &["year", "month", "day"])?;
    let year = int_component(args, 0, "year", "date", heap, interns)?;
    let month = int_component(args, 1, "month", "date", heap, interns)?;
    let day = int_component(args, 2, "day", "date", heap, interns)?;
    let date = Date::new(
        i32::try_from(year).map_err(|_| ExcType::value_error(format!("year {year} is out of range")))?,
        clamp_u8(month),
        clamp_u8(day),
    )?;
    Ok(Value::Ref(heap.allocate(HeapData::Date(date))?))
}

fn clamp_u8(value: i64) -> u8 {
    u8::try_from(value).unwrap_or(u8::MAX)
}

fn int_component(
    args: &ArgValues,
    index: usize,
    name: &str,
    fname: &str,
    heap: &Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<i64> {
    let value = args
        .pos_or_kwarg(fname, index, name)?
        .ok_or_else(|| ExcType::type_error(format!("function missing required argument '{name}' (pos {})", index + 1)))?;
    match value.as_int(heap, interns) {
        Some(IntRef::Small(i)) => Ok(i),
        Some(IntRef::Big(_)) => Err(ExcType::overflow_error("Python int too large to convert to C int")),
        None => Err(ExcType::type_error(format!(
            "'{}' object cannot be interpreted as an integer",
            value.py_type(heap)
        ))),
    }
}

fn optional_int_component(
    args: &ArgValues,
    index: usize,
    name: &str,
    fname: &str,
    heap: &Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<Option<i64>> {
    let Some(value) = args.pos_or_kwarg(fname, index, name)? else {
        return Ok(None);
    };
    match value.as_int(heap, interns) {
        Some(IntRef::Small(i)) => Ok(Some(i)),
        Some(IntRef::Big(_)) => Err(ExcType::overflow_error("Python int too large to convert to C int")),
        None => Err(ExcType::type_error(format!(
            "'{}' object cannot be interpreted as an integer",
            value.py_type(heap)
        ))),
    }
}

pub(crate) fn repr_date(d: &Date) -> String {
    format!("datetime.date({}, {}, {})", d.year, d.month, d.day)
}

pub(crate) fn str_date(d: &Date) -> String {
    format!("{:04}-{:02}-{:02}", d.year, d.month, d.day)
}

// === time ===

#[derive(Debug, Clone, Copy)]
pub(crate) struct Time {
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub microsecond: u32,
    /// `None` for naive times; otherwise a `Ref` to a `Timezone`.
    pub tzinfo: Option<Value>,
}

impl Time {
    pub(crate) fn new(hour: i64, minute: i64, second: i64, microsecond: i64, tzinfo: Option<Value>) -> RunResult<Self> {
        if !(0..24).contains(&hour) {
            return Err(ExcType::value_error("hour must be in 0..23"));
        }
        if !(0..60).contains(&minute) {
            return Err(ExcType::value_error("minute must be in 0..59"));
        }
        if !(0..60).contains(&second) {
            return Err(ExcType::value_error("second must be in 0..59"));
        }
        if !(0..1_000_000).contains(&microsecond) {
            return Err(ExcType::value_error("microsecond must be in 0..999999"));
        }
        Ok(Self {
            hour: hour as u8,
            minute: minute as u8,
            second: second as u8,
            microsecond: microsecond as u32,
            tzinfo,
        })
    }

    pub(crate) fn micros_of_day(self) -> i64 {
        i64::from(self.hour) * MICROS_PER_HOUR
            + i64::from(self.minute) * MICROS_PER_MINUTE
            + i64::from(self.second) * MICROS_PER_SECOND
            + i64::from(self.microsecond)
    }

    pub(crate) fn utc_offset(self, heap: &Heap<impl ResourceTracker>) -> Option<Timedelta> {
        tz_offset(self.tzinfo, heap)
    }

    pub(crate) fn py_hash(self, heap: &Heap<impl ResourceTracker>) -> u64 {
        match self.utc_offset(heap) {
            Some(offset) => hash_tuple_elements(
                [hash_i64(self.micros_of_day() - offset.as_micros()), hash_i64(1)].into_iter(),
            ),
            None => hash_tuple_elements([hash_i64(self.micros_of_day()), hash_i64(0)].into_iter()),
        }
    }
}

/// Resolves a tzinfo value to its fixed offset.
pub(crate) fn tz_offset(tzinfo: Option<Value>, heap: &Heap<impl ResourceTracker>) -> Option<Timedelta> {
    match tzinfo? {
        Value::Ref(id) => match heap.get(id) {
            HeapData::Timezone(tz) => Some(tz.offset()),
            _ => None,
        },
        _ => None,
    }
}

pub(crate) fn eq_times(a: &Time, b: &Time, heap: &Heap<impl ResourceTracker>) -> bool {
    match (a.utc_offset(heap), b.utc_offset(heap)) {
        (None, None) => a.micros_of_day() == b.micros_of_day(),
        (Some(oa), Some(ob)) => a.micros_of_day() - oa.as_micros() == b.micros_of_day() - ob.as_micros(),
        // aware == naive is False, never an error
        _ => false,
    }
}

pub(crate) fn cmp_times(a: &Time, b: &Time, heap: &Heap<impl ResourceTracker>) -> RunResult<std::cmp::Ordering> {
    match (a.utc_offset(heap), b.utc_offset(heap)) {
        (None, None) => Ok(a.micros_of_day().cmp(&b.micros_of_day())),
        (Some(oa), Some(ob)) => {
            Ok((a.micros_of_day() - oa.as_micros()).cmp(&(b.micros_of_day() - ob.as_micros())))
        }
        _ => Err(ExcType::type_error("can't compare offset-naive and offset-aware times")),
    }
}

pub(crate) fn construct_time(
    args: &ArgValues,
    heap: &mut Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<Value> {
    args.check_arity("time", 0, 5)?;
    args.reject_unknown_kwargs("time", &["hour", "minute", "second", "microsecond", "tzinfo"])?;
    let hour = optional_int_component(args, 0, "hour", "time", heap, interns)?.unwrap_or(0);
    let minute = optional_int_component(args, 1, "minute", "time", heap, interns)?.unwrap_or(0);
    let second = optional_int_component(args, 2, "second", "time", heap, interns)?.unwrap_or(0);
    let microsecond = optional_int_component(args, 3, "microsecond", "time", heap, interns)?.unwrap_or(0);
    let tzinfo = tzinfo_arg(args, 4, "time", heap)?;
    let time = Time::new(hour, minute, second, microsecond, tzinfo)?;
    Ok(Value::Ref(heap.allocate(HeapData::Time(time))?))
}

fn tzinfo_arg(
    args: &ArgValues,
    index: usize,
    fname: &str,
    heap: &Heap<impl ResourceTracker>,
) -> RunResult<Option<Value>> {
    match args.pos_or_kwarg(fname, index, "tzinfo")? {
        None | Some(Value::None) => Ok(None),
        Some(value) => match value {
            Value::Ref(id) if matches!(heap.get(id), HeapData::Timezone(_)) => Ok(Some(value)),
            _ => Err(ExcType::type_error("tzinfo argument must be None or of a tzinfo subclass")),
        },
    }
}

fn offset_suffix(offset: Timedelta) -> String {
    let micros = offset.as_micros();
    let sign = if micros < 0 { '-' } else { '+' };
    let magnitude = micros.abs();
    let hours = magnitude / MICROS_PER_HOUR;
    let minutes = (magnitude % MICROS_PER_HOUR) / MICROS_PER_MINUTE;
    let seconds = (magnitude % MICROS_PER_MINUTE) / MICROS_PER_SECOND;
    let sub_micros = magnitude % MICROS_PER_SECOND;
    if sub_micros != 0 {
        format!("{sign}{hours:02}:{minutes:02}:{seconds:02}.{sub_micros:06}")
    } else if seconds != 0 {
        format!("{sign}{hours:02}:{minutes:02}:{seconds:02}")
    } else {
        format!("{sign}{hours:02}:{minutes:02}")
    }
}

pub(crate) fn str_time(t: &Time, heap: &Heap<impl ResourceTracker>) -> String {
    let mut out = format!("{:02}:{:02}:{:02}", t.hour, t.minute, t.second);
    if t.microsecond != 0 {
        out.push_str(&format!(".{:06}", t.microsecond));
    }
    if let Some(offset) = t.utc_offset(heap) {
        out.push_str(&offset_suffix(offset));
    }
    out
}

pub(crate) fn repr_time(t: &Time, heap: &Heap<impl ResourceTracker>) -> String {
    let mut fields = format!("{}, {}", t.hour, t.minute);
    if t.second != 0 || t.microsecond != 0 {
        fields.push_str(&format!(", {}", t.second));
    }
    if t.microsecond != 0 {
        fields.push_str(&format!(", {}", t.microsecond));
    }
    if let Some(tzinfo) = t.tzinfo {
        if let Value::Ref(id) = tzinfo
            && let HeapData::Timezone(tz) = heap.get(id)
        {
            fields.push_str(&format!(", tzinfo={}", repr_timezone(tz)));
        }
    }
    format!("datetime.time({fields})")
}

// === datetime ===

#[derive(Debug, Clone, Copy)]
pub(crate) struct DateTime {
    pub date: Date,
    pub time: Time,
}

impl DateTime {
    /// Total microseconds since the ordinal epoch, tz-naive.
    fn naive_micros(self) -> i128 {
        i128::from(self.date.toordinal()) * i128::from(MICROS_PER_DAY) + i128::from(self.time.micros_of_day())
    }

    /// As [`DateTime::naive_micros`] but normalized to UTC for aware values.
    fn utc_micros(self, heap: &Heap<impl ResourceTracker>) -> Option<i128> {
        let offset = self.time.utc_offset(heap)?;
        Some(self.naive_micros() - i128::from(offset.as_micros()))
    }

    pub(crate) fn is_aware(self, heap: &Heap<impl ResourceTracker>) -> bool {
        self.time.utc_offset(heap).is_some()
    }

    pub(crate) fn py_hash(self, heap: &Heap<impl ResourceTracker>) -> u64 {
        match self.utc_micros(heap) {
            Some(utc) => hash_tuple_elements([hash_i64(utc as i64), hash_i64(1)].into_iter()),
            None => hash_tuple_elements([hash_i64(self.naive_micros() as i64), hash_i64(0)].into_iter()),
        }
    }
}

/// Builds a datetime from a tz-naive microsecond count, carrying `tzinfo`.
fn datetime_from_micros(micros: i128, tzinfo: Option<Value>) -> RunResult<DateTime> {
    let ordinal = micros.div_euclid(i128::from(MICROS_PER_DAY));
    let of_day = micros.rem_euclid(i128::from(MICROS_PER_DAY)) as i64;
    let Ok(ordinal) = i64::try_from(ordinal) else {
        return Err(ExcType::overflow_error("date value out of range"));
    };
    let Some((year, month, day)) = (ordinal >= 1).then(|| ordinal_to_ymd(ordinal)).flatten() else {
        return Err(ExcType::overflow_error("date value out of range"));
    };
    let time = Time {
        hour: (of_day / MICROS_PER_HOUR) as u8,
        minute: ((of_day % MICROS_PER_HOUR) / MICROS_PER_MINUTE) as u8,
        second: ((of_day % MICROS_PER_MINUTE) / MICROS_PER_SECOND) as u8,
        microsecond: (of_day % MICROS_PER_SECOND) as u32,
        tzinfo,
    };
    Ok(DateTime {
        date: Date { year, month, day },
        time,
    })
}

pub(crate) fn eq_datetimes(a: &DateTime, b: &DateTime, heap: &Heap<impl ResourceTracker>) -> bool {
    match (a.utc_micros(heap), b.utc_micros(heap)) {
        (None, None) => a.naive_micros() == b.naive_micros(),
        (Some(ua), Some(ub)) => ua == ub,
        // aware == naive is False, never an error
        _ => false,
    }
}

pub(crate) fn cmp_datetimes(
    a: &DateTime,
    b: &DateTime,
    heap: &Heap<impl ResourceTracker>,
) -> RunResult<std::cmp::Ordering> {
    match (a.utc_micros(heap), b.utc_micros(heap)) {
        (None, None) => Ok(a.naive_micros().cmp(&b.naive_micros())),
        (Some(ua), Some(ub)) => Ok(ua.cmp(&ub)),
        _ => Err(ExcType::type_error("can't compare offset-naive and offset-aware datetimes")),
    }
}

pub(crate) fn construct_datetime(
    args: &ArgValues,
    heap: &mut Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<Value> {
    args.check_arity("datetime", 3, 8)?;
    args.reject_unknown_kwargs(
        "datetime",
        &["year", "month", "day", "hour", "minute", "second", "microsecond", "tzinfo"],
    )?;
    let year = int_component(args, 0, "year", "datetime", heap, interns)?;
    let month = int_component(args, 1, "month", "datetime", heap, interns)?;
    let day = int_component(args, 2, "day", "datetime", heap, interns)?;
    let hour = optional_int_component(args, 3, "hour", "datetime", heap, interns)?.unwrap_or(0);
    let minute = optional_int_component(args, 4, "minute", "datetime", heap, interns)?.unwrap_or(0);
    let second = optional_int_component(args, 5, "second", "datetime", heap, interns)?.unwrap_or(0);
    let microsecond = optional_int_component(args, 6, "microsecond", "datetime", heap, interns)?.unwrap_or(0);
    let tzinfo = tzinfo_arg(args, 7, "datetime", heap)?;

    let date = Date::new(
        i32::try_from(year).map_err(|_| ExcType::value_error(format!("year {year} is out of range")))?,
        clamp_u8(month),
        clamp_u8(day),
    )?;
    let time = Time::new(hour, minute, second, microsecond, tzinfo)?;
    let dt = DateTime { date, time };
    Ok(Value::Ref(heap.allocate(HeapData::DateTime(dt))?))
}

pub(crate) fn repr_datetime(dt: &DateTime, heap: &Heap<impl ResourceTracker>) -> String {
    let d = dt.date;
    let t = dt.time;
    let mut fields = format!("{}, {}, {}, {}, {}", d.year, d.month, d.day, t.hour, t.minute);
    if t.second != 0 || t.microsecond != 0 {
        fields.push_str(&format!(", {}", t.second));
    }
    if t.microsecond != 0 {
        fields.push_str(&format!(", {}", t.microsecond));
    }
    if let Some(tzinfo) = t.tzinfo {
        if let Value::Ref(id) = tzinfo
            && let HeapData::Timezone(tz) = heap.get(id)
        {
            fields.push_str(&format!(", tzinfo={}", repr_timezone(tz)));
        }
    }
    format!("datetime.datetime({fields})")
}

pub(crate) fn str_datetime(dt: &DateTime, heap: &Heap<impl ResourceTracker>) -> String {
    isoformat_datetime(dt, heap, ' ')
}

pub(crate) fn isoformat_datetime(dt: &DateTime, heap: &Heap<impl ResourceTracker>, sep: char) -> String {
    // str_time appends the offset for aware values
    format!("{}{sep}{}", str_date(&dt.date), str_time(&dt.time, heap))
}

// === timezone ===

#[derive(Debug, Clone)]
pub(crate) struct Timezone {
    offset: Timedelta,
    name: Option<String>,
}

impl Timezone {
    /// Fixed-offset zone; the offset must be strictly within ±24 hours.
    pub(crate) fn new(offset: Timedelta, name: Option<String>) -> RunResult<Self> {
        if offset.as_micros().abs() >= 24 * MICROS_PER_HOUR {
            return Err(ExcType::value_error(
                "offset must be a timedelta strictly between -timedelta(hours=24) and timedelta(hours=24).",
            ));
        }
        Ok(Self { offset, name })
    }

    pub(crate) fn utc() -> Self {
        Self {
            offset: Timedelta::zero(),
            name: None,
        }
    }

    pub(crate) fn offset(&self) -> Timedelta {
        self.offset
    }

    /// Equality and hashing depend only on the offset, never the name.
    pub(crate) fn py_hash(&self) -> u64 {
        self.offset.py_hash()
    }

    pub(crate) fn tzname(&self) -> String {
        if let Some(name) = &self.name {
            return name.clone();
        }
        if self.offset.as_micros() == 0 {
            return "UTC".to_owned();
        }
        format!("UTC{}", offset_suffix(self.offset))
    }
}

pub(crate) fn construct_timezone(
    args: &ArgValues,
    heap: &mut Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<Value> {
    args.check_arity("timezone", 1, 2)?;
    args.reject_unknown_kwargs("timezone", &["offset", "name"])?;
    let offset_value = args
        .pos_or_kwarg("timezone", 0, "offset")?
        .ok_or_else(|| ExcType::type_error("timezone() missing required argument: 'offset'"))?;
    let offset = match offset_value {
        Value::Ref(id) => match heap.get(id) {
            HeapData::Timedelta(td) => *td,
            _ => return Err(ExcType::type_error("offset must be a timedelta")),
        },
        _ => return Err(ExcType::type_error("offset must be a timedelta")),
    };
    let name = match args.pos_or_kwarg("timezone", 1, "name")? {
        None => None,
        Some(v) => match crate::value::value_as_str(&v, heap, interns) {
            Some(s) => Some(s.to_owned()),
            None => return Err(ExcType::type_error("name must be a str")),
        },
    };
    let tz = Timezone::new(offset, name)?;
    Ok(Value::Ref(heap.allocate(HeapData::Timezone(tz))?))
}

pub(crate) fn repr_timezone(tz: &Timezone) -> String {
    if tz.offset.as_micros() == 0 && tz.name.is_none() {
        return "datetime.timezone.utc".to_owned();
    }
    match &tz.name {
        Some(name) => format!(
            "datetime.timezone({}, '{name}')",
            repr_timedelta(&tz.offset)
        ),
        None => format!("datetime.timezone({})", repr_timedelta(&tz.offset)),
    }
}

// === clock plumbing ===

/// Civil components delivered by the host clock capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalClock {
    pub year: i32,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub microsecond: u32,
    /// Offset of local civil time from UTC, in seconds.
    pub utc_offset_seconds: i32,
}

/// `date.today()`.
pub(crate) fn date_from_clock(clock: &LocalClock) -> RunResult<Date> {
    Date::new(clock.year, clock.month, clock.day)
}

/// `datetime.now()` / `datetime.now(tz)`.
pub(crate) fn datetime_from_clock(
    clock: &LocalClock,
    tz: Option<Value>,
    heap: &Heap<impl ResourceTracker>,
) -> RunResult<DateTime> {
    let date = Date::new(clock.year, clock.month, clock.day)?;
    let time = Time::new(
        i64::from(clock.hour),
        i64::from(clock.minute),
        i64::from(clock.second),
        i64::from(clock.microsecond),
        None,
    )?;
    let local = DateTime { date, time };
    let Some(tz_value) = tz else {
        return Ok(local);
    };
    let Some(target_offset) = tz_offset(Some(tz_value), heap) else {
        return Err(ExcType::type_error("tzinfo argument must be None or of a tzinfo subclass"));
    };
    let utc = local.naive_micros() - i128::from(clock.utc_offset_seconds) * i128::from(MICROS_PER_SECOND);
    datetime_from_micros(utc + i128::from(target_offset.as_micros()), Some(tz_value))
}

// === binary operators ===

/// Datetime-family binary operators; `Ok(None)` when the combination is not
/// a datetime operation at all.
pub(crate) fn binary_op(
    op: &crate::expressions::Operator,
    left: &Value,
    right: &Value,
    heap: &mut Heap<impl ResourceTracker>,
) -> RunResult<Option<Value>> {
    use crate::expressions::Operator;

    let (Value::Ref(la), _) = (left, right) else {
        // int/float * timedelta has a non-ref left operand
        if let (Operator::Mult, Value::Ref(rb)) = (op, right)
            && let HeapData::Timedelta(td) = heap.get(*rb)
        {
            return scale_timedelta(*td, left, heap).map(Some);
        }
        return Ok(None);
    };

    match (heap.get(*la), right) {
        (HeapData::Timedelta(a), Value::Ref(rb)) => {
            let a = *a;
            match heap.get(*rb) {
                HeapData::Timedelta(b) => {
                    let b = *b;
                    let result = match op {
                        Operator::Add => timedelta_checked(a.as_micros().checked_add(b.as_micros()))?,
                        Operator::Sub => timedelta_checked(a.as_micros().checked_sub(b.as_micros()))?,
                        Operator::Div => {
                            if b.as_micros() == 0 {
                                return Err(ExcType::zero_division("division by zero"));
                            }
                            return Ok(Some(Value::Float(a.as_micros() as f64 / b.as_micros() as f64)));
                        }
                        Operator::FloorDiv => {
                            if b.as_micros() == 0 {
                                return Err(ExcType::zero_division("integer division or modulo by zero"));
                            }
                            return Ok(Some(Value::Int(a.as_micros().div_euclid(b.as_micros()))));
                        }
                        Operator::Mod => {
                            if b.as_micros() == 0 {
                                return Err(ExcType::zero_division("integer division or modulo by zero"));
                            }
                            Timedelta::from_micros(a.as_micros().rem_euclid(b.as_micros()))?
                        }
                        _ => return Ok(None),
                    };
                    Ok(Some(Value::Ref(heap.allocate(HeapData::Timedelta(result))?)))
                }
                HeapData::Date(d) => {
                    let d = *d;
                    match op {
                        // timedelta + date
                        Operator::Add => {
                            let result = date_plus_days(d, a.days_for_date_shift())?;
                            Ok(Some(Value::Ref(heap.allocate(HeapData::Date(result))?)))
                        }
                        _ => Ok(None),
                    }
                }
                HeapData::DateTime(dt) => {
                    let dt = *dt;
                    match op {
                        Operator::Add => {
                            let result =
                                datetime_from_micros(dt.naive_micros() + i128::from(a.as_micros()), dt.time.tzinfo)?;
                            Ok(Some(Value::Ref(heap.allocate(HeapData::DateTime(result))?)))
                        }
                        _ => Ok(None),
                    }
                }
                _ => Ok(None),
            }
        }
        (HeapData::Timedelta(a), _) => {
            let a = *a;
            match op {
                Operator::Mult => scale_timedelta(a, right, heap).map(Some),
                Operator::Div | Operator::FloorDiv => divide_timedelta(op, a, right, heap),
                _ => Ok(None),
            }
        }
        (HeapData::Date(a), Value::Ref(rb)) => {
            let a = *a;
            match (op, heap.get(*rb)) {
                (Operator::Add, HeapData::Timedelta(td)) => {
                    let result = date_plus_days(a, td.days_for_date_shift())?;
                    Ok(Some(Value::Ref(heap.allocate(HeapData::Date(result))?)))
                }
                (Operator::Sub, HeapData::Timedelta(td)) => {
                    // date - td is date + (-td); negate before flooring to days
                    let shift = td.negated()?.days_for_date_shift();
                    let result = date_plus_days(a, shift)?;
                    Ok(Some(Value::Ref(heap.allocate(HeapData::Date(result))?)))
                }
                (Operator::Sub, HeapData::Date(b)) => {
                    let days = a.toordinal() - b.toordinal();
                    let td = Timedelta::from_micros(days.checked_mul(MICROS_PER_DAY).ok_or_else(|| {
                        ExcType::overflow_error("date value out of range")
                    })?)?;
                    Ok(Some(Value::Ref(heap.allocate(HeapData::Timedelta(td))?)))
                }
                _ => Ok(None),
            }
        }
        (HeapData::DateTime(a), Value::Ref(rb)) => {
            let a = *a;
            match (op, heap.get(*rb)) {
                (Operator::Add, HeapData::Timedelta(td)) => {
                    let result = datetime_from_micros(a.naive_micros() + i128::from(td.as_micros()), a.time.tzinfo)?;
                    Ok(Some(Value::Ref(heap.allocate(HeapData::DateTime(result))?)))
                }
                (Operator::Sub, HeapData::Timedelta(td)) => {
                    let result = datetime_from_micros(a.naive_micros() - i128::from(td.as_micros()), a.time.tzinfo)?;
                    Ok(Some(Value::Ref(heap.allocate(HeapData::DateTime(result))?)))
                }
                (Operator::Sub, HeapData::DateTime(b)) => {
                    let b = *b;
                    let diff = match (a.utc_micros(heap), b.utc_micros(heap)) {
                        (None, None) => a.naive_micros() - b.naive_micros(),
                        (Some(ua), Some(ub)) => ua - ub,
                        _ => {
                            return Err(ExcType::type_error(
                                "can't subtract offset-naive and offset-aware datetimes",
                            ));
                        }
                    };
                    let micros = i64::try_from(diff)
                        .map_err(|_| ExcType::overflow_error("date value out of range"))?;
                    let td = Timedelta::from_micros(micros)?;
                    Ok(Some(Value::Ref(heap.allocate(HeapData::Timedelta(td))?)))
                }
                _ => Ok(None),
            }
        }
        _ => Ok(None),
    }
}

impl Timedelta {
    /// Days used when shifting a `date`: CPython truncates the sub-day part
    /// toward the floor (the normalized `days()` component).
    fn days_for_date_shift(self) -> i64 {
        self.days()
    }
}

fn timedelta_checked(micros: Option<i64>) -> RunResult<Timedelta> {
    match micros {
        Some(m) => Timedelta::from_micros(m),
        None => Err(ExcType::overflow_error(format!(
            "days={}; must have magnitude <= 999999999",
            i64::MAX / MICROS_PER_DAY
        ))),
    }
}

fn scale_timedelta(td: Timedelta, factor: &Value, heap: &mut Heap<impl ResourceTracker>) -> RunResult<Value> {
    let scaled = match factor {
        Value::Int(i) => td
            .as_micros()
            .checked_mul(*i)
            .ok_or_else(|| ExcType::overflow_error("timedelta multiplication overflow"))?,
        Value::Bool(b) => td.as_micros() * i64::from(*b),
        Value::Float(f) => {
            let result = td.as_micros() as f64 * f;
            if !result.is_finite() {
                return Err(ExcType::overflow_error("timedelta multiplication overflow"));
            }
            result.round_ties_even() as i64
        }
        _ => {
            return Err(ExcType::type_error(format!(
                "unsupported operand type(s) for *: 'datetime.timedelta' and '{}'",
                factor.py_type(heap)
            )));
        }
    };
    let result = Timedelta::from_micros(scaled)?;
    Ok(Value::Ref(heap.allocate(HeapData::Timedelta(result))?))
}

fn divide_timedelta(
    op: &crate::expressions::Operator,
    td: Timedelta,
    divisor: &Value,
    heap: &mut Heap<impl ResourceTracker>,
) -> RunResult<Option<Value>> {
    use crate::expressions::Operator;
    let micros = match (op, divisor) {
        (Operator::Div, Value::Int(i)) => {
            if *i == 0 {
                return Err(ExcType::zero_division("division by zero"));
            }
            (td.as_micros() as f64 / *i as f64).round_ties_even() as i64
        }
        (Operator::Div, Value::Float(f)) => {
            if *f == 0.0 {
                return Err(ExcType::zero_division("float division by zero"));
            }
            (td.as_micros() as f64 / f).round_ties_even() as i64
        }
        (Operator::FloorDiv, Value::Int(i)) => {
            if *i == 0 {
                return Err(ExcType::zero_division("integer division or modulo by zero"));
            }
            td.as_micros().div_euclid(*i)
        }
        _ => return Ok(None),
    };
    let result = Timedelta::from_micros(micros)?;
    Ok(Some(Value::Ref(heap.allocate(HeapData::Timedelta(result))?)))
}

// === instance surface ===

/// `date ± timedelta` keeps sub-day precision in CPython only for datetime;
/// for `date` the timedelta's sub-day part is discarded after flooring.
/// That flooring already happened in `days()`.
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinal_round_trip() {
        for (y, m, d) in [(1, 1, 1), (1970, 1, 1), (2000, 2, 29), (2024, 1, 15), (9999, 12, 31)] {
            let date = Date::new(y, m, d).unwrap();
            let ordinal = date.toordinal();
            assert_eq!(ordinal_to_ymd(ordinal), Some((y, m, d)), "roundtrip {y}-{m}-{d}");
        }
        // known anchors: date(1, 1, 1).toordinal() == 1, date(1970, 1, 1) == 719163
        assert_eq!(Date::new(1, 1, 1).unwrap().toordinal(), 1);
        assert_eq!(Date::new(1970, 1, 1).unwrap().toordinal(), 719163);
        assert_eq!(Date::new(2024, 1, 15).unwrap().toordinal(), 738900);
    }

    #[test]
    fn weekday_anchor() {
        // 2024-01-15 was a Monday
        assert_eq!(Date::new(2024, 1, 15).unwrap().weekday(), 0);
        // 1970-01-01 was a Thursday
        assert_eq!(Date::new(1970, 1, 1).unwrap().weekday(), 3);
    }

    #[test]
    fn timedelta_normalization() {
        let td = Timedelta::from_micros(-(MICROS_PER_DAY + 30 * MICROS_PER_SECOND)).unwrap();
        assert_eq!(td.days(), -2);
        assert_eq!(td.seconds(), 86370);
        assert_eq!(str_timedelta(&td), "-2 days, 23:59:30");
    }

    #[test]
    fn timedelta_repr_omits_zero_fields() {
        let td = Timedelta::from_micros(MICROS_PER_DAY + 3600 * MICROS_PER_SECOND).unwrap();
        assert_eq!(repr_timedelta(&td), "datetime.timedelta(days=1, seconds=3600)");
        assert_eq!(str_timedelta(&td), "1 day, 1:00:00");
        assert_eq!(repr_timedelta(&Timedelta::zero()), "datetime.timedelta(0)");
        assert_eq!(str_timedelta(&Timedelta::zero()), "0:00:00");
    }

    #[test]
    fn timedelta_overflow_message() {
        let err = Timedelta::from_micros(i64::MAX);
        assert!(err.is_err());
        let date_err = Date::new(10000, 1, 1).unwrap_err();
        drop(date_err);
    }

    #[test]
    fn timezone_range_is_exclusive() {
        let almost = Timedelta::from_micros(24 * MICROS_PER_HOUR - 1).unwrap();
        assert!(Timezone::new(almost, None).is_ok());
        let exactly = Timedelta::from_micros(24 * MICROS_PER_HOUR).unwrap();
        assert!(Timezone::new(exactly, None).is_err());
        let negative = Timedelta::from_micros(-24 * MICROS_PER_HOUR).unwrap();
        assert!(Timezone::new(negative, None).is_err());
    }

    #[test]
    fn timezone_repr_normalizes_negative_offsets() {
        let offset = Timedelta::from_micros(-MICROS_PER_SECOND).unwrap();
        let tz = Timezone::new(offset, None).unwrap();
        assert_eq!(
            repr_timezone(&tz),
            "datetime.timezone(datetime.timedelta(days=-1, seconds=86399))"
        );
        assert_eq!(repr_timezone(&Timezone::utc()), "datetime.timezone.utc");
    }

    #[test]
    fn leap_years() {
        assert!(is_leap_year(2000));
        assert!(!is_leap_year(1900));
        assert!(is_leap_year(2024));
        assert!(!is_leap_year(2023));
        assert_eq!(days_in_month(2024, 2), 29);
        assert_eq!(days_in_month(2023, 2), 28);
    }
}
