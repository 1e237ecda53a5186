//! The deterministic `datetime` module: pinned rendering strings, arithmetic,
//! aware/naive rules, and the host-supplied clock.

use monty::{ExcType, LocalClock, Monty, NoLimitTracker, NoPrint, Object, OsAccess, RunOptions};
use pretty_assertions::assert_eq;

fn run(code: &str) -> Object {
    let m = Monty::new(code.to_owned(), "<test>", vec![]).unwrap();
    m.run_no_limits(vec![]).unwrap()
}

fn run_err(code: &str) -> monty::Exception {
    let m = Monty::new(code.to_owned(), "<test>", vec![]).unwrap();
    m.run_no_limits(vec![]).unwrap_err()
}

/// Runs with the clock fixed at 2023-11-14 22:13:20 local, UTC-5.
fn run_clocked(code: &str) -> Object {
    let clock = LocalClock {
        year: 2023,
        month: 11,
        day: 14,
        hour: 22,
        minute: 13,
        second: 20,
        microsecond: 0,
        utc_offset_seconds: -5 * 3600,
    };
    let os = OsAccess::fixed_clock(clock);
    let m = Monty::new(code.to_owned(), "<test>", vec![]).unwrap();
    m.run(
        vec![],
        RunOptions {
            tracker: NoLimitTracker,
            os: Some(&os),
            print: &mut NoPrint,
            hash_seed: 0,
        },
    )
    .unwrap()
}

fn s(text: &str) -> Object {
    Object::String(text.to_owned())
}

const IMPORT: &str = "from datetime import date, time, datetime, timedelta, timezone\n";

fn run_dt(code: &str) -> Object {
    run(&format!("{IMPORT}{code}"))
}

fn run_dt_err(code: &str) -> monty::Exception {
    run_err(&format!("{IMPORT}{code}"))
}

// === pinned repr/str strings ===

#[test]
fn date_rendering() {
    assert_eq!(run_dt("repr(date(2024, 1, 15))"), s("datetime.date(2024, 1, 15)"));
    assert_eq!(run_dt("str(date(2024, 1, 15))"), s("2024-01-15"));
    assert_eq!(run_dt("str(date(33, 1, 5))"), s("0033-01-05"));
    assert_eq!(run_dt("date(2024, 1, 15).isoformat()"), s("2024-01-15"));
}

#[test]
fn datetime_repr_omits_trailing_zero_fields() {
    assert_eq!(
        run_dt("repr(datetime(2024, 1, 15, 10, 30))"),
        s("datetime.datetime(2024, 1, 15, 10, 30)")
    );
    assert_eq!(
        run_dt("repr(datetime(2024, 1, 15, 10, 30, 45))"),
        s("datetime.datetime(2024, 1, 15, 10, 30, 45)")
    );
    assert_eq!(
        run_dt("repr(datetime(2024, 1, 15, 10, 30, 0, 500))"),
        s("datetime.datetime(2024, 1, 15, 10, 30, 0, 500)")
    );
    assert_eq!(
        run_dt("repr(datetime(2024, 1, 15))"),
        s("datetime.datetime(2024, 1, 15, 0, 0)")
    );
}

#[test]
fn datetime_str_always_includes_seconds() {
    assert_eq!(run_dt("str(datetime(2024, 1, 15, 10, 30))"), s("2024-01-15 10:30:00"));
    assert_eq!(
        run_dt("str(datetime(2024, 1, 15, 10, 30, 45, 123456))"),
        s("2024-01-15 10:30:45.123456")
    );
    assert_eq!(
        run_dt("datetime(2024, 1, 15, 10, 30).isoformat()"),
        s("2024-01-15T10:30:00")
    );
}

#[test]
fn timedelta_repr_omits_zero_components() {
    assert_eq!(
        run_dt("repr(timedelta(days=1, seconds=3600))"),
        s("datetime.timedelta(days=1, seconds=3600)")
    );
    assert_eq!(run_dt("repr(timedelta())"), s("datetime.timedelta(0)"));
    assert_eq!(
        run_dt("repr(timedelta(microseconds=5))"),
        s("datetime.timedelta(microseconds=5)")
    );
}

#[test]
fn timedelta_str_uses_singular_and_plural() {
    assert_eq!(run_dt("str(timedelta(days=1, seconds=3600))"), s("1 day, 1:00:00"));
    assert_eq!(run_dt("str(timedelta(days=2))"), s("2 days, 0:00:00"));
    assert_eq!(run_dt("str(timedelta())"), s("0:00:00"));
    assert_eq!(run_dt("str(timedelta(microseconds=1))"), s("0:00:00.000001"));
    assert_eq!(run_dt("str(timedelta(hours=26))"), s("1 day, 2:00:00"));
}

#[test]
fn negative_timedelta_normalizes() {
    // -(1 day, 30s) is days=-2, seconds=86370 after normalization
    assert_eq!(
        run_dt("repr(-timedelta(days=1, seconds=30))"),
        s("datetime.timedelta(days=-2, seconds=86370)")
    );
    assert_eq!(run_dt("str(-timedelta(days=1, seconds=30))"), s("-2 days, 23:59:30"));
    assert_eq!(
        run_dt("td = -timedelta(days=1, seconds=30)\n[td.days, td.seconds, td.microseconds]"),
        Object::List(vec![Object::Int(-2), Object::Int(86370), Object::Int(0)])
    );
}

#[test]
fn timezone_utc_repr() {
    assert_eq!(run_dt("repr(timezone.utc)"), s("datetime.timezone.utc"));
    // zero offset without a name is the utc singleton's repr
    assert_eq!(run_dt("repr(timezone(timedelta(0)))"), s("datetime.timezone.utc"));
    assert_eq!(run_dt("str(timezone.utc)"), s("UTC"));
}

#[test]
fn timezone_repr_normalizes_negative_offsets() {
    assert_eq!(
        run_dt("repr(timezone(timedelta(seconds=-1)))"),
        s("datetime.timezone(datetime.timedelta(days=-1, seconds=86399))")
    );
    assert_eq!(
        run_dt("repr(timezone(timedelta(hours=5, minutes=30)))"),
        s("datetime.timezone(datetime.timedelta(seconds=19800))")
    );
}

#[test]
fn aware_datetime_str_appends_offset() {
    assert_eq!(
        run_dt("str(datetime(2024, 1, 15, 10, 30, tzinfo=timezone.utc))"),
        s("2024-01-15 10:30:00+00:00")
    );
    assert_eq!(
        run_dt("str(datetime(2024, 1, 15, 10, 30, tzinfo=timezone(timedelta(hours=-5))))"),
        s("2024-01-15 10:30:00-05:00")
    );
    // sub-minute offsets render seconds
    assert_eq!(
        run_dt("str(datetime(2024, 1, 15, 10, 30, tzinfo=timezone(timedelta(seconds=30))))"),
        s("2024-01-15 10:30:00+00:00:30")
    );
}

#[test]
fn timezone_range_is_strict() {
    let err = run_dt_err("timezone(timedelta(hours=24))");
    assert_eq!(err.exc_type(), ExcType::ValueError);
    assert_eq!(
        err.message(),
        Some("offset must be a timedelta strictly between -timedelta(hours=24) and timedelta(hours=24).")
    );
    let err = run_dt_err("timezone(timedelta(hours=-24))");
    assert_eq!(err.exc_type(), ExcType::ValueError);
    // just inside the bound is fine
    assert_eq!(
        run_dt("timezone(timedelta(hours=23, minutes=59)).utcoffset(None).seconds"),
        Object::Int(86340)
    );
}

#[test]
fn timezone_equality_ignores_name() {
    assert_eq!(
        run_dt("timezone(timedelta(hours=1)) == timezone(timedelta(hours=1), 'CET')"),
        Object::Bool(true)
    );
    assert_eq!(
        run_dt("hash(timezone(timedelta(hours=1))) == hash(timezone(timedelta(hours=1), 'CET'))"),
        Object::Bool(true)
    );
    assert_eq!(
        run_dt("repr(timezone(timedelta(hours=1), 'CET'))"),
        s("datetime.timezone(datetime.timedelta(seconds=3600), 'CET')")
    );
}

// === validation ===

#[test]
fn date_component_validation() {
    let err = run_dt_err("date(2024, 13, 1)");
    assert_eq!(err.message(), Some("month must be in 1..12"));
    let err = run_dt_err("date(2024, 2, 30)");
    assert_eq!(err.message(), Some("day is out of range for month"));
    let err = run_dt_err("date(0, 1, 1)");
    assert_eq!(err.message(), Some("year 0 is out of range"));
    let err = run_dt_err("date(10000, 1, 1)");
    assert_eq!(err.exc_type(), ExcType::ValueError);
    // leap day is valid in leap years only
    assert_eq!(run_dt("date(2024, 2, 29).day"), Object::Int(29));
    let err = run_dt_err("date(2023, 2, 29)");
    assert_eq!(err.message(), Some("day is out of range for month"));
}

#[test]
fn timedelta_overflow_message() {
    let err = run_dt_err("timedelta(days=1000000000)");
    assert_eq!(err.exc_type(), ExcType::OverflowError);
    assert_eq!(err.message(), Some("days=1000000000; must have magnitude <= 999999999"));
    assert_eq!(run_dt("timedelta(days=999999999).days"), Object::Int(999_999_999));
}

#[test]
fn date_overflow_message() {
    let err = run_dt_err("date(9999, 12, 31) + timedelta(days=1)");
    assert_eq!(err.exc_type(), ExcType::OverflowError);
    assert_eq!(err.message(), Some("date value out of range"));
    let err = run_dt_err("date(1, 1, 1) - timedelta(days=1)");
    assert_eq!(err.message(), Some("date value out of range"));
}

// === arithmetic ===

#[test]
fn date_arithmetic() {
    assert_eq!(run_dt("str(date(2024, 1, 15) + timedelta(days=20))"), s("2024-02-04"));
    assert_eq!(run_dt("str(date(2024, 3, 1) - timedelta(days=1))"), s("2024-02-29"));
    assert_eq!(
        run_dt("repr(date(2024, 2, 1) - date(2024, 1, 1))"),
        s("datetime.timedelta(days=31)")
    );
    assert_eq!(run_dt("(date(2024, 1, 1) - date(2024, 1, 31)).days"), Object::Int(-30));
    assert_eq!(run_dt("str(timedelta(days=7) + date(2024, 1, 1))"), s("2024-01-08"));
}

#[test]
fn datetime_arithmetic_keeps_subday_precision() {
    assert_eq!(
        run_dt("str(datetime(2024, 1, 15, 23, 30) + timedelta(hours=1))"),
        s("2024-01-16 00:30:00")
    );
    assert_eq!(
        run_dt("str(datetime(2024, 1, 1) - timedelta(microseconds=1))"),
        s("2023-12-31 23:59:59.999999")
    );
    assert_eq!(
        run_dt("repr(datetime(2024, 1, 2, 12) - datetime(2024, 1, 1, 6))"),
        s("datetime.timedelta(days=1, seconds=21600)")
    );
}

#[test]
fn timedelta_arithmetic_and_scaling() {
    assert_eq!(
        run_dt("repr(timedelta(days=1) + timedelta(hours=12))"),
        s("datetime.timedelta(days=1, seconds=43200)")
    );
    assert_eq!(run_dt("timedelta(days=1) * 2 == timedelta(days=2)"), Object::Bool(true));
    assert_eq!(run_dt("2 * timedelta(hours=6) == timedelta(hours=12)"), Object::Bool(true));
    assert_eq!(run_dt("timedelta(days=1) / timedelta(hours=6)"), Object::Float(4.0));
    assert_eq!(run_dt("timedelta(days=1) // timedelta(hours=7)"), Object::Int(3));
    assert_eq!(run_dt("timedelta(hours=1).total_seconds()"), Object::Float(3600.0));
    assert_eq!(run_dt("abs(-timedelta(days=2)) == timedelta(days=2)"), Object::Bool(true));
}

#[test]
fn timedelta_comparison_and_hash() {
    assert_eq!(run_dt("timedelta(days=1) < timedelta(days=2)"), Object::Bool(true));
    assert_eq!(run_dt("timedelta(hours=24) == timedelta(days=1)"), Object::Bool(true));
    assert_eq!(
        run_dt("hash(timedelta(hours=24)) == hash(timedelta(days=1))"),
        Object::Bool(true)
    );
}

#[test]
fn date_comparison() {
    assert_eq!(run_dt("date(2024, 1, 1) < date(2024, 1, 2)"), Object::Bool(true));
    assert_eq!(run_dt("date(2024, 1, 1) == date(2024, 1, 1)"), Object::Bool(true));
    assert_eq!(run_dt("date(2024, 1, 1) == datetime(2024, 1, 1)"), Object::Bool(false));
}

// === aware/naive rules ===

#[test]
fn aware_naive_equality_is_false_never_raises() {
    assert_eq!(
        run_dt("datetime(2024, 1, 1, 12, tzinfo=timezone.utc) == datetime(2024, 1, 1, 12)"),
        Object::Bool(false)
    );
    assert_eq!(
        run_dt("datetime(2024, 1, 1, 12, tzinfo=timezone.utc) != datetime(2024, 1, 1, 12)"),
        Object::Bool(true)
    );
}

#[test]
fn aware_naive_ordering_raises() {
    let err = run_dt_err("datetime(2024, 1, 1, 12, tzinfo=timezone.utc) < datetime(2024, 1, 1, 12)");
    assert_eq!(err.exc_type(), ExcType::TypeError);
    assert_eq!(err.message(), Some("can't compare offset-naive and offset-aware datetimes"));
}

#[test]
fn aware_naive_subtraction_raises() {
    let err = run_dt_err("datetime(2024, 1, 1, 12, tzinfo=timezone.utc) - datetime(2024, 1, 1, 12)");
    assert_eq!(err.exc_type(), ExcType::TypeError);
    assert_eq!(err.message(), Some("can't subtract offset-naive and offset-aware datetimes"));
}

#[test]
fn aware_comparison_normalizes_to_utc() {
    // 12:00 UTC == 07:00 UTC-5
    assert_eq!(
        run_dt(
            "datetime(2024, 1, 1, 12, tzinfo=timezone.utc) == \
             datetime(2024, 1, 1, 7, tzinfo=timezone(timedelta(hours=-5)))"
        ),
        Object::Bool(true)
    );
    assert_eq!(
        run_dt(
            "repr(datetime(2024, 1, 1, 12, tzinfo=timezone.utc) - \
             datetime(2024, 1, 1, 7, tzinfo=timezone(timedelta(hours=-5))))"
        ),
        s("datetime.timedelta(0)")
    );
}

// === instance surface ===

#[test]
fn component_attributes() {
    assert_eq!(
        run_dt("d = datetime(2024, 1, 15, 10, 30, 45, 123)\n[d.year, d.month, d.day, d.hour, d.minute, d.second, d.microsecond]"),
        Object::List(vec![
            Object::Int(2024),
            Object::Int(1),
            Object::Int(15),
            Object::Int(10),
            Object::Int(30),
            Object::Int(45),
            Object::Int(123),
        ])
    );
    assert_eq!(run_dt("datetime(2024, 1, 1).tzinfo"), Object::None);
    assert_eq!(
        run_dt("td = timedelta(days=2, hours=1, microseconds=7)\n[td.days, td.seconds, td.microseconds]"),
        Object::List(vec![Object::Int(2), Object::Int(3600), Object::Int(7)])
    );
}

#[test]
fn weekday_and_ordinal() {
    // 2024-01-15 was a Monday
    assert_eq!(run_dt("date(2024, 1, 15).weekday()"), Object::Int(0));
    assert_eq!(run_dt("date(2024, 1, 15).isoweekday()"), Object::Int(1));
    assert_eq!(run_dt("date(1, 1, 1).toordinal()"), Object::Int(1));
    assert_eq!(run_dt("str(date.fromordinal(738900))"), s("2024-01-15"));
    assert_eq!(run_dt("date.fromordinal(date(2024, 1, 15).toordinal()) == date(2024, 1, 15)"), Object::Bool(true));
}

#[test]
fn replace_and_combine() {
    assert_eq!(run_dt("str(date(2024, 1, 15).replace(month=6))"), s("2024-06-15"));
    assert_eq!(
        run_dt("str(datetime(2024, 1, 15, 10, 30).replace(hour=0, microsecond=5))"),
        s("2024-01-15 00:30:00.000005")
    );
    assert_eq!(
        run_dt("str(datetime.combine(date(2024, 1, 15), time(10, 30)))"),
        s("2024-01-15 10:30:00")
    );
    assert_eq!(run_dt("str(datetime(2024, 1, 15, 10, 30).date())"), s("2024-01-15"));
    assert_eq!(run_dt("str(datetime(2024, 1, 15, 10, 30).time())"), s("10:30:00"));
}

#[test]
fn time_rendering_and_validation() {
    assert_eq!(run_dt("str(time(10, 30))"), s("10:30:00"));
    assert_eq!(run_dt("repr(time(10, 30))"), s("datetime.time(10, 30)"));
    assert_eq!(run_dt("str(time(1, 2, 3, 4))"), s("01:02:03.000004"));
    let err = run_dt_err("time(24, 0)");
    assert_eq!(err.message(), Some("hour must be in 0..23"));
    let err = run_dt_err("time(0, 60)");
    assert_eq!(err.message(), Some("minute must be in 0..59"));
}

#[test]
fn time_aware_naive_rules() {
    assert_eq!(run_dt("time(10, 0, tzinfo=timezone.utc) == time(10, 0)"), Object::Bool(false));
    let err = run_dt_err("time(10, 0, tzinfo=timezone.utc) < time(10, 0)");
    assert_eq!(err.message(), Some("can't compare offset-naive and offset-aware times"));
}

#[test]
fn class_attributes() {
    assert_eq!(run_dt("str(date.min)"), s("0001-01-01"));
    assert_eq!(run_dt("str(date.max)"), s("9999-12-31"));
    assert_eq!(run_dt("timedelta.resolution == timedelta(microseconds=1)"), Object::Bool(true));
    assert_eq!(run_dt("timedelta.max.days"), Object::Int(999_999_999));
    assert_eq!(run("import datetime\ndatetime.MINYEAR"), Object::Int(1));
    assert_eq!(run("import datetime\ndatetime.MAXYEAR"), Object::Int(9999));
}

#[test]
fn tzname_and_utcoffset() {
    assert_eq!(run_dt("timezone.utc.tzname(None)"), s("UTC"));
    assert_eq!(run_dt("timezone(timedelta(hours=5, minutes=30)).tzname(None)"), s("UTC+05:30"));
    assert_eq!(run_dt("timezone(timedelta(hours=1), 'CET').tzname(None)"), s("CET"));
    assert_eq!(
        run_dt("datetime(2024, 1, 1, tzinfo=timezone.utc).utcoffset() == timedelta(0)"),
        Object::Bool(true)
    );
    assert_eq!(run_dt("datetime(2024, 1, 1).utcoffset()"), Object::None);
}

// === host clock ===

#[test]
fn today_and_now_read_the_host_clock() {
    assert_eq!(run_clocked(&format!("{IMPORT}str(date.today())")), s("2023-11-14"));
    assert_eq!(
        run_clocked(&format!("{IMPORT}str(datetime.now())")),
        s("2023-11-14 22:13:20")
    );
    // now(tz) converts the local civil time through UTC to the target zone
    assert_eq!(
        run_clocked(&format!("{IMPORT}str(datetime.now(timezone.utc))")),
        s("2023-11-15 03:13:20+00:00")
    );
}

#[test]
fn clock_is_a_required_capability() {
    let err = run_dt_err("date.today()");
    assert_eq!(err.exc_type(), ExcType::OSError);
    assert_eq!(err.message(), Some("os access capability 'clock_local' is not available"));
    let err = run_dt_err("datetime.now()");
    assert_eq!(err.exc_type(), ExcType::OSError);
}

#[test]
fn datetime_hash_is_consistent_with_equality() {
    assert_eq!(
        run_dt(
            "a = datetime(2024, 1, 1, 12, tzinfo=timezone.utc)\n\
             b = datetime(2024, 1, 1, 7, tzinfo=timezone(timedelta(hours=-5)))\n\
             hash(a) == hash(b)"
        ),
        Object::Bool(true)
    );
    assert_eq!(
        run_dt("hash(date(2024, 1, 1)) == hash(date(2024, 1, 1))"),
        Object::Bool(true)
    );
    // dates work as dict keys
    assert_eq!(
        run_dt("d = {date(2024, 1, 1): 'new year'}\nd[date(2024, 1, 1)]"),
        s("new year")
    );
}
