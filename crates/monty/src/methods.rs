//! Method and attribute dispatch for built-in values.
//!
//! `obj.method(args)` lands in [`call_method`]; `obj.attr` data access lands
//! in [`get_attr`]. Methods that must call back into script code (`list.sort`
//! with `key=`) and class methods that need host capabilities
//! (`date.today()`) are intercepted by the evaluator before reaching here, so
//! everything in this module operates on data alone.

use crate::{
    args::ArgValues,
    builtins::sorted_values,
    exception::{ExcType, RunResult},
    expressions::Operator,
    heap::{Heap, HeapData, HeapId},
    intern::Interns,
    ops::{set_algebra, values_eq_or_identical},
    resource::ResourceTracker,
    types::{
        Type,
        bytes::call_bytes_method,
        datetime::{self, Date, DateTime, Time, Timedelta},
        dict::hash_key,
        iter::iterate_to_vec,
        set::{FrozenSet, Set, SetStorage, storage_from_values},
        str::call_str_method,
    },
    value::{Value, value_as_bytes, value_as_str},
};

/// Calls `obj.<method>(args)`. `Ok(None)` means the receiver's type has no
/// such method and the caller should raise `AttributeError`.
pub(crate) fn call_method(
    obj: Value,
    method: &str,
    args: ArgValues,
    heap: &mut Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<Option<Value>> {
    if let Some(s) = value_as_str(&obj, heap, interns) {
        let snapshot = s.to_owned();
        return call_str_method(&snapshot, method, args, heap, interns);
    }
    if let Some(b) = value_as_bytes(&obj, heap, interns) {
        let snapshot = b.to_vec();
        return call_bytes_method(&snapshot, method, args, heap, interns);
    }
    let Value::Ref(id) = obj else {
        return Ok(None);
    };
    match heap.get(id) {
        HeapData::List(_) => call_list_method(id, method, args, heap, interns),
        HeapData::Tuple(_) => call_tuple_method(id, method, args, heap, interns),
        HeapData::Dict(_) => call_dict_method(id, method, args, heap, interns),
        HeapData::Set(_) => call_set_method(id, method, args, heap, interns),
        HeapData::FrozenSet(_) => call_frozenset_method(id, method, args, heap, interns),
        HeapData::Date(_) => call_date_method(id, method, args, heap, interns),
        HeapData::Time(_) => call_time_method(id, method, args, heap, interns),
        HeapData::DateTime(_) => call_datetime_method(id, method, args, heap, interns),
        HeapData::Timedelta(_) => call_timedelta_method(id, method, args, heap),
        HeapData::Timezone(_) => call_timezone_method(id, method, args, heap),
        _ => Ok(None),
    }
}

/// Reads a data attribute. `Ok(None)` means not a data attribute (it may
/// still be a method name).
pub(crate) fn get_attr(
    obj: Value,
    attr: &str,
    heap: &mut Heap<impl ResourceTracker>,
) -> RunResult<Option<Value>> {
    let Value::Ref(id) = obj else {
        return Ok(None);
    };
    let value = match heap.get(id) {
        HeapData::Date(d) => match attr {
            "year" => Value::Int(i64::from(d.year)),
            "month" => Value::Int(i64::from(d.month)),
            "day" => Value::Int(i64::from(d.day)),
            _ => return Ok(None),
        },
        HeapData::Time(t) => match attr {
            "hour" => Value::Int(i64::from(t.hour)),
            "minute" => Value::Int(i64::from(t.minute)),
            "second" => Value::Int(i64::from(t.second)),
            "microsecond" => Value::Int(i64::from(t.microsecond)),
            "tzinfo" => t.tzinfo.unwrap_or(Value::None),
            _ => return Ok(None),
        },
        HeapData::DateTime(dt) => match attr {
            "year" => Value::Int(i64::from(dt.date.year)),
            "month" => Value::Int(i64::from(dt.date.month)),
            "day" => Value::Int(i64::from(dt.date.day)),
            "hour" => Value::Int(i64::from(dt.time.hour)),
            "minute" => Value::Int(i64::from(dt.time.minute)),
            "second" => Value::Int(i64::from(dt.time.second)),
            "microsecond" => Value::Int(i64::from(dt.time.microsecond)),
            "tzinfo" => dt.time.tzinfo.unwrap_or(Value::None),
            _ => return Ok(None),
        },
        HeapData::Timedelta(td) => match attr {
            "days" => Value::Int(td.days()),
            "seconds" => Value::Int(td.seconds()),
            "microseconds" => Value::Int(td.microseconds()),
            _ => return Ok(None),
        },
        HeapData::Exception(exc) => match attr {
            "args" => {
                let args = exc.args.clone();
                heap.alloc_tuple(args)?
            }
            "__cause__" => exc.cause.unwrap_or(Value::None),
            "__context__" => exc.context.unwrap_or(Value::None),
            _ => return Ok(None),
        },
        _ => return Ok(None),
    };
    Ok(Some(value))
}

/// Whether `type` has a method called `name` (drives `AttributeError` vs
/// bound-method creation on bare attribute access).
pub(crate) fn has_method(t: Type, name: &str) -> bool {
    const STR_METHODS: &[&str] = &[
        "capitalize", "center", "count", "encode", "endswith", "find", "format", "index", "isalnum", "isalpha",
        "isdigit", "islower", "isspace", "istitle", "isupper", "join", "ljust", "lower", "lstrip", "removeprefix",
        "removesuffix", "replace", "rfind", "rindex", "rjust", "rsplit", "rstrip", "split", "splitlines",
        "startswith", "strip", "swapcase", "title", "upper", "zfill",
    ];
    const BYTES_METHODS: &[&str] = &[
        "count", "decode", "endswith", "find", "hex", "index", "join", "lower", "lstrip", "replace", "rstrip",
        "split", "startswith", "strip", "upper",
    ];
    const LIST_METHODS: &[&str] = &[
        "append", "clear", "copy", "count", "extend", "index", "insert", "pop", "remove", "reverse", "sort",
    ];
    const TUPLE_METHODS: &[&str] = &["count", "index"];
    const DICT_METHODS: &[&str] = &[
        "clear", "copy", "get", "items", "keys", "pop", "popitem", "setdefault", "update", "values",
    ];
    const SET_METHODS: &[&str] = &[
        "add", "clear", "copy", "difference", "difference_update", "discard", "intersection",
        "intersection_update", "isdisjoint", "issubset", "issuperset", "pop", "remove", "symmetric_difference",
        "symmetric_difference_update", "union", "update",
    ];
    const FROZENSET_METHODS: &[&str] = &[
        "copy", "difference", "intersection", "isdisjoint", "issubset", "issuperset", "symmetric_difference",
        "union",
    ];
    const DATE_METHODS: &[&str] = &["isoformat", "isoweekday", "replace", "toordinal", "weekday"];
    const TIME_METHODS: &[&str] = &["isoformat", "replace"];
    const DATETIME_METHODS: &[&str] = &[
        "date", "isoformat", "isoweekday", "replace", "time", "toordinal", "tzname", "utcoffset", "weekday",
    ];
    const TIMEDELTA_METHODS: &[&str] = &["total_seconds"];
    const TIMEZONE_METHODS: &[&str] = &["tzname", "utcoffset"];

    let table: &[&str] = match t {
        Type::Str => STR_METHODS,
        Type::Bytes => BYTES_METHODS,
        Type::List => LIST_METHODS,
        Type::Tuple => TUPLE_METHODS,
        Type::Dict => DICT_METHODS,
        Type::Set => SET_METHODS,
        Type::FrozenSet => FROZENSET_METHODS,
        Type::Date => DATE_METHODS,
        Type::Time => TIME_METHODS,
        Type::DateTime => DATETIME_METHODS,
        Type::Timedelta => TIMEDELTA_METHODS,
        Type::Timezone => TIMEZONE_METHODS,
        _ => return false,
    };
    table.contains(&name)
}

/// Class-level attribute access on a type object (`timezone.utc`,
/// `date.min`, …). `Ok(None)` means no such class attribute.
pub(crate) fn type_attr(
    t: Type,
    attr: &str,
    heap: &mut Heap<impl ResourceTracker>,
) -> RunResult<Option<Value>> {
    let value = match (t, attr) {
        (Type::Timezone, "utc") => {
            Value::Ref(heap.allocate(HeapData::Timezone(datetime::Timezone::utc()))?)
        }
        (Type::Timedelta, "min") => Value::Ref(heap.allocate(HeapData::Timedelta(Timedelta::min()))?),
        (Type::Timedelta, "max") => Value::Ref(heap.allocate(HeapData::Timedelta(Timedelta::max()))?),
        (Type::Timedelta, "resolution") => {
            Value::Ref(heap.allocate(HeapData::Timedelta(Timedelta::resolution()))?)
        }
        (Type::Date, "min") => Value::Ref(heap.allocate(HeapData::Date(Date {
            year: datetime::MINYEAR,
            month: 1,
            day: 1,
        }))?),
        (Type::Date, "max") => Value::Ref(heap.allocate(HeapData::Date(Date {
            year: datetime::MAXYEAR,
            month: 12,
            day: 31,
        }))?),
        (Type::DateTime, "min") => {
            let dt = DateTime {
                date: Date {
                    year: datetime::MINYEAR,
                    month: 1,
                    day: 1,
                },
                time: Time {
                    hour: 0,
                    minute: 0,
                    second: 0,
                    microsecond: 0,
                    tzinfo: None,
                },
            };
            Value::Ref(heap.allocate(HeapData::DateTime(dt))?)
        }
        (Type::DateTime, "max") => {
            let dt = DateTime {
                date: Date {
                    year: datetime::MAXYEAR,
                    month: 12,
                    day: 31,
                },
                time: Time {
                    hour: 23,
                    minute: 59,
                    second: 59,
                    microsecond: 999_999,
                    tzinfo: None,
                },
            };
            Value::Ref(heap.allocate(HeapData::DateTime(dt))?)
        }
        _ => return Ok(None),
    };
    Ok(Some(value))
}

/// Class-method names reachable through type objects; the evaluator
/// intercepts the clock-dependent ones.
pub(crate) fn type_has_classmethod(t: Type, name: &str) -> bool {
    matches!(
        (t, name),
        (Type::Date, "today" | "fromordinal") | (Type::DateTime, "now" | "combine")
    )
}

// === list ===

fn call_list_method(
    id: HeapId,
    method: &str,
    args: ArgValues,
    heap: &mut Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<Option<Value>> {
    let result = match method {
        "append" => {
            let value = args.exactly_one("append")?;
            heap.tracker().on_container_insert()?;
            let HeapData::List(list) = heap.get_mut(id) else { unreachable!() };
            list.push(value);
            Value::None
        }
        "extend" => {
            let iterable = args.exactly_one("extend")?;
            let items = iterate_to_vec(iterable, heap, interns)?;
            let HeapData::List(list) = heap.get_mut(id) else { unreachable!() };
            list.as_vec_mut().extend(items);
            Value::None
        }
        "insert" => {
            args.no_kwargs("insert")?;
            args.check_arity("insert", 2, 2)?;
            let index = args.pos_arg(0).expect("arity checked").expect_index(heap, interns, "insert")?;
            let value = args.pos_arg(1).expect("arity checked");
            heap.tracker().on_container_insert()?;
            let HeapData::List(list) = heap.get_mut(id) else { unreachable!() };
            list.insert_clamped(index, value);
            Value::None
        }
        "pop" => {
            args.no_kwargs("pop")?;
            args.check_arity("pop", 0, 1)?;
            let index = match args.pos_arg(0) {
                None => -1,
                Some(v) => v.expect_index(heap, interns, "pop")?,
            };
            let HeapData::List(list) = heap.get_mut(id) else { unreachable!() };
            let len = list.len() as i64;
            if len == 0 {
                return Err(ExcType::IndexError.msg("pop from empty list"));
            }
            let adjusted = if index < 0 { index + len } else { index };
            if !(0..len).contains(&adjusted) {
                return Err(ExcType::IndexError.msg("pop index out of range"));
            }
            list.as_vec_mut().remove(adjusted as usize)
        }
        "remove" => {
            let value = args.exactly_one("remove")?;
            let items = snapshot_list(id, heap);
            let mut found = None;
            for (i, item) in items.iter().enumerate() {
                if values_eq_or_identical(item, &value, heap, interns)? {
                    found = Some(i);
                    break;
                }
            }
            let Some(index) = found else {
                return Err(ExcType::value_error("list.remove(x): x not in list"));
            };
            let HeapData::List(list) = heap.get_mut(id) else { unreachable!() };
            list.as_vec_mut().remove(index);
            Value::None
        }
        "clear" => {
            args.exactly_none("clear")?;
            let HeapData::List(list) = heap.get_mut(id) else { unreachable!() };
            list.clear();
            Value::None
        }
        "copy" => {
            args.exactly_none("copy")?;
            let items = snapshot_list(id, heap);
            heap.alloc_list(items)?
        }
        "index" => {
            args.no_kwargs("index")?;
            args.check_arity("index", 1, 3)?;
            let value = args.pos_arg(0).expect("arity checked");
            let items = snapshot_list(id, heap);
            let (start, stop) = seq_range_args(&args, items.len(), heap, interns)?;
            for (i, item) in items.iter().enumerate().take(stop).skip(start) {
                if values_eq_or_identical(item, &value, heap, interns)? {
                    return Ok(Some(Value::Int(i as i64)));
                }
            }
            let shown = crate::repr::repr_value(&value, heap, interns)?;
            return Err(ExcType::value_error(format!("{shown} is not in list")));
        }
        "count" => {
            let value = args.exactly_one("count")?;
            let items = snapshot_list(id, heap);
            let mut count = 0i64;
            for item in &items {
                if values_eq_or_identical(item, &value, heap, interns)? {
                    count += 1;
                }
            }
            Value::Int(count)
        }
        "reverse" => {
            args.exactly_none("reverse")?;
            let HeapData::List(list) = heap.get_mut(id) else { unreachable!() };
            list.reverse();
            Value::None
        }
        "sort" => {
            // key= is intercepted by the evaluator; only reverse= lands here
            args.reject_unknown_kwargs("sort", &["key", "reverse"])?;
            args.check_arity("sort", 0, 0)?;
            if let Some(key) = args.kwarg("key")
                && !matches!(key, Value::None)
            {
                return Err(ExcType::type_error("sort() key function must be callable"));
            }
            let reverse = args
                .kwarg("reverse")
                .map(|v| v.py_bool(heap, interns))
                .unwrap_or(false);
            let items = snapshot_list(id, heap);
            let sorted = sorted_values(items, reverse, heap, interns)?;
            let HeapData::List(list) = heap.get_mut(id) else { unreachable!() };
            *list.as_vec_mut() = sorted;
            Value::None
        }
        _ => return Ok(None),
    };
    Ok(Some(result))
}

pub(crate) fn snapshot_list(id: HeapId, heap: &Heap<impl ResourceTracker>) -> Vec<Value> {
    match heap.get(id) {
        HeapData::List(list) => list.as_slice().to_vec(),
        _ => unreachable!("expected list"),
    }
}

/// Optional `start`/`stop` positional args for `index`-style methods.
fn seq_range_args(
    args: &ArgValues,
    len: usize,
    heap: &Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<(usize, usize)> {
    let len_i = len as i64;
    let clamp = |raw: i64| -> usize {
        let adjusted = if raw < 0 { raw + len_i } else { raw };
        usize::try_from(adjusted.clamp(0, len_i)).expect("clamped")
    };
    let start = match args.pos_arg(1) {
        None => 0,
        Some(v) => clamp(v.expect_index(heap, interns, "index")?),
    };
    let stop = match args.pos_arg(2) {
        None => len,
        Some(v) => clamp(v.expect_index(heap, interns, "index")?),
    };
    Ok((start, stop))
}

// === tuple ===

fn call_tuple_method(
    id: HeapId,
    method: &str,
    args: ArgValues,
    heap: &mut Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<Option<Value>> {
    let HeapData::Tuple(tuple) = heap.get(id) else { unreachable!() };
    let items = tuple.as_slice().to_vec();
    let result = match method {
        "count" => {
            let value = args.exactly_one("count")?;
            let mut count = 0i64;
            for item in &items {
                if values_eq_or_identical(item, &value, heap, interns)? {
                    count += 1;
                }
            }
            Value::Int(count)
        }
        "index" => {
            args.no_kwargs("index")?;
            args.check_arity("index", 1, 3)?;
            let value = args.pos_arg(0).expect("arity checked");
            let (start, stop) = seq_range_args(&args, items.len(), heap, interns)?;
            for (i, item) in items.iter().enumerate().take(stop).skip(start) {
                if values_eq_or_identical(item, &value, heap, interns)? {
                    return Ok(Some(Value::Int(i as i64)));
                }
            }
            return Err(ExcType::value_error("tuple.index(x): x not in tuple"));
        }
        _ => return Ok(None),
    };
    Ok(Some(result))
}

// === dict ===

fn call_dict_method(
    id: HeapId,
    method: &str,
    args: ArgValues,
    heap: &mut Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<Option<Value>> {
    let result = match method {
        "get" => {
            args.no_kwargs("get")?;
            args.check_arity("get", 1, 2)?;
            let key = args.pos_arg(0).expect("arity checked");
            let default = args.pos_arg(1).unwrap_or(Value::None);
            let hash = hash_key(key, heap, interns)?;
            with_dict(heap, id, |dict, heap| dict.get(key, hash, heap, interns))?.unwrap_or(default)
        }
        "keys" => {
            args.exactly_none("keys")?;
            let keys: Vec<Value> = dict_entries(id, heap).iter().map(|(k, _)| *k).collect();
            heap.alloc_list(keys)?
        }
        "values" => {
            args.exactly_none("values")?;
            let values: Vec<Value> = dict_entries(id, heap).iter().map(|(_, v)| *v).collect();
            heap.alloc_list(values)?
        }
        "items" => {
            args.exactly_none("items")?;
            let entries = dict_entries(id, heap);
            let mut items = Vec::with_capacity(entries.len());
            for (key, value) in entries {
                items.push(heap.alloc_tuple(vec![key, value])?);
            }
            heap.alloc_list(items)?
        }
        "pop" => {
            args.no_kwargs("pop")?;
            args.check_arity("pop", 1, 2)?;
            let key = args.pos_arg(0).expect("arity checked");
            let default = args.pos_arg(1);
            let hash = hash_key(key, heap, interns)?;
            let removed = with_dict(heap, id, |dict, heap| dict.remove(key, hash, heap, interns))?;
            match (removed, default) {
                (Some(value), _) => value,
                (None, Some(default)) => default,
                (None, None) => return Err(ExcType::key_error(heap, key)),
            }
        }
        "popitem" => {
            args.exactly_none("popitem")?;
            let HeapData::Dict(dict) = heap.get_mut(id) else { unreachable!() };
            match dict.pop_last() {
                Some((key, value)) => heap.alloc_tuple(vec![key, value])?,
                None => return Err(ExcType::KeyError.msg("popitem(): dictionary is empty")),
            }
        }
        "setdefault" => {
            args.no_kwargs("setdefault")?;
            args.check_arity("setdefault", 1, 2)?;
            let key = args.pos_arg(0).expect("arity checked");
            let default = args.pos_arg(1).unwrap_or(Value::None);
            let hash = hash_key(key, heap, interns)?;
            let existing = with_dict(heap, id, |dict, heap| dict.get(key, hash, heap, interns))?;
            match existing {
                Some(value) => value,
                None => {
                    with_dict(heap, id, |dict, heap| {
                        dict.insert(key, hash, default, heap, interns)
                    })?;
                    default
                }
            }
        }
        "update" => {
            args.no_kwargs("update")?;
            args.check_arity("update", 0, 1)?;
            if let Some(source) = args.pos_arg(0) {
                let pairs = dict_update_pairs(source, heap, interns)?;
                for (key, value) in pairs {
                    let hash = hash_key(key, heap, interns)?;
                    with_dict(heap, id, |dict, heap| {
                        dict.insert(key, hash, value, heap, interns)
                    })?;
                }
            }
            Value::None
        }
        "clear" => {
            args.exactly_none("clear")?;
            let HeapData::Dict(dict) = heap.get_mut(id) else { unreachable!() };
            dict.clear();
            Value::None
        }
        "copy" => {
            args.exactly_none("copy")?;
            let HeapData::Dict(dict) = heap.get(id) else { unreachable!() };
            let copied = dict.shallow_copy();
            Value::Ref(heap.allocate(HeapData::Dict(copied))?)
        }
        _ => return Ok(None),
    };
    Ok(Some(result))
}

/// Runs `f` with the dict temporarily moved out of the arena so key hashing
/// and comparison can read the rest of the heap.
pub(crate) fn with_dict<T: ResourceTracker, R>(
    heap: &mut Heap<T>,
    id: HeapId,
    f: impl FnOnce(&mut crate::types::dict::Dict, &mut Heap<T>) -> RunResult<R>,
) -> RunResult<R> {
    let mut dict = match heap.take(id) {
        HeapData::Dict(dict) => dict,
        other => {
            heap.put_back(id, other);
            unreachable!("expected dict");
        }
    };
    let result = f(&mut dict, heap);
    heap.put_back(id, HeapData::Dict(dict));
    result
}

pub(crate) fn dict_entries(id: HeapId, heap: &Heap<impl ResourceTracker>) -> Vec<(Value, Value)> {
    match heap.get(id) {
        HeapData::Dict(dict) => dict.entries().iter().map(|e| (e.key, e.value)).collect(),
        _ => unreachable!("expected dict"),
    }
}

/// `(key, value)` pairs for `dict.update`: a mapping or an iterable of pairs.
fn dict_update_pairs(
    source: Value,
    heap: &mut Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<Vec<(Value, Value)>> {
    if let Value::Ref(sid) = source
        && matches!(heap.get(sid), HeapData::Dict(_))
    {
        return Ok(dict_entries(sid, heap));
    }
    let outer = iterate_to_vec(source, heap, interns)?;
    let mut pairs = Vec::with_capacity(outer.len());
    for (index, pair) in outer.into_iter().enumerate() {
        let items = iterate_to_vec(pair, heap, interns).map_err(|_| {
            ExcType::type_error(format!(
                "cannot convert dictionary update sequence element #{index} to a sequence"
            ))
        })?;
        let [key, value] = items.as_slice() else {
            return Err(ExcType::value_error(format!(
                "dictionary update sequence element #{index} has length {}; 2 is required",
                items.len()
            )));
        };
        pairs.push((*key, *value));
    }
    Ok(pairs)
}

// === set / frozenset ===

fn call_set_method(
    id: HeapId,
    method: &str,
    args: ArgValues,
    heap: &mut Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<Option<Value>> {
    let result = match method {
        "add" => {
            let value = args.exactly_one("add")?;
            let hash = value.py_hash(heap, interns)?;
            with_set(heap, id, |storage, heap| storage.add(value, hash, heap, interns))?;
            Value::None
        }
        "remove" => {
            let value = args.exactly_one("remove")?;
            let hash = value.py_hash(heap, interns)?;
            let removed = with_set(heap, id, |storage, heap| storage.remove(value, hash, heap, interns))?;
            if !removed {
                return Err(ExcType::key_error(heap, value));
            }
            Value::None
        }
        "discard" => {
            let value = args.exactly_one("discard")?;
            let hash = value.py_hash(heap, interns)?;
            with_set(heap, id, |storage, heap| storage.remove(value, hash, heap, interns))?;
            Value::None
        }
        "pop" => {
            args.exactly_none("pop")?;
            let HeapData::Set(set) = heap.get_mut(id) else { unreachable!() };
            match set.storage_mut().pop_first() {
                Some(value) => value,
                None => return Err(ExcType::KeyError.msg("pop from an empty set")),
            }
        }
        "clear" => {
            args.exactly_none("clear")?;
            let HeapData::Set(set) = heap.get_mut(id) else { unreachable!() };
            set.storage_mut().clear();
            Value::None
        }
        "copy" => {
            args.exactly_none("copy")?;
            let HeapData::Set(set) = heap.get(id) else { unreachable!() };
            let copied = set.storage().shallow_copy();
            Value::Ref(heap.allocate(HeapData::Set(Set::new(copied)))?)
        }
        "update" | "intersection_update" | "difference_update" | "symmetric_difference_update" => {
            args.no_kwargs(method)?;
            let op = match method {
                "update" => Operator::BitOr,
                "intersection_update" => Operator::BitAnd,
                "difference_update" => Operator::Sub,
                _ => Operator::BitXor,
            };
            // snapshot the arguments first so `s.update(s)` sees a stable view
            let mut others = Vec::with_capacity(args.pos.len());
            for other in &args.pos {
                others.push(storage_from_any(*other, heap, interns)?);
            }
            let mut current = take_set_storage(heap, id)?;
            for other in others {
                let next = set_algebra(&op, &current, &other, heap, interns);
                match next {
                    Ok(next) => current = next,
                    Err(err) => {
                        heap.put_back(id, HeapData::Set(Set::new(current)));
                        return Err(err);
                    }
                }
            }
            heap.put_back(id, HeapData::Set(Set::new(current)));
            Value::None
        }
        "union" | "intersection" | "difference" | "symmetric_difference" => {
            return set_algebra_method(id, method, args, heap, interns, false);
        }
        "isdisjoint" | "issubset" | "issuperset" => {
            return set_predicate_method(id, method, args, heap, interns);
        }
        _ => return Ok(None),
    };
    Ok(Some(result))
}

fn call_frozenset_method(
    id: HeapId,
    method: &str,
    args: ArgValues,
    heap: &mut Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<Option<Value>> {
    match method {
        "copy" => {
            args.exactly_none("copy")?;
            Ok(Some(Value::Ref(id)))
        }
        "union" | "intersection" | "difference" | "symmetric_difference" => {
            set_algebra_method(id, method, args, heap, interns, true)
        }
        "isdisjoint" | "issubset" | "issuperset" => set_predicate_method(id, method, args, heap, interns),
        _ => Ok(None),
    }
}

fn take_set_storage(heap: &mut Heap<impl ResourceTracker>, id: HeapId) -> RunResult<SetStorage> {
    match heap.take(id) {
        HeapData::Set(set) => Ok(set.into_storage()),
        other => {
            heap.put_back(id, other);
            unreachable!("expected set");
        }
    }
}

fn with_set<T: ResourceTracker, R>(
    heap: &mut Heap<T>,
    id: HeapId,
    f: impl FnOnce(&mut SetStorage, &mut Heap<T>) -> RunResult<R>,
) -> RunResult<R> {
    let mut storage = take_set_storage(heap, id)?;
    let result = f(&mut storage, heap);
    heap.put_back(id, HeapData::Set(Set::new(storage)));
    result
}

/// Materializes any iterable (or set) into set storage for method arguments.
fn storage_from_any(
    value: Value,
    heap: &mut Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<SetStorage> {
    if let Value::Ref(id) = value {
        match heap.get(id) {
            HeapData::Set(s) => return Ok(s.storage().shallow_copy()),
            HeapData::FrozenSet(s) => return Ok(s.storage().shallow_copy()),
            _ => {}
        }
    }
    let items = iterate_to_vec(value, heap, interns)?;
    storage_from_values(items, heap, interns)
}

fn snapshot_storage(id: HeapId, heap: &Heap<impl ResourceTracker>) -> SetStorage {
    match heap.get(id) {
        HeapData::Set(s) => s.storage().shallow_copy(),
        HeapData::FrozenSet(s) => s.storage().shallow_copy(),
        _ => unreachable!("expected set or frozenset"),
    }
}

fn set_algebra_method(
    id: HeapId,
    method: &str,
    args: ArgValues,
    heap: &mut Heap<impl ResourceTracker>,
    interns: &Interns,
    frozen: bool,
) -> RunResult<Option<Value>> {
    args.no_kwargs(method)?;
    let op = match method {
        "union" => Operator::BitOr,
        "intersection" => Operator::BitAnd,
        "difference" => Operator::Sub,
        _ => Operator::BitXor,
    };
    if method == "symmetric_difference" {
        args.check_arity(method, 1, 1)?;
    }
    let mut current = snapshot_storage(id, heap);
    for other in args.pos.iter() {
        let other = storage_from_any(*other, heap, interns)?;
        current = set_algebra(&op, &current, &other, heap, interns)?;
    }
    let data = if frozen {
        HeapData::FrozenSet(FrozenSet::new(current))
    } else {
        HeapData::Set(Set::new(current))
    };
    Ok(Some(Value::Ref(heap.allocate(data)?)))
}

fn set_predicate_method(
    id: HeapId,
    method: &str,
    args: ArgValues,
    heap: &mut Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<Option<Value>> {
    let other = args.exactly_one(method)?;
    let other = storage_from_any(other, heap, interns)?;
    let current = snapshot_storage(id, heap);
    let result = match method {
        "issubset" => current.is_subset(&other, heap, interns)?,
        "issuperset" => other.is_subset(&current, heap, interns)?,
        _ => {
            // isdisjoint
            let mut disjoint = true;
            for entry in current.entries() {
                if other.contains_hashed(entry.value, entry.hash, heap, interns)? {
                    disjoint = false;
                    break;
                }
            }
            disjoint
        }
    };
    Ok(Some(Value::Bool(result)))
}

// === datetime family ===

fn call_date_method(
    id: HeapId,
    method: &str,
    args: ArgValues,
    heap: &mut Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<Option<Value>> {
    let HeapData::Date(date) = heap.get(id) else { unreachable!() };
    let date = *date;
    let result = match method {
        "weekday" => {
            args.exactly_none("weekday")?;
            Value::Int(date.weekday())
        }
        "isoweekday" => {
            args.exactly_none("isoweekday")?;
            Value::Int(date.weekday() + 1)
        }
        "isoformat" => {
            args.exactly_none("isoformat")?;
            heap.alloc_str(datetime::str_date(&date))?
        }
        "toordinal" => {
            args.exactly_none("toordinal")?;
            Value::Int(date.toordinal())
        }
        "replace" => {
            args.reject_unknown_kwargs("replace", &["year", "month", "day"])?;
            args.check_arity("replace", 0, 3)?;
            let year = component_or(&args, 0, "year", i64::from(date.year), heap, interns)?;
            let month = component_or(&args, 1, "month", i64::from(date.month), heap, interns)?;
            let day = component_or(&args, 2, "day", i64::from(date.day), heap, interns)?;
            let replaced = Date::new(
                i32::try_from(year).map_err(|_| ExcType::value_error(format!("year {year} is out of range")))?,
                u8::try_from(month).unwrap_or(u8::MAX),
                u8::try_from(day).unwrap_or(u8::MAX),
            )?;
            Value::Ref(heap.allocate(HeapData::Date(replaced))?)
        }
        _ => return Ok(None),
    };
    Ok(Some(result))
}

fn component_or(
    args: &ArgValues,
    index: usize,
    name: &str,
    default: i64,
    heap: &Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<i64> {
    match args.pos_or_kwarg("replace", index, name)? {
        None => Ok(default),
        Some(v) => v.expect_index(heap, interns, "replace"),
    }
}

fn call_time_method(
    id: HeapId,
    method: &str,
    args: ArgValues,
    heap: &mut Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<Option<Value>> {
    let HeapData::Time(time) = heap.get(id) else { unreachable!() };
    let time = *time;
    let result = match method {
        "isoformat" => {
            args.exactly_none("isoformat")?;
            heap.alloc_str(datetime::str_time(&time, heap))?
        }
        "replace" => {
            args.reject_unknown_kwargs("replace", &["hour", "minute", "second", "microsecond", "tzinfo"])?;
            args.check_arity("replace", 0, 5)?;
            let hour = component_or(&args, 0, "hour", i64::from(time.hour), heap, interns)?;
            let minute = component_or(&args, 1, "minute", i64::from(time.minute), heap, interns)?;
            let second = component_or(&args, 2, "second", i64::from(time.second), heap, interns)?;
            let microsecond = component_or(&args, 3, "microsecond", i64::from(time.microsecond), heap, interns)?;
            let tzinfo = match args.pos_or_kwarg("replace", 4, "tzinfo")? {
                None => time.tzinfo,
                Some(Value::None) => None,
                Some(value) => Some(value),
            };
            let replaced = Time::new(hour, minute, second, microsecond, tzinfo)?;
            Value::Ref(heap.allocate(HeapData::Time(replaced))?)
        }
        _ => return Ok(None),
    };
    Ok(Some(result))
}

fn call_datetime_method(
    id: HeapId,
    method: &str,
    args: ArgValues,
    heap: &mut Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<Option<Value>> {
    let HeapData::DateTime(dt) = heap.get(id) else { unreachable!() };
    let dt = *dt;
    let result = match method {
        "date" => {
            args.exactly_none("date")?;
            Value::Ref(heap.allocate(HeapData::Date(dt.date))?)
        }
        "time" => {
            args.exactly_none("time")?;
            let naive = Time { tzinfo: None, ..dt.time };
            Value::Ref(heap.allocate(HeapData::Time(naive))?)
        }
        "weekday" => {
            args.exactly_none("weekday")?;
            Value::Int(dt.date.weekday())
        }
        "isoweekday" => {
            args.exactly_none("isoweekday")?;
            Value::Int(dt.date.weekday() + 1)
        }
        "toordinal" => {
            args.exactly_none("toordinal")?;
            Value::Int(dt.date.toordinal())
        }
        "isoformat" => {
            args.reject_unknown_kwargs("isoformat", &["sep"])?;
            args.check_arity("isoformat", 0, 1)?;
            let sep = match args.pos_or_kwarg("isoformat", 0, "sep")? {
                None => 'T',
                Some(v) => {
                    let text = value_as_str(&v, heap, interns)
                        .ok_or_else(|| ExcType::type_error("sep must be a 1-character string"))?;
                    let mut chars = text.chars();
                    match (chars.next(), chars.next()) {
                        (Some(c), None) => c,
                        _ => return Err(ExcType::type_error("sep must be a 1-character string")),
                    }
                }
            };
            heap.alloc_str(datetime::isoformat_datetime(&dt, heap, sep))?
        }
        "utcoffset" => {
            args.exactly_none("utcoffset")?;
            match dt.time.utc_offset(heap) {
                Some(offset) => Value::Ref(heap.allocate(HeapData::Timedelta(offset))?),
                None => Value::None,
            }
        }
        "tzname" => {
            args.exactly_none("tzname")?;
            match dt.time.tzinfo {
                Some(Value::Ref(tz_id)) => match heap.get(tz_id) {
                    HeapData::Timezone(tz) => {
                        let name = tz.tzname();
                        heap.alloc_str(name)?
                    }
                    _ => Value::None,
                },
                _ => Value::None,
            }
        }
        "replace" => {
            args.reject_unknown_kwargs(
                "replace",
                &["year", "month", "day", "hour", "minute", "second", "microsecond", "tzinfo"],
            )?;
            args.check_arity("replace", 0, 8)?;
            let year = component_or(&args, 0, "year", i64::from(dt.date.year), heap, interns)?;
            let month = component_or(&args, 1, "month", i64::from(dt.date.month), heap, interns)?;
            let day = component_or(&args, 2, "day", i64::from(dt.date.day), heap, interns)?;
            let hour = component_or(&args, 3, "hour", i64::from(dt.time.hour), heap, interns)?;
            let minute = component_or(&args, 4, "minute", i64::from(dt.time.minute), heap, interns)?;
            let second = component_or(&args, 5, "second", i64::from(dt.time.second), heap, interns)?;
            let microsecond = component_or(&args, 6, "microsecond", i64::from(dt.time.microsecond), heap, interns)?;
            let tzinfo = match args.pos_or_kwarg("replace", 7, "tzinfo")? {
                None => dt.time.tzinfo,
                Some(Value::None) => None,
                Some(value) => Some(value),
            };
            let date = Date::new(
                i32::try_from(year).map_err(|_| ExcType::value_error(format!("year {year} is out of range")))?,
                u8::try_from(month).unwrap_or(u8::MAX),
                u8::try_from(day).unwrap_or(u8::MAX),
            )?;
            let time = Time::new(hour, minute, second, microsecond, tzinfo)?;
            Value::Ref(heap.allocate(HeapData::DateTime(DateTime { date, time }))?)
        }
        _ => return Ok(None),
    };
    Ok(Some(result))
}

fn call_timedelta_method(
    id: HeapId,
    method: &str,
    args: ArgValues,
    heap: &mut Heap<impl ResourceTracker>,
) -> RunResult<Option<Value>> {
    let HeapData::Timedelta(td) = heap.get(id) else { unreachable!() };
    let td = *td;
    match method {
        "total_seconds" => {
            args.exactly_none("total_seconds")?;
            Ok(Some(Value::Float(td.total_seconds())))
        }
        _ => Ok(None),
    }
}

fn call_timezone_method(
    id: HeapId,
    method: &str,
    args: ArgValues,
    heap: &mut Heap<impl ResourceTracker>,
) -> RunResult<Option<Value>> {
    let HeapData::Timezone(tz) = heap.get(id) else { unreachable!() };
    let offset = tz.offset();
    let name = tz.tzname();
    match method {
        "utcoffset" => {
            args.no_kwargs("utcoffset")?;
            args.check_arity("utcoffset", 1, 1)?;
            Ok(Some(Value::Ref(heap.allocate(HeapData::Timedelta(offset))?)))
        }
        "tzname" => {
            args.no_kwargs("tzname")?;
            args.check_arity("tzname", 1, 1)?;
            Ok(Some(heap.alloc_str(name)?))
        }
        _ => Ok(None),
    }
}

