#![no_main]

use arbitrary::{Arbitrary, Unstructured};
use libfuzzer_sys::fuzz_target;
use metaschema_constraints::DataType;

const ALL: [DataType; 22] = [
    DataType::String,
    DataType::Token,
    DataType::NcName,
    DataType::Integer,
    DataType::PositiveInteger,
    DataType::NonNegativeInteger,
    DataType::Decimal,
    DataType::Boolean,
    DataType::Date,
    DataType::DateTime,
    DataType::DateWithTimezone,
    DataType::DateTimeWithTimezone,
    DataType::Uuid,
    DataType::Uri,
    DataType::UriReference,
    DataType::EmailAddress,
    DataType::Hostname,
    DataType::IpV4Address,
    DataType::IpV6Address,
    DataType::Base64,
    DataType::DayTimeDuration,
    DataType::YearMonthDuration,
];

fuzz_target!(|data: &[u8]| {
    let mut u = Unstructured::new(data);
    let Ok(index) = u.choose_index(ALL.len()) else {
        return;
    };
    let Ok(value) = String::arbitrary(&mut u) else {
        return;
    };
    let _ = ALL[index].validate(&value);
});
