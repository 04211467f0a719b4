use metaschema_constraints::DataType;
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn integers_are_integers(n in any::<i64>()) {
        prop_assert!(DataType::Integer.validate(&n.to_string()).is_ok());
        prop_assert_eq!(
            DataType::NonNegativeInteger.validate(&n.to_string()).is_ok(),
            n >= 0
        );
        prop_assert_eq!(
            DataType::PositiveInteger.validate(&n.to_string()).is_ok(),
            n > 0
        );
    }

    #[test]
    fn wide_integers_keep_their_sign(digits in "[1-9][0-9]{40,80}") {
        prop_assert!(DataType::PositiveInteger.validate(&digits).is_ok());
        let negative = format!("-{}", digits);
        prop_assert!(DataType::Integer.validate(&negative).is_ok());
        prop_assert!(DataType::NonNegativeInteger.validate(&negative).is_err());
    }

    #[test]
    fn decimals_accept_fractions(whole in any::<i32>(), frac in 0u32..1_000_000) {
        let text = format!("{}.{}", whole, frac);
        prop_assert!(DataType::Decimal.validate(&text).is_ok());
        prop_assert!(DataType::Integer.validate(&text).is_err());
    }

    #[test]
    fn generated_uuids_are_uuids(bytes in any::<[u8; 16]>()) {
        let text = uuid::Uuid::from_bytes(bytes).to_string();
        prop_assert!(DataType::Uuid.validate(&text).is_ok());
    }

    #[test]
    fn ipv4_addresses_validate(octets in any::<[u8; 4]>()) {
        let text = std::net::Ipv4Addr::from(octets).to_string();
        prop_assert!(DataType::IpV4Address.validate(&text).is_ok());
        prop_assert!(DataType::IpV6Address.validate(&text).is_err());
    }

    #[test]
    fn validation_never_panics(input in "\\PC{0,24}") {
        for datatype in [
            DataType::Date,
            DataType::DateTimeWithTimezone,
            DataType::Base64,
            DataType::Uri,
            DataType::DayTimeDuration,
            DataType::Hostname,
        ] {
            let _ = datatype.validate(&input);
        }
    }
}
