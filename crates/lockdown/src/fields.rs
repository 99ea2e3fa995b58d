//! Typed access to lockdown property bags.
//!
//! Every accessor is total: a missing key and a value of the wrong type both
//! come back as `None`, so a device reporting a partial or unexpected schema
//! never stops the remaining fields from being read.

use plist::Value;

use crate::types::PropertyBag;

pub const DEVICE_CLASS: &str = "DeviceClass";
pub const PRODUCT_NAME: &str = "ProductName";
pub const PRODUCT_VERSION: &str = "ProductVersion";
pub const DEVICE_NAME: &str = "DeviceName";
pub const MEID: &str = "MobileEquipmentIdentifier";
pub const IMEI: &str = "InternationalMobileEquipmentIdentity";
pub const DEVICE_COLOR: &str = "DeviceColor";
pub const PHONE_NUMBER: &str = "PhoneNumber";
pub const ACTIVATION_STATE: &str = "ActivationState";
pub const PASSWORD_PROTECTED: &str = "PasswordProtected";
pub const TOTAL_DISK_CAPACITY: &str = "TotalDiskCapacity";
pub const AMOUNT_DATA_AVAILABLE: &str = "AmountDataAvailable";
pub const BATTERY_CURRENT_CAPACITY: &str = "BatteryCurrentCapacity";

/// Looks up `field` in `bag`.
pub fn extract<'a>(bag: &'a PropertyBag, field: &str) -> Option<&'a Value> {
    bag.get(field)
}

/// Returns `field` if it holds a string.
pub fn extract_string(bag: &PropertyBag, field: &str) -> Option<String> {
    extract(bag, field)
        .and_then(Value::as_string)
        .map(str::to_owned)
}

/// Returns `field` if it holds an integer representable as `i64`.
pub fn extract_int(bag: &PropertyBag, field: &str) -> Option<i64> {
    let value = extract(bag, field)?;
    value.as_signed_integer().or_else(|| {
        value
            .as_unsigned_integer()
            .and_then(|v| i64::try_from(v).ok())
    })
}

/// Returns `field` if it holds a boolean.
pub fn extract_bool(bag: &PropertyBag, field: &str) -> Option<bool> {
    extract(bag, field).and_then(Value::as_boolean)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bag() -> PropertyBag {
        let mut bag = PropertyBag::new();
        bag.insert(DEVICE_NAME.into(), Value::String("Kim's iPhone".into()));
        bag.insert(TOTAL_DISK_CAPACITY.into(), Value::Integer(64_000_000_000i64.into()));
        bag.insert(AMOUNT_DATA_AVAILABLE.into(), Value::Integer(u64::MAX.into()));
        bag.insert(PASSWORD_PROTECTED.into(), Value::Boolean(true));
        bag
    }

    #[test]
    fn string_field() {
        assert_eq!(
            extract_string(&bag(), DEVICE_NAME).as_deref(),
            Some("Kim's iPhone")
        );
    }

    #[test]
    fn int_field() {
        assert_eq!(extract_int(&bag(), TOTAL_DISK_CAPACITY), Some(64_000_000_000));
    }

    #[test]
    fn unsigned_overflow_is_none() {
        assert_eq!(extract_int(&bag(), AMOUNT_DATA_AVAILABLE), None);
    }

    #[test]
    fn bool_field() {
        assert_eq!(extract_bool(&bag(), PASSWORD_PROTECTED), Some(true));
    }

    #[test]
    fn missing_fields_are_none() {
        let bag = bag();
        assert!(extract(&bag, IMEI).is_none());
        assert!(extract_string(&bag, IMEI).is_none());
        assert!(extract_int(&bag, BATTERY_CURRENT_CAPACITY).is_none());
        assert!(extract_bool(&bag, ACTIVATION_STATE).is_none());
    }

    #[test]
    fn type_mismatch_is_none() {
        let bag = bag();
        assert!(extract_string(&bag, TOTAL_DISK_CAPACITY).is_none());
        assert!(extract_int(&bag, DEVICE_NAME).is_none());
        assert!(extract_bool(&bag, DEVICE_NAME).is_none());
    }

    #[test]
    fn empty_bag() {
        let bag = PropertyBag::new();
        assert!(extract_string(&bag, DEVICE_CLASS).is_none());
    }
}
