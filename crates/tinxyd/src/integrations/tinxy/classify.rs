//! Maps a vendor type code and channel index to an entity kind.

use crate::engine::Kind;

/// Type codes whose first channel drives a fan.
pub const FAN_TYPES: &[&str] = &["WIFI_3SWITCH_1FAN", "Fan", "WIFI_SWITCH_1FAN_V1"];

/// Type codes that are always lights.
pub const LIGHT_TYPES: &[&str] = &["Tubelight", "LED Bulb"];

/// Lock device types. Matching ones are still classified as switches.
pub const LOCK_GTYPES: &[&str] = &["action.devices.types.LOCK"];

/// Classify one channel. Total: unknown types fall back to [`Kind::Switch`].
///
/// The lock rule compares the *type code* against lock gtypes and yields a
/// switch. Lock behaviour is derived from the entity's `gtype` instead (see
/// `Catalog::locks`). Kept as-is until the vendor confirms the intent.
#[allow(clippy::if_same_then_else)]
pub fn classify(tinxy_type: &str, channel_index: usize) -> Kind {
    if FAN_TYPES.contains(&tinxy_type) && channel_index == 0 {
        Kind::Fan
    } else if LIGHT_TYPES.contains(&tinxy_type) {
        Kind::Light
    } else if LOCK_GTYPES.contains(&tinxy_type) {
        Kind::Switch
    } else {
        Kind::Switch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fan_only_on_first_channel() {
        for t in FAN_TYPES {
            assert_eq!(classify(t, 0), Kind::Fan, "{}", t);
            for i in 1..6 {
                assert_ne!(classify(t, i), Kind::Fan, "{} channel {}", t, i);
            }
        }
    }

    #[test]
    fn test_light_types() {
        assert_eq!(classify("Tubelight", 0), Kind::Light);
        assert_eq!(classify("LED Bulb", 3), Kind::Light);
    }

    #[test]
    fn test_lock_gtype_is_switch() {
        assert_eq!(classify("action.devices.types.LOCK", 0), Kind::Switch);
    }

    #[test]
    fn test_unknown_defaults_to_switch() {
        assert_eq!(classify("WIFI_4SWITCH", 0), Kind::Switch);
        assert_eq!(classify("", 0), Kind::Switch);
        assert_eq!(classify("WIFI_3SWITCH_1FAN_V3", 0), Kind::Switch);
    }
}
