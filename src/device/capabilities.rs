//! Capability catalogue.
//!
//! Each unit struct here is a [`CapabilitySpec`]: the action names it owns,
//! the value handed to the application, and the JSON mapping both ways.
//! Use them through the aliases at the bottom, e.g.
//! `PowerStateController::new()`.
//!
//! | Capability          | Set / adjust actions                                   | Value           |
//! |---------------------|--------------------------------------------------------|-----------------|
//! | `PowerState`        | setPowerState                                          | `bool`          |
//! | `PowerLevel`        | setPowerLevel / adjustPowerLevel                       | `i32`           |
//! | `Brightness`        | setBrightness / adjustBrightness                       | `i32`           |
//! | `Color`             | setColor                                               | [`Rgb`]         |
//! | `ColorTemperature`  | setColorTemperature / increase… decrease…              | `i32`           |
//! | `Percentage`        | setPercentage / adjustPercentage                       | `i32`           |
//! | `RangeValue`        | setRangeValue / adjustRangeValue                       | `i32`           |
//! | `Mode`              | setMode                                                | `String`        |
//! | `ToggleState`       | setToggleState                                         | `bool`          |
//! | `Volume`            | setVolume / adjustVolume                               | `i32`           |
//! | `Mute`              | setMute                                                | `bool`          |
//! | `Equalizer`         | setBands, resetBands / adjustBands                     | [`Bands`]       |
//! | `InputSelect`       | selectInput                                            | `String`        |
//! | `MediaControl`      | mediaControl                                           | `String`        |
//! | `Thermostat`        | setThermostatMode                                      | [`ThermostatMode`] |
//! | `TargetTemperature` | targetTemperature / adjustTargetTemperature            | `f32`           |
//! | `LockState`         | setLockState                                           | `bool` (locked) |
//! | `Temperature`       | event only: currentTemperature                         | [`Climate`]     |
//! | `ContactState`      | event only: setContactState                            | `bool` (open)   |
//! | `Motion`            | event only: motion                                     | `bool`          |
//! | `Doorbell`          | event only: DoorbellPress                              | `()`            |

use heapless::Vec as HVec;
use serde_json::{Map, Value, json};

use super::controller::{CapabilitySpec, Controller};
use crate::protocol::rate_limit::RateLimitPreset;

// ── Field helpers ────────────────────────────────────────────

fn int_field(value: &Value, key: &str) -> Option<i32> {
    let v = value.get(key)?;
    let n = v
        .as_i64()
        .or_else(|| v.as_f64().filter(|f| f.is_finite()).map(|f| f.round() as i64))?;
    i32::try_from(n).ok()
}

fn float_field(value: &Value, key: &str) -> Option<f32> {
    value
        .get(key)?
        .as_f64()
        .filter(|f| f.is_finite())
        .map(|f| f as f32)
}

fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key)?.as_str()
}

/// Map a string field onto `(true_word, false_word)`, case-insensitively.
fn word_field(value: &Value, key: &str, words: (&str, &str)) -> Option<bool> {
    let s = str_field(value, key)?;
    if s.eq_ignore_ascii_case(words.0) {
        Some(true)
    } else if s.eq_ignore_ascii_case(words.1) {
        Some(false)
    } else {
        None
    }
}

fn on_off(on: bool) -> &'static str {
    if on { "On" } else { "Off" }
}

// ── Switches and levels ──────────────────────────────────────

pub struct PowerState;

impl CapabilitySpec for PowerState {
    type Value = bool;
    const NAME: &'static str = "powerState";
    const SET_ACTIONS: &'static [&'static str] = &["setPowerState"];
    const EVENT_ACTION: &'static str = "setPowerState";

    fn decode(_: &str, value: &Value) -> Option<bool> {
        word_field(value, "state", ("On", "Off"))
    }

    fn encode(on: &bool) -> Value {
        json!({ "state": on_off(*on) })
    }
}

/// Declare a numeric level capability with a set key and an adjust delta key.
macro_rules! level_capability {
    ($(#[$doc:meta])* $name:ident, $label:literal, $set:literal, $adjust:literal, $key:literal, $delta:literal) => {
        $(#[$doc])*
        pub struct $name;

        impl CapabilitySpec for $name {
            type Value = i32;
            const NAME: &'static str = $label;
            const SET_ACTIONS: &'static [&'static str] = &[$set];
            const ADJUST_ACTIONS: &'static [&'static str] = &[$adjust];
            const EVENT_ACTION: &'static str = $set;

            fn decode(_: &str, value: &Value) -> Option<i32> {
                int_field(value, $key)
            }

            fn decode_adjust(_: &str, value: &Value) -> Option<i32> {
                int_field(value, $delta)
            }

            fn encode(level: &i32) -> Value {
                json!({ $key: *level })
            }
        }
    };
}

level_capability!(PowerLevel, "powerLevel", "setPowerLevel", "adjustPowerLevel", "powerLevel", "powerLevelDelta");
level_capability!(Brightness, "brightness", "setBrightness", "adjustBrightness", "brightness", "brightnessDelta");
level_capability!(Percentage, "percentage", "setPercentage", "adjustPercentage", "percentage", "percentage");
level_capability!(
    /// Generic range; usually bound to an instance id.
    RangeValue, "rangeValue", "setRangeValue", "adjustRangeValue", "rangeValue", "rangeValueDelta"
);
level_capability!(Volume, "volume", "setVolume", "adjustVolume", "volume", "volume");

// ── Light colour ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

pub struct Color;

impl CapabilitySpec for Color {
    type Value = Rgb;
    const NAME: &'static str = "color";
    const SET_ACTIONS: &'static [&'static str] = &["setColor"];
    const EVENT_ACTION: &'static str = "setColor";

    fn decode(_: &str, value: &Value) -> Option<Rgb> {
        let c = value.get("color")?;
        let channel = |k: &str| int_field(c, k).and_then(|n| u8::try_from(n).ok());
        Some(Rgb {
            r: channel("r")?,
            g: channel("g")?,
            b: channel("b")?,
        })
    }

    fn encode(c: &Rgb) -> Value {
        json!({ "color": { "r": c.r, "g": c.g, "b": c.b } })
    }
}

/// White temperature in Kelvin. The increase/decrease actions arrive as an
/// adjust with delta `+1` / `-1`; the callback picks the next step.
pub struct ColorTemperature;

impl CapabilitySpec for ColorTemperature {
    type Value = i32;
    const NAME: &'static str = "colorTemperature";
    const SET_ACTIONS: &'static [&'static str] = &["setColorTemperature"];
    const ADJUST_ACTIONS: &'static [&'static str] =
        &["increaseColorTemperature", "decreaseColorTemperature"];
    const EVENT_ACTION: &'static str = "setColorTemperature";

    fn decode(_: &str, value: &Value) -> Option<i32> {
        int_field(value, "colorTemperature")
    }

    fn decode_adjust(action: &str, _: &Value) -> Option<i32> {
        match action {
            "increaseColorTemperature" => Some(1),
            "decreaseColorTemperature" => Some(-1),
            _ => None,
        }
    }

    fn encode(kelvin: &i32) -> Value {
        json!({ "colorTemperature": *kelvin })
    }
}

// ── Modes and toggles ────────────────────────────────────────

/// Declare a capability carrying a single free-form string.
macro_rules! text_capability {
    ($(#[$doc:meta])* $name:ident, $label:literal, $action:literal, $key:literal) => {
        $(#[$doc])*
        pub struct $name;

        impl CapabilitySpec for $name {
            type Value = String;
            const NAME: &'static str = $label;
            const SET_ACTIONS: &'static [&'static str] = &[$action];
            const EVENT_ACTION: &'static str = $action;

            fn decode(_: &str, value: &Value) -> Option<String> {
                str_field(value, $key).map(Into::into)
            }

            fn encode(s: &String) -> Value {
                json!({ $key: s })
            }
        }
    };
}

text_capability!(
    /// Named mode; usually bound to an instance id.
    Mode, "mode", "setMode", "mode"
);
text_capability!(InputSelect, "input", "selectInput", "input");
text_capability!(
    /// Transport control word (`Play`, `Pause`, `Next`, …) passed through as sent.
    MediaControl, "mediaControl", "mediaControl", "control"
);

pub struct ToggleState;

impl CapabilitySpec for ToggleState {
    type Value = bool;
    const NAME: &'static str = "toggleState";
    const SET_ACTIONS: &'static [&'static str] = &["setToggleState"];
    const EVENT_ACTION: &'static str = "setToggleState";

    fn decode(_: &str, value: &Value) -> Option<bool> {
        word_field(value, "state", ("On", "Off"))
    }

    fn encode(on: &bool) -> Value {
        json!({ "state": on_off(*on) })
    }
}

pub struct Mute;

impl CapabilitySpec for Mute {
    type Value = bool;
    const NAME: &'static str = "mute";
    const SET_ACTIONS: &'static [&'static str] = &["setMute"];
    const EVENT_ACTION: &'static str = "setMute";

    fn decode(_: &str, value: &Value) -> Option<bool> {
        value.get("mute")?.as_bool()
    }

    fn encode(muted: &bool) -> Value {
        json!({ "mute": *muted })
    }
}

// ── Equalizer ────────────────────────────────────────────────

pub const MAX_BANDS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandName {
    Bass,
    Midrange,
    Treble,
}

impl BandName {
    fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "BASS" => Some(Self::Bass),
            "MIDRANGE" => Some(Self::Midrange),
            "TREBLE" => Some(Self::Treble),
            _ => None,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Bass => "BASS",
            Self::Midrange => "MIDRANGE",
            Self::Treble => "TREBLE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Band {
    pub name: BandName,
    /// Absolute level for set/reset, signed delta for adjust.
    pub level: i32,
}

pub type Bands = HVec<Band, MAX_BANDS>;

/// Equalizer bands. `resetBands` decodes as a set to level 0.
pub struct Equalizer;

impl Equalizer {
    fn bands(value: &Value, level: impl Fn(&Value) -> Option<i32>) -> Option<Bands> {
        let mut out = Bands::new();
        for entry in value.get("bands")?.as_array()? {
            let name = BandName::parse(str_field(entry, "name")?)?;
            out.push(Band {
                name,
                level: level(entry)?,
            })
            .ok()?;
        }
        (!out.is_empty()).then_some(out)
    }
}

impl CapabilitySpec for Equalizer {
    type Value = Bands;
    const NAME: &'static str = "equalizer";
    const SET_ACTIONS: &'static [&'static str] = &["setBands", "resetBands"];
    const ADJUST_ACTIONS: &'static [&'static str] = &["adjustBands"];
    const EVENT_ACTION: &'static str = "setBands";

    fn decode(action: &str, value: &Value) -> Option<Bands> {
        if action == "resetBands" {
            Self::bands(value, |_| Some(0))
        } else {
            Self::bands(value, |e| int_field(e, "value"))
        }
    }

    fn decode_adjust(_: &str, value: &Value) -> Option<Bands> {
        Self::bands(value, |e| {
            let delta = int_field(e, "levelDelta")?;
            match str_field(e, "levelDirection") {
                Some(d) if d.eq_ignore_ascii_case("DOWN") => delta.checked_neg(),
                Some(d) if d.eq_ignore_ascii_case("UP") => Some(delta),
                None => Some(delta),
                Some(_) => None,
            }
        })
    }

    fn encode(bands: &Bands) -> Value {
        let list: Vec<Value> = bands
            .iter()
            .map(|b| json!({ "name": b.name.as_str(), "value": b.level }))
            .collect();
        json!({ "bands": list })
    }
}

// ── Climate ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThermostatMode {
    Auto,
    Cool,
    Heat,
    Eco,
    Off,
}

impl ThermostatMode {
    fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "AUTO" => Some(Self::Auto),
            "COOL" => Some(Self::Cool),
            "HEAT" => Some(Self::Heat),
            "ECO" => Some(Self::Eco),
            "OFF" => Some(Self::Off),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "AUTO",
            Self::Cool => "COOL",
            Self::Heat => "HEAT",
            Self::Eco => "ECO",
            Self::Off => "OFF",
        }
    }
}

pub struct Thermostat;

impl CapabilitySpec for Thermostat {
    type Value = ThermostatMode;
    const NAME: &'static str = "thermostatMode";
    const SET_ACTIONS: &'static [&'static str] = &["setThermostatMode"];
    const EVENT_ACTION: &'static str = "setThermostatMode";

    fn decode(_: &str, value: &Value) -> Option<ThermostatMode> {
        ThermostatMode::parse(str_field(value, "thermostatMode")?)
    }

    fn encode(mode: &ThermostatMode) -> Value {
        json!({ "thermostatMode": mode.as_str() })
    }
}

pub struct TargetTemperature;

impl CapabilitySpec for TargetTemperature {
    type Value = f32;
    const NAME: &'static str = "targetTemperature";
    const SET_ACTIONS: &'static [&'static str] = &["targetTemperature"];
    const ADJUST_ACTIONS: &'static [&'static str] = &["adjustTargetTemperature"];
    const EVENT_ACTION: &'static str = "targetTemperature";

    fn decode(_: &str, value: &Value) -> Option<f32> {
        float_field(value, "temperature")
    }

    fn decode_adjust(_: &str, value: &Value) -> Option<f32> {
        float_field(value, "temperature")
    }

    fn encode(t: &f32) -> Value {
        json!({ "temperature": *t })
    }
}

/// Sensor reading; `humidity` is reported as `-1` when absent.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Climate {
    pub temperature: f32,
    pub humidity: Option<f32>,
}

pub struct Temperature;

impl CapabilitySpec for Temperature {
    type Value = Climate;
    const NAME: &'static str = "temperatureSensor";
    const SET_ACTIONS: &'static [&'static str] = &[];
    const EVENT_ACTION: &'static str = "currentTemperature";
    const PRESET: RateLimitPreset = RateLimitPreset::Sensor;

    fn decode(_: &str, _: &Value) -> Option<Climate> {
        None
    }

    fn encode(c: &Climate) -> Value {
        let mut m = Map::new();
        m.insert("temperature".into(), json!(c.temperature));
        m.insert("humidity".into(), json!(c.humidity.unwrap_or(-1.0)));
        Value::Object(m)
    }
}

// ── Locks and binary sensors ─────────────────────────────────

/// Lock; value is `true` for locked. Requests say `lock`/`unlock`,
/// responses and events report `LOCKED`/`UNLOCKED`.
pub struct LockState;

impl CapabilitySpec for LockState {
    type Value = bool;
    const NAME: &'static str = "lockState";
    const SET_ACTIONS: &'static [&'static str] = &["setLockState"];
    const EVENT_ACTION: &'static str = "setLockState";

    fn decode(_: &str, value: &Value) -> Option<bool> {
        word_field(value, "state", ("lock", "unlock"))
            .or_else(|| word_field(value, "state", ("LOCKED", "UNLOCKED")))
    }

    fn encode(locked: &bool) -> Value {
        json!({ "state": if *locked { "LOCKED" } else { "UNLOCKED" } })
    }
}

/// Declare an event-only binary sensor.
macro_rules! binary_sensor {
    ($(#[$doc:meta])* $name:ident, $label:literal, $action:literal, $on:literal, $off:literal) => {
        $(#[$doc])*
        pub struct $name;

        impl CapabilitySpec for $name {
            type Value = bool;
            const NAME: &'static str = $label;
            const SET_ACTIONS: &'static [&'static str] = &[];
            const EVENT_ACTION: &'static str = $action;

            fn decode(_: &str, _: &Value) -> Option<bool> {
                None
            }

            fn encode(active: &bool) -> Value {
                json!({ "state": if *active { $on } else { $off } })
            }
        }
    };
}

binary_sensor!(
    /// `true` when open.
    ContactState, "contactSensor", "setContactState", "open", "closed"
);
binary_sensor!(Motion, "motionSensor", "motion", "detected", "notDetected");

pub struct Doorbell;

impl CapabilitySpec for Doorbell {
    type Value = ();
    const NAME: &'static str = "doorbell";
    const SET_ACTIONS: &'static [&'static str] = &[];
    const EVENT_ACTION: &'static str = "DoorbellPress";

    fn decode(_: &str, _: &Value) -> Option<()> {
        None
    }

    fn encode(_: &()) -> Value {
        json!({ "state": "pressed" })
    }
}

// ── Controller aliases ───────────────────────────────────────

pub type PowerStateController = Controller<PowerState>;
pub type PowerLevelController = Controller<PowerLevel>;
pub type BrightnessController = Controller<Brightness>;
pub type ColorController = Controller<Color>;
pub type ColorTemperatureController = Controller<ColorTemperature>;
pub type PercentageController = Controller<Percentage>;
pub type RangeController = Controller<RangeValue>;
pub type ModeController = Controller<Mode>;
pub type ToggleController = Controller<ToggleState>;
pub type VolumeController = Controller<Volume>;
pub type MuteController = Controller<Mute>;
pub type EqualizerController = Controller<Equalizer>;
pub type InputController = Controller<InputSelect>;
pub type MediaController = Controller<MediaControl>;
pub type ThermostatController = Controller<Thermostat>;
pub type TargetTemperatureController = Controller<TargetTemperature>;
pub type LockController = Controller<LockState>;
pub type TemperatureSensor = Controller<Temperature>;
pub type ContactSensor = Controller<ContactState>;
pub type MotionSensor = Controller<Motion>;
pub type DoorbellButton = Controller<Doorbell>;
