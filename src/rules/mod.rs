//! Rule dispatcher - which decode routine handles which report.
//!
//! Each [`Rule`] pairs a predicate over `(cluster, report kind, model,
//! device class, endpoint)` with a decode function. [`RuleTable::standard`]
//! lists the rules in a fixed order and every matching rule fires: a
//! `lumi.ctrl_ln1` relay is both a plug and a generic on/off device, an
//! `aq2` button reports its battery on the same device it reports presses on.
//!
//! Rules run under [`with_recovery`], so one rule panicking on a message
//! costs that rule's output only.

use tokio::time::Instant;

use crate::decode::{cube, occupancy, press, sensors, switches, Decoded};
use crate::engine::state::DeviceState;
use crate::engine::with_recovery;
use crate::message::{NormalizedMessage, ReportKind};
use crate::types::TimingConfig;

/// Model of the WXKG11LM push button.
pub const PUSH_BUTTON_MODEL: &str = "lumi.sensor_switch.aq2";
/// Device class reported by Xiaomi push buttons.
pub const PUSH_BUTTON_CLASS: u32 = 260;

/// Everything a decode function may look at or change.
#[derive(Debug)]
pub struct DecodeContext<'a> {
    pub msg: &'a NormalizedMessage,
    pub state: &'a mut DeviceState,
    pub timing: &'a TimingConfig,
    /// Arrival time of the message.
    pub now: Instant,
}

pub type DecodeFn = fn(&mut DecodeContext<'_>) -> Decoded;
pub type GuardFn = fn(&NormalizedMessage) -> bool;

/// Substring patterns over the free-form model id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelPattern {
    Any,
    Contains(&'static str),
    AnyOf(&'static [&'static str]),
    Exact(&'static str),
}

impl ModelPattern {
    pub fn matches(&self, model: &str) -> bool {
        match self {
            ModelPattern::Any => true,
            ModelPattern::Contains(p) => model.contains(p),
            ModelPattern::AnyOf(ps) => ps.iter().any(|p| model.contains(p)),
            ModelPattern::Exact(m) => model == *m,
        }
    }
}

/// One row of the rule table.
#[derive(Debug, Clone)]
pub struct Rule {
    pub name: &'static str,
    /// `None` matches every cluster.
    pub cluster: Option<&'static str>,
    pub kind: ReportKind,
    pub model: ModelPattern,
    /// Extra predicate evaluated after cluster, kind and model.
    pub guard: GuardFn,
    pub decode: DecodeFn,
}

fn always(_: &NormalizedMessage) -> bool {
    true
}

impl Rule {
    /// Attribute-report rule on every cluster and model.
    pub fn new(name: &'static str, decode: DecodeFn) -> Self {
        Self {
            name,
            cluster: None,
            kind: ReportKind::AttributeReport,
            model: ModelPattern::Any,
            guard: always,
            decode,
        }
    }

    /// Attribute-report rule on one cluster, any model.
    pub fn on_cluster(name: &'static str, cluster: &'static str, decode: DecodeFn) -> Self {
        Self {
            cluster: Some(cluster),
            ..Self::new(name, decode)
        }
    }

    pub fn with_kind(mut self, kind: ReportKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_model(mut self, model: ModelPattern) -> Self {
        self.model = model;
        self
    }

    pub fn with_guard(mut self, guard: GuardFn) -> Self {
        self.guard = guard;
        self
    }

    pub fn matches(&self, msg: &NormalizedMessage) -> bool {
        self.cluster.map_or(true, |c| c == msg.cluster_id)
            && self.kind == msg.kind
            && self.model.matches(&msg.model_id)
            && (self.guard)(msg)
    }
}

/// Outcome of dispatching one message.
#[derive(Debug, Default)]
pub struct Dispatch {
    /// Names of the rules that matched, in table order.
    pub matched: Vec<&'static str>,
    /// Merged output of every rule that completed.
    pub decoded: Decoded,
    /// Rules that panicked or failed.
    pub failures: usize,
}

/// Ordered list of rules.
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    rules: Vec<Rule>,
}

impl RuleTable {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// The Xiaomi/Aqara rule set.
    pub fn standard() -> Self {
        Self::new(vec![
            Rule::on_cluster("ias_zone", "ssIasZone", |cx| sensors::ias_zone(cx.msg))
                .with_kind(ReportKind::StatusChange),
            Rule::on_cluster("color_temperature", "lightingColorCtrl", |cx| {
                sensors::color_temperature(cx.msg)
            }),
            Rule::on_cluster("level", "genLevelCtrl", |cx| sensors::level(cx.msg)),
            Rule::on_cluster("battery", "genBasic", |cx| sensors::battery(cx.msg)),
            Rule::on_cluster("light_state", "genOnOff", |cx| switches::output_state(cx.msg))
                .with_model(ModelPattern::AnyOf(&LIGHT_MODELS)),
            Rule::on_cluster("magnet_contact", "genOnOff", |cx| switches::magnet_contact(cx.msg))
                .with_model(ModelPattern::Contains(MAGNET_MODEL)),
            Rule::on_cluster("plug_state", "genOnOff", |cx| switches::output_state(cx.msg))
                .with_model(ModelPattern::AnyOf(&PLUG_MODELS)),
            Rule::on_cluster("wall_switch_86sw2", "genOnOff", |cx| {
                switches::wall_switch_86sw2(cx.msg, cx.timing.pulse_hold)
            })
            .with_model(ModelPattern::Contains(SW2_MODEL)),
            Rule::on_cluster("wall_switch_neutral2", "genOnOff", |cx| {
                switches::wall_switch_neutral2(cx.msg)
            })
            .with_model(ModelPattern::Contains(NEUTRAL2_MODEL)),
            Rule::on_cluster("generic_on_off", "genOnOff", |cx| {
                switches::generic_on_off(cx.msg, cx.timing.pulse_hold)
            })
            .with_guard(is_generic_on_off),
            Rule::on_cluster("temperature", "msTemperatureMeasurement", |cx| {
                sensors::temperature(cx.msg)
            }),
            Rule::on_cluster("humidity", "msRelativeHumidity", |cx| sensors::humidity(cx.msg)),
            Rule::on_cluster("pressure", "msPressureMeasurement", |cx| sensors::pressure(cx.msg)),
            Rule::on_cluster("occupancy", "msOccupancySensing", decode_occupancy),
            Rule::on_cluster("illuminance", "msIlluminanceMeasurement", |cx| {
                sensors::illuminance(cx.msg)
            }),
            Rule::on_cluster("cube_gesture", "genMultistateInput", |cx| {
                cube::decode_gesture(cx.msg, cx.timing.pulse_hold)
            }),
            Rule::on_cluster("cube_rotation", "genAnalogInput", |cx| {
                cube::decode_rotation(cx.msg, cx.timing.pulse_hold)
            })
            .with_guard(|msg| msg.integer("65285") == Some(cube::ROTATION_TAG)),
            Rule::on_cluster("load_power", "genAnalogInput", |cx| switches::load_power(cx.msg))
                .with_model(ModelPattern::AnyOf(&POWER_MODELS)),
            Rule::new("switch_press", decode_press).with_guard(is_push_button),
        ])
    }

    pub fn push(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name).collect()
    }

    /// Rules matching `msg`, in table order.
    pub fn matching<'a>(&'a self, msg: &'a NormalizedMessage) -> impl Iterator<Item = &'a Rule> + 'a {
        self.rules.iter().filter(move |r| r.matches(msg))
    }

    /// Run every matching rule against `cx` and merge their output.
    pub fn dispatch(&self, cx: &mut DecodeContext<'_>) -> Dispatch {
        let mut dispatch = Dispatch::default();
        let msg = cx.msg;

        for rule in self.matching(msg) {
            dispatch.matched.push(rule.name);
            match with_recovery(|| Ok((rule.decode)(cx)), rule.name) {
                Ok(decoded) => dispatch.decoded.extend(decoded),
                Err(e) => {
                    dispatch.failures += 1;
                    tracing::warn!(
                        device = %msg.device_id,
                        rule = rule.name,
                        error = %e,
                        "rule_failed"
                    );
                }
            }
        }
        dispatch
    }
}

// =============================================================================
// Model families
// =============================================================================

const LIGHT_MODELS: [&str; 2] = ["TRADFRI bulb", "FLOALT panel WS"];
const MAGNET_MODEL: &str = "lumi.sensor_magnet";
const PLUG_MODELS: [&str; 3] = ["lumi.plug", "lumi.ctrl_ln1", "lumi.ctrl_86plug"];
const SW2_MODEL: &str = "lumi.sensor_86sw2";
const NEUTRAL2_MODEL: &str = "lumi.ctrl_neutral2";
const POWER_MODELS: [&str; 3] = ["lumi.plug", "lumi.ctrl_ln", "lumi.ctrl_86plug"];

/// Models with their own on/off rule. `lumi.ctrl_ln1` is missing on purpose:
/// it keeps the generic `click` alongside its `state`.
const CLAIMED_ON_OFF_MODELS: [&str; 7] = [
    "TRADFRI bulb",
    "FLOALT panel WS",
    MAGNET_MODEL,
    "lumi.plug",
    "lumi.ctrl_86plug",
    SW2_MODEL,
    NEUTRAL2_MODEL,
];

/// Xiaomi push buttons: the `aq2` by model, older ones by device class.
///
/// The class fallback needs a reported model, so an unidentified class-260
/// device is not treated as a button.
pub fn is_push_button(msg: &NormalizedMessage) -> bool {
    ModelPattern::Exact(PUSH_BUTTON_MODEL).matches(&msg.model_id)
        || (msg.device_class_id == PUSH_BUTTON_CLASS
            && !msg.model_id.is_empty()
            && !msg.model_contains(MAGNET_MODEL))
}

fn is_generic_on_off(msg: &NormalizedMessage) -> bool {
    !CLAIMED_ON_OFF_MODELS.iter().any(|m| msg.model_contains(m)) && !is_push_button(msg)
}

fn decode_occupancy(cx: &mut DecodeContext<'_>) -> Decoded {
    match cx.msg.integer("occupancy") {
        Some(1) => occupancy::on_motion(&mut cx.state.occupancy, cx.timing),
        _ => Decoded::new(),
    }
}

fn decode_press(cx: &mut DecodeContext<'_>) -> Decoded {
    press::decode_button(cx.msg, &mut cx.state.press, cx.now, cx.timing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StateValue;
    use crate::types::DeviceId;
    use serde_json::json;

    fn msg(model: &str, cluster: &str) -> NormalizedMessage {
        NormalizedMessage::new(DeviceId::must("dev"), model, cluster)
    }

    fn run(table: &RuleTable, msg: &NormalizedMessage) -> (Dispatch, DeviceState) {
        let mut state = DeviceState::default();
        let timing = TimingConfig::default();
        let mut cx = DecodeContext {
            msg,
            state: &mut state,
            timing: &timing,
            now: Instant::now(),
        };
        let dispatch = table.dispatch(&mut cx);
        (dispatch, state)
    }

    #[test]
    fn test_standard_table_order() {
        assert_eq!(
            RuleTable::standard().names(),
            vec![
                "ias_zone",
                "color_temperature",
                "level",
                "battery",
                "light_state",
                "magnet_contact",
                "plug_state",
                "wall_switch_86sw2",
                "wall_switch_neutral2",
                "generic_on_off",
                "temperature",
                "humidity",
                "pressure",
                "occupancy",
                "illuminance",
                "cube_gesture",
                "cube_rotation",
                "load_power",
                "switch_press",
            ]
        );
    }

    #[test]
    fn test_model_patterns() {
        assert!(ModelPattern::Any.matches(""));
        assert!(ModelPattern::Contains("lumi.sensor_magnet").matches("lumi.sensor_magnet.aq2"));
        assert!(ModelPattern::AnyOf(&PLUG_MODELS).matches("lumi.ctrl_86plug.aq1"));
        assert!(!ModelPattern::Exact(PUSH_BUTTON_MODEL).matches("lumi.sensor_switch.aq3"));
    }

    #[test]
    fn test_unknown_cluster_matches_nothing() {
        let table = RuleTable::standard();
        let (dispatch, _) = run(&table, &msg("lumi.weather", "genPowerCfg").with_attr("x", json!(1)));
        assert!(dispatch.matched.is_empty());
        assert!(dispatch.decoded.is_empty());
    }

    #[test]
    fn test_ln1_matches_plug_and_generic() {
        let table = RuleTable::standard();
        let (dispatch, _) = run(&table, &msg("lumi.ctrl_ln1.aq1", "genOnOff").with_attr("onOff", json!(1)));

        assert_eq!(dispatch.matched, vec!["plug_state", "generic_on_off"]);
        assert_eq!(dispatch.decoded.value_of("state"), Some(&StateValue::Bool(true)));
        assert_eq!(dispatch.decoded.value_of("click"), Some(&StateValue::Number(1.0)));
    }

    #[test]
    fn test_magnet_is_not_generic() {
        let table = RuleTable::standard();
        let m = msg("lumi.sensor_magnet.aq2", "genOnOff")
            .with_device_class(PUSH_BUTTON_CLASS)
            .with_attr("onOff", json!(1));
        let (dispatch, _) = run(&table, &m);
        assert_eq!(dispatch.matched, vec!["magnet_contact"]);
    }

    #[test]
    fn test_push_button_battery_and_press() {
        let table = RuleTable::standard();
        let heartbeat = msg(PUSH_BUTTON_MODEL, "genBasic").with_attr("65281", json!({"1": 3100}));
        let (dispatch, _) = run(&table, &heartbeat);
        assert_eq!(dispatch.matched, vec!["battery", "switch_press"]);
        assert_eq!(dispatch.decoded.value_of("battery"), Some(&StateValue::Number(80.0)));

        let (dispatch, state) = run(&table, &msg(PUSH_BUTTON_MODEL, "genOnOff").with_attr("onOff", json!(0)));
        assert_eq!(dispatch.matched, vec!["switch_press"]);
        assert!(state.press.is_some());
    }

    #[test]
    fn test_push_button_by_device_class() {
        assert!(is_push_button(&msg("lumi.sensor_switch", "genOnOff").with_device_class(260)));
        assert!(!is_push_button(&msg("lumi.sensor_switch", "genOnOff")));
        assert!(!is_push_button(&msg("lumi.sensor_magnet", "genOnOff").with_device_class(260)));
    }

    #[test]
    fn test_class_260_without_model_is_not_a_button() {
        let table = RuleTable::standard();
        let unknown = msg("", "genOnOff").with_device_class(PUSH_BUTTON_CLASS).with_attr("onOff", json!(0));
        assert!(!is_push_button(&unknown));

        let (dispatch, state) = run(&table, &unknown);
        assert!(!dispatch.matched.contains(&"switch_press"));
        assert!(state.press.is_none());
    }

    #[test]
    fn test_ias_zone_only_on_status_change() {
        let table = RuleTable::standard();
        let report = msg("lumi.sensor_wleak.aq1", "ssIasZone").with_attr("zoneStatus", json!(1));

        let (dispatch, _) = run(&table, &report);
        assert!(dispatch.matched.is_empty());

        let (dispatch, _) = run(&table, &report.with_kind(ReportKind::StatusChange));
        assert_eq!(dispatch.matched, vec!["ias_zone"]);
        assert_eq!(dispatch.decoded.value_of("detected"), Some(&StateValue::Bool(true)));
    }

    #[test]
    fn test_occupancy_rule_ignores_clear_reports() {
        let table = RuleTable::standard();
        let (dispatch, state) = run(&table, &msg("lumi.sensor_motion", "msOccupancySensing").with_attr("occupancy", json!(0)));
        assert_eq!(dispatch.matched, vec!["occupancy"]);
        assert!(dispatch.decoded.is_empty());
        assert!(!state.occupancy.occupied);
    }

    #[test]
    fn test_analog_input_rotation_vs_power() {
        let table = RuleTable::standard();
        let rotation = msg("lumi.sensor_cube", "genAnalogInput")
            .with_attr("65285", json!(500))
            .with_attr("presentValue", json!(45));
        let (dispatch, _) = run(&table, &rotation);
        assert_eq!(dispatch.matched, vec!["cube_rotation"]);

        let power = msg("lumi.plug", "genAnalogInput").with_attr("presentValue", json!(3.2));
        let (dispatch, _) = run(&table, &power);
        assert_eq!(dispatch.matched, vec!["load_power"]);
    }

    #[test]
    fn test_panicking_rule_is_isolated() {
        let mut table = RuleTable::new(vec![Rule::on_cluster("broken", "msTemperatureMeasurement", |_| {
            panic!("decoder bug")
        })]);
        table.push(Rule::on_cluster("temperature", "msTemperatureMeasurement", |cx| {
            sensors::temperature(cx.msg)
        }));

        let (dispatch, _) = run(
            &table,
            &msg("lumi.weather", "msTemperatureMeasurement").with_attr("measuredValue", json!(1800)),
        );

        assert_eq!(dispatch.matched, vec!["broken", "temperature"]);
        assert_eq!(dispatch.failures, 1);
        assert_eq!(dispatch.decoded.value_of("temperature"), Some(&StateValue::Number(18.0)));
    }
}
