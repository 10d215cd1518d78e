//! Window covering (J1) translator

use super::HandlerContext;
use crate::command::operation::{millis_to_steps, seconds_to_steps, OperationList};
use crate::command::payload::ConfigurationPayload;
use crate::error::InputError;
use serde_json::{json, Value};
use ubisys_shared::registry::clusters::WINDOW_COVERING;
use ubisys_shared::timing;

/// Fields written as given, with whether they need the manufacturer code
const DIRECT_FIELDS: &[(&str, bool)] = &[
    ("windowCoveringType", false),
    ("configStatus", false),
    ("installedOpenLimitLiftCm", false),
    ("installedClosedLimitLiftCm", false),
    ("installedOpenLimitTiltDdegree", false),
    ("installedClosedLimitTiltDdegree", false),
    ("turnaroundGuardTime", true),
    ("liftToTiltTransitionSteps", true),
    ("totalSteps", true),
    ("liftToTiltTransitionSteps2", true),
    ("totalSteps2", true),
    ("additionalSteps", true),
    ("inactivePowerThreshold", true),
    ("startupSteps", true),
];

#[derive(Clone, Copy)]
enum Unit {
    Seconds,
    Millis,
}

/// Time fields converted to step counts before writing
const DERIVED_FIELDS: &[(&str, &str, Unit)] = &[
    ("open_to_closed_s", "totalSteps", Unit::Seconds),
    ("closed_to_open_s", "totalSteps2", Unit::Seconds),
    ("lift_to_tilt_transition_ms", "liftToTiltTransitionSteps", Unit::Millis),
    ("lift_to_tilt_transition_ms", "liftToTiltTransitionSteps2", Unit::Millis),
];

/// Position limits reset before calibrating
const UNCALIBRATED: &[(&str, u16, bool)] = &[
    ("installedOpenLimitLiftCm", 0, false),
    ("installedClosedLimitLiftCm", 240, false),
    ("installedOpenLimitTiltDdegree", 0, false),
    ("installedClosedLimitTiltDdegree", 900, false),
    ("liftToTiltTransitionSteps", 0xFFFF, true),
    ("totalSteps", 0xFFFF, true),
    ("liftToTiltTransitionSteps2", 0xFFFF, true),
    ("totalSteps2", 0xFFFF, true),
];

const READ_BACK: &[(&str, bool)] = &[
    ("windowCoveringType", false),
    ("physicalClosedLimitLiftCm", false),
    ("physicalClosedLimitTiltDdegree", false),
    ("currentPositionLiftCm", false),
    ("currentPositionTiltDdegree", false),
    ("numOfActuationsLift", false),
    ("numOfActuationsTilt", false),
    ("configStatus", false),
    ("currentPositionLiftPercentage", false),
    ("currentPositionTiltPercentage", false),
    ("installedOpenLimitLiftCm", false),
    ("installedClosedLimitLiftCm", false),
    ("installedOpenLimitTiltDdegree", false),
    ("installedClosedLimitTiltDdegree", false),
    ("turnaroundGuardTime", true),
    ("liftToTiltTransitionSteps", true),
    ("totalSteps", true),
    ("liftToTiltTransitionSteps2", true),
    ("totalSteps2", true),
    ("additionalSteps", true),
    ("inactivePowerThreshold", true),
    ("startupSteps", true),
];

/// windowCoveringMode bit that puts the motor into calibration
const MODE_CALIBRATION: u8 = 0x02;
const MODE_NORMAL: u8 = 0x00;

/// Durations of the guided calibration run, in seconds
#[derive(Debug, Clone, Copy, PartialEq)]
struct Calibration {
    delay_first_open: f64,
    delay_stop: f64,
    delay_close_open: f64,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            delay_first_open: 20.0,
            delay_stop: 2.0,
            delay_close_open: 30.0,
        }
    }
}

impl Calibration {
    fn from_payload(section: &ConfigurationPayload) -> Result<Self, InputError> {
        let defaults = Self::default();
        Ok(Self {
            delay_first_open: delay(section, "delay_first_open", defaults.delay_first_open)?,
            delay_stop: delay(section, "delay_stop", defaults.delay_stop)?,
            delay_close_open: delay(section, "delay_close_open", defaults.delay_close_open)?,
        })
    }
}

fn delay(section: &ConfigurationPayload, field: &str, default: f64) -> Result<f64, InputError> {
    let value = section.number(field)?.unwrap_or(default);
    if value < 0.0 {
        return Err(InputError::InvalidField {
            field: format!("calibrate.{}", field),
            reason: "must not be negative".into(),
        });
    }
    Ok(value)
}

pub fn configure(
    ctx: &HandlerContext<'_>,
    payload: &ConfigurationPayload,
) -> Result<OperationList, InputError> {
    let ops = ctx.operations();
    let mut pipeline = OperationList::new();

    let steps_per_second = payload
        .number("steps_per_second")?
        .unwrap_or(timing::DEFAULT_STEPS_PER_SECOND);
    if steps_per_second <= 0.0 {
        return Err(InputError::InvalidField {
            field: "steps_per_second".into(),
            reason: "must be positive".into(),
        });
    }

    let calibration = payload
        .section("calibrate")?
        .map(|section| Calibration::from_payload(&section))
        .transpose()?;

    if let Some(calibration) = calibration {
        pipeline.push(ops.command(WINDOW_COVERING, "upOpen", json!({}), false)?);
        pipeline.push(ops.wait(calibration.delay_first_open));
        pipeline.push(ops.write(
            WINDOW_COVERING,
            "windowCoveringMode",
            json!(MODE_NORMAL),
            false,
            None,
        )?);
        for (attribute, sentinel, vendor) in UNCALIBRATED {
            pipeline.push(ops.write(WINDOW_COVERING, *attribute, json!(sentinel), *vendor, None)?);
        }
    }

    for (field, vendor) in DIRECT_FIELDS {
        pipeline.extend(ops.write_from_config(
            payload,
            field,
            WINDOW_COVERING,
            *field,
            *vendor,
            None,
            None,
        )?);
    }

    let from_seconds = seconds_to_steps(steps_per_second);
    let from_millis = millis_to_steps(steps_per_second);
    for (field, attribute, unit) in DERIVED_FIELDS {
        let convert: &dyn Fn(&Value) -> Result<Value, String> = match unit {
            Unit::Seconds => &from_seconds,
            Unit::Millis => &from_millis,
        };
        pipeline.extend(ops.write_from_config(
            payload,
            field,
            WINDOW_COVERING,
            *attribute,
            true,
            None,
            Some(convert),
        )?);
    }

    if let Some(calibration) = calibration {
        pipeline.push(ops.write(
            WINDOW_COVERING,
            "windowCoveringMode",
            json!(MODE_CALIBRATION),
            false,
            None,
        )?);
        pipeline.push(ops.command(WINDOW_COVERING, "downClose", json!({}), false)?);
        pipeline.push(ops.wait(calibration.delay_stop));
        pipeline.push(ops.command(WINDOW_COVERING, "stop", json!({}), false)?);
        for movement in ["upOpen", "downClose", "upOpen"] {
            pipeline.push(ops.command(WINDOW_COVERING, movement, json!({}), false)?);
            pipeline.push(ops.wait(calibration.delay_close_open));
        }
        pipeline.push(ops.write(
            WINDOW_COVERING,
            "windowCoveringMode",
            json!(MODE_NORMAL),
            false,
            None,
        )?);
    }

    Ok(pipeline)
}

pub fn read_back(ctx: &HandlerContext<'_>) -> Result<OperationList, InputError> {
    let ops = ctx.operations();
    let mut pipeline = OperationList::new();

    for (attribute, vendor) in READ_BACK {
        pipeline.push(ops.read(WINDOW_COVERING, *attribute, *vendor)?);
    }

    Ok(pipeline)
}
