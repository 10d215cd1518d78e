//! Dimmer (D1) translator

use super::HandlerContext;
use crate::command::operation::OperationList;
use crate::command::payload::ConfigurationPayload;
use crate::error::InputError;
use ubisys_shared::registry::clusters::{BALLAST_CONFIG, DIMMER_SETUP};

const BALLAST_FIELDS: &[&str] = &["minLevel", "maxLevel", "powerOnLevel", "powerOnFadeTime"];

const READ_BACK: &[(&str, &str)] = &[
    (BALLAST_CONFIG, "physicalMinLevel"),
    (BALLAST_CONFIG, "physicalMaxLevel"),
    (BALLAST_CONFIG, "ballastStatus"),
    (BALLAST_CONFIG, "minLevel"),
    (BALLAST_CONFIG, "maxLevel"),
    (DIMMER_SETUP, "capabilities"),
    (DIMMER_SETUP, "status"),
    (DIMMER_SETUP, "mode"),
];

pub fn configure(
    ctx: &HandlerContext<'_>,
    payload: &ConfigurationPayload,
) -> Result<OperationList, InputError> {
    let ops = ctx.operations();
    let mut pipeline = OperationList::new();

    for field in BALLAST_FIELDS {
        pipeline.extend(ops.write_from_config(
            payload,
            field,
            BALLAST_CONFIG,
            *field,
            false,
            None,
            None,
        )?);
    }

    pipeline.extend(ops.write_from_config(
        payload,
        "mode",
        DIMMER_SETUP,
        "mode",
        true,
        None,
        None,
    )?);

    Ok(pipeline)
}

pub fn read_back(ctx: &HandlerContext<'_>) -> Result<OperationList, InputError> {
    let ops = ctx.operations();
    let mut pipeline = OperationList::new();

    for (cluster, attribute) in READ_BACK {
        // The vendor cluster carries its manufacturer code in the registry
        pipeline.push(ops.read(cluster, *attribute, false)?);
    }

    Ok(pipeline)
}
