//! Input configuration translator for any ubisys device
//!
//! The device setup cluster lives on a dedicated endpoint and takes its
//! settings as typed arrays.

use super::HandlerContext;
use crate::command::operation::OperationList;
use crate::command::payload::ConfigurationPayload;
use crate::error::InputError;
use serde_json::{json, Value};
use ubisys_shared::registry::clusters::DEVICE_SETUP;
use ubisys_shared::{ubisys, DataType};

/// Wrap a JSON array as a typed array attribute value
fn array_of(element_type: DataType) -> impl Fn(&Value) -> Result<Value, String> {
    move |value| {
        let elements = value
            .as_array()
            .ok_or_else(|| format!("expected an array, got {}", value))?;

        for element in elements {
            check_element(element_type, element)?;
        }

        Ok(json!({
            "element_type": element_type,
            "elements": elements,
        }))
    }
}

fn check_element(element_type: DataType, element: &Value) -> Result<(), String> {
    let is_byte = |v: &Value| v.as_u64().is_some_and(|n| n <= 0xFF);

    let valid = match element_type {
        DataType::Data8 => is_byte(element),
        DataType::OctetStr => element
            .as_array()
            .is_some_and(|bytes| bytes.iter().all(is_byte)),
        _ => true,
    };

    if valid {
        Ok(())
    } else {
        Err(format!("invalid {:?} element {}", element_type, element))
    }
}

pub fn configure(
    ctx: &HandlerContext<'_>,
    payload: &ConfigurationPayload,
) -> Result<OperationList, InputError> {
    let ops = ctx.operations().on_endpoint(ubisys::DEVICE_SETUP_ENDPOINT);
    let mut pipeline = OperationList::new();

    let configurations = array_of(DataType::Data8);
    pipeline.extend(ops.write_from_config(
        payload,
        "input_configurations",
        DEVICE_SETUP,
        "inputConfigurations",
        true,
        Some(DataType::Array),
        Some(&configurations),
    )?);

    let actions = array_of(DataType::OctetStr);
    pipeline.extend(ops.write_from_config(
        payload,
        "input_actions",
        DEVICE_SETUP,
        "inputActions",
        true,
        Some(DataType::Array),
        Some(&actions),
    )?);

    Ok(pipeline)
}

pub fn read_back(ctx: &HandlerContext<'_>) -> Result<OperationList, InputError> {
    let ops = ctx.operations().on_endpoint(ubisys::DEVICE_SETUP_ENDPOINT);
    let mut pipeline = OperationList::new();

    pipeline.push(ops.read(DEVICE_SETUP, "inputConfigurations", true)?);
    pipeline.push(ops.read(DEVICE_SETUP, "inputActions", true)?);

    Ok(pipeline)
}
