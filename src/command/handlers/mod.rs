//! Configuration translators for the supported actions

mod cover;
mod device_setup;
mod dimmer;

use super::operation::{OperationBuilder, OperationList};
use super::payload::ConfigurationPayload;
use crate::device::DeviceInfo;
use crate::error::InputError;
use ubisys_shared::AttributeRegistry;

/// Actions addressable by topic suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    ConfigureCover,
    ReadCover,
    ConfigureDimmer,
    ReadDimmer,
    ConfigureDeviceSetup,
    ReadDeviceSetup,
}

impl Action {
    pub const ALL: [Action; 6] = [
        Action::ConfigureCover,
        Action::ReadCover,
        Action::ConfigureDimmer,
        Action::ReadDimmer,
        Action::ConfigureDeviceSetup,
        Action::ReadDeviceSetup,
    ];

    pub fn from_suffix(suffix: &str) -> Result<Self, InputError> {
        Self::ALL
            .into_iter()
            .find(|action| action.suffix() == suffix)
            .ok_or_else(|| InputError::UnknownAction(suffix.to_string()))
    }

    pub fn suffix(self) -> &'static str {
        match self {
            Action::ConfigureCover => "configure_j1",
            Action::ReadCover => "get_j1",
            Action::ConfigureDimmer => "configure_d1",
            Action::ReadDimmer => "get_d1",
            Action::ConfigureDeviceSetup => "configure_device_setup",
            Action::ReadDeviceSetup => "get_device_setup",
        }
    }

    /// Model id prefix the target device must have, if any
    pub fn model_prefix(self) -> Option<&'static str> {
        match self {
            Action::ConfigureCover | Action::ReadCover => Some("J1"),
            Action::ConfigureDimmer | Action::ReadDimmer => Some("D1"),
            Action::ConfigureDeviceSetup | Action::ReadDeviceSetup => None,
        }
    }

    /// Read-back run after a successful configuration
    pub fn read_back(self) -> Option<Action> {
        match self {
            Action::ConfigureCover => Some(Action::ReadCover),
            Action::ConfigureDimmer => Some(Action::ReadDimmer),
            Action::ConfigureDeviceSetup => Some(Action::ReadDeviceSetup),
            _ => None,
        }
    }

    pub fn is_read_back(self) -> bool {
        matches!(
            self,
            Action::ReadCover | Action::ReadDimmer | Action::ReadDeviceSetup
        )
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.suffix())
    }
}

/// Context passed to translators
#[derive(Debug, Clone, Copy)]
pub struct HandlerContext<'a> {
    pub registry: &'a AttributeRegistry,
    pub device: &'a DeviceInfo,
}

impl<'a> HandlerContext<'a> {
    pub fn operations(&self) -> OperationBuilder<'a> {
        OperationBuilder::new(self.registry, self.device.target())
    }
}

/// Expand a payload into the operations for `action`
pub fn build_pipeline(
    action: Action,
    ctx: &HandlerContext<'_>,
    payload: &ConfigurationPayload,
) -> Result<OperationList, InputError> {
    match action {
        Action::ConfigureCover => cover::configure(ctx, payload),
        Action::ReadCover => cover::read_back(ctx),
        Action::ConfigureDimmer => dimmer::configure(ctx, payload),
        Action::ReadDimmer => dimmer::read_back(ctx),
        Action::ConfigureDeviceSetup => device_setup::configure(ctx, payload),
        Action::ReadDeviceSetup => device_setup::read_back(ctx),
    }
}
