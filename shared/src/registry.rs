//! Attribute registry
//!
//! Maps symbolic cluster, attribute and command names to their protocol
//! identifiers. The registry is merged once at startup from the standard ZCL
//! dictionary and a vendor overlay; vendor entries replace standard entries
//! of the same name. After construction it is read-only and shared.

use crate::zcl::DataType;
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;

/// Errors raised by registry construction and lookups
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Unknown cluster: {0}")]
    UnknownCluster(String),

    #[error("Unknown attribute {cluster}.{name}")]
    UnknownAttribute { cluster: String, name: String },

    #[error("Unknown command {cluster}.{name}")]
    UnknownCommand { cluster: String, name: String },
}

/// Static attribute definition
#[derive(Debug, Clone, Copy)]
pub struct AttributeDef {
    pub name: &'static str,
    pub id: u16,
    pub data_type: DataType,
}

/// Static cluster-specific command definition
#[derive(Debug, Clone, Copy)]
pub struct CommandDef {
    pub name: &'static str,
    pub id: u8,
}

/// Static cluster definition from the standard dictionary
#[derive(Debug, Clone, Copy)]
pub struct ClusterDef {
    pub name: &'static str,
    pub id: u16,
    pub attributes: &'static [AttributeDef],
    pub commands: &'static [CommandDef],
}

/// Vendor overlay entry
#[derive(Debug, Clone, Copy)]
pub struct VendorAttributeDef {
    pub cluster: &'static str,
    pub attribute: AttributeDef,
    pub manufacturer_code: u16,
}

/// A fully resolved attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AttributeDescriptor {
    pub cluster: &'static str,
    pub cluster_id: u16,
    pub name: &'static str,
    pub id: u16,
    pub data_type: DataType,
    /// Required when the attribute lives in a manufacturer-specific range
    pub manufacturer_code: Option<u16>,
}

/// A fully resolved cluster-specific command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CommandDescriptor {
    pub cluster: &'static str,
    pub cluster_id: u16,
    pub name: &'static str,
    pub id: u8,
}

#[derive(Debug)]
struct ClusterEntry {
    id: u16,
    attributes: HashMap<&'static str, AttributeDescriptor>,
    commands: HashMap<&'static str, CommandDescriptor>,
}

/// Merged, immutable attribute registry
#[derive(Debug)]
pub struct AttributeRegistry {
    clusters: HashMap<&'static str, ClusterEntry>,
    manufacturer_code: u16,
}

impl AttributeRegistry {
    /// Merge a standard dictionary with a vendor overlay.
    ///
    /// `manufacturer_code` is the code used for vendor-extension requests on
    /// attributes that do not carry their own code.
    pub fn merge(
        standard: &[ClusterDef],
        overlay: &[VendorAttributeDef],
        manufacturer_code: u16,
    ) -> Result<Self, RegistryError> {
        let mut clusters = HashMap::with_capacity(standard.len());

        for def in standard {
            let attributes = def
                .attributes
                .iter()
                .map(|attr| {
                    (
                        attr.name,
                        AttributeDescriptor {
                            cluster: def.name,
                            cluster_id: def.id,
                            name: attr.name,
                            id: attr.id,
                            data_type: attr.data_type,
                            manufacturer_code: None,
                        },
                    )
                })
                .collect();

            let commands = def
                .commands
                .iter()
                .map(|cmd| {
                    (
                        cmd.name,
                        CommandDescriptor {
                            cluster: def.name,
                            cluster_id: def.id,
                            name: cmd.name,
                            id: cmd.id,
                        },
                    )
                })
                .collect();

            clusters.insert(
                def.name,
                ClusterEntry {
                    id: def.id,
                    attributes,
                    commands,
                },
            );
        }

        for entry in overlay {
            let cluster = clusters
                .get_mut(entry.cluster)
                .ok_or_else(|| RegistryError::UnknownCluster(entry.cluster.to_string()))?;

            cluster.attributes.insert(
                entry.attribute.name,
                AttributeDescriptor {
                    cluster: entry.cluster,
                    cluster_id: cluster.id,
                    name: entry.attribute.name,
                    id: entry.attribute.id,
                    data_type: entry.attribute.data_type,
                    manufacturer_code: Some(entry.manufacturer_code),
                },
            );
        }

        Ok(Self {
            clusters,
            manufacturer_code,
        })
    }

    /// The registry used by the bridge: standard ZCL plus the ubisys overlay
    pub fn ubisys() -> Result<Self, RegistryError> {
        Self::merge(
            STANDARD_CLUSTERS,
            UBISYS_OVERLAY,
            crate::ubisys::MANUFACTURER_CODE,
        )
    }

    /// Manufacturer code applied to vendor-extension requests
    pub fn manufacturer_code(&self) -> u16 {
        self.manufacturer_code
    }

    /// Numeric id of a cluster
    pub fn cluster_id(&self, cluster: &str) -> Result<u16, RegistryError> {
        self.cluster(cluster).map(|c| c.id)
    }

    /// Resolve a symbolic attribute name within a cluster
    pub fn resolve(&self, cluster: &str, name: &str) -> Result<AttributeDescriptor, RegistryError> {
        self.cluster(cluster)?
            .attributes
            .get(name)
            .copied()
            .ok_or_else(|| RegistryError::UnknownAttribute {
                cluster: cluster.to_string(),
                name: name.to_string(),
            })
    }

    /// Find an attribute by its numeric id
    pub fn resolve_id(&self, cluster: &str, id: u16) -> Option<AttributeDescriptor> {
        self.clusters
            .get(cluster)?
            .attributes
            .values()
            .find(|attr| attr.id == id)
            .copied()
    }

    /// Resolve a cluster-specific command name
    pub fn resolve_command(&self, cluster: &str, name: &str) -> Result<CommandDescriptor, RegistryError> {
        self.cluster(cluster)?
            .commands
            .get(name)
            .copied()
            .ok_or_else(|| RegistryError::UnknownCommand {
                cluster: cluster.to_string(),
                name: name.to_string(),
            })
    }

    /// Number of attributes known for a cluster
    pub fn attribute_count(&self, cluster: &str) -> usize {
        self.clusters
            .get(cluster)
            .map(|c| c.attributes.len())
            .unwrap_or(0)
    }

    fn cluster(&self, cluster: &str) -> Result<&ClusterEntry, RegistryError> {
        self.clusters
            .get(cluster)
            .ok_or_else(|| RegistryError::UnknownCluster(cluster.to_string()))
    }
}

/// Cluster names used by the bridge
pub mod clusters {
    pub const BASIC: &str = "genBasic";
    pub const WINDOW_COVERING: &str = "closuresWindowCovering";
    pub const BALLAST_CONFIG: &str = "lightingBallastCfg";
    pub const DEVICE_SETUP: &str = "manuSpecificUbisysDeviceSetup";
    pub const DIMMER_SETUP: &str = "manuSpecificUbisysDimmerSetup";
}

const fn attr(name: &'static str, id: u16, data_type: DataType) -> AttributeDef {
    AttributeDef { name, id, data_type }
}

const fn cmd(name: &'static str, id: u8) -> CommandDef {
    CommandDef { name, id }
}

const fn vendor(cluster: &'static str, name: &'static str, id: u16, data_type: DataType) -> VendorAttributeDef {
    VendorAttributeDef {
        cluster,
        attribute: attr(name, id, data_type),
        manufacturer_code: crate::ubisys::MANUFACTURER_CODE,
    }
}

/// Standard ZCL dictionary (subset covering the clusters the bridge drives)
pub static STANDARD_CLUSTERS: &[ClusterDef] = &[
    ClusterDef {
        name: clusters::BASIC,
        id: 0x0000,
        attributes: &[
            attr("zclVersion", 0x0000, DataType::Uint8),
            attr("appVersion", 0x0001, DataType::Uint8),
            attr("stackVersion", 0x0002, DataType::Uint8),
            attr("hwVersion", 0x0003, DataType::Uint8),
            attr("manufacturerName", 0x0004, DataType::CharStr),
            attr("modelId", 0x0005, DataType::CharStr),
            attr("dateCode", 0x0006, DataType::CharStr),
            attr("powerSource", 0x0007, DataType::Enum8),
            attr("swBuildId", 0x4000, DataType::CharStr),
        ],
        commands: &[cmd("resetFactDefault", 0x00)],
    },
    ClusterDef {
        name: clusters::WINDOW_COVERING,
        id: 0x0102,
        attributes: &[
            attr("windowCoveringType", 0x0000, DataType::Enum8),
            attr("physicalClosedLimitLiftCm", 0x0001, DataType::Uint16),
            attr("physicalClosedLimitTiltDdegree", 0x0002, DataType::Uint16),
            attr("currentPositionLiftCm", 0x0003, DataType::Uint16),
            attr("currentPositionTiltDdegree", 0x0004, DataType::Uint16),
            attr("numOfActuationsLift", 0x0005, DataType::Uint16),
            attr("numOfActuationsTilt", 0x0006, DataType::Uint16),
            attr("configStatus", 0x0007, DataType::Bitmap8),
            attr("currentPositionLiftPercentage", 0x0008, DataType::Uint8),
            attr("currentPositionTiltPercentage", 0x0009, DataType::Uint8),
            attr("operationalStatus", 0x000A, DataType::Bitmap8),
            attr("installedOpenLimitLiftCm", 0x0010, DataType::Uint16),
            attr("installedClosedLimitLiftCm", 0x0011, DataType::Uint16),
            attr("installedOpenLimitTiltDdegree", 0x0012, DataType::Uint16),
            attr("installedClosedLimitTiltDdegree", 0x0013, DataType::Uint16),
            attr("velocityLift", 0x0014, DataType::Uint16),
            attr("accelerationTimeLift", 0x0015, DataType::Uint16),
            attr("decelerationTimeLift", 0x0016, DataType::Uint16),
            attr("windowCoveringMode", 0x0017, DataType::Bitmap8),
        ],
        commands: &[
            cmd("upOpen", 0x00),
            cmd("downClose", 0x01),
            cmd("stop", 0x02),
            cmd("goToLiftValue", 0x04),
            cmd("goToLiftPercentage", 0x05),
            cmd("goToTiltValue", 0x07),
            cmd("goToTiltPercentage", 0x08),
        ],
    },
    ClusterDef {
        name: clusters::BALLAST_CONFIG,
        id: 0x0301,
        attributes: &[
            attr("physicalMinLevel", 0x0000, DataType::Uint8),
            attr("physicalMaxLevel", 0x0001, DataType::Uint8),
            attr("ballastStatus", 0x0002, DataType::Bitmap8),
            attr("minLevel", 0x0010, DataType::Uint8),
            attr("maxLevel", 0x0011, DataType::Uint8),
            attr("powerOnLevel", 0x0012, DataType::Uint8),
            attr("powerOnFadeTime", 0x0013, DataType::Uint16),
            attr("intrinsicBallastFactor", 0x0014, DataType::Uint8),
            attr("ballastFactorAdjustment", 0x0015, DataType::Uint8),
        ],
        commands: &[],
    },
    ClusterDef {
        name: clusters::DEVICE_SETUP,
        id: 0xFC00,
        attributes: &[
            attr("inputConfigurations", 0x0000, DataType::Array),
            attr("inputActions", 0x0001, DataType::Array),
        ],
        commands: &[],
    },
    ClusterDef {
        name: clusters::DIMMER_SETUP,
        id: 0xFC01,
        attributes: &[
            attr("capabilities", 0x0000, DataType::Bitmap8),
            attr("status", 0x0001, DataType::Bitmap8),
            attr("mode", 0x0002, DataType::Bitmap8),
        ],
        commands: &[],
    },
];

/// Ubisys manufacturer-specific attributes
pub static UBISYS_OVERLAY: &[VendorAttributeDef] = &[
    vendor(clusters::WINDOW_COVERING, "turnaroundGuardTime", 0x1000, DataType::Uint8),
    vendor(clusters::WINDOW_COVERING, "liftToTiltTransitionSteps", 0x1001, DataType::Uint16),
    vendor(clusters::WINDOW_COVERING, "totalSteps", 0x1002, DataType::Uint16),
    vendor(clusters::WINDOW_COVERING, "liftToTiltTransitionSteps2", 0x1003, DataType::Uint16),
    vendor(clusters::WINDOW_COVERING, "totalSteps2", 0x1004, DataType::Uint16),
    vendor(clusters::WINDOW_COVERING, "additionalSteps", 0x1005, DataType::Uint8),
    vendor(clusters::WINDOW_COVERING, "inactivePowerThreshold", 0x1006, DataType::Uint16),
    vendor(clusters::WINDOW_COVERING, "startupSteps", 0x1007, DataType::Uint16),
    // The dimmer setup cluster is only reachable with the manufacturer code
    vendor(clusters::DIMMER_SETUP, "capabilities", 0x0000, DataType::Bitmap8),
    vendor(clusters::DIMMER_SETUP, "status", 0x0001, DataType::Bitmap8),
    vendor(clusters::DIMMER_SETUP, "mode", 0x0002, DataType::Bitmap8),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_standard_attribute() {
        let registry = AttributeRegistry::ubisys().unwrap();
        let attr = registry
            .resolve(clusters::WINDOW_COVERING, "windowCoveringType")
            .unwrap();

        assert_eq!(attr.id, 0x0000);
        assert_eq!(attr.cluster_id, 0x0102);
        assert_eq!(attr.data_type, DataType::Enum8);
        assert_eq!(attr.manufacturer_code, None);
    }

    #[test]
    fn test_resolve_vendor_attribute() {
        let registry = AttributeRegistry::ubisys().unwrap();
        let attr = registry
            .resolve(clusters::WINDOW_COVERING, "totalSteps2")
            .unwrap();

        assert_eq!(attr.id, 0x1004);
        assert_eq!(attr.manufacturer_code, Some(0x10F2));
    }

    #[test]
    fn test_vendor_overlay_wins_on_collision() {
        let registry = AttributeRegistry::ubisys().unwrap();
        let mode = registry.resolve(clusters::DIMMER_SETUP, "mode").unwrap();

        assert_eq!(mode.manufacturer_code, Some(0x10F2));
        assert_eq!(registry.attribute_count(clusters::DIMMER_SETUP), 3);
    }

    #[test]
    fn test_unknown_attribute() {
        let registry = AttributeRegistry::ubisys().unwrap();
        let err = registry
            .resolve(clusters::WINDOW_COVERING, "doesNotExist")
            .unwrap_err();

        assert_eq!(
            err,
            RegistryError::UnknownAttribute {
                cluster: clusters::WINDOW_COVERING.into(),
                name: "doesNotExist".into(),
            }
        );
        // Names are scoped to their cluster
        assert!(registry.resolve(clusters::BASIC, "totalSteps").is_err());
    }

    #[test]
    fn test_overlay_on_unknown_cluster_fails() {
        let overlay = [vendor("noSuchCluster", "thing", 0x1000, DataType::Uint8)];
        let result = AttributeRegistry::merge(STANDARD_CLUSTERS, &overlay, 0x10F2);

        assert!(matches!(result, Err(RegistryError::UnknownCluster(_))));
    }

    #[test]
    fn test_resolve_command_and_reverse_lookup() {
        let registry = AttributeRegistry::ubisys().unwrap();

        let stop = registry
            .resolve_command(clusters::WINDOW_COVERING, "stop")
            .unwrap();
        assert_eq!(stop.id, 0x02);
        assert!(registry
            .resolve_command(clusters::WINDOW_COVERING, "fly")
            .is_err());

        let by_id = registry.resolve_id(clusters::WINDOW_COVERING, 0x1001).unwrap();
        assert_eq!(by_id.name, "liftToTiltTransitionSteps");
        assert!(registry.resolve_id(clusters::WINDOW_COVERING, 0x7777).is_none());
    }
}
