//! Resource Manager resources touched by the driver.
//!
//! Only the fields the driver reads are typed. Everything else the service
//! returns is kept in `extra` and written back untouched, so a
//! read-modify-write never strips properties this crate does not model.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Service name of the storage service endpoint.
pub const STORAGE_SERVICE: &str = "Microsoft.Storage";

/// `$expand` options for compute `Get` calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InstanceViewTypes {
    #[default]
    None,
    InstanceView,
    UserData,
}

impl InstanceViewTypes {
    /// Query value, `None` when nothing should be expanded.
    pub fn as_query(&self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::InstanceView => Some("instanceView"),
            Self::UserData => Some("userData"),
        }
    }
}

impl fmt::Display for InstanceViewTypes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_query().unwrap_or(""))
    }
}

/// A virtual machine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VirtualMachine {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Partial update of a virtual machine (`PATCH`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VirtualMachineUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Map<String, Value>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One instance of a virtual machine scale set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineScaleSetVm {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A subnet of a virtual network.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Subnet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<SubnetProperties>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Subnet {
    /// Service endpoints, created empty when the subnet has none yet.
    pub fn service_endpoints_mut(&mut self) -> &mut Vec<ServiceEndpoint> {
        self.properties
            .get_or_insert_with(SubnetProperties::default)
            .service_endpoints
            .get_or_insert_with(Vec::new)
    }

    /// Registered service endpoints.
    pub fn service_endpoints(&self) -> &[ServiceEndpoint] {
        self.properties
            .as_ref()
            .and_then(|p| p.service_endpoints.as_deref())
            .unwrap_or(&[])
    }

    /// Whether an endpoint for `service` is registered.
    pub fn has_service_endpoint(&self, service: &str) -> bool {
        self.service_endpoints()
            .iter()
            .any(|endpoint| endpoint.service.as_deref() == Some(service))
    }
}

/// Subnet properties.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubnetProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_endpoints: Option<Vec<ServiceEndpoint>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A service endpoint entry of a subnet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceEndpoint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locations: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<String>,
}

impl ServiceEndpoint {
    /// Endpoint for `service` in one location.
    pub fn new(service: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            service: Some(service.into()),
            locations: Some(vec![location.into()]),
            provisioning_state: None,
        }
    }
}

/// Handle to an accepted asynchronous update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateFuture {
    /// HTTP method of the original request.
    pub method: String,
    /// URL of the resource being updated.
    pub resource_url: String,
    /// URL to poll for completion, absent when the update finished inline.
    pub polling_url: Option<String>,
    /// Status code of the original response.
    pub status: u16,
}

impl UpdateFuture {
    /// Future for an update that already completed.
    pub fn completed(method: impl Into<String>, resource_url: impl Into<String>, status: u16) -> Self {
        Self {
            method: method.into(),
            resource_url: resource_url.into(),
            polling_url: None,
            status,
        }
    }

    /// Whether there is nothing left to wait for.
    pub fn is_done(&self) -> bool {
        self.polling_url.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_subnet_keeps_unknown_fields() {
        let raw = json!({
            "id": "/subscriptions/s/resourceGroups/rg/providers/Microsoft.Network/virtualNetworks/vnet/subnets/subnet",
            "name": "subnet",
            "etag": "W/\"1\"",
            "type": "Microsoft.Network/virtualNetworks/subnets",
            "properties": {
                "addressPrefix": "10.240.0.0/16",
                "networkSecurityGroup": {"id": "nsg"},
                "serviceEndpoints": [
                    {"service": "Microsoft.Sql", "locations": ["westus2"], "provisioningState": "Succeeded"}
                ]
            }
        });

        let mut subnet: Subnet = serde_json::from_value(raw).unwrap();
        assert!(subnet.has_service_endpoint("Microsoft.Sql"));
        assert!(!subnet.has_service_endpoint(STORAGE_SERVICE));

        subnet
            .service_endpoints_mut()
            .push(ServiceEndpoint::new(STORAGE_SERVICE, "westus2"));

        let written = serde_json::to_value(&subnet).unwrap();
        assert_eq!(written["type"], "Microsoft.Network/virtualNetworks/subnets");
        assert_eq!(written["properties"]["networkSecurityGroup"]["id"], "nsg");
        assert_eq!(written["properties"]["serviceEndpoints"][1]["service"], STORAGE_SERVICE);
        assert_eq!(written["properties"]["serviceEndpoints"][1]["locations"][0], "westus2");
    }

    #[test]
    fn test_service_endpoints_initialized_on_demand() {
        let mut subnet = Subnet::default();
        assert!(subnet.service_endpoints().is_empty());
        subnet.service_endpoints_mut().push(ServiceEndpoint::new(STORAGE_SERVICE, "eastus"));
        assert!(subnet.has_service_endpoint(STORAGE_SERVICE));
    }

    #[test]
    fn test_vmss_vm_instance_id() {
        let vm: VirtualMachineScaleSetVm =
            serde_json::from_value(json!({"instanceId": "3", "name": "ss_3", "zones": ["1"]})).unwrap();
        assert_eq!(vm.instance_id.as_deref(), Some("3"));
        assert_eq!(vm.extra["zones"][0], "1");
    }

    #[test]
    fn test_expand_query() {
        assert_eq!(InstanceViewTypes::None.as_query(), None);
        assert_eq!(InstanceViewTypes::InstanceView.as_query(), Some("instanceView"));
        assert_eq!(InstanceViewTypes::UserData.to_string(), "userData");
    }
}
