// In-memory compute clients

use async_trait::async_trait;
use azfile_azure::{
    InstanceViewTypes, RetryError, UpdateFuture, VirtualMachine, VirtualMachineScaleSetVm,
    VirtualMachineUpdate, VirtualMachinesClient, VmssVmClient,
};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::mock::{CallRecorder, Faults};

fn not_found(kind: &str, name: &str) -> RetryError {
    RetryError::from_status(404, None, format!("NotFound: {} {} not found", kind, name))
}

/// Virtual machines held in memory, keyed by resource group and name.
///
/// Updates apply immediately; `update_async` returns a completed future.
#[derive(Clone, Default)]
pub struct FakeVirtualMachinesClient {
    vms: Arc<Mutex<BTreeMap<(String, String), VirtualMachine>>>,
    calls: CallRecorder,
    faults: Faults,
}

impl FakeVirtualMachinesClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_vm(self, resource_group: &str, vm: VirtualMachine) -> Self {
        let name = vm.name.clone().unwrap_or_default();
        self.vms
            .lock()
            .insert((resource_group.to_string(), name), vm);
        self
    }

    pub fn vm(&self, resource_group: &str, name: &str) -> Option<VirtualMachine> {
        self.vms
            .lock()
            .get(&(resource_group.to_string(), name.to_string()))
            .cloned()
    }

    pub fn calls(&self) -> &CallRecorder {
        &self.calls
    }

    pub fn faults(&self) -> &Faults {
        &self.faults
    }

    fn apply_update(&self, resource_group: &str, vm_name: &str, update: &VirtualMachineUpdate) -> Result<(), RetryError> {
        let mut vms = self.vms.lock();
        let vm = vms
            .get_mut(&(resource_group.to_string(), vm_name.to_string()))
            .ok_or_else(|| not_found("virtual machine", vm_name))?;

        if let Some(properties) = &update.properties {
            vm.properties = Some(properties.clone());
        }
        if let Some(tags) = &update.tags {
            vm.extra.insert("tags".to_string(), Value::Object(tags.clone()));
        }
        Ok(())
    }
}

#[async_trait]
impl VirtualMachinesClient for FakeVirtualMachinesClient {
    async fn get(
        &self,
        resource_group: &str,
        vm_name: &str,
        expand: InstanceViewTypes,
    ) -> Result<VirtualMachine, RetryError> {
        self.calls
            .record("get", &[resource_group, vm_name, expand.as_query().unwrap_or("")]);
        self.faults.check("get")?;
        self.vm(resource_group, vm_name)
            .ok_or_else(|| not_found("virtual machine", vm_name))
    }

    async fn list(&self, resource_group: &str) -> Result<Vec<VirtualMachine>, RetryError> {
        self.calls.record("list", &[resource_group]);
        self.faults.check("list")?;
        Ok(self
            .vms
            .lock()
            .iter()
            .filter(|((rg, _), _)| rg == resource_group)
            .map(|(_, vm)| vm.clone())
            .collect())
    }

    async fn create_or_update(
        &self,
        resource_group: &str,
        vm_name: &str,
        parameters: &VirtualMachine,
        source: &str,
    ) -> Result<(), RetryError> {
        self.calls
            .record("create_or_update", &[resource_group, vm_name, source]);
        self.faults.check("create_or_update")?;
        self.vms.lock().insert(
            (resource_group.to_string(), vm_name.to_string()),
            parameters.clone(),
        );
        Ok(())
    }

    async fn update(
        &self,
        resource_group: &str,
        vm_name: &str,
        parameters: &VirtualMachineUpdate,
        source: &str,
    ) -> Result<(), RetryError> {
        self.calls.record("update", &[resource_group, vm_name, source]);
        self.faults.check("update")?;
        self.apply_update(resource_group, vm_name, parameters)
    }

    async fn update_async(
        &self,
        resource_group: &str,
        vm_name: &str,
        parameters: &VirtualMachineUpdate,
        source: &str,
    ) -> Result<UpdateFuture, RetryError> {
        self.calls
            .record("update_async", &[resource_group, vm_name, source]);
        self.faults.check("update_async")?;
        self.apply_update(resource_group, vm_name, parameters)?;
        Ok(UpdateFuture::completed(
            "PATCH",
            format!("{}/{}", resource_group, vm_name),
            200,
        ))
    }

    async fn wait_for_update_result(
        &self,
        future: &UpdateFuture,
        resource_group: &str,
        source: &str,
    ) -> Result<(), RetryError> {
        self.calls.record(
            "wait_for_update_result",
            &[future.resource_url.as_str(), resource_group, source],
        );
        self.faults.check("wait_for_update_result")
    }

    async fn delete(&self, resource_group: &str, vm_name: &str) -> Result<(), RetryError> {
        self.calls.record("delete", &[resource_group, vm_name]);
        self.faults.check("delete")?;
        self.vms
            .lock()
            .remove(&(resource_group.to_string(), vm_name.to_string()));
        Ok(())
    }
}

type InstanceKey = (String, String, String);

/// Scale set instances held in memory.
#[derive(Clone, Default)]
pub struct FakeVmssVmClient {
    instances: Arc<Mutex<BTreeMap<InstanceKey, VirtualMachineScaleSetVm>>>,
    calls: CallRecorder,
    faults: Faults,
}

impl FakeVmssVmClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_instance(self, resource_group: &str, scale_set: &str, vm: VirtualMachineScaleSetVm) -> Self {
        let instance_id = vm.instance_id.clone().unwrap_or_default();
        self.instances.lock().insert(
            (resource_group.to_string(), scale_set.to_string(), instance_id),
            vm,
        );
        self
    }

    pub fn instance(&self, resource_group: &str, scale_set: &str, instance_id: &str) -> Option<VirtualMachineScaleSetVm> {
        self.instances
            .lock()
            .get(&key(resource_group, scale_set, instance_id))
            .cloned()
    }

    pub fn calls(&self) -> &CallRecorder {
        &self.calls
    }

    pub fn faults(&self) -> &Faults {
        &self.faults
    }

    fn store(&self, resource_group: &str, scale_set: &str, instance_id: &str, vm: &VirtualMachineScaleSetVm) -> Result<(), RetryError> {
        let mut instances = self.instances.lock();
        let slot = instances
            .get_mut(&key(resource_group, scale_set, instance_id))
            .ok_or_else(|| not_found("scale set instance", instance_id))?;
        *slot = vm.clone();
        Ok(())
    }
}

fn key(resource_group: &str, scale_set: &str, instance_id: &str) -> InstanceKey {
    (
        resource_group.to_string(),
        scale_set.to_string(),
        instance_id.to_string(),
    )
}

#[async_trait]
impl VmssVmClient for FakeVmssVmClient {
    async fn get(
        &self,
        resource_group: &str,
        scale_set_name: &str,
        instance_id: &str,
        expand: InstanceViewTypes,
    ) -> Result<VirtualMachineScaleSetVm, RetryError> {
        self.calls.record(
            "get",
            &[resource_group, scale_set_name, instance_id, expand.as_query().unwrap_or("")],
        );
        self.faults.check("get")?;
        self.instance(resource_group, scale_set_name, instance_id)
            .ok_or_else(|| not_found("scale set instance", instance_id))
    }

    async fn list(
        &self,
        resource_group: &str,
        scale_set_name: &str,
        expand: InstanceViewTypes,
    ) -> Result<Vec<VirtualMachineScaleSetVm>, RetryError> {
        self.calls
            .record("list", &[resource_group, scale_set_name, expand.as_query().unwrap_or("")]);
        self.faults.check("list")?;
        Ok(self
            .instances
            .lock()
            .iter()
            .filter(|((rg, ss, _), _)| rg == resource_group && ss == scale_set_name)
            .map(|(_, vm)| vm.clone())
            .collect())
    }

    async fn update(
        &self,
        resource_group: &str,
        scale_set_name: &str,
        instance_id: &str,
        parameters: &VirtualMachineScaleSetVm,
        source: &str,
    ) -> Result<(), RetryError> {
        self.calls
            .record("update", &[resource_group, scale_set_name, instance_id, source]);
        self.faults.check("update")?;
        self.store(resource_group, scale_set_name, instance_id, parameters)
    }

    async fn update_async(
        &self,
        resource_group: &str,
        scale_set_name: &str,
        instance_id: &str,
        parameters: &VirtualMachineScaleSetVm,
        source: &str,
    ) -> Result<UpdateFuture, RetryError> {
        self.calls.record(
            "update_async",
            &[resource_group, scale_set_name, instance_id, source],
        );
        self.faults.check("update_async")?;
        self.store(resource_group, scale_set_name, instance_id, parameters)?;
        Ok(UpdateFuture::completed(
            "PUT",
            format!("{}/{}/{}", resource_group, scale_set_name, instance_id),
            200,
        ))
    }

    async fn wait_for_update_result(
        &self,
        future: &UpdateFuture,
        resource_group: &str,
        source: &str,
    ) -> Result<(), RetryError> {
        self.calls.record(
            "wait_for_update_result",
            &[future.resource_url.as_str(), resource_group, source],
        );
        self.faults.check("wait_for_update_result")
    }

    async fn update_vms(
        &self,
        resource_group: &str,
        scale_set_name: &str,
        instances: &HashMap<String, VirtualMachineScaleSetVm>,
        source: &str,
    ) -> Result<(), RetryError> {
        self.calls
            .record("update_vms", &[resource_group, scale_set_name, source]);
        self.faults.check("update_vms")?;

        let mut first_error = None;
        for (instance_id, vm) in instances {
            if let Err(err) = self.store(resource_group, scale_set_name, instance_id, vm) {
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
