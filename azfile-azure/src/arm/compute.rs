//! Compute clients over Resource Manager.

use async_trait::async_trait;
use futures::future::join_all;
use std::collections::HashMap;
use tracing::{debug, warn};

use super::ArmClient;
use crate::RetryError;
use crate::clients::{VirtualMachinesClient, VmssVmClient};
use crate::models::{
    InstanceViewTypes, UpdateFuture, VirtualMachine, VirtualMachineScaleSetVm,
    VirtualMachineUpdate,
};

/// Virtual machines client.
#[derive(Clone)]
pub struct ArmVirtualMachinesClient {
    arm: ArmClient,
    api_version: &'static str,
}

impl ArmVirtualMachinesClient {
    pub fn new(arm: ArmClient, api_version: &'static str) -> Self {
        Self { arm, api_version }
    }

    fn vm_id(&self, resource_group: &str, vm_name: &str) -> String {
        self.arm.resource_id(
            resource_group,
            &format!("Microsoft.Compute/virtualMachines/{}", vm_name),
        )
    }
}

#[async_trait]
impl VirtualMachinesClient for ArmVirtualMachinesClient {
    async fn get(
        &self,
        resource_group: &str,
        vm_name: &str,
        expand: InstanceViewTypes,
    ) -> Result<VirtualMachine, RetryError> {
        self.arm
            .get_resource(&self.vm_id(resource_group, vm_name), self.api_version, expand.as_query())
            .await
    }

    async fn list(&self, resource_group: &str) -> Result<Vec<VirtualMachine>, RetryError> {
        let id = self.arm.resource_id(resource_group, "Microsoft.Compute/virtualMachines");
        self.arm.list_resources(&id, self.api_version, None).await
    }

    async fn create_or_update(
        &self,
        resource_group: &str,
        vm_name: &str,
        parameters: &VirtualMachine,
        source: &str,
    ) -> Result<(), RetryError> {
        debug!(resource_group, vm = vm_name, source, "creating or updating virtual machine");
        let future = self
            .arm
            .put_resource(&self.vm_id(resource_group, vm_name), self.api_version, parameters)
            .await?;
        self.arm.wait_for_async_operation(&future).await
    }

    async fn update(
        &self,
        resource_group: &str,
        vm_name: &str,
        parameters: &VirtualMachineUpdate,
        source: &str,
    ) -> Result<(), RetryError> {
        let future = self.update_async(resource_group, vm_name, parameters, source).await?;
        self.wait_for_update_result(&future, resource_group, source).await
    }

    async fn update_async(
        &self,
        resource_group: &str,
        vm_name: &str,
        parameters: &VirtualMachineUpdate,
        source: &str,
    ) -> Result<UpdateFuture, RetryError> {
        debug!(resource_group, vm = vm_name, source, "updating virtual machine");
        self.arm
            .patch_resource(&self.vm_id(resource_group, vm_name), self.api_version, parameters)
            .await
    }

    async fn wait_for_update_result(
        &self,
        future: &UpdateFuture,
        resource_group: &str,
        source: &str,
    ) -> Result<(), RetryError> {
        let result = self.arm.wait_for_async_operation(future).await;
        if let Err(err) = &result {
            warn!(resource_group, source, url = %future.resource_url, error = %err, "virtual machine update failed");
        }
        result
    }

    async fn delete(&self, resource_group: &str, vm_name: &str) -> Result<(), RetryError> {
        debug!(resource_group, vm = vm_name, "deleting virtual machine");
        let future = self
            .arm
            .delete_resource(&self.vm_id(resource_group, vm_name), self.api_version)
            .await?;
        self.arm.wait_for_async_operation(&future).await
    }
}

/// Scale set VM instances client.
#[derive(Clone)]
pub struct ArmVmssVmClient {
    arm: ArmClient,
    api_version: &'static str,
}

impl ArmVmssVmClient {
    pub fn new(arm: ArmClient, api_version: &'static str) -> Self {
        Self { arm, api_version }
    }

    fn instances_id(&self, resource_group: &str, scale_set_name: &str) -> String {
        self.arm.resource_id(
            resource_group,
            &format!(
                "Microsoft.Compute/virtualMachineScaleSets/{}/virtualMachines",
                scale_set_name
            ),
        )
    }

    fn instance_id(&self, resource_group: &str, scale_set_name: &str, instance_id: &str) -> String {
        format!("{}/{}", self.instances_id(resource_group, scale_set_name), instance_id)
    }
}

#[async_trait]
impl VmssVmClient for ArmVmssVmClient {
    async fn get(
        &self,
        resource_group: &str,
        scale_set_name: &str,
        instance_id: &str,
        expand: InstanceViewTypes,
    ) -> Result<VirtualMachineScaleSetVm, RetryError> {
        self.arm
            .get_resource(
                &self.instance_id(resource_group, scale_set_name, instance_id),
                self.api_version,
                expand.as_query(),
            )
            .await
    }

    async fn list(
        &self,
        resource_group: &str,
        scale_set_name: &str,
        expand: InstanceViewTypes,
    ) -> Result<Vec<VirtualMachineScaleSetVm>, RetryError> {
        self.arm
            .list_resources(
                &self.instances_id(resource_group, scale_set_name),
                self.api_version,
                expand.as_query(),
            )
            .await
    }

    async fn update(
        &self,
        resource_group: &str,
        scale_set_name: &str,
        instance_id: &str,
        parameters: &VirtualMachineScaleSetVm,
        source: &str,
    ) -> Result<(), RetryError> {
        let future = self
            .update_async(resource_group, scale_set_name, instance_id, parameters, source)
            .await?;
        self.wait_for_update_result(&future, resource_group, source).await
    }

    async fn update_async(
        &self,
        resource_group: &str,
        scale_set_name: &str,
        instance_id: &str,
        parameters: &VirtualMachineScaleSetVm,
        source: &str,
    ) -> Result<UpdateFuture, RetryError> {
        debug!(resource_group, scale_set = scale_set_name, instance_id, source, "updating scale set instance");
        self.arm
            .put_resource(
                &self.instance_id(resource_group, scale_set_name, instance_id),
                self.api_version,
                parameters,
            )
            .await
    }

    async fn wait_for_update_result(
        &self,
        future: &UpdateFuture,
        resource_group: &str,
        source: &str,
    ) -> Result<(), RetryError> {
        let result = self.arm.wait_for_async_operation(future).await;
        if let Err(err) = &result {
            warn!(resource_group, source, url = %future.resource_url, error = %err, "scale set instance update failed");
        }
        result
    }

    async fn update_vms(
        &self,
        resource_group: &str,
        scale_set_name: &str,
        instances: &HashMap<String, VirtualMachineScaleSetVm>,
        source: &str,
    ) -> Result<(), RetryError> {
        let updates = instances.iter().map(|(instance_id, parameters)| {
            self.update(resource_group, scale_set_name, instance_id, parameters, source)
        });

        // First failure wins; the remaining updates still run to completion.
        join_all(updates)
            .await
            .into_iter()
            .find_map(Result::err)
            .map_or(Ok(()), Err)
    }
}
