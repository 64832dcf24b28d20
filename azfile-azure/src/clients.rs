//! Client interfaces for the Azure resources the driver touches.
//!
//! Every call returns [`RetryError`] on failure and never retries on its own.
//! `source` arguments name the caller for logging.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::RetryError;
use crate::models::{
    InstanceViewTypes, Subnet, UpdateFuture, VirtualMachine, VirtualMachineScaleSetVm,
    VirtualMachineUpdate,
};

/// Client for virtual machines.
#[async_trait]
pub trait VirtualMachinesClient: Send + Sync {
    /// Get a virtual machine.
    async fn get(
        &self,
        resource_group: &str,
        vm_name: &str,
        expand: InstanceViewTypes,
    ) -> Result<VirtualMachine, RetryError>;

    /// List the virtual machines in a resource group.
    async fn list(&self, resource_group: &str) -> Result<Vec<VirtualMachine>, RetryError>;

    /// Create or replace a virtual machine.
    async fn create_or_update(
        &self,
        resource_group: &str,
        vm_name: &str,
        parameters: &VirtualMachine,
        source: &str,
    ) -> Result<(), RetryError>;

    /// Update a virtual machine and wait for the result.
    async fn update(
        &self,
        resource_group: &str,
        vm_name: &str,
        parameters: &VirtualMachineUpdate,
        source: &str,
    ) -> Result<(), RetryError>;

    /// Start an update without waiting for it to finish.
    async fn update_async(
        &self,
        resource_group: &str,
        vm_name: &str,
        parameters: &VirtualMachineUpdate,
        source: &str,
    ) -> Result<UpdateFuture, RetryError>;

    /// Wait for an update started with [`update_async`](Self::update_async).
    async fn wait_for_update_result(
        &self,
        future: &UpdateFuture,
        resource_group: &str,
        source: &str,
    ) -> Result<(), RetryError>;

    /// Delete a virtual machine.
    async fn delete(&self, resource_group: &str, vm_name: &str) -> Result<(), RetryError>;
}

/// Client for scale set VM instances.
#[async_trait]
pub trait VmssVmClient: Send + Sync {
    /// Get one instance.
    async fn get(
        &self,
        resource_group: &str,
        scale_set_name: &str,
        instance_id: &str,
        expand: InstanceViewTypes,
    ) -> Result<VirtualMachineScaleSetVm, RetryError>;

    /// List the instances of a scale set.
    async fn list(
        &self,
        resource_group: &str,
        scale_set_name: &str,
        expand: InstanceViewTypes,
    ) -> Result<Vec<VirtualMachineScaleSetVm>, RetryError>;

    /// Update one instance and wait for the result.
    async fn update(
        &self,
        resource_group: &str,
        scale_set_name: &str,
        instance_id: &str,
        parameters: &VirtualMachineScaleSetVm,
        source: &str,
    ) -> Result<(), RetryError>;

    /// Start an instance update without waiting for it to finish.
    async fn update_async(
        &self,
        resource_group: &str,
        scale_set_name: &str,
        instance_id: &str,
        parameters: &VirtualMachineScaleSetVm,
        source: &str,
    ) -> Result<UpdateFuture, RetryError>;

    /// Wait for an update started with [`update_async`](Self::update_async).
    async fn wait_for_update_result(
        &self,
        future: &UpdateFuture,
        resource_group: &str,
        source: &str,
    ) -> Result<(), RetryError>;

    /// Update several instances, keyed by instance id.
    async fn update_vms(
        &self,
        resource_group: &str,
        scale_set_name: &str,
        instances: &HashMap<String, VirtualMachineScaleSetVm>,
        source: &str,
    ) -> Result<(), RetryError>;
}

/// Client for virtual network subnets.
#[async_trait]
pub trait SubnetsClient: Send + Sync {
    /// Get a subnet, `expand` is passed through as `$expand` when non-empty.
    async fn get(
        &self,
        resource_group: &str,
        virtual_network_name: &str,
        subnet_name: &str,
        expand: &str,
    ) -> Result<Subnet, RetryError>;

    /// Create or replace a subnet.
    async fn create_or_update(
        &self,
        resource_group: &str,
        virtual_network_name: &str,
        subnet_name: &str,
        subnet: &Subnet,
    ) -> Result<(), RetryError>;
}
