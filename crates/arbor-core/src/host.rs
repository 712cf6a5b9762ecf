//! Host adapter contract.
//!
//! The engine never touches a concrete rendering target. Everything it needs
//! from one goes through [`HostConfig`]; the same handle type stands for host
//! elements, text nodes, and the root container.

use std::fmt::Debug;

use crate::element::Attributes;
use crate::error::HostError;

pub trait HostConfig {
    type Instance: Clone + PartialEq + Debug + 'static;

    fn create_instance(&mut self, tag: &str, attrs: &Attributes) -> Result<Self::Instance, HostError>;

    fn create_text_instance(&mut self, text: &str) -> Result<Self::Instance, HostError>;

    /// Attaches `child` to a parent that is not yet part of the visible tree.
    fn append_initial_child(
        &mut self,
        parent: &Self::Instance,
        child: &Self::Instance,
    ) -> Result<(), HostError>;

    /// Appends `child` as the last child of `container`, moving it if it is
    /// already attached.
    fn append_child_to_container(
        &mut self,
        container: &Self::Instance,
        child: &Self::Instance,
    ) -> Result<(), HostError>;

    fn insert_child_to_container(
        &mut self,
        child: &Self::Instance,
        container: &Self::Instance,
        before: &Self::Instance,
    ) -> Result<(), HostError>;

    fn remove_child(
        &mut self,
        child: &Self::Instance,
        container: &Self::Instance,
    ) -> Result<(), HostError>;

    fn commit_text_update(&mut self, instance: &Self::Instance, text: &str) -> Result<(), HostError>;

    /// Applies changed attributes to an existing element. Hosts that cannot
    /// patch attributes in place keep the default.
    fn commit_update(
        &mut self,
        _instance: &Self::Instance,
        _tag: &str,
        _attrs: &Attributes,
    ) -> Result<(), HostError> {
        Ok(())
    }
}
