//! Resources that converge a compiled module
//!
//! Every step of a compiled module is modeled as a declarative Resource:
//! - [`LoadGuard`]: immediate load or unload, gated by live module state
//! - [`ManagedFile`]: a unit file or boot script owned by this tool
//! - [`StructuredEdit`]: one entry in a shared structured config file
//! - [`FileOwnership`]: owner, group and mode of an edited config file

mod file_attributes;
mod load_guard;
mod managed_file;
mod structured_edit;

pub use file_attributes::FileOwnership;
pub use load_guard::LoadGuard;
pub use managed_file::ManagedFile;
pub use structured_edit::StructuredEdit;

pub use declarative::{ApplyContext, ApplyResult, BoxedResource, Resource, ResourceState};

use crate::backend::Collaborators;
use crate::compiler::{CompiledModule, PersistenceArtifact};

/// Resources for a compiled module, in the order they are applied.
///
/// The load guard always comes first. Persistence follows when the host has
/// a mechanism for it.
pub fn resources_for(compiled: &CompiledModule, collaborators: &Collaborators) -> Vec<BoxedResource> {
    let mut resources: Vec<BoxedResource> = vec![Box::new(LoadGuard::new(
        compiled.guard.clone(),
        collaborators.clone(),
    ))];

    match compiled.artifact() {
        Some(PersistenceArtifact::UnitFile(file)) => {
            resources.push(Box::new(ManagedFile::unit_file(
                file.clone(),
                collaborators.clone(),
            )));
        }
        Some(PersistenceArtifact::ScriptFile(file)) => {
            resources.push(Box::new(ManagedFile::script_file(
                file.clone(),
                collaborators.clone(),
            )));
        }
        Some(PersistenceArtifact::StructuredEdit(edit)) => {
            resources.push(Box::new(StructuredEdit::new(
                compiled.request.name.clone(),
                edit.clone(),
                collaborators.clone(),
            )));
            resources.push(Box::new(FileOwnership::new(
                edit.target.clone(),
                edit.attributes.clone(),
                collaborators.clone(),
            )));
        }
        None => {}
    }

    resources
}
