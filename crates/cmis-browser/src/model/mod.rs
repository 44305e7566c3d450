//! Domain objects: repositories, the five object variants and type definitions.

pub mod context;
pub mod document;
pub mod factory;
pub mod folder;
pub mod item;
pub mod object;
pub mod policy;
pub mod relationship;
pub mod repository;
pub mod type_definition;

pub use context::RepositoryContext;
pub use document::Document;
pub use factory::create_object;
pub use folder::{ChildrenPage, Folder};
pub use item::Item;
pub use object::{BaseType, CmisObject, CmisObjectCore, ObjectCore};
pub use policy::Policy;
pub use relationship::Relationship;
pub use repository::{ObjectReadOptions, Repository, RepositoryInfo};
pub use type_definition::{Cardinality, PropertyDefinition, TypeDefinition, Updatability};
