#![doc = r#"
Client for the CMIS browser binding (HTTP + JSON).

Operation mapping:

| Client method | Wire request | Target URL |
| --- | --- | --- |
| `Server::repositories` | `GET <service>` | service URL |
| `Server::repository` | `GET ?cmisselector=repositoryInfo` | `repositoryUrl` |
| `Repository::get_object` | `GET ?cmisselector=object&objectId=..` | `rootFolderUrl` |
| `Repository::type_definition` | `GET ?cmisselector=typeDefinition&typeId=..` | `repositoryUrl` |
| `Folder::children` | `GET ?cmisselector=children&objectId=..` | `rootFolderUrl` |
| `Document::content` | `GET ?cmisselector=content&objectId=..` | `rootFolderUrl` |
| `Document::create_in_folder` | `POST cmisaction=createDocument` (multipart with content) | `rootFolderUrl` |
| `Folder::create_in_folder` | `POST cmisaction=createFolder` | `rootFolderUrl` |
| `Item::create_in_folder` | `POST cmisaction=createItem` | `rootFolderUrl` |
| `Policy::create_in_folder` | `POST cmisaction=createPolicy` | `rootFolderUrl` |
| `Relationship::create` | `POST cmisaction=createRelationship` | `repositoryUrl` |
| `CmisObjectCore::update_properties` | `POST cmisaction=update` | `rootFolderUrl` |
| `CmisObjectCore::delete` | `POST cmisaction=delete` | `rootFolderUrl` |
| `Folder::delete_tree` | `POST cmisaction=deleteTree` | `rootFolderUrl` |

Implementation notes:
- Repository URLs come from the service root listing and are cached per client in a bounded LRU; a miss refills the cache from the whole listing.
- Parameters are validated before any URL resolution or network access.
- Properties are sent as `propertyId[n]` / `propertyValue[n]` pairs in insertion order; timestamps go out as epoch milliseconds.
- `succinct` is added to every request from `ConnectionConfig::succinct_properties` unless the caller set it.
- Server errors keep their `exception` and `message` verbatim in `CmisError::Request`.
"#]

pub mod config;
pub mod directory;
pub mod error;
pub mod model;
pub mod property;
pub mod request;
pub mod response;
pub mod server;
pub mod service;
pub mod testing;
pub mod transport;

pub use config::{ConnectionConfig, Credentials};
pub use directory::{RepositoryDescriptor, RepositoryDirectory};
pub use error::{CmisError, CmisResult};
pub use model::{
    BaseType, Cardinality, ChildrenPage, CmisObject, CmisObjectCore, Document, Folder, Item,
    ObjectReadOptions, Policy, PropertyDefinition, Relationship, Repository, RepositoryInfo,
    TypeDefinition, Updatability,
};
pub use property::{Properties, PropertyKind, PropertyValue, Scalar};
pub use request::{ContentStream, OperationRequest, RequestBuilder, TransportMode, WireRequest};
pub use response::ResponseBody;
pub use server::Server;
pub use service::BrowserBindingService;
pub use testing::MockCmisServer;
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};
