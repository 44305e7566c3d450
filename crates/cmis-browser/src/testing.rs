use crate::error::{CmisError, CmisResult, OBJECT_NOT_FOUND_EXCEPTION};
use crate::property::{self, Properties, PropertyKind, PropertyValue, Scalar};
use crate::request::{CMIS_ACTION, CMIS_SELECTOR, ContentStream, OBJECT_ID_PARAM, TransportMode};
use crate::transport::{HttpRequest, HttpResponse, Transport};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{TimeZone, Utc};
use indexmap::IndexMap;
use serde_json::{Value, json};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};

pub const MOCK_SERVICE_URL: &str = "http://mock.cmis/browser";

const MOCK_EPOCH_MILLIS: i64 = 1_700_000_000_000;

/// In-memory browser binding endpoint. Answers the service root listing,
/// the common selectors and the create/update/delete actions.
#[derive(Clone, Debug, Default)]
pub struct MockCmisServer {
    inner: Arc<Mutex<MockCmisState>>,
}

#[derive(Clone, Debug, Default)]
struct MockCmisState {
    next_object_id: u64,
    repositories: BTreeMap<String, MockRepository>,
    requests: Vec<HttpRequest>,
    directory_fetches: usize,
    queued: VecDeque<HttpResponse>,
    unreachable: bool,
}

#[derive(Clone, Debug)]
struct MockRepository {
    name: String,
    objects: IndexMap<String, StoredObject>,
}

#[derive(Clone, Debug)]
struct StoredObject {
    properties: Properties,
    content: Option<ContentStream>,
}

impl StoredObject {
    fn str_property(&self, id: &str) -> Option<&str> {
        self.properties.get(id).and_then(PropertyValue::as_str)
    }

    fn is_folder(&self) -> bool {
        self.str_property(property::BASE_TYPE_ID) == Some("cmis:folder")
    }
}

fn root_folder_id(repository_id: &str) -> String {
    format!("{repository_id}-root")
}

fn repository_url(repository_id: &str) -> String {
    format!("{MOCK_SERVICE_URL}/{repository_id}")
}

fn root_folder_url(repository_id: &str) -> String {
    format!("{MOCK_SERVICE_URL}/{repository_id}/root")
}

fn failure(status: u16, exception: &str, message: impl Into<String>) -> HttpResponse {
    HttpResponse::json(
        status,
        &json!({"exception": exception, "message": message.into()}),
    )
}

fn not_found(object_id: &str) -> HttpResponse {
    failure(
        404,
        OBJECT_NOT_FOUND_EXCEPTION,
        format!("object {object_id} not found"),
    )
}

fn empty_ok() -> HttpResponse {
    HttpResponse {
        status: 200,
        content_type: None,
        body: Bytes::new(),
    }
}

impl MockRepository {
    fn new(repository_id: &str, name: &str) -> Self {
        let root_id = root_folder_id(repository_id);
        let mut properties = Properties::new();
        properties.insert(property::OBJECT_ID.to_string(), PropertyValue::id(&root_id));
        properties.insert(
            property::BASE_TYPE_ID.to_string(),
            PropertyValue::id("cmis:folder"),
        );
        properties.insert(
            property::OBJECT_TYPE_ID.to_string(),
            PropertyValue::id("cmis:folder"),
        );
        properties.insert(property::NAME.to_string(), PropertyValue::string(""));
        properties.insert(property::PATH.to_string(), PropertyValue::string("/"));

        let mut objects = IndexMap::new();
        objects.insert(
            root_id,
            StoredObject {
                properties,
                content: None,
            },
        );
        Self {
            name: name.to_string(),
            objects,
        }
    }

    fn info(&self, repository_id: &str) -> Value {
        json!({
            "repositoryId": repository_id,
            "repositoryName": self.name,
            "repositoryDescription": format!("mock repository {repository_id}"),
            "vendorName": "cmis-browser",
            "productName": "MockCmisServer",
            "productVersion": env!("CARGO_PKG_VERSION"),
            "rootFolderId": root_folder_id(repository_id),
            "cmisVersionSupported": "1.1",
            "repositoryUrl": repository_url(repository_id),
            "rootFolderUrl": root_folder_url(repository_id),
        })
    }

    fn descendants(&self, folder_id: &str) -> Vec<String> {
        let mut found = Vec::new();
        let mut pending = vec![folder_id.to_string()];
        while let Some(parent) = pending.pop() {
            for (id, object) in &self.objects {
                if object.str_property(property::PARENT_ID) == Some(parent.as_str()) {
                    found.push(id.clone());
                    if object.is_folder() {
                        pending.push(id.clone());
                    }
                }
            }
        }
        found
    }
}

impl MockCmisServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a repository whose root folder id is `<id>-root`.
    pub fn with_repository(self, repository_id: &str, name: &str) -> Self {
        self.add_repository(repository_id, name);
        self
    }

    pub fn add_repository(&self, repository_id: &str, name: &str) {
        if let Ok(mut state) = self.inner.lock() {
            state.repositories.insert(
                repository_id.to_string(),
                MockRepository::new(repository_id, name),
            );
        }
    }

    /// Answers the next request with `response` instead of the simulated repository.
    pub fn enqueue_response(&self, response: HttpResponse) {
        if let Ok(mut state) = self.inner.lock() {
            state.queued.push_back(response);
        }
    }

    /// Makes every request fail at the transport level.
    pub fn set_unreachable(&self, unreachable: bool) {
        if let Ok(mut state) = self.inner.lock() {
            state.unreachable = unreachable;
        }
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.inner
            .lock()
            .map(|state| state.requests.clone())
            .unwrap_or_default()
    }

    pub fn request_count(&self) -> usize {
        self.inner
            .lock()
            .map(|state| state.requests.len())
            .unwrap_or_default()
    }

    /// Number of service root listings served.
    pub fn directory_fetches(&self) -> usize {
        self.inner
            .lock()
            .map(|state| state.directory_fetches)
            .unwrap_or_default()
    }

    pub fn object_count(&self, repository_id: &str) -> usize {
        self.inner
            .lock()
            .ok()
            .and_then(|state| {
                state
                    .repositories
                    .get(repository_id)
                    .map(|repository| repository.objects.len())
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl Transport for MockCmisServer {
    async fn execute(&self, request: HttpRequest) -> CmisResult<HttpResponse> {
        let mut state = self
            .inner
            .lock()
            .map_err(|_| CmisError::Transport("mock backend mutex poisoned".to_string()))?;
        state.requests.push(request.clone());

        if state.unreachable {
            return Err(CmisError::Transport(format!(
                "connection refused: {}",
                request.url
            )));
        }
        if let Some(response) = state.queued.pop_front() {
            return Ok(response);
        }
        Ok(state.handle(&request))
    }
}

impl MockCmisState {
    fn handle(&mut self, request: &HttpRequest) -> HttpResponse {
        let url = request.url.trim_end_matches('/');
        if url == MOCK_SERVICE_URL {
            self.directory_fetches += 1;
            return HttpResponse::json(200, &self.listing());
        }

        let Some(path) = url.strip_prefix(&format!("{MOCK_SERVICE_URL}/")) else {
            return HttpResponse {
                status: 404,
                content_type: Some("text/html".to_string()),
                body: Bytes::from(format!("<h1>no route for {url}</h1>")),
            };
        };
        let repository_id = path.trim_end_matches("/root").to_string();
        if !self.repositories.contains_key(&repository_id) {
            return failure(
                404,
                OBJECT_NOT_FOUND_EXCEPTION,
                format!("repository {repository_id} not found"),
            );
        }

        let succinct = request.param("succinct") != Some("false");
        if let Some(selector) = request.param(CMIS_SELECTOR) {
            if request.mode != TransportMode::Get {
                return failure(400, "invalidArgument", "selectors are read with GET");
            }
            return self.read(&repository_id, selector, request, succinct);
        }
        if let Some(action) = request.param(CMIS_ACTION) {
            if request.mode == TransportMode::Get {
                return failure(400, "invalidArgument", "actions are sent with POST");
            }
            if request.content.is_some() && request.mode != TransportMode::PostMultipart {
                return failure(400, "invalidArgument", "content requires a multipart body");
            }
            return self.write(&repository_id, action, request, succinct);
        }
        failure(400, "invalidArgument", "missing cmisselector or cmisaction")
    }

    fn listing(&self) -> Value {
        let mut listing = serde_json::Map::new();
        for (id, repository) in &self.repositories {
            listing.insert(id.clone(), repository.info(id));
        }
        Value::Object(listing)
    }

    fn read(
        &self,
        repository_id: &str,
        selector: &str,
        request: &HttpRequest,
        succinct: bool,
    ) -> HttpResponse {
        let Some(repository) = self.repositories.get(repository_id) else {
            return not_found(repository_id);
        };
        let object_id = request.param(OBJECT_ID_PARAM).unwrap_or_default();

        match selector {
            "repositoryInfo" => {
                HttpResponse::json(200, &json!({ repository_id: repository.info(repository_id) }))
            }
            "object" => match repository.objects.get(object_id) {
                Some(object) => HttpResponse::json(200, &object_json(object, succinct)),
                None => not_found(object_id),
            },
            "children" => {
                let Some(folder) = repository.objects.get(object_id) else {
                    return not_found(object_id);
                };
                if !folder.is_folder() {
                    return failure(400, "invalidArgument", format!("{object_id} is not a folder"));
                }
                let children: Vec<&StoredObject> = repository
                    .objects
                    .values()
                    .filter(|object| object.str_property(property::PARENT_ID) == Some(object_id))
                    .collect();
                let skip = numeric_param(request, "skipCount").unwrap_or(0);
                let max = numeric_param(request, "maxItems").unwrap_or(usize::MAX);
                let page: Vec<Value> = children
                    .iter()
                    .skip(skip)
                    .take(max)
                    .map(|object| json!({ "object": object_json(object, succinct) }))
                    .collect();
                HttpResponse::json(
                    200,
                    &json!({
                        "objects": page,
                        "hasMoreItems": skip.saturating_add(max) < children.len(),
                        "numItems": children.len(),
                    }),
                )
            }
            "content" => match repository.objects.get(object_id) {
                Some(StoredObject {
                    content: Some(content),
                    ..
                }) => HttpResponse {
                    status: 200,
                    content_type: Some(content.mime_type.clone()),
                    body: content.data.clone(),
                },
                Some(_) => failure(409, "constraint", format!("{object_id} has no content stream")),
                None => not_found(object_id),
            },
            "typeDefinition" => {
                let type_id = request.param("typeId").unwrap_or_default();
                match type_definition(type_id) {
                    Some(definition) => HttpResponse::json(200, &definition),
                    None => not_found(type_id),
                }
            }
            other => failure(400, "notSupported", format!("selector {other}")),
        }
    }

    fn write(
        &mut self,
        repository_id: &str,
        action: &str,
        request: &HttpRequest,
        succinct: bool,
    ) -> HttpResponse {
        let object_id = request.param(OBJECT_ID_PARAM).unwrap_or_default().to_string();
        match action {
            "createDocument" => self.create(repository_id, "cmis:document", request, succinct),
            "createFolder" => self.create(repository_id, "cmis:folder", request, succinct),
            "createItem" => self.create(repository_id, "cmis:item", request, succinct),
            "createPolicy" => self.create(repository_id, "cmis:policy", request, succinct),
            "createRelationship" => {
                self.create(repository_id, "cmis:relationship", request, succinct)
            }
            "delete" | "deleteObject" => {
                let Some(repository) = self.repositories.get_mut(repository_id) else {
                    return not_found(repository_id);
                };
                if !repository.objects.contains_key(&object_id) {
                    return not_found(&object_id);
                }
                if object_id == root_folder_id(repository_id) {
                    return failure(409, "constraint", "the root folder cannot be deleted");
                }
                if !repository.descendants(&object_id).is_empty() {
                    return failure(409, "constraint", format!("folder {object_id} is not empty"));
                }
                repository.objects.shift_remove(&object_id);
                empty_ok()
            }
            "deleteTree" => {
                let Some(repository) = self.repositories.get_mut(repository_id) else {
                    return not_found(repository_id);
                };
                if !repository
                    .objects
                    .get(&object_id)
                    .is_some_and(StoredObject::is_folder)
                {
                    return not_found(&object_id);
                }
                for id in repository.descendants(&object_id) {
                    repository.objects.shift_remove(&id);
                }
                repository.objects.shift_remove(&object_id);
                empty_ok()
            }
            "update" => {
                let updates = match decode_properties(&request.params) {
                    Ok(updates) => updates,
                    Err(message) => return failure(400, "invalidArgument", message),
                };
                let Some(repository) = self.repositories.get_mut(repository_id) else {
                    return not_found(repository_id);
                };
                let Some(object) = repository.objects.get_mut(&object_id) else {
                    return not_found(&object_id);
                };
                if let (Some(sent), Some(current)) = (
                    request.param("changeToken"),
                    object.str_property(property::CHANGE_TOKEN),
                ) {
                    if sent != current {
                        return failure(409, "updateConflict", "change token is stale");
                    }
                }
                let next_token = object
                    .str_property(property::CHANGE_TOKEN)
                    .and_then(|token| token.parse::<u64>().ok())
                    .unwrap_or(0)
                    + 1;
                object.properties.extend(updates);
                object.properties.insert(
                    property::CHANGE_TOKEN.to_string(),
                    PropertyValue::string(next_token.to_string()),
                );
                HttpResponse::json(200, &object_json(object, succinct))
            }
            other => failure(400, "notSupported", format!("action {other}")),
        }
    }

    fn create(
        &mut self,
        repository_id: &str,
        base_type_id: &str,
        request: &HttpRequest,
        succinct: bool,
    ) -> HttpResponse {
        let mut properties = match decode_properties(&request.params) {
            Ok(properties) => properties,
            Err(message) => return failure(400, "invalidArgument", message),
        };
        let Some(name) = properties
            .get(property::NAME)
            .and_then(PropertyValue::as_str)
            .map(str::to_string)
        else {
            return failure(409, "constraint", "cmis:name is required");
        };

        self.next_object_id += 1;
        let sequence = self.next_object_id;
        let Some(repository) = self.repositories.get_mut(repository_id) else {
            return not_found(repository_id);
        };

        let parent = request.param(OBJECT_ID_PARAM);
        if base_type_id == "cmis:relationship" {
            for endpoint in [property::SOURCE_ID, property::TARGET_ID] {
                let target = properties.get(endpoint).and_then(PropertyValue::as_str);
                match target {
                    Some(id) if repository.objects.contains_key(id) => {}
                    Some(id) => return not_found(id),
                    None => return failure(409, "constraint", format!("{endpoint} is required")),
                }
            }
        } else {
            let Some(parent_id) = parent else {
                return failure(409, "constraint", "fileable objects need a folder");
            };
            let Some(folder) = repository.objects.get(parent_id) else {
                return not_found(parent_id);
            };
            if !folder.is_folder() {
                return failure(400, "invalidArgument", format!("{parent_id} is not a folder"));
            }
            let duplicate = repository.objects.values().any(|object| {
                object.str_property(property::PARENT_ID) == Some(parent_id)
                    && object.str_property(property::NAME) == Some(name.as_str())
            });
            if duplicate {
                return failure(409, "nameConstraintViolation", format!("{name} already exists"));
            }
            properties.insert(property::PARENT_ID.to_string(), PropertyValue::id(parent_id));
            if base_type_id == "cmis:folder" {
                let parent_path = folder.str_property(property::PATH).unwrap_or("/");
                let path = format!("{}/{name}", parent_path.trim_end_matches('/'));
                properties.insert(property::PATH.to_string(), PropertyValue::string(path));
            }
        }

        let object_id = format!("{repository_id}-{sequence}");
        let created_at = Utc
            .timestamp_millis_opt(MOCK_EPOCH_MILLIS + sequence as i64 * 1000)
            .single()
            .unwrap_or_default();
        properties.insert(property::OBJECT_ID.to_string(), PropertyValue::id(&object_id));
        properties.insert(
            property::BASE_TYPE_ID.to_string(),
            PropertyValue::id(base_type_id),
        );
        properties
            .entry(property::OBJECT_TYPE_ID.to_string())
            .or_insert_with(|| PropertyValue::id(base_type_id));
        properties.insert(property::CREATED_BY.to_string(), PropertyValue::string("mock"));
        properties.insert(
            property::CREATION_DATE.to_string(),
            PropertyValue::datetime(created_at),
        );
        properties.insert(
            property::LAST_MODIFICATION_DATE.to_string(),
            PropertyValue::datetime(created_at),
        );
        properties.insert(property::CHANGE_TOKEN.to_string(), PropertyValue::string("1"));

        let content = request.content.clone().filter(|_| base_type_id == "cmis:document");
        if let Some(content) = &content {
            properties.insert(
                property::CONTENT_STREAM_LENGTH.to_string(),
                PropertyValue::integer(content.data.len() as i64),
            );
            properties.insert(
                property::CONTENT_STREAM_MIME_TYPE.to_string(),
                PropertyValue::string(&content.mime_type),
            );
            properties.insert(
                property::CONTENT_STREAM_FILE_NAME.to_string(),
                PropertyValue::string(&content.filename),
            );
            properties.insert(
                property::CONTENT_STREAM_ID.to_string(),
                PropertyValue::id(format!("{object_id}-content")),
            );
        }

        let object = StoredObject {
            properties,
            content,
        };
        let body = object_json(&object, succinct);
        repository.objects.insert(object_id, object);
        HttpResponse::json(201, &body)
    }
}

fn numeric_param(request: &HttpRequest, key: &str) -> Option<usize> {
    request.param(key).and_then(|value| value.parse().ok())
}

fn object_json(object: &StoredObject, succinct: bool) -> Value {
    property::properties_to_object_json(&object.properties, succinct)
}

/// Reads `propertyId[n]` / `propertyValue[n]` / `propertyValue[n][m]` form fields.
fn decode_properties(params: &[(String, String)]) -> Result<Properties, String> {
    let mut ids: BTreeMap<usize, String> = BTreeMap::new();
    let mut single: BTreeMap<usize, String> = BTreeMap::new();
    let mut multi: BTreeMap<usize, BTreeMap<usize, String>> = BTreeMap::new();

    for (key, value) in params {
        if let Some(index) = bracketed(key, "propertyId") {
            let index = index.parse().map_err(|_| format!("bad property key {key}"))?;
            ids.insert(index, value.clone());
        } else if let Some(rest) = bracketed(key, "propertyValue") {
            match rest.split_once("][") {
                Some((index, position)) => {
                    let index = index.parse().map_err(|_| format!("bad property key {key}"))?;
                    let position = position
                        .parse()
                        .map_err(|_| format!("bad property key {key}"))?;
                    multi.entry(index).or_default().insert(position, value.clone());
                }
                None => {
                    let index = rest.parse().map_err(|_| format!("bad property key {key}"))?;
                    single.insert(index, value.clone());
                }
            }
        }
    }

    let mut properties = Properties::new();
    for (index, id) in ids {
        let kind = mock_property_kind(&id);
        let value = if let Some(values) = multi.remove(&index) {
            let scalars = values
                .into_values()
                .map(|raw| Scalar::from_json(kind, &Value::String(raw)))
                .collect::<CmisResult<Vec<_>>>()
                .map_err(|err| err.to_string())?;
            PropertyValue::multi(kind, scalars).map_err(|err| err.to_string())?
        } else if let Some(raw) = single.remove(&index) {
            PropertyValue::single(
                Scalar::from_json(kind, &Value::String(raw)).map_err(|err| err.to_string())?,
            )
        } else {
            PropertyValue::unset(kind)
        };
        properties.insert(id, value);
    }
    Ok(properties)
}

/// `prefix[...]` to the text between the outer brackets.
fn bracketed<'a>(key: &'a str, prefix: &str) -> Option<&'a str> {
    key.strip_prefix(prefix)?
        .strip_prefix('[')?
        .strip_suffix(']')
}

fn mock_property_kind(id: &str) -> PropertyKind {
    match id {
        property::CREATION_DATE | property::LAST_MODIFICATION_DATE => PropertyKind::DateTime,
        property::OBJECT_TYPE_ID | property::SOURCE_ID | property::TARGET_ID => PropertyKind::Id,
        _ => PropertyKind::String,
    }
}

fn type_definition(type_id: &str) -> Option<Value> {
    let (fileable, display_name) = match type_id {
        "cmis:document" => (true, "Document"),
        "cmis:folder" => (true, "Folder"),
        "cmis:item" => (true, "Item"),
        "cmis:policy" => (true, "Policy"),
        "cmis:relationship" => (false, "Relationship"),
        _ => return None,
    };
    Some(json!({
        "id": type_id,
        "localName": type_id.trim_start_matches("cmis:"),
        "displayName": display_name,
        "baseId": type_id,
        "parentId": null,
        "creatable": true,
        "fileable": fileable,
        "queryable": true,
        "propertyDefinitions": {
            "cmis:name": {
                "id": "cmis:name",
                "propertyType": "string",
                "cardinality": "single",
                "updatability": "readwrite",
                "required": true,
                "queryable": true
            },
            "cmis:objectId": {
                "id": "cmis:objectId",
                "propertyType": "id",
                "cardinality": "single",
                "updatability": "readonly",
                "required": false,
                "queryable": true
            },
            "cmis:objectTypeId": {
                "id": "cmis:objectTypeId",
                "propertyType": "id",
                "cardinality": "single",
                "updatability": "oncreate",
                "required": true,
                "queryable": true
            },
            "cmis:creationDate": {
                "id": "cmis:creationDate",
                "propertyType": "datetime",
                "cardinality": "single",
                "updatability": "readonly",
                "required": false,
                "queryable": true
            }
        }
    }))
}
