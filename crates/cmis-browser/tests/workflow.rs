use std::sync::Arc;

use bytes::Bytes;
use cmis_browser::request::OBJECT_ID_PARAM;
use cmis_browser::testing::MOCK_SERVICE_URL;
use cmis_browser::{
    BaseType, CmisError, CmisObject, CmisObjectCore, ConnectionConfig, Document, Folder,
    HttpResponse, MockCmisServer, Properties, PropertyValue, Repository, Server, TransportMode,
};
use pretty_assertions::assert_eq;
use serde_json::json;

fn server_with(mock: &MockCmisServer, succinct: bool) -> Server {
    Server::with_transport(
        ConnectionConfig::new(MOCK_SERVICE_URL).with_succinct_properties(succinct),
        Arc::new(mock.clone()),
    )
    .expect("mock config is valid")
}

async fn test_repository(succinct: bool) -> (MockCmisServer, Server, Repository) {
    let mock = MockCmisServer::new().with_repository("test_document", "Test documents");
    let server = server_with(&mock, succinct);
    let repository = server
        .repository("test_document")
        .await
        .expect("repository should load");
    (mock, server, repository)
}

#[tokio::test(flavor = "current_thread")]
async fn document_create_in_folder_with_content_expected_content_roundtrip() {
    let (mock, _server, repository) = test_repository(true).await;

    let mut new_object = repository.new_document();
    new_object.set_name("doc1");
    new_object.set_object_type_id("cmis:document");
    new_object
        .set_content("content1", "text/plain", "doc1.txt")
        .expect("detached document accepts content");

    let document = new_object
        .create_in_folder(repository.root_folder_id())
        .await
        .expect("create should succeed");

    assert_eq!(document.name(), Some("doc1"));
    assert_eq!(document.content_stream_mime_type(), Some("text/plain"));
    assert_eq!(document.content_stream_file_name(), Some("doc1.txt"));
    assert_eq!(document.content_stream_length(), Some(8));
    assert_eq!(
        document.content().await.expect("content should load"),
        Bytes::from_static(b"content1")
    );

    let create = mock
        .requests()
        .into_iter()
        .find(|request| request.param("cmisaction") == Some("createDocument"))
        .expect("create request recorded");
    assert_eq!(create.mode, TransportMode::PostMultipart);
    assert_eq!(create.param("propertyId[0]"), Some("cmis:objectTypeId"));
    assert_eq!(create.param("propertyValue[1]"), Some("doc1"));
    assert_eq!(create.param("succinct"), Some("true"));
    assert_eq!(create.param(OBJECT_ID_PARAM), Some("test_document-root"));
    assert!(create.url.ends_with("/test_document/root"));

    document.delete().await.expect("delete should succeed");
}

#[tokio::test(flavor = "current_thread")]
async fn document_create_in_folder_without_content_expected_form_post() {
    let (mock, _server, repository) = test_repository(true).await;

    let mut new_object = repository.new_document();
    new_object.set_name("doc2");
    new_object.set_object_type_id("cmis:document");
    let document = new_object
        .create_in_folder(repository.root_folder_id())
        .await
        .expect("create should succeed");

    assert_eq!(document.name(), Some("doc2"));
    assert!(!document.has_content());
    assert_eq!(document.content_stream_mime_type(), None);

    let create = mock
        .requests()
        .into_iter()
        .find(|request| request.param("cmisaction") == Some("createDocument"))
        .expect("create request recorded");
    assert_eq!(create.mode, TransportMode::PostForm);
    assert!(create.content.is_none());

    document.delete().await.expect("delete should succeed");
}

#[tokio::test(flavor = "current_thread")]
async fn object_delete_then_fetch_expected_not_found() {
    let (mock, _server, repository) = test_repository(true).await;

    let mut new_object = repository.new_document();
    new_object.set_name("short-lived");
    let document = new_object
        .create_in_folder(repository.root_folder_id())
        .await
        .unwrap();
    let object_id = document.object_id().unwrap().to_string();
    assert_eq!(mock.object_count("test_document"), 2);

    document.delete().await.expect("first delete succeeds");

    let error = repository.get_object(&object_id).await.unwrap_err();
    assert!(error.is_not_found(), "unexpected error: {error}");
    assert_eq!(error.exception(), Some("objectNotFound"));

    let second = document.delete().await.unwrap_err();
    assert!(second.is_not_found());
    assert!(!repository.object_exists(&object_id).await.unwrap());
}

#[tokio::test(flavor = "current_thread")]
async fn set_content_on_persisted_document_expected_unsupported() {
    let (_mock, _server, repository) = test_repository(true).await;
    let mut new_object = repository.new_document();
    new_object.set_name("doc3");
    let mut document = new_object
        .create_in_folder(repository.root_folder_id())
        .await
        .unwrap();

    let error = document
        .set_content("content3", "text/plain", "doc3.txt")
        .unwrap_err();
    assert!(matches!(error, CmisError::Unsupported(_)));
}

#[tokio::test(flavor = "current_thread")]
async fn repository_resolution_twice_expected_single_directory_fetch() {
    let (mock, server, repository) = test_repository(true).await;
    assert_eq!(mock.directory_fetches(), 1);

    repository.root_folder().await.unwrap();
    server.repository("test_document").await.unwrap();
    assert_eq!(mock.directory_fetches(), 1);
    assert_eq!(server.directory().refill_count(), 1);

    server.directory().evict("test_document").await;
    server.repository("test_document").await.unwrap();
    assert_eq!(mock.directory_fetches(), 2);
}

#[tokio::test(flavor = "current_thread")]
async fn concurrent_repository_lookups_expected_single_directory_fetch() {
    let mock = MockCmisServer::new()
        .with_repository("r1", "One")
        .with_repository("r2", "Two");
    let server = server_with(&mock, true);

    let (one, two, again) = tokio::join!(
        server.repository("r1"),
        server.repository("r2"),
        server.repository("r1"),
    );
    assert_eq!(one.unwrap().name(), Some("One"));
    assert_eq!(two.unwrap().name(), Some("Two"));
    assert!(again.is_ok());
    assert_eq!(mock.directory_fetches(), 1);
}

#[tokio::test(flavor = "current_thread")]
async fn unknown_repository_expected_repository_not_found() {
    let mock = MockCmisServer::new().with_repository("r1", "One");
    let server = server_with(&mock, true);

    let error = server.repository("missing").await.unwrap_err();
    assert!(matches!(error, CmisError::RepositoryNotFound(ref id) if id == "missing"));
    assert!(!server.repository_exists("missing").await.unwrap());
    assert!(server.repository_exists("r1").await.unwrap());

    let listed = server.repositories().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].operation_url, format!("{MOCK_SERVICE_URL}/r1"));
}

#[tokio::test(flavor = "current_thread")]
async fn invalid_include_relationships_expected_no_network_call() {
    let (mock, _server, repository) = test_repository(true).await;
    let before = mock.request_count();

    let options = cmis_browser::ObjectReadOptions {
        include_relationships: Some("sideways".to_string()),
        ..Default::default()
    };
    let error = repository
        .get_object_with(repository.root_folder_id(), &options)
        .await
        .unwrap_err();

    assert!(matches!(
        error,
        CmisError::InvalidParameterValue { ref parameter, .. } if parameter == "includeRelationships"
    ));
    assert_eq!(mock.request_count(), before);
}

#[tokio::test(flavor = "current_thread")]
async fn invalid_parameter_on_cold_cache_expected_no_directory_fetch() {
    let mock = MockCmisServer::new().with_repository("r1", "One");
    let server = server_with(&mock, true);
    let request = cmis_browser::OperationRequest::repository("r1")
        .selector("object")
        .object_id("r1-root")
        .optional("includeRelationships", Some("everything"));

    let error = server.service().perform(request).await.unwrap_err();
    assert!(matches!(error, CmisError::InvalidParameterValue { .. }));
    assert_eq!(mock.request_count(), 0);
    assert_eq!(mock.directory_fetches(), 0);
}

#[tokio::test(flavor = "current_thread")]
async fn folder_tree_children_and_delete_tree() {
    let (mock, _server, repository) = test_repository(false).await;
    let root = repository.root_folder().await.unwrap();
    assert_eq!(root.path(), Some("/"));

    let mut projects = repository.new_folder();
    projects.set_name("projects");
    let projects: Folder = root
        .create(CmisObject::Folder(projects))
        .await
        .unwrap()
        .try_into()
        .unwrap();
    assert_eq!(projects.path(), Some("/projects"));
    assert_eq!(projects.parent_id(), Some(repository.root_folder_id()));

    for name in ["a.txt", "b.txt", "c.txt"] {
        let mut document = repository.new_document();
        document.set_name(name);
        document
            .set_content(name.as_bytes().to_vec(), "text/plain", name)
            .unwrap();
        projects.create(document.into()).await.unwrap();
    }

    let children = projects.children().await.unwrap();
    let names: Vec<&str> = children
        .iter()
        .filter_map(|child| child.as_core().name())
        .collect();
    assert_eq!(names, vec!["a.txt", "b.txt", "c.txt"]);
    assert!(children.iter().all(|child| child.base_type() == BaseType::Document));

    let page = projects.children_page(Some(2), None).await.unwrap();
    assert_eq!(page.objects.len(), 2);
    assert!(page.has_more_items);
    assert_eq!(page.num_items, Some(3));

    let error = projects.delete().await.unwrap_err();
    assert_eq!(error.exception(), Some("constraint"));

    let failed = projects
        .delete_tree(true, Some("delete"), true)
        .await
        .unwrap();
    assert!(failed.is_empty());
    assert_eq!(mock.object_count("test_document"), 1);
}

#[tokio::test(flavor = "current_thread")]
async fn delete_tree_with_bad_unfile_objects_expected_invalid_parameter() {
    let (_mock, _server, repository) = test_repository(true).await;
    let root = repository.root_folder().await.unwrap();
    let error = root.delete_tree(true, Some("shred"), false).await.unwrap_err();
    assert!(matches!(error, CmisError::InvalidParameterValue { .. }));
}

#[tokio::test(flavor = "current_thread")]
async fn update_properties_and_refresh_track_change_token() {
    let (_mock, _server, repository) = test_repository(true).await;
    let mut new_object = repository.new_document();
    new_object.set_name("draft");
    let mut document: Document = new_object
        .create_in_folder(repository.root_folder_id())
        .await
        .unwrap();
    assert_eq!(document.change_token(), Some("1"));
    assert!(document.creation_date().is_some());
    assert_eq!(document.created_by(), Some("mock"));

    let mut updates = Properties::new();
    updates.insert("cmis:name".to_string(), PropertyValue::string("final"));
    document.update_properties(updates).await.unwrap();
    assert_eq!(document.name(), Some("final"));
    assert_eq!(document.change_token(), Some("2"));

    document.refresh().await.unwrap();
    assert_eq!(document.name(), Some("final"));
}

#[tokio::test(flavor = "current_thread")]
async fn relationship_policy_and_item_variants() {
    let (_mock, _server, repository) = test_repository(false).await;
    let root_id = repository.root_folder_id().to_string();

    let mut item = repository.new_item();
    item.set_name("item1");
    let item = item.create_in_folder(&root_id).await.unwrap();
    assert_eq!(item.base_type_id(), Some("cmis:item"));

    let mut policy = repository.new_policy();
    policy.set_name("retention");
    policy.set_policy_text("keep for 7 years");
    let policy = policy.create_in_folder(&root_id).await.unwrap();
    assert_eq!(policy.policy_text(), Some("keep for 7 years"));

    let mut relationship = repository.new_relationship();
    relationship.set_name("link");
    relationship.set_source_id(item.object_id().unwrap());
    relationship.set_target_id(policy.object_id().unwrap());
    let relationship = relationship.create().await.unwrap();
    assert_eq!(relationship.source_id(), item.object_id());
    assert_eq!(relationship.target_id(), policy.object_id());

    let fetched = repository
        .get_object(relationship.object_id().unwrap())
        .await
        .unwrap();
    assert_eq!(fetched.base_type(), BaseType::Relationship);
}

#[tokio::test(flavor = "current_thread")]
async fn type_definition_reads_property_schema() {
    let (_mock, _server, repository) = test_repository(true).await;
    let definition = repository.type_definition("cmis:document").await.unwrap();
    assert_eq!(definition.id, "cmis:document");
    assert_eq!(definition.base_id, "cmis:document");
    assert!(definition.creatable);

    let name = definition.property_definition("cmis:name").unwrap();
    assert!(name.required);

    let error = repository.type_definition("acme:invoice").await.unwrap_err();
    assert!(error.is_not_found());
}

#[tokio::test(flavor = "current_thread")]
async fn server_error_body_is_surfaced_verbatim() {
    let (mock, _server, repository) = test_repository(true).await;
    mock.enqueue_response(HttpResponse::json(
        409,
        &json!({"exception": "nameConstraintViolation", "message": "doc1 already exists"}),
    ));
    let mut new_object = repository.new_document();
    new_object.set_name("doc1");
    let error = new_object
        .create_in_folder(repository.root_folder_id())
        .await
        .unwrap_err();
    assert_eq!(
        error.to_string(),
        "cmis request failed (409): nameConstraintViolation -- doc1 already exists"
    );
}

#[tokio::test(flavor = "current_thread")]
async fn unreachable_server_expected_transport_error() {
    let (mock, _server, repository) = test_repository(true).await;
    mock.set_unreachable(true);
    let error = repository.root_folder().await.unwrap_err();
    assert!(matches!(error, CmisError::Transport(_)));
}

#[tokio::test(flavor = "current_thread")]
async fn objects_outliving_the_session_expected_session_closed() {
    let (_mock, server, repository) = test_repository(true).await;
    let root = repository.root_folder().await.unwrap();
    drop(repository);
    drop(server);

    let error = root.children().await.unwrap_err();
    assert!(matches!(error, CmisError::SessionClosed));
}

#[tokio::test(flavor = "current_thread")]
async fn detached_object_operations_expected_detached_error() {
    let (_mock, _server, repository) = test_repository(true).await;
    let mut document = repository.new_document();
    document.set_name("never-saved");
    let error = document.delete().await.unwrap_err();
    assert!(matches!(error, CmisError::DetachedObject(ref name) if name == "never-saved"));
}

#[test]
fn server_with_empty_service_url_expected_invalid_parameter() {
    for url in ["", "   ", "mock.cmis/browser"] {
        let error = Server::with_transport(ConnectionConfig::new(url), Arc::new(MockCmisServer::new()))
            .unwrap_err();
        assert!(
            matches!(error, CmisError::InvalidParameterValue { ref parameter, .. } if parameter == "service_url"),
            "unexpected error for {url:?}: {error}"
        );
    }
}

#[tokio::test(flavor = "current_thread")]
async fn delete_with_blank_json_reply_expected_success() {
    let (mock, _server, repository) = test_repository(true).await;
    let mut new_object = repository.new_document();
    new_object.set_name("blank-reply");
    let document = new_object
        .create_in_folder(repository.root_folder_id())
        .await
        .unwrap();

    let blank = HttpResponse {
        status: 200,
        content_type: Some("application/json".to_string()),
        body: Bytes::new(),
    };
    mock.enqueue_response(blank.clone());
    document.delete().await.expect("blank json reply is a successful delete");

    let root = repository.root_folder().await.unwrap();
    mock.enqueue_response(blank);
    let failed = root.delete_tree(true, None, false).await.unwrap();
    assert!(failed.is_empty());
}

#[tokio::test(flavor = "current_thread")]
async fn refresh_and_update_with_other_base_type_expected_invalid_response() {
    let (mock, _server, repository) = test_repository(true).await;
    let mut new_object = repository.new_document();
    new_object.set_name("stable");
    let mut document = new_object
        .create_in_folder(repository.root_folder_id())
        .await
        .unwrap();
    let object_id = document.object_id().unwrap().to_string();
    let folder_payload = json!({
        "succinctProperties": {
            "cmis:objectId": object_id,
            "cmis:baseTypeId": "cmis:folder",
            "cmis:name": "stable"
        }
    });

    mock.enqueue_response(HttpResponse::json(200, &folder_payload));
    let error = document.refresh().await.unwrap_err();
    assert!(matches!(error, CmisError::InvalidResponse(_)), "{error}");
    assert_eq!(document.base_type_id(), Some("cmis:document"));

    mock.enqueue_response(HttpResponse::json(200, &folder_payload));
    let mut updates = Properties::new();
    updates.insert("cmis:name".to_string(), PropertyValue::string("moved"));
    let error = document.update_properties(updates).await.unwrap_err();
    assert!(matches!(error, CmisError::InvalidResponse(_)), "{error}");
    assert_eq!(document.base_type_id(), Some("cmis:document"));
    assert_eq!(document.name(), Some("stable"));
}

#[tokio::test(flavor = "current_thread")]
async fn malformed_content_mime_type_on_cold_cache_expected_no_network_call() {
    let mock = MockCmisServer::new().with_repository("r1", "One");
    let server = server_with(&mock, true);
    let request = cmis_browser::OperationRequest::repository("r1")
        .action("createDocument")
        .object_id("r1-root")
        .param(
            "content",
            cmis_browser::ContentStream::new("data", "text plain", "doc.txt"),
        );

    let error = server.service().perform(request).await.unwrap_err();
    assert!(matches!(
        error,
        CmisError::InvalidParameterValue { ref parameter, .. } if parameter == "content"
    ));
    assert_eq!(mock.request_count(), 0);
    assert_eq!(mock.directory_fetches(), 0);
}
