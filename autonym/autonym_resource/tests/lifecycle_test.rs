use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use autonym_core::utils::init_logging;
use autonym_core::{AutonymError, BoxError, CrudMethod, ErrorCode, LogLevel, Meta, Record, Stage};
use autonym_policy::Expression;
use autonym_resource::{FnCodec, InMemoryStore, ResourceDeclaration, Store};
use serde_json::{json, Value};

fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        _ => panic!("not an object"),
    }
}

fn init_test_logging() {
    // Each test binary installs the subscriber once, later calls are no-ops
    let _ = init_logging(LogLevel::Warning);
}

fn person_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "firstName": { "type": "string" },
            "lastName": { "type": "string" },
            "active": { "type": "boolean", "default": true }
        },
        "required": ["firstName", "lastName"]
    })
}

/// Wraps an in-memory store, counting calls and capturing update arguments.
#[derive(Default)]
struct RecordingStore {
    inner: InMemoryStore,
    creates: AtomicUsize,
    finds: AtomicUsize,
    find_ones: AtomicUsize,
    updates: AtomicUsize,
    deletes: AtomicUsize,
    last_update: Mutex<Option<(Record, Record)>>,
}

#[async_trait]
impl Store for RecordingStore {
    async fn create(&self, data: Record, meta: &Meta) -> Result<Record, BoxError> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        self.inner.create(data, meta).await
    }

    async fn find(&self, query: &Record, meta: &Meta) -> Result<Vec<Record>, BoxError> {
        self.finds.fetch_add(1, Ordering::SeqCst);
        self.inner.find(query, meta).await
    }

    async fn find_one(&self, id: &str, meta: &Meta) -> Result<Record, BoxError> {
        self.find_ones.fetch_add(1, Ordering::SeqCst);
        self.inner.find_one(id, meta).await
    }

    async fn find_one_and_update(
        &self,
        id: &str,
        data: Record,
        complete: Record,
        meta: &Meta,
    ) -> Result<Record, BoxError> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        *self.last_update.lock().unwrap() = Some((data.clone(), complete.clone()));
        self.inner.find_one_and_update(id, data, complete, meta).await
    }

    async fn find_one_and_delete(&self, id: &str, meta: &Meta) -> Result<(), BoxError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.inner.find_one_and_delete(id, meta).await
    }
}

/// A store that only supports reads.
struct ReadOnlyStore;

#[async_trait]
impl Store for ReadOnlyStore {
    async fn find(&self, _query: &Record, _meta: &Meta) -> Result<Vec<Record>, BoxError> {
        Ok(Vec::new())
    }
}

fn counter() -> Arc<AtomicUsize> {
    Arc::new(AtomicUsize::new(0))
}

fn counting(counter: &Arc<AtomicUsize>) -> Expression {
    let counter = Arc::clone(counter);
    Expression::from_sync_fn(move |_, _, _| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })
}

#[tokio::test]
async fn test_update_sends_delta_and_validates_merged_record() {
    init_test_logging();
    let store = Arc::new(RecordingStore::default());
    store
        .inner
        .create(
            record(json!({ "firstName": "Dagny", "lastName": "Taggart", "active": false })),
            &Meta::new(),
        )
        .await
        .unwrap();

    let seen_complete = Arc::new(Mutex::new(None));
    let seen = Arc::clone(&seen_complete);
    let people = ResourceDeclaration::new("person")
        .schema(person_schema())
        .policy(
            Stage::PostSchema,
            CrudMethod::FindOneAndUpdate,
            Expression::from_sync_fn(move |req, _, _| {
                *seen.lock().unwrap() = req.complete_data().cloned();
                assert!(req.is_validated());
                Ok(())
            }),
        )
        .shared_store(store.clone())
        .build()
        .unwrap();

    let updated = people
        .find_one_and_update("1", record(json!({ "lastName": "Galt" })), Meta::new())
        .await
        .unwrap();

    let (delta, complete) = store.last_update.lock().unwrap().clone().unwrap();
    assert_eq!(Value::Object(delta), json!({ "lastName": "Galt" }));
    assert_eq!(complete["firstName"], json!("Dagny"));
    assert_eq!(complete["lastName"], json!("Galt"));

    let seen = seen_complete.lock().unwrap().clone().unwrap();
    assert_eq!(seen["firstName"], json!("Dagny"));
    assert_eq!(seen["lastName"], json!("Galt"));

    // The stored value survives because the default never reached the delta
    assert_eq!(
        Value::Object(updated),
        json!({ "firstName": "Dagny", "lastName": "Galt", "active": false, "id": "1" })
    );
    assert_eq!(store.updates.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_update_pre_schema_sees_stored_record() {
    init_test_logging();
    let store = Arc::new(RecordingStore::default());
    store
        .inner
        .create(
            record(json!({ "title": "Atlas", "ownerId": "42", "tags": ["novel"] })),
            &Meta::new(),
        )
        .await
        .unwrap();

    let seen_complete = Arc::new(Mutex::new(None));
    let seen = Arc::clone(&seen_complete);
    let posts = ResourceDeclaration::new("post")
        .policy(
            Stage::PreSchema,
            CrudMethod::FindOneAndUpdate,
            Expression::from_sync_fn(move |req, _, meta| {
                *seen.lock().unwrap() = req.complete_data().cloned();
                let owner = req.original_data().and_then(|original| original.get("ownerId"));
                if owner.is_some() && owner == meta.get("userId") {
                    Ok(())
                } else {
                    Err(Box::new(AutonymError::forbidden_with(
                        "Only the owner may update this post.",
                    )) as BoxError)
                }
            }),
        )
        .shared_store(store.clone())
        .build()
        .unwrap();

    let mut stranger = Meta::new();
    stranger.insert("userId".to_string(), json!("7"));
    let err = posts
        .find_one_and_update("1", record(json!({ "title": "Anthem" })), stranger)
        .await
        .unwrap_err();
    assert_eq!(err.message(), "Only the owner may update this post.");
    assert_eq!(store.updates.load(Ordering::SeqCst), 0);

    let complete = seen_complete.lock().unwrap().clone().unwrap();
    assert_eq!(
        Value::Object(complete),
        json!({ "title": "Anthem", "ownerId": "42", "tags": ["novel"], "id": "1" })
    );

    let mut owner = Meta::new();
    owner.insert("userId".to_string(), json!("42"));
    posts
        .find_one_and_update("1", record(json!({ "title": "Anthem" })), owner)
        .await
        .unwrap();
    assert_eq!(store.updates.load(Ordering::SeqCst), 1);
    // One read per update, before the first stage
    assert_eq!(store.find_ones.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_resource_without_schema_passes_records_through() {
    init_test_logging();
    let notes = ResourceDeclaration::new("note")
        .store(InMemoryStore::new())
        .build()
        .unwrap();
    assert_eq!(notes.route(), "notes");
    assert!(!notes.config().schema().is_enabled());

    let created = notes
        .create(record(json!({ "body": "Who is John Galt?", "pinned": 1 })), Meta::new())
        .await
        .unwrap();
    assert_eq!(
        Value::Object(created),
        json!({ "body": "Who is John Galt?", "pinned": 1, "id": "1" })
    );

    let updated = notes
        .find_one_and_update("1", record(json!({ "pinned": 0 })), Meta::new())
        .await
        .unwrap();
    assert_eq!(updated["pinned"], json!(0));
    assert_eq!(updated["body"], json!("Who is John Galt?"));
}

#[tokio::test]
async fn test_optional_update_properties_relax_required() {
    init_test_logging();
    let store = Arc::new(RecordingStore::default());
    // Seeded behind the resource's back, without a first name
    store
        .inner
        .create(record(json!({ "lastName": "Taggart" })), &Meta::new())
        .await
        .unwrap();

    let strict = ResourceDeclaration::new("person")
        .schema(person_schema())
        .shared_store(store.clone())
        .build()
        .unwrap();
    let err = strict
        .find_one_and_update("1", record(json!({ "lastName": "Galt" })), Meta::new())
        .await
        .unwrap_err();
    assert_eq!(err.code(), &ErrorCode::NotAcceptable);
    assert!(err.data()["errors"].get("/firstName").is_some());

    let relaxed = ResourceDeclaration::new("person")
        .schema(person_schema())
        .optional_update_properties(["firstName"])
        .shared_store(store.clone())
        .build()
        .unwrap();
    relaxed
        .find_one_and_update("1", record(json!({ "lastName": "Galt" })), Meta::new())
        .await
        .unwrap();

    // Still required on create
    let err = relaxed
        .create(record(json!({ "lastName": "Galt" })), Meta::new())
        .await
        .unwrap_err();
    assert_eq!(err.code(), &ErrorCode::NotAcceptable);
    assert_eq!(store.creates.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_create_fails_with_first_failing_policy() {
    init_test_logging();
    let store = Arc::new(RecordingStore::default());
    let after = counter();
    let people = ResourceDeclaration::new("person")
        .schema(person_schema())
        .policy(
            Stage::PreSchema,
            CrudMethod::Create,
            Expression::and([
                Expression::allow(),
                Expression::from_sync_fn(|_, _, _| {
                    Err(Box::new(AutonymError::forbidden_with("Only admins may create people."))
                        as BoxError)
                }),
                counting(&after),
            ]),
        )
        .shared_store(store.clone())
        .build()
        .unwrap();

    let err = people
        .create(
            record(json!({ "firstName": "Hank", "lastName": "Rearden" })),
            Meta::new(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.code(), &ErrorCode::Forbidden);
    assert_eq!(err.message(), "Only admins may create people.");
    assert_eq!(after.load(Ordering::SeqCst), 0);
    assert_eq!(store.creates.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_find_denied_before_store() {
    init_test_logging();
    let store = Arc::new(RecordingStore::default());
    let post_store = counter();
    let people = ResourceDeclaration::new("person")
        .no_schema()
        .policy(Stage::PreStore, CrudMethod::Find, false)
        .policy(Stage::PostStore, CrudMethod::Find, counting(&post_store))
        .shared_store(store.clone())
        .build()
        .unwrap();

    let err = people.find(Record::new(), Meta::new()).await.unwrap_err();
    assert_eq!(err, AutonymError::forbidden());
    assert_eq!(
        err.to_client_error().payload(),
        json!({ "message": "This action may not be performed." })
    );
    assert_eq!(store.finds.load(Ordering::SeqCst), 0);
    assert_eq!(post_store.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_missing_store_method_is_not_allowed() {
    init_test_logging();
    let pre_store = counter();
    let post_store = counter();
    let notes = ResourceDeclaration::new("note")
        .no_schema()
        .policy(Stage::PreStore, CrudMethod::Create, counting(&pre_store))
        .policy(Stage::PostStore, CrudMethod::Create, counting(&post_store))
        .store(ReadOnlyStore)
        .build()
        .unwrap();

    let err = notes.create(Record::new(), Meta::new()).await.unwrap_err();
    assert_eq!(err.code(), &ErrorCode::MethodNotAllowed);
    assert_eq!(pre_store.load(Ordering::SeqCst), 1);
    assert_eq!(post_store.load(Ordering::SeqCst), 0);

    assert!(notes.find(Record::new(), Meta::new()).await.unwrap().is_empty());

    // Without any store every operation is rejected
    let bare = ResourceDeclaration::new("note").no_schema().build().unwrap();
    let err = bare.find_one_and_delete("1", Meta::new()).await.unwrap_err();
    assert_eq!(err.code(), &ErrorCode::MethodNotAllowed);
    assert_eq!(err.to_client_error().status(), 405);
}

#[tokio::test]
async fn test_create_strips_and_defaults() {
    init_test_logging();
    let store = Arc::new(RecordingStore::default());
    let people = ResourceDeclaration::new("person")
        .schema(person_schema())
        .shared_store(store.clone())
        .build()
        .unwrap();

    let created = people
        .create(
            record(json!({ "firstName": "Hank", "lastName": "Rearden", "isAdmin": true })),
            Meta::new(),
        )
        .await
        .unwrap();
    assert_eq!(
        Value::Object(created),
        json!({ "firstName": "Hank", "lastName": "Rearden", "active": true, "id": "1" })
    );
    assert_eq!(store.creates.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_post_schema_and_post_store_policies_transform() {
    init_test_logging();
    let users = ResourceDeclaration::new("user")
        .no_schema()
        .policy(
            Stage::PostSchema,
            CrudMethod::Create,
            Expression::from_sync_fn(|req, _, _| {
                if let Some(data) = req.data_mut() {
                    data.insert("passwordHash".to_string(), json!("hashed"));
                }
                Ok(())
            }),
        )
        .policy(
            Stage::PostStore,
            CrudMethod::Create,
            Expression::from_sync_fn(|_, res, _| {
                if let autonym_core::ResponseData::One(record) = res.data_mut() {
                    record.remove("passwordHash");
                }
                Ok(())
            }),
        )
        .store(InMemoryStore::new())
        .build()
        .unwrap();

    let created = users
        .create(record(json!({ "email": "john@galt.com" })), Meta::new())
        .await
        .unwrap();
    assert_eq!(
        Value::Object(created),
        json!({ "email": "john@galt.com", "id": "1" })
    );

    let stored = users.find_one("1", Meta::new()).await.unwrap();
    assert_eq!(stored["passwordHash"], json!("hashed"));
}

#[tokio::test]
async fn test_codec_runs_both_ways_and_find_keeps_order() {
    init_test_logging();
    let store = Arc::new(RecordingStore::default());
    let posts = ResourceDeclaration::new("post")
        .no_schema()
        .codec(FnCodec::new(
            |mut record: Record| {
                if let Some(title) = record.remove("title") {
                    record.insert("post_title".to_string(), title);
                }
                Ok(record)
            },
            |mut record: Record| {
                if let Some(title) = record.remove("post_title") {
                    record.insert("title".to_string(), title);
                }
                Ok(record)
            },
        ))
        .shared_store(store.clone())
        .build()
        .unwrap();

    for title in ["first", "second", "third"] {
        posts
            .create(record(json!({ "title": title })), Meta::new())
            .await
            .unwrap();
    }

    let raw = store.inner.find_one("2", &Meta::new()).await.unwrap();
    assert_eq!(raw["post_title"], json!("second"));

    let titles: Vec<Value> = posts
        .find(Record::new(), Meta::new())
        .await
        .unwrap()
        .into_iter()
        .map(|post| post["title"].clone())
        .collect();
    assert_eq!(titles, vec![json!("first"), json!("second"), json!("third")]);

    let updated = posts
        .find_one_and_update("3", record(json!({ "title": "last" })), Meta::new())
        .await
        .unwrap();
    assert_eq!(updated["title"], json!("last"));
    assert_eq!(store.find_ones.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_delete_returns_id_only() {
    init_test_logging();
    let store = Arc::new(RecordingStore::default());
    let posts = ResourceDeclaration::new("post")
        .no_schema()
        .shared_store(store.clone())
        .build()
        .unwrap();
    posts
        .create(record(json!({ "title": "gone" })), Meta::new())
        .await
        .unwrap();

    let deleted = posts.find_one_and_delete("1", Meta::new()).await.unwrap();
    assert_eq!(Value::Object(deleted), json!({ "id": "1" }));
    assert_eq!(store.deletes.load(Ordering::SeqCst), 1);

    let err = posts.find_one("1", Meta::new()).await.unwrap_err();
    assert_eq!(err.code(), &ErrorCode::NotFound);
}

#[tokio::test]
async fn test_meta_is_fresh_per_call() {
    init_test_logging();
    let mut template = Meta::new();
    template.insert("visited".to_string(), json!([]));

    let observed = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&observed);
    let posts = Arc::new(
        ResourceDeclaration::new("post")
            .no_schema()
            .initial_meta(template)
            .policy(
                Stage::PreSchema,
                CrudMethod::Create,
                Expression::from_fn(|_, _, meta| {
                    Box::pin(async move {
                        if let Some(Value::Array(visited)) = meta.get_mut("visited") {
                            visited.push(json!("preSchema"));
                        }
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        Ok(())
                    })
                }),
            )
            .policy(
                Stage::PostStore,
                CrudMethod::Create,
                Expression::from_sync_fn(move |_, _, meta| {
                    let visited = meta["visited"].as_array().map_or(0, Vec::len);
                    seen.lock().unwrap().push((visited, meta["user"].clone()));
                    Ok(())
                }),
            )
            .store(InMemoryStore::new())
            .build()
            .unwrap(),
    );

    let call = |user: &'static str| {
        let posts = Arc::clone(&posts);
        async move {
            let mut meta = Meta::new();
            meta.insert("user".to_string(), json!(user));
            posts.create(Record::new(), meta).await
        }
    };
    let (a, b) = tokio::join!(tokio::spawn(call("a")), tokio::spawn(call("b")));
    a.unwrap().unwrap();
    b.unwrap().unwrap();

    let mut observed = observed.lock().unwrap().clone();
    observed.sort_by_key(|(_, user)| user.to_string());
    assert_eq!(observed, vec![(1, json!("a")), (1, json!("b"))]);
    assert_eq!(posts.config().initial_meta()["visited"], json!([]));
}

#[tokio::test]
async fn test_init_runs_once_and_memoizes_failure() {
    init_test_logging();
    let runs = counter();
    let hook_runs = Arc::clone(&runs);
    let posts = ResourceDeclaration::new("post")
        .no_schema()
        .store(InMemoryStore::new())
        .init(move || {
            let runs = Arc::clone(&hook_runs);
            async move {
                runs.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .build()
        .unwrap();

    posts.init().await.unwrap();
    posts.create(Record::new(), Meta::new()).await.unwrap();
    posts.find(Record::new(), Meta::new()).await.unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    let attempts = counter();
    let hook_attempts = Arc::clone(&attempts);
    let broken = ResourceDeclaration::new("post")
        .no_schema()
        .store(InMemoryStore::new())
        .init(move || {
            hook_attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(BoxError::from("connection refused")) }
        })
        .build()
        .unwrap();

    let first = broken.find(Record::new(), Meta::new()).await.unwrap_err();
    let second = broken.init().await.unwrap_err();
    assert_eq!(first, second);
    assert_eq!(first.code(), &ErrorCode::InternalServerError);
    assert_eq!(
        first.to_client_error().payload(),
        json!({ "message": "An internal server error occurred." })
    );
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
}
