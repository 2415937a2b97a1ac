use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use manifest_objects::capabilities::{Mutation, CONTEXT};
use manifest_objects::models::{IdentifierProvider, Model};
use manifest_objects::objects::{contextualize, ContextualDomainObject, DomainObjectRef};
use manifest_objects::store::{InMemoryObjectStore, ObjectService};
use manifest_objects::{ObjectError, ObjectResult, Runtime, RuntimeConfig};
use serde_json::json;

/// Object service that counts requests and can be switched offline.
struct CountingService {
    store: InMemoryObjectStore,
    requests: AtomicUsize,
    offline: AtomicBool,
}

impl CountingService {
    fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectService for CountingService {
    async fn get_objects(&self, ids: &[String]) -> ObjectResult<HashMap<String, Model>> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(ObjectError::Service("object service offline".to_string()));
        }
        self.store.get_objects(ids).await
    }
}

fn folder(name: &str, children: &[&str]) -> Model {
    Model::new()
        .with("name", name)
        .with("type", "folder")
        .with("modified", 1)
        .with("composition", json!(children))
}

fn item(name: &str) -> Model {
    Model::new().with("name", name).with("type", "telemetry").with("modified", 1)
}

fn setup() -> (Runtime, Arc<CountingService>) {
    let store = InMemoryObjectStore::new(IdentifierProvider::new("mct"))
        .with("mct:root", folder("Root", &["mct:a", "mct:folder", "mct:b"]))
        .with("mct:folder", folder("Folder", &["mct:a"]))
        .with("mct:partial", folder("Partial", &["mct:a", "mct:missing", "mct:b"]))
        .with("mct:twice", folder("Twice", &["mct:a", "mct:a"]))
        .with("mct:a", item("A"))
        .with("mct:b", item("B"));
    let service = Arc::new(CountingService {
        store,
        requests: AtomicUsize::new(0),
        offline: AtomicBool::new(false),
    });
    let runtime = Runtime::builder(RuntimeConfig::default())
        .object_service(service.clone())
        .build();
    (runtime, service)
}

async fn load(runtime: &Runtime, id: &str) -> DomainObjectRef {
    runtime
        .get_object(id)
        .await
        .expect("lookup failed")
        .expect("object missing")
}

fn ids(objects: &[DomainObjectRef]) -> Vec<&str> {
    objects.iter().map(|object| object.id()).collect()
}

mod memoization {
    use super::*;

    #[tokio::test]
    async fn fetches_once_while_modified_is_unchanged() {
        let (runtime, service) = setup();
        let root = load(&runtime, "mct:root").await;
        let before = service.requests();

        let composition = root.composition().expect("root is a container");
        let first = composition.invoke().await.unwrap();
        let second = composition.invoke().await.unwrap();

        assert_eq!(service.requests() - before, 1);
        assert_eq!(ids(&first), vec!["mct:a", "mct:folder", "mct:b"]);
        assert_eq!(ids(&first), ids(&second));
    }

    #[tokio::test]
    async fn concurrent_invocations_share_one_request() {
        let (runtime, service) = setup();
        let root = load(&runtime, "mct:root").await;
        let before = service.requests();

        let composition = root.composition().unwrap();
        let (first, second) = futures::join!(composition.invoke(), composition.invoke());

        assert_eq!(service.requests() - before, 1);
        assert_eq!(first.unwrap().len(), 3);
        assert_eq!(second.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn refetches_after_a_mutation() {
        let (runtime, service) = setup();
        let root = load(&runtime, "mct:root").await;
        let composition = root.composition().unwrap();
        composition.invoke().await.unwrap();
        let before = service.requests();

        let mutated = root.mutation().unwrap().mutate(
            |model| {
                model.set_composition(vec!["mct:b".to_string()]);
                Mutation::Apply
            },
            None,
        );
        assert!(mutated);

        let children = composition.invoke().await.unwrap();
        assert_eq!(service.requests() - before, 1);
        assert_eq!(ids(&children), vec!["mct:b"]);
    }
}

mod resolution {
    use super::*;

    #[tokio::test]
    async fn skips_ids_the_service_cannot_resolve() {
        let (runtime, _) = setup();
        let partial = load(&runtime, "mct:partial").await;
        let children = partial.composition().unwrap().invoke().await.unwrap();
        assert_eq!(ids(&children), vec!["mct:a", "mct:b"]);
    }

    #[tokio::test]
    async fn repeats_duplicated_ids() {
        let (runtime, _) = setup();
        let twice = load(&runtime, "mct:twice").await;
        let children = twice.composition().unwrap().invoke().await.unwrap();
        assert_eq!(ids(&children), vec!["mct:a", "mct:a"]);
    }

    #[tokio::test]
    async fn propagates_service_failures() {
        let (runtime, service) = setup();
        let root = load(&runtime, "mct:root").await;
        service.offline.store(true, Ordering::SeqCst);

        let result = root.composition().unwrap().invoke().await;
        assert_eq!(
            result.err(),
            Some(ObjectError::Service("object service offline".to_string()))
        );
    }

    #[tokio::test]
    async fn leaves_have_no_composition() {
        let (runtime, _) = setup();
        let leaf = load(&runtime, "mct:a").await;
        assert!(leaf.composition().is_none());
        assert!(leaf.mutation().is_some());
    }

    #[tokio::test]
    async fn fails_once_the_runtime_is_gone() {
        let (runtime, _) = setup();
        let root = load(&runtime, "mct:root").await;
        drop(runtime);

        let result = root.composition().unwrap().invoke().await;
        assert_eq!(result.err(), Some(ObjectError::RuntimeClosed));
    }
}

mod context {
    use super::*;

    #[tokio::test]
    async fn children_record_the_parent_they_were_reached_through() {
        let (runtime, _) = setup();
        let root = ContextualDomainObject::root(load(&runtime, "mct:root").await);
        let children = root.composition().unwrap().invoke().await.unwrap();

        let context = children[0].context().expect("children are contextualized");
        assert_eq!(context.parent().map(|parent| parent.id().to_string()), Some("mct:root".to_string()));
        assert_eq!(context.root().unwrap().id(), "mct:root");
    }

    #[tokio::test]
    async fn path_length_depends_on_the_access_chain() {
        let (runtime, _) = setup();
        let root = ContextualDomainObject::root(load(&runtime, "mct:root").await);
        assert_eq!(root.context().unwrap().path().unwrap().len(), 1);

        let children = root.composition().unwrap().invoke().await.unwrap();
        let direct = &children[0];
        let folder = &children[1];
        let nested = folder.composition().unwrap().invoke().await.unwrap();
        let via_folder = &nested[0];

        assert_eq!(direct.id(), via_folder.id());
        let direct_path = direct.context().unwrap().path().unwrap();
        let nested_path = via_folder.context().unwrap().path().unwrap();
        assert_eq!(ids(&direct_path), vec!["mct:root", "mct:a"]);
        assert_eq!(ids(&nested_path), vec!["mct:root", "mct:folder", "mct:a"]);
    }

    #[tokio::test]
    async fn path_starts_at_a_parent_without_context() {
        let (runtime, _) = setup();
        let root = load(&runtime, "mct:root").await;
        assert!(root.context().is_none());

        let children = root.composition().unwrap().invoke().await.unwrap();
        let path = children[0].context().unwrap().path().unwrap();
        assert_eq!(ids(&path), vec!["mct:root", "mct:a"]);
    }

    #[tokio::test]
    async fn contextualizes_unlisted_children_anyway() {
        let (runtime, _) = setup();
        let folder = load(&runtime, "mct:folder").await;
        let stranger = load(&runtime, "mct:b").await;

        let placed = contextualize(stranger, &folder);
        assert!(placed.has_capability(CONTEXT));
        assert_eq!(placed.context().unwrap().parent().unwrap().id(), "mct:folder");
    }

    #[tokio::test]
    async fn contextual_views_share_the_model() {
        let (runtime, _) = setup();
        let root = load(&runtime, "mct:root").await;
        let children = root.composition().unwrap().invoke().await.unwrap();
        let first = &children[0];

        first.mutation().unwrap().mutate(
            |model| {
                model.insert("name", "Renamed");
                Mutation::Apply
            },
            None,
        );

        let again = root.composition().unwrap().invoke().await.unwrap();
        assert_eq!(again[0].model().name(), Some("Renamed"));
    }
}

mod editing_composition {
    use super::*;

    #[tokio::test]
    async fn add_appends_and_contextualizes() {
        let (runtime, _) = setup();
        let folder = load(&runtime, "mct:folder").await;
        let b = load(&runtime, "mct:b").await;

        let added = folder.composition().unwrap().add(b, None).unwrap();
        assert_eq!(added.context().unwrap().parent().unwrap().id(), "mct:folder");
        assert_eq!(
            folder.model().composition(),
            Some(vec!["mct:a".to_string(), "mct:b".to_string()])
        );
    }

    #[tokio::test]
    async fn add_without_index_keeps_existing_entries() {
        let (runtime, _) = setup();
        let folder = load(&runtime, "mct:folder").await;
        let modified = folder.model().modified();
        let a = load(&runtime, "mct:a").await;

        folder.composition().unwrap().add(a, None).unwrap();
        assert_eq!(folder.model().composition(), Some(vec!["mct:a".to_string()]));
        assert_eq!(folder.model().modified(), modified);
    }

    #[tokio::test]
    async fn add_with_index_moves_the_entry() {
        let (runtime, _) = setup();
        let root = load(&runtime, "mct:root").await;
        let b = load(&runtime, "mct:b").await;

        root.composition().unwrap().add(b, Some(0)).unwrap();
        assert_eq!(
            root.model().composition(),
            Some(vec!["mct:b".to_string(), "mct:a".to_string(), "mct:folder".to_string()])
        );
    }

    #[tokio::test]
    async fn remove_drops_every_occurrence() {
        let (runtime, _) = setup();
        let twice = load(&runtime, "mct:twice").await;
        let composition = twice.composition().unwrap();

        assert!(composition.remove("mct:a").unwrap());
        assert!(!composition.remove("mct:a").unwrap());
        assert_eq!(twice.model().composition(), Some(vec![]));
    }
}
