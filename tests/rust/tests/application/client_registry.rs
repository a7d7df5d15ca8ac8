//! ClientRegistry behaviour over a mock repository

use std::sync::Arc;

use futures::future::join_all;
use pretty_assertions::assert_eq;
use sbpanel_core::{Client, ClientRegistry, Inbound, Protocol, RegistryError};
use tests::fixtures;
use tests::mocks::MockInboundRepository;

/// Inbound 1 (socks, no credentials needed) with clients `[a]`
async fn registry_with(clients: &[&str]) -> (Arc<MockInboundRepository>, ClientRegistry) {
    let inbound = clients
        .iter()
        .fold(Inbound::new("in-1", Protocol::Socks, 1080).with_id(1), |i, id| {
            i.with_client(Client::new(*id))
        });
    let repo = Arc::new(MockInboundRepository::new().with_inbound(inbound));
    let registry = ClientRegistry::new(repo.clone());
    registry.load().await.unwrap();
    (repo, registry)
}

async fn ids(registry: &ClientRegistry) -> Vec<String> {
    registry
        .clients(1)
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.id)
        .collect()
}

#[tokio::test]
async fn test_add_delete_update_sequence() {
    let (repo, registry) = registry_with(&["a"]).await;

    registry.add_client(1, Client::new("b")).await.unwrap();
    assert_eq!(ids(&registry).await, vec!["a", "b"]);

    registry.delete_client(1, "a").await.unwrap();
    assert_eq!(ids(&registry).await, vec!["b"]);

    let err = registry.update_client(1, Client::new("z")).await.unwrap_err();
    assert!(matches!(err, RegistryError::ClientNotFound { .. }));
    assert_eq!(ids(&registry).await, vec!["b"]);

    assert_eq!(repo.persisted_client_ids(1), vec!["b"]);
}

#[tokio::test]
async fn test_add_twice_conflicts() {
    let (_, registry) = registry_with(&["a"]).await;

    registry.add_client(1, Client::new("b")).await.unwrap();
    let err = registry.add_client(1, Client::new("b")).await.unwrap_err();
    assert!(err.is_conflict());
    assert_eq!(ids(&registry).await.len(), 2);
}

#[tokio::test]
async fn test_delete_twice_not_found() {
    let (_, registry) = registry_with(&["a", "b"]).await;

    let removed = registry.delete_client(1, "a").await.unwrap();
    assert_eq!(removed.id, "a");
    let err = registry.delete_client(1, "a").await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(ids(&registry).await, vec!["b"]);
}

#[tokio::test]
async fn test_update_keeps_position_and_identifier() {
    let (_, registry) = registry_with(&["a", "b", "c"]).await;

    let updated = registry
        .update_client(1, Client::new("b").disabled().with_limits(1 << 30, 0))
        .await
        .unwrap();
    assert_eq!(updated.id, "b");
    assert!(!updated.enable);

    let clients = registry.clients(1).await.unwrap();
    assert_eq!(clients[1].id, "b");
    assert_eq!(clients[1].limits.volume, 1 << 30);
    assert_eq!(ids(&registry).await, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn test_unknown_inbound() {
    let (_, registry) = registry_with(&[]).await;

    let err = registry.add_client(9, Client::new("x")).await.unwrap_err();
    assert!(matches!(err, RegistryError::InboundNotFound(9)));
}

#[tokio::test]
async fn test_failed_writes_roll_back_every_mutation() {
    let (repo, registry) = registry_with(&["a", "b"]).await;
    repo.fail_writes(true);

    let err = registry.add_client(1, Client::new("c")).await.unwrap_err();
    assert!(matches!(err, RegistryError::Persistence { .. }));
    assert_eq!(ids(&registry).await, vec!["a", "b"]);

    assert!(registry
        .update_client(1, Client::new("a").disabled())
        .await
        .is_err());
    assert!(registry.clients(1).await.unwrap()[0].enable);

    assert!(registry.delete_client(1, "a").await.is_err());
    assert_eq!(ids(&registry).await, vec!["a", "b"]);

    repo.fail_writes(false);
    registry.delete_client(1, "a").await.unwrap();
    assert_eq!(repo.persisted_client_ids(1), vec!["b"]);
}

#[tokio::test]
async fn test_credentials_validated_per_protocol() {
    let repo = Arc::new(
        MockInboundRepository::new()
            .with_inbound(fixtures::vless_inbound("in-vless", 443, &[]).with_id(1)),
    );
    let registry = ClientRegistry::new(repo.clone());
    registry.load().await.unwrap();

    let err = registry.add_client(1, Client::new("nouuid")).await.unwrap_err();
    assert!(matches!(err, RegistryError::Validation(_)));
    assert_eq!(repo.writes(), 0);

    registry
        .add_client(1, fixtures::vless_client("ok"))
        .await
        .unwrap();
    assert_eq!(repo.writes(), 1);
}

#[tokio::test]
async fn test_concurrent_adds_are_not_lost() {
    let (repo, registry) = registry_with(&["a"]).await;
    let registry = Arc::new(registry);

    let names: Vec<String> = (0..32).map(|i| format!("client-{}", i)).collect();
    let results = join_all(names.iter().map(|name| {
        let registry = registry.clone();
        let name = name.clone();
        tokio::spawn(async move { registry.add_client(1, Client::new(name)).await })
    }))
    .await;

    for result in results {
        result.unwrap().unwrap();
    }

    let mut stored = ids(&registry).await;
    assert_eq!(stored.len(), 33);
    assert_eq!(stored[0], "a");
    stored.sort();
    stored.dedup();
    assert_eq!(stored.len(), 33);

    // Storage saw the final list, not an interleaved one
    assert_eq!(repo.persisted_client_ids(1).len(), 33);
}

#[tokio::test]
async fn test_concurrent_adds_of_same_id_admit_one() {
    let (_, registry) = registry_with(&[]).await;
    let registry = Arc::new(registry);

    let results = join_all((0..8).map(|_| {
        let registry = registry.clone();
        tokio::spawn(async move { registry.add_client(1, Client::new("dup")).await })
    }))
    .await;

    let succeeded = results
        .into_iter()
        .map(|r| r.unwrap())
        .filter(Result::is_ok)
        .count();
    assert_eq!(succeeded, 1);
    assert_eq!(ids(&registry).await, vec!["dup"]);
}

#[tokio::test]
async fn test_inbound_lifecycle() {
    let (_, registry) = registry_with(&["a"]).await;

    let created = registry
        .create_inbound(fixtures::trojan_inbound("in-2", 8443, &["t1"]))
        .await
        .unwrap();
    assert_eq!(created.id, 2);

    let err = registry
        .create_inbound(fixtures::trojan_inbound("in-2", 8444, &[]))
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::TagConflict(_)));

    registry.delete_inbound(created.id).await.unwrap();
    assert!(registry.get(created.id).await.is_err());
    assert_eq!(registry.snapshot().await.len(), 1);
}
