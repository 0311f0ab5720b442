//! Integration tests for the chats crate against an on-disk SQLite database.

use std::collections::HashSet;
use std::sync::Arc;

use futures_util::future::join_all;
use kestrel_chats::{ChatFilter, ChatService, ChatStore, ChatType, SqliteChatRepository, StaticId};
use kestrel_config::DatabaseConfig;
use kestrel_database::{initialize_database, CreateUserRequest, UserRepository};
use sqlx::SqlitePool;
use tempfile::TempDir;

async fn setup() -> (SqlitePool, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let config = DatabaseConfig {
        url: format!("sqlite://{}", temp_dir.path().join("kestrel.db").display()),
        max_connections: 8,
    };
    let pool = initialize_database(&config).await.unwrap();
    (pool, temp_dir)
}

async fn seed(pool: &SqlitePool, username: &str) -> StaticId {
    let user = UserRepository::new(pool.clone())
        .create(&CreateUserRequest {
            username: username.to_string(),
            display_name: None,
        })
        .await
        .unwrap();
    StaticId::from(user.public_id)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_get_or_create_stores_one_direct_chat() {
    let (pool, _temp_dir) = setup().await;
    let alice = seed(&pool, "alice").await;
    seed(&pool, "bob").await;

    let service = Arc::new(ChatService::sqlite(pool.clone()));

    let attempts = (0..16).map(|_| {
        let service = Arc::clone(&service);
        let alice = alice.clone();
        tokio::spawn(async move {
            service
                .get_or_create_chat(ChatType::Direct, "bob", &alice)
                .await
        })
    });

    let ids: HashSet<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap().id().clone())
        .collect();
    assert_eq!(ids.len(), 1, "every caller must observe the same chat");

    let stored = SqliteChatRepository::new(pool)
        .where_(ChatFilter::Type(ChatType::Direct))
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_add_member_keeps_every_addition() {
    let (pool, _temp_dir) = setup().await;
    let admin = seed(&pool, "admin").await;
    seed(&pool, "first").await;
    let mut newcomers = Vec::new();
    for n in 0..12 {
        let name = format!("newcomer{n}");
        newcomers.push((name.clone(), seed(&pool, &name).await));
    }

    let service = Arc::new(ChatService::sqlite(pool));
    let group = service
        .create_group(&admin, "Team", "first", "desc")
        .await
        .unwrap();

    let additions = newcomers.iter().map(|(name, _)| {
        let service = Arc::clone(&service);
        let admin = admin.clone();
        let chat_id = group.id().clone();
        let name = name.clone();
        tokio::spawn(async move { service.add_member(&chat_id, &admin, &name).await })
    });
    for joined in join_all(additions).await {
        joined.unwrap().unwrap();
    }

    let stored = service.get_chat(group.id(), &admin).await.unwrap();
    assert_eq!(stored.participants().len(), 2 + newcomers.len());
    for (_, newcomer) in &newcomers {
        assert!(stored.is_member(newcomer));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_demotions_leave_one_admin() {
    let (pool, _temp_dir) = setup().await;
    let u1 = seed(&pool, "u1").await;
    let u2 = seed(&pool, "u2").await;
    let service = Arc::new(ChatService::sqlite(pool));

    let group = service.create_group(&u1, "Team", "u2", "desc").await.unwrap();
    service.promote_admin(group.id(), &u1, "u2").await.unwrap();

    let demote = |actor: StaticId, target: &'static str| {
        let service = Arc::clone(&service);
        let chat_id = group.id().clone();
        tokio::spawn(async move { service.demote_admin(&chat_id, &actor, target).await })
    };
    let (first, second) = tokio::join!(demote(u1.clone(), "u2"), demote(u2.clone(), "u1"));
    let outcomes = [first.unwrap(), second.unwrap()];

    assert_eq!(outcomes.iter().filter(|outcome| outcome.is_ok()).count(), 1);
    let stored = service.get_chat(group.id(), &u1).await.unwrap();
    assert_eq!(stored.room().unwrap().admins.len(), 1);
}

#[tokio::test]
async fn repeated_requests_from_either_side_share_one_chat() {
    let (pool, _temp_dir) = setup().await;
    let u1 = seed(&pool, "u1").await;
    let u2 = seed(&pool, "u2").await;
    let service = ChatService::sqlite(pool);

    let first = service
        .get_or_create_chat(ChatType::Direct, "u2", &u1)
        .await
        .unwrap();
    let second = service
        .get_or_create_chat(ChatType::Direct, "u2", &u1)
        .await
        .unwrap();
    let from_other_side = service
        .get_or_create_chat(ChatType::Direct, "u1", &u2)
        .await
        .unwrap();

    assert_eq!(first.id(), second.id());
    assert_eq!(first.id(), from_other_side.id());
    assert_eq!(service.list_chats(&u2).await.unwrap().len(), 1);
}

#[tokio::test]
async fn group_created_by_u1_with_u2() {
    let (pool, _temp_dir) = setup().await;
    let u1 = seed(&pool, "u1").await;
    let u2 = seed(&pool, "u2").await;
    let service = ChatService::sqlite(pool);

    let chat = service
        .create_group(&u1, "Team", "u2", "desc")
        .await
        .unwrap();

    assert_eq!(chat.chat_type(), ChatType::Group);
    assert!(chat.is_member(&u1) && chat.is_admin(&u1));
    assert!(chat.is_member(&u2) && !chat.is_admin(&u2));

    let reloaded = service.get_chat(chat.id(), &u2).await.unwrap();
    assert_eq!(reloaded, chat);
}

#[tokio::test]
async fn empty_group_title_writes_nothing() {
    let (pool, _temp_dir) = setup().await;
    let u1 = seed(&pool, "u1").await;
    seed(&pool, "u2").await;
    let service = ChatService::sqlite(pool.clone());

    assert!(service.create_group(&u1, "   ", "u2", "desc").await.is_err());

    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM chats")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 0);
}
