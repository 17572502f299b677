//! Service-layer behavior over in-memory ports, with the emitted tracing checked

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use tracing_test::traced_test;
use uuid::Uuid;

use messenger::contract::model::{AvatarUpload, Message, Profile, Thread, User};
use messenger::domain::error::DomainError;
use messenger::domain::events::MessengerEvent;
use messenger::domain::pair::PairKey;
use messenger::domain::ports::{AssetStore, EventPublisher};
use messenger::domain::repo::{
    MessagesRepository, ParticipantsUpdate, ProfilesRepository, Repositories, ThreadsRepository,
    UserInsert, UsersRepository,
};
use messenger::domain::service::{Service, ServiceConfig};

#[derive(Default)]
struct State {
    users: HashMap<Uuid, User>,
    messages: HashMap<Uuid, Message>,
    threads: HashMap<Uuid, Thread>,
    thread_messages: HashMap<Uuid, Vec<Uuid>>,
    profiles: HashMap<Uuid, Profile>,
}

// In-memory repository for testing
#[derive(Default)]
struct MockRepository {
    state: Mutex<State>,
    fail_avatar_swap: bool,
    fail_profile_insert: bool,
    // Username lookups miss, as when a concurrent registration has not committed yet.
    stale_username_check: bool,
}

impl MockRepository {
    fn failing_avatar_swap() -> Self {
        Self {
            fail_avatar_swap: true,
            ..Default::default()
        }
    }

    fn failing_profile_insert() -> Self {
        Self {
            fail_profile_insert: true,
            ..Default::default()
        }
    }

    fn stale_username_check() -> Self {
        Self {
            stale_username_check: true,
            ..Default::default()
        }
    }
}

fn direct_in(state: &State, key: &PairKey) -> Option<Thread> {
    state
        .threads
        .values()
        .find(|t| PairKey::from_participants(&t.participants).as_ref() == Some(key))
        .cloned()
}

#[async_trait::async_trait]
impl UsersRepository for MockRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.state.lock().unwrap().users.get(&id).cloned())
    }

    async fn username_exists(&self, username: &str) -> Result<bool> {
        if self.stale_username_check {
            return Ok(false);
        }
        Ok(self
            .state
            .lock()
            .unwrap()
            .users
            .values()
            .any(|u| u.username == username))
    }

    async fn insert_with_profile(&self, u: User) -> Result<UserInsert> {
        let mut state = self.state.lock().unwrap();
        if state.users.values().any(|x| x.username == u.username) {
            return Ok(UserInsert::UsernameTaken);
        }
        // Nothing is written unless both rows are.
        if self.fail_profile_insert {
            return Err(anyhow!("insert profile failed: disk I/O error"));
        }
        state.profiles.insert(u.id, Profile::empty(u.id));
        state.users.insert(u.id, u);
        Ok(UserInsert::Inserted)
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        state.profiles.remove(&id);
        state.messages.retain(|_, m| m.author_id != id);
        for thread in state.threads.values_mut() {
            thread.participants.remove(&id);
        }
        Ok(state.users.remove(&id).is_some())
    }
}

#[async_trait::async_trait]
impl MessagesRepository for MockRepository {
    async fn insert(&self, m: Message) -> Result<()> {
        self.state.lock().unwrap().messages.insert(m.id, m);
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Message>> {
        Ok(self.state.lock().unwrap().messages.get(&id).cloned())
    }

    async fn find_many(&self, ids: &[Uuid]) -> Result<Vec<Message>> {
        let state = self.state.lock().unwrap();
        Ok(ids
            .iter()
            .filter_map(|id| state.messages.get(id).cloned())
            .collect())
    }

    async fn list_for_thread(&self, thread_id: Uuid) -> Result<Vec<Message>> {
        let state = self.state.lock().unwrap();
        let mut messages: Vec<Message> = state
            .thread_messages
            .get(&thread_id)
            .into_iter()
            .flatten()
            .filter_map(|id| state.messages.get(id).cloned())
            .collect();
        messages.sort_by_key(|m| (m.created_at, m.id));
        Ok(messages)
    }
}

#[async_trait::async_trait]
impl ThreadsRepository for MockRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Thread>> {
        Ok(self.state.lock().unwrap().threads.get(&id).cloned())
    }

    async fn find_direct(&self, key: &PairKey) -> Result<Option<Thread>> {
        Ok(direct_in(&self.state.lock().unwrap(), key))
    }

    async fn find_or_create_direct(
        &self,
        key: &PairKey,
        candidate: Thread,
    ) -> Result<(Thread, bool)> {
        let mut state = self.state.lock().unwrap();
        if let Some(existing) = direct_in(&state, key) {
            return Ok((existing, false));
        }
        state.threads.insert(candidate.id, candidate.clone());
        Ok((candidate, true))
    }

    async fn insert_empty(&self, t: Thread) -> Result<()> {
        self.state.lock().unwrap().threads.insert(t.id, t);
        Ok(())
    }

    async fn add_participants(
        &self,
        thread_id: Uuid,
        users: &[Uuid],
        _at: DateTime<Utc>,
    ) -> Result<ParticipantsUpdate> {
        let mut state = self.state.lock().unwrap();
        let current = state
            .threads
            .get(&thread_id)
            .cloned()
            .ok_or_else(|| anyhow!("thread {thread_id} not found"))?;
        let mut participants: BTreeSet<Uuid> = current.participants.clone();
        participants.extend(users.iter().copied());

        if let Some(key) = PairKey::from_participants(&participants) {
            if let Some(other) = direct_in(&state, &key).filter(|t| t.id != thread_id) {
                return Ok(ParticipantsUpdate::PairTaken { existing: other.id });
            }
        }
        let updated = Thread {
            participants,
            ..current
        };
        state.threads.insert(thread_id, updated.clone());
        Ok(ParticipantsUpdate::Updated(updated))
    }

    async fn attach_messages(
        &self,
        thread_id: Uuid,
        message_ids: &[Uuid],
        touched_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let attached = state.thread_messages.entry(thread_id).or_default();
        for id in message_ids {
            if !attached.contains(id) {
                attached.push(*id);
            }
        }
        let thread = state
            .threads
            .get_mut(&thread_id)
            .ok_or_else(|| anyhow!("thread {thread_id} not found"))?;
        thread.updated_at = touched_at;
        Ok(())
    }

    async fn insert_attached_message(&self, thread_id: Uuid, m: Message) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let thread = state
            .threads
            .get_mut(&thread_id)
            .ok_or_else(|| anyhow!("thread {thread_id} not found"))?;
        thread.updated_at = m.created_at;
        state.thread_messages.entry(thread_id).or_default().push(m.id);
        state.messages.insert(m.id, m);
        Ok(())
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Thread>> {
        let state = self.state.lock().unwrap();
        let mut threads: Vec<Thread> = state
            .threads
            .values()
            .filter(|t| t.has_participant(user_id))
            .cloned()
            .collect();
        threads.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(threads)
    }
}

#[async_trait::async_trait]
impl ProfilesRepository for MockRepository {
    async fn find_by_user(&self, user_id: Uuid) -> Result<Option<Profile>> {
        Ok(self.state.lock().unwrap().profiles.get(&user_id).cloned())
    }

    async fn insert_if_missing(&self, user_id: Uuid) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        if state.profiles.contains_key(&user_id) {
            return Ok(false);
        }
        state.profiles.insert(user_id, Profile::empty(user_id));
        Ok(true)
    }

    async fn update_details(&self, p: Profile) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let stored = state
            .profiles
            .get_mut(&p.user_id)
            .ok_or_else(|| anyhow!("profile not found"))?;
        stored.bio = p.bio;
        stored.link = p.link;
        Ok(())
    }

    async fn swap_avatar(&self, user_id: Uuid, avatar: Option<String>) -> Result<Option<String>> {
        if self.fail_avatar_swap {
            return Err(anyhow!("database is locked"));
        }
        let mut state = self.state.lock().unwrap();
        let stored = state
            .profiles
            .get_mut(&user_id)
            .ok_or_else(|| anyhow!("profile not found"))?;
        Ok(std::mem::replace(&mut stored.avatar, avatar))
    }

    async fn list_by_username(&self) -> Result<Vec<Profile>> {
        let state = self.state.lock().unwrap();
        let mut profiles: Vec<(String, Profile)> = state
            .profiles
            .values()
            .filter_map(|p| {
                state
                    .users
                    .get(&p.user_id)
                    .map(|u| (u.username.clone(), p.clone()))
            })
            .collect();
        profiles.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(profiles.into_iter().map(|(_, p)| p).collect())
    }
}

// In-memory asset store; deletes of paths listed in `undeletable` fail
#[derive(Default)]
struct MockAssetStore {
    files: Mutex<BTreeMap<String, Vec<u8>>>,
    undeletable: Mutex<BTreeSet<String>>,
}

impl MockAssetStore {
    fn paths(&self) -> Vec<String> {
        self.files.lock().unwrap().keys().cloned().collect()
    }
}

#[async_trait::async_trait]
impl AssetStore for MockAssetStore {
    async fn store(&self, path: &str, bytes: &[u8]) -> Result<()> {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<bool> {
        if self.undeletable.lock().unwrap().contains(path) {
            return Err(anyhow!("permission denied"));
        }
        Ok(self.files.lock().unwrap().remove(path).is_some())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.files.lock().unwrap().contains_key(path))
    }
}

// Event publisher that records what was published
#[derive(Default)]
struct RecordingPublisher {
    events: Mutex<Vec<MessengerEvent>>,
}

impl EventPublisher<MessengerEvent> for RecordingPublisher {
    fn publish(&self, event: &MessengerEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

struct Harness {
    service: Service,
    assets: Arc<MockAssetStore>,
    events: Arc<RecordingPublisher>,
}

fn harness_with(repo: MockRepository) -> Harness {
    let assets = Arc::new(MockAssetStore::default());
    let events = Arc::new(RecordingPublisher::default());
    let service = Service::new(
        Repositories::shared(Arc::new(repo)),
        assets.clone(),
        events.clone(),
        ServiceConfig::default(),
    );
    Harness {
        service,
        assets,
        events,
    }
}

fn harness() -> Harness {
    harness_with(MockRepository::default())
}

fn upload(name: &str) -> AvatarUpload {
    AvatarUpload {
        filename: name.to_string(),
        bytes: name.as_bytes().to_vec(),
    }
}

#[traced_test]
#[tokio::test]
async fn register_user_emits_spans_and_event() {
    let h = harness();

    let user = h.service.register_user("alice").await.unwrap();

    assert!(h.service.get_profile(user.id).await.is_ok());
    assert!(logs_contain("messenger.service.register_user"));
    assert!(logs_contain("Registered user"));
    assert!(matches!(
        h.events.events.lock().unwrap().as_slice(),
        [MessengerEvent::UserRegistered { id, .. }] if *id == user.id
    ));
}

#[traced_test]
#[tokio::test]
async fn failed_profile_insert_leaves_no_user() {
    let h = harness_with(MockRepository::failing_profile_insert());

    let err = h.service.register_user("alice").await.unwrap_err();

    assert!(matches!(err, DomainError::Database { ref message } if message.contains("profile")));
    assert!(h.service.list_profiles().await.unwrap().is_empty());
    assert!(h.events.events.lock().unwrap().is_empty());
    assert!(!logs_contain("Registered user"));
}

#[traced_test]
#[tokio::test]
async fn username_taken_at_insert_is_a_conflict() {
    let h = harness_with(MockRepository::stale_username_check());
    h.service.register_user("alice").await.unwrap();

    let err = h.service.register_user("alice").await.unwrap_err();

    assert!(matches!(err, DomainError::UsernameAlreadyExists { ref username } if username == "alice"));
    assert!(logs_contain("Username taken by a concurrent registration"));
    assert_eq!(h.events.events.lock().unwrap().len(), 1);
}

#[traced_test]
#[tokio::test]
async fn find_or_create_thread_publishes_once() {
    let h = harness();
    let a = h.service.register_user("alice").await.unwrap();
    let b = h.service.register_user("bob").await.unwrap();

    let first = h.service.find_or_create_thread(a.id, b.id).await.unwrap();
    let second = h.service.find_or_create_thread(b.id, a.id).await.unwrap();

    assert_eq!(first.id, second.id);
    assert!(logs_contain("Created direct thread"));
    assert!(logs_contain("Found existing thread"));
    let created = h
        .events
        .events
        .lock()
        .unwrap()
        .iter()
        .filter(|e| matches!(e, MessengerEvent::ThreadCreated { .. }))
        .count();
    assert_eq!(created, 1);
}

#[traced_test]
#[tokio::test]
async fn add_messages_logs_dropped_messages() {
    let h = harness();
    let a = h.service.register_user("alice").await.unwrap();
    let b = h.service.register_user("bob").await.unwrap();
    let c = h.service.register_user("carol").await.unwrap();
    let thread = h.service.find_or_create_thread(a.id, b.id).await.unwrap();
    let from_a = h.service.create_message(a.id, "hi").await.unwrap();
    let from_c = h.service.create_message(c.id, "hey").await.unwrap();

    let outcome = h
        .service
        .add_messages(thread.id, vec![from_c.id, from_a.id, from_c.id])
        .await
        .unwrap();

    assert_eq!(outcome.accepted, vec![from_a.id]);
    assert_eq!(outcome.rejected, vec![from_c.id]);
    assert!(logs_contain("messenger.service.add_messages"));
    assert!(logs_contain("Dropping message from non-participant"));
    assert!(h.events.events.lock().unwrap().iter().any(|e| matches!(
        e,
        MessengerEvent::MessagesAttached { accepted: 1, rejected: 1, .. }
    )));
}

#[traced_test]
#[tokio::test]
async fn post_message_rejects_non_participant_without_creating() {
    let h = harness();
    let a = h.service.register_user("alice").await.unwrap();
    let b = h.service.register_user("bob").await.unwrap();
    let c = h.service.register_user("carol").await.unwrap();
    let thread = h.service.find_or_create_thread(a.id, b.id).await.unwrap();

    let err = h
        .service
        .post_message(thread.id, c.id, "hello")
        .await
        .unwrap_err();

    assert!(matches!(err, DomainError::NotAParticipant { user_id, .. } if user_id == c.id));
    assert!(!logs_contain("Created message"));
}

#[traced_test]
#[tokio::test]
async fn replace_avatar_deletes_previous_asset() {
    let h = harness();
    let a = h.service.register_user("alice").await.unwrap();

    h.service.replace_avatar(a.id, upload("one.png")).await.unwrap();
    let profile = h.service.replace_avatar(a.id, upload("two.png")).await.unwrap();

    let expected = format!("profiles/{}/two.png", a.id);
    assert_eq!(profile.avatar.as_deref(), Some(expected.as_str()));
    assert_eq!(h.assets.paths(), vec![expected]);
    assert!(logs_contain("Deleted previous avatar"));
}

#[traced_test]
#[tokio::test]
async fn failed_swap_removes_the_new_asset() {
    let h = harness_with(MockRepository::failing_avatar_swap());
    let a = h.service.register_user("alice").await.unwrap();

    let err = h
        .service
        .replace_avatar(a.id, upload("one.png"))
        .await
        .unwrap_err();

    assert!(matches!(err, DomainError::Database { ref message } if message.contains("locked")));
    assert!(h.assets.paths().is_empty());
    assert!(h.service.get_profile(a.id).await.unwrap().avatar.is_none());
}

#[traced_test]
#[tokio::test]
async fn failed_old_asset_delete_only_warns() {
    let h = harness();
    let a = h.service.register_user("alice").await.unwrap();
    let first = h
        .service
        .replace_avatar(a.id, upload("one.png"))
        .await
        .unwrap()
        .avatar
        .unwrap();
    h.assets.undeletable.lock().unwrap().insert(first.clone());

    let profile = h.service.replace_avatar(a.id, upload("two.png")).await.unwrap();

    assert_eq!(
        profile.avatar,
        Some(format!("profiles/{}/two.png", a.id))
    );
    assert!(logs_contain("Failed to delete previous avatar"));
    // The orphan stays behind, the profile points at the new file.
    assert_eq!(h.assets.paths().len(), 2);
}

#[traced_test]
#[tokio::test]
async fn delete_user_removes_avatar_and_publishes() {
    let h = harness();
    let a = h.service.register_user("alice").await.unwrap();
    h.service.replace_avatar(a.id, upload("me.png")).await.unwrap();

    h.service.delete_user(a.id).await.unwrap();

    assert!(h.assets.paths().is_empty());
    assert!(matches!(
        h.service.get_user(a.id).await,
        Err(DomainError::UserNotFound { .. })
    ));
    assert!(h
        .events
        .events
        .lock()
        .unwrap()
        .iter()
        .any(|e| matches!(e, MessengerEvent::UserDeleted { id, .. } if *id == a.id)));
    assert!(logs_contain("Deleted user"));
}

#[tokio::test]
async fn add_participants_reports_taken_pair() {
    let h = harness();
    let a = h.service.register_user("alice").await.unwrap();
    let b = h.service.register_user("bob").await.unwrap();
    let direct = h.service.find_or_create_thread(a.id, b.id).await.unwrap();
    let other = h.service.create_thread().await.unwrap();

    let err = h
        .service
        .add_participants(other.id, vec![a.id, b.id])
        .await
        .unwrap_err();

    assert!(matches!(err, DomainError::DirectThreadExists { thread_id } if thread_id == direct.id));
}

#[tokio::test]
async fn add_participants_requires_known_users() {
    let h = harness();
    let a = h.service.register_user("alice").await.unwrap();
    let thread = h.service.create_thread().await.unwrap();

    let err = h
        .service
        .add_participants(thread.id, vec![a.id, Uuid::new_v4()])
        .await
        .unwrap_err();

    assert!(matches!(err, DomainError::UserNotFound { .. }));
    assert!(h.service.get_thread(thread.id).await.unwrap().participants.is_empty());
}
