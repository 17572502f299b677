//! SeaORM-backed implementation of the messenger repository ports.
//!
//! The repository is generic over `C: ConnectionTrait + TransactionTrait`, so
//! it can be built from a `DatabaseConnection` or from an outer transaction.
//! Multi-row changes run inside a transaction; every query issued while a
//! transaction is open goes through that transaction, never through
//! `self.conn`, which matters for single-connection pools.

use std::collections::{BTreeSet, HashMap};

use anyhow::Context;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, NotSet, PaginatorTrait,
    QueryFilter, QueryOrder, Set, SqlErr, TransactionTrait,
};
use tracing::debug;
use uuid::Uuid;

use crate::contract::model::{Message, Profile, Thread, User};
use crate::domain::pair::PairKey;
use crate::domain::repo::{
    MessagesRepository, ParticipantsUpdate, ProfilesRepository, ThreadsRepository, UserInsert,
    UsersRepository,
};
use crate::infra::storage::entity::{
    message, profile, thread, thread_message, thread_participant, user,
};
use crate::infra::storage::mapper::{
    message_to_contract, profile_to_contract, thread_to_contract, user_to_contract,
};

/// SeaORM repository impl.
/// Holds a connection object; its lifetime/ownership is up to the caller.
pub struct SeaOrmMessengerRepository<C>
where
    C: ConnectionTrait + TransactionTrait + Send + Sync,
{
    conn: C,
}

impl<C> SeaOrmMessengerRepository<C>
where
    C: ConnectionTrait + TransactionTrait + Send + Sync,
{
    pub fn new(conn: C) -> Self {
        Self { conn }
    }
}

fn is_unique_violation(e: &DbErr) -> bool {
    matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

/// Participant ids per thread, for the given threads.
async fn load_participants<C: ConnectionTrait>(
    conn: &C,
    thread_ids: &[Uuid],
) -> Result<HashMap<Uuid, Vec<Uuid>>, DbErr> {
    if thread_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows = thread_participant::Entity::find()
        .filter(thread_participant::Column::ThreadId.is_in(thread_ids.iter().copied()))
        .all(conn)
        .await?;

    let mut by_thread: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    for row in rows {
        by_thread.entry(row.thread_id).or_default().push(row.user_id);
    }
    Ok(by_thread)
}

async fn hydrate<C: ConnectionTrait>(
    conn: &C,
    model: thread::Model,
) -> Result<Thread, DbErr> {
    let mut participants = load_participants(conn, &[model.id]).await?;
    let users = participants.remove(&model.id).unwrap_or_default();
    Ok(thread_to_contract(model, users))
}

async fn find_thread<C: ConnectionTrait>(conn: &C, id: Uuid) -> Result<Option<Thread>, DbErr> {
    match thread::Entity::find_by_id(id).one(conn).await? {
        Some(model) => Ok(Some(hydrate(conn, model).await?)),
        None => Ok(None),
    }
}

async fn find_direct<C: ConnectionTrait>(
    conn: &C,
    key: &PairKey,
) -> Result<Option<Thread>, DbErr> {
    let found = thread::Entity::find()
        .filter(thread::Column::PairKey.eq(key.as_str()))
        .one(conn)
        .await?;
    match found {
        Some(model) => Ok(Some(hydrate(conn, model).await?)),
        None => Ok(None),
    }
}

async fn insert_user<C: ConnectionTrait>(conn: &C, u: &User) -> Result<(), DbErr> {
    let am = user::ActiveModel {
        id: Set(u.id),
        username: Set(u.username.clone()),
        created_at: Set(u.created_at),
    };
    user::Entity::insert(am).exec_without_returning(conn).await?;
    Ok(())
}

/// Empty profile for `user_id` unless one exists. Returns the rows inserted.
async fn insert_empty_profile<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
) -> Result<u64, DbErr> {
    let am = profile::ActiveModel {
        user_id: Set(user_id),
        avatar: Set(None),
        bio: Set(None),
        link: Set(None),
    };
    profile::Entity::insert(am)
        .on_conflict(
            OnConflict::column(profile::Column::UserId)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(conn)
        .await
}

async fn insert_message<C: ConnectionTrait>(conn: &C, m: Message) -> Result<(), DbErr> {
    let am = message::ActiveModel {
        id: Set(m.id),
        author_id: Set(m.author_id),
        content: Set(m.content),
        created_at: Set(m.created_at),
    };
    message::Entity::insert(am).exec_without_returning(conn).await?;
    Ok(())
}

/// Attach messages (re-attaching is a no-op) and touch the thread.
/// Returns false if the thread does not exist.
async fn attach_and_touch<C: ConnectionTrait>(
    conn: &C,
    thread_id: Uuid,
    message_ids: &[Uuid],
    touched_at: DateTime<Utc>,
) -> Result<bool, DbErr> {
    if !message_ids.is_empty() {
        let rows = message_ids.iter().map(|message_id| thread_message::ActiveModel {
            thread_id: Set(thread_id),
            message_id: Set(*message_id),
            attached_at: Set(touched_at),
        });
        thread_message::Entity::insert_many(rows)
            .on_conflict(
                OnConflict::columns([
                    thread_message::Column::ThreadId,
                    thread_message::Column::MessageId,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(conn)
            .await?;
    }

    let res = thread::Entity::update_many()
        .col_expr(thread::Column::UpdatedAt, Expr::value(touched_at))
        .filter(thread::Column::Id.eq(thread_id))
        .exec(conn)
        .await?;
    Ok(res.rows_affected > 0)
}

async fn insert_participants<C: ConnectionTrait>(
    conn: &C,
    thread_id: Uuid,
    users: &[Uuid],
    at: DateTime<Utc>,
) -> Result<(), DbErr> {
    if users.is_empty() {
        return Ok(());
    }
    let rows = users.iter().map(|user_id| thread_participant::ActiveModel {
        thread_id: Set(thread_id),
        user_id: Set(*user_id),
        joined_at: Set(at),
    });
    thread_participant::Entity::insert_many(rows)
        .on_conflict(
            OnConflict::columns([
                thread_participant::Column::ThreadId,
                thread_participant::Column::UserId,
            ])
            .do_nothing()
            .to_owned(),
        )
        .exec_without_returning(conn)
        .await?;
    Ok(())
}

async fn set_pair_key<C: ConnectionTrait>(
    conn: &C,
    thread_id: Uuid,
    key: Option<&PairKey>,
) -> Result<(), DbErr> {
    thread::Entity::update_many()
        .col_expr(
            thread::Column::PairKey,
            Expr::value(key.map(|k| k.as_str().to_string())),
        )
        .filter(thread::Column::Id.eq(thread_id))
        .exec(conn)
        .await?;
    Ok(())
}

#[async_trait::async_trait]
impl<C> UsersRepository for SeaOrmMessengerRepository<C>
where
    C: ConnectionTrait + TransactionTrait + Send + Sync + 'static,
{
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let found = user::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("find user by id failed")?;
        Ok(found.map(user_to_contract))
    }

    async fn username_exists(&self, username: &str) -> anyhow::Result<bool> {
        let count = user::Entity::find()
            .filter(user::Column::Username.eq(username))
            .count(&self.conn)
            .await
            .context("username_exists failed")?;
        Ok(count > 0)
    }

    async fn insert_with_profile(&self, u: User) -> anyhow::Result<UserInsert> {
        let txn = self.conn.begin().await.context("begin failed")?;

        let written = match insert_user(&txn, &u).await {
            Ok(()) => insert_empty_profile(&txn, u.id).await.map(|_| ()),
            Err(e) => Err(e),
        };
        let written = match written {
            Ok(()) => txn.commit().await,
            Err(e) => {
                txn.rollback().await.context("rollback failed")?;
                Err(e)
            }
        };

        let Err(e) = written else {
            return Ok(UserInsert::Inserted);
        };
        // A concurrent registration surfaces as a unique violation, or as a
        // busy database once its transaction holds the write lock.
        let unique = is_unique_violation(&e);
        let taken = unique || self.username_exists(&u.username).await?;
        debug!(unique, taken, "User insert failed");
        if taken {
            Ok(UserInsert::UsernameTaken)
        } else {
            Err(e).context("insert user failed")
        }
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        let txn = self.conn.begin().await.context("begin failed")?;

        let thread_ids: Vec<Uuid> = thread_participant::Entity::find()
            .filter(thread_participant::Column::UserId.eq(id))
            .all(&txn)
            .await
            .context("load memberships failed")?
            .into_iter()
            .map(|row| row.thread_id)
            .collect();

        let res = user::Entity::delete_by_id(id)
            .exec(&txn)
            .await
            .context("delete user failed")?;
        if res.rows_affected == 0 {
            txn.rollback().await.context("rollback failed")?;
            return Ok(false);
        }

        // Memberships are gone by cascade; the pair keys of the threads the
        // user left no longer describe their participant sets.
        let remaining = load_participants(&txn, &thread_ids)
            .await
            .context("load participants failed")?;
        for thread_id in thread_ids {
            let users: BTreeSet<Uuid> = remaining
                .get(&thread_id)
                .map(|u| u.iter().copied().collect())
                .unwrap_or_default();
            let key = PairKey::from_participants(&users);
            let taken = match &key {
                Some(k) => find_direct(&txn, k)
                    .await
                    .context("find_direct failed")?
                    .is_some_and(|t| t.id != thread_id),
                None => false,
            };
            let key = if taken { None } else { key };
            set_pair_key(&txn, thread_id, key.as_ref())
                .await
                .context("update pair key failed")?;
        }

        txn.commit().await.context("commit failed")?;
        Ok(true)
    }
}

#[async_trait::async_trait]
impl<C> MessagesRepository for SeaOrmMessengerRepository<C>
where
    C: ConnectionTrait + TransactionTrait + Send + Sync + 'static,
{
    async fn insert(&self, m: Message) -> anyhow::Result<()> {
        insert_message(&self.conn, m)
            .await
            .context("insert message failed")
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Message>> {
        let found = message::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("find message by id failed")?;
        Ok(found.map(message_to_contract))
    }

    async fn find_many(&self, ids: &[Uuid]) -> anyhow::Result<Vec<Message>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = message::Entity::find()
            .filter(message::Column::Id.is_in(ids.iter().copied()))
            .all(&self.conn)
            .await
            .context("find_many messages failed")?;
        Ok(rows.into_iter().map(message_to_contract).collect())
    }

    async fn list_for_thread(&self, thread_id: Uuid) -> anyhow::Result<Vec<Message>> {
        let rows = message::Entity::find()
            .inner_join(thread_message::Entity)
            .filter(thread_message::Column::ThreadId.eq(thread_id))
            .order_by_asc(message::Column::CreatedAt)
            .order_by_asc(message::Column::Id)
            .all(&self.conn)
            .await
            .context("list messages for thread failed")?;
        Ok(rows.into_iter().map(message_to_contract).collect())
    }
}

#[async_trait::async_trait]
impl<C> ThreadsRepository for SeaOrmMessengerRepository<C>
where
    C: ConnectionTrait + TransactionTrait + Send + Sync + 'static,
{
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Thread>> {
        find_thread(&self.conn, id)
            .await
            .context("find thread by id failed")
    }

    async fn find_direct(&self, key: &PairKey) -> anyhow::Result<Option<Thread>> {
        find_direct(&self.conn, key)
            .await
            .context("find_direct failed")
    }

    async fn find_or_create_direct(
        &self,
        key: &PairKey,
        candidate: Thread,
    ) -> anyhow::Result<(Thread, bool)> {
        let txn = self.conn.begin().await.context("begin failed")?;

        if let Some(existing) = find_direct(&txn, key)
            .await
            .context("find_direct failed")?
        {
            txn.commit().await.context("commit failed")?;
            return Ok((existing, false));
        }

        let am = thread::ActiveModel {
            id: Set(candidate.id),
            pair_key: Set(Some(key.as_str().to_string())),
            created_at: Set(candidate.created_at),
            updated_at: Set(candidate.updated_at),
        };
        let inserted = match am.insert(&txn).await {
            Ok(_) => insert_participants(
                &txn,
                candidate.id,
                &candidate.participants.iter().copied().collect::<Vec<_>>(),
                candidate.created_at,
            )
            .await,
            Err(e) => Err(e),
        };

        match inserted {
            Ok(()) => {
                txn.commit().await.context("commit failed")?;
                Ok((candidate, true))
            }
            Err(e) => {
                // Lost the race against a concurrent writer: unique violation
                // on pair_key, or a busy database. The winner's row is what we
                // want if it is there.
                txn.rollback().await.context("rollback failed")?;
                debug!(pair = %key, unique = is_unique_violation(&e), "Direct thread insert failed, re-reading");
                match find_direct(&self.conn, key)
                    .await
                    .context("find_direct after conflict failed")?
                {
                    Some(existing) => Ok((existing, false)),
                    None => Err(e).context("insert direct thread failed"),
                }
            }
        }
    }

    async fn insert_empty(&self, t: Thread) -> anyhow::Result<()> {
        let am = thread::ActiveModel {
            id: Set(t.id),
            pair_key: Set(None),
            created_at: Set(t.created_at),
            updated_at: Set(t.updated_at),
        };
        let _ = am.insert(&self.conn).await.context("insert thread failed")?;
        Ok(())
    }

    async fn add_participants(
        &self,
        thread_id: Uuid,
        users: &[Uuid],
        at: DateTime<Utc>,
    ) -> anyhow::Result<ParticipantsUpdate> {
        let txn = self.conn.begin().await.context("begin failed")?;

        let model = thread::Entity::find_by_id(thread_id)
            .one(&txn)
            .await
            .context("find thread failed")?
            .with_context(|| format!("thread {thread_id} not found"))?;

        insert_participants(&txn, thread_id, users, at)
            .await
            .context("insert participants failed")?;

        let participants: BTreeSet<Uuid> = load_participants(&txn, &[thread_id])
            .await
            .context("load participants failed")?
            .remove(&thread_id)
            .unwrap_or_default()
            .into_iter()
            .collect();
        let key = PairKey::from_participants(&participants);

        if key.as_ref().map(PairKey::as_str) != model.pair_key.as_deref() {
            if let Some(k) = &key {
                let holder = find_direct(&txn, k).await.context("find_direct failed")?;
                if let Some(other) = holder.filter(|t| t.id != thread_id) {
                    txn.rollback().await.context("rollback failed")?;
                    return Ok(ParticipantsUpdate::PairTaken { existing: other.id });
                }
            }
            if let Err(e) = set_pair_key(&txn, thread_id, key.as_ref()).await {
                txn.rollback().await.context("rollback failed")?;
                if let (true, Some(k)) = (is_unique_violation(&e), &key) {
                    if let Some(other) = find_direct(&self.conn, k)
                        .await
                        .context("find_direct after conflict failed")?
                    {
                        return Ok(ParticipantsUpdate::PairTaken { existing: other.id });
                    }
                }
                return Err(e).context("update pair key failed");
            }
        }

        txn.commit().await.context("commit failed")?;

        Ok(ParticipantsUpdate::Updated(thread_to_contract(
            thread::Model {
                pair_key: key.map(PairKey::into_string),
                ..model
            },
            participants,
        )))
    }

    async fn attach_messages(
        &self,
        thread_id: Uuid,
        message_ids: &[Uuid],
        touched_at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let txn = self.conn.begin().await.context("begin failed")?;

        let found = attach_and_touch(&txn, thread_id, message_ids, touched_at)
            .await
            .context("attach messages failed")?;
        if !found {
            txn.rollback().await.context("rollback failed")?;
            anyhow::bail!("thread {thread_id} not found");
        }

        txn.commit().await.context("commit failed")?;
        Ok(())
    }

    async fn insert_attached_message(&self, thread_id: Uuid, m: Message) -> anyhow::Result<()> {
        let (message_id, touched_at) = (m.id, m.created_at);
        let txn = self.conn.begin().await.context("begin failed")?;

        let written = match insert_message(&txn, m).await {
            Ok(()) => attach_and_touch(&txn, thread_id, &[message_id], touched_at).await,
            Err(e) => Err(e),
        };
        match written {
            Ok(true) => {}
            Ok(false) => {
                txn.rollback().await.context("rollback failed")?;
                anyhow::bail!("thread {thread_id} not found");
            }
            Err(e) => {
                txn.rollback().await.context("rollback failed")?;
                return Err(e).context("post message failed");
            }
        }

        txn.commit().await.context("commit failed")?;
        Ok(())
    }

    async fn list_for_user(&self, user_id: Uuid) -> anyhow::Result<Vec<Thread>> {
        let models = thread::Entity::find()
            .inner_join(thread_participant::Entity)
            .filter(thread_participant::Column::UserId.eq(user_id))
            .order_by_desc(thread::Column::UpdatedAt)
            .order_by_asc(thread::Column::Id)
            .all(&self.conn)
            .await
            .context("list threads for user failed")?;

        let ids: Vec<Uuid> = models.iter().map(|m| m.id).collect();
        let mut participants = load_participants(&self.conn, &ids)
            .await
            .context("load participants failed")?;

        Ok(models
            .into_iter()
            .map(|m| {
                let users = participants.remove(&m.id).unwrap_or_default();
                thread_to_contract(m, users)
            })
            .collect())
    }
}

#[async_trait::async_trait]
impl<C> ProfilesRepository for SeaOrmMessengerRepository<C>
where
    C: ConnectionTrait + TransactionTrait + Send + Sync + 'static,
{
    async fn find_by_user(&self, user_id: Uuid) -> anyhow::Result<Option<Profile>> {
        let found = profile::Entity::find_by_id(user_id)
            .one(&self.conn)
            .await
            .context("find profile failed")?;
        Ok(found.map(profile_to_contract))
    }

    async fn insert_if_missing(&self, user_id: Uuid) -> anyhow::Result<bool> {
        let inserted = insert_empty_profile(&self.conn, user_id)
            .await
            .context("insert profile failed")?;
        Ok(inserted > 0)
    }

    async fn update_details(&self, p: Profile) -> anyhow::Result<()> {
        let am = profile::ActiveModel {
            user_id: Set(p.user_id),
            avatar: NotSet,
            bio: Set(p.bio),
            link: Set(p.link),
        };
        let _ = am
            .update(&self.conn)
            .await
            .context("update profile failed")?;
        Ok(())
    }

    async fn swap_avatar(
        &self,
        user_id: Uuid,
        avatar: Option<String>,
    ) -> anyhow::Result<Option<String>> {
        let txn = self.conn.begin().await.context("begin failed")?;

        let current = profile::Entity::find_by_id(user_id)
            .one(&txn)
            .await
            .context("find profile failed")?
            .with_context(|| format!("profile of user {user_id} not found"))?;

        let am = profile::ActiveModel {
            user_id: Set(user_id),
            avatar: Set(avatar),
            bio: NotSet,
            link: NotSet,
        };
        let _ = am.update(&txn).await.context("update avatar failed")?;

        txn.commit().await.context("commit failed")?;
        Ok(current.avatar)
    }

    async fn list_by_username(&self) -> anyhow::Result<Vec<Profile>> {
        let rows = profile::Entity::find()
            .inner_join(user::Entity)
            .order_by_asc(user::Column::Username)
            .all(&self.conn)
            .await
            .context("list profiles failed")?;
        Ok(rows.into_iter().map(profile_to_contract).collect())
    }
}
