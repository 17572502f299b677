use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "threads")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Set only while the thread has exactly two participants.
    #[sea_orm(unique)]
    pub pair_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::thread_participant::Entity")]
    ThreadParticipant,
    #[sea_orm(has_many = "super::thread_message::Entity")]
    ThreadMessage,
}

impl Related<super::thread_participant::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ThreadParticipant.def()
    }
}

impl Related<super::thread_message::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ThreadMessage.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
