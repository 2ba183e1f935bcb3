use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::{
    core::{
        index::{Index, IndexSet},
        indices::{BucketIndex, PrefixSearchIndex, UniqueIndex},
        table::{Table, TableSchema, WritableSchema},
    },
    op::Row,
    records::{User, UserRole},
    runtime::database::Database,
    types::{format_timestamp, parse_timestamp},
};

use super::{RepoResult, parse_i64};

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Every user, sorted by full name.
    fn all(&self) -> Vec<Arc<User>>;

    fn by_full_name(&self, full_name: &str) -> Option<Arc<User>>;

    fn by_telegram_id(&self, telegram_id: i64) -> Option<Arc<User>>;

    /// Case-insensitive, without the leading `@`.
    fn by_telegram_name(&self, telegram_name: &str) -> Option<Arc<User>>;

    fn by_pos_id(&self, pos_id: &str) -> Option<Arc<User>>;

    /// Users whose birthday falls on the month and day of `day`.
    fn by_birthday(&self, day: NaiveDate) -> Vec<Arc<User>>;

    /// Users whose handle, alias or name contains `query`.
    fn search(&self, query: &str) -> Vec<Arc<User>>;

    /// Updates a stored user; users are created by hand in the sheet.
    async fn save(&self, user: User) -> RepoResult<Arc<User>>;

    async fn save_all(&self, users: Vec<User>) -> RepoResult<Vec<Arc<User>>>;
}

pub struct UserIndexes {
    pub by_full_name: UniqueIndex<User, String>,
    pub by_telegram_id: UniqueIndex<User, i64>,
    pub by_telegram_name: UniqueIndex<User, String>,
    pub by_pos_id: UniqueIndex<User, String>,
    pub by_birthday: BucketIndex<User, String>,
    pub by_prefix: PrefixSearchIndex<User>,
}

impl IndexSet<User> for UserIndexes {
    fn indexes_mut(&mut self) -> Vec<&mut dyn Index<User>> {
        vec![
            &mut self.by_full_name,
            &mut self.by_telegram_id,
            &mut self.by_telegram_name,
            &mut self.by_pos_id,
            &mut self.by_birthday,
            &mut self.by_prefix,
        ]
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct UserSchema;

impl TableSchema for UserSchema {
    type Record = User;
    type Indexes = UserIndexes;

    fn new_indexes(&self) -> UserIndexes {
        UserIndexes {
            by_full_name: UniqueIndex::new(|user: &User| Some(user.full_name.clone())),
            by_telegram_id: UniqueIndex::new(|user: &User| user.telegram_id),
            by_telegram_name: UniqueIndex::new(|user: &User| {
                (!user.telegram_username.is_empty()).then(|| user.telegram_username.to_lowercase())
            }),
            by_pos_id: UniqueIndex::new(|user: &User| user.pos_id.clone()),
            by_birthday: BucketIndex::new(|user: &User| user.birthday.clone()),
            by_prefix: PrefixSearchIndex::new(User::search_keys),
        }
    }

    fn deserialize(&self, row: &Row) -> Option<User> {
        let full_name = row.non_empty("full_name")?;

        Some(User {
            full_name: full_name.to_string(),
            aliases: row
                .text("aliases")
                .split(',')
                .map(str::trim)
                .filter(|alias| !alias.is_empty())
                .map(str::to_string)
                .collect(),
            role: UserRole::parse(row.text("role")).unwrap_or_default(),
            telegram_username: row.text("telegram_username").trim_start_matches('@').to_string(),
            birthday: row.non_empty("birthday").map(str::to_string),
            telegram_id: parse_i64(row.text("telegram_id")),
            pos_id: row.non_empty("pos_id").map(str::to_string),
            last_private_chat: parse_timestamp(row.text("last_private_chat")),
            telegram_blocked: row.non_empty("telegram_blocked").is_some(),
        })
    }
}

impl WritableSchema for UserSchema {
    const KEY_COLUMN: &'static str = "full_name";

    fn serialize(&self, user: &User) -> Row {
        Row::new()
            .with("full_name", user.full_name.as_str())
            .with("aliases", user.aliases.join(","))
            .with("role", user.role.label())
            .with("telegram_username", user.telegram_username.as_str())
            .with("birthday", user.birthday.clone().unwrap_or_default())
            .with(
                "telegram_id",
                user.telegram_id.map(|id| id.to_string()).unwrap_or_default(),
            )
            .with("pos_id", user.pos_id.clone().unwrap_or_default())
            .with("last_private_chat", format_timestamp(user.last_private_chat))
            .with("telegram_blocked", if user.telegram_blocked { "BLOCKED" } else { "" })
    }

    fn row_key(&self, user: &User) -> String {
        user.full_name.clone()
    }

    fn existing(&self, indexes: &UserIndexes, user: &User) -> Option<Arc<User>> {
        indexes.by_full_name.get(user.full_name.as_str())
    }
}

pub struct SheetUserRepository {
    table: Table<UserSchema>,
}

impl SheetUserRepository {
    pub fn attach(db: Arc<Database>, sheet: &str) -> Self {
        Self {
            table: Table::attach(db, sheet, UserSchema),
        }
    }

    pub fn table(&self) -> &Table<UserSchema> {
        &self.table
    }
}

#[async_trait]
impl UserRepository for SheetUserRepository {
    fn all(&self) -> Vec<Arc<User>> {
        let mut users: Vec<Arc<User>> = self.table.read().by_full_name.values().cloned().collect();
        users.sort_by(|a, b| a.full_name.cmp(&b.full_name));
        users
    }

    fn by_full_name(&self, full_name: &str) -> Option<Arc<User>> {
        self.table.read().by_full_name.get(full_name)
    }

    fn by_telegram_id(&self, telegram_id: i64) -> Option<Arc<User>> {
        self.table.read().by_telegram_id.get(&telegram_id)
    }

    fn by_telegram_name(&self, telegram_name: &str) -> Option<Arc<User>> {
        let key = telegram_name.trim_start_matches('@').to_lowercase();
        self.table.read().by_telegram_name.get(key.as_str())
    }

    fn by_pos_id(&self, pos_id: &str) -> Option<Arc<User>> {
        self.table.read().by_pos_id.get(pos_id)
    }

    fn by_birthday(&self, day: NaiveDate) -> Vec<Arc<User>> {
        let key = day.format("%m-%d").to_string();
        self.table.read().by_birthday.get(key.as_str()).unwrap_or_default()
    }

    fn search(&self, query: &str) -> Vec<Arc<User>> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return Vec::new();
        }
        self.table.read().by_prefix.get(&query).unwrap_or_default()
    }

    async fn save(&self, user: User) -> RepoResult<Arc<User>> {
        Ok(self.table.update(user).await?)
    }

    async fn save_all(&self, users: Vec<User>) -> RepoResult<Vec<Arc<User>>> {
        Ok(self.table.update_all(users).await?)
    }
}
