use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveTime, Weekday};

use crate::{
    core::{
        index::{Index, IndexSet},
        indices::{SortedBucketIndex, UniqueIndex},
        table::{Table, TableSchema, WritableSchema},
    },
    op::Row,
    records::{
        Task, TaskList,
        task::{list_id, weekday_name},
    },
    runtime::database::Database,
    types::Timestamp,
};

use super::{RepoError, RepoResult, parse_u32};

#[async_trait]
pub trait TaskRepository: Send + Sync {
    fn task_list(&self, weekday: Weekday, group: &str) -> Option<TaskList>;

    /// The list that starts soonest after `after`.
    fn next_task_list(&self, after: Timestamp) -> Option<TaskList>;

    /// Copy of `list` with the task at `position` flipped. Nothing is stored.
    fn toggle(&self, list: &TaskList, position: usize) -> RepoResult<TaskList>;

    /// Stores the `done` state of every task of an existing list.
    async fn save(&self, list: TaskList) -> RepoResult<TaskList>;

    /// Marks every task of the list as not done and stores it.
    async fn clear(&self, list: TaskList) -> RepoResult<TaskList>;
}

pub struct TaskIndexes {
    pub by_id: UniqueIndex<Task, String>,
    pub by_list: SortedBucketIndex<Task, String, u32>,
}

impl IndexSet<Task> for TaskIndexes {
    fn indexes_mut(&mut self) -> Vec<&mut dyn Index<Task>> {
        vec![&mut self.by_id, &mut self.by_list]
    }
}

impl TaskIndexes {
    fn list(&self, id: &str) -> Option<TaskList> {
        let tasks = self.by_list.get(id)?;
        let first = tasks.first()?;
        Some(TaskList {
            weekday: first.weekday,
            group: first.group.clone(),
            tasks,
        })
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TaskSchema;

impl TableSchema for TaskSchema {
    type Record = Task;
    type Indexes = TaskIndexes;

    fn new_indexes(&self) -> TaskIndexes {
        TaskIndexes {
            by_id: UniqueIndex::new(|task: &Task| Some(task.row_id())),
            by_list: SortedBucketIndex::new(|task: &Task| Some(task.list_id()), |task: &Task| task.position),
        }
    }

    fn deserialize(&self, row: &Row) -> Option<Task> {
        let weekday: Weekday = row.text("weekday").parse().ok()?;
        let group = row.non_empty("group")?.to_lowercase();
        let position = parse_u32(row.text("position"))?;
        let time = parse_time(row.text("time"))?;
        let name = row.non_empty("name")?;

        Some(Task {
            weekday,
            group,
            position,
            time,
            name: name.to_string(),
            done: row.non_empty("done").is_some(),
        })
    }
}

impl WritableSchema for TaskSchema {
    const KEY_COLUMN: &'static str = "id";

    fn serialize(&self, task: &Task) -> Row {
        Row::new()
            .with("id", task.row_id())
            .with("weekday", weekday_name(task.weekday))
            .with("group", task.group.as_str())
            .with("position", task.position.to_string())
            .with("time", task.time.format("%H:%M").to_string())
            .with("name", task.name.as_str())
            .with("done", if task.done { "x" } else { "" })
    }

    fn row_key(&self, task: &Task) -> String {
        task.row_id()
    }

    fn existing(&self, indexes: &TaskIndexes, task: &Task) -> Option<Arc<Task>> {
        indexes.by_id.get(task.row_id().as_str())
    }
}

fn parse_time(text: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(text, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M:%S"))
        .ok()
}

pub struct SheetTaskRepository {
    table: Table<TaskSchema>,
}

impl SheetTaskRepository {
    pub fn attach(db: Arc<Database>, sheet: &str) -> Self {
        Self {
            table: Table::attach(db, sheet, TaskSchema),
        }
    }

    pub fn table(&self) -> &Table<TaskSchema> {
        &self.table
    }
}

#[async_trait]
impl TaskRepository for SheetTaskRepository {
    fn task_list(&self, weekday: Weekday, group: &str) -> Option<TaskList> {
        self.table.read().list(&list_id(weekday, group))
    }

    fn next_task_list(&self, after: Timestamp) -> Option<TaskList> {
        let indexes = self.table.read();
        let mut ids: Vec<&String> = indexes.by_list.keys().collect();
        ids.sort();
        ids.into_iter()
            .filter_map(|id| indexes.list(id))
            .filter_map(|list| list.next_run(after).map(|run| (run, list)))
            .min_by_key(|(run, _)| *run)
            .map(|(_, list)| list)
    }

    fn toggle(&self, list: &TaskList, position: usize) -> RepoResult<TaskList> {
        let task = list.tasks.get(position).ok_or_else(|| RepoError::MissingTask {
            list: list.id(),
            position,
        })?;

        let mut toggled = list.clone();
        toggled.tasks[position] = Arc::new(task.with_done(!task.done));
        Ok(toggled)
    }

    async fn save(&self, list: TaskList) -> RepoResult<TaskList> {
        if !self.table.read().by_list.contains_key(list.id().as_str()) {
            return Err(RepoError::MissingTaskList(list.id()));
        }

        let tasks = list.tasks.iter().map(|task| task.as_ref().clone()).collect();
        let tasks = self.table.update_all(tasks).await?;
        Ok(TaskList { tasks, ..list })
    }

    async fn clear(&self, list: TaskList) -> RepoResult<TaskList> {
        let cleared = TaskList {
            tasks: list
                .tasks
                .iter()
                .map(|task| Arc::new(task.with_done(false)))
                .collect(),
            ..list
        };
        self.save(cleared).await
    }
}
