//! Issue persistence, including issue labels.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::{extension::postgres::PgExpr, Condition, Expr, Query};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use super::contains_pattern;
use super::entities::issue::{self, Entity as IssueEntity};
use super::entities::issue_label::{self, Entity as IssueLabelEntity};
use super::entities::label::{self, Entity as LabelEntity};
use crate::domain::{Issue, IssueFilter, IssuePatch, IssueScope, Label, NewIssue};
use crate::errors::{AppError, AppResult};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait IssueRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Issue>>;

    /// Filtered page, newest first, with the total count
    async fn list(&self, filter: IssueFilter, offset: u64, limit: u64) -> AppResult<(Vec<Issue>, u64)>;

    /// Every issue of a team (reports)
    async fn list_by_team(&self, team_id: Uuid) -> AppResult<Vec<Issue>>;

    async fn count_by_status(&self, status_id: Uuid) -> AppResult<u64>;

    async fn update(&self, id: Uuid, patch: IssuePatch) -> AppResult<Issue>;

    async fn delete(&self, id: Uuid) -> AppResult<()>;

    async fn labels(&self, issue_id: Uuid) -> AppResult<Vec<Label>>;

    /// Case-insensitive title/description match across the given teams
    async fn search(&self, team_ids: Vec<Uuid>, query: String, limit: u64) -> AppResult<Vec<Issue>>;
}

/// Next per-project issue number
pub(crate) async fn next_number<C: ConnectionTrait>(conn: &C, project_id: Uuid) -> AppResult<i32> {
    let last = IssueEntity::find()
        .filter(issue::Column::ProjectId.eq(project_id))
        .order_by_desc(issue::Column::Number)
        .one(conn)
        .await?;
    Ok(last.map(|i| i.number + 1).unwrap_or(1))
}

pub(crate) async fn insert_issue<C: ConnectionTrait>(
    conn: &C,
    new: NewIssue,
    number: i32,
) -> AppResult<Issue> {
    let now = Utc::now();
    let model = issue::ActiveModel {
        id: Set(Uuid::new_v4()),
        team_id: Set(new.team_id),
        project_id: Set(new.project_id),
        number: Set(number),
        title: Set(new.title),
        description: Set(new.description),
        status_id: Set(new.status_id),
        priority: Set(new.priority.as_str().to_string()),
        assignee_id: Set(new.assignee_id),
        reporter_id: Set(new.reporter_id),
        due_date: Set(new.due_date),
        completed_at: Set(new.completed_at),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(conn)
    .await?;

    Ok(Issue::from(model))
}

/// Replace the label set of an issue
pub(crate) async fn replace_labels<C: ConnectionTrait>(
    conn: &C,
    issue_id: Uuid,
    label_ids: Vec<Uuid>,
) -> AppResult<()> {
    IssueLabelEntity::delete_many()
        .filter(issue_label::Column::IssueId.eq(issue_id))
        .exec(conn)
        .await?;

    if label_ids.is_empty() {
        return Ok(());
    }

    let rows = label_ids.into_iter().map(|label_id| issue_label::ActiveModel {
        issue_id: Set(issue_id),
        label_id: Set(label_id),
    });
    IssueLabelEntity::insert_many(rows).exec(conn).await?;
    Ok(())
}

fn filter_condition(filter: &IssueFilter) -> Condition {
    let mut condition = Condition::all();
    condition = match filter.scope {
        IssueScope::Project(id) => condition.add(issue::Column::ProjectId.eq(id)),
        IssueScope::Team(id) => condition.add(issue::Column::TeamId.eq(id)),
    };
    if let Some(status_id) = filter.status_id {
        condition = condition.add(issue::Column::StatusId.eq(status_id));
    }
    if let Some(assignee_id) = filter.assignee_id {
        condition = condition.add(issue::Column::AssigneeId.eq(assignee_id));
    }
    if let Some(priority) = filter.priority {
        condition = condition.add(issue::Column::Priority.eq(priority.as_str()));
    }
    if let Some(label_id) = filter.label_id {
        condition = condition.add(
            issue::Column::Id.in_subquery(
                Query::select()
                    .column(issue_label::Column::IssueId)
                    .from(IssueLabelEntity)
                    .and_where(issue_label::Column::LabelId.eq(label_id))
                    .to_owned(),
            ),
        );
    }
    condition
}

pub struct IssueStore {
    db: DatabaseConnection,
}

impl IssueStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl IssueRepository for IssueStore {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Issue>> {
        let result = IssueEntity::find_by_id(id).one(&self.db).await?;
        Ok(result.map(Issue::from))
    }

    async fn list(&self, filter: IssueFilter, offset: u64, limit: u64) -> AppResult<(Vec<Issue>, u64)> {
        let query = IssueEntity::find().filter(filter_condition(&filter));

        let total = query.clone().count(&self.db).await?;
        let models = query
            .order_by_desc(issue::Column::CreatedAt)
            .offset(offset)
            .limit(limit)
            .all(&self.db)
            .await?;

        Ok((models.into_iter().map(Issue::from).collect(), total))
    }

    async fn list_by_team(&self, team_id: Uuid) -> AppResult<Vec<Issue>> {
        let models = IssueEntity::find()
            .filter(issue::Column::TeamId.eq(team_id))
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(Issue::from).collect())
    }

    async fn count_by_status(&self, status_id: Uuid) -> AppResult<u64> {
        Ok(IssueEntity::find()
            .filter(issue::Column::StatusId.eq(status_id))
            .count(&self.db)
            .await?)
    }

    async fn update(&self, id: Uuid, patch: IssuePatch) -> AppResult<Issue> {
        let mut active: issue::ActiveModel = IssueEntity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)?
            .into();

        if let Some(title) = patch.title {
            active.title = Set(title);
        }
        if let Some(description) = patch.description {
            active.description = Set(description);
        }
        if let Some(status_id) = patch.status_id {
            active.status_id = Set(status_id);
        }
        if let Some(priority) = patch.priority {
            active.priority = Set(priority.as_str().to_string());
        }
        if let Some(assignee_id) = patch.assignee_id {
            active.assignee_id = Set(assignee_id);
        }
        if let Some(due_date) = patch.due_date {
            active.due_date = Set(due_date);
        }
        if let Some(completed_at) = patch.completed_at {
            active.completed_at = Set(completed_at);
        }
        active.updated_at = Set(Utc::now());

        let model = active.update(&self.db).await?;
        Ok(Issue::from(model))
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let result = IssueEntity::delete_by_id(id).exec(&self.db).await?;
        if result.rows_affected == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    async fn labels(&self, issue_id: Uuid) -> AppResult<Vec<Label>> {
        let label_ids: Vec<Uuid> = IssueLabelEntity::find()
            .filter(issue_label::Column::IssueId.eq(issue_id))
            .all(&self.db)
            .await?
            .into_iter()
            .map(|row| row.label_id)
            .collect();

        if label_ids.is_empty() {
            return Ok(Vec::new());
        }

        let models = LabelEntity::find()
            .filter(label::Column::Id.is_in(label_ids))
            .order_by_asc(label::Column::Name)
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(Label::from).collect())
    }

    async fn search(&self, team_ids: Vec<Uuid>, query: String, limit: u64) -> AppResult<Vec<Issue>> {
        if team_ids.is_empty() {
            return Ok(Vec::new());
        }

        let pattern = contains_pattern(&query);
        let models = IssueEntity::find()
            .filter(issue::Column::TeamId.is_in(team_ids))
            .filter(
                Condition::any()
                    .add(Expr::col(issue::Column::Title).ilike(pattern.clone()))
                    .add(Expr::col(issue::Column::Description).ilike(pattern)),
            )
            .order_by_desc(issue::Column::UpdatedAt)
            .limit(limit)
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(Issue::from).collect())
    }
}
