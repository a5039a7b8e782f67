//! ARIA tool catalogue and argument parsing.
//!
//! The set of tools is fixed. Each tool has an access level and a typed
//! argument struct; raw model output is parsed into [`ToolRequest`] before
//! anything runs.

use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::domain::Priority;
use crate::infra::ToolDefinition;

/// What a tool may do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolAccess {
    Read,
    Write,
}

struct ToolSpec {
    name: &'static str,
    description: &'static str,
    access: ToolAccess,
    parameters: fn() -> Value,
}

const CATALOGUE: &[ToolSpec] = &[
    ToolSpec {
        name: "list_teams",
        description: "List the teams the user belongs to, with the user's role in each.",
        access: ToolAccess::Read,
        parameters: no_parameters,
    },
    ToolSpec {
        name: "list_projects",
        description: "List the active projects of a team.",
        access: ToolAccess::Read,
        parameters: list_projects_parameters,
    },
    ToolSpec {
        name: "list_issues",
        description: "List issues of a project, newest first. Optionally filter by status or assignee.",
        access: ToolAccess::Read,
        parameters: list_issues_parameters,
    },
    ToolSpec {
        name: "get_issue",
        description: "Get one issue with its labels and comments.",
        access: ToolAccess::Read,
        parameters: issue_id_parameters,
    },
    ToolSpec {
        name: "search",
        description: "Search issue titles, issue descriptions and project names across the user's teams.",
        access: ToolAccess::Read,
        parameters: search_parameters,
    },
    ToolSpec {
        name: "team_summary",
        description: "Summary report of a team: open work, status breakdown, overdue issues and project progress.",
        access: ToolAccess::Read,
        parameters: team_id_parameters,
    },
    ToolSpec {
        name: "list_notifications",
        description: "List the user's unread notifications.",
        access: ToolAccess::Read,
        parameters: no_parameters,
    },
    ToolSpec {
        name: "create_issue",
        description: "Create an issue in a project.",
        access: ToolAccess::Write,
        parameters: create_issue_parameters,
    },
    ToolSpec {
        name: "update_issue",
        description: "Change the title, status, priority or assignee of an issue.",
        access: ToolAccess::Write,
        parameters: update_issue_parameters,
    },
    ToolSpec {
        name: "add_comment",
        description: "Add a comment to an issue.",
        access: ToolAccess::Write,
        parameters: add_comment_parameters,
    },
];

/// Tool definitions offered to the model.
pub fn definitions() -> Vec<ToolDefinition> {
    CATALOGUE
        .iter()
        .map(|spec| ToolDefinition {
            name: spec.name.to_string(),
            description: spec.description.to_string(),
            parameters: (spec.parameters)(),
        })
        .collect()
}

/// Access level of a catalogued tool; `None` for unknown names.
pub fn access_of(name: &str) -> Option<ToolAccess> {
    CATALOGUE.iter().find(|s| s.name == name).map(|s| s.access)
}

const PRIORITIES: [&str; 5] = ["none", "low", "medium", "high", "urgent"];

fn no_parameters() -> Value {
    json!({ "type": "object", "properties": {}, "additionalProperties": false })
}

fn uuid_property(description: &str) -> Value {
    json!({ "type": "string", "format": "uuid", "description": description })
}

fn team_id_parameters() -> Value {
    json!({
        "type": "object",
        "properties": { "team_id": uuid_property("Team id") },
        "required": ["team_id"],
        "additionalProperties": false
    })
}

fn list_projects_parameters() -> Value {
    team_id_parameters()
}

fn issue_id_parameters() -> Value {
    json!({
        "type": "object",
        "properties": { "issue_id": uuid_property("Issue id") },
        "required": ["issue_id"],
        "additionalProperties": false
    })
}

fn list_issues_parameters() -> Value {
    json!({
        "type": "object",
        "properties": {
            "project_id": uuid_property("Project id"),
            "status": { "type": "string", "description": "Status id or status name" },
            "assignee_id": uuid_property("Only issues assigned to this user")
        },
        "required": ["project_id"],
        "additionalProperties": false
    })
}

fn search_parameters() -> Value {
    json!({
        "type": "object",
        "properties": {
            "query": { "type": "string", "minLength": 2, "description": "Text to look for" }
        },
        "required": ["query"],
        "additionalProperties": false
    })
}

fn create_issue_parameters() -> Value {
    json!({
        "type": "object",
        "properties": {
            "project_id": uuid_property("Project the issue belongs to"),
            "title": { "type": "string", "maxLength": 200 },
            "description": { "type": "string" },
            "priority": { "type": "string", "enum": PRIORITIES },
            "assignee_id": uuid_property("User to assign")
        },
        "required": ["project_id", "title"],
        "additionalProperties": false
    })
}

fn update_issue_parameters() -> Value {
    json!({
        "type": "object",
        "properties": {
            "issue_id": uuid_property("Issue to change"),
            "title": { "type": "string", "maxLength": 200 },
            "status_id": uuid_property("New status"),
            "priority": { "type": "string", "enum": PRIORITIES },
            "assignee_id": uuid_property("New assignee")
        },
        "required": ["issue_id"],
        "additionalProperties": false
    })
}

fn add_comment_parameters() -> Value {
    json!({
        "type": "object",
        "properties": {
            "issue_id": uuid_property("Issue to comment on"),
            "body": { "type": "string", "minLength": 1 }
        },
        "required": ["issue_id", "body"],
        "additionalProperties": false
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TeamArgs {
    pub team_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IssueArgs {
    pub issue_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ListIssuesArgs {
    pub project_id: Uuid,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub assignee_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SearchArgs {
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateIssueArgs {
    pub project_id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub assignee_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateIssueArgs {
    pub issue_id: Uuid,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub status_id: Option<Uuid>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub assignee_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddCommentArgs {
    pub issue_id: Uuid,
    pub body: String,
}

/// A parsed, catalogued tool call
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "tool", content = "args", rename_all = "snake_case", deny_unknown_fields)]
pub enum ToolRequest {
    ListTeams {},
    ListProjects(TeamArgs),
    ListIssues(ListIssuesArgs),
    GetIssue(IssueArgs),
    Search(SearchArgs),
    TeamSummary(TeamArgs),
    ListNotifications {},
    CreateIssue(CreateIssueArgs),
    UpdateIssue(UpdateIssueArgs),
    AddComment(AddCommentArgs),
}

/// Why a model's tool call was refused before running
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ToolRejection {
    #[error("unknown tool '{0}'")]
    UnknownTool(String),

    #[error("invalid arguments for '{tool}': {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error("'{0}' changes data and this conversation is read-only")]
    ReadOnly(String),
}

impl ToolRequest {
    /// Parse a tool call. Empty argument strings count as `{}`.
    pub fn parse(name: &str, arguments: &str) -> Result<Self, ToolRejection> {
        if access_of(name).is_none() {
            return Err(ToolRejection::UnknownTool(name.to_string()));
        }

        let invalid = |reason: String| ToolRejection::InvalidArguments {
            tool: name.to_string(),
            reason,
        };

        let args: Value = if arguments.trim().is_empty() {
            json!({})
        } else {
            serde_json::from_str(arguments).map_err(|e| invalid(e.to_string()))?
        };
        if !args.is_object() {
            return Err(invalid("arguments must be a JSON object".to_string()));
        }

        serde_json::from_value(json!({ "tool": name, "args": args }))
            .map_err(|e| invalid(e.to_string()))
    }

    pub fn access(&self) -> ToolAccess {
        match self {
            ToolRequest::CreateIssue(_) | ToolRequest::UpdateIssue(_) | ToolRequest::AddComment(_) => {
                ToolAccess::Write
            }
            _ => ToolAccess::Read,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalogue_is_fixed() {
        let names: Vec<String> = definitions().into_iter().map(|d| d.name).collect();
        assert_eq!(
            names,
            vec![
                "list_teams",
                "list_projects",
                "list_issues",
                "get_issue",
                "search",
                "team_summary",
                "list_notifications",
                "create_issue",
                "update_issue",
                "add_comment",
            ]
        );
    }

    #[test]
    fn test_access_levels_agree() {
        let id = Uuid::new_v4();
        let write = ToolRequest::parse("add_comment", &format!(r#"{{"issue_id":"{}","body":"hi"}}"#, id)).unwrap();
        assert_eq!(write.access(), ToolAccess::Write);
        assert_eq!(access_of("add_comment"), Some(ToolAccess::Write));

        let read = ToolRequest::parse("list_teams", "").unwrap();
        assert_eq!(read, ToolRequest::ListTeams {});
        assert_eq!(access_of("list_teams"), Some(ToolAccess::Read));
    }

    #[test]
    fn test_parse_typed_arguments() {
        let project_id = Uuid::new_v4();
        let request = ToolRequest::parse(
            "create_issue",
            &format!(r#"{{"project_id":"{}","title":"Fix login","priority":"high"}}"#, project_id),
        )
        .unwrap();

        assert_eq!(
            request,
            ToolRequest::CreateIssue(CreateIssueArgs {
                project_id,
                title: "Fix login".to_string(),
                description: None,
                priority: Some(Priority::High),
                assignee_id: None,
            })
        );
    }

    #[test]
    fn test_unknown_tool() {
        assert_eq!(
            ToolRequest::parse("drop_database", "{}"),
            Err(ToolRejection::UnknownTool("drop_database".to_string()))
        );
    }

    #[test]
    fn test_bad_arguments() {
        for raw in [r#"{"team_id":"nope"}"#, "{not json", "[1,2]", r#"{}"#] {
            assert!(matches!(
                ToolRequest::parse("team_summary", raw),
                Err(ToolRejection::InvalidArguments { .. })
            ));
        }
        assert!(matches!(
            ToolRequest::parse("list_teams", r#"{"extra":1}"#),
            Err(ToolRejection::InvalidArguments { .. })
        ));
    }
}
