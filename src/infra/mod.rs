//! Infrastructure layer - External systems integration
//!
//! - Database connections, migrations and repositories
//! - Redis cache and rate-limit counters
//! - Language model provider client
//! - Unit of Work for transaction management

pub mod cache;
pub mod db;
pub mod llm;
pub mod repositories;
pub mod unit_of_work;

pub use cache::{Cache, RateLimitStatus};
pub use db::{Database, Migrator};
pub use llm::{
    ChatMessage, ChatRole, Completion, CompletionRequest, DisabledLanguageModel, LanguageModel,
    OpenAiClient, TokenUsage, ToolCall, ToolDefinition,
};

#[cfg(any(test, feature = "test-utils"))]
pub use llm::MockLanguageModel;
pub use repositories::{
    CommentRepository, IssueRepository, LabelRepository, NotificationRepository,
    ProjectRepository, StatusRepository, TeamRepository, UsageRepository, UserRepository,
};
pub use unit_of_work::{Persistence, TransactionContext, TxFuture, UnitOfWork};
