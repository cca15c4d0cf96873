//! Inbound SMS handling: one [`SmsSession`] per text.

pub mod ai_parse;
pub mod bulk;
pub mod commands;
pub mod commitment;
pub mod consequence;
pub mod context;
pub mod gift;
pub mod intent;
pub mod query;
pub mod response;
pub mod router;
pub mod shortcuts;

use chrono::{DateTime, FixedOffset, Utc};

use crate::api::claude::ClaudeClient;
use crate::db::Database;
use crate::db::models::{Child, User};
use crate::error::StashError;
use crate::service::notify::Notifier;
use context::Conversation;

pub use router::handle_inbound;

pub const UNKNOWN_REPLY: &str = "I didn't understand that message. Reply HELP for command examples or try:\n\n\
    • 'No iPad 3 days Kid A' (consequence)\n\
    • 'Kid A will finish homework by 7pm' (commitment)\n\
    • 'What's Kid A restricted from?' (query)";

pub const ERROR_REPLY: &str =
    "Sorry, an error occurred processing your message. Please try again.";

pub const NO_CHILDREN: &str =
    "No children set up yet. Add them in the GiftStash app under Family first.";

/// Shared clients an SMS session borrows.
#[derive(Clone, Copy)]
pub struct SmsDeps<'a> {
    pub db: &'a Database,
    pub claude: &'a ClaudeClient,
    pub notifier: &'a Notifier,
    pub app_url: &'a str,
}

/// State for handling one inbound text from a known user.
pub struct SmsSession<'a> {
    pub db: &'a Database,
    pub claude: &'a ClaudeClient,
    pub notifier: &'a Notifier,
    pub app_url: &'a str,
    pub user: &'a User,
    pub phone: &'a str,
    pub now: DateTime<Utc>,
    pub offset: FixedOffset,
    pub conversation: Conversation,
}

impl<'a> SmsSession<'a> {
    /// Session with the phone's live context loaded.
    pub async fn load(
        deps: SmsDeps<'a>,
        user: &'a User,
        phone: &'a str,
        now: DateTime<Utc>,
    ) -> Result<Self, StashError> {
        let row = deps.db.sms().context(phone, now).await?;
        Ok(Self {
            db: deps.db,
            claude: deps.claude,
            notifier: deps.notifier,
            app_url: deps.app_url,
            user,
            phone,
            now,
            offset: deps.notifier.offset(),
            conversation: Conversation::from_row(row.as_ref()),
        })
    }

    async fn children(&self) -> Result<Vec<Child>, StashError> {
        self.db.accountability().children(self.user.id).await
    }

    pub async fn save(self) -> Result<(), StashError> {
        let update = self.conversation.into_update(self.user.id);
        self.db.sms().save_context(self.phone, update).await
    }
}

/// Numbered list asking which child a text is about.
fn which_child_question(children: &[Child]) -> String {
    let list = children
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{}. {}", i + 1, c.name))
        .collect::<Vec<_>>()
        .join("\n");
    format!("Which child is this for?\n{list}\n\nReply with the number or name.")
}
