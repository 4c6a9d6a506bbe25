use async_trait::async_trait;
use tracing::{info, warn};

use crate::chat::{ChatError, GroupChat};
use crate::greeter::Greeter;
use crate::roster::MemberRoster;
use crate::scheduler::Task;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PollReport {
    /// True when this poll only established the initial roster.
    pub seeded: bool,
    pub welcomed: Vec<String>,
    pub failed: Vec<String>,
}

/// Watches the group roster and welcomes members who joined since the previous poll.
pub struct WelcomeMonitor<C> {
    chat: C,
    roster: MemberRoster,
    greeter: Greeter,
}

impl<C: GroupChat> WelcomeMonitor<C> {
    pub fn new(chat: C, roster: MemberRoster, greeter: Greeter) -> Self {
        Self {
            chat,
            roster,
            greeter,
        }
    }

    pub fn roster(&self) -> &MemberRoster {
        &self.roster
    }

    /// A failed member listing leaves the roster as it was, so nobody is re-welcomed
    /// when the listing recovers. Joiners are recorded even if their welcome fails.
    pub async fn poll_once(&mut self) -> Result<PollReport, ChatError> {
        let current = self.chat.list_members().await?;
        let was_seeded = self.roster.is_seeded();
        let joined = self.roster.observe(current);

        let mut report = PollReport {
            seeded: !was_seeded,
            ..PollReport::default()
        };
        if report.seeded {
            info!(members = self.roster.len(), "seeded member roster");
            return Ok(report);
        }

        for member_id in joined {
            match self.welcome(&member_id).await {
                Ok(username) => {
                    info!(member_id = %member_id, username = %username, "welcomed new member");
                    report.welcomed.push(username);
                }
                Err(e) => {
                    warn!(member_id = %member_id, error = %e, "failed to welcome new member");
                    report.failed.push(member_id);
                }
            }
        }
        Ok(report)
    }

    async fn welcome(&mut self, member_id: &str) -> Result<String, ChatError> {
        let username = self.chat.username_of(member_id).await?;
        let message = self.greeter.welcome(&username);
        self.chat.send_message(&message).await?;
        Ok(username)
    }
}

#[async_trait]
impl<C: GroupChat> Task for WelcomeMonitor<C> {
    async fn run(&mut self) {
        match self.poll_once().await {
            Ok(report) if !report.welcomed.is_empty() || !report.failed.is_empty() => {
                info!(
                    welcomed = report.welcomed.len(),
                    failed = report.failed.len(),
                    "member check finished"
                );
            }
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "failed to fetch group members; keeping previous roster");
            }
        }
    }
}
