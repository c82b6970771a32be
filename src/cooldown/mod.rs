//! Cooldown guard: blocks rapid re-execution of a risky intent after an
//! approved run.
//!
//! Only completed approvals count — pending and rejected entries never
//! satisfy the scan. The scan itself is pure over a transcript slice; the
//! router fails open (allows) when the transcript cannot be read, the
//! deliberate inverse of the governance gate's fail-closed posture.

use crate::intent::Intent;
use crate::sessions::TranscriptEntry;
use chrono::{DateTime, Duration, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownVerdict {
    pub allowed: bool,
    /// Remaining wait, rounded up to whole minutes. Zero when allowed.
    pub retry_after_minutes: i64,
}

impl CooldownVerdict {
    pub fn allowed() -> Self {
        Self {
            allowed: true,
            retry_after_minutes: 0,
        }
    }

    fn wait(minutes: i64) -> Self {
        Self {
            allowed: false,
            retry_after_minutes: minutes,
        }
    }
}

pub struct CooldownGuard {
    window: Duration,
}

impl CooldownGuard {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    /// Scan for the most recent approved execution of `intent`; reject if it
    /// falls inside the window.
    pub fn check(
        &self,
        transcript: &[TranscriptEntry],
        intent: Intent,
        now: DateTime<Utc>,
    ) -> CooldownVerdict {
        let last_approved = transcript
            .iter()
            .rev()
            .find(|entry| entry.meta.approved && entry.meta.intent == Some(intent));

        let Some(entry) = last_approved else {
            return CooldownVerdict::allowed();
        };

        let window_end = entry.at + self.window;
        if now >= window_end {
            return CooldownVerdict::allowed();
        }

        let remaining = window_end - now;
        let minutes = (remaining.num_seconds() + 59) / 60;
        CooldownVerdict::wait(minutes.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::{CooldownGuard, CooldownVerdict};
    use crate::intent::Intent;
    use crate::sessions::{EntryMeta, EntryRole, TranscriptEntry};
    use chrono::{DateTime, Duration, Utc};

    fn entry(intent: Intent, at: DateTime<Utc>, approved: bool, rejected: bool) -> TranscriptEntry {
        TranscriptEntry {
            at,
            role: EntryRole::Assistant,
            text: String::new(),
            meta: EntryMeta {
                intent: Some(intent),
                approved,
                rejected,
                ..EntryMeta::default()
            },
        }
    }

    fn guard() -> CooldownGuard {
        CooldownGuard::new(Duration::minutes(5))
    }

    #[test]
    fn empty_transcript_allows() {
        let verdict = guard().check(&[], Intent::Retuning, Utc::now());
        assert_eq!(verdict, CooldownVerdict::allowed());
    }

    #[test]
    fn recent_approval_blocks_with_rounded_up_minutes() {
        let now = Utc::now();
        let transcript = vec![entry(
            Intent::Retuning,
            now - Duration::seconds(90),
            true,
            false,
        )];

        let verdict = guard().check(&transcript, Intent::Retuning, now);
        assert!(!verdict.allowed);
        // 3.5 minutes remaining rounds up to 4.
        assert_eq!(verdict.retry_after_minutes, 4);
    }

    #[test]
    fn approval_outside_window_allows() {
        let now = Utc::now();
        let transcript = vec![entry(
            Intent::Retuning,
            now - Duration::minutes(6),
            true,
            false,
        )];

        assert!(guard().check(&transcript, Intent::Retuning, now).allowed);
    }

    #[test]
    fn rejected_and_pending_entries_never_count() {
        let now = Utc::now();
        let rejected = entry(Intent::Retuning, now - Duration::seconds(10), false, true);
        let mut pending = entry(Intent::Retuning, now - Duration::seconds(5), false, false);
        pending.meta.pending = true;

        let verdict = guard().check(&[rejected, pending], Intent::Retuning, now);
        assert!(verdict.allowed);
    }

    #[test]
    fn approval_of_a_different_intent_does_not_throttle() {
        let now = Utc::now();
        let transcript = vec![entry(
            Intent::ModelReload,
            now - Duration::seconds(30),
            true,
            false,
        )];

        assert!(guard().check(&transcript, Intent::Retuning, now).allowed);
    }

    #[test]
    fn most_recent_approval_wins() {
        let now = Utc::now();
        let transcript = vec![
            entry(Intent::Retuning, now - Duration::minutes(30), true, false),
            entry(Intent::Retuning, now - Duration::minutes(1), true, false),
        ];

        let verdict = guard().check(&transcript, Intent::Retuning, now);
        assert!(!verdict.allowed);
        assert_eq!(verdict.retry_after_minutes, 4);
    }
}
