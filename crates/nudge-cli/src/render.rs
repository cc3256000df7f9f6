//! Plain-text rendering of API responses for the terminal.

use std::fmt::Write as _;

use nudge_core::{
  activity::Activity,
  notification::{Notification, QueueStats},
  subject::Subject,
};
use nudge_engine::{
  dispatch::{DispatchReport, RetryReport},
  orchestrator::{DeliveryReport, RunReport, SubjectOutcome},
};

const TIME: &str = "%Y-%m-%d %H:%M";

pub fn dispatch(r: &DispatchReport) -> String {
  format!("processed {}  sent {}  failed {}", r.processed, r.sent, r.failed)
}

pub fn stats(s: &QueueStats) -> String {
  format!(
    "pending {}  sent {}  failed {}  total {}",
    s.pending, s.sent, s.failed, s.total
  )
}

pub fn retry(r: &RetryReport) -> String { format!("requeued {}", r.requeued) }

pub fn run(r: &RunReport) -> String {
  let mut out = String::new();
  if r.repaired > 0 {
    let _ = writeln!(out, "repaired {} unscheduled notification(s)", r.repaired);
  }
  for s in &r.subjects {
    match &s.outcome {
      SubjectOutcome::Success(c) => {
        let _ = writeln!(
          out,
          "{:<12} ok     seen {}  saved {}  dup {}  past {}  invalid {}  scheduled {}",
          s.subject_id, c.seen, c.saved, c.duplicates, c.past, c.invalid, c.scheduled
        );
      }
      SubjectOutcome::Error { stage, message } => {
        let _ = writeln!(out, "{:<12} ERROR  {stage}: {message}", s.subject_id);
      }
    }
  }
  match r.delivery {
    DeliveryReport::Delivered { delivered, failed } => {
      let _ = write!(out, "digest: delivered {delivered}  failed {failed}");
    }
    DeliveryReport::ChannelUnavailable => {
      let _ = write!(out, "digest: channel unavailable, nothing sent");
    }
  }
  out
}

pub fn subjects(list: &[Subject]) -> String {
  if list.is_empty() {
    return "no subjects".to_owned();
  }
  list
    .iter()
    .map(|s| {
      format!(
        "{:<12} {:<8} {}",
        s.subject_id,
        if s.active { "active" } else { "inactive" },
        s.destination
      )
    })
    .collect::<Vec<_>>()
    .join("\n")
}

pub fn activities(list: &[Activity]) -> String {
  if list.is_empty() {
    return "no activities".to_owned();
  }
  list
    .iter()
    .map(|a| {
      format!(
        "{}  {:<10} {:<18} {}",
        a.due_at.format(TIME),
        a.course_code,
        a.activity_type.label(),
        a.title
      )
    })
    .collect::<Vec<_>>()
    .join("\n")
}

pub fn notifications(list: &[Notification]) -> String {
  if list.is_empty() {
    return "no notifications".to_owned();
  }
  list
    .iter()
    .map(|n| {
      let mut line = format!(
        "{}  {:<8} {:<8} {:<12} attempts {}",
        n.scheduled_for.format(TIME),
        n.notification_type,
        n.status,
        n.subject_id,
        n.attempts
      );
      if let Some(e) = &n.error {
        let _ = write!(line, "  ({e})");
      }
      line
    })
    .collect::<Vec<_>>()
    .join("\n")
}

#[cfg(test)]
mod tests {
  use chrono::{TimeZone, Utc};
  use nudge_core::source::Stage;
  use nudge_engine::orchestrator::{SubjectCounts, SubjectResult};

  use super::*;

  #[test]
  fn run_lists_each_subject_and_the_digest() {
    let report = RunReport {
      started_at: Utc.with_ymd_and_hms(2025, 11, 20, 12, 0, 0).unwrap(),
      repaired:   0,
      subjects:   vec![
        SubjectResult {
          subject_id: "s-1".into(),
          outcome:    SubjectOutcome::Success(SubjectCounts {
            seen: 4,
            saved: 2,
            ..Default::default()
          }),
        },
        SubjectResult {
          subject_id: "s-2".into(),
          outcome:    SubjectOutcome::Error {
            stage:   Stage::Authentication,
            message: "login rejected".into(),
          },
        },
      ],
      delivery:   DeliveryReport::ChannelUnavailable,
    };

    let text = run(&report);
    let lines: Vec<_> = text.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("s-1") && lines[0].contains("saved 2"));
    assert!(lines[1].contains("ERROR  authentication: login rejected"));
    assert_eq!(lines[2], "digest: channel unavailable, nothing sent");
  }

  #[test]
  fn counts_render_on_one_line() {
    let s = QueueStats { pending: 3, sent: 10, failed: 1, total: 14 };
    assert_eq!(stats(&s), "pending 3  sent 10  failed 1  total 14");
    assert_eq!(
      dispatch(&DispatchReport { processed: 2, sent: 1, failed: 1 }),
      "processed 2  sent 1  failed 1"
    );
  }

  #[test]
  fn empty_lists_say_so() {
    assert_eq!(subjects(&[]), "no subjects");
    assert_eq!(notifications(&[]), "no notifications");
  }
}
