//! Rendering notification text.

use chrono::{DateTime, FixedOffset, Offset as _, Utc};
use nudge_core::{activity::Activity, notification::NotificationType};

/// Formats messages, showing instants in a fixed UTC offset.
#[derive(Debug, Clone, Copy)]
pub struct Renderer {
  offset: FixedOffset,
}

impl Default for Renderer {
  fn default() -> Self { Self::utc() }
}

impl Renderer {
  pub fn utc() -> Self {
    Self { offset: Utc.fix() }
  }

  /// Use an offset of `minutes` east of UTC. Out-of-range offsets fall back
  /// to UTC.
  pub fn with_offset_minutes(minutes: i32) -> Self {
    minutes
      .checked_mul(60)
      .and_then(FixedOffset::east_opt)
      .map(|offset| Self { offset })
      .unwrap_or_else(Self::utc)
  }

  fn when(&self, at: DateTime<Utc>) -> String {
    at.with_timezone(&self.offset)
      .format("%a %d %b %Y, %H:%M")
      .to_string()
  }

  fn body(&self, activity: &Activity) -> String {
    format!(
      "{} · {}\nDue: {}\n{}",
      activity.course_code,
      activity.title,
      self.when(activity.due_at),
      activity.link,
    )
  }

  /// Text for a scheduled notification.
  pub fn notification(&self, kind: NotificationType, activity: &Activity) -> String {
    let headline = match kind {
      NotificationType::Start => format!("{} is now open", activity.activity_type.label()),
      NotificationType::Reminder => format!("{} due in 24 hours", activity.activity_type.label()),
    };
    format!("{headline}\n{}", self.body(activity))
  }

  /// Text for a post-run digest entry: an activity due soon.
  pub fn upcoming(&self, activity: &Activity, now: DateTime<Utc>) -> String {
    let days = (activity.due_at - now).num_days();
    let lead = match days {
      0 => "today".to_owned(),
      1 => "tomorrow".to_owned(),
      n => format!("in {n} days"),
    };
    format!(
      "{} due {lead}\n{}",
      activity.activity_type.label(),
      self.body(activity)
    )
  }
}
